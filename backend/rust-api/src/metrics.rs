use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Session storage
    pub static ref STORAGE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "storage_operations_total",
        "Total number of session storage operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref STORAGE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "storage_operation_duration_seconds",
        "Session storage operation duration in seconds",
        &["operation"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1]
    )
    .unwrap();

    pub static ref STORAGE_EVICTIONS_TOTAL: IntCounter = register_int_counter!(
        "storage_evictions_total",
        "Sessions evicted under storage quota pressure"
    )
    .unwrap();

    pub static ref STORAGE_CORRUPTIONS_TOTAL: IntCounter = register_int_counter!(
        "storage_corruptions_total",
        "Stored sessions discarded as unreadable or mismatched"
    )
    .unwrap();

    // Business Metrics
    pub static ref SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_sessions_total",
        "Quiz session lifecycle events",
        &["event"]
    )
    .unwrap();

    pub static ref ANSWERS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "answers_submitted_total",
        "Total number of answers submitted",
        &["correct"]
    )
    .unwrap();

    pub static ref LEVEL_TRANSITIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bloom_level_transitions_total",
        "Bloom level changes decided by the adaptive engine",
        &["direction"]
    )
    .unwrap();

    pub static ref QUESTION_BATCHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "question_batches_total",
        "Question batches requested from the generator",
        &["outcome"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track a session storage call with metrics
pub fn track_storage_operation<F, T, E>(operation: &str, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let start = std::time::Instant::now();
    let result = f();
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    STORAGE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();

    STORAGE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let _ = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/health", "200"])
            .get();
        let _ = STORAGE_EVICTIONS_TOTAL.get();
    }

    #[test]
    fn test_render_metrics() {
        LEVEL_TRANSITIONS_TOTAL
            .with_label_values(&["advance"])
            .inc();

        let output = render_metrics().unwrap();
        assert!(output.contains("bloom_level_transitions_total"));
    }

    #[test]
    fn test_track_storage_operation_passes_result_through() {
        let ok: Result<u8, ()> = track_storage_operation("get", || Ok(7));
        assert_eq!(ok, Ok(7));

        let before = STORAGE_OPERATIONS_TOTAL
            .with_label_values(&["set", "error"])
            .get();
        let err: Result<(), &str> = track_storage_operation("set", || Err("full"));
        assert_eq!(err, Err("full"));
        assert!(
            STORAGE_OPERATIONS_TOTAL
                .with_label_values(&["set", "error"])
                .get()
                > before
        );
    }
}
