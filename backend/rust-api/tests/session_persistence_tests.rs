mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::question;
use mastery_quiz_api::models::{BloomLevel, QuizAttemptRecord, QuizSessionState};
use mastery_quiz_api::services::adaptive_engine::AdaptiveConfig;
use mastery_quiz_api::services::session_controller::SessionController;
use mastery_quiz_api::services::session_store::{SaveOutcome, SessionStore};
use mastery_quiz_api::storage::{KeyValueStore, MemoryStore, StorageError};

/// Wraps a memory store and reports quota exhaustion for the next N writes.
struct FlakyQuotaStore {
    inner: MemoryStore,
    failing_writes: AtomicUsize,
}

impl FlakyQuotaStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::unbounded(),
            failing_writes: AtomicUsize::new(0),
        }
    }

    fn fail_next_writes(&self, n: usize) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }
}

impl KeyValueStore for FlakyQuotaStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let pending = self.failing_writes.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_writes.store(pending - 1, Ordering::SeqCst);
            return Err(StorageError::QuotaExceeded);
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.inner.keys_with_prefix(prefix)
    }

    fn kind(&self) -> &'static str {
        "flaky"
    }
}

fn state_answered_at(video_id: &str, timestamp: i64) -> QuizSessionState {
    let q = question(&format!("{}-q1", video_id), "storage", BloomLevel::Recall);
    let mut attempt = QuizAttemptRecord::new(&q, &q.correct_answer, true);
    attempt.timestamp = timestamp;

    let mut state = QuizSessionState::new(video_id);
    state.questions.push(q);
    state.current_index = 1;
    state.answers.push(attempt);
    state
}

#[test]
fn test_session_survives_reopen() {
    let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
    let store = SessionStore::new(backend, "quiz-session");

    let mut controller =
        SessionController::open(store.clone(), AdaptiveConfig::default(), "lecture-1");
    controller
        .accept_batch(vec![
            question("q1", "rust", BloomLevel::Recall),
            question("q2", "rust", BloomLevel::Recall),
        ])
        .unwrap();
    controller.submit_answer("q1", "q1-a").unwrap();
    drop(controller);

    let reopened = SessionController::open(store, AdaptiveConfig::default(), "lecture-1");
    let state = reopened.state();
    assert_eq!(state.answers.len(), 1);
    assert_eq!(state.current_index, 1);
    assert_eq!(state.streak, 1);
    assert_eq!(reopened.current_question().map(|q| q.id.as_str()), Some("q2"));
}

#[test]
fn test_restore_is_scoped_to_video() {
    let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
    let store = SessionStore::new(backend, "quiz-session");

    assert_eq!(store.save(&QuizSessionState::new("v1")), SaveOutcome::Saved);

    assert!(store.restore("v1").is_some());
    assert!(store.restore("v2").is_none());
}

#[test]
fn test_garbage_record_is_removed_on_restore() {
    let memory = Arc::new(MemoryStore::default());
    let backend: Arc<dyn KeyValueStore> = memory.clone();
    let store = SessionStore::new(backend, "quiz-session");

    memory.set("quiz-session-v1", "not json at all").unwrap();

    assert!(store.restore("v1").is_none());
    assert!(memory.get("quiz-session-v1").unwrap().is_none());
}

#[test]
fn test_quota_pressure_keeps_most_recent_sessions() {
    let flaky = Arc::new(FlakyQuotaStore::new());
    let backend: Arc<dyn KeyValueStore> = flaky.clone();
    let store = SessionStore::new(backend, "quiz-session");

    for i in 1..=5 {
        let outcome = store.save(&state_answered_at(&format!("v{}", i), 1_000 * i));
        assert_eq!(outcome, SaveOutcome::Saved);
    }

    let mut newest = state_answered_at("v6", 10_000);
    newest.streak = 4;
    flaky.fail_next_writes(1);
    assert_eq!(store.save(&newest), SaveOutcome::SavedAfterEviction);

    let keys = flaky.keys_with_prefix("quiz-session-").unwrap();
    assert_eq!(keys.len(), 5);
    assert!(!keys.contains(&"quiz-session-v1".to_string()));
    assert_eq!(store.restore("v6").map(|s| s.streak), Some(4));
}

#[test]
fn test_full_memory_quota_makes_room_for_new_session() {
    let record = serde_json::to_string(&state_answered_at("v1", 1_000))
        .unwrap()
        .len()
        + "quiz-session-v1".len();
    let memory = Arc::new(MemoryStore::new(Some(record * 5 + record / 2)));
    let backend: Arc<dyn KeyValueStore> = memory.clone();
    let store = SessionStore::new(backend, "quiz-session");

    for i in 1..=5 {
        assert_eq!(
            store.save(&state_answered_at(&format!("v{}", i), 1_000 * i)),
            SaveOutcome::Saved
        );
    }
    assert_eq!(
        store.save(&state_answered_at("v6", 6_000)),
        SaveOutcome::SavedAfterEviction
    );

    assert_eq!(memory.keys_with_prefix("quiz-session-").unwrap().len(), 5);
    assert!(store.restore("v1").is_none());
    assert!(store.restore("v6").is_some());
}

#[test]
fn test_save_dropped_when_retry_also_fails() {
    let flaky = Arc::new(FlakyQuotaStore::new());
    let backend: Arc<dyn KeyValueStore> = flaky.clone();
    let store = SessionStore::new(backend, "quiz-session");

    flaky.fail_next_writes(2);
    assert_eq!(
        store.save(&QuizSessionState::new("v1")),
        SaveOutcome::Dropped
    );
    assert!(store.restore("v1").is_none());
}
