#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use mastery_quiz_api::{
    config::Config,
    create_router,
    models::{BloomLevel, QuizOption, QuizQuestion},
    services::{
        question_generator::{GenerationError, GenerationRequest, QuestionGenerator},
        AppState,
    },
    storage::{KeyValueStore, MemoryStore},
};

pub fn question(id: &str, topic: &str, level: BloomLevel) -> QuizQuestion {
    let options = ["a", "b", "c", "d"]
        .iter()
        .map(|opt| QuizOption {
            id: format!("{}-{}", id, opt),
            text: format!("Option {}", opt),
            is_correct: *opt == "a",
        })
        .collect();

    QuizQuestion {
        id: id.to_string(),
        question_text: format!("Question {} about {}", id, topic),
        options,
        correct_answer: format!("{}-a", id),
        explanation: format!("{}-a is right", id),
        bloom_level: level,
        topic: topic.to_string(),
        source_time_range: None,
    }
}

/// Question generator that replays queued responses, then falls back to
/// well-formed batches at the requested level.
#[derive(Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<Vec<QuizQuestion>, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    counter: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn push(&self, response: Result<Vec<QuizQuestion>, GenerationError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuestionGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<QuizQuestion>, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            return response;
        }

        Ok((0..request.count)
            .map(|_| {
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                question(&format!("gen-{}", n), "api", request.bloom_level)
            })
            .collect())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub generator: Arc<ScriptedGenerator>,
    pub config: Config,
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(Config::default())
}

pub fn create_test_app_with(config: Config) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let store = Arc::new(MemoryStore::new(config.storage.quota_bytes));
    let generator = Arc::new(ScriptedGenerator::default());

    let backend: Arc<dyn KeyValueStore> = store.clone();
    let app_state = Arc::new(AppState::from_parts(
        config.clone(),
        backend,
        generator.clone(),
    ));

    TestApp {
        router: create_router(app_state),
        store,
        generator,
        config,
    }
}

pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into()))
    };

    (status, json)
}
