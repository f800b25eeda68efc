use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, StorageBackend};
use crate::storage::{KeyValueStore, MemoryStore, RedisStore};

pub mod adaptive_engine;
pub mod question_generator;
pub mod quiz_service;
pub mod session_controller;
pub mod session_store;

use question_generator::{HttpQuestionGenerator, QuestionGenerator};
use quiz_service::QuizService;
use session_store::SessionStore;

pub struct AppState {
    pub config: Config,
    pub store: SessionStore,
    pub quiz: QuizService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let backend: Arc<dyn KeyValueStore> = match config.storage.backend {
            StorageBackend::Memory => {
                tracing::info!(
                    "Using in-memory session storage (quota: {:?} bytes)",
                    config.storage.quota_bytes
                );
                Arc::new(MemoryStore::new(config.storage.quota_bytes))
            }
            StorageBackend::Redis => {
                let uri = config
                    .storage
                    .redis_uri
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("storage.redis_uri is required for redis"))?;

                tracing::info!("Attempting to connect to Redis...");
                let store = Arc::new(RedisStore::open(&uri)?);

                let probe = store.clone();
                tokio::time::timeout(
                    Duration::from_secs(5),
                    tokio::task::spawn_blocking(move || probe.ping()),
                )
                .await
                .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))???;

                tracing::info!("Redis connection established successfully");
                store
            }
        };

        let generator = Arc::new(HttpQuestionGenerator::new(
            config.questions.api_url.clone(),
            Duration::from_secs(config.questions.timeout_secs),
        ));

        Ok(Self::from_parts(config, backend, generator))
    }

    /// Wires the state from ready-made collaborators
    pub fn from_parts(
        config: Config,
        backend: Arc<dyn KeyValueStore>,
        generator: Arc<dyn QuestionGenerator>,
    ) -> Self {
        let store = SessionStore::new(backend, config.storage.namespace.clone())
            .with_max_retained(config.storage.max_retained_sessions);

        let quiz = QuizService::new(
            store.clone(),
            config.adaptive.clone(),
            generator,
            config.questions.clone(),
            config.storage.live_sessions,
        );

        Self {
            config,
            store,
            quiz,
        }
    }
}
