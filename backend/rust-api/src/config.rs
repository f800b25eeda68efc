use serde::Deserialize;
use std::env;

use crate::services::adaptive_engine::AdaptiveConfig;
use crate::services::session_store::DEFAULT_MAX_RETAINED_SESSIONS;
use crate::storage::keys::DEFAULT_NAMESPACE;
use crate::storage::memory::DEFAULT_QUOTA_BYTES;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub adaptive: AdaptiveConfig,
    pub questions: QuestionSettings,
    pub logging: LoggingSettings,
    /// `user:password` guarding `/metrics`
    pub metrics_auth: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8081".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Prefix shared by all session keys
    pub namespace: String,
    /// Sessions kept when quota pressure forces eviction
    pub max_retained_sessions: usize,
    /// Memory backend only; `None` means unbounded
    pub quota_bytes: Option<usize>,
    pub redis_uri: Option<String>,
    /// Sessions kept live in process memory between requests
    pub live_sessions: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            namespace: DEFAULT_NAMESPACE.to_string(),
            max_retained_sessions: DEFAULT_MAX_RETAINED_SESSIONS,
            quota_bytes: Some(DEFAULT_QUOTA_BYTES),
            redis_uri: None,
            live_sessions: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuestionSettings {
    pub api_url: String,
    pub batch_size: u32,
    pub language: String,
    /// Batches requested per top-up before giving up
    pub max_batch_attempts: u32,
    pub timeout_secs: u64,
}

impl Default for QuestionSettings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            batch_size: 5,
            language: "en".to_string(),
            max_batch_attempts: 2,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Used when `RUST_LOG` is not set
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "mastery_quiz_api=debug,tower_http=debug".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first (two levels up), then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/<env>.toml, then APP__SECTION__KEY overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        self.adaptive
            .validate()
            .map_err(|e| config::ConfigError::Message(format!("adaptive: {}", e)))?;

        if self.storage.namespace.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "storage.namespace must not be empty".to_string(),
            ));
        }

        if self.storage.max_retained_sessions == 0 {
            return Err(config::ConfigError::Message(
                "storage.max_retained_sessions must be at least 1".to_string(),
            ));
        }

        if self.storage.live_sessions == 0 {
            return Err(config::ConfigError::Message(
                "storage.live_sessions must be at least 1".to_string(),
            ));
        }

        if self.storage.backend == StorageBackend::Redis && self.storage.redis_uri.is_none() {
            return Err(config::ConfigError::Message(
                "storage.redis_uri must be set when storage.backend = redis".to_string(),
            ));
        }

        if self.questions.batch_size == 0 || self.questions.max_batch_attempts == 0 {
            return Err(config::ConfigError::Message(
                "questions.batch_size and questions.max_batch_attempts must be positive"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
