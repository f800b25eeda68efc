use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::{BloomLevel, QuizQuestion};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub video_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<String>,
    pub bloom_level: BloomLevel,
    pub count: u32,
    pub language: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_ids: Vec<String>,
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Question generator request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Question generator returned error {status}: {body}")]
    Status { status: u16, body: String },
}

/// Turns transcript content into question batches at a requested level.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest)
        -> Result<Vec<QuizQuestion>, GenerationError>;
}

#[derive(Debug, Deserialize)]
struct GenerateQuestionsResponse {
    questions: Vec<QuizQuestion>,
}

/// Client for the question generation service's internal HTTP API
pub struct HttpQuestionGenerator {
    http_client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpQuestionGenerator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/internal/generate_questions",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl QuestionGenerator for HttpQuestionGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<QuizQuestion>, GenerationError> {
        let url = self.endpoint();

        tracing::debug!(
            "Calling question generator: {} with video_id={}, level={}, count={}",
            url,
            request.video_id,
            request.bloom_level,
            request.count
        );

        let response = self
            .http_client
            .post(&url)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerationError::Status { status, body });
        }

        let payload: GenerateQuestionsResponse = response.json().await?;

        tracing::info!(
            "Generated {} questions for video {} at level {}",
            payload.questions.len(),
            request.video_id,
            request.bloom_level
        );

        Ok(payload.questions)
    }
}
