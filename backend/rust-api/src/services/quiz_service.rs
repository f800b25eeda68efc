use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use super::adaptive_engine::AdaptiveConfig;
use super::question_generator::QuestionGenerator;
use super::session_controller::{SessionController, SubmitError};
use super::session_store::SessionStore;
use crate::config::QuestionSettings;
use crate::metrics::QUESTION_BATCHES_TOTAL;
use crate::models::{AnswerOutcome, QuizSessionState, SessionSummary, SessionView};

#[derive(Error, Debug)]
pub enum QuizServiceError {
    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Optional overrides for question top-up
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub chapter_id: Option<String>,
    pub language: Option<String>,
}

/// Session held in memory between requests
#[derive(Debug, Clone)]
struct LiveSession {
    state: QuizSessionState,
    persist: bool,
}

/// Async facade over [`SessionController`]: storage calls run on the
/// blocking pool, question generation is awaited in between.
///
/// Each video's session stays live in memory once opened, so a save the
/// store dropped never takes the served questions away. The store is read
/// only when no live session exists.
pub struct QuizService {
    store: SessionStore,
    adaptive: AdaptiveConfig,
    generator: Arc<dyn QuestionGenerator>,
    questions: QuestionSettings,
    live: Mutex<HashMap<String, LiveSession>>,
    live_capacity: usize,
}

impl QuizService {
    pub fn new(
        store: SessionStore,
        adaptive: AdaptiveConfig,
        generator: Arc<dyn QuestionGenerator>,
        questions: QuestionSettings,
        live_capacity: usize,
    ) -> Self {
        Self {
            store,
            adaptive,
            generator,
            questions,
            live: Mutex::new(HashMap::new()),
            live_capacity: live_capacity.max(1),
        }
    }

    /// Opens the session and makes sure a question is queued if the
    /// generator can supply one. Generation trouble still yields a view.
    pub async fn open_session(
        &self,
        video_id: &str,
        options: BatchOptions,
    ) -> Result<SessionView, QuizServiceError> {
        let controller = self.open(video_id).await?;
        let controller = if controller.needs_questions() {
            self.top_up(controller, &options).await?
        } else {
            controller
        };

        self.remember(&controller).await;
        Ok(SessionView::from(controller.state()))
    }

    pub async fn submit_answer(
        &self,
        video_id: &str,
        question_id: String,
        answer: String,
    ) -> Result<AnswerOutcome, QuizServiceError> {
        let controller = self.open(video_id).await?;

        let (controller, outcome) = tokio::task::spawn_blocking(move || {
            let mut controller = controller;
            let outcome = controller.submit_answer(&question_id, &answer);
            (controller, outcome)
        })
        .await?;

        self.remember(&controller).await;
        Ok(outcome?)
    }

    pub async fn summary(&self, video_id: &str) -> Result<SessionSummary, QuizServiceError> {
        let controller = self.open(video_id).await?;
        self.remember(&controller).await;
        Ok(SessionSummary::from(controller.state()))
    }

    pub async fn reset(&self, video_id: &str) -> Result<(), QuizServiceError> {
        self.live.lock().await.remove(video_id);

        let store = self.store.clone();
        let video_id = video_id.to_string();
        tokio::task::spawn_blocking(move || SessionController::reset(&store, &video_id)).await?;
        Ok(())
    }

    /// Live session if one exists, otherwise whatever the store holds
    async fn open(&self, video_id: &str) -> Result<SessionController, QuizServiceError> {
        let live = self.live.lock().await.get(video_id).cloned();
        if let Some(live) = live {
            return Ok(SessionController::resume(
                self.store.clone(),
                self.adaptive.clone(),
                live.state,
                live.persist,
            ));
        }

        let store = self.store.clone();
        let adaptive = self.adaptive.clone();
        let video_id = video_id.to_string();

        Ok(
            tokio::task::spawn_blocking(move || SessionController::open(store, adaptive, &video_id))
                .await?,
        )
    }

    /// Keeps the controller's state live. Past capacity, the least recently
    /// active other session is dropped from memory; its stored copy stays.
    async fn remember(&self, controller: &SessionController) {
        let video_id = controller.video_id();
        let mut live = self.live.lock().await;
        live.insert(
            video_id.to_string(),
            LiveSession {
                state: controller.state().clone(),
                persist: controller.persists(),
            },
        );

        if live.len() > self.live_capacity {
            let oldest = live
                .iter()
                .filter(|(id, _)| id.as_str() != video_id)
                .min_by_key(|(_, session)| session.state.last_activity())
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                live.remove(&oldest);
                tracing::debug!("Dropped live session {} from memory", oldest);
            }
        }
    }

    /// Requests batches at the current level until one is accepted or the
    /// attempt budget is spent.
    async fn top_up(
        &self,
        mut controller: SessionController,
        options: &BatchOptions,
    ) -> Result<SessionController, QuizServiceError> {
        let language = options
            .language
            .clone()
            .unwrap_or_else(|| self.questions.language.clone());

        for attempt in 1..=self.questions.max_batch_attempts {
            let request = controller.generation_request(
                self.questions.batch_size,
                &language,
                options.chapter_id.clone(),
            );

            let batch = match self.generator.generate(&request).await {
                Ok(batch) if batch.is_empty() => {
                    QUESTION_BATCHES_TOTAL.with_label_values(&["empty"]).inc();
                    tracing::warn!(
                        "Question generator returned no questions for video {} (attempt {})",
                        request.video_id,
                        attempt
                    );
                    continue;
                }
                Ok(batch) => batch,
                Err(e) => {
                    QUESTION_BATCHES_TOTAL.with_label_values(&["failed"]).inc();
                    tracing::warn!(
                        "Question generation failed for video {} (attempt {}): {}",
                        request.video_id,
                        attempt,
                        e
                    );
                    continue;
                }
            };

            let (returned, result) = tokio::task::spawn_blocking(move || {
                let result = controller.accept_batch(batch);
                (controller, result)
            })
            .await?;
            controller = returned;

            match result {
                Ok(accepted) => {
                    QUESTION_BATCHES_TOTAL.with_label_values(&["accepted"]).inc();
                    tracing::info!(
                        "Accepted {} questions for video {} at level {}",
                        accepted,
                        controller.video_id(),
                        controller.state().current_bloom
                    );
                    return Ok(controller);
                }
                Err(e) => {
                    QUESTION_BATCHES_TOTAL.with_label_values(&["rejected"]).inc();
                    tracing::warn!(
                        "Rejected question batch for video {} (attempt {}): {}",
                        controller.video_id(),
                        attempt,
                        e
                    );
                }
            }
        }

        tracing::warn!(
            "No usable questions for video {} after {} attempts",
            controller.video_id(),
            self.questions.max_batch_attempts
        );
        Ok(controller)
    }
}
