//! Drives one learner's quiz session for one video: restore on open, record
//! answers, apply level decisions, persist after every change.

use thiserror::Error;

use super::adaptive_engine::{compute_next_level, AdaptiveConfig};
use super::question_generator::GenerationRequest;
use super::session_store::SessionStore;
use crate::metrics::{ANSWERS_SUBMITTED_TOTAL, LEVEL_TRANSITIONS_TOTAL, SESSIONS_TOTAL};
use crate::models::{
    validate_batch, AnswerOutcome, BloomLevel, QuizAttemptRecord, QuizQuestion, QuizSessionState,
    QuizValidationError, TopicMasteryEntry,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Question {0} is not part of this session")]
    UnknownQuestion(String),

    #[error("Question {0} was already answered")]
    AlreadyAnswered(String),
}

pub struct SessionController {
    store: SessionStore,
    adaptive: AdaptiveConfig,
    state: QuizSessionState,
    /// Cleared when the stored record could not be read; saving a fresh
    /// state then would overwrite progress that may still exist.
    persist: bool,
}

impl SessionController {
    /// Restores the stored session for `video_id` or starts a fresh one.
    /// A missing or unusable record is never an error.
    pub fn open(store: SessionStore, adaptive: AdaptiveConfig, video_id: &str) -> Self {
        let (state, persist) = match store.load(video_id) {
            Ok(Some(state)) => {
                SESSIONS_TOTAL.with_label_values(&["restored"]).inc();
                tracing::debug!(
                    "Restored session {} at level {} with {} answers",
                    video_id,
                    state.current_bloom,
                    state.answers.len()
                );
                (state, true)
            }
            Ok(None) => {
                SESSIONS_TOTAL.with_label_values(&["created"]).inc();
                tracing::debug!("Starting new session for video {}", video_id);
                (QuizSessionState::new(video_id), true)
            }
            Err(e) => {
                SESSIONS_TOTAL.with_label_values(&["created"]).inc();
                tracing::warn!(
                    "Could not read stored session {}, progress at risk; \
                     continuing without saving until reset: {}",
                    video_id,
                    e
                );
                (QuizSessionState::new(video_id), false)
            }
        };

        Self {
            store,
            adaptive,
            state,
            persist,
        }
    }

    /// Continues a session already held in memory, skipping the store read.
    pub fn resume(
        store: SessionStore,
        adaptive: AdaptiveConfig,
        state: QuizSessionState,
        persist: bool,
    ) -> Self {
        Self {
            store,
            adaptive,
            state,
            persist,
        }
    }

    /// Whether changes are written back to the store
    pub fn persists(&self) -> bool {
        self.persist
    }

    pub fn state(&self) -> &QuizSessionState {
        &self.state
    }

    pub fn video_id(&self) -> &str {
        &self.state.video_id
    }

    pub fn current_question(&self) -> Option<&QuizQuestion> {
        self.state.current_question()
    }

    pub fn needs_questions(&self) -> bool {
        self.state.needs_questions()
    }

    /// Parameters for the next batch: current level, nothing already served
    pub fn generation_request(
        &self,
        count: u32,
        language: &str,
        chapter_id: Option<String>,
    ) -> GenerationRequest {
        GenerationRequest {
            video_id: self.state.video_id.clone(),
            chapter_id,
            bloom_level: self.state.current_bloom,
            count,
            language: language.to_string(),
            exclude_ids: self
                .state
                .questions
                .iter()
                .map(|q| q.id.clone())
                .collect(),
        }
    }

    /// Appends a validated batch. An invalid batch leaves the session untouched.
    pub fn accept_batch(&mut self, questions: Vec<QuizQuestion>) -> Result<usize, QuizValidationError> {
        validate_batch(&questions, &self.state.question_ids())?;

        let accepted = questions.len();
        if accepted > 0 {
            self.state.questions.extend(questions);
            self.save();
        }

        Ok(accepted)
    }

    pub fn submit_answer(
        &mut self,
        question_id: &str,
        answer: &str,
    ) -> Result<AnswerOutcome, SubmitError> {
        let position = self
            .state
            .questions
            .iter()
            .position(|q| q.id == question_id)
            .ok_or_else(|| SubmitError::UnknownQuestion(question_id.to_string()))?;

        if self.state.has_answered(question_id) {
            return Err(SubmitError::AlreadyAnswered(question_id.to_string()));
        }

        let question = self.state.questions[position].clone();
        let answer = answer.trim();
        let is_correct = question.is_correct_answer(answer);
        let previous = self.state.current_bloom;

        self.state
            .answers
            .push(QuizAttemptRecord::new(&question, answer, is_correct));

        let entry = match self.state.topic_mastery.get(&question.topic) {
            Some(existing) => existing.record(is_correct, previous),
            None => TopicMasteryEntry::first_attempt(is_correct, previous),
        };
        self.state
            .topic_mastery
            .insert(question.topic.clone(), entry);

        if position >= self.state.current_index {
            self.state.current_index = position + 1;
        }

        let decision = compute_next_level(&self.state.topic_mastery, previous, &self.adaptive);
        let level_changed = decision.next_level != previous;
        if level_changed {
            self.apply_level(decision.next_level, decision.should_advance);
        }

        if is_correct {
            self.state.streak += 1;
            self.state.best_streak = self.state.best_streak.max(self.state.streak);
        } else {
            self.state.streak = 0;
        }

        ANSWERS_SUBMITTED_TOTAL
            .with_label_values(&[if is_correct { "true" } else { "false" }])
            .inc();

        self.save();

        Ok(AnswerOutcome {
            question_id: question.id,
            correct: is_correct,
            correct_answer: question.correct_answer,
            explanation: question.explanation,
            streak: self.state.streak,
            best_streak: self.state.best_streak,
            previous_bloom: previous,
            current_bloom: self.state.current_bloom,
            level_changed,
            answered: self.state.answers.len(),
        })
    }

    /// Explicit restart: removes the stored record for `video_id`.
    pub fn reset(store: &SessionStore, video_id: &str) {
        store.clear(video_id);
        SESSIONS_TOTAL.with_label_values(&["reset"]).inc();
        tracing::info!("Session for video {} reset", video_id);
    }

    fn save(&self) {
        if self.persist {
            self.store.save(&self.state);
        } else {
            tracing::debug!("Not saving session {}: stored record unreadable", self.state.video_id);
        }
    }

    fn apply_level(&mut self, next: BloomLevel, advanced: bool) {
        let previous = self.state.current_bloom;
        self.state.current_bloom = next;

        // Queued questions were generated for the old level.
        let stale = self.state.questions.len().saturating_sub(self.state.current_index);
        self.state.questions.truncate(self.state.current_index);

        LEVEL_TRANSITIONS_TOTAL
            .with_label_values(&[if advanced { "advance" } else { "regress" }])
            .inc();
        tracing::info!(
            "Video {}: level {} -> {} ({} queued questions dropped)",
            self.state.video_id,
            previous,
            next,
            stale
        );
    }
}
