use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::quiz::{BloomLevel, QuizQuestion};

/// One submitted answer. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttemptRecord {
    pub question_id: String,
    pub answer: String,
    pub is_correct: bool,
    pub bloom_level: BloomLevel,
    pub topic: String,
    /// Unix epoch milliseconds
    pub timestamp: i64,
}

impl QuizAttemptRecord {
    pub fn new(question: &QuizQuestion, answer: &str, is_correct: bool) -> Self {
        Self {
            question_id: question.id.clone(),
            answer: answer.to_string(),
            is_correct,
            bloom_level: question.bloom_level,
            topic: question.topic.clone(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Cumulative counters for one topic at the level it was last tested at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMasteryEntry {
    pub correct: u32,
    pub total: u32,
    pub bloom_level: BloomLevel,
}

impl TopicMasteryEntry {
    pub fn first_attempt(is_correct: bool, level: BloomLevel) -> Self {
        Self {
            correct: u32::from(is_correct),
            total: 1,
            bloom_level: level,
        }
    }

    /// Counts accumulate while the level is unchanged; a different level
    /// starts a fresh entry instead of merging.
    pub fn record(self, is_correct: bool, level: BloomLevel) -> Self {
        if self.bloom_level != level {
            return Self::first_attempt(is_correct, level);
        }

        Self {
            correct: self.correct + u32::from(is_correct),
            total: self.total + 1,
            bloom_level: level,
        }
    }
}

pub type TopicMastery = BTreeMap<String, TopicMasteryEntry>;

/// Full progress record of one learner on one video.
///
/// This is also the persisted document shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSessionState {
    pub video_id: String,
    pub current_bloom: BloomLevel,
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
    #[serde(default)]
    pub current_index: usize,
    #[serde(default)]
    pub answers: Vec<QuizAttemptRecord>,
    #[serde(default)]
    pub topic_mastery: TopicMastery,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub best_streak: u32,
}

impl QuizSessionState {
    pub fn new(video_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            current_bloom: BloomLevel::MIN,
            questions: Vec::new(),
            current_index: 0,
            answers: Vec::new(),
            topic_mastery: TopicMastery::new(),
            streak: 0,
            best_streak: 0,
        }
    }

    pub fn current_question(&self) -> Option<&QuizQuestion> {
        self.questions.get(self.current_index)
    }

    pub fn needs_questions(&self) -> bool {
        self.current_index >= self.questions.len()
    }

    pub fn question_ids(&self) -> HashSet<&str> {
        self.questions.iter().map(|q| q.id.as_str()).collect()
    }

    pub fn has_answered(&self, question_id: &str) -> bool {
        self.answers.iter().any(|a| a.question_id == question_id)
    }

    pub fn correct_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_correct).count()
    }

    /// Timestamp of the latest attempt, 0 before any answer
    pub fn last_activity(&self) -> i64 {
        self.answers.last().map(|a| a.timestamp).unwrap_or(0)
    }
}
