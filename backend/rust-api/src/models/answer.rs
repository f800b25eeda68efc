use serde::{Deserialize, Serialize};

use super::quiz::BloomLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub question_id: String,
    /// Id of the chosen option
    pub answer: String,
}

/// Result of one answer submission, returned to the client as-is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub question_id: String,
    pub correct: bool,
    pub correct_answer: String,
    pub explanation: String,
    pub streak: u32,
    pub best_streak: u32,
    pub previous_bloom: BloomLevel,
    pub current_bloom: BloomLevel,
    pub level_changed: bool,
    pub answered: usize,
}
