use serde::{Deserialize, Serialize};

pub mod answer;
pub mod quiz;
pub mod session;

pub use answer::{AnswerOutcome, SubmitAnswerRequest};
pub use quiz::{
    validate_batch, BloomLevel, QuizOption, QuizQuestion, QuizValidationError, SourceTimeRange,
};
pub use session::{QuizAttemptRecord, QuizSessionState, TopicMastery, TopicMasteryEntry};

/// Option as shown to the learner, without the answer key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionView {
    pub id: String,
    pub text: String,
}

/// Question as shown to the learner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    pub question_text: String,
    pub options: Vec<OptionView>,
    pub bloom_level: BloomLevel,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_time_range: Option<SourceTimeRange>,
}

impl From<&QuizQuestion> for QuestionView {
    fn from(question: &QuizQuestion) -> Self {
        QuestionView {
            id: question.id.clone(),
            question_text: question.question_text.clone(),
            options: question
                .options
                .iter()
                .map(|o| OptionView {
                    id: o.id.clone(),
                    text: o.text.clone(),
                })
                .collect(),
            bloom_level: question.bloom_level,
            topic: question.topic.clone(),
            source_time_range: question.source_time_range.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub video_id: String,
    pub current_bloom: BloomLevel,
    pub bloom_label: String,
    pub current_index: usize,
    pub current_question: Option<QuestionView>,
    pub answered: usize,
    pub streak: u32,
    pub best_streak: u32,
}

impl From<&QuizSessionState> for SessionView {
    fn from(state: &QuizSessionState) -> Self {
        SessionView {
            video_id: state.video_id.clone(),
            current_bloom: state.current_bloom,
            bloom_label: state.current_bloom.label().to_string(),
            current_index: state.current_index,
            current_question: state.current_question().map(QuestionView::from),
            answered: state.answers.len(),
            streak: state.streak,
            best_streak: state.best_streak,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSummary {
    pub topic: String,
    pub correct: u32,
    pub total: u32,
    pub bloom_level: BloomLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub video_id: String,
    pub current_bloom: BloomLevel,
    pub bloom_label: String,
    pub answered: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub streak: u32,
    pub best_streak: u32,
    pub topics: Vec<TopicSummary>,
}

impl From<&QuizSessionState> for SessionSummary {
    fn from(state: &QuizSessionState) -> Self {
        let answered = state.answers.len();
        let correct = state.correct_count();
        let accuracy = if answered == 0 {
            0.0
        } else {
            (correct as f64 / answered as f64) * 100.0
        };

        SessionSummary {
            video_id: state.video_id.clone(),
            current_bloom: state.current_bloom,
            bloom_label: state.current_bloom.label().to_string(),
            answered,
            correct,
            accuracy,
            streak: state.streak,
            best_streak: state.best_streak,
            topics: state
                .topic_mastery
                .iter()
                .map(|(topic, entry)| TopicSummary {
                    topic: topic.clone(),
                    correct: entry.correct,
                    total: entry.total,
                    bloom_level: entry.bloom_level,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::quiz::fixtures::question;
    use super::*;

    #[test]
    fn question_view_hides_answer_key() {
        let q = question("q1", "api", BloomLevel::Recall);
        let json = serde_json::to_value(QuestionView::from(&q)).unwrap();

        assert!(json.get("correctAnswer").is_none());
        assert!(json.get("explanation").is_none());
        assert!(json["options"][0].get("isCorrect").is_none());
        assert_eq!(json["options"].as_array().map(Vec::len), Some(4));
    }

    #[test]
    fn summary_reports_accuracy_percentage() {
        let mut state = QuizSessionState::new("v1");
        let q = question("q1", "api", BloomLevel::Recall);
        state
            .answers
            .push(QuizAttemptRecord::new(&q, "q1-b", true));
        state
            .answers
            .push(QuizAttemptRecord::new(&q, "q1-a", false));

        let summary = SessionSummary::from(&state);
        assert_eq!(summary.answered, 2);
        assert_eq!(summary.correct, 1);
        assert!((summary.accuracy - 50.0).abs() < f64::EPSILON);
    }
}
