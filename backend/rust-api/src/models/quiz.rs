use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// Cognitive difficulty tier used to parameterize question generation.
///
/// Serialized as the integers `1..=4`; anything else fails to deserialize.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum BloomLevel {
    #[default]
    Recall = 1,
    Comprehension = 2,
    Application = 3,
    Analysis = 4,
}

impl BloomLevel {
    pub const MIN: BloomLevel = BloomLevel::Recall;
    pub const MAX: BloomLevel = BloomLevel::Analysis;

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            BloomLevel::Recall => "recall",
            BloomLevel::Comprehension => "comprehension",
            BloomLevel::Application => "application",
            BloomLevel::Analysis => "analysis",
        }
    }

    /// One tier harder, saturating at `Analysis`
    pub fn raised(self) -> BloomLevel {
        BloomLevel::try_from(self.as_u8() + 1).unwrap_or(BloomLevel::MAX)
    }

    /// One tier easier, saturating at `Recall`
    pub fn lowered(self) -> BloomLevel {
        BloomLevel::try_from(self.as_u8().saturating_sub(1)).unwrap_or(BloomLevel::MIN)
    }
}

impl TryFrom<u8> for BloomLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(BloomLevel::Recall),
            2 => Ok(BloomLevel::Comprehension),
            3 => Ok(BloomLevel::Application),
            4 => Ok(BloomLevel::Analysis),
            _ => Err(format!("Invalid bloom level: {} (expected 1-4)", value)),
        }
    }
}

impl From<BloomLevel> for u8 {
    fn from(level: BloomLevel) -> Self {
        level.as_u8()
    }
}

impl fmt::Display for BloomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_u8(), self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOption {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
}

/// Segment of the source video a question was generated from, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTimeRange {
    pub start: f64,
    pub end: f64,
}

/// Multiple-choice question as delivered by the question generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_answer_key"))]
pub struct QuizQuestion {
    #[validate(length(min = 1, message = "Question id must not be empty"))]
    pub id: String,

    #[validate(length(min = 1, message = "Question text must not be empty"))]
    pub question_text: String,

    #[validate(length(equal = 4, message = "Question must have exactly 4 options"))]
    pub options: Vec<QuizOption>,

    /// Id of the single option with `is_correct = true`
    pub correct_answer: String,

    #[serde(default)]
    pub explanation: String,

    pub bloom_level: BloomLevel,

    #[validate(length(min = 1, message = "Topic must not be empty"))]
    pub topic: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_time_range: Option<SourceTimeRange>,
}

impl QuizQuestion {
    pub fn is_correct_answer(&self, answer: &str) -> bool {
        self.correct_answer == answer.trim()
    }
}

fn validate_answer_key(question: &QuizQuestion) -> Result<(), ValidationError> {
    let correct: Vec<&QuizOption> = question.options.iter().filter(|o| o.is_correct).collect();

    if correct.len() != 1 {
        let mut err = ValidationError::new("single_correct_option");
        err.message = Some(
            format!(
                "Expected exactly one correct option, found {}",
                correct.len()
            )
            .into(),
        );
        return Err(err);
    }

    if correct[0].id != question.correct_answer {
        let mut err = ValidationError::new("answer_key_mismatch");
        err.message = Some(
            format!(
                "correctAnswer '{}' does not match correct option '{}'",
                question.correct_answer, correct[0].id
            )
            .into(),
        );
        return Err(err);
    }

    let unique: HashSet<&str> = question.options.iter().map(|o| o.id.as_str()).collect();
    if unique.len() != question.options.len() {
        return Err(ValidationError::new("duplicate_option_id"));
    }

    Ok(())
}

/// Rejection of a question batch before it can enter session state
#[derive(Error, Debug)]
pub enum QuizValidationError {
    #[error("Question {question_id} rejected: {source}")]
    InvalidQuestion {
        question_id: String,
        #[source]
        source: ValidationErrors,
    },

    #[error("Question {0} appears more than once")]
    DuplicateQuestion(String),
}

/// Checks every question of a batch; the batch is accepted or rejected as a whole.
///
/// `known_ids` holds ids already present in the session so a generator that
/// ignores `excludeIds` cannot smuggle a repeat in.
pub fn validate_batch(
    questions: &[QuizQuestion],
    known_ids: &HashSet<&str>,
) -> Result<(), QuizValidationError> {
    let mut seen: HashSet<&str> = HashSet::new();

    for question in questions {
        question
            .validate()
            .map_err(|source| QuizValidationError::InvalidQuestion {
                question_id: question.id.clone(),
                source,
            })?;

        if known_ids.contains(question.id.as_str()) || !seen.insert(question.id.as_str()) {
            return Err(QuizValidationError::DuplicateQuestion(question.id.clone()));
        }
    }

    Ok(())
}
