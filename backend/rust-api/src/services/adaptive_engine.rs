//! Difficulty progression across bloom levels.
//!
//! Each topic tested at the current level with enough attempts casts one
//! vote (advance or regress); a qualified majority of votes moves the level
//! one step. Everything else leaves the level alone.

use serde::{Deserialize, Serialize};

use crate::models::{BloomLevel, TopicMastery};

/// Policy constants for [`compute_next_level`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Share of votes that must be "advance" to move up
    pub advance_ratio: f64,
    /// Share of votes that must be "regress" to move down
    pub regress_ratio: f64,
    /// Attempts a topic needs before it may vote
    pub min_attempts: u32,
    /// A topic with at least this many correct answers votes advance
    pub advance_min_correct: u32,
    /// A topic with at most this many correct answers votes regress
    pub regress_max_correct: u32,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            advance_ratio: 0.6,
            regress_ratio: 0.6,
            min_attempts: 3,
            advance_min_correct: 2,
            regress_max_correct: 1,
        }
    }
}

impl AdaptiveConfig {
    pub fn validate(&self) -> Result<(), String> {
        for (name, ratio) in [
            ("advance_ratio", self.advance_ratio),
            ("regress_ratio", self.regress_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(format!("{} must be in (0, 1], got {}", name, ratio));
            }
        }

        if self.min_attempts == 0 {
            return Err("min_attempts must be at least 1".to_string());
        }

        if self.regress_max_correct >= self.advance_min_correct {
            return Err(format!(
                "regress_max_correct ({}) must be below advance_min_correct ({})",
                self.regress_max_correct, self.advance_min_correct
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDecision {
    pub next_level: BloomLevel,
    /// True only when the level went up
    pub should_advance: bool,
}

impl LevelDecision {
    fn stay(level: BloomLevel) -> Self {
        Self {
            next_level: level,
            should_advance: false,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Tally {
    advance: u32,
    regress: u32,
}

impl Tally {
    fn total(&self) -> u32 {
        self.advance + self.regress
    }
}

fn tally_votes(mastery: &TopicMastery, current: BloomLevel, config: &AdaptiveConfig) -> Tally {
    let mut tally = Tally::default();

    for entry in mastery.values() {
        // correct > total can only come from a hand-edited record
        if entry.bloom_level != current
            || entry.total < config.min_attempts
            || entry.correct > entry.total
        {
            continue;
        }

        if entry.correct >= config.advance_min_correct {
            tally.advance += 1;
        } else if entry.correct <= config.regress_max_correct {
            tally.regress += 1;
        }
    }

    tally
}

/// Decides the level for the next questions. Pure; never fails.
pub fn compute_next_level(
    mastery: &TopicMastery,
    current: BloomLevel,
    config: &AdaptiveConfig,
) -> LevelDecision {
    if mastery.is_empty() {
        return LevelDecision::stay(current);
    }

    let tally = tally_votes(mastery, current, config);
    let votes = tally.total();
    if votes == 0 {
        return LevelDecision::stay(current);
    }

    let advance_ratio = f64::from(tally.advance) / f64::from(votes);
    let regress_ratio = f64::from(tally.regress) / f64::from(votes);

    if advance_ratio >= config.advance_ratio && current < BloomLevel::MAX {
        LevelDecision {
            next_level: current.raised(),
            should_advance: true,
        }
    } else if regress_ratio >= config.regress_ratio && current > BloomLevel::MIN {
        LevelDecision {
            next_level: current.lowered(),
            should_advance: false,
        }
    } else {
        LevelDecision::stay(current)
    }
}
