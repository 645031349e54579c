use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_P_MASTERY: f64 = 0.001;
pub const MAX_P_MASTERY: f64 = 0.999;
pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryStatus {
    NotStarted,
    Learning,
    Mastered,
}

/// Amount of support given to the learner. The number grows with support:
/// 1 is independent practice, 4 is full worked examples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ScaffoldLevel {
    Independent = 1,
    Hints = 2,
    #[default]
    Guided = 3,
    WorkedExamples = 4,
}

impl ScaffoldLevel {
    pub fn value(&self) -> u8 {
        *self as u8
    }

    pub fn from_value(value: u8) -> Self {
        match value {
            0 | 1 => Self::Independent,
            2 => Self::Hints,
            3 => Self::Guided,
            _ => Self::WorkedExamples,
        }
    }

    pub fn more_support(&self) -> Self {
        Self::from_value(self.value() + 1)
    }

    pub fn less_support(&self) -> Self {
        Self::from_value(self.value().saturating_sub(1))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Independent => "independent",
            Self::Hints => "hints",
            Self::Guided => "guided",
            Self::WorkedExamples => "worked_examples",
        }
    }
}

impl TryFrom<u8> for ScaffoldLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=4).contains(&value) {
            Ok(Self::from_value(value))
        } else {
            Err(format!("scaffold level must be within 1..=4, got {value}"))
        }
    }
}

impl From<ScaffoldLevel> for u8 {
    fn from(level: ScaffoldLevel) -> Self {
        level.value()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeAttempt {
    pub is_correct: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(default)]
    pub hints_used: u32,
}

impl PracticeAttempt {
    pub fn new(is_correct: bool, timestamp: DateTime<Utc>) -> Self {
        Self {
            is_correct,
            timestamp,
            skill_id: None,
            response_time_ms: None,
            hints_used: 0,
        }
    }

    pub fn for_skill(mut self, skill_id: impl Into<String>) -> Self {
        self.skill_id = Some(skill_id.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerSkillState {
    pub learner_id: String,
    pub skill_id: String,
    pub p_mastery: f64,
    pub scaffold_level: ScaffoldLevel,
    pub ease_factor: f64,
    pub consecutive_correct: u32,
    #[serde(default)]
    pub consecutive_incorrect: u32,
    pub attempt_count: u32,
    pub correct_count: u32,
    #[serde(default)]
    pub last_practiced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_review_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_retrieval_at: Option<DateTime<Utc>>,
}

impl LearnerSkillState {
    pub fn new(learner_id: &str, skill_id: &str, initial_mastery: f64) -> Self {
        Self {
            learner_id: learner_id.to_string(),
            skill_id: skill_id.to_string(),
            p_mastery: initial_mastery.clamp(MIN_P_MASTERY, MAX_P_MASTERY),
            scaffold_level: ScaffoldLevel::default(),
            ease_factor: DEFAULT_EASE_FACTOR,
            consecutive_correct: 0,
            consecutive_incorrect: 0,
            attempt_count: 0,
            correct_count: 0,
            last_practiced_at: None,
            next_review_at: None,
            last_retrieval_at: None,
        }
    }

    pub fn accuracy(&self) -> Option<f64> {
        if self.attempt_count == 0 {
            None
        } else {
            Some(self.correct_count as f64 / self.attempt_count as f64)
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at.is_some_and(|at| at <= now)
    }
}

/// Per-dimension evidence strength for the inverse learner profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceScores {
    pub knowledge: Option<f64>,
    pub cognitive: Option<f64>,
    pub metacognitive: Option<f64>,
    pub motivational: Option<f64>,
    pub behavioral: Option<f64>,
}

impl ConfidenceScores {
    pub fn is_empty(&self) -> bool {
        self.dimensions().iter().all(|(_, v)| v.is_none())
    }

    pub fn dimensions(&self) -> [(ProfileDimension, Option<f64>); 5] {
        [
            (ProfileDimension::Knowledge, self.knowledge),
            (ProfileDimension::Cognitive, self.cognitive),
            (ProfileDimension::Metacognitive, self.metacognitive),
            (ProfileDimension::Motivational, self.motivational),
            (ProfileDimension::Behavioral, self.behavioral),
        ]
    }

    pub fn get(&self, dimension: ProfileDimension) -> Option<f64> {
        match dimension {
            ProfileDimension::Knowledge => self.knowledge,
            ProfileDimension::Cognitive => self.cognitive,
            ProfileDimension::Metacognitive => self.metacognitive,
            ProfileDimension::Motivational => self.motivational,
            ProfileDimension::Behavioral => self.behavioral,
        }
    }

    pub fn set(&mut self, dimension: ProfileDimension, value: f64) {
        let value = Some(value.clamp(0.0, 1.0));
        match dimension {
            ProfileDimension::Knowledge => self.knowledge = value,
            ProfileDimension::Cognitive => self.cognitive = value,
            ProfileDimension::Metacognitive => self.metacognitive = value,
            ProfileDimension::Motivational => self.motivational = value,
            ProfileDimension::Behavioral => self.behavioral = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileDimension {
    Knowledge,
    Cognitive,
    Metacognitive,
    Motivational,
    Behavioral,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InverseProfile {
    pub learner_id: String,
    #[serde(default)]
    pub confidence_scores: ConfidenceScores,
    #[serde(default)]
    pub monitor_overconfidence: bool,
    #[serde(default)]
    pub monitor_underconfidence: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TutorError {
    #[error("insufficient data: need at least {required} attempts, got {actual}")]
    InsufficientData { required: usize, actual: usize },
    #[error("fitted parameters are not identifiable: {0}")]
    NotIdentifiable(String),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("storage error: {0}")]
    Storage(String),
}

pub(crate) fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
