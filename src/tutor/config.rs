use serde::{Deserialize, Serialize};

use crate::tutor::mastery::BktParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BktConfig {
    pub default_params: BktParams,
    pub mastery_threshold: f64,
    pub min_fit_attempts: usize,
    pub max_refine_iterations: usize,
    pub refine_tolerance: f64,
    pub max_review_interval_days: f64,
}

impl Default for BktConfig {
    fn default() -> Self {
        Self {
            default_params: BktParams::default(),
            mastery_threshold: 0.8,
            min_fit_attempts: 5,
            max_refine_iterations: 200,
            refine_tolerance: 1e-3,
            max_review_interval_days: 180.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaffoldConfig {
    pub failure_streak: u32,
    pub success_streak: u32,
    pub independence_mastery: f64,
    pub target_accuracy_low: f64,
    pub target_accuracy_high: f64,
    pub max_difficulty_delta: f64,
    pub long_session_minutes: f64,
    pub long_session_penalty: f64,
    pub max_skills_per_session: usize,
    pub min_prerequisite_readiness: f64,
    pub gap_weight: f64,
    pub recency_weight: f64,
    pub readiness_weight: f64,
}

impl Default for ScaffoldConfig {
    fn default() -> Self {
        Self {
            failure_streak: 3,
            success_streak: 3,
            independence_mastery: 0.8,
            target_accuracy_low: 0.6,
            target_accuracy_high: 0.85,
            max_difficulty_delta: 0.2,
            long_session_minutes: 45.0,
            long_session_penalty: 0.05,
            max_skills_per_session: 3,
            min_prerequisite_readiness: 0.5,
            gap_weight: 0.4,
            recency_weight: 0.3,
            readiness_weight: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub retention_boost_per_switch: f64,
    pub max_retention_boost: f64,
    pub retrieval_min_mastery: f64,
    pub retrieval_min_attempts: u32,
    pub retrieval_spacing_hours: f64,
    pub retrieval_max_response_ms: f64,
    pub retention_stability_days: f64,
    pub effective_effect_size: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retention_boost_per_switch: 0.025,
            max_retention_boost: 0.4,
            retrieval_min_mastery: 0.6,
            retrieval_min_attempts: 3,
            retrieval_spacing_hours: 24.0,
            retrieval_max_response_ms: 30_000.0,
            retention_stability_days: 7.0,
            effective_effect_size: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocraticConfig {
    pub discovery_threshold: f64,
    pub expected_exchanges: usize,
    pub max_path_length: usize,
}

impl Default for SocraticConfig {
    fn default() -> Self {
        Self {
            discovery_threshold: 0.3,
            expected_exchanges: 8,
            max_path_length: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationConfig {
    pub default_max_attempts: usize,
    pub default_frustration_threshold_minutes: f64,
    pub consolidate_frustration: f64,
    pub hint_frustration: f64,
    pub guided_question_minutes: f64,
    pub rapid_attempt_ms: u64,
    /// Attempts reporting a longer duration are rejected.
    pub max_attempt_duration_ms: u64,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            default_max_attempts: 5,
            default_frustration_threshold_minutes: 10.0,
            consolidate_frustration: 0.8,
            hint_frustration: 0.4,
            guided_question_minutes: 5.0,
            rapid_attempt_ms: 30_000,
            max_attempt_duration_ms: 4 * 60 * 60 * 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentConfig {
    pub min_minutes_between: f64,
    pub min_interactions_between: u32,
    pub max_questions: usize,
    pub sufficient_confidence: f64,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            min_minutes_between: 10.0,
            min_interactions_between: 5,
            max_questions: 3,
            sufficient_confidence: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRenderConfig {
    pub enabled: bool,
    pub timeout_ms: u64,
}

impl Default for LlmRenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TutorConfig {
    pub bkt: BktConfig,
    pub scaffold: ScaffoldConfig,
    pub scheduler: SchedulerConfig,
    pub socratic: SocraticConfig,
    pub exploration: ExplorationConfig,
    pub assessment: AssessmentConfig,
    pub llm: LlmRenderConfig,
}
