use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tutor::config::SchedulerConfig;
use crate::tutor::types::{clamp01, LearnerSkillState};

const CORRECTNESS_WEIGHT: f64 = 0.5;
const SPEED_WEIGHT: f64 = 0.3;
const INDEPENDENCE_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalDecision {
    pub use_retrieval: bool,
    pub reason: String,
}

pub fn should_use_retrieval(
    state: &LearnerSkillState,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> RetrievalDecision {
    if state.p_mastery < config.retrieval_min_mastery {
        return RetrievalDecision {
            use_retrieval: false,
            reason: format!(
                "mastery {:.0}% is below the {:.0}% retrieval floor",
                state.p_mastery * 100.0,
                config.retrieval_min_mastery * 100.0
            ),
        };
    }
    if state.attempt_count < config.retrieval_min_attempts {
        return RetrievalDecision {
            use_retrieval: false,
            reason: format!("only {} attempts so far", state.attempt_count),
        };
    }

    match state.last_retrieval_at {
        None => RetrievalDecision {
            use_retrieval: true,
            reason: "no retrieval test yet for this skill".to_string(),
        },
        Some(last) => {
            let hours = (now - last).num_seconds() as f64 / 3600.0;
            if hours >= config.retrieval_spacing_hours {
                RetrievalDecision {
                    use_retrieval: true,
                    reason: format!("last retrieval test was {hours:.0} hours ago"),
                }
            } else {
                RetrievalDecision {
                    use_retrieval: false,
                    reason: format!("retrieval test already done {hours:.1} hours ago"),
                }
            }
        }
    }
}

/// Strength of a recall: faster, correct, unaided answers score highest.
pub fn retrieval_strength(
    is_correct: bool,
    response_time_ms: Option<u64>,
    hints_used: u32,
    config: &SchedulerConfig,
) -> f64 {
    let max_ms = config.retrieval_max_response_ms.max(1.0);
    let speed = response_time_ms
        .map(|ms| clamp01(1.0 - ms as f64 / max_ms))
        .unwrap_or(0.5);
    let independence = 1.0 / (1.0 + hints_used as f64);

    let (correctness, speed_credit) = if is_correct {
        (1.0, speed)
    } else {
        (0.0, speed * 0.5)
    };

    clamp01(
        CORRECTNESS_WEIGHT * correctness
            + SPEED_WEIGHT * speed_credit
            + INDEPENDENCE_WEIGHT * independence,
    )
}
