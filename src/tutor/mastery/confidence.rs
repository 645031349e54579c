use serde::{Deserialize, Serialize};

use super::bkt::mastery_status;
use crate::tutor::types::{LearnerSkillState, MasteryStatus};

pub const DEFAULT_Z: f64 = 1.96;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryEstimate {
    pub skill_id: String,
    pub p_mastery: f64,
    pub status: MasteryStatus,
    pub lower: f64,
    pub upper: f64,
    pub attempt_count: u32,
}

impl MasteryEstimate {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Wilson score half-width for `successes / n` at the given z.
pub fn wilson_half_width(successes: u32, n: u32, z: f64) -> f64 {
    if n == 0 {
        return 0.5;
    }
    let n = n as f64;
    let p_hat = (successes as f64 / n).clamp(0.0, 1.0);
    let z2 = z * z;
    let denom = 1.0 + z2 / n;
    (z * (p_hat * (1.0 - p_hat) / n + z2 / (4.0 * n * n)).sqrt()) / denom
}

/// Current mastery with an interval whose width follows the Wilson bound on
/// the attempt proportion, so it narrows as evidence accumulates.
pub fn get_mastery_with_confidence(
    state: &LearnerSkillState,
    mastery_threshold: f64,
    z: f64,
) -> MasteryEstimate {
    let status = mastery_status(state, mastery_threshold);
    let (lower, upper) = if state.attempt_count == 0 {
        (0.0, 1.0)
    } else {
        let half = wilson_half_width(state.correct_count, state.attempt_count, z.abs());
        (
            (state.p_mastery - half).max(0.0),
            (state.p_mastery + half).min(1.0),
        )
    };

    MasteryEstimate {
        skill_id: state.skill_id.clone(),
        p_mastery: state.p_mastery,
        status,
        lower,
        upper,
        attempt_count: state.attempt_count,
    }
}
