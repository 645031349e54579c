use serde::{Deserialize, Serialize};

use crate::tutor::config::ScaffoldConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyAdjustment {
    /// Signed change to item difficulty; positive means harder.
    pub delta: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub reasons: Vec<String>,
}

/// Nudges difficulty so that recent accuracy moves back into the target band.
pub fn difficulty_adjustment(
    recent_results: &[bool],
    session_minutes: f64,
    challenge_preference: Option<f64>,
    config: &ScaffoldConfig,
) -> DifficultyAdjustment {
    let mut delta = 0.0;
    let mut reasons = Vec::new();

    let accuracy = if recent_results.is_empty() {
        None
    } else {
        Some(recent_results.iter().filter(|&&c| c).count() as f64 / recent_results.len() as f64)
    };

    if let Some(acc) = accuracy {
        if acc > config.target_accuracy_high {
            delta += acc - config.target_accuracy_high;
            reasons.push(format!(
                "recent accuracy {:.0}% is above the {:.0}% target band, raising difficulty",
                acc * 100.0,
                config.target_accuracy_high * 100.0
            ));
        } else if acc < config.target_accuracy_low {
            delta -= config.target_accuracy_low - acc;
            reasons.push(format!(
                "recent accuracy {:.0}% is below the {:.0}% target band, lowering difficulty",
                acc * 100.0,
                config.target_accuracy_low * 100.0
            ));
        }
    }

    if session_minutes > config.long_session_minutes {
        delta -= config.long_session_penalty;
        reasons.push(format!(
            "session has run {session_minutes:.0} minutes, easing off"
        ));
    }

    if let Some(pref) = challenge_preference {
        let shift = (pref.clamp(0.0, 1.0) - 0.5) * 0.1;
        if shift.abs() > 1e-9 {
            delta += shift;
            reasons.push(if shift > 0.0 {
                "learner prefers a challenge".to_string()
            } else {
                "learner prefers a gentler pace".to_string()
            });
        }
    }

    let bound = config.max_difficulty_delta.abs();
    DifficultyAdjustment {
        delta: delta.clamp(-bound, bound),
        accuracy,
        reasons,
    }
}
