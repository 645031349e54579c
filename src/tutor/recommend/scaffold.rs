use serde::{Deserialize, Serialize};

use crate::tutor::config::ScaffoldConfig;
use crate::tutor::types::{LearnerSkillState, ScaffoldLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaffoldChange {
    Unchanged,
    MoreSupport,
    LessSupport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaffoldDecision {
    pub level: ScaffoldLevel,
    pub change: ScaffoldChange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn streak_hit(streak: u32, required: u32) -> bool {
    required > 0 && streak > 0 && streak % required == 0
}

/// Decides the scaffold level after the latest attempt has been applied to
/// `state`. A failure streak adds one level of support; a success streak at
/// mastery-level probability removes one. Each full streak moves one level.
pub fn next_scaffold_level(state: &LearnerSkillState, config: &ScaffoldConfig) -> ScaffoldDecision {
    let current = state.scaffold_level;

    if streak_hit(state.consecutive_incorrect, config.failure_streak)
        && current != ScaffoldLevel::WorkedExamples
    {
        return ScaffoldDecision {
            level: current.more_support(),
            change: ScaffoldChange::MoreSupport,
            reason: Some(format!(
                "{} incorrect answers in a row",
                state.consecutive_incorrect
            )),
        };
    }

    if streak_hit(state.consecutive_correct, config.success_streak)
        && state.p_mastery >= config.independence_mastery
        && current != ScaffoldLevel::Independent
    {
        return ScaffoldDecision {
            level: current.less_support(),
            change: ScaffoldChange::LessSupport,
            reason: Some(format!(
                "{} correct answers in a row at {:.0}% mastery",
                state.consecutive_correct,
                state.p_mastery * 100.0
            )),
        };
    }

    ScaffoldDecision {
        level: current,
        change: ScaffoldChange::Unchanged,
        reason: None,
    }
}

pub fn apply_scaffold_decision(
    state: &LearnerSkillState,
    decision: &ScaffoldDecision,
) -> LearnerSkillState {
    let mut next = state.clone();
    next.scaffold_level = decision.level;
    next
}
