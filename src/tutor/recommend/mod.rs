pub mod difficulty;
pub mod ranking;
pub mod scaffold;

pub use difficulty::{difficulty_adjustment, DifficultyAdjustment};
pub use ranking::{
    classify_zone, recommend_skills, session_skill_cap, LearnerContext, ProfileIndicators,
    SkillCandidate, SkillRecommendation, Zone,
};
pub use scaffold::{apply_scaffold_decision, next_scaffold_level, ScaffoldChange, ScaffoldDecision};
