pub mod bkt;
pub mod confidence;
pub mod fitting;
pub mod validation;

pub use bkt::{
    bkt_posterior, bkt_update, clamp_mastery, mastery_status, trace_outcomes, update_mastery,
    BktParams,
};
pub use confidence::{get_mastery_with_confidence, MasteryEstimate};
pub use fitting::{fit_skill_bkt, fit_skills, BktFitResult, FitOutcome, FitQuality};
pub use validation::{
    calculate_validation_metrics, SkillHistory, SkillValidation, ValidationQuality,
    ValidationReport,
};
