pub mod categorize;
pub mod consolidation;
pub mod session;
pub mod signals;

pub use categorize::{categorize_attempt, creativity_score};
pub use consolidation::{generate_consolidation, AttemptReview, Consolidation};
pub use session::{
    end_exploration_early, record_attempt, start_exploration, summarize_exploration,
    tick_exploration, AttemptCategory, ExplorationAttempt, ExplorationError, ExplorationSession,
    ExplorationStatus, ExplorationSummary, Problem,
};
pub use signals::{
    calculate_productive_struggle_score, detect_frustration_level, elapsed_minutes,
    get_scaffolding_level, support_message, ScaffoldingDecision, SupportLevel,
};
