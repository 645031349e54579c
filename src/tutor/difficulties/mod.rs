pub mod effectiveness;
pub mod interleaving;
pub mod retrieval;
pub mod variation;

pub use effectiveness::{track_effectiveness, EffectivenessReport};
pub use interleaving::{interleave, InterleavingPlan, SkillBlock};
pub use retrieval::{retrieval_strength, should_use_retrieval, RetrievalDecision};
pub use variation::{select_variation, VariationType};
