pub mod assessment;
pub mod config;
pub mod difficulties;
pub mod engine;
pub mod exploration;
pub mod mastery;
pub mod persistence;
pub mod recommend;
pub mod socratic;
pub(crate) mod text;
pub mod types;

pub use config::TutorConfig;
pub use engine::TutorEngine;
pub use persistence::{MemoryStore, TutorStore};
pub use types::*;
