pub mod analysis;
pub mod dialogue;
pub mod templates;

pub use analysis::{classify_understanding, detect_discovery_moment, DiscoveryMoment, UnderstandingLevel};
pub use dialogue::{
    adapt_dialogue_path, advance_dialogue, dialogue_effectiveness, end_dialogue_early,
    plan_dialogue, plan_dialogue_path, summarize_dialogue, DialogueError, DialoguePlan,
    DialogueState, DialogueStatus, DialogueSummary, DialogueTurn, LearnerResponse, QuestionType,
    SocraticExchange,
};
pub use templates::{fallback_question, question_intent};
