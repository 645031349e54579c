pub mod llm_provider;
pub mod prompt_template;
pub mod question_renderer;

pub use llm_provider::{LLMConfig, LLMError, LLMProvider, LanguageModel};
pub use question_renderer::{QuestionRenderer, RenderedText, TextSource};
