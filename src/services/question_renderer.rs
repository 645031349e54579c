use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::services::llm_provider::{LLMError, LanguageModel};
use crate::services::prompt_template::{self, Slot};
use crate::tutor::config::LlmRenderConfig;
use crate::tutor::exploration::{ExplorationSession, ScaffoldingDecision};
use crate::tutor::socratic::{fallback_question, question_intent, DialogueState, QuestionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedText {
    pub text: String,
    pub source: TextSource,
}

impl RenderedText {
    fn fallback(text: String) -> Self {
        Self {
            text,
            source: TextSource::Fallback,
        }
    }
}

/// Phrases tutor output through a language model, falling back to the
/// deterministic templates on error, timeout or when disabled.
pub struct QuestionRenderer<M> {
    model: M,
    config: LlmRenderConfig,
}

impl<M: LanguageModel> QuestionRenderer<M> {
    pub fn new(model: M, config: LlmRenderConfig) -> Self {
        Self { model, config }
    }

    pub async fn socratic_question(
        &self,
        state: &DialogueState,
        question_type: QuestionType,
    ) -> RenderedText {
        let fallback = fallback_question(question_type, &state.target_concept);
        let last_response = state
            .exchanges
            .last()
            .map(|e| e.response.as_str())
            .unwrap_or_default();
        let user = prompt_template::render(
            prompt_template::SOCRATIC_USER,
            &[
                (Slot::Concept, state.target_concept.as_str()),
                (Slot::QuestionType, question_type.as_str()),
                (Slot::Intent, question_intent(question_type)),
                (Slot::LearnerResponse, last_response),
                (Slot::Misconception, state.misconception.as_deref().unwrap_or_default()),
            ],
        );
        self.generate(prompt_template::SOCRATIC_SYSTEM, &user, fallback).await
    }

    pub async fn exploration_message(
        &self,
        session: &ExplorationSession,
        decision: &ScaffoldingDecision,
    ) -> RenderedText {
        let latest = session
            .attempts
            .last()
            .map(|a| a.approach.as_str())
            .unwrap_or_default();
        let user = prompt_template::render(
            prompt_template::EXPLORATION_USER,
            &[
                (Slot::ProblemTitle, session.problem.title.as_str()),
                (Slot::Concept, session.problem.concept.as_str()),
                (Slot::Support, decision.message.as_str()),
                (Slot::LearnerResponse, latest),
            ],
        );
        self.generate(prompt_template::EXPLORATION_SYSTEM, &user, decision.message.clone())
            .await
    }

    async fn generate(&self, system: &str, user: &str, fallback: String) -> RenderedText {
        if !self.config.enabled {
            return RenderedText::fallback(fallback);
        }

        let limit = Duration::from_millis(self.config.timeout_ms);
        let result = match tokio::time::timeout(limit, self.model.complete(system, user)).await {
            Ok(result) => result,
            Err(_) => Err(LLMError::Timeout(self.config.timeout_ms)),
        };

        match result {
            Ok(text) if !text.trim().is_empty() => RenderedText {
                text: text.trim().to_string(),
                source: TextSource::Model,
            },
            Ok(_) => {
                warn!("language model returned empty text, using fallback");
                RenderedText::fallback(fallback)
            }
            Err(err) => {
                warn!(error = %err, "language model unavailable, using fallback");
                RenderedText::fallback(fallback)
            }
        }
    }
}
