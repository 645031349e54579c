use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::analysis::{classify_understanding, detect_discovery_moment, UnderstandingLevel};
use super::templates::fallback_question;
use crate::tutor::config::SocraticConfig;
use crate::tutor::types::{clamp01, TutorError};

const BASE_PATH: [QuestionType; 6] = [
    QuestionType::Clarifying,
    QuestionType::Probing,
    QuestionType::Scaffolding,
    QuestionType::Challenging,
    QuestionType::Reflection,
    QuestionType::Metacognitive,
];

const MISCONCEPTION_PATH: [QuestionType; 6] = [
    QuestionType::Clarifying,
    QuestionType::Probing,
    QuestionType::Challenging,
    QuestionType::Scaffolding,
    QuestionType::Reflection,
    QuestionType::Metacognitive,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Clarifying,
    Probing,
    Scaffolding,
    Challenging,
    Reflection,
    Metacognitive,
}

impl QuestionType {
    pub const ALL: [QuestionType; 6] = BASE_PATH;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clarifying => "clarifying",
            Self::Probing => "probing",
            Self::Scaffolding => "scaffolding",
            Self::Challenging => "challenging",
            Self::Reflection => "reflection",
            Self::Metacognitive => "metacognitive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueStatus {
    Active,
    Completed,
    EndedEarly,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DialogueError {
    #[error("dialogue {id} is no longer active ({status:?})")]
    NotActive { id: String, status: DialogueStatus },
    #[error("dialogue {0} has no remaining questions")]
    PathExhausted(String),
}

impl From<DialogueError> for TutorError {
    fn from(err: DialogueError) -> Self {
        TutorError::InvalidTransition(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocraticExchange {
    pub question_type: QuestionType,
    pub question: String,
    pub response: String,
    pub detected_understanding: UnderstandingLevel,
    pub led_to_discovery: bool,
    pub discovery_confidence: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueState {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learner_id: Option<String>,
    pub skill_id: String,
    pub target_concept: String,
    pub exchanges: Vec<SocraticExchange>,
    pub current_understanding: UnderstandingLevel,
    pub discovery_made: bool,
    pub dialogue_path: Vec<QuestionType>,
    pub current_path_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub misconception: Option<String>,
    #[serde(default)]
    pub concept_terms: Vec<String>,
    pub max_path_length: usize,
    pub status: DialogueStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_question: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl DialogueState {
    pub fn current_question_type(&self) -> Option<QuestionType> {
        if self.status != DialogueStatus::Active {
            return None;
        }
        self.dialogue_path.get(self.current_path_index).copied()
    }

    pub fn is_active(&self) -> bool {
        self.status == DialogueStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialoguePlan {
    #[serde(default)]
    pub learner_id: Option<String>,
    pub skill_id: String,
    pub target_concept: String,
    #[serde(default)]
    pub misconception: Option<String>,
    #[serde(default)]
    pub concept_terms: Vec<String>,
    #[serde(default)]
    pub max_path_length: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerResponse {
    pub text: String,
    #[serde(default)]
    pub understanding: Option<UnderstandingLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueTurn {
    pub state: DialogueState,
    pub exchange: SocraticExchange,
    pub next_question_type: Option<QuestionType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueSummary {
    pub dialogue_id: String,
    pub skill_id: String,
    pub target_concept: String,
    pub status: DialogueStatus,
    pub exchange_count: usize,
    pub discovery_made: bool,
    pub discovery_count: usize,
    pub self_discovery_rate: f64,
    pub final_understanding: UnderstandingLevel,
    pub misconception_resolved: bool,
    pub effectiveness: f64,
    pub path_taken: Vec<QuestionType>,
}

pub fn plan_dialogue_path(has_misconception: bool) -> Vec<QuestionType> {
    if has_misconception {
        MISCONCEPTION_PATH.to_vec()
    } else {
        BASE_PATH.to_vec()
    }
}

pub fn plan_dialogue(plan: DialoguePlan, config: &SocraticConfig, now: DateTime<Utc>) -> DialogueState {
    let misconception = plan
        .misconception
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());
    let max_path_length = plan
        .max_path_length
        .unwrap_or(config.max_path_length)
        .max(1);

    let mut dialogue_path = plan_dialogue_path(misconception.is_some());
    dialogue_path.truncate(max_path_length);

    let current_question = dialogue_path
        .first()
        .map(|ty| fallback_question(*ty, &plan.target_concept));

    DialogueState {
        id: Uuid::new_v4().to_string(),
        learner_id: plan.learner_id,
        skill_id: plan.skill_id,
        target_concept: plan.target_concept,
        exchanges: Vec::new(),
        current_understanding: UnderstandingLevel::None,
        discovery_made: false,
        dialogue_path,
        current_path_index: 0,
        misconception,
        concept_terms: plan.concept_terms,
        max_path_length,
        status: DialogueStatus::Active,
        current_question,
        started_at: now,
        ended_at: None,
    }
}

/// Reshapes the remaining path after the current step and moves past it.
pub fn adapt_dialogue_path(state: &mut DialogueState, level: UnderstandingLevel, discovery: bool) {
    let idx = state.current_path_index;
    let current = state.dialogue_path.get(idx).copied();

    if discovery {
        state.dialogue_path.truncate(idx + 1);
        let tail: &[QuestionType] = match current {
            Some(QuestionType::Metacognitive) => &[],
            Some(QuestionType::Reflection) => &[QuestionType::Metacognitive],
            _ => &[QuestionType::Reflection, QuestionType::Metacognitive],
        };
        state.dialogue_path.extend_from_slice(tail);
    } else if level.is_solid() {
        let mut kept: Vec<QuestionType> = state.dialogue_path[..(idx + 1).min(state.dialogue_path.len())].to_vec();
        kept.extend(
            state
                .dialogue_path
                .iter()
                .skip(idx + 1)
                .filter(|ty| **ty != QuestionType::Scaffolding),
        );
        state.dialogue_path = kept;
    } else if level == UnderstandingLevel::Misconception
        && state.dialogue_path.len() + 2 <= state.max_path_length
    {
        let at = (idx + 1).min(state.dialogue_path.len());
        state.dialogue_path.insert(at, QuestionType::Challenging);
        state.dialogue_path.insert(at, QuestionType::Probing);
    }

    state.dialogue_path.truncate(state.max_path_length);
    state.current_path_index = (idx + 1).min(state.dialogue_path.len());
}

/// Records the learner's answer to the current question and moves the
/// dialogue forward. The input state is never modified.
pub fn advance_dialogue(
    state: &DialogueState,
    response: LearnerResponse,
    config: &SocraticConfig,
    now: DateTime<Utc>,
) -> Result<DialogueTurn, DialogueError> {
    if state.status != DialogueStatus::Active {
        return Err(DialogueError::NotActive {
            id: state.id.clone(),
            status: state.status,
        });
    }
    let question_type = state
        .dialogue_path
        .get(state.current_path_index)
        .copied()
        .ok_or_else(|| DialogueError::PathExhausted(state.id.clone()))?;

    let level = response.understanding.unwrap_or_else(|| {
        classify_understanding(&response.text, &state.concept_terms, state.misconception.as_deref())
    });
    let moment = detect_discovery_moment(&response.text, config.discovery_threshold);

    let exchange = SocraticExchange {
        question_type,
        question: state
            .current_question
            .clone()
            .unwrap_or_else(|| fallback_question(question_type, &state.target_concept)),
        response: response.text,
        detected_understanding: level,
        led_to_discovery: moment.is_discovery,
        discovery_confidence: moment.confidence,
        timestamp: now,
    };

    let mut next = state.clone();
    next.exchanges.push(exchange.clone());
    next.current_understanding = level;
    next.discovery_made |= moment.is_discovery;
    adapt_dialogue_path(&mut next, level, moment.is_discovery);

    let next_question_type = next.dialogue_path.get(next.current_path_index).copied();
    match next_question_type {
        Some(ty) => next.current_question = Some(fallback_question(ty, &next.target_concept)),
        None => {
            next.status = DialogueStatus::Completed;
            next.current_question = None;
            next.ended_at = Some(now);
        }
    }

    tracing::debug!(
        dialogue_id = %next.id,
        question_type = question_type.as_str(),
        understanding = ?level,
        discovery = moment.is_discovery,
        "dialogue advanced"
    );

    Ok(DialogueTurn {
        state: next,
        exchange,
        next_question_type,
    })
}

fn had_misconception(state: &DialogueState) -> bool {
    state.misconception.is_some()
        || state
            .exchanges
            .iter()
            .any(|e| e.detected_understanding == UnderstandingLevel::Misconception)
}

pub fn dialogue_effectiveness(state: &DialogueState, config: &SocraticConfig) -> f64 {
    let n = state.exchanges.len();
    if n == 0 {
        return 0.0;
    }
    let discoveries = state.exchanges.iter().filter(|e| e.led_to_discovery).count();
    let self_discovery_rate = discoveries as f64 / n as f64;
    let efficiency = (config.expected_exchanges as f64 / n as f64).min(1.0);
    let discovery_bonus = if state.discovery_made { 1.0 } else { 0.0 };
    let resolved = if had_misconception(state) && state.current_understanding.is_solid() {
        1.0
    } else {
        0.0
    };

    clamp01(0.4 * self_discovery_rate + 0.3 * efficiency + 0.2 * discovery_bonus + 0.1 * resolved)
}

pub fn summarize_dialogue(state: &DialogueState, config: &SocraticConfig) -> DialogueSummary {
    let exchange_count = state.exchanges.len();
    let discovery_count = state.exchanges.iter().filter(|e| e.led_to_discovery).count();
    DialogueSummary {
        dialogue_id: state.id.clone(),
        skill_id: state.skill_id.clone(),
        target_concept: state.target_concept.clone(),
        status: state.status,
        exchange_count,
        discovery_made: state.discovery_made,
        discovery_count,
        self_discovery_rate: if exchange_count == 0 {
            0.0
        } else {
            discovery_count as f64 / exchange_count as f64
        },
        final_understanding: state.current_understanding,
        misconception_resolved: had_misconception(state) && state.current_understanding.is_solid(),
        effectiveness: dialogue_effectiveness(state, config),
        path_taken: state.exchanges.iter().map(|e| e.question_type).collect(),
    }
}

/// Stops the dialogue wherever it is. Completed dialogues keep their status.
pub fn end_dialogue_early(
    state: &mut DialogueState,
    config: &SocraticConfig,
    now: DateTime<Utc>,
) -> DialogueSummary {
    if state.status == DialogueStatus::Active {
        state.status = DialogueStatus::EndedEarly;
        state.current_question = None;
        state.ended_at = Some(now);
    }
    summarize_dialogue(state, config)
}
