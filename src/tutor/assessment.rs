use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tutor::config::AssessmentConfig;
use crate::tutor::types::{clamp01, InverseProfile, ProfileDimension, TutorError};

/// Confidence added to a profile dimension per piece of assessment evidence.
const EVIDENCE_CONFIDENCE_GAIN: f64 = 0.15;
const SCALE_MIN: u8 = 1;
const SCALE_MAX: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentType {
    ConfidenceCalibration,
    MetacognitiveAwareness,
    KnowledgeProbe,
    HelpSeeking,
    CognitiveLoad,
    Engagement,
}

impl AssessmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfidenceCalibration => "confidence_calibration",
            Self::MetacognitiveAwareness => "metacognitive_awareness",
            Self::KnowledgeProbe => "knowledge_probe",
            Self::HelpSeeking => "help_seeking",
            Self::CognitiveLoad => "cognitive_load",
            Self::Engagement => "engagement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    fn from_confidence(confidence: f64) -> Self {
        if confidence < 0.3 {
            Self::High
        } else if confidence < 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    fn lower(&self) -> Self {
        match self {
            Self::High => Self::Medium,
            Self::Medium | Self::Low => Self::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Scale,
    FreeText,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentQuestion {
    pub id: String,
    pub assessment_type: AssessmentType,
    pub prompt: String,
    pub response_kind: ResponseKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentNeed {
    pub assessment_type: AssessmentType,
    pub priority: Priority,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentContext {
    pub learner_id: String,
    pub minutes_since_last_assessment: f64,
    pub interactions_since_last_assessment: u32,
    #[serde(default)]
    pub profile: Option<InverseProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDecision {
    pub should_trigger: bool,
    pub reason: String,
    pub needs: Vec<AssessmentNeed>,
    pub questions: Vec<AssessmentQuestion>,
}

impl TriggerDecision {
    fn skip(reason: String) -> Self {
        Self {
            should_trigger: false,
            reason,
            needs: Vec::new(),
            questions: Vec::new(),
        }
    }
}

const CALIBRATION_BANK: &[(&str, &str, ResponseKind)] = &[
    ("cc-1", "How sure are you that your last answer was correct? (1 = guessing, 5 = certain)", ResponseKind::Scale),
    ("cc-2", "Before checking, how many of the last five questions do you think you got right? (1-5)", ResponseKind::Scale),
];
const AWARENESS_BANK: &[(&str, &str, ResponseKind)] = &[
    ("ma-1", "What part of this topic feels least clear to you right now?", ResponseKind::FreeText),
    ("ma-2", "How well can you tell when you don't understand something? (1-5)", ResponseKind::Scale),
];
const KNOWLEDGE_BANK: &[(&str, &str, ResponseKind)] = &[
    ("kp-1", "How well could you explain this skill to a friend? (1-5)", ResponseKind::Scale),
    ("kp-2", "Describe the key idea of this topic in one sentence.", ResponseKind::FreeText),
];
const HELP_SEEKING_BANK: &[(&str, &str, ResponseKind)] = &[
    ("hs-1", "When you get stuck, how quickly do you ask for a hint? (1 = never, 5 = right away)", ResponseKind::Scale),
    ("hs-2", "What do you usually try before asking for help?", ResponseKind::FreeText),
];
const COGNITIVE_LOAD_BANK: &[(&str, &str, ResponseKind)] = &[
    ("cl-1", "How much mental effort did the last few problems take? (1-5)", ResponseKind::Scale),
    ("cl-2", "Is there too much to keep track of at once right now? (1 = not at all, 5 = far too much)", ResponseKind::Scale),
];
const ENGAGEMENT_BANK: &[(&str, &str, ResponseKind)] = &[
    ("en-1", "How interesting is this session for you right now? (1-5)", ResponseKind::Scale),
    ("en-2", "What would make practice more enjoyable?", ResponseKind::FreeText),
];

fn bank(assessment_type: AssessmentType) -> &'static [(&'static str, &'static str, ResponseKind)] {
    match assessment_type {
        AssessmentType::ConfidenceCalibration => CALIBRATION_BANK,
        AssessmentType::MetacognitiveAwareness => AWARENESS_BANK,
        AssessmentType::KnowledgeProbe => KNOWLEDGE_BANK,
        AssessmentType::HelpSeeking => HELP_SEEKING_BANK,
        AssessmentType::CognitiveLoad => COGNITIVE_LOAD_BANK,
        AssessmentType::Engagement => ENGAGEMENT_BANK,
    }
}

pub fn find_question(question_id: &str) -> Option<AssessmentQuestion> {
    use AssessmentType::*;
    [
        ConfidenceCalibration,
        MetacognitiveAwareness,
        KnowledgeProbe,
        HelpSeeking,
        CognitiveLoad,
        Engagement,
    ]
    .into_iter()
    .find_map(|ty| {
        bank(ty)
            .iter()
            .find(|(id, _, _)| *id == question_id)
            .map(|entry| to_question(ty, entry))
    })
}

/// Every answer must name a known question of the same assessment type.
pub fn validate_answers(answers: &[AssessmentAnswer]) -> Result<(), TutorError> {
    for answer in answers {
        match find_question(&answer.question_id) {
            Some(q) if q.assessment_type == answer.assessment_type => {}
            Some(q) => {
                return Err(TutorError::InvalidInput(format!(
                    "question {} is a {} question, not {}",
                    answer.question_id,
                    q.assessment_type.as_str(),
                    answer.assessment_type.as_str()
                )))
            }
            None => {
                return Err(TutorError::InvalidInput(format!(
                    "unknown assessment question {}",
                    answer.question_id
                )))
            }
        }
    }
    Ok(())
}

fn to_question(
    assessment_type: AssessmentType,
    (id, prompt, kind): &(&'static str, &'static str, ResponseKind),
) -> AssessmentQuestion {
    AssessmentQuestion {
        id: id.to_string(),
        assessment_type,
        prompt: prompt.to_string(),
        response_kind: *kind,
    }
}

fn needs_for(dimension: ProfileDimension, confidence: f64) -> Vec<AssessmentNeed> {
    let priority = Priority::from_confidence(confidence);
    let reason = format!("{dimension:?} confidence is {confidence:.2}").to_lowercase();
    let need = |assessment_type, priority| AssessmentNeed {
        assessment_type,
        priority,
        reason: reason.clone(),
    };
    match dimension {
        ProfileDimension::Knowledge => vec![need(AssessmentType::KnowledgeProbe, priority)],
        ProfileDimension::Cognitive => vec![need(AssessmentType::CognitiveLoad, priority)],
        ProfileDimension::Metacognitive => vec![
            need(AssessmentType::ConfidenceCalibration, priority),
            need(AssessmentType::MetacognitiveAwareness, priority.lower()),
        ],
        ProfileDimension::Motivational => vec![need(AssessmentType::Engagement, priority)],
        ProfileDimension::Behavioral => vec![need(AssessmentType::HelpSeeking, priority)],
    }
}

/// Takes questions round-robin across needs in priority order.
fn select_questions(needs: &[AssessmentNeed], max_questions: usize) -> Vec<AssessmentQuestion> {
    let mut questions = Vec::new();
    let deepest = needs.iter().map(|n| bank(n.assessment_type).len()).max().unwrap_or(0);
    'rounds: for round in 0..deepest {
        for need in needs {
            if questions.len() >= max_questions {
                break 'rounds;
            }
            if let Some(entry) = bank(need.assessment_type).get(round) {
                questions.push(to_question(need.assessment_type, entry));
            }
        }
    }
    questions
}

pub fn should_trigger_micro_assessment(context: &AssessmentContext, config: &AssessmentConfig) -> TriggerDecision {
    if context.minutes_since_last_assessment < config.min_minutes_between {
        return TriggerDecision::skip(format!(
            "only {:.0} minutes since the last assessment",
            context.minutes_since_last_assessment
        ));
    }
    if context.interactions_since_last_assessment < config.min_interactions_between {
        return TriggerDecision::skip(format!(
            "only {} interactions since the last assessment",
            context.interactions_since_last_assessment
        ));
    }

    let mut needs = match context.profile.as_ref().filter(|p| !p.confidence_scores.is_empty()) {
        None => vec![
            AssessmentNeed {
                assessment_type: AssessmentType::MetacognitiveAwareness,
                priority: Priority::High,
                reason: "no profile data yet".to_string(),
            },
            AssessmentNeed {
                assessment_type: AssessmentType::Engagement,
                priority: Priority::Medium,
                reason: "no profile data yet".to_string(),
            },
        ],
        Some(profile) => profile
            .confidence_scores
            .dimensions()
            .into_iter()
            .filter_map(|(dimension, confidence)| {
                let confidence = confidence.unwrap_or(0.0);
                (confidence < config.sufficient_confidence).then(|| needs_for(dimension, confidence))
            })
            .flatten()
            .collect(),
    };

    if needs.is_empty() {
        return TriggerDecision::skip("profile confidence is sufficient".to_string());
    }
    needs.sort_by_key(|n| n.priority);

    let questions = select_questions(&needs, config.max_questions);
    tracing::debug!(
        learner_id = %context.learner_id,
        needs = needs.len(),
        questions = questions.len(),
        "micro-assessment triggered"
    );

    TriggerDecision {
        should_trigger: true,
        reason: format!("{} profile gaps to probe", needs.len()),
        needs,
        questions,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentAnswer {
    pub question_id: String,
    pub assessment_type: AssessmentType,
    #[serde(default)]
    pub scale: Option<u8>,
    #[serde(default)]
    pub text: Option<String>,
}

impl AssessmentAnswer {
    /// Scale answer mapped onto `[0, 1]`.
    fn normalized(&self) -> Option<f64> {
        self.scale.map(|v| {
            let v = v.clamp(SCALE_MIN, SCALE_MAX);
            (v - SCALE_MIN) as f64 / (SCALE_MAX - SCALE_MIN) as f64
        })
    }

    fn text_depth(&self) -> Option<f64> {
        let words = self.text.as_deref()?.split_whitespace().count();
        Some(match words {
            0 => return None,
            1..=4 => 0.2,
            5..=14 => 0.5,
            _ => 0.8,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ProfileUpdate {
    Calibration { self_rating: f64, overconfident: bool, underconfident: bool },
    Metacognition { awareness: f64 },
    Knowledge { self_assessed_mastery: f64 },
    HelpSeeking { tendency: f64 },
    CognitiveLoad { load: f64 },
    Engagement { level: f64 },
}

impl ProfileUpdate {
    pub fn dimension(&self) -> ProfileDimension {
        match self {
            Self::Calibration { .. } | Self::Metacognition { .. } => ProfileDimension::Metacognitive,
            Self::Knowledge { .. } => ProfileDimension::Knowledge,
            Self::HelpSeeking { .. } => ProfileDimension::Behavioral,
            Self::CognitiveLoad { .. } => ProfileDimension::Cognitive,
            Self::Engagement { .. } => ProfileDimension::Motivational,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentOutcome {
    pub updates: Vec<ProfileUpdate>,
    pub insights: Vec<String>,
}

pub fn process_assessment_results(answers: &[AssessmentAnswer]) -> AssessmentOutcome {
    let mut outcome = AssessmentOutcome::default();

    for answer in answers {
        let scale = answer.normalized();
        let update = match answer.assessment_type {
            AssessmentType::ConfidenceCalibration => scale.map(|rating| {
                let overconfident = answer.scale.is_some_and(|v| v >= 4);
                let underconfident = answer.scale.is_some_and(|v| v <= 2);
                if overconfident {
                    outcome
                        .insights
                        .push("High self-reported confidence: monitor for possible overconfidence".to_string());
                } else if underconfident {
                    outcome
                        .insights
                        .push("Low self-reported confidence: monitor for possible underconfidence".to_string());
                }
                ProfileUpdate::Calibration {
                    self_rating: rating,
                    overconfident,
                    underconfident,
                }
            }),
            AssessmentType::MetacognitiveAwareness => scale.or_else(|| answer.text_depth()).map(|awareness| {
                if awareness < 0.4 {
                    outcome
                        .insights
                        .push("Limited self-monitoring: add reflection prompts".to_string());
                }
                ProfileUpdate::Metacognition { awareness }
            }),
            AssessmentType::KnowledgeProbe => scale
                .or_else(|| answer.text_depth())
                .map(|self_assessed_mastery| ProfileUpdate::Knowledge { self_assessed_mastery }),
            AssessmentType::HelpSeeking => scale.map(|tendency| {
                if tendency >= 0.75 {
                    outcome
                        .insights
                        .push("Asks for help early: encourage a first independent attempt".to_string());
                } else if tendency <= 0.25 {
                    outcome
                        .insights
                        .push("Rarely asks for help: offer hints proactively when stuck".to_string());
                }
                ProfileUpdate::HelpSeeking { tendency }
            }),
            AssessmentType::CognitiveLoad => scale.map(|load| {
                if load >= 0.75 {
                    outcome
                        .insights
                        .push("High cognitive load reported: reduce difficulty or chunk steps".to_string());
                }
                ProfileUpdate::CognitiveLoad { load }
            }),
            AssessmentType::Engagement => scale.or_else(|| answer.text_depth()).map(|level| {
                if level <= 0.25 {
                    outcome
                        .insights
                        .push("Low engagement: vary activity types".to_string());
                }
                ProfileUpdate::Engagement { level }
            }),
        };

        match update {
            Some(update) => outcome.updates.push(update),
            None => tracing::debug!(
                question_id = %answer.question_id,
                "assessment answer carried no usable evidence"
            ),
        }
    }

    outcome
}

/// Folds assessment evidence into the learner profile.
pub fn apply_assessment_outcome(profile: &mut InverseProfile, outcome: &AssessmentOutcome, now: DateTime<Utc>) {
    for update in &outcome.updates {
        let dimension = update.dimension();
        let current = profile.confidence_scores.get(dimension).unwrap_or(0.0);
        profile
            .confidence_scores
            .set(dimension, clamp01(current + EVIDENCE_CONFIDENCE_GAIN));

        if let ProfileUpdate::Calibration {
            overconfident,
            underconfident,
            ..
        } = update
        {
            profile.monitor_overconfidence = *overconfident;
            profile.monitor_underconfidence = *underconfident;
        }
    }
    if !outcome.updates.is_empty() {
        profile.updated_at = Some(now);
    }
}
