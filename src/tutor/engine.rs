use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::{
    AssessmentTriggeredPayload, AttemptRecordedPayload, DialogueEndedPayload,
    DialogueStartedPayload, EventBus, ExplorationConsolidatedPayload, ScaffoldChangedPayload,
    SkillMasteredPayload, TutorEvent,
};
use crate::services::llm_provider::LanguageModel;
use crate::services::question_renderer::{QuestionRenderer, RenderedText};
use crate::tutor::assessment::{
    apply_assessment_outcome, process_assessment_results, should_trigger_micro_assessment,
    validate_answers, AssessmentAnswer, AssessmentContext, AssessmentOutcome, TriggerDecision,
};
use crate::tutor::config::TutorConfig;
use crate::tutor::difficulties::{
    interleave, retrieval_strength, select_variation, should_use_retrieval, track_effectiveness,
    EffectivenessReport, InterleavingPlan, RetrievalDecision, SkillBlock, VariationType,
};
use crate::tutor::exploration::{
    categorize_attempt, creativity_score, end_exploration_early, generate_consolidation,
    record_attempt, start_exploration, tick_exploration, AttemptCategory, Consolidation,
    ExplorationAttempt, ExplorationSession, ExplorationSummary, Problem, ScaffoldingDecision,
};
use crate::tutor::mastery::confidence::DEFAULT_Z;
use crate::tutor::mastery::{
    calculate_validation_metrics, fit_skill_bkt, fit_skills, get_mastery_with_confidence,
    mastery_status, update_mastery, BktFitResult, BktParams, FitOutcome, MasteryEstimate,
    SkillHistory, ValidationReport,
};
use crate::tutor::persistence::TutorStore;
use crate::tutor::recommend::{
    apply_scaffold_decision, next_scaffold_level, recommend_skills, LearnerContext,
    ScaffoldChange, ScaffoldDecision, SkillRecommendation,
};
use crate::tutor::socratic::{
    advance_dialogue, end_dialogue_early, plan_dialogue, summarize_dialogue, DialoguePlan,
    DialogueState, DialogueStatus, DialogueSummary, DialogueTurn, LearnerResponse,
};
use crate::tutor::types::{
    InverseProfile, LearnerSkillState, MasteryStatus, PracticeAttempt, TutorError,
};

const RECENT_RESULTS_WINDOW: usize = 10;
const DEFAULT_CHALLENGE_PREFERENCE: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeInput {
    pub learner_id: String,
    pub skill_id: String,
    pub is_correct: bool,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub response_time_ms: Option<u64>,
    #[serde(default)]
    pub hints_used: u32,
    /// The attempt was a retrieval test rather than ordinary practice.
    #[serde(default)]
    pub is_retrieval: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeOutcome {
    pub state: LearnerSkillState,
    pub status: MasteryStatus,
    pub scaffold: ScaffoldDecision,
    pub newly_mastered: bool,
    pub retrieval: RetrievalDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_strength: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterleaveRequest {
    pub blocks: Vec<SkillBlock>,
    pub budget: usize,
    #[serde(default)]
    pub challenge_preference: Option<f64>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueView {
    pub state: DialogueState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<RenderedText>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueReply {
    pub turn: DialogueTurn,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_question: Option<RenderedText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DialogueSummary>,
}

/// A learner's exploration attempt. When `category` is missing the
/// approach text is categorized against the problem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSubmission {
    #[serde(default)]
    pub approach: String,
    #[serde(default)]
    pub category: Option<AttemptCategory>,
    #[serde(default)]
    pub partial_understanding: Vec<String>,
    #[serde(default)]
    pub misconceptions: Vec<String>,
    #[serde(default)]
    pub creativity_score: Option<f64>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationFeedback {
    pub session: ExplorationSession,
    pub decision: ScaffoldingDecision,
    pub message: RenderedText,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResult {
    pub outcome: AssessmentOutcome,
    pub profile: InverseProfile,
}

/// Store-backed facade over the tutoring algorithms. Every state change is
/// persisted before the matching event is published.
pub struct TutorEngine<M> {
    store: Arc<dyn TutorStore>,
    events: Arc<EventBus>,
    config: TutorConfig,
    renderer: QuestionRenderer<M>,
}

impl<M: LanguageModel> TutorEngine<M> {
    pub fn new(
        store: Arc<dyn TutorStore>,
        events: Arc<EventBus>,
        config: TutorConfig,
        model: M,
    ) -> Self {
        let renderer = QuestionRenderer::new(model, config.llm.clone());
        Self {
            store,
            events,
            config,
            renderer,
        }
    }

    pub fn config(&self) -> &TutorConfig {
        &self.config
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    fn params_for(&self, skill_id: &str) -> BktParams {
        self.store
            .load_params(skill_id)
            .unwrap_or(self.config.bkt.default_params)
    }

    pub async fn record_practice(
        &self,
        input: PracticeInput,
        now: DateTime<Utc>,
    ) -> Result<PracticeOutcome, TutorError> {
        let params = self.params_for(&input.skill_id);
        let threshold = self.config.bkt.mastery_threshold;
        let previous = self
            .store
            .load_skill_state(&input.learner_id, &input.skill_id)
            .unwrap_or_else(|| LearnerSkillState::new(&input.learner_id, &input.skill_id, params.p_l0));

        let attempt = PracticeAttempt {
            response_time_ms: input.response_time_ms,
            hints_used: input.hints_used,
            ..PracticeAttempt::new(input.is_correct, input.timestamp.unwrap_or(now))
                .for_skill(input.skill_id.as_str())
        };

        let mut updated = update_mastery(&previous, &attempt, &params, &self.config.bkt);
        let strength = input.is_retrieval.then(|| {
            updated.last_retrieval_at = Some(attempt.timestamp);
            retrieval_strength(
                attempt.is_correct,
                attempt.response_time_ms,
                attempt.hints_used,
                &self.config.scheduler,
            )
        });
        let scaffold = next_scaffold_level(&updated, &self.config.scaffold);
        let state = apply_scaffold_decision(&updated, &scaffold);

        self.store.save_skill_state(&state)?;
        self.store
            .append_attempt(&input.learner_id, &input.skill_id, &attempt)?;

        let newly_mastered = previous.p_mastery < threshold && state.p_mastery >= threshold;
        self.publish_practice_events(&previous, &state, &scaffold, attempt.is_correct, newly_mastered, now)
            .await;

        Ok(PracticeOutcome {
            status: mastery_status(&state, threshold),
            retrieval: should_use_retrieval(&state, now, &self.config.scheduler),
            state,
            scaffold,
            newly_mastered,
            retrieval_strength: strength,
        })
    }

    async fn publish_practice_events(
        &self,
        previous: &LearnerSkillState,
        state: &LearnerSkillState,
        scaffold: &ScaffoldDecision,
        is_correct: bool,
        newly_mastered: bool,
        now: DateTime<Utc>,
    ) {
        self.events
            .publish(TutorEvent::AttemptRecorded(AttemptRecordedPayload {
                learner_id: state.learner_id.clone(),
                skill_id: state.skill_id.clone(),
                is_correct,
                p_mastery: state.p_mastery,
                timestamp: now,
            }))
            .await;

        if scaffold.change != ScaffoldChange::Unchanged {
            info!(
                learner_id = %state.learner_id,
                skill_id = %state.skill_id,
                from = previous.scaffold_level.as_str(),
                to = scaffold.level.as_str(),
                "scaffold level changed"
            );
            self.events
                .publish(TutorEvent::ScaffoldChanged(ScaffoldChangedPayload {
                    learner_id: state.learner_id.clone(),
                    skill_id: state.skill_id.clone(),
                    from_level: previous.scaffold_level.value(),
                    to_level: scaffold.level.value(),
                    reason: scaffold.reason.clone().unwrap_or_default(),
                    timestamp: now,
                }))
                .await;
        }

        if newly_mastered {
            info!(learner_id = %state.learner_id, skill_id = %state.skill_id, "skill mastered");
            self.events
                .publish(TutorEvent::SkillMastered(SkillMasteredPayload {
                    learner_id: state.learner_id.clone(),
                    skill_id: state.skill_id.clone(),
                    p_mastery: state.p_mastery,
                    timestamp: now,
                }))
                .await;
        }
    }

    pub fn mastery_estimate(&self, learner_id: &str, skill_id: &str) -> Result<MasteryEstimate, TutorError> {
        let state = self
            .store
            .load_skill_state(learner_id, skill_id)
            .ok_or_else(|| TutorError::NotFound(format!("no practice for {learner_id}/{skill_id}")))?;
        Ok(get_mastery_with_confidence(
            &state,
            self.config.bkt.mastery_threshold,
            DEFAULT_Z,
        ))
    }

    /// Re-fits a skill's parameters from every learner's attempts. Only a
    /// successful fit replaces the stored parameters; a fit that stopped at
    /// the iteration cap is reported without being saved.
    pub fn fit_skill(&self, skill_id: &str) -> Result<BktFitResult, TutorError> {
        let attempts = self.store.attempts_for_skill(skill_id);
        let previous = self.store.load_params(skill_id);
        let result = fit_skill_bkt(skill_id, &attempts, previous, &self.config.bkt);
        match result.outcome {
            FitOutcome::InsufficientData => Err(TutorError::InsufficientData {
                required: self.config.bkt.min_fit_attempts,
                actual: result.attempt_count,
            }),
            FitOutcome::NotIdentifiable => Err(TutorError::NotIdentifiable(skill_id.to_string())),
            FitOutcome::NotConverged => Ok(result),
            FitOutcome::Fitted => {
                self.store.save_params(skill_id, &result.params)?;
                Ok(result)
            }
        }
    }

    /// Re-fits every practiced skill in one pass. Rejected fits stay in the
    /// report with their outcome instead of failing the batch.
    pub fn fit_all(&self) -> Result<BTreeMap<String, BktFitResult>, TutorError> {
        let skills = self.store.practiced_skills();
        let previous: BTreeMap<String, BktParams> = skills
            .iter()
            .filter_map(|id| self.store.load_params(id).map(|p| (id.clone(), p)))
            .collect();
        let attempts: Vec<PracticeAttempt> = skills
            .iter()
            .flat_map(|id| self.store.attempts_for_skill(id))
            .collect();

        let results = fit_skills(&attempts, &previous, &self.config.bkt);
        for (skill_id, result) in &results {
            if result.outcome == FitOutcome::Fitted {
                self.store.save_params(skill_id, &result.params)?;
            }
        }
        info!(
            skills = results.len(),
            fitted = results.values().filter(|r| r.outcome == FitOutcome::Fitted).count(),
            insufficient = results.values().filter(|r| r.is_insufficient_data()).count(),
            "batch BKT fit finished"
        );
        Ok(results)
    }

    /// Validates stored parameters against attempt history. An empty list
    /// validates every practiced skill.
    pub fn validate(&self, skill_ids: &[String]) -> ValidationReport {
        let ids = if skill_ids.is_empty() {
            self.store.practiced_skills()
        } else {
            skill_ids.to_vec()
        };
        let data: Vec<(String, BktParams, Vec<PracticeAttempt>)> = ids
            .into_iter()
            .map(|id| {
                let params = self.params_for(&id);
                let attempts = self.store.attempts_for_skill(&id);
                (id, params, attempts)
            })
            .collect();
        let histories: Vec<SkillHistory<'_>> = data
            .iter()
            .map(|(id, params, attempts)| SkillHistory {
                skill_id: id,
                params: *params,
                attempts,
            })
            .collect();
        calculate_validation_metrics(&histories)
    }

    /// Ranks skills after filling in whatever the caller left out from the
    /// stored learner state.
    pub fn recommend(&self, mut context: LearnerContext, now: DateTime<Utc>) -> Vec<SkillRecommendation> {
        let stored: HashMap<String, LearnerSkillState> = self
            .store
            .skill_states_for(&context.learner_id)
            .into_iter()
            .map(|s| (s.skill_id.clone(), s))
            .collect();

        for candidate in &mut context.candidates {
            if candidate.state.is_none() {
                candidate.state = stored.get(&candidate.skill_id).cloned();
            }
            if candidate.recent_results.is_empty() {
                let attempts = self.store.attempts_for(&context.learner_id, &candidate.skill_id);
                let start = attempts.len().saturating_sub(RECENT_RESULTS_WINDOW);
                candidate.recent_results = attempts[start..].iter().map(|a| a.is_correct).collect();
            }
        }
        for (skill_id, state) in &stored {
            context
                .known_mastery
                .entry(skill_id.clone())
                .or_insert(state.p_mastery);
        }

        recommend_skills(&context, &self.config.bkt, &self.config.scaffold, now)
    }

    pub fn interleave(&self, request: &InterleaveRequest) -> InterleavingPlan {
        let mut rng = match request.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        interleave(
            &request.blocks,
            request.budget,
            request
                .challenge_preference
                .unwrap_or(DEFAULT_CHALLENGE_PREFERENCE),
            &self.config.scheduler,
            &mut rng,
        )
    }

    pub fn retrieval_strength(&self, is_correct: bool, response_time_ms: Option<u64>, hints_used: u32) -> f64 {
        retrieval_strength(is_correct, response_time_ms, hints_used, &self.config.scheduler)
    }

    pub fn effectiveness(&self, pre_score: f64, post_score: f64, elapsed_days: f64) -> EffectivenessReport {
        track_effectiveness(pre_score, post_score, elapsed_days, &self.config.scheduler)
    }

    pub fn next_variation(&self, history: &[VariationType]) -> VariationType {
        select_variation(history)
    }

    pub async fn start_dialogue(&self, plan: DialoguePlan, now: DateTime<Utc>) -> Result<DialogueView, TutorError> {
        let mut state = plan_dialogue(plan, &self.config.socratic, now);
        let question = match state.current_question_type() {
            Some(ty) => {
                let rendered = self.renderer.socratic_question(&state, ty).await;
                state.current_question = Some(rendered.text.clone());
                Some(rendered)
            }
            None => None,
        };

        self.store.save_dialogue(&state)?;
        info!(dialogue_id = %state.id, skill_id = %state.skill_id, "dialogue started");
        self.events
            .publish(TutorEvent::DialogueStarted(DialogueStartedPayload {
                dialogue_id: state.id.clone(),
                learner_id: state.learner_id.clone(),
                skill_id: state.skill_id.clone(),
                timestamp: now,
            }))
            .await;

        Ok(DialogueView { state, question })
    }

    fn load_dialogue(&self, dialogue_id: &str) -> Result<DialogueState, TutorError> {
        self.store
            .load_dialogue(dialogue_id)
            .ok_or_else(|| TutorError::NotFound(format!("dialogue {dialogue_id}")))
    }

    pub async fn respond_dialogue(
        &self,
        dialogue_id: &str,
        response: LearnerResponse,
        now: DateTime<Utc>,
    ) -> Result<DialogueReply, TutorError> {
        let state = self.load_dialogue(dialogue_id)?;
        let mut turn = advance_dialogue(&state, response, &self.config.socratic, now)?;

        let next_question = match turn.next_question_type {
            Some(ty) => {
                let rendered = self.renderer.socratic_question(&turn.state, ty).await;
                turn.state.current_question = Some(rendered.text.clone());
                Some(rendered)
            }
            None => None,
        };
        self.store.save_dialogue(&turn.state)?;

        let summary = if turn.state.is_active() {
            None
        } else {
            let summary = summarize_dialogue(&turn.state, &self.config.socratic);
            self.publish_dialogue_ended(&turn.state, &summary, now).await;
            Some(summary)
        };

        Ok(DialogueReply {
            turn,
            next_question,
            summary,
        })
    }

    /// Ends a dialogue wherever it is. Ending twice returns the same summary
    /// and publishes nothing new.
    pub async fn end_dialogue(&self, dialogue_id: &str, now: DateTime<Utc>) -> Result<DialogueSummary, TutorError> {
        let mut state = self.load_dialogue(dialogue_id)?;
        let was_active = state.is_active();
        let summary = end_dialogue_early(&mut state, &self.config.socratic, now);
        if was_active {
            self.store.save_dialogue(&state)?;
            self.publish_dialogue_ended(&state, &summary, now).await;
        }
        Ok(summary)
    }

    async fn publish_dialogue_ended(&self, state: &DialogueState, summary: &DialogueSummary, now: DateTime<Utc>) {
        info!(
            dialogue_id = %state.id,
            status = ?summary.status,
            exchanges = summary.exchange_count,
            effectiveness = summary.effectiveness,
            "dialogue ended"
        );
        self.events
            .publish(TutorEvent::DialogueEnded(DialogueEndedPayload {
                dialogue_id: state.id.clone(),
                learner_id: state.learner_id.clone(),
                completed: summary.status == DialogueStatus::Completed,
                exchange_count: summary.exchange_count,
                effectiveness: summary.effectiveness,
                timestamp: now,
            }))
            .await;
    }

    pub fn start_exploration(
        &self,
        problem: Problem,
        learner_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ExplorationSession, TutorError> {
        let session = start_exploration(problem, learner_id, &self.config.exploration, now);
        self.store.save_exploration(&session)?;
        info!(session_id = %session.id, problem_id = %session.problem.id, "exploration started");
        Ok(session)
    }

    fn load_exploration(&self, session_id: &str) -> Result<ExplorationSession, TutorError> {
        self.store
            .load_exploration(session_id)
            .ok_or_else(|| TutorError::NotFound(format!("exploration {session_id}")))
    }

    pub async fn submit_attempt(
        &self,
        session_id: &str,
        submission: AttemptSubmission,
        now: DateTime<Utc>,
    ) -> Result<ExplorationFeedback, TutorError> {
        let mut session = self.load_exploration(session_id)?;
        let submitted_at = submission.submitted_at.unwrap_or(now);
        let attempt = match submission.category {
            Some(category) => ExplorationAttempt {
                creativity_score: submission
                    .creativity_score
                    .unwrap_or_else(|| creativity_score(&session.problem, &submission.approach)),
                approach: submission.approach,
                category,
                partial_understanding: submission.partial_understanding,
                misconceptions: submission.misconceptions,
                duration_ms: submission.duration_ms,
                submitted_at,
            },
            None => categorize_attempt(
                &session.problem,
                &submission.approach,
                submission.duration_ms,
                submitted_at,
            ),
        };

        let decision = record_attempt(&mut session, attempt, &self.config.exploration, now)?;
        self.store.save_exploration(&session)?;
        let message = self.renderer.exploration_message(&session, &decision).await;

        Ok(ExplorationFeedback {
            session,
            decision,
            message,
        })
    }

    /// Refreshes the session signals at `now` and reports the support level.
    pub async fn scaffolding(&self, session_id: &str, now: DateTime<Utc>) -> Result<ExplorationFeedback, TutorError> {
        let mut session = self.load_exploration(session_id)?;
        let decision = tick_exploration(&mut session, &self.config.exploration, now);
        if session.is_exploring() {
            self.store.save_exploration(&session)?;
        }
        let message = self.renderer.exploration_message(&session, &decision).await;

        Ok(ExplorationFeedback {
            session,
            decision,
            message,
        })
    }

    pub async fn consolidate(&self, session_id: &str, now: DateTime<Utc>) -> Result<Consolidation, TutorError> {
        let mut session = self.load_exploration(session_id)?;
        let already = session.consolidation.is_some();
        let consolidation = generate_consolidation(&mut session, &self.config.exploration, now)?;
        if already {
            return Ok(consolidation);
        }

        self.store.save_exploration(&session)?;
        info!(
            session_id = %session.id,
            attempts = session.attempts.len(),
            conceptual_gain = consolidation.conceptual_gain,
            "exploration consolidated"
        );
        self.events
            .publish(TutorEvent::ExplorationConsolidated(ExplorationConsolidatedPayload {
                session_id: session.id.clone(),
                learner_id: session.learner_id.clone(),
                attempt_count: session.attempts.len(),
                conceptual_gain: consolidation.conceptual_gain,
                timestamp: now,
            }))
            .await;

        Ok(consolidation)
    }

    pub fn end_exploration(&self, session_id: &str, now: DateTime<Utc>) -> Result<ExplorationSummary, TutorError> {
        let mut session = self.load_exploration(session_id)?;
        let was_exploring = session.is_exploring();
        let summary = end_exploration_early(&mut session, now);
        if was_exploring {
            self.store.save_exploration(&session)?;
        }
        Ok(summary)
    }

    /// Decides on a micro-assessment. A missing profile is read from the
    /// store before the gates are applied.
    pub async fn trigger_assessment(&self, mut context: AssessmentContext, now: DateTime<Utc>) -> TriggerDecision {
        if context.profile.is_none() {
            context.profile = self.store.load_profile(&context.learner_id);
        }
        let decision = should_trigger_micro_assessment(&context, &self.config.assessment);

        if decision.should_trigger {
            self.events
                .publish(TutorEvent::AssessmentTriggered(AssessmentTriggeredPayload {
                    learner_id: context.learner_id.clone(),
                    assessment_types: decision
                        .needs
                        .iter()
                        .map(|n| n.assessment_type.as_str().to_string())
                        .collect(),
                    timestamp: now,
                }))
                .await;
        }
        decision
    }

    pub fn submit_assessment(
        &self,
        learner_id: &str,
        answers: &[AssessmentAnswer],
        now: DateTime<Utc>,
    ) -> Result<AssessmentResult, TutorError> {
        validate_answers(answers)?;
        let outcome = process_assessment_results(answers);
        let mut profile = self.store.load_profile(learner_id).unwrap_or_else(|| InverseProfile {
            learner_id: learner_id.to_string(),
            ..InverseProfile::default()
        });
        apply_assessment_outcome(&mut profile, &outcome, now);
        self.store.save_profile(&profile)?;
        info!(learner_id, updates = outcome.updates.len(), "assessment processed");

        Ok(AssessmentResult { outcome, profile })
    }
}
