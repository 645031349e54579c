use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::difficulty::difficulty_adjustment;
use crate::tutor::config::{BktConfig, ScaffoldConfig};
use crate::tutor::types::{LearnerSkillState, ScaffoldLevel};

const MIN_SESSION_SKILLS: usize = 2;
const MAX_SESSION_SKILLS: usize = 4;
const OVERDUE_SATURATION_DAYS: f64 = 7.0;
const UPCOMING_WINDOW_DAYS: f64 = 7.0;
const UNPRACTICED_RECENCY: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    TooEasy,
    Zpd,
    Emerging,
    TooHard,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileIndicators {
    #[serde(default)]
    pub challenge_preference: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCandidate {
    pub skill_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub state: Option<LearnerSkillState>,
    /// Most recent outcomes for this skill, oldest first.
    #[serde(default)]
    pub recent_results: Vec<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerContext {
    pub learner_id: String,
    pub candidates: Vec<SkillCandidate>,
    /// Mastery of skills that are not candidates themselves (prerequisites).
    #[serde(default)]
    pub known_mastery: HashMap<String, f64>,
    #[serde(default)]
    pub session_minutes: f64,
    #[serde(default)]
    pub profile: Option<ProfileIndicators>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillRecommendation {
    pub rank: usize,
    pub skill_id: String,
    pub score: f64,
    pub p_mastery: f64,
    pub zone: Zone,
    pub in_zpd: bool,
    pub scaffold_level: ScaffoldLevel,
    pub difficulty_adjustment: f64,
    pub reasons: Vec<String>,
    pub why_explanation: String,
}

pub fn session_skill_cap(config: &ScaffoldConfig) -> usize {
    config
        .max_skills_per_session
        .clamp(MIN_SESSION_SKILLS, MAX_SESSION_SKILLS)
}

pub fn classify_zone(p_mastery: f64, readiness: f64, mastery_threshold: f64, min_readiness: f64) -> Zone {
    if p_mastery >= mastery_threshold {
        Zone::TooEasy
    } else if readiness < min_readiness {
        Zone::TooHard
    } else if readiness >= 1.0 - 1e-9 {
        Zone::Zpd
    } else {
        Zone::Emerging
    }
}

fn prerequisite_readiness(
    candidate: &SkillCandidate,
    mastery_of: &dyn Fn(&str) -> Option<f64>,
    threshold: f64,
) -> f64 {
    if candidate.prerequisites.is_empty() {
        return 1.0;
    }
    let ready = candidate
        .prerequisites
        .iter()
        .filter(|id| mastery_of(id.as_str()).is_some_and(|p| p >= threshold))
        .count();
    ready as f64 / candidate.prerequisites.len() as f64
}

fn recency_score(state: Option<&LearnerSkillState>, now: DateTime<Utc>) -> (f64, String) {
    let Some(state) = state.filter(|s| s.attempt_count > 0) else {
        return (UNPRACTICED_RECENCY, "not practiced yet".to_string());
    };
    match state.next_review_at {
        Some(at) if state.is_due(now) => {
            let overdue_days = (now - at).num_seconds() as f64 / 86_400.0;
            let score = 0.7 + 0.3 * (overdue_days / OVERDUE_SATURATION_DAYS).min(1.0);
            let text = if overdue_days >= 1.0 {
                format!("overdue for review by {:.0} days", overdue_days.floor())
            } else {
                "due for review".to_string()
            };
            (score, text)
        }
        Some(at) => {
            let days_until = (at - now).num_seconds() as f64 / 86_400.0;
            let score = 0.3 * (1.0 - days_until / UPCOMING_WINDOW_DAYS).max(0.0);
            (score, format!("next review in {:.1} days", days_until))
        }
        None => (UNPRACTICED_RECENCY, "no review scheduled".to_string()),
    }
}

/// Ranks candidate skills for the next session and explains each pick.
///
/// Score blends mastery gap, practice recency, and prerequisite readiness.
/// Skills whose prerequisites are mostly unmet are left out. Ties go to the
/// weaker skill.
pub fn recommend_skills(
    context: &LearnerContext,
    bkt: &BktConfig,
    config: &ScaffoldConfig,
    now: DateTime<Utc>,
) -> Vec<SkillRecommendation> {
    let threshold = bkt.mastery_threshold;
    let candidate_mastery: HashMap<&str, f64> = context
        .candidates
        .iter()
        .filter_map(|c| c.state.as_ref().map(|s| (c.skill_id.as_str(), s.p_mastery)))
        .collect();
    let mastery_of = |id: &str| -> Option<f64> {
        candidate_mastery
            .get(id)
            .copied()
            .or_else(|| context.known_mastery.get(id).copied())
    };
    let challenge = context.profile.as_ref().and_then(|p| p.challenge_preference);

    let mut scored: Vec<SkillRecommendation> = Vec::with_capacity(context.candidates.len());
    for candidate in &context.candidates {
        let p_mastery = candidate
            .state
            .as_ref()
            .map(|s| s.p_mastery)
            .unwrap_or(bkt.default_params.p_l0);
        let readiness = prerequisite_readiness(candidate, &mastery_of, threshold);
        let zone = classify_zone(p_mastery, readiness, threshold, config.min_prerequisite_readiness);
        if zone == Zone::TooHard {
            debug!(skill_id = %candidate.skill_id, readiness, "skipping skill with unmet prerequisites");
            continue;
        }

        let gap = ((threshold - p_mastery) / threshold).clamp(0.0, 1.0);
        let (recency, recency_text) = recency_score(candidate.state.as_ref(), now);

        let mut contributions = vec![
            (
                config.gap_weight * gap,
                format!(
                    "mastery {:.0}% is below the {:.0}% target",
                    p_mastery * 100.0,
                    threshold * 100.0
                ),
            ),
            (config.recency_weight * recency, recency_text),
            (
                config.readiness_weight * readiness,
                if candidate.prerequisites.is_empty() {
                    "no prerequisites needed".to_string()
                } else if zone == Zone::Zpd {
                    "all prerequisites mastered, ready to learn".to_string()
                } else {
                    format!("{:.0}% of prerequisites mastered", readiness * 100.0)
                },
            ),
        ];
        if gap <= 0.0 {
            contributions[0].1 = format!("already mastered at {:.0}%", p_mastery * 100.0);
        }
        let score: f64 = contributions.iter().map(|(v, _)| v).sum();
        contributions.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let adjustment = difficulty_adjustment(
            &candidate.recent_results,
            context.session_minutes,
            challenge,
            config,
        );
        let mut reasons: Vec<String> = contributions.into_iter().map(|(_, text)| text).collect();
        if let Some(accuracy) = candidate.state.as_ref().and_then(LearnerSkillState::accuracy) {
            reasons.push(format!("{:.0}% of attempts answered correctly", accuracy * 100.0));
        }
        reasons.extend(adjustment.reasons);

        let label = candidate.name.as_deref().unwrap_or(&candidate.skill_id);
        let why_explanation = format!("{label}: {} and {}", reasons[0], reasons[1]);

        scored.push(SkillRecommendation {
            rank: 0,
            skill_id: candidate.skill_id.clone(),
            score: score.clamp(0.0, 1.0),
            p_mastery,
            zone,
            in_zpd: zone == Zone::Zpd,
            scaffold_level: candidate
                .state
                .as_ref()
                .map(|s| s.scaffold_level)
                .unwrap_or_default(),
            difficulty_adjustment: adjustment.delta,
            reasons,
            why_explanation,
        });
    }

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.p_mastery.partial_cmp(&b.p_mastery).unwrap_or(Ordering::Equal))
            .then_with(|| a.skill_id.cmp(&b.skill_id))
    });
    scored.truncate(session_skill_cap(config));
    for (i, rec) in scored.iter_mut().enumerate() {
        rec.rank = i + 1;
    }

    debug!(
        learner_id = %context.learner_id,
        picked = scored.len(),
        "skills recommended"
    );
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn candidate(id: &str, p: Option<f64>, prereqs: &[&str]) -> SkillCandidate {
        SkillCandidate {
            skill_id: id.to_string(),
            name: None,
            prerequisites: prereqs.iter().map(|s| s.to_string()).collect(),
            state: p.map(|p| {
                let mut s = LearnerSkillState::new("u1", id, p);
                s.attempt_count = 4;
                s.next_review_at = Some(now() + Duration::days(3));
                s
            }),
            recent_results: vec![],
        }
    }

    fn context(candidates: Vec<SkillCandidate>) -> LearnerContext {
        LearnerContext {
            learner_id: "u1".to_string(),
            candidates,
            known_mastery: HashMap::new(),
            session_minutes: 0.0,
            profile: None,
        }
    }

    #[test]
    fn cap_is_between_two_and_four() {
        let mut config = ScaffoldConfig::default();
        config.max_skills_per_session = 10;
        assert_eq!(session_skill_cap(&config), 4);
        config.max_skills_per_session = 0;
        assert_eq!(session_skill_cap(&config), 2);
    }

    #[test]
    fn weaker_skill_ranks_first() {
        let mut a = candidate("a", Some(0.5), &[]);
        let mut b = candidate("b", Some(0.4), &[]);
        a.state.as_mut().unwrap().next_review_at = None;
        b.state.as_mut().unwrap().next_review_at = None;
        let recs = recommend_skills(&context(vec![a, b]), &BktConfig::default(), &ScaffoldConfig::default(), now());
        assert_eq!(recs[0].skill_id, "b");
    }

    #[test]
    fn equal_scores_fall_back_to_skill_id() {
        let mut rec_a = candidate("a", Some(0.4), &[]);
        let mut rec_b = candidate("b", Some(0.4), &[]);
        rec_a.state.as_mut().unwrap().next_review_at = None;
        rec_b.state.as_mut().unwrap().next_review_at = None;
        let recs = recommend_skills(&context(vec![rec_b, rec_a]), &BktConfig::default(), &ScaffoldConfig::default(), now());
        assert_eq!(recs[0].skill_id, "a");
        assert_eq!(recs[0].rank, 1);
        assert_eq!(recs[1].rank, 2);
    }

    #[test]
    fn unmet_prerequisites_are_excluded() {
        let base = candidate("base", Some(0.2), &[]);
        let advanced = candidate("advanced", None, &["base"]);
        let recs = recommend_skills(&context(vec![base, advanced]), &BktConfig::default(), &ScaffoldConfig::default(), now());
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].skill_id, "base");
    }

    #[test]
    fn zpd_membership_uses_known_mastery() {
        let mut ctx = context(vec![candidate("next", None, &["done"])]);
        ctx.known_mastery.insert("done".to_string(), 0.95);
        let recs = recommend_skills(&ctx, &BktConfig::default(), &ScaffoldConfig::default(), now());
        assert!(recs[0].in_zpd);
        assert!(recs[0].why_explanation.starts_with("next:"));
    }

    #[test]
    fn overdue_skill_outranks_upcoming_one() {
        let upcoming = candidate("upcoming", Some(0.5), &[]);
        let mut overdue = candidate("overdue", Some(0.5), &[]);
        overdue.state.as_mut().unwrap().next_review_at = Some(now() - Duration::days(3));
        let recs = recommend_skills(&context(vec![upcoming, overdue]), &BktConfig::default(), &ScaffoldConfig::default(), now());
        assert_eq!(recs[0].skill_id, "overdue");
        assert!(recs[0].reasons.iter().any(|r| r.contains("overdue")));
    }

    #[test]
    fn practiced_skill_reports_accuracy() {
        let mut practiced = candidate("practiced", Some(0.5), &[]);
        practiced.state.as_mut().unwrap().correct_count = 3;
        let fresh = candidate("fresh", None, &[]);
        let recs = recommend_skills(&context(vec![practiced, fresh]), &BktConfig::default(), &ScaffoldConfig::default(), now());
        let practiced = recs.iter().find(|r| r.skill_id == "practiced").unwrap();
        assert!(practiced.reasons.contains(&"75% of attempts answered correctly".to_string()));
        let fresh = recs.iter().find(|r| r.skill_id == "fresh").unwrap();
        assert!(!fresh.reasons.iter().any(|r| r.contains("answered correctly")));
    }

    #[test]
    fn list_is_capped() {
        let candidates = (0..8).map(|i| candidate(&format!("s{i}"), Some(0.1 * i as f64), &[])).collect();
        let recs = recommend_skills(&context(candidates), &BktConfig::default(), &ScaffoldConfig::default(), now());
        assert_eq!(recs.len(), 3);
    }
}
