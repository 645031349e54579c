use serde::{Deserialize, Serialize};

use super::bkt::{sorted_outcomes, trace_outcomes, BktParams};
use crate::tutor::types::PracticeAttempt;

const MIN_VALIDATION_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationQuality {
    Good,
    Acceptable,
    NeedsImprovement,
}

impl ValidationQuality {
    pub fn from_auc(avg_auc: f64) -> Self {
        if avg_auc >= 0.7 {
            Self::Good
        } else if avg_auc >= 0.6 {
            Self::Acceptable
        } else {
            Self::NeedsImprovement
        }
    }
}

pub struct SkillHistory<'a> {
    pub skill_id: &'a str,
    pub params: BktParams,
    pub attempts: &'a [PracticeAttempt],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillValidation {
    pub skill_id: String,
    pub attempt_count: usize,
    /// None when the skill has too few attempts or only one outcome class.
    pub auc: Option<f64>,
    pub brier_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub skills: Vec<SkillValidation>,
    pub avg_auc: Option<f64>,
    pub avg_brier: Option<f64>,
    pub overall_quality: ValidationQuality,
}

/// Mann-Whitney AUC: the probability that a randomly chosen positive
/// outcome was predicted higher than a randomly chosen negative one.
/// Ties count half.
pub fn auc(predictions: &[f64], outcomes: &[bool]) -> Option<f64> {
    let positives: Vec<f64> = predictions
        .iter()
        .zip(outcomes)
        .filter(|(_, &o)| o)
        .map(|(&p, _)| p)
        .collect();
    let negatives: Vec<f64> = predictions
        .iter()
        .zip(outcomes)
        .filter(|(_, &o)| !o)
        .map(|(&p, _)| p)
        .collect();
    if positives.is_empty() || negatives.is_empty() {
        return None;
    }

    let mut wins = 0.0;
    for &pos in &positives {
        for &neg in &negatives {
            if pos > neg {
                wins += 1.0;
            } else if (pos - neg).abs() < f64::EPSILON {
                wins += 0.5;
            }
        }
    }
    Some(wins / (positives.len() * negatives.len()) as f64)
}

pub fn brier(predictions: &[f64], outcomes: &[bool]) -> Option<f64> {
    if predictions.is_empty() || predictions.len() != outcomes.len() {
        return None;
    }
    let total: f64 = predictions
        .iter()
        .zip(outcomes)
        .map(|(&p, &o)| (p - if o { 1.0 } else { 0.0 }).powi(2))
        .sum();
    Some(total / predictions.len() as f64)
}

pub fn calculate_validation_metrics(skills: &[SkillHistory<'_>]) -> ValidationReport {
    let mut rows = Vec::with_capacity(skills.len());
    for skill in skills {
        let outcomes = sorted_outcomes(skill.attempts);
        let (auc_value, brier_value) = if outcomes.len() < MIN_VALIDATION_ATTEMPTS {
            (None, None)
        } else {
            let mastery = trace_outcomes(&skill.params, &outcomes);
            let p_correct: Vec<f64> = mastery.iter().map(|&p| skill.params.p_correct(p)).collect();
            (auc(&mastery, &outcomes), brier(&p_correct, &outcomes))
        };
        rows.push(SkillValidation {
            skill_id: skill.skill_id.to_string(),
            attempt_count: outcomes.len(),
            auc: auc_value,
            brier_score: brier_value,
        });
    }

    let avg_auc = mean(rows.iter().filter_map(|r| r.auc));
    let avg_brier = mean(rows.iter().filter_map(|r| r.brier_score));
    let overall_quality = avg_auc
        .map(ValidationQuality::from_auc)
        .unwrap_or(ValidationQuality::NeedsImprovement);

    ValidationReport {
        skills: rows,
        avg_auc,
        avg_brier,
        overall_quality,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn attempts(pattern: &[bool]) -> Vec<PracticeAttempt> {
        let base = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        pattern
            .iter()
            .enumerate()
            .map(|(i, &c)| PracticeAttempt::new(c, base + Duration::minutes(i as i64)))
            .collect()
    }

    #[test]
    fn test_auc_perfect_and_inverted() {
        assert_eq!(auc(&[0.9, 0.8, 0.2, 0.1], &[true, true, false, false]), Some(1.0));
        assert_eq!(auc(&[0.1, 0.2, 0.8, 0.9], &[true, true, false, false]), Some(0.0));
        assert_eq!(auc(&[0.5, 0.5], &[true, false]), Some(0.5));
        assert_eq!(auc(&[0.5, 0.6], &[true, true]), None);
    }

    #[test]
    fn test_brier_known_value() {
        let b = brier(&[1.0, 0.0, 0.5], &[true, false, true]).unwrap();
        assert!((b - 0.25 / 3.0).abs() < 1e-12);
        assert_eq!(brier(&[], &[]), None);
    }

    #[test]
    fn test_learning_sequence_validates_well() {
        let history = attempts(&[false, false, false, true, true, true, true, true, true, true]);
        let report = calculate_validation_metrics(&[SkillHistory {
            skill_id: "ratios",
            params: BktParams::default(),
            attempts: &history,
        }]);
        assert_eq!(report.skills.len(), 1);
        let auc_value = report.avg_auc.unwrap();
        assert!(auc_value >= 0.7, "auc = {auc_value}");
        assert_eq!(report.overall_quality, ValidationQuality::Good);
    }

    #[test]
    fn test_short_history_excluded() {
        let history = attempts(&[true, false]);
        let report = calculate_validation_metrics(&[SkillHistory {
            skill_id: "ratios",
            params: BktParams::default(),
            attempts: &history,
        }]);
        assert_eq!(report.skills[0].auc, None);
        assert_eq!(report.avg_auc, None);
        assert_eq!(report.overall_quality, ValidationQuality::NeedsImprovement);
    }

    #[test]
    fn test_quality_bands() {
        assert_eq!(ValidationQuality::from_auc(0.75), ValidationQuality::Good);
        assert_eq!(ValidationQuality::from_auc(0.65), ValidationQuality::Acceptable);
        assert_eq!(ValidationQuality::from_auc(0.5), ValidationQuality::NeedsImprovement);
    }
}
