use serde::{Deserialize, Serialize};

use crate::tutor::config::SchedulerConfig;
use crate::tutor::types::clamp01;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivenessReport {
    pub pre_score: f64,
    pub post_score: f64,
    pub elapsed_days: f64,
    pub expected_retention: f64,
    pub adjusted_gain: f64,
    pub effect_size: f64,
    pub is_effective: bool,
}

/// Exponential forgetting with a fixed stability.
pub fn expected_retention(elapsed_days: f64, stability_days: f64) -> f64 {
    if stability_days <= 0.0 {
        return 0.0;
    }
    (-elapsed_days.max(0.0) / stability_days).exp()
}

/// Cohen's h between two proportions.
pub fn cohens_h(p1: f64, p2: f64) -> f64 {
    2.0 * clamp01(p1).sqrt().asin() - 2.0 * clamp01(p2).sqrt().asin()
}

/// Compares a post-test score against what the pre-test would predict after
/// forgetting alone.
pub fn track_effectiveness(
    pre_score: f64,
    post_score: f64,
    elapsed_days: f64,
    config: &SchedulerConfig,
) -> EffectivenessReport {
    let pre = clamp01(pre_score);
    let post = clamp01(post_score);
    let retention = expected_retention(elapsed_days, config.retention_stability_days);
    let expected = pre * retention;
    let effect_size = cohens_h(post, expected);

    EffectivenessReport {
        pre_score: pre,
        post_score: post,
        elapsed_days: elapsed_days.max(0.0),
        expected_retention: retention,
        adjusted_gain: post - expected,
        effect_size,
        is_effective: effect_size >= config.effective_effect_size,
    }
}
