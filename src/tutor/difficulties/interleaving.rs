use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::tutor::config::SchedulerConfig;

const MIN_MIX_RATIO: f64 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillBlock {
    pub skill_id: String,
    pub question_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterleavingPlan {
    pub sequence: Vec<String>,
    pub interleaved: bool,
    pub mix_ratio: f64,
    pub max_run: usize,
    pub switch_count: usize,
    pub estimated_retention_boost: f64,
}

/// Share of transitions that should switch skills. Grows with the number of
/// skills and with the learner's appetite for challenge.
pub fn mix_ratio(skill_count: usize, challenge_preference: f64) -> f64 {
    if skill_count < 2 {
        return 0.0;
    }
    let base = 1.0 - 1.0 / skill_count as f64;
    (base * (0.5 + 0.5 * challenge_preference.clamp(0.0, 1.0))).clamp(MIN_MIX_RATIO, 1.0)
}

pub fn max_run_for(ratio: f64) -> usize {
    if ratio <= 0.0 {
        return usize::MAX;
    }
    ((1.0 / ratio).round() as usize).max(1)
}

pub fn retention_boost(switch_count: usize, config: &SchedulerConfig) -> f64 {
    (switch_count as f64 * config.retention_boost_per_switch).min(config.max_retention_boost)
}

fn allocate(blocks: &[SkillBlock], budget: usize) -> Vec<usize> {
    let mut alloc = vec![0usize; blocks.len()];
    let mut left = budget;
    while left > 0 {
        let mut progressed = false;
        for (i, block) in blocks.iter().enumerate() {
            if left == 0 {
                break;
            }
            if alloc[i] < block.question_count {
                alloc[i] += 1;
                left -= 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    alloc
}

fn pick_most_remaining<R: Rng + ?Sized>(
    remaining: &[usize],
    exclude: Option<usize>,
    rng: &mut R,
) -> Option<usize> {
    let best = remaining
        .iter()
        .enumerate()
        .filter(|&(i, &r)| r > 0 && Some(i) != exclude)
        .map(|(_, &r)| r)
        .max()?;
    let ties: Vec<usize> = remaining
        .iter()
        .enumerate()
        .filter(|&(i, &r)| r == best && Some(i) != exclude)
        .map(|(i, _)| i)
        .collect();
    Some(ties[rng.random_range(0..ties.len())])
}

/// Builds an interleaved question order across skill blocks.
///
/// The budget is split evenly across skills (capped by each block's size).
/// Runs on one skill never exceed `max_run` while another skill still has
/// questions left. Tie breaks use the injected RNG.
pub fn interleave<R: Rng + ?Sized>(
    blocks: &[SkillBlock],
    budget: usize,
    challenge_preference: f64,
    config: &SchedulerConfig,
    rng: &mut R,
) -> InterleavingPlan {
    let active: Vec<SkillBlock> = blocks
        .iter()
        .filter(|b| b.question_count > 0)
        .cloned()
        .collect();
    let mut remaining = allocate(&active, budget);
    let total: usize = remaining.iter().sum();

    if active.len() < 2 {
        let sequence = active
            .first()
            .map(|b| vec![b.skill_id.clone(); total])
            .unwrap_or_default();
        return InterleavingPlan {
            max_run: sequence.len(),
            sequence,
            interleaved: false,
            mix_ratio: 0.0,
            switch_count: 0,
            estimated_retention_boost: 0.0,
        };
    }

    let ratio = mix_ratio(active.len(), challenge_preference);
    let max_run = max_run_for(ratio);

    let mut order: Vec<usize> = Vec::with_capacity(total);
    let mut current: Option<usize> = None;
    let mut run = 0usize;
    while order.len() < total {
        let next = match current {
            Some(c) if remaining[c] > 0 && run < max_run => Some(c),
            Some(c) => pick_most_remaining(&remaining, Some(c), rng)
                .or_else(|| (remaining[c] > 0).then_some(c)),
            None => pick_most_remaining(&remaining, None, rng),
        };
        let Some(idx) = next else { break };

        if current == Some(idx) {
            run += 1;
        } else {
            current = Some(idx);
            run = 1;
        }
        remaining[idx] -= 1;
        order.push(idx);
    }

    let switch_count = order.windows(2).filter(|w| w[0] != w[1]).count();
    InterleavingPlan {
        sequence: order.iter().map(|&i| active[i].skill_id.clone()).collect(),
        interleaved: true,
        mix_ratio: ratio,
        max_run,
        switch_count,
        estimated_retention_boost: retention_boost(switch_count, config),
    }
}
