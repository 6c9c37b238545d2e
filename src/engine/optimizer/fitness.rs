// ==========================================
// 生产排程引擎 - 适应度评估
// ==========================================
// fitness = w1·加权拖期(小时) + w2·冲突罚分 + w3·利用率方差 - w4·提前奖励(小时)
// 冲突只计入涉及待排计划的部分 (基线自身的问题对所有个体相同)
// ==========================================

use super::chromosome::{Chromosome, Gene, SearchSpace};
use crate::config::FitnessWeights;
use crate::domain::conflict::Conflict;
use crate::domain::run::FitnessBreakdown;
use crate::domain::types::Severity;
use crate::engine::conflict_detector::ConflictDetector;

const MINUTES_PER_HOUR: f64 = 60.0;

#[derive(Debug, Clone)]
pub struct FitnessEvaluator {
    weights: FitnessWeights,
    detector: ConflictDetector,
}

impl FitnessEvaluator {
    pub fn new(weights: FitnessWeights, detector: ConflictDetector) -> Self {
        Self { weights, detector }
    }

    pub fn weights(&self) -> &FitnessWeights {
        &self.weights
    }

    pub fn evaluate_chromosome(&self, space: &SearchSpace, chromosome: &mut Chromosome) {
        let breakdown = self.evaluate(space, &chromosome.genes);
        chromosome.fitness = breakdown.total;
        chromosome.breakdown = breakdown;
    }

    pub fn evaluate(&self, space: &SearchSpace, genes: &[Gene]) -> FitnessBreakdown {
        let candidates = space.decode_for_evaluation(genes);

        let mut weighted_tardiness = 0.0;
        let mut earliness_bonus = 0.0;
        for (i, gene) in genes.iter().enumerate() {
            let Some(window) = space.window(i, gene) else {
                continue;
            };
            let plan = &space.plans[i];
            let weight = plan.priority.weight(self.weights.priority_emphasis);
            let slack = (plan.due_date - window.end()).num_minutes() as f64 / MINUTES_PER_HOUR;
            if slack < 0.0 {
                weighted_tardiness += weight * -slack;
            } else {
                earliness_bonus += weight * slack;
            }
        }

        let mut all = space.baseline_assignments().to_vec();
        all.extend(candidates);
        let conflicts: Vec<Conflict> = self
            .detector
            .detect(&all, &space.resources, space.all_plans())
            .into_iter()
            .filter(|c| c.involves_any(space.plan_ids()))
            .collect();
        let high_conflicts = conflicts.iter().filter(|c| c.severity == Severity::High).count();
        let conflict_penalty: f64 = conflicts.iter().map(|c| self.severity_penalty(c.severity)).sum();

        let utilization_variance = utilization_variance(space, genes);

        let total = self.weights.tardiness * weighted_tardiness
            + self.weights.conflict * conflict_penalty
            + self.weights.utilization_variance * utilization_variance
            - self.weights.earliness * earliness_bonus;

        FitnessBreakdown {
            weighted_tardiness,
            conflict_penalty,
            utilization_variance,
            earliness_bonus,
            high_conflicts,
            total,
        }
    }

    fn severity_penalty(&self, severity: Severity) -> f64 {
        match severity {
            Severity::High => self.weights.high_severity_penalty,
            Severity::Medium => self.weights.medium_severity_penalty,
            Severity::Low => self.weights.low_severity_penalty,
        }
    }
}

/// 搜索资源在优化视野内的利用率方差
fn utilization_variance(space: &SearchSpace, genes: &[Gene]) -> f64 {
    let n = space.resources.len();
    if n < 2 {
        return 0.0;
    }
    let horizon = space.horizon();
    let total = horizon.minutes().max(1) as f64;

    let mut booked: Vec<i64> = space
        .baseline()
        .iter()
        .map(|tl| {
            tl.assignments()
                .iter()
                .filter_map(|a| a.window.intersection(horizon))
                .map(|w| w.minutes())
                .sum()
        })
        .collect();
    for (i, gene) in genes.iter().enumerate() {
        if let Some(w) = space.window(i, gene).and_then(|w| w.intersection(horizon)) {
            booked[gene.resource] += w.minutes();
        }
    }

    let utils: Vec<f64> = booked.iter().map(|&m| (m as f64 / total).min(1.0)).collect();
    let mean = utils.iter().sum::<f64>() / n as f64;
    utils.iter().map(|u| (u - mean).powi(2)).sum::<f64>() / n as f64
}
