// ==========================================
// 生产排程引擎 - 染色体编码与搜索空间
// ==========================================
// 编码: 每个计划一个基因 = (候选资源下标, 开始时间)
// 结束时间 = 开始时间 + 该 (计划, 资源) 的估算时长
// ==========================================

use crate::domain::plan::ProductionPlan;
use crate::domain::resource::Resource;
use crate::domain::run::FitnessBreakdown;
use crate::domain::schedule::{Assignment, TimeWindow};
use crate::engine::error::{SchedulingError, SchedulingResult};
use crate::engine::predictor::DurationEstimator;
use crate::engine::timeline::ResourceTimeline;
use chrono::{Duration, NaiveDateTime};
use futures::future::try_join_all;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gene {
    /// `SearchSpace::resources` 下标
    pub resource: usize,
    pub start: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct Chromosome {
    pub genes: Vec<Gene>,
    pub fitness: f64,
    pub breakdown: FitnessBreakdown,
}

impl Chromosome {
    /// 未评估的个体 (适应度为正无穷)
    pub fn new(genes: Vec<Gene>) -> Self {
        Self {
            genes,
            fitness: f64::INFINITY,
            breakdown: FitnessBreakdown::default(),
        }
    }
}

// ==========================================
// SearchSpace - 一次优化的冻结输入
// ==========================================
#[derive(Debug, Clone)]
pub struct SearchSpace {
    /// 待排计划
    pub plans: Vec<ProductionPlan>,
    /// 可用资源 (按ID排序)
    pub resources: Vec<Resource>,
    /// durations[i][r]: 计划 i 在资源 r 上的时长,不兼容为 None
    durations: Vec<Vec<Option<Duration>>>,
    /// candidates[i]: 计划 i 的兼容资源下标
    candidates: Vec<Vec<usize>>,
    /// 计划 i 的最早可开始时间 max(earliest_start, horizon_start)
    lower_bounds: Vec<NaiveDateTime>,
    /// 冻结基线时间线 (与 resources 下标对齐)
    baseline: Vec<ResourceTimeline>,
    baseline_assignments: Vec<Assignment>,
    /// 冲突检测用的计划全集 (待排 + 基线引用)
    all_plans: Vec<ProductionPlan>,
    plan_ids: Vec<String>,
    horizon: TimeWindow,
    slot: Duration,
}

impl SearchSpace {
    /// 构建搜索空间: 预先估算全部 (计划, 兼容资源) 时长
    ///
    /// `baseline` 为已提交时间线 (重排时已剔除被释放计划),
    /// `context_plans` 为基线分配引用的计划
    pub async fn build(
        plans: Vec<ProductionPlan>,
        resources: Vec<Resource>,
        baseline: &BTreeMap<String, ResourceTimeline>,
        context_plans: Vec<ProductionPlan>,
        horizon_start: NaiveDateTime,
        estimator: &DurationEstimator,
        slot_minutes: i64,
    ) -> SchedulingResult<Self> {
        if plans.is_empty() {
            return Err(SchedulingError::Validation("待排计划为空".to_string()));
        }
        let mut resources: Vec<Resource> = resources.into_iter().filter(|r| r.active).collect();
        resources.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));

        let pairs: Vec<(usize, usize)> = plans
            .iter()
            .enumerate()
            .flat_map(|(i, p)| {
                resources
                    .iter()
                    .enumerate()
                    .filter(move |(_, r)| DurationEstimator::is_compatible(p, r))
                    .map(move |(r, _)| (i, r))
            })
            .collect();
        let estimates =
            try_join_all(pairs.iter().map(|&(i, r)| estimator.estimate(&plans[i], &resources[r])))
                .await?;

        let mut durations = vec![vec![None; resources.len()]; plans.len()];
        let mut candidates = vec![Vec::new(); plans.len()];
        for (&(i, r), est) in pairs.iter().zip(estimates) {
            durations[i][r] = Some(est.duration);
            candidates[i].push(r);
        }
        if let Some(i) = candidates.iter().position(|c| c.is_empty()) {
            return Err(SchedulingError::Validation(format!(
                "计划 {} (产品 {}) 没有可用资源",
                plans[i].plan_id, plans[i].product_code
            )));
        }

        let lower_bounds: Vec<NaiveDateTime> =
            plans.iter().map(|p| p.earliest_start.max(horizon_start)).collect();

        let baseline_timelines: Vec<ResourceTimeline> = resources
            .iter()
            .map(|r| {
                baseline
                    .get(&r.resource_id)
                    .cloned()
                    .unwrap_or_else(|| ResourceTimeline::new(&r.resource_id))
            })
            .collect();
        let baseline_assignments: Vec<Assignment> = baseline_timelines
            .iter()
            .flat_map(|tl| tl.assignments().into_iter().cloned())
            .collect();

        let plan_ids: Vec<String> = plans.iter().map(|p| p.plan_id.clone()).collect();
        let own: BTreeSet<&str> = plan_ids.iter().map(String::as_str).collect();
        let mut all_plans = plans.clone();
        all_plans.extend(context_plans.into_iter().filter(|p| !own.contains(p.plan_id.as_str())));

        let horizon_start = lower_bounds.iter().min().copied().unwrap_or(horizon_start);
        let longest = durations
            .iter()
            .flatten()
            .flatten()
            .max()
            .copied()
            .unwrap_or_else(|| Duration::minutes(slot_minutes.max(1)));
        let latest_due = plans.iter().map(|p| p.due_date).max().unwrap_or(horizon_start);
        let latest_lower = lower_bounds.iter().max().copied().unwrap_or(horizon_start);
        let horizon_end = latest_due.max(latest_lower + longest);
        let horizon = TimeWindow::new(horizon_start, horizon_end)
            .map_err(|e| SchedulingError::Internal(e.to_string()))?;

        Ok(Self {
            plans,
            resources,
            durations,
            candidates,
            lower_bounds,
            baseline: baseline_timelines,
            baseline_assignments,
            all_plans,
            plan_ids,
            horizon,
            slot: Duration::minutes(slot_minutes.max(1)),
        })
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn candidates(&self, plan: usize) -> &[usize] {
        &self.candidates[plan]
    }

    pub fn duration(&self, plan: usize, resource: usize) -> Option<Duration> {
        self.durations[plan].get(resource).copied().flatten()
    }

    /// 计划在各兼容资源上的最短时长 (分钟)
    pub fn min_minutes(&self) -> Vec<i64> {
        self.durations
            .iter()
            .map(|row| row.iter().flatten().map(|d| d.num_minutes()).min().unwrap_or(i64::MAX))
            .collect()
    }

    pub fn lower_bound(&self, plan: usize) -> NaiveDateTime {
        self.lower_bounds[plan]
    }

    /// 在交期内完工的最晚开始时间 (无法按期时退化为下界)
    pub fn latest_start(&self, plan: usize, resource: usize) -> NaiveDateTime {
        let lower = self.lower_bounds[plan];
        match self.duration(plan, resource) {
            Some(d) => (self.plans[plan].due_date - d).max(lower),
            None => lower,
        }
    }

    pub fn slot(&self) -> Duration {
        self.slot
    }

    pub fn horizon(&self) -> &TimeWindow {
        &self.horizon
    }

    pub fn baseline(&self) -> &[ResourceTimeline] {
        &self.baseline
    }

    pub fn baseline_assignments(&self) -> &[Assignment] {
        &self.baseline_assignments
    }

    pub fn all_plans(&self) -> &[ProductionPlan] {
        &self.all_plans
    }

    pub fn plan_ids(&self) -> &[String] {
        &self.plan_ids
    }

    pub fn window(&self, plan: usize, gene: &Gene) -> Option<TimeWindow> {
        let d = self.duration(plan, gene.resource)?;
        TimeWindow::starting_at(gene.start, d).ok()
    }

    /// 候选分配; 分配ID由计划ID派生,保证评估过程确定
    pub fn candidate_assignment(&self, plan: usize, gene: &Gene) -> Option<Assignment> {
        let window = self.window(plan, gene)?;
        Some(Assignment {
            assignment_id: format!("candidate/{}", self.plans[plan].plan_id),
            plan_id: self.plans[plan].plan_id.clone(),
            resource_id: self.resources[gene.resource].resource_id.clone(),
            window,
            shared: false,
            created_at: self.horizon.start(),
        })
    }

    pub fn decode_for_evaluation(&self, genes: &[Gene]) -> Vec<Assignment> {
        genes
            .iter()
            .enumerate()
            .filter_map(|(i, g)| self.candidate_assignment(i, g))
            .collect()
    }

    /// 解码为待提交的分配 (新 UUID)
    pub fn decode(&self, chromosome: &Chromosome) -> Vec<Assignment> {
        chromosome
            .genes
            .iter()
            .enumerate()
            .filter_map(|(i, g)| {
                let window = self.window(i, g)?;
                Some(Assignment::new(
                    &self.plans[i].plan_id,
                    &self.resources[g.resource].resource_id,
                    window,
                ))
            })
            .collect()
    }
}
