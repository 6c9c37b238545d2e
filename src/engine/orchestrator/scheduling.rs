// ==========================================
// 编排器 - 自动排程 / 人工排程 / 重排
// ==========================================

use super::commit::CommitRequest;
use super::types::{
    AutoScheduleRequest, ManualScheduleOutcome, ManualScheduleRequest, RescheduleRequest,
    ScheduleOutcome,
};
use super::ScheduleOrchestrator;
use crate::config::SchedulerConfig;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::plan::ProductionPlan;
use crate::domain::run::ScheduleRun;
use crate::domain::schedule::{Assignment, TimeWindow};
use crate::domain::types::{PlanStatus, ScheduleStrategy};
use crate::engine::conflict_detector::ConflictDetector;
use crate::engine::error::{SchedulingError, SchedulingResult};
use crate::engine::events::{ScheduleEvent, ScheduleEventType};
use crate::engine::optimizer::{FitnessEvaluator, Optimizer, SearchControl, SearchSpace};
use crate::engine::predictor::{DurationEstimator, HistoricalRates};
use crate::engine::strategy::StrategyProfile;
use crate::engine::timeline::ResourceTimeline;
use chrono::NaiveDateTime;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, instrument, warn};

fn is_draft(status: PlanStatus) -> bool {
    status == PlanStatus::Draft
}

fn is_reschedulable(status: PlanStatus) -> bool {
    status.is_reschedulable()
}

/// 优化参数
struct OptimizationInput<'a> {
    plans: Vec<ProductionPlan>,
    /// 从基线中剔除的计划 (重排时为被释放的计划)
    excluded: BTreeSet<String>,
    strategy: ScheduleStrategy,
    custom_strategy_id: Option<&'a str>,
    horizon_start: NaiveDateTime,
}

impl ScheduleOrchestrator {
    // ==========================================
    // AutoSchedule
    // ==========================================

    /// 自动排程: 优化 → 复核 → 无阻断冲突 (或强制) 时提交
    #[instrument(skip(self, req, control), fields(plans = req.plan_ids.len(), strategy = %req.strategy))]
    pub async fn auto_schedule(
        &self,
        req: AutoScheduleRequest,
        control: SearchControl,
    ) -> SchedulingResult<ScheduleOutcome> {
        let plans = self.load_plans(&req.plan_ids)?;
        if let Some(p) = plans.iter().find(|p| !is_draft(p.status)) {
            return Err(SchedulingError::Validation(format!(
                "计划 {} 状态为 {},只有 DRAFT 计划可以自动排程",
                p.plan_id, p.status
            )));
        }
        let plan_ids: Vec<String> = plans.iter().map(|p| p.plan_id.clone()).collect();

        let mut cfg = self.load_config()?;
        let run = self
            .run_optimization(
                OptimizationInput {
                    plans,
                    excluded: BTreeSet::new(),
                    strategy: req.strategy,
                    custom_strategy_id: req.custom_strategy_id.as_deref(),
                    horizon_start: req.horizon_start,
                },
                &mut cfg,
                control,
            )
            .await?;
        if run.status.is_interrupted() {
            return self.interrupted_proposal(run, &plan_ids, &[], &cfg).await;
        }

        let outcome = self
            .finish_commit(
                CommitRequest {
                    plan_ids: &plan_ids,
                    added: run.assignments.clone(),
                    removed: Vec::new(),
                    force: req.force_commit,
                    allowed: is_draft,
                },
                &cfg,
                Some(run),
            )
            .await?;

        if outcome.committed {
            self.record_action(
                ActionLog::new(ActionType::AutoSchedule, &req.actor)
                    .with_plans(plan_ids.clone())
                    .with_resources(resource_ids(&outcome.assignments))
                    .with_payload(json!({
                        "run_id": outcome.run_id(),
                        "strategy": req.strategy,
                        "custom_strategy_id": req.custom_strategy_id,
                        "force_commit": req.force_commit,
                        "config": cfg,
                    })),
            );
            self.publish(
                ScheduleEvent::new(
                    ScheduleEventType::AssignmentsCommitted,
                    plan_ids,
                    resource_ids(&outcome.assignments),
                )
                .with_run(outcome.run_id().map(str::to_string))
                .with_range(span(&outcome.assignments))
                .with_source("auto_schedule"),
            );
        }
        Ok(outcome)
    }

    // ==========================================
    // ManualSchedule
    // ==========================================

    /// 人工排程: 单次插入尝试,重叠时返回冲突且不提交
    #[instrument(skip(self, req), fields(plan_id = %req.plan_id, resource_id = %req.resource_id))]
    pub async fn manual_schedule(
        &self,
        req: ManualScheduleRequest,
    ) -> SchedulingResult<ManualScheduleOutcome> {
        let plan = self.load_plan(&req.plan_id)?;
        if !is_draft(plan.status) {
            return Err(SchedulingError::Validation(format!(
                "计划 {} 状态为 {},只有 DRAFT 计划可以人工排程",
                plan.plan_id, plan.status
            )));
        }
        let assignment = self.manual_assignment(&plan, &req.resource_id, req.window)?;
        let cfg = self.load_config()?;
        let plan_ids = vec![plan.plan_id.clone()];

        let result = self
            .commit_assignments(
                CommitRequest {
                    plan_ids: &plan_ids,
                    added: vec![assignment.clone()],
                    removed: Vec::new(),
                    force: true,
                    allowed: is_draft,
                },
                &cfg,
            )
            .await;

        match result {
            Ok(done) => {
                self.record_action(
                    ActionLog::new(ActionType::ManualSchedule, &req.actor)
                        .with_plans(plan_ids.clone())
                        .with_resources(vec![req.resource_id.clone()])
                        .with_payload(json!({
                            "assignment_id": assignment.assignment_id,
                            "window": assignment.window,
                        })),
                );
                self.publish(
                    ScheduleEvent::new(
                        ScheduleEventType::AssignmentsCommitted,
                        plan_ids,
                        vec![req.resource_id.clone()],
                    )
                    .with_range(Some((assignment.window.start(), assignment.window.end())))
                    .with_source("manual_schedule"),
                );
                Ok(ManualScheduleOutcome {
                    committed: done.committed,
                    assignment: Some(assignment),
                    conflict: None,
                    warnings: done.conflicts,
                })
            }
            Err(SchedulingError::Conflict(conflict)) => {
                info!(conflict = %conflict.description, "人工排程与已有分配重叠，未提交");
                Ok(ManualScheduleOutcome {
                    committed: false,
                    assignment: None,
                    conflict: Some(conflict),
                    warnings: Vec::new(),
                })
            }
            Err(e) => Err(e),
        }
    }

    // ==========================================
    // Reschedule
    // ==========================================

    /// 重排: 释放原分配后重新排程,提交时原子替换; 失败保留原分配
    #[instrument(skip(self, req, control), fields(plans = req.plan_ids.len()))]
    pub async fn reschedule(
        &self,
        req: RescheduleRequest,
        control: SearchControl,
    ) -> SchedulingResult<ScheduleOutcome> {
        if req.reason.trim().is_empty() {
            return Err(SchedulingError::Validation("重排必须填写原因".to_string()));
        }
        let plans = self.load_plans(&req.plan_ids)?;
        if let Some(p) = plans.iter().find(|p| !is_reschedulable(p.status)) {
            return Err(SchedulingError::Validation(format!(
                "计划 {} 状态为 {},只有 SCHEDULED/IN_PROGRESS 计划可以重排",
                p.plan_id, p.status
            )));
        }
        let plan_ids: Vec<String> = plans.iter().map(|p| p.plan_id.clone()).collect();
        let excluded: BTreeSet<String> = plan_ids.iter().cloned().collect();

        let old: Vec<Assignment> = self
            .committed
            .assignments()
            .await
            .into_iter()
            .filter(|a| excluded.contains(&a.plan_id))
            .collect();

        let mut cfg = self.load_config()?;
        let strategy = req.strategy.unwrap_or_default();
        let (added, run) = match &req.target {
            Some(target) => {
                if plans.len() != 1 {
                    return Err(SchedulingError::Validation(
                        "指定目标位置的重排只能包含一个计划".to_string(),
                    ));
                }
                let a = self.manual_assignment(&plans[0], &target.resource_id, target.window)?;
                (vec![a], None)
            }
            None => {
                let run = self
                    .run_optimization(
                        OptimizationInput {
                            plans,
                            excluded,
                            strategy,
                            custom_strategy_id: req.custom_strategy_id.as_deref(),
                            horizon_start: req.horizon_start,
                        },
                        &mut cfg,
                        control,
                    )
                    .await?;
                if run.status.is_interrupted() {
                    return self.interrupted_proposal(run, &plan_ids, &old, &cfg).await;
                }
                (run.assignments.clone(), Some(run))
            }
        };

        let outcome = self
            .finish_commit(
                CommitRequest {
                    plan_ids: &plan_ids,
                    added,
                    removed: old.clone(),
                    force: req.force_commit || req.target.is_some(),
                    allowed: is_reschedulable,
                },
                &cfg,
                run,
            )
            .await?;

        if outcome.committed {
            let mut touched = resource_ids(&outcome.assignments);
            touched.extend(resource_ids(&old));
            touched.sort();
            touched.dedup();
            self.record_action(
                ActionLog::new(ActionType::Reschedule, &req.actor)
                    .with_plans(plan_ids.clone())
                    .with_resources(touched.clone())
                    .with_reason(Some(req.reason.clone()))
                    .with_payload(json!({
                        "run_id": outcome.run_id(),
                        "strategy": strategy,
                        "force_commit": req.force_commit,
                        "replaced": old.iter().map(|a| &a.assignment_id).collect::<Vec<_>>(),
                        "config": cfg,
                    })),
            );
            self.publish(
                ScheduleEvent::new(ScheduleEventType::AssignmentsReplaced, plan_ids, touched)
                    .with_run(outcome.run_id().map(str::to_string))
                    .with_range(span(&outcome.assignments))
                    .with_source("reschedule"),
            );
        }
        Ok(outcome)
    }

    // ==========================================
    // 内部步骤
    // ==========================================

    /// 提交并把重叠冲突转换为未提交结果
    async fn finish_commit(
        &self,
        req: CommitRequest<'_>,
        cfg: &SchedulerConfig,
        run: Option<ScheduleRun>,
    ) -> SchedulingResult<ScheduleOutcome> {
        let assignments = req.added.clone();
        match self.commit_assignments(req, cfg).await {
            Ok(done) => Ok(ScheduleOutcome {
                run,
                committed: done.committed,
                assignments,
                conflicts: done.conflicts,
            }),
            Err(SchedulingError::Conflict(conflict)) => {
                warn!(conflict = %conflict.description, "候选方案与最新已提交排程重叠，未提交");
                Ok(ScheduleOutcome {
                    run,
                    committed: false,
                    assignments,
                    conflicts: vec![conflict],
                })
            }
            Err(e) => Err(e),
        }
    }

    /// 被取消或超时的运行只作为建议返回,附带复核冲突,不提交
    async fn interrupted_proposal(
        &self,
        run: ScheduleRun,
        plan_ids: &[String],
        removed: &[Assignment],
        cfg: &SchedulerConfig,
    ) -> SchedulingResult<ScheduleOutcome> {
        let conflicts = self
            .preview_conflicts(plan_ids, &run.assignments, removed, cfg)
            .await?;
        info!(
            run_id = %run.run_id,
            status = %run.status,
            generations = run.generations,
            conflicts = conflicts.len(),
            "优化被打断，结果不提交"
        );
        Ok(ScheduleOutcome {
            committed: false,
            assignments: run.assignments.clone(),
            conflicts,
            run: Some(run),
        })
    }

    /// 校验人工指定的位置并构造分配
    fn manual_assignment(
        &self,
        plan: &ProductionPlan,
        resource_id: &str,
        window: TimeWindow,
    ) -> SchedulingResult<Assignment> {
        let resource = self
            .repos
            .resource_repo
            .find_by_id(resource_id)?
            .ok_or_else(|| SchedulingError::resource_not_found(resource_id))?;
        if !resource.active {
            return Err(SchedulingError::Validation(format!("资源 {} 未启用", resource_id)));
        }
        if !resource.supports(&plan.product_code) {
            return Err(SchedulingError::Validation(format!(
                "资源 {} 不支持产品 {}",
                resource_id, plan.product_code
            )));
        }
        if window.start() < plan.earliest_start || window.end() > plan.due_date {
            return Err(SchedulingError::Validation(format!(
                "时间窗 {} 超出计划 {} 的可排范围 [{}, {}]",
                window, plan.plan_id, plan.earliest_start, plan.due_date
            )));
        }
        Ok(Assignment::new(&plan.plan_id, resource_id, window))
    }

    /// 估算 + 遗传搜索,结果作为 ScheduleRun 落库
    async fn run_optimization(
        &self,
        input: OptimizationInput<'_>,
        cfg: &mut SchedulerConfig,
        control: SearchControl,
    ) -> SchedulingResult<ScheduleRun> {
        let custom = match input.custom_strategy_id {
            Some(id) => Some(
                self.config_manager
                    .get_custom_strategy_profile(id)?
                    .ok_or_else(|| SchedulingError::NotFound {
                        entity: "自定义策略",
                        id: id.to_string(),
                    })?,
            ),
            None => None,
        };
        let profile = StrategyProfile::resolve(input.strategy, custom.as_ref(), cfg);

        let baseline: BTreeMap<String, ResourceTimeline> = self
            .committed
            .snapshot()
            .await
            .into_iter()
            .map(|(id, tl)| (id, tl.without_plans(&input.excluded)))
            .collect();
        let referenced: Vec<String> = self
            .committed
            .assignments()
            .await
            .into_iter()
            .map(|a| a.plan_id)
            .filter(|id| !input.excluded.contains(id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let context_plans = self.repos.plan_repo.find_by_ids(&referenced)?;
        let resources = self.repos.resource_repo.list_active()?;
        let rates = HistoricalRates::from_records(&self.repos.history_repo.list_all()?);
        let estimator = DurationEstimator::new(
            self.predictor.clone(),
            rates,
            cfg.predictor.clone(),
            cfg.optimizer.time_slot_minutes,
        );

        let plan_ids: Vec<String> = input.plans.iter().map(|p| p.plan_id.clone()).collect();
        let space = SearchSpace::build(
            input.plans,
            resources,
            &baseline,
            context_plans,
            input.horizon_start,
            &estimator,
            cfg.optimizer.time_slot_minutes,
        )
        .await?;

        let optimizer = Optimizer::new(
            cfg.optimizer.clone(),
            FitnessEvaluator::new(cfg.weights.clone(), ConflictDetector::new(cfg.detector.clone())),
        );
        let seeding = profile.seeding;
        let started_at = chrono::Utc::now().naive_utc();
        let (space, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = optimizer.run(&space, seeding, &control);
            (space, outcome)
        })
        .await
        .map_err(|e| SchedulingError::Internal(format!("优化任务异常退出: {}", e)))?;

        let run = ScheduleRun {
            run_id: uuid::Uuid::new_v4().to_string(),
            plan_ids,
            strategy: profile.strategy,
            custom_strategy_id: profile.custom_strategy_id.clone(),
            seed: outcome.seed,
            started_at,
            finished_at: chrono::Utc::now().naive_utc(),
            status: outcome.status,
            assignments: space.decode(&outcome.best),
            best_fitness: outcome.best.fitness,
            breakdown: outcome.best.breakdown,
            generations: outcome.generations,
            fitness_history: outcome.fitness_history,
        };
        self.repos.run_repo.insert(&run)?;
        info!(
            run_id = %run.run_id,
            status = %run.status,
            generations = run.generations,
            best_fitness = run.best_fitness,
            "优化运行已记录"
        );
        Ok(run)
    }
}


fn resource_ids(assignments: &[Assignment]) -> Vec<String> {
    assignments
        .iter()
        .map(|a| a.resource_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn span(assignments: &[Assignment]) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let start = assignments.iter().map(|a| a.window.start()).min()?;
    let end = assignments.iter().map(|a| a.window.end()).max()?;
    Some((start, end))
}
