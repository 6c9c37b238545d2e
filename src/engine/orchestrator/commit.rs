// ==========================================
// 编排器 - 提交步骤
// ==========================================
// 流程: 计划锁 → 资源锁 → 锁内复核计划 → 副本上演算 → 冲突复核 → 事务落库 → 替换时间线
// 任一步失败即丢弃副本,已提交状态不变
// ==========================================

use super::ScheduleOrchestrator;
use crate::config::SchedulerConfig;
use crate::domain::conflict::Conflict;
use crate::domain::plan::ProductionPlan;
use crate::domain::resource::Resource;
use crate::domain::schedule::Assignment;
use crate::domain::types::PlanStatus;
use crate::engine::committed::PlanGuards;
use crate::engine::conflict_detector::ConflictDetector;
use crate::engine::error::{SchedulingError, SchedulingResult};
use crate::engine::timeline::ResourceTimeline;
use crate::repository::AssignmentBatch;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// 一次分配提交
pub(super) struct CommitRequest<'a> {
    /// 本次排程的计划
    pub plan_ids: &'a [String],
    pub added: Vec<Assignment>,
    /// 被替换的旧分配 (重排)
    pub removed: Vec<Assignment>,
    pub force: bool,
    /// 锁内复核计划状态
    pub allowed: fn(PlanStatus) -> bool,
}

pub(super) struct CommitResult {
    pub committed: bool,
    pub conflicts: Vec<Conflict>,
}

impl ScheduleOrchestrator {
    /// 提交分配; 插入重叠时返回 SchedulingError::Conflict
    pub(super) async fn commit_assignments(
        &self,
        req: CommitRequest<'_>,
        cfg: &SchedulerConfig,
    ) -> SchedulingResult<CommitResult> {
        let plan_keys: BTreeSet<String> = req
            .plan_ids
            .iter()
            .cloned()
            .chain(req.added.iter().chain(req.removed.iter()).map(|a| a.plan_id.clone()))
            .collect();
        let _plan_guards = self.committed.lock_plans(&plan_keys).await?;

        let resource_ids: BTreeSet<String> = req
            .added
            .iter()
            .chain(req.removed.iter())
            .map(|a| a.resource_id.clone())
            .collect();
        let mut locked = self.committed.lock(&resource_ids).await?;
        let mut working = locked.working_copies();

        let mut plans = self.load_plans(req.plan_ids)?;
        if let Some(p) = plans.iter().find(|p| !(req.allowed)(p.status)) {
            return Err(SchedulingError::Validation(format!(
                "计划 {} 当前状态为 {},不能提交",
                p.plan_id, p.status
            )));
        }
        self.ensure_single_assignment(&req)?;

        for old in &req.removed {
            let gone = working
                .get_mut(&old.resource_id)
                .and_then(|tl| tl.remove(&old.assignment_id));
            if gone.is_none() {
                return Err(SchedulingError::Validation(format!(
                    "分配 {} 已被其他操作修改",
                    old.assignment_id
                )));
            }
        }
        for a in &req.added {
            working
                .entry(a.resource_id.clone())
                .or_insert_with(|| ResourceTimeline::new(&a.resource_id))
                .insert(a.clone())
                .map_err(SchedulingError::Conflict)?;
        }

        let conflicts = self.review(&working, req.plan_ids, cfg)?;
        let blocking = conflicts.iter().filter(|c| c.is_blocking()).count();
        if blocking > 0 && !req.force {
            debug!(blocking, "复核存在阻断冲突，不提交");
            return Ok(CommitResult {
                committed: false,
                conflicts,
            });
        }

        let now = chrono::Utc::now().naive_utc();
        for plan in plans.iter_mut() {
            if let Some(a) = req.added.iter().find(|a| a.plan_id == plan.plan_id) {
                plan.assigned_resource_id = Some(a.resource_id.clone());
                plan.assigned_window = Some(a.window);
            }
            if plan.status == PlanStatus::Draft {
                plan.status = PlanStatus::Scheduled;
            }
            plan.updated_at = now;
        }
        let removed_ids: Vec<String> = req.removed.iter().map(|a| a.assignment_id.clone()).collect();
        self.repos.assignment_repo.commit_batch(AssignmentBatch {
            removed: &removed_ids,
            added: &req.added,
            plans: &plans,
        })?;
        locked.replace_all(working);

        info!(
            plans = req.plan_ids.len(),
            added = req.added.len(),
            removed = removed_ids.len(),
            forced = blocking > 0,
            "分配已提交"
        );
        Ok(CommitResult {
            committed: true,
            conflicts,
        })
    }

    /// 一个计划至多一条分配: 新增的计划在库中已有的分配必须全部在本次替换之列
    fn ensure_single_assignment(&self, req: &CommitRequest<'_>) -> SchedulingResult<()> {
        let removed: BTreeSet<&str> = req.removed.iter().map(|a| a.assignment_id.as_str()).collect();
        let mut seen = BTreeSet::new();
        for a in &req.added {
            if !seen.insert(a.plan_id.as_str()) {
                return Err(SchedulingError::Validation(format!(
                    "计划 {} 在一次提交中出现多条分配",
                    a.plan_id
                )));
            }
            let existing = self.repos.assignment_repo.list_by_plan(&a.plan_id)?;
            if let Some(other) = existing
                .iter()
                .find(|e| !removed.contains(e.assignment_id.as_str()))
            {
                return Err(SchedulingError::Validation(format!(
                    "计划 {} 已分配到资源 {},不能重复分配",
                    a.plan_id, other.resource_id
                )));
            }
        }
        Ok(())
    }

    /// 锁定单个计划; 生命周期写操作在读计划前调用
    pub(super) async fn lock_plan(&self, plan_id: &str) -> SchedulingResult<PlanGuards> {
        let ids: BTreeSet<String> = [plan_id.to_string()].into_iter().collect();
        self.committed.lock_plans(&ids).await
    }

    /// 释放计划的分配并写回计划 (完工/取消)
    ///
    /// 调用方须已持有该计划的计划锁
    pub(super) async fn release_assignment(
        &self,
        plan: &ProductionPlan,
    ) -> SchedulingResult<Vec<Assignment>> {
        let Some(resource_id) = plan.assigned_resource_id.clone() else {
            self.repos.plan_repo.update(plan)?;
            return Ok(Vec::new());
        };

        let ids: BTreeSet<String> = [resource_id.clone()].into_iter().collect();
        let mut locked = self.committed.lock(&ids).await?;
        let mut working = locked.working_copies();

        let released: Vec<Assignment> = working
            .get(&resource_id)
            .map(|tl| {
                tl.assignments()
                    .into_iter()
                    .filter(|a| a.plan_id == plan.plan_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some(tl) = working.get_mut(&resource_id) {
            for a in &released {
                tl.remove(&a.assignment_id);
            }
        }

        let removed_ids: Vec<String> = released.iter().map(|a| a.assignment_id.clone()).collect();
        self.repos.assignment_repo.commit_batch(AssignmentBatch {
            removed: &removed_ids,
            added: &[],
            plans: std::slice::from_ref(plan),
        })?;
        locked.replace_all(working);
        Ok(released)
    }

    /// 不加锁、不落库的复核: 在已提交快照上演算候选方案
    ///
    /// 用于被取消/超时的运行,只给出冲突供调用方决定是否重新提交
    pub(super) async fn preview_conflicts(
        &self,
        plan_ids: &[String],
        added: &[Assignment],
        removed: &[Assignment],
        cfg: &SchedulerConfig,
    ) -> SchedulingResult<Vec<Conflict>> {
        let mut working = self.committed.snapshot().await;
        for old in removed {
            if let Some(tl) = working.get_mut(&old.resource_id) {
                tl.remove(&old.assignment_id);
            }
        }
        let mut overlaps = Vec::new();
        for a in added {
            let inserted = working
                .entry(a.resource_id.clone())
                .or_insert_with(|| ResourceTimeline::new(&a.resource_id))
                .insert(a.clone());
            if let Err(conflict) = inserted {
                overlaps.push(conflict);
            }
        }
        overlaps.extend(self.review(&working, plan_ids, cfg)?);
        Ok(overlaps)
    }

    /// 在演算后的时间线上复核,只保留涉及本次计划的冲突
    fn review(
        &self,
        working: &BTreeMap<String, ResourceTimeline>,
        plan_ids: &[String],
        cfg: &SchedulerConfig,
    ) -> SchedulingResult<Vec<Conflict>> {
        let assignments: Vec<Assignment> = working
            .values()
            .flat_map(|tl| tl.assignments().into_iter().cloned())
            .collect();
        let referenced: Vec<String> = assignments
            .iter()
            .map(|a| a.plan_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let plans = self.repos.plan_repo.find_by_ids(&referenced)?;
        let resources = self.find_resources(working.keys())?;

        Ok(ConflictDetector::new(cfg.detector.clone())
            .detect(&assignments, &resources, &plans)
            .into_iter()
            .filter(|c| c.involves_any(plan_ids))
            .collect())
    }

    pub(super) fn find_resources<'a, I>(&self, ids: I) -> SchedulingResult<Vec<Resource>>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut out = Vec::new();
        for id in ids {
            if let Some(r) = self.repos.resource_repo.find_by_id(id)? {
                out.push(r);
            }
        }
        Ok(out)
    }
}
