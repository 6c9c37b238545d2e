// ==========================================
// 编排器 - 只读查询
// ==========================================
// 冲突分析与甘特投影都基于已提交状态的快照,从不修改状态
// ==========================================

use super::types::ScheduleScope;
use super::ScheduleOrchestrator;
use crate::domain::conflict::Conflict;
use crate::domain::plan::ProductionPlan;
use crate::domain::run::ScheduleRun;
use crate::domain::schedule::Assignment;
use crate::engine::conflict_detector::ConflictDetector;
use crate::engine::error::{SchedulingError, SchedulingResult};
use crate::engine::projection::{project, GanttRow};
use std::collections::BTreeSet;

impl ScheduleOrchestrator {
    /// 已提交分配 (按范围过滤)
    pub async fn committed_assignments(&self, scope: &ScheduleScope) -> Vec<Assignment> {
        self.committed
            .assignments()
            .await
            .into_iter()
            .filter(|a| scope.includes(a))
            .collect()
    }

    /// 冲突分析 (只读); 同一已提交状态下结果的顺序与内容一致
    pub async fn conflict_analysis(&self, scope: &ScheduleScope) -> SchedulingResult<Vec<Conflict>> {
        let cfg = self.load_config()?;
        let assignments = self.committed_assignments(scope).await;
        let plans = self.referenced_plans(&assignments)?;
        let resources = self.repos.resource_repo.list_all()?;
        Ok(ConflictDetector::new(cfg.detector).detect(&assignments, &resources, &plans))
    }

    /// 甘特视图
    pub async fn gantt(&self, scope: &ScheduleScope) -> SchedulingResult<Vec<GanttRow>> {
        let assignments = self.committed_assignments(scope).await;
        let plans = self.referenced_plans(&assignments)?;
        let resources = self.repos.resource_repo.list_all()?;
        Ok(project(&resources, &assignments, &plans, scope.window().as_ref()))
    }

    pub fn get_plan(&self, plan_id: &str) -> SchedulingResult<ProductionPlan> {
        self.load_plan(plan_id)
    }

    pub fn list_plans(&self) -> SchedulingResult<Vec<ProductionPlan>> {
        Ok(self.repos.plan_repo.list_all()?)
    }

    pub fn list_schedule_runs(&self, limit: usize) -> SchedulingResult<Vec<ScheduleRun>> {
        Ok(self.repos.run_repo.list_recent(limit)?)
    }

    pub fn get_schedule_run(&self, run_id: &str) -> SchedulingResult<ScheduleRun> {
        self.repos
            .run_repo
            .find_by_id(run_id)?
            .ok_or_else(|| SchedulingError::NotFound {
                entity: "优化运行",
                id: run_id.to_string(),
            })
    }

    fn referenced_plans(&self, assignments: &[Assignment]) -> SchedulingResult<Vec<ProductionPlan>> {
        let ids: Vec<String> = assignments
            .iter()
            .map(|a| a.plan_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Ok(self.repos.plan_repo.find_by_ids(&ids)?)
    }
}
