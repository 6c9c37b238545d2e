// ==========================================
// 生产排程引擎 - 排程编排器
// ==========================================
// 职责: 协调 估算 → 优化 → 复核 → 提交 的完整流程
// 红线: 已提交时间线只在提交步骤、持资源锁时修改
// 红线: 优化在锁外运行,只读取基线快照
// 红线: 提交失败 (冲突/落库失败) 时已提交状态保持原样
// ==========================================

mod commit;
mod lifecycle;
mod queries;
mod scheduling;
pub mod types;

pub use types::{
    AutoScheduleRequest, ManualScheduleOutcome, ManualScheduleRequest, ManualTarget,
    NewPlanRequest, RescheduleRequest, ScheduleOutcome, ScheduleScope, DEFAULT_ACTOR,
};

use crate::config::{ConfigManager, SchedulerConfig};
use crate::domain::action_log::ActionLog;
use crate::domain::plan::ProductionPlan;
use crate::engine::committed::CommittedSchedule;
use crate::engine::error::{SchedulingError, SchedulingResult};
use crate::engine::events::{OptionalEventPublisher, ScheduleEvent};
use crate::engine::predictor::DurationPredictor;
use crate::engine::repositories::ScheduleRepositories;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

// ==========================================
// ScheduleOrchestrator - 排程编排器
// ==========================================
pub struct ScheduleOrchestrator {
    repos: ScheduleRepositories,
    config_manager: Arc<ConfigManager>,
    committed: CommittedSchedule,
    predictor: Option<Arc<dyn DurationPredictor>>,
    events: OptionalEventPublisher,
}

impl ScheduleOrchestrator {
    /// 创建编排器并从库中重建已提交时间线
    ///
    /// # 参数
    /// - repos: 仓储集合
    /// - config_manager: 配置管理器 (每次操作读取最新配置)
    /// - predictor: 外部工时预测器,None 时只用历史速率启发式
    /// - events: 事件发布者
    pub fn new(
        repos: ScheduleRepositories,
        config_manager: Arc<ConfigManager>,
        predictor: Option<Arc<dyn DurationPredictor>>,
        events: OptionalEventPublisher,
    ) -> SchedulingResult<Self> {
        let config = config_manager.load_scheduler_config()?;
        let assignments = repos.assignment_repo.list_all()?;
        let committed = CommittedSchedule::from_assignments(&assignments, config.orchestrator)?;
        info!(assignments = assignments.len(), "已提交排程加载完成");

        Ok(Self {
            repos,
            config_manager,
            committed,
            predictor,
            events,
        })
    }

    pub fn repositories(&self) -> &ScheduleRepositories {
        &self.repos
    }

    pub fn config_manager(&self) -> &Arc<ConfigManager> {
        &self.config_manager
    }

    fn load_config(&self) -> SchedulingResult<SchedulerConfig> {
        Ok(self.config_manager.load_scheduler_config()?)
    }

    /// 按请求顺序加载计划 (去重),任一不存在即报 NotFound
    fn load_plans(&self, plan_ids: &[String]) -> SchedulingResult<Vec<ProductionPlan>> {
        if plan_ids.is_empty() {
            return Err(SchedulingError::Validation("计划列表为空".to_string()));
        }
        let mut seen = BTreeSet::new();
        let mut plans = Vec::with_capacity(plan_ids.len());
        for id in plan_ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            let plan = self
                .repos
                .plan_repo
                .find_by_id(id)?
                .ok_or_else(|| SchedulingError::plan_not_found(id))?;
            plans.push(plan);
        }
        Ok(plans)
    }

    fn load_plan(&self, plan_id: &str) -> SchedulingResult<ProductionPlan> {
        self.repos
            .plan_repo
            .find_by_id(plan_id)?
            .ok_or_else(|| SchedulingError::plan_not_found(plan_id))
    }

    /// 写操作日志; 失败只告警 (业务数据已落库)
    fn record_action(&self, log: ActionLog) {
        let action_type = log.action_type.clone();
        if let Err(e) = self.repos.action_log_repo.insert(&log) {
            warn!(action_type = %action_type, error = %e, "操作日志写入失败");
        }
    }

    fn publish(&self, event: ScheduleEvent) {
        self.events.publish(event);
    }
}
