// ==========================================
// 生产排程引擎 - 排程 API
// ==========================================
// 职责: 对外暴露排程、冲突分析、甘特视图、计划生命周期与配置操作
// 说明: 入参校验在此层完成,业务规则交给编排器
// ==========================================

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::config::{config_keys, ConfigManager, CustomStrategyProfile, SchedulerConfig};
use crate::domain::conflict::Conflict;
use crate::domain::plan::ProductionPlan;
use crate::domain::resource::Resource;
use crate::domain::run::ScheduleRun;
use crate::engine::conflict_detector::severity_counts;
use crate::engine::optimizer::SearchControl;
use crate::engine::orchestrator::{
    AutoScheduleRequest, ManualScheduleOutcome, ManualScheduleRequest, NewPlanRequest,
    RescheduleRequest, ScheduleOrchestrator, ScheduleOutcome, ScheduleScope,
};
use crate::engine::projection::GanttRow;
use crate::importer::{HistoryImportSummary, HistoryImporter};
use crate::perf::PerfGuard;

/// 运行记录查询上限
const MAX_RUN_LIMIT: usize = 200;

// ==========================================
// 响应 DTO
// ==========================================

/// 冲突分析结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictReport {
    pub conflicts: Vec<Conflict>,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ConflictReport {
    pub fn new(conflicts: Vec<Conflict>) -> Self {
        let (high, medium, low) = severity_counts(&conflicts);
        Self {
            conflicts,
            high,
            medium,
            low,
        }
    }
}

// ==========================================
// ScheduleApi - 排程 API
// ==========================================
pub struct ScheduleApi {
    orchestrator: Arc<ScheduleOrchestrator>,
    config_manager: Arc<ConfigManager>,
}

impl ScheduleApi {
    pub fn new(orchestrator: Arc<ScheduleOrchestrator>) -> Self {
        let config_manager = orchestrator.config_manager().clone();
        Self {
            orchestrator,
            config_manager,
        }
    }

    // ==========================================
    // 排程
    // ==========================================

    /// 自动排程
    pub async fn auto_schedule(&self, req: AutoScheduleRequest) -> ApiResult<ScheduleOutcome> {
        self.auto_schedule_with(req, SearchControl::new()).await
    }

    /// 自动排程 (可取消/可观察进度)
    pub async fn auto_schedule_with(
        &self,
        req: AutoScheduleRequest,
        control: SearchControl,
    ) -> ApiResult<ScheduleOutcome> {
        let _perf = PerfGuard::new("auto_schedule");
        require_plan_ids(&req.plan_ids)?;
        Ok(self.orchestrator.auto_schedule(req, control).await?)
    }

    /// 人工排程
    pub async fn manual_schedule(
        &self,
        req: ManualScheduleRequest,
    ) -> ApiResult<ManualScheduleOutcome> {
        let _perf = PerfGuard::new("manual_schedule");
        require_non_empty("plan_id", &req.plan_id)?;
        require_non_empty("resource_id", &req.resource_id)?;
        Ok(self.orchestrator.manual_schedule(req).await?)
    }

    /// 重排
    pub async fn reschedule(&self, req: RescheduleRequest) -> ApiResult<ScheduleOutcome> {
        self.reschedule_with(req, SearchControl::new()).await
    }

    pub async fn reschedule_with(
        &self,
        req: RescheduleRequest,
        control: SearchControl,
    ) -> ApiResult<ScheduleOutcome> {
        let _perf = PerfGuard::new("reschedule");
        require_plan_ids(&req.plan_ids)?;
        require_non_empty("reason", &req.reason)?;
        Ok(self.orchestrator.reschedule(req, control).await?)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 冲突分析 (只读)
    pub async fn conflicts(&self, scope: ScheduleScope) -> ApiResult<ConflictReport> {
        let _perf = PerfGuard::new("conflicts");
        validate_scope(&scope)?;
        let conflicts = self.orchestrator.conflict_analysis(&scope).await?;
        Ok(ConflictReport::new(conflicts))
    }

    /// 甘特视图
    pub async fn gantt(&self, scope: ScheduleScope) -> ApiResult<Vec<GanttRow>> {
        let _perf = PerfGuard::new("gantt");
        validate_scope(&scope)?;
        Ok(self.orchestrator.gantt(&scope).await?)
    }

    pub fn get_plan(&self, plan_id: &str) -> ApiResult<ProductionPlan> {
        Ok(self.orchestrator.get_plan(plan_id)?)
    }

    pub fn list_plans(&self) -> ApiResult<Vec<ProductionPlan>> {
        let _perf = PerfGuard::new("list_plans");
        Ok(self.orchestrator.list_plans()?)
    }

    pub fn list_schedule_runs(&self, limit: usize) -> ApiResult<Vec<ScheduleRun>> {
        let _perf = PerfGuard::new("list_schedule_runs");
        Ok(self
            .orchestrator
            .list_schedule_runs(limit.clamp(1, MAX_RUN_LIMIT))?)
    }

    pub fn get_schedule_run(&self, run_id: &str) -> ApiResult<ScheduleRun> {
        Ok(self.orchestrator.get_schedule_run(run_id)?)
    }

    // ==========================================
    // 计划生命周期
    // ==========================================

    pub fn submit_plan(&self, req: NewPlanRequest) -> ApiResult<ProductionPlan> {
        let _perf = PerfGuard::new("submit_plan");
        if let Some(id) = &req.plan_id {
            require_non_empty("plan_id", id)?;
        }
        Ok(self.orchestrator.submit_plan(req)?)
    }

    pub async fn start_plan(&self, plan_id: &str, actor: &str) -> ApiResult<ProductionPlan> {
        Ok(self.orchestrator.start_plan(plan_id, actor).await?)
    }

    pub async fn report_progress(
        &self,
        plan_id: &str,
        completed_quantity: f64,
        actor: &str,
    ) -> ApiResult<ProductionPlan> {
        Ok(self
            .orchestrator
            .report_progress(plan_id, completed_quantity, actor)
            .await?)
    }

    pub async fn complete_plan(
        &self,
        plan_id: &str,
        completed_quantity: Option<f64>,
        actor: &str,
    ) -> ApiResult<ProductionPlan> {
        let _perf = PerfGuard::new("complete_plan");
        Ok(self
            .orchestrator
            .complete_plan(plan_id, completed_quantity, actor)
            .await?)
    }

    pub async fn cancel_plan(
        &self,
        plan_id: &str,
        reason: Option<String>,
        actor: &str,
    ) -> ApiResult<ProductionPlan> {
        let _perf = PerfGuard::new("cancel_plan");
        Ok(self.orchestrator.cancel_plan(plan_id, reason, actor).await?)
    }

    // ==========================================
    // 资源与历史
    // ==========================================

    /// 新增或更新资源
    pub fn upsert_resource(&self, resource: Resource) -> ApiResult<Resource> {
        require_non_empty("resource_id", &resource.resource_id)?;
        if resource.daily_capacity_minutes <= 0 || resource.daily_capacity_minutes > 24 * 60 {
            return Err(ApiError::InvalidInput(format!(
                "每日可用分钟必须在 (0, 1440] 内: {}",
                resource.daily_capacity_minutes
            )));
        }
        if resource.nominal_rate_per_hour <= 0.0 || !resource.nominal_rate_per_hour.is_finite() {
            return Err(ApiError::InvalidInput(format!(
                "额定速率必须为正数: {}",
                resource.nominal_rate_per_hour
            )));
        }
        self.orchestrator
            .repositories()
            .resource_repo()
            .upsert(&resource)?;
        info!(resource_id = %resource.resource_id, active = resource.active, "资源已保存");
        Ok(resource)
    }

    pub fn list_resources(&self) -> ApiResult<Vec<Resource>> {
        Ok(self.orchestrator.repositories().resource_repo().list_all()?)
    }

    /// 导入完工历史 CSV
    pub fn import_history(&self, path: &Path) -> ApiResult<HistoryImportSummary> {
        let _perf = PerfGuard::new("import_history");
        let importer = HistoryImporter::new(self.orchestrator.repositories().history_repo().clone());
        importer
            .import_file(path)
            .map_err(|e| ApiError::ImportError(e.to_string()))
    }

    // ==========================================
    // 配置
    // ==========================================

    /// 当前生效的排程配置
    pub fn get_config(&self) -> ApiResult<SchedulerConfig> {
        Ok(self.config_manager.load_scheduler_config()?)
    }

    /// 覆写单个配置项 (只接受已知键)
    pub fn set_config_value(&self, key: &str, value: &str) -> ApiResult<()> {
        if !config_keys::ALL.contains(&key) {
            return Err(ApiError::InvalidInput(format!("未知配置键: {}", key)));
        }
        self.config_manager.set_global_config_value(key, value.trim())?;
        info!(key, value, "配置已更新");
        Ok(())
    }

    pub fn save_custom_strategy(&self, profile: CustomStrategyProfile) -> ApiResult<()> {
        self.config_manager.save_custom_strategy_profile(&profile)?;
        Ok(())
    }

    pub fn list_custom_strategies(&self) -> ApiResult<Vec<CustomStrategyProfile>> {
        Ok(self.config_manager.list_custom_strategy_profiles()?)
    }
}

// ==========================================
// 入参校验
// ==========================================

fn require_non_empty(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{} 不能为空", field)));
    }
    Ok(())
}

fn require_plan_ids(plan_ids: &[String]) -> ApiResult<()> {
    if plan_ids.is_empty() {
        return Err(ApiError::InvalidInput("plan_ids 不能为空".to_string()));
    }
    for id in plan_ids {
        require_non_empty("plan_id", id)?;
    }
    Ok(())
}

fn validate_scope(scope: &ScheduleScope) -> ApiResult<()> {
    if let (Some(from), Some(to)) = (scope.from, scope.to) {
        if from >= to {
            return Err(ApiError::InvalidInput(format!(
                "查询范围无效: from={} 必须早于 to={}",
                from, to
            )));
        }
    }
    Ok(())
}
