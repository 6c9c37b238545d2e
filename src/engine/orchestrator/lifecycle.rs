// ==========================================
// 编排器 - 计划生命周期
// ==========================================
// 状态机: Draft → Scheduled → InProgress → Completed
//         任意非终态 → Cancelled
// 完工/取消释放分配; 完工写入历史记录供工时估算使用
// 读改写计划行前先取计划锁,与排程提交串行
// ==========================================

use super::types::NewPlanRequest;
use super::ScheduleOrchestrator;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::history::CompletionRecord;
use crate::domain::plan::ProductionPlan;
use crate::domain::types::PlanStatus;
use crate::engine::error::{SchedulingError, SchedulingResult};
use crate::engine::events::{ScheduleEvent, ScheduleEventType};
use serde_json::json;
use tracing::{info, instrument, warn};

impl ScheduleOrchestrator {
    /// 提交新计划 (Draft)
    #[instrument(skip(self, req), fields(product = %req.product_code))]
    pub fn submit_plan(&self, req: NewPlanRequest) -> SchedulingResult<ProductionPlan> {
        if req.product_code.trim().is_empty() {
            return Err(SchedulingError::Validation("产品编码不能为空".to_string()));
        }
        if req.target_quantity <= 0.0 || !req.target_quantity.is_finite() {
            return Err(SchedulingError::Validation(format!(
                "目标数量必须为正数: {}",
                req.target_quantity
            )));
        }
        if req.due_date <= req.earliest_start {
            return Err(SchedulingError::Validation(format!(
                "交期 {} 必须晚于最早开工 {}",
                req.due_date, req.earliest_start
            )));
        }

        let now = chrono::Utc::now().naive_utc();
        let plan = ProductionPlan {
            plan_id: req
                .plan_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            product_code: req.product_code.trim().to_string(),
            target_quantity: req.target_quantity,
            completed_quantity: 0.0,
            earliest_start: req.earliest_start,
            due_date: req.due_date,
            priority: req.priority,
            status: PlanStatus::Draft,
            assigned_resource_id: None,
            assigned_window: None,
            created_at: now,
            updated_at: now,
        };
        self.repos.plan_repo.insert(&plan)?;

        self.record_action(
            ActionLog::new(ActionType::SubmitPlan, &req.actor)
                .with_plans(vec![plan.plan_id.clone()])
                .with_payload(json!({
                    "product_code": plan.product_code,
                    "target_quantity": plan.target_quantity,
                    "priority": plan.priority,
                })),
        );
        info!(plan_id = %plan.plan_id, "计划已提交");
        Ok(plan)
    }

    /// 开工: Scheduled → InProgress
    pub async fn start_plan(&self, plan_id: &str, actor: &str) -> SchedulingResult<ProductionPlan> {
        let _guard = self.lock_plan(plan_id).await?;
        let mut plan = self.load_plan(plan_id)?;
        if plan.status != PlanStatus::Scheduled {
            return Err(transition_error(&plan, PlanStatus::InProgress));
        }
        plan.status = PlanStatus::InProgress;
        plan.updated_at = chrono::Utc::now().naive_utc();
        self.repos.plan_repo.update(&plan)?;

        self.record_action(
            ActionLog::new(ActionType::StartPlan, actor).with_plans(vec![plan.plan_id.clone()]),
        );
        self.publish(
            ScheduleEvent::new(
                ScheduleEventType::PlanStatusChanged,
                vec![plan.plan_id.clone()],
                plan.assigned_resource_id.iter().cloned().collect(),
            )
            .with_source("start_plan"),
        );
        Ok(plan)
    }

    /// 报工: 更新累计完工数量 (只增不减,不超过目标)
    pub async fn report_progress(
        &self,
        plan_id: &str,
        completed_quantity: f64,
        actor: &str,
    ) -> SchedulingResult<ProductionPlan> {
        let _guard = self.lock_plan(plan_id).await?;
        let mut plan = self.load_plan(plan_id)?;
        if plan.status != PlanStatus::InProgress {
            return Err(SchedulingError::Validation(format!(
                "计划 {} 状态为 {},只有 IN_PROGRESS 计划可以报工",
                plan.plan_id, plan.status
            )));
        }
        validate_quantity(&plan, completed_quantity)?;

        let previous = plan.completed_quantity;
        plan.completed_quantity = completed_quantity;
        plan.updated_at = chrono::Utc::now().naive_utc();
        self.repos.plan_repo.update(&plan)?;

        self.record_action(
            ActionLog::new(ActionType::ReportProgress, actor)
                .with_plans(vec![plan.plan_id.clone()])
                .with_payload(json!({
                    "previous_quantity": previous,
                    "completed_quantity": completed_quantity,
                })),
        );
        Ok(plan)
    }

    /// 完工: InProgress → Completed,释放分配并写入完工历史
    #[instrument(skip(self))]
    pub async fn complete_plan(
        &self,
        plan_id: &str,
        completed_quantity: Option<f64>,
        actor: &str,
    ) -> SchedulingResult<ProductionPlan> {
        let _guard = self.lock_plan(plan_id).await?;
        let mut plan = self.load_plan(plan_id)?;
        if !plan.status.can_transition_to(PlanStatus::Completed) {
            return Err(transition_error(&plan, PlanStatus::Completed));
        }
        let final_quantity = completed_quantity.unwrap_or(plan.target_quantity);
        validate_quantity(&plan, final_quantity)?;

        let now = chrono::Utc::now().naive_utc();
        plan.completed_quantity = final_quantity;
        plan.status = PlanStatus::Completed;
        plan.updated_at = now;
        let released = self.release_assignment(&plan).await?;

        if let (Some(resource_id), Some(window)) = (&plan.assigned_resource_id, plan.assigned_window) {
            let record = CompletionRecord {
                record_id: uuid::Uuid::new_v4().to_string(),
                plan_id: Some(plan.plan_id.clone()),
                product_code: plan.product_code.clone(),
                resource_id: resource_id.clone(),
                quantity: final_quantity,
                duration_minutes: window.minutes(),
                completed_at: now,
            };
            if let Err(e) = self.repos.history_repo.insert(&record) {
                warn!(plan_id = %plan.plan_id, error = %e, "完工历史写入失败");
            }
        }

        self.record_action(
            ActionLog::new(ActionType::CompletePlan, actor)
                .with_plans(vec![plan.plan_id.clone()])
                .with_resources(released.iter().map(|a| a.resource_id.clone()).collect())
                .with_payload(json!({ "completed_quantity": final_quantity })),
        );
        self.publish(
            ScheduleEvent::new(
                ScheduleEventType::AssignmentsReleased,
                vec![plan.plan_id.clone()],
                released.iter().map(|a| a.resource_id.clone()).collect(),
            )
            .with_source("complete_plan"),
        );
        info!(plan_id = %plan.plan_id, released = released.len(), "计划已完工");
        Ok(plan)
    }

    /// 取消: 任意非终态 → Cancelled,释放分配
    #[instrument(skip(self))]
    pub async fn cancel_plan(
        &self,
        plan_id: &str,
        reason: Option<String>,
        actor: &str,
    ) -> SchedulingResult<ProductionPlan> {
        let _guard = self.lock_plan(plan_id).await?;
        let mut plan = self.load_plan(plan_id)?;
        if !plan.status.can_transition_to(PlanStatus::Cancelled) {
            return Err(transition_error(&plan, PlanStatus::Cancelled));
        }
        plan.status = PlanStatus::Cancelled;
        plan.updated_at = chrono::Utc::now().naive_utc();
        let released = self.release_assignment(&plan).await?;

        self.record_action(
            ActionLog::new(ActionType::CancelPlan, actor)
                .with_plans(vec![plan.plan_id.clone()])
                .with_resources(released.iter().map(|a| a.resource_id.clone()).collect())
                .with_reason(reason),
        );
        if !released.is_empty() {
            self.publish(
                ScheduleEvent::new(
                    ScheduleEventType::AssignmentsReleased,
                    vec![plan.plan_id.clone()],
                    released.iter().map(|a| a.resource_id.clone()).collect(),
                )
                .with_source("cancel_plan"),
            );
        }
        Ok(plan)
    }
}

fn transition_error(plan: &ProductionPlan, to: PlanStatus) -> SchedulingError {
    SchedulingError::InvalidStateTransition {
        plan_id: plan.plan_id.clone(),
        from: plan.status,
        to,
    }
}

fn validate_quantity(plan: &ProductionPlan, quantity: f64) -> SchedulingResult<()> {
    if !quantity.is_finite() || quantity < plan.completed_quantity {
        return Err(SchedulingError::Validation(format!(
            "完工数量 {} 不能小于已报工数量 {}",
            quantity, plan.completed_quantity
        )));
    }
    if quantity > plan.target_quantity {
        return Err(SchedulingError::Validation(format!(
            "完工数量 {} 超过目标数量 {}",
            quantity, plan.target_quantity
        )));
    }
    Ok(())
}
