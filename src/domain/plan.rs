// ==========================================
// 生产排程引擎 - 生产计划领域模型
// ==========================================
// 红线: 计划只能通过编排器操作变更
// 红线: 已完工数量不可被重排覆盖
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::schedule::TimeWindow;
use crate::domain::types::{PlanStatus, Priority};

// ==========================================
// ProductionPlan - 生产计划
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionPlan {
    pub plan_id: String,                       // 计划ID
    pub product_code: String,                  // 产品编码
    pub target_quantity: f64,                  // 目标数量
    #[serde(default)]
    pub completed_quantity: f64,               // 已完工数量
    pub earliest_start: NaiveDateTime,         // 最早开工
    pub due_date: NaiveDateTime,               // 交期
    pub priority: Priority,                    // 优先级
    pub status: PlanStatus,                    // 状态
    #[serde(default)]
    pub assigned_resource_id: Option<String>,  // 已分配资源
    #[serde(default)]
    pub assigned_window: Option<TimeWindow>,   // 已分配时间窗
    pub created_at: NaiveDateTime,             // 创建时间
    pub updated_at: NaiveDateTime,             // 更新时间
}

impl ProductionPlan {
    /// 剩余待生产数量
    pub fn remaining_quantity(&self) -> f64 {
        (self.target_quantity - self.completed_quantity).max(0.0)
    }

    /// 计划的可排时间边界 [earliest_start, due_date)
    ///
    /// 交期不晚于最早开工时返回 None
    pub fn bounds(&self) -> Option<TimeWindow> {
        TimeWindow::new(self.earliest_start, self.due_date).ok()
    }

    pub fn is_assigned(&self) -> bool {
        self.assigned_resource_id.is_some() && self.assigned_window.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn plan(target: f64, done: f64) -> ProductionPlan {
        let t0 = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        ProductionPlan {
            plan_id: "P001".to_string(),
            product_code: "GEAR-A".to_string(),
            target_quantity: target,
            completed_quantity: done,
            earliest_start: t0,
            due_date: t0 + chrono::Duration::days(3),
            priority: Priority::Medium,
            status: PlanStatus::Draft,
            assigned_resource_id: None,
            assigned_window: None,
            created_at: t0,
            updated_at: t0,
        }
    }

    #[test]
    fn test_remaining_quantity_never_negative() {
        assert_eq!(plan(100.0, 40.0).remaining_quantity(), 60.0);
        assert_eq!(plan(100.0, 120.0).remaining_quantity(), 0.0);
    }

    #[test]
    fn test_bounds() {
        let p = plan(10.0, 0.0);
        assert_eq!(p.bounds().unwrap().minutes(), 3 * 24 * 60);
    }
}
