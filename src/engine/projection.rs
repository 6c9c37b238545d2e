// ==========================================
// 生产排程引擎 - 甘特图投影
// ==========================================
// 纯读路径: 已提交分配 → 展示行,按资源再按开始时间排序
// ==========================================

use crate::domain::plan::ProductionPlan;
use crate::domain::resource::Resource;
use crate::domain::schedule::{Assignment, TimeWindow};
use crate::domain::types::{PlanStatus, Priority};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GanttRow {
    pub resource_id: String,
    pub resource_name: String,
    pub plan_id: String,
    pub product_code: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<PlanStatus>,
    pub assignment_id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub shared: bool,
}

/// 构建甘特行; window 为 None 时不过滤
pub fn project(
    resources: &[Resource],
    assignments: &[Assignment],
    plans: &[ProductionPlan],
    window: Option<&TimeWindow>,
) -> Vec<GanttRow> {
    let names: BTreeMap<&str, &str> = resources
        .iter()
        .map(|r| (r.resource_id.as_str(), r.resource_name.as_str()))
        .collect();
    let plans: BTreeMap<&str, &ProductionPlan> =
        plans.iter().map(|p| (p.plan_id.as_str(), p)).collect();

    let mut rows: Vec<GanttRow> = assignments
        .iter()
        .filter(|a| window.map_or(true, |w| a.window.overlaps(w)))
        .map(|a| {
            let plan = plans.get(a.plan_id.as_str());
            GanttRow {
                resource_id: a.resource_id.clone(),
                resource_name: names
                    .get(a.resource_id.as_str())
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| a.resource_id.clone()),
                plan_id: a.plan_id.clone(),
                product_code: plan.map(|p| p.product_code.clone()),
                priority: plan.map(|p| p.priority),
                status: plan.map(|p| p.status),
                assignment_id: a.assignment_id.clone(),
                start: a.window.start(),
                end: a.window.end(),
                shared: a.shared,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        (&a.resource_id, a.start, &a.assignment_id).cmp(&(&b.resource_id, b.start, &b.assignment_id))
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn window(from: i64, to: i64) -> TimeWindow {
        let t0 = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        TimeWindow::new(t0 + Duration::hours(from), t0 + Duration::hours(to)).unwrap()
    }

    #[test]
    fn test_rows_sorted_and_filtered() {
        let assignments = vec![
            Assignment::new("P3", "R2", window(0, 4)),
            Assignment::new("P2", "R1", window(8, 12)),
            Assignment::new("P1", "R1", window(0, 4)),
            Assignment::new("P4", "R1", window(30, 40)),
        ];

        let rows = project(&[], &assignments, &[], Some(&window(0, 24)));
        let order: Vec<_> = rows.iter().map(|r| r.plan_id.as_str()).collect();
        assert_eq!(order, vec!["P1", "P2", "P3"]);
        assert_eq!(rows[0].resource_name, "R1");
        assert!(rows[0].product_code.is_none());

        assert_eq!(project(&[], &assignments, &[], None).len(), 4);
    }
}
