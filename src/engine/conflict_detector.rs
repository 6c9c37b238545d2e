// ==========================================
// 生产排程引擎 - 冲突检测器
// ==========================================
// 纯函数: 输入相同则输出顺序与内容完全一致
// 约束: 仅使用有序容器与稳定排序,不依赖 HashMap 迭代顺序
// 输出顺序: 检测步骤 → 资源 → 时间
// ==========================================

use crate::config::DetectorConfig;
use crate::domain::conflict::Conflict;
use crate::domain::plan::ProductionPlan;
use crate::domain::resource::Resource;
use crate::domain::schedule::Assignment;
use crate::domain::types::{ConflictKind, Severity};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

// ==========================================
// ConflictDetector - 冲突检测器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ConflictDetector {
    config: DetectorConfig,
}

impl ConflictDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// 检测候选排程中的全部冲突
    pub fn detect(
        &self,
        assignments: &[Assignment],
        resources: &[Resource],
        plans: &[ProductionPlan],
    ) -> Vec<Conflict> {
        let resources: BTreeMap<&str, &Resource> =
            resources.iter().map(|r| (r.resource_id.as_str(), r)).collect();
        let plans: BTreeMap<&str, &ProductionPlan> =
            plans.iter().map(|p| (p.plan_id.as_str(), p)).collect();
        let by_resource = group_by_resource(assignments);

        let mut conflicts = Vec::new();
        self.detect_overlaps(&by_resource, &mut conflicts);
        self.detect_overutilization(&by_resource, &resources, &mut conflicts);
        self.detect_deadlines(&by_resource, &plans, &mut conflicts);
        self.detect_priority_inversions(&by_resource, &plans, &mut conflicts);
        conflicts
    }

    // 步骤1: 同资源独占分配重叠
    fn detect_overlaps(
        &self,
        by_resource: &BTreeMap<&str, Vec<&Assignment>>,
        out: &mut Vec<Conflict>,
    ) {
        for (resource_id, list) in by_resource {
            // 维护已扫描部分中结束最晚的分配,覆盖非相邻的包含型重叠
            let mut latest: Option<&Assignment> = None;
            for a in list.iter().filter(|a| !a.shared) {
                if let Some(prev) = latest {
                    if a.window.start() < prev.window.end() {
                        out.push(Conflict::new(
                            ConflictKind::TimeOverlap,
                            Severity::High,
                            vec![prev.plan_id.clone(), a.plan_id.clone()],
                            Some(resource_id.to_string()),
                            format!(
                                "资源 {} 上计划 {} {} 与计划 {} {} 时间重叠",
                                resource_id, prev.plan_id, prev.window, a.plan_id, a.window
                            ),
                        ));
                    }
                }
                latest = match latest {
                    Some(prev) if prev.window.end() >= a.window.end() => Some(prev),
                    _ => Some(a),
                };
            }
        }
    }

    // 步骤2: 按自然日统计占用分钟,超出日产能窗口即超负荷
    fn detect_overutilization(
        &self,
        by_resource: &BTreeMap<&str, Vec<&Assignment>>,
        resources: &BTreeMap<&str, &Resource>,
        out: &mut Vec<Conflict>,
    ) {
        for (resource_id, list) in by_resource {
            let capacity = resources
                .get(resource_id)
                .map(|r| r.capacity_minutes_per_day())
                .unwrap_or(crate::domain::resource::FULL_DAY_MINUTES);

            let mut daily: BTreeMap<NaiveDate, (i64, Vec<String>)> = BTreeMap::new();
            for a in list {
                for (day, minutes) in a.window.split_by_day() {
                    let entry = daily.entry(day).or_insert_with(|| (0, Vec::new()));
                    entry.0 += minutes;
                    if !entry.1.contains(&a.plan_id) {
                        entry.1.push(a.plan_id.clone());
                    }
                }
            }

            for (day, (booked, plan_ids)) in daily {
                let ratio = booked as f64 / capacity as f64;
                if ratio <= 1.0 {
                    continue;
                }
                let excess = ratio - 1.0;
                let severity = if excess > self.config.overutilization_high_ratio {
                    Severity::High
                } else if excess > self.config.overutilization_medium_ratio {
                    Severity::Medium
                } else {
                    Severity::Low
                };
                out.push(Conflict::new(
                    ConflictKind::ResourceOverutilization,
                    severity,
                    plan_ids,
                    Some(resource_id.to_string()),
                    format!(
                        "资源 {} 在 {} 占用 {} 分钟,超出日产能 {} 分钟 ({:.0}%)",
                        resource_id,
                        day,
                        booked,
                        capacity,
                        excess * 100.0
                    ),
                ));
            }
        }
    }

    // 步骤3: 完工时间与交期比较
    fn detect_deadlines(
        &self,
        by_resource: &BTreeMap<&str, Vec<&Assignment>>,
        plans: &BTreeMap<&str, &ProductionPlan>,
        out: &mut Vec<Conflict>,
    ) {
        let margin = Duration::minutes(self.config.deadline_risk_margin_minutes.max(0));
        for (resource_id, list) in by_resource {
            for a in list {
                let Some(plan) = plans.get(a.plan_id.as_str()) else {
                    continue;
                };
                let end = a.window.end();
                if end > plan.due_date {
                    let late = end - plan.due_date;
                    out.push(Conflict::new(
                        ConflictKind::DeadlineViolation,
                        Severity::High,
                        vec![plan.plan_id.clone()],
                        Some(resource_id.to_string()),
                        format!(
                            "计划 {} 完工于 {},晚于交期 {} 共 {} 分钟",
                            plan.plan_id,
                            end.format("%Y-%m-%d %H:%M"),
                            plan.due_date.format("%Y-%m-%d %H:%M"),
                            late.num_minutes()
                        ),
                    ));
                } else if plan.due_date - end < margin {
                    out.push(Conflict::new(
                        ConflictKind::DeadlineViolation,
                        Severity::Medium,
                        vec![plan.plan_id.clone()],
                        Some(resource_id.to_string()),
                        format!(
                            "计划 {} 完工距交期仅 {} 分钟,存在延期风险",
                            plan.plan_id,
                            (plan.due_date - end).num_minutes()
                        ),
                    ));
                }
            }
        }
    }

    // 步骤4: 高优先级计划排在本可让位的低优先级计划之后 (仅提示)
    //
    // 只有两者对调后低优先级计划仍能按期完工时才算倒挂
    fn detect_priority_inversions(
        &self,
        by_resource: &BTreeMap<&str, Vec<&Assignment>>,
        plans: &BTreeMap<&str, &ProductionPlan>,
        out: &mut Vec<Conflict>,
    ) {
        for (resource_id, list) in by_resource {
            let list: Vec<&Assignment> = list.iter().copied().filter(|a| !a.shared).collect();
            for (hi, high) in list.iter().enumerate() {
                let Some(hp) = plans.get(high.plan_id.as_str()) else {
                    continue;
                };
                if !hp.priority.is_elevated() {
                    continue;
                }
                let victim = list[..hi].iter().enumerate().find(|(li, low)| {
                    low.window.start() < high.window.start()
                        && hp.earliest_start <= low.window.start()
                        && plans.get(low.plan_id.as_str()).is_some_and(|lp| {
                            !lp.priority.is_elevated() && swap_fits(&list, *li, hi, lp)
                        })
                });
                if let Some((_, low)) = victim {
                    out.push(Conflict::new(
                        ConflictKind::PriorityInversion,
                        Severity::Low,
                        vec![high.plan_id.clone(), low.plan_id.clone()],
                        Some(resource_id.to_string()),
                        format!(
                            "资源 {} 上高优先级计划 {} 排在低优先级计划 {} 之后",
                            resource_id, high.plan_id, low.plan_id
                        ),
                    ));
                }
            }
        }
    }
}

/// 对调 list[li] (低) 与 list[hi] (高) 是否可行
///
/// 相邻时两者在 [低.开始, 高.结束) 内互换次序; 不相邻时各自进入对方腾出的空档,
/// 空档止于下一条分配的开始。低优先级计划新的完工时刻不得晚于交期。
fn swap_fits(list: &[&Assignment], li: usize, hi: usize, low_plan: &ProductionPlan) -> bool {
    let low = list[li];
    let high = list[hi];
    let high_end = low.window.start() + high.window.duration();

    let (low_start, low_limit) = if li + 1 == hi {
        (high_end, Some(high.window.end()))
    } else {
        if high_end > list[li + 1].window.start() {
            return false;
        }
        (high.window.start(), list.get(hi + 1).map(|n| n.window.start()))
    };
    let low_end = low_start + low.window.duration();
    low_limit.map_or(true, |limit| low_end <= limit) && low_end <= low_plan.due_date
}

/// 按资源分组并按 (开始, 结束, 分配ID) 稳定排序
fn group_by_resource(assignments: &[Assignment]) -> BTreeMap<&str, Vec<&Assignment>> {
    let mut by_resource: BTreeMap<&str, Vec<&Assignment>> = BTreeMap::new();
    for a in assignments {
        by_resource.entry(a.resource_id.as_str()).or_default().push(a);
    }
    for list in by_resource.values_mut() {
        list.sort_by(|a, b| {
            (a.window.start(), a.window.end(), &a.assignment_id).cmp(&(
                b.window.start(),
                b.window.end(),
                &b.assignment_id,
            ))
        });
    }
    by_resource
}

/// 按严重度统计 (High, Medium, Low)
pub fn severity_counts(conflicts: &[Conflict]) -> (usize, usize, usize) {
    conflicts.iter().fold((0, 0, 0), |(h, m, l), c| match c.severity {
        Severity::High => (h + 1, m, l),
        Severity::Medium => (h, m + 1, l),
        Severity::Low => (h, m, l + 1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schedule::TimeWindow;
    use crate::domain::types::{PlanStatus, Priority, ResourceKind};
    use chrono::NaiveDateTime;

    fn at(hour: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::hours(hour)
    }

    fn resource(id: &str, daily_minutes: i64) -> Resource {
        Resource {
            resource_id: id.to_string(),
            resource_name: id.to_string(),
            kind: ResourceKind::Line,
            capacity_unit: "pcs".to_string(),
            daily_capacity_minutes: daily_minutes,
            nominal_rate_per_hour: 10.0,
            supported_products: vec![],
            active: true,
        }
    }

    fn plan(id: &str, priority: Priority, earliest: i64, due: i64) -> ProductionPlan {
        ProductionPlan {
            plan_id: id.to_string(),
            product_code: "A".to_string(),
            target_quantity: 10.0,
            completed_quantity: 0.0,
            earliest_start: at(earliest),
            due_date: at(due),
            priority,
            status: PlanStatus::Scheduled,
            assigned_resource_id: None,
            assigned_window: None,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    fn assign(plan: &str, resource: &str, from: i64, to: i64) -> Assignment {
        let mut a = Assignment::new(plan, resource, TimeWindow::new(at(from), at(to)).unwrap());
        a.assignment_id = format!("{}-{}", plan, resource);
        a
    }

    #[test]
    fn test_overlap_including_non_adjacent() {
        let detector = ConflictDetector::default();
        let assignments = vec![
            assign("P1", "R1", 0, 20),
            assign("P2", "R1", 2, 4),
            assign("P3", "R1", 10, 12),
        ];
        let plans = vec![
            plan("P1", Priority::Medium, 0, 200),
            plan("P2", Priority::Medium, 0, 200),
            plan("P3", Priority::Medium, 0, 200),
        ];
        let conflicts = detector.detect(&assignments, &[resource("R1", 0)], &plans);
        let overlaps: Vec<_> = conflicts
            .iter()
            .filter(|c| c.kind == ConflictKind::TimeOverlap)
            .collect();
        assert_eq!(overlaps.len(), 2);
        assert_eq!(overlaps[1].affected_plans, vec!["P1".to_string(), "P3".to_string()]);
    }

    #[test]
    fn test_shared_assignments_are_permitted() {
        let detector = ConflictDetector::default();
        let mut shared = assign("P2", "R1", 5, 15);
        shared.shared = true;
        let assignments = vec![assign("P1", "R1", 0, 10), shared];
        let plans = vec![plan("P1", Priority::Low, 0, 200), plan("P2", Priority::Low, 0, 200)];
        let conflicts = detector.detect(&assignments, &[resource("R1", 0)], &plans);
        assert!(conflicts.iter().all(|c| c.kind != ConflictKind::TimeOverlap));
    }

    #[test]
    fn test_overutilization_severity_scales_with_excess() {
        let detector = ConflictDetector::default();
        let plans = vec![plan("P1", Priority::Low, 0, 200)];
        // 8 小时产能: 9h → 12.5% Low, 11h → 37.5% Medium, 13h → 62.5% High
        for (hours, expected) in [(9, Severity::Low), (11, Severity::Medium), (13, Severity::High)] {
            let conflicts = detector.detect(
                &[assign("P1", "R1", 0, hours)],
                &[resource("R1", 8 * 60)],
                &plans,
            );
            let over: Vec<_> = conflicts
                .iter()
                .filter(|c| c.kind == ConflictKind::ResourceOverutilization)
                .collect();
            assert_eq!(over.len(), 1);
            assert_eq!(over[0].severity, expected);
        }
    }

    #[test]
    fn test_deadline_violation_and_risk() {
        let detector = ConflictDetector::default();
        let plans = vec![
            plan("LATE", Priority::Low, 0, 10),
            plan("RISK", Priority::Low, 0, 40),
            plan("SAFE", Priority::Low, 0, 100),
        ];
        let assignments = vec![
            assign("LATE", "R1", 0, 12),
            assign("RISK", "R2", 0, 20),
            assign("SAFE", "R3", 0, 20),
        ];
        let conflicts = detector.detect(&assignments, &[], &plans);
        let deadline: Vec<_> = conflicts
            .iter()
            .filter(|c| c.kind == ConflictKind::DeadlineViolation)
            .map(|c| (c.affected_plans[0].as_str(), c.severity))
            .collect();
        assert_eq!(deadline, vec![("LATE", Severity::High), ("RISK", Severity::Medium)]);
    }

    #[test]
    fn test_priority_inversion_is_advisory() {
        let detector = ConflictDetector::default();
        let plans = vec![
            plan("LOW", Priority::Low, 0, 500),
            plan("HIGH", Priority::Urgent, 0, 500),
        ];
        let assignments = vec![assign("LOW", "R1", 0, 10), assign("HIGH", "R1", 10, 20)];
        let conflicts = detector.detect(&assignments, &[resource("R1", 0)], &plans);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::PriorityInversion);
        assert_eq!(conflicts[0].severity, Severity::Low);
        assert!(!conflicts[0].is_blocking());

        // 高优先级计划最早开工晚于低优先级计划开始时,不算倒挂
        let plans = vec![
            plan("LOW", Priority::Low, 0, 500),
            plan("HIGH", Priority::Urgent, 5, 500),
        ];
        assert!(detector.detect(&assignments, &[resource("R1", 0)], &plans).is_empty());
    }

    #[test]
    fn test_no_inversion_when_swap_would_make_low_plan_late() {
        let detector = ConflictDetector::default();
        // 对调后 LOW 在 30 完工,晚于交期 25
        let plans = vec![
            plan("LOW", Priority::Low, 0, 25),
            plan("HIGH", Priority::High, 0, 500),
        ];
        let assignments = vec![assign("LOW", "R1", 0, 10), assign("HIGH", "R1", 10, 30)];
        let conflicts = detector.detect(&assignments, &[resource("R1", 0)], &plans);
        assert!(conflicts
            .iter()
            .all(|c| c.kind != ConflictKind::PriorityInversion));

        // 交期放宽到 30 即可对调
        let plans = vec![
            plan("LOW", Priority::Low, 0, 30),
            plan("HIGH", Priority::High, 0, 500),
        ];
        let conflicts = detector.detect(&assignments, &[resource("R1", 0)], &plans);
        assert!(conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::PriorityInversion));
    }

    #[test]
    fn test_no_inversion_when_high_plan_does_not_fit_displaced_slot() {
        let detector = ConflictDetector::default();
        // LOW [0,10) 与 HIGH 之间夹着 MID [10,20); HIGH 时长 15 放不进 LOW 腾出的 10
        let plans = vec![
            plan("LOW", Priority::Low, 0, 500),
            plan("MID", Priority::Medium, 0, 500),
            plan("HIGH", Priority::Urgent, 0, 500),
        ];
        let assignments = vec![
            assign("LOW", "R1", 0, 10),
            assign("MID", "R1", 10, 20),
            assign("HIGH", "R1", 20, 35),
        ];
        let conflicts = detector.detect(&assignments, &[resource("R1", 0)], &plans);
        let inversions: Vec<_> = conflicts
            .iter()
            .filter(|c| c.kind == ConflictKind::PriorityInversion)
            .collect();
        // MID 紧邻 HIGH,对调可行
        assert_eq!(inversions.len(), 1);
        assert_eq!(inversions[0].affected_plans, vec!["HIGH".to_string(), "MID".to_string()]);
    }

    #[test]
    fn test_detect_is_deterministic() {
        let detector = ConflictDetector::default();
        let plans = vec![
            plan("P1", Priority::Low, 0, 5),
            plan("P2", Priority::High, 0, 50),
            plan("P3", Priority::Medium, 0, 50),
        ];
        let assignments = vec![
            assign("P3", "R2", 0, 30),
            assign("P1", "R1", 0, 10),
            assign("P2", "R1", 5, 15),
        ];
        let mut reversed = assignments.clone();
        reversed.reverse();
        let resources = vec![resource("R1", 8 * 60), resource("R2", 0)];

        let a = detector.detect(&assignments, &resources, &plans);
        let b = detector.detect(&reversed, &resources, &plans);
        assert!(!a.is_empty());
        assert_eq!(a, b);
        assert_eq!(severity_counts(&a).0, a.iter().filter(|c| c.is_blocking()).count());
    }
}
