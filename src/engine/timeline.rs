// ==========================================
// 生产排程引擎 - 资源时间线
// ==========================================
// 红线: 独占分配按开始时间有序且互不重叠
// 红线: 插入失败时时间线保持原样
// 结构: BTreeMap<start, Assignment>,重叠查询 O(log n + k)
// ==========================================

use crate::domain::conflict::Conflict;
use crate::domain::schedule::{Assignment, TimeWindow};
use crate::domain::types::{ConflictKind, Severity};
use chrono::{Duration, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};

// ==========================================
// ResourceTimeline - 单资源时间线
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ResourceTimeline {
    resource_id: String,
    // 独占分配: 开始时间 → 分配
    exclusive: BTreeMap<NaiveDateTime, Assignment>,
    // assignment_id → 开始时间
    index: BTreeMap<String, NaiveDateTime>,
    // 共享分配不参与重叠判断
    shared: Vec<Assignment>,
}

impl ResourceTimeline {
    pub fn new(resource_id: &str) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            ..Default::default()
        }
    }

    /// 由已提交分配重建时间线
    pub fn from_assignments<'a, I>(resource_id: &str, assignments: I) -> Result<Self, Conflict>
    where
        I: IntoIterator<Item = &'a Assignment>,
    {
        let mut timeline = Self::new(resource_id);
        for a in assignments {
            timeline.insert(a.clone())?;
        }
        Ok(timeline)
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn len(&self) -> usize {
        self.exclusive.len() + self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, assignment_id: &str) -> bool {
        self.index.contains_key(assignment_id)
            || self.shared.iter().any(|a| a.assignment_id == assignment_id)
    }

    /// 插入分配; 与已有独占分配重叠时返回 TimeOverlap 冲突且不做任何修改
    pub fn insert(&mut self, assignment: Assignment) -> Result<(), Conflict> {
        if self.contains(&assignment.assignment_id) {
            return Err(Conflict::new(
                ConflictKind::TimeOverlap,
                Severity::High,
                vec![assignment.plan_id.clone()],
                Some(self.resource_id.clone()),
                format!("分配 {} 已存在于资源 {}", assignment.assignment_id, self.resource_id),
            ));
        }

        if assignment.shared {
            self.shared.push(assignment);
            return Ok(());
        }

        if let Some(existing) = self.blocking(&assignment.window) {
            return Err(Conflict::new(
                ConflictKind::TimeOverlap,
                Severity::High,
                vec![assignment.plan_id.clone(), existing.plan_id.clone()],
                Some(self.resource_id.clone()),
                format!(
                    "资源 {} 上 {} 与计划 {} 的 {} 重叠",
                    self.resource_id, assignment.window, existing.plan_id, existing.window
                ),
            ));
        }

        let start = assignment.window.start();
        self.index.insert(assignment.assignment_id.clone(), start);
        self.exclusive.insert(start, assignment);
        Ok(())
    }

    /// 移除分配,返回被移除的分配
    pub fn remove(&mut self, assignment_id: &str) -> Option<Assignment> {
        if let Some(start) = self.index.remove(assignment_id) {
            return self.exclusive.remove(&start);
        }
        let pos = self.shared.iter().position(|a| a.assignment_id == assignment_id)?;
        Some(self.shared.remove(pos))
    }

    // 开始时间早于 window.end 的最后一个独占分配若不与之重叠,则不存在重叠
    fn blocking(&self, window: &TimeWindow) -> Option<&Assignment> {
        self.exclusive
            .range(..window.end())
            .next_back()
            .map(|(_, a)| a)
            .filter(|a| a.window.end() > window.start())
    }

    /// 与时间窗重叠的全部分配 (按开始时间排序)
    pub fn overlaps(&self, window: &TimeWindow) -> Vec<Assignment> {
        let mut hits: Vec<Assignment> = self
            .exclusive
            .range(..window.end())
            .rev()
            .take_while(|(_, a)| a.window.end() > window.start())
            .map(|(_, a)| a.clone())
            .collect();
        hits.reverse();

        let mut shared: Vec<Assignment> = self
            .shared
            .iter()
            .filter(|a| a.window.overlaps(window))
            .cloned()
            .collect();
        if !shared.is_empty() {
            hits.append(&mut shared);
            hits.sort_by(|a, b| {
                (a.window.start(), &a.assignment_id).cmp(&(b.window.start(), &b.assignment_id))
            });
        }
        hits
    }

    /// 时间窗内的占用比例,取值 [0, 1]
    pub fn utilization(&self, window: &TimeWindow) -> f64 {
        let total = window.minutes();
        if total <= 0 {
            return 0.0;
        }
        let booked: i64 = self
            .overlaps(window)
            .iter()
            .filter_map(|a| a.window.intersection(window))
            .map(|w| w.minutes())
            .sum();
        (booked as f64 / total as f64).clamp(0.0, 1.0)
    }

    /// 不早于 not_before 且能容纳 duration 的最早开始时间
    pub fn earliest_slot(&self, not_before: NaiveDateTime, duration: Duration) -> NaiveDateTime {
        let mut cursor = not_before;
        let first_key = self
            .exclusive
            .range(..=not_before)
            .next_back()
            .map(|(k, _)| *k)
            .unwrap_or(not_before);

        for a in self.exclusive.range(first_key..).map(|(_, a)| a) {
            if a.window.end() <= cursor {
                continue;
            }
            if a.window.start() >= cursor + duration {
                break;
            }
            cursor = cursor.max(a.window.end());
        }
        cursor
    }

    /// 全部分配 (按开始时间排序)
    pub fn assignments(&self) -> Vec<&Assignment> {
        let mut all: Vec<&Assignment> = self.exclusive.values().collect();
        if !self.shared.is_empty() {
            all.extend(self.shared.iter());
            all.sort_by(|a, b| {
                (a.window.start(), &a.assignment_id).cmp(&(b.window.start(), &b.assignment_id))
            });
        }
        all
    }

    /// 去掉指定计划的分配后的副本 (重排时作为搜索基线)
    pub fn without_plans(&self, plan_ids: &BTreeSet<String>) -> Self {
        let mut copy = self.clone();
        let doomed: Vec<String> = copy
            .assignments()
            .into_iter()
            .filter(|a| plan_ids.contains(&a.plan_id))
            .map(|a| a.assignment_id.clone())
            .collect();
        for id in doomed {
            copy.remove(&id);
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::hours(hour)
    }

    fn assignment(plan: &str, from: i64, to: i64) -> Assignment {
        Assignment::new(plan, "R1", TimeWindow::new(at(from), at(to)).unwrap())
    }

    #[test]
    fn test_insert_rejects_overlap_and_keeps_state() {
        let mut tl = ResourceTimeline::new("R1");
        tl.insert(assignment("P2", 15, 25)).unwrap();

        let err = tl.insert(assignment("P1", 10, 20)).unwrap_err();
        assert_eq!(err.kind, ConflictKind::TimeOverlap);
        assert_eq!(err.severity, Severity::High);
        assert_eq!(err.affected_plans, vec!["P1".to_string(), "P2".to_string()]);
        assert_eq!(tl.len(), 1);
    }

    #[test]
    fn test_adjacent_windows_do_not_overlap() {
        let mut tl = ResourceTimeline::new("R1");
        tl.insert(assignment("P1", 0, 10)).unwrap();
        tl.insert(assignment("P2", 10, 20)).unwrap();
        tl.insert(assignment("P3", 20, 30)).unwrap();
        assert_eq!(tl.len(), 3);

        let starts: Vec<_> = tl.assignments().iter().map(|a| a.window.start()).collect();
        assert_eq!(starts, vec![at(0), at(10), at(20)]);
    }

    #[test]
    fn test_insert_inside_and_spanning_existing() {
        let mut tl = ResourceTimeline::new("R1");
        tl.insert(assignment("P1", 10, 20)).unwrap();
        assert!(tl.insert(assignment("P2", 12, 14)).is_err());
        assert!(tl.insert(assignment("P3", 5, 30)).is_err());
        assert!(tl.insert(assignment("P4", 0, 10)).is_ok());
    }

    #[test]
    fn test_shared_assignments_never_block() {
        let mut tl = ResourceTimeline::new("R1");
        tl.insert(assignment("P1", 0, 10)).unwrap();
        let mut shared = assignment("P2", 5, 15);
        shared.shared = true;
        tl.insert(shared).unwrap();
        tl.insert(assignment("P3", 10, 20)).unwrap();
        assert_eq!(tl.len(), 3);
    }

    #[test]
    fn test_remove_and_overlaps_query() {
        let mut tl = ResourceTimeline::new("R1");
        let a = assignment("P1", 0, 10);
        let id = a.assignment_id.clone();
        tl.insert(a).unwrap();
        tl.insert(assignment("P2", 10, 20)).unwrap();
        tl.insert(assignment("P3", 30, 40)).unwrap();

        let window = TimeWindow::new(at(5), at(31)).unwrap();
        let hits: Vec<_> = tl.overlaps(&window).into_iter().map(|a| a.plan_id).collect();
        assert_eq!(hits, vec!["P1", "P2", "P3"]);

        assert!(tl.remove(&id).is_some());
        assert!(tl.remove(&id).is_none());
        assert_eq!(tl.overlaps(&window).len(), 2);
    }

    #[test]
    fn test_utilization() {
        let mut tl = ResourceTimeline::new("R1");
        tl.insert(assignment("P1", 0, 6)).unwrap();
        tl.insert(assignment("P2", 18, 30)).unwrap();
        let day = TimeWindow::new(at(0), at(24)).unwrap();
        assert!((tl.utilization(&day) - 0.5).abs() < 1e-9);
        let empty = TimeWindow::new(at(40), at(50)).unwrap();
        assert_eq!(tl.utilization(&empty), 0.0);
    }

    #[test]
    fn test_earliest_slot_skips_busy_periods() {
        let mut tl = ResourceTimeline::new("R1");
        tl.insert(assignment("P1", 0, 10)).unwrap();
        tl.insert(assignment("P2", 12, 20)).unwrap();
        tl.insert(assignment("P3", 25, 30)).unwrap();

        assert_eq!(tl.earliest_slot(at(0), Duration::hours(2)), at(10));
        assert_eq!(tl.earliest_slot(at(0), Duration::hours(3)), at(20));
        assert_eq!(tl.earliest_slot(at(0), Duration::hours(6)), at(30));
        assert_eq!(tl.earliest_slot(at(5), Duration::hours(1)), at(10));
        assert_eq!(tl.earliest_slot(at(40), Duration::hours(1)), at(40));
    }

    #[test]
    fn test_without_plans() {
        let mut tl = ResourceTimeline::new("R1");
        tl.insert(assignment("P1", 0, 10)).unwrap();
        tl.insert(assignment("P2", 10, 20)).unwrap();
        let freed: BTreeSet<String> = ["P1".to_string()].into_iter().collect();
        let base = tl.without_plans(&freed);
        assert_eq!(base.len(), 1);
        assert_eq!(tl.len(), 2);
    }
}
