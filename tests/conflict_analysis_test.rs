// ==========================================
// 冲突分析测试
// ==========================================
// 职责: 验证冲突分析只读、可重复,以及按资源/时间范围过滤
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod conflict_analysis_test {
    use production_aps::engine::orchestrator::{ManualScheduleRequest, ScheduleScope};
    use production_aps::{ApiError, ConflictKind, Priority, Severity, TimeWindow};

    use crate::test_helpers::*;

    fn manual(plan_id: &str, resource_id: &str, from_h: i64, to_h: i64) -> ManualScheduleRequest {
        ManualScheduleRequest {
            plan_id: plan_id.to_string(),
            resource_id: resource_id.to_string(),
            window: TimeWindow::new(hours(from_h), hours(to_h)).unwrap(),
            actor: "planner".to_string(),
        }
    }

    /// R1 日产能 8 小时, A 占用 10 小时 → 超负荷
    /// R2 上 B 距交期 2 小时 → 交期风险; C 无冲突
    async fn conflicted_env() -> TestEnv {
        let env = setup(None);
        let api = env.api();
        let mut r1 = line("R1");
        r1.daily_capacity_minutes = 8 * 60;
        api.upsert_resource(r1).unwrap();
        api.upsert_resource(line("R2")).unwrap();

        api.submit_plan(plan_request("A", 100.0, t0(), days(10), Priority::Medium))
            .unwrap();
        api.submit_plan(plan_request("B", 100.0, t0(), hours(12), Priority::Medium))
            .unwrap();
        api.submit_plan(plan_request("C", 100.0, t0(), days(10), Priority::Medium))
            .unwrap();

        assert!(api.manual_schedule(manual("A", "R1", 0, 10)).await.unwrap().committed);
        assert!(api.manual_schedule(manual("B", "R2", 0, 10)).await.unwrap().committed);
        assert!(api.manual_schedule(manual("C", "R2", 30, 40)).await.unwrap().committed);
        env
    }

    #[tokio::test]
    async fn test_conflict_analysis_is_read_only_and_repeatable() {
        let env = conflicted_env().await;
        let api = env.api();
        let gantt_before = api.gantt(ScheduleScope::default()).await.unwrap();
        let plans_before = api.list_plans().unwrap();

        let first = api.conflicts(ScheduleScope::default()).await.unwrap();
        let second = api.conflicts(ScheduleScope::default()).await.unwrap();
        assert_eq!(first.conflicts, second.conflicts);
        assert_eq!(first.conflicts.len(), 2);
        assert_eq!(first.medium, 2);
        assert_eq!(first.high, 0);

        assert_eq!(api.gantt(ScheduleScope::default()).await.unwrap(), gantt_before);
        assert_eq!(api.list_plans().unwrap(), plans_before);
    }

    #[tokio::test]
    async fn test_scope_filters_by_resource() {
        let env = conflicted_env().await;
        let api = env.api();

        let r1 = api
            .conflicts(ScheduleScope {
                resource_id: Some("R1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(r1.conflicts.len(), 1);
        assert_eq!(r1.conflicts[0].kind, ConflictKind::ResourceOverutilization);
        assert_eq!(r1.conflicts[0].severity, Severity::Medium);
        assert_eq!(r1.conflicts[0].resource_id.as_deref(), Some("R1"));

        let r2 = api
            .conflicts(ScheduleScope {
                resource_id: Some("R2".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(r2.conflicts.len(), 1);
        assert_eq!(r2.conflicts[0].kind, ConflictKind::DeadlineViolation);
        assert_eq!(r2.conflicts[0].affected_plans, vec!["B".to_string()]);
    }

    #[tokio::test]
    async fn test_scope_filters_by_time_range() {
        let env = conflicted_env().await;
        let api = env.api();

        let later = ScheduleScope {
            resource_id: None,
            from: Some(hours(20)),
            to: Some(hours(50)),
        };
        let report = api.conflicts(later.clone()).await.unwrap();
        assert!(report.conflicts.is_empty());

        let rows = api.gantt(later).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].plan_id, "C");
    }

    #[tokio::test]
    async fn test_inverted_scope_is_rejected() {
        let env = conflicted_env().await;
        let err = env
            .api()
            .conflicts(ScheduleScope {
                resource_id: None,
                from: Some(hours(50)),
                to: Some(hours(20)),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }
}
