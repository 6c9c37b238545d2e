// ==========================================
// 自动排程流程测试
// ==========================================
// 职责: 验证 优先级优先 场景、运行记录落库、操作日志与状态流转
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod scheduling_flow_test {
    use chrono::Duration;
    use production_aps::engine::orchestrator::{AutoScheduleRequest, ScheduleScope};
    use production_aps::{ApiError, PlanStatus, Priority, RunStatus, ScheduleStrategy};

    use crate::test_helpers::*;

    fn priority_first_env() -> TestEnv {
        let predictor = FixedPredictor::new(
            &[("P1", Duration::days(2)), ("P2", Duration::days(3))],
            0.9,
        );
        let env = setup(Some(predictor));
        let api = env.api();
        use_small_search(api, 42);
        api.upsert_resource(line("R")).unwrap();
        api.submit_plan(plan_request("P1", 100.0, t0(), days(5), Priority::High))
            .unwrap();
        api.submit_plan(plan_request("P2", 100.0, t0(), days(10), Priority::Low))
            .unwrap();
        env
    }

    fn request(plan_ids: &[&str]) -> AutoScheduleRequest {
        AutoScheduleRequest {
            plan_ids: plan_ids.iter().map(|s| s.to_string()).collect(),
            strategy: ScheduleStrategy::PriorityFirst,
            custom_strategy_id: None,
            horizon_start: t0(),
            force_commit: false,
            actor: "tester".to_string(),
        }
    }

    #[tokio::test]
    async fn test_priority_first_commits_high_priority_first() {
        let env = priority_first_env();
        let api = env.api();

        let outcome = api.auto_schedule(request(&["P1", "P2"])).await.unwrap();
        assert!(outcome.committed);
        assert!(outcome.conflicts.is_empty(), "{:?}", outcome.conflicts);

        let p1 = outcome.assignments.iter().find(|a| a.plan_id == "P1").unwrap();
        let p2 = outcome.assignments.iter().find(|a| a.plan_id == "P2").unwrap();
        assert_eq!(p1.resource_id, "R");
        assert_eq!(p1.window.start(), t0());
        assert_eq!(p1.window.end(), days(2));
        assert!(p2.window.start() >= p1.window.end());
        assert_eq!(p2.window.duration(), Duration::days(3));

        // 状态与分配写回计划
        let p1_plan = api.get_plan("P1").unwrap();
        assert_eq!(p1_plan.status, PlanStatus::Scheduled);
        assert_eq!(p1_plan.assigned_resource_id.as_deref(), Some("R"));
        assert_eq!(p1_plan.assigned_window, Some(p1.window));

        // 冲突分析同样为空
        let report = api.conflicts(ScheduleScope::default()).await.unwrap();
        assert!(report.conflicts.is_empty());
    }

    #[tokio::test]
    async fn test_run_is_persisted_and_logged() {
        let env = priority_first_env();
        let api = env.api();

        let outcome = api.auto_schedule(request(&["P1", "P2"])).await.unwrap();
        let run = outcome.run.clone().unwrap();
        assert_eq!(run.seed, 42);
        assert_eq!(run.strategy, ScheduleStrategy::PriorityFirst);
        assert_ne!(run.status, RunStatus::Cancelled);
        assert_eq!(run.fitness_history.len(), run.generations + 1);
        assert!(run
            .fitness_history
            .windows(2)
            .all(|w| w[1] <= w[0] + 1e-9));

        let stored = api.get_schedule_run(&run.run_id).unwrap();
        assert_eq!(stored.assignments, run.assignments);
        assert_eq!(api.list_schedule_runs(10).unwrap().len(), 1);

        let logs = env
            .state
            .orchestrator
            .repositories()
            .action_log_repo()
            .find_by_plan("P1")
            .unwrap();
        let auto = logs
            .iter()
            .find(|l| l.action_type == "AutoSchedule")
            .expect("auto schedule log");
        let payload = auto.payload_json.as_ref().unwrap();
        assert_eq!(payload["run_id"], run.run_id.as_str());
        assert!(payload["config"]["optimizer"].is_object());
    }

    #[tokio::test]
    async fn test_committed_state_survives_restart() {
        let env = priority_first_env();
        env.api().auto_schedule(request(&["P1", "P2"])).await.unwrap();
        let before = env.api().gantt(ScheduleScope::default()).await.unwrap();
        assert_eq!(before.len(), 2);

        let reopened = env.reopen();
        let after = reopened
            .schedule_api
            .gantt(ScheduleScope::default())
            .await
            .unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_only_draft_plans_can_be_auto_scheduled() {
        let env = priority_first_env();
        let api = env.api();
        api.auto_schedule(request(&["P1"])).await.unwrap();

        let err = api.auto_schedule(request(&["P1", "P2"])).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)), "{:?}", err);

        let err = api.auto_schedule(request(&["NOPE"])).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = api.auto_schedule(request(&[])).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_scheduling_around_existing_bookings() {
        let env = priority_first_env();
        let api = env.api();
        api.auto_schedule(request(&["P1"])).await.unwrap();

        // P2 只能排在 P1 之后
        let outcome = api.auto_schedule(request(&["P2"])).await.unwrap();
        assert!(outcome.committed);
        let p2 = &outcome.assignments[0];
        assert!(p2.window.start() >= days(2));
    }
}
