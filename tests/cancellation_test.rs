// ==========================================
// 优化取消测试
// ==========================================
// 职责: 验证第 N 代后取消时,返回的最优解不劣于同种子完整运行第 N 代的历史最优,
//       且取消/超时的运行都不提交
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod cancellation_test {
    use std::sync::Arc;

    use production_aps::config::config_keys;
    use production_aps::engine::orchestrator::{AutoScheduleRequest, ScheduleScope};
    use production_aps::{
        CancelFlag, PlanStatus, Priority, RunStatus, ScheduleStrategy, SearchControl,
    };

    use crate::test_helpers::*;

    const CANCEL_AFTER: usize = 5;

    fn env() -> TestEnv {
        let env = setup(None);
        let api = env.api();
        use_small_search(api, 2024);
        // 关闭收敛提前结束,放宽时间预算
        api.set_config_value(config_keys::STAGNATION_GENERATIONS, "0").unwrap();
        api.set_config_value(config_keys::TIMEOUT_MS, "600000").unwrap();
        api.upsert_resource(line("R1")).unwrap();
        api.upsert_resource(line("R2")).unwrap();

        let priorities = [Priority::Low, Priority::Medium, Priority::High];
        for i in 0..6i64 {
            api.submit_plan(plan_request(
                &format!("P{}", i),
                50.0 + 30.0 * i as f64,
                hours(i * 4),
                hours(30 + i * 6),
                priorities[i as usize % 3],
            ))
            .unwrap();
        }
        env
    }

    fn request() -> AutoScheduleRequest {
        AutoScheduleRequest {
            plan_ids: (0..6).map(|i| format!("P{}", i)).collect(),
            strategy: ScheduleStrategy::EarliestDueDate,
            custom_strategy_id: None,
            horizon_start: t0(),
            force_commit: false,
            actor: "tester".to_string(),
        }
    }

    #[tokio::test]
    async fn test_cancelled_run_is_no_worse_than_full_run_at_same_generation() {
        let full_env = env();
        let full = full_env
            .api()
            .auto_schedule_with(request(), SearchControl::new())
            .await
            .unwrap()
            .run
            .unwrap();
        assert_eq!(full.generations, 30);
        assert_eq!(full.fitness_history.len(), 31);

        let cancel_env = env();
        let flag = CancelFlag::new();
        let observer_flag = flag.clone();
        let control = SearchControl::new()
            .with_cancel(flag)
            .with_observer(Arc::new(move |generation, _best| {
                if generation >= CANCEL_AFTER {
                    observer_flag.cancel();
                }
            }));
        let outcome = cancel_env
            .api()
            .auto_schedule_with(request(), control)
            .await
            .unwrap();

        let run = outcome.run.clone().unwrap();
        assert_eq!(run.status, RunStatus::Cancelled);
        assert_eq!(run.generations, CANCEL_AFTER);
        assert_eq!(run.fitness_history.len(), CANCEL_AFTER + 1);
        assert!(run.best_fitness <= full.fitness_history[CANCEL_AFTER] + 1e-9);
        assert_eq!(run.fitness_history[..], full.fitness_history[..=CANCEL_AFTER]);

        // 取消的运行只作为建议返回
        assert!(!outcome.committed);
        assert_eq!(outcome.assignments, run.assignments);
        assert_eq!(outcome.assignments.len(), 6);
        let api = cancel_env.api();
        assert!(api.gantt(ScheduleScope::default()).await.unwrap().is_empty());
        assert!(api
            .list_plans()
            .unwrap()
            .iter()
            .all(|p| p.status == PlanStatus::Draft));

        // 运行记录仍然落库
        let stored = api.get_schedule_run(&run.run_id).unwrap();
        assert_eq!(stored.status, RunStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_before_start_returns_seed_population_best() {
        let env = env();
        let flag = CancelFlag::new();
        flag.cancel();
        let outcome = env
            .api()
            .auto_schedule_with(request(), SearchControl::new().with_cancel(flag))
            .await
            .unwrap();

        let run = outcome.run.unwrap();
        assert_eq!(run.status, RunStatus::Cancelled);
        assert_eq!(run.generations, 0);
        assert_eq!(run.fitness_history, vec![run.best_fitness]);
        assert!(!outcome.committed);
    }

    #[tokio::test]
    async fn test_timed_out_run_is_persisted_but_not_committed() {
        let env = env();
        let api = env.api();
        api.set_config_value(config_keys::TIMEOUT_MS, "0").unwrap();

        let outcome = api.auto_schedule(request()).await.unwrap();
        let run = outcome.run.clone().unwrap();
        assert_eq!(run.status, RunStatus::TimedOut);
        assert_eq!(run.generations, 0);
        assert_eq!(run.fitness_history, vec![run.best_fitness]);

        // 与取消一致: 只返回建议方案
        assert!(!outcome.committed);
        assert_eq!(outcome.assignments, run.assignments);
        assert_eq!(outcome.assignments.len(), 6);
        assert!(api.gantt(ScheduleScope::default()).await.unwrap().is_empty());
        assert!(api
            .list_plans()
            .unwrap()
            .iter()
            .all(|p| p.status == PlanStatus::Draft));

        let stored = api.get_schedule_run(&run.run_id).unwrap();
        assert_eq!(stored.status, RunStatus::TimedOut);
        assert_eq!(stored.assignments.len(), run.assignments.len());
    }
}
