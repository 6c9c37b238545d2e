// ==========================================
// 独占不重叠性质测试
// ==========================================
// 职责: 任意计划组合、任意人工插入顺序、强制提交下,
//       同一资源上的已提交独占分配互不重叠
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod non_overlap_property_test {
    use proptest::prelude::*;

    use production_aps::engine::orchestrator::{
        AutoScheduleRequest, ManualScheduleRequest, ScheduleScope,
    };
    use production_aps::engine::GanttRow;
    use production_aps::{Priority, ScheduleStrategy, TimeWindow};

    use crate::test_helpers::*;

    #[derive(Debug, Clone)]
    struct PlanShape {
        quantity: f64,
        earliest_h: i64,
        slack_h: i64,
        priority: Priority,
    }

    fn priority() -> impl Strategy<Value = Priority> {
        prop_oneof![
            Just(Priority::Low),
            Just(Priority::Medium),
            Just(Priority::High),
            Just(Priority::Urgent),
        ]
    }

    fn plan_shape() -> impl Strategy<Value = PlanShape> {
        (10.0f64..200.0, 0i64..48, 4i64..96, priority()).prop_map(
            |(quantity, earliest_h, slack_h, priority)| PlanShape {
                quantity: quantity.round(),
                earliest_h,
                slack_h,
                priority,
            },
        )
    }

    fn assert_no_overlap(rows: &[GanttRow]) {
        for (i, a) in rows.iter().enumerate() {
            for b in rows.iter().skip(i + 1) {
                if a.resource_id != b.resource_id || a.shared || b.shared {
                    continue;
                }
                assert!(
                    a.end <= b.start || b.end <= a.start,
                    "{} [{}, {}) 与 {} [{}, {}) 在 {} 上重叠",
                    a.plan_id,
                    a.start,
                    a.end,
                    b.plan_id,
                    b.start,
                    b.end,
                    a.resource_id
                );
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn committed_assignments_never_overlap(
            shapes in prop::collection::vec(plan_shape(), 1..6),
            manual in prop::collection::vec((0usize..6, 0i64..72, 1i64..24), 0..5),
            seed in 0u64..1000,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let env = setup(None);
                let api = env.api();
                use_small_search(api, seed);
                api.upsert_resource(line("R1")).unwrap();
                api.upsert_resource(line("R2")).unwrap();

                let mut ids = Vec::new();
                for (i, shape) in shapes.iter().enumerate() {
                    let id = format!("P{}", i);
                    let earliest = hours(shape.earliest_h);
                    let due = hours(shape.earliest_h + shape.slack_h);
                    api.submit_plan(plan_request(&id, shape.quantity, earliest, due, shape.priority))
                        .unwrap();
                    ids.push(id);
                }

                // 先做若干人工插入 (可能被拒绝或窗口非法)
                for (idx, start_h, len_h) in &manual {
                    let Some(id) = ids.get(*idx) else { continue };
                    let window = TimeWindow::new(hours(*start_h), hours(start_h + len_h)).unwrap();
                    let _ = api
                        .manual_schedule(ManualScheduleRequest {
                            plan_id: id.clone(),
                            resource_id: "R1".to_string(),
                            window,
                            actor: "planner".to_string(),
                        })
                        .await;
                }
                assert_no_overlap(&api.gantt(ScheduleScope::default()).await.unwrap());

                let drafts: Vec<String> = api
                    .list_plans()
                    .unwrap()
                    .into_iter()
                    .filter(|p| p.status == production_aps::PlanStatus::Draft)
                    .map(|p| p.plan_id)
                    .collect();
                if !drafts.is_empty() {
                    // 与已提交状态重叠的候选会被拒绝,其余强制提交
                    api
                        .auto_schedule(AutoScheduleRequest {
                            plan_ids: drafts,
                            strategy: ScheduleStrategy::Balanced,
                            custom_strategy_id: None,
                            horizon_start: t0(),
                            force_commit: true,
                            actor: "tester".to_string(),
                        })
                        .await
                        .unwrap();
                }
                assert_no_overlap(&api.gantt(ScheduleScope::default()).await.unwrap());
            });
        }
    }
}
