use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = crate::db::open_in_memory().unwrap();
    Arc::new(Mutex::new(conn))
}

fn make_test_log(action_id: &str, plan_ids: &[&str], day: u32) -> ActionLog {
    let mut log = ActionLog::new(ActionType::ManualSchedule, "planner_a")
        .with_plans(plan_ids.iter().map(|s| s.to_string()).collect())
        .with_resources(vec!["LINE-01".to_string()])
        .with_reason(Some("客户加急".to_string()))
        .with_payload(json!({ "force": false }));
    log.action_id = action_id.to_string();
    log.action_ts = NaiveDate::from_ymd_opt(2026, 3, day)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    log
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = ActionLogRepository::new(setup_test_db());

    let log = make_test_log("log1", &["P1"], 1);
    assert_eq!(repo.insert(&log).unwrap(), "log1");

    let found = repo.find_by_id("log1").unwrap().unwrap();
    assert_eq!(found.action_type, "ManualSchedule");
    assert_eq!(found.plan_ids, vec!["P1".to_string()]);
    assert_eq!(found.resource_ids, vec!["LINE-01".to_string()]);
    assert_eq!(found.reason.as_deref(), Some("客户加急"));
    assert_eq!(found.payload_json, Some(json!({ "force": false })));
    assert_eq!(found.action_ts, log.action_ts);

    assert!(repo.find_by_id("missing").unwrap().is_none());
}

#[test]
fn test_find_by_plan_matches_any_member() {
    let repo = ActionLogRepository::new(setup_test_db());
    repo.batch_insert(vec![
        make_test_log("a", &["P1", "P2"], 1),
        make_test_log("b", &["P2"], 2),
        make_test_log("c", &["P3"], 3),
    ])
    .unwrap();

    let logs = repo.find_by_plan("P2").unwrap();
    let ids: Vec<_> = logs.iter().map(|l| l.action_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert!(repo.find_by_plan("P9").unwrap().is_empty());
}

#[test]
fn test_find_by_time_range_and_recent() {
    let repo = ActionLogRepository::new(setup_test_db());
    for day in 1..=5 {
        repo.insert(&make_test_log(&format!("log{}", day), &["P1"], day))
            .unwrap();
    }

    let start = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let in_range = repo
        .find_by_time_range(start, start + Duration::days(2))
        .unwrap();
    assert_eq!(in_range.len(), 2);

    let recent = repo.find_recent(2).unwrap();
    assert_eq!(recent[0].action_id, "log5");
    assert_eq!(recent[1].action_id, "log4");
    assert_eq!(repo.count().unwrap(), 5);
}

#[test]
fn test_batch_insert_rolls_back_on_duplicate() {
    let repo = ActionLogRepository::new(setup_test_db());
    let result = repo.batch_insert(vec![
        make_test_log("dup", &["P1"], 1),
        make_test_log("dup", &["P1"], 2),
    ]);
    assert!(result.is_err());
    assert_eq!(repo.count().unwrap(), 0);
}
