// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、资源/计划构造、固定工时预测器
// ==========================================
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use tempfile::TempDir;

use production_aps::app::{AppOptions, AppState};
use production_aps::config::config_keys;
use production_aps::engine::orchestrator::NewPlanRequest;
use production_aps::{
    DurationPredictor, Prediction, Priority, ProductionPlan, Resource, ResourceKind, ScheduleApi,
};

/// 测试环境 (TempDir 需要与 AppState 同生命周期)
pub struct TestEnv {
    pub dir: TempDir,
    pub db_path: String,
    pub state: AppState,
}

impl TestEnv {
    pub fn api(&self) -> &ScheduleApi {
        &self.state.schedule_api
    }

    /// 在同一数据库上重新组装应用 (模拟重启)
    pub fn reopen(&self) -> AppState {
        AppState::new(&self.db_path).unwrap()
    }
}

/// 创建临时测试数据库并组装应用
pub fn setup(predictor: Option<Arc<dyn DurationPredictor>>) -> TestEnv {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("aps_test.db").to_str().unwrap().to_string();
    let state = AppState::with_options(
        &db_path,
        AppOptions {
            predictor,
            event_publisher: None,
        },
    )
    .unwrap();
    TestEnv { dir, db_path, state }
}

/// 小规模、固定种子的搜索参数
pub fn use_small_search(api: &ScheduleApi, seed: u64) {
    api.set_config_value(config_keys::POPULATION_SIZE, "24").unwrap();
    api.set_config_value(config_keys::MAX_GENERATIONS, "30").unwrap();
    api.set_config_value(config_keys::STAGNATION_GENERATIONS, "10").unwrap();
    api.set_config_value(config_keys::SEED, &seed.to_string()).unwrap();
}

// ==========================================
// 时间
// ==========================================

/// 基准时刻 2026-03-02 00:00
pub fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn hours(h: i64) -> NaiveDateTime {
    t0() + Duration::hours(h)
}

pub fn days(d: i64) -> NaiveDateTime {
    t0() + Duration::days(d)
}

// ==========================================
// 数据构造
// ==========================================

/// 全天可用的产线 (额定 10 件/小时)
pub fn line(resource_id: &str) -> Resource {
    Resource {
        resource_id: resource_id.to_string(),
        resource_name: format!("产线 {}", resource_id),
        kind: ResourceKind::Line,
        capacity_unit: "pcs".to_string(),
        daily_capacity_minutes: 24 * 60,
        nominal_rate_per_hour: 10.0,
        supported_products: Vec::new(),
        active: true,
    }
}

pub fn plan_request(
    plan_id: &str,
    quantity: f64,
    earliest_start: NaiveDateTime,
    due_date: NaiveDateTime,
    priority: Priority,
) -> NewPlanRequest {
    NewPlanRequest {
        plan_id: Some(plan_id.to_string()),
        product_code: "WIDGET".to_string(),
        target_quantity: quantity,
        earliest_start,
        due_date,
        priority,
        actor: "tester".to_string(),
    }
}

// ==========================================
// FixedPredictor - 按计划返回固定时长
// ==========================================
pub struct FixedPredictor {
    durations: BTreeMap<String, Duration>,
    confidence: f64,
}

impl FixedPredictor {
    pub fn new(durations: &[(&str, Duration)], confidence: f64) -> Arc<dyn DurationPredictor> {
        Arc::new(Self {
            durations: durations
                .iter()
                .map(|(id, d)| (id.to_string(), *d))
                .collect(),
            confidence,
        })
    }
}

#[async_trait]
impl DurationPredictor for FixedPredictor {
    async fn predict(
        &self,
        plan: &ProductionPlan,
        _resource: &Resource,
        _quantity: f64,
    ) -> anyhow::Result<Prediction> {
        let duration = self
            .durations
            .get(&plan.plan_id)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no fixed duration for {}", plan.plan_id))?;
        Ok(Prediction {
            duration,
            confidence: self.confidence,
        })
    }
}
