// ==========================================
// 生产排程引擎 - 工时估算适配器
// ==========================================
// 职责: 包装外部工时预测器 (黑盒),提供输入校验/启发式兜底/置信度阈值
// 红线: 本模块不做任何学习,只消费预测结果与历史完工记录
// ==========================================

use crate::config::PredictorConfig;
use crate::domain::history::CompletionRecord;
use crate::domain::plan::ProductionPlan;
use crate::domain::resource::Resource;
use crate::engine::error::{SchedulingError, SchedulingResult};
use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

// ==========================================
// DurationPredictor - 外部预测器接口
// ==========================================

/// 外部预测器返回值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub duration: Duration,
    /// 置信度 [0, 1]
    pub confidence: f64,
}

/// 外部工时预测器
///
/// 任何实现 (统计模型、远程服务等) 都通过该接口接入,
/// `quantity` 为本次需要排产的数量 (进行中计划为剩余数量)
#[async_trait]
pub trait DurationPredictor: Send + Sync {
    async fn predict(
        &self,
        plan: &ProductionPlan,
        resource: &Resource,
        quantity: f64,
    ) -> anyhow::Result<Prediction>;
}

// ==========================================
// HistoricalRates - 历史产出速率
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
struct RateAccumulator {
    quantity: f64,
    hours: f64,
}

impl RateAccumulator {
    fn add(&mut self, record: &CompletionRecord) {
        self.quantity += record.quantity;
        self.hours += record.duration_minutes as f64 / 60.0;
    }

    fn rate(&self) -> Option<f64> {
        (self.hours > 0.0 && self.quantity > 0.0).then(|| self.quantity / self.hours)
    }
}

/// 历史完工记录聚合出的平均速率 (按总量/总工时加权)
#[derive(Debug, Clone, Default)]
pub struct HistoricalRates {
    by_resource_product: BTreeMap<(String, String), RateAccumulator>,
    by_resource: BTreeMap<String, RateAccumulator>,
}

impl HistoricalRates {
    pub fn from_records(records: &[CompletionRecord]) -> Self {
        let mut rates = Self::default();
        for r in records.iter().filter(|r| r.rate_per_hour().is_some()) {
            rates
                .by_resource_product
                .entry((r.resource_id.clone(), r.product_code.clone()))
                .or_default()
                .add(r);
            rates.by_resource.entry(r.resource_id.clone()).or_default().add(r);
        }
        rates
    }

    /// 速率优先级: (资源, 产品) 历史 → 资源历史 → 资源额定速率
    pub fn rate_for(&self, resource: &Resource, product_code: &str) -> Option<f64> {
        self.by_resource_product
            .get(&(resource.resource_id.clone(), product_code.to_string()))
            .and_then(RateAccumulator::rate)
            .or_else(|| self.by_resource.get(&resource.resource_id).and_then(RateAccumulator::rate))
            .or_else(|| {
                (resource.nominal_rate_per_hour > 0.0 && resource.nominal_rate_per_hour.is_finite())
                    .then_some(resource.nominal_rate_per_hour)
            })
    }
}

// ==========================================
// DurationEstimate - 估算结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstimateSource {
    Predictor,
    Heuristic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationEstimate {
    /// 排程使用的时长 (已按时间粒度向上取整,不可靠时已放大)
    pub duration: Duration,
    pub confidence: f64,
    pub source: EstimateSource,
    pub reliable: bool,
}

// ==========================================
// DurationEstimator - 工时估算适配器
// ==========================================
#[derive(Clone)]
pub struct DurationEstimator {
    predictor: Option<Arc<dyn DurationPredictor>>,
    rates: HistoricalRates,
    config: PredictorConfig,
    slot_minutes: i64,
}

impl DurationEstimator {
    pub fn new(
        predictor: Option<Arc<dyn DurationPredictor>>,
        rates: HistoricalRates,
        config: PredictorConfig,
        slot_minutes: i64,
    ) -> Self {
        Self {
            predictor,
            rates,
            config,
            slot_minutes: slot_minutes.max(1),
        }
    }

    /// 资源能否承接该计划 (启用且支持该产品)
    pub fn is_compatible(plan: &ProductionPlan, resource: &Resource) -> bool {
        resource.active && resource.supports(&plan.product_code)
    }

    /// 估算计划在指定资源上的时长
    pub async fn estimate(
        &self,
        plan: &ProductionPlan,
        resource: &Resource,
    ) -> SchedulingResult<DurationEstimate> {
        if !resource.active {
            return Err(SchedulingError::Validation(format!(
                "资源 {} 未启用",
                resource.resource_id
            )));
        }
        if !resource.supports(&plan.product_code) {
            return Err(SchedulingError::Validation(format!(
                "资源 {} 不支持产品 {}",
                resource.resource_id, plan.product_code
            )));
        }
        let quantity = plan.remaining_quantity();
        if quantity <= 0.0 {
            return Err(SchedulingError::Validation(format!(
                "计划 {} 无剩余数量可排",
                plan.plan_id
            )));
        }

        if let Some(predictor) = &self.predictor {
            match predictor.predict(plan, resource, quantity).await {
                Ok(p) if p.confidence >= self.config.min_confidence && p.duration > Duration::zero() => {
                    return Ok(self.finish(p.duration, p.confidence, EstimateSource::Predictor));
                }
                Ok(p) => debug!(
                    plan_id = %plan.plan_id,
                    resource_id = %resource.resource_id,
                    confidence = p.confidence,
                    "预测置信度不足，改用启发式估算"
                ),
                Err(e) => warn!(
                    plan_id = %plan.plan_id,
                    resource_id = %resource.resource_id,
                    error = %e,
                    "工时预测器调用失败，改用启发式估算"
                ),
            }
        }

        let rate = self
            .rates
            .rate_for(resource, &plan.product_code)
            .ok_or_else(|| {
                SchedulingError::Predictor(format!(
                    "资源 {} 无历史速率且未配置额定速率",
                    resource.resource_id
                ))
            })?;
        let minutes = (quantity / rate * 60.0).ceil() as i64;
        Ok(self.finish(
            Duration::minutes(minutes.max(1)),
            self.config.heuristic_confidence,
            EstimateSource::Heuristic,
        ))
    }

    fn finish(&self, raw: Duration, confidence: f64, source: EstimateSource) -> DurationEstimate {
        let reliable = confidence >= self.config.reliable_confidence;
        let mut minutes = raw.num_minutes().max(1) as f64;
        if !reliable {
            minutes *= 1.0 + self.config.unreliable_padding_ratio.max(0.0);
        }
        DurationEstimate {
            duration: Duration::minutes(round_up_to_slot(minutes.ceil() as i64, self.slot_minutes)),
            confidence,
            source,
            reliable,
        }
    }
}

/// 向上取整到时间粒度的整数倍
pub fn round_up_to_slot(minutes: i64, slot: i64) -> i64 {
    let slot = slot.max(1);
    let minutes = minutes.max(1);
    (minutes + slot - 1) / slot * slot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{PlanStatus, Priority, ResourceKind};
    use chrono::{NaiveDate, NaiveDateTime};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn plan(target: f64, done: f64) -> ProductionPlan {
        ProductionPlan {
            plan_id: "P1".to_string(),
            product_code: "A".to_string(),
            target_quantity: target,
            completed_quantity: done,
            earliest_start: t0(),
            due_date: t0() + Duration::days(5),
            priority: Priority::Medium,
            status: PlanStatus::Draft,
            assigned_resource_id: None,
            assigned_window: None,
            created_at: t0(),
            updated_at: t0(),
        }
    }

    fn resource(rate: f64) -> Resource {
        Resource {
            resource_id: "R1".to_string(),
            resource_name: "一号线".to_string(),
            kind: ResourceKind::Line,
            capacity_unit: "pcs".to_string(),
            daily_capacity_minutes: 0,
            nominal_rate_per_hour: rate,
            supported_products: vec!["A".to_string()],
            active: true,
        }
    }

    fn record(product: &str, qty: f64, minutes: i64) -> CompletionRecord {
        CompletionRecord {
            record_id: format!("{}-{}", product, minutes),
            plan_id: None,
            product_code: product.to_string(),
            resource_id: "R1".to_string(),
            quantity: qty,
            duration_minutes: minutes,
            completed_at: t0(),
        }
    }

    struct Fixed {
        hours: i64,
        confidence: f64,
    }

    #[async_trait]
    impl DurationPredictor for Fixed {
        async fn predict(&self, _: &ProductionPlan, _: &Resource, _: f64) -> anyhow::Result<Prediction> {
            Ok(Prediction {
                duration: Duration::hours(self.hours),
                confidence: self.confidence,
            })
        }
    }

    struct Broken;

    #[async_trait]
    impl DurationPredictor for Broken {
        async fn predict(&self, _: &ProductionPlan, _: &Resource, _: f64) -> anyhow::Result<Prediction> {
            anyhow::bail!("模型服务不可用")
        }
    }

    fn no_padding() -> PredictorConfig {
        PredictorConfig {
            unreliable_padding_ratio: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_round_up_to_slot() {
        assert_eq!(round_up_to_slot(1, 60), 60);
        assert_eq!(round_up_to_slot(60, 60), 60);
        assert_eq!(round_up_to_slot(61, 60), 120);
        assert_eq!(round_up_to_slot(0, 30), 30);
    }

    #[test]
    fn test_rate_fallback_chain() {
        let rates = HistoricalRates::from_records(&[
            record("A", 30.0, 60),
            record("A", 10.0, 60),
            record("B", 100.0, 60),
        ]);
        let r = resource(5.0);
        assert_eq!(rates.rate_for(&r, "A"), Some(20.0));
        assert_eq!(rates.rate_for(&r, "C"), Some(140.0 / 3.0));
        assert_eq!(HistoricalRates::default().rate_for(&r, "A"), Some(5.0));
        assert_eq!(HistoricalRates::default().rate_for(&resource(0.0), "A"), None);
    }

    #[tokio::test]
    async fn test_predictor_used_when_confident() {
        let est = DurationEstimator::new(
            Some(Arc::new(Fixed { hours: 48, confidence: 0.9 })),
            HistoricalRates::default(),
            PredictorConfig::default(),
            60,
        );
        let e = est.estimate(&plan(10.0, 0.0), &resource(1.0)).await.unwrap();
        assert_eq!(e.source, EstimateSource::Predictor);
        assert_eq!(e.duration, Duration::hours(48));
        assert!(e.reliable);
    }

    #[tokio::test]
    async fn test_low_confidence_or_error_falls_back() {
        for predictor in [
            Arc::new(Fixed { hours: 1, confidence: 0.1 }) as Arc<dyn DurationPredictor>,
            Arc::new(Broken) as Arc<dyn DurationPredictor>,
        ] {
            let est = DurationEstimator::new(Some(predictor), HistoricalRates::default(), no_padding(), 60);
            let e = est.estimate(&plan(25.0, 0.0), &resource(10.0)).await.unwrap();
            assert_eq!(e.source, EstimateSource::Heuristic);
            assert!(!e.reliable);
            // 25 / 10 = 2.5h → 取整到 3h
            assert_eq!(e.duration, Duration::hours(3));
        }
    }

    #[tokio::test]
    async fn test_in_progress_uses_remaining_quantity_and_padding() {
        let est = DurationEstimator::new(None, HistoricalRates::default(), PredictorConfig::default(), 30);
        // 剩余 20 / 10 = 120 分钟,放大 10% → 132 → 取整 150
        let e = est.estimate(&plan(50.0, 30.0), &resource(10.0)).await.unwrap();
        assert_eq!(e.duration, Duration::minutes(150));
    }

    #[tokio::test]
    async fn test_validation_failures() {
        let est = DurationEstimator::new(None, HistoricalRates::default(), PredictorConfig::default(), 60);

        let mut inactive = resource(10.0);
        inactive.active = false;
        assert!(matches!(
            est.estimate(&plan(10.0, 0.0), &inactive).await,
            Err(SchedulingError::Validation(_))
        ));

        let mut other = resource(10.0);
        other.supported_products = vec!["B".to_string()];
        assert!(!DurationEstimator::is_compatible(&plan(10.0, 0.0), &other));
        assert!(est.estimate(&plan(10.0, 0.0), &other).await.is_err());

        assert!(est.estimate(&plan(10.0, 10.0), &resource(10.0)).await.is_err());
        assert!(matches!(
            est.estimate(&plan(10.0, 0.0), &resource(0.0)).await,
            Err(SchedulingError::Predictor(_))
        ));
    }
}
