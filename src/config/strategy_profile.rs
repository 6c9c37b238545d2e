use crate::config::scheduler_config::SchedulerConfig;
use crate::domain::types::ScheduleStrategy;
use serde::{Deserialize, Serialize};

/// 自定义策略（持久化对象）
///
/// 存储位置：config_kv（scope_id='global'，key='custom_strategy/{strategy_id}'）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomStrategyProfile {
    /// 自定义策略 ID（用于选择/引用）
    pub strategy_id: String,

    /// 显示名称
    pub title: String,

    /// 说明（可选）
    #[serde(default)]
    pub description: Option<String>,

    /// 基于哪个预设策略（决定初始种群的排序方式）
    pub base_strategy: ScheduleStrategy,

    /// 参数覆写（未填写的沿用预设值）
    #[serde(default)]
    pub parameters: CustomStrategyParameters,
}

/// 自定义策略参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CustomStrategyParameters {
    /// 拖期权重 w1
    #[serde(default)]
    pub tardiness_weight: Option<f64>,

    /// 冲突罚分权重 w2
    #[serde(default)]
    pub conflict_weight: Option<f64>,

    /// 利用率方差权重 w3
    #[serde(default)]
    pub utilization_weight: Option<f64>,

    /// 提前完工奖励权重 w4
    #[serde(default)]
    pub earliness_weight: Option<f64>,

    /// 优先级权重指数
    #[serde(default)]
    pub priority_emphasis: Option<f64>,

    #[serde(default)]
    pub population_size: Option<usize>,

    #[serde(default)]
    pub max_generations: Option<usize>,
}

impl CustomStrategyParameters {
    /// 将覆写项写入配置 (在预设之后调用)
    pub fn apply_to(&self, cfg: &mut SchedulerConfig) {
        if let Some(v) = self.tardiness_weight {
            cfg.weights.tardiness = v;
        }
        if let Some(v) = self.conflict_weight {
            cfg.weights.conflict = v;
        }
        if let Some(v) = self.utilization_weight {
            cfg.weights.utilization_variance = v;
        }
        if let Some(v) = self.earliness_weight {
            cfg.weights.earliness = v;
        }
        if let Some(v) = self.priority_emphasis {
            cfg.weights.priority_emphasis = v;
        }
        if let Some(v) = self.population_size {
            cfg.optimizer.population_size = v.max(2);
        }
        if let Some(v) = self.max_generations {
            cfg.optimizer.max_generations = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_only_overrides_present_fields() {
        let mut cfg = SchedulerConfig::default();
        let params = CustomStrategyParameters {
            tardiness_weight: Some(5.0),
            population_size: Some(1),
            ..Default::default()
        };
        params.apply_to(&mut cfg);
        assert_eq!(cfg.weights.tardiness, 5.0);
        assert_eq!(cfg.optimizer.population_size, 2);
        assert_eq!(cfg.weights.conflict, SchedulerConfig::default().weights.conflict);
    }

    #[test]
    fn test_profile_json_shape() {
        let raw = r#"{
            "strategy_id": "rush",
            "title": "赶工",
            "base_strategy": "earliest_due_date",
            "parameters": { "tardiness_weight": 20.0 }
        }"#;
        let profile: CustomStrategyProfile = serde_json::from_str(raw).unwrap();
        assert_eq!(profile.base_strategy, ScheduleStrategy::EarliestDueDate);
        assert_eq!(profile.parameters.tardiness_weight, Some(20.0));
        assert!(profile.description.is_none());
    }
}
