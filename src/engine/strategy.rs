// ==========================================
// 生产排程引擎 - 策略预设
// ==========================================
// 用途: 预设只改变权重与初始种群的排序方式,不改变搜索算法
// 自定义策略在预设之上覆写参数 (config_kv: custom_strategy/{id})
// ==========================================

use crate::config::{CustomStrategyProfile, SchedulerConfig};
use crate::domain::plan::ProductionPlan;
use crate::domain::types::ScheduleStrategy;
use std::cmp::Reverse;

/// 交期优先预设中拖期权重的放大倍数
const EDD_TARDINESS_FACTOR: f64 = 10.0;
/// 优先级优先预设的优先级权重指数
const PRIORITY_FIRST_EMPHASIS: f64 = 2.0;

/// 最早可行位启发式的计划排序方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedingOrder {
    /// 交期升序
    DueDate,
    /// 预测时长升序
    ProcessingTime,
    /// 优先级降序,再按交期
    Priority,
    /// 最早开工升序,再按交期
    Balanced,
}

impl SeedingOrder {
    /// 返回计划下标的排序; `min_minutes[i]` 为计划 i 在各候选资源上的最短时长
    pub fn order(&self, plans: &[ProductionPlan], min_minutes: &[i64]) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..plans.len()).collect();
        match self {
            SeedingOrder::DueDate => idx.sort_by_key(|&i| {
                (plans[i].due_date, Reverse(plans[i].priority), plans[i].plan_id.clone())
            }),
            SeedingOrder::ProcessingTime => idx.sort_by_key(|&i| {
                (
                    min_minutes.get(i).copied().unwrap_or(i64::MAX),
                    plans[i].due_date,
                    plans[i].plan_id.clone(),
                )
            }),
            SeedingOrder::Priority => idx.sort_by_key(|&i| {
                (Reverse(plans[i].priority), plans[i].due_date, plans[i].plan_id.clone())
            }),
            SeedingOrder::Balanced => idx.sort_by_key(|&i| {
                (plans[i].earliest_start, plans[i].due_date, plans[i].plan_id.clone())
            }),
        }
        idx
    }
}

// ==========================================
// StrategyProfile - 解析后的策略
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyProfile {
    pub strategy: ScheduleStrategy,
    pub custom_strategy_id: Option<String>,
    pub seeding: SeedingOrder,
}

impl StrategyProfile {
    /// 将预设 (及可选的自定义覆写) 应用到配置上
    pub fn resolve(
        strategy: ScheduleStrategy,
        custom: Option<&CustomStrategyProfile>,
        cfg: &mut SchedulerConfig,
    ) -> Self {
        let base = custom.map(|c| c.base_strategy).unwrap_or(strategy);
        let seeding = match base {
            ScheduleStrategy::EarliestDueDate => {
                cfg.weights.tardiness *= EDD_TARDINESS_FACTOR;
                SeedingOrder::DueDate
            }
            ScheduleStrategy::ShortestProcessingTime => SeedingOrder::ProcessingTime,
            ScheduleStrategy::PriorityFirst => {
                cfg.weights.priority_emphasis = PRIORITY_FIRST_EMPHASIS;
                SeedingOrder::Priority
            }
            ScheduleStrategy::Balanced => SeedingOrder::Balanced,
        };
        if let Some(c) = custom {
            c.parameters.apply_to(cfg);
        }
        Self {
            strategy: base,
            custom_strategy_id: custom.map(|c| c.strategy_id.clone()),
            seeding,
        }
    }
}
