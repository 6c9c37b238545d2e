// ==========================================
// 生产排程引擎 - 编排器请求/结果类型
// ==========================================
// 说明: 所有排程操作都返回 committed 标志,区分"已提交"与"仅建议"
// ==========================================

use crate::domain::conflict::Conflict;
use crate::domain::run::ScheduleRun;
use crate::domain::schedule::{Assignment, TimeWindow};
use crate::domain::types::{Priority, ScheduleStrategy};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 操作人缺省值
pub const DEFAULT_ACTOR: &str = "system";

fn default_actor() -> String {
    DEFAULT_ACTOR.to_string()
}

// ==========================================
// 请求
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoScheduleRequest {
    pub plan_ids: Vec<String>,
    #[serde(default)]
    pub strategy: ScheduleStrategy,
    #[serde(default)]
    pub custom_strategy_id: Option<String>,
    pub horizon_start: NaiveDateTime,
    /// 存在 High 冲突时仍提交 (重叠永远不会被提交)
    #[serde(default)]
    pub force_commit: bool,
    #[serde(default = "default_actor")]
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualScheduleRequest {
    pub plan_id: String,
    pub resource_id: String,
    pub window: TimeWindow,
    #[serde(default = "default_actor")]
    pub actor: String,
}

/// 重排的人工目标位置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualTarget {
    pub resource_id: String,
    pub window: TimeWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub plan_ids: Vec<String>,
    pub reason: String,
    #[serde(default)]
    pub strategy: Option<ScheduleStrategy>,
    #[serde(default)]
    pub custom_strategy_id: Option<String>,
    /// 指定时按人工排程处理 (只允许单个计划)
    #[serde(default)]
    pub target: Option<ManualTarget>,
    pub horizon_start: NaiveDateTime,
    #[serde(default)]
    pub force_commit: bool,
    #[serde(default = "default_actor")]
    pub actor: String,
}

/// 冲突分析/甘特查询范围; 各字段为空表示不限
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleScope {
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub from: Option<NaiveDateTime>,
    #[serde(default)]
    pub to: Option<NaiveDateTime>,
}

impl ScheduleScope {
    pub fn includes(&self, assignment: &Assignment) -> bool {
        if let Some(r) = &self.resource_id {
            if &assignment.resource_id != r {
                return false;
            }
        }
        if let Some(from) = self.from {
            if assignment.window.end() <= from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if assignment.window.start() >= to {
                return false;
            }
        }
        true
    }

    /// 同时给出 from/to 时的查询窗口
    pub fn window(&self) -> Option<TimeWindow> {
        match (self.from, self.to) {
            (Some(from), Some(to)) => TimeWindow::new(from, to).ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPlanRequest {
    #[serde(default)]
    pub plan_id: Option<String>,
    pub product_code: String,
    pub target_quantity: f64,
    pub earliest_start: NaiveDateTime,
    pub due_date: NaiveDateTime,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_actor")]
    pub actor: String,
}

// ==========================================
// 结果
// ==========================================

/// 自动排程/重排结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    /// 人工目标重排时为 None
    pub run: Option<ScheduleRun>,
    pub committed: bool,
    pub assignments: Vec<Assignment>,
    pub conflicts: Vec<Conflict>,
}

impl ScheduleOutcome {
    pub fn run_id(&self) -> Option<&str> {
        self.run.as_ref().map(|r| r.run_id.as_str())
    }
}

/// 人工排程结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualScheduleOutcome {
    pub committed: bool,
    pub assignment: Option<Assignment>,
    /// 导致拒绝的重叠冲突
    pub conflict: Option<Conflict>,
    /// 已提交但需要关注的非阻断冲突
    #[serde(default)]
    pub warnings: Vec<Conflict>,
}
