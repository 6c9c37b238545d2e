// ==========================================
// 生产排程引擎 - 优化运行记录
// ==========================================
// 用途: 每次优化调用产出一条 ScheduleRun,结束后只读,保留审计
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::schedule::Assignment;
use crate::domain::types::{RunStatus, ScheduleStrategy};

// ==========================================
// FitnessBreakdown - 适应度分解 (可解释性)
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessBreakdown {
    pub weighted_tardiness: f64,     // 加权拖期 (小时)
    pub conflict_penalty: f64,       // 冲突惩罚 (严重度加权)
    pub utilization_variance: f64,   // 资源利用率方差
    pub earliness_bonus: f64,        // 提前完工奖励 (小时)
    pub high_conflicts: usize,       // High 冲突数
    pub total: f64,                  // 加权总分 (越小越好)
}

impl FitnessBreakdown {
    /// 是否可行 (无 High 冲突)
    pub fn is_feasible(&self) -> bool {
        self.high_conflicts == 0
    }
}

// ==========================================
// ScheduleRun - 优化运行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRun {
    pub run_id: String,                   // 运行ID
    pub plan_ids: Vec<String>,            // 输入计划集
    pub strategy: ScheduleStrategy,       // 策略
    #[serde(default)]
    pub custom_strategy_id: Option<String>, // 自定义策略ID
    pub seed: u64,                        // 随机种子 (可复现)
    pub started_at: NaiveDateTime,        // 开始时间
    pub finished_at: NaiveDateTime,       // 结束时间
    pub status: RunStatus,                // 运行状态
    pub assignments: Vec<Assignment>,     // 最优候选分配
    pub best_fitness: f64,                // 最优适应度
    pub breakdown: FitnessBreakdown,      // 适应度分解
    pub generations: usize,               // 已执行代数
    #[serde(default)]
    pub fitness_history: Vec<f64>,        // 每代历史最优 (下标0为初代)
}

impl ScheduleRun {
    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
