// ==========================================
// 生产排程引擎 - 排程配置项
// ==========================================
// 职责: 优化器/冲突检测/工时估算/编排器的类型化配置
// 存储: config_kv 表 (键见 config_keys)
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// OptimizerConfig - 遗传搜索参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub population_size: usize,
    pub max_generations: usize,
    /// 连续多少代最优值无改善即收敛
    pub stagnation_generations: usize,
    pub tournament_size: usize,
    /// 每个基因的变异概率
    pub mutation_rate: f64,
    pub elite_count: usize,
    /// 初始种群中"打乱顺序的最早可行位"个体占比
    pub heuristic_seed_ratio: f64,
    /// 墙钟预算 (毫秒)
    pub timeout_ms: u64,
    /// 随机种子; None 时按当前时间生成
    pub seed: Option<u64>,
    /// 排程时间粒度 (分钟)
    pub time_slot_minutes: i64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            population_size: 80,
            max_generations: 150,
            stagnation_generations: 20,
            tournament_size: 3,
            mutation_rate: 0.05,
            elite_count: 2,
            heuristic_seed_ratio: 0.25,
            timeout_ms: 30_000,
            seed: None,
            time_slot_minutes: 60,
        }
    }
}

// ==========================================
// FitnessWeights - 适应度权重
// ==========================================
// fitness = w1·加权拖期(小时) + w2·冲突罚分 + w3·资源利用率方差 - w4·提前完工奖励(小时)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    pub tardiness: f64,
    pub conflict: f64,
    pub utilization_variance: f64,
    pub earliness: f64,
    /// 优先级权重指数: weight = {1,2,4,8}^emphasis
    pub priority_emphasis: f64,
    pub high_severity_penalty: f64,
    pub medium_severity_penalty: f64,
    pub low_severity_penalty: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            tardiness: 1.0,
            conflict: 10.0,
            utilization_variance: 10.0,
            earliness: 0.01,
            priority_emphasis: 1.0,
            high_severity_penalty: 1000.0,
            medium_severity_penalty: 50.0,
            low_severity_penalty: 1.0,
        }
    }
}

// ==========================================
// DetectorConfig - 冲突检测阈值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// 交期风险余量 (分钟); 完工距交期小于该值记 Medium
    pub deadline_risk_margin_minutes: i64,
    /// 超负荷比例 > 该值记 Medium
    pub overutilization_medium_ratio: f64,
    /// 超负荷比例 > 该值记 High
    pub overutilization_high_ratio: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            deadline_risk_margin_minutes: 24 * 60,
            overutilization_medium_ratio: 0.2,
            overutilization_high_ratio: 0.5,
        }
    }
}

// ==========================================
// PredictorConfig - 工时估算阈值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// 低于该置信度时改用启发式
    pub min_confidence: f64,
    /// 不低于该置信度时视为可靠
    pub reliable_confidence: f64,
    /// 启发式估算的固定置信度
    pub heuristic_confidence: f64,
    /// 不可靠估算的时长放大比例
    pub unreliable_padding_ratio: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            reliable_confidence: 0.8,
            heuristic_confidence: 0.6,
            unreliable_padding_ratio: 0.1,
        }
    }
}

// ==========================================
// OrchestratorConfig - 提交/加锁参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// 单个资源锁的等待上限 (毫秒)
    pub lock_wait_ms: u64,
    pub lock_retry_attempts: u32,
    pub lock_backoff_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            lock_wait_ms: 2_000,
            lock_retry_attempts: 3,
            lock_backoff_ms: 50,
        }
    }
}

// ==========================================
// SchedulerConfig - 排程总配置
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub optimizer: OptimizerConfig,
    pub weights: FitnessWeights,
    pub detector: DetectorConfig,
    pub predictor: PredictorConfig,
    pub orchestrator: OrchestratorConfig,
}
