// ==========================================
// 生产排程引擎 - 配置层
// ==========================================
// 职责: 系统配置管理,支持覆写与快照
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod scheduler_config;
pub mod strategy_profile;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use scheduler_config::{
    DetectorConfig, FitnessWeights, OptimizerConfig, OrchestratorConfig, PredictorConfig,
    SchedulerConfig,
};
pub use strategy_profile::{CustomStrategyParameters, CustomStrategyProfile};
