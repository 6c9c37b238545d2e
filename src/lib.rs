// ==========================================
// 生产排程引擎 - 核心库
// ==========================================
// 职责: 生产计划分配到有限资源、冲突检测、遗传优化、提交与甘特投影
// 技术栈: Rust + tokio + rayon + SQLite
// 系统定位: 决策支持系统 (人工最终控制权)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 排程规则与优化
pub mod engine;

// 导入层 - 外部完工历史
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 性能统计
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装与请求分发
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ConflictKind, PlanStatus, Priority, ResourceKind, RunStatus, ScheduleStrategy, Severity,
};

// 领域实体
pub use domain::{
    ActionLog, ActionType, Assignment, CompletionRecord, Conflict, FitnessBreakdown,
    ProductionPlan, Resource, ScheduleRun, TimeWindow,
};

// 引擎
pub use engine::{
    CancelFlag, ConflictDetector, DurationPredictor, Prediction, ResourceTimeline,
    ScheduleOrchestrator, SchedulingError, SchedulingResult, SearchControl,
};

// API
pub use api::{ApiError, ApiResult, ScheduleApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "生产排程与冲突消解引擎";
