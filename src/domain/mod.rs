// ==========================================
// 生产排程引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、值类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod conflict;
pub mod history;
pub mod plan;
pub mod resource;
pub mod run;
pub mod schedule;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use conflict::Conflict;
pub use history::CompletionRecord;
pub use plan::ProductionPlan;
pub use resource::Resource;
pub use run::{FitnessBreakdown, ScheduleRun};
pub use schedule::{Assignment, InvalidWindow, TimeWindow};
pub use types::{
    ConflictKind, PlanStatus, Priority, ResourceKind, RunStatus, ScheduleStrategy, Severity,
};
