// ==========================================
// 生产排程引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod assignment_repo;
pub mod error;
pub mod history_repo;
pub mod plan_repo;
pub mod resource_repo;
pub mod row_codec;
pub mod schedule_run_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use assignment_repo::{AssignmentBatch, AssignmentRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use history_repo::CompletionHistoryRepository;
pub use plan_repo::PlanRepository;
pub use resource_repo::ResourceRepository;
pub use schedule_run_repo::ScheduleRunRepository;
