// ==========================================
// 生产排程引擎 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合编排器所需的全部 Repository,简化依赖注入
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::repository::{
    ActionLogRepository, AssignmentRepository, CompletionHistoryRepository, PlanRepository,
    ResourceRepository, ScheduleRunRepository,
};

/// 排程引擎仓储集合
///
/// # 包含的仓储
/// - `plan_repo`: 生产计划
/// - `resource_repo`: 资源主数据
/// - `assignment_repo`: 已提交分配
/// - `run_repo`: 优化运行记录
/// - `history_repo`: 完工历史 (工时估算)
/// - `action_log_repo`: 操作日志
#[derive(Clone)]
pub struct ScheduleRepositories {
    pub plan_repo: Arc<PlanRepository>,
    pub resource_repo: Arc<ResourceRepository>,
    pub assignment_repo: Arc<AssignmentRepository>,
    pub run_repo: Arc<ScheduleRunRepository>,
    pub history_repo: Arc<CompletionHistoryRepository>,
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl ScheduleRepositories {
    /// 基于同一连接创建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            plan_repo: Arc::new(PlanRepository::new(conn.clone())),
            resource_repo: Arc::new(ResourceRepository::new(conn.clone())),
            assignment_repo: Arc::new(AssignmentRepository::new(conn.clone())),
            run_repo: Arc::new(ScheduleRunRepository::new(conn.clone())),
            history_repo: Arc::new(CompletionHistoryRepository::new(conn.clone())),
            action_log_repo: Arc::new(ActionLogRepository::new(conn)),
        }
    }

    pub fn plan_repo(&self) -> &Arc<PlanRepository> {
        &self.plan_repo
    }

    pub fn resource_repo(&self) -> &Arc<ResourceRepository> {
        &self.resource_repo
    }

    pub fn assignment_repo(&self) -> &Arc<AssignmentRepository> {
        &self.assignment_repo
    }

    pub fn run_repo(&self) -> &Arc<ScheduleRunRepository> {
        &self.run_repo
    }

    pub fn history_repo(&self) -> &Arc<CompletionHistoryRepository> {
        &self.history_repo
    }

    pub fn action_log_repo(&self) -> &Arc<ActionLogRepository> {
        &self.action_log_repo
    }
}
