// ==========================================
// 生产排程引擎 - 引擎层错误类型
// ==========================================
// 说明: 不可行方案不是错误 (随冲突列表返回); 超时是运行状态
// 只有 Concurrency 是对调用方暴露的失败
// ==========================================

use crate::domain::conflict::Conflict;
use crate::domain::types::PlanStatus;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 排程引擎错误类型
#[derive(Error, Debug)]
pub enum SchedulingError {
    /// 请求不合法 (窗口越界、计划状态不符等),无副作用
    #[error("校验失败: {0}")]
    Validation(String),

    /// 人工排程与已有分配冲突
    #[error("排程冲突: {}", .0.description)]
    Conflict(Conflict),

    /// 资源锁竞争超过重试预算
    #[error("资源锁竞争超限: resource_id={resource_id}, attempts={attempts}")]
    Concurrency { resource_id: String, attempts: u32 },

    #[error("{entity}不存在: id={id}")]
    NotFound { entity: &'static str, id: String },

    #[error("无效的状态转换: plan_id={plan_id}, from={from} to={to}")]
    InvalidStateTransition {
        plan_id: String,
        from: PlanStatus,
        to: PlanStatus,
    },

    #[error("工时估算失败: {0}")]
    Predictor(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl SchedulingError {
    pub fn plan_not_found(plan_id: &str) -> Self {
        SchedulingError::NotFound {
            entity: "生产计划",
            id: plan_id.to_string(),
        }
    }

    pub fn resource_not_found(resource_id: &str) -> Self {
        SchedulingError::NotFound {
            entity: "资源",
            id: resource_id.to_string(),
        }
    }
}

/// Result 类型别名
pub type SchedulingResult<T> = Result<T, SchedulingError>;
