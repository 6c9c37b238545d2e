// ==========================================
// 生产排程引擎 - API层错误类型
// ==========================================
// 职责: 将仓储/引擎层的技术错误转换为调用方可理解的错误
// 要求: 所有错误信息必须包含显式原因
// ==========================================

use crate::domain::conflict::Conflict;
use crate::engine::error::SchedulingError;
use crate::repository::error::RepositoryError;
use serde::Serialize;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: plan_id={plan_id}, from={from} to={to}")]
    InvalidStateTransition {
        plan_id: String,
        from: String,
        to: String,
    },

    /// 人工排程与已有分配冲突 (附冲突详情)
    #[error("排程冲突: {}", .0.description)]
    ScheduleConflict(Box<Conflict>),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("资源锁竞争超限: resource_id={resource_id}, attempts={attempts}")]
    ConcurrencyLimit { resource_id: String, attempts: u32 },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定的错误码 (供外部调用方分支处理)
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BusinessRuleViolation(_) => "BUSINESS_RULE_VIOLATION",
            ApiError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            ApiError::ScheduleConflict(_) => "SCHEDULE_CONFLICT",
            ApiError::ConcurrencyLimit { .. } => "CONCURRENCY_LIMIT",
            ApiError::DatabaseError(_)
            | ApiError::DatabaseConnectionError(_)
            | ApiError::DatabaseTransactionError(_) => "DATABASE_ERROR",
            ApiError::ImportError(_) => "IMPORT_ERROR",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// 冲突详情 (仅 ScheduleConflict)
    pub fn conflict(&self) -> Option<&Conflict> {
        match self {
            ApiError::ScheduleConflict(c) => Some(c),
            _ => None,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code(),
            message: self.to_string(),
            conflict: self.conflict().cloned(),
        }
    }
}

/// 对外输出的错误结构
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<Conflict>,
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::SerializationError(msg) => {
                ApiError::InternalError(format!("序列化失败: {}", msg))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 SchedulingError 转换
// ==========================================
impl From<SchedulingError> for ApiError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::Validation(msg) => ApiError::InvalidInput(msg),
            SchedulingError::Conflict(c) => ApiError::ScheduleConflict(Box::new(c)),
            SchedulingError::Concurrency {
                resource_id,
                attempts,
            } => ApiError::ConcurrencyLimit {
                resource_id,
                attempts,
            },
            SchedulingError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            SchedulingError::InvalidStateTransition { plan_id, from, to } => {
                ApiError::InvalidStateTransition {
                    plan_id,
                    from: from.to_string(),
                    to: to.to_string(),
                }
            }
            SchedulingError::Predictor(msg) => {
                ApiError::InternalError(format!("工时估算失败: {}", msg))
            }
            SchedulingError::Repository(e) => e.into(),
            SchedulingError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::PlanStatus;

    #[test]
    fn test_repository_error_conversion() {
        let repo_err = RepositoryError::NotFound {
            entity: "Plan".to_string(),
            id: "P001".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("Plan"));
                assert!(msg.contains("P001"));
            }
            _ => panic!("Expected NotFound"),
        }

        let api_err: ApiError = RepositoryError::UniqueConstraintViolation("plans.plan_id".into()).into();
        assert_eq!(api_err.code(), "BUSINESS_RULE_VIOLATION");
    }

    #[test]
    fn test_scheduling_error_conversion() {
        let api_err: ApiError = SchedulingError::Concurrency {
            resource_id: "R1".to_string(),
            attempts: 3,
        }
        .into();
        assert_eq!(api_err.code(), "CONCURRENCY_LIMIT");
        assert!(api_err.to_string().contains("R1"));

        let api_err: ApiError = SchedulingError::InvalidStateTransition {
            plan_id: "P1".to_string(),
            from: PlanStatus::Completed,
            to: PlanStatus::Cancelled,
        }
        .into();
        match api_err {
            ApiError::InvalidStateTransition { plan_id, .. } => assert_eq!(plan_id, "P1"),
            _ => panic!("Expected InvalidStateTransition"),
        }

        let api_err: ApiError =
            SchedulingError::Repository(RepositoryError::LockError("poisoned".into())).into();
        assert_eq!(api_err.code(), "DATABASE_ERROR");
    }

    #[test]
    fn test_error_response_omits_missing_conflict() {
        let resp = ApiError::InvalidInput("缺少计划".to_string()).to_response();
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["code"], "INVALID_INPUT");
        assert!(json.get("conflict").is_none());
    }
}
