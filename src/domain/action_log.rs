// ==========================================
// 生产排程引擎 - 操作日志领域模型
// ==========================================
// 红线: 所有已提交的写入必须记录
// 用途: 审计追踪
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,             // 日志ID
    pub action_type: String,           // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,      // 操作时间戳
    pub actor: String,                 // 操作人
    pub plan_ids: Vec<String>,         // 涉及计划
    pub resource_ids: Vec<String>,     // 涉及资源
    pub reason: Option<String>,        // 操作原因 (重排必填)
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    SubmitPlan,     // 提交计划
    AutoSchedule,   // 自动排程
    ManualSchedule, // 人工排程
    Reschedule,     // 重排
    StartPlan,      // 开工
    ReportProgress, // 报工
    CompletePlan,   // 完工
    CancelPlan,     // 取消
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::SubmitPlan => "SubmitPlan",
            ActionType::AutoSchedule => "AutoSchedule",
            ActionType::ManualSchedule => "ManualSchedule",
            ActionType::Reschedule => "Reschedule",
            ActionType::StartPlan => "StartPlan",
            ActionType::ReportProgress => "ReportProgress",
            ActionType::CompletePlan => "CompletePlan",
            ActionType::CancelPlan => "CancelPlan",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SubmitPlan" => Some(ActionType::SubmitPlan),
            "AutoSchedule" => Some(ActionType::AutoSchedule),
            "ManualSchedule" => Some(ActionType::ManualSchedule),
            "Reschedule" => Some(ActionType::Reschedule),
            "StartPlan" => Some(ActionType::StartPlan),
            "ReportProgress" => Some(ActionType::ReportProgress),
            "CompletePlan" => Some(ActionType::CompletePlan),
            "CancelPlan" => Some(ActionType::CancelPlan),
            _ => None,
        }
    }
}

impl ActionLog {
    /// 创建新的操作日志
    pub fn new(action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Utc::now().naive_utc(),
            actor: actor.to_string(),
            plan_ids: Vec::new(),
            resource_ids: Vec::new(),
            reason: None,
            payload_json: None,
        }
    }

    pub fn with_plans(mut self, plan_ids: Vec<String>) -> Self {
        self.plan_ids = plan_ids;
        self
    }

    pub fn with_resources(mut self, resource_ids: Vec<String>) -> Self {
        self.resource_ids = resource_ids;
        self
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_round_trip() {
        for t in [
            ActionType::SubmitPlan,
            ActionType::AutoSchedule,
            ActionType::ManualSchedule,
            ActionType::Reschedule,
            ActionType::StartPlan,
            ActionType::ReportProgress,
            ActionType::CompletePlan,
            ActionType::CancelPlan,
        ] {
            assert_eq!(ActionType::from_str(t.as_str()), Some(t));
        }
    }

    #[test]
    fn test_builder() {
        let log = ActionLog::new(ActionType::Reschedule, "planner")
            .with_plans(vec!["P1".to_string()])
            .with_reason(Some("设备检修".to_string()));
        assert_eq!(log.action_type, "Reschedule");
        assert_eq!(log.plan_ids.len(), 1);
        assert_eq!(log.reason.as_deref(), Some("设备检修"));
    }
}
