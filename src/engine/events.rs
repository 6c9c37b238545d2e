// ==========================================
// 生产排程引擎 - 排程事件发布
// ==========================================
// 职责: 提交成功后通知下游 (看板刷新、外部系统同步)
// 说明: 引擎只定义 trait,具体投递方式由宿主注入
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 排程事件类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleEventType {
    /// 新分配已提交 (自动/人工排程)
    AssignmentsCommitted,
    /// 重排替换了原有分配
    AssignmentsReplaced,
    /// 分配被释放 (完工/取消)
    AssignmentsReleased,
    /// 计划状态变更 (开工/报工)
    PlanStatusChanged,
}

impl ScheduleEventType {
    pub fn as_str(&self) -> &str {
        match self {
            ScheduleEventType::AssignmentsCommitted => "AssignmentsCommitted",
            ScheduleEventType::AssignmentsReplaced => "AssignmentsReplaced",
            ScheduleEventType::AssignmentsReleased => "AssignmentsReleased",
            ScheduleEventType::PlanStatusChanged => "PlanStatusChanged",
        }
    }
}

/// 排程事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub event_type: ScheduleEventType,
    /// 触发事件的优化运行 (人工操作为 None)
    pub run_id: Option<String>,
    pub plan_ids: Vec<String>,
    pub resource_ids: Vec<String>,
    /// 受影响的时间范围
    pub affected_range: Option<(NaiveDateTime, NaiveDateTime)>,
    pub source: Option<String>,
}

impl ScheduleEvent {
    pub fn new(event_type: ScheduleEventType, plan_ids: Vec<String>, resource_ids: Vec<String>) -> Self {
        Self {
            event_type,
            run_id: None,
            plan_ids,
            resource_ids,
            affected_range: None,
            source: None,
        }
    }

    pub fn with_run(mut self, run_id: Option<String>) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_range(mut self, range: Option<(NaiveDateTime, NaiveDateTime)>) -> Self {
        self.affected_range = range;
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 排程事件发布者
pub trait ScheduleEventPublisher: Send + Sync {
    /// 发布事件,返回投递ID (不支持时为空字符串)
    fn publish(&self, event: ScheduleEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl ScheduleEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: ScheduleEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            event_type = event.event_type.as_str(),
            plans = event.plan_ids.len(),
            "NoOpEventPublisher: 跳过事件发布"
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn ScheduleEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn ScheduleEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件; 失败只记日志,不影响已完成的提交
    pub fn publish(&self, event: ScheduleEvent) {
        let Some(publisher) = &self.inner else {
            tracing::debug!(event_type = event.event_type.as_str(), "未配置事件发布者，跳过");
            return;
        };
        let event_type = event.event_type;
        match publisher.publish(event) {
            Ok(id) => tracing::debug!(event_type = event_type.as_str(), delivery_id = %id, "事件已发布"),
            Err(e) => tracing::warn!(event_type = event_type.as_str(), error = %e, "事件发布失败"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<ScheduleEventType>>);

    impl ScheduleEventPublisher for Recording {
        fn publish(&self, event: ScheduleEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
            self.0.lock().unwrap().push(event.event_type);
            Ok("1".to_string())
        }
    }

    struct Failing;

    impl ScheduleEventPublisher for Failing {
        fn publish(&self, _event: ScheduleEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
            Err("queue closed".into())
        }
    }

    fn event() -> ScheduleEvent {
        ScheduleEvent::new(
            ScheduleEventType::AssignmentsCommitted,
            vec!["P1".to_string()],
            vec!["R1".to_string()],
        )
        .with_source("auto_schedule")
    }

    #[test]
    fn test_noop_publisher() {
        let result = NoOpEventPublisher.publish(event());
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_optional_publisher_forwards() {
        let recording = Arc::new(Recording::default());
        let publisher = OptionalEventPublisher::with_publisher(recording.clone());
        assert!(publisher.is_configured());
        publisher.publish(event());
        assert_eq!(
            *recording.0.lock().unwrap(),
            vec![ScheduleEventType::AssignmentsCommitted]
        );
    }

    #[test]
    fn test_publish_failure_is_swallowed() {
        let publisher = OptionalEventPublisher::with_publisher(Arc::new(Failing));
        publisher.publish(event());
        assert!(!OptionalEventPublisher::none().is_configured());
    }
}
