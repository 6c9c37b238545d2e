// ==========================================
// 生产排程引擎 - 领域类型定义
// ==========================================
// 职责: 优先级、状态、冲突分类等封闭枚举
// 红线: 严重度与策略必须是枚举,不接受自由字符串
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 优先级 (Priority)
// ==========================================
// 顺序: Low < Medium < High < Urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,    // 低
    Medium, // 中
    High,   // 高
    Urgent, // 紧急
}

impl Priority {
    /// 基础权重 (1/2/4/8),拖期与提前奖励按此加权
    pub fn base_weight(&self) -> f64 {
        match self {
            Priority::Low => 1.0,
            Priority::Medium => 2.0,
            Priority::High => 4.0,
            Priority::Urgent => 8.0,
        }
    }

    /// 带强调指数的权重: base_weight ^ emphasis
    pub fn weight(&self, emphasis: f64) -> f64 {
        self.base_weight().powf(emphasis)
    }

    /// 是否属于高优先级 (High/Urgent)
    pub fn is_elevated(&self) -> bool {
        matches!(self, Priority::High | Priority::Urgent)
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Some(Priority::Low),
            "MEDIUM" => Some(Priority::Medium),
            "HIGH" => Some(Priority::High),
            "URGENT" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

// ==========================================
// 计划状态 (Plan Status)
// ==========================================
// 状态机: Draft → Scheduled → InProgress → Completed
//         任意非终态 → Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Draft,      // 草稿
    Scheduled,  // 已排程
    InProgress, // 生产中
    Completed,  // 已完工
    Cancelled,  // 已取消
}

impl PlanStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStatus::Completed | PlanStatus::Cancelled)
    }

    /// 判断状态转换是否合法
    pub fn can_transition_to(&self, next: PlanStatus) -> bool {
        match (self, next) {
            (PlanStatus::Draft, PlanStatus::Scheduled) => true,
            (PlanStatus::Scheduled, PlanStatus::InProgress) => true,
            (PlanStatus::InProgress, PlanStatus::Completed) => true,
            // 重排不改变状态
            (PlanStatus::Scheduled, PlanStatus::Scheduled) => true,
            (PlanStatus::InProgress, PlanStatus::InProgress) => true,
            (from, PlanStatus::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    /// 是否允许重排
    pub fn is_reschedulable(&self) -> bool {
        matches!(self, PlanStatus::Scheduled | PlanStatus::InProgress)
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            PlanStatus::Draft => "DRAFT",
            PlanStatus::Scheduled => "SCHEDULED",
            PlanStatus::InProgress => "IN_PROGRESS",
            PlanStatus::Completed => "COMPLETED",
            PlanStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "DRAFT" => Some(PlanStatus::Draft),
            "SCHEDULED" => Some(PlanStatus::Scheduled),
            "IN_PROGRESS" => Some(PlanStatus::InProgress),
            "COMPLETED" => Some(PlanStatus::Completed),
            "CANCELLED" => Some(PlanStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 资源类型 (Resource Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    Workshop, // 车间
    Line,     // 产线
}

impl ResourceKind {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ResourceKind::Workshop => "WORKSHOP",
            ResourceKind::Line => "LINE",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "WORKSHOP" => Some(ResourceKind::Workshop),
            "LINE" => Some(ResourceKind::Line),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 冲突类型 (Conflict Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    TimeOverlap,             // 时间重叠
    ResourceOverutilization, // 资源超负荷
    DeadlineViolation,       // 交期违约
    PriorityInversion,       // 优先级倒置 (仅提示)
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::TimeOverlap => write!(f, "TIME_OVERLAP"),
            ConflictKind::ResourceOverutilization => write!(f, "RESOURCE_OVERUTILIZATION"),
            ConflictKind::DeadlineViolation => write!(f, "DEADLINE_VIOLATION"),
            ConflictKind::PriorityInversion => write!(f, "PRIORITY_INVERSION"),
        }
    }
}

// ==========================================
// 冲突严重度 (Severity)
// ==========================================
// 顺序: Low < Medium < High
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
        }
    }
}

// ==========================================
// 排程策略 (Schedule Strategy)
// ==========================================
// 预设只改变权重/播种顺序,不改变算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStrategy {
    EarliestDueDate,
    ShortestProcessingTime,
    PriorityFirst,
    Balanced,
}

impl ScheduleStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStrategy::EarliestDueDate => "earliest_due_date",
            ScheduleStrategy::ShortestProcessingTime => "shortest_processing_time",
            ScheduleStrategy::PriorityFirst => "priority_first",
            ScheduleStrategy::Balanced => "balanced",
        }
    }

    pub fn title_cn(&self) -> &'static str {
        match self {
            ScheduleStrategy::EarliestDueDate => "交期优先",
            ScheduleStrategy::ShortestProcessingTime => "短工时优先",
            ScheduleStrategy::PriorityFirst => "优先级优先",
            ScheduleStrategy::Balanced => "均衡方案",
        }
    }
}

impl Default for ScheduleStrategy {
    fn default() -> Self {
        ScheduleStrategy::Balanced
    }
}

impl fmt::Display for ScheduleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ScheduleStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "earliest_due_date" | "earliest-due-date" | "edd" => Ok(ScheduleStrategy::EarliestDueDate),
            "shortest_processing_time" | "shortest-processing-time" | "spt" => {
                Ok(ScheduleStrategy::ShortestProcessingTime)
            }
            "priority_first" | "priority-first" => Ok(ScheduleStrategy::PriorityFirst),
            "balanced" => Ok(ScheduleStrategy::Balanced),
            other => Err(format!("未知策略类型: {}", other)),
        }
    }
}

// ==========================================
// 优化运行状态 (Run Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Completed, // 达到最大代数
    Converged, // 停滞提前终止
    Cancelled, // 外部取消
    TimedOut,  // 超出时间预算
}

impl RunStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "COMPLETED",
            RunStatus::Converged => "CONVERGED",
            RunStatus::Cancelled => "CANCELLED",
            RunStatus::TimedOut => "TIMED_OUT",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "COMPLETED" => Some(RunStatus::Completed),
            "CONVERGED" => Some(RunStatus::Converged),
            "CANCELLED" => Some(RunStatus::Cancelled),
            "TIMED_OUT" => Some(RunStatus::TimedOut),
            _ => None,
        }
    }

    /// 是否被提前打断 (取消或超时)
    pub fn is_interrupted(&self) -> bool {
        matches!(self, RunStatus::Cancelled | RunStatus::TimedOut)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}
