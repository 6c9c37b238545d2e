// ==========================================
// 生产排程引擎 - 冲突记录
// ==========================================
// 说明: 冲突是派生数据,按需重算,从不作为事实落库
// ==========================================

use serde::{Deserialize, Serialize};

use crate::domain::types::{ConflictKind, Severity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub severity: Severity,
    pub affected_plans: Vec<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    pub description: String,
}

impl Conflict {
    pub fn new(
        kind: ConflictKind,
        severity: Severity,
        affected_plans: Vec<String>,
        resource_id: Option<String>,
        description: String,
    ) -> Self {
        Self {
            kind,
            severity,
            affected_plans,
            resource_id,
            description,
        }
    }

    /// 阻断提交的冲突 (High)
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::High
    }

    pub fn involves_any(&self, plan_ids: &[String]) -> bool {
        self.affected_plans.iter().any(|p| plan_ids.contains(p))
    }
}
