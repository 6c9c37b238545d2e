// ==========================================
// 生产排程引擎 - 历史完工记录
// ==========================================
// 用途: 启发式工时估算的历史速率来源
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub record_id: String,           // 记录ID
    pub plan_id: Option<String>,     // 来源计划 (外部导入可为空)
    pub product_code: String,        // 产品编码
    pub resource_id: String,         // 资源ID
    pub quantity: f64,               // 完工数量
    pub duration_minutes: i64,       // 实际耗时 (分钟)
    pub completed_at: NaiveDateTime, // 完工时间
}

impl CompletionRecord {
    /// 实际产出速率 (单位/小时),无效记录返回 None
    pub fn rate_per_hour(&self) -> Option<f64> {
        if self.duration_minutes <= 0 || self.quantity <= 0.0 || !self.quantity.is_finite() {
            return None;
        }
        Some(self.quantity / (self.duration_minutes as f64 / 60.0))
    }
}
