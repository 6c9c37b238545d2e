// ==========================================
// 生产排程引擎 - 资源领域模型
// ==========================================
// 红线: 资源由外部维护,排程器只引用不创建
// ==========================================

use serde::{Deserialize, Serialize};

use crate::domain::types::ResourceKind;

/// 默认日产能窗口 (分钟): 全天 24 小时
pub const FULL_DAY_MINUTES: i64 = 24 * 60;

// ==========================================
// Resource - 可排程资源 (车间/产线)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub resource_id: String,              // 资源ID
    pub resource_name: String,            // 资源名称
    pub kind: ResourceKind,               // 类型
    pub capacity_unit: String,            // 产能单位 (如 pcs)
    pub daily_capacity_minutes: i64,      // 每日可用分钟 (利用率分母)
    pub nominal_rate_per_hour: f64,       // 额定产出速率 (单位/小时)
    #[serde(default)]
    pub supported_products: Vec<String>,  // 可生产产品 (空表示不限)
    pub active: bool,                     // 是否启用
}

impl Resource {
    /// 检查资源能否生产指定产品
    pub fn supports(&self, product_code: &str) -> bool {
        self.supported_products.is_empty()
            || self.supported_products.iter().any(|p| p == product_code)
    }

    /// 有效日产能窗口 (非正值视为全天)
    pub fn capacity_minutes_per_day(&self) -> i64 {
        if self.daily_capacity_minutes > 0 {
            self.daily_capacity_minutes
        } else {
            FULL_DAY_MINUTES
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_product() {
        let mut r = Resource {
            resource_id: "L1".to_string(),
            resource_name: "一号线".to_string(),
            kind: ResourceKind::Line,
            capacity_unit: "pcs".to_string(),
            daily_capacity_minutes: 0,
            nominal_rate_per_hour: 10.0,
            supported_products: vec![],
            active: true,
        };
        assert!(r.supports("ANY"));
        assert_eq!(r.capacity_minutes_per_day(), FULL_DAY_MINUTES);

        r.supported_products = vec!["GEAR-A".to_string()];
        assert!(r.supports("GEAR-A"));
        assert!(!r.supports("GEAR-B"));
    }
}
