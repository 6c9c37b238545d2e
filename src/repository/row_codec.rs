// ==========================================
// 生产排程引擎 - 行数据编解码工具
// ==========================================
// 职责: 时间戳/枚举/JSON 列与领域类型之间的转换
// ==========================================

use chrono::NaiveDateTime;

use crate::db::TS_FORMAT;
use crate::domain::schedule::TimeWindow;
use crate::repository::error::{RepositoryError, RepositoryResult};

pub fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub fn parse_ts(field: &str, raw: &str) -> RepositoryResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT).map_err(|e| RepositoryError::FieldValueError {
        field: field.to_string(),
        message: format!("{} ({})", e, raw),
    })
}

/// 两列时间 → 时间窗,任一为空返回 None
pub fn parse_window(
    start: Option<&str>,
    end: Option<&str>,
) -> RepositoryResult<Option<TimeWindow>> {
    match (start, end) {
        (Some(s), Some(e)) => {
            let start = parse_ts("window_start", s)?;
            let end = parse_ts("window_end", e)?;
            TimeWindow::new(start, end)
                .map(Some)
                .map_err(|err| RepositoryError::FieldValueError {
                    field: "window".to_string(),
                    message: err.to_string(),
                })
        }
        _ => Ok(None),
    }
}

/// 枚举列解析失败时的统一错误
pub fn invalid_enum(field: &str, raw: &str) -> RepositoryError {
    RepositoryError::FieldValueError {
        field: field.to_string(),
        message: format!("未知取值: {}", raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_ts_round_trip() {
        let ts = NaiveDate::from_ymd_opt(2026, 1, 20)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(parse_ts("t", &format_ts(&ts)).unwrap(), ts);
        assert!(parse_ts("t", "20260120").is_err());
    }

    #[test]
    fn test_parse_window_partial_is_none() {
        assert!(parse_window(Some("2026-01-20 08:00:00"), None).unwrap().is_none());
        assert!(parse_window(Some("2026-01-20 08:00:00"), Some("2026-01-20 07:00:00")).is_err());
    }
}
