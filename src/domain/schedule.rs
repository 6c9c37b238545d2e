// ==========================================
// 生产排程引擎 - 时间窗与排程分配
// ==========================================
// 约定: 时间窗一律为半开区间 [start, end)
// 红线: start < end,所有重叠判断沿用同一约定
// ==========================================

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 非法时间窗
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("非法时间窗: start={start} 必须早于 end={end}")]
pub struct InvalidWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

// ==========================================
// TimeWindow - 半开时间窗
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawWindow", into = "RawWindow")]
pub struct TimeWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

#[derive(Serialize, Deserialize)]
struct RawWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TryFrom<RawWindow> for TimeWindow {
    type Error = InvalidWindow;

    fn try_from(raw: RawWindow) -> Result<Self, Self::Error> {
        TimeWindow::new(raw.start, raw.end)
    }
}

impl From<TimeWindow> for RawWindow {
    fn from(w: TimeWindow) -> Self {
        RawWindow { start: w.start, end: w.end }
    }
}

impl TimeWindow {
    /// 创建时间窗,start >= end 时返回错误
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, InvalidWindow> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(InvalidWindow { start, end })
        }
    }

    /// 按起点+时长创建 (时长必须为正)
    pub fn starting_at(start: NaiveDateTime, duration: Duration) -> Result<Self, InvalidWindow> {
        Self::new(start, start + duration)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    /// 半开区间重叠: a.start < b.end && b.start < a.end
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// 是否完整包含另一时间窗
    pub fn contains(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// 交集 (空交集返回 None)
    pub fn intersection(&self, other: &TimeWindow) -> Option<TimeWindow> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        TimeWindow::new(start, end).ok()
    }

    /// 按自然日切分,返回 (日期, 当日占用分钟)
    pub fn split_by_day(&self) -> Vec<(NaiveDate, i64)> {
        let mut result = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let day = cursor.date();
            let next_midnight = day
                .succ_opt()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or(self.end);
            let segment_end = next_midnight.min(self.end);
            result.push((day, (segment_end - cursor).num_minutes()));
            cursor = segment_end;
        }
        result
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%Y-%m-%d %H:%M")
        )
    }
}

// ==========================================
// Assignment - 排程分配
// ==========================================
// 红线: 同一资源上的已提交分配不得重叠 (shared 标记除外,默认不用)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub assignment_id: String,     // 分配ID
    pub plan_id: String,           // 生产计划ID
    pub resource_id: String,       // 资源ID
    pub window: TimeWindow,        // 时间窗
    #[serde(default)]
    pub shared: bool,              // 允许共享资源
    pub created_at: NaiveDateTime, // 创建时间
}

impl Assignment {
    /// 创建新分配 (生成 UUID)
    pub fn new(plan_id: &str, resource_id: &str, window: TimeWindow) -> Self {
        Self {
            assignment_id: uuid::Uuid::new_v4().to_string(),
            plan_id: plan_id.to_string(),
            resource_id: resource_id.to_string(),
            window,
            shared: false,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}
