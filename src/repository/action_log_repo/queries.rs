use super::core::{ActionLogRepository, ACTION_LOG_COLUMNS};
use crate::domain::action_log::ActionLog;
use crate::repository::error::RepositoryResult;
use crate::repository::row_codec::{format_ts, parse_ts};
use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Row};

/// action_log 表原始行
struct ActionLogRow {
    action_id: String,
    action_type: String,
    action_ts: String,
    actor: String,
    plan_ids_json: String,
    resource_ids_json: String,
    reason: Option<String>,
    payload_json: Option<String>,
}

impl ActionLogRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            action_id: row.get(0)?,
            action_type: row.get(1)?,
            action_ts: row.get(2)?,
            actor: row.get(3)?,
            plan_ids_json: row.get(4)?,
            resource_ids_json: row.get(5)?,
            reason: row.get(6)?,
            payload_json: row.get(7)?,
        })
    }

    fn into_log(self) -> RepositoryResult<ActionLog> {
        let payload_json = match self.payload_json {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };
        Ok(ActionLog {
            action_ts: parse_ts("action_ts", &self.action_ts)?,
            plan_ids: serde_json::from_str(&self.plan_ids_json)?,
            resource_ids: serde_json::from_str(&self.resource_ids_json)?,
            action_id: self.action_id,
            action_type: self.action_type,
            actor: self.actor,
            reason: self.reason,
            payload_json,
        })
    }
}

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 action_id 查询单个日志
    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM action_log WHERE action_id = ?1", ACTION_LOG_COLUMNS),
                params![action_id],
                ActionLogRow::from_row,
            )
            .optional()?;
        row.map(ActionLogRow::into_log).transpose()
    }

    /// 查询涉及指定计划的日志 (按时间倒序)
    pub fn find_by_plan(&self, plan_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM action_log
               WHERE EXISTS (SELECT 1 FROM json_each(action_log.plan_ids_json) WHERE value = ?1)
               ORDER BY action_ts DESC, action_id"#,
            ACTION_LOG_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![plan_id], ActionLogRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ActionLogRow::into_log).collect()
    }

    /// 查询指定时间范围的操作日志
    pub fn find_by_time_range(
        &self,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM action_log WHERE action_ts BETWEEN ?1 AND ?2 ORDER BY action_ts DESC, action_id",
            ACTION_LOG_COLUMNS
        ))?;
        let rows = stmt
            .query_map(
                params![format_ts(&start_time), format_ts(&end_time)],
                ActionLogRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ActionLogRow::into_log).collect()
    }

    /// 查询最近的操作日志
    pub fn find_recent(&self, limit: usize) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM action_log ORDER BY action_ts DESC, action_id LIMIT ?1",
            ACTION_LOG_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![limit as i64], ActionLogRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ActionLogRow::into_log).collect()
    }

    /// 统计日志条数
    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let n = conn.query_row("SELECT COUNT(*) FROM action_log", [], |row| row.get(0))?;
        Ok(n)
    }
}
