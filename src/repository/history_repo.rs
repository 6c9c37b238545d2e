// ==========================================
// 生产排程引擎 - 历史完工记录仓储
// ==========================================
// 用途: 为工时估算提供历史速率样本
// ==========================================

use crate::domain::history::CompletionRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{format_ts, parse_ts};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

const HISTORY_COLUMNS: &str =
    "record_id, plan_id, product_code, resource_id, quantity, duration_minutes, completed_at";

struct HistoryRow {
    record_id: String,
    plan_id: Option<String>,
    product_code: String,
    resource_id: String,
    quantity: f64,
    duration_minutes: i64,
    completed_at: String,
}

impl HistoryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            record_id: row.get(0)?,
            plan_id: row.get(1)?,
            product_code: row.get(2)?,
            resource_id: row.get(3)?,
            quantity: row.get(4)?,
            duration_minutes: row.get(5)?,
            completed_at: row.get(6)?,
        })
    }

    fn into_record(self) -> RepositoryResult<CompletionRecord> {
        Ok(CompletionRecord {
            completed_at: parse_ts("completed_at", &self.completed_at)?,
            record_id: self.record_id,
            plan_id: self.plan_id,
            product_code: self.product_code,
            resource_id: self.resource_id,
            quantity: self.quantity,
            duration_minutes: self.duration_minutes,
        })
    }
}

// ==========================================
// CompletionHistoryRepository - 历史完工仓储
// ==========================================
pub struct CompletionHistoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CompletionHistoryRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, record: &CompletionRecord) -> RepositoryResult<()> {
        self.insert_batch(std::slice::from_ref(record)).map(|_| ())
    }

    /// 批量写入 (单事务)
    pub fn insert_batch(&self, records: &[CompletionRecord]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        for r in records {
            tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO completion_history ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    HISTORY_COLUMNS
                ),
                params![
                    r.record_id,
                    r.plan_id,
                    r.product_code,
                    r.resource_id,
                    r.quantity,
                    r.duration_minutes,
                    format_ts(&r.completed_at),
                ],
            )?;
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(records.len())
    }

    /// 查询某资源的全部完工记录 (按完工时间倒序)
    pub fn list_by_resource(&self, resource_id: &str) -> RepositoryResult<Vec<CompletionRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM completion_history WHERE resource_id = ?1 ORDER BY completed_at DESC, record_id",
            HISTORY_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![resource_id], HistoryRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(HistoryRow::into_record).collect()
    }

    /// 查询全部完工记录
    pub fn list_all(&self) -> RepositoryResult<Vec<CompletionRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM completion_history ORDER BY resource_id, completed_at DESC, record_id",
            HISTORY_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], HistoryRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(HistoryRow::into_record).collect()
    }
}
