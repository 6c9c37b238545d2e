use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::format_ts;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

pub(super) const ACTION_LOG_COLUMNS: &str = r#"
    action_id, action_type, action_ts, actor,
    plan_ids_json, resource_ids_json, reason, payload_json
"#;

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 创建新的操作日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入操作日志
    ///
    /// # 返回
    /// - `Ok(action_id)`: 成功插入,返回action_id
    /// - `Err(...)`: 数据库错误
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::insert_with(&conn, log)?;
        Ok(log.action_id.clone())
    }

    /// 批量插入操作日志
    pub fn batch_insert(&self, logs: Vec<ActionLog>) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for log in &logs {
            Self::insert_with(&tx, log)?;
            count += 1;
        }

        tx.commit()?;
        Ok(count)
    }

    fn insert_with(conn: &Connection, log: &ActionLog) -> RepositoryResult<()> {
        conn.execute(
            &format!(
                "INSERT INTO action_log ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                ACTION_LOG_COLUMNS
            ),
            params![
                log.action_id,
                log.action_type,
                format_ts(&log.action_ts),
                log.actor,
                serde_json::to_string(&log.plan_ids)?,
                serde_json::to_string(&log.resource_ids)?,
                log.reason,
                log.payload_json.as_ref().map(|v| v.to_string()),
            ],
        )?;
        Ok(())
    }
}
