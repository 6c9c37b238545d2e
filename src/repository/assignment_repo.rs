// ==========================================
// 生产排程引擎 - 排程分配数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: (resource_id, window) 不重叠由资源时间线保证,库层不做约束
// ==========================================

use crate::domain::plan::ProductionPlan;
use crate::domain::schedule::{Assignment, TimeWindow};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::plan_repo::PlanRepository;
use crate::repository::row_codec::{format_ts, parse_ts};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

const ASSIGNMENT_COLUMNS: &str =
    "assignment_id, plan_id, resource_id, window_start, window_end, shared, created_at";

struct AssignmentRow {
    assignment_id: String,
    plan_id: String,
    resource_id: String,
    window_start: String,
    window_end: String,
    shared: bool,
    created_at: String,
}

impl AssignmentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            assignment_id: row.get(0)?,
            plan_id: row.get(1)?,
            resource_id: row.get(2)?,
            window_start: row.get(3)?,
            window_end: row.get(4)?,
            shared: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_assignment(self) -> RepositoryResult<Assignment> {
        let start = parse_ts("window_start", &self.window_start)?;
        let end = parse_ts("window_end", &self.window_end)?;
        let window = TimeWindow::new(start, end).map_err(|e| RepositoryError::FieldValueError {
            field: "window".to_string(),
            message: e.to_string(),
        })?;
        Ok(Assignment {
            assignment_id: self.assignment_id,
            plan_id: self.plan_id,
            resource_id: self.resource_id,
            window,
            shared: self.shared,
            created_at: parse_ts("created_at", &self.created_at)?,
        })
    }
}

/// 一次提交的批量变更
#[derive(Debug, Default)]
pub struct AssignmentBatch<'a> {
    /// 需删除的分配ID
    pub removed: &'a [String],
    /// 需新增的分配
    pub added: &'a [Assignment],
    /// 需同步更新的计划
    pub plans: &'a [ProductionPlan],
}

// ==========================================
// AssignmentRepository - 分配仓储
// ==========================================
pub struct AssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AssignmentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询全部已提交分配 (按资源、开始时间排序)
    pub fn list_all(&self) -> RepositoryResult<Vec<Assignment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM assignments ORDER BY resource_id, window_start, assignment_id",
            ASSIGNMENT_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], AssignmentRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(AssignmentRow::into_assignment).collect()
    }

    /// 按计划查询当前分配 (正常情况下至多一条)
    pub fn list_by_plan(&self, plan_id: &str) -> RepositoryResult<Vec<Assignment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM assignments WHERE plan_id = ?1 ORDER BY window_start, assignment_id",
            ASSIGNMENT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![plan_id], AssignmentRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(AssignmentRow::into_assignment).collect()
    }

    /// 事务内批量提交: 删除旧分配 + 写入新分配 + 更新计划
    ///
    /// 任一步失败整体回滚
    pub fn commit_batch(&self, batch: AssignmentBatch<'_>) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        for assignment_id in batch.removed {
            tx.execute(
                "DELETE FROM assignments WHERE assignment_id = ?1",
                params![assignment_id],
            )?;
        }

        for a in batch.added {
            tx.execute(
                &format!(
                    "INSERT INTO assignments ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    ASSIGNMENT_COLUMNS
                ),
                params![
                    a.assignment_id,
                    a.plan_id,
                    a.resource_id,
                    format_ts(&a.window.start()),
                    format_ts(&a.window.end()),
                    a.shared,
                    format_ts(&a.created_at),
                ],
            )?;
        }

        for plan in batch.plans {
            let rows = PlanRepository::update_with(&tx, plan)?;
            if rows == 0 {
                return Err(RepositoryError::NotFound {
                    entity: "ProductionPlan".to_string(),
                    id: plan.plan_id.clone(),
                });
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }
}
