// ==========================================
// 生产排程引擎 - 生产计划数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化
// ==========================================

use crate::domain::plan::ProductionPlan;
use crate::domain::types::{PlanStatus, Priority};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{format_ts, invalid_enum, parse_ts, parse_window};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const PLAN_COLUMNS: &str = r#"
    plan_id, product_code, target_quantity, completed_quantity,
    earliest_start, due_date, priority, status,
    assigned_resource_id, window_start, window_end,
    created_at, updated_at
"#;

/// plans 表原始行 (列值先按文本读出,再在闭包外转换,便于返回字段级错误)
struct PlanRow {
    plan_id: String,
    product_code: String,
    target_quantity: f64,
    completed_quantity: f64,
    earliest_start: String,
    due_date: String,
    priority: String,
    status: String,
    assigned_resource_id: Option<String>,
    window_start: Option<String>,
    window_end: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PlanRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            plan_id: row.get(0)?,
            product_code: row.get(1)?,
            target_quantity: row.get(2)?,
            completed_quantity: row.get(3)?,
            earliest_start: row.get(4)?,
            due_date: row.get(5)?,
            priority: row.get(6)?,
            status: row.get(7)?,
            assigned_resource_id: row.get(8)?,
            window_start: row.get(9)?,
            window_end: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_plan(self) -> RepositoryResult<ProductionPlan> {
        let priority = Priority::from_db_str(&self.priority)
            .ok_or_else(|| invalid_enum("priority", &self.priority))?;
        let status = PlanStatus::from_db_str(&self.status)
            .ok_or_else(|| invalid_enum("status", &self.status))?;

        Ok(ProductionPlan {
            earliest_start: parse_ts("earliest_start", &self.earliest_start)?,
            due_date: parse_ts("due_date", &self.due_date)?,
            assigned_window: parse_window(self.window_start.as_deref(), self.window_end.as_deref())?,
            created_at: parse_ts("created_at", &self.created_at)?,
            updated_at: parse_ts("updated_at", &self.updated_at)?,
            plan_id: self.plan_id,
            product_code: self.product_code,
            target_quantity: self.target_quantity,
            completed_quantity: self.completed_quantity,
            priority,
            status,
            assigned_resource_id: self.assigned_resource_id,
        })
    }
}

// ==========================================
// PlanRepository - 生产计划仓储
// ==========================================
pub struct PlanRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PlanRepository {
    /// 创建新的PlanRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增计划
    pub fn insert(&self, plan: &ProductionPlan) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            &format!("INSERT INTO plans ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)", PLAN_COLUMNS),
            params![
                plan.plan_id,
                plan.product_code,
                plan.target_quantity,
                plan.completed_quantity,
                format_ts(&plan.earliest_start),
                format_ts(&plan.due_date),
                plan.priority.to_db_str(),
                plan.status.to_db_str(),
                plan.assigned_resource_id,
                plan.assigned_window.map(|w| format_ts(&w.start())),
                plan.assigned_window.map(|w| format_ts(&w.end())),
                format_ts(&plan.created_at),
                format_ts(&plan.updated_at),
            ],
        )?;
        Ok(plan.plan_id.clone())
    }

    /// 按ID查询
    pub fn find_by_id(&self, plan_id: &str) -> RepositoryResult<Option<ProductionPlan>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM plans WHERE plan_id = ?1", PLAN_COLUMNS),
                params![plan_id],
                PlanRow::from_row,
            )
            .optional()?;
        row.map(PlanRow::into_plan).transpose()
    }

    /// 按ID列表查询 (保持入参顺序,缺失的ID被跳过)
    pub fn find_by_ids(&self, plan_ids: &[String]) -> RepositoryResult<Vec<ProductionPlan>> {
        let mut plans = Vec::with_capacity(plan_ids.len());
        for id in plan_ids {
            if let Some(plan) = self.find_by_id(id)? {
                plans.push(plan);
            }
        }
        Ok(plans)
    }

    /// 按状态查询
    pub fn list_by_status(&self, status: PlanStatus) -> RepositoryResult<Vec<ProductionPlan>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM plans WHERE status = ?1 ORDER BY plan_id",
            PLAN_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![status.to_db_str()], PlanRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(PlanRow::into_plan).collect()
    }

    /// 查询全部计划
    pub fn list_all(&self) -> RepositoryResult<Vec<ProductionPlan>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM plans ORDER BY plan_id", PLAN_COLUMNS))?;
        let rows = stmt
            .query_map([], PlanRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(PlanRow::into_plan).collect()
    }

    /// 更新计划 (整行覆盖)
    pub fn update(&self, plan: &ProductionPlan) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = Self::update_with(&conn, plan)?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ProductionPlan".to_string(),
                id: plan.plan_id.clone(),
            });
        }
        Ok(())
    }

    /// 在给定连接/事务上更新计划 (供批量提交复用)
    pub(crate) fn update_with(conn: &Connection, plan: &ProductionPlan) -> RepositoryResult<usize> {
        let rows = conn.execute(
            r#"
            UPDATE plans SET
                product_code = ?2,
                target_quantity = ?3,
                completed_quantity = ?4,
                earliest_start = ?5,
                due_date = ?6,
                priority = ?7,
                status = ?8,
                assigned_resource_id = ?9,
                window_start = ?10,
                window_end = ?11,
                updated_at = ?12
            WHERE plan_id = ?1
            "#,
            params![
                plan.plan_id,
                plan.product_code,
                plan.target_quantity,
                plan.completed_quantity,
                format_ts(&plan.earliest_start),
                format_ts(&plan.due_date),
                plan.priority.to_db_str(),
                plan.status.to_db_str(),
                plan.assigned_resource_id,
                plan.assigned_window.map(|w| format_ts(&w.start())),
                plan.assigned_window.map(|w| format_ts(&w.end())),
                format_ts(&plan.updated_at),
            ],
        )?;
        Ok(rows)
    }
}
