// ==========================================
// 生产排程引擎 - 资源数据仓储
// ==========================================
// 说明: 资源由外部系统维护,排程器只读;upsert 仅用于初始化/同步
// ==========================================

use crate::domain::resource::Resource;
use crate::domain::types::ResourceKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::invalid_enum;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const RESOURCE_COLUMNS: &str = r#"
    resource_id, resource_name, kind, capacity_unit,
    daily_capacity_minutes, nominal_rate_per_hour, supported_products, active
"#;

struct ResourceRow {
    resource_id: String,
    resource_name: String,
    kind: String,
    capacity_unit: String,
    daily_capacity_minutes: i64,
    nominal_rate_per_hour: f64,
    supported_products: String,
    active: bool,
}

impl ResourceRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            resource_id: row.get(0)?,
            resource_name: row.get(1)?,
            kind: row.get(2)?,
            capacity_unit: row.get(3)?,
            daily_capacity_minutes: row.get(4)?,
            nominal_rate_per_hour: row.get(5)?,
            supported_products: row.get(6)?,
            active: row.get(7)?,
        })
    }

    fn into_resource(self) -> RepositoryResult<Resource> {
        let kind = ResourceKind::from_db_str(&self.kind).ok_or_else(|| invalid_enum("kind", &self.kind))?;
        let supported_products: Vec<String> = serde_json::from_str(&self.supported_products)?;
        Ok(Resource {
            resource_id: self.resource_id,
            resource_name: self.resource_name,
            kind,
            capacity_unit: self.capacity_unit,
            daily_capacity_minutes: self.daily_capacity_minutes,
            nominal_rate_per_hour: self.nominal_rate_per_hour,
            supported_products,
            active: self.active,
        })
    }
}

// ==========================================
// ResourceRepository - 资源仓储
// ==========================================
pub struct ResourceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ResourceRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增或覆盖资源
    pub fn upsert(&self, resource: &Resource) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            &format!(
                r#"INSERT INTO resources ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(resource_id) DO UPDATE SET
                    resource_name = excluded.resource_name,
                    kind = excluded.kind,
                    capacity_unit = excluded.capacity_unit,
                    daily_capacity_minutes = excluded.daily_capacity_minutes,
                    nominal_rate_per_hour = excluded.nominal_rate_per_hour,
                    supported_products = excluded.supported_products,
                    active = excluded.active"#,
                RESOURCE_COLUMNS
            ),
            params![
                resource.resource_id,
                resource.resource_name,
                resource.kind.to_db_str(),
                resource.capacity_unit,
                resource.daily_capacity_minutes,
                resource.nominal_rate_per_hour,
                serde_json::to_string(&resource.supported_products)?,
                resource.active,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, resource_id: &str) -> RepositoryResult<Option<Resource>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM resources WHERE resource_id = ?1", RESOURCE_COLUMNS),
                params![resource_id],
                ResourceRow::from_row,
            )
            .optional()?;
        row.map(ResourceRow::into_resource).transpose()
    }

    /// 查询启用中的资源 (按ID排序)
    pub fn list_active(&self) -> RepositoryResult<Vec<Resource>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM resources WHERE active = 1 ORDER BY resource_id",
            RESOURCE_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], ResourceRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ResourceRow::into_resource).collect()
    }

    /// 查询全部资源 (按ID排序)
    pub fn list_all(&self) -> RepositoryResult<Vec<Resource>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM resources ORDER BY resource_id",
            RESOURCE_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], ResourceRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ResourceRow::into_resource).collect()
    }
}
