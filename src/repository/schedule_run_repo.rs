// ==========================================
// 生产排程引擎 - 优化运行记录仓储
// ==========================================
// 用途: 审计/历史回溯,记录写入后只读
// ==========================================

use crate::domain::run::ScheduleRun;
use crate::domain::types::{RunStatus, ScheduleStrategy};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{format_ts, invalid_enum, parse_ts};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const RUN_COLUMNS: &str = r#"
    run_id, plan_ids_json, strategy, custom_strategy_id, seed,
    started_at, finished_at, status, assignments_json,
    best_fitness, breakdown_json, generations, fitness_history_json
"#;

struct RunRow {
    run_id: String,
    plan_ids_json: String,
    strategy: String,
    custom_strategy_id: Option<String>,
    seed: i64,
    started_at: String,
    finished_at: String,
    status: String,
    assignments_json: String,
    best_fitness: f64,
    breakdown_json: String,
    generations: i64,
    fitness_history_json: String,
}

impl RunRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_id: row.get(0)?,
            plan_ids_json: row.get(1)?,
            strategy: row.get(2)?,
            custom_strategy_id: row.get(3)?,
            seed: row.get(4)?,
            started_at: row.get(5)?,
            finished_at: row.get(6)?,
            status: row.get(7)?,
            assignments_json: row.get(8)?,
            best_fitness: row.get(9)?,
            breakdown_json: row.get(10)?,
            generations: row.get(11)?,
            fitness_history_json: row.get(12)?,
        })
    }

    fn into_run(self) -> RepositoryResult<ScheduleRun> {
        let strategy: ScheduleStrategy = self
            .strategy
            .parse()
            .map_err(|_| invalid_enum("strategy", &self.strategy))?;
        let status = RunStatus::from_db_str(&self.status)
            .ok_or_else(|| invalid_enum("status", &self.status))?;

        Ok(ScheduleRun {
            plan_ids: serde_json::from_str(&self.plan_ids_json)?,
            started_at: parse_ts("started_at", &self.started_at)?,
            finished_at: parse_ts("finished_at", &self.finished_at)?,
            assignments: serde_json::from_str(&self.assignments_json)?,
            breakdown: serde_json::from_str(&self.breakdown_json)?,
            fitness_history: serde_json::from_str(&self.fitness_history_json)?,
            run_id: self.run_id,
            strategy,
            custom_strategy_id: self.custom_strategy_id,
            // SQLite 只有有符号整数,种子按位存储
            seed: self.seed as u64,
            status,
            best_fitness: self.best_fitness,
            generations: self.generations.max(0) as usize,
        })
    }
}

// ==========================================
// ScheduleRunRepository - 优化运行仓储
// ==========================================
pub struct ScheduleRunRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScheduleRunRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, run: &ScheduleRun) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            &format!(
                "INSERT INTO schedule_runs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                RUN_COLUMNS
            ),
            params![
                run.run_id,
                serde_json::to_string(&run.plan_ids)?,
                run.strategy.as_str(),
                run.custom_strategy_id,
                run.seed as i64,
                format_ts(&run.started_at),
                format_ts(&run.finished_at),
                run.status.to_db_str(),
                serde_json::to_string(&run.assignments)?,
                run.best_fitness,
                serde_json::to_string(&run.breakdown)?,
                run.generations as i64,
                serde_json::to_string(&run.fitness_history)?,
            ],
        )?;
        Ok(run.run_id.clone())
    }

    pub fn find_by_id(&self, run_id: &str) -> RepositoryResult<Option<ScheduleRun>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM schedule_runs WHERE run_id = ?1", RUN_COLUMNS),
                params![run_id],
                RunRow::from_row,
            )
            .optional()?;
        row.map(RunRow::into_run).transpose()
    }

    /// 最近的运行记录 (按开始时间倒序)
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ScheduleRun>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM schedule_runs ORDER BY started_at DESC, run_id LIMIT ?1",
            RUN_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![limit as i64], RunRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RunRow::into_run).collect()
    }
}
