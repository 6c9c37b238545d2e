// ==========================================
// 生产排程引擎 - 性能统计
// ==========================================
// PerfGuard: API 操作耗时 + 期间执行的 SQL 数 / 慢 SQL 数
// SQL 计数依赖 rusqlite trace/profile 回调,按线程累计
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 开关: SQL 统计
pub const ENV_PERF_SQL: &str = "PRODUCTION_APS_PERF_SQL";
/// 慢 SQL 阈值 (毫秒)
pub const ENV_SLOW_SQL_MS: &str = "PRODUCTION_APS_SLOW_SQL_MS";

static SQL_TRACING: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static ACTIVE_GUARDS: Cell<u32> = const { Cell::new(0) };
    static SQL_COUNT: Cell<u64> = const { Cell::new(0) };
    static SLOW_SQL_COUNT: Cell<u64> = const { Cell::new(0) };
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn shorten_sql(sql: &str, max_chars: usize) -> String {
    let flat = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &flat[..idx]),
        None => flat,
    }
}

/// 为连接安装 SQL trace/profile 回调
///
/// - Debug 构建默认开启,Release 默认关闭
/// - `PRODUCTION_APS_PERF_SQL=1` 强制开启, `=0` 强制关闭
/// - `PRODUCTION_APS_SLOW_SQL_MS` 慢 SQL 阈值 (默认 Debug 50ms / Release 200ms)
pub fn install_sqlite_tracing(conn: &mut Connection) {
    let enabled = env_flag(ENV_PERF_SQL).unwrap_or(cfg!(debug_assertions));
    SQL_TRACING.store(enabled, Ordering::Relaxed);

    if !enabled {
        conn.trace(None);
        conn.profile(None);
        return;
    }

    let slow_ms = std::env::var(ENV_SLOW_SQL_MS)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
    SLOW_SQL_MS.store(slow_ms, Ordering::Relaxed);

    conn.trace(Some(on_sql_trace));
    conn.profile(Some(on_sql_profile));
}

fn guard_active() -> bool {
    ACTIVE_GUARDS.with(|d| d.get() > 0)
}

fn on_sql_trace(_sql: &str) {
    if SQL_TRACING.load(Ordering::Relaxed) && guard_active() {
        SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

fn on_sql_profile(sql: &str, duration: Duration) {
    if !SQL_TRACING.load(Ordering::Relaxed) {
        return;
    }
    let ms = duration.as_millis() as u64;
    let threshold = SLOW_SQL_MS.load(Ordering::Relaxed);
    if threshold == 0 || ms < threshold {
        return;
    }
    tracing::warn!(
        target: "slow_sql",
        duration_ms = ms,
        sql = %shorten_sql(sql, 400),
        "slow sql"
    );
    if guard_active() {
        SLOW_SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

/// 操作级性能统计,Drop 时输出一条 `target: "perf"` 日志
///
/// ```ignore
/// let _perf = production_aps::perf::PerfGuard::new("auto_schedule");
/// ```
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    sql_at_start: u64,
    slow_sql_at_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        ACTIVE_GUARDS.with(|d| d.set(d.get().saturating_add(1)));
        Self {
            op,
            start: Instant::now(),
            sql_at_start: SQL_COUNT.with(|c| c.get()),
            slow_sql_at_start: SLOW_SQL_COUNT.with(|c| c.get()),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        // 异步操作可能在其他线程结束,计数差值用饱和减法
        let sql_count = SQL_COUNT.with(|c| c.get()).saturating_sub(self.sql_at_start);
        let slow_sql_count = SLOW_SQL_COUNT
            .with(|c| c.get())
            .saturating_sub(self.slow_sql_at_start);

        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms = self.start.elapsed().as_millis() as u64,
            sql_count,
            slow_sql_count,
            "done"
        );

        ACTIVE_GUARDS.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorten_sql_flattens_whitespace() {
        assert_eq!(shorten_sql("SELECT *\n   FROM plans", 100), "SELECT * FROM plans");
        assert_eq!(shorten_sql("SELECT 计划 FROM plans", 9), "SELECT 计划…");
    }

    #[test]
    fn test_guard_counts_statements() {
        std::env::set_var(ENV_PERF_SQL, "1");
        let mut conn = crate::db::open_in_memory().unwrap();
        install_sqlite_tracing(&mut conn);

        let guard = PerfGuard::new("test");
        conn.execute_batch("SELECT 1; SELECT 2;").unwrap();
        let counted = SQL_COUNT.with(|c| c.get()) - guard.sql_at_start;
        drop(guard);
        assert!(counted >= 2);
    }
}
