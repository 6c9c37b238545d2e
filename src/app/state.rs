// ==========================================
// 生产排程引擎 - 应用状态
// ==========================================
// 职责: 打开数据库、组装仓储/配置/编排器/API
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use rusqlite::Connection;

use crate::api::ScheduleApi;
use crate::config::ConfigManager;
use crate::db::{init_schema, open_in_memory, open_sqlite_connection};
use crate::engine::events::{OptionalEventPublisher, ScheduleEventPublisher};
use crate::engine::orchestrator::ScheduleOrchestrator;
use crate::engine::predictor::DurationPredictor;
use crate::engine::repositories::ScheduleRepositories;

/// 数据库路径环境变量
pub const ENV_DB_PATH: &str = "PRODUCTION_APS_DB";

const DB_FILE_NAME: &str = "production_aps.db";

/// 应用状态
pub struct AppState {
    /// 数据库路径 (内存库为 ":memory:")
    pub db_path: String,

    pub schedule_api: Arc<ScheduleApi>,

    pub orchestrator: Arc<ScheduleOrchestrator>,
}

/// 组装选项
#[derive(Default)]
pub struct AppOptions {
    pub predictor: Option<Arc<dyn DurationPredictor>>,
    pub event_publisher: Option<Arc<dyn ScheduleEventPublisher>>,
}

impl AppState {
    /// 打开 (或创建) 数据库文件并组装应用
    pub fn new(db_path: &str) -> anyhow::Result<Self> {
        Self::with_options(db_path, AppOptions::default())
    }

    pub fn with_options(db_path: &str, options: AppOptions) -> anyhow::Result<Self> {
        tracing::info!(db_path, "初始化AppState");
        let mut conn = open_sqlite_connection(db_path)
            .with_context(|| format!("无法打开数据库: {}", db_path))?;
        init_schema(&conn).context("数据库建表失败")?;
        crate::perf::install_sqlite_tracing(&mut conn);
        Self::assemble(db_path.to_string(), conn, options)
    }

    /// 内存库 (测试/演示)
    pub fn in_memory(options: AppOptions) -> anyhow::Result<Self> {
        let conn = open_in_memory().context("无法创建内存数据库")?;
        Self::assemble(":memory:".to_string(), conn, options)
    }

    fn assemble(db_path: String, conn: Connection, options: AppOptions) -> anyhow::Result<Self> {
        let conn = Arc::new(Mutex::new(conn));
        let repos = ScheduleRepositories::from_connection(conn.clone());
        let config_manager =
            Arc::new(ConfigManager::from_connection(conn).context("无法创建ConfigManager")?);

        let events = match options.event_publisher {
            Some(p) => OptionalEventPublisher::with_publisher(p),
            None => OptionalEventPublisher::none(),
        };
        let orchestrator = Arc::new(
            ScheduleOrchestrator::new(repos, config_manager, options.predictor, events)
                .context("无法初始化排程编排器")?,
        );
        let schedule_api = Arc::new(ScheduleApi::new(orchestrator.clone()));

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            schedule_api,
            orchestrator,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: PRODUCTION_APS_DB 环境变量 > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(ENV_DB_PATH) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let Some(data_dir) = dirs::data_dir() else {
        return PathBuf::from(".").join(DB_FILE_NAME).to_string_lossy().to_string();
    };

    let dir = if cfg!(debug_assertions) {
        data_dir.join("production-aps-dev")
    } else {
        data_dir.join("production-aps")
    };
    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(dir = %dir.display(), error = %e, "数据目录创建失败，回退到当前目录");
        return PathBuf::from(".").join(DB_FILE_NAME).to_string_lossy().to_string();
    }
    dir.join(DB_FILE_NAME).to_string_lossy().to_string()
}
