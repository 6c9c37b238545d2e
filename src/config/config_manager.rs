// ==========================================
// 生产排程引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::scheduler_config::SchedulerConfig;
use crate::config::strategy_profile::CustomStrategyProfile;
use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

const GLOBAL_SCOPE: &str = "global";
const CUSTOM_STRATEGY_PREFIX: &str = "custom_strategy/";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值 (UPSERT)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    /// 读取数值型配置,缺失或格式错误时使用默认值
    fn get_parsed_or<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr + Copy,
    {
        let raw = match self.get_global_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    /// 加载排程配置 (未配置的键沿用默认值)
    pub fn load_scheduler_config(&self) -> RepositoryResult<SchedulerConfig> {
        let d = SchedulerConfig::default();
        let mut cfg = d.clone();

        let o = &mut cfg.optimizer;
        o.population_size = self
            .get_parsed_or(config_keys::POPULATION_SIZE, d.optimizer.population_size)?
            .max(2);
        o.max_generations = self.get_parsed_or(config_keys::MAX_GENERATIONS, d.optimizer.max_generations)?;
        o.stagnation_generations = self.get_parsed_or(
            config_keys::STAGNATION_GENERATIONS,
            d.optimizer.stagnation_generations,
        )?;
        o.tournament_size = self
            .get_parsed_or(config_keys::TOURNAMENT_SIZE, d.optimizer.tournament_size)?
            .max(1);
        o.mutation_rate = self
            .get_parsed_or(config_keys::MUTATION_RATE, d.optimizer.mutation_rate)?
            .clamp(0.0, 1.0);
        o.elite_count = self.get_parsed_or(config_keys::ELITE_COUNT, d.optimizer.elite_count)?;
        o.heuristic_seed_ratio = self
            .get_parsed_or(config_keys::HEURISTIC_SEED_RATIO, d.optimizer.heuristic_seed_ratio)?
            .clamp(0.0, 1.0);
        o.timeout_ms = self.get_parsed_or(config_keys::TIMEOUT_MS, d.optimizer.timeout_ms)?;
        o.time_slot_minutes = self
            .get_parsed_or(config_keys::TIME_SLOT_MINUTES, d.optimizer.time_slot_minutes)?
            .max(1);
        o.seed = match self.get_global_config_value(config_keys::SEED)? {
            Some(raw) if !raw.trim().is_empty() => raw.trim().parse::<u64>().ok(),
            _ => None,
        };

        let w = &mut cfg.weights;
        w.tardiness = self.get_parsed_or(config_keys::W_TARDINESS, d.weights.tardiness)?;
        w.conflict = self.get_parsed_or(config_keys::W_CONFLICT, d.weights.conflict)?;
        w.utilization_variance =
            self.get_parsed_or(config_keys::W_UTILIZATION, d.weights.utilization_variance)?;
        w.earliness = self.get_parsed_or(config_keys::W_EARLINESS, d.weights.earliness)?;
        w.priority_emphasis =
            self.get_parsed_or(config_keys::PRIORITY_EMPHASIS, d.weights.priority_emphasis)?;

        let det = &mut cfg.detector;
        det.deadline_risk_margin_minutes = self.get_parsed_or(
            config_keys::DEADLINE_RISK_MARGIN_MINUTES,
            d.detector.deadline_risk_margin_minutes,
        )?;
        det.overutilization_medium_ratio = self.get_parsed_or(
            config_keys::OVERUTILIZATION_MEDIUM_RATIO,
            d.detector.overutilization_medium_ratio,
        )?;
        det.overutilization_high_ratio = self.get_parsed_or(
            config_keys::OVERUTILIZATION_HIGH_RATIO,
            d.detector.overutilization_high_ratio,
        )?;

        let p = &mut cfg.predictor;
        p.min_confidence = self.get_parsed_or(config_keys::MIN_CONFIDENCE, d.predictor.min_confidence)?;
        p.reliable_confidence =
            self.get_parsed_or(config_keys::RELIABLE_CONFIDENCE, d.predictor.reliable_confidence)?;

        let orch = &mut cfg.orchestrator;
        orch.lock_wait_ms = self.get_parsed_or(config_keys::LOCK_WAIT_MS, d.orchestrator.lock_wait_ms)?;
        orch.lock_retry_attempts = self
            .get_parsed_or(config_keys::LOCK_RETRY_ATTEMPTS, d.orchestrator.lock_retry_attempts)?
            .max(1);

        Ok(cfg)
    }

    /// 读取自定义策略配置（存储于 config_kv: custom_strategy/{strategy_id}）
    pub fn get_custom_strategy_profile(
        &self,
        strategy_id: &str,
    ) -> RepositoryResult<Option<CustomStrategyProfile>> {
        let id = strategy_id.trim();
        if id.is_empty() {
            return Ok(None);
        }

        let key = format!("{}{}", CUSTOM_STRATEGY_PREFIX, id);
        let raw = match self.get_global_config_value(&key)? {
            Some(v) => v,
            None => return Ok(None),
        };

        let profile: CustomStrategyProfile = serde_json::from_str(&raw)?;
        Ok(Some(profile))
    }

    /// 保存自定义策略
    pub fn save_custom_strategy_profile(&self, profile: &CustomStrategyProfile) -> RepositoryResult<()> {
        let id = profile.strategy_id.trim();
        if id.is_empty() {
            return Err(RepositoryError::FieldValueError {
                field: "strategy_id".to_string(),
                message: "不能为空".to_string(),
            });
        }
        let key = format!("{}{}", CUSTOM_STRATEGY_PREFIX, id);
        self.set_global_config_value(&key, &serde_json::to_string(profile)?)
    }

    /// 列出全部自定义策略 (按ID排序)
    pub fn list_custom_strategy_profiles(&self) -> RepositoryResult<Vec<CustomStrategyProfile>> {
        let raws: Vec<String> = {
            let conn = self.get_conn()?;
            let mut stmt = conn.prepare(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key LIKE ?2 ORDER BY key",
            )?;
            let rows = stmt
                .query_map(
                    params![GLOBAL_SCOPE, format!("{}%", CUSTOM_STRATEGY_PREFIX)],
                    |row| row.get::<_, String>(0),
                )?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        raws.iter()
            .map(|raw| serde_json::from_str(raw).map_err(RepositoryError::from))
            .collect()
    }

    /// 获取所有 global 配置的快照（JSON格式）
    ///
    /// 用途: 写入自动排程的操作日志,便于回溯当次参数
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&config_map)?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 注意
    /// - 此方法会覆盖同名的 global 配置
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> RepositoryResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut count = 0;
        for (key, value) in config_map.iter() {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value, updated_at)
                 VALUES (?1, ?2, ?3, datetime('now'))
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
                params![GLOBAL_SCOPE, key, value],
            )?;
        }
        tx.commit()?;
        Ok(count)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 遗传搜索
    pub const POPULATION_SIZE: &str = "optimizer.population_size";
    pub const MAX_GENERATIONS: &str = "optimizer.max_generations";
    pub const STAGNATION_GENERATIONS: &str = "optimizer.stagnation_generations";
    pub const TOURNAMENT_SIZE: &str = "optimizer.tournament_size";
    pub const MUTATION_RATE: &str = "optimizer.mutation_rate";
    pub const ELITE_COUNT: &str = "optimizer.elite_count";
    pub const HEURISTIC_SEED_RATIO: &str = "optimizer.heuristic_seed_ratio";
    pub const TIMEOUT_MS: &str = "optimizer.timeout_ms";
    pub const SEED: &str = "optimizer.seed";
    pub const TIME_SLOT_MINUTES: &str = "optimizer.time_slot_minutes";

    // 适应度权重
    pub const W_TARDINESS: &str = "weights.tardiness";
    pub const W_CONFLICT: &str = "weights.conflict";
    pub const W_UTILIZATION: &str = "weights.utilization_variance";
    pub const W_EARLINESS: &str = "weights.earliness";
    pub const PRIORITY_EMPHASIS: &str = "weights.priority_emphasis";

    // 冲突检测
    pub const DEADLINE_RISK_MARGIN_MINUTES: &str = "detector.deadline_risk_margin_minutes";
    pub const OVERUTILIZATION_MEDIUM_RATIO: &str = "detector.overutilization_medium_ratio";
    pub const OVERUTILIZATION_HIGH_RATIO: &str = "detector.overutilization_high_ratio";

    // 工时估算
    pub const MIN_CONFIDENCE: &str = "predictor.min_confidence";
    pub const RELIABLE_CONFIDENCE: &str = "predictor.reliable_confidence";

    // 提交加锁
    pub const LOCK_WAIT_MS: &str = "orchestrator.lock_wait_ms";
    pub const LOCK_RETRY_ATTEMPTS: &str = "orchestrator.lock_retry_attempts";

    /// 全部可覆写的键
    pub const ALL: &[&str] = &[
        POPULATION_SIZE,
        MAX_GENERATIONS,
        STAGNATION_GENERATIONS,
        TOURNAMENT_SIZE,
        MUTATION_RATE,
        ELITE_COUNT,
        HEURISTIC_SEED_RATIO,
        TIMEOUT_MS,
        SEED,
        TIME_SLOT_MINUTES,
        W_TARDINESS,
        W_CONFLICT,
        W_UTILIZATION,
        W_EARLINESS,
        PRIORITY_EMPHASIS,
        DEADLINE_RISK_MARGIN_MINUTES,
        OVERUTILIZATION_MEDIUM_RATIO,
        OVERUTILIZATION_HIGH_RATIO,
        MIN_CONFIDENCE,
        RELIABLE_CONFIDENCE,
        LOCK_WAIT_MS,
        LOCK_RETRY_ATTEMPTS,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::strategy_profile::CustomStrategyParameters;
    use crate::domain::types::ScheduleStrategy;

    fn manager() -> ConfigManager {
        let conn = crate::db::open_in_memory().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_load_defaults_when_empty() {
        let cfg = manager().load_scheduler_config().unwrap();
        assert_eq!(cfg, SchedulerConfig::default());
    }

    #[test]
    fn test_load_overrides_and_ignores_garbage() {
        let mgr = manager();
        mgr.set_global_config_value(config_keys::POPULATION_SIZE, "12").unwrap();
        mgr.set_global_config_value(config_keys::SEED, "42").unwrap();
        mgr.set_global_config_value(config_keys::MUTATION_RATE, "abc").unwrap();

        let cfg = mgr.load_scheduler_config().unwrap();
        assert_eq!(cfg.optimizer.population_size, 12);
        assert_eq!(cfg.optimizer.seed, Some(42));
        assert_eq!(cfg.optimizer.mutation_rate, 0.05);
    }

    #[test]
    fn test_custom_strategy_round_trip_and_list() {
        let mgr = manager();
        let profile = CustomStrategyProfile {
            strategy_id: "night".to_string(),
            title: "夜班优先".to_string(),
            description: None,
            base_strategy: ScheduleStrategy::Balanced,
            parameters: CustomStrategyParameters {
                earliness_weight: Some(0.5),
                ..Default::default()
            },
        };
        mgr.save_custom_strategy_profile(&profile).unwrap();

        assert_eq!(mgr.get_custom_strategy_profile("night").unwrap(), Some(profile));
        assert!(mgr.get_custom_strategy_profile("  ").unwrap().is_none());
        assert_eq!(mgr.list_custom_strategy_profiles().unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_restore() {
        let mgr = manager();
        mgr.set_global_config_value(config_keys::ELITE_COUNT, "4").unwrap();
        let snapshot = mgr.get_config_snapshot().unwrap();

        mgr.set_global_config_value(config_keys::ELITE_COUNT, "1").unwrap();
        assert_eq!(mgr.restore_config_from_snapshot(&snapshot).unwrap(), 1);
        assert_eq!(
            mgr.get_global_config_value(config_keys::ELITE_COUNT).unwrap().as_deref(),
            Some("4")
        );
    }
}
