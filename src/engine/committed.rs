// ==========================================
// 生产排程引擎 - 已提交排程状态
// ==========================================
// 结构: resource_id → Arc<Mutex<ResourceTimeline>>
//       plan_id → Arc<Mutex<()>> (计划行的写锁)
// 加锁: 先计划后资源,各自按ID升序逐个获取,单个锁等待有上限
// 重试: 整轮失败后释放已持有的锁,退避后重来,超过次数报 Concurrency
// ==========================================

use crate::config::OrchestratorConfig;
use crate::domain::schedule::Assignment;
use crate::engine::error::{SchedulingError, SchedulingResult};
use crate::engine::timeline::ResourceTimeline;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, warn};

type SharedTimeline = Arc<Mutex<ResourceTimeline>>;
type PlanLock = Arc<Mutex<()>>;

// ==========================================
// CommittedSchedule - 全部资源的已提交时间线
// ==========================================
pub struct CommittedSchedule {
    timelines: RwLock<BTreeMap<String, SharedTimeline>>,
    plan_locks: RwLock<BTreeMap<String, PlanLock>>,
    config: OrchestratorConfig,
}

impl CommittedSchedule {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            timelines: RwLock::new(BTreeMap::new()),
            plan_locks: RwLock::new(BTreeMap::new()),
            config,
        }
    }

    /// 由持久化分配重建
    pub fn from_assignments(
        assignments: &[Assignment],
        config: OrchestratorConfig,
    ) -> SchedulingResult<Self> {
        let mut grouped: BTreeMap<&str, Vec<&Assignment>> = BTreeMap::new();
        for a in assignments {
            grouped.entry(a.resource_id.as_str()).or_default().push(a);
        }

        let mut timelines = BTreeMap::new();
        for (resource_id, list) in grouped {
            let timeline = ResourceTimeline::from_assignments(resource_id, list).map_err(|c| {
                SchedulingError::Internal(format!("已提交分配存在重叠: {}", c.description))
            })?;
            timelines.insert(resource_id.to_string(), Arc::new(Mutex::new(timeline)));
        }

        Ok(Self {
            timelines: RwLock::new(timelines),
            plan_locks: RwLock::new(BTreeMap::new()),
            config,
        })
    }

    /// 全部时间线的副本 (优化基线/只读分析)
    pub async fn snapshot(&self) -> BTreeMap<String, ResourceTimeline> {
        let shared: Vec<(String, SharedTimeline)> = self
            .timelines
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut out = BTreeMap::new();
        for (resource_id, timeline) in shared {
            out.insert(resource_id, timeline.lock().await.clone());
        }
        out
    }

    /// 全部已提交分配 (按资源、开始时间排序)
    pub async fn assignments(&self) -> Vec<Assignment> {
        self.snapshot()
            .await
            .values()
            .flat_map(|tl| tl.assignments().into_iter().cloned())
            .collect()
    }

    async fn shared_timeline(&self, resource_id: &str) -> SharedTimeline {
        if let Some(t) = self.timelines.read().await.get(resource_id) {
            return t.clone();
        }
        self.timelines
            .write()
            .await
            .entry(resource_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ResourceTimeline::new(resource_id))))
            .clone()
    }

    async fn plan_lock(&self, plan_id: &str) -> PlanLock {
        if let Some(l) = self.plan_locks.read().await.get(plan_id) {
            return l.clone();
        }
        self.plan_locks
            .write()
            .await
            .entry(plan_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 按ID升序锁定一组计划
    ///
    /// 持有计划锁期间才能读改写计划行; 需要资源锁时必须在计划锁之后获取
    pub async fn lock_plans(&self, plan_ids: &BTreeSet<String>) -> SchedulingResult<PlanGuards> {
        let mut shared = Vec::with_capacity(plan_ids.len());
        for id in plan_ids {
            shared.push((id.clone(), self.plan_lock(id).await));
        }
        let guards = self
            .acquire_sorted(&shared)
            .await
            .map_err(|(id, attempts)| SchedulingError::Concurrency {
                resource_id: format!("plan:{}", id),
                attempts,
            })?;
        debug!(plans = ?plan_ids, "计划锁获取成功");
        Ok(PlanGuards {
            _guards: guards.into_values().collect(),
        })
    }

    /// 按ID升序锁定一组资源
    pub async fn lock(&self, resource_ids: &BTreeSet<String>) -> SchedulingResult<LockedTimelines> {
        let mut shared = Vec::with_capacity(resource_ids.len());
        for id in resource_ids {
            shared.push((id.clone(), self.shared_timeline(id).await));
        }
        let guards = self
            .acquire_sorted(&shared)
            .await
            .map_err(|(resource_id, attempts)| SchedulingError::Concurrency {
                resource_id,
                attempts,
            })?;
        debug!(resources = ?resource_ids, "资源锁获取成功");
        Ok(LockedTimelines { guards })
    }

    /// 逐个获取已排序的锁; 失败返回 (竞争的键, 尝试次数)
    async fn acquire_sorted<T>(
        &self,
        shared: &[(String, Arc<Mutex<T>>)],
    ) -> Result<BTreeMap<String, OwnedMutexGuard<T>>, (String, u32)> {
        let wait = Duration::from_millis(self.config.lock_wait_ms);
        let attempts = self.config.lock_retry_attempts.max(1);
        let mut contended = String::new();

        for attempt in 1..=attempts {
            let mut guards = BTreeMap::new();
            let mut ok = true;
            for (id, lock) in shared {
                match tokio::time::timeout(wait, lock.clone().lock_owned()).await {
                    Ok(guard) => {
                        guards.insert(id.clone(), guard);
                    }
                    Err(_) => {
                        contended = id.clone();
                        ok = false;
                        break;
                    }
                }
            }
            if ok {
                return Ok(guards);
            }
            drop(guards);
            warn!(key = %contended, attempt, "锁等待超时，退避重试");
            if attempt < attempts {
                tokio::time::sleep(Duration::from_millis(self.config.lock_backoff_ms * attempt as u64))
                    .await;
            }
        }
        Err((contended, attempts))
    }
}

// ==========================================
// PlanGuards - 持有的计划锁,drop 时释放
// ==========================================
pub struct PlanGuards {
    _guards: Vec<OwnedMutexGuard<()>>,
}

// ==========================================
// LockedTimelines - 持锁期间的时间线视图
// ==========================================
pub struct LockedTimelines {
    guards: BTreeMap<String, OwnedMutexGuard<ResourceTimeline>>,
}

impl LockedTimelines {
    /// 已锁定时间线的副本,提交前在副本上演算
    pub fn working_copies(&self) -> BTreeMap<String, ResourceTimeline> {
        self.guards
            .iter()
            .map(|(k, g)| (k.clone(), (**g).clone()))
            .collect()
    }

    /// 用演算后的副本整体替换 (只替换已锁定的资源)
    pub fn replace_all(&mut self, mut updated: BTreeMap<String, ResourceTimeline>) {
        for (id, guard) in self.guards.iter_mut() {
            if let Some(tl) = updated.remove(id) {
                **guard = tl;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schedule::TimeWindow;
    use chrono::NaiveDate;

    fn window(from: i64, to: i64) -> TimeWindow {
        let t0 = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        TimeWindow::new(t0 + chrono::Duration::hours(from), t0 + chrono::Duration::hours(to)).unwrap()
    }

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_rebuild_and_snapshot() {
        let assignments = vec![
            Assignment::new("P1", "R1", window(0, 4)),
            Assignment::new("P2", "R2", window(0, 4)),
            Assignment::new("P3", "R1", window(4, 8)),
        ];
        let state = CommittedSchedule::from_assignments(&assignments, OrchestratorConfig::default()).unwrap();
        let snap = state.snapshot().await;
        assert_eq!(snap.len(), 2);
        assert_eq!(snap["R1"].len(), 2);
        assert_eq!(state.assignments().await.len(), 3);
    }

    #[tokio::test]
    async fn test_rebuild_rejects_overlapping_rows() {
        let assignments = vec![
            Assignment::new("P1", "R1", window(0, 4)),
            Assignment::new("P2", "R1", window(2, 6)),
        ];
        assert!(CommittedSchedule::from_assignments(&assignments, OrchestratorConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_replace_all_publishes_working_copy() {
        let state = CommittedSchedule::new(OrchestratorConfig::default());
        let mut locked = state.lock(&ids(&["R1"])).await.unwrap();
        let mut copies = locked.working_copies();
        copies
            .get_mut("R1")
            .unwrap()
            .insert(Assignment::new("P1", "R1", window(0, 2)))
            .unwrap();
        locked.replace_all(copies);
        drop(locked);

        assert_eq!(state.snapshot().await["R1"].len(), 1);
    }

    #[tokio::test]
    async fn test_contended_lock_reports_concurrency() {
        let config = OrchestratorConfig {
            lock_wait_ms: 20,
            lock_retry_attempts: 2,
            lock_backoff_ms: 1,
        };
        let state = CommittedSchedule::new(config);
        let _held = state.lock(&ids(&["R1"])).await.unwrap();

        match state.lock(&ids(&["R0", "R1"])).await {
            Err(SchedulingError::Concurrency { resource_id, attempts }) => {
                assert_eq!(resource_id, "R1");
                assert_eq!(attempts, 2);
            }
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("contended lock should not be acquired"),
        }
        // 失败后不残留 R0 的锁
        assert!(state.lock(&ids(&["R0"])).await.is_ok());
    }

    #[tokio::test]
    async fn test_plan_lock_serializes_same_plan() {
        let config = OrchestratorConfig {
            lock_wait_ms: 20,
            lock_retry_attempts: 1,
            lock_backoff_ms: 1,
        };
        let state = CommittedSchedule::new(config);
        let held = state.lock_plans(&ids(&["P1"])).await.unwrap();

        match state.lock_plans(&ids(&["P1", "P2"])).await {
            Err(SchedulingError::Concurrency { resource_id, .. }) => {
                assert_eq!(resource_id, "plan:P1");
            }
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("plan P1 is already locked"),
        }
        // 其他计划不受影响
        assert!(state.lock_plans(&ids(&["P2"])).await.is_ok());

        drop(held);
        assert!(state.lock_plans(&ids(&["P1"])).await.is_ok());
    }
}
