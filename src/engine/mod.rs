// ==========================================
// 生产排程引擎 - 引擎层
// ==========================================
// 职责: 时间线、冲突检测、工时估算、遗传优化、编排提交
// 红线: Engine 不拼 SQL,持久化一律经由 Repository
// 红线: 优化与冲突检测只读快照,不触碰已提交状态
// ==========================================

pub mod committed;
pub mod conflict_detector;
pub mod error;
pub mod events;
pub mod optimizer;
pub mod orchestrator;
pub mod predictor;
pub mod projection;
pub mod repositories;
pub mod strategy;
pub mod timeline;

// 重导出核心类型
pub use committed::{CommittedSchedule, LockedTimelines, PlanGuards};
pub use conflict_detector::{severity_counts, ConflictDetector};
pub use error::{SchedulingError, SchedulingResult};
pub use events::{
    NoOpEventPublisher, OptionalEventPublisher, ScheduleEvent, ScheduleEventPublisher,
    ScheduleEventType,
};
pub use optimizer::{
    CancelFlag, FitnessEvaluator, OptimizationOutcome, Optimizer, ProgressObserver, SearchControl,
    SearchSpace,
};
pub use orchestrator::{
    AutoScheduleRequest, ManualScheduleOutcome, ManualScheduleRequest, ManualTarget,
    NewPlanRequest, RescheduleRequest, ScheduleOrchestrator, ScheduleOutcome, ScheduleScope,
};
pub use predictor::{
    DurationEstimate, DurationEstimator, DurationPredictor, EstimateSource, HistoricalRates,
    Prediction,
};
pub use projection::{project, GanttRow};
pub use repositories::ScheduleRepositories;
pub use strategy::{SeedingOrder, StrategyProfile};
pub use timeline::ResourceTimeline;
