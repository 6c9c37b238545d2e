// ==========================================
// 生产排程引擎 - 导入层
// ==========================================
// 职责: 外部完工记录导入,供工时估算的历史速率使用
// 支持: CSV
// ==========================================

pub mod error;
pub mod history_importer;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use history_importer::{HistoryImportSummary, HistoryImporter, RowRejection};
