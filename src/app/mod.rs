// ==========================================
// 生产排程引擎 - 应用层
// ==========================================
// 职责: 组装各层,连接入口程序与后端
// ==========================================

pub mod requests;
pub mod state;

// 重导出
pub use requests::{dispatch, handle_line, Request, RequestEnvelope, Response};
pub use state::{get_default_db_path, AppOptions, AppState};
