// ==========================================
// 生产排程引擎 - 操作日志数据仓储
// ==========================================
// 红线: 所有已提交的写入必须记录
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use self::core::ActionLogRepository;
