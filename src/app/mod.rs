// ==========================================
// 生产级联排产引擎 - 应用层
// ==========================================
// 职责: 装配仓储/配置/API,供 CLI 使用
// ==========================================

pub mod state;

// 重导出
pub use state::AppState;
