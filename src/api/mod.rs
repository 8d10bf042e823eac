// ==========================================
// 生产级联排产引擎 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供 CLI 调用
// ==========================================

pub mod cascade_api;
pub mod error;

// 重导出核心类型
pub use cascade_api::{CascadeApi, ScheduleProductionRequest, ScheduleProductionResponse};
pub use error::{ApiError, ApiResult};
