// ==========================================
// 生产级联排产引擎 - 级联引擎
// ==========================================
// 依据: 级联排产设计 - 4.4 / 4.5 Cascade Engine
// 红线: BOM 递归深度有界，循环 BOM 为致命错误
// ==========================================
// 职责: 正向放置顶层产品，按 BOM 反向递归排程半成品
// 输入: CascadeRequest + 参考数据 + 已有排程快照
// 输出: CascadePlan (排程行 + 告警)
// ==========================================

mod backward;
mod context;
mod core;
mod forward;
mod types;


pub use self::context::{CascadeContext, RowOrigin, WorkCenterSnapshot};
pub use self::core::{new_production_order_number, CascadeEngine};
pub use self::types::{
    BatchAssignment, CascadeConfig, CascadePlan, CascadeRequest, CascadeWarning,
    PlacementResult, ScheduleCandidate,
};
