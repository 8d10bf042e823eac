// ==========================================
// 生产级联排产引擎 - 引擎层
// ==========================================
// 依据: 级联排产设计 - 2. 组件划分 (自底向上)
// ==========================================
// 职责: 实现排产规则，不拼 SQL
// 红线: Engine 只通过 provider trait 访问参考数据与排程存储
// ==========================================

pub mod batch_sizer;
pub mod calendar;
pub mod cascade;
pub mod distribution;
pub mod duration;
pub mod error;
pub mod memory;
pub mod provider;
pub mod timeline;
pub mod writer;

// 重导出核心引擎
pub use batch_sizer::BatchSizer;
pub use calendar::ShiftCalendar;
pub use cascade::{
    new_production_order_number, CascadeConfig, CascadeEngine, CascadePlan, CascadeRequest,
    CascadeWarning,
};
pub use distribution::HybridDistributor;
pub use duration::DurationEstimator;
pub use error::{CascadeError, CascadeResult};
pub use memory::{InMemoryReferenceData, InMemoryScheduleStore};
pub use provider::{ReferenceDataProvider, ScheduleStore};
pub use timeline::{NewBatch, ResourceTimeline};
pub use writer::ScheduleWriter;
