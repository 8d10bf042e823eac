// ==========================================
// 生产级联排产引擎 - 领域模型层
// ==========================================
// 依据: 级联排产设计 - 3. 数据模型
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod reference;
pub mod schedule;
pub mod types;

// 重导出核心类型
pub use reference::{
    BlackoutWindow, BomLine, Operation, Product, ProductivityRecord, RouteStep, StaffingRecord,
    WorkCenter,
};
pub use schedule::{ProductionSchedule, TimeSlot, WeeklyPlan};
pub use types::{CapacityMode, CascadeType, InsertionPolicy, ProductKind, ScheduleStatus};
