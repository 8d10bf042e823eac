// ==========================================
// 生产级联排产引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 单产品需求 → 多资源级联排程（正向成品 + 反向半成品）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 排产规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建库）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CapacityMode, CascadeType, InsertionPolicy, ProductKind, ScheduleStatus};

// 领域实体
pub use domain::{
    BlackoutWindow, BomLine, Operation, Product, ProductionSchedule, ProductivityRecord,
    RouteStep, StaffingRecord, WeeklyPlan, WorkCenter,
};

// 引擎
pub use engine::{CascadeConfig, CascadeEngine, CascadePlan, CascadeRequest, CascadeWarning};

// API
pub use api::{CascadeApi, ScheduleProductionRequest, ScheduleProductionResponse};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "生产级联排产引擎";
