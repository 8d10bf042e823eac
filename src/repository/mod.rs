// ==========================================
// 生产级联排产引擎 - 数据仓储层
// ==========================================
// 依据: 级联排产设计 - 6. 外部协作者契约
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod reference_repo;
pub mod row_codec;
pub mod schedule_repo;
pub mod weekly_plan_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use reference_repo::{ReferenceDataBundle, ReferenceDataRepository};
pub use schedule_repo::{ProductionOrderSummary, ProductionScheduleRepository};
pub use weekly_plan_repo::WeeklyPlanRepository;
