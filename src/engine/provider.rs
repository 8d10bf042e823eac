// ==========================================
// 生产级联排产引擎 - 外部协作者接口
// ==========================================
// 职责: 定义引擎读取参考数据、读写排程的 trait，实现依赖倒置
// 说明: Engine 层定义 trait，Repository 层 (SQLite) 与内存实现各自实现
// ==========================================

use crate::domain::{
    BlackoutWindow, BomLine, Product, ProductionSchedule, ProductivityRecord, RouteStep,
    WorkCenter,
};
use crate::repository::error::RepositoryResult;
use chrono::{NaiveDate, NaiveDateTime};

// ==========================================
// 参考数据提供者 (只读)
// ==========================================

/// 参考数据提供者 Trait
///
/// 对应外部契约: GetRoute / GetBOM / GetProductivity / GetStaffing / GetBlackouts
pub trait ReferenceDataProvider {
    /// 查询产品
    fn get_product(&self, product_id: &str) -> RepositoryResult<Option<Product>>;

    /// 查询工作中心
    fn get_work_center(&self, work_center_id: &str) -> RepositoryResult<Option<WorkCenter>>;

    /// 查询工艺路线（按 sequence_order 升序）
    fn get_route(&self, product_id: &str) -> RepositoryResult<Vec<RouteStep>>;

    /// 查询物料清单
    fn get_bom(&self, product_id: &str) -> RepositoryResult<Vec<BomLine>>;

    /// 查询 (产品, 工序, 工作中心) 的生产效率
    fn get_productivity(
        &self,
        product_id: &str,
        operation_id: &str,
        work_center_id: &str,
    ) -> RepositoryResult<Option<ProductivityRecord>>;

    /// 查询能执行 (产品, 工序) 的所有工作中心的生产效率
    fn get_productivity_options(
        &self,
        product_id: &str,
        operation_id: &str,
    ) -> RepositoryResult<Vec<ProductivityRecord>>;

    /// 查询班次人数
    fn get_staffing(
        &self,
        work_center_id: &str,
        date: NaiveDate,
        shift_number: i32,
    ) -> RepositoryResult<Option<i32>>;

    /// 查询日期范围内（含首尾）的停机窗口
    fn get_blackouts(
        &self,
        work_center_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<BlackoutWindow>>;
}

// ==========================================
// 排程存储 (读已有负载 + 追加写入)
// ==========================================

/// 排程存储 Trait
///
/// 对应外部契约: GetExistingSchedule / InsertSchedules / DeleteProductionOrder
pub trait ScheduleStore {
    /// 查询工作中心在时间窗口内（与窗口有交集）的已有排程
    fn get_existing_schedule(
        &self,
        work_center_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> RepositoryResult<Vec<ProductionSchedule>>;

    /// 原子写入一次级联运行的全部排程行
    ///
    /// # 错误
    /// - `RepositoryError::ScheduleConflict`: 快照之后出现了重叠的排程行（可重试）
    fn insert_schedules(&self, rows: &[ProductionSchedule]) -> RepositoryResult<usize>;

    /// 按生产订单号删除（补偿回滚）
    fn delete_by_order_number(&self, production_order_number: &str) -> RepositoryResult<usize>;

    /// 按生产订单号查询
    fn find_by_order_number(
        &self,
        production_order_number: &str,
    ) -> RepositoryResult<Vec<ProductionSchedule>>;
}
