// ==========================================
// 生产级联排产引擎 - 内存参考数据 / 排程存储
// ==========================================
// 职责: 不依赖数据库即可驱动级联引擎（单元测试、演练计算）
// 说明: 排程存储的冲突判定与 SQLite 实现一致
// ==========================================

use crate::domain::{
    BlackoutWindow, BomLine, Product, ProductionSchedule, ProductivityRecord, RouteStep,
    StaffingRecord, WorkCenter,
};
use crate::engine::provider::{ReferenceDataProvider, ScheduleStore};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

// ==========================================
// InMemoryReferenceData - 内存参考数据
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct InMemoryReferenceData {
    products: HashMap<String, Product>,
    work_centers: HashMap<String, WorkCenter>,
    routes: Vec<RouteStep>,
    bom: Vec<BomLine>,
    productivity: Vec<ProductivityRecord>,
    staffing: Vec<StaffingRecord>,
    blackouts: Vec<BlackoutWindow>,
}

impl InMemoryReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, product: Product) -> Self {
        self.products.insert(product.product_id.clone(), product);
        self
    }

    pub fn with_work_center(mut self, work_center: WorkCenter) -> Self {
        self.work_centers
            .insert(work_center.work_center_id.clone(), work_center);
        self
    }

    pub fn with_route_step(mut self, step: RouteStep) -> Self {
        self.routes.push(step);
        self
    }

    pub fn with_bom_line(mut self, line: BomLine) -> Self {
        self.bom.push(line);
        self
    }

    pub fn with_productivity(mut self, record: ProductivityRecord) -> Self {
        self.productivity.push(record);
        self
    }

    pub fn with_staffing(mut self, record: StaffingRecord) -> Self {
        self.staffing.push(record);
        self
    }

    pub fn with_blackout(mut self, window: BlackoutWindow) -> Self {
        self.blackouts.push(window);
        self
    }
}

impl ReferenceDataProvider for InMemoryReferenceData {
    fn get_product(&self, product_id: &str) -> RepositoryResult<Option<Product>> {
        Ok(self.products.get(product_id).cloned())
    }

    fn get_work_center(&self, work_center_id: &str) -> RepositoryResult<Option<WorkCenter>> {
        Ok(self.work_centers.get(work_center_id).cloned())
    }

    fn get_route(&self, product_id: &str) -> RepositoryResult<Vec<RouteStep>> {
        let mut steps: Vec<RouteStep> = self
            .routes
            .iter()
            .filter(|s| s.product_id == product_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.sequence_order);
        Ok(steps)
    }

    fn get_bom(&self, product_id: &str) -> RepositoryResult<Vec<BomLine>> {
        Ok(self
            .bom
            .iter()
            .filter(|l| l.product_id == product_id)
            .cloned()
            .collect())
    }

    fn get_productivity(
        &self,
        product_id: &str,
        operation_id: &str,
        work_center_id: &str,
    ) -> RepositoryResult<Option<ProductivityRecord>> {
        Ok(self
            .productivity
            .iter()
            .find(|r| {
                r.product_id == product_id
                    && r.operation_id == operation_id
                    && r.work_center_id == work_center_id
            })
            .cloned())
    }

    fn get_productivity_options(
        &self,
        product_id: &str,
        operation_id: &str,
    ) -> RepositoryResult<Vec<ProductivityRecord>> {
        let mut records: Vec<ProductivityRecord> = self
            .productivity
            .iter()
            .filter(|r| r.product_id == product_id && r.operation_id == operation_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.work_center_id.cmp(&b.work_center_id));
        Ok(records)
    }

    fn get_staffing(
        &self,
        work_center_id: &str,
        date: NaiveDate,
        shift_number: i32,
    ) -> RepositoryResult<Option<i32>> {
        Ok(self
            .staffing
            .iter()
            .find(|s| {
                s.work_center_id == work_center_id
                    && s.date == date
                    && s.shift_number == shift_number
            })
            .map(|s| s.staff_count))
    }

    fn get_blackouts(
        &self,
        work_center_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<BlackoutWindow>> {
        Ok(self
            .blackouts
            .iter()
            .filter(|b| b.work_center_id == work_center_id && b.date >= from && b.date <= to)
            .cloned()
            .collect())
    }
}

// ==========================================
// InMemoryScheduleStore - 内存排程存储
// ==========================================
#[derive(Debug, Default)]
pub struct InMemoryScheduleStore {
    rows: Mutex<Vec<ProductionSchedule>>,
    parallel_work_centers: HashSet<String>,
    fail_after: Mutex<Option<usize>>, // 写入 N 行后模拟故障
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以已有排程初始化
    pub fn with_rows(rows: Vec<ProductionSchedule>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    /// 标记允许不同产品并行的工作中心
    pub fn with_parallel_work_center(mut self, work_center_id: impl Into<String>) -> Self {
        self.parallel_work_centers.insert(work_center_id.into());
        self
    }

    /// 下一次写入在写入 `rows` 行后失败
    pub fn fail_next_insert_after(&self, rows: usize) -> RepositoryResult<()> {
        let mut guard = self
            .fail_after
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        *guard = Some(rows);
        Ok(())
    }

    pub fn all_rows(&self) -> RepositoryResult<Vec<ProductionSchedule>> {
        let rows = self
            .rows
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Ok(rows.clone())
    }

    fn find_conflict(
        &self,
        existing: &[ProductionSchedule],
        row: &ProductionSchedule,
    ) -> Option<ProductionSchedule> {
        let parallel = self.parallel_work_centers.contains(&row.work_center_id);
        existing
            .iter()
            .find(|e| {
                e.work_center_id == row.work_center_id
                    && e.production_order_number != row.production_order_number
                    && e.slot().overlaps(&row.slot())
                    && e.blocks(&row.product_id, parallel)
            })
            .cloned()
    }
}

impl ScheduleStore for InMemoryScheduleStore {
    fn get_existing_schedule(
        &self,
        work_center_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> RepositoryResult<Vec<ProductionSchedule>> {
        let rows = self
            .rows
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let mut found: Vec<ProductionSchedule> = rows
            .iter()
            .filter(|r| {
                r.work_center_id == work_center_id && r.start_datetime < to && r.end_datetime > from
            })
            .cloned()
            .collect();
        found.sort_by_key(|r| r.start_datetime);
        Ok(found)
    }

    fn insert_schedules(&self, new_rows: &[ProductionSchedule]) -> RepositoryResult<usize> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        for row in new_rows {
            if let Some(existing) = self.find_conflict(&rows, row) {
                return Err(RepositoryError::ScheduleConflict {
                    work_center_id: row.work_center_id.clone(),
                    message: format!(
                        "与已有排程重叠: existing={} [{} - {}]",
                        existing.schedule_id, existing.start_datetime, existing.end_datetime
                    ),
                });
            }
        }

        let fail_after = self
            .fail_after
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?
            .take();

        for (written, row) in new_rows.iter().enumerate() {
            if fail_after == Some(written) {
                return Err(RepositoryError::DatabaseQueryError(format!(
                    "模拟写入故障: 已写入 {} 行",
                    written
                )));
            }
            rows.push(row.clone());
        }
        Ok(new_rows.len())
    }

    fn delete_by_order_number(&self, production_order_number: &str) -> RepositoryResult<usize> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let before = rows.len();
        rows.retain(|r| r.production_order_number != production_order_number);
        Ok(before - rows.len())
    }

    fn find_by_order_number(
        &self,
        production_order_number: &str,
    ) -> RepositoryResult<Vec<ProductionSchedule>> {
        let rows = self
            .rows
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Ok(rows
            .iter()
            .filter(|r| r.production_order_number == production_order_number)
            .cloned()
            .collect())
    }
}
