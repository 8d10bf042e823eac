// ==========================================
// 生产级联排产引擎 - 级联运行上下文
// ==========================================
// 职责: 一次运行内的工作中心快照、已生成排程行、告警、BOM 路径
// 红线: 快照每次运行每个工作中心只读取一次，运行内不再重复查询排程表
// ==========================================

use super::types::{CascadePlan, CascadeWarning, PlacementResult};
use crate::domain::{
    CascadeType, ProductionSchedule, ScheduleStatus, TimeSlot, WorkCenter,
};
use crate::engine::calendar::ShiftCalendar;
use crate::engine::error::{CascadeError, CascadeResult};
use crate::engine::provider::{ReferenceDataProvider, ScheduleStore};
use crate::engine::timeline::ResourceTimeline;
use chrono::{Duration, NaiveDateTime};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// 工作中心快照：已有负载 + 停机区间
#[derive(Debug, Clone)]
pub struct WorkCenterSnapshot {
    pub work_center: WorkCenter,
    pub rows: Vec<ProductionSchedule>,
    pub blackouts: Vec<TimeSlot>,
}

impl WorkCenterSnapshot {
    /// 针对某产品的时间线
    pub fn timeline_for(&self, product_id: &str) -> ResourceTimeline {
        ResourceTimeline::from_schedule(
            &self.rows,
            product_id,
            self.work_center.allows_parallel_references,
            self.blackouts.clone(),
        )
    }
}

/// 提交排程行时的级联归属
#[derive(Debug, Clone)]
pub struct RowOrigin {
    pub product_id: String,
    pub cascade_level: i32,
    pub cascade_type: CascadeType,
    pub cascade_source_id: Option<String>,
}

// ==========================================
// CascadeContext - 级联运行上下文
// ==========================================
#[derive(Debug)]
pub struct CascadeContext {
    pub production_order_number: String,
    pub weekly_plan_id: Option<String>,
    pub planning_floor: NaiveDateTime,
    pub staff_override: Option<i32>,
    pub max_shift_hours: Option<f64>,
    pub created_at: NaiveDateTime,
    window: TimeSlot,
    snapshots: HashMap<String, WorkCenterSnapshot>,
    rows: Vec<ProductionSchedule>,
    warnings: Vec<CascadeWarning>,
    bom_path: Vec<String>,
}

impl CascadeContext {
    pub fn new(
        production_order_number: String,
        weekly_plan_id: Option<String>,
        planning_floor: NaiveDateTime,
        request_start: NaiveDateTime,
        horizon_days: i64,
        created_at: NaiveDateTime,
    ) -> Self {
        let from = planning_floor
            .min(request_start)
            .checked_sub_signed(Duration::days(1))
            .unwrap_or(NaiveDateTime::MIN);
        let to = planning_floor
            .max(request_start)
            .checked_add_signed(Duration::days(horizon_days.clamp(1, 3650)))
            .unwrap_or(NaiveDateTime::MAX);
        Self {
            production_order_number,
            weekly_plan_id,
            planning_floor,
            staff_override: None,
            max_shift_hours: None,
            created_at,
            window: TimeSlot::new(from, to),
            snapshots: HashMap::new(),
            rows: Vec::new(),
            warnings: Vec::new(),
            bom_path: Vec::new(),
        }
    }

    pub fn window(&self) -> TimeSlot {
        self.window
    }

    // ==========================================
    // 工作中心快照
    // ==========================================

    /// 取工作中心快照（首次访问时从存储加载）
    pub fn snapshot<R, S>(
        &mut self,
        refs: &R,
        store: &S,
        calendar: &ShiftCalendar,
        work_center_id: &str,
    ) -> CascadeResult<&WorkCenterSnapshot>
    where
        R: ReferenceDataProvider + ?Sized,
        S: ScheduleStore + ?Sized,
    {
        if !self.snapshots.contains_key(work_center_id) {
            let work_center = refs.get_work_center(work_center_id)?.ok_or_else(|| {
                CascadeError::invalid_input(format!("未知工作中心: {}", work_center_id))
            })?;

            let rows = store.get_existing_schedule(
                work_center_id,
                self.window.start,
                self.window.end,
            )?;
            let windows = refs.get_blackouts(
                work_center_id,
                self.window.start.date(),
                self.window.end.date(),
            )?;
            let blackouts = calendar.resolve_blackouts(&windows);

            debug!(
                work_center_id = %work_center_id,
                existing_rows = rows.len(),
                blackouts = blackouts.len(),
                "加载工作中心快照"
            );

            self.snapshots.insert(
                work_center_id.to_string(),
                WorkCenterSnapshot {
                    work_center,
                    rows,
                    blackouts,
                },
            );
        }

        self.snapshots.get(work_center_id).ok_or_else(|| {
            CascadeError::missing_reference(format!("工作中心快照缺失: {}", work_center_id))
        })
    }

    // ==========================================
    // 提交
    // ==========================================

    /// 将一条工艺路线的放置结果转为排程行并计入快照
    ///
    /// # 返回
    /// 每道工序对应的新行，顺序与 `placements` 一致
    pub fn commit(
        &mut self,
        origin: &RowOrigin,
        placements: &[PlacementResult],
    ) -> CascadeResult<Vec<Vec<ProductionSchedule>>> {
        let mut by_step = Vec::with_capacity(placements.len());

        for placement in placements {
            let total = placement.assignments.len() as i32;
            let mut step_rows = Vec::with_capacity(placement.assignments.len());

            for assignment in &placement.assignments {
                let snapshot = self
                    .snapshots
                    .get_mut(&assignment.work_center_id)
                    .ok_or_else(|| {
                        CascadeError::missing_reference(format!(
                            "工作中心快照缺失: {}",
                            assignment.work_center_id
                        ))
                    })?;

                let row = ProductionSchedule {
                    schedule_id: Uuid::new_v4().to_string(),
                    product_id: origin.product_id.clone(),
                    operation_id: placement.operation_id.clone(),
                    work_center_id: assignment.work_center_id.clone(),
                    resource_id: snapshot.work_center.location_id.clone(),
                    start_datetime: assignment.slot.start,
                    end_datetime: assignment.slot.end,
                    quantity: assignment.quantity,
                    batch_number: assignment.batch_number,
                    total_batches_in_run: total,
                    cascade_level: origin.cascade_level,
                    cascade_type: origin.cascade_type,
                    cascade_source_id: origin.cascade_source_id.clone(),
                    production_order_number: self.production_order_number.clone(),
                    weekly_plan_id: self.weekly_plan_id.clone(),
                    status: ScheduleStatus::Planned,
                    created_at: self.created_at,
                };

                snapshot.rows.push(row.clone());
                step_rows.push(row);
            }

            self.rows.extend(step_rows.iter().cloned());
            by_step.push(step_rows);
        }

        Ok(by_step)
    }

    pub fn rows(&self) -> &[ProductionSchedule] {
        &self.rows
    }

    pub fn warn(&mut self, warning: CascadeWarning) {
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[CascadeWarning] {
        &self.warnings
    }

    // ==========================================
    // BOM 路径
    // ==========================================

    pub fn bom_path(&self) -> &[String] {
        &self.bom_path
    }

    pub fn on_path(&self, product_id: &str) -> bool {
        self.bom_path.iter().any(|p| p == product_id)
    }

    pub fn enter(&mut self, product_id: &str) {
        self.bom_path.push(product_id.to_string());
    }

    pub fn leave(&mut self) {
        self.bom_path.pop();
    }

    pub fn into_plan(self) -> CascadePlan {
        CascadePlan {
            production_order_number: self.production_order_number,
            schedules: self.rows,
            warnings: self.warnings,
        }
    }
}
