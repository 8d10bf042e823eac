// ==========================================
// 生产级联排产引擎 - 排程领域模型
// ==========================================
// 依据: 级联排产设计 - 3. ProductionSchedule / WeeklyPlan
// 红线: 级联运行只追加排程行，不修改已有行
// ==========================================

use crate::domain::types::{CascadeType, ScheduleStatus};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// TimeSlot - 半开时间区间 [start, end)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeSlot {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// 两区间是否重叠（首尾相接不算重叠）
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        t >= self.start && t < self.end
    }
}

// ==========================================
// ProductionSchedule - 排程行 (一批一行)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionSchedule {
    pub schedule_id: String,
    pub product_id: String,
    pub operation_id: String,
    pub work_center_id: String,
    pub resource_id: String,
    pub start_datetime: NaiveDateTime,
    pub end_datetime: NaiveDateTime,
    pub quantity: i64,
    pub batch_number: i32,
    pub total_batches_in_run: i32,

    // ===== 级联信息 =====
    pub cascade_level: i32,                // 0 = 顶层请求, 1..n = BOM 深度
    pub cascade_type: CascadeType,
    pub cascade_source_id: Option<String>, // 触发本行的消耗方排程行
    pub production_order_number: String,   // 同一次级联运行共享

    pub weekly_plan_id: Option<String>,
    pub status: ScheduleStatus,
    pub created_at: NaiveDateTime,
}

impl ProductionSchedule {
    pub fn slot(&self) -> TimeSlot {
        TimeSlot::new(self.start_datetime, self.end_datetime)
    }

    /// 该行是否阻塞指定产品在同一工作中心的排程
    ///
    /// # 参数
    /// - `product_id`: 待排产品
    /// - `allows_parallel_references`: 工作中心是否允许不同产品并行
    pub fn blocks(&self, product_id: &str, allows_parallel_references: bool) -> bool {
        if !self.status.occupies_resource() {
            return false;
        }
        !allows_parallel_references || self.product_id == product_id
    }
}

// ==========================================
// WeeklyPlan - 周计划 (仅用于归属/报表)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPlan {
    pub weekly_plan_id: String,
    pub week_start: NaiveDate,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}
