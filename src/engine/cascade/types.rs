// ==========================================
// 生产级联排产引擎 - 级联类型定义
// ==========================================
// 依据: 级联排产设计 - 9. 显式的 candidate / placement / context 结构
// ==========================================

use crate::domain::{InsertionPolicy, ProductionSchedule, TimeSlot};
use crate::engine::calendar::ShiftCalendar;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// CascadeConfig - 级联配置
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeConfig {
    pub max_cascade_depth: u32,                // BOM 最大深度: 10
    pub shift_start_hour: u32,                 // 首班开始小时: 6
    pub shift_hours: f64,                      // 班次时长: 8
    pub shifts_per_day: u32,                   // 每日班次数: 3
    pub max_batch_hours_per_shift: Option<f64>, // 单批时长上限 (告警用)
    pub min_batch_minutes: f64,                // 最小批次时长: 0
    pub horizon_days: i64,                     // 快照窗口天数: 60
    pub insertion_policy: InsertionPolicy,     // 插单策略: APPEND
    pub max_conflict_retries: u32,             // 写入冲突重试次数: 3
    pub hybrid_max_candidates: usize,          // 混合分配候选上限: 6
    pub backward_anchor_iterations: u32,       // 反向锚定迭代次数: 8
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            max_cascade_depth: 10,
            shift_start_hour: 6,
            shift_hours: 8.0,
            shifts_per_day: 3,
            max_batch_hours_per_shift: None,
            min_batch_minutes: 0.0,
            horizon_days: 60,
            insertion_policy: InsertionPolicy::Append,
            max_conflict_retries: 3,
            hybrid_max_candidates: 6,
            backward_anchor_iterations: 8,
        }
    }
}

impl CascadeConfig {
    pub fn calendar(&self) -> ShiftCalendar {
        ShiftCalendar::new(self.shift_start_hour, self.shift_hours, self.shifts_per_day)
    }
}

// ==========================================
// CascadeRequest - 级联排产请求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeRequest {
    pub product_id: String,
    pub quantity: i64,
    pub start: NaiveDateTime,
    pub shift_hours: Option<f64>,   // 班次时长提示，超过则告警
    pub staff_count: Option<i32>,   // 显式人数，覆盖排班
    pub deadline: Option<NaiveDateTime>,
    pub production_order_number: Option<String>,
    pub weekly_plan_id: Option<String>,
    pub now: Option<NaiveDateTime>, // 反向排程不早于此刻，缺省为当前时间
}

impl CascadeRequest {
    pub fn new(product_id: impl Into<String>, quantity: i64, start: NaiveDateTime) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            start,
            shift_hours: None,
            staff_count: None,
            deadline: None,
            production_order_number: None,
            weekly_plan_id: None,
            now: None,
        }
    }
}

// ==========================================
// CascadeWarning - 非致命告警
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CascadeWarning {
    /// 所有工作中心组合都无法在交期前完工，已采用最快方案
    DeadlineInfeasible {
        product_id: String,
        operation_id: String,
        deadline: NaiveDateTime,
        projected_completion: NaiveDateTime,
    },
    /// 半成品无法在需求时刻前完工
    BackwardShortfall {
        product_id: String,
        required_by: NaiveDateTime,
        projected_completion: NaiveDateTime,
        bom_path: Vec<String>,
    },
    /// 需求量不足最小批量，输出单个不足批
    UndersizedBatch {
        product_id: String,
        quantity: i64,
        lote_minimo: i64,
    },
    /// 单批时长超过班次时长
    BatchExceedsShift {
        product_id: String,
        operation_id: String,
        work_center_id: String,
        batch_number: i32,
        hours: f64,
        max_hours: f64,
    },
}

impl fmt::Display for CascadeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CascadeWarning::DeadlineInfeasible {
                product_id,
                operation_id,
                deadline,
                projected_completion,
            } => write!(
                f,
                "交期不可行: product={}, operation={}, deadline={}, 预计完工={}",
                product_id, operation_id, deadline, projected_completion
            ),
            CascadeWarning::BackwardShortfall {
                product_id,
                required_by,
                projected_completion,
                bom_path,
            } => write!(
                f,
                "半成品供应不足: product={}, 需求时刻={}, 预计完工={}, BOM路径={}",
                product_id,
                required_by,
                projected_completion,
                bom_path.join(" -> ")
            ),
            CascadeWarning::UndersizedBatch {
                product_id,
                quantity,
                lote_minimo,
            } => write!(
                f,
                "批量不足最小批量: product={}, quantity={}, lote_minimo={}",
                product_id, quantity, lote_minimo
            ),
            CascadeWarning::BatchExceedsShift {
                product_id,
                operation_id,
                work_center_id,
                batch_number,
                hours,
                max_hours,
            } => write!(
                f,
                "单批时长超过班次: product={}, operation={}, work_center={}, batch={}, {:.2}h > {:.2}h",
                product_id, operation_id, work_center_id, batch_number, hours, max_hours
            ),
        }
    }
}

// ==========================================
// ScheduleCandidate - 待放置批次
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleCandidate {
    pub batch_number: i32,
    pub quantity: i64,
    pub ready_at: NaiveDateTime, // 上道工序完工 + 静置
}

// ==========================================
// PlacementResult - 单工序放置结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct BatchAssignment {
    pub batch_number: i32,
    pub quantity: i64,
    pub work_center_id: String,
    pub slot: TimeSlot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacementResult {
    pub operation_id: String,
    pub sequence_order: i32,
    pub assignments: Vec<BatchAssignment>, // 按批次号顺序
    pub completion: NaiveDateTime,
    pub hybrid: bool,
}

impl PlacementResult {
    pub fn earliest_start(&self) -> Option<NaiveDateTime> {
        self.assignments.iter().map(|a| a.slot.start).min()
    }
}

// ==========================================
// CascadePlan - 一次级联运行的结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadePlan {
    pub production_order_number: String,
    pub schedules: Vec<ProductionSchedule>,
    pub warnings: Vec<CascadeWarning>,
}

impl CascadePlan {
    /// 最大级联深度
    pub fn max_level(&self) -> i32 {
        self.schedules
            .iter()
            .map(|s| s.cascade_level)
            .max()
            .unwrap_or(0)
    }

    pub fn rows_at_level(&self, level: i32) -> impl Iterator<Item = &ProductionSchedule> {
        self.schedules.iter().filter(move |s| s.cascade_level == level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = CascadeConfig::default();
        assert_eq!(cfg.max_cascade_depth, 10);
        assert_eq!(cfg.insertion_policy, InsertionPolicy::Append);
        assert_eq!(cfg.calendar(), ShiftCalendar::default());
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let w = CascadeWarning::UndersizedBatch {
            product_id: "P".to_string(),
            quantity: 40,
            lote_minimo: 100,
        };
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["kind"], "UNDERSIZED_BATCH");
        assert!(w.to_string().contains("lote_minimo=100"));
    }
}
