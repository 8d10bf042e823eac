// ==========================================
// 生产级联排产引擎 - 参考数据领域模型
// ==========================================
// 依据: 级联排产设计 - 3. 数据模型
// 红线: 参考数据对引擎只读
// ==========================================

use crate::domain::types::{CapacityMode, ProductKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Product - 产品
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub kind: ProductKind,
    pub lote_minimo: i64,              // 最小批量 (件)
    pub max_batch_size: Option<i64>,   // 单批上限 (件)，为空表示不限
}

// ==========================================
// Operation - 工序
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub operation_id: String,
    pub name: String,
    pub display_order: i32,
}

// ==========================================
// WorkCenter - 工作中心
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkCenter {
    pub work_center_id: String,
    pub code: String,
    pub capacity_mode: CapacityMode,
    pub max_parallel_batches: i32,
    pub is_terminal: bool,                 // 是否为路线终工序
    pub allows_parallel_references: bool,  // 是否允许不同产品并行
    pub location_id: String,               // 物理位置，写入排程行 resource_id
}

// ==========================================
// RouteStep - 工艺路线步骤
// ==========================================
// 约束: 同一产品的 sequence_order 严格递增且唯一
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub product_id: String,
    pub operation_id: String,
    pub work_center_id: String, // 主工作中心
    pub sequence_order: i32,
    pub rest_hours_after: f64,  // 本工序完成后的静置时间 (小时)
}

// ==========================================
// BomLine - 物料清单行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomLine {
    pub product_id: String,
    pub material_id: String,       // 原料或半成品
    pub operation_id: String,      // 消耗该物料的工序
    pub quantity_per_unit: f64,
    pub rest_hours_before_use: f64,
}

impl BomLine {
    /// 按运行总量计算需求量（向上取整到整件）
    pub fn required_quantity(&self, run_quantity: i64) -> i64 {
        (self.quantity_per_unit * run_quantity as f64).ceil() as i64
    }
}

// ==========================================
// ProductivityRecord - 生产效率
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductivityRecord {
    pub product_id: String,
    pub operation_id: String,
    pub work_center_id: String,
    pub units_per_hour: Option<f64>,
    pub fixed_minutes_per_batch: Option<f64>,
    pub uses_fixed_time: bool,
    pub labor_minutes_per_batch: Option<f64>, // 每批人工时间 (下限)
    pub reference_staff: Option<i32>,         // 产能对应的标准人数，为空表示与人数无关
}

// ==========================================
// StaffingRecord - 班次人员
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffingRecord {
    pub work_center_id: String,
    pub date: NaiveDate,
    pub shift_number: i32,
    pub staff_count: i32,
}

// ==========================================
// BlackoutWindow - 停机窗口
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackoutWindow {
    pub work_center_id: String,
    pub date: NaiveDate,
    pub shift_number: i32,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_quantity_rounds_up() {
        let line = BomLine {
            product_id: "P".to_string(),
            material_id: "DOUGH".to_string(),
            operation_id: "MIX".to_string(),
            quantity_per_unit: 0.35,
            rest_hours_before_use: 0.0,
        };
        assert_eq!(line.required_quantity(250), 88); // 87.5 -> 88
        assert_eq!(line.required_quantity(100), 35);
    }
}
