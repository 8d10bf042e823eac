// ==========================================
// 生产级联排产引擎 - 领域类型定义
// ==========================================
// 依据: 级联排产设计 - 3. 数据模型
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 产品类型 (Product Kind)
// ==========================================
// 红线: 只有自制品 (成品/半成品) 才会触发反向级联
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductKind {
    FinishedGood, // 成品
    SemiFinished, // 半成品 (PP)
    RawMaterial,  // 外购原料
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl ProductKind {
    /// 从数据库字符串解析
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "FINISHED_GOOD" => Some(ProductKind::FinishedGood),
            "SEMI_FINISHED" => Some(ProductKind::SemiFinished),
            "RAW_MATERIAL" => Some(ProductKind::RawMaterial),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ProductKind::FinishedGood => "FINISHED_GOOD",
            ProductKind::SemiFinished => "SEMI_FINISHED",
            ProductKind::RawMaterial => "RAW_MATERIAL",
        }
    }

    /// 是否为自制品（拥有自己的工艺路线与BOM）
    pub fn is_produced(&self) -> bool {
        !matches!(self, ProductKind::RawMaterial)
    }
}

// ==========================================
// 产能模式 (Capacity Mode)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacityMode {
    ByCars,  // 按车/笼计
    ByUnits, // 按件计
}

impl fmt::Display for CapacityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl CapacityMode {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "BY_CARS" => Some(CapacityMode::ByCars),
            "BY_UNITS" => Some(CapacityMode::ByUnits),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            CapacityMode::ByCars => "BY_CARS",
            CapacityMode::ByUnits => "BY_UNITS",
        }
    }
}

// ==========================================
// 级联类型 (Cascade Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CascadeType {
    Forward,    // 正向 (顶层产品)
    BackwardPp, // 反向 (半成品)
}

impl fmt::Display for CascadeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl CascadeType {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "FORWARD" => Some(CascadeType::Forward),
            "BACKWARD_PP" => Some(CascadeType::BackwardPp),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            CascadeType::Forward => "FORWARD",
            CascadeType::BackwardPp => "BACKWARD_PP",
        }
    }
}

// ==========================================
// 排程状态 (Schedule Status)
// ==========================================
// 说明: PARKED / CANCELLED 行不占用工作中心
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Planned,    // 已计划
    InProgress, // 生产中
    Completed,  // 已完成
    Parked,     // 暂存 (移出时间线)
    Cancelled,  // 已取消
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl ScheduleStatus {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PLANNED" => Some(ScheduleStatus::Planned),
            "IN_PROGRESS" => Some(ScheduleStatus::InProgress),
            "COMPLETED" => Some(ScheduleStatus::Completed),
            "PARKED" => Some(ScheduleStatus::Parked),
            "CANCELLED" => Some(ScheduleStatus::Cancelled),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Planned => "PLANNED",
            ScheduleStatus::InProgress => "IN_PROGRESS",
            ScheduleStatus::Completed => "COMPLETED",
            ScheduleStatus::Parked => "PARKED",
            ScheduleStatus::Cancelled => "CANCELLED",
        }
    }

    /// 该状态的排程行是否占用工作中心
    pub fn occupies_resource(&self) -> bool {
        !matches!(self, ScheduleStatus::Parked | ScheduleStatus::Cancelled)
    }
}

// ==========================================
// 插单策略 (Insertion Policy)
// ==========================================
// APPEND: 新批次排在资源已有队列之后
// FILL_GAPS: 新批次可插入已有排程之间的空档
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsertionPolicy {
    Append,
    FillGaps,
}

impl fmt::Display for InsertionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl InsertionPolicy {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "APPEND" => Some(InsertionPolicy::Append),
            "FILL_GAPS" => Some(InsertionPolicy::FillGaps),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            InsertionPolicy::Append => "APPEND",
            InsertionPolicy::FillGaps => "FILL_GAPS",
        }
    }
}
