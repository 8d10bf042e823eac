// ==========================================
// 生产级联排产引擎 - 批次工时估算
// ==========================================
// 依据: 级联排产设计 - 4.2 Duration Estimator
// 红线: 缺少生产效率数据是配置缺口，必须报错，不得使用默认值
// ==========================================
// 模式:
// - 速率模式: 时长 = 批量 / (件/小时)，若有标准人数则按人数线性折算
// - 固定模式: 时长 = 每批固定分钟数，与批量无关
// 下限: 每批人工时间、配置的最小批次时长、1 分钟
// 上限: 单批不超过 MAX_BATCH_DAYS 天，超出视为无效输入（需求量或效率数据有误）
// ==========================================

use crate::domain::ProductivityRecord;
use crate::engine::calendar::{hours_to_duration, minutes_to_duration, ShiftCalendar};
use crate::engine::error::{CascadeError, CascadeResult};
use crate::engine::provider::ReferenceDataProvider;
use chrono::{Duration, NaiveDateTime};

/// 单批时长上限（天）
pub const MAX_BATCH_DAYS: i64 = 366;

// ==========================================
// DurationEstimator - 工时估算器
// ==========================================
#[derive(Debug, Clone)]
pub struct DurationEstimator {
    min_batch_minutes: f64,
    calendar: ShiftCalendar,
}

impl DurationEstimator {
    pub fn new(min_batch_minutes: f64, calendar: ShiftCalendar) -> Self {
        Self {
            min_batch_minutes: min_batch_minutes.max(0.0),
            calendar,
        }
    }

    /// 按生产效率记录估算单批时长
    ///
    /// # 参数
    /// - `record`: 生产效率记录
    /// - `batch_size`: 批量
    /// - `staff`: 实际人数（None 表示按标准人数）
    pub fn estimate(
        &self,
        record: &ProductivityRecord,
        batch_size: i64,
        staff: Option<i32>,
    ) -> CascadeResult<Duration> {
        let missing = || CascadeError::MissingProductivityData {
            product_id: record.product_id.clone(),
            operation_id: record.operation_id.clone(),
            work_center_id: record.work_center_id.clone(),
            path: Vec::new(),
        };

        let computed = if record.uses_fixed_time {
            let minutes = record
                .fixed_minutes_per_batch
                .filter(|m| m.is_finite() && *m > 0.0)
                .ok_or_else(missing)?;
            minutes_to_duration(minutes)
        } else {
            let rate = record
                .units_per_hour
                .filter(|r| r.is_finite() && *r > 0.0)
                .ok_or_else(missing)?;

            let effective_rate = match record.reference_staff.filter(|r| *r > 0) {
                Some(reference) => {
                    let actual = staff.unwrap_or(reference);
                    if actual <= 0 {
                        return Err(CascadeError::missing_reference(format!(
                            "工作中心无排班人员: work_center={}, staff={}",
                            record.work_center_id, actual
                        )));
                    }
                    rate * actual as f64 / reference as f64
                }
                None => rate,
            };

            hours_to_duration(batch_size as f64 / effective_rate)
        };

        let floor_minutes = record
            .labor_minutes_per_batch
            .unwrap_or(0.0)
            .max(self.min_batch_minutes);

        let duration = computed
            .max(minutes_to_duration(floor_minutes))
            .max(Duration::minutes(1));
        if duration > Duration::days(MAX_BATCH_DAYS) {
            return Err(CascadeError::invalid_input(format!(
                "单批时长超过 {} 天: product={}, operation={}, work_center={}, batch_size={}",
                MAX_BATCH_DAYS,
                record.product_id,
                record.operation_id,
                record.work_center_id,
                batch_size
            )));
        }
        Ok(duration)
    }

    /// 查询效率与人员后估算单批时长
    ///
    /// 人数优先级: 显式指定 > 班次排班 (按 `at` 所在班次) > 标准人数
    #[allow(clippy::too_many_arguments)]
    pub fn estimate_at<R: ReferenceDataProvider + ?Sized>(
        &self,
        refs: &R,
        product_id: &str,
        operation_id: &str,
        work_center_id: &str,
        batch_size: i64,
        staff_override: Option<i32>,
        at: NaiveDateTime,
    ) -> CascadeResult<Duration> {
        let record = refs
            .get_productivity(product_id, operation_id, work_center_id)?
            .ok_or_else(|| CascadeError::MissingProductivityData {
                product_id: product_id.to_string(),
                operation_id: operation_id.to_string(),
                work_center_id: work_center_id.to_string(),
                path: Vec::new(),
            })?;

        let staff = self.resolve_staff(refs, &record, staff_override, at)?;
        self.estimate(&record, batch_size, staff)
    }

    /// 解析实际人数
    pub fn resolve_staff<R: ReferenceDataProvider + ?Sized>(
        &self,
        refs: &R,
        record: &ProductivityRecord,
        staff_override: Option<i32>,
        at: NaiveDateTime,
    ) -> CascadeResult<Option<i32>> {
        if staff_override.is_some() {
            return Ok(staff_override);
        }
        if record.reference_staff.is_none() {
            return Ok(None);
        }
        let (date, shift) = self.calendar.shift_of(at);
        Ok(refs.get_staffing(&record.work_center_id, date, shift)?)
    }
}
