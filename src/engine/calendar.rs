// ==========================================
// 生产级联排产引擎 - 班次日历
// ==========================================
// 职责: 班次编号 <-> 具体时间区间互转
// 约定: 第 n 班 (从1起) 开始于 当日 shift_start_hour + (n-1) * shift_hours
//       首班开始前的时刻归属前一日最后一班
// ==========================================

use crate::domain::{BlackoutWindow, TimeSlot};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// 时长换算上限（秒），超出按上限截断，避免 Duration 构造越界
pub const MAX_SPAN_SECONDS: i64 = 100 * 366 * 24 * 3600;

fn seconds_to_duration(seconds: f64) -> Duration {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Duration::zero();
    }
    Duration::seconds((seconds.round() as i64).min(MAX_SPAN_SECONDS))
}

/// 小时数 (可为小数) 转为 Duration，精度到秒
pub fn hours_to_duration(hours: f64) -> Duration {
    seconds_to_duration(hours * 3600.0)
}

/// 分钟数 (可为小数) 转为 Duration，精度到秒
pub fn minutes_to_duration(minutes: f64) -> Duration {
    seconds_to_duration(minutes * 60.0)
}

/// 时刻平移，超出 chrono 可表示范围时返回 None
pub fn shift_by(t: NaiveDateTime, d: Duration) -> Option<NaiveDateTime> {
    t.checked_add_signed(d)
}

// ==========================================
// ShiftCalendar - 班次日历
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftCalendar {
    pub shift_start_hour: u32,
    pub shift_hours: f64,
    pub shifts_per_day: u32,
}

impl Default for ShiftCalendar {
    fn default() -> Self {
        Self {
            shift_start_hour: 6,
            shift_hours: 8.0,
            shifts_per_day: 3,
        }
    }
}

impl ShiftCalendar {
    pub fn new(shift_start_hour: u32, shift_hours: f64, shifts_per_day: u32) -> Self {
        Self {
            shift_start_hour: shift_start_hour.min(23),
            shift_hours,
            shifts_per_day: shifts_per_day.max(1),
        }
    }

    fn day_start(&self, date: NaiveDate) -> NaiveDateTime {
        let time = NaiveTime::from_hms_opt(self.shift_start_hour, 0, 0).unwrap_or(NaiveTime::MIN);
        date.and_time(time)
    }

    /// 指定日期、班次对应的时间区间
    ///
    /// # 返回
    /// - None: 班次编号超出 1..=shifts_per_day
    pub fn shift_window(&self, date: NaiveDate, shift_number: i32) -> Option<TimeSlot> {
        if shift_number < 1 || shift_number as u32 > self.shifts_per_day {
            return None;
        }
        let length = hours_to_duration(self.shift_hours);
        let start = self.day_start(date) + length * (shift_number - 1);
        Some(TimeSlot::new(start, start + length))
    }

    /// 时刻所属的 (生产日期, 班次)
    pub fn shift_of(&self, t: NaiveDateTime) -> (NaiveDate, i32) {
        let mut date = t.date();
        if t < self.day_start(date) {
            date = date.pred_opt().unwrap_or(date);
        }
        let offset = t - self.day_start(date);
        let length = hours_to_duration(self.shift_hours).num_seconds().max(1);
        let index = offset.num_seconds() / length + 1;
        (date, index.clamp(1, self.shifts_per_day as i64) as i32)
    }

    /// 将停机窗口解析为具体时间区间（非法班次被忽略）
    pub fn resolve_blackouts(&self, windows: &[BlackoutWindow]) -> Vec<TimeSlot> {
        windows
            .iter()
            .filter_map(|w| {
                let slot = self.shift_window(w.date, w.shift_number);
                if slot.is_none() {
                    tracing::warn!(
                        work_center_id = %w.work_center_id,
                        date = %w.date,
                        shift_number = w.shift_number,
                        "停机窗口班次编号非法，已忽略"
                    );
                }
                slot
            })
            .collect()
    }
}
