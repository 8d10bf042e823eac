// ==========================================
// 生产级联排产引擎 - 资源时间线模拟
// ==========================================
// 依据: 级联排产设计 - 4.3 Resource Timeline Simulator
// 红线: 新批次不得与已有排程、停机窗口、彼此重叠
// ==========================================
// 职责: 回答"在资源已有队列下插入 N 个新批次，何时真正完工"
// 输入: 已有排程区间 + 停机区间 + 新批次 (就绪时刻, 时长)
// 输出: 新批次的 (开始, 结束)，顺序与输入一致
// ==========================================

use crate::domain::{InsertionPolicy, ProductionSchedule, TimeSlot};
use chrono::{Duration, NaiveDateTime};

/// 待放置的新批次
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewBatch {
    pub ready_at: NaiveDateTime, // 最早可开始时刻（上道工序完成 + 静置）
    pub duration: Duration,
}

/// 排序并合并重叠/相接的区间
fn merge_slots(mut slots: Vec<TimeSlot>) -> Vec<TimeSlot> {
    slots.retain(|s| s.end > s.start);
    slots.sort();
    let mut merged: Vec<TimeSlot> = Vec::with_capacity(slots.len());
    for slot in slots {
        match merged.last_mut() {
            Some(last) if slot.start <= last.end => {
                if slot.end > last.end {
                    last.end = slot.end;
                }
            }
            _ => merged.push(slot),
        }
    }
    merged
}

/// 时刻平移，越界时停在可表示的最大时刻
fn saturating_add(t: NaiveDateTime, d: Duration) -> NaiveDateTime {
    t.checked_add_signed(d).unwrap_or(NaiveDateTime::MAX)
}

/// 在有序区间列表中插入一个区间并保持合并
fn insert_merged(slots: &mut Vec<TimeSlot>, slot: TimeSlot) {
    let mut all = std::mem::take(slots);
    all.push(slot);
    *slots = merge_slots(all);
}

// ==========================================
// ResourceTimeline - 单资源时间线
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceTimeline {
    occupied: Vec<TimeSlot>,  // 已有排程（含本次运行已放置的批次），已合并
    blackouts: Vec<TimeSlot>, // 停机窗口，已合并
}

impl ResourceTimeline {
    /// 由占用区间与停机区间构建
    pub fn new(occupied: Vec<TimeSlot>, blackouts: Vec<TimeSlot>) -> Self {
        Self {
            occupied: merge_slots(occupied),
            blackouts: merge_slots(blackouts),
        }
    }

    /// 由已有排程行构建，只保留阻塞该产品的行
    pub fn from_schedule(
        rows: &[ProductionSchedule],
        product_id: &str,
        allows_parallel_references: bool,
        blackouts: Vec<TimeSlot>,
    ) -> Self {
        let occupied = rows
            .iter()
            .filter(|r| r.blocks(product_id, allows_parallel_references))
            .map(ProductionSchedule::slot)
            .collect();
        Self::new(occupied, blackouts)
    }

    pub fn occupied(&self) -> &[TimeSlot] {
        &self.occupied
    }

    pub fn blackouts(&self) -> &[TimeSlot] {
        &self.blackouts
    }

    /// 资源真实的最早可用时刻
    ///
    /// - APPEND: 排在覆盖请求时刻的已有队列之后；请求时刻之后才开始的行不参与
    /// - FILL_GAPS: 请求开始（空档由 fit 处理）
    pub fn earliest_free(
        &self,
        requested_start: NaiveDateTime,
        policy: InsertionPolicy,
    ) -> NaiveDateTime {
        match policy {
            InsertionPolicy::Append => self
                .occupied
                .iter()
                .take_while(|s| s.start <= requested_start)
                .map(|s| s.end)
                .fold(requested_start, NaiveDateTime::max),
            InsertionPolicy::FillGaps => requested_start,
        }
    }

    /// 从 cursor 起为时长 duration 的批次找到首个可行位置
    ///
    /// 与任一停机/占用区间相交时，将 cursor 推到该区间结束并重新检查，直到不动点
    pub fn fit(&self, cursor: NaiveDateTime, duration: Duration) -> TimeSlot {
        let span = duration.max(Duration::seconds(1));
        let mut start = cursor;
        loop {
            let candidate = TimeSlot::new(start, saturating_add(start, span));
            let blocking = self
                .blackouts
                .iter()
                .chain(self.occupied.iter())
                .filter(|s| s.overlaps(&candidate))
                .map(|s| s.end)
                .max();
            match blocking {
                Some(end) if end > start => start = end,
                _ => return TimeSlot::new(start, saturating_add(start, duration)),
            }
        }
    }

    /// 模拟放置一组新批次（不修改时间线）
    ///
    /// APPEND 下新批次保持输入顺序，每批排在上一批之后；
    /// FILL_GAPS 下每批各自取就绪时刻之后最早的空档。
    /// 两种策略下已放置的新批次都计入占用，彼此不重叠。
    pub fn simulate(
        &self,
        requested_start: NaiveDateTime,
        policy: InsertionPolicy,
        batches: &[NewBatch],
    ) -> Vec<TimeSlot> {
        let mut scratch = self.clone();
        let mut cursor = self.earliest_free(requested_start, policy);
        batches
            .iter()
            .map(|batch| {
                let slot = scratch.fit(cursor.max(batch.ready_at), batch.duration);
                scratch.reserve(slot);
                if policy == InsertionPolicy::Append {
                    cursor = slot.end;
                }
                slot
            })
            .collect()
    }

    /// 将已确认的批次计入占用
    pub fn reserve(&mut self, slot: TimeSlot) {
        insert_merged(&mut self.occupied, slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn batch(ready_at: NaiveDateTime, minutes: i64) -> NewBatch {
        NewBatch {
            ready_at,
            duration: Duration::minutes(minutes),
        }
    }

    fn assert_disjoint(slots: &[TimeSlot], others: &[TimeSlot]) {
        for (i, a) in slots.iter().enumerate() {
            for b in slots.iter().skip(i + 1) {
                assert!(!a.overlaps(b), "{:?} overlaps {:?}", a, b);
            }
            for o in others {
                assert!(!a.overlaps(o), "{:?} overlaps {:?}", a, o);
            }
        }
    }

    #[test]
    fn test_empty_timeline_sequential() {
        let tl = ResourceTimeline::default();
        let start = dt(1, 6, 0);
        let slots = tl.simulate(
            start,
            InsertionPolicy::Append,
            &[batch(start, 60), batch(start, 60), batch(start, 30)],
        );
        assert_eq!(slots[0], TimeSlot::new(dt(1, 6, 0), dt(1, 7, 0)));
        assert_eq!(slots[1], TimeSlot::new(dt(1, 7, 0), dt(1, 8, 0)));
        assert_eq!(slots[2], TimeSlot::new(dt(1, 8, 0), dt(1, 8, 30)));
    }

    #[test]
    fn test_append_starts_after_block_covering_request() {
        let existing = vec![
            TimeSlot::new(dt(1, 6, 0), dt(1, 8, 0)),
            TimeSlot::new(dt(1, 10, 0), dt(1, 11, 0)),
        ];
        let tl = ResourceTimeline::new(existing.clone(), vec![]);
        assert_eq!(tl.earliest_free(dt(1, 6, 0), InsertionPolicy::Append), dt(1, 8, 0));
        let slots = tl.simulate(dt(1, 6, 0), InsertionPolicy::Append, &[batch(dt(1, 6, 0), 60)]);
        assert_eq!(slots[0], TimeSlot::new(dt(1, 8, 0), dt(1, 9, 0)));
        assert_disjoint(&slots, &existing);
    }

    #[test]
    fn test_append_ignores_rows_starting_after_request() {
        // 20 号的负载不应把 1 号的批次推到 20 号之后
        let existing = vec![TimeSlot::new(dt(20, 6, 0), dt(20, 10, 0))];
        let tl = ResourceTimeline::new(existing.clone(), vec![]);
        assert_eq!(tl.earliest_free(dt(1, 6, 0), InsertionPolicy::Append), dt(1, 6, 0));
        let slots = tl.simulate(dt(1, 6, 0), InsertionPolicy::Append, &[batch(dt(1, 6, 0), 60)]);
        assert_eq!(slots[0], TimeSlot::new(dt(1, 6, 0), dt(1, 7, 0)));
        assert_disjoint(&slots, &existing);
    }

    #[test]
    fn test_append_keeps_order_fill_gaps_backfills() {
        let existing = vec![TimeSlot::new(dt(1, 8, 0), dt(1, 9, 0))];
        let tl = ResourceTimeline::new(existing.clone(), vec![]);
        let batches = [batch(dt(1, 6, 0), 120), batch(dt(1, 6, 0), 30)];

        let append = tl.simulate(dt(1, 6, 0), InsertionPolicy::Append, &batches);
        assert_eq!(append[0], TimeSlot::new(dt(1, 9, 0), dt(1, 11, 0)));
        assert_eq!(append[1], TimeSlot::new(dt(1, 11, 0), dt(1, 11, 30)));

        let fill = tl.simulate(dt(1, 6, 0), InsertionPolicy::FillGaps, &batches);
        assert_eq!(fill[0], TimeSlot::new(dt(1, 9, 0), dt(1, 11, 0)));
        assert_eq!(fill[1], TimeSlot::new(dt(1, 6, 0), dt(1, 6, 30)));
        assert_disjoint(&fill, &existing);
    }

    #[test]
    fn test_fit_near_max_datetime_does_not_overflow() {
        let tl = ResourceTimeline::default();
        let near_end = NaiveDateTime::MAX - Duration::hours(1);
        let slot = tl.fit(near_end, Duration::days(2));
        assert_eq!(slot.start, near_end);
        assert_eq!(slot.end, NaiveDateTime::MAX);
    }

    #[test]
    fn test_fill_gaps_uses_hole_that_fits() {
        let existing = vec![
            TimeSlot::new(dt(1, 6, 0), dt(1, 8, 0)),
            TimeSlot::new(dt(1, 10, 0), dt(1, 11, 0)),
        ];
        let tl = ResourceTimeline::new(existing.clone(), vec![]);
        let slots = tl.simulate(
            dt(1, 6, 0),
            InsertionPolicy::FillGaps,
            &[batch(dt(1, 6, 0), 90), batch(dt(1, 6, 0), 90)],
        );
        // 第一批放入 8:00-9:30 空档，第二批放不进 9:30-10:00，顺延至 11:00
        assert_eq!(slots[0], TimeSlot::new(dt(1, 8, 0), dt(1, 9, 30)));
        assert_eq!(slots[1], TimeSlot::new(dt(1, 11, 0), dt(1, 12, 30)));
        assert_disjoint(&slots, &existing);
    }

    #[test]
    fn test_blackout_containing_window_shifts_start() {
        let blackout = TimeSlot::new(dt(1, 6, 0), dt(1, 14, 0));
        let tl = ResourceTimeline::new(vec![], vec![blackout]);
        let slots = tl.simulate(dt(1, 6, 0), InsertionPolicy::Append, &[batch(dt(1, 6, 0), 100)]);
        assert_eq!(slots[0].start, dt(1, 14, 0));
        assert_disjoint(&slots, &[blackout]);
    }

    #[test]
    fn test_adjacent_blackouts_are_merged_and_skip_reaches_fixed_point() {
        let blackouts = vec![
            TimeSlot::new(dt(1, 14, 0), dt(1, 22, 0)),
            TimeSlot::new(dt(1, 8, 0), dt(1, 14, 0)),
            TimeSlot::new(dt(1, 21, 0), dt(1, 23, 0)),
        ];
        let tl = ResourceTimeline::new(vec![], blackouts.clone());
        assert_eq!(tl.blackouts().len(), 1);

        // 7:00 开始 2 小时会撞上 8:00 的停机，需跳到 23:00
        let slots = tl.simulate(dt(1, 7, 0), InsertionPolicy::Append, &[batch(dt(1, 7, 0), 120)]);
        assert_eq!(slots[0].start, dt(1, 23, 0));
        assert_disjoint(&slots, &blackouts);
    }

    #[test]
    fn test_skip_alternates_between_rows_and_blackouts() {
        let existing = vec![TimeSlot::new(dt(1, 9, 0), dt(1, 10, 0))];
        let blackouts = vec![TimeSlot::new(dt(1, 10, 30), dt(1, 12, 0))];
        let tl = ResourceTimeline::new(existing.clone(), blackouts.clone());
        let slots = tl.simulate(
            dt(1, 8, 0),
            InsertionPolicy::FillGaps,
            &[batch(dt(1, 8, 0), 60), batch(dt(1, 8, 0), 60)],
        );
        assert_eq!(slots[0], TimeSlot::new(dt(1, 8, 0), dt(1, 9, 0)));
        assert_eq!(slots[1], TimeSlot::new(dt(1, 12, 0), dt(1, 13, 0)));
        assert_disjoint(&slots, &existing);
        assert_disjoint(&slots, &blackouts);
    }

    #[test]
    fn test_ready_time_delays_batch() {
        let tl = ResourceTimeline::default();
        let slots = tl.simulate(
            dt(1, 6, 0),
            InsertionPolicy::Append,
            &[batch(dt(1, 6, 0), 30), batch(dt(1, 9, 0), 30)],
        );
        assert_eq!(slots[1].start, dt(1, 9, 0));
    }

    #[test]
    fn test_reserve_blocks_later_simulation() {
        let mut tl = ResourceTimeline::default();
        tl.reserve(TimeSlot::new(dt(1, 6, 0), dt(1, 7, 0)));
        tl.reserve(TimeSlot::new(dt(1, 7, 0), dt(1, 8, 0)));
        assert_eq!(tl.occupied().len(), 1);
        let slots = tl.simulate(dt(1, 6, 0), InsertionPolicy::FillGaps, &[batch(dt(1, 6, 0), 15)]);
        assert_eq!(slots[0].start, dt(1, 8, 0));
    }

    #[test]
    fn test_many_batches_never_overlap() {
        let existing: Vec<TimeSlot> = (0..10)
            .map(|i| TimeSlot::new(dt(1, 6, 0) + Duration::minutes(i * 97), dt(1, 6, 0) + Duration::minutes(i * 97 + 40)))
            .collect();
        let blackouts = vec![
            TimeSlot::new(dt(1, 10, 0), dt(1, 11, 0)),
            TimeSlot::new(dt(1, 13, 0), dt(1, 13, 10)),
        ];
        let tl = ResourceTimeline::new(existing.clone(), blackouts.clone());
        let batches: Vec<NewBatch> = (0..12).map(|i| batch(dt(1, 6, 0), 20 + i * 7)).collect();
        let slots = tl.simulate(dt(1, 6, 0), InsertionPolicy::FillGaps, &batches);
        assert_eq!(slots.len(), batches.len());
        assert_disjoint(&slots, &existing);
        assert_disjoint(&slots, &blackouts);
        for (slot, b) in slots.iter().zip(batches.iter()) {
            assert_eq!(slot.duration(), b.duration);
        }
    }
}
