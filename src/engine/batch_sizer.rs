// ==========================================
// 生产级联排产引擎 - 批量拆分
// ==========================================
// 依据: 级联排产设计 - 4.1 Batch Sizer
// 红线: 批量之和必须等于总量；除非总量不足最小批量，否则每批 >= 最小批量
// ==========================================

use crate::engine::error::{CascadeError, CascadeResult};

/// 单次拆分的批次数上限
pub const MAX_BATCHES_PER_RUN: i64 = 10_000;

// ==========================================
// BatchSizer - 批量拆分器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct BatchSizer;

impl BatchSizer {
    pub fn new() -> Self {
        Self
    }

    /// 将总量拆分为均衡批次
    ///
    /// 规则:
    /// 1) 批次数 = ceil(总量 / 单批上限)，无上限时 = floor(总量 / 最小批量)
    /// 2) 批次数不超过 floor(总量 / 最小批量)，保证每批 >= 最小批量
    /// 3) 总量 < 最小批量时输出单个不足批（避免小单死锁）
    /// 4) 批量之间相差不超过 1
    ///
    /// # 参数
    /// - `total`: 需求总量 (件)
    /// - `lote_minimo`: 最小批量
    /// - `max_batch_size`: 单批上限
    pub fn split(
        &self,
        total: i64,
        lote_minimo: i64,
        max_batch_size: Option<i64>,
    ) -> CascadeResult<Vec<i64>> {
        if total <= 0 {
            return Err(CascadeError::invalid_input(format!(
                "需求数量必须为正: quantity={}",
                total
            )));
        }
        if lote_minimo <= 0 {
            return Err(CascadeError::invalid_input(format!(
                "最小批量必须为正: lote_minimo={}",
                lote_minimo
            )));
        }

        if total < lote_minimo {
            return Ok(vec![total]);
        }

        let max_count = total / lote_minimo;
        let wanted = match max_batch_size.filter(|m| *m > 0) {
            Some(max) => (total - 1) / max + 1,
            None => max_count,
        };
        let count = wanted.clamp(1, max_count);
        if count > MAX_BATCHES_PER_RUN {
            return Err(CascadeError::invalid_input(format!(
                "批次数超过上限 {}: quantity={}, lote_minimo={}, batches={}",
                MAX_BATCHES_PER_RUN, total, lote_minimo, count
            )));
        }

        let base = total / count;
        let remainder = total % count;
        let sizes = (0..count)
            .map(|i| if i < remainder { base + 1 } else { base })
            .collect();

        Ok(sizes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_balanced(sizes: &[i64], total: i64, lote_minimo: i64) {
        assert_eq!(sizes.iter().sum::<i64>(), total);
        let max = *sizes.iter().max().unwrap();
        let min = *sizes.iter().min().unwrap();
        assert!(max - min <= 1, "unbalanced: {:?}", sizes);
        if total >= lote_minimo {
            assert!(sizes.iter().all(|s| *s >= lote_minimo), "undersized: {:?}", sizes);
        } else {
            assert_eq!(sizes.len(), 1);
        }
    }

    #[test]
    fn test_split_with_batch_capacity() {
        let sizer = BatchSizer::new();
        let sizes = sizer.split(250, 80, Some(100)).unwrap();
        assert_eq!(sizes, vec![84, 83, 83]);
    }

    #[test]
    fn test_minimum_wins_over_capacity() {
        // 上限 100 需要 3 批，但 3 批会低于最小批量 100，退为 2 批
        let sizer = BatchSizer::new();
        let sizes = sizer.split(250, 100, Some(100)).unwrap();
        assert_eq!(sizes, vec![125, 125]);
    }

    #[test]
    fn test_without_capacity_uses_standard_lots() {
        let sizer = BatchSizer::new();
        assert_eq!(sizer.split(250, 100, None).unwrap(), vec![125, 125]);
        assert_eq!(sizer.split(300, 100, None).unwrap(), vec![100, 100, 100]);
    }

    #[test]
    fn test_small_order_single_undersized_batch() {
        let sizer = BatchSizer::new();
        assert_eq!(sizer.split(40, 100, Some(100)).unwrap(), vec![40]);
    }

    #[test]
    fn test_rejects_non_positive_quantity() {
        let sizer = BatchSizer::new();
        assert!(matches!(
            sizer.split(0, 100, None),
            Err(CascadeError::InvalidInput { .. })
        ));
        assert!(sizer.split(-5, 100, None).is_err());
        assert!(sizer.split(10, 0, None).is_err());
    }

    #[test]
    fn test_too_many_batches_is_invalid_input() {
        let sizer = BatchSizer::new();
        let err = sizer.split(i64::MAX, 1, Some(1)).unwrap_err();
        assert!(matches!(err, CascadeError::InvalidInput { .. }));
        assert_eq!(
            sizer.split(MAX_BATCHES_PER_RUN, 1, Some(1)).unwrap().len() as i64,
            MAX_BATCHES_PER_RUN
        );
    }

    #[test]
    fn test_balance_property_over_range() {
        let sizer = BatchSizer::new();
        for lote_minimo in [1_i64, 7, 50, 100] {
            for max in [None, Some(lote_minimo), Some(lote_minimo * 3 / 2 + 1), Some(1000)] {
                for total in 1..=400_i64 {
                    let sizes = sizer.split(total, lote_minimo, max).unwrap();
                    assert_balanced(&sizes, total, lote_minimo);
                }
            }
        }
    }
}
