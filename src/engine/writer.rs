// ==========================================
// 生产级联排产引擎 - 排程写入
// ==========================================
// 依据: 级联排产设计 - 4.6 Schedule Writer
// 红线: 只追加，不修改、不删除已有排程行
// 红线: 写入失败必须按生产订单号补偿删除
// ==========================================

use crate::engine::cascade::CascadePlan;
use crate::engine::error::{CascadeError, CascadeResult};
use crate::engine::provider::ScheduleStore;
use crate::repository::error::RepositoryError;
use tracing::{error, info, instrument, warn};

// ==========================================
// ScheduleWriter - 排程写入器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ScheduleWriter;

impl ScheduleWriter {
    pub fn new() -> Self {
        Self
    }

    /// 写入一次级联运行的全部排程行
    ///
    /// # 返回
    /// - Ok: 原样返回计划（全部行共享 production_order_number）
    /// - Err(SchedulingConflict): 快照之后出现重叠行，可整体重试
    #[instrument(skip(self, store, plan), fields(
        production_order_number = %plan.production_order_number,
        rows = plan.schedules.len()
    ))]
    pub fn write<S: ScheduleStore + ?Sized>(
        &self,
        store: &S,
        plan: CascadePlan,
    ) -> CascadeResult<CascadePlan> {
        if let Some(row) = plan
            .schedules
            .iter()
            .find(|r| r.production_order_number != plan.production_order_number)
        {
            return Err(CascadeError::invalid_input(format!(
                "排程行生产订单号不一致: schedule_id={}, {} != {}",
                row.schedule_id, row.production_order_number, plan.production_order_number
            )));
        }

        if plan.schedules.is_empty() {
            return Ok(plan);
        }

        match store.insert_schedules(&plan.schedules) {
            Ok(written) => {
                info!(written, "排程写入完成");
                Ok(plan)
            }
            Err(RepositoryError::ScheduleConflict {
                work_center_id,
                message,
            }) => {
                warn!(work_center_id = %work_center_id, message = %message, "排程写入冲突");
                Err(CascadeError::SchedulingConflict {
                    work_center_id,
                    message,
                })
            }
            Err(e) => {
                error!(error = %e, "排程写入失败，执行补偿删除");
                match store.delete_by_order_number(&plan.production_order_number) {
                    Ok(removed) => warn!(removed, "补偿删除完成"),
                    Err(cleanup) => error!(error = %cleanup, "补偿删除失败"),
                }
                Err(e.into())
            }
        }
    }
}
