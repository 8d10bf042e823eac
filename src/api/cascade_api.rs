// ==========================================
// 生产级联排产引擎 - 级联排产 API
// ==========================================
// 依据: 级联排产设计 - 6. 对外接口 / 5. 乐观并发控制
// 职责: ScheduleProduction / DeleteProductionOrder / 订单查询
// 红线: 写入冲突时整体重跑级联（重新读取快照），不做局部修补
// ==========================================

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::CascadeConfigReader;
use crate::domain::ProductionSchedule;
use crate::engine::{
    new_production_order_number, CascadeEngine, CascadeError, CascadeRequest, CascadeResult,
    CascadeWarning, ScheduleStore,
};
use crate::repository::{
    ProductionOrderSummary, ProductionScheduleRepository, ReferenceDataRepository,
    WeeklyPlanRepository,
};

// ==========================================
// 请求/响应
// ==========================================

/// ScheduleProduction 请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleProductionRequest {
    pub product_id: String,
    pub quantity: i64,
    pub start_datetime: NaiveDateTime,
    #[serde(default)]
    pub shift_hours: Option<f64>,
    #[serde(default)]
    pub staff_count: Option<i32>,
    #[serde(default)]
    pub deadline: Option<NaiveDateTime>,
    #[serde(default)]
    pub weekly_plan_id: Option<String>,
}

/// ScheduleProduction 响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleProductionResponse {
    pub production_order_number: String,
    pub schedules: Vec<ProductionSchedule>,
    pub warnings: Vec<CascadeWarning>,
}

// ==========================================
// CascadeApi
// ==========================================
pub struct CascadeApi {
    reference_repo: Arc<ReferenceDataRepository>,
    schedule_repo: Arc<ProductionScheduleRepository>,
    weekly_plan_repo: Arc<WeeklyPlanRepository>,
    config_reader: Arc<dyn CascadeConfigReader>,
}

impl CascadeApi {
    pub fn new(
        reference_repo: Arc<ReferenceDataRepository>,
        schedule_repo: Arc<ProductionScheduleRepository>,
        weekly_plan_repo: Arc<WeeklyPlanRepository>,
        config_reader: Arc<dyn CascadeConfigReader>,
    ) -> Self {
        Self {
            reference_repo,
            schedule_repo,
            weekly_plan_repo,
            config_reader,
        }
    }

    /// 排产一个顶层生产需求（正向 + 反向级联，原子写入）
    ///
    /// # 返回
    /// - Ok(ScheduleProductionResponse): 全部排程行与非致命告警
    /// - Err(ApiError): 输入/参考数据/BOM 错误，或冲突重试耗尽
    #[instrument(skip(self, request), fields(
        product_id = %request.product_id,
        quantity = request.quantity
    ))]
    pub async fn schedule_production(
        &self,
        request: ScheduleProductionRequest,
    ) -> ApiResult<ScheduleProductionResponse> {
        if request.product_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("产品ID不能为空".to_string()));
        }
        if request.quantity <= 0 {
            return Err(ApiError::InvalidInput(format!(
                "需求量必须为正: quantity={}",
                request.quantity
            )));
        }
        if let Some(plan_id) = request.weekly_plan_id.as_deref() {
            if self.weekly_plan_repo.find_by_id(plan_id)?.is_none() {
                return Err(ApiError::NotFound(format!("WeeklyPlan(id={})不存在", plan_id)));
            }
        }

        let config = self
            .config_reader
            .load_cascade_config()
            .await
            .map_err(|e| ApiError::InternalError(format!("读取配置失败: {}", e)))?;
        let max_retries = config.max_conflict_retries;

        // 订单号只生成一次，重跑沿用
        let order_number = new_production_order_number(request.start_datetime);
        let cascade_request = CascadeRequest {
            product_id: request.product_id.trim().to_string(),
            quantity: request.quantity,
            start: request.start_datetime,
            shift_hours: request.shift_hours,
            staff_count: request.staff_count,
            deadline: request.deadline,
            production_order_number: Some(order_number),
            weekly_plan_id: request.weekly_plan_id.clone(),
            now: None,
        };

        let engine = CascadeEngine::new(
            self.reference_repo.clone(),
            self.schedule_repo.clone(),
            config,
        );
        let plan = retry_on_conflict(max_retries, |_| engine.run(&cascade_request))?;

        info!(
            production_order_number = %plan.production_order_number,
            rows = plan.schedules.len(),
            warnings = plan.warnings.len(),
            "排产完成"
        );
        Ok(ScheduleProductionResponse {
            production_order_number: plan.production_order_number,
            schedules: plan.schedules,
            warnings: plan.warnings,
        })
    }

    /// 删除一个生产订单的全部排程行（幂等，返回删除行数）
    pub fn delete_production_order(&self, production_order_number: &str) -> ApiResult<usize> {
        let order = production_order_number.trim();
        if order.is_empty() {
            return Err(ApiError::InvalidInput("生产订单号不能为空".to_string()));
        }
        let deleted = self.schedule_repo.delete_by_order_number(order)?;
        info!(production_order_number = %order, deleted, "生产订单已删除");
        Ok(deleted)
    }

    /// 查询一个生产订单的排程行（按级联层级、开始时间排序）
    pub fn get_production_order(
        &self,
        production_order_number: &str,
    ) -> ApiResult<Vec<ProductionSchedule>> {
        let order = production_order_number.trim();
        if order.is_empty() {
            return Err(ApiError::InvalidInput("生产订单号不能为空".to_string()));
        }
        let rows = self.schedule_repo.find_by_order_number(order)?;
        if rows.is_empty() {
            return Err(ApiError::NotFound(format!("生产订单(id={})不存在", order)));
        }
        Ok(rows)
    }

    /// 列出全部生产订单汇总
    pub fn list_production_orders(&self) -> ApiResult<Vec<ProductionOrderSummary>> {
        Ok(self.schedule_repo.summarize_orders()?)
    }
}

/// 冲突时整体重跑，最多重试 max_retries 次
///
/// 每次调用 `run(attempt)` 都必须重新读取快照。
pub(crate) fn retry_on_conflict<T>(
    max_retries: u32,
    mut run: impl FnMut(u32) -> CascadeResult<T>,
) -> ApiResult<T> {
    let mut attempt = 0;
    loop {
        match run(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                warn!(attempt, max_retries, error = %e, "排程写入冲突，重新级联");
            }
            Err(e @ CascadeError::SchedulingConflict { .. }) => {
                return Err(ApiError::SchedulingConflict {
                    attempts: attempt,
                    message: e.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflict() -> CascadeError {
        CascadeError::SchedulingConflict {
            work_center_id: "MIX1".to_string(),
            message: "overlap".to_string(),
        }
    }

    #[test]
    fn test_retry_succeeds_after_transient_conflicts() {
        let mut calls = 0;
        let result = retry_on_conflict(3, |attempt| {
            calls += 1;
            if attempt < 2 {
                Err(conflict())
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_retry_exhausted_reports_attempts() {
        let mut calls = 0;
        let result: ApiResult<()> = retry_on_conflict(2, |_| {
            calls += 1;
            Err(conflict())
        });
        assert_eq!(calls, 3);
        match result {
            Err(ApiError::SchedulingConflict { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_fatal_error_is_not_retried() {
        let mut calls = 0;
        let result: ApiResult<()> = retry_on_conflict(3, |_| {
            calls += 1;
            Err(CascadeError::invalid_input("bad"))
        });
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    }
}
