// ==========================================
// 生产级联排产引擎 - 级联引擎主体
// ==========================================
// 依据: 级联排产设计 - 4.4 / 4.5 Cascade Engine
// 红线: 致命错误中止整个级联运行，不输出部分结果
// 红线: 交期不可行只告警，始终输出具体计划
// ==========================================
// 职责: 组合批量拆分 + 工时估算 + 时间线模拟 + 混合分配
// 输入: 顶层排产请求
// 输出: 一次级联运行的全部排程行 + 告警
// ==========================================

use super::context::{CascadeContext, RowOrigin};
use super::types::{
    BatchAssignment, CascadeConfig, CascadePlan, CascadeRequest, CascadeWarning,
    PlacementResult, ScheduleCandidate,
};
use crate::domain::{Product, ProductionSchedule, RouteStep};
use crate::engine::batch_sizer::BatchSizer;
use crate::engine::calendar::{hours_to_duration, shift_by, ShiftCalendar};
use crate::engine::distribution::{CandidateResource, HybridDistributor};
use crate::engine::duration::DurationEstimator;
use crate::engine::error::{CascadeError, CascadeResult};
use crate::engine::provider::{ReferenceDataProvider, ScheduleStore};
use crate::engine::timeline::{NewBatch, ResourceTimeline};
use crate::engine::writer::ScheduleWriter;
use chrono::{Duration, Local, NaiveDateTime};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 生成生产订单号: OP-YYYYMMDD-xxxxxxxx
pub fn new_production_order_number(start: NaiveDateTime) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("OP-{}-{}", start.format("%Y%m%d"), &suffix[..8])
}

// ==========================================
// CascadeEngine - 级联排产引擎
// ==========================================
pub struct CascadeEngine<R: ?Sized, S: ?Sized> {
    pub(super) refs: Arc<R>,
    pub(super) store: Arc<S>,
    pub(super) config: CascadeConfig,
    pub(super) calendar: ShiftCalendar,
    pub(super) sizer: BatchSizer,
    pub(super) estimator: DurationEstimator,
    pub(super) distributor: HybridDistributor,
}

impl<R, S> CascadeEngine<R, S>
where
    R: ReferenceDataProvider + ?Sized,
    S: ScheduleStore + ?Sized,
{
    /// 构造函数
    ///
    /// # 参数
    /// - `refs`: 参考数据提供者
    /// - `store`: 排程存储
    /// - `config`: 级联配置
    pub fn new(refs: Arc<R>, store: Arc<S>, config: CascadeConfig) -> Self {
        let calendar = config.calendar();
        Self {
            refs,
            store,
            estimator: DurationEstimator::new(config.min_batch_minutes, calendar.clone()),
            distributor: HybridDistributor::new(
                config.insertion_policy,
                config.hybrid_max_candidates,
            ),
            sizer: BatchSizer::new(),
            calendar,
            config,
        }
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    // ==========================================
    // 入口
    // ==========================================

    /// 计算一次级联运行（不写入）
    #[instrument(skip(self, request), fields(
        product_id = %request.product_id,
        quantity = request.quantity,
        start = %request.start
    ))]
    pub fn plan(&self, request: &CascadeRequest) -> CascadeResult<CascadePlan> {
        if let Some(staff) = request.staff_count {
            if staff <= 0 {
                return Err(CascadeError::invalid_input(format!(
                    "人数必须为正: staff_count={}",
                    staff
                )));
            }
        }

        let order_number = request
            .production_order_number
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| new_production_order_number(request.start));

        let now = Local::now().naive_local();
        let mut ctx = CascadeContext::new(
            order_number,
            request.weekly_plan_id.clone(),
            request.now.unwrap_or(now),
            request.start,
            self.config.horizon_days,
            now,
        );
        ctx.staff_override = request.staff_count;
        ctx.max_shift_hours = request
            .shift_hours
            .filter(|h| *h > 0.0)
            .or(self.config.max_batch_hours_per_shift);

        self.forward(&mut ctx, request)?;

        let plan = ctx.into_plan();
        info!(
            production_order_number = %plan.production_order_number,
            rows = plan.schedules.len(),
            max_level = plan.max_level(),
            warnings = plan.warnings.len(),
            "级联计算完成"
        );
        Ok(plan)
    }

    /// 计算并写入一次级联运行
    pub fn run(&self, request: &CascadeRequest) -> CascadeResult<CascadePlan> {
        let plan = self.plan(request)?;
        ScheduleWriter::new().write(self.store.as_ref(), plan)
    }

    // ==========================================
    // 共享放置逻辑
    // ==========================================

    /// 读取工艺路线并校验顺序
    pub(super) fn load_route(&self, product_id: &str) -> CascadeResult<Vec<RouteStep>> {
        let route = self.refs.get_route(product_id)?;
        if route.is_empty() {
            return Err(CascadeError::missing_reference(format!(
                "产品无工艺路线: {}",
                product_id
            )));
        }
        if let Some(pair) = route
            .windows(2)
            .find(|w| w[1].sequence_order <= w[0].sequence_order)
        {
            return Err(CascadeError::missing_reference(format!(
                "工艺路线顺序非严格递增: product={}, sequence {} -> {}",
                product_id, pair[0].sequence_order, pair[1].sequence_order
            )));
        }
        Ok(route)
    }

    /// 批量拆分，不足最小批量时记录告警
    pub(super) fn split_batches(
        &self,
        ctx: &mut CascadeContext,
        product: &Product,
        quantity: i64,
    ) -> CascadeResult<Vec<i64>> {
        let sizes = self
            .sizer
            .split(quantity, product.lote_minimo, product.max_batch_size)?;
        if quantity < product.lote_minimo {
            warn!(
                product_id = %product.product_id,
                quantity,
                lote_minimo = product.lote_minimo,
                "需求量不足最小批量"
            );
            ctx.warn(CascadeWarning::UndersizedBatch {
                product_id: product.product_id.clone(),
                quantity,
                lote_minimo: product.lote_minimo,
            });
        }
        Ok(sizes)
    }

    /// 工序的候选工作中心（主工作中心在前）
    fn candidate_work_centers(
        &self,
        product_id: &str,
        step: &RouteStep,
        include_alternates: bool,
    ) -> CascadeResult<Vec<String>> {
        let mut ids = vec![step.work_center_id.clone()];
        if include_alternates {
            for record in self
                .refs
                .get_productivity_options(product_id, &step.operation_id)?
            {
                if !ids.contains(&record.work_center_id) {
                    ids.push(record.work_center_id);
                }
            }
        }
        Ok(ids)
    }

    /// 模拟一条工艺路线的全部工序（不提交）
    ///
    /// 批次 i 在下一道工序的就绪时刻 = 本工序完工 + rest_hours_after
    ///
    /// # 参数
    /// - `start`: 首道工序请求开始时刻
    /// - `deadline`: 交期，给出时允许混合分配
    pub(super) fn plan_route(
        &self,
        ctx: &mut CascadeContext,
        product_id: &str,
        route: &[RouteStep],
        sizes: &[i64],
        start: NaiveDateTime,
        deadline: Option<NaiveDateTime>,
    ) -> CascadeResult<Vec<PlacementResult>> {
        let mut working: HashMap<String, ResourceTimeline> = HashMap::new();
        let mut candidates: Vec<ScheduleCandidate> = sizes
            .iter()
            .enumerate()
            .map(|(i, q)| ScheduleCandidate {
                batch_number: i as i32 + 1,
                quantity: *q,
                ready_at: start,
            })
            .collect();
        let mut results = Vec::with_capacity(route.len());

        for step in route {
            let wc_ids = self.candidate_work_centers(product_id, step, deadline.is_some())?;

            let mut resources = Vec::with_capacity(wc_ids.len());
            for wc_id in &wc_ids {
                let timeline = match working.get(wc_id) {
                    Some(t) => t.clone(),
                    None => ctx
                        .snapshot(self.refs.as_ref(), self.store.as_ref(), &self.calendar, wc_id)?
                        .timeline_for(product_id),
                };
                let batches = candidates
                    .iter()
                    .map(|c| {
                        let duration = self.estimator.estimate_at(
                            self.refs.as_ref(),
                            product_id,
                            &step.operation_id,
                            wc_id,
                            c.quantity,
                            ctx.staff_override,
                            c.ready_at,
                        )?;
                        Ok(NewBatch {
                            ready_at: c.ready_at,
                            duration,
                        })
                    })
                    .collect::<CascadeResult<Vec<_>>>()?;
                resources.push(CandidateResource {
                    work_center_id: wc_id.clone(),
                    timeline,
                    batches,
                });
            }

            let requested_start = candidates
                .iter()
                .map(|c| c.ready_at)
                .min()
                .unwrap_or(start);
            let outcome = self
                .distributor
                .distribute(&resources, requested_start, deadline)
                .ok_or_else(|| {
                    CascadeError::missing_reference(format!(
                        "工序无可用工作中心: product={}, operation={}",
                        product_id, step.operation_id
                    ))
                })?;

            let rest = hours_to_duration(step.rest_hours_after);
            let mut assignments = Vec::with_capacity(candidates.len());
            for placement in &outcome.assignment.placements {
                let Some(candidate) = candidates.get_mut(placement.batch_index) else {
                    continue;
                };
                if !working.contains_key(&placement.work_center_id) {
                    if let Some(resource) = resources
                        .iter()
                        .find(|r| r.work_center_id == placement.work_center_id)
                    {
                        working.insert(placement.work_center_id.clone(), resource.timeline.clone());
                    }
                }
                if let Some(timeline) = working.get_mut(&placement.work_center_id) {
                    timeline.reserve(placement.slot);
                }

                assignments.push(BatchAssignment {
                    batch_number: candidate.batch_number,
                    quantity: candidate.quantity,
                    work_center_id: placement.work_center_id.clone(),
                    slot: placement.slot,
                });
                candidate.ready_at = shift_by(placement.slot.end, rest).ok_or_else(|| {
                    CascadeError::invalid_input(format!(
                        "就绪时刻超出可表示范围: product={}, operation={}, work_center={}",
                        product_id, step.operation_id, placement.work_center_id
                    ))
                })?;
            }

            results.push(PlacementResult {
                operation_id: step.operation_id.clone(),
                sequence_order: step.sequence_order,
                assignments,
                completion: outcome.assignment.completion,
                hybrid: outcome.hybrid,
            });
        }

        Ok(results)
    }

    /// 估算工艺路线在空闲资源上的串行跨度（各工序批次时长之和 + 工序间静置）
    pub(super) fn estimate_route_span(
        &self,
        ctx: &CascadeContext,
        product_id: &str,
        route: &[RouteStep],
        sizes: &[i64],
        at: NaiveDateTime,
    ) -> CascadeResult<Duration> {
        let mut span = Duration::zero();
        for (idx, step) in route.iter().enumerate() {
            for size in sizes {
                span = span
                    + self.estimator.estimate_at(
                        self.refs.as_ref(),
                        product_id,
                        &step.operation_id,
                        &step.work_center_id,
                        *size,
                        ctx.staff_override,
                        at,
                    )?;
            }
            if idx + 1 < route.len() {
                span = span + hours_to_duration(step.rest_hours_after);
            }
        }
        Ok(span)
    }

    /// 提交放置结果并检查单批时长
    pub(super) fn commit_route(
        &self,
        ctx: &mut CascadeContext,
        origin: &RowOrigin,
        placements: &[PlacementResult],
    ) -> CascadeResult<Vec<Vec<ProductionSchedule>>> {
        let rows_by_step = ctx.commit(origin, placements)?;

        if let Some(max_hours) = ctx.max_shift_hours {
            let long: Vec<CascadeWarning> = rows_by_step
                .iter()
                .flatten()
                .filter_map(|row| {
                    let hours = (row.end_datetime - row.start_datetime).num_seconds() as f64 / 3600.0;
                    (hours > max_hours).then(|| CascadeWarning::BatchExceedsShift {
                        product_id: row.product_id.clone(),
                        operation_id: row.operation_id.clone(),
                        work_center_id: row.work_center_id.clone(),
                        batch_number: row.batch_number,
                        hours,
                        max_hours,
                    })
                })
                .collect();
            for warning in long {
                warn!(warning = %warning, "单批时长超过班次");
                ctx.warn(warning);
            }
        }

        Ok(rows_by_step)
    }
}
