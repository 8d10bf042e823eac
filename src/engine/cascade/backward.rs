// ==========================================
// 生产级联排产引擎 - 反向排程 (半成品 PP)
// ==========================================
// 依据: 级联排产设计 - 4.5 Cascade Engine backward pass
// 红线: BOM 循环/超深是配置错误，必须报错，不得截断
// 红线: 倒推开始早于当前时刻时仍然排产，并标记短缺
// ==========================================

use super::context::{CascadeContext, RowOrigin};
use super::core::CascadeEngine;
use super::types::{CascadeWarning, PlacementResult};
use crate::domain::{BomLine, CascadeType, Product, ProductionSchedule};
use crate::engine::calendar::hours_to_duration;
use crate::engine::error::{CascadeError, CascadeResult};
use crate::engine::provider::{ReferenceDataProvider, ScheduleStore};
use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

fn route_completion(placements: &[PlacementResult]) -> Option<NaiveDateTime> {
    placements.last().map(|p| p.completion)
}

impl<R, S> CascadeEngine<R, S>
where
    R: ReferenceDataProvider + ?Sized,
    S: ScheduleStore + ?Sized,
{
    /// 展开产品 BOM，对每个自制品输入触发反向排程
    ///
    /// # 参数
    /// - `product_id`: 消耗方产品
    /// - `run_quantity`: 消耗方本次运行总量
    /// - `rows_by_step`: 消耗方各工序的新排程行
    /// - `depth`: 输入物料所在层级
    pub(super) fn explode_bom(
        &self,
        ctx: &mut CascadeContext,
        product_id: &str,
        run_quantity: i64,
        rows_by_step: &[Vec<ProductionSchedule>],
        depth: u32,
    ) -> CascadeResult<()> {
        let lines = self.refs.get_bom(product_id)?;

        for line in &lines {
            let material = match self.refs.get_product(&line.material_id)? {
                Some(p) if p.kind.is_produced() => p,
                Some(_) => continue,
                None => {
                    debug!(
                        product_id = %product_id,
                        material_id = %line.material_id,
                        "物料未登记为产品，按外购原料处理"
                    );
                    continue;
                }
            };

            // 消耗工序: 与 BOM 行工序一致的工序，找不到时取首道工序
            let consumer = rows_by_step
                .iter()
                .find(|rows| {
                    rows.first()
                        .map_or(false, |r| r.operation_id == line.operation_id)
                })
                .or_else(|| rows_by_step.first())
                .and_then(|rows| rows.iter().min_by_key(|r| r.start_datetime))
                .ok_or_else(|| {
                    CascadeError::missing_reference(format!(
                        "消耗方无排程行: product={}, operation={}",
                        product_id, line.operation_id
                    ))
                })?;
            let required_by = consumer.start_datetime;
            let source_id = consumer.schedule_id.clone();

            let required_quantity = line.required_quantity(run_quantity);
            if required_quantity <= 0 {
                debug!(
                    material_id = %line.material_id,
                    quantity_per_unit = line.quantity_per_unit,
                    "需求量为零，跳过"
                );
                continue;
            }

            self.backward(
                ctx,
                &material,
                line,
                required_quantity,
                required_by,
                source_id,
                depth,
            )?;
        }

        Ok(())
    }

    /// 反向排程：半成品最后一道工序在需求时刻前完工
    #[allow(clippy::too_many_arguments)]
    fn backward(
        &self,
        ctx: &mut CascadeContext,
        product: &Product,
        line: &BomLine,
        quantity: i64,
        required_by: NaiveDateTime,
        source_id: String,
        depth: u32,
    ) -> CascadeResult<()> {
        if ctx.on_path(&product.product_id) || depth > self.config.max_cascade_depth {
            let mut path = ctx.bom_path().to_vec();
            path.push(product.product_id.clone());
            warn!(path = %path.join(" -> "), depth, "BOM 循环或超过最大深度");
            return Err(CascadeError::CyclicBom {
                max_depth: self.config.max_cascade_depth,
                path,
            });
        }

        ctx.enter(&product.product_id);
        let result = self
            .backward_inner(ctx, product, line, quantity, required_by, source_id, depth)
            .map_err(|e| e.with_path(ctx.bom_path()));
        ctx.leave();
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn backward_inner(
        &self,
        ctx: &mut CascadeContext,
        product: &Product,
        line: &BomLine,
        quantity: i64,
        required_by: NaiveDateTime,
        source_id: String,
        depth: u32,
    ) -> CascadeResult<()> {
        let route = self.load_route(&product.product_id)?;
        let sizes = self.split_batches(ctx, product, quantity)?;

        let out_of_range = || {
            CascadeError::invalid_input(format!(
                "反向锚点超出可表示范围: product={}, required_by={}",
                product.product_id, required_by
            ))
        };
        let deadline = required_by
            .checked_sub_signed(hours_to_duration(line.rest_hours_before_use))
            .ok_or_else(out_of_range)?;
        let floor = ctx.planning_floor;
        let span = self.estimate_route_span(ctx, &product.product_id, &route, &sizes, deadline)?;
        let latest_start = deadline.checked_sub_signed(span).ok_or_else(out_of_range)?;

        let mut anchor = latest_start.max(floor);
        let mut placements =
            self.plan_route(ctx, &product.product_id, &route, &sizes, anchor, Some(deadline))?;

        // 已有负载可能推迟完工，按超出量前移锚点重新模拟
        for _ in 0..self.config.backward_anchor_iterations {
            let Some(completion) = route_completion(&placements) else {
                break;
            };
            if completion <= deadline || anchor <= floor {
                break;
            }
            let next_anchor = anchor
                .checked_sub_signed(completion - deadline)
                .unwrap_or(floor)
                .max(floor);
            if next_anchor >= anchor {
                break;
            }
            anchor = next_anchor;
            placements =
                self.plan_route(ctx, &product.product_id, &route, &sizes, anchor, Some(deadline))?;
        }

        // 最晚开始早于计划下限，或实际完工晚于需求时刻，均视为反向不足
        if let Some(completion) = route_completion(&placements) {
            if completion > deadline || latest_start < floor {
                warn!(
                    product_id = %product.product_id,
                    required_by = %required_by,
                    completion = %completion,
                    latest_start = %latest_start,
                    floor = %floor,
                    "半成品无法在需求时刻前完工"
                );
                ctx.warn(CascadeWarning::BackwardShortfall {
                    product_id: product.product_id.clone(),
                    required_by,
                    projected_completion: completion,
                    bom_path: ctx.bom_path().to_vec(),
                });
            }
        }

        let origin = RowOrigin {
            product_id: product.product_id.clone(),
            cascade_level: depth as i32,
            cascade_type: CascadeType::BackwardPp,
            cascade_source_id: Some(source_id),
        };
        let rows_by_step = self.commit_route(ctx, &origin, &placements)?;

        info!(
            product_id = %product.product_id,
            depth,
            quantity,
            batches = sizes.len(),
            anchor = %anchor,
            "反向排程完成"
        );

        self.explode_bom(ctx, &product.product_id, quantity, &rows_by_step, depth + 1)
    }
}
