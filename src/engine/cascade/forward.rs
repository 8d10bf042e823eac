// ==========================================
// 生产级联排产引擎 - 正向排程 (顶层产品)
// ==========================================
// 依据: 级联排产设计 - 4.4 Cascade Engine forward pass
// ==========================================

use super::context::{CascadeContext, RowOrigin};
use super::core::CascadeEngine;
use super::types::{CascadeRequest, CascadeWarning};
use crate::domain::CascadeType;
use crate::engine::error::{CascadeError, CascadeResult};
use crate::engine::provider::{ReferenceDataProvider, ScheduleStore};
use tracing::{info, warn};

impl<R, S> CascadeEngine<R, S>
where
    R: ReferenceDataProvider + ?Sized,
    S: ScheduleStore + ?Sized,
{
    /// 正向排程：顶层产品沿工艺路线放置，然后展开 BOM
    pub(super) fn forward(
        &self,
        ctx: &mut CascadeContext,
        request: &CascadeRequest,
    ) -> CascadeResult<()> {
        ctx.enter(&request.product_id);
        let result = self
            .forward_inner(ctx, request)
            .map_err(|e| e.with_path(ctx.bom_path()));
        ctx.leave();
        result
    }

    fn forward_inner(&self, ctx: &mut CascadeContext, request: &CascadeRequest) -> CascadeResult<()> {
        let product = self
            .refs
            .get_product(&request.product_id)?
            .ok_or_else(|| {
                CascadeError::invalid_input(format!("未知产品: {}", request.product_id))
            })?;
        if !product.kind.is_produced() {
            return Err(CascadeError::invalid_input(format!(
                "外购原料不能排产: {}",
                product.product_id
            )));
        }

        let route = self.load_route(&product.product_id)?;
        let sizes = self.split_batches(ctx, &product, request.quantity)?;

        let placements = self.plan_route(
            ctx,
            &product.product_id,
            &route,
            &sizes,
            request.start,
            request.deadline,
        )?;

        if let (Some(deadline), Some(last)) = (request.deadline, placements.last()) {
            if last.completion > deadline {
                warn!(
                    product_id = %product.product_id,
                    deadline = %deadline,
                    completion = %last.completion,
                    "交期不可行，采用最快方案"
                );
                ctx.warn(CascadeWarning::DeadlineInfeasible {
                    product_id: product.product_id.clone(),
                    operation_id: last.operation_id.clone(),
                    deadline,
                    projected_completion: last.completion,
                });
            }
        }

        let origin = RowOrigin {
            product_id: product.product_id.clone(),
            cascade_level: 0,
            cascade_type: CascadeType::Forward,
            cascade_source_id: None,
        };
        let rows_by_step = self.commit_route(ctx, &origin, &placements)?;

        info!(
            product_id = %product.product_id,
            batches = sizes.len(),
            steps = route.len(),
            hybrid_steps = placements.iter().filter(|p| p.hybrid).count(),
            "正向排程完成"
        );

        self.explode_bom(ctx, &product.product_id, request.quantity, &rows_by_step, 1)
    }
}
