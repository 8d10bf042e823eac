// ==========================================
// 生产级联排产引擎 - 级联配置读取 Trait
// ==========================================
// 依据: 级联排产设计 - 9. 配置项
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::InsertionPolicy;
use crate::engine::CascadeConfig;
use async_trait::async_trait;
use std::error::Error;

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// CascadeConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
// 约定: 缺失或格式错误的值回退到默认值
#[async_trait]
pub trait CascadeConfigReader: Send + Sync {
    // ===== BOM 展开 =====

    /// 最大级联深度（默认 10）
    async fn get_max_cascade_depth(&self) -> ConfigResult<u32>;

    /// 反向锚定最大迭代次数（默认 8）
    async fn get_backward_anchor_iterations(&self) -> ConfigResult<u32>;

    // ===== 班次日历 =====

    /// 首班开始小时（默认 6）
    async fn get_shift_start_hour(&self) -> ConfigResult<u32>;

    /// 班次时长，小时（默认 8）
    async fn get_shift_hours(&self) -> ConfigResult<f64>;

    /// 每日班次数（默认 3）
    async fn get_shifts_per_day(&self) -> ConfigResult<u32>;

    // ===== 批次 =====

    /// 单批时长上限，小时（默认不设）
    async fn get_max_batch_hours_per_shift(&self) -> ConfigResult<Option<f64>>;

    /// 最小批次时长，分钟（默认 0）
    async fn get_min_batch_minutes(&self) -> ConfigResult<f64>;

    // ===== 放置 =====

    /// 快照窗口天数（默认 60）
    async fn get_horizon_days(&self) -> ConfigResult<i64>;

    /// 插单策略（默认 APPEND）
    async fn get_insertion_policy(&self) -> ConfigResult<InsertionPolicy>;

    /// 混合分配候选工作中心上限（默认 6）
    async fn get_hybrid_max_candidates(&self) -> ConfigResult<usize>;

    /// 写入冲突后整体重跑次数（默认 3）
    async fn get_max_conflict_retries(&self) -> ConfigResult<u32>;

    /// 汇总为引擎配置
    async fn load_cascade_config(&self) -> ConfigResult<CascadeConfig> {
        Ok(CascadeConfig {
            max_cascade_depth: self.get_max_cascade_depth().await?,
            shift_start_hour: self.get_shift_start_hour().await?,
            shift_hours: self.get_shift_hours().await?,
            shifts_per_day: self.get_shifts_per_day().await?,
            max_batch_hours_per_shift: self.get_max_batch_hours_per_shift().await?,
            min_batch_minutes: self.get_min_batch_minutes().await?,
            horizon_days: self.get_horizon_days().await?,
            insertion_policy: self.get_insertion_policy().await?,
            max_conflict_retries: self.get_max_conflict_retries().await?,
            hybrid_max_candidates: self.get_hybrid_max_candidates().await?,
            backward_anchor_iterations: self.get_backward_anchor_iterations().await?,
        })
    }
}
