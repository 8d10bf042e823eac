// ==========================================
// 生产级联排产引擎 - 引擎层错误类型
// ==========================================
// 依据: 级联排产设计 - 7. 错误处理
// 红线: 致命错误必须带出 BOM 路径，便于修正参考数据
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

fn fmt_path(path: &[String]) -> String {
    if path.is_empty() {
        "-".to_string()
    } else {
        path.join(" -> ")
    }
}

/// 级联排产错误
#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("无效输入: {message} (BOM路径: {})", fmt_path(.path))]
    InvalidInput { message: String, path: Vec<String> },

    #[error("缺少参考数据: {message} (BOM路径: {})", fmt_path(.path))]
    MissingReferenceData { message: String, path: Vec<String> },

    #[error(
        "缺少生产效率数据: product={product_id}, operation={operation_id}, work_center={work_center_id} (BOM路径: {})",
        fmt_path(.path)
    )]
    MissingProductivityData {
        product_id: String,
        operation_id: String,
        work_center_id: String,
        path: Vec<String>,
    },

    #[error("BOM 循环或超过最大深度 {max_depth}: {}", fmt_path(.path))]
    CyclicBom { max_depth: u32, path: Vec<String> },

    #[error("排程写入冲突: work_center={work_center_id}, {message}")]
    SchedulingConflict {
        work_center_id: String,
        message: String,
    },

    #[error("仓储错误: {0}")]
    Repository(#[from] RepositoryError),
}

impl CascadeError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        CascadeError::InvalidInput {
            message: message.into(),
            path: Vec::new(),
        }
    }

    pub fn missing_reference(message: impl Into<String>) -> Self {
        CascadeError::MissingReferenceData {
            message: message.into(),
            path: Vec::new(),
        }
    }

    /// 附加 BOM 路径（已有路径的错误保持不变）
    pub fn with_path(self, bom_path: &[String]) -> Self {
        match self {
            CascadeError::InvalidInput { message, path } if path.is_empty() => {
                CascadeError::InvalidInput {
                    message,
                    path: bom_path.to_vec(),
                }
            }
            CascadeError::MissingReferenceData { message, path } if path.is_empty() => {
                CascadeError::MissingReferenceData {
                    message,
                    path: bom_path.to_vec(),
                }
            }
            CascadeError::MissingProductivityData {
                product_id,
                operation_id,
                work_center_id,
                path,
            } if path.is_empty() => CascadeError::MissingProductivityData {
                product_id,
                operation_id,
                work_center_id,
                path: bom_path.to_vec(),
            },
            other => other,
        }
    }

    /// 出错时的 BOM 路径
    pub fn bom_path(&self) -> &[String] {
        match self {
            CascadeError::InvalidInput { path, .. }
            | CascadeError::MissingReferenceData { path, .. }
            | CascadeError::MissingProductivityData { path, .. }
            | CascadeError::CyclicBom { path, .. } => path,
            _ => &[],
        }
    }

    /// 是否可通过重跑整个级联恢复
    pub fn is_retryable(&self) -> bool {
        matches!(self, CascadeError::SchedulingConflict { .. })
    }
}

pub type CascadeResult<T> = Result<T, CascadeError>;
