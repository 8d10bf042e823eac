// ==========================================
// 生产级联排产引擎 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换引擎/仓储错误为用户可读的错误消息
// 红线: 致命错误必须带出原因与 BOM 路径
// ==========================================

use crate::engine::CascadeError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 请求/参考数据错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("缺少参考数据: {0}")]
    MissingReferenceData(String),

    #[error("BOM 结构错误: {0}")]
    CyclicBom(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    /// 重试耗尽后仍与其他订单的排程冲突
    #[error("排程冲突（已重试 {attempts} 次）: {message}")]
    SchedulingConflict { attempts: u32, message: String },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::ScheduleConflict {
                work_center_id,
                message,
            } => ApiError::SchedulingConflict {
                attempts: 0,
                message: format!("work_center={}, {}", work_center_id, message),
            },
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 CascadeError 转换
// ==========================================
impl From<CascadeError> for ApiError {
    fn from(err: CascadeError) -> Self {
        match err {
            CascadeError::InvalidInput { .. } => ApiError::InvalidInput(err.to_string()),
            CascadeError::MissingReferenceData { .. }
            | CascadeError::MissingProductivityData { .. } => {
                ApiError::MissingReferenceData(err.to_string())
            }
            CascadeError::CyclicBom { .. } => ApiError::CyclicBom(err.to_string()),
            CascadeError::SchedulingConflict { .. } => ApiError::SchedulingConflict {
                attempts: 0,
                message: err.to_string(),
            },
            CascadeError::Repository(repo) => repo.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
