// ==========================================
// 生产级联排产引擎 - 配置层
// ==========================================
// 依据: 级联排产设计 - 9. 配置项
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod cascade_config_trait;
pub mod config_manager;

// 重导出核心配置管理器
pub use cascade_config_trait::{CascadeConfigReader, ConfigResult};
pub use config_manager::{config_keys, get_default_db_path, ConfigManager, DB_PATH_ENV};
