// ==========================================
// 生产级联排产引擎 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享连接、仓储与 API 实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::CascadeApi;
use crate::config::ConfigManager;
use crate::db::{check_schema_version, init_schema, open_sqlite_connection};
use crate::repository::{ProductionScheduleRepository, ReferenceDataRepository, WeeklyPlanRepository};

/// 应用状态
///
/// 所有仓储共享同一个 SQLite 连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    pub reference_repo: Arc<ReferenceDataRepository>,
    pub schedule_repo: Arc<ProductionScheduleRepository>,
    pub weekly_plan_repo: Arc<WeeklyPlanRepository>,
    pub config_manager: Arc<ConfigManager>,

    /// 级联排产API
    pub cascade_api: Arc<CascadeApi>,
}

impl AppState {
    /// 打开数据库并装配各层
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - ensure_schema: 为 true 时先执行建库脚本（幂等）
    pub fn new(db_path: String, ensure_schema: bool) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        if ensure_schema {
            init_schema(&conn).map_err(|e| format!("建库失败: {}", e))?;
        }
        check_schema_version(&conn).map_err(|e| format!("读取schema版本失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        let reference_repo = Arc::new(ReferenceDataRepository::from_connection(conn.clone()));
        let schedule_repo = Arc::new(ProductionScheduleRepository::from_connection(conn.clone()));
        let weekly_plan_repo = Arc::new(WeeklyPlanRepository::from_connection(conn.clone()));
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        let cascade_api = Arc::new(CascadeApi::new(
            reference_repo.clone(),
            schedule_repo.clone(),
            weekly_plan_repo.clone(),
            config_manager.clone(),
        ));

        Ok(Self {
            db_path,
            reference_repo,
            schedule_repo,
            weekly_plan_repo,
            config_manager,
            cascade_api,
        })
    }
}
