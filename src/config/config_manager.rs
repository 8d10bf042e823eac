// ==========================================
// 生产级联排产引擎 - 配置管理器
// ==========================================
// 依据: 级联排产设计 - 9. 配置项
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::cascade_config_trait::{CascadeConfigReader, ConfigResult};
use crate::db::open_sqlite_connection;
use crate::domain::InsertionPolicy;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "CASCADE_APS_DB_PATH";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取 global scope 的配置值（公开方法，供 CLI 复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置（按键排序）
    pub fn list_global_config(&self) -> ConfigResult<BTreeMap<String, String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        Ok(config_map)
    }

    /// 读取并解析配置值，缺失或格式错误时回退默认值
    fn get_parsed_or_default<T>(
        &self,
        key: &str,
        default: T,
        valid: impl Fn(&T) -> bool,
    ) -> ConfigResult<T>
    where
        T: FromStr + Copy + std::fmt::Debug,
    {
        let raw = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };

        match raw.trim().parse::<T>() {
            Ok(v) if valid(&v) => Ok(v),
            _ => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = ?default,
                    "配置值无效，使用默认值"
                );
                Ok(default)
            }
        }
    }
}

// ==========================================
// CascadeConfigReader Trait 实现
// ==========================================
#[async_trait]
impl CascadeConfigReader for ConfigManager {
    async fn get_max_cascade_depth(&self) -> ConfigResult<u32> {
        self.get_parsed_or_default(config_keys::CASCADE_MAX_DEPTH, 10, |v| *v >= 1)
    }

    async fn get_backward_anchor_iterations(&self) -> ConfigResult<u32> {
        self.get_parsed_or_default(config_keys::BACKWARD_ANCHOR_ITERATIONS, 8, |v| *v >= 1)
    }

    async fn get_shift_start_hour(&self) -> ConfigResult<u32> {
        self.get_parsed_or_default(config_keys::SHIFT_START_HOUR, 6, |v| *v <= 23)
    }

    async fn get_shift_hours(&self) -> ConfigResult<f64> {
        self.get_parsed_or_default(config_keys::SHIFT_HOURS, 8.0, |v| *v > 0.0 && *v <= 24.0)
    }

    async fn get_shifts_per_day(&self) -> ConfigResult<u32> {
        self.get_parsed_or_default(config_keys::SHIFTS_PER_DAY, 3, |v| (1..=24).contains(v))
    }

    async fn get_max_batch_hours_per_shift(&self) -> ConfigResult<Option<f64>> {
        let raw = match self.get_config_value(config_keys::MAX_BATCH_HOURS_PER_SHIFT)? {
            Some(v) if !v.trim().is_empty() => v,
            _ => return Ok(None),
        };
        match raw.trim().parse::<f64>() {
            Ok(v) if v > 0.0 => Ok(Some(v)),
            _ => {
                tracing::warn!(
                    config_key = config_keys::MAX_BATCH_HOURS_PER_SHIFT,
                    raw_value = %raw,
                    "单批时长上限配置无效，视为未设置"
                );
                Ok(None)
            }
        }
    }

    async fn get_min_batch_minutes(&self) -> ConfigResult<f64> {
        self.get_parsed_or_default(config_keys::MIN_BATCH_MINUTES, 0.0, |v| *v >= 0.0)
    }

    async fn get_horizon_days(&self) -> ConfigResult<i64> {
        self.get_parsed_or_default(config_keys::CASCADE_HORIZON_DAYS, 60, |v| *v >= 1)
    }

    async fn get_insertion_policy(&self) -> ConfigResult<InsertionPolicy> {
        let raw = match self.get_config_value(config_keys::INSERTION_POLICY)? {
            Some(v) => v,
            None => return Ok(InsertionPolicy::Append),
        };
        Ok(InsertionPolicy::from_db_str(&raw).unwrap_or_else(|| {
            tracing::warn!(
                config_key = config_keys::INSERTION_POLICY,
                raw_value = %raw,
                "插单策略配置无效，使用 APPEND"
            );
            InsertionPolicy::Append
        }))
    }

    async fn get_hybrid_max_candidates(&self) -> ConfigResult<usize> {
        self.get_parsed_or_default(config_keys::HYBRID_MAX_CANDIDATES, 6, |v| *v >= 1)
    }

    async fn get_max_conflict_retries(&self) -> ConfigResult<u32> {
        self.get_parsed_or_default(config_keys::MAX_CONFLICT_RETRIES, 3, |_| true)
    }
}

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 CASCADE_APS_DB_PATH（非空时）
/// - 否则: 用户数据目录/cascade-aps/cascade_aps.db
/// - 无法获取用户数据目录时: ./cascade_aps.db
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./cascade_aps.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("cascade-aps");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("cascade_aps.db");
        }
    }

    path.to_string_lossy().to_string()
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // BOM 展开
    pub const CASCADE_MAX_DEPTH: &str = "cascade_max_depth";
    pub const BACKWARD_ANCHOR_ITERATIONS: &str = "backward_anchor_iterations";

    // 班次日历
    pub const SHIFT_START_HOUR: &str = "shift_start_hour";
    pub const SHIFT_HOURS: &str = "shift_hours";
    pub const SHIFTS_PER_DAY: &str = "shifts_per_day";

    // 批次
    pub const MAX_BATCH_HOURS_PER_SHIFT: &str = "max_batch_hours_per_shift";
    pub const MIN_BATCH_MINUTES: &str = "min_batch_minutes";

    // 放置
    pub const CASCADE_HORIZON_DAYS: &str = "cascade_horizon_days";
    pub const INSERTION_POLICY: &str = "insertion_policy"; // APPEND | FILL_GAPS
    pub const HYBRID_MAX_CANDIDATES: &str = "hybrid_max_candidates";

    // 并发
    pub const MAX_CONFLICT_RETRIES: &str = "max_conflict_retries";

    /// CLI 可写入的全部键
    pub const ALL: &[&str] = &[
        CASCADE_MAX_DEPTH,
        BACKWARD_ANCHOR_ITERATIONS,
        SHIFT_START_HOUR,
        SHIFT_HOURS,
        SHIFTS_PER_DAY,
        MAX_BATCH_HOURS_PER_SHIFT,
        MIN_BATCH_MINUTES,
        CASCADE_HORIZON_DAYS,
        INSERTION_POLICY,
        HYBRID_MAX_CANDIDATES,
        MAX_CONFLICT_RETRIES,
    ];
}
