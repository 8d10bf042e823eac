// ==========================================
// 生产级联排产引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供建库脚本（参考数据 / 周计划 / 排程 / 配置）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_scope (
    scope_id TEXT PRIMARY KEY,
    scope_type TEXT NOT NULL,
    scope_key TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(scope_type, scope_key)
);

INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
VALUES ('global', 'GLOBAL', 'global');

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

-- ===== 参考数据 =====
CREATE TABLE IF NOT EXISTS product (
    product_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    lote_minimo INTEGER NOT NULL,
    max_batch_size INTEGER
);

CREATE TABLE IF NOT EXISTS operation (
    operation_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    display_order INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS work_center (
    work_center_id TEXT PRIMARY KEY,
    code TEXT NOT NULL,
    capacity_mode TEXT NOT NULL DEFAULT 'BY_UNITS',
    max_parallel_batches INTEGER NOT NULL DEFAULT 1,
    is_terminal INTEGER NOT NULL DEFAULT 0,
    allows_parallel_references INTEGER NOT NULL DEFAULT 0,
    location_id TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS production_route (
    product_id TEXT NOT NULL REFERENCES product(product_id),
    operation_id TEXT NOT NULL REFERENCES operation(operation_id),
    work_center_id TEXT NOT NULL REFERENCES work_center(work_center_id),
    sequence_order INTEGER NOT NULL,
    rest_hours_after REAL NOT NULL DEFAULT 0,
    PRIMARY KEY (product_id, sequence_order)
);

CREATE TABLE IF NOT EXISTS bill_of_materials (
    product_id TEXT NOT NULL REFERENCES product(product_id),
    material_id TEXT NOT NULL,
    operation_id TEXT NOT NULL,
    quantity_per_unit REAL NOT NULL,
    rest_hours_before_use REAL NOT NULL DEFAULT 0,
    PRIMARY KEY (product_id, material_id, operation_id)
);

CREATE TABLE IF NOT EXISTS productivity (
    product_id TEXT NOT NULL REFERENCES product(product_id),
    operation_id TEXT NOT NULL,
    work_center_id TEXT NOT NULL REFERENCES work_center(work_center_id),
    units_per_hour REAL,
    fixed_minutes_per_batch REAL,
    uses_fixed_time INTEGER NOT NULL DEFAULT 0,
    labor_minutes_per_batch REAL,
    reference_staff INTEGER,
    PRIMARY KEY (product_id, operation_id, work_center_id)
);

CREATE TABLE IF NOT EXISTS staffing (
    work_center_id TEXT NOT NULL REFERENCES work_center(work_center_id),
    shift_date TEXT NOT NULL,
    shift_number INTEGER NOT NULL,
    staff_count INTEGER NOT NULL,
    PRIMARY KEY (work_center_id, shift_date, shift_number)
);

CREATE TABLE IF NOT EXISTS blackout_window (
    blackout_id INTEGER PRIMARY KEY AUTOINCREMENT,
    work_center_id TEXT NOT NULL REFERENCES work_center(work_center_id),
    shift_date TEXT NOT NULL,
    shift_number INTEGER NOT NULL,
    reason TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_blackout_wc_date
    ON blackout_window(work_center_id, shift_date);

-- ===== 周计划 / 排程 =====
CREATE TABLE IF NOT EXISTS weekly_plan (
    weekly_plan_id TEXT PRIMARY KEY,
    week_start TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS production_schedule (
    schedule_id TEXT PRIMARY KEY,
    product_id TEXT NOT NULL REFERENCES product(product_id),
    operation_id TEXT NOT NULL,
    work_center_id TEXT NOT NULL REFERENCES work_center(work_center_id),
    resource_id TEXT NOT NULL,
    start_datetime TEXT NOT NULL,
    end_datetime TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    batch_number INTEGER NOT NULL,
    total_batches_in_run INTEGER NOT NULL,
    cascade_level INTEGER NOT NULL DEFAULT 0,
    cascade_type TEXT NOT NULL,
    cascade_source_id TEXT,
    production_order_number TEXT NOT NULL,
    weekly_plan_id TEXT REFERENCES weekly_plan(weekly_plan_id) ON DELETE SET NULL,
    status TEXT NOT NULL DEFAULT 'PLANNED',
    created_at TEXT NOT NULL,
    CHECK (end_datetime >= start_datetime)
);

CREATE INDEX IF NOT EXISTS idx_schedule_wc_start
    ON production_schedule(work_center_id, start_datetime);
CREATE INDEX IF NOT EXISTS idx_schedule_order
    ON production_schedule(production_order_number);
"#;

/// 初始化数据库 schema（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 检查 schema 版本，不一致时只告警
pub fn check_schema_version(conn: &Connection) -> rusqlite::Result<()> {
    match read_schema_version(conn)? {
        Some(v) if v == CURRENT_SCHEMA_VERSION => {}
        Some(v) => tracing::warn!(
            found = v,
            expected = CURRENT_SCHEMA_VERSION,
            "数据库 schema_version 与程序不一致"
        ),
        None => tracing::warn!("数据库缺少 schema_version 表，请先执行 init"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_missing_schema_version_table() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }
}
