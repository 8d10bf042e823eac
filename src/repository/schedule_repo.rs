// ==========================================
// 生产级联排产引擎 - 排程数据仓储
// ==========================================
// 依据: 级联排产设计 - 4.6 Schedule Writer / 5. 乐观并发控制
// 红线: 一次运行的全部行在同一事务中写入，写入前重新校验重叠
// 红线: 只追加，不更新已有行
// ==========================================

use crate::domain::{CascadeType, ProductionSchedule, ScheduleStatus};
use crate::engine::provider::ScheduleStore;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{format_datetime, get_datetime, get_enum};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

const SCHEDULE_COLUMNS: &str = r#"
    schedule_id, product_id, operation_id, work_center_id, resource_id,
    start_datetime, end_datetime, quantity, batch_number, total_batches_in_run,
    cascade_level, cascade_type, cascade_source_id, production_order_number,
    weekly_plan_id, status, created_at
"#;

/// 生产订单汇总（CLI 展示用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionOrderSummary {
    pub production_order_number: String,
    pub rows: i64,
    pub max_level: i32,
    pub first_start: NaiveDateTime,
    pub last_end: NaiveDateTime,
}

// ==========================================
// ProductionScheduleRepository - 排程仓储
// ==========================================
pub struct ProductionScheduleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionScheduleRepository {
    /// 创建新的排程仓储实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 映射数据库行到 ProductionSchedule
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ProductionSchedule> {
        Ok(ProductionSchedule {
            schedule_id: row.get(0)?,
            product_id: row.get(1)?,
            operation_id: row.get(2)?,
            work_center_id: row.get(3)?,
            resource_id: row.get(4)?,
            start_datetime: get_datetime(row, 5)?,
            end_datetime: get_datetime(row, 6)?,
            quantity: row.get(7)?,
            batch_number: row.get(8)?,
            total_batches_in_run: row.get(9)?,
            cascade_level: row.get(10)?,
            cascade_type: get_enum(row, 11, CascadeType::from_db_str)?,
            cascade_source_id: row.get(12)?,
            production_order_number: row.get(13)?,
            weekly_plan_id: row.get(14)?,
            status: get_enum(row, 15, ScheduleStatus::from_db_str)?,
            created_at: get_datetime(row, 16)?,
        })
    }

    /// 查询单行
    pub fn find_by_id(&self, schedule_id: &str) -> RepositoryResult<Option<ProductionSchedule>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM production_schedule WHERE schedule_id = ?1",
            SCHEDULE_COLUMNS
        );
        let row = conn
            .query_row(&sql, params![schedule_id], Self::map_row)
            .optional()?;
        Ok(row)
    }

    /// 统计全部排程行数
    pub fn count_all(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM production_schedule", [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    /// 按生产订单汇总
    pub fn summarize_orders(&self) -> RepositoryResult<Vec<ProductionOrderSummary>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT production_order_number, COUNT(*), MAX(cascade_level),
                   MIN(start_datetime), MAX(end_datetime)
            FROM production_schedule
            GROUP BY production_order_number
            ORDER BY MIN(start_datetime)
            "#,
        )?;
        let summaries = stmt
            .query_map([], |row| {
                Ok(ProductionOrderSummary {
                    production_order_number: row.get(0)?,
                    rows: row.get(1)?,
                    max_level: row.get(2)?,
                    first_start: get_datetime(row, 3)?,
                    last_end: get_datetime(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }
}

impl ScheduleStore for ProductionScheduleRepository {
    fn get_existing_schedule(
        &self,
        work_center_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> RepositoryResult<Vec<ProductionSchedule>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM production_schedule
            WHERE work_center_id = ?1
              AND start_datetime < ?2
              AND end_datetime > ?3
            ORDER BY start_datetime
            "#,
            SCHEDULE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![work_center_id, format_datetime(to), format_datetime(from)],
                Self::map_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 原子写入（BEGIN IMMEDIATE，写锁内重新校验重叠）
    fn insert_schedules(&self, rows: &[ProductionSchedule]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        {
            let mut overlap_stmt = tx.prepare(
                r#"
                SELECT s.schedule_id, s.start_datetime, s.end_datetime
                FROM production_schedule s
                JOIN work_center w ON w.work_center_id = s.work_center_id
                WHERE s.work_center_id = ?1
                  AND s.production_order_number <> ?2
                  AND s.start_datetime < ?3
                  AND s.end_datetime > ?4
                  AND s.status NOT IN ('PARKED', 'CANCELLED')
                  AND (w.allows_parallel_references = 0 OR s.product_id = ?5)
                LIMIT 1
                "#,
            )?;
            let insert_sql = format!(
                r#"
                INSERT INTO production_schedule ({})
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                "#,
                SCHEDULE_COLUMNS
            );
            let mut insert_stmt = tx.prepare(&insert_sql)?;

            for row in rows {
                let start = format_datetime(row.start_datetime);
                let end = format_datetime(row.end_datetime);

                let conflict: Option<(String, String, String)> = overlap_stmt
                    .query_row(
                        params![
                            row.work_center_id,
                            row.production_order_number,
                            end,
                            start,
                            row.product_id
                        ],
                        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                    )
                    .optional()?;

                if let Some((existing_id, existing_start, existing_end)) = conflict {
                    warn!(
                        work_center_id = %row.work_center_id,
                        existing_id = %existing_id,
                        "写入前校验发现重叠排程，回滚"
                    );
                    // tx 未提交，drop 时自动回滚
                    return Err(RepositoryError::ScheduleConflict {
                        work_center_id: row.work_center_id.clone(),
                        message: format!(
                            "与已有排程重叠: existing={} [{} - {}], new=[{} - {}]",
                            existing_id, existing_start, existing_end, start, end
                        ),
                    });
                }

                insert_stmt.execute(params![
                    row.schedule_id,
                    row.product_id,
                    row.operation_id,
                    row.work_center_id,
                    row.resource_id,
                    start,
                    end,
                    row.quantity,
                    row.batch_number,
                    row.total_batches_in_run,
                    row.cascade_level,
                    row.cascade_type.to_db_str(),
                    row.cascade_source_id,
                    row.production_order_number,
                    row.weekly_plan_id,
                    row.status.to_db_str(),
                    format_datetime(row.created_at),
                ])?;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        debug!(rows = rows.len(), "排程行已提交");
        Ok(rows.len())
    }

    fn delete_by_order_number(&self, production_order_number: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM production_schedule WHERE production_order_number = ?1",
            params![production_order_number],
        )?;
        Ok(deleted)
    }

    fn find_by_order_number(
        &self,
        production_order_number: &str,
    ) -> RepositoryResult<Vec<ProductionSchedule>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM production_schedule
            WHERE production_order_number = ?1
            ORDER BY cascade_level, start_datetime, batch_number
            "#,
            SCHEDULE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![production_order_number], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
