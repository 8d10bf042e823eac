// ==========================================
// 生产级联排产引擎 - 周计划仓储
// ==========================================
// 职责: 周计划 CRUD（排程行的归属/报表维度）
// ==========================================

use crate::domain::WeeklyPlan;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{format_date, format_datetime, get_date, get_datetime};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct WeeklyPlanRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WeeklyPlanRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<WeeklyPlan> {
        Ok(WeeklyPlan {
            weekly_plan_id: row.get(0)?,
            week_start: get_date(row, 1)?,
            description: row.get(2)?,
            created_at: get_datetime(row, 3)?,
        })
    }

    /// 创建周计划
    ///
    /// # 错误
    /// - UniqueConstraintViolation: weekly_plan_id 已存在
    pub fn create(&self, plan: &WeeklyPlan) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO weekly_plan (weekly_plan_id, week_start, description, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                plan.weekly_plan_id,
                format_date(plan.week_start),
                plan.description,
                format_datetime(plan.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, weekly_plan_id: &str) -> RepositoryResult<Option<WeeklyPlan>> {
        let conn = self.get_conn()?;
        let plan = conn
            .query_row(
                r#"
                SELECT weekly_plan_id, week_start, description, created_at
                FROM weekly_plan WHERE weekly_plan_id = ?1
                "#,
                params![weekly_plan_id],
                Self::map_row,
            )
            .optional()?;
        Ok(plan)
    }

    /// 列出全部周计划（按周起始日倒序）
    pub fn list(&self) -> RepositoryResult<Vec<WeeklyPlan>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT weekly_plan_id, week_start, description, created_at
            FROM weekly_plan ORDER BY week_start DESC
            "#,
        )?;
        let plans = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(plans)
    }

    /// 删除周计划（关联排程行的 weekly_plan_id 置空）
    pub fn delete(&self, weekly_plan_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM weekly_plan WHERE weekly_plan_id = ?1",
            params![weekly_plan_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "WeeklyPlan".to_string(),
                id: weekly_plan_id.to_string(),
            });
        }
        Ok(())
    }
}
