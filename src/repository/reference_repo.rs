// ==========================================
// 生产级联排产引擎 - 参考数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 产品 / 工序 / 工作中心 / 工艺路线 / BOM / 生产效率 / 排班 / 停机窗口
// 说明: 读取接口实现 engine::provider::ReferenceDataProvider，写入接口用于维护与测试
// ==========================================

use crate::domain::{
    BlackoutWindow, BomLine, CapacityMode, Operation, Product, ProductKind, ProductivityRecord,
    RouteStep, StaffingRecord, WorkCenter,
};
use crate::engine::provider::ReferenceDataProvider;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{format_date, get_date, get_enum};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

// ==========================================
// ReferenceDataRepository - 参考数据仓储
// ==========================================
pub struct ReferenceDataRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReferenceDataRepository {
    /// 创建新的参考数据仓储实例
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

    // ==========================================
    // 写入（维护 / 测试数据）
    // ==========================================

    pub fn upsert_product(&self, product: &Product) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        write_product(&conn, product)
    }

    pub fn upsert_operation(&self, operation: &Operation) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        write_operation(&conn, operation)
    }

    pub fn upsert_work_center(&self, wc: &WorkCenter) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        write_work_center(&conn, wc)
    }

    pub fn upsert_route_step(&self, step: &RouteStep) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        write_route_step(&conn, step)
    }

    pub fn upsert_bom_line(&self, line: &BomLine) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        write_bom_line(&conn, line)
    }

    pub fn upsert_productivity(&self, record: &ProductivityRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        write_productivity(&conn, record)
    }

    pub fn upsert_staffing(&self, record: &StaffingRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        write_staffing(&conn, record)
    }

    pub fn insert_blackout(&self, window: &BlackoutWindow) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        write_blackout(&conn, window)?;
        Ok(conn.last_insert_rowid())
    }

    /// 整包导入参考数据（单事务，任一行失败则全部回滚）
    ///
    /// # 返回
    /// - 写入的行数
    pub fn import_bundle(&self, bundle: &ReferenceDataBundle) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        for p in &bundle.products {
            write_product(&tx, p)?;
        }
        for o in &bundle.operations {
            write_operation(&tx, o)?;
        }
        for wc in &bundle.work_centers {
            write_work_center(&tx, wc)?;
        }
        for step in &bundle.routes {
            write_route_step(&tx, step)?;
        }
        for line in &bundle.bom {
            write_bom_line(&tx, line)?;
        }
        for record in &bundle.productivity {
            write_productivity(&tx, record)?;
        }
        for record in &bundle.staffing {
            write_staffing(&tx, record)?;
        }
        for window in &bundle.blackouts {
            write_blackout(&tx, window)?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(bundle.len())
    }

    /// 查询全部产品
    pub fn list_products(&self) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT product_id, name, kind, lote_minimo, max_batch_size FROM product ORDER BY product_id",
        )?;
        let products = stmt
            .query_map([], map_product)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }
}

// ==========================================
// 写入 SQL
// ==========================================

fn write_product(conn: &Connection, product: &Product) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT OR REPLACE INTO product (product_id, name, kind, lote_minimo, max_batch_size)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            product.product_id,
            product.name,
            product.kind.to_db_str(),
            product.lote_minimo,
            product.max_batch_size,
        ],
    )?;
    Ok(())
}

fn write_operation(conn: &Connection, operation: &Operation) -> RepositoryResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO operation (operation_id, name, display_order) VALUES (?1, ?2, ?3)",
        params![operation.operation_id, operation.name, operation.display_order],
    )?;
    Ok(())
}

fn write_work_center(conn: &Connection, wc: &WorkCenter) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT OR REPLACE INTO work_center (
            work_center_id, code, capacity_mode, max_parallel_batches,
            is_terminal, allows_parallel_references, location_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            wc.work_center_id,
            wc.code,
            wc.capacity_mode.to_db_str(),
            wc.max_parallel_batches,
            wc.is_terminal,
            wc.allows_parallel_references,
            wc.location_id,
        ],
    )?;
    Ok(())
}

fn write_route_step(conn: &Connection, step: &RouteStep) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT OR REPLACE INTO production_route (
            product_id, operation_id, work_center_id, sequence_order, rest_hours_after
        ) VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            step.product_id,
            step.operation_id,
            step.work_center_id,
            step.sequence_order,
            step.rest_hours_after,
        ],
    )?;
    Ok(())
}

fn write_bom_line(conn: &Connection, line: &BomLine) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT OR REPLACE INTO bill_of_materials (
            product_id, material_id, operation_id, quantity_per_unit, rest_hours_before_use
        ) VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            line.product_id,
            line.material_id,
            line.operation_id,
            line.quantity_per_unit,
            line.rest_hours_before_use,
        ],
    )?;
    Ok(())
}

fn write_productivity(conn: &Connection, record: &ProductivityRecord) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT OR REPLACE INTO productivity (
            product_id, operation_id, work_center_id, units_per_hour,
            fixed_minutes_per_batch, uses_fixed_time, labor_minutes_per_batch, reference_staff
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            record.product_id,
            record.operation_id,
            record.work_center_id,
            record.units_per_hour,
            record.fixed_minutes_per_batch,
            record.uses_fixed_time,
            record.labor_minutes_per_batch,
            record.reference_staff,
        ],
    )?;
    Ok(())
}

fn write_staffing(conn: &Connection, record: &StaffingRecord) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT OR REPLACE INTO staffing (work_center_id, shift_date, shift_number, staff_count)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![
            record.work_center_id,
            format_date(record.date),
            record.shift_number,
            record.staff_count,
        ],
    )?;
    Ok(())
}

fn write_blackout(conn: &Connection, window: &BlackoutWindow) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO blackout_window (work_center_id, shift_date, shift_number, reason)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![
            window.work_center_id,
            format_date(window.date),
            window.shift_number,
            window.reason,
        ],
    )?;
    Ok(())
}

// ==========================================
// ReferenceDataBundle - 参考数据整包 (JSON)
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceDataBundle {
    pub products: Vec<Product>,
    pub operations: Vec<Operation>,
    pub work_centers: Vec<WorkCenter>,
    pub routes: Vec<RouteStep>,
    pub bom: Vec<BomLine>,
    pub productivity: Vec<ProductivityRecord>,
    pub staffing: Vec<StaffingRecord>,
    pub blackouts: Vec<BlackoutWindow>,
}

impl ReferenceDataBundle {
    pub fn len(&self) -> usize {
        self.products.len()
            + self.operations.len()
            + self.work_centers.len()
            + self.routes.len()
            + self.bom.len()
            + self.productivity.len()
            + self.staffing.len()
            + self.blackouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ==========================================
// 行映射
// ==========================================

fn map_product(row: &rusqlite::Row) -> rusqlite::Result<Product> {
    Ok(Product {
        product_id: row.get(0)?,
        name: row.get(1)?,
        kind: get_enum(row, 2, ProductKind::from_db_str)?,
        lote_minimo: row.get(3)?,
        max_batch_size: row.get(4)?,
    })
}

fn map_productivity(row: &rusqlite::Row) -> rusqlite::Result<ProductivityRecord> {
    Ok(ProductivityRecord {
        product_id: row.get(0)?,
        operation_id: row.get(1)?,
        work_center_id: row.get(2)?,
        units_per_hour: row.get(3)?,
        fixed_minutes_per_batch: row.get(4)?,
        uses_fixed_time: row.get(5)?,
        labor_minutes_per_batch: row.get(6)?,
        reference_staff: row.get(7)?,
    })
}

const PRODUCTIVITY_COLUMNS: &str = r#"
    product_id, operation_id, work_center_id, units_per_hour,
    fixed_minutes_per_batch, uses_fixed_time, labor_minutes_per_batch, reference_staff
"#;

impl ReferenceDataProvider for ReferenceDataRepository {
    fn get_product(&self, product_id: &str) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        let product = conn
            .query_row(
                "SELECT product_id, name, kind, lote_minimo, max_batch_size FROM product WHERE product_id = ?1",
                params![product_id],
                map_product,
            )
            .optional()?;
        Ok(product)
    }

    fn get_work_center(&self, work_center_id: &str) -> RepositoryResult<Option<WorkCenter>> {
        let conn = self.get_conn()?;
        let wc = conn
            .query_row(
                r#"
                SELECT work_center_id, code, capacity_mode, max_parallel_batches,
                       is_terminal, allows_parallel_references, location_id
                FROM work_center
                WHERE work_center_id = ?1
                "#,
                params![work_center_id],
                |row| {
                    Ok(WorkCenter {
                        work_center_id: row.get(0)?,
                        code: row.get(1)?,
                        capacity_mode: get_enum(row, 2, CapacityMode::from_db_str)?,
                        max_parallel_batches: row.get(3)?,
                        is_terminal: row.get(4)?,
                        allows_parallel_references: row.get(5)?,
                        location_id: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(wc)
    }

    fn get_route(&self, product_id: &str) -> RepositoryResult<Vec<RouteStep>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT product_id, operation_id, work_center_id, sequence_order, rest_hours_after
            FROM production_route
            WHERE product_id = ?1
            ORDER BY sequence_order
            "#,
        )?;
        let steps = stmt
            .query_map(params![product_id], |row| {
                Ok(RouteStep {
                    product_id: row.get(0)?,
                    operation_id: row.get(1)?,
                    work_center_id: row.get(2)?,
                    sequence_order: row.get(3)?,
                    rest_hours_after: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(steps)
    }

    fn get_bom(&self, product_id: &str) -> RepositoryResult<Vec<BomLine>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT product_id, material_id, operation_id, quantity_per_unit, rest_hours_before_use
            FROM bill_of_materials
            WHERE product_id = ?1
            ORDER BY material_id
            "#,
        )?;
        let lines = stmt
            .query_map(params![product_id], |row| {
                Ok(BomLine {
                    product_id: row.get(0)?,
                    material_id: row.get(1)?,
                    operation_id: row.get(2)?,
                    quantity_per_unit: row.get(3)?,
                    rest_hours_before_use: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines)
    }

    fn get_productivity(
        &self,
        product_id: &str,
        operation_id: &str,
        work_center_id: &str,
    ) -> RepositoryResult<Option<ProductivityRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM productivity WHERE product_id = ?1 AND operation_id = ?2 AND work_center_id = ?3",
            PRODUCTIVITY_COLUMNS
        );
        let record = conn
            .query_row(
                &sql,
                params![product_id, operation_id, work_center_id],
                map_productivity,
            )
            .optional()?;
        Ok(record)
    }

    fn get_productivity_options(
        &self,
        product_id: &str,
        operation_id: &str,
    ) -> RepositoryResult<Vec<ProductivityRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM productivity WHERE product_id = ?1 AND operation_id = ?2 ORDER BY work_center_id",
            PRODUCTIVITY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![product_id, operation_id], map_productivity)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn get_staffing(
        &self,
        work_center_id: &str,
        date: NaiveDate,
        shift_number: i32,
    ) -> RepositoryResult<Option<i32>> {
        let conn = self.get_conn()?;
        let staff = conn
            .query_row(
                r#"
                SELECT staff_count FROM staffing
                WHERE work_center_id = ?1 AND shift_date = ?2 AND shift_number = ?3
                "#,
                params![work_center_id, format_date(date), shift_number],
                |row| row.get(0),
            )
            .optional()?;
        Ok(staff)
    }

    fn get_blackouts(
        &self,
        work_center_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<BlackoutWindow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT work_center_id, shift_date, shift_number, reason
            FROM blackout_window
            WHERE work_center_id = ?1 AND shift_date BETWEEN ?2 AND ?3
            ORDER BY shift_date, shift_number
            "#,
        )?;
        let windows = stmt
            .query_map(
                params![work_center_id, format_date(from), format_date(to)],
                |row| {
                    Ok(BlackoutWindow {
                        work_center_id: row.get(0)?,
                        date: get_date(row, 1)?,
                        shift_number: row.get(2)?,
                        reason: row.get(3)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(windows)
    }
}
