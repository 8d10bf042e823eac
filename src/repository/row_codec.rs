// ==========================================
// 生产级联排产引擎 - 行字段编解码
// ==========================================
// 约定: 日期 "%Y-%m-%d"，时刻 "%Y-%m-%d %H:%M:%S"（工厂本地时间，文本比较即时间比较）
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;

pub const DATE_FMT: &str = "%Y-%m-%d";
pub const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_date(d: NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

pub fn format_datetime(t: NaiveDateTime) -> String {
    t.format(DATETIME_FMT).to_string()
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

/// 读取日期列
pub fn get_date(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(raw.trim(), DATE_FMT)
        .map_err(|e| conversion_error(idx, format!("日期格式错误 '{}': {}", raw, e)))
}

/// 读取时刻列（兼容 ISO 'T' 分隔）
pub fn get_datetime(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    let normalized = raw.trim().replacen('T', " ", 1);
    NaiveDateTime::parse_from_str(&normalized, DATETIME_FMT)
        .map_err(|e| conversion_error(idx, format!("时间格式错误 '{}': {}", raw, e)))
}

/// 读取枚举列
pub fn get_enum<T>(
    row: &rusqlite::Row,
    idx: usize,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| conversion_error(idx, format!("未知枚举值: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_datetime_roundtrip_and_iso_input() {
        let conn = Connection::open_in_memory().unwrap();
        let t = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(7, 40, 48)
            .unwrap();
        let parsed = conn
            .query_row("SELECT ?1, '2024-01-01T07:40:48'", [format_datetime(t)], |row| {
                Ok((get_datetime(row, 0)?, get_datetime(row, 1)?))
            })
            .unwrap();
        assert_eq!(parsed, (t, t));
    }

    #[test]
    fn test_bad_enum_is_conversion_error() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.query_row("SELECT 'BOGUS'", [], |row| {
            get_enum(row, 0, crate::domain::ScheduleStatus::from_db_str)
        });
        assert!(result.is_err());
    }
}
