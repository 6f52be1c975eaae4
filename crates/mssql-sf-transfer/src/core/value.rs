//! Driver value representation for rows read from the source.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;

/// A single cell as produced by the source driver.
///
/// `Bytes` carries binary columns and the raw 16-byte GUID blob
/// (mixed-endian, as the wire protocol emits it).
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    U8(u8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Str(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<Utc>),
}

/// How to decode a tiberius cell for a declared source column type.
///
/// Computed once per column during introspection so the row loop does a
/// simple indexed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    Bool,
    U8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Decimal,
    Str,
    Xml,
    Bytes,
    Uuid,
    Date,
    Time,
    DateTime,
    DateTimeOffset,
}

impl ScanType {
    /// Map an upper-cased source type name to its scan type.
    ///
    /// Returns `None` for types the engine does not understand; the caller
    /// turns that into a hard per-table error.
    pub fn for_db_type(db_type: &str) -> Option<Self> {
        let scan = match db_type {
            "BIT" => ScanType::Bool,
            "TINYINT" => ScanType::U8,
            "SMALLINT" => ScanType::I16,
            "INT" => ScanType::I32,
            "BIGINT" => ScanType::I64,
            "REAL" => ScanType::F32,
            "FLOAT" => ScanType::F64,
            "DECIMAL" | "NUMERIC" => ScanType::Decimal,
            "MONEY" | "SMALLMONEY" => ScanType::F64,
            "CHAR" | "VARCHAR" | "NCHAR" | "NVARCHAR" | "TEXT" | "NTEXT" | "SQL_VARIANT" => {
                ScanType::Str
            }
            "XML" => ScanType::Xml,
            "BINARY" | "VARBINARY" | "IMAGE" | "GEOMETRY" => ScanType::Bytes,
            "UNIQUEIDENTIFIER" => ScanType::Uuid,
            "DATE" => ScanType::Date,
            "TIME" => ScanType::Time,
            "DATETIME" | "DATETIME2" | "SMALLDATETIME" => ScanType::DateTime,
            "DATETIMEOFFSET" => ScanType::DateTimeOffset,
            _ => return None,
        };
        Some(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_type_known() {
        assert_eq!(ScanType::for_db_type("INT"), Some(ScanType::I32));
        assert_eq!(ScanType::for_db_type("NVARCHAR"), Some(ScanType::Str));
        assert_eq!(ScanType::for_db_type("UNIQUEIDENTIFIER"), Some(ScanType::Uuid));
        assert_eq!(ScanType::for_db_type("DATETIME2"), Some(ScanType::DateTime));
    }

    #[test]
    fn test_scan_type_unknown() {
        assert_eq!(ScanType::for_db_type("HIERARCHYID"), None);
        assert_eq!(ScanType::for_db_type(""), None);
    }
}
