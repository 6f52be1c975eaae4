//! Per-source-type value formatters producing CSV cells.
//!
//! Every formatter maps a driver value to the string written into the CSV
//! chunk. Null always becomes the empty string, and no cell may exceed
//! [`MAX_CELL_BYTES`].

use crate::core::CellValue;
use crate::error::{Result, TransferError};

/// Hard ceiling on one CSV cell, matching the warehouse VARCHAR limit.
pub const MAX_CELL_BYTES: usize = 16_777_216;

/// A formatter takes the driver value and yields the CSV cell text.
pub type Formatter = fn(&CellValue) -> Result<String>;

/// Look up the formatter for an upper-cased source type name.
///
/// Returns `None` for types the registry does not cover; the worker treats
/// that as a hard failure for the table.
pub fn formatter_for(db_type: &str) -> Option<Formatter> {
    let f: Formatter = match db_type {
        "BIT" => bool_binary,
        "FLOAT" | "DOUBLE" | "REAL" | "TINYINT" | "SMALLINT" | "INT" | "BIGINT"
        | "SQL_VARIANT" | "XML" | "CHAR" | "VARCHAR" | "NCHAR" | "NVARCHAR" | "TEXT"
        | "NTEXT" => print_raw,
        "DECIMAL" | "NUMERIC" | "MONEY" | "SMALLMONEY" => decimal_text,
        "DATETIME" | "DATETIME2" | "DATETIMEOFFSET" | "SMALLDATETIME" | "DATE" => timestamp_text,
        "TIME" => time_text,
        "BINARY" | "VARBINARY" | "IMAGE" | "GEOMETRY" => hex_lower,
        "UNIQUEIDENTIFIER" => uuid_swapped,
        _ => return None,
    };
    Some(f)
}

fn truncate_to_boundary(mut s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
    s
}

/// Default stringification for numeric and character types.
fn print_raw(value: &CellValue) -> Result<String> {
    let formatted = match value {
        CellValue::Null => return Ok(String::new()),
        CellValue::Bool(v) => v.to_string(),
        CellValue::U8(v) => v.to_string(),
        CellValue::I16(v) => v.to_string(),
        CellValue::I32(v) => v.to_string(),
        CellValue::I64(v) => v.to_string(),
        CellValue::F32(v) => v.to_string(),
        CellValue::F64(v) => v.to_string(),
        CellValue::Decimal(v) => v.to_string(),
        CellValue::Str(v) => v.clone(),
        other => {
            return Err(TransferError::Format(format!(
                "printRaw unable to stringify driver value {:?}",
                other
            )))
        }
    };
    Ok(truncate_to_boundary(formatted, MAX_CELL_BYTES))
}

/// BIT columns must arrive as booleans and are emitted as `1`/`0`.
fn bool_binary(value: &CellValue) -> Result<String> {
    match value {
        CellValue::Null => Ok(String::new()),
        CellValue::Bool(true) => Ok("1".to_string()),
        CellValue::Bool(false) => Ok("0".to_string()),
        _ => Err(TransferError::Format(
            "castToBool unable to cast value to bool".to_string(),
        )),
    }
}

/// DECIMAL/MONEY family: the wire value decodes as text.
///
/// The protocol hands these back as a byte sequence; tiberius may also
/// surface them as decimals or floats depending on the column, and all three
/// shapes stringify the same way.
fn decimal_text(value: &CellValue) -> Result<String> {
    let formatted = match value {
        CellValue::Null => return Ok(String::new()),
        CellValue::Bytes(v) => String::from_utf8_lossy(v).into_owned(),
        CellValue::Decimal(v) => v.to_string(),
        CellValue::F64(v) => v.to_string(),
        other => {
            return Err(TransferError::Format(format!(
                "castToBytes unable to cast driver value {:?} to bytes",
                other
            )))
        }
    };
    Ok(truncate_to_boundary(formatted, MAX_CELL_BYTES))
}

/// Temporal columns other than TIME: `YYYY-MM-DD HH:MM:SS.ffffff`.
fn timestamp_text(value: &CellValue) -> Result<String> {
    let formatted = match value {
        CellValue::Null => return Ok(String::new()),
        CellValue::DateTime(v) => v.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        CellValue::DateTimeOffset(v) => v.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        CellValue::Date(v) => v
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .format("%Y-%m-%d %H:%M:%S%.6f")
            .to_string(),
        other => {
            return Err(TransferError::Format(format!(
                "castToTime unable to cast driver value {:?} to a timestamp",
                other
            )))
        }
    };
    Ok(formatted)
}

/// TIME columns: `HH:MM:SS.fffffffff`.
fn time_text(value: &CellValue) -> Result<String> {
    match value {
        CellValue::Null => Ok(String::new()),
        CellValue::Time(v) => Ok(v.format("%H:%M:%S%.9f").to_string()),
        other => Err(TransferError::Format(format!(
            "castToTime unable to cast driver value {:?} to a time",
            other
        ))),
    }
}

/// Binary columns: lowercase hex.
fn hex_lower(value: &CellValue) -> Result<String> {
    match value {
        CellValue::Null => Ok(String::new()),
        CellValue::Bytes(v) => {
            let mut out = String::with_capacity((v.len() * 2).min(MAX_CELL_BYTES));
            for byte in v {
                if out.len() + 2 > MAX_CELL_BYTES {
                    break;
                }
                out.push_str(&format!("{:02x}", byte));
            }
            Ok(out)
        }
        other => Err(TransferError::Format(format!(
            "castToBytes unable to cast driver value {:?} to bytes",
            other
        ))),
    }
}

/// UNIQUEIDENTIFIER: the wire blob stores the first three GUID fields
/// little-endian; reorder them and emit uppercase hex.
fn uuid_swapped(value: &CellValue) -> Result<String> {
    let bytes = match value {
        CellValue::Null => return Ok(String::new()),
        CellValue::Bytes(v) => v,
        other => {
            return Err(TransferError::Format(format!(
                "castToBytes unable to cast driver value {:?} to bytes",
                other
            )))
        }
    };

    if bytes.len() < 11 {
        return Err(TransferError::Format(format!(
            "uniqueidentifier blob too short: {} bytes",
            bytes.len()
        )));
    }

    let mut out = String::with_capacity(bytes.len() * 2);
    for idx in [3usize, 2, 1, 0, 5, 4, 7, 6, 8, 9] {
        out.push_str(&format!("{:02X}", bytes[idx]));
    }
    for byte in &bytes[10..] {
        out.push_str(&format!("{:02X}", byte));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal::Decimal;

    /// Every type in the translation table must have a formatter.
    #[test]
    fn test_formatter_totality() {
        let types = [
            "BIT",
            "TINYINT",
            "SMALLINT",
            "INT",
            "BIGINT",
            "FLOAT",
            "REAL",
            "DECIMAL",
            "MONEY",
            "SMALLMONEY",
            "DATE",
            "TIME",
            "DATETIME",
            "DATETIME2",
            "SMALLDATETIME",
            "DATETIMEOFFSET",
            "CHAR",
            "VARCHAR",
            "NCHAR",
            "NVARCHAR",
            "TEXT",
            "NTEXT",
            "XML",
            "SQL_VARIANT",
            "UNIQUEIDENTIFIER",
            "BINARY",
            "VARBINARY",
            "IMAGE",
            "GEOMETRY",
        ];
        for t in types {
            assert!(formatter_for(t).is_some(), "missing formatter for {}", t);
        }
    }

    #[test]
    fn test_unknown_type_has_no_formatter() {
        assert!(formatter_for("HIERARCHYID").is_none());
    }

    /// Null input must produce the empty cell for every registered formatter.
    #[test]
    fn test_null_round_trip() {
        let types = [
            "BIT",
            "INT",
            "DECIMAL",
            "DATETIME",
            "TIME",
            "NVARCHAR",
            "VARBINARY",
            "UNIQUEIDENTIFIER",
        ];
        for t in types {
            let f = formatter_for(t).unwrap();
            assert_eq!(f(&CellValue::Null).unwrap(), "", "{}", t);
        }
    }

    #[test]
    fn test_bit_formatter() {
        let f = formatter_for("BIT").unwrap();
        assert_eq!(f(&CellValue::Bool(true)).unwrap(), "1");
        assert_eq!(f(&CellValue::Bool(false)).unwrap(), "0");
        assert!(f(&CellValue::I32(1)).is_err());
    }

    #[test]
    fn test_print_raw_numbers_and_strings() {
        let f = formatter_for("INT").unwrap();
        assert_eq!(f(&CellValue::I32(42)).unwrap(), "42");

        let f = formatter_for("NVARCHAR").unwrap();
        assert_eq!(f(&CellValue::Str("Ada".into())).unwrap(), "Ada");

        let f = formatter_for("FLOAT").unwrap();
        assert_eq!(f(&CellValue::F64(1.5)).unwrap(), "1.5");
    }

    #[test]
    fn test_truncation_bound() {
        let f = formatter_for("VARCHAR").unwrap();
        let long = "x".repeat(MAX_CELL_BYTES + 100);
        assert_eq!(f(&CellValue::Str(long)).unwrap().len(), MAX_CELL_BYTES);
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        // Fill to just below the limit, then append a 4-byte scalar that
        // straddles it.
        let mut s = "x".repeat(MAX_CELL_BYTES - 2);
        s.push('🦀');
        let f = formatter_for("VARCHAR").unwrap();
        let out = f(&CellValue::Str(s)).unwrap();
        assert!(out.len() <= MAX_CELL_BYTES);
        assert!(out.is_char_boundary(out.len()));
    }

    #[test]
    fn test_decimal_text_from_bytes() {
        let f = formatter_for("MONEY").unwrap();
        assert_eq!(f(&CellValue::Bytes(b"123.4500".to_vec())).unwrap(), "123.4500");
    }

    #[test]
    fn test_decimal_text_from_decimal() {
        let f = formatter_for("DECIMAL").unwrap();
        let d = Decimal::new(12345, 2);
        assert_eq!(f(&CellValue::Decimal(d)).unwrap(), "123.45");
    }

    #[test]
    fn test_timestamp_format() {
        let f = formatter_for("DATETIME").unwrap();
        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_micro_opt(3, 4, 5, 678_901)
            .unwrap();
        assert_eq!(f(&CellValue::DateTime(dt)).unwrap(), "2024-01-02 03:04:05.678901");
    }

    #[test]
    fn test_date_formats_as_midnight_timestamp() {
        let f = formatter_for("DATE").unwrap();
        let d = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert_eq!(f(&CellValue::Date(d)).unwrap(), "2024-06-30 00:00:00.000000");
    }

    #[test]
    fn test_time_format() {
        let f = formatter_for("TIME").unwrap();
        let t = NaiveTime::from_hms_nano_opt(13, 14, 15, 123_456_789).unwrap();
        assert_eq!(f(&CellValue::Time(t)).unwrap(), "13:14:15.123456789");
    }

    #[test]
    fn test_hex_lower() {
        let f = formatter_for("VARBINARY").unwrap();
        assert_eq!(f(&CellValue::Bytes(vec![0xDE, 0xAD, 0x01])).unwrap(), "dead01");
    }

    #[test]
    fn test_uuid_byte_swap() {
        let f = formatter_for("UNIQUEIDENTIFIER").unwrap();
        let blob = vec![
            0x33, 0x22, 0x11, 0x00, 0x55, 0x44, 0x77, 0x66, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD,
            0xEE, 0xFF,
        ];
        assert_eq!(
            f(&CellValue::Bytes(blob)).unwrap(),
            "00112233445566778899AABBCCDDEEFF"
        );
    }

    #[test]
    fn test_uuid_blob_too_short() {
        let f = formatter_for("UNIQUEIDENTIFIER").unwrap();
        assert!(f(&CellValue::Bytes(vec![0u8; 4])).is_err());
    }
}
