//! Source column type to warehouse DDL type translation.

use crate::core::ident::column_ident;
use crate::core::ColumnInfo;
use crate::error::{Result, TransferError};

/// Map an upper-cased MSSQL type name to the Snowflake column type used in
/// staging DDL.
///
/// Precision and scale are deliberately not emitted; they stay in
/// [`ColumnInfo`] for future use. An unknown type is a hard error so a table
/// with untranslatable columns fails before any data moves.
pub fn snowflake_type(db_type: &str) -> Result<&'static str> {
    let mapped = match db_type {
        "BIT" => "BOOLEAN",
        "TINYINT" => "TINYINT",
        "SMALLINT" => "SMALLINT",
        "INT" => "INT",
        "BIGINT" => "BIGINT",
        "FLOAT" | "REAL" | "DECIMAL" | "NUMERIC" => "FLOAT",
        "MONEY" | "SMALLMONEY" => "TEXT",
        "DATE" => "DATE",
        "TIME" => "TIME",
        "DATETIME" | "DATETIME2" | "SMALLDATETIME" | "DATETIMEOFFSET" => "TIMESTAMP",
        "CHAR" | "VARCHAR" | "NCHAR" | "NVARCHAR" => "VARCHAR",
        "TEXT" | "NTEXT" | "XML" | "SQL_VARIANT" | "UNIQUEIDENTIFIER" => "TEXT",
        "BINARY" | "VARBINARY" | "IMAGE" | "GEOMETRY" => "BINARY",
        other => {
            return Err(TransferError::Config(format!(
                "unknown type while getting create table types: {}",
                other
            )))
        }
    };
    Ok(mapped)
}

/// Fill `names_and_types` with `IDENT TYPE` declarations for every column.
pub fn attach_column_decls(info: &mut ColumnInfo) -> Result<()> {
    for idx in 0..info.num_cols {
        let col_type = snowflake_type(&info.db_types[idx])?;
        let ident = column_ident(&info.names[idx]);
        info.names_and_types.push(format!("{} {}", ident, col_type));
    }
    Ok(())
}
