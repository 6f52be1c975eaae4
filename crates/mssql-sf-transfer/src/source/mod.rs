//! MSSQL source access: connection pooling, table discovery, column
//! introspection, and streaming row extraction.
//!
//! Uses Tiberius over a bb8 pool. Workers share the pool but each extraction
//! checks out its own connection and holds it for the life of the cursor.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use futures::TryStreamExt;
use tiberius::{Client, Query, QueryItem, Row};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::core::value::{CellValue, ScanType};
use crate::core::ColumnInfo;
use crate::error::{Result, TransferError};

/// Connection acquisition timeout from pool.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle connection timeout.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Buffered rows between the reader task and the worker.
const ROW_CHANNEL_DEPTH: usize = 1024;

/// Lists every user table, largest first by aggregated storage pages, and
/// skips ms-shipped objects and database-tooling support tables.
const DISCOVER_TABLES_SQL: &str = r#"
    SELECT
        S.name AS schema_name,
        T.name AS table_name
    FROM sys.tables AS T
    INNER JOIN sys.schemas AS S ON S.schema_id = T.schema_id
    LEFT JOIN sys.extended_properties AS EP ON EP.major_id = T.[object_id]
    LEFT JOIN sys.indexes i ON T.object_id = i.object_id
    LEFT JOIN sys.partitions p ON i.object_id = p.object_id AND i.index_id = p.index_id
    LEFT JOIN sys.allocation_units a ON p.partition_id = a.container_id
    WHERE T.is_ms_shipped = 0
    AND (
        EP.class_desc IS NULL
        OR (EP.class_desc <> 'OBJECT_OR_COLUMN' AND EP.[name] <> 'microsoft_database_tools_support')
    )
    GROUP BY T.name, S.name
    ORDER BY SUM(a.used_pages) DESC
"#;

/// One discovered source table.
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub schema: String,
    pub table: String,
}

impl SourceTable {
    /// Extraction query for this table.
    pub fn select_query(&self) -> String {
        format!("select * from [{}].[{}]", self.schema, self.table)
    }
}

/// Connection manager for bb8 pool with Tiberius.
#[derive(Clone)]
struct TiberiusConnectionManager {
    config: SourceConfig,
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.config.tiberius_config();
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            }
        })?;
        tcp.set_nodelay(true).ok();

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Pooled MSSQL source owned by one transfer.
pub struct MssqlPool {
    pool: Pool<TiberiusConnectionManager>,
}

impl MssqlPool {
    /// Open a pool against the source and verify connectivity.
    pub async fn connect(config: SourceConfig, max_size: u32) -> Result<Self> {
        let host = config.host.clone();
        let port = config.port;
        let db_name = config.db_name.clone();

        let manager = TiberiusConnectionManager { config };
        let pool = Pool::builder()
            .max_size(max_size)
            .connection_timeout(POOL_CONNECTION_TIMEOUT)
            .idle_timeout(Some(POOL_IDLE_TIMEOUT))
            .test_on_check_out(true)
            .build(manager)
            .await
            .map_err(|e| TransferError::pool(e, "creating MSSQL connection pool"))?;

        {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| TransferError::pool(e, "testing MSSQL connection"))?;
            conn.simple_query("SELECT 1").await?.into_row().await?;
        }

        info!(
            "Connected to MSSQL: {}:{}/{} (pool_size={})",
            host, port, db_name, max_size
        );

        Ok(Self { pool })
    }

    async fn get_client(&self) -> Result<PooledConnection<'_, TiberiusConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| TransferError::pool(e, "getting MSSQL connection from pool"))
    }

    /// Discover every user table in the source database.
    pub async fn discover_tables(&self) -> Result<Vec<SourceTable>> {
        let mut client = self.get_client().await?;
        let stream = client
            .simple_query(DISCOVER_TABLES_SQL)
            .await
            .map_err(|e| TransferError::Discovery(format!("error running query getting all db objects: {}", e)))?;
        let rows = stream
            .into_first_result()
            .await
            .map_err(|e| TransferError::Discovery(format!("error iterating over discovered tables: {}", e)))?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let schema: &str = row.get(0).ok_or_else(|| {
                TransferError::Discovery("discovery row missing schema name".to_string())
            })?;
            let table: &str = row.get(1).ok_or_else(|| {
                TransferError::Discovery("discovery row missing table name".to_string())
            })?;
            tables.push(SourceTable {
                schema: schema.to_string(),
                table: table.to_string(),
            });
        }

        debug!("Discovered {} user tables", tables.len());
        Ok(tables)
    }

    /// Introspect the columns of one table into [`ColumnInfo`].
    ///
    /// A column whose declared type has no scan strategy is a hard error for
    /// the table.
    pub async fn load_columns(&self, schema: &str, table: &str) -> Result<ColumnInfo> {
        let sql = r#"
            SELECT
                COLUMN_NAME,
                DATA_TYPE,
                CAST(ISNULL(NUMERIC_PRECISION, 0) AS BIGINT),
                CAST(ISNULL(NUMERIC_SCALE, 0) AS BIGINT),
                CAST(ISNULL(CHARACTER_MAXIMUM_LENGTH, 0) AS BIGINT)
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2
            ORDER BY ORDINAL_POSITION
        "#;

        let mut client = self.get_client().await?;
        let mut query = Query::new(sql);
        query.bind(schema);
        query.bind(table);

        let stream = query.query(&mut client).await?;
        let rows = stream.into_first_result().await?;

        let mut info = ColumnInfo::default();
        for row in rows {
            let name: &str = row.get(0).unwrap_or_default();
            let db_type = row.get::<&str, _>(1).unwrap_or_default().to_uppercase();
            let precision = row.get::<i64, _>(2).unwrap_or(0);
            let scale = row.get::<i64, _>(3).unwrap_or(0);
            let length = row.get::<i64, _>(4).unwrap_or(0);

            let scan_type = ScanType::for_db_type(&db_type)
                .ok_or_else(|| TransferError::UnknownType(db_type.clone()))?;

            info.push(name.to_string(), db_type, scan_type, precision, scale, length);
        }

        debug!("Loaded {} columns for {}.{}", info.num_cols, schema, table);
        Ok(info)
    }

    /// Stream rows for an extraction query through a bounded channel.
    ///
    /// A reader task owns the cursor connection; it stops at end-of-cursor,
    /// on the first driver error (forwarded down the channel), or when the
    /// cancellation token fires.
    pub fn stream_rows(
        &self,
        sql: String,
        scan_types: Vec<ScanType>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<Result<Vec<CellValue>>> {
        let (tx, rx) = mpsc::channel(ROW_CHANNEL_DEPTH);
        let pool = self.pool.clone();

        tokio::spawn(async move {
            let mut conn = match pool.get_owned().await {
                Ok(conn) => conn,
                Err(e) => {
                    let _ = tx
                        .send(Err(TransferError::pool(e, "getting extraction connection")))
                        .await;
                    return;
                }
            };

            let mut stream = match conn.simple_query(&sql).await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(Err(TransferError::Source(e))).await;
                    return;
                }
            };

            loop {
                let item = tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = tx.send(Err(TransferError::Cancelled)).await;
                        return;
                    }
                    item = stream.try_next() => item,
                };

                match item {
                    Ok(Some(QueryItem::Row(row))) => {
                        let decoded = decode_row(&row, &scan_types);
                        // Receiver dropped means the worker already failed.
                        if tx.send(decoded).await.is_err() {
                            return;
                        }
                    }
                    Ok(Some(QueryItem::Metadata(_))) => continue,
                    Ok(None) => return,
                    Err(e) => {
                        let _ = tx.send(Err(TransferError::Source(e))).await;
                        return;
                    }
                }
            }
        });

        rx
    }
}

/// Decode one driver row into cell values using the per-column scan types.
fn decode_row(row: &Row, scan_types: &[ScanType]) -> Result<Vec<CellValue>> {
    let mut values = Vec::with_capacity(scan_types.len());

    for (idx, scan_type) in scan_types.iter().enumerate() {
        let value = decode_cell(row, idx, *scan_type)
            .map_err(|e| TransferError::Format(format!("error scanning column {}: {}", idx, e)))?;
        values.push(value);
    }

    Ok(values)
}

fn decode_cell(
    row: &Row,
    idx: usize,
    scan_type: ScanType,
) -> std::result::Result<CellValue, tiberius::error::Error> {
    let value = match scan_type {
        ScanType::Bool => row.try_get::<bool, _>(idx)?.map(CellValue::Bool),
        ScanType::U8 => row.try_get::<u8, _>(idx)?.map(CellValue::U8),
        ScanType::I16 => row.try_get::<i16, _>(idx)?.map(CellValue::I16),
        ScanType::I32 => row.try_get::<i32, _>(idx)?.map(CellValue::I32),
        ScanType::I64 => row.try_get::<i64, _>(idx)?.map(CellValue::I64),
        ScanType::F32 => row.try_get::<f32, _>(idx)?.map(CellValue::F32),
        ScanType::F64 => row.try_get::<f64, _>(idx)?.map(CellValue::F64),
        ScanType::Decimal => row
            .try_get::<rust_decimal::Decimal, _>(idx)?
            .map(CellValue::Decimal),
        ScanType::Str => row
            .try_get::<&str, _>(idx)?
            .map(|v| CellValue::Str(v.to_string())),
        ScanType::Xml => row
            .try_get::<&tiberius::xml::XmlData, _>(idx)?
            .map(|v| CellValue::Str(v.to_string())),
        ScanType::Bytes => row
            .try_get::<&[u8], _>(idx)?
            .map(|v| CellValue::Bytes(v.to_vec())),
        // Recover the wire blob so the formatter can apply its byte swap.
        ScanType::Uuid => row
            .try_get::<tiberius::Uuid, _>(idx)?
            .map(|v| CellValue::Bytes(v.to_bytes_le().to_vec())),
        ScanType::Date => row
            .try_get::<chrono::NaiveDate, _>(idx)?
            .map(CellValue::Date),
        ScanType::Time => row
            .try_get::<chrono::NaiveTime, _>(idx)?
            .map(CellValue::Time),
        ScanType::DateTime => row
            .try_get::<chrono::NaiveDateTime, _>(idx)?
            .map(CellValue::DateTime),
        ScanType::DateTimeOffset => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)?
            .map(CellValue::DateTimeOffset),
    };

    Ok(value.unwrap_or(CellValue::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_query_brackets_identifiers() {
        let table = SourceTable {
            schema: "dbo".into(),
            table: "Customers".into(),
        };
        assert_eq!(table.select_query(), "select * from [dbo].[Customers]");
    }

    #[test]
    fn test_discovery_sql_filters_system_objects() {
        assert!(DISCOVER_TABLES_SQL.contains("is_ms_shipped = 0"));
        assert!(DISCOVER_TABLES_SQL.contains("microsoft_database_tools_support"));
        assert!(DISCOVER_TABLES_SQL.contains("ORDER BY SUM(a.used_pages) DESC"));
    }
}
