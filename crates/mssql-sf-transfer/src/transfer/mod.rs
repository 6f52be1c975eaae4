//! Per-table transfer worker.
//!
//! One worker moves one table end to end: introspect, create the staging
//! table, stream rows into CSV chunks, upload each chunk, COPY the chunks
//! into staging, then swap the table into the production schema.

pub mod chunk;

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::ident::table_ident;
use crate::error::{Result, TransferError};
use crate::format::{formatter_for, Formatter};
use crate::orchestrator::{Query, TransferPlan};
use crate::s3::S3Uploader;
use crate::source::MssqlPool;
use crate::target::SnowflakeSession;
use crate::typemap::attach_column_decls;
use chunk::{flush_check, ChunkBuffer};

/// Build the staging CREATE TABLE statement from per-column declarations.
fn build_create_table(staging_schema: &str, table_ident: &str, decls: &[String]) -> String {
    format!(
        "create table if not exists {}.{} ({});",
        staging_schema,
        table_ident,
        decls.join(", ")
    )
}

/// Tag an error with the failing table, letting cancellation pass through
/// untouched so the orchestrator can tell peers' failures from fallout.
fn tag(table: &str, err: TransferError) -> TransferError {
    match err {
        TransferError::Cancelled => TransferError::Cancelled,
        other => TransferError::worker(table, other),
    }
}

/// Run the full pipeline for the table at `query_index`.
///
/// The shared query list is written once, to attach the generated CREATE
/// TABLE text. Every suspension point honors the cancellation token; after
/// cancellation no further DDL is issued.
#[allow(clippy::too_many_arguments)]
pub async fn run_table(
    source: Arc<MssqlPool>,
    staging_session: SnowflakeSession,
    uploader: Arc<S3Uploader>,
    plan: Arc<TransferPlan>,
    transfer_id: String,
    chunk_size: usize,
    query_index: usize,
    queries: Arc<Mutex<Vec<Query>>>,
    cancel: CancellationToken,
) -> Result<()> {
    let (schema, table, source_sql, s3_dir) = {
        let queries = queries.lock().expect("query list poisoned");
        let q = &queries[query_index];
        (
            q.schema.clone(),
            q.table.clone(),
            q.source_query.clone(),
            q.s3_path.clone(),
        )
    };
    let table_label = format!("{}.{}", schema, table);

    info!("Starting transfer of {}", table_label);

    let mut columns = source
        .load_columns(&schema, &table)
        .await
        .map_err(|e| tag(&table_label, e))?;
    attach_column_decls(&mut columns).map_err(|e| tag(&table_label, e))?;

    // Resolve formatters up front so an untranslatable column fails the
    // table before any DDL or data movement.
    let formatters = columns
        .db_types
        .iter()
        .map(|t| formatter_for(t).ok_or_else(|| TransferError::UnknownType(t.clone())))
        .collect::<Result<Vec<Formatter>>>()
        .map_err(|e| tag(&table_label, e))?;

    let staging_table = table_ident(&schema, &table);
    let create_sql = build_create_table(
        &plan.staging_schema,
        &staging_table,
        &columns.names_and_types,
    );
    {
        let mut queries = queries.lock().expect("query list poisoned");
        queries[query_index].target_create_table_query = create_sql.clone();
    }

    if cancel.is_cancelled() {
        return Err(TransferError::Cancelled);
    }
    staging_session
        .execute(&create_sql)
        .await
        .map_err(|e| tag(&table_label, e))?;

    let mut rows = source.stream_rows(source_sql, columns.scan_types.clone(), cancel.clone());
    let mut buf = ChunkBuffer::new();
    let mut cells = vec![String::new(); columns.num_cols];
    let mut chunks_uploaded = 0usize;

    while let Some(row) = rows.recv().await {
        let row = row.map_err(|e| tag(&table_label, e))?;

        for (j, value) in row.iter().enumerate() {
            cells[j] = formatters[j](value).map_err(|e| tag(&table_label, e))?;
        }
        buf.write_record(&cells).map_err(|e| tag(&table_label, e))?;

        if flush_check(buf.len(), chunk_size) {
            upload_chunk(
                &uploader,
                &transfer_id,
                &s3_dir,
                buf.take(),
                &table_label,
                &cancel,
            )
            .await?;
            chunks_uploaded += 1;
        }
    }
    drop(rows);

    if !buf.is_empty() {
        upload_chunk(
            &uploader,
            &transfer_id,
            &s3_dir,
            buf.take(),
            &table_label,
            &cancel,
        )
        .await?;
        chunks_uploaded += 1;
    }

    debug!("{}: uploaded {} chunks", table_label, chunks_uploaded);

    let copy_sql = format!(
        "copy into {}.{} from {} STORAGE_INTEGRATION = \"{}\" file_format = (format_name = SQLPIPE_CSV)",
        plan.staging_schema,
        staging_table,
        uploader.copy_location(&transfer_id, &s3_dir),
        plan.storage_integration,
    );
    if cancel.is_cancelled() {
        return Err(TransferError::Cancelled);
    }
    staging_session
        .execute(&copy_sql)
        .await
        .map_err(|e| tag(&table_label, e))?;

    // Clear any prior incarnation before the swap.
    let drop_sql = format!(
        "drop table if exists {}.{}.{};",
        plan.target_db, plan.prod_schema, staging_table
    );
    if cancel.is_cancelled() {
        return Err(TransferError::Cancelled);
    }
    staging_session
        .execute(&drop_sql)
        .await
        .map_err(|e| tag(&table_label, e))?;

    let rename_sql = format!(
        "alter table {}.{}.{} rename to {}.{}.{};",
        plan.target_db, plan.staging_schema, staging_table, plan.target_db, plan.prod_schema, staging_table
    );
    if cancel.is_cancelled() {
        return Err(TransferError::Cancelled);
    }
    staging_session
        .execute(&rename_sql)
        .await
        .map_err(|e| tag(&table_label, e))?;

    info!("Finished transfer of {}", table_label);
    Ok(())
}

async fn upload_chunk(
    uploader: &S3Uploader,
    transfer_id: &str,
    s3_dir: &str,
    body: Vec<u8>,
    table_label: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(TransferError::Cancelled),
        result = uploader.upload_chunk(transfer_id, s3_dir, body) => {
            result.map(|_| ()).map_err(|e| tag(table_label, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_create_table() {
        let sql = build_create_table(
            "PAC_MSSQL_SALES_STAGING",
            "DBO_CUSTOMERS",
            &["ID INT".to_string(), "NAME VARCHAR".to_string()],
        );
        assert_eq!(
            sql,
            "create table if not exists PAC_MSSQL_SALES_STAGING.DBO_CUSTOMERS (ID INT, NAME VARCHAR);"
        );
    }

    #[test]
    fn test_build_create_table_quoted_column() {
        let sql = build_create_table(
            "S",
            "T",
            &["\"ORDER\" INT".to_string()],
        );
        assert_eq!(sql, "create table if not exists S.T (\"ORDER\" INT);");
    }

    #[test]
    fn test_tag_preserves_cancellation() {
        let tagged = tag("dbo.Customers", TransferError::Cancelled);
        assert!(matches!(tagged, TransferError::Cancelled));

        let tagged = tag(
            "dbo.Customers",
            TransferError::warehouse("copy into x", "boom"),
        );
        match tagged {
            TransferError::Worker { table, message } => {
                assert_eq!(table, "dbo.Customers");
                assert!(message.contains("copy into x"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
