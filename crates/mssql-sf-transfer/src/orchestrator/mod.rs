//! Transfer orchestrator: discovery, schema setup, bounded per-table
//! workers, and the final swap/cleanup.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{S3Config, SourceConfig, TargetConfig, TransferRequest};
use crate::core::ident;
use crate::error::{Result, TransferError};
use crate::logsink::LogSink;
use crate::registry::TransferRegistry;
use crate::s3::S3Uploader;
use crate::source::MssqlPool;
use crate::target::{KeyPair, SnowflakeSession};
use crate::transfer::run_table;
use crate::util::random_characters;

/// Length of a transfer id.
const TRANSFER_ID_LEN: usize = 32;

const CREATE_FILE_FORMAT_SQL: &str = "CREATE OR REPLACE FILE FORMAT SQLPIPE_CSV ESCAPE_UNENCLOSED_FIELD = 'NONE' FIELD_OPTIONALLY_ENCLOSED_BY = '\"' COMPRESSION = NONE";

/// Per-table work item, published in the transfer envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Query {
    #[serde(rename = "source_schema")]
    pub schema: String,

    #[serde(rename = "source_table")]
    pub table: String,

    pub source_query: String,

    /// Object-store sub-directory for this table's chunks.
    pub s3_path: String,

    /// Generated staging DDL, attached once by the worker.
    pub target_create_table_query: String,
}

/// Transfer lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Running,
    Complete,
    Failed,
}

/// One transfer request envelope.
///
/// Published into the registry at submit and replaced wholesale on every
/// update; the serialized form is what `GET /v1/transfers/` returns.
#[derive(Debug, Clone, Serialize)]
pub struct Transfer {
    #[serde(rename = "transfer_id")]
    pub id: String,

    #[serde(rename = "transfer_created_at")]
    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing)]
    pub source: SourceConfig,

    #[serde(skip_serializing)]
    pub target: TargetConfig,

    #[serde(skip_serializing)]
    pub s3: S3Config,

    #[serde(skip_serializing)]
    pub concurrency: usize,

    #[serde(rename = "transfer_queries")]
    pub queries: Vec<Query>,

    #[serde(rename = "transfer_status")]
    pub status: TransferStatus,

    #[serde(rename = "transfer_error")]
    pub error: String,
}

/// Names resolved during schema setup, shared read-only with every worker.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    /// Normalized target database name.
    pub target_db: String,

    /// Staging schema (possibly quoted).
    pub staging_schema: String,

    /// Production schema as returned by the grant procedure.
    pub prod_schema: String,

    /// Storage integration named in COPY statements.
    pub storage_integration: String,
}

/// The transfer engine: owns the registry handle and the remote error sink.
#[derive(Clone)]
pub struct TransferEngine {
    registry: Arc<TransferRegistry>,
    sink: Option<Arc<LogSink>>,
}

impl TransferEngine {
    pub fn new(registry: Arc<TransferRegistry>, sink: Option<Arc<LogSink>>) -> Self {
        Self { registry, sink }
    }

    pub fn registry(&self) -> &Arc<TransferRegistry> {
        &self.registry
    }

    fn ship_error(&self, message: &str) {
        if let Some(ref sink) = self.sink {
            sink.ship(message.to_string());
        }
    }

    /// Accept a validated submission: open both ends, register the transfer
    /// as running, launch the engine in the background, and return the
    /// envelope snapshot for the submit response.
    ///
    /// Any error here means no background work has started.
    pub async fn submit(&self, request: TransferRequest) -> Result<Arc<Transfer>> {
        let (source_cfg, target_cfg, s3_cfg, concurrency) = request.into_parts();

        let keypair = Arc::new(KeyPair::load(&target_cfg.private_key_location)?);
        let target_db = ident::normalize_target_db(&target_cfg.db_name);
        let control = SnowflakeSession::new(&target_cfg, keypair, target_db)?;

        let source_pool = Arc::new(MssqlPool::connect(source_cfg.clone(), concurrency as u32).await?);
        let uploader = Arc::new(S3Uploader::new(&s3_cfg).await);

        let transfer = Transfer {
            id: random_characters(TRANSFER_ID_LEN),
            created_at: Utc::now(),
            source: source_cfg,
            target: target_cfg,
            s3: s3_cfg,
            concurrency,
            queries: Vec::new(),
            status: TransferStatus::Running,
            error: String::new(),
        };

        let snapshot = Arc::new(transfer.clone());
        self.registry.put(snapshot.clone());

        let engine = self.clone();
        tokio::spawn(async move {
            engine.run(transfer, source_pool, control, uploader).await;
        });

        Ok(snapshot)
    }

    /// Drive one transfer to a terminal status.
    ///
    /// The source pool and warehouse sessions are owned by this call and
    /// closed when it returns, whatever the outcome.
    async fn run(
        &self,
        transfer: Transfer,
        source: Arc<MssqlPool>,
        control: SnowflakeSession,
        uploader: Arc<S3Uploader>,
    ) {
        let id = transfer.id.clone();
        let staging_schema = ident::staging_schema_name(
            &transfer.target.division_code,
            &transfer.source.db_name,
        );
        let queries = Arc::new(Mutex::new(Vec::new()));

        info!("Transfer {} starting against {}", id, transfer.source.db_name);

        let outcome = self
            .execute(&transfer, &staging_schema, &source, &control, &uploader, &queries)
            .await;

        // Cleanup runs whatever the outcome; a failure here is logged but
        // never overrides an otherwise-successful transfer.
        let drop_sql = format!("drop schema if exists {};", staging_schema);
        if let Err(e) = control.execute(&drop_sql).await {
            warn!("Transfer {}: staging cleanup failed: {}", id, e);
            self.ship_error(&format!("transfer {}: staging cleanup failed: {}", id, e));
        }

        let final_queries = queries.lock().expect("query list poisoned").clone();

        match outcome {
            Ok(()) => {
                info!("Transfer {} complete", id);
                self.registry.update(&id, |t| {
                    let mut t = t.clone();
                    t.queries = final_queries.clone();
                    t.status = TransferStatus::Complete;
                    t
                });
            }
            Err(e) => {
                let message = e.format_detailed();
                error!("Transfer {} failed: {}", id, message);
                self.ship_error(&format!("transfer {}: {}", id, message));
                self.registry.update(&id, |t| {
                    let mut t = t.clone();
                    t.queries = final_queries.clone();
                    t.status = TransferStatus::Failed;
                    t.error = e.to_string();
                    t
                });
            }
        }
    }

    async fn execute(
        &self,
        transfer: &Transfer,
        staging_schema: &str,
        source: &Arc<MssqlPool>,
        control: &SnowflakeSession,
        uploader: &Arc<S3Uploader>,
        queries: &Arc<Mutex<Vec<Query>>>,
    ) -> Result<()> {
        // 1. Discover user tables, largest first.
        let tables = source.discover_tables().await?;
        let discovered: Vec<Query> = tables
            .iter()
            .map(|t| Query {
                schema: t.schema.clone(),
                table: t.table.clone(),
                source_query: t.select_query(),
                s3_path: ident::object_dir_name(&t.schema, &t.table),
                target_create_table_query: String::new(),
            })
            .collect();
        *queries.lock().expect("query list poisoned") = discovered.clone();
        {
            let discovered = discovered.clone();
            self.registry.update(&transfer.id, move |t| {
                let mut t = t.clone();
                t.queries = discovered.clone();
                t
            });
        }
        info!(
            "Transfer {}: discovered {} tables",
            transfer.id,
            discovered.len()
        );

        // 2. Normalized target database name.
        let target_db = ident::normalize_target_db(&transfer.target.db_name);

        // 3. The grant procedure returns the authoritative production schema.
        let call_sql = format!(
            "CALL {}.PUBLIC.SP_GRANT_SCHEMA_ACCESS('MSSQL','{}','{}','{}','SQLpipe');",
            target_db,
            transfer.target.root_name,
            transfer.source.db_name.to_uppercase(),
            ident::draft_prod_schema_name(&transfer.target.division_code, &transfer.source.db_name),
        );
        let prod_schema = control
            .query_one(&call_sql)
            .await
            .map_err(schema_setup)?
            .trim()
            .to_string();
        if prod_schema.is_empty() {
            return Err(TransferError::schema_setup(
                &call_sql,
                "grant procedure returned an empty schema name",
            ));
        }
        info!(
            "Transfer {}: production schema is {}",
            transfer.id, prod_schema
        );

        // 4. Reset the staging schema.
        let drop_sql = format!("drop schema if exists {}", staging_schema);
        control.execute(&drop_sql).await.map_err(schema_setup)?;
        let create_sql = format!("create schema if not exists {}", staging_schema);
        control.execute(&create_sql).await.map_err(schema_setup)?;

        // 5. Worker session pinned to the staging schema.
        let staging_session = control.with_schema(staging_schema);
        staging_session.ping().await.map_err(schema_setup)?;

        // 6. CSV file format used by every COPY.
        staging_session
            .execute(CREATE_FILE_FORMAT_SQL)
            .await
            .map_err(schema_setup)?;

        // 7. Bounded per-table workers; the first failure cancels its peers.
        let plan = Arc::new(TransferPlan {
            target_db,
            staging_schema: staging_schema.to_string(),
            prod_schema,
            storage_integration: transfer.target.storage_integration.clone(),
        });
        let cancel = CancellationToken::new();
        let semaphore = Arc::new(Semaphore::new(transfer.concurrency));
        let chunk_size = transfer.s3.chunk_size;

        let mut handles = Vec::with_capacity(discovered.len());
        for query_index in 0..discovered.len() {
            let source = Arc::clone(source);
            let staging_session = staging_session.clone();
            let uploader = Arc::clone(uploader);
            let plan = Arc::clone(&plan);
            let transfer_id = transfer.id.clone();
            let queries = Arc::clone(queries);
            let cancel = cancel.clone();
            let semaphore = Arc::clone(&semaphore);

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("worker semaphore closed");
                if cancel.is_cancelled() {
                    return Err(TransferError::Cancelled);
                }

                let result = run_table(
                    source,
                    staging_session,
                    uploader,
                    plan,
                    transfer_id,
                    chunk_size,
                    query_index,
                    queries,
                    cancel.clone(),
                )
                .await;

                if let Err(ref e) = result {
                    if !matches!(e, TransferError::Cancelled) {
                        cancel.cancel();
                    }
                }
                result
            }));
        }

        let mut first_error: Option<TransferError> = None;
        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(TransferError::Cancelled)) => {}
                Ok(Err(e)) => {
                    error!("Transfer {}: worker failed: {}", transfer.id, e);
                    self.ship_error(&format!("transfer {}: {}", transfer.id, e));
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(join_err) => {
                    error!("Transfer {}: worker panicked: {}", transfer.id, join_err);
                    if first_error.is_none() {
                        first_error = Some(TransferError::worker(
                            "unknown",
                            format!("worker task panicked: {}", join_err),
                        ));
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Reclassify a warehouse failure as schema setup (orchestrator steps 3–6).
fn schema_setup(err: TransferError) -> TransferError {
    match err {
        TransferError::Warehouse { sql, message } => TransferError::SchemaSetup { sql, message },
        other => other,
    }
}
