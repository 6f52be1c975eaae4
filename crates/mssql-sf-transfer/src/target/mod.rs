//! Warehouse session: statement execution against the Snowflake SQL API.
//!
//! Snowflake has no native wire driver in this stack, so the session drives
//! the HTTP statement endpoint with key-pair JWT auth. One control session
//! runs orchestrator DDL; workers use a copy scoped to the staging schema.

pub mod keypair;

pub use keypair::KeyPair;

use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::TargetConfig;
use crate::error::{Result, TransferError};

/// Server-side statement timeout handed to the API.
const STATEMENT_TIMEOUT_SECS: u64 = 3600;

/// HTTP round-trip timeout. COPY statements on large chunks take a while.
const HTTP_TIMEOUT: Duration = Duration::from_secs(900);

/// Delay between polls of an asynchronously-completing statement.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Deserialize)]
struct StatementResponse {
    #[serde(rename = "statementHandle")]
    statement_handle: Option<String>,
    data: Option<Vec<Vec<Option<String>>>>,
    message: Option<String>,
}

/// One warehouse session bound to an account, database, warehouse, role, and
/// optionally a schema.
#[derive(Clone)]
pub struct SnowflakeSession {
    http: reqwest::Client,
    statements_url: String,
    account: String,
    user: String,
    keypair: Arc<KeyPair>,
    database: String,
    warehouse: String,
    role: String,
    schema: Option<String>,
}

impl SnowflakeSession {
    /// Build a session context for the normalized target database.
    ///
    /// Fails if the HTTP client cannot be constructed; no request is made
    /// until the first statement.
    pub fn new(target: &TargetConfig, keypair: Arc<KeyPair>, database: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| TransferError::Config(format!("unable to construct warehouse client: {}", e)))?;

        let account = target.account_id.clone();
        let statements_url = format!(
            "https://{}.snowflakecomputing.com/api/v2/statements",
            account.to_lowercase()
        );

        Ok(Self {
            http,
            statements_url,
            account,
            user: target.username.clone(),
            keypair,
            database,
            warehouse: target.warehouse.clone(),
            role: target.role.clone(),
            schema: None,
        })
    }

    /// Derive a session pinned to a schema (the staging schema for workers).
    pub fn with_schema(&self, schema: &str) -> Self {
        let mut session = self.clone();
        session.schema = Some(schema.to_string());
        session
    }

    /// Verify the session can reach the warehouse.
    pub async fn ping(&self) -> Result<()> {
        self.execute("SELECT 1").await
    }

    /// Execute a statement, discarding any result rows.
    pub async fn execute(&self, sql: &str) -> Result<()> {
        self.run_statement(sql).await.map(|_| ())
    }

    /// Execute a statement and return the first column of the first row.
    pub async fn query_one(&self, sql: &str) -> Result<String> {
        let response = self.run_statement(sql).await?;
        response
            .data
            .and_then(|rows| rows.into_iter().next())
            .and_then(|row| row.into_iter().next())
            .flatten()
            .ok_or_else(|| TransferError::warehouse(sql, "statement returned no rows"))
    }

    async fn run_statement(&self, sql: &str) -> Result<StatementResponse> {
        debug!("Executing warehouse statement: {}", sql);

        let token = self.keypair.mint_jwt(&self.account, &self.user)?;
        let mut body = json!({
            "statement": sql,
            "timeout": STATEMENT_TIMEOUT_SECS,
            "database": self.database,
            "warehouse": self.warehouse,
            "role": self.role,
        });
        if let Some(ref schema) = self.schema {
            body["schema"] = json!(schema);
        }

        let response = self
            .http
            .post(&self.statements_url)
            .bearer_auth(&token)
            .header("X-Snowflake-Authorization-Token-Type", "KEYPAIR_JWT")
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| TransferError::warehouse(sql, e))?;

        let status = response.status();

        // 202 means the statement is still executing server-side.
        if status.as_u16() == 202 {
            let parsed: StatementResponse = response
                .json()
                .await
                .map_err(|e| TransferError::warehouse(sql, e))?;
            let handle = parsed.statement_handle.ok_or_else(|| {
                TransferError::warehouse(sql, "async statement response missing handle")
            })?;
            return self.poll_statement(sql, &handle).await;
        }

        let parsed: StatementResponse = response
            .json()
            .await
            .map_err(|e| TransferError::warehouse(sql, e))?;

        if !status.is_success() {
            let message = parsed
                .message
                .unwrap_or_else(|| format!("warehouse returned status {}", status));
            return Err(TransferError::warehouse(sql, message));
        }

        Ok(parsed)
    }

    async fn poll_statement(&self, sql: &str, handle: &str) -> Result<StatementResponse> {
        let url = format!("{}/{}", self.statements_url, handle);

        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            let token = self.keypair.mint_jwt(&self.account, &self.user)?;
            let response = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .header("X-Snowflake-Authorization-Token-Type", "KEYPAIR_JWT")
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| TransferError::warehouse(sql, e))?;

            let status = response.status();
            if status.as_u16() == 202 {
                continue;
            }

            let parsed: StatementResponse = response
                .json()
                .await
                .map_err(|e| TransferError::warehouse(sql, e))?;

            if !status.is_success() {
                let message = parsed
                    .message
                    .unwrap_or_else(|| format!("warehouse returned status {}", status));
                return Err(TransferError::warehouse(sql, message));
            }

            return Ok(parsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::valid_request;
    use rsa::pkcs8::EncodePrivateKey;

    fn test_session() -> SnowflakeSession {
        let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let pem = key.to_pkcs8_pem(rsa::pkcs8::LineEnding::LF).unwrap();
        let keypair = Arc::new(KeyPair::from_pem(&pem).unwrap());
        let (_, target, _, _) = valid_request().into_parts();
        SnowflakeSession::new(&target, keypair, "ANALYTICS".to_string()).unwrap()
    }

    #[test]
    fn test_statements_url_uses_account_host() {
        let session = test_session();
        assert_eq!(
            session.statements_url,
            "https://org-acct.snowflakecomputing.com/api/v2/statements"
        );
    }

    #[test]
    fn test_with_schema_pins_schema() {
        let session = test_session();
        assert!(session.schema.is_none());
        let scoped = session.with_schema("PAC_MSSQL_SALES_STAGING");
        assert_eq!(scoped.schema.as_deref(), Some("PAC_MSSQL_SALES_STAGING"));
        // The original session is untouched.
        assert!(session.schema.is_none());
    }
}
