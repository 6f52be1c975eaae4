//! Transfer descriptor type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default per-transfer worker bound.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Source database (MSSQL) descriptor.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    pub host: String,

    /// Database port.
    pub port: u16,

    /// Username.
    pub username: String,

    /// Password.
    pub password: String,

    /// Database name.
    pub db_name: String,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("db_name", &self.db_name)
            .finish()
    }
}

impl SourceConfig {
    /// Build a tiberius connection config for this source.
    pub fn tiberius_config(&self) -> tiberius::Config {
        let mut config = tiberius::Config::new();
        config.host(&self.host);
        config.port(self.port);
        config.database(&self.db_name);
        config.authentication(tiberius::AuthMethod::sql_server(
            &self.username,
            &self.password,
        ));
        config.trust_cert();
        config
    }
}

/// Target warehouse (Snowflake) descriptor.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Snowflake account identifier.
    pub account_id: String,

    /// Username for key-pair authentication.
    pub username: String,

    /// Path to the RSA private key PEM on disk (PKCS#1 or PKCS#8).
    pub private_key_location: String,

    /// Role assumed for every statement.
    pub role: String,

    /// Virtual warehouse used for every statement.
    pub warehouse: String,

    /// AWS region of the Snowflake deployment.
    pub aws_region: String,

    /// Target database name (normalized before use).
    pub db_name: String,

    /// Storage integration granting the warehouse read access to the bucket.
    pub storage_integration: String,

    /// Short division tag injected into schema names.
    pub division_code: String,

    /// Root name handed to the schema-access grant procedure.
    pub root_name: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("account_id", &self.account_id)
            .field("username", &self.username)
            .field("private_key_location", &self.private_key_location)
            .field("role", &self.role)
            .field("warehouse", &self.warehouse)
            .field("aws_region", &self.aws_region)
            .field("db_name", &self.db_name)
            .field("storage_integration", &self.storage_integration)
            .field("division_code", &self.division_code)
            .field("root_name", &self.root_name)
            .finish()
    }
}

/// Object-store (S3) descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Bucket receiving CSV chunks.
    pub bucket: String,

    /// Key prefix under which all transfers write.
    pub dir: String,

    /// Bucket region.
    pub region: String,

    /// Chunk-size flush threshold in bytes.
    pub chunk_size: usize,
}

/// One transfer submission, as received over the wire.
///
/// Numeric fields default to zero when omitted; defaults are applied when
/// the request is split into descriptors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferRequest {
    #[serde(default)]
    pub aws_config_s3_bucket: String,
    #[serde(default)]
    pub aws_config_s3_dir: String,
    #[serde(default)]
    pub aws_config_region: String,
    #[serde(default)]
    pub source_host: String,
    #[serde(default)]
    pub source_port: u16,
    #[serde(default)]
    pub source_username: String,
    #[serde(default)]
    pub source_password: String,
    #[serde(default)]
    pub source_db_name: String,
    #[serde(default)]
    pub target_account_id: String,
    #[serde(default)]
    pub target_username: String,
    #[serde(default)]
    pub target_private_key_location: String,
    #[serde(default)]
    pub target_role: String,
    #[serde(default)]
    pub target_warehouse: String,
    #[serde(default)]
    pub target_aws_region: String,
    #[serde(default)]
    pub target_db_name: String,
    #[serde(default)]
    pub target_storage_integration: String,
    #[serde(default)]
    pub target_division_code: String,
    #[serde(default)]
    pub target_root_name: String,
    #[serde(default)]
    pub concurrency: usize,
    #[serde(default)]
    pub chunk_size: usize,
}
