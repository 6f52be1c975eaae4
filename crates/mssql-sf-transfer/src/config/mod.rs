//! Transfer descriptors and submission validation.

mod types;
mod validation;

pub use types::*;
pub use validation::validate;

use crate::transfer::chunk::DEFAULT_CHUNK_SIZE;

impl TransferRequest {
    /// Split a validated submission into descriptors, applying defaults for
    /// omitted numeric fields (concurrency 20, chunk size 100 MB).
    pub fn into_parts(self) -> (SourceConfig, TargetConfig, S3Config, usize) {
        let concurrency = if self.concurrency == 0 {
            DEFAULT_CONCURRENCY
        } else {
            self.concurrency
        };
        let chunk_size = if self.chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            self.chunk_size
        };

        let source = SourceConfig {
            host: self.source_host,
            port: self.source_port,
            username: self.source_username,
            password: self.source_password,
            db_name: self.source_db_name,
        };

        let target = TargetConfig {
            account_id: self.target_account_id,
            username: self.target_username,
            private_key_location: self.target_private_key_location,
            role: self.target_role,
            warehouse: self.target_warehouse,
            aws_region: self.target_aws_region,
            db_name: self.target_db_name,
            storage_integration: self.target_storage_integration,
            division_code: self.target_division_code,
            root_name: self.target_root_name,
        };

        let s3 = S3Config {
            bucket: self.aws_config_s3_bucket,
            dir: self.aws_config_s3_dir,
            region: self.aws_config_region,
            chunk_size,
        };

        (source, target, s3, concurrency)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn valid_request() -> TransferRequest {
        TransferRequest {
            aws_config_s3_bucket: "bucket".into(),
            aws_config_s3_dir: "dir".into(),
            aws_config_region: "us-west-2".into(),
            source_host: "mssql.internal".into(),
            source_port: 1433,
            source_username: "sa".into(),
            source_password: "secret".into(),
            source_db_name: "SALES".into(),
            target_account_id: "org-acct".into(),
            target_username: "LOADER".into(),
            target_private_key_location: "/keys/rsa_key.p8".into(),
            target_role: "SYSADMIN".into(),
            target_warehouse: "LOAD_WH".into(),
            target_aws_region: "us-west-2".into(),
            target_db_name: "ANALYTICS".into(),
            target_storage_integration: "S3_INT".into(),
            target_division_code: "PAC".into(),
            target_root_name: "ROOT".into(),
            concurrency: 0,
            chunk_size: 0,
        }
    }

    #[test]
    fn test_into_parts_applies_defaults() {
        let (source, target, s3, concurrency) = valid_request().into_parts();
        assert_eq!(concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(s3.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(source.port, 1433);
        assert_eq!(target.division_code, "PAC");
    }

    #[test]
    fn test_into_parts_keeps_explicit_values() {
        let mut req = valid_request();
        req.concurrency = 4;
        req.chunk_size = 1_000_000;
        let (_, _, s3, concurrency) = req.into_parts();
        assert_eq!(concurrency, 4);
        assert_eq!(s3.chunk_size, 1_000_000);
    }

    #[test]
    fn test_source_debug_redacts_password() {
        let (source, _, _, _) = valid_request().into_parts();
        let debug = format!("{:?}", source);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret"));
    }
}
