//! Object-store uploader for CSV chunks.

use aws_sdk_s3::primitives::ByteStream;
use tracing::debug;

use crate::config::S3Config;
use crate::error::{Result, TransferError};
use crate::util::random_characters;

/// Length of the random object-key suffix. 32 alphanumerics keep collision
/// probability negligible within a transfer.
const KEY_SUFFIX_LEN: usize = 32;

/// Uploads chunks under `{dir}/{transfer_id}/{table_dir}/{random}`.
///
/// Retries and backoff are delegated to the SDK.
pub struct S3Uploader {
    client: aws_sdk_s3::Client,
    bucket: String,
    dir: String,
}

impl S3Uploader {
    /// Build an uploader from the object-store descriptor.
    pub async fn new(config: &S3Config) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        Self {
            client: aws_sdk_s3::Client::new(&sdk_config),
            bucket: config.bucket.clone(),
            dir: config.dir.clone(),
        }
    }

    /// Key prefix shared by every chunk of one table in one transfer.
    pub fn table_prefix(&self, transfer_id: &str, table_dir: &str) -> String {
        format!("{}/{}/{}/", self.dir, transfer_id, table_dir)
    }

    /// The `s3://` URL the warehouse COPY statement reads from.
    pub fn copy_location(&self, transfer_id: &str, table_dir: &str) -> String {
        format!(
            "s3://{}/{}",
            self.bucket,
            self.table_prefix(transfer_id, table_dir)
        )
    }

    /// Upload one chunk under a fresh random key. Returns the key used.
    pub async fn upload_chunk(
        &self,
        transfer_id: &str,
        table_dir: &str,
        body: Vec<u8>,
    ) -> Result<String> {
        let key = format!(
            "{}{}",
            self.table_prefix(transfer_id, table_dir),
            random_characters(KEY_SUFFIX_LEN)
        );
        let size = body.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| TransferError::Upload {
                key: key.clone(),
                message: e.to_string(),
            })?;

        debug!("Uploaded {} bytes to s3://{}/{}", size, self.bucket, key);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> S3Config {
        S3Config {
            bucket: "bucket".into(),
            dir: "dir".into(),
            region: "us-west-2".into(),
            chunk_size: 100_000_000,
        }
    }

    #[tokio::test]
    async fn test_table_prefix_layout() {
        let uploader = S3Uploader::new(&test_config()).await;
        assert_eq!(
            uploader.table_prefix("abc123", "dboCustomers"),
            "dir/abc123/dboCustomers/"
        );
    }

    #[tokio::test]
    async fn test_copy_location() {
        let uploader = S3Uploader::new(&test_config()).await;
        assert_eq!(
            uploader.copy_location("abc123", "dboCustomers"),
            "s3://bucket/dir/abc123/dboCustomers/"
        );
    }
}
