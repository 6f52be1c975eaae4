//! Remote error sink shipping messages to CloudWatch Logs.

use aws_sdk_cloudwatchlogs::types::InputLogEvent;
use aws_sdk_cloudwatchlogs::Client;
use chrono::Utc;
use tracing::warn;

use crate::error::{Result, TransferError};

/// Fire-and-forget log shipper. Failures to ship are logged locally and
/// never fail the caller.
pub struct LogSink {
    client: Client,
    group: String,
    stream: String,
}

impl LogSink {
    /// Create the log group and stream, tolerating ones that already exist.
    pub async fn provision(client: Client, group: String, stream: String) -> Result<Self> {
        let created = client.create_log_group().log_group_name(&group).send().await;
        if let Err(e) = created {
            let service_err = e.into_service_error();
            if !service_err.is_resource_already_exists_exception() {
                return Err(TransferError::Config(format!(
                    "CreateLogGroup error: {}",
                    service_err
                )));
            }
        }

        let created = client
            .create_log_stream()
            .log_group_name(&group)
            .log_stream_name(&stream)
            .send()
            .await;
        if let Err(e) = created {
            let service_err = e.into_service_error();
            if !service_err.is_resource_already_exists_exception() {
                return Err(TransferError::Config(format!(
                    "CreateLogStream error: {}",
                    service_err
                )));
            }
        }

        Ok(Self {
            client,
            group,
            stream,
        })
    }

    /// Ship one message asynchronously.
    pub fn ship(&self, message: String) {
        let client = self.client.clone();
        let group = self.group.clone();
        let stream = self.stream.clone();

        tokio::spawn(async move {
            let event = InputLogEvent::builder()
                .message(message)
                .timestamp(Utc::now().timestamp_millis())
                .build();

            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    warn!("PutLogEvents build error: {}", e);
                    return;
                }
            };

            let result = client
                .put_log_events()
                .log_group_name(&group)
                .log_stream_name(&stream)
                .log_events(event)
                .send()
                .await;

            if let Err(e) = result {
                warn!("PutLogEvents error: {}", e);
            }
        });
    }
}
