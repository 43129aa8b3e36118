use async_trait::async_trait;
use aws_sdk_sqs::{error::DisplayErrorContext, Client};
use tracing::{info, instrument};

use super::message::PackageMessage;
use crate::error::{ImportError, Result};
use crate::pipeline::{BlockMeta, Publisher};

/// Publishes block notifications to an SQS FIFO queue
#[derive(Clone)]
pub struct SqsPublisher {
    client: Client,
    queue_url: String,
    asset_id: String,
}

impl SqsPublisher {
    pub fn new(client: Client, queue_url: impl Into<String>, asset_id: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            asset_id: asset_id.into(),
        }
    }
}

#[async_trait]
impl Publisher for SqsPublisher {
    #[instrument(skip(self), fields(block_id = %block.uuid))]
    async fn publish(&self, block: &BlockMeta) -> Result<()> {
        let message = PackageMessage::new(&self.asset_id, block.uuid);
        let body = serde_json::to_string(&message)
            .map_err(|e| ImportError::Publish(format!("failed to encode message: {e}")))?;

        let response = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .message_group_id(message.group_id())
            .message_deduplication_id(message.deduplication_id())
            .send()
            .await
            .map_err(|e| ImportError::Publish(DisplayErrorContext(e).to_string()))?;

        info!(message_id = response.message_id().unwrap_or_default(), "Block published");
        Ok(())
    }
}
