//! Completion message publisher

use async_trait::async_trait;
use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Channel};
use thiserror::Error;
use tracing::debug;

/// AMQP delivery mode for messages that survive a broker restart
const PERSISTENT: u8 = 2;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Publish channel is closed, cannot publish to {exchange}")]
    ChannelClosed { exchange: String },

    #[error("Failed to publish to {exchange}: {source}")]
    Transport {
        exchange: String,
        source: lapin::Error,
    },
}

/// Sends a payload to a fanout exchange
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, exchange: &str, payload: &[u8]) -> Result<(), PublishError>;
}

/// [`EventPublisher`] on a dedicated AMQP channel
pub struct AmqpPublisher {
    channel: Channel,
}

impl AmqpPublisher {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl EventPublisher for AmqpPublisher {
    async fn publish(&self, exchange: &str, payload: &[u8]) -> Result<(), PublishError> {
        if !self.channel.status().connected() {
            return Err(PublishError::ChannelClosed {
                exchange: exchange.to_string(),
            });
        }

        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT)
            .with_content_type("application/json".into());

        self.channel
            .basic_publish(
                exchange,
                "",
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await
            .map_err(|source| PublishError::Transport {
                exchange: exchange.to_string(),
                source,
            })?;

        debug!(exchange = %exchange, size = payload.len(), "Published message");
        Ok(())
    }
}
