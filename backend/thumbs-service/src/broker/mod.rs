//! RabbitMQ plumbing
//!
//! - Session: one connection with separate consume and publish channels
//! - Topology: durable fanout exchanges and the work queue
//! - Publisher: completion messages to the worker exchange
//! - Subscriber: receive loop driving the message handler

pub mod publisher;
pub mod subscriber;
pub mod topology;

use lapin::{Channel, Connection, ConnectionProperties};
use thiserror::Error;
use tracing::{info, warn};

pub use publisher::{AmqpPublisher, EventPublisher, PublishError};
pub use subscriber::{IncomingDelivery, Subscriber, SubscriberError};
pub use topology::{dead_letter_queue, declare_topology, TopologyError};

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Failed to connect to RabbitMQ: {0}")]
    Connect(#[source] lapin::Error),

    #[error("Failed to open {purpose} channel: {source}")]
    Channel {
        purpose: &'static str,
        source: lapin::Error,
    },
}

/// Broker connection owned by the process top level.
///
/// Consuming and publishing use their own channels so neither has to share
/// a writer with the other.
pub struct BrokerSession {
    connection: Connection,
    consume_channel: Channel,
    publish_channel: Channel,
}

impl BrokerSession {
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(BrokerError::Connect)?;
        info!("Connected to RabbitMQ");

        let consume_channel =
            connection
                .create_channel()
                .await
                .map_err(|source| BrokerError::Channel {
                    purpose: "consume",
                    source,
                })?;
        let publish_channel =
            connection
                .create_channel()
                .await
                .map_err(|source| BrokerError::Channel {
                    purpose: "publish",
                    source,
                })?;
        info!(
            consume_channel = consume_channel.id(),
            publish_channel = publish_channel.id(),
            "Broker channels opened"
        );

        Ok(Self {
            connection,
            consume_channel,
            publish_channel,
        })
    }

    pub fn consume_channel(&self) -> &Channel {
        &self.consume_channel
    }

    pub fn publish_channel(&self) -> &Channel {
        &self.publish_channel
    }

    /// Close both channels, then the connection. Errors are logged; the
    /// process is on its way out either way.
    pub async fn close(self) {
        for (purpose, channel) in [
            ("consume", &self.consume_channel),
            ("publish", &self.publish_channel),
        ] {
            if channel.status().connected() {
                if let Err(e) = channel.close(200, "shutdown").await {
                    warn!(channel = purpose, error = %e, "Failed to close broker channel");
                }
            }
        }

        if self.connection.status().connected() {
            if let Err(e) = self.connection.close(200, "shutdown").await {
                warn!(error = %e, "Failed to close broker connection");
                return;
            }
        }
        info!("Broker connection closed");
    }
}
