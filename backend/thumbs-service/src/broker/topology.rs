//! Exchange and queue declarations
//!
//! Everything is declared durable and non-auto-deleted, so re-running the
//! declarations against an existing broker is a no-op.

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, ExchangeKind};
use thiserror::Error;
use tracing::info;

use crate::config::BrokerConfig;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Failed to declare exchange {name}: {source}")]
    Exchange { name: String, source: lapin::Error },

    #[error("Failed to declare queue {name}: {source}")]
    Queue { name: String, source: lapin::Error },

    #[error("Failed to bind queue {queue} to exchange {exchange}: {source}")]
    Bind {
        queue: String,
        exchange: String,
        source: lapin::Error,
    },
}

/// Declare a durable fanout exchange
pub async fn declare_exchange(channel: &Channel, name: &str) -> Result<(), TopologyError> {
    channel
        .exchange_declare(
            name,
            ExchangeKind::Fanout,
            ExchangeDeclareOptions {
                durable: true,
                auto_delete: false,
                internal: false,
                nowait: false,
                passive: false,
            },
            FieldTable::default(),
        )
        .await
        .map_err(|source| TopologyError::Exchange {
            name: name.to_string(),
            source,
        })?;

    info!(exchange = %name, "Exchange declared");
    Ok(())
}

/// Declare the durable work queue, dead-lettering to `dead_letter_exchange`
/// when one is set
pub async fn declare_queue(
    channel: &Channel,
    name: &str,
    dead_letter_exchange: Option<&str>,
) -> Result<(), TopologyError> {
    channel
        .queue_declare(
            name,
            QueueDeclareOptions {
                durable: true,
                exclusive: false,
                auto_delete: false,
                nowait: false,
                passive: false,
            },
            queue_arguments(dead_letter_exchange),
        )
        .await
        .map_err(|source| TopologyError::Queue {
            name: name.to_string(),
            source,
        })?;

    info!(queue = %name, dead_letter_exchange = ?dead_letter_exchange, "Queue declared");
    Ok(())
}

/// Bind `queue` to a fanout `exchange`; the routing key is ignored by fanout
pub async fn bind_queue(channel: &Channel, queue: &str, exchange: &str) -> Result<(), TopologyError> {
    channel
        .queue_bind(
            queue,
            exchange,
            "",
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|source| TopologyError::Bind {
            queue: queue.to_string(),
            exchange: exchange.to_string(),
            source,
        })?;

    info!(queue = %queue, exchange = %exchange, "Queue bound");
    Ok(())
}

/// Declare the exchanges and the work queue, then bind the queue to the
/// bucket exchange.
///
/// With a dead-letter exchange configured, the exchange and a parking queue
/// bound to it are declared first. A queue may only dead-letter to an
/// exchange that exists, and a fanout exchange with no bound queue discards
/// what it receives.
pub async fn declare_topology(channel: &Channel, config: &BrokerConfig) -> Result<(), TopologyError> {
    for exchange in exchanges(config) {
        declare_exchange(channel, exchange).await?;
    }

    if let Some(dlx) = config.dead_letter_exchange.as_deref() {
        let parking = dead_letter_queue(&config.queue);
        declare_queue(channel, &parking, None).await?;
        bind_queue(channel, &parking, dlx).await?;
    }

    declare_queue(channel, &config.queue, config.dead_letter_exchange.as_deref()).await?;
    bind_queue(channel, &config.queue, &config.bucket_exchange).await
}

/// Every exchange the service needs, in declaration order
fn exchanges(config: &BrokerConfig) -> Vec<&str> {
    let mut names = vec![config.bucket_exchange.as_str(), config.worker_exchange.as_str()];
    if let Some(dlx) = config.dead_letter_exchange.as_deref() {
        names.push(dlx);
    }
    names
}

/// Queue that holds messages dead-lettered from `queue`
pub fn dead_letter_queue(queue: &str) -> String {
    format!("{queue}.dead-letter")
}

fn queue_arguments(dead_letter_exchange: Option<&str>) -> FieldTable {
    let mut arguments = FieldTable::default();
    if let Some(exchange) = dead_letter_exchange {
        arguments.insert(
            "x-dead-letter-exchange".into(),
            AMQPValue::LongString(exchange.into()),
        );
    }
    arguments
}
