//! Receive loop for the work queue
//!
//! Each delivery is decoded and handed to the message handler, then settled:
//!
//! | outcome                     | settlement                        |
//! |-----------------------------|-----------------------------------|
//! | handled                     | ack                               |
//! | undecodable body            | reject, no requeue                |
//! | invalid message             | reject, no requeue                |
//! | worker failure              | nack, requeue per `NACK_REQUEUE`  |
//!
//! A bucket notification may name several photos. All of them are handled
//! and the delivery is settled by the worst outcome among them, so a
//! redelivery reprocesses the photos that already succeeded.
//!
//! Deliveries are processed one at a time. Shutdown is checked between
//! deliveries, so the one in flight always finishes and is settled.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, BasicRejectOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Consumer};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::BrokerConfig;
use crate::models::InboundMessage;
use crate::services::thumbnail::MessageHandler;

const CONSUMER_TAG: &str = "thumbs-service";

#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("Broker transport error: {0}")]
    Transport(#[from] lapin::Error),

    #[error("Delivery stream closed by the broker")]
    StreamClosed,
}

/// A received message that can be settled with the broker
#[async_trait]
pub trait IncomingDelivery: Send + Sync {
    fn payload(&self) -> &[u8];
    async fn ack(&self) -> Result<(), lapin::Error>;
    async fn nack(&self, requeue: bool) -> Result<(), lapin::Error>;
    async fn reject(&self, requeue: bool) -> Result<(), lapin::Error>;
}

#[async_trait]
impl IncomingDelivery for Delivery {
    fn payload(&self) -> &[u8] {
        &self.data
    }

    async fn ack(&self) -> Result<(), lapin::Error> {
        self.acker.ack(BasicAckOptions::default()).await
    }

    async fn nack(&self, requeue: bool) -> Result<(), lapin::Error> {
        self.acker
            .nack(BasicNackOptions {
                multiple: false,
                requeue,
            })
            .await
    }

    async fn reject(&self, requeue: bool) -> Result<(), lapin::Error> {
        self.acker.reject(BasicRejectOptions { requeue }).await
    }
}

/// Apply the prefetch limit and start consuming the work queue
pub async fn start_consuming(channel: &Channel, config: &BrokerConfig) -> Result<Consumer, SubscriberError> {
    channel
        .basic_qos(config.prefetch_count, BasicQosOptions::default())
        .await?;

    let consumer = channel
        .basic_consume(
            &config.queue,
            CONSUMER_TAG,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!(
        queue = %config.queue,
        prefetch = config.prefetch_count,
        "Consuming work queue"
    );
    Ok(consumer)
}

pub struct Subscriber {
    handler: Arc<dyn MessageHandler>,
    nack_requeue: bool,
}

impl Subscriber {
    pub fn new(handler: Arc<dyn MessageHandler>, nack_requeue: bool) -> Self {
        Self {
            handler,
            nack_requeue,
        }
    }

    /// Run until `shutdown` turns true (`Ok`) or the transport fails (`Err`).
    ///
    /// A dropped shutdown sender counts as a shutdown request.
    pub async fn run<S, D>(
        &self,
        deliveries: S,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), SubscriberError>
    where
        S: Stream<Item = Result<D, lapin::Error>>,
        D: IncomingDelivery,
    {
        tokio::pin!(deliveries);
        info!("Subscriber loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }

                next = deliveries.next() => match next {
                    Some(Ok(delivery)) => self.dispatch(delivery).await?,
                    Some(Err(e)) => {
                        error!(error = %e, "Delivery stream failed");
                        return Err(SubscriberError::Transport(e));
                    }
                    None => {
                        error!("Delivery stream ended");
                        return Err(SubscriberError::StreamClosed);
                    }
                },
            }
        }

        info!("Shutdown requested, subscriber loop stopped");
        Ok(())
    }

    async fn dispatch<D: IncomingDelivery>(&self, delivery: D) -> Result<(), SubscriberError> {
        let messages = match InboundMessage::decode(delivery.payload()) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, size = delivery.payload().len(), "Dropping undecodable message");
                delivery.reject(false).await?;
                return Ok(());
            }
        };

        // Every photo in the delivery is attempted; the worst outcome settles it.
        let mut settlement = Settlement::Ack;
        for message in messages {
            let filename = message.filename.clone();
            match self.handler.handle(message).await {
                Ok(()) => debug!(filename = %filename, "Message handled"),
                Err(e) if !e.is_retryable() => {
                    warn!(filename = %filename, error = %e, "Message cannot succeed");
                    settlement = settlement.max(Settlement::Reject);
                }
                Err(e) => {
                    error!(
                        filename = %filename,
                        error = %e,
                        requeue = self.nack_requeue,
                        "Message processing failed"
                    );
                    settlement = Settlement::Nack;
                }
            }
        }

        match settlement {
            Settlement::Ack => {
                delivery.ack().await?;
                debug!("Delivery acknowledged");
            }
            Settlement::Reject => delivery.reject(false).await?,
            Settlement::Nack => delivery.nack(self.nack_requeue).await?,
        }
        Ok(())
    }
}

/// How a delivery is settled, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Settlement {
    Ack,
    Reject,
    Nack,
}
