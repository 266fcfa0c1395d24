//! Process supervision
//!
//! The subscriber loop and the HTTP server run as separate tasks sharing one
//! shutdown channel. An interrupt is a clean stop; either task ending on its
//! own is fatal.

use anyhow::anyhow;
use std::future::Future;
use std::io;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::broker::SubscriberError;

/// How the supervised tasks ended
#[derive(Debug)]
pub enum Outcome {
    /// Operator asked the process to stop
    Interrupted,
    /// A task ended without being asked to
    Failed(anyhow::Error),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Interrupted => 0,
            Outcome::Failed(_) => 1,
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix
pub async fn shutdown_signal() -> io::Result<()> {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())?
            .recv()
            .await;
        Ok::<(), io::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<io::Result<()>>();

    tokio::select! {
        res = signal::ctrl_c() => {
            res?;
            info!("Received Ctrl+C signal");
        }
        res = terminate => {
            res?;
            info!("Received SIGTERM signal");
        }
    }
    Ok(())
}

/// Wait for `signal` or for either task to end.
///
/// Shutdown is always broadcast before returning. After a signal the
/// subscriber is awaited so its in-flight delivery is settled first.
pub async fn supervise<F>(
    signal: F,
    shutdown: &watch::Sender<bool>,
    mut subscriber: JoinHandle<Result<(), SubscriberError>>,
    mut server: JoinHandle<io::Result<()>>,
) -> Outcome
where
    F: Future<Output = io::Result<()>>,
{
    let outcome = tokio::select! {
        res = signal => match res {
            Ok(()) => {
                info!("Shutting down gracefully");
                let _ = shutdown.send(true);
                match (&mut subscriber).await {
                    Ok(Ok(())) => Outcome::Interrupted,
                    Ok(Err(e)) => Outcome::Failed(anyhow::Error::new(e).context("subscriber failed while draining")),
                    Err(e) => Outcome::Failed(anyhow::Error::new(e).context("subscriber task aborted")),
                }
            }
            Err(e) => Outcome::Failed(anyhow::Error::new(e).context("failed to listen for shutdown signal")),
        },
        res = &mut subscriber => Outcome::Failed(match res {
            Ok(Ok(())) => anyhow!("subscriber loop exited without a shutdown request"),
            Ok(Err(e)) => anyhow::Error::new(e).context("subscriber loop failed"),
            Err(e) => anyhow::Error::new(e).context("subscriber task aborted"),
        }),
        res = &mut server => Outcome::Failed(match res {
            Ok(Ok(())) => anyhow!("HTTP server stopped unexpectedly"),
            Ok(Err(e)) => anyhow::Error::new(e).context("HTTP server failed"),
            Err(e) => anyhow::Error::new(e).context("HTTP server task aborted"),
        }),
    };

    let _ = shutdown.send(true);
    if let Outcome::Failed(cause) = &outcome {
        error!(error = %format!("{cause:#}"), "Fatal error, shutting down");
    }
    outcome
}
