//! Async front door to the [`UpdateCoordinator`].
//!
//! Producers (file watchers, loaders, network handlers) submit batches over a
//! bounded channel. A single task drains the channel and applies batches in
//! arrival order, so producers never contend on the writer lock themselves.

use std::sync::Arc;

use log::{debug, error};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::coordinator::{UpdateCoordinator, UpdateOp, UpdateReport};

/// Default channel capacity, in batches.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// The apply task has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("update queue is closed")]
pub struct QueueClosed;

struct QueuedBatch {
    ops: Vec<UpdateOp>,
    reply: Option<oneshot::Sender<UpdateReport>>,
}

/// Cloneable handle for submitting batches.
#[derive(Clone)]
pub struct UpdateQueue {
    tx: mpsc::Sender<QueuedBatch>,
}

impl UpdateQueue {
    /// Spawn the apply task on the current runtime.
    ///
    /// The task exits once every `UpdateQueue` handle has been dropped.
    pub fn spawn(coordinator: Arc<UpdateCoordinator>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<QueuedBatch>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(batch) = rx.recv().await {
                let coordinator = Arc::clone(&coordinator);
                let ops = batch.ops;
                let report = match tokio::task::spawn_blocking(move || coordinator.apply(ops)).await
                {
                    Ok(report) => report,
                    Err(e) => {
                        error!("Update batch panicked: {e}");
                        continue;
                    }
                };
                debug!("Applied queued batch, now at v{}", report.version);
                if let Some(reply) = batch.reply {
                    // Submitter may have given up waiting
                    let _ = reply.send(report);
                }
            }
            debug!("Update queue drained");
        });

        (Self { tx }, handle)
    }

    /// Submit a batch and wait for its report.
    pub async fn submit(&self, ops: Vec<UpdateOp>) -> Result<UpdateReport, QueueClosed> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(QueuedBatch {
                ops,
                reply: Some(reply),
            })
            .await
            .map_err(|_| QueueClosed)?;
        rx.await.map_err(|_| QueueClosed)
    }

    /// Submit a batch without waiting for it to be applied.
    pub async fn enqueue(&self, ops: Vec<UpdateOp>) -> Result<(), QueueClosed> {
        self.tx
            .send(QueuedBatch { ops, reply: None })
            .await
            .map_err(|_| QueueClosed)
    }
}
