//! Dispatch glue between the commit log and the index.
//!
//! The broker's reput loop reads each newly persisted message back off
//! the commit log and emits one [`DispatchRequest`] per message; the
//! [`DispatchService`] drains those requests into the index in strict
//! log order.

use crate::error::StoreError;
use crate::index::IndexService;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Separator between user keys inside one message's key property.
pub const KEY_SEPARATOR: &str = " ";

/// Transaction stage of a dispatched message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    None,
    Prepared,
    Commit,
    Rollback,
}

/// One committed log message, as seen by downstream indexers.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub topic: String,
    /// Space-separated user keys
    pub keys: String,
    /// Physical offset of the message in the commit log
    pub commit_log_offset: i64,
    pub msg_size: i32,
    /// Broker store timestamp, ms
    pub store_timestamp: i64,
    pub transaction: TransactionState,
}

/// Background task feeding dispatch requests into the index service.
pub struct DispatchService {
    handle: JoinHandle<()>,
}

impl DispatchService {
    /// Spawn the dispatch loop. The loop stops when the sender side of
    /// `requests` is dropped or a shutdown signal arrives.
    pub fn spawn(
        index: Arc<IndexService>,
        mut requests: mpsc::Receiver<DispatchRequest>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe_req = requests.recv() => {
                        let Some(req) = maybe_req else { break };
                        match index.build_index(&req).await {
                            Ok(()) => {}
                            Err(StoreError::IndexUnwritable) => {
                                // the latch is raised; reads keep working,
                                // this dispatch is abandoned
                                error!(
                                    offset = req.commit_log_offset,
                                    topic = %req.topic,
                                    "index unwritable, dispatch dropped"
                                );
                            }
                            Err(e) => {
                                error!(
                                    offset = req.commit_log_offset,
                                    error = %e,
                                    "index build failed"
                                );
                            }
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
            info!("dispatch service stopped");
        });

        Self { handle }
    }

    pub async fn join(self) {
        let _ = self.handle.await;
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}
