//! Master-side replication service.
//!
//! The service accepts slave connections on the HA port, tracks the
//! highest offset any slave has acknowledged, and exposes the two
//! surfaces the rest of the broker consumes: `is_slave_ok` for the
//! produce path and the group transfer gate for sync-replication waits.
//!
//! Every broker runs one `HaService`; on a slave the interesting half is
//! the embedded [`HaClient`], pointed at the master with
//! [`update_master_address`](HaService::update_master_address).

use crate::client::HaClient;
use crate::config::HaConfig;
use crate::connection::HaConnection;
use crate::error::Result;
use crate::gate::{GroupCommitRequest, GroupTransferGate};
use forgemq_store::CommitLog;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Master-side replication service.
pub struct HaService {
    config: HaConfig,
    log: Arc<CommitLog>,
    connection_count: AtomicUsize,
    connections: Mutex<Vec<Arc<HaConnection>>>,
    /// Highest offset acknowledged by any slave; monotone
    push2slave_max_offset: Arc<AtomicI64>,
    gate: Arc<GroupTransferGate>,
    client: Arc<HaClient>,
    shutdown_tx: broadcast::Sender<()>,
}

impl HaService {
    pub fn new(config: HaConfig, log: Arc<CommitLog>) -> Arc<Self> {
        let (shutdown_tx, _) = broadcast::channel(4);
        let push2slave_max_offset = Arc::new(AtomicI64::new(0));
        let gate = GroupTransferGate::new(push2slave_max_offset.clone());
        let client = Arc::new(HaClient::new(config.clone(), log.clone()));

        Arc::new(Self {
            config,
            log,
            connection_count: AtomicUsize::new(0),
            connections: Mutex::new(Vec::new()),
            push2slave_max_offset,
            gate,
            client,
            shutdown_tx,
        })
    }

    /// Bind the HA listener and spawn the accept loop, the group
    /// transfer gate, and the slave client. Returns the bound address.
    pub async fn start(self: &Arc<Self>) -> Result<SocketAddr> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "ha service listening");

        self.gate.run();
        self.client.clone().run(self.shutdown_tx.subscribe());

        let service = self.clone();
        tokio::spawn(async move { service.accept_loop(listener).await });

        Ok(local_addr)
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        let mut shutdown = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!(%peer, "slave connected");
                        let connection = HaConnection::spawn(&self, stream, peer);
                        self.add_connection(connection);
                    }
                    // keep accepting; a transient error must not end the loop
                    Err(e) => error!(error = %e, "accept failed"),
                },
            }
        }

        info!("ha accept loop stopped");
    }

    fn add_connection(&self, connection: Arc<HaConnection>) {
        self.connections.lock().push(connection);
        self.connection_count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn remove_connection(&self, connection: &Arc<HaConnection>) {
        let mut connections = self.connections.lock();
        let before = connections.len();
        connections.retain(|c| !Arc::ptr_eq(c, connection));
        if connections.len() < before {
            self.connection_count.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Raise `push2slave_max_offset` to `offset` if it is higher, then
    /// wake producers blocked on the gate. CAS retry keeps the offset
    /// monotone under concurrent acknowledgements.
    pub fn notify_transfer_some(&self, offset: i64) {
        let mut current = self.push2slave_max_offset.load(Ordering::Acquire);
        while offset > current {
            match self.push2slave_max_offset.compare_exchange(
                current,
                offset,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.gate.notify_transfer_some();
                    break;
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// True iff at least one slave is connected and the best slave lags
    /// the master's write position by less than the configured maximum.
    pub fn is_slave_ok(&self, master_write_offset: i64) -> bool {
        self.connection_count.load(Ordering::Acquire) > 0
            && master_write_offset - self.push2slave_max_offset.load(Ordering::Acquire)
                < self.config.slave_fallbehind_max
    }

    /// Enqueue a sync-replication producer wait.
    pub fn put_request(&self, request: GroupCommitRequest) {
        self.gate.put_request(request);
    }

    /// Block until `next_offset` is replicated or the wait times out.
    pub async fn wait_for_transfer(&self, next_offset: i64) -> bool {
        self.gate.wait_for_transfer(next_offset).await
    }

    /// Point the embedded slave client at a (new) master.
    pub fn update_master_address(&self, addr: impl Into<String>) {
        self.client.update_master_address(addr);
    }

    pub fn push2slave_max_offset(&self) -> i64 {
        self.push2slave_max_offset.load(Ordering::Acquire)
    }

    pub fn connection_count(&self) -> usize {
        self.connection_count.load(Ordering::Acquire)
    }

    pub fn gate(&self) -> &Arc<GroupTransferGate> {
        &self.gate
    }

    pub(crate) fn log(&self) -> &Arc<CommitLog> {
        &self.log
    }

    pub(crate) fn config(&self) -> &HaConfig {
        &self.config
    }

    pub(crate) fn shutdown_subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Stop every loop, fail pending producer waits, and close all
    /// slave connections.
    pub fn shutdown(&self) {
        info!("ha service shutting down");
        let _ = self.shutdown_tx.send(());
        self.client.shutdown();
        self.gate.shutdown();

        let drained: Vec<_> = self.connections.lock().drain(..).collect();
        for connection in drained {
            connection.close();
            self.connection_count.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl std::fmt::Debug for HaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HaService")
            .field("listen_addr", &self.config.listen_addr)
            .field("connection_count", &self.connection_count())
            .field("push2slave_max_offset", &self.push2slave_max_offset())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_log(dir: &TempDir) -> Arc<CommitLog> {
        Arc::new(CommitLog::open(&dir.path().join("commitlog")).unwrap())
    }

    #[tokio::test]
    async fn test_notify_transfer_some_is_monotone() {
        let dir = TempDir::new().unwrap();
        let service = HaService::new(HaConfig::default(), open_log(&dir));

        service.notify_transfer_some(1000);
        assert_eq!(service.push2slave_max_offset(), 1000);

        // stale acknowledgements never lower the offset
        service.notify_transfer_some(500);
        assert_eq!(service.push2slave_max_offset(), 1000);

        service.notify_transfer_some(2000);
        assert_eq!(service.push2slave_max_offset(), 2000);
    }

    #[tokio::test]
    async fn test_is_slave_ok_requires_connection() {
        let dir = TempDir::new().unwrap();
        let config = HaConfig::default().with_slave_fallbehind_max(1024);
        let service = HaService::new(config, open_log(&dir));

        // no connection: never ok, even with zero lag
        service.notify_transfer_some(1000);
        assert!(!service.is_slave_ok(1000));

        // fake one connection being tracked
        service.connection_count.fetch_add(1, Ordering::AcqRel);
        assert!(service.is_slave_ok(1000));
        assert!(service.is_slave_ok(1000 + 1023));
        assert!(!service.is_slave_ok(1000 + 1024));
    }
}
