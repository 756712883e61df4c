//! Master-side connection to one slave.
//!
//! Each accepted socket is served by two sibling tasks: a read loop
//! consuming the slave's 8-byte acknowledgement reports, and a write
//! loop pushing framed commit-log bytes forward from the offset the
//! slave first asked for. Either task failing closes the connection and
//! removes it from the service's registry; the slave reconnects with
//! backoff.

use crate::config::HaConfig;
use crate::service::HaService;
use crate::wire::encode_frame;
use bytes::BytesMut;
use forgemq_store::CommitLog;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, error, info, warn};

/// State shared between one slave connection's read and write loops.
pub struct HaConnection {
    peer: SocketAddr,
    /// Offset the slave first asked to stream from; -1 until reported
    slave_request_offset: AtomicI64,
    /// Highest offset the slave confirmed written
    slave_ack_offset: AtomicI64,
    first_report: Notify,
    close_notify: Notify,
    closed: AtomicBool,
}

impl HaConnection {
    pub(crate) fn spawn(
        service: &Arc<HaService>,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> Arc<Self> {
        let connection = Arc::new(Self {
            peer,
            slave_request_offset: AtomicI64::new(-1),
            slave_ack_offset: AtomicI64::new(-1),
            first_report: Notify::new(),
            close_notify: Notify::new(),
            closed: AtomicBool::new(false),
        });

        let (read_half, write_half) = stream.into_split();

        tokio::spawn(read_loop(
            connection.clone(),
            Arc::downgrade(service),
            read_half,
            service.shutdown_subscribe(),
        ));
        tokio::spawn(write_loop(
            connection.clone(),
            Arc::downgrade(service),
            write_half,
            service.shutdown_subscribe(),
            service.log().clone(),
            service.config().clone(),
        ));

        connection
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn slave_ack_offset(&self) -> i64 {
        self.slave_ack_offset.load(Ordering::Acquire)
    }

    pub fn slave_request_offset(&self) -> i64 {
        self.slave_request_offset.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Drive both loops toward exit. Idempotent.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.close_notify.notify_waiters();
    }
}

impl std::fmt::Debug for HaConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HaConnection")
            .field("peer", &self.peer)
            .field("slave_request_offset", &self.slave_request_offset())
            .field("slave_ack_offset", &self.slave_ack_offset())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Shared exit path of both loops: the first one here unregisters the
/// connection, the sibling just observes the closed flag.
fn finish(connection: &Arc<HaConnection>, service: &Weak<HaService>) {
    let already_closed = connection.closed.swap(true, Ordering::AcqRel);
    connection.close_notify.notify_waiters();
    if !already_closed {
        if let Some(service) = service.upgrade() {
            service.remove_connection(connection);
        }
        info!(peer = %connection.peer, "ha connection closed");
    }
}

async fn read_loop(
    connection: Arc<HaConnection>,
    service: Weak<HaService>,
    mut read_half: OwnedReadHalf,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut report = [0u8; 8];

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = connection.close_notify.notified() => break,
            result = read_half.read_exact(&mut report) => {
                match result {
                    Ok(_) => {
                        let offset = i64::from_be_bytes(report);
                        if offset < 0 {
                            warn!(peer = %connection.peer, offset, "invalid ack offset from slave");
                            break;
                        }

                        connection.slave_ack_offset.store(offset, Ordering::Release);
                        if connection.slave_request_offset.load(Ordering::Acquire) < 0 {
                            connection.slave_request_offset.store(offset, Ordering::Release);
                            connection.first_report.notify_one();
                            info!(peer = %connection.peer, offset, "slave reported initial offset");
                        }

                        match service.upgrade() {
                            Some(service) => service.notify_transfer_some(offset),
                            None => break,
                        }
                    }
                    Err(e) => {
                        debug!(peer = %connection.peer, error = %e, "slave ack stream ended");
                        break;
                    }
                }
            }
        }
    }

    finish(&connection, &service);
}

async fn write_loop(
    connection: Arc<HaConnection>,
    service: Weak<HaService>,
    mut write_half: OwnedWriteHalf,
    mut shutdown: broadcast::Receiver<()>,
    log: Arc<CommitLog>,
    config: HaConfig,
) {
    // handshake: wait for the slave's first reported offset
    while connection.slave_request_offset.load(Ordering::Acquire) < 0 {
        tokio::select! {
            _ = shutdown.recv() => {
                finish(&connection, &service);
                return;
            }
            _ = connection.close_notify.notified() => {
                finish(&connection, &service);
                return;
            }
            _ = connection.first_report.notified() => {}
        }
    }

    let mut next_offset = connection.slave_request_offset.load(Ordering::Acquire);
    let log_start = log.min_physical_offset();
    if next_offset < log_start {
        // the requested bytes are already retired from the log; stream
        // from the oldest byte still present and let the slave's
        // divergence check decide whether it can accept the jump
        warn!(
            peer = %connection.peer,
            requested = next_offset,
            log_start,
            "slave requested offset below log start"
        );
        next_offset = log_start;
    }

    let mut frame = BytesMut::new();

    'serve: while !connection.is_closed() {
        match log.read_slice(next_offset, config.max_transfer_size) {
            Ok(Some(bytes)) if !bytes.is_empty() => {
                frame.clear();
                encode_frame(&mut frame, next_offset, &bytes);

                tokio::select! {
                    _ = shutdown.recv() => break 'serve,
                    _ = connection.close_notify.notified() => break 'serve,
                    result = write_half.write_all(&frame) => {
                        if let Err(e) = result {
                            warn!(peer = %connection.peer, error = %e, "push to slave failed");
                            break 'serve;
                        }
                    }
                }

                next_offset += bytes.len() as i64;
            }
            Ok(_) => {
                // slave is caught up: block until the log grows or a
                // heartbeat is due
                tokio::select! {
                    _ = shutdown.recv() => break 'serve,
                    _ = connection.close_notify.notified() => break 'serve,
                    _ = log.wait_for_data() => {}
                    _ = tokio::time::sleep(config.heartbeat_interval) => {
                        frame.clear();
                        encode_frame(&mut frame, next_offset, &[]);
                        if let Err(e) = write_half.write_all(&frame).await {
                            warn!(peer = %connection.peer, error = %e, "heartbeat to slave failed");
                            break 'serve;
                        }
                    }
                }
            }
            Err(e) => {
                error!(peer = %connection.peer, error = %e, "commit log read failed");
                break 'serve;
            }
        }
    }

    finish(&connection, &service);
}
