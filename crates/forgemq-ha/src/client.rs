//! Slave-side replication client.
//!
//! One task maintains the outbound connection to the master: it reports
//! the slave's max physical offset (on connect, on a heartbeat interval,
//! and whenever a dispatched frame advances the local log), reassembles
//! the master's transfer frames, and appends their bodies to the local
//! commit log.
//!
//! The first complete frame after connect is the integrity gate: a
//! nonzero local log whose tail does not equal the frame offset has
//! diverged from the master and must be rebuilt from a snapshot; the
//! client closes the connection and does not attempt partial
//! resynchronization.

use crate::assembler::FrameAssembler;
use crate::config::HaConfig;
use crate::error::{HaError, Result};
use forgemq_store::CommitLog;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Slave-side client streaming the master's commit log.
pub struct HaClient {
    config: HaConfig,
    log: Arc<CommitLog>,
    master_address: Mutex<Option<String>>,
    shutdown: AtomicBool,
}

impl HaClient {
    pub fn new(config: HaConfig, log: Arc<CommitLog>) -> Self {
        Self {
            config,
            log,
            master_address: Mutex::new(None),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Set (or change) the master to replicate from.
    pub fn update_master_address(&self, addr: impl Into<String>) {
        let addr = addr.into();
        let mut current = self.master_address.lock();
        if current.as_deref() != Some(addr.as_str()) {
            info!(old = ?current.as_deref(), new = %addr, "master address updated");
            *current = Some(addr);
        }
    }

    pub fn master_address(&self) -> Option<String> {
        self.master_address.lock().clone()
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Spawn the connect/serve loop.
    pub fn run(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if self.shutdown.load(Ordering::Acquire) {
                    break;
                }

                let Some(addr) = self.master_address() else {
                    if wait_or_shutdown(&mut shutdown_rx, self.config.connect_retry_interval).await
                    {
                        break;
                    }
                    continue;
                };

                let stream = match TcpStream::connect(&addr).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!(master = %addr, error = %e, "connect to master failed");
                        if wait_or_shutdown(&mut shutdown_rx, self.config.connect_retry_interval)
                            .await
                        {
                            break;
                        }
                        continue;
                    }
                };

                info!(master = %addr, "connected to master");
                match self.serve(stream, &mut shutdown_rx).await {
                    Ok(()) => break,
                    Err(e) if e.is_fatal() => {
                        error!(
                            master = %addr,
                            error = %e,
                            "replication stream diverged, slave must be rebuilt from a snapshot"
                        );
                    }
                    Err(e) => {
                        warn!(master = %addr, error = %e, "replication connection lost");
                    }
                }

                if wait_or_shutdown(&mut shutdown_rx, self.config.connect_retry_interval).await {
                    break;
                }
            }

            info!("ha client stopped");
        })
    }

    /// Drive one established connection until shutdown or error.
    async fn serve(
        &self,
        stream: TcpStream,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<()> {
        let (mut read_half, mut write_half) = stream.into_split();
        let mut assembler = FrameAssembler::new(self.config.read_buffer_size);

        // the first report doubles as registration: it tells the master
        // where to start streaming
        let mut reported_offset = self.log.max_physical_offset();
        report_offset(&mut write_half, reported_offset).await?;

        let mut last_report = Instant::now();
        let mut last_read = Instant::now();
        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => return Ok(()),
                result = read_half.read(assembler.writable()) => {
                    let read_size = result?;
                    if read_size == 0 {
                        return Err(HaError::ConnectionClosed);
                    }
                    last_read = Instant::now();
                    assembler.advance(read_size);
                    assembler.drain(|offset, body| self.apply_frame(offset, body))?;

                    let local_max = self.log.max_physical_offset();
                    if local_max > reported_offset {
                        reported_offset = local_max;
                        report_offset(&mut write_half, reported_offset).await?;
                        last_report = Instant::now();
                    }
                }
                _ = heartbeat.tick() => {
                    if self.shutdown.load(Ordering::Acquire) {
                        return Ok(());
                    }
                    if last_read.elapsed() >= self.config.housekeeping_interval {
                        warn!("master silent past housekeeping interval, reconnecting");
                        return Err(HaError::MasterSilent {
                            silent_ms: last_read.elapsed().as_millis() as u64,
                        });
                    }
                    if last_report.elapsed() >= self.config.heartbeat_interval {
                        reported_offset = reported_offset.max(self.log.max_physical_offset());
                        report_offset(&mut write_half, reported_offset).await?;
                        last_report = Instant::now();
                    }
                }
            }
        }
    }

    /// Apply one reassembled frame to the local log.
    fn apply_frame(&self, master_phy_offset: i64, body: &[u8]) -> Result<()> {
        let slave_phy_offset = self.log.max_physical_offset();
        // an empty local log accepts any starting offset; otherwise the
        // streams must line up exactly
        if slave_phy_offset != 0 && slave_phy_offset != master_phy_offset {
            return Err(HaError::Diverged {
                slave_offset: slave_phy_offset,
                master_offset: master_phy_offset,
            });
        }

        if !body.is_empty() {
            self.log.append_at(master_phy_offset, body)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for HaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HaClient")
            .field("master_address", &self.master_address())
            .finish()
    }
}

async fn report_offset(write_half: &mut OwnedWriteHalf, offset: i64) -> Result<()> {
    write_half.write_all(&offset.to_be_bytes()).await?;
    Ok(())
}

/// Sleep for `interval`, returning true if shutdown arrived first.
async fn wait_or_shutdown(shutdown: &mut broadcast::Receiver<()>, interval: Duration) -> bool {
    tokio::select! {
        _ = shutdown.recv() => true,
        _ = tokio::time::sleep(interval) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn client(dir: &TempDir) -> HaClient {
        let log = Arc::new(CommitLog::open(&dir.path().join("commitlog")).unwrap());
        HaClient::new(HaConfig::default(), log)
    }

    #[test]
    fn test_empty_log_accepts_any_first_frame() {
        let dir = TempDir::new().unwrap();
        let client = client(&dir);

        client.apply_frame(600, b"bootstrap").unwrap();
        assert_eq!(client.log.max_physical_offset(), 609);
    }

    #[test]
    fn test_matching_frames_append_in_order() {
        let dir = TempDir::new().unwrap();
        let client = client(&dir);

        client.apply_frame(0, b"aaaa").unwrap();
        client.apply_frame(4, b"bbbb").unwrap();
        assert_eq!(client.log.max_physical_offset(), 8);

        let bytes = client.log.read_slice(0, 16).unwrap().unwrap();
        assert_eq!(&bytes[..], b"aaaabbbb");
    }

    #[test]
    fn test_offset_mismatch_is_divergence() {
        let dir = TempDir::new().unwrap();
        let client = client(&dir);

        client.apply_frame(0, &vec![0u8; 500]).unwrap();
        let err = client.apply_frame(600, b"gap").unwrap_err();
        assert!(matches!(
            err,
            HaError::Diverged {
                slave_offset: 500,
                master_offset: 600
            }
        ));
        // the local log is untouched by the rejected frame
        assert_eq!(client.log.max_physical_offset(), 500);
    }

    #[test]
    fn test_heartbeat_frame_at_tail_is_accepted() {
        let dir = TempDir::new().unwrap();
        let client = client(&dir);

        client.apply_frame(0, b"data").unwrap();
        client.apply_frame(4, &[]).unwrap();
        assert_eq!(client.log.max_physical_offset(), 4);
    }

    #[test]
    fn test_update_master_address_tracks_change() {
        let dir = TempDir::new().unwrap();
        let client = client(&dir);

        assert!(client.master_address().is_none());
        client.update_master_address("127.0.0.1:10912");
        assert_eq!(
            client.master_address().as_deref(),
            Some("127.0.0.1:10912")
        );
    }
}
