//! Ordered collection of index files.
//!
//! The service routes writes to the mutable tail file, queries across the
//! whole sequence newest-first, seals full files through rollover, and
//! garbage-collects files whose indexed offsets fell behind log retention.
//!
//! Files are named by their creation timestamp as `yyyyMMddHHmmssSSS`, so
//! lexicographic directory order is chronological order.

use crate::checkpoint::StoreCheckpoint;
use crate::config::IndexConfig;
use crate::dispatch::{DispatchRequest, TransactionState, KEY_SEPARATOR};
use crate::error::{Result, StoreError};
use crate::flags::RunningFlags;
use crate::index::index_file::IndexFile;
use chrono::Utc;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const CREATE_RETRY_TIMES: usize = 3;
const CREATE_RETRY_DELAY: Duration = Duration::from_secs(1);
const DESTROY_TIMEOUT: Duration = Duration::from_secs(3);
const FILE_NAME_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Result of a key query.
#[derive(Debug, Clone, Default)]
pub struct QueryOffsetResult {
    /// Matching commit-log offsets, newest file first
    pub phy_offsets: Vec<i64>,
    /// End timestamp of the current tail file
    pub index_last_update_timestamp: i64,
    /// End physical offset of the current tail file
    pub index_last_update_phy_offset: i64,
}

/// Service owning the ordered sequence of index files.
pub struct IndexService {
    path: PathBuf,
    config: IndexConfig,
    checkpoint: Arc<StoreCheckpoint>,
    flags: Arc<RunningFlags>,
    files: RwLock<Vec<Arc<IndexFile>>>,
    shutdown: AtomicBool,
}

fn build_key(topic: &str, key: &str) -> String {
    format!("{}#{}", topic, key)
}

impl IndexService {
    pub fn new(
        path: PathBuf,
        config: IndexConfig,
        checkpoint: Arc<StoreCheckpoint>,
        flags: Arc<RunningFlags>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            path,
            config,
            checkpoint,
            flags,
            files: RwLock::new(Vec::new()),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Load index files from disk, oldest first.
    ///
    /// After an unclean shutdown, files whose `end_timestamp` exceeds the
    /// durable checkpoint are deleted instead of loaded: some of their
    /// entries may never have reached disk.
    pub fn load(&self, last_exit_ok: bool) -> Result<()> {
        let mut names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.len() == 17 && name.bytes().all(|b| b.is_ascii_digit()) {
                names.push(name);
            } else {
                warn!(file = %name, "skipping foreign file in index directory");
            }
        }
        names.sort();

        let mut files = self.files.write();
        for name in names {
            let path = self.path.join(&name);
            let file = IndexFile::open(
                &path,
                self.config.hash_slot_count,
                self.config.entries_per_file,
            )?;

            if !last_exit_ok && file.end_timestamp() > self.checkpoint.index_msg_timestamp() {
                info!(
                    file = %path.display(),
                    end_timestamp = file.end_timestamp(),
                    checkpoint = self.checkpoint.index_msg_timestamp(),
                    "discarding index file written past checkpoint"
                );
                file.destroy(Duration::ZERO);
                continue;
            }

            info!(file = %path.display(), "index file loaded");
            files.push(Arc::new(file));
        }

        Ok(())
    }

    /// Index every key of one dispatched message. Called once per
    /// committed log message, in dispatch order.
    pub async fn build_index(&self, req: &DispatchRequest) -> Result<()> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(StoreError::ShuttingDown);
        }

        // commit/rollback dispatches carry no new keys: the prepared
        // message was already indexed
        if matches!(
            req.transaction,
            TransactionState::Commit | TransactionState::Rollback
        ) {
            return Ok(());
        }

        let Some(mut file) = self.retry_get_and_create_index_file().await else {
            return Err(StoreError::IndexUnwritable);
        };

        // re-dispatch of an already indexed offset is a no-op
        if req.commit_log_offset < file.end_phy_offset() {
            return Ok(());
        }

        for key in req.keys.split(KEY_SEPARATOR) {
            if key.is_empty() {
                continue;
            }
            let indexed_key = build_key(&req.topic, key);
            while !file.put_key(&indexed_key, req.commit_log_offset, req.store_timestamp) {
                warn!(
                    file = %file.path().display(),
                    "index file full, rolling over"
                );
                file = match self.retry_get_and_create_index_file().await {
                    Some(next) => next,
                    None => return Err(StoreError::IndexUnwritable),
                };
            }
        }

        Ok(())
    }

    /// Look up commit-log offsets for `(topic, key)` within the closed
    /// time range `[begin, end]`, newest file first.
    pub fn query_offset(
        &self,
        topic: &str,
        key: &str,
        max_count: usize,
        begin: i64,
        end: i64,
    ) -> Result<QueryOffsetResult> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(StoreError::ShuttingDown);
        }

        let max_count = max_count.min(self.config.max_query_results);
        let indexed_key = build_key(topic, key);
        let mut result = QueryOffsetResult::default();

        let files = self.files.read();
        for (i, file) in files.iter().enumerate().rev() {
            if i == files.len() - 1 {
                result.index_last_update_timestamp = file.end_timestamp();
                result.index_last_update_phy_offset = file.end_phy_offset();
            }

            if file.is_time_matched(begin, end) {
                file.select_phy_offsets(&mut result.phy_offsets, &indexed_key, max_count, begin, end);
            }

            // every older file ends before this one begins
            if file.begin_timestamp() < begin {
                break;
            }
            if result.phy_offsets.len() >= max_count {
                break;
            }
        }

        Ok(result)
    }

    /// Destroy every non-tail file fully behind the log retention cutoff.
    pub fn delete_expired_files(&self, min_log_offset: i64) {
        let snapshot: Vec<Arc<IndexFile>> = {
            let files = self.files.read();
            match files.first() {
                Some(first) if first.end_phy_offset() < min_log_offset => files.clone(),
                _ => return,
            }
        };

        // the tail is the active write target and is never expired
        let mut expired = Vec::new();
        for file in snapshot.iter().take(snapshot.len().saturating_sub(1)) {
            if file.end_phy_offset() < min_log_offset {
                expired.push(file.clone());
            } else {
                break;
            }
        }
        if expired.is_empty() {
            return;
        }

        let mut files = self.files.write();
        for file in expired {
            if file.destroy(DESTROY_TIMEOUT) {
                files.retain(|f| !Arc::ptr_eq(f, &file));
            } else {
                // left in the list; the next retention sweep retries
                error!(file = %file.path().display(), "failed to destroy expired index file");
                break;
            }
        }
    }

    /// Flush every file and the checkpoint.
    pub fn flush_all(&self) -> Result<()> {
        let snapshot: Vec<Arc<IndexFile>> = self.files.read().clone();
        for file in snapshot {
            file.flush()?;
        }
        self.checkpoint.flush()
    }

    /// Latch the service shut and flush everything still mapped. Once
    /// raised, `build_index` and `query_offset` fail with
    /// [`StoreError::ShuttingDown`].
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        if let Err(e) = self.flush_all() {
            error!(error = %e, "index flush on shutdown failed");
        }
    }

    /// Destroy every index file and clear the list.
    pub fn destroy(&self) {
        let mut files = self.files.write();
        for file in files.iter() {
            file.destroy(DESTROY_TIMEOUT);
        }
        files.clear();
    }

    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }

    async fn retry_get_and_create_index_file(&self) -> Option<Arc<IndexFile>> {
        for attempt in 0..CREATE_RETRY_TIMES {
            if let Some(file) = self.get_and_create_last_index_file() {
                return Some(file);
            }
            error!(attempt, "failed to obtain writable index file, retrying");
            tokio::time::sleep(CREATE_RETRY_DELAY).await;
        }

        self.flags.mark_index_unwritable();
        error!("index marked unwritable after exhausted retries");
        None
    }

    /// Return the writable tail, rolling over to a fresh file when the
    /// tail is write-full. The sealed predecessor is flushed in the
    /// background together with the checkpoint timestamp.
    fn get_and_create_last_index_file(&self) -> Option<Arc<IndexFile>> {
        let mut seed_end_phy_offset = 0i64;
        let mut seed_end_timestamp = 0i64;
        let mut sealed: Option<Arc<IndexFile>> = None;

        {
            let files = self.files.read();
            if let Some(last) = files.last() {
                if !last.is_write_full() {
                    return Some(last.clone());
                }
                seed_end_phy_offset = last.end_phy_offset();
                seed_end_timestamp = last.end_timestamp();
                sealed = Some(last.clone());
            }
        }

        let file = {
            let mut files = self.files.write();
            // another writer may have rolled over while we waited
            if let Some(last) = files.last() {
                if !last.is_write_full() {
                    return Some(last.clone());
                }
            }

            let file = match self.create_index_file(seed_end_phy_offset, seed_end_timestamp) {
                Ok(file) => Arc::new(file),
                Err(e) => {
                    error!(error = %e, "index file creation failed");
                    return None;
                }
            };
            files.push(file.clone());
            file
        };

        if let Some(sealed) = sealed {
            let checkpoint = self.checkpoint.clone();
            tokio::task::spawn_blocking(move || flush_sealed(sealed, checkpoint));
        }

        Some(file)
    }

    fn create_index_file(
        &self,
        seed_end_phy_offset: i64,
        seed_end_timestamp: i64,
    ) -> Result<IndexFile> {
        let mut timestamp = Utc::now();
        loop {
            let name = timestamp.format(FILE_NAME_FORMAT).to_string();
            let path = self.path.join(&name);
            match IndexFile::create(
                &path,
                self.config.hash_slot_count,
                self.config.entries_per_file,
                seed_end_phy_offset,
                seed_end_timestamp,
            ) {
                Ok(file) => {
                    info!(file = %path.display(), "index file created");
                    return Ok(file);
                }
                Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    // rollover within the same millisecond
                    timestamp = timestamp + chrono::Duration::milliseconds(1);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Flush a sealed file; a write-full file also advances the durable
/// checkpoint to its end timestamp.
fn flush_sealed(file: Arc<IndexFile>, checkpoint: Arc<StoreCheckpoint>) {
    let timestamp = if file.is_write_full() {
        file.end_timestamp()
    } else {
        0
    };

    if let Err(e) = file.flush() {
        error!(file = %file.path().display(), error = %e, "sealed index file flush failed");
        return;
    }

    if timestamp > 0 {
        checkpoint.set_index_msg_timestamp(timestamp);
        if let Err(e) = checkpoint.flush() {
            error!(error = %e, "checkpoint flush failed");
        }
    }
}

impl std::fmt::Debug for IndexService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexService")
            .field("path", &self.path)
            .field("file_count", &self.file_count())
            .finish()
    }
}
