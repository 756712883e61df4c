//! Append-only commit log.
//!
//! The commit log is the broker's ground truth: a single append-only byte
//! stream addressed by physical offset. The index and the replicator only
//! need the narrow surface implemented here: append on the produce path,
//! offset-checked append on the replica path, contiguous slice reads for
//! the push loop, and a wakeup for pushers waiting on new bytes.
//!
//! On disk the file starts with an 8-byte big-endian base offset followed
//! by the raw log bytes. The base is 0 for a broker that starts empty and
//! is rebased once when an empty replica accepts its first frame from a
//! master that is already past offset 0.

use crate::error::{Result, StoreError};
use bytes::Bytes;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Notify;
use tracing::{debug, info};

const BASE_OFFSET_HEADER_SIZE: u64 = 8;

struct LogInner {
    file: File,
}

/// Append-only commit log backed by a single file.
pub struct CommitLog {
    path: PathBuf,
    inner: Mutex<LogInner>,
    base_offset: AtomicI64,
    max_offset: AtomicI64,
    data_ready: Notify,
}

impl CommitLog {
    /// Open (or create) the commit log at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();
        let base_offset = if len >= BASE_OFFSET_HEADER_SIZE {
            let mut header = [0u8; 8];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut header)?;
            i64::from_be_bytes(header)
        } else {
            file.set_len(BASE_OFFSET_HEADER_SIZE)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&0i64.to_be_bytes())?;
            0
        };

        let data_len = len.saturating_sub(BASE_OFFSET_HEADER_SIZE) as i64;
        let max_offset = base_offset + data_len;

        info!(
            path = %path.display(),
            base_offset,
            max_offset,
            "commit log opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(LogInner { file }),
            base_offset: AtomicI64::new(base_offset),
            max_offset: AtomicI64::new(max_offset),
            data_ready: Notify::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset one past the last byte in the log.
    pub fn max_physical_offset(&self) -> i64 {
        self.max_offset.load(Ordering::Acquire)
    }

    /// Offset of the first byte still present in the log.
    pub fn min_physical_offset(&self) -> i64 {
        self.base_offset.load(Ordering::Acquire)
    }

    /// Append bytes at the tail (produce path). Returns the physical
    /// offset of the first appended byte.
    pub fn append(&self, bytes: &[u8]) -> Result<i64> {
        let mut inner = self.inner.lock();
        let offset = self.max_offset.load(Ordering::Acquire);

        inner.file.seek(SeekFrom::End(0))?;
        inner.file.write_all(bytes)?;

        self.max_offset
            .store(offset + bytes.len() as i64, Ordering::Release);
        drop(inner);

        self.data_ready.notify_waiters();
        Ok(offset)
    }

    /// Append bytes at an explicit offset (replica replay path).
    ///
    /// An empty log accepts any starting offset and rebases to it; a
    /// non-empty log requires `offset` to equal the current tail.
    pub fn append_at(&self, offset: i64, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        let base = self.base_offset.load(Ordering::Acquire);
        let max = self.max_offset.load(Ordering::Acquire);

        if base == max && max == 0 && offset != 0 {
            debug!(offset, "rebasing empty commit log to first replicated offset");
            inner.file.seek(SeekFrom::Start(0))?;
            inner.file.write_all(&offset.to_be_bytes())?;
            self.base_offset.store(offset, Ordering::Release);
            self.max_offset.store(offset, Ordering::Release);
        } else if offset != max {
            return Err(StoreError::OffsetMismatch {
                expected: max,
                got: offset,
            });
        }

        inner.file.seek(SeekFrom::End(0))?;
        inner.file.write_all(bytes)?;
        self.max_offset
            .store(offset + bytes.len() as i64, Ordering::Release);
        drop(inner);

        self.data_ready.notify_waiters();
        Ok(())
    }

    /// Read up to `max_bytes` contiguous bytes starting at `offset`.
    ///
    /// Returns `None` when `offset` is at or past the tail. An offset
    /// below the start of the log is an error.
    pub fn read_slice(&self, offset: i64, max_bytes: usize) -> Result<Option<Bytes>> {
        let base = self.base_offset.load(Ordering::Acquire);
        let max = self.max_offset.load(Ordering::Acquire);

        if offset < base {
            return Err(StoreError::OffsetOutOfRange {
                offset,
                min: base,
                max,
            });
        }
        if offset >= max {
            return Ok(None);
        }

        let available = (max - offset) as usize;
        let len = available.min(max_bytes);
        let mut buf = vec![0u8; len];

        let mut inner = self.inner.lock();
        let pos = BASE_OFFSET_HEADER_SIZE + (offset - base) as u64;
        inner.file.seek(SeekFrom::Start(pos))?;
        inner.file.read_exact(&mut buf)?;

        Ok(Some(Bytes::from(buf)))
    }

    /// Wait until new bytes are appended. Used by the master push loop
    /// when a replica is caught up.
    pub async fn wait_for_data(&self) {
        self.data_ready.notified().await;
    }

    /// Flush log data to disk.
    pub fn flush(&self) -> Result<()> {
        let inner = self.inner.lock();
        inner.file.sync_all()?;
        Ok(())
    }
}

impl std::fmt::Debug for CommitLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitLog")
            .field("path", &self.path)
            .field("base_offset", &self.min_physical_offset())
            .field("max_offset", &self.max_physical_offset())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_read() {
        let dir = TempDir::new().unwrap();
        let log = CommitLog::open(&dir.path().join("commitlog")).unwrap();

        assert_eq!(log.max_physical_offset(), 0);
        let first = log.append(b"hello").unwrap();
        assert_eq!(first, 0);
        let second = log.append(b" world").unwrap();
        assert_eq!(second, 5);
        assert_eq!(log.max_physical_offset(), 11);

        let bytes = log.read_slice(0, 1024).unwrap().unwrap();
        assert_eq!(&bytes[..], b"hello world");

        let tail = log.read_slice(6, 1024).unwrap().unwrap();
        assert_eq!(&tail[..], b"world");

        assert!(log.read_slice(11, 1024).unwrap().is_none());
    }

    #[test]
    fn test_recovery_preserves_offsets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commitlog");

        {
            let log = CommitLog::open(&path).unwrap();
            log.append(b"0123456789").unwrap();
            log.flush().unwrap();
        }

        let log = CommitLog::open(&path).unwrap();
        assert_eq!(log.max_physical_offset(), 10);
        let bytes = log.read_slice(2, 4).unwrap().unwrap();
        assert_eq!(&bytes[..], b"2345");
    }

    #[test]
    fn test_append_at_requires_tail_offset() {
        let dir = TempDir::new().unwrap();
        let log = CommitLog::open(&dir.path().join("commitlog")).unwrap();

        log.append_at(0, b"abc").unwrap();
        let err = log.append_at(100, b"def").unwrap_err();
        assert!(matches!(
            err,
            StoreError::OffsetMismatch {
                expected: 3,
                got: 100
            }
        ));

        log.append_at(3, b"def").unwrap();
        assert_eq!(log.max_physical_offset(), 6);
    }

    #[test]
    fn test_empty_log_rebases_to_first_frame() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commitlog");

        {
            let log = CommitLog::open(&path).unwrap();
            log.append_at(600, b"replica bytes").unwrap();
            assert_eq!(log.min_physical_offset(), 600);
            assert_eq!(log.max_physical_offset(), 613);
            log.flush().unwrap();
        }

        // rebased offsets survive reopen
        let log = CommitLog::open(&path).unwrap();
        assert_eq!(log.min_physical_offset(), 600);
        assert_eq!(log.max_physical_offset(), 613);
        let bytes = log.read_slice(600, 7).unwrap().unwrap();
        assert_eq!(&bytes[..], b"replica");
    }
}
