//! Durable store checkpoint.
//!
//! A single small memory-mapped file records the timestamp of the last
//! message whose index entries are known to be on disk. Recovery after an
//! unclean shutdown trusts this value and discards index files written
//! past it.

use crate::error::Result;
use crc32fast::Hasher;
use memmap2::MmapMut;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::warn;

/// Record layout: index_msg_timestamp (8 bytes BE) + CRC32 of those bytes (4 bytes BE)
const RECORD_SIZE: usize = 12;
const CHECKPOINT_FILE_SIZE: u64 = 4096;

/// Memory-mapped checkpoint store.
pub struct StoreCheckpoint {
    mmap: Mutex<MmapMut>,
    index_msg_timestamp: AtomicI64,
}

impl StoreCheckpoint {
    /// Open (or create) the checkpoint file at `path`.
    ///
    /// A record whose CRC does not match is treated as absent: the
    /// timestamp loads as 0, which makes recovery discard every index
    /// file written since the last clean shutdown.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.set_len(CHECKPOINT_FILE_SIZE)?;

        // SAFETY: the file is exclusively owned by the broker process and
        // stays open for the lifetime of the mapping.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        let stored = i64::from_be_bytes(mmap[0..8].try_into().unwrap());
        let stored_crc = u32::from_be_bytes(mmap[8..12].try_into().unwrap());

        let mut hasher = Hasher::new();
        hasher.update(&mmap[0..8]);
        let computed = hasher.finalize();

        let timestamp = if computed == stored_crc {
            stored
        } else if stored == 0 && stored_crc == 0 {
            // freshly created file
            0
        } else {
            warn!(
                path = %path.display(),
                "checkpoint crc mismatch, treating index checkpoint as empty"
            );
            0
        };

        Ok(Self {
            mmap: Mutex::new(mmap),
            index_msg_timestamp: AtomicI64::new(timestamp),
        })
    }

    /// Store timestamp of the last durably indexed message, in ms.
    pub fn index_msg_timestamp(&self) -> i64 {
        self.index_msg_timestamp.load(Ordering::Acquire)
    }

    pub fn set_index_msg_timestamp(&self, timestamp: i64) {
        let mut mmap = self.mmap.lock();
        mmap[0..8].copy_from_slice(&timestamp.to_be_bytes());

        let mut hasher = Hasher::new();
        hasher.update(&timestamp.to_be_bytes());
        let crc = hasher.finalize();
        mmap[8..12].copy_from_slice(&crc.to_be_bytes());

        self.index_msg_timestamp.store(timestamp, Ordering::Release);
    }

    /// Flush the mapped record to disk.
    pub fn flush(&self) -> Result<()> {
        let mmap = self.mmap.lock();
        mmap.flush_range(0, RECORD_SIZE)?;
        Ok(())
    }
}

impl std::fmt::Debug for StoreCheckpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCheckpoint")
            .field("index_msg_timestamp", &self.index_msg_timestamp())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_checkpoint_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint");

        {
            let checkpoint = StoreCheckpoint::open(&path).unwrap();
            assert_eq!(checkpoint.index_msg_timestamp(), 0);

            checkpoint.set_index_msg_timestamp(1_700_000_000_123);
            checkpoint.flush().unwrap();
        }

        let reopened = StoreCheckpoint::open(&path).unwrap();
        assert_eq!(reopened.index_msg_timestamp(), 1_700_000_000_123);
    }

    #[test]
    fn test_corrupt_record_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint");

        {
            let checkpoint = StoreCheckpoint::open(&path).unwrap();
            checkpoint.set_index_msg_timestamp(42);
            checkpoint.flush().unwrap();
        }

        // Flip a byte of the stored timestamp without fixing the CRC.
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[3] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let reopened = StoreCheckpoint::open(&path).unwrap();
        assert_eq!(reopened.index_msg_timestamp(), 0);
    }
}
