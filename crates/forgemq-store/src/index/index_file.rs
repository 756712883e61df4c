//! Fixed-layout memory-mapped index file.
//!
//! # On-disk layout (all integers big-endian)
//!
//! ```text
//! ┌──────────────────┬──────────────────────┬───────────────────────────┐
//! │ header (40 B)    │ hash slots (4 B × S) │ entries (20 B × (N + 1))  │
//! └──────────────────┴──────────────────────┴───────────────────────────┘
//! header:  begin_timestamp i64 │ end_timestamp i64 │ begin_phy_offset i64
//!          │ end_phy_offset i64 │ hash_slot_count i32 │ index_count i32
//! entry:   key_hash i32 │ phy_offset i64 │ time_delta i32 │ prev_index i32
//! ```
//!
//! Each hash slot holds the entry index of the most recently inserted
//! entry for that bucket, 0 when empty. Entries chain newest-first
//! through `prev_index`, terminating at 0. Entry 0 is the sentinel chain
//! terminator, so `index_count` starts at 1 and the file allocates one
//! entry slot beyond the usable count.
//!
//! # Data Directory Exclusivity
//!
//! Index files are memory-mapped and must be treated as exclusive to the
//! broker process; external modification while the broker is running can
//! cause undefined behavior including SIGBUS signals.

use crate::error::{Result, StoreError};
use memmap2::MmapMut;
use parking_lot::RwLock;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

pub(crate) const INDEX_HEADER_SIZE: usize = 40;
pub(crate) const HASH_SLOT_SIZE: usize = 4;
pub(crate) const INDEX_ENTRY_SIZE: usize = 20;

const BEGIN_TIMESTAMP_POS: usize = 0;
const END_TIMESTAMP_POS: usize = 8;
const BEGIN_PHY_OFFSET_POS: usize = 16;
const END_PHY_OFFSET_POS: usize = 24;
const HASH_SLOT_COUNT_POS: usize = 32;
const INDEX_COUNT_POS: usize = 36;

/// Java-compatible nonnegative string hash: 31-polynomial over the UTF-16
/// code units accumulated in i32, negated if negative, with i32::MIN
/// (whose negation is itself) coerced to 0.
pub fn key_hash(key: &str) -> i32 {
    let mut hash: i32 = 0;
    for unit in key.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(unit as i32);
    }
    if hash < 0 {
        hash = hash.wrapping_neg();
    }
    if hash < 0 {
        hash = 0;
    }
    hash
}

/// One memory-mapped index file.
///
/// Header fields are cached in atomics for lock-free reads and written
/// through to the mapping under the write lock; the mapping itself is
/// behind a read-write lock so queries proceed concurrently while puts
/// and `destroy` are exclusive.
pub struct IndexFile {
    path: PathBuf,
    hash_slot_count: u32,
    max_index_count: u32,
    mmap: RwLock<Option<MmapMut>>,
    begin_timestamp: AtomicI64,
    end_timestamp: AtomicI64,
    begin_phy_offset: AtomicI64,
    end_phy_offset: AtomicI64,
    index_count: AtomicU32,
}

impl IndexFile {
    fn total_size(hash_slot_count: u32, max_index_count: u32) -> u64 {
        (INDEX_HEADER_SIZE
            + hash_slot_count as usize * HASH_SLOT_SIZE
            + (max_index_count as usize + 1) * INDEX_ENTRY_SIZE) as u64
    }

    /// Create a new index file, optionally seeded with the sealed
    /// predecessor's end offset and timestamp so the file sequence stays
    /// contiguous across rollover.
    pub fn create(
        path: &Path,
        hash_slot_count: u32,
        max_index_count: u32,
        seed_end_phy_offset: i64,
        seed_end_timestamp: i64,
    ) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.set_len(Self::total_size(hash_slot_count, max_index_count))?;

        // SAFETY: the file is created by and exclusive to this process
        // and stays open for the lifetime of the mapping.
        let mut mmap = unsafe { MmapMut::map_mut(&file)? };

        let index_file = Self {
            path: path.to_path_buf(),
            hash_slot_count,
            max_index_count,
            mmap: RwLock::new(None),
            begin_timestamp: AtomicI64::new(0),
            end_timestamp: AtomicI64::new(0),
            begin_phy_offset: AtomicI64::new(0),
            end_phy_offset: AtomicI64::new(0),
            index_count: AtomicU32::new(1),
        };

        if seed_end_phy_offset > 0 {
            index_file
                .begin_phy_offset
                .store(seed_end_phy_offset, Ordering::Release);
            index_file
                .end_phy_offset
                .store(seed_end_phy_offset, Ordering::Release);
        }
        if seed_end_timestamp > 0 {
            index_file
                .begin_timestamp
                .store(seed_end_timestamp, Ordering::Release);
            index_file
                .end_timestamp
                .store(seed_end_timestamp, Ordering::Release);
        }

        index_file.write_header(&mut mmap);
        mmap[HASH_SLOT_COUNT_POS..HASH_SLOT_COUNT_POS + 4]
            .copy_from_slice(&(hash_slot_count as i32).to_be_bytes());
        *index_file.mmap.write() = Some(mmap);

        Ok(index_file)
    }

    /// Open an existing index file and load its header.
    pub fn open(path: &Path, hash_slot_count: u32, max_index_count: u32) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let expected = Self::total_size(hash_slot_count, max_index_count);
        let actual = file.metadata()?.len();
        if actual != expected {
            return Err(StoreError::IndexLoad {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("file size {} does not match layout size {}", actual, expected),
                ),
            });
        }

        // SAFETY: see `create`.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        let stored_slots =
            i32::from_be_bytes(mmap[HASH_SLOT_COUNT_POS..HASH_SLOT_COUNT_POS + 4].try_into().unwrap());
        if stored_slots != hash_slot_count as i32 {
            return Err(StoreError::IndexLoad {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "file declares {} hash slots, configuration expects {}",
                        stored_slots, hash_slot_count
                    ),
                ),
            });
        }

        let read_i64 = |pos: usize| i64::from_be_bytes(mmap[pos..pos + 8].try_into().unwrap());
        let index_count =
            i32::from_be_bytes(mmap[INDEX_COUNT_POS..INDEX_COUNT_POS + 4].try_into().unwrap());
        let begin_timestamp = read_i64(BEGIN_TIMESTAMP_POS);
        let end_timestamp = read_i64(END_TIMESTAMP_POS);
        let begin_phy_offset = read_i64(BEGIN_PHY_OFFSET_POS);
        let end_phy_offset = read_i64(END_PHY_OFFSET_POS);

        let index_file = Self {
            path: path.to_path_buf(),
            hash_slot_count,
            max_index_count,
            mmap: RwLock::new(Some(mmap)),
            begin_timestamp: AtomicI64::new(begin_timestamp),
            end_timestamp: AtomicI64::new(end_timestamp),
            begin_phy_offset: AtomicI64::new(begin_phy_offset),
            end_phy_offset: AtomicI64::new(end_phy_offset),
            index_count: AtomicU32::new(index_count.max(1) as u32),
        };

        Ok(index_file)
    }

    fn write_header(&self, mmap: &mut MmapMut) {
        mmap[BEGIN_TIMESTAMP_POS..BEGIN_TIMESTAMP_POS + 8]
            .copy_from_slice(&self.begin_timestamp.load(Ordering::Acquire).to_be_bytes());
        mmap[END_TIMESTAMP_POS..END_TIMESTAMP_POS + 8]
            .copy_from_slice(&self.end_timestamp.load(Ordering::Acquire).to_be_bytes());
        mmap[BEGIN_PHY_OFFSET_POS..BEGIN_PHY_OFFSET_POS + 8]
            .copy_from_slice(&self.begin_phy_offset.load(Ordering::Acquire).to_be_bytes());
        mmap[END_PHY_OFFSET_POS..END_PHY_OFFSET_POS + 8]
            .copy_from_slice(&self.end_phy_offset.load(Ordering::Acquire).to_be_bytes());
        mmap[INDEX_COUNT_POS..INDEX_COUNT_POS + 4]
            .copy_from_slice(&(self.index_count.load(Ordering::Acquire) as i32).to_be_bytes());
    }

    fn slot_pos(&self, slot: usize) -> usize {
        INDEX_HEADER_SIZE + slot * HASH_SLOT_SIZE
    }

    fn entry_pos(&self, index: u32) -> usize {
        INDEX_HEADER_SIZE
            + self.hash_slot_count as usize * HASH_SLOT_SIZE
            + index as usize * INDEX_ENTRY_SIZE
    }

    /// Insert one `(key, phy_offset, store_timestamp)` tuple.
    ///
    /// Returns `false` when the file is write-full; the caller rolls over
    /// to a fresh file. The six constituent writes are not atomic; crash
    /// recovery discards files written past the checkpoint timestamp.
    pub fn put_key(&self, key: &str, phy_offset: i64, store_timestamp: i64) -> bool {
        let mut guard = self.mmap.write();
        let Some(mmap) = guard.as_mut() else {
            return false;
        };

        let index_count = self.index_count.load(Ordering::Acquire);
        if index_count > self.max_index_count {
            return false;
        }

        let hash = key_hash(key);
        let slot = (hash as u32 % self.hash_slot_count) as usize;
        let slot_pos = self.slot_pos(slot);

        let mut prev_index =
            i32::from_be_bytes(mmap[slot_pos..slot_pos + 4].try_into().unwrap());
        // slot values outside the written entry range count as empty
        if prev_index < 0 || prev_index as u32 >= index_count {
            prev_index = 0;
        }

        let first_put = index_count <= 1;
        let begin_timestamp = if first_put {
            store_timestamp
        } else {
            self.begin_timestamp.load(Ordering::Acquire)
        };

        let delta = store_timestamp - begin_timestamp;
        let time_delta = if delta > i32::MAX as i64 || delta < i32::MIN as i64 {
            // replay far outside the file's epoch (e.g. slave catching up
            // after long downtime); recorded as 0 so the entry stays
            // reachable by key even though a time-ranged query may miss it
            warn!(
                file = %self.path.display(),
                delta_ms = delta,
                "time delta exceeds i32 range, storing 0"
            );
            0i32
        } else {
            delta as i32
        };

        let new_index = index_count;
        let pos = self.entry_pos(new_index);
        mmap[pos..pos + 4].copy_from_slice(&hash.to_be_bytes());
        mmap[pos + 4..pos + 12].copy_from_slice(&phy_offset.to_be_bytes());
        mmap[pos + 12..pos + 16].copy_from_slice(&time_delta.to_be_bytes());
        mmap[pos + 16..pos + 20].copy_from_slice(&prev_index.to_be_bytes());

        mmap[slot_pos..slot_pos + 4].copy_from_slice(&(new_index as i32).to_be_bytes());

        if first_put {
            self.begin_phy_offset.store(phy_offset, Ordering::Release);
            self.begin_timestamp
                .store(store_timestamp, Ordering::Release);
        }
        self.end_phy_offset
            .fetch_max(phy_offset, Ordering::AcqRel);
        self.end_timestamp
            .fetch_max(store_timestamp, Ordering::AcqRel);
        self.index_count.store(new_index + 1, Ordering::Release);

        self.write_header(mmap);
        true
    }

    /// Collect into `out` the physical offsets of entries matching `key`
    /// whose store timestamp lies in `[begin, end]`, newest-first, until
    /// `out` reaches `max_count` or the bucket chain terminates.
    pub fn select_phy_offsets(
        &self,
        out: &mut Vec<i64>,
        key: &str,
        max_count: usize,
        begin: i64,
        end: i64,
    ) {
        let guard = self.mmap.read();
        let Some(mmap) = guard.as_ref() else {
            return;
        };

        let hash = key_hash(key);
        let slot = (hash as u32 % self.hash_slot_count) as usize;
        let slot_pos = self.slot_pos(slot);
        let slot_value = i32::from_be_bytes(mmap[slot_pos..slot_pos + 4].try_into().unwrap());

        let index_count = self.index_count.load(Ordering::Acquire);
        let begin_timestamp = self.begin_timestamp.load(Ordering::Acquire);

        if slot_value <= 0 || slot_value as u32 >= index_count {
            return;
        }

        let mut next = slot_value as u32;
        // chain length can never exceed the number of written entries
        let mut remaining_steps = index_count;

        while next > 0 && next < index_count && remaining_steps > 0 {
            remaining_steps -= 1;
            if out.len() >= max_count {
                break;
            }

            let pos = self.entry_pos(next);
            let entry_hash = i32::from_be_bytes(mmap[pos..pos + 4].try_into().unwrap());
            let phy_offset = i64::from_be_bytes(mmap[pos + 4..pos + 12].try_into().unwrap());
            let time_delta =
                i32::from_be_bytes(mmap[pos + 12..pos + 16].try_into().unwrap());
            let prev_index =
                i32::from_be_bytes(mmap[pos + 16..pos + 20].try_into().unwrap());

            let timestamp = begin_timestamp + time_delta as i64;
            if entry_hash == hash && timestamp >= begin && timestamp <= end {
                out.push(phy_offset);
            }

            if prev_index <= 0 || prev_index as u32 == next {
                break;
            }
            next = prev_index as u32;
        }
    }

    /// Closed-interval overlap between the file's time range and
    /// `[begin, end]`; false while either header timestamp is still zero.
    pub fn is_time_matched(&self, begin: i64, end: i64) -> bool {
        let begin_timestamp = self.begin_timestamp.load(Ordering::Acquire);
        let end_timestamp = self.end_timestamp.load(Ordering::Acquire);
        begin_timestamp > 0 && end_timestamp > 0 && begin <= end_timestamp && end >= begin_timestamp
    }

    pub fn is_write_full(&self) -> bool {
        self.index_count.load(Ordering::Acquire) > self.max_index_count
    }

    pub fn begin_timestamp(&self) -> i64 {
        self.begin_timestamp.load(Ordering::Acquire)
    }

    pub fn end_timestamp(&self) -> i64 {
        self.end_timestamp.load(Ordering::Acquire)
    }

    pub fn begin_phy_offset(&self) -> i64 {
        self.begin_phy_offset.load(Ordering::Acquire)
    }

    pub fn end_phy_offset(&self) -> i64 {
        self.end_phy_offset.load(Ordering::Acquire)
    }

    /// Count of entry slots consumed, including the sentinel.
    pub fn index_count(&self) -> u32 {
        self.index_count.load(Ordering::Acquire)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush the mapped region to disk.
    pub fn flush(&self) -> Result<()> {
        let guard = self.mmap.read();
        if let Some(mmap) = guard.as_ref() {
            mmap.flush()?;
        }
        Ok(())
    }

    /// Unmap and delete the file, waiting at most `timeout` for exclusive
    /// access. Returns true if the file is gone afterwards.
    pub fn destroy(&self, timeout: Duration) -> bool {
        let Some(mut guard) = self.mmap.try_write_for(timeout) else {
            warn!(
                file = %self.path.display(),
                timeout_ms = timeout.as_millis() as u64,
                "destroy could not acquire exclusive access in time"
            );
            return false;
        };

        if let Some(mmap) = guard.take() {
            if let Err(e) = mmap.flush() {
                warn!(file = %self.path.display(), error = %e, "flush before destroy failed");
            }
            drop(mmap);
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(file = %self.path.display(), "index file destroyed");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                error!(file = %self.path.display(), error = %e, "failed to delete index file");
                false
            }
        }
    }
}

impl std::fmt::Debug for IndexFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexFile")
            .field("path", &self.path)
            .field("index_count", &self.index_count())
            .field("begin_timestamp", &self.begin_timestamp())
            .field("end_timestamp", &self.end_timestamp())
            .field("begin_phy_offset", &self.begin_phy_offset())
            .field("end_phy_offset", &self.end_phy_offset())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn small_file(dir: &TempDir, name: &str, slots: u32, entries: u32) -> IndexFile {
        IndexFile::create(&dir.path().join(name), slots, entries, 0, 0).unwrap()
    }

    #[test]
    fn test_key_hash_matches_reference_values() {
        // values computed with the 31-polynomial reference hash
        assert_eq!(key_hash(""), 0);
        assert_eq!(key_hash("a"), 97);
        assert_eq!(key_hash("ab"), 97 * 31 + 98);
        assert!(key_hash("TopicTest#OrderID001") >= 0);
        // a key whose raw hash is negative still maps to a nonnegative value
        assert!(key_hash("polygenelubricants") >= 0);
    }

    #[test]
    fn test_put_and_select() {
        let dir = TempDir::new().unwrap();
        let file = small_file(&dir, "20240101000000000", 4, 100);

        assert!(file.put_key("A#x", 1000, 5000));
        assert!(file.put_key("A#y", 2000, 5100));

        let mut out = Vec::new();
        file.select_phy_offsets(&mut out, "A#x", 10, 0, i64::MAX);
        assert_eq!(out, vec![1000]);

        out.clear();
        file.select_phy_offsets(&mut out, "A#y", 10, 0, i64::MAX);
        assert_eq!(out, vec![2000]);

        assert_eq!(file.begin_timestamp(), 5000);
        assert_eq!(file.end_timestamp(), 5100);
        assert_eq!(file.begin_phy_offset(), 1000);
        assert_eq!(file.end_phy_offset(), 2000);
    }

    #[test]
    fn test_time_range_filter() {
        let dir = TempDir::new().unwrap();
        let file = small_file(&dir, "20240101000000000", 4, 100);

        assert!(file.put_key("A#x", 1000, 5000));

        let mut out = Vec::new();
        file.select_phy_offsets(&mut out, "A#x", 10, 6000, 7000);
        assert!(out.is_empty());

        file.select_phy_offsets(&mut out, "A#x", 10, 5000, 5000);
        assert_eq!(out, vec![1000]);
    }

    #[test]
    fn test_same_key_returns_newest_first() {
        let dir = TempDir::new().unwrap();
        let file = small_file(&dir, "20240101000000000", 4, 100);

        for i in 0..5i64 {
            assert!(file.put_key("A#x", 1000 + i, 5000 + i));
        }

        let mut out = Vec::new();
        file.select_phy_offsets(&mut out, "A#x", 10, 0, i64::MAX);
        assert_eq!(out, vec![1004, 1003, 1002, 1001, 1000]);

        // max_count truncates the walk
        out.clear();
        file.select_phy_offsets(&mut out, "A#x", 2, 0, i64::MAX);
        assert_eq!(out, vec![1004, 1003]);
    }

    #[test]
    fn test_hash_collision_shares_bucket_chain() {
        let dir = TempDir::new().unwrap();
        // one slot: every key collides
        let file = small_file(&dir, "20240101000000000", 1, 100);

        assert!(file.put_key("A#first", 100, 5000));
        assert!(file.put_key("B#second", 200, 5001));

        // distinct hashes keep the entries distinguishable within the chain
        assert_ne!(key_hash("A#first"), key_hash("B#second"));

        let mut out = Vec::new();
        file.select_phy_offsets(&mut out, "A#first", 10, 0, i64::MAX);
        assert_eq!(out, vec![100]);

        out.clear();
        file.select_phy_offsets(&mut out, "B#second", 10, 0, i64::MAX);
        assert_eq!(out, vec![200]);
    }

    #[test]
    fn test_identical_hash_entries_both_returned() {
        let dir = TempDir::new().unwrap();
        let file = small_file(&dir, "20240101000000000", 4, 100);

        // same key twice: same hash, both offsets in the chain; the
        // caller disambiguates by re-reading the message
        assert!(file.put_key("A#dup", 100, 5000));
        assert!(file.put_key("A#dup", 200, 5001));

        let mut out = Vec::new();
        file.select_phy_offsets(&mut out, "A#dup", 10, 0, i64::MAX);
        assert_eq!(out, vec![200, 100]);
    }

    #[test]
    fn test_write_full_boundary() {
        let dir = TempDir::new().unwrap();
        let file = small_file(&dir, "20240101000000000", 4, 2);

        assert!(file.put_key("A#1", 100, 5000));
        assert!(file.put_key("A#2", 200, 5001));
        assert!(!file.put_key("A#3", 300, 5002));
        assert!(file.is_write_full());
        assert_eq!(file.index_count(), 3); // sentinel + 2 entries

        // entries written before the file filled stay queryable
        let mut out = Vec::new();
        file.select_phy_offsets(&mut out, "A#2", 10, 0, i64::MAX);
        assert_eq!(out, vec![200]);
    }

    #[test]
    fn test_reload_preserves_queries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("20240101000000000");

        {
            let file = IndexFile::create(&path, 8, 16, 0, 0).unwrap();
            assert!(file.put_key("A#x", 1000, 5000));
            assert!(file.put_key("A#y", 2000, 5100));
            assert!(file.put_key("A#x", 3000, 5200));
            file.flush().unwrap();
        }

        let file = IndexFile::open(&path, 8, 16).unwrap();
        assert_eq!(file.begin_timestamp(), 5000);
        assert_eq!(file.end_timestamp(), 5200);
        assert_eq!(file.index_count(), 4);

        let mut out = Vec::new();
        file.select_phy_offsets(&mut out, "A#x", 10, 0, i64::MAX);
        assert_eq!(out, vec![3000, 1000]);
    }

    #[test]
    fn test_open_rejects_mismatched_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("20240101000000000");
        IndexFile::create(&path, 8, 16, 0, 0).unwrap();

        let err = IndexFile::open(&path, 16, 16).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_seeded_file_resets_begin_on_first_put() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("20240101000000001");
        let file = IndexFile::create(&path, 4, 16, 9000, 8000).unwrap();

        // seeds make the empty successor contiguous with its predecessor
        assert_eq!(file.begin_phy_offset(), 9000);
        assert_eq!(file.end_phy_offset(), 9000);

        assert!(file.put_key("A#x", 9500, 8500));
        assert_eq!(file.begin_phy_offset(), 9500);
        assert_eq!(file.begin_timestamp(), 8500);
    }

    #[test]
    fn test_out_of_range_time_delta_stored_as_zero() {
        let dir = TempDir::new().unwrap();
        let file = small_file(&dir, "20240101000000000", 4, 16);

        assert!(file.put_key("A#x", 100, 1000));
        // ~68 years past the file epoch overflows the i32 delta
        let far_future = 1000 + i32::MAX as i64 + 10_000;
        assert!(file.put_key("A#y", 200, far_future));

        // the entry is reachable by key at the epoch timestamp
        let mut out = Vec::new();
        file.select_phy_offsets(&mut out, "A#y", 10, 1000, 1000);
        assert_eq!(out, vec![200]);
    }

    #[test]
    fn test_destroy_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("20240101000000000");
        let file = IndexFile::create(&path, 4, 16, 0, 0).unwrap();

        assert!(file.put_key("A#x", 100, 1000));
        assert!(file.destroy(Duration::from_millis(100)));
        assert!(!path.exists());

        // queries against a destroyed file return nothing
        let mut out = Vec::new();
        file.select_phy_offsets(&mut out, "A#x", 10, 0, i64::MAX);
        assert!(out.is_empty());
    }

    #[test]
    fn test_is_time_matched() {
        let dir = TempDir::new().unwrap();
        let file = small_file(&dir, "20240101000000000", 4, 16);

        // no puts yet: both header timestamps are zero
        assert!(!file.is_time_matched(0, i64::MAX));

        assert!(file.put_key("A#x", 100, 5000));
        assert!(file.put_key("A#y", 200, 6000));

        assert!(!file.is_time_matched(4000, 4999));
        assert!(file.is_time_matched(4000, 5000));
        assert!(file.is_time_matched(5500, 5600));
        assert!(file.is_time_matched(6000, 9000));
        assert!(!file.is_time_matched(6001, 9000));
    }
}
