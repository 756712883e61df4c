//! Transfer-frame reassembly.
//!
//! The slave reads the master's stream into a fixed buffer and parses
//! whole frames out of it. Two equally sized buffers are kept: when the
//! read buffer fills up mid-frame, the unparsed tail is copied to the
//! front of the backup buffer and the two are swapped, so a frame that
//! spans the buffer boundary is parsed after compaction.

use crate::error::{HaError, Result};
use crate::wire::{peek_header, TRANSFER_HEADER_SIZE};

/// Two-buffer reassembler for master→slave transfer frames.
pub struct FrameAssembler {
    buffer_read: Vec<u8>,
    buffer_backup: Vec<u8>,
    /// End of the bytes received from the socket
    write_position: usize,
    /// End of the bytes already handed to the dispatch callback
    dispatch_position: usize,
}

impl FrameAssembler {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer_read: vec![0u8; capacity],
            buffer_backup: vec![0u8; capacity],
            write_position: 0,
            dispatch_position: 0,
        }
    }

    /// Free space for the next socket read. Never empty after a
    /// preceding [`drain`](Self::drain) returned `Ok`.
    pub fn writable(&mut self) -> &mut [u8] {
        &mut self.buffer_read[self.write_position..]
    }

    /// Record that `n` bytes were read into [`writable`](Self::writable).
    pub fn advance(&mut self, n: usize) {
        self.write_position += n;
        debug_assert!(self.write_position <= self.buffer_read.len());
    }

    /// Parse every complete frame, invoking `apply(phy_offset, body)` for
    /// each, and compact the buffer if it is full with a frame pending.
    pub fn drain<F>(&mut self, mut apply: F) -> Result<()>
    where
        F: FnMut(i64, &[u8]) -> Result<()>,
    {
        loop {
            let available = &self.buffer_read[self.dispatch_position..self.write_position];
            if let Some(header) = peek_header(available) {
                if header.body_size < 0 {
                    return Err(HaError::InvalidFrame(format!(
                        "negative body size {}",
                        header.body_size
                    )));
                }
                let body_size = header.body_size as usize;
                if TRANSFER_HEADER_SIZE + body_size > self.buffer_read.len() {
                    return Err(HaError::InvalidFrame(format!(
                        "frame of {} bytes exceeds {}-byte buffer",
                        TRANSFER_HEADER_SIZE + body_size,
                        self.buffer_read.len()
                    )));
                }

                if available.len() >= TRANSFER_HEADER_SIZE + body_size {
                    let body =
                        &available[TRANSFER_HEADER_SIZE..TRANSFER_HEADER_SIZE + body_size];
                    apply(header.phy_offset, body)?;
                    self.dispatch_position += TRANSFER_HEADER_SIZE + body_size;
                    continue;
                }
            }

            if self.write_position == self.buffer_read.len() {
                self.compact();
            }
            return Ok(());
        }
    }

    /// Move the unparsed tail to the front of the backup buffer and swap
    /// the buffers.
    fn compact(&mut self) {
        let remain = self.write_position - self.dispatch_position;
        if remain > 0 {
            self.buffer_backup[..remain]
                .copy_from_slice(&self.buffer_read[self.dispatch_position..self.write_position]);
        }
        std::mem::swap(&mut self.buffer_read, &mut self.buffer_backup);
        self.write_position = remain;
        self.dispatch_position = 0;
    }

    /// Forget all buffered bytes (used when a connection is abandoned).
    pub fn reset(&mut self) {
        self.write_position = 0;
        self.dispatch_position = 0;
    }
}
