//! Replication wire format.
//!
//! Slave → master: a bare 8-byte big-endian i64, the slave's max
//! physical offset, sent as heartbeat and whenever it advances.
//!
//! Master → slave: adjacent frames
//! `[phy_offset i64 BE][body_len i32 BE][body_len raw log bytes]` where
//! `phy_offset` is the log offset of the frame's first body byte. A
//! zero-length body is the master-side heartbeat. There is no magic and
//! no checksum; the transport is TCP and the offset-equality check on
//! arrival is the integrity gate.

use bytes::{BufMut, BytesMut};

/// Bytes of `phy_offset` plus `body_len` preceding each frame body.
pub const TRANSFER_HEADER_SIZE: usize = 12;

/// Parsed transfer-frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub phy_offset: i64,
    pub body_size: i32,
}

/// Append one framed transfer to `buf`.
pub fn encode_frame(buf: &mut BytesMut, phy_offset: i64, body: &[u8]) {
    buf.reserve(TRANSFER_HEADER_SIZE + body.len());
    buf.put_i64(phy_offset);
    buf.put_i32(body.len() as i32);
    buf.put_slice(body);
}

/// Read a frame header without consuming it. `None` when fewer than
/// [`TRANSFER_HEADER_SIZE`] bytes are available.
pub fn peek_header(bytes: &[u8]) -> Option<FrameHeader> {
    if bytes.len() < TRANSFER_HEADER_SIZE {
        return None;
    }
    Some(FrameHeader {
        phy_offset: i64::from_be_bytes(bytes[0..8].try_into().unwrap()),
        body_size: i32::from_be_bytes(bytes[8..12].try_into().unwrap()),
    })
}
