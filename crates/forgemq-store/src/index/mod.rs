//! Key index: O(1)-average lookup of message physical offsets by
//! `(topic, user-key)` and time range.

pub mod index_file;
pub mod index_service;

pub use index_file::{key_hash, IndexFile};
pub use index_service::{IndexService, QueryOffsetResult};
