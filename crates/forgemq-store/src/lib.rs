//! # forgemq-store
//!
//! Storage services of the forgemq broker:
//!
//! - **Commit log**: the append-only byte stream that is the ground
//!   truth for all messages, addressed by physical offset.
//! - **Key index**: memory-mapped hash-table-in-file indexes mapping
//!   `(topic, user-key)` plus a time range to commit-log offsets.
//! - **Checkpoint**: the durable `index_msg_timestamp` recovery anchor.
//! - **Dispatch**: the glue feeding committed messages into the index.
//!
//! All durable integers are big-endian.

pub mod checkpoint;
pub mod commitlog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod flags;
pub mod index;

pub use checkpoint::StoreCheckpoint;
pub use commitlog::CommitLog;
pub use config::{IndexConfig, StoreConfig};
pub use dispatch::{DispatchRequest, DispatchService, TransactionState, KEY_SEPARATOR};
pub use error::{Result, StoreError};
pub use flags::RunningFlags;
pub use index::{IndexFile, IndexService, QueryOffsetResult};
