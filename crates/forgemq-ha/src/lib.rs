//! # forgemq-ha
//!
//! High-availability replication for the forgemq broker: a master
//! streams its append-only commit log to slaves over a back-pressured,
//! offset-acknowledged protocol.
//!
//! ```text
//! ┌──────────── master ────────────┐        ┌──────────── slave ─────────────┐
//! │ HaService                      │        │ HaClient                       │
//! │  ├ accept loop ── HaConnection ├──TCP───┤  ├ report 8-byte max offset    │
//! │  │   ├ read loop  (acks)       │        │  ├ FrameAssembler (2 × 4 MiB)  │
//! │  │   └ write loop (frames)     │        │  └ append to local commit log  │
//! │  ├ push2slave_max_offset (CAS) │        │                                │
//! │  └ GroupTransferGate           │        │                                │
//! └────────────────────────────────┘        └────────────────────────────────┘
//! ```
//!
//! Producers in sync-replication mode block on the
//! [`GroupTransferGate`] until their message's end offset has been
//! acknowledged by at least one slave; the produce path consults
//! [`HaService::is_slave_ok`] before accepting sync-mode publishes.

pub mod assembler;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod gate;
pub mod service;
pub mod wire;

pub use assembler::FrameAssembler;
pub use client::HaClient;
pub use config::HaConfig;
pub use connection::HaConnection;
pub use error::{HaError, Result};
pub use gate::{GroupCommitRequest, GroupTransferGate};
pub use service::HaService;
pub use wire::{encode_frame, peek_header, FrameHeader, TRANSFER_HEADER_SIZE};
