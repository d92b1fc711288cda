//! # SCURRY - Client Core
//!
//! The top crate of the SCURRY workspace: it wires the reliable
//! transport, the wire codec, the command dispatcher, the application
//! model and the offline battle emulator into one running client.
//!
//! ## Dataflow
//!
//! ```text
//! UDP datagrams ──> scurry_networking ──> Dispatcher ──> Model ──> events
//!                     (seq/ack/retry)         ▲            │
//!                                             │            ▼
//! training mode ──> scurry_emulator ──────────┘      CommandSender
//!                     (local rules)                  (transport or
//!                                                     emulator)
//! ```
//!
//! The UI is an external consumer: it drains [`scurry_model::ModelEvent`]s
//! and reads model snapshots, and never blocks the network thread.

#![deny(missing_docs)]
#![deny(unsafe_code)]

mod client;
mod sender;

pub use client::{Client, ClientMode};
pub use sender::{EmulatorSender, NetSender};
