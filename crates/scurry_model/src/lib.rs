//! # SCURRY Model - Application State & Command Dispatcher
//!
//! The de-facto session/game state of the client, mutated only by the
//! command dispatcher and the battle engine, observed by the (external)
//! UI through an event bus and lock-free snapshots.
//!
//! ## Architecture
//!
//! ```text
//! transport bytes ──> Dispatcher ──> Model ──> EventBus ──> UI loop
//!                         │            │
//!                         │            └──> FileStore (settings, history)
//!                         └── shape contracts, error-code table
//! ```
//!
//! The model owns no sockets and no threads (apart from the optional
//! keep-alive ping): requests leave through the injected [`CommandSender`]
//! and responses arrive through [`Dispatcher`] calls, so the whole crate
//! is unit-testable with a recording sender.

#![deny(missing_docs)]
#![deny(unsafe_code)]

mod billing;
mod cells;
mod dispatch;
mod events;
mod field;
mod model;
mod store;

pub use billing::{BillingProvider, Sku};
pub use cells::{ObjectKind, OFF_FIELD};
pub use dispatch::Dispatcher;
pub use events::{
    EventBus, EventReceiver, EventSender, Fault, FriendItem, ModelEvent, RatingItem,
    StopCallReason,
};
pub use field::{Cell, CellObject, Field, CELL_COUNT, HEIGHT, WIDTH};
pub use model::{
    md5_hex, CommandSender, KeepAlive, Model, Product, UserProfile, HISTORY_MAX, PING_PERIOD,
    PROMOCODE_MIN_LEN,
};
pub use store::{FileStore, HistoryFile, HistoryItem, MemoryStore, Settings};
