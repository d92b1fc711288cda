//! # SCURRY Networking - Reliable Delivery over UDP
//!
//! Turns an unreliable, unordered, duplicating datagram channel into an
//! ordered-arrival, deduplicated channel with a connection lifecycle.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       TRANSPORT                          │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌─────────────────┐  │
//! │  │ Sender     │   │ Receiver   │   │ UdpLink         │  │
//! │  │ (seq/ack/  │   │ (dedup/    │   │ (7-byte session │  │
//! │  │  retransmit│   │  reorder)  │   │  header, socket)│  │
//! │  └────────────┘   └────────────┘   └─────────────────┘  │
//! │        │                │                  │             │
//! │   tick thread      receive thread      UdpSocket         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire layout
//!
//! Every datagram starts with the 7-byte session header
//! `[sid: u16 BE][token: u32 BE][flags: u8]`. Inside it, a 1-byte frame is
//! always a pure acknowledgment of that sequence number; anything longer is
//! `payload bytes + trailing sequence byte`. Sequence numbers run modulo
//! 256 and skip the reserved value 0 (`SYN`), which marks the
//! connection-establishment frame.
//!
//! The [`Sender`] and [`Receiver`] engines are pure state machines driven
//! through an injected [`Wire`]; all timing is expressed in ticks so every
//! property is unit-testable without sockets or clocks.

#![deny(missing_docs)]
#![deny(unsafe_code)]

mod error;
mod link;
mod receiver;
mod sender;
mod sequence;
mod session;

pub use error::{NetError, NetResult};
pub use link::{LinkStats, Transport, TransportHandler, UdpLink};
pub use receiver::{Acceptance, Receiver};
pub use sender::{LinkState, Sender, SenderSignal, Wire};
pub use sequence::{
    after, next, DEFAULT_SRTT, MAX_ATTEMPTS, PERIOD, RTT_BIAS, RTT_SMOOTH, SEQ_MODULO, SYN,
    TICK_DURATION_MS,
};
pub use session::{Session, HEADER_LEN};
