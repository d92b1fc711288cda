//! # SCURRY Protocol - Wire Codec
//!
//! The compact binary application protocol spoken between the client and the
//! server (or the local battle emulator, which speaks the same dialect).
//!
//! ## Frame shape
//!
//! ```text
//! [command: u8][argument bytes...]
//! ```
//!
//! Argument encoding is per command: strings are NUL-delimited, numeric
//! fields that can exceed one byte (crystals, scores, rating numbers) are
//! big-endian 32-bit, small enumerants travel as single bytes. All wire
//! values are unsigned bytes; the codec never interprets them as signed.
//!
//! ## Layering
//!
//! This crate knows nothing about sequencing, acknowledgments or sessions -
//! that is the reliable transport's job. It turns bytes into
//! [`RawFrame`]s and back, and owns the closed server error-code table.

#![deny(missing_docs)]
#![deny(unsafe_code)]

mod command;
mod error;
mod frame;
mod types;

pub use command::Command;
pub use error::{ProtocolError, ProtocolResult, ServerError};
pub use frame::{decode, encode, FrameReader, FrameWriter, RawFrame};
pub use types::{Ability, Character, MoveDirection, RatingType, SKILL_OFFSET};
