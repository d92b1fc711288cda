//! # SCURRY Emulator - Offline Battle Simulation
//!
//! The authoritative battle rules, run locally when no server is present.
//! Training mode wires the model's outbound seam into
//! [`ServerEmulator::handle`] instead of the transport; replies come back
//! as ordinary inbound frames through a [`ReplySink`], so the dispatcher
//! and model cannot tell an offline battle from a remote one.
//!
//! ## Architecture
//!
//! ```text
//! model request ──> ServerEmulator ──> BattleManager ──> Battle ──> Round
//!                                            │                       │
//!                                            │<── effects ───────────┘
//!                                            └──> ReplySink (frames back
//!                                                 into the dispatcher)
//! ```
//!
//! One mutex around the battle serializes player actions against the
//! round timer; every completion path goes through a single idempotent
//! finish routine.

#![deny(missing_docs)]
#![deny(unsafe_code)]

mod arena;
mod battle;
mod emulator;
mod error;
mod levels;
mod manager;
mod round;

pub use arena::Arena;
pub use battle::{Battle, Detractor};
pub use emulator::{ServerEmulator, OFFLINE_ROUND_SEC, OFFLINE_WINS_NEEDED};
pub use error::{SimulationError, SimulationResult};
pub use levels::{LevelCatalog, TRAINING_LEVEL};
pub use manager::{BattleManager, ReplySink};
pub use round::{Player, Round, RoundEffect, LIVES_PER_ROUND};
