//! # Simulation Error Types
//!
//! Defensive checks that should be unreachable given a correct caller:
//! the client pre-validates its own requests, so any of these firing
//! means a programming error on the client side, not a recoverable
//! condition.

use scurry_protocol::Command;
use thiserror::Error;

/// Errors raised by the battle engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    /// A `UseSkill` request named an ability outside the player's
    /// inventory (or one that is not a skill at all).
    #[error("skill {id} is not in the player's inventory")]
    UnknownSkill {
        /// The offending ability id.
        id: u8,
    },

    /// The emulator does not speak this command offline.
    #[error("command {command:?} is not supported by the emulator")]
    UnsupportedCommand {
        /// The unsupported command.
        command: Command,
    },

    /// A request payload contradicts the command's contract.
    #[error("malformed {command:?} request: {reason}")]
    InvalidRequest {
        /// The command whose contract was violated.
        command: Command,
        /// Which part of the contract failed.
        reason: &'static str,
    },

    /// A battle-scoped request arrived with no battle running.
    #[error("no battle is running")]
    NoActiveBattle,

    /// An `Attack` request named a level the catalogue does not have.
    #[error("level {name:?} is not in the catalogue")]
    UnknownLevel {
        /// The requested level name.
        name: String,
    },

    /// A level file without an aggressor actor cannot host a round.
    #[error("level {name:?} has no aggressor actor")]
    LevelWithoutActor {
        /// The broken level's name.
        name: String,
    },
}

/// Convenience alias for engine results.
pub type SimulationResult<T> = Result<T, SimulationError>;
