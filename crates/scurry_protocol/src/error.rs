//! # Protocol Error Types
//!
//! Two distinct families live here and must not be confused:
//!
//! - [`ProtocolError`] - the frame itself is broken (wrong length, unknown
//!   command, unknown error code). These mean client and server disagree on
//!   the contract and the session cannot safely continue.
//! - [`ServerError`] - a well-formed reply carrying a *semantic* outcome
//!   ("wrong password", "user busy"). These are ordinary results, mapped to
//!   model events, never failures of the protocol layer.

use thiserror::Error;

use crate::Command;

/// Errors raised while decoding or validating frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A zero-length buffer reached the decoder.
    #[error("empty frame")]
    EmptyFrame,

    /// The leading command byte is outside the closed command table.
    #[error("unknown command byte 0x{code:02X}")]
    UnknownCommand {
        /// The offending wire byte.
        code: u8,
    },

    /// The payload contradicts the command's length or shape contract.
    #[error("malformed {command:?} frame: {reason}")]
    MalformedFrame {
        /// Command whose contract was violated.
        command: Command,
        /// Which part of the contract failed.
        reason: &'static str,
    },

    /// The error slot carried a code missing from the closed table.
    ///
    /// The table is versioned with the server; an unknown code means the
    /// peer speaks a different protocol revision.
    #[error("unknown server error code {code} in {command:?} reply")]
    UnknownErrorCode {
        /// Command whose reply carried the code.
        command: Command,
        /// The unrecognized numeric code.
        code: u8,
    },
}

/// Convenience alias for codec results.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Semantic error codes assigned by the server.
///
/// The numeric values are fixed by the server build this client pairs with.
/// `0` is success and never constructs a `ServerError`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerError {
    /// Password digest did not match.
    IncorrectPassword = 31,
    /// The invited enemy is the inviting user.
    AttackYourself = 50,
    /// We are already in a battle or call.
    AggressorBusy = 51,
    /// The invited enemy is already in a battle or call.
    DefenderBusy = 52,
    /// Battle already finished (e.g. reconnect into a dead battle).
    BattleNotFound = 73,
    /// Account creation rejected.
    SignUpRejected = 201,
    /// No account with that login.
    IncorrectLogin = 204,
    /// Not enough crystals for the operation.
    NoCrystals = 215,
    /// Friend could not be added.
    AddFriendRejected = 223,
    /// Session id is stale (server restarted).
    UserNotFound = 245,
    /// Session token is stale (client restarted, or another device).
    IncorrectToken = 246,
    /// Invited enemy does not exist.
    EnemyNotFound = 247,
    /// Nobody available for a random battle.
    NoFreeUsers = 248,
    /// Name failed server-side validation.
    IncorrectName = 249,
    /// Email failed server-side validation.
    IncorrectEmail = 251,
    /// Name is already taken.
    DuplicateName = 252,
}

impl ServerError {
    /// Looks a numeric server code up in the closed table.
    ///
    /// Returns `None` for `0` (success) and for unknown codes; callers must
    /// treat the latter as [`ProtocolError::UnknownErrorCode`].
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            31 => Self::IncorrectPassword,
            50 => Self::AttackYourself,
            51 => Self::AggressorBusy,
            52 => Self::DefenderBusy,
            73 => Self::BattleNotFound,
            201 => Self::SignUpRejected,
            204 => Self::IncorrectLogin,
            215 => Self::NoCrystals,
            223 => Self::AddFriendRejected,
            245 => Self::UserNotFound,
            246 => Self::IncorrectToken,
            247 => Self::EnemyNotFound,
            248 => Self::NoFreeUsers,
            249 => Self::IncorrectName,
            251 => Self::IncorrectEmail,
            252 => Self::DuplicateName,
            _ => return None,
        })
    }
}
