//! # Command Codes
//!
//! Every application frame starts with one of these bytes. The set is
//! closed: a byte outside the table is a protocol fault, not something to
//! skip over (unknown *sections* inside a frame are skippable, unknown
//! *commands* are not).

/// Application command byte, shared by both directions.
///
/// Requests travel client to server, notifications server to client; a few
/// codes (`Attack`, `UserInfo`, ...) appear in both directions with
/// different payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Reply slot for errors that could not be attributed to a command.
    UnspecError = 0,
    /// Create an account: `login NUL hash NUL email NUL promocode`.
    SignUp = 1,
    /// Authenticate: `authType login NUL hash`.
    SignIn = 2,
    /// Terminate the session on the server.
    SignOut = 3,
    /// Request (empty) or receive the user profile.
    UserInfo = 4,
    /// Invite an enemy: `0 name` by name, `1` latest, `2` random.
    Attack = 5,
    /// Incoming invitation: `sid_hi sid_lo aggressorName`.
    Call = 6,
    /// Accept an invitation: `sid_hi sid_lo`.
    Accept = 7,
    /// Reject an invitation: `sid_hi sid_lo`.
    Reject = 8,
    /// Invitation closed: `detail name` (0 rejected, 1 missed, 2 expired).
    StopCall = 9,
    /// Withdraw our own pending invitation.
    CancelCall = 10,
    /// Product catalogue: `(ability, days, cost)*` triples.
    RangeOfProducts = 11,
    /// Buy a product: `ability days`; reply is a fresh `UserInfo`.
    BuyProduct = 12,
    /// Ask the server for the training battle.
    ReceiveTraining = 13,
    /// Select a character: single enumerant byte.
    ChangeCharacter = 14,
    /// Whole battlefield: grid bytes, then typed sections.
    FullState = 15,
    /// Usable abilities this round: `count ids...`.
    AbilityList = 16,
    /// Move request: single direction byte.
    Move = 17,
    /// Use the thing currently held.
    UseThing = 18,
    /// Use a skill: single ability id byte.
    UseSkill = 19,
    /// Object relocations: `(number, xy)*` pairs.
    StateChanged = 20,
    /// Round score update: `score1 score2`.
    ScoreChanged = 21,
    /// Lives update after a wound: `lives1 lives2`.
    PlayerWounded = 22,
    /// A thing entered someone's hands: `mine thingId`.
    ThingTaken = 23,
    /// A new object appeared: `id number xy`.
    ObjectAppended = 24,
    /// Round or game over: `kind winner [score1 score2]`.
    Finished = 25,
    /// Concede the battle.
    GiveUp = 26,
    /// Round header: `number timeSec aggressor char1 char2 lives1 lives2`.
    RoundInfo = 27,
    /// Rating table: `type`, then `(name NUL wins losses diff)*`.
    Rating = 28,
    /// Friends: `fragment`, then `(character name) NUL` items.
    FriendList = 29,
    /// Add a friend by name.
    AddFriend = 30,
    /// Remove a friend by name.
    RemoveFriend = 31,
    /// Validate a promo code before sign-up.
    CheckPromocode = 32,
    /// A promo code paid out: `inviter crystals name`.
    PromocodeDone = 33,
}

impl Command {
    /// Looks a wire byte up in the closed command table.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::UnspecError,
            1 => Self::SignUp,
            2 => Self::SignIn,
            3 => Self::SignOut,
            4 => Self::UserInfo,
            5 => Self::Attack,
            6 => Self::Call,
            7 => Self::Accept,
            8 => Self::Reject,
            9 => Self::StopCall,
            10 => Self::CancelCall,
            11 => Self::RangeOfProducts,
            12 => Self::BuyProduct,
            13 => Self::ReceiveTraining,
            14 => Self::ChangeCharacter,
            15 => Self::FullState,
            16 => Self::AbilityList,
            17 => Self::Move,
            18 => Self::UseThing,
            19 => Self::UseSkill,
            20 => Self::StateChanged,
            21 => Self::ScoreChanged,
            22 => Self::PlayerWounded,
            23 => Self::ThingTaken,
            24 => Self::ObjectAppended,
            25 => Self::Finished,
            26 => Self::GiveUp,
            27 => Self::RoundInfo,
            28 => Self::Rating,
            29 => Self::FriendList,
            30 => Self::AddFriend,
            31 => Self::RemoveFriend,
            32 => Self::CheckPromocode,
            33 => Self::PromocodeDone,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_every_code() {
        for code in 0..=33u8 {
            let cmd = Command::from_u8(code).expect("code in table");
            assert_eq!(cmd as u8, code);
        }
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(Command::from_u8(34).is_none());
        assert!(Command::from_u8(0xFF).is_none());
    }
}
