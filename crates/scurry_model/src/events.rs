//! # Model Event Bus
//!
//! Everything the (external) UI learns about the session, it learns from
//! here. The dispatcher and the simulation engine mutate the model and
//! raise [`ModelEvent`]s; consumers drain them from their own scheduling
//! context.
//!
//! ```text
//! dispatcher ──┐
//!              ├──> EventSender ──> channel ──> EventReceiver ──> UI loop
//! model     ───┘
//! ```
//!
//! The bus is a bounded crossbeam channel: producers never block, and a
//! full channel drops the event with a warning rather than stalling the
//! network thread.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use scurry_protocol::{Ability, Character, RatingType};

use crate::cells::ObjectKind;

/// One friend entry as the server reports it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FriendItem {
    /// The friend's chosen character.
    pub character: Character,
    /// The friend's name.
    pub name: String,
}

/// One row of a rating table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RatingItem {
    /// Player name.
    pub name: String,
    /// Games won.
    pub wins: u32,
    /// Games lost.
    pub losses: u32,
    /// Accumulated score difference.
    pub score_diff: u32,
}

/// Why a pending invitation was closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopCallReason {
    /// The defender rejected our invitation.
    Rejected,
    /// We ignored an incoming invitation until it lapsed.
    Missed,
    /// The defender never answered our invitation.
    Expired,
}

/// Semantic faults mapped from server error codes.
///
/// These are ordinary outcomes of well-formed replies, surfaced to the UI
/// as targeted dialogs; the one exception is [`Fault::ProtocolMismatch`],
/// raised when a frame or error code falls outside the closed tables and
/// the session must be torn down and resynced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Login/password pair rejected.
    IncorrectCredentials,
    /// We invited ourselves.
    AttackYourself,
    /// We are already busy with a call or battle.
    AggressorBusy,
    /// The invited enemy is busy.
    DefenderBusy,
    /// The battle is gone (reconnected after it finished).
    BattleNotFound,
    /// Account creation rejected.
    SignUpRejected,
    /// Not enough crystals.
    NoCrystals,
    /// Friend could not be added.
    AddFriendRejected,
    /// Invited enemy does not exist.
    EnemyNotFound,
    /// Nobody available for a random battle.
    NoFreeUsers,
    /// Name failed validation.
    IncorrectName,
    /// Email failed validation.
    IncorrectEmail,
    /// Name already taken.
    DuplicateName,
    /// Client and server disagree on the wire contract.
    ProtocolMismatch,
}

/// Events raised by the model for the UI to consume.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelEvent {
    /// The transport came up or went down.
    ConnectivityChanged {
        /// True when both directions are established.
        connected: bool,
    },
    /// Sign-in or sign-out completed.
    AuthorizedChanged {
        /// True after a successful sign-in.
        authorized: bool,
    },
    /// The server confirmed a character change.
    CharacterChanged {
        /// The new character.
        character: Character,
    },
    /// The paid-ability expiry table was replaced.
    AbilityExpiryUpdated {
        /// Abilities with minutes left, sorted by wire id.
        abilities: Vec<(Ability, u16)>,
    },
    /// Abilities usable in the current round changed.
    AbilitiesChanged {
        /// Usable abilities, unused skills included.
        abilities: Vec<Ability>,
    },
    /// The friend list was replaced or extended.
    FriendListUpdated {
        /// Complete current list.
        friends: Vec<FriendItem>,
    },
    /// A friend was added.
    FriendAdded {
        /// The new entry.
        friend: FriendItem,
    },
    /// A friend was removed.
    FriendRemoved {
        /// Name of the removed friend.
        name: String,
    },
    /// Our invitation went out; waiting for the defender.
    InviteSent {
        /// Invited enemy's name.
        victim: String,
    },
    /// Someone invited us to a battle.
    Invite {
        /// Aggressor's name.
        enemy: String,
        /// Aggressor's session id, echoed back in Accept/Reject.
        enemy_sid: u16,
    },
    /// A pending invitation was closed without a battle.
    StopCall {
        /// Why it was closed.
        reason: StopCallReason,
        /// The other party's name.
        name: String,
    },
    /// A rating table arrived.
    RatingUpdated {
        /// Which table.
        kind: RatingType,
        /// Rows, best first.
        items: Vec<RatingItem>,
    },
    /// A promo code we distributed paid out.
    PromocodeDone {
        /// The other party's name.
        name: String,
        /// True when we were the inviter.
        inviter: bool,
        /// Crystals granted.
        crystals: u8,
    },
    /// The battlefield style pack changed.
    StyleChanged {
        /// Style pack id.
        pack: u8,
    },
    /// The server acknowledged a move request, legal or not.
    MoveAck,
    /// The round score changed.
    ScoreChanged {
        /// Our score.
        score1: u8,
        /// The enemy's score.
        score2: u8,
    },
    /// Lives changed (round start or a wound).
    LivesChanged {
        /// Our lives.
        lives1: u8,
        /// The enemy's lives.
        lives2: u8,
        /// True at round start, false after a wound.
        reset: bool,
    },
    /// A thing entered or left someone's hands.
    ThingChanged {
        /// True for our hands.
        mine: bool,
        /// The thing now held, if any.
        thing: Option<ObjectKind>,
    },
    /// The round ended.
    RoundFinished {
        /// True when we won it.
        winner: bool,
    },
    /// The whole game ended; the battle is torn down.
    GameFinished {
        /// True when we won it.
        winner: bool,
    },
    /// A billing purchase completed.
    PaymentDone {
        /// Crystals credited.
        crystals: u32,
        /// Store receipt coupon.
        coupon: String,
    },
    /// A fault to surface to the user.
    Fault {
        /// What went wrong.
        fault: Fault,
    },
}

/// Event bus connecting the model to its observers.
pub struct EventBus {
    sender: Sender<ModelEvent>,
    receiver: Receiver<ModelEvent>,
}

impl EventBus {
    /// Creates a bus holding at most `capacity` undelivered events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Creates a producer handle. Clone freely.
    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /// Creates a consumer handle.
    #[must_use]
    pub fn receiver(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.receiver.clone(),
        }
    }

    /// Convenience: a connected sender/receiver pair.
    #[must_use]
    pub fn create_pair(capacity: usize) -> (EventSender, EventReceiver) {
        let bus = Self::new(capacity);
        (bus.sender(), bus.receiver())
    }
}

/// Producer handle.
#[derive(Clone)]
pub struct EventSender {
    sender: Sender<ModelEvent>,
}

impl EventSender {
    /// Raises an event without blocking. A full channel drops the event:
    /// the UI renders from model snapshots, so a dropped notification
    /// costs a repaint, not correctness.
    pub fn raise(&self, event: ModelEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(?event, "event bus full, dropping event");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Consumer handle.
#[derive(Clone)]
pub struct EventReceiver {
    receiver: Receiver<ModelEvent>,
}

impl EventReceiver {
    /// Takes every pending event without blocking.
    #[must_use]
    pub fn drain(&self) -> Vec<ModelEvent> {
        let mut events = Vec::with_capacity(16);
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Takes one pending event without blocking.
    #[must_use]
    pub fn try_recv(&self) -> Option<ModelEvent> {
        self.receiver.try_recv().ok()
    }

    /// Number of undelivered events.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_and_drain() {
        let (sender, receiver) = EventBus::create_pair(16);
        assert!(sender.raise(ModelEvent::MoveAck));
        assert!(sender.raise(ModelEvent::ScoreChanged { score1: 1, score2: 0 }));
        let events = receiver.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ModelEvent::MoveAck);
        assert_eq!(receiver.pending_count(), 0);
    }

    #[test]
    fn test_full_channel_drops_instead_of_blocking() {
        let (sender, receiver) = EventBus::create_pair(1);
        assert!(sender.raise(ModelEvent::MoveAck));
        assert!(!sender.raise(ModelEvent::MoveAck));
        assert_eq!(receiver.drain().len(), 1);
    }
}
