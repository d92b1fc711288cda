//! # Shared Enumerants
//!
//! Small wire-level enumerations used by requests and replies on both
//! sides. Each carries its wire id explicitly; lookups are closed.

/// Ability ids at or below this value are passive gear ("swaggas");
/// anything above is an active skill and may be sent in `UseSkill`.
pub const SKILL_OFFSET: u8 = 32;

/// Playable characters. Wire ids are fixed by the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Character {
    /// Not chosen yet.
    #[default]
    None = 0,
    /// The rabbit.
    Rabbit = 1,
    /// The hedgehog.
    Hedgehog = 2,
    /// The squirrel.
    Squirrel = 3,
    /// The cat.
    Cat = 4,
}

impl Character {
    /// All selectable characters, `None` excluded.
    pub const PLAYABLE: [Self; 4] = [Self::Rabbit, Self::Hedgehog, Self::Squirrel, Self::Cat];

    /// Looks a wire id up.
    #[must_use]
    pub const fn from_u8(id: u8) -> Option<Self> {
        Some(match id {
            0 => Self::None,
            1 => Self::Rabbit,
            2 => Self::Hedgehog,
            3 => Self::Squirrel,
            4 => Self::Cat,
            _ => return None,
        })
    }
}

/// Abilities: passive gear below [`SKILL_OFFSET`], single-use skills above.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Ability {
    /// Swagga: breathe under water.
    Snorkel = 1,
    /// Swagga: walk over mines.
    Shoes = 2,
    /// Swagga: shrug off waterfalls.
    SouthWester = 3,
    /// Swagga: immune to flashbangs.
    Sunglasses = 4,
    /// Skill: produce a mine.
    Miner = 33,
    /// Skill: produce a beam to bridge a gap.
    Builder = 34,
    /// Skill: produce an antidote.
    Shaman = 35,
    /// Skill: produce a flashbang.
    Grenadier = 36,
    /// Skill: produce a teleport charge.
    TeleportMan = 37,
}

impl Ability {
    /// Looks a wire id up.
    #[must_use]
    pub const fn from_u8(id: u8) -> Option<Self> {
        Some(match id {
            1 => Self::Snorkel,
            2 => Self::Shoes,
            3 => Self::SouthWester,
            4 => Self::Sunglasses,
            33 => Self::Miner,
            34 => Self::Builder,
            35 => Self::Shaman,
            36 => Self::Grenadier,
            37 => Self::TeleportMan,
            _ => return None,
        })
    }

    /// True for single-use active skills, false for passive gear.
    #[inline]
    #[must_use]
    pub const fn is_skill(self) -> bool {
        self as u8 > SKILL_OFFSET
    }
}

/// Movement directions a client may request.
///
/// The diagonal variants mean "go that way, climbing if the cell allows
/// it, otherwise just sidestep" - the emulator resolves them against the
/// field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MoveDirection {
    /// Left and down a ladder when possible.
    LeftDown = 0,
    /// Straight left.
    Left = 1,
    /// Left and up a ladder when possible.
    LeftUp = 2,
    /// Right and down a ladder when possible.
    RightDown = 3,
    /// Straight right.
    Right = 4,
    /// Right and up a ladder when possible.
    RightUp = 5,
}

impl MoveDirection {
    /// Looks a wire id up.
    #[must_use]
    pub const fn from_u8(id: u8) -> Option<Self> {
        Some(match id {
            0 => Self::LeftDown,
            1 => Self::Left,
            2 => Self::LeftUp,
            3 => Self::RightDown,
            4 => Self::Right,
            5 => Self::RightUp,
            _ => return None,
        })
    }
}

/// Rating table variants the server maintains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RatingType {
    /// All-time table.
    General = 0,
    /// Rolling weekly table.
    Weekly = 1,
}

impl RatingType {
    /// Looks a wire id up.
    #[must_use]
    pub const fn from_u8(id: u8) -> Option<Self> {
        Some(match id {
            0 => Self::General,
            1 => Self::Weekly,
            _ => return None,
        })
    }
}
