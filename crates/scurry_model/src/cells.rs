//! # Cell Objects
//!
//! Everything that can occupy a battlefield cell, tagged by the wire id the
//! server uses in bootstrap bytes, `ObjectAppended` triples and `FullState`
//! sections. One closed factory keyed on that id replaces a
//! subclass-per-kind hierarchy: the byte that arrives on the wire is the
//! discriminant of the enum.

use scurry_protocol::Ability;

/// Sentinel coordinate for "not on the field". An object relocated here is
/// deleted from the grid.
pub const OFF_FIELD: u8 = 0xFF;

/// Battlefield object kinds. Discriminants are the wire ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectKind {
    /// The aggressor's actor.
    Actor1 = 1,
    /// The defender's actor.
    Actor2 = 2,
    /// Roaming hazard: wounds an actor sharing its cell.
    Wolf = 3,
    /// Food.
    Apple = 4,
    /// Food.
    Pear = 5,
    /// Food.
    Meat = 6,
    /// Food.
    Carrot = 7,
    /// Poisonous food: edible only under an antidote.
    Mushroom = 8,
    /// Food.
    Nut = 9,
    /// Impassable obstacle.
    Block = 10,
    /// Upper end of a ladder: allows climbing down from this cell.
    LadderTop = 11,
    /// Lower end of a ladder: allows climbing up from this cell.
    LadderBottom = 12,
    /// The aggressor's entry point; wounded actors are restored here.
    Entry1 = 13,
    /// The defender's entry point.
    Entry2 = 14,
    /// Hazard: wounds unless the actor wears a sou'wester or holds an
    /// umbrella.
    Waterfall = 15,
    /// Thing: wounds the actor stepping on it, unless wearing shoes.
    Mine = 16,
    /// Thing: shields against waterfalls while held.
    Umbrella = 17,
    /// Thing: bridges a gap when deployed.
    Beam = 18,
    /// Thing: neutralizes one poisonous mushroom while held.
    Antidote = 19,
    /// Thing: blinds the enemy when deployed.
    Flashbang = 20,
    /// Thing: teleport charge.
    Teleport = 21,
}

impl ObjectKind {
    /// Looks a wire id up in the closed table. Zero (empty cell) and
    /// unknown ids resolve to `None`; callers skip them.
    #[must_use]
    pub const fn from_u8(id: u8) -> Option<Self> {
        Some(match id {
            1 => Self::Actor1,
            2 => Self::Actor2,
            3 => Self::Wolf,
            4 => Self::Apple,
            5 => Self::Pear,
            6 => Self::Meat,
            7 => Self::Carrot,
            8 => Self::Mushroom,
            9 => Self::Nut,
            10 => Self::Block,
            11 => Self::LadderTop,
            12 => Self::LadderBottom,
            13 => Self::Entry1,
            14 => Self::Entry2,
            15 => Self::Waterfall,
            16 => Self::Mine,
            17 => Self::Umbrella,
            18 => Self::Beam,
            19 => Self::Antidote,
            20 => Self::Flashbang,
            21 => Self::Teleport,
            _ => return None,
        })
    }

    /// True for the two player actors.
    #[inline]
    #[must_use]
    pub const fn is_actor(self) -> bool {
        matches!(self, Self::Actor1 | Self::Actor2)
    }

    /// True for anything edible, the poisonous mushroom included.
    #[inline]
    #[must_use]
    pub const fn is_food(self) -> bool {
        matches!(
            self,
            Self::Apple | Self::Pear | Self::Meat | Self::Carrot | Self::Mushroom | Self::Nut
        )
    }

    /// True for objects an actor can pick up and carry.
    #[inline]
    #[must_use]
    pub const fn is_thing(self) -> bool {
        matches!(
            self,
            Self::Mine | Self::Umbrella | Self::Beam | Self::Antidote | Self::Flashbang
                | Self::Teleport
        )
    }

    /// The thing produced by casting `skill`, if the skill produces one.
    /// Keyed on the same ability id used on the wire.
    #[must_use]
    pub const fn from_skill(skill: Ability) -> Option<Self> {
        Some(match skill {
            Ability::Miner => Self::Mine,
            Ability::Builder => Self::Beam,
            Ability::Shaman => Self::Antidote,
            Ability::Grenadier => Self::Flashbang,
            Ability::TeleportMan => Self::Teleport,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip() {
        for id in 1..=21u8 {
            let kind = ObjectKind::from_u8(id).expect("id in table");
            assert_eq!(kind as u8, id);
        }
    }

    #[test]
    fn test_empty_and_unknown_skipped() {
        assert_eq!(ObjectKind::from_u8(0), None);
        assert_eq!(ObjectKind::from_u8(22), None);
        assert_eq!(ObjectKind::from_u8(0x3F), None);
    }

    #[test]
    fn test_classification() {
        assert!(ObjectKind::Actor1.is_actor());
        assert!(ObjectKind::Mushroom.is_food());
        assert!(!ObjectKind::Wolf.is_food());
        assert!(ObjectKind::Umbrella.is_thing());
        assert!(!ObjectKind::Entry1.is_thing());
    }

    #[test]
    fn test_skill_factory() {
        assert_eq!(ObjectKind::from_skill(Ability::Miner), Some(ObjectKind::Mine));
        assert_eq!(
            ObjectKind::from_skill(Ability::TeleportMan),
            Some(ObjectKind::Teleport)
        );
        // Passive gear casts nothing.
        assert_eq!(ObjectKind::from_skill(Ability::Snorkel), None);
    }
}
