//! # Arena
//!
//! The engine's own battlefield: the same grid type the client mirrors,
//! plus the rules the server applies to it - movement geometry, obstacle
//! and ladder checks, food accounting and the aggressor's entry point.

use scurry_model::{CellObject, Field, ObjectKind, CELL_COUNT, HEIGHT, WIDTH};
use scurry_protocol::MoveDirection;

use crate::error::{SimulationError, SimulationResult};

/// The authoritative battlefield of one round.
pub struct Arena {
    field: Field,
    raw: Vec<u8>,
    actor1: u8,
    entry1_xy: u8,
}

impl Arena {
    /// Parses a level file. The grid must contain the aggressor's actor;
    /// the entry point falls back to the actor's starting cell when the
    /// level does not place one.
    pub fn from_level(name: &str, raw: &[u8]) -> SimulationResult<Self> {
        let field = Field::from_bytes(raw);
        let actor = field
            .find_kind(ObjectKind::Actor1)
            .ok_or_else(|| SimulationError::LevelWithoutActor {
                name: name.to_owned(),
            })?;
        let actor1 = actor.number;
        let entry1_xy = field.find_kind(ObjectKind::Entry1).map_or(actor.xy, |e| e.xy);
        Ok(Self {
            field,
            raw: raw.to_vec(),
            actor1,
            entry1_xy,
        })
    }

    /// The level bytes as shipped in a `FullState` frame.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Object number of the aggressor's actor.
    #[must_use]
    pub fn actor_number(&self) -> u8 {
        self.actor1
    }

    /// Current cell of the aggressor's actor.
    #[must_use]
    pub fn actor_xy(&self) -> u8 {
        self.field
            .object(self.actor1)
            .map_or(self.entry1_xy, |o| o.xy)
    }

    /// The aggressor's restore point.
    #[must_use]
    pub fn entry_xy(&self) -> u8 {
        self.entry1_xy
    }

    /// Food still required to win the round. The mushroom is a trap, not
    /// a goal, so it does not count.
    #[must_use]
    pub fn food_remaining(&self) -> usize {
        self.field
            .count(|k| k.is_food() && k != ObjectKind::Mushroom)
    }

    /// Whether the cell at `xy` is flooded.
    #[must_use]
    pub fn is_water(&self, xy: u8) -> bool {
        self.field.cell(xy).is_some_and(|c| c.water)
    }

    /// Resolves a move request to a target cell, or `None` when the
    /// request is geometrically impossible (field edge, obstacle).
    ///
    /// Diagonal directions climb when the current cell offers a ladder
    /// and fall back to the plain sidestep otherwise.
    #[must_use]
    pub fn step_target(&self, direction: MoveDirection) -> Option<u8> {
        let xy = self.actor_xy();
        let x = xy % WIDTH;
        let width = i16::from(WIDTH);
        let delta: i16 = match direction {
            MoveDirection::Left => -1,
            MoveDirection::Right => 1,
            MoveDirection::LeftDown if self.can_climb_down(xy) => width,
            MoveDirection::RightDown if self.can_climb_down(xy) => width,
            MoveDirection::LeftUp if self.can_climb_up(xy) => -width,
            MoveDirection::RightUp if self.can_climb_up(xy) => -width,
            MoveDirection::LeftDown | MoveDirection::LeftUp => -1,
            MoveDirection::RightDown | MoveDirection::RightUp => 1,
        };
        if delta == -1 && x == 0 {
            return None;
        }
        if delta == 1 && x == WIDTH - 1 {
            return None;
        }
        let target = i16::from(xy) + delta;
        if target < 0 || target >= CELL_COUNT as i16 {
            return None;
        }
        let target = target as u8;
        let blocked = self
            .field
            .objects_at(target)
            .iter()
            .any(|o| o.kind == ObjectKind::Block);
        (!blocked).then_some(target)
    }

    /// Moves the aggressor's actor to `xy`.
    pub fn relocate_actor(&mut self, xy: u8) {
        self.field.set_xy(self.actor1, xy);
    }

    /// Everything sharing the cell at `xy`, the actor itself excluded.
    #[must_use]
    pub fn contents(&self, xy: u8) -> Vec<CellObject> {
        self.field
            .objects_at(xy)
            .into_iter()
            .filter(|o| o.number != self.actor1)
            .collect()
    }

    /// Deletes an object (eaten food, exploded mine, picked-up thing).
    pub fn remove_object(&mut self, number: u8) {
        self.field.set_xy(number, scurry_model::OFF_FIELD);
    }

    /// Materializes a new object (a dropped or deployed thing).
    pub fn place_object(&mut self, kind: ObjectKind, xy: u8) -> CellObject {
        let number = self.field.allocate_number();
        self.field.append_object(number, kind as u8, xy);
        CellObject { number, kind, xy }
    }

    fn can_climb_up(&self, xy: u8) -> bool {
        xy / WIDTH > 0
            && self
                .field
                .objects_at(xy)
                .iter()
                .any(|o| o.kind == ObjectKind::LadderBottom)
    }

    fn can_climb_down(&self, xy: u8) -> bool {
        xy / WIDTH < HEIGHT - 1
            && self
                .field
                .objects_at(xy)
                .iter()
                .any(|o| o.kind == ObjectKind::LadderTop)
    }
}
