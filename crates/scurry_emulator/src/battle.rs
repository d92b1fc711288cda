//! # Battle
//!
//! The multi-round match: two detractor records, a level rotation and the
//! first-to-N-round-wins completion policy.

use scurry_protocol::{Ability, Character};

use crate::error::{SimulationError, SimulationResult};
use crate::levels::LevelCatalog;
use crate::round::Round;

/// One battle participant across rounds.
pub struct Detractor {
    /// The participant's character.
    pub character: Character,
    /// Abilities brought into every round.
    pub abilities: Vec<Ability>,
    /// Rounds won so far.
    pub score: u8,
}

/// One multi-round match.
pub struct Battle {
    /// The aggressor.
    pub detractor1: Detractor,
    /// The defender.
    pub detractor2: Detractor,
    /// The round in progress.
    pub round: Round,
    levels: Vec<String>,
    time_sec: u8,
    wins_needed: u8,
}

impl Battle {
    /// Starts a battle on the first level of the rotation.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        character1: Character,
        character2: Character,
        abilities1: Vec<Ability>,
        abilities2: Vec<Ability>,
        levels: Vec<String>,
        time_sec: u8,
        wins_needed: u8,
        catalog: &LevelCatalog,
    ) -> SimulationResult<Self> {
        let round = make_round(
            1,
            &levels,
            time_sec,
            character1,
            character2,
            &abilities1,
            &abilities2,
            catalog,
        )?;
        Ok(Self {
            detractor1: Detractor {
                character: character1,
                abilities: abilities1,
                score: 0,
            },
            detractor2: Detractor {
                character: character2,
                abilities: abilities2,
                score: 0,
            },
            round,
            levels,
            time_sec,
            wins_needed,
        })
    }

    /// Credits the round to its winner; true when the battle is decided.
    pub fn check_battle(&mut self, winner1: bool) -> bool {
        let winner = if winner1 {
            &mut self.detractor1
        } else {
            &mut self.detractor2
        };
        winner.score += 1;
        winner.score >= self.wins_needed
    }

    /// Replaces the finished round with the next one in the rotation.
    ///
    /// # Errors
    ///
    /// Level lookup or parse failures; the caller tears the battle down.
    pub fn next_round(&mut self, catalog: &LevelCatalog) -> SimulationResult<()> {
        self.round = make_round(
            self.round.number + 1,
            &self.levels,
            self.time_sec,
            self.detractor1.character,
            self.detractor2.character,
            &self.detractor1.abilities,
            &self.detractor2.abilities,
            catalog,
        )?;
        Ok(())
    }

    /// Tears the battle down: the round timer is cancelled so nothing
    /// fires after the battle object is gone.
    pub fn stop(&self) {
        self.round.cancel_timer();
    }
}

#[allow(clippy::too_many_arguments)]
fn make_round(
    number: u8,
    levels: &[String],
    time_sec: u8,
    character1: Character,
    character2: Character,
    abilities1: &[Ability],
    abilities2: &[Ability],
    catalog: &LevelCatalog,
) -> SimulationResult<Round> {
    let name = &levels[(number as usize - 1) % levels.len()];
    let raw = catalog
        .get(name)
        .ok_or_else(|| SimulationError::UnknownLevel { name: name.clone() })?;
    Round::new(
        number,
        name,
        raw,
        time_sec,
        character1,
        character2,
        abilities1,
        abilities2,
    )
}
