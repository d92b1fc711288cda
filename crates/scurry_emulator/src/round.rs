//! # Round
//!
//! One timed sub-match: two players, one arena, one wall-clock timeout.
//! The round mutates its own state and reports what happened as a list of
//! [`RoundEffect`]s; the battle manager translates effects into frames
//! and owns the finish flow, so every completion path - food gone, lives
//! gone, timer expired - funnels through a single idempotent routine.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use scurry_model::ObjectKind;
use scurry_protocol::{Ability, Character, MoveDirection};

use crate::arena::Arena;
use crate::error::{SimulationError, SimulationResult};

/// Lives per player per round.
pub const LIVES_PER_ROUND: u8 = 3;

/// One participant's round-scoped state.
pub struct Player {
    /// The participant's character.
    pub character: Character,
    /// Lives left this round.
    pub lives: u8,
    /// Food eaten this round.
    pub score: u8,
    /// Single-use active skills brought into the round.
    pub skills: Vec<Ability>,
    /// Passive gear worn for the whole round.
    pub swaggas: Vec<Ability>,
    /// The thing currently held.
    pub thing: Option<ObjectKind>,
}

impl Player {
    fn new(character: Character, abilities: &[Ability]) -> Self {
        let (skills, swaggas) = abilities.iter().copied().partition(|a| a.is_skill());
        Self {
            character,
            lives: LIVES_PER_ROUND,
            score: 0,
            skills,
            swaggas,
            thing: None,
        }
    }

    /// Whether the player wears the given gear.
    #[must_use]
    pub fn has_swagga(&self, ability: Ability) -> bool {
        self.swaggas.contains(&ability)
    }
}

/// What one player action changed, in emission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundEffect {
    /// An object moved to a new cell.
    Moved {
        /// Object number.
        number: u8,
        /// New cell.
        xy: u8,
    },
    /// An object left the field.
    Removed {
        /// Object number.
        number: u8,
    },
    /// A new object materialized.
    Appended {
        /// Object kind wire id.
        id: u8,
        /// Object number.
        number: u8,
        /// Cell.
        xy: u8,
    },
    /// The round score changed.
    Score {
        /// Aggressor's score.
        score1: u8,
        /// Defender's score.
        score2: u8,
    },
    /// The aggressor's hands changed (0 = emptied).
    ThingInHand {
        /// Thing wire id.
        thing_id: u8,
    },
    /// Someone was wounded.
    Wounded {
        /// Aggressor's lives.
        lives1: u8,
        /// Defender's lives.
        lives2: u8,
    },
    /// The round is decided.
    RoundOver {
        /// True when the aggressor won.
        winner1: bool,
    },
}

/// One round of a battle.
pub struct Round {
    /// Round number, starting at 1.
    pub number: u8,
    /// Timeout in seconds.
    pub time_sec: u8,
    /// The level this round plays on.
    pub level_name: String,
    /// The battlefield.
    pub arena: Arena,
    /// The aggressor (the local player in training mode).
    pub player1: Player,
    /// The defender.
    pub player2: Player,
    used_skills: HashSet<Ability>,
    finished: bool,
    timer_cancel: Arc<AtomicBool>,
}

impl Round {
    /// Builds a round on the named level.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        number: u8,
        level_name: &str,
        raw: &[u8],
        time_sec: u8,
        character1: Character,
        character2: Character,
        abilities1: &[Ability],
        abilities2: &[Ability],
    ) -> SimulationResult<Self> {
        Ok(Self {
            number,
            time_sec,
            level_name: level_name.to_owned(),
            arena: Arena::from_level(level_name, raw)?,
            player1: Player::new(character1, abilities1),
            player2: Player::new(character2, abilities2),
            used_skills: HashSet::new(),
            finished: false,
            timer_cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// True once a finish path has claimed the round.
    #[inline]
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Claims the round for finishing. Only the first caller gets `true`;
    /// the timer racing a player action makes the second call a no-op.
    pub fn mark_finished(&mut self) -> bool {
        !std::mem::replace(&mut self.finished, true)
    }

    /// The timeout cancellation flag shared with the timer thread.
    #[must_use]
    pub fn timer_cancel(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.timer_cancel)
    }

    /// Cancels the timeout; no timer fires after this returns.
    pub fn cancel_timer(&self) {
        self.timer_cancel.store(true, Ordering::Release);
    }

    /// Ability ids usable right now: all gear plus the skills not yet
    /// cast this round.
    #[must_use]
    pub fn ability_ids(&self) -> Vec<u8> {
        self.player1
            .swaggas
            .iter()
            .chain(
                self.player1
                    .skills
                    .iter()
                    .filter(|s| !self.used_skills.contains(s)),
            )
            .map(|&a| a as u8)
            .collect()
    }

    /// Winner of a timed-out round: higher score, then more lives, then
    /// the defender. The defender default on a dead-even round is the
    /// server's documented behavior and is kept as-is.
    #[must_use]
    pub fn forced_winner(&self) -> bool {
        if self.player1.score != self.player2.score {
            return self.player1.score > self.player2.score;
        }
        if self.player1.lives != self.player2.lives {
            return self.player1.lives > self.player2.lives;
        }
        false
    }

    /// Applies one validated move request. Illegal geometry produces no
    /// effects; the caller still acks the request.
    pub fn step(&mut self, direction: MoveDirection) -> Vec<RoundEffect> {
        let mut effects = Vec::new();
        if self.finished {
            return effects;
        }
        let Some(target) = self.arena.step_target(direction) else {
            return effects;
        };
        self.arena.relocate_actor(target);
        effects.push(RoundEffect::Moved {
            number: self.arena.actor_number(),
            xy: target,
        });

        if self.hazard_at(target, &mut effects) {
            self.apply_wound(true, &mut effects);
            return effects;
        }

        for object in self.arena.contents(target) {
            match object.kind {
                ObjectKind::Mushroom => {
                    // Only reachable holding an antidote; consume it and
                    // treat the mushroom as a bonus meal.
                    self.player1.thing = None;
                    effects.push(RoundEffect::ThingInHand { thing_id: 0 });
                    self.eat(object.number, &mut effects);
                }
                kind if kind.is_food() => self.eat(object.number, &mut effects),
                kind if kind.is_thing() => {
                    if let Some(old) = self.player1.thing.take() {
                        let dropped = self.arena.place_object(old, target);
                        effects.push(RoundEffect::Appended {
                            id: old as u8,
                            number: dropped.number,
                            xy: dropped.xy,
                        });
                    }
                    self.arena.remove_object(object.number);
                    effects.push(RoundEffect::Removed {
                        number: object.number,
                    });
                    self.player1.thing = Some(kind);
                    effects.push(RoundEffect::ThingInHand {
                        thing_id: kind as u8,
                    });
                }
                _ => {}
            }
        }
        if self.arena.food_remaining() == 0 {
            effects.push(RoundEffect::RoundOver { winner1: true });
        }
        effects
    }

    /// Drops the held thing onto the actor's cell, armed.
    pub fn use_thing(&mut self) -> Vec<RoundEffect> {
        let mut effects = Vec::new();
        if self.finished {
            return effects;
        }
        let Some(thing) = self.player1.thing.take() else {
            return effects;
        };
        effects.push(RoundEffect::ThingInHand { thing_id: 0 });
        let placed = self.arena.place_object(thing, self.arena.actor_xy());
        effects.push(RoundEffect::Appended {
            id: thing as u8,
            number: placed.number,
            xy: placed.xy,
        });
        effects
    }

    /// Casts a skill. Each skill works once per round; re-casting is not
    /// an error, it just produces nothing. An id outside the player's
    /// inventory is a caller bug.
    ///
    /// # Errors
    ///
    /// [`SimulationError::UnknownSkill`] for an id that is not one of the
    /// player's skills.
    pub fn use_skill(
        &mut self,
        skill_id: u8,
    ) -> SimulationResult<(Option<ObjectKind>, Vec<RoundEffect>)> {
        let skill = Ability::from_u8(skill_id)
            .filter(|a| a.is_skill() && self.player1.skills.contains(a))
            .ok_or(SimulationError::UnknownSkill { id: skill_id })?;
        if self.finished || !self.used_skills.insert(skill) {
            return Ok((None, Vec::new()));
        }
        let Some(kind) = ObjectKind::from_skill(skill) else {
            return Ok((None, Vec::new()));
        };
        let mut effects = Vec::new();
        if let Some(old) = self.player1.thing.take() {
            let dropped = self.arena.place_object(old, self.arena.actor_xy());
            effects.push(RoundEffect::Appended {
                id: old as u8,
                number: dropped.number,
                xy: dropped.xy,
            });
        }
        self.player1.thing = Some(kind);
        effects.push(RoundEffect::ThingInHand {
            thing_id: kind as u8,
        });
        Ok((Some(kind), effects))
    }

    /// Decrements a player's lives; true while they stay alive.
    pub fn wound(&mut self, me: bool) -> bool {
        let player = if me { &mut self.player1 } else { &mut self.player2 };
        player.lives = player.lives.saturating_sub(1);
        player.lives > 0
    }

    /// Full wound flow: decrement, report, then either restore the actor
    /// to its entry point or decide the round for the opponent.
    pub fn apply_wound(&mut self, me: bool, effects: &mut Vec<RoundEffect>) {
        let alive = self.wound(me);
        effects.push(RoundEffect::Wounded {
            lives1: self.player1.lives,
            lives2: self.player2.lives,
        });
        if !alive {
            effects.push(RoundEffect::RoundOver { winner1: !me });
        } else if me {
            let entry = self.arena.entry_xy();
            self.arena.relocate_actor(entry);
            effects.push(RoundEffect::Moved {
                number: self.arena.actor_number(),
                xy: entry,
            });
        }
    }

    /// Whether stepping onto `target` hurts the aggressor, applying any
    /// side effects of the trigger (a mine explodes, an umbrella is spent).
    fn hazard_at(&mut self, target: u8, effects: &mut Vec<RoundEffect>) -> bool {
        if self.arena.is_water(target) && !self.player1.has_swagga(Ability::Snorkel) {
            return true;
        }
        for object in self.arena.contents(target) {
            match object.kind {
                ObjectKind::Wolf => return true,
                ObjectKind::Mine => {
                    if !self.player1.has_swagga(Ability::Shoes) {
                        self.arena.remove_object(object.number);
                        effects.push(RoundEffect::Removed {
                            number: object.number,
                        });
                        return true;
                    }
                }
                ObjectKind::Waterfall => {
                    if self.player1.has_swagga(Ability::SouthWester) {
                        continue;
                    }
                    if self.player1.thing == Some(ObjectKind::Umbrella) {
                        self.player1.thing = None;
                        effects.push(RoundEffect::ThingInHand { thing_id: 0 });
                        continue;
                    }
                    return true;
                }
                ObjectKind::Mushroom => {
                    if self.player1.thing != Some(ObjectKind::Antidote) {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }

    fn eat(&mut self, number: u8, effects: &mut Vec<RoundEffect>) {
        self.arena.remove_object(number);
        effects.push(RoundEffect::Removed { number });
        self.player1.score += 1;
        effects.push(RoundEffect::Score {
            score1: self.player1.score,
            score2: self.player2.score,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scurry_model::{CELL_COUNT, HEIGHT, WIDTH};

    fn bottom(x: u8) -> u8 {
        (HEIGHT - 1) * WIDTH + x
    }

    fn round_with(cells: &[(u8, u8)], abilities: &[Ability]) -> Round {
        let mut bytes = vec![0u8; CELL_COUNT];
        for &(xy, b) in cells {
            bytes[xy as usize] = b;
        }
        Round::new(
            1,
            "test",
            &bytes,
            90,
            Character::Rabbit,
            Character::Cat,
            abilities,
            &[],
        )
        .expect("valid level")
    }

    #[test]
    fn test_eating_food_scores_and_wins_when_gone() {
        let mut round = round_with(
            &[
                (bottom(1), ObjectKind::Actor1 as u8),
                (bottom(2), ObjectKind::Apple as u8),
            ],
            &[],
        );
        let effects = round.step(MoveDirection::Right);
        assert!(effects.contains(&RoundEffect::Score {
            score1: 1,
            score2: 0
        }));
        assert!(effects.contains(&RoundEffect::RoundOver { winner1: true }));
    }

    #[test]
    fn test_wound_sequence_restores_then_ends_round() {
        let mut round = round_with(
            &[
                (bottom(0), ObjectKind::Entry1 as u8),
                (bottom(1), ObjectKind::Actor1 as u8),
            ],
            &[],
        );
        let mut effects = Vec::new();
        round.apply_wound(true, &mut effects);
        assert!(effects.contains(&RoundEffect::Wounded {
            lives1: 2,
            lives2: 3
        }));
        // Still alive: restored to the entry cell.
        assert!(effects.contains(&RoundEffect::Moved {
            number: round.arena.actor_number(),
            xy: bottom(0)
        }));
        assert!(!effects.iter().any(|e| matches!(e, RoundEffect::RoundOver { .. })));

        round.apply_wound(true, &mut Vec::new());
        let mut last = Vec::new();
        round.apply_wound(true, &mut last);
        assert!(last.contains(&RoundEffect::RoundOver { winner1: false }));
    }

    #[test]
    fn test_defender_wound_decides_for_aggressor() {
        let mut round = round_with(&[(bottom(1), ObjectKind::Actor1 as u8)], &[]);
        // Defender 3 -> 2: round continues.
        let mut effects = Vec::new();
        round.apply_wound(false, &mut effects);
        assert_eq!(
            effects,
            vec![RoundEffect::Wounded {
                lives1: 3,
                lives2: 2
            }]
        );
        // Down to zero: the aggressor takes the round.
        round.apply_wound(false, &mut Vec::new());
        let mut last = Vec::new();
        round.apply_wound(false, &mut last);
        assert!(last.contains(&RoundEffect::RoundOver { winner1: true }));
    }

    #[test]
    fn test_wolf_wounds_and_preempts_food() {
        let mut round = round_with(
            &[
                (bottom(0), ObjectKind::Entry1 as u8),
                (bottom(1), ObjectKind::Actor1 as u8),
                (bottom(2), ObjectKind::Wolf as u8),
            ],
            &[],
        );
        let effects = round.step(MoveDirection::Right);
        assert!(effects.contains(&RoundEffect::Wounded {
            lives1: 2,
            lives2: 3
        }));
        assert!(!effects
            .iter()
            .any(|e| matches!(e, RoundEffect::Score { .. })));
    }

    #[test]
    fn test_mine_explodes_unless_shod() {
        let cells = [
            (bottom(1), ObjectKind::Actor1 as u8),
            (bottom(2), ObjectKind::Mine as u8),
        ];
        let mut bare = round_with(&cells, &[]);
        let effects = bare.step(MoveDirection::Right);
        assert!(effects
            .iter()
            .any(|e| matches!(e, RoundEffect::Wounded { .. })));

        let mut shod = round_with(&cells, &[Ability::Shoes]);
        let effects = shod.step(MoveDirection::Right);
        assert!(!effects
            .iter()
            .any(|e| matches!(e, RoundEffect::Wounded { .. })));
    }

    #[test]
    fn test_skill_is_single_use_and_closed() {
        let mut round = round_with(
            &[(bottom(1), ObjectKind::Actor1 as u8)],
            &[Ability::Miner, Ability::Snorkel],
        );
        let (thing, effects) = round.use_skill(Ability::Miner as u8).unwrap();
        assert_eq!(thing, Some(ObjectKind::Mine));
        assert!(effects.contains(&RoundEffect::ThingInHand {
            thing_id: ObjectKind::Mine as u8
        }));
        assert_eq!(round.ability_ids(), vec![Ability::Snorkel as u8]);

        // Second cast is a silent no-op, not an error.
        let (thing, effects) = round.use_skill(Ability::Miner as u8).unwrap();
        assert_eq!(thing, None);
        assert!(effects.is_empty());

        // A skill we never owned is a caller bug.
        assert_eq!(
            round.use_skill(Ability::Grenadier as u8),
            Err(SimulationError::UnknownSkill {
                id: Ability::Grenadier as u8
            })
        );
        // So is passive gear.
        assert_eq!(
            round.use_skill(Ability::Snorkel as u8),
            Err(SimulationError::UnknownSkill {
                id: Ability::Snorkel as u8
            })
        );
    }

    #[test]
    fn test_thing_pickup_swaps_hands() {
        let mut round = round_with(
            &[
                (bottom(1), ObjectKind::Actor1 as u8),
                (bottom(2), ObjectKind::Umbrella as u8),
            ],
            &[Ability::Miner],
        );
        round.use_skill(Ability::Miner as u8).unwrap();
        let effects = round.step(MoveDirection::Right);
        // The mine is dropped where we stand, the umbrella picked up.
        assert!(effects.iter().any(|e| matches!(
            e,
            RoundEffect::Appended {
                id,
                ..
            } if *id == ObjectKind::Mine as u8
        )));
        assert!(effects.contains(&RoundEffect::ThingInHand {
            thing_id: ObjectKind::Umbrella as u8
        }));
        assert_eq!(round.player1.thing, Some(ObjectKind::Umbrella));
    }

    #[test]
    fn test_forced_winner_tie_break() {
        let mut round = round_with(&[(bottom(1), ObjectKind::Actor1 as u8)], &[]);
        // Dead even: the defender takes it.
        assert!(!round.forced_winner());
        // More lives breaks the tie.
        round.wound(false);
        assert!(round.forced_winner());
        // Score outranks lives.
        round.player2.score = 2;
        assert!(!round.forced_winner());
    }

    #[test]
    fn test_finished_round_ignores_actions() {
        let mut round = round_with(
            &[
                (bottom(1), ObjectKind::Actor1 as u8),
                (bottom(2), ObjectKind::Apple as u8),
            ],
            &[],
        );
        assert!(round.mark_finished());
        assert!(!round.mark_finished());
        assert!(round.step(MoveDirection::Right).is_empty());
        assert!(round.use_thing().is_empty());
    }
}
