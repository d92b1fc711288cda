//! # Battle Manager
//!
//! Orchestrates the battle lifecycle and translates round effects into
//! the same inbound frames a real server would push. Everything that can
//! finish a round - eating the last food, losing the last life, the
//! round timer - funnels through [`BattleManager::finish_round`], which
//! is guarded by the single battle mutex and is idempotent: the timer
//! racing a player action finds the round already claimed and backs off.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use scurry_model::{Model, OFF_FIELD};
use scurry_protocol::{Ability, Character, Command, MoveDirection, RawFrame};

use crate::battle::Battle;
use crate::error::SimulationResult;
use crate::levels::LevelCatalog;
use crate::round::RoundEffect;

/// Where the engine's reply frames go: in the client they feed the same
/// dispatcher that network traffic feeds.
pub trait ReplySink: Send + Sync {
    /// Delivers one inbound frame.
    fn deliver(&self, frame: RawFrame);
}

/// Poll granularity of the round timer, so teardown is prompt.
const TIMER_STEP: Duration = Duration::from_millis(100);

/// The battle lifecycle engine.
pub struct BattleManager {
    model: Arc<Model>,
    sink: Arc<dyn ReplySink>,
    catalog: LevelCatalog,
    battle: Mutex<Option<Battle>>,
}

impl BattleManager {
    /// Creates a manager emitting frames into `sink`.
    #[must_use]
    pub fn new(model: Arc<Model>, sink: Arc<dyn ReplySink>, catalog: LevelCatalog) -> Self {
        Self {
            model,
            sink,
            catalog,
            battle: Mutex::new(None),
        }
    }

    /// Whether a battle is running.
    #[must_use]
    pub fn battle_active(&self) -> bool {
        self.battle.lock().is_some()
    }

    /// Starts a battle, replacing (and tearing down) any previous one,
    /// and emits the opening frame sequence of round 1.
    #[allow(clippy::too_many_arguments)]
    pub fn accept(
        self: &Arc<Self>,
        character1: Character,
        character2: Character,
        abilities1: Vec<Ability>,
        abilities2: Vec<Ability>,
        levels: Vec<String>,
        time_sec: u8,
        wins_needed: u8,
    ) -> SimulationResult<()> {
        let battle = Battle::new(
            character1,
            character2,
            abilities1,
            abilities2,
            levels,
            time_sec,
            wins_needed,
            &self.catalog,
        )?;
        let mut guard = self.battle.lock();
        if let Some(old) = guard.take() {
            old.stop();
        }
        *guard = Some(battle);
        self.start_round(&mut guard);
        Ok(())
    }

    /// Handles a move request. The ack is unconditional - battle or not,
    /// legal move or not - keeping the client's step count symmetric
    /// with the server's.
    pub fn handle_move(self: &Arc<Self>, direction: MoveDirection) {
        {
            let mut guard = self.battle.lock();
            if let Some(battle) = guard.as_mut() {
                let effects = battle.round.step(direction);
                self.apply_effects(&mut guard, effects);
            }
        }
        self.deliver(Command::Move, vec![0]);
    }

    /// Handles a use-thing request.
    pub fn handle_use_thing(self: &Arc<Self>) {
        let mut guard = self.battle.lock();
        if let Some(battle) = guard.as_mut() {
            let effects = battle.round.use_thing();
            self.apply_effects(&mut guard, effects);
        }
    }

    /// Handles a use-skill request, refreshing the ability list after any
    /// successful cast (the used skill drops out of it).
    ///
    /// # Errors
    ///
    /// [`crate::SimulationError::UnknownSkill`] for an id outside the
    /// player's inventory; no battle is not an error here (a stale frame
    /// after a finished battle is simply dropped).
    pub fn handle_use_skill(self: &Arc<Self>, skill_id: u8) -> SimulationResult<()> {
        let mut guard = self.battle.lock();
        let Some(battle) = guard.as_mut() else {
            return Ok(());
        };
        let (_thing, effects) = battle.round.use_skill(skill_id)?;
        let ids = battle.round.ability_ids();
        self.apply_effects(&mut guard, effects);
        let mut args = vec![ids.len() as u8];
        args.extend_from_slice(&ids);
        self.deliver(Command::AbilityList, args);
        Ok(())
    }

    /// Wounds a player outside the movement flow (server-side hazards).
    pub fn hurt(self: &Arc<Self>, me: bool) {
        let mut guard = self.battle.lock();
        if let Some(battle) = guard.as_mut() {
            let mut effects = Vec::new();
            battle.round.apply_wound(me, &mut effects);
            self.apply_effects(&mut guard, effects);
        }
    }

    /// Timer callback for round `number`. A finished or superseded round
    /// makes this a no-op; otherwise the forced tie-break applies.
    pub fn round_timed_out(self: &Arc<Self>, number: u8) {
        let mut guard = self.battle.lock();
        let Some(battle) = guard.as_ref() else {
            return;
        };
        if battle.round.number != number || battle.round.is_finished() {
            return;
        }
        tracing::debug!(round = number, "round timed out, forcing finish");
        let winner1 = battle.round.forced_winner();
        self.finish_round(&mut guard, winner1);
    }

    /// Tears the battle down (client shutdown).
    pub fn close(&self) {
        if let Some(battle) = self.battle.lock().take() {
            battle.stop();
        }
    }

    fn start_round(self: &Arc<Self>, guard: &mut Option<Battle>) {
        let Some(battle) = guard.as_ref() else {
            return;
        };
        let round = &battle.round;
        tracing::info!(
            round = round.number,
            level = %round.level_name,
            "round starting"
        );
        self.deliver(
            Command::RoundInfo,
            vec![
                round.number,
                round.time_sec,
                1, // the local player is always the aggressor offline
                round.player1.character as u8,
                round.player2.character as u8,
                round.player1.lives,
                round.player2.lives,
            ],
        );
        self.deliver(Command::FullState, round.arena.raw().to_vec());
        let ids = round.ability_ids();
        let mut args = vec![ids.len() as u8];
        args.extend_from_slice(&ids);
        self.deliver(Command::AbilityList, args);

        // The timeout thread holds only the cancel flag and a manager
        // handle; a cancelled or superseded round cannot fire.
        let cancelled = round.timer_cancel();
        let number = round.number;
        let total = Duration::from_secs(u64::from(round.time_sec));
        let manager = Arc::clone(self);
        std::thread::Builder::new()
            .name("scurry-round-timer".into())
            .spawn(move || {
                let mut slept = Duration::ZERO;
                while slept < total {
                    if cancelled.load(Ordering::Acquire) {
                        return;
                    }
                    std::thread::sleep(TIMER_STEP);
                    slept += TIMER_STEP;
                }
                if !cancelled.load(Ordering::Acquire) {
                    manager.round_timed_out(number);
                }
            })
            .expect("spawn round timer thread");
    }

    fn apply_effects(self: &Arc<Self>, guard: &mut Option<Battle>, effects: Vec<RoundEffect>) {
        let mut round_over = None;
        for effect in effects {
            match effect {
                RoundEffect::Moved { number, xy } => {
                    self.deliver(Command::StateChanged, vec![number, xy]);
                }
                RoundEffect::Removed { number } => {
                    self.deliver(Command::StateChanged, vec![number, OFF_FIELD]);
                }
                RoundEffect::Appended { id, number, xy } => {
                    self.deliver(Command::ObjectAppended, vec![id, number, xy]);
                }
                RoundEffect::Score { score1, score2 } => {
                    self.deliver(Command::ScoreChanged, vec![score1, score2]);
                }
                RoundEffect::ThingInHand { thing_id } => {
                    self.deliver(Command::ThingTaken, vec![1, thing_id]);
                }
                RoundEffect::Wounded { lives1, lives2 } => {
                    self.deliver(Command::PlayerWounded, vec![lives1, lives2]);
                }
                RoundEffect::RoundOver { winner1 } => round_over = Some(winner1),
            }
        }
        if let Some(winner1) = round_over {
            self.finish_round(guard, winner1);
        }
    }

    fn finish_round(self: &Arc<Self>, guard: &mut Option<Battle>, winner1: bool) {
        let (game_over, score1, score2);
        {
            let Some(battle) = guard.as_mut() else {
                return;
            };
            if !battle.round.mark_finished() {
                return;
            }
            battle.round.cancel_timer();
            game_over = battle.check_battle(winner1);
            score1 = battle.detractor1.score;
            score2 = battle.detractor2.score;
        }
        self.deliver(
            Command::Finished,
            vec![0, u8::from(winner1), score1, score2],
        );
        if game_over {
            if let Some(battle) = guard.take() {
                battle.stop();
            }
            tracing::info!(winner = winner1, "battle finished");
            self.deliver(
                Command::Finished,
                vec![1, u8::from(winner1), score1, score2],
            );
            self.model.advance_single_player_progress(winner1);
        } else {
            let advanced = guard.as_mut().map(|b| b.next_round(&self.catalog));
            match advanced {
                Some(Ok(())) => self.start_round(guard),
                Some(Err(e)) => {
                    tracing::error!(error = %e, "failed to start next round");
                    if let Some(battle) = guard.take() {
                        battle.stop();
                    }
                }
                None => {}
            }
        }
    }

    fn deliver(&self, command: Command, args: Vec<u8>) {
        self.sink.deliver(RawFrame::new(command, args));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scurry_model::{EventBus, ObjectKind, CELL_COUNT, HEIGHT, WIDTH};

    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<RawFrame>>,
    }

    impl ReplySink for RecordingSink {
        fn deliver(&self, frame: RawFrame) {
            self.frames.lock().push(frame);
        }
    }

    impl RecordingSink {
        fn commands(&self) -> Vec<Command> {
            self.frames.lock().iter().map(|f| f.command).collect()
        }
        fn clear(&self) {
            self.frames.lock().clear();
        }
    }

    fn bottom(x: u8) -> usize {
        (HEIGHT - 1) as usize * WIDTH as usize + x as usize
    }

    /// Actor plus a single apple two steps right.
    fn tiny_level() -> Vec<u8> {
        let mut bytes = vec![0u8; CELL_COUNT];
        bytes[bottom(0)] = ObjectKind::Entry1 as u8;
        bytes[bottom(1)] = ObjectKind::Actor1 as u8;
        bytes[bottom(3)] = ObjectKind::Apple as u8;
        bytes
    }

    fn harness(level: Vec<u8>, wins_needed: u8) -> (Arc<BattleManager>, Arc<RecordingSink>) {
        let (events, _receiver) = EventBus::create_pair(64);
        let model = Arc::new(Model::new(events));
        let sink = Arc::new(RecordingSink::default());
        let mut catalog = LevelCatalog::builtin();
        catalog.insert("tiny", level);
        let manager = Arc::new(BattleManager::new(
            model,
            Arc::clone(&sink) as Arc<dyn ReplySink>,
            catalog,
        ));
        manager
            .accept(
                Character::Rabbit,
                Character::Cat,
                Vec::new(),
                Vec::new(),
                vec!["tiny".to_owned()],
                200,
                wins_needed,
            )
            .unwrap();
        (manager, sink)
    }

    #[test]
    fn test_round_start_frame_sequence() {
        let (manager, sink) = harness(tiny_level(), 1);
        assert_eq!(
            sink.commands(),
            vec![Command::RoundInfo, Command::FullState, Command::AbilityList]
        );
        manager.close();
    }

    #[test]
    fn test_move_ack_is_unconditional() {
        let (manager, sink) = harness(tiny_level(), 1);
        manager.close(); // no battle anymore
        sink.clear();
        manager.handle_move(MoveDirection::Left);
        assert_eq!(sink.commands(), vec![Command::Move]);
        assert_eq!(sink.frames.lock()[0].args, vec![0]);
    }

    #[test]
    fn test_eating_last_food_finishes_round_and_game() {
        let (manager, sink) = harness(tiny_level(), 1);
        sink.clear();
        manager.handle_move(MoveDirection::Right);
        manager.handle_move(MoveDirection::Right);

        // Move onto the apple: relocation, removal, score, then the
        // round and game finish pair, then the trailing move ack.
        assert!(sink.commands().contains(&Command::ScoreChanged));
        let finishes: Vec<Vec<u8>> = sink
            .frames
            .lock()
            .iter()
            .filter(|f| f.command == Command::Finished)
            .map(|f| f.args.clone())
            .collect();
        assert_eq!(finishes, vec![vec![0, 1, 1, 0], vec![1, 1, 1, 0]]);
        assert!(!manager.battle_active());
    }

    #[test]
    fn test_finish_is_idempotent_under_timer_race() {
        let (manager, sink) = harness(tiny_level(), 2);
        sink.clear();
        // The timer fires for round 1.
        manager.round_timed_out(1);
        let first = sink
            .commands()
            .iter()
            .filter(|c| **c == Command::Finished)
            .count();
        assert_eq!(first, 1);
        // A duplicate timer callback for the same round changes nothing:
        // round 2 is running now and its number does not match.
        sink.clear();
        manager.round_timed_out(1);
        assert!(sink.commands().is_empty());
        manager.close();
    }

    #[test]
    fn test_forced_finish_defaults_to_defender() {
        let (manager, sink) = harness(tiny_level(), 1);
        sink.clear();
        manager.round_timed_out(1);
        let frames = sink.frames.lock();
        let finished: Vec<&RawFrame> = frames
            .iter()
            .filter(|f| f.command == Command::Finished)
            .collect();
        // Dead-even round: the defender wins both the round and (first to
        // one) the game.
        assert_eq!(finished[0].args, vec![0, 0, 0, 1]);
        assert_eq!(finished[1].args, vec![1, 0, 0, 1]);
    }

    #[test]
    fn test_wound_to_zero_ends_round_for_opponent() {
        let (manager, sink) = harness(tiny_level(), 2);
        sink.clear();
        manager.hurt(true);
        manager.hurt(true);
        {
            let frames = sink.frames.lock();
            let wounded: Vec<&RawFrame> = frames
                .iter()
                .filter(|f| f.command == Command::PlayerWounded)
                .collect();
            assert_eq!(wounded[0].args, vec![2, 3]);
            assert_eq!(wounded[1].args, vec![1, 3]);
            assert!(!frames.iter().any(|f| f.command == Command::Finished));
        }
        sink.clear();
        manager.hurt(true);
        let frames = sink.frames.lock();
        let finished: Vec<&RawFrame> = frames
            .iter()
            .filter(|f| f.command == Command::Finished)
            .collect();
        assert_eq!(finished[0].args, vec![0, 0, 0, 1]);
        drop(frames);
        manager.close();
    }

    #[test]
    fn test_skill_cast_refreshes_ability_list() {
        let (events, _receiver) = EventBus::create_pair(64);
        let model = Arc::new(Model::new(events));
        let sink = Arc::new(RecordingSink::default());
        let mut catalog = LevelCatalog::builtin();
        catalog.insert("tiny", tiny_level());
        let manager = Arc::new(BattleManager::new(
            model,
            Arc::clone(&sink) as Arc<dyn ReplySink>,
            catalog,
        ));
        manager
            .accept(
                Character::Rabbit,
                Character::Cat,
                vec![Ability::Miner, Ability::Shoes],
                Vec::new(),
                vec!["tiny".to_owned()],
                200,
                1,
            )
            .unwrap();
        sink.clear();

        manager.handle_use_skill(Ability::Miner as u8).unwrap();
        let frames = sink.frames.lock();
        assert_eq!(frames[0].command, Command::ThingTaken);
        assert_eq!(frames[0].args, vec![1, ObjectKind::Mine as u8]);
        assert_eq!(frames[1].command, Command::AbilityList);
        // Only the shoes remain listed.
        assert_eq!(frames[1].args, vec![1, Ability::Shoes as u8]);
        drop(frames);

        assert_eq!(
            manager.handle_use_skill(99),
            Err(crate::SimulationError::UnknownSkill { id: 99 })
        );
        manager.close();
    }
}
