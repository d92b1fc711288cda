//! # Server Emulator
//!
//! The offline stand-in for the real server: it accepts the same request
//! frames the transport would carry and answers through the same inbound
//! frame path, so the rest of the client cannot tell the difference.
//! Only the battle-scoped commands are spoken here; anything else
//! arriving means the caller routed a request wrong.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scurry_model::Model;
use scurry_protocol::{Character, Command, MoveDirection};

use crate::error::{SimulationError, SimulationResult};
use crate::levels::LevelCatalog;
use crate::manager::{BattleManager, ReplySink};

/// Round length handed to offline battles, in seconds.
pub const OFFLINE_ROUND_SEC: u8 = 90;

/// Round wins needed to take an offline battle.
pub const OFFLINE_WINS_NEEDED: u8 = 1;

/// The local authoritative server.
pub struct ServerEmulator {
    model: Arc<Model>,
    manager: Arc<BattleManager>,
    rng: Mutex<StdRng>,
}

impl ServerEmulator {
    /// Creates an emulator with the built-in level catalogue.
    #[must_use]
    pub fn new(model: Arc<Model>, sink: Arc<dyn ReplySink>) -> Self {
        Self::with_catalog(model, sink, LevelCatalog::builtin())
    }

    /// Creates an emulator with a custom catalogue (tests, level packs).
    #[must_use]
    pub fn with_catalog(
        model: Arc<Model>,
        sink: Arc<dyn ReplySink>,
        catalog: LevelCatalog,
    ) -> Self {
        let manager = Arc::new(BattleManager::new(Arc::clone(&model), sink, catalog));
        Self {
            model,
            manager,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Handles one client request frame.
    ///
    /// # Errors
    ///
    /// [`SimulationError`] on requests the emulator does not speak or
    /// whose payload contradicts the command contract. These are caller
    /// bugs, not runtime conditions.
    pub fn handle(&self, command: Command, args: &[u8]) -> SimulationResult<()> {
        match command {
            Command::Attack => match args {
                [0, name @ ..] if !name.is_empty() => {
                    self.attack(&String::from_utf8_lossy(name))
                }
                _ => Err(SimulationError::InvalidRequest {
                    command,
                    reason: "expected by-name marker and a level name",
                }),
            },
            Command::Move => match args {
                [id, ..] => match MoveDirection::from_u8(*id) {
                    Some(direction) => {
                        self.manager.handle_move(direction);
                        Ok(())
                    }
                    None => Err(SimulationError::InvalidRequest {
                        command,
                        reason: "direction byte out of range",
                    }),
                },
                [] => Err(SimulationError::InvalidRequest {
                    command,
                    reason: "direction must be provided",
                }),
            },
            Command::UseThing => {
                self.manager.handle_use_thing();
                Ok(())
            }
            Command::UseSkill => match args {
                [id, ..] => self.manager.handle_use_skill(*id),
                [] => Err(SimulationError::InvalidRequest {
                    command,
                    reason: "ability must be provided",
                }),
            },
            // The keep-alive probe has nothing to refresh offline.
            Command::UserInfo => Ok(()),
            other => Err(SimulationError::UnsupportedCommand { command: other }),
        }
    }

    /// Tears any running battle down.
    pub fn close(&self) {
        self.manager.close();
    }

    /// Whether a battle is running.
    #[must_use]
    pub fn battle_active(&self) -> bool {
        self.manager.battle_active()
    }

    /// Starts a battle on the named level. Offline the "victim name" of
    /// an invitation is the level to play.
    fn attack(&self, level_name: &str) -> SimulationResult<()> {
        let abilities = self
            .model
            .ability_expiry()
            .into_iter()
            .map(|(ability, _)| ability)
            .collect();
        let character1 = self.model.character();
        let character2 = self.enemy_character(character1);
        self.manager.accept(
            character1,
            character2,
            abilities,
            Vec::new(),
            vec![level_name.to_owned()],
            OFFLINE_ROUND_SEC,
            OFFLINE_WINS_NEEDED,
        )
    }

    /// Picks a random character different from the player's.
    fn enemy_character(&self, ours: Character) -> Character {
        let candidates: Vec<Character> = Character::PLAYABLE
            .iter()
            .copied()
            .filter(|&c| c != ours)
            .collect();
        let index = self.rng.lock().gen_range(0..candidates.len());
        candidates[index]
    }
}
