//! # Level Catalogue
//!
//! Level files are raw `FullState` payloads: one bootstrap byte per cell,
//! optionally followed by trailing sections (the built-in level carries a
//! style-pack section). The server ships levels on disk; offline the
//! catalogue is built in, with an insertion hook for custom levels.

use std::collections::HashMap;

use scurry_model::{ObjectKind, CELL_COUNT, HEIGHT, WIDTH};

/// Name of the built-in training level.
pub const TRAINING_LEVEL: &str = "training";

/// Named levels available to the emulator.
pub struct LevelCatalog {
    levels: HashMap<String, Vec<u8>>,
}

impl LevelCatalog {
    /// The built-in catalogue: just the training level.
    #[must_use]
    pub fn builtin() -> Self {
        let mut levels = HashMap::new();
        levels.insert(TRAINING_LEVEL.to_owned(), training_level());
        Self { levels }
    }

    /// Adds or replaces a level.
    pub fn insert(&mut self, name: &str, bytes: Vec<u8>) {
        self.levels.insert(name.to_owned(), bytes);
    }

    /// Raw bytes of a level.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.levels.get(name).map(Vec::as_slice)
    }
}

/// Builds the training level: a bottom-row run of food in front of the
/// entry, then the dangerous half - mushroom, wolf, water, a ladder up to
/// a waterfall ledge - capped by a block. Walking right and eating
/// everything safe wins the round without meeting a hazard.
fn training_level() -> Vec<u8> {
    let bottom = |x: u8| (HEIGHT - 1) as usize * WIDTH as usize + x as usize;
    let upper = |x: u8| (HEIGHT - 2) as usize * WIDTH as usize + x as usize;

    let mut bytes = vec![0u8; CELL_COUNT];
    bytes[bottom(0)] = ObjectKind::Entry1 as u8;
    bytes[bottom(1)] = ObjectKind::Actor1 as u8;
    bytes[bottom(5)] = ObjectKind::Apple as u8;
    bytes[bottom(9)] = ObjectKind::Pear as u8;
    bytes[bottom(13)] = ObjectKind::Meat as u8;
    bytes[bottom(17)] = ObjectKind::Carrot as u8;
    bytes[bottom(21)] = ObjectKind::Nut as u8;
    bytes[bottom(25)] = ObjectKind::Mushroom as u8;
    bytes[bottom(28)] = ObjectKind::Umbrella as u8;
    bytes[bottom(30)] = ObjectKind::Wolf as u8;
    bytes[bottom(35)] = 0x80; // water
    bytes[bottom(40)] = ObjectKind::LadderBottom as u8;
    bytes[upper(40)] = ObjectKind::LadderTop as u8;
    bytes[upper(44)] = ObjectKind::Waterfall as u8;
    bytes[bottom(48)] = ObjectKind::Block as u8;
    bytes[bottom(50)] = ObjectKind::Entry2 as u8;

    // Trailing style-pack section, exercised by the full-state parser.
    bytes.extend_from_slice(&[2, 1, 1]);
    bytes
}
