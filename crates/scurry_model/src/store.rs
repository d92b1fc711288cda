//! # Persistent Store
//!
//! Settings and per-user battle history live in a platform-provided
//! key/value file store. The model only ever sees [`FileStore`]: a pair of
//! string read/write primitives keyed by name. Serialization is TOML via
//! serde, so the files stay hand-inspectable.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// File name of the settings document.
pub const SETTINGS_FILE: &str = "settings";

/// File name prefix of per-user history documents.
pub const HISTORY_PREFIX: &str = "history/";

/// Platform file access, independent of where files actually live.
pub trait FileStore: Send + Sync {
    /// Reads a document, `None` when it does not exist.
    fn read(&self, name: &str) -> Option<String>;

    /// Writes a document, replacing any previous content.
    fn write(&self, name: &str, contents: &str);
}

/// Client settings persisted across sessions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// UI language code ("en", "ru").
    pub language: String,
    /// Pop a system notification on incoming invitations.
    pub notify_new_battles: bool,
    /// Last signed-in user name.
    pub name: String,
    /// Stored password digest for silent re-sign-in. Cleared on sign-out.
    pub hash: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: "en".into(),
            notify_new_battles: true,
            name: String::new(),
            hash: String::new(),
        }
    }
}

impl Settings {
    /// Parses a settings document; a missing or corrupt document yields
    /// the defaults (first launch behaves the same as a wiped file).
    #[must_use]
    pub fn load(store: &dyn FileStore) -> Option<Self> {
        let text = store.read(SETTINGS_FILE)?;
        match toml::from_str(&text) {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::warn!(error = %e, "corrupt settings file, using defaults");
                None
            }
        }
    }

    /// Writes the settings document.
    pub fn save(&self, store: &dyn FileStore) {
        match toml::to_string(self) {
            Ok(text) => store.write(SETTINGS_FILE, &text),
            Err(e) => tracing::warn!(error = %e, "failed to serialize settings"),
        }
    }
}

/// One finished game in the local history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    /// Wall-clock completion time, milliseconds since the UNIX epoch.
    pub timestamp_ms: u64,
    /// True when we won.
    pub winner: bool,
    /// Aggressor's name.
    pub aggressor: String,
    /// Defender's name.
    pub defender: String,
    /// Aggressor's character wire id.
    pub character1: u8,
    /// Defender's character wire id.
    pub character2: u8,
    /// Aggressor's final score.
    pub score1: u8,
    /// Defender's final score.
    pub score2: u8,
}

/// History document wrapper (TOML wants a table at the top level).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFile {
    /// Games, newest first.
    pub items: Vec<HistoryItem>,
}

impl HistoryFile {
    /// Reads the history of `user`; missing or corrupt files yield an
    /// empty history.
    #[must_use]
    pub fn load(store: &dyn FileStore, user: &str) -> Self {
        let name = format!("{HISTORY_PREFIX}{user}");
        let Some(text) = store.read(&name) else {
            return Self::default();
        };
        toml::from_str(&text).unwrap_or_else(|e| {
            tracing::warn!(error = %e, user, "corrupt history file, starting empty");
            Self::default()
        })
    }

    /// Writes the history of `user`.
    pub fn save(&self, store: &dyn FileStore, user: &str) {
        let name = format!("{HISTORY_PREFIX}{user}");
        match toml::to_string(self) {
            Ok(text) => store.write(&name, &text),
            Err(e) => tracing::warn!(error = %e, user, "failed to serialize history"),
        }
    }
}

/// In-memory store for tests and headless runs.
#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileStore for MemoryStore {
    fn read(&self, name: &str) -> Option<String> {
        self.files.lock().get(name).cloned()
    }

    fn write(&self, name: &str, contents: &str) {
        self.files.lock().insert(name.to_owned(), contents.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip() {
        let store = MemoryStore::new();
        let settings = Settings {
            language: "ru".into(),
            notify_new_battles: false,
            name: "Bobby".into(),
            hash: "d41d8cd98f00b204e9800998ecf8427e".into(),
        };
        settings.save(&store);
        assert_eq!(Settings::load(&store), Some(settings));
    }

    #[test]
    fn test_missing_and_corrupt_settings_fall_back() {
        let store = MemoryStore::new();
        assert_eq!(Settings::load(&store), None);
        store.write(SETTINGS_FILE, "not = [valid");
        assert_eq!(Settings::load(&store), None);
    }

    #[test]
    fn test_history_round_trip_per_user() {
        let store = MemoryStore::new();
        let mut file = HistoryFile::default();
        file.items.push(HistoryItem {
            timestamp_ms: 1_700_000_000_000,
            winner: true,
            aggressor: "Bobby".into(),
            defender: "Alice".into(),
            character1: 1,
            character2: 4,
            score1: 3,
            score2: 1,
        });
        file.save(&store, "Bobby");
        assert_eq!(HistoryFile::load(&store, "Bobby"), file);
        // Another user's history is untouched.
        assert!(HistoryFile::load(&store, "Alice").items.is_empty());
    }
}
