/// Snapshot persistence: chat state stored through a key-value collaborator
/// Frugal: one serialized value per key, no queries
///
/// Keys: `chats`, `messages`, `selected_chat_id`, `theme_mode`. Every value
/// is a JSON envelope `{"version": 1, "data": ...}`; a missing or
/// unparseable value falls back to the demo dataset (chats/messages) or to
/// defaults, never fails hydration.
use crate::demo;
use crate::error::{ChatError, Result};
use crate::state::ChatState;
use crate::types::{Chat, Message, ThemeMode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

pub const SNAPSHOT_VERSION: u32 = 1;

pub const KEY_CHATS: &str = "chats";
pub const KEY_MESSAGES: &str = "messages";
pub const KEY_SELECTED: &str = "selected_chat_id";
pub const KEY_THEME: &str = "theme_mode";

/// External key-value persistence contract. Values are opaque serialized
/// snapshots; the backend never interprets them.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

/// Key-value store backed by a sled embedded database
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open (or create) the snapshot DB in the given data directory
    pub fn new(data_dir: &Path) -> Result<Self> {
        let db_path = data_dir.join("snapshot.db");
        debug!("Opening snapshot store at {:?}", db_path);
        let db = sled::open(&db_path)
            .map_err(|e| ChatError::Storage(format!("Failed to open snapshot DB: {}", e)))?;
        Ok(Self { db })
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self
            .db
            .get(key.as_bytes())
            .map_err(|e| ChatError::Storage(format!("Failed to read {}: {}", key, e)))?
        {
            Some(value) => {
                let text = String::from_utf8(value.to_vec())
                    .map_err(|e| ChatError::Storage(format!("Non-UTF8 value at {}: {}", key, e)))?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value.as_bytes())
            .map_err(|e| ChatError::Storage(format!("Failed to write {}: {}", key, e)))?;
        self.db
            .flush()
            .map_err(|e| ChatError::Storage(format!("Failed to flush snapshot DB: {}", e)))?;
        Ok(())
    }
}

/// In-memory key-value store for tests and throwaway sessions
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self
            .map
            .lock()
            .map_err(|_| ChatError::Storage("memory store poisoned".to_string()))?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self
            .map
            .lock()
            .map_err(|_| ChatError::Storage("memory store poisoned".to_string()))?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Versioned wrapper around every persisted value
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    data: T,
}

/// Serializes snapshots of the chat state through a `KeyValueStore`
pub struct SnapshotStore {
    kv: Box<dyn KeyValueStore>,
}

impl SnapshotStore {
    pub fn new(kv: Box<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn save<T: Serialize>(&self, key: &str, data: &T) -> Result<()> {
        let envelope = Envelope {
            version: SNAPSHOT_VERSION,
            data,
        };
        let value = serde_json::to_string(&envelope)?;
        self.kv.set(key, &value)
    }

    /// Read one key; `None` means absent, corrupt, or wrong version.
    /// Parse failure is recoverable, not a crash.
    fn load_key<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.kv.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<Envelope<T>>(&raw) {
            Ok(envelope) if envelope.version == SNAPSHOT_VERSION => Ok(Some(envelope.data)),
            Ok(envelope) => {
                warn!(
                    "Snapshot key {} has unsupported version {}, ignoring",
                    key, envelope.version
                );
                Ok(None)
            }
            Err(e) => {
                warn!("Snapshot key {} failed to parse ({}), ignoring", key, e);
                Ok(None)
            }
        }
    }

    pub fn save_chats(&self, chats: &[Chat]) -> Result<()> {
        self.save(KEY_CHATS, &chats)
    }

    pub fn save_messages(&self, messages: &HashMap<String, Vec<Message>>) -> Result<()> {
        self.save(KEY_MESSAGES, messages)
    }

    pub fn save_selected(&self, selected: &Option<String>) -> Result<()> {
        self.save(KEY_SELECTED, selected)
    }

    pub fn save_theme(&self, theme: ThemeMode) -> Result<()> {
        self.save(KEY_THEME, &theme)
    }

    /// Hydrate the initial state. Each key falls back independently; the
    /// result is validated so the cross-key invariants hold even when the
    /// keys disagree (orphan histories dropped, dangling selection cleared).
    pub fn load(&self) -> Result<ChatState> {
        let chats: Vec<Chat> = match self.load_key(KEY_CHATS)? {
            Some(chats) => chats,
            None => {
                info!("No usable chat snapshot, seeding demo chats");
                demo::demo_chats()
            }
        };
        let mut messages: HashMap<String, Vec<Message>> = match self.load_key(KEY_MESSAGES)? {
            Some(messages) => messages,
            None => {
                info!("No usable message snapshot, seeding demo messages");
                demo::demo_messages()
            }
        };
        let selected: Option<String> = self.load_key(KEY_SELECTED)?.flatten();
        let theme: ThemeMode = self.load_key(KEY_THEME)?.unwrap_or_default();

        // Every message history must belong to an existing chat
        messages.retain(|chat_id, _| {
            let known = chats.iter().any(|c| c.id == *chat_id);
            if !known {
                warn!("Dropping message history for unknown chat {}", chat_id);
            }
            known
        });
        let selected_chat_id =
            selected.filter(|id| chats.iter().any(|c| c.id == *id));

        Ok(ChatState {
            chats,
            messages,
            selected_chat_id,
            theme,
            is_typing: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{DEMO_AI_CHAT_ID, DEMO_CONTACT_CHAT_ID};

    fn snapshot_store() -> SnapshotStore {
        SnapshotStore::new(Box::new(MemoryStore::new()))
    }

    #[test]
    fn test_empty_store_seeds_demo_data() {
        let store = snapshot_store();
        let state = store.load().unwrap();
        assert_eq!(state.chats.len(), 2);
        assert_eq!(state.history(DEMO_AI_CHAT_ID).len(), 1);
        assert_eq!(state.history(DEMO_CONTACT_CHAT_ID).len(), 1);
        assert!(state.selected_chat_id.is_none());
        assert_eq!(state.theme, ThemeMode::Light);
        assert!(!state.is_typing);
    }

    #[test]
    fn test_roundtrip_is_identical() {
        let store = snapshot_store();
        let mut state = store.load().unwrap();
        state.selected_chat_id = Some(DEMO_AI_CHAT_ID.to_string());
        state.theme = ThemeMode::Dark;

        store.save_chats(&state.chats).unwrap();
        store.save_messages(&state.messages).unwrap();
        store.save_selected(&state.selected_chat_id).unwrap();
        store.save_theme(state.theme).unwrap();

        let rehydrated = store.load().unwrap();
        assert_eq!(rehydrated.chats, state.chats);
        assert_eq!(rehydrated.messages, state.messages);
        assert_eq!(rehydrated.selected_chat_id, state.selected_chat_id);
        assert_eq!(rehydrated.theme, ThemeMode::Dark);
    }

    #[test]
    fn test_corrupt_value_falls_back_to_demo() {
        let kv = MemoryStore::new();
        kv.set(KEY_CHATS, "{not json").unwrap();
        kv.set(KEY_THEME, "\"also not an envelope\"").unwrap();
        let store = SnapshotStore::new(Box::new(kv));
        let state = store.load().unwrap();
        assert_eq!(state.chats.len(), 2);
        assert_eq!(state.theme, ThemeMode::Light);
    }

    #[test]
    fn test_unsupported_version_falls_back() {
        let kv = MemoryStore::new();
        kv.set(KEY_CHATS, "{\"version\":99,\"data\":[]}").unwrap();
        let store = SnapshotStore::new(Box::new(kv));
        let state = store.load().unwrap();
        // Version 99 is ignored, demo chats win
        assert_eq!(state.chats.len(), 2);
    }

    #[test]
    fn test_orphan_history_and_dangling_selection_dropped() {
        let store = snapshot_store();
        let state = store.load().unwrap();
        let mut messages = state.messages.clone();
        messages.insert("deleted-chat".to_string(), Vec::new());

        store.save_chats(&state.chats).unwrap();
        store.save_messages(&messages).unwrap();
        store
            .save_selected(&Some("deleted-chat".to_string()))
            .unwrap();

        let rehydrated = store.load().unwrap();
        assert!(!rehydrated.messages.contains_key("deleted-chat"));
        assert!(rehydrated.selected_chat_id.is_none());
    }

    #[test]
    fn test_sled_store_roundtrip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let kv = SledStore::new(temp_dir.path()).unwrap();
        kv.set("k", "v").unwrap();
        assert_eq!(kv.get("k").unwrap(), Some("v".to_string()));
        assert_eq!(kv.get("missing").unwrap(), None);
    }
}
