use crate::core::io::KeyValueStorage;
use crate::core::state::FlowchartState;
use anyhow::{Context, Result};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

pub const KEY_CURRENT_NODE_ID: &str = "currentNodeId";
pub const KEY_TEASED_ITEMS: &str = "teasedItems";
pub const KEY_REVEALED_ITEMS: &str = "revealedItems";
pub const KEY_LISTENED_TIMESTAMP_INDEXES: &str = "listenedTimestampIndexes";
pub const KEY_PLAYBACK_POSITION: &str = "playbackPosition";

/// The subset of [`FlowchartState`] that survives a session, one storage key per field.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedState {
    pub current_node_id: String,
    pub teased_items: Vec<String>,
    pub revealed_items: Vec<String>,
    pub listened_timestamp_indexes: BTreeSet<usize>,
    pub playback_position: f64,
}

impl PersistedState {
    /// Storage keys in order. The first one doubles as the "previous session exists" signal.
    pub const KEYS: [&'static str; 5] = [
        KEY_CURRENT_NODE_ID,
        KEY_TEASED_ITEMS,
        KEY_REVEALED_ITEMS,
        KEY_LISTENED_TIMESTAMP_INDEXES,
        KEY_PLAYBACK_POSITION,
    ];

    pub fn capture(state: &FlowchartState) -> Self {
        Self {
            current_node_id: state.current_node_id.clone(),
            teased_items: state.teased_items.clone(),
            revealed_items: state.revealed_items.clone(),
            listened_timestamp_indexes: state.listened_timestamp_indexes.clone(),
            playback_position: state.playback_position,
        }
    }

    pub fn write(&self, storage: &dyn KeyValueStorage) -> Result<()> {
        encode(storage, KEY_CURRENT_NODE_ID, &self.current_node_id)?;
        encode(storage, KEY_TEASED_ITEMS, &self.teased_items)?;
        encode(storage, KEY_REVEALED_ITEMS, &self.revealed_items)?;
        encode(storage, KEY_LISTENED_TIMESTAMP_INDEXES, &self.listened_timestamp_indexes)?;
        encode(storage, KEY_PLAYBACK_POSITION, &self.playback_position)?;
        Ok(())
    }
}

/// Stored values, each `None` when its key is absent.
#[derive(Debug, Default)]
struct StoredValues {
    current_node_id: Option<String>,
    teased_items: Option<Vec<String>>,
    revealed_items: Option<Vec<String>>,
    listened_timestamp_indexes: Option<BTreeSet<usize>>,
    playback_position: Option<f64>,
}

impl StoredValues {
    fn read(storage: &dyn KeyValueStorage) -> Result<Self> {
        Ok(Self {
            current_node_id: decode(storage, KEY_CURRENT_NODE_ID)?,
            teased_items: decode(storage, KEY_TEASED_ITEMS)?,
            revealed_items: decode(storage, KEY_REVEALED_ITEMS)?,
            listened_timestamp_indexes: decode(storage, KEY_LISTENED_TIMESTAMP_INDEXES)?,
            playback_position: decode(storage, KEY_PLAYBACK_POSITION)?,
        })
    }

    fn apply(self, state: &mut FlowchartState) {
        if let Some(v) = self.current_node_id {
            state.current_node_id = v;
        }
        if let Some(v) = self.teased_items {
            state.teased_items = v;
        }
        if let Some(v) = self.revealed_items {
            state.revealed_items = v;
        }
        if let Some(v) = self.listened_timestamp_indexes {
            state.listened_timestamp_indexes = v;
        }
        if let Some(v) = self.playback_position {
            state.seek_to(v);
        }
    }
}

fn encode<T: Serialize>(storage: &dyn KeyValueStorage, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value).with_context(|| format!("Failed to encode {}", key))?;
    storage.set_item(key, &json)
}

fn decode<T: DeserializeOwned>(storage: &dyn KeyValueStorage, key: &str) -> Result<Option<T>> {
    match storage.get_item(key)? {
        Some(json) => {
            let value = serde_json::from_str(&json).with_context(|| format!("Failed to decode stored {}", key))?;
            Ok(Some(value))
        }
        None => {
            debug!("No stored value for {}", key);
            Ok(None)
        }
    }
}

pub fn save_to_local_storage(state: &FlowchartState, storage: &dyn KeyValueStorage) -> Result<()> {
    PersistedState::capture(state).write(storage)?;
    debug!("Saved state at node {}", state.current_node_id);
    Ok(())
}

/// Restores the persisted fields of a previous session. Returns whether one was found.
///
/// Every stored value is decoded before any field changes, so a corrupt entry
/// leaves `state` untouched.
pub fn resume_from_local_storage(state: &mut FlowchartState, storage: &dyn KeyValueStorage) -> Result<bool> {
    let signal = storage.get_item(PersistedState::KEYS[0])?;
    if !signal.is_some_and(|v| !v.is_empty()) {
        return Ok(false);
    }

    let stored = StoredValues::read(storage)?;

    state.resumed_from_local_storage = true;
    state.reset_action_available = true;
    stored.apply(state);

    info!("Resumed previous session at node {}", state.current_node_id);
    Ok(true)
}

/// Gates the automatic save so a reset is not undone by a save fired
/// between clearing the store and reloading.
#[derive(Debug, Default)]
pub struct AutoSave {
    halted: AtomicBool,
}

impl AutoSave {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether anything was written.
    pub fn save(&self, state: &FlowchartState, storage: &dyn KeyValueStorage) -> Result<bool> {
        if self.halted.load(Ordering::SeqCst) {
            debug!("Auto-save halted, skipping");
            return Ok(false);
        }
        save_to_local_storage(state, storage)?;
        Ok(true)
    }

    /// Stops all further saves, then wipes the store. The caller reloads afterwards.
    pub fn halt_and_clear(&self, storage: &dyn KeyValueStorage) -> Result<()> {
        self.halted.store(true, Ordering::SeqCst);
        storage.clear().context("Failed to clear storage")?;
        info!("Storage cleared, awaiting reload");
        Ok(())
    }
}

/// Wipes the whole store and re-initializes in-memory state as a fresh start would.
pub fn clear_local_storage_and_reload(state: &mut FlowchartState, storage: &dyn KeyValueStorage) -> Result<()> {
    storage.clear().context("Failed to clear storage")?;
    state.reset();
    info!("Storage cleared, state reset");
    Ok(())
}
