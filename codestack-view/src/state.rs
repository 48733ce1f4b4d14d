use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use codestack_core::SlotKey;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FrameHeight {
    ViewportShare(f32),
    Pixels(f32),
}

impl FrameHeight {
    pub fn resolve(self, viewport_height: f32) -> f32 {
        match self {
            FrameHeight::ViewportShare(share) => viewport_height * share,
            FrameHeight::Pixels(px) => px,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStateRecord {
    pub height: FrameHeight,
    pub scroll_offset: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Snapshot {
    frames: BTreeMap<SlotKey, ViewStateRecord>,
}

/// View-local storage that outlives a hidden view but not a closed one.
pub trait ViewStorage: Send + Sync {
    fn get_state(&self) -> Result<Option<serde_json::Value>>;
    fn set_state(&self, state: serde_json::Value) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryViewStorage {
    inner: Mutex<Option<serde_json::Value>>,
}

impl MemoryViewStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ViewStorage for MemoryViewStorage {
    fn get_state(&self) -> Result<Option<serde_json::Value>> {
        Ok(self.inner.lock().clone())
    }

    fn set_state(&self, state: serde_json::Value) -> Result<()> {
        *self.inner.lock() = Some(state);
        Ok(())
    }
}

pub struct ViewStateStore {
    storage: Arc<dyn ViewStorage>,
    records: BTreeMap<SlotKey, ViewStateRecord>,
}

impl ViewStateStore {
    pub fn open(storage: Arc<dyn ViewStorage>) -> Result<Self> {
        let records = match storage.get_state()? {
            Some(raw) => match serde_json::from_value::<Snapshot>(raw) {
                Ok(snapshot) => snapshot.frames,
                Err(err) => {
                    warn!(?err, "discarding unreadable view state");
                    BTreeMap::new()
                }
            },
            None => BTreeMap::new(),
        };
        Ok(Self { storage, records })
    }

    pub fn get(&self, key: &SlotKey) -> Option<&ViewStateRecord> {
        self.records.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SlotKey> {
        self.records.keys()
    }

    /// Records the given slots and writes the whole snapshot back.
    pub fn persist<I>(&mut self, slots: I) -> Result<()>
    where
        I: IntoIterator<Item = (SlotKey, ViewStateRecord)>,
    {
        self.records.extend(slots);
        self.write()
    }

    /// Drops every record whose key is not in `valid`, returning the dropped keys.
    pub fn prune(&mut self, valid: &[SlotKey]) -> Result<Vec<SlotKey>> {
        let stale: Vec<SlotKey> = self
            .records
            .keys()
            .filter(|key| !valid.contains(key))
            .cloned()
            .collect();
        for key in &stale {
            self.records.remove(key);
        }
        debug!(removed = stale.len(), "pruned stored view state");
        self.write()?;
        Ok(stale)
    }

    fn write(&self) -> Result<()> {
        let snapshot = Snapshot {
            frames: self.records.clone(),
        };
        let value = serde_json::to_value(&snapshot).context("failed to encode view state")?;
        self.storage.set_state(value)
    }
}
