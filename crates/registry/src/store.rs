//! Persistence for registry state and the event log.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use sled::{Batch, Db, Tree};
use std::path::Path;

use crate::state::RegistryState;
use crate::types::EventRecord;

/// Backend holding the latest committed state and every committed event.
///
/// `commit` must persist the state together with its events, or neither.
pub trait RegistryStore: Send + Sync {
    fn load(&self) -> Result<Option<RegistryState>>;
    fn commit(&self, state: &RegistryState, events: &[EventRecord]) -> Result<()>;
    /// Up to `limit` events with `seq >= from`, in log order.
    fn events_since(&self, from: u64, limit: usize) -> Result<Vec<EventRecord>>;
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory backend for tests and ephemeral nodes
#[derive(Default)]
pub struct MemoryRegistryStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    state: Option<RegistryState>,
    events: Vec<EventRecord>,
}

impl MemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistryStore for MemoryRegistryStore {
    fn load(&self) -> Result<Option<RegistryState>> {
        Ok(self.inner.read().state.clone())
    }

    fn commit(&self, state: &RegistryState, events: &[EventRecord]) -> Result<()> {
        let mut inner = self.inner.write();
        inner.state = Some(state.clone());
        inner.events.extend_from_slice(events);
        Ok(())
    }

    fn events_since(&self, from: u64, limit: usize) -> Result<Vec<EventRecord>> {
        Ok(self
            .inner
            .read()
            .events
            .iter()
            .filter(|record| record.seq >= from)
            .take(limit)
            .cloned()
            .collect())
    }
}

const STATE_KEY: &[u8] = b"state";
const EVENT_PREFIX: &[u8] = b"event/";

fn event_key(seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(EVENT_PREFIX.len() + 8);
    key.extend_from_slice(EVENT_PREFIX);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Sled-backed implementation.
///
/// State and events share one tree so a commit is a single atomic batch.
pub struct SledRegistryStore {
    db: Db,
    registry: Tree,
}

impl SledRegistryStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path)
            .with_context(|| format!("failed to open registry database at {}", path.display()))?;
        let registry = db.open_tree("registry")?;
        Ok(Self { db, registry })
    }
}

impl RegistryStore for SledRegistryStore {
    fn load(&self) -> Result<Option<RegistryState>> {
        self.registry
            .get(STATE_KEY)?
            .map(|v| serde_json::from_slice(&v))
            .transpose()
            .map_err(Into::into)
    }

    fn commit(&self, state: &RegistryState, events: &[EventRecord]) -> Result<()> {
        let mut batch = Batch::default();
        batch.insert(STATE_KEY, serde_json::to_vec(state)?);
        for record in events {
            batch.insert(event_key(record.seq), serde_json::to_vec(record)?);
        }
        self.registry.apply_batch(batch)?;
        Ok(())
    }

    fn events_since(&self, from: u64, limit: usize) -> Result<Vec<EventRecord>> {
        self.registry
            .range(event_key(from)..)
            .take_while(|item| {
                item.as_ref()
                    .map(|(key, _)| key.starts_with(EVENT_PREFIX))
                    .unwrap_or(true)
            })
            .take(limit)
            .map(|item| {
                let (_, v) = item?;
                Ok(serde_json::from_slice::<EventRecord>(&v)?)
            })
            .collect()
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
