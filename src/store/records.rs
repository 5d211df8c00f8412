//! Typed accessors over the document stores.
//!
//! Three record kinds share the same storage shape but different lifecycles:
//! session records are superseded on re-registration and removed by explicit
//! cleanup; link records expire after a fixed age window; thread records are
//! only ever superseded, never actively deleted.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::address::FocusAddress;
use crate::store::{DocumentStore, StoreError};

/// Fixed age window after which a link record is treated as absent.
pub const LINK_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60;

/// A terminal session registered on the host that runs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub display_name: String,
    pub host: String,
    pub variant_type: String,
    pub focus_address: String,
    pub target_descriptor: String,
    pub created_at: i64,
}

impl SessionRecord {
    /// Build a record for a resolved address, with a generated id.
    pub fn new(display_name: &str, addr: &FocusAddress, host: &str, now: i64) -> Option<Self> {
        let focus_address = addr.encode().ok()?;
        Some(Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            display_name: display_name.to_string(),
            host: host.to_string(),
            variant_type: addr.variant_name().to_string(),
            focus_address,
            target_descriptor: addr.describe(),
            created_at: now,
        })
    }
}

/// A cross-host pairing, persisted only on the initiating host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub link_id: String,
    pub display_name: String,
    pub variant_type: String,
    pub target_descriptor: String,
    /// The local Focus Address rendering the linked terminal (the pane that
    /// runs the ssh client or browser bridge).
    pub focus_address: String,
    /// Control endpoint of the cooperating host that owns the real pane.
    pub peer_control_url: String,
    pub created_at: i64,
}

/// Maps a conversation thread to the address its follow-up replies target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub thread_id: String,
    pub focus_address: String,
    pub variant_type: String,
    pub created_at: i64,
}

/// Decode a typed record leniently: malformed documents are logged and
/// treated as absent, because reads sit on the webhook hot path.
fn decode_record<T: for<'de> Deserialize<'de>>(id: &str, doc: serde_json::Value) -> Option<T> {
    match serde_json::from_value(doc) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(id, error = %e, "dropping record with unexpected shape");
            None
        }
    }
}

// ── Sessions ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn DocumentStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.store.get(id)?.and_then(|doc| decode_record(id, doc)))
    }

    /// Write a record, superseding any previous registration under the id.
    pub fn put(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let doc = serde_json::to_value(record).map_err(StoreError::Encode)?;
        self.store.put(&record.id, &doc)
    }

    pub fn list(&self) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter_map(|(id, doc)| decode_record(&id, doc))
            .collect())
    }

    pub fn remove(&self, id: &str) -> Result<bool, StoreError> {
        self.store.delete(id)
    }

    /// Drop sessions older than `max_age_secs`. Returns how many went away.
    pub fn cleanup_older_than(&self, max_age_secs: i64, now: i64) -> Result<usize, StoreError> {
        let mut removed = 0;
        for record in self.list()? {
            if now - record.created_at > max_age_secs && self.store.delete(&record.id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Resolve a legacy opaque id to its Focus Address.
    pub fn resolve(&self, id: &str) -> Option<FocusAddress> {
        let record = self.get(id).ok().flatten()?;
        FocusAddress::decode(&record.focus_address)
    }
}

// ── Links ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct LinkStore {
    store: Arc<dyn DocumentStore>,
}

impl LinkStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Look up a link, treating anything past the age window as absent.
    /// Expired records are removed on the way out.
    pub fn get(&self, link_id: &str, now: i64) -> Result<Option<LinkRecord>, StoreError> {
        let Some(record) = self
            .store
            .get(link_id)?
            .and_then(|doc| decode_record::<LinkRecord>(link_id, doc))
        else {
            return Ok(None);
        };
        if now - record.created_at > LINK_MAX_AGE_SECS {
            tracing::info!(link_id, "dropping expired link record");
            self.store.delete(link_id)?;
            return Ok(None);
        }
        Ok(Some(record))
    }

    pub fn put(&self, record: &LinkRecord) -> Result<(), StoreError> {
        let doc = serde_json::to_value(record).map_err(StoreError::Encode)?;
        self.store.put(&record.link_id, &doc)
    }

    pub fn remove(&self, link_id: &str) -> Result<bool, StoreError> {
        self.store.delete(link_id)
    }
}

// ── Threads ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ThreadStore {
    store: Arc<dyn DocumentStore>,
}

impl ThreadStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn get(&self, thread_id: &str) -> Result<Option<ThreadRecord>, StoreError> {
        Ok(self
            .store
            .get(thread_id)?
            .and_then(|doc| decode_record(thread_id, doc)))
    }

    /// Write a mapping; a later notification for the same thread supersedes.
    pub fn put(&self, record: &ThreadRecord) -> Result<(), StoreError> {
        let doc = serde_json::to_value(record).map_err(StoreError::Encode)?;
        self.store.put(&record.thread_id, &doc)
    }
}
