//! Persistence backends for the locally-scoped preference and view records.
//!
//! A backend stores raw string records under a small fixed set of keys and
//! notifies every subscriber when a record changes. Each store object tags
//! its writes with its own [`ContextId`] so it can ignore the echo of its own
//! changes, the way a browser tab never sees its own storage events.

use std::fmt::Display;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::StorageResult;

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Capacity of the change-notification channel before receivers start lagging
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    LegacyPreferences,
    VersionedPreferences,
    Views,
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKey::LegacyPreferences => write!(f, "look.prefs.v1"),
            StorageKey::VersionedPreferences => write!(f, "look.prefs.v2"),
            StorageKey::Views => write!(f, "look.metrics.v1.views"),
        }
    }
}

/// Identity of one execution context sharing a storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Change notification carrying the new raw value of a record.
/// `new_value` is `None` when the record was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEvent {
    pub key: StorageKey,
    pub new_value: Option<String>,
    pub origin: ContextId,
}

/// Key/value persistence with change notifications
pub trait Storage: Send + Sync {
    /// Reads a record, `None` if it was never written
    fn get(&self, key: StorageKey) -> StorageResult<Option<String>>;

    /// Writes a record and notifies subscribers
    fn set(&self, key: StorageKey, value: &str, origin: ContextId) -> StorageResult<()>;

    /// Removes a record and notifies subscribers
    fn remove(&self, key: StorageKey, origin: ContextId) -> StorageResult<()>;

    /// Subscribes to changes made through any handle of this backend
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}

/// Reads a record, logging and swallowing backend failures
pub fn read_or_log(storage: &dyn Storage, key: StorageKey) -> Option<String> {
    match storage.get(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Storage read failed, using empty state");
            None
        }
    }
}

/// Writes a record, logging and swallowing backend failures.
/// Returns whether the write landed.
pub fn write_or_log(storage: &dyn Storage, key: StorageKey, value: &str, origin: ContextId) -> bool {
    match storage.set(key, value, origin) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Storage write failed, change dropped");
            false
        }
    }
}

/// Rejects a value larger than the optional per-record quota
pub(crate) fn check_quota(key: StorageKey, value: &str, quota: Option<usize>) -> StorageResult<()> {
    match quota {
        Some(limit) if value.len() > limit => Err(crate::error::StorageError::QuotaExceeded {
            key: key.to_string(),
            size: value.len(),
            limit,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_display() {
        assert_eq!(StorageKey::LegacyPreferences.to_string(), "look.prefs.v1");
        assert_eq!(StorageKey::VersionedPreferences.to_string(), "look.prefs.v2");
        assert_eq!(StorageKey::Views.to_string(), "look.metrics.v1.views");
    }

    #[test]
    fn test_check_quota() {
        assert!(check_quota(StorageKey::Views, "{}", None).is_ok());
        assert!(check_quota(StorageKey::Views, "{}", Some(2)).is_ok());
        assert!(check_quota(StorageKey::Views, "{\"1\":1}", Some(2)).is_err());
    }

    #[test]
    fn test_context_ids_are_distinct() {
        assert_ne!(ContextId::new(), ContextId::new());
    }
}
