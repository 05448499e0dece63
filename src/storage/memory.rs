use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use super::{check_quota, ContextId, Storage, StorageEvent, StorageKey, EVENT_CHANNEL_CAPACITY};
use crate::error::{StorageError, StorageResult};

/// In-process storage. Clones share records and notifications, so two clones
/// behave like two tabs of the same browser profile.
#[derive(Clone)]
pub struct MemoryStorage {
    records: Arc<Mutex<HashMap<StorageKey, String>>>,
    events: broadcast::Sender<StorageEvent>,
    quota: Option<usize>,
    unavailable: Arc<AtomicBool>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            events,
            quota: None,
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Limits every record to `limit` bytes
    pub fn with_quota(mut self, limit: usize) -> Self {
        self.quota = Some(limit);
        self
    }

    /// Makes every read and write fail until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Writes a record without notifying anyone, as if it was already on disk
    pub fn preload(&self, key: StorageKey, value: impl Into<String>) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(key, value.into());
        }
    }

    fn ensure_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory storage disabled".to_string()));
        }
        Ok(())
    }

    fn records(&self) -> StorageResult<std::sync::MutexGuard<'_, HashMap<StorageKey, String>>> {
        self.records
            .lock()
            .map_err(|e| StorageError::Unavailable(format!("poisoned storage lock: {}", e)))
    }

    fn notify(&self, key: StorageKey, new_value: Option<String>, origin: ContextId) {
        // No receivers is fine: nobody else is listening.
        let _ = self.events.send(StorageEvent {
            key,
            new_value,
            origin,
        });
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: StorageKey) -> StorageResult<Option<String>> {
        self.ensure_available()?;
        Ok(self.records()?.get(&key).cloned())
    }

    fn set(&self, key: StorageKey, value: &str, origin: ContextId) -> StorageResult<()> {
        self.ensure_available()?;
        check_quota(key, value, self.quota)?;
        self.records()?.insert(key, value.to_string());
        self.notify(key, Some(value.to_string()), origin);
        Ok(())
    }

    fn remove(&self, key: StorageKey, origin: ContextId) -> StorageResult<()> {
        self.ensure_available()?;
        self.records()?.remove(&key);
        self.notify(key, None, origin);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let storage = MemoryStorage::new();
        let origin = ContextId::new();
        storage.set(StorageKey::Views, r#"{"1":2}"#, origin).unwrap();
        assert_eq!(
            storage.get(StorageKey::Views).unwrap(),
            Some(r#"{"1":2}"#.to_string())
        );
        assert_eq!(storage.get(StorageKey::LegacyPreferences).unwrap(), None);
    }

    #[test]
    fn test_clones_share_records_and_events() {
        let tab_a = MemoryStorage::new();
        let tab_b = tab_a.clone();
        let mut rx = tab_b.subscribe();
        let origin = ContextId::new();

        tab_a.set(StorageKey::Views, "{}", origin).unwrap();

        assert_eq!(tab_b.get(StorageKey::Views).unwrap(), Some("{}".to_string()));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.key, StorageKey::Views);
        assert_eq!(event.new_value.as_deref(), Some("{}"));
        assert_eq!(event.origin, origin);
    }

    #[test]
    fn test_remove_notifies_with_none() {
        let storage = MemoryStorage::new();
        let mut rx = storage.subscribe();
        let origin = ContextId::new();
        storage.set(StorageKey::Views, "{}", origin).unwrap();
        storage.remove(StorageKey::Views, origin).unwrap();

        let _ = rx.try_recv().unwrap();
        assert_eq!(rx.try_recv().unwrap().new_value, None);
        assert_eq!(storage.get(StorageKey::Views).unwrap(), None);
    }

    #[test]
    fn test_quota_rejects_large_records() {
        let storage = MemoryStorage::new().with_quota(4);
        let result = storage.set(StorageKey::Views, r#"{"12":1}"#, ContextId::new());
        assert!(matches!(result, Err(StorageError::QuotaExceeded { .. })));
        assert_eq!(storage.get(StorageKey::Views).unwrap(), None);
    }

    #[test]
    fn test_unavailable_fails_reads_and_writes() {
        let storage = MemoryStorage::new();
        storage.set_unavailable(true);
        assert!(storage.get(StorageKey::Views).is_err());
        assert!(storage.set(StorageKey::Views, "{}", ContextId::new()).is_err());
        storage.set_unavailable(false);
        assert!(storage.get(StorageKey::Views).is_ok());
    }
}
