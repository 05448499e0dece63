use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::sync::broadcast;

use super::{check_quota, ContextId, Storage, StorageEvent, StorageKey, EVENT_CHANNEL_CAPACITY};
use crate::error::StorageResult;

/// File-backed storage for a native client: one JSON file per record.
///
/// Notifications are delivered to subscribers within the same process.
#[derive(Clone)]
pub struct FileStorage {
    dir: PathBuf,
    events: broadcast::Sender<StorageEvent>,
    quota: Option<usize>,
}

impl FileStorage {
    /// Opens (and creates if needed) the storage directory
    pub fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        tracing::info!(dir = %dir.display(), "Opened file storage");
        Ok(Self {
            dir,
            events,
            quota: None,
        })
    }

    pub fn with_quota(mut self, limit: Option<usize>) -> Self {
        self.quota = limit;
        self
    }

    fn path_for(&self, key: StorageKey) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: StorageKey) -> StorageResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: StorageKey, value: &str, origin: ContextId) -> StorageResult<()> {
        check_quota(key, value, self.quota)?;

        // Write then rename so a crash never leaves a half-written record.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;

        let _ = self.events.send(StorageEvent {
            key,
            new_value: Some(value.to_string()),
            origin,
        });
        Ok(())
    }

    fn remove(&self, key: StorageKey, origin: ContextId) -> StorageResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let _ = self.events.send(StorageEvent {
            key,
            new_value: None,
            origin,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}
