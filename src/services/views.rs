//! Local product view counters shared across execution contexts.
//!
//! Increments are read-modify-write against storage, so two contexts bumping
//! in the same instant can lose one increment. Last write wins.

use std::fmt::Display;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::models::ViewCounts;
use crate::storage::{read_or_log, write_or_log, ContextId, Storage, StorageEvent, StorageKey};

pub struct ViewMetrics {
    storage: Arc<dyn Storage>,
    context: ContextId,
    events: broadcast::Receiver<StorageEvent>,
    views: ViewCounts,
}

impl ViewMetrics {
    pub fn new(storage: Arc<dyn Storage>, context: ContextId) -> Self {
        let events = storage.subscribe();
        let views = load_views(storage.as_ref());
        Self {
            storage,
            context,
            events,
            views,
        }
    }

    /// Current product → count snapshot
    pub fn get_views(&self) -> &ViewCounts {
        &self.views
    }

    pub fn count(&self, product_id: &str) -> u64 {
        self.views.get(product_id).copied().unwrap_or(0)
    }

    /// Increments the counter of `product_id` and persists the whole mapping
    pub fn bump_view(&mut self, product_id: impl Display) {
        let key = product_id.to_string();
        let mut next = match self.storage.get(StorageKey::Views) {
            Ok(Some(raw)) => decode_views(&raw).unwrap_or_default(),
            Ok(None) => ViewCounts::new(),
            Err(e) => {
                tracing::warn!(error = %e, product_id = %key, "View counter unavailable, bump dropped");
                return;
            }
        };
        *next.entry(key.clone()).or_insert(0) += 1;

        let raw = match serde_json::to_string(&next) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode view counters");
                return;
            }
        };
        if write_or_log(self.storage.as_ref(), StorageKey::Views, &raw, self.context) {
            self.views = next;
        }
    }

    /// Applies view notifications from other contexts. Returns how many were applied.
    pub fn sync_remote(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) if event.key == StorageKey::Views && event.origin != self.context => {
                    match event.new_value.as_deref() {
                        None => {
                            self.views = ViewCounts::new();
                            applied += 1;
                        }
                        Some(raw) => match decode_views(raw) {
                            Some(views) => {
                                self.views = views;
                                applied += 1;
                            }
                            None => tracing::warn!("Ignoring malformed views notification"),
                        },
                    }
                }
                Ok(_) => {}
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "View notifications lagged, reloading");
                    self.views = load_views(self.storage.as_ref());
                    applied += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        applied
    }
}

fn load_views(storage: &dyn Storage) -> ViewCounts {
    read_or_log(storage, StorageKey::Views)
        .map(|raw| {
            decode_views(&raw).unwrap_or_else(|| {
                tracing::warn!("Malformed views blob, starting empty");
                ViewCounts::new()
            })
        })
        .unwrap_or_default()
}

/// Decodes `{ productId: count }`, dropping entries that are not counts
fn decode_views(raw: &str) -> Option<ViewCounts> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let entries = value.as_object()?;
    Some(
        entries
            .iter()
            .filter_map(|(id, count)| {
                let count = count
                    .as_u64()
                    .or_else(|| count.as_f64().filter(|c| c.is_finite() && *c >= 0.0).map(|c| c as u64))?;
                Some((id.clone(), count))
            })
            .collect(),
    )
}
