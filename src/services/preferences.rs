//! Local, decaying, multi-dimensional preference store.
//!
//! Two schema generations live side by side in storage: the legacy blob (raw
//! accumulated weights, read-only) and the versioned blob (weight plus
//! timestamp, written by every bump and decayed on session load). Readers see
//! the per-key maximum of both.
//!
//! Every operation is best-effort. A storage failure is logged and the
//! in-memory snapshot keeps its previous value.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::models::{
    fold_key, reconcile, Dimension, EffectivePreferences, LegacyPreferences, PreferenceEntry,
    StoredPreferences, VersionedPreferences,
};
use crate::storage::{read_or_log, write_or_log, ContextId, Storage, StorageEvent, StorageKey};

const SECONDS_PER_DAY: f64 = 86_400.0;

pub struct PreferenceStore {
    storage: Arc<dyn Storage>,
    context: ContextId,
    events: broadcast::Receiver<StorageEvent>,
    legacy: LegacyPreferences,
    versioned: VersionedPreferences,
}

impl PreferenceStore {
    /// Loads both schema generations; unreadable or malformed blobs start empty
    pub fn new(storage: Arc<dyn Storage>, context: ContextId) -> Self {
        let events = storage.subscribe();
        let mut store = Self {
            storage,
            context,
            events,
            legacy: LegacyPreferences::default(),
            versioned: VersionedPreferences::default(),
        };
        store.reload();
        store
    }

    /// Re-reads both blobs from storage
    pub fn reload(&mut self) {
        self.legacy = read_or_log(self.storage.as_ref(), StorageKey::LegacyPreferences)
            .map(|raw| decode_or_default(&raw, StorageKey::LegacyPreferences, LegacyPreferences::decode))
            .unwrap_or_default();
        self.versioned = read_or_log(self.storage.as_ref(), StorageKey::VersionedPreferences)
            .map(|raw| {
                decode_or_default(&raw, StorageKey::VersionedPreferences, VersionedPreferences::decode)
            })
            .unwrap_or_default();
    }

    /// Adds `weight` to a key of the versioned schema and stamps it with now
    pub fn bump(&mut self, dimension: Dimension, key: &str, weight: f64) {
        self.bump_at(dimension, key, weight, Utc::now());
    }

    pub fn bump_at(&mut self, dimension: Dimension, key: &str, weight: f64, now: DateTime<Utc>) {
        if !weight.is_finite() || weight <= 0.0 {
            return;
        }
        let key = fold_key(key);
        if key.is_empty() {
            return;
        }

        let mut next = self.versioned.clone();
        let entry = next
            .dimensions
            .entry(dimension)
            .or_default()
            .entry(key.clone())
            .or_insert(PreferenceEntry {
                weight: 0.0,
                last_updated: 0,
            });
        entry.weight += weight;
        entry.last_updated = now.timestamp();

        if self.persist(&next) {
            tracing::debug!(dimension = %dimension, key = %key, weight, "Preference bumped");
            self.versioned = next;
        }
    }

    pub fn bump_category(&mut self, category: &str, weight: f64) {
        self.bump(Dimension::Category, category, weight);
    }

    pub fn bump_store(&mut self, store: &str, weight: f64) {
        self.bump(Dimension::Store, store, weight);
    }

    pub fn bump_gender(&mut self, gender: &str, weight: f64) {
        self.bump(Dimension::Gender, gender, weight);
    }

    pub fn bump_size(&mut self, size: &str, weight: f64) {
        self.bump(Dimension::Size, size, weight);
    }

    pub fn bump_price_bucket(&mut self, bucket: &str, weight: f64) {
        self.bump(Dimension::PriceBucket, bucket, weight);
    }

    pub fn bump_eta_bucket(&mut self, bucket: &str, weight: f64) {
        self.bump(Dimension::EtaBucket, bucket, weight);
    }

    pub fn bump_product(&mut self, product_id: i64, weight: f64) {
        self.bump(Dimension::Product, &product_id.to_string(), weight);
    }

    /// Applies exponential decay to every versioned weight. Meant to run once
    /// per session load.
    pub fn decay_all(&mut self, half_life_days: f64) {
        self.decay_all_at(half_life_days, Utc::now());
    }

    /// Multiplies each weight by `0.5 ^ (elapsed_days / half_life_days)` and
    /// restamps it with `now`, so consecutive decays compose. Entries without
    /// a timestamp are stamped but not decayed; timestamps in the future count
    /// as no elapsed time and are kept.
    pub fn decay_all_at(&mut self, half_life_days: f64, now: DateTime<Utc>) {
        if !half_life_days.is_finite() || half_life_days <= 0.0 {
            tracing::warn!(half_life_days, "Ignoring decay with non-positive half-life");
            return;
        }

        let now_secs = now.timestamp();
        let mut next = self.versioned.clone();
        let mut decayed = 0usize;
        for entry in next.dimensions.values_mut().flat_map(|keys| keys.values_mut()) {
            if entry.last_updated > 0 {
                let elapsed_days = (now_secs - entry.last_updated).max(0) as f64 / SECONDS_PER_DAY;
                entry.weight *= 0.5_f64.powf(elapsed_days / half_life_days);
                decayed += 1;
            }
            entry.last_updated = entry.last_updated.max(now_secs);
        }

        if next == self.versioned {
            return;
        }
        if self.persist(&next) {
            tracing::info!(entries = decayed, half_life_days, "Preference weights decayed");
            self.versioned = next;
        }
    }

    pub fn read_legacy(&self) -> &LegacyPreferences {
        &self.legacy
    }

    pub fn read_versioned(&self) -> &VersionedPreferences {
        &self.versioned
    }

    /// Per-key maximum across both schema generations
    pub fn read_effective(&self) -> EffectivePreferences {
        reconcile(&[
            StoredPreferences::Legacy(self.legacy.clone()),
            StoredPreferences::Versioned(self.versioned.clone()),
        ])
    }

    /// Applies change notifications from other contexts as whole-snapshot
    /// replacements. Returns how many were applied.
    pub fn sync_remote(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if event.origin != self.context && self.apply_event(&event) {
                        applied += 1;
                    }
                }
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Preference notifications lagged, reloading");
                    self.reload();
                    applied += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        applied
    }

    fn apply_event(&mut self, event: &StorageEvent) -> bool {
        match event.key {
            StorageKey::LegacyPreferences => match event.new_value.as_deref() {
                None => {
                    self.legacy = LegacyPreferences::default();
                    true
                }
                Some(raw) => match LegacyPreferences::decode(raw) {
                    Some(prefs) => {
                        self.legacy = prefs;
                        true
                    }
                    None => {
                        tracing::warn!(key = %event.key, "Ignoring malformed preference notification");
                        false
                    }
                },
            },
            StorageKey::VersionedPreferences => match event.new_value.as_deref() {
                None => {
                    self.versioned = VersionedPreferences::default();
                    true
                }
                Some(raw) => match VersionedPreferences::decode(raw) {
                    Some(prefs) => {
                        self.versioned = prefs;
                        true
                    }
                    None => {
                        tracing::warn!(key = %event.key, "Ignoring malformed preference notification");
                        false
                    }
                },
            },
            StorageKey::Views => false,
        }
    }

    fn persist(&self, next: &VersionedPreferences) -> bool {
        match next.encode() {
            Ok(raw) => write_or_log(
                self.storage.as_ref(),
                StorageKey::VersionedPreferences,
                &raw,
                self.context,
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode preferences");
                false
            }
        }
    }
}

fn decode_or_default<T: Default>(raw: &str, key: StorageKey, decode: fn(&str) -> Option<T>) -> T {
    decode(raw).unwrap_or_else(|| {
        tracing::warn!(key = %key, "Malformed stored blob, starting empty");
        T::default()
    })
}
