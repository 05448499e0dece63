use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Display;

/// Axis of implicit feedback, each an independent key space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dimension {
    #[serde(rename = "cat")]
    Category,
    #[serde(rename = "store")]
    Store,
    #[serde(rename = "gender")]
    Gender,
    #[serde(rename = "size")]
    Size,
    #[serde(rename = "price")]
    PriceBucket,
    #[serde(rename = "eta")]
    EtaBucket,
    #[serde(rename = "product")]
    Product,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::Category,
        Dimension::Store,
        Dimension::Gender,
        Dimension::Size,
        Dimension::PriceBucket,
        Dimension::EtaBucket,
        Dimension::Product,
    ];

    /// Name used inside the persisted blobs
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Category => "cat",
            Dimension::Store => "store",
            Dimension::Gender => "gender",
            Dimension::Size => "size",
            Dimension::PriceBucket => "price",
            Dimension::EtaBucket => "eta",
            Dimension::Product => "product",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == name)
    }
}

impl Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Case-folds a preference key the same way for writes and lookups
pub fn fold_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Decay-aware counter of the versioned schema
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreferenceEntry {
    #[serde(rename = "w")]
    pub weight: f64,
    /// Epoch seconds of the last bump
    #[serde(rename = "t")]
    pub last_updated: i64,
}

/// Legacy schema: raw accumulated weight per key, no timestamps
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegacyPreferences {
    pub dimensions: HashMap<Dimension, HashMap<String, f64>>,
}

/// Versioned schema: weight plus last-updated timestamp per key
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionedPreferences {
    pub dimensions: HashMap<Dimension, HashMap<String, PreferenceEntry>>,
}

impl LegacyPreferences {
    pub fn weight(&self, dimension: Dimension, key: &str) -> f64 {
        self.dimensions
            .get(&dimension)
            .and_then(|keys| keys.get(key))
            .copied()
            .unwrap_or(0.0)
    }

    /// Decodes a stored blob, dropping anything that is not a usable weight
    pub fn decode(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let mut dimensions = HashMap::new();
        for (dimension, keys) in dimension_maps(&value)? {
            let weights: HashMap<String, f64> = keys
                .iter()
                .filter_map(|(key, v)| v.as_f64().map(|w| (fold_key(key), sanitize_weight(w))))
                .collect();
            dimensions.insert(dimension, weights);
        }
        Some(Self { dimensions })
    }
}

impl VersionedPreferences {
    pub fn entry(&self, dimension: Dimension, key: &str) -> Option<&PreferenceEntry> {
        self.dimensions.get(&dimension).and_then(|keys| keys.get(key))
    }

    pub fn weight(&self, dimension: Dimension, key: &str) -> f64 {
        self.entry(dimension, key).map(|e| e.weight).unwrap_or(0.0)
    }

    /// Decodes a stored blob. Plain numbers are accepted as entries with no
    /// timestamp; malformed entries are dropped.
    pub fn decode(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let mut dimensions = HashMap::new();
        for (dimension, keys) in dimension_maps(&value)? {
            let entries: HashMap<String, PreferenceEntry> = keys
                .iter()
                .filter_map(|(key, v)| decode_entry(v).map(|e| (fold_key(key), e)))
                .collect();
            dimensions.insert(dimension, entries);
        }
        Some(Self { dimensions })
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Snapshot of one schema generation as read from storage
#[derive(Debug, Clone, PartialEq)]
pub enum StoredPreferences {
    Legacy(LegacyPreferences),
    Versioned(VersionedPreferences),
}

impl StoredPreferences {
    pub fn weight(&self, dimension: Dimension, key: &str) -> f64 {
        match self {
            StoredPreferences::Legacy(prefs) => prefs.weight(dimension, key),
            StoredPreferences::Versioned(prefs) => prefs.weight(dimension, key),
        }
    }

    fn keys(&self, dimension: Dimension) -> Vec<&String> {
        match self {
            StoredPreferences::Legacy(prefs) => prefs
                .dimensions
                .get(&dimension)
                .map(|keys| keys.keys().collect())
                .unwrap_or_default(),
            StoredPreferences::Versioned(prefs) => prefs
                .dimensions
                .get(&dimension)
                .map(|keys| keys.keys().collect())
                .unwrap_or_default(),
        }
    }
}

/// Per-key weights after reconciling both schema generations
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct EffectivePreferences {
    pub dimensions: HashMap<Dimension, HashMap<String, f64>>,
}

impl EffectivePreferences {
    /// Effective weight of a key; unknown keys weigh nothing
    pub fn weight(&self, dimension: Dimension, key: &str) -> f64 {
        let key = fold_key(key);
        self.dimensions
            .get(&dimension)
            .and_then(|keys| keys.get(&key))
            .copied()
            .unwrap_or(0.0)
    }

    /// Largest weight in a dimension, floored at 1
    pub fn max_weight(&self, dimension: Dimension) -> f64 {
        self.dimensions
            .get(&dimension)
            .map(|keys| keys.values().copied().fold(1.0_f64, f64::max))
            .unwrap_or(1.0)
    }
}

/// Merges both generations: effective weight is `max(legacy, versioned)`
pub fn reconcile(stored: &[StoredPreferences]) -> EffectivePreferences {
    let mut dimensions: HashMap<Dimension, HashMap<String, f64>> = HashMap::new();
    for generation in stored {
        for dimension in Dimension::ALL {
            for key in generation.keys(dimension) {
                let weight = generation.weight(dimension, key);
                let slot = dimensions
                    .entry(dimension)
                    .or_default()
                    .entry(key.clone())
                    .or_insert(0.0);
                *slot = slot.max(weight);
            }
        }
    }
    EffectivePreferences { dimensions }
}

fn sanitize_weight(weight: f64) -> f64 {
    if weight.is_finite() {
        weight.max(0.0)
    } else {
        0.0
    }
}

fn decode_entry(value: &Value) -> Option<PreferenceEntry> {
    match value {
        Value::Number(n) => Some(PreferenceEntry {
            weight: sanitize_weight(n.as_f64()?),
            last_updated: 0,
        }),
        Value::Object(fields) => Some(PreferenceEntry {
            weight: sanitize_weight(fields.get("w").and_then(Value::as_f64).unwrap_or(0.0)),
            last_updated: fields.get("t").and_then(Value::as_i64).unwrap_or(0),
        }),
        _ => None,
    }
}

fn dimension_maps(value: &Value) -> Option<Vec<(Dimension, &serde_json::Map<String, Value>)>> {
    let root = value.as_object()?;
    Some(
        root.iter()
            .filter_map(|(name, keys)| Some((Dimension::from_wire(name)?, keys.as_object()?)))
            .collect(),
    )
}
