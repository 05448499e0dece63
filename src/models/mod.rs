pub mod preferences;
pub mod product;

pub use preferences::{
    fold_key, reconcile, Dimension, EffectivePreferences, LegacyPreferences, PreferenceEntry,
    StoredPreferences, VersionedPreferences,
};
pub use product::{CatalogPage, CatalogProduct, DedupedProduct, OneOrMany};

use std::collections::HashMap;

/// Local view counters keyed by product id
pub type ViewCounts = HashMap<String, u64>;
