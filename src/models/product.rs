use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Field that the catalog sends either as a single string or as a list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Flattens the value into a list, splitting single strings on commas
    pub fn to_list(&self) -> Vec<String> {
        match self {
            OneOrMany::One(raw) => raw.split(',').map(str::to_string).collect(),
            OneOrMany::Many(items) => items.clone(),
        }
    }
}

/// A product row as served by the catalog, before deduplication.
///
/// Every facet except `id` and `name` is optional; consumers substitute a
/// neutral default (price 0, no category, single size) when a field is absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub store_name: String,
    #[serde(default)]
    pub store_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub price_tag: Option<f64>,
    #[serde(default)]
    pub photo_url: Option<OneOrMany>,

    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub sizes: Option<OneOrMany>,

    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,

    #[serde(default)]
    pub eta_text: Option<String>,
    #[serde(default)]
    pub eta_text_runtime: Option<String>,

    #[serde(default)]
    pub master_sku: Option<String>,
    #[serde(default)]
    pub global_sku: Option<String>,
    #[serde(default)]
    pub external_sku: Option<String>,

    /// Server-aggregated view count, when the catalog exposes one
    #[serde(default, deserialize_with = "lenient_number")]
    pub view_count: Option<f64>,
}

impl CatalogProduct {
    pub fn new(id: i64, name: impl Into<String>, store_name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            store_name: store_name.into(),
            ..Default::default()
        }
    }

    /// Price with the missing-price default applied
    pub fn price_or_zero(&self) -> f64 {
        self.price_tag.filter(|p| p.is_finite()).unwrap_or(0.0)
    }

    /// Key used for view counters and product affinity
    pub fn id_key(&self) -> String {
        self.id.to_string()
    }
}

/// A catalog product standing in for every storefront that sells the same item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupedProduct {
    #[serde(flatten)]
    pub product: CatalogProduct,
    pub store_count: u32,
    pub stores: BTreeSet<String>,
}

impl DedupedProduct {
    /// Seeds a group from its first occurrence
    pub fn seed(product: CatalogProduct) -> Self {
        let mut stores = BTreeSet::new();
        stores.insert(product.store_name.clone());
        Self {
            product,
            store_count: 1,
            stores,
        }
    }
}

/// One page of catalog results
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogPage {
    pub items: Vec<CatalogProduct>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_offset: Option<usize>,
}

/// Accepts numbers and numeric strings, maps anything else to `None`
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite()))
}
