//! Cross-store deduplication.
//!
//! Catalog rows that represent the same logical item sold by several
//! storefronts collapse into one representative carrying the provenance of
//! the whole group.

use std::collections::HashMap;

use unicode_normalization::UnicodeNormalization;

use crate::models::{CatalogProduct, DedupedProduct};

const KEY_SEPARATOR: &str = "|";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupeOptions {
    /// Swap the representative for a strictly cheaper duplicate
    pub prefer_cheapest: bool,
}

impl Default for DedupeOptions {
    fn default() -> Self {
        Self {
            prefer_cheapest: true,
        }
    }
}

/// Strips diacritics, trims and case-folds
pub fn normalize(text: &str) -> String {
    text.nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect::<String>()
        .trim()
        .to_lowercase()
}

/// Identity used to decide that two rows are the same logical product.
///
/// An explicit SKU (master, then global, then external) wins when present;
/// otherwise the normalized brand, name, color and size are joined.
pub fn identity_key(product: &CatalogProduct) -> String {
    let sku = [&product.master_sku, &product.global_sku, &product.external_sku]
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty());
    if let Some(sku) = sku {
        return sku.to_string();
    }

    [
        product.brand.as_deref().unwrap_or_default(),
        product.name.as_str(),
        product.color.as_deref().unwrap_or_default(),
        product.size.as_deref().unwrap_or_default(),
    ]
    .iter()
    .map(|part| normalize(part))
    .collect::<Vec<_>>()
    .join(KEY_SEPARATOR)
}

/// Collapses duplicates in a single left-to-right pass.
///
/// Output keeps the first-seen order of each identity key. With
/// `prefer_cheapest`, a later duplicate replaces the representative only when
/// its price is strictly lower; a missing price counts as 0.
pub fn dedupe(products: Vec<CatalogProduct>, options: DedupeOptions) -> Vec<DedupedProduct> {
    merge_groups(products.into_iter().map(DedupedProduct::seed), options)
}

/// Same pass over entries that may already carry provenance, so deduplicating
/// an already deduplicated list changes nothing.
pub fn merge_groups(
    entries: impl IntoIterator<Item = DedupedProduct>,
    options: DedupeOptions,
) -> Vec<DedupedProduct> {
    let mut order: Vec<DedupedProduct> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let key = identity_key(&entry.product);
        let Some(&slot) = by_key.get(&key) else {
            by_key.insert(key, order.len());
            order.push(entry);
            continue;
        };

        let current = &mut order[slot];
        current.store_count += entry.store_count;
        current.stores.extend(entry.stores);

        if options.prefer_cheapest && entry.product.price_or_zero() < current.product.price_or_zero() {
            current.product = entry.product;
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn item(id: i64, name: &str, store: &str, price: Option<f64>) -> CatalogProduct {
        let mut p = CatalogProduct::new(id, name, store);
        p.price_tag = price;
        p
    }

    fn with_sku(mut p: CatalogProduct, sku: &str) -> CatalogProduct {
        p.master_sku = Some(sku.to_string());
        p
    }

    #[test]
    fn test_normalize_strips_diacritics() {
        assert_eq!(normalize("  Camisão Básico "), "camisao basico");
    }

    #[test]
    fn test_identity_key_prefers_sku() {
        let mut p = item(1, "Vestido", "A", None);
        p.global_sku = Some(" G-1 ".to_string());
        assert_eq!(identity_key(&p), "G-1");

        p.master_sku = Some("   ".to_string());
        assert_eq!(identity_key(&p), "G-1");

        p.master_sku = Some("M-9".to_string());
        assert_eq!(identity_key(&p), "M-9");
    }

    #[test]
    fn test_identity_key_composite() {
        let mut p = item(1, "Vestído Longo", "A", None);
        p.brand = Some("Farm".to_string());
        p.color = Some("Azul".to_string());
        assert_eq!(identity_key(&p), "farm|vestido longo|azul|");
    }

    #[test]
    fn test_groups_by_key_and_aggregates_stores() {
        let input = vec![
            item(1, "Bolsa", "Loja A", Some(100.0)),
            item(2, "Tênis", "Loja A", Some(50.0)),
            item(3, "bolsa ", "Loja B", Some(120.0)),
            item(4, "Bolsa", "Loja A", Some(130.0)),
        ];
        let out = dedupe(input, DedupeOptions::default());

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].product.id, 1);
        assert_eq!(out[0].store_count, 3);
        assert_eq!(
            out[0].stores,
            BTreeSet::from(["Loja A".to_string(), "Loja B".to_string()])
        );
        assert_eq!(out[1].product.id, 2);
        assert_eq!(out[1].store_count, 1);
    }

    #[test]
    fn test_cheaper_duplicate_replaces_and_keeps_provenance() {
        let input = vec![
            item(1, "Bolsa", "Loja A", Some(100.0)),
            item(2, "Bolsa", "Loja B", Some(80.0)),
            item(3, "Bolsa", "Loja C", Some(90.0)),
        ];
        let out = dedupe(input, DedupeOptions::default());

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].product.id, 2);
        assert_eq!(out[0].store_count, 3);
        assert_eq!(out[0].stores.len(), 3);
    }

    #[test]
    fn test_equal_price_keeps_first_seen() {
        let input = vec![
            item(1, "Bolsa", "Loja A", Some(10.0)),
            item(2, "Bolsa", "Loja B", Some(10.0)),
        ];
        let out = dedupe(input, DedupeOptions::default());
        assert_eq!(out[0].product.id, 1);
    }

    #[test]
    fn test_missing_price_counts_as_cheapest() {
        // Unknown price is treated as 0 and therefore wins; kept as current behavior.
        let input = vec![
            item(1, "Bolsa", "Loja A", Some(5.0)),
            item(2, "Bolsa", "Loja B", None),
        ];
        let out = dedupe(input, DedupeOptions::default());
        assert_eq!(out[0].product.id, 2);
        assert_eq!(out[0].store_count, 2);
    }

    #[test]
    fn test_prefer_cheapest_disabled_keeps_first() {
        let input = vec![
            item(1, "Bolsa", "Loja A", Some(100.0)),
            item(2, "Bolsa", "Loja B", Some(1.0)),
        ];
        let out = dedupe(
            input,
            DedupeOptions {
                prefer_cheapest: false,
            },
        );
        assert_eq!(out[0].product.id, 1);
        assert_eq!(out[0].store_count, 2);
    }

    #[test]
    fn test_sku_groups_across_names() {
        let input = vec![
            with_sku(item(1, "Bolsa couro", "Loja A", Some(100.0)), "SKU-1"),
            with_sku(item(2, "Bolsa de couro", "Loja B", Some(90.0)), "SKU-1"),
        ];
        let out = dedupe(input, DedupeOptions::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].product.id, 2);
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let input = vec![
            item(1, "Bolsa", "Loja A", Some(100.0)),
            item(2, "Saia", "Loja A", Some(60.0)),
            item(3, "Bolsa", "Loja B", Some(80.0)),
            item(4, "Saia", "Loja C", Some(60.0)),
            item(5, "Bolsa", "Loja B", Some(85.0)),
        ];
        let once = dedupe(input, DedupeOptions::default());
        let twice = merge_groups(once.clone(), DedupeOptions::default());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_output_never_larger_than_input() {
        let input: Vec<CatalogProduct> = (0..20)
            .map(|i| item(i, &format!("Item {}", i % 7), &format!("Loja {}", i % 3), Some(i as f64)))
            .collect();
        let total = input.len();
        let out = dedupe(input, DedupeOptions::default());
        assert!(out.len() <= total);
        assert_eq!(out.len(), 7);
        let count: u32 = out.iter().map(|d| d.store_count).sum();
        assert_eq!(count as usize, total);
    }

    #[test]
    fn test_empty_input() {
        assert!(dedupe(Vec::new(), DedupeOptions::default()).is_empty());
    }
}
