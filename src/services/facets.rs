//! Facet helpers shared by filtering, ranking and interaction recording.

use crate::models::CatalogProduct;

/// Size reported for products that carry no size information
pub const SINGLE_SIZE: &str = "U";

/// Case-folded, de-duplicated categories of a product: the category list
/// first, then the single category field.
pub fn categories_of(product: &CatalogProduct) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let listed = product.categories.iter().flatten();
    for raw in listed.chain(product.category.iter()) {
        let cat = raw.trim().to_lowercase();
        if !cat.is_empty() && !out.contains(&cat) {
            out.push(cat);
        }
    }
    out
}

/// First category of a product, or empty
pub fn primary_category(product: &CatalogProduct) -> String {
    categories_of(product).into_iter().next().unwrap_or_default()
}

/// Upper-cased sizes; a product without any falls back to the single size
pub fn sizes_of(product: &CatalogProduct) -> Vec<String> {
    let sizes: Vec<String> = product
        .sizes
        .as_ref()
        .map(|s| s.to_list())
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();

    if sizes.is_empty() {
        vec![SINGLE_SIZE.to_string()]
    } else {
        sizes
    }
}

/// Discretizes a price; missing prices count as 0
pub fn price_bucket(price: Option<f64>) -> &'static str {
    let price = price.filter(|p| p.is_finite()).unwrap_or(0.0);
    match price {
        p if p < 50.0 => "0-49",
        p if p < 100.0 => "50-99",
        p if p < 200.0 => "100-199",
        p if p < 400.0 => "200-399",
        _ => "400+",
    }
}

/// Delivery text currently in effect: the runtime value wins over the static one
pub fn active_eta_text(product: &CatalogProduct) -> Option<&str> {
    product
        .eta_text_runtime
        .as_deref()
        .or(product.eta_text.as_deref())
}

/// Discretizes a delivery-time text such as "30-45 min", "1h30", "2h",
/// "amanhã" or "3 dias úteis".
pub fn eta_bucket(text: Option<&str>) -> &'static str {
    let Some(text) = text else {
        return "unknown";
    };
    let lower = text.to_lowercase();
    if lower.contains("amanh") || lower.contains("tomorrow") {
        return "next-day";
    }

    let Some((amount, rest)) = leading_number(&lower) else {
        return "unknown";
    };

    let unit: String = rest
        .trim_start_matches(|c: char| !c.is_alphabetic())
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect();

    if unit.starts_with("dia") || unit.starts_with("day") {
        return if amount <= 1 { "next-day" } else { "multi-day" };
    }

    let minutes = if unit.starts_with('h') {
        amount.saturating_mul(60).saturating_add(trailing_minutes(rest))
    } else {
        amount
    };

    match minutes {
        0..=30 => "<=30m",
        31..=60 => "31-60m",
        61..=120 => "1-2h",
        _ => "2h+",
    }
}

/// First run of digits in `text` and whatever follows it
fn leading_number(text: &str) -> Option<(u32, &str)> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let tail = &text[start..];
    let end = tail
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(tail.len());
    let amount = tail[..end].parse::<u32>().ok()?;
    Some((amount, &tail[end..]))
}

/// Minutes written right after an hour mark, as in "1h30" or "1h 15min".
/// A second hour figure ("1h-2h") is a range, not minutes.
fn trailing_minutes(after_hours: &str) -> u32 {
    let Some(rest) = after_hours.strip_prefix('h') else {
        return 0;
    };
    let rest = rest.trim_start();
    if !rest.starts_with(|c: char| c.is_ascii_digit()) {
        return 0;
    }
    match leading_number(rest) {
        Some((extra, tail)) if extra < 60 && !tail.trim_start().starts_with('h') => extra,
        _ => 0,
    }
}
