//! Multi-signal ranking with a per-pass explore/exploit decision.
//!
//! Each product gets eight features in `[0, 1]`: seven preference dimensions
//! normalized by the largest weight of their dimension, plus a trend signal
//! from local and server view counts. The composite score is their weighted
//! sum plus deterministic per-session jitter. One coin flip per pass decides
//! whether to explore: exploring boosts the trend weight and pulls a few items
//! from just below the top into the first dozen slots.

use rand::Rng;
use serde::Serialize;

use crate::config::Config;
use crate::models::{Dimension, DedupedProduct, EffectivePreferences, ViewCounts};
use crate::services::facets::{active_eta_text, eta_bucket, price_bucket, primary_category};
use crate::services::noise::noise;

/// Server view count at which the server-side trend signal saturates
const SERVER_VIEW_SATURATION: f64 = 50.0;

/// Passes with at most this many items are never reshuffled
const RESHUFFLE_MIN_ITEMS: usize = 8;
const RESHUFFLE_MAX_PICKS: usize = 6;
const RESHUFFLE_WINDOW_START: usize = 4;
const RESHUFFLE_WINDOW_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankingWeights {
    pub category: f64,
    pub store: f64,
    pub gender: f64,
    pub size: f64,
    pub price: f64,
    pub eta: f64,
    pub product: f64,
    pub trend: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            category: 1.0,
            store: 0.65,
            gender: 0.45,
            size: 0.35,
            price: 0.3,
            eta: 0.25,
            product: 0.2,
            trend: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankingConfig {
    pub weights: RankingWeights,
    /// Probability that a pass explores
    pub epsilon: f64,
    /// Amplitude of the per-product noise
    pub jitter: f64,
    /// Multiplier applied to the trend weight while exploring
    pub trend_explore_boost: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: RankingWeights::default(),
            epsilon: 0.08,
            jitter: 0.08,
            trend_explore_boost: 2.2,
        }
    }
}

impl RankingConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            epsilon: config.explore_epsilon.clamp(0.0, 1.0),
            jitter: config.jitter.max(0.0),
            ..Self::default()
        }
    }
}

/// Feature values of one product for one pass, each in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Features {
    pub category: f64,
    pub store: f64,
    pub gender: f64,
    pub size: f64,
    pub price: f64,
    pub eta: f64,
    pub product: f64,
    pub trend: f64,
}

impl Features {
    /// Weighted sum of the features, without jitter
    pub fn score(&self, weights: &RankingWeights, trend_weight: f64) -> f64 {
        weights.category * self.category
            + weights.store * self.store
            + weights.gender * self.gender
            + weights.size * self.size
            + weights.price * self.price
            + weights.eta * self.eta
            + weights.product * self.product
            + trend_weight * self.trend
    }
}

/// Signals read once per pass and shared by every product
pub struct PassSignals<'a> {
    prefs: &'a EffectivePreferences,
    views: &'a ViewCounts,
    max_local_views: f64,
}

impl<'a> PassSignals<'a> {
    pub fn new(prefs: &'a EffectivePreferences, views: &'a ViewCounts) -> Self {
        let max_local_views = views.values().copied().max().unwrap_or(0).max(1) as f64;
        Self {
            prefs,
            views,
            max_local_views,
        }
    }

    fn preference(&self, dimension: Dimension, key: &str) -> f64 {
        let denominator = self.prefs.max_weight(dimension);
        (self.prefs.weight(dimension, key) / denominator).clamp(0.0, 1.0)
    }

    /// Feature vector of a product under this pass's signals
    pub fn features(&self, product: &DedupedProduct) -> Features {
        let p = &product.product;

        let local = self.views.get(&p.id_key()).copied().unwrap_or(0) as f64 / self.max_local_views;
        let remote = match p.view_count {
            Some(count) if count > 0.0 => (count / SERVER_VIEW_SATURATION).min(1.0),
            _ => 0.0,
        };

        Features {
            category: self.preference(Dimension::Category, &primary_category(p)),
            store: self.preference(Dimension::Store, &p.store_name),
            gender: self.preference(Dimension::Gender, p.gender.as_deref().unwrap_or_default()),
            // Size preferences are recorded but not scored yet.
            size: 0.0,
            price: self.preference(Dimension::PriceBucket, price_bucket(p.price_tag)),
            eta: self.preference(Dimension::EtaBucket, eta_bucket(active_eta_text(p))),
            product: self.preference(Dimension::Product, &p.id_key()),
            trend: local.clamp(0.0, 1.0).max(remote),
        }
    }
}

/// Result of one ranking pass
#[derive(Debug, Clone)]
pub struct RankedPass {
    pub items: Vec<DedupedProduct>,
    pub explore: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RankingEngine {
    config: RankingConfig,
}

impl RankingEngine {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Orders `products` for display. Always returns a permutation of the input.
    pub fn rank<R: Rng + ?Sized>(
        &self,
        products: Vec<DedupedProduct>,
        prefs: &EffectivePreferences,
        views: &ViewCounts,
        session_seed: u32,
        rng: &mut R,
    ) -> Vec<DedupedProduct> {
        self.rank_pass(products, prefs, views, session_seed, rng).items
    }

    /// Like [`RankingEngine::rank`] but also reports whether the pass explored
    pub fn rank_pass<R: Rng + ?Sized>(
        &self,
        products: Vec<DedupedProduct>,
        prefs: &EffectivePreferences,
        views: &ViewCounts,
        session_seed: u32,
        rng: &mut R,
    ) -> RankedPass {
        let explore = rng.gen::<f64>() < self.config.epsilon;
        let signals = PassSignals::new(prefs, views);

        let mut scored: Vec<(f64, DedupedProduct)> = products
            .into_iter()
            .map(|product| {
                let score = self.score(&signals, &product, session_seed, explore);
                (score, product)
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut items: Vec<DedupedProduct> = scored.into_iter().map(|(_, p)| p).collect();
        if explore {
            explore_reshuffle(&mut items, rng);
        }

        tracing::debug!(items = items.len(), explore, "Ranking pass complete");
        RankedPass { items, explore }
    }

    /// Composite score of one product, jitter included
    pub fn score(
        &self,
        signals: &PassSignals<'_>,
        product: &DedupedProduct,
        session_seed: u32,
        explore: bool,
    ) -> f64 {
        let weights = &self.config.weights;
        let trend_weight = if explore {
            weights.trend * self.config.trend_explore_boost
        } else {
            weights.trend
        };
        let jitter = noise(product.product.id, session_seed) * self.config.jitter;
        let score = signals.features(product).score(weights, trend_weight) + jitter;
        if score.is_finite() {
            score
        } else {
            0.0
        }
    }
}

/// Moves up to six items from the window starting at index 4 into the odd
/// slots 1, 3, 5, ... of the list. Lists of eight items or fewer are untouched.
pub fn explore_reshuffle<T, R: Rng + ?Sized>(items: &mut Vec<T>, rng: &mut R) {
    explore_reshuffle_with(items, |window| rng.gen_range(0..window));
}

/// Reshuffle driven by `offset`, which is asked for a position in
/// `0..window` once per pick.
pub fn explore_reshuffle_with<T>(items: &mut Vec<T>, mut offset: impl FnMut(usize) -> usize) {
    let n = items.len();
    if n <= RESHUFFLE_MIN_ITEMS {
        return;
    }

    let picks = (n / RESHUFFLE_MIN_ITEMS).min(RESHUFFLE_MAX_PICKS);
    let window = RESHUFFLE_WINDOW_LEN.min(n - 5);
    for k in 0..picks {
        let from = RESHUFFLE_WINDOW_START + offset(window) % window;
        let item = items.remove(from);
        items.insert(2 * k + 1, item);
    }
}
