//! One execution context of the personalized feed.
//!
//! A session owns the preference store and view counters of its context, a
//! session seed for the ranking jitter, and the random source used for the
//! explore coin. Rendering runs filter, dedupe and rank in that order.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Config;
use crate::models::{CatalogProduct, EffectivePreferences, ViewCounts};
use crate::services::dedupe::{dedupe, DedupeOptions};
use crate::services::filter::{apply_filters, FilterCriteria};
use crate::services::interactions;
use crate::services::preferences::PreferenceStore;
use crate::services::ranking::{RankedPass, RankingConfig, RankingEngine};
use crate::services::views::ViewMetrics;
use crate::storage::{ContextId, Storage};

pub struct FeedSession {
    context: ContextId,
    prefs: PreferenceStore,
    views: ViewMetrics,
    engine: RankingEngine,
    dedupe: DedupeOptions,
    half_life_days: f64,
    session_seed: u32,
    rng: StdRng,
    decayed: bool,
}

impl FeedSession {
    /// New context with an entropy-seeded random source
    pub fn new(storage: Arc<dyn Storage>, config: &Config) -> Self {
        Self::with_rng(storage, config, StdRng::from_entropy())
    }

    /// New context drawing its session seed and explore coins from `rng`
    pub fn with_rng(storage: Arc<dyn Storage>, config: &Config, mut rng: StdRng) -> Self {
        let context = ContextId::new();
        let session_seed = rng.gen::<u32>();
        tracing::info!(%context, session_seed, "Feed session started");
        Self {
            context,
            prefs: PreferenceStore::new(storage.clone(), context),
            views: ViewMetrics::new(storage, context),
            engine: RankingEngine::new(RankingConfig::from_config(config)),
            dedupe: DedupeOptions::default(),
            half_life_days: config.decay_half_life_days,
            session_seed,
            rng,
            decayed: false,
        }
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn session_seed(&self) -> u32 {
        self.session_seed
    }

    /// Decays stored preferences. Only the first call per session has an effect.
    pub fn on_session_load(&mut self) {
        if self.decayed {
            return;
        }
        self.prefs.decay_all(self.half_life_days);
        self.decayed = true;
    }

    /// Pulls pending change notifications from other contexts
    pub fn sync_remote(&mut self) -> usize {
        self.prefs.sync_remote() + self.views.sync_remote()
    }

    /// Filters, deduplicates and ranks `products` for display
    pub fn render(&mut self, products: Vec<CatalogProduct>, criteria: &FilterCriteria) -> RankedPass {
        self.sync_remote();

        let total = products.len();
        let filtered = if criteria.is_active() {
            apply_filters(products, criteria)
        } else {
            products
        };
        let matched = filtered.len();
        let unique = dedupe(filtered, self.dedupe);
        let prefs = self.prefs.read_effective();

        let pass = self.engine.rank_pass(
            unique,
            &prefs,
            self.views.get_views(),
            self.session_seed,
            &mut self.rng,
        );

        tracing::debug!(
            total,
            matched,
            shown = pass.items.len(),
            explore = pass.explore,
            "Feed rendered"
        );
        pass
    }

    pub fn record_tap(&mut self, product: &CatalogProduct) {
        interactions::record_tap(&mut self.prefs, &mut self.views, product);
    }

    pub fn record_filters_applied(&mut self, criteria: &FilterCriteria) {
        interactions::record_filters_applied(&mut self.prefs, criteria);
    }

    pub fn record_gender_chip(&mut self, gender: &str) {
        interactions::record_gender_chip(&mut self.prefs, gender);
    }

    pub fn record_product_view(&mut self, product_id: i64) {
        interactions::record_product_view(&mut self.views, product_id);
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.prefs
    }

    pub fn effective_preferences(&self) -> EffectivePreferences {
        self.prefs.read_effective()
    }

    pub fn views(&self) -> &ViewCounts {
        self.views.get_views()
    }

    pub fn sync_views(&mut self) -> &ViewCounts {
        self.views.sync_remote();
        self.views.get_views()
    }
}
