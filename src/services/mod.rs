pub mod catalog;
pub mod dedupe;
pub mod facets;
pub mod feed;
pub mod filter;
pub mod interactions;
pub mod noise;
pub mod preferences;
pub mod ranking;
pub mod views;

pub use catalog::{CatalogSource, HttpCatalogSource, InfiniteCatalog, LoadOutcome, StaticCatalogSource};
pub use dedupe::{dedupe, DedupeOptions};
pub use feed::FeedSession;
pub use filter::{apply_filters, FilterCriteria};
pub use preferences::PreferenceStore;
pub use ranking::{RankedPass, RankingConfig, RankingEngine};
pub use views::ViewMetrics;
