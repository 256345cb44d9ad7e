// crates/signals/src/lib.rs
//! Signal fetchers and the score combiner.
//!
//! Each category fetcher turns data-source responses into a bounded `SignalResult`;
//! the combiner folds one result per category into the stored `Scores`.

pub mod fetchers;
pub mod scoring;

pub use fetchers::{
    fetch_signal, FailurePolicy, FetcherSet, MarketFetcher, OnChainFetcher, SignalFetcher,
    SocialFetcher, StaticFetcher,
};
pub use scoring::{
    BlendWeights, CategorySignals, CompositeWeights, RocketWeights, ScoreCard, ScoreCombiner,
    SubMetric,
};
