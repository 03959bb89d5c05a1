//! Metrics for the indexing services

#![allow(unexpected_cfgs)]

use std::time::Duration;

use vise::{Buckets, Counter, Gauge, Histogram, LabeledFamily, Metrics};

/// Indexer metrics, every one labeled by chain.
#[derive(Debug, Metrics)]
#[metrics(prefix = "indexer")]
pub(super) struct IndexerMetrics {
    /// Number of the highest persisted block.
    #[metrics(labels = ["chain"])]
    pub sync_height: LabeledFamily<&'static str, Gauge>,

    /// Number of the last observed chain tip.
    #[metrics(labels = ["chain"])]
    pub tip_height: LabeledFamily<&'static str, Gauge>,

    /// Set to 1 while the service is more than a batch behind the confirmed tip.
    #[metrics(labels = ["chain"])]
    pub catching_up: LabeledFamily<&'static str, Gauge>,

    /// Bridge events persisted.
    #[metrics(labels = ["chain"])]
    pub indexed_events: LabeledFamily<&'static str, Counter>,

    /// Filter invocations that failed after retries.
    #[metrics(labels = ["chain"])]
    pub filter_errors: LabeledFamily<&'static str, Counter>,

    /// Batches rejected for not extending the persisted tip.
    #[metrics(labels = ["chain"])]
    pub reorgs_detected: LabeledFamily<&'static str, Counter>,

    /// Failed store writes.
    #[metrics(labels = ["chain"])]
    pub store_errors: LabeledFamily<&'static str, Counter>,

    /// Number of tokens in the token cache.
    #[metrics(labels = ["chain"])]
    pub cached_tokens: LabeledFamily<&'static str, Gauge>,

    /// Duration of one update iteration.
    #[metrics(buckets = Buckets::LATENCIES, labels = ["chain"])]
    pub update_duration: LabeledFamily<&'static str, Histogram<Duration>>,
}

#[vise::register]
pub(super) static INDEXER_METRICS: vise::Global<IndexerMetrics> = vise::Global::new();
