//! Metrics for chain events

#![allow(unexpected_cfgs)]

use vise::{Counter, LabeledFamily, Metrics};

/// Chain events metrics.
#[derive(Debug, Metrics)]
#[metrics(prefix = "chain_events")]
pub(super) struct ChainEventsMetrics {
    /// Number of logs received per bridge
    #[metrics(labels = ["bridge"])]
    pub logs_received: LabeledFamily<&'static str, Counter>,

    /// Number of bridge events successfully decoded per bridge
    #[metrics(labels = ["bridge"])]
    pub events_decoded: LabeledFamily<&'static str, Counter>,

    /// Ranges for which a bridge returned no events at all
    #[metrics(labels = ["bridge"])]
    pub empty_ranges: LabeledFamily<&'static str, Counter>,

    /// Retried requests per bridge
    #[metrics(labels = ["bridge"])]
    pub retries: LabeledFamily<&'static str, Counter>,

    /// Number of decoded state batch commitments
    pub state_batches: Counter,
}

#[vise::register]
pub(super) static CHAIN_EVENTS_METRICS: vise::Global<ChainEventsMetrics> = vise::Global::new();
