//! Metrics for client

#![allow(unexpected_cfgs)]

use std::time::Duration;

use vise::{Buckets, Counter, Histogram, LabeledFamily, Metrics};

/// Client metrics.
#[derive(Debug, Metrics)]
#[metrics(prefix = "client")]
pub(super) struct ClientMetrics {
    #[metrics(buckets = Buckets::LATENCIES, labels = ["method"])]
    pub call: LabeledFamily<&'static str, Histogram<Duration>>,

    /// Calls that did not complete within the configured timeout.
    #[metrics(labels = ["method"])]
    pub timeouts: LabeledFamily<&'static str, Counter>,

    /// Structurally invalid responses from the node.
    pub malformed_responses: Counter,
}

#[vise::register]
pub(super) static CLIENT_METRICS: vise::Global<ClientMetrics> = vise::Global::new();
