//! Metrics for main binary

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use vise::{Gauge, Metrics};

const METRICS_REFRESH_PERIOD: Duration = Duration::from_secs(15);

/// Main indexer binary metrics
#[derive(Debug, Metrics)]
#[metrics(prefix = "bridge_indexer")]
pub(super) struct BridgeIndexerMainMetrics {
    /// Number of indexing services running.
    pub indexers_running: Gauge,

    /// Open connections of the DB pool.
    pub db_pool_size: Gauge,

    /// Idle connections of the DB pool.
    pub db_pool_idle: Gauge,
}

#[vise::register]
pub(super) static MAIN_INDEXER_METRICS: vise::Global<BridgeIndexerMainMetrics> =
    vise::Global::new();

pub async fn meter_db_pool(pool: PgPool, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(METRICS_REFRESH_PERIOD) => {}
        }

        MAIN_INDEXER_METRICS.db_pool_size.set(pool.size() as i64);
        MAIN_INDEXER_METRICS.db_pool_idle.set(pool.num_idle() as i64);
    }
}
