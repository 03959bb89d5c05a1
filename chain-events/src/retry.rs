use std::{future::Future, time::Duration};

use crate::{metrics::CHAIN_EVENTS_METRICS, Result};

/// Run `f` until it succeeds, fails with a non-transient error or
/// `attempts` runs out, sleeping `backoff` between attempts.
pub(crate) async fn with_retry<T, F, Fut>(
    what: &'static str,
    attempts: usize,
    backoff: Duration,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(res) => return Ok(res),
            Err(e) if e.is_transient() && attempt < attempts => {
                tracing::warn!(
                    "{what} request failed on attempt {attempt}/{attempts}: {e}, retrying in {backoff:?}"
                );
                CHAIN_EVENTS_METRICS.retries[&what].inc();
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
