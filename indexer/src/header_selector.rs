use client::{BlockLocator, ChainClient, Header};
use futures::future::join_all;

use crate::{Error, Result};

/// Default number of blocks behind the tip a block is considered final at.
pub const DEFAULT_CONF_DEPTH: u64 = 20;

/// Default upper bound on the number of headers selected at once.
pub const DEFAULT_MAX_HEADER_BATCH_SIZE: u64 = 2000;

/// Turns an observed chain tip into the next contiguous batch of confirmed headers.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmedHeaderSelector {
    conf_depth: u64,
    max_batch_size: u64,
}

impl ConfirmedHeaderSelector {
    /// Create a new `ConfirmedHeaderSelector`.
    ///
    /// # Arguments
    ///
    /// * `conf_depth`: Number of blocks behind the tip a block becomes final at, at least 1
    /// * `max_batch_size`: Upper bound on the size of a batch, at least 1
    pub fn new(conf_depth: u64, max_batch_size: u64) -> Result<Self> {
        if conf_depth == 0 {
            return Err(Error::InvalidConfig(
                "confirmation depth has to be at least 1".to_string(),
            ));
        }

        if max_batch_size == 0 {
            return Err(Error::InvalidConfig(
                "max header batch size has to be at least 1".to_string(),
            ));
        }

        Ok(Self {
            conf_depth,
            max_batch_size,
        })
    }

    /// Confirmation depth.
    pub fn conf_depth(&self) -> u64 {
        self.conf_depth
    }

    /// Maximal batch size.
    pub fn max_batch_size(&self) -> u64 {
        self.max_batch_size
    }

    /// Select the headers following `low` that are confirmed at `tip`.
    ///
    /// All headers are requested in parallel. The result is cut at the
    /// first header that could not be fetched and at the first header
    /// that does not link to its predecessor, so it is always a
    /// contiguous chain of at most `max_batch_size` headers starting at
    /// `low.number + 1`. Linkage of the first header to `low` is left to
    /// the caller.
    pub async fn select<C>(&self, client: &C, low: BlockLocator, tip: &Header) -> Vec<Header>
    where
        C: ChainClient + ?Sized,
    {
        let Some(range) = self.range(low, tip.number) else {
            return vec![];
        };
        let (start, end) = (*range.start(), *range.end());

        let fetched = join_all(range.map(|number| async move {
            match client.header_by_number(number).await {
                Ok(Some(header)) if header.number == number => Some(header),
                Ok(Some(header)) => {
                    tracing::debug!("asked for header {number}, got {}", header.number);
                    None
                }
                Ok(None) => {
                    tracing::debug!("header {number} is not known to the node yet");
                    None
                }
                Err(e) => {
                    tracing::debug!("failed to fetch header {number}: {e}");
                    None
                }
            }
        }))
        .await;

        let mut headers: Vec<Header> = fetched.into_iter().map_while(|h| h).collect();

        if let Some(pos) = headers
            .windows(2)
            .position(|w| w[1].parent_hash != w[0].hash)
        {
            tracing::debug!(
                "header {} does not link to its parent, trimming",
                headers[pos + 1].number
            );
            headers.truncate(pos + 1);
        }

        if headers.len() as u64 != end - start + 1 {
            tracing::debug!(
                "selected {} of {} headers in [{start}, {end}]",
                headers.len(),
                end - start + 1
            );
        }

        headers
    }

    /// The range of block numbers to request, `None` if there is no work.
    fn range(&self, low: BlockLocator, tip: u64) -> Option<std::ops::RangeInclusive<u64>> {
        if tip < self.conf_depth {
            return None;
        }

        // Too close to the tip.
        if low.number.saturating_add(self.conf_depth) > tip {
            return None;
        }

        let start = low.number + 1;
        let end = (tip - self.conf_depth + 1).min(start.saturating_add(self.max_batch_size - 1));

        Some(start..=end)
    }
}
