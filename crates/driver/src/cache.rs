//! The cache module contains the [OutputRootCache], which serves L2 output roots for a game's claim
//! positions with as little rollup node traffic as possible.

use crate::{traits::RollupClient, ChallengerError};
use anyhow::Result;
use lru::LruCache;
use op_challenger_solvers::zk::{ClaimRange, OutputRootEntry};
use std::{collections::HashSet, num::NonZeroUsize, sync::Arc, sync::Mutex, time::Duration};
use tokio_util::sync::CancellationToken;

/// The default number of output roots held by an [OutputRootCache].
pub const DEFAULT_OUTPUT_CACHE_SIZE: usize = 5000;

/// The delay between two attempts of a failed batch fetch.
const BATCH_RETRY_DELAY: Duration = Duration::from_secs(1);

/// The [OutputRootCache] is a bounded LRU cache of output roots keyed by L2 block number, in front
/// of a [RollupClient]. Output roots are a deterministic function of the L2 chain at a given
/// height, so entries are never invalidated.
pub struct OutputRootCache {
    inner: Mutex<LruCache<u64, OutputRootEntry>>,
    rollup: Arc<dyn RollupClient>,
    stride: u64,
    retry_delay: Duration,
    cancel: CancellationToken,
}

impl OutputRootCache {
    /// Creates a new [OutputRootCache].
    ///
    /// ### Takes
    /// - `rollup`: The trusted rollup node.
    /// - `capacity`: The maximum number of cached entries.
    /// - `stride`: The number of L2 blocks between two claim positions.
    /// - `cancel`: Aborts the batch retry loop.
    ///
    /// ### Returns
    /// - `Err(anyhow::Error)`: `capacity` or `stride` is zero.
    pub fn try_new(
        rollup: Arc<dyn RollupClient>,
        capacity: usize,
        stride: u64,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or(ChallengerError::InvalidConfig(
            "output cache capacity must be non-zero".to_string(),
        ))?;
        if stride == 0 {
            return Err(ChallengerError::InvalidConfig(
                "output cache stride must be non-zero".to_string(),
            )
            .into());
        }

        Ok(Self {
            inner: Mutex::new(LruCache::new(capacity)),
            rollup,
            stride,
            retry_delay: BATCH_RETRY_DELAY,
            cancel,
        })
    }

    /// Returns the stride between two claim positions.
    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Returns the output at `block_number`, fetching it from the rollup node on a cache miss.
    /// Fetch errors are returned to the caller.
    pub async fn load_one(&self, block_number: u64) -> Result<OutputRootEntry> {
        if let Some(entry) = self.get(block_number) {
            return Ok(entry);
        }

        tracing::trace!(target: "output-cache", block_number, "Output cache miss");
        let entry = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ChallengerError::Cancelled.into()),
            res = self.rollup.output_at_block(block_number) => res?,
        };
        self.put(entry);
        Ok(entry)
    }

    /// Returns the output at every claim position between `start_block` and `end_block`, sorted
    /// by ascending block number.
    ///
    /// Missing entries are fetched in a single batch that is retried until it succeeds, since
    /// giving up would mean failing to detect a fault. The only error is
    /// [ChallengerError::Cancelled].
    pub async fn load(&self, start_block: u64, end_block: u64) -> Result<Vec<OutputRootEntry>> {
        if start_block > end_block {
            return Ok(Vec::new());
        }
        self.load_range(ClaimRange::new(start_block, end_block, self.stride)?)
            .await
    }

    /// Same as [OutputRootCache::load], for a range with its own stride.
    pub async fn load_range(&self, range: ClaimRange) -> Result<Vec<OutputRootEntry>> {
        let ClaimRange {
            start_block,
            end_block,
            ..
        } = range;

        let mut result = Vec::with_capacity(range.position_count());
        let mut missing = Vec::new();
        for block_number in range.positions() {
            match self.get(block_number) {
                Some(entry) => result.push(entry),
                None => missing.push(block_number),
            }
        }

        if !missing.is_empty() {
            tracing::debug!(target: "output-cache", start_block, end_block, missing = missing.len(), "Fetching missing outputs");
            let fetched = self.fetch_batch(&missing).await?;
            let mut requested = missing.iter().copied().collect::<HashSet<_>>();
            for entry in fetched {
                // Each requested block is taken once, anything else is dropped.
                if !requested.remove(&entry.block_number()) {
                    tracing::warn!(target: "output-cache", block_number = entry.block_number(), "Dropping unrequested output");
                    continue;
                }
                self.put(entry);
                result.push(entry);
            }
        }

        // Batched responses are unordered, and the claims hash depends on ascending order.
        result.sort_by_key(OutputRootEntry::block_number);

        if result.len() != range.position_count() {
            tracing::warn!(
                target: "output-cache",
                len = result.len(),
                expected = range.position_count(),
                start_block,
                end_block,
                "Output cache may be missing output roots"
            );
        }
        Ok(result)
    }

    async fn fetch_batch(&self, block_numbers: &[u64]) -> Result<Vec<OutputRootEntry>> {
        loop {
            let res = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ChallengerError::Cancelled.into()),
                res = self.rollup.batch_output_at_block(block_numbers) => res,
            };
            match res {
                Ok(outputs) => return Ok(outputs),
                Err(e) => {
                    tracing::warn!(
                        target: "output-cache",
                        first = ?block_numbers.first(),
                        last = ?block_numbers.last(),
                        "Failed to load outputs, will retry: {:?}",
                        e
                    );
                }
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ChallengerError::Cancelled.into()),
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        }
    }

    fn get(&self, block_number: u64) -> Option<OutputRootEntry> {
        self.lock().get(&block_number).copied()
    }

    fn put(&self, entry: OutputRootEntry) {
        self.lock().put(entry.block_number(), entry);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<u64, OutputRootEntry>> {
        // A poisoned cache still only holds valid entries.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
