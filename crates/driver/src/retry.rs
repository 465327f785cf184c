//! The retry module contains the [RetryingSource], a decorator that turns every read against an
//! upstream source into one that keeps retrying until it succeeds or is cancelled.

use crate::{
    traits::{L1Source, L2Source, RollupClient},
    ChallengerError,
};
use anyhow::Result;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use ethers::types::{Block, Bytes, Transaction, TransactionReceipt, H256};
use op_challenger_solvers::zk::{OutputRootEntry, OutputV0};
use std::{fmt::Debug, future::Future, time::Duration};
use tokio_util::sync::CancellationToken;

/// Succeed or die trying.
const MAX_ATTEMPTS: usize = usize::MAX;

/// Backoff parameters for the [RetryingSource].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Upper bound on the delay between two attempts.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Builds the exponential backoff strategy for this configuration.
    pub fn to_backoff_builder(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(MAX_ATTEMPTS)
            .with_jitter()
    }
}

/// The [RetryingSource] wraps an upstream source and retries every failed read with exponential
/// backoff. Failures are logged and never surfaced; the only error a caller can observe is
/// [ChallengerError::Cancelled].
#[derive(Debug, Clone)]
pub struct RetryingSource<S> {
    source: S,
    retry_config: RetryConfig,
    cancel: CancellationToken,
}

impl<S> RetryingSource<S> {
    /// Creates a new [RetryingSource] around `source` that stops retrying once `cancel` fires.
    pub fn new(source: S, cancel: CancellationToken) -> Self {
        Self {
            source,
            retry_config: RetryConfig::default(),
            cancel,
        }
    }

    /// Sets the backoff parameters.
    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Returns a reference to the wrapped source.
    pub fn inner(&self) -> &S {
        &self.source
    }

    async fn retry<T, K, F, Fut>(&self, what: &'static str, key: K, fetch: F) -> Result<T>
    where
        K: Debug + Send + Sync,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let attempt = fetch
            .retry(self.retry_config.to_backoff_builder())
            .when(|err| !ChallengerError::is_cancelled(err))
            .notify(|err, delay| {
                tracing::warn!(target: "retrying-source", key = ?key, ?delay, "Failed to {}: {:?}", what, err);
            });

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ChallengerError::Cancelled.into()),
            res = attempt => res,
        }
    }
}

#[async_trait]
impl<S: L1Source> L1Source for RetryingSource<S> {
    async fn info_by_hash(&self, block_hash: H256) -> Result<Block<H256>> {
        self.retry("retrieve info", block_hash, || {
            self.source.info_by_hash(block_hash)
        })
        .await
    }

    async fn info_by_number(&self, number: u64) -> Result<Block<H256>> {
        self.retry("retrieve info by number", number, || {
            self.source.info_by_number(number)
        })
        .await
    }

    async fn info_and_txs_by_hash(&self, block_hash: H256) -> Result<Block<Transaction>> {
        self.retry("retrieve l1 info and txs", block_hash, || {
            L1Source::info_and_txs_by_hash(&self.source, block_hash)
        })
        .await
    }

    async fn fetch_receipts(
        &self,
        block_hash: H256,
    ) -> Result<(Block<H256>, Vec<TransactionReceipt>)> {
        self.retry("fetch receipts", block_hash, || {
            self.source.fetch_receipts(block_hash)
        })
        .await
    }
}

#[async_trait]
impl<S: L2Source> L2Source for RetryingSource<S> {
    async fn info_and_txs_by_hash(&self, block_hash: H256) -> Result<Block<Transaction>> {
        self.retry("retrieve l2 info and txs", block_hash, || {
            L2Source::info_and_txs_by_hash(&self.source, block_hash)
        })
        .await
    }

    async fn node_by_hash(&self, hash: H256) -> Result<Bytes> {
        self.retry("retrieve node", hash, || self.source.node_by_hash(hash))
            .await
    }

    async fn code_by_hash(&self, hash: H256) -> Result<Bytes> {
        self.retry("retrieve code", hash, || self.source.code_by_hash(hash))
            .await
    }

    async fn output_by_root(&self, block_hash: H256) -> Result<OutputV0> {
        self.retry("fetch l2 output", block_hash, || {
            self.source.output_by_root(block_hash)
        })
        .await
    }
}

#[async_trait]
impl<S: RollupClient> RollupClient for RetryingSource<S> {
    async fn output_at_block(&self, block_number: u64) -> Result<OutputRootEntry> {
        self.retry("fetch output at block", block_number, || {
            self.source.output_at_block(block_number)
        })
        .await
    }

    async fn batch_output_at_block(&self, block_numbers: &[u64]) -> Result<Vec<OutputRootEntry>> {
        self.retry("batch fetch outputs", block_numbers, || {
            self.source.batch_output_at_block(block_numbers)
        })
        .await
    }
}
