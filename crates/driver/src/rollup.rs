//! The rollup module contains the [RollupNodeClient], which talks to the trusted op-node.

use crate::{
    traits::{RollupClient, SyncValidator},
    types::SyncStatus,
    ChallengerError,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::providers::{Http, JsonRpcClient, Provider};
use futures::future::try_join_all;
use op_challenger_solvers::zk::{L1Head, OutputRootEntry};
use std::sync::Arc;

/// The maximum number of outputs requested concurrently by a batch.
const MAX_BATCH_SIZE: usize = 100;

/// The [RollupNodeClient] reads outputs and sync status from the trusted rollup node. This RPC
/// should be 100% trusted, as it is the source of truth for the L2 chain.
#[derive(Debug, Clone)]
pub struct RollupNodeClient<P = Http> {
    provider: Arc<Provider<P>>,
}

impl<P: JsonRpcClient> RollupNodeClient<P> {
    /// Creates a new [RollupNodeClient].
    pub fn new(provider: Arc<Provider<P>>) -> Self {
        Self { provider }
    }

    /// Fetches the sync status of the rollup node.
    pub async fn sync_status(&self) -> Result<SyncStatus> {
        self.provider
            .request("optimism_syncStatus", ())
            .await
            .context("failed to fetch sync status")
    }
}

#[async_trait]
impl<P: JsonRpcClient + 'static> RollupClient for RollupNodeClient<P> {
    async fn output_at_block(&self, block_number: u64) -> Result<OutputRootEntry> {
        self.provider
            .request(
                "optimism_outputAtBlock",
                vec![format!("0x{:x}", block_number)],
            )
            .await
            .with_context(|| format!("failed to fetch output at block #{}", block_number))
    }

    /// Fetches the outputs in chunks of [MAX_BATCH_SIZE] concurrent requests. Any failed request
    /// fails the whole batch.
    async fn batch_output_at_block(&self, block_numbers: &[u64]) -> Result<Vec<OutputRootEntry>> {
        let mut outputs = Vec::with_capacity(block_numbers.len());
        for chunk in block_numbers.chunks(MAX_BATCH_SIZE) {
            let fetched =
                try_join_all(chunk.iter().map(|number| self.output_at_block(*number))).await?;
            outputs.extend(fetched);
        }
        Ok(outputs)
    }
}

#[async_trait]
impl<P: JsonRpcClient + 'static> SyncValidator for RollupNodeClient<P> {
    async fn validate_node_synced(&self, l1_head: L1Head) -> Result<()> {
        let status = self.sync_status().await?;
        if status.current_l1.number < l1_head.number {
            return Err(ChallengerError::NotInSync {
                l1_head,
                current_l1: status.current_l1.number,
            }
            .into());
        }
        Ok(())
    }
}
