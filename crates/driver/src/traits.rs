//! The traits module defines the interfaces of everything the game loop talks to: the dispute game
//! contract, the rollup node, L1 / L2 data sources, the sync validator, and the transaction sink.

use anyhow::Result;
use async_trait::async_trait;
use ethers::types::{Address, Block, Bytes, Transaction, TransactionReceipt, H256};
use op_challenger_solvers::zk::{GameStatus, L1Head, OutputRootEntry, OutputV0};
use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Read access to a single ZK fault dispute game contract. Every read is made against the latest
/// L1 state.
#[async_trait]
pub trait ZkDisputeGame: Send + Sync {
    /// The address of the dispute game proxy.
    fn address(&self) -> Address;

    /// The current [GameStatus] of the game.
    async fn status(&self) -> Result<GameStatus>;

    /// The number of claims made in the game.
    async fn claim_count(&self) -> Result<u64>;

    /// The hash of the L1 block the game is anchored to.
    async fn l1_head(&self) -> Result<H256>;

    /// The inclusive L2 block range covered by the game's claims, as `(start, end)`.
    async fn block_range(&self) -> Result<(u64, u64)>;

    /// How long after creation a fault may be signalled.
    async fn max_detect_fault_duration(&self) -> Result<Duration>;

    /// How long after creation the game's clock runs out.
    async fn max_clock_duration(&self) -> Result<Duration>;

    /// The UNIX timestamp of the game's creation.
    async fn created_at(&self) -> Result<u64>;

    /// The output root claimed at the game's end block.
    async fn root_claim(&self) -> Result<H256>;

    /// The commitment over every claimed output root.
    async fn claims_hash(&self) -> Result<H256>;

    /// Whether the claim at `index` has already been challenged.
    async fn challenged_claims(&self, index: u64) -> Result<bool>;

    /// Whether a challenge against the game has already succeeded.
    async fn is_challenge_success(&self) -> Result<bool>;

    /// The number of L2 blocks between two consecutive claims.
    async fn block_distance(&self) -> Result<u64>;

    /// The individual output roots the game was created with.
    async fn claims(&self, l1_head: L1Head) -> Result<Vec<H256>>;

    /// The parent game, or [None] if the game builds directly on the anchor state.
    async fn parent_game(&self) -> Result<Option<Arc<dyn ZkDisputeGame>>>;

    /// Whether `resolveClaim` would succeed against the latest state.
    async fn can_resolve_claim(&self) -> Result<bool>;

    /// Whether `resolve` would succeed against the latest state.
    async fn can_resolve(&self) -> Result<bool>;
}

/// The trusted rollup node, the source of truth for L2 output roots.
#[async_trait]
pub trait RollupClient: Send + Sync {
    /// Fetches the output at a single L2 block.
    async fn output_at_block(&self, block_number: u64) -> Result<OutputRootEntry>;

    /// Fetches the outputs at many L2 blocks. The order of the result is unspecified.
    async fn batch_output_at_block(&self, block_numbers: &[u64]) -> Result<Vec<OutputRootEntry>>;
}

/// Block data available from an L1 execution node.
#[async_trait]
pub trait L1Source: Send + Sync {
    /// Fetches the header of the block with the given hash.
    async fn info_by_hash(&self, block_hash: H256) -> Result<Block<H256>>;

    /// Fetches the header of the canonical block with the given number.
    async fn info_by_number(&self, number: u64) -> Result<Block<H256>>;

    /// Fetches the block with the given hash along with its transactions.
    async fn info_and_txs_by_hash(&self, block_hash: H256) -> Result<Block<Transaction>>;

    /// Fetches the header and receipts of the block with the given hash.
    async fn fetch_receipts(
        &self,
        block_hash: H256,
    ) -> Result<(Block<H256>, Vec<TransactionReceipt>)>;
}

/// Block and state data available from an L2 execution node.
#[async_trait]
pub trait L2Source: Send + Sync {
    /// Fetches the block with the given hash along with its transactions.
    async fn info_and_txs_by_hash(&self, block_hash: H256) -> Result<Block<Transaction>>;

    /// Fetches a state trie node by its hash.
    async fn node_by_hash(&self, hash: H256) -> Result<Bytes>;

    /// Fetches contract code by its hash.
    async fn code_by_hash(&self, hash: H256) -> Result<Bytes>;

    /// Fetches the output of the L2 block with the given hash.
    async fn output_by_root(&self, block_hash: H256) -> Result<OutputV0>;
}

/// Checks that the local rollup node has caught up with a game's L1 head.
#[async_trait]
pub trait SyncValidator: Send + Sync {
    /// Returns [ChallengerError::NotInSync](crate::ChallengerError::NotInSync) if the node is
    /// behind `l1_head`, or another error if the check itself failed.
    async fn validate_node_synced(&self, l1_head: L1Head) -> Result<()>;
}

/// Gets the transactions of the agent onchain. Every method returns once the transaction is
/// mined.
#[async_trait]
pub trait ChallengeSubmitter: Send + Sync {
    /// Challenges the claim at `index` of the game at `game`.
    async fn submit_challenge(&self, game: Address, index: u64) -> Result<()>;

    /// Settles the outstanding challenges of the game at `game`.
    async fn submit_resolve_claim(&self, game: Address) -> Result<()>;

    /// Resolves the game at `game`.
    async fn submit_resolve(&self, game: Address) -> Result<()>;
}

/// A source of wall-clock time, as UNIX seconds.
pub trait Clock: Send + Sync {
    /// Returns the current UNIX timestamp.
    fn now(&self) -> u64;
}

/// The [Clock] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}
