//! The contracts module contains the ethers-backed [ZkDisputeGame] implementation.

use crate::{
    bindings::{
        CreateZkFaultDisputeGameCall, DisputeGameCreatedFilter, ZkFaultDisputeGame,
        ZkFaultProofConfig,
    },
    traits::{L1Source, ZkDisputeGame},
};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use ethers::{
    abi::{ParamType, Token},
    contract::{ContractError, EthCall, EthEvent},
    providers::Middleware,
    types::{Address, Log, H256, U256},
};
use op_challenger_solvers::zk::{GameStatus, L1Head};
use std::{sync::Arc, time::Duration};

/// Only games whose `version()` starts with this prefix are understood.
const SUPPORTED_VERSION_PREFIX: &str = "1.2.";

/// The [ZkFaultDisputeGameContract] reads a ZK fault dispute game through an L1 provider. Games
/// are always created by `factory`, and the calldata of their claims is found through `l1_source`.
pub struct ZkFaultDisputeGameContract<M> {
    game: ZkFaultDisputeGame<M>,
    factory: Address,
    provider: Arc<M>,
    l1_source: Arc<dyn L1Source>,
}

impl<M: Middleware + 'static> ZkFaultDisputeGameContract<M> {
    /// Binds to the game at `address`, checking that its version is supported.
    ///
    /// ### Takes
    /// - `address`: The address of the dispute game proxy.
    /// - `factory`: The factory the game was created by.
    /// - `provider`: The L1 provider used for contract calls.
    /// - `l1_source`: The L1 block source used to find the game's creation.
    pub async fn try_new(
        address: Address,
        factory: Address,
        provider: Arc<M>,
        l1_source: Arc<dyn L1Source>,
    ) -> Result<Self> {
        let game = ZkFaultDisputeGame::new(address, Arc::clone(&provider));
        let version = game
            .version()
            .call()
            .await
            .with_context(|| format!("failed to retrieve version of dispute game {:?}", address))?;
        if !version.starts_with(SUPPORTED_VERSION_PREFIX) {
            bail!(
                "ZK fault dispute game {:?} has unsupported version {}",
                address,
                version
            );
        }

        Ok(Self {
            game,
            factory,
            provider,
            l1_source,
        })
    }

    fn is_creation_log(&self, log: &Log) -> bool {
        log.address == self.factory
            && log.topics.first() == Some(&DisputeGameCreatedFilter::signature())
            && log.topics.get(1) == Some(&H256::from(self.game.address()))
    }
}

#[async_trait]
impl<M: Middleware + 'static> ZkDisputeGame for ZkFaultDisputeGameContract<M> {
    fn address(&self) -> Address {
        self.game.address()
    }

    async fn status(&self) -> Result<GameStatus> {
        let status = self
            .game
            .status()
            .call()
            .await
            .context("failed to fetch status")?;
        GameStatus::try_from(status)
    }

    async fn claim_count(&self) -> Result<u64> {
        let count = self
            .game
            .claim_len()
            .call()
            .await
            .context("failed to fetch claim count")?;
        to_u64(count, "claim count")
    }

    async fn l1_head(&self) -> Result<H256> {
        let head = self
            .game
            .l1_head()
            .call()
            .await
            .context("failed to fetch L1 head")?;
        Ok(H256::from(head))
    }

    async fn block_range(&self) -> Result<(u64, u64)> {
        let start = self
            .game
            .starting_block_number()
            .call()
            .await
            .context("failed to retrieve game starting block")?;
        let end = self
            .game
            .l2_block_number()
            .call()
            .await
            .context("failed to retrieve game l2 block number")?;
        Ok((
            to_u64(start, "starting block number")?,
            to_u64(end, "l2 block number")?,
        ))
    }

    async fn max_detect_fault_duration(&self) -> Result<Duration> {
        let seconds = self
            .game
            .max_detect_fault_duration()
            .call()
            .await
            .context("failed to fetch maxDetectFaultDuration")?;
        Ok(Duration::from_secs(seconds))
    }

    async fn max_clock_duration(&self) -> Result<Duration> {
        let seconds = self
            .game
            .max_clock_duration()
            .call()
            .await
            .context("failed to fetch maxClockDuration")?;
        Ok(Duration::from_secs(seconds))
    }

    async fn created_at(&self) -> Result<u64> {
        self.game
            .created_at()
            .call()
            .await
            .context("failed to fetch createdAt")
    }

    async fn root_claim(&self) -> Result<H256> {
        let root = self
            .game
            .root_claim()
            .call()
            .await
            .context("failed to fetch root claim")?;
        Ok(H256::from(root))
    }

    async fn claims_hash(&self) -> Result<H256> {
        let hash = self
            .game
            .claims_hash()
            .call()
            .await
            .context("failed to fetch claims hash")?;
        Ok(H256::from(hash))
    }

    async fn challenged_claims(&self, index: u64) -> Result<bool> {
        self.game
            .challenged_claims(U256::from(index))
            .call()
            .await
            .with_context(|| format!("failed to fetch challengedClaims({})", index))
    }

    async fn is_challenge_success(&self) -> Result<bool> {
        self.game
            .is_challenge_success()
            .call()
            .await
            .context("failed to retrieve isChallengeSuccess")
    }

    async fn block_distance(&self) -> Result<u64> {
        let config = self
            .game
            .config()
            .call()
            .await
            .context("failed to get config")?;
        let distance = ZkFaultProofConfig::new(config, Arc::clone(&self.provider))
            .block_distance()
            .call()
            .await
            .context("failed to fetch blockDistance")?;
        to_u64(distance, "block distance")
    }

    /// The game is created in the L1 block right after its L1 head. Its claims are decoded from
    /// the calldata of the factory call that emitted its `DisputeGameCreated` event.
    async fn claims(&self, l1_head: L1Head) -> Result<Vec<H256>> {
        let creation_block = l1_head.number + 1;
        let header = self.l1_source.info_by_number(creation_block).await?;
        let block_hash = header
            .hash
            .ok_or(anyhow!("L1 block #{} is missing its hash", creation_block))?;
        let (_, receipts) = self.l1_source.fetch_receipts(block_hash).await?;

        let tx_hash = receipts
            .iter()
            .find(|receipt| receipt.logs.iter().any(|log| self.is_creation_log(log)))
            .map(|receipt| receipt.transaction_hash)
            .ok_or(anyhow!(
                "creation of game {:?} not found in L1 block #{}",
                self.address(),
                creation_block
            ))?;
        let block = self.l1_source.info_and_txs_by_hash(block_hash).await?;
        let tx = block
            .transactions
            .iter()
            .find(|tx| tx.hash == tx_hash)
            .ok_or(anyhow!("transaction {:?} not found in its block", tx_hash))?;

        decode_creation_claims(&tx.input)
            .with_context(|| format!("failed to decode creation calldata of {:?}", tx_hash))
    }

    async fn parent_game(&self) -> Result<Option<Arc<dyn ZkDisputeGame>>> {
        let parent = self
            .game
            .parent_game_proxy()
            .call()
            .await
            .context("failed to fetch parent game proxy")?;
        if parent == Address::zero() {
            return Ok(None);
        }

        let contract = Self::try_new(
            parent,
            self.factory,
            Arc::clone(&self.provider),
            Arc::clone(&self.l1_source),
        )
        .await?;
        Ok(Some(Arc::new(contract)))
    }

    async fn can_resolve_claim(&self) -> Result<bool> {
        simulated(self.game.resolve_claim().call().await, "resolveClaim")
    }

    async fn can_resolve(&self) -> Result<bool> {
        simulated(self.game.resolve().call().await.map(|_| ()), "resolve")
    }
}

/// Maps the result of an `eth_call` simulation to whether the transaction would go through. A
/// revert means it would not, any other error is returned.
fn simulated<M: Middleware>(res: Result<(), ContractError<M>>, method: &str) -> Result<bool> {
    match res {
        Ok(()) => Ok(true),
        Err(e) if e.is_revert() => {
            tracing::trace!(target: "zk-contract", method, "Simulation reverted: {}", e);
            Ok(false)
        }
        Err(e) => Err(anyhow!("failed to simulate {}: {}", method, e)),
    }
}

/// Extracts the claims from `createZkFaultDisputeGame` calldata.
pub(crate) fn decode_creation_claims(input: &[u8]) -> Result<Vec<H256>> {
    if input.len() < 4 || input[..4] != CreateZkFaultDisputeGameCall::selector() {
        bail!("calldata is not a createZkFaultDisputeGame call");
    }

    let tokens = ethers::abi::decode(
        &[
            ParamType::Uint(32),
            ParamType::Array(Box::new(ParamType::FixedBytes(32))),
            ParamType::Uint(64),
            ParamType::Uint(64),
            ParamType::Bytes,
        ],
        &input[4..],
    )?;
    let Some(Token::Array(claims)) = tokens.into_iter().nth(1) else {
        bail!("createZkFaultDisputeGame calldata is missing its claims");
    };

    claims
        .into_iter()
        .map(|claim| match claim {
            Token::FixedBytes(bytes) if bytes.len() == 32 => Ok(H256::from_slice(&bytes)),
            other => Err(anyhow!("unexpected claim token: {:?}", other)),
        })
        .collect()
}

fn to_u64(value: U256, what: &str) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        bail!("{} does not fit in a u64: {}", what, value);
    }
    Ok(value.as_u64())
}
