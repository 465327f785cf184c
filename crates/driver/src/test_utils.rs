//! Mock collaborators shared by the driver's unit tests.

use crate::{
    traits::{ChallengeSubmitter, Clock, L1Source, RollupClient, SyncValidator, ZkDisputeGame},
    ChallengerError,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::{
    types::{Address, Block, Transaction, TransactionReceipt, H256, U64},
    utils::keccak256,
};
use op_challenger_solvers::zk::{claims_hash, GameStatus, L1Head, L2BlockRef, OutputRootEntry};
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    layer::{Context, SubscriberExt},
    Layer,
};

/// The output root the mock rollup node reports for `block_number`.
pub(crate) fn root_for(block_number: u64) -> H256 {
    H256::from(keccak256(block_number.to_be_bytes()))
}

/// The output the mock rollup node reports for `block_number`.
pub(crate) fn output_entry(block_number: u64) -> OutputRootEntry {
    OutputRootEntry {
        output_root: root_for(block_number),
        block_ref: L2BlockRef {
            number: block_number,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A root that no honest node would ever report.
pub(crate) fn bad_root() -> H256 {
    H256::repeat_byte(0xba)
}

#[derive(Debug, Default)]
struct MockRollupState {
    failures_remaining: AtomicUsize,
    single_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    batched_blocks: AtomicUsize,
    reverse_batches: AtomicBool,
    extra_outputs: Mutex<Vec<OutputRootEntry>>,
    derived_up_to: Mutex<Option<u64>>,
}

/// A rollup node that serves [output_entry] for every block, optionally failing first.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockRollup {
    state: Arc<MockRollupState>,
}

impl MockRollup {
    /// Fails the next `n` requests, single or batched.
    pub(crate) fn failing_first(self, n: usize) -> Self {
        self.state.failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Returns batched outputs in descending block order.
    pub(crate) fn reversed_batches(self) -> Self {
        self.state.reverse_batches.store(true, Ordering::SeqCst);
        self
    }

    /// Appends `extra` to every batched response.
    pub(crate) fn with_extra_outputs(self, extra: Vec<OutputRootEntry>) -> Self {
        *self.state.extra_outputs.lock().unwrap() = extra;
        self
    }

    /// Fails every request for a block above `block_number`, as a node that has not derived it
    /// yet would.
    pub(crate) fn derived_up_to(self, block_number: u64) -> Self {
        *self.state.derived_up_to.lock().unwrap() = Some(block_number);
        self
    }

    pub(crate) fn single_calls(&self) -> usize {
        self.state.single_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn batch_calls(&self) -> usize {
        self.state.batch_calls.load(Ordering::SeqCst)
    }

    /// The total number of blocks requested through batches.
    pub(crate) fn batched_blocks(&self) -> usize {
        self.state.batched_blocks.load(Ordering::SeqCst)
    }

    fn maybe_fail(&self, block_numbers: &[u64]) -> Result<()> {
        if let Some(head) = *self.state.derived_up_to.lock().unwrap() {
            if let Some(block_number) = block_numbers.iter().find(|n| **n > head) {
                return Err(anyhow!("output at block {} not found", block_number));
            }
        }
        let failing = self
            .state
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            Err(anyhow!("connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RollupClient for MockRollup {
    async fn output_at_block(&self, block_number: u64) -> Result<OutputRootEntry> {
        self.state.single_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail(&[block_number])?;
        Ok(output_entry(block_number))
    }

    async fn batch_output_at_block(&self, block_numbers: &[u64]) -> Result<Vec<OutputRootEntry>> {
        self.state.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail(block_numbers)?;
        self.state
            .batched_blocks
            .fetch_add(block_numbers.len(), Ordering::SeqCst);
        let mut outputs = block_numbers
            .iter()
            .copied()
            .map(output_entry)
            .collect::<Vec<_>>();
        if self.state.reverse_batches.load(Ordering::SeqCst) {
            outputs.reverse();
        }
        outputs.extend(self.state.extra_outputs.lock().unwrap().iter().copied());
        Ok(outputs)
    }
}

/// The mutable onchain state of a [MockGame].
#[derive(Clone)]
pub(crate) struct MockGameState {
    pub(crate) status: GameStatus,
    pub(crate) status_error: bool,
    pub(crate) claim_count: u64,
    pub(crate) l1_head: H256,
    pub(crate) start_block: u64,
    pub(crate) end_block: u64,
    pub(crate) max_detect_fault_duration: Duration,
    pub(crate) max_clock_duration: Duration,
    pub(crate) created_at: u64,
    pub(crate) root_claim: H256,
    pub(crate) claims_hash: H256,
    pub(crate) challenged: HashSet<u64>,
    pub(crate) challenge_success: bool,
    pub(crate) block_distance: u64,
    pub(crate) claims: Vec<H256>,
    pub(crate) parent: Option<Arc<MockGame>>,
    /// Whether a `resolveClaim` simulation succeeds.
    pub(crate) resolve_claim_ready: bool,
    /// Whether a `resolve` simulation succeeds.
    pub(crate) resolve_ready: bool,
}

/// An in-memory ZK fault dispute game.
pub(crate) struct MockGame {
    address: Address,
    state: Mutex<MockGameState>,
}

impl MockGame {
    /// A game whose claims all agree with [MockRollup].
    pub(crate) fn honest(start_block: u64, end_block: u64, stride: u64, created_at: u64) -> Self {
        let claims = (start_block..=end_block)
            .step_by(stride as usize)
            .map(root_for)
            .collect::<Vec<_>>();
        Self {
            address: Address::repeat_byte(0x42),
            state: Mutex::new(MockGameState {
                status: GameStatus::InProgress,
                status_error: false,
                claim_count: claims.len() as u64,
                l1_head: H256::repeat_byte(0x11),
                start_block,
                end_block,
                max_detect_fault_duration: Duration::from_secs(3_600),
                max_clock_duration: Duration::from_secs(7_200),
                created_at,
                root_claim: root_for(end_block),
                claims_hash: claims_hash(&claims),
                challenged: HashSet::new(),
                challenge_success: false,
                block_distance: stride,
                claims,
                parent: None,
                resolve_claim_ready: false,
                resolve_ready: false,
            }),
        }
    }

    pub(crate) fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    /// Replaces the claim at `index` with [bad_root] and recommits to the claims.
    pub(crate) fn tamper_claim(&self, index: usize) {
        self.update(|state| {
            state.claims[index] = bad_root();
            state.claims_hash = claims_hash(&state.claims);
            if index == state.claims.len() - 1 {
                state.root_claim = bad_root();
            }
        });
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut MockGameState)) {
        f(&mut self.state.lock().unwrap());
    }

    fn read(&self) -> MockGameState {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl ZkDisputeGame for MockGame {
    fn address(&self) -> Address {
        self.address
    }

    async fn status(&self) -> Result<GameStatus> {
        let state = self.read();
        if state.status_error {
            return Err(anyhow!("execution reverted"));
        }
        Ok(state.status)
    }

    async fn claim_count(&self) -> Result<u64> {
        Ok(self.read().claim_count)
    }

    async fn l1_head(&self) -> Result<H256> {
        Ok(self.read().l1_head)
    }

    async fn block_range(&self) -> Result<(u64, u64)> {
        let state = self.read();
        Ok((state.start_block, state.end_block))
    }

    async fn max_detect_fault_duration(&self) -> Result<Duration> {
        Ok(self.read().max_detect_fault_duration)
    }

    async fn max_clock_duration(&self) -> Result<Duration> {
        Ok(self.read().max_clock_duration)
    }

    async fn created_at(&self) -> Result<u64> {
        Ok(self.read().created_at)
    }

    async fn root_claim(&self) -> Result<H256> {
        Ok(self.read().root_claim)
    }

    async fn claims_hash(&self) -> Result<H256> {
        Ok(self.read().claims_hash)
    }

    async fn challenged_claims(&self, index: u64) -> Result<bool> {
        Ok(self.read().challenged.contains(&index))
    }

    async fn is_challenge_success(&self) -> Result<bool> {
        Ok(self.read().challenge_success)
    }

    async fn block_distance(&self) -> Result<u64> {
        Ok(self.read().block_distance)
    }

    async fn claims(&self, _: L1Head) -> Result<Vec<H256>> {
        Ok(self.read().claims)
    }

    async fn parent_game(&self) -> Result<Option<Arc<dyn ZkDisputeGame>>> {
        Ok(self
            .read()
            .parent
            .map(|parent| parent as Arc<dyn ZkDisputeGame>))
    }

    async fn can_resolve_claim(&self) -> Result<bool> {
        Ok(self.read().resolve_claim_ready)
    }

    async fn can_resolve(&self) -> Result<bool> {
        Ok(self.read().resolve_ready)
    }
}

/// An L1 node that knows every block hash and reports it at a fixed height.
#[derive(Debug, Default)]
pub(crate) struct MockL1 {
    pub(crate) number: u64,
    pub(crate) calls: AtomicUsize,
}

#[async_trait]
impl L1Source for MockL1 {
    async fn info_by_hash(&self, block_hash: H256) -> Result<Block<H256>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Block {
            hash: Some(block_hash),
            number: Some(U64::from(self.number)),
            ..Default::default()
        })
    }

    async fn info_by_number(&self, number: u64) -> Result<Block<H256>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Block {
            hash: Some(H256::from_low_u64_be(number)),
            number: Some(U64::from(number)),
            ..Default::default()
        })
    }

    async fn info_and_txs_by_hash(&self, block_hash: H256) -> Result<Block<Transaction>> {
        Ok(Block {
            hash: Some(block_hash),
            number: Some(U64::from(self.number)),
            ..Default::default()
        })
    }

    async fn fetch_receipts(
        &self,
        block_hash: H256,
    ) -> Result<(Block<H256>, Vec<TransactionReceipt>)> {
        Ok((self.info_by_hash(block_hash).await?, Vec::new()))
    }
}

/// How a [MockSyncValidator] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SyncMode {
    Synced,
    Behind,
    Broken,
}

#[derive(Debug)]
pub(crate) struct MockSyncValidator {
    pub(crate) mode: Mutex<SyncMode>,
}

impl MockSyncValidator {
    pub(crate) fn new(mode: SyncMode) -> Self {
        Self {
            mode: Mutex::new(mode),
        }
    }

    pub(crate) fn set(&self, mode: SyncMode) {
        *self.mode.lock().unwrap() = mode;
    }
}

#[async_trait]
impl SyncValidator for MockSyncValidator {
    async fn validate_node_synced(&self, l1_head: L1Head) -> Result<()> {
        let mode = *self.mode.lock().unwrap();
        match mode {
            SyncMode::Synced => Ok(()),
            SyncMode::Behind => Err(ChallengerError::NotInSync {
                l1_head,
                current_l1: l1_head.number.saturating_sub(1),
            }
            .into()),
            SyncMode::Broken => Err(anyhow!("rollup node unreachable")),
        }
    }
}

/// A transaction sink that records what it was asked to submit and applies it to the target
/// game, like a mined transaction would.
#[derive(Default)]
pub(crate) struct MockSubmitter {
    pub(crate) submitted: Mutex<Vec<(Address, u64)>>,
    pub(crate) resolved_claims: Mutex<Vec<Address>>,
    pub(crate) resolved: Mutex<Vec<Address>>,
    pub(crate) game: Mutex<Option<Arc<MockGame>>>,
}

impl MockSubmitter {
    pub(crate) fn landing_on(game: Arc<MockGame>) -> Self {
        Self {
            game: Mutex::new(Some(game)),
            ..Default::default()
        }
    }

    pub(crate) fn submitted(&self) -> Vec<(Address, u64)> {
        self.submitted.lock().unwrap().clone()
    }

    pub(crate) fn resolved_claims(&self) -> Vec<Address> {
        self.resolved_claims.lock().unwrap().clone()
    }

    pub(crate) fn resolved(&self) -> Vec<Address> {
        self.resolved.lock().unwrap().clone()
    }

    fn land(&self, f: impl FnOnce(&mut MockGameState)) {
        if let Some(target) = self.game.lock().unwrap().as_ref() {
            target.update(f);
        }
    }
}

#[async_trait]
impl ChallengeSubmitter for MockSubmitter {
    async fn submit_challenge(&self, game: Address, index: u64) -> Result<()> {
        self.submitted.lock().unwrap().push((game, index));
        self.land(|state| {
            state.challenged.insert(index);
        });
        Ok(())
    }

    async fn submit_resolve_claim(&self, game: Address) -> Result<()> {
        self.resolved_claims.lock().unwrap().push(game);
        self.land(|state| state.resolve_claim_ready = false);
        Ok(())
    }

    async fn submit_resolve(&self, game: Address) -> Result<()> {
        self.resolved.lock().unwrap().push(game);
        self.land(|state| {
            state.resolve_ready = false;
            state.status = if state.challenge_success {
                GameStatus::ChallengerWins
            } else {
                GameStatus::DefenderWins
            };
        });
        Ok(())
    }
}

/// A [Clock] that only moves when told to.
#[derive(Debug, Default)]
pub(crate) struct FixedClock(pub(crate) AtomicU64);

impl FixedClock {
    pub(crate) fn at(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub(crate) fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// A tracing layer that counts error-level events.
#[derive(Debug, Clone, Default)]
pub(crate) struct ErrorCounter(Arc<AtomicUsize>);

impl ErrorCounter {
    pub(crate) fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Installs the counter as the thread's default subscriber until the guard is dropped.
    pub(crate) fn install(&self) -> tracing::subscriber::DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }
}

impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &Event<'_>, _: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}
