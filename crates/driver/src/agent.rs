//! The agent module contains the [ChallengeAgent], which decides once per tick whether a ZK fault
//! dispute game holds a faulty claim that should be challenged.

use crate::{
    cache::OutputRootCache,
    traits::{Clock, L1Source, ZkDisputeGame},
};
use anyhow::{Context, Result};
use op_challenger_solvers::zk::{
    claims_hash, locate_divergence, Action, ChallengeDecision, ChallengeWindow, ClaimRange,
    GameStatus, L1Head, Verdict,
};
use std::sync::Arc;

/// The [ChallengeAgent] recomputes the claims of one in progress game against the trusted rollup
/// node and turns the comparison into an [Action].
///
/// The agent keeps no state between ticks beyond the outputs held by its [OutputRootCache].
pub struct ChallengeAgent {
    game: Arc<dyn ZkDisputeGame>,
    cache: Arc<OutputRootCache>,
    l1_source: Arc<dyn L1Source>,
    clock: Arc<dyn Clock>,
    range: ClaimRange,
    window: ChallengeWindow,
    l1_head: L1Head,
}

impl ChallengeAgent {
    /// Creates a new [ChallengeAgent].
    ///
    /// ### Takes
    /// - `game`: The game to watch.
    /// - `cache`: The output cache of the game. Also used for the games it builds on.
    /// - `l1_source`: Resolves the L1 heads of parent games.
    /// - `clock`: The wall clock the challenge window is measured against.
    /// - `range`: The claim positions of the game.
    /// - `window`: The challenge window of the game.
    /// - `l1_head`: The L1 block the game is anchored to.
    pub fn new(
        game: Arc<dyn ZkDisputeGame>,
        cache: Arc<OutputRootCache>,
        l1_source: Arc<dyn L1Source>,
        clock: Arc<dyn Clock>,
        range: ClaimRange,
        window: ChallengeWindow,
        l1_head: L1Head,
    ) -> Self {
        Self {
            game,
            cache,
            l1_source,
            clock,
            range,
            window,
            l1_head,
        }
    }

    /// Runs one tick of the agent.
    ///
    /// Resolution comes first: outstanding challenges are settled with `resolveClaim` as soon as
    /// that would go through, and once the game's clock has run out it is ended with `resolve`
    /// instead of being checked for faults. A game a challenge has already succeeded against is
    /// never challenged again.
    ///
    /// ### Returns
    /// - `Ok(Vec<Action>)`: The transactions to send, in order. Empty when there is nothing to do.
    /// - `Err(anyhow::Error)`: A read failed. The tick should be retried later.
    pub async fn act(&self) -> Result<Vec<Action>> {
        let game = self.game.address();
        let status = self.game.status().await?;
        if status != GameStatus::InProgress {
            tracing::debug!(target: "zk-agent", game = ?game, %status, "Game is already resolved, skipping");
            return Ok(Vec::new());
        }

        let mut actions = Vec::new();
        let challenge_success = self.game.is_challenge_success().await?;
        if !challenge_success && self.game.can_resolve_claim().await? {
            tracing::info!(target: "zk-agent", game = ?game, "Challenges can be settled");
            actions.push(Action::ResolveClaim);
        }

        let now = self.clock.now();
        if self.window.is_resolvable(now) && self.game.can_resolve().await? {
            tracing::info!(target: "zk-agent", game = ?game, now, "Game clock has run out, resolving");
            actions.push(Action::Resolve);
            return Ok(actions);
        }

        if challenge_success {
            tracing::debug!(target: "zk-agent", game = ?game, "Game has already been successfully challenged");
            return Ok(actions);
        }

        let decision = self.decide().await?;
        match decision.verdict() {
            Verdict::NoFault => {
                tracing::debug!(target: "zk-agent", game = ?game, "All claims match the local outputs");
            }
            Verdict::AlreadyChallenged(index) => {
                tracing::debug!(target: "zk-agent", game = ?game, index, "Faulty claim has already been challenged");
            }
            Verdict::WindowMissed(index) => {
                tracing::error!(
                    target: "zk-agent",
                    game = ?game,
                    index,
                    deadline = self.window.deadline(),
                    "Found a faulty claim, but the challenge window has passed"
                );
            }
            Verdict::Challenge(index) => {
                if self.is_parent_chain_valid().await? {
                    tracing::info!(target: "zk-agent", game = ?game, index, "Found a faulty claim");
                    actions.push(Action::Challenge { index });
                } else {
                    tracing::debug!(target: "zk-agent", game = ?game, index, "Parent game chain is invalid, skipping challenge");
                }
            }
        }
        Ok(actions)
    }

    /// Compares the game against the local outputs and builds the [ChallengeDecision] for this
    /// tick.
    pub async fn decide(&self) -> Result<ChallengeDecision> {
        let fault = self
            .detect_fault(self.game.as_ref(), self.range, self.l1_head)
            .await?;
        let deadline_passed = self.window.has_passed(self.clock.now());

        let Some(target_index) = fault else {
            return Ok(ChallengeDecision::no_fault(deadline_passed));
        };
        let already_challenged = self.game.challenged_claims(target_index).await?;

        Ok(ChallengeDecision {
            claims_hash_mismatch: true,
            target_index,
            already_challenged,
            deadline_passed,
        })
    }

    /// Returns the index of the first faulty claim of `game`, if any.
    ///
    /// The endpoint is checked first, since a faulty root claim can be found with a single
    /// output. Only if it matches is the commitment over the full range recomputed.
    async fn detect_fault(
        &self,
        game: &dyn ZkDisputeGame,
        range: ClaimRange,
        l1_head: L1Head,
    ) -> Result<Option<u64>> {
        let root_claim = game.root_claim().await?;
        let end_output = self.cache.load_one(range.end_block).await?;
        if root_claim != end_output.output_root {
            tracing::info!(
                target: "zk-agent",
                game = ?game.address(),
                end_block = range.end_block,
                claimed = ?root_claim,
                local = ?end_output.output_root,
                "Root claim does not match the local output"
            );
            return Ok(Some(range.end_index()));
        }

        let onchain_hash = game.claims_hash().await?;
        let outputs = self.cache.load_range(range).await?;
        let roots = outputs.iter().map(|o| o.output_root).collect::<Vec<_>>();
        let local_hash = claims_hash(&roots);
        if local_hash == onchain_hash {
            return Ok(None);
        }

        let claimed = game
            .claims(l1_head)
            .await
            .context("failed to fetch the claims the game was created with")?;
        let divergence = locate_divergence(&roots, &claimed)?;
        let block_number = outputs[divergence].block_number();
        tracing::info!(
            target: "zk-agent",
            game = ?game.address(),
            block_number,
            claimed = ?onchain_hash,
            local = ?local_hash,
            "Claims hash does not match the local outputs"
        );
        Ok(Some(range.target_index(block_number)))
    }

    /// Walks the chain of parent games. A child of a faulty game is invalid no matter what it
    /// claims, so challenging it is pointless.
    async fn is_parent_chain_valid(&self) -> Result<bool> {
        let mut next = self.game.parent_game().await?;
        while let Some(parent) = next {
            match parent.status().await? {
                GameStatus::DefenderWins => return Ok(true),
                GameStatus::ChallengerWins => return Ok(false),
                GameStatus::InProgress => {}
            }

            let (start_block, end_block) = parent.block_range().await?;
            let stride = match parent.block_distance().await? {
                0 => self.range.stride,
                stride => stride,
            };
            let range = ClaimRange::new(start_block, end_block, stride)?;
            let header = self.l1_source.info_by_hash(parent.l1_head().await?).await?;
            let l1_head = L1Head::try_from(&header)?;

            if self
                .detect_fault(parent.as_ref(), range, l1_head)
                .await?
                .is_some()
            {
                tracing::debug!(target: "zk-agent", parent = ?parent.address(), "Parent game holds a faulty claim");
                return Ok(false);
            }
            next = parent.parent_game().await?;
        }
        Ok(true)
    }
}
