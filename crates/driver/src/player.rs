//! The player module contains the [GamePlayer], the per-game actor that gates the
//! [ChallengeAgent] on node sync status and tracks the game's lifecycle.

use crate::{
    agent::ChallengeAgent,
    cache::OutputRootCache,
    traits::{ChallengeSubmitter, Clock, L1Source, RollupClient, SyncValidator, ZkDisputeGame},
    ChallengerError,
};
use anyhow::Result;
use ethers::types::Address;
use op_challenger_solvers::zk::{Action, ChallengeWindow, ClaimRange, GameStatus, L1Head};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The collaborators and settings shared by every [GamePlayer] of a process.
#[derive(Clone)]
pub struct PlayerConfig {
    /// The trusted rollup node.
    pub rollup: Arc<dyn RollupClient>,
    /// The L1 node, used to resolve L1 heads.
    pub l1_source: Arc<dyn L1Source>,
    /// Gates every tick on the rollup node having caught up.
    pub sync_validator: Arc<dyn SyncValidator>,
    /// Gets the agent's transactions onchain.
    pub submitter: Arc<dyn ChallengeSubmitter>,
    /// The wall clock.
    pub clock: Arc<dyn Clock>,
    /// The capacity of each game's output cache.
    pub cache_size: usize,
    /// The stride used when a game does not report its own.
    pub default_stride: u64,
    /// Aborts in flight retries on shutdown.
    pub cancel: CancellationToken,
}

/// The state a [GamePlayer] only carries while its game is in progress.
struct ActiveGame {
    agent: ChallengeAgent,
    l1_head: L1Head,
}

/// The [GamePlayer] owns the lifecycle of one dispute game. A player whose game is not
/// [GameStatus::InProgress] is terminal and does nothing.
pub struct GamePlayer {
    game: Arc<dyn ZkDisputeGame>,
    status: GameStatus,
    active: Option<ActiveGame>,
    sync_validator: Arc<dyn SyncValidator>,
    submitter: Arc<dyn ChallengeSubmitter>,
}

impl GamePlayer {
    /// Creates a new [GamePlayer] for `game`.
    ///
    /// ### Takes
    /// - `game`: The game to play.
    /// - `config`: The shared [PlayerConfig].
    ///
    /// ### Returns
    /// - `Ok(GamePlayer)`: The player, terminal if the game is already resolved.
    /// - `Err(anyhow::Error)`: A read of the game failed, or the configuration is unusable.
    pub async fn try_new(game: Arc<dyn ZkDisputeGame>, config: &PlayerConfig) -> Result<Self> {
        let status = game.status().await?;
        let mut player = Self {
            game,
            status,
            active: None,
            sync_validator: Arc::clone(&config.sync_validator),
            submitter: Arc::clone(&config.submitter),
        };

        if status != GameStatus::InProgress {
            tracing::trace!(target: "zk-player", game = ?player.game.address(), %status, "Game is not in progress, nothing to play");
            return Ok(player);
        }

        let game = &player.game;
        let header = config.l1_source.info_by_hash(game.l1_head().await?).await?;
        let l1_head = L1Head::try_from(&header)?;
        let window = ChallengeWindow {
            created_at: game.created_at().await?,
            max_detect_fault_duration: game.max_detect_fault_duration().await?,
            max_clock_duration: game.max_clock_duration().await?,
        };
        let stride = match game.block_distance().await? {
            0 => config.default_stride,
            stride => stride,
        };
        let (start_block, end_block) = game.block_range().await?;
        let range = ClaimRange::new(start_block, end_block, stride)?;

        let cache = OutputRootCache::try_new(
            Arc::clone(&config.rollup),
            config.cache_size,
            stride,
            config.cancel.clone(),
        )?;
        let agent = ChallengeAgent::new(
            Arc::clone(game),
            Arc::new(cache),
            Arc::clone(&config.l1_source),
            Arc::clone(&config.clock),
            range,
            window,
            l1_head,
        );

        tracing::debug!(
            target: "zk-player",
            game = ?game.address(),
            start_block,
            end_block,
            stride,
            l1_head = l1_head.number,
            deadline = window.deadline(),
            resolvable_at = window.resolvable_at(),
            "Playing game"
        );
        player.active = Some(ActiveGame { agent, l1_head });
        Ok(player)
    }

    /// The address of the game.
    pub fn address(&self) -> Address {
        self.game.address()
    }

    /// The last known status of the game.
    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Progresses the game by one tick and returns its status afterwards. Errors never escape
    /// this method; they are logged and the tick is retried on the next call.
    pub async fn progress_game(&mut self) -> GameStatus {
        let Some(active) = &self.active else {
            return self.status;
        };
        let game = self.game.address();

        if let Err(e) = self.sync_validator.validate_node_synced(active.l1_head).await {
            if ChallengerError::is_not_in_sync(&e) {
                tracing::warn!(target: "zk-player", game = ?game, "Local node not sufficiently up to date: {}", e);
            } else {
                tracing::error!(target: "zk-player", game = ?game, "Failed to check local node sync status: {:?}", e);
            }
            return self.status;
        }

        match active.agent.act().await {
            Ok(actions) => {
                for action in actions {
                    if let Err(e) = self.perform(action).await {
                        tracing::error!(target: "zk-player", game = ?game, ?action, "Failed to submit transaction: {:?}", e);
                    }
                }
            }
            Err(e) => {
                tracing::error!(target: "zk-player", game = ?game, "Error when acting on game: {:?}", e)
            }
        }

        let status = match self.game.status().await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(target: "zk-player", game = ?game, "Unable to retrieve game status: {:?}", e);
                return self.status;
            }
        };
        self.log_status(status).await;

        self.status = status;
        if status != GameStatus::InProgress {
            self.active = None;
        }
        status
    }

    async fn perform(&self, action: Action) -> Result<()> {
        let game = self.game.address();
        match action {
            Action::ResolveClaim => self.submitter.submit_resolve_claim(game).await,
            Action::Resolve => self.submitter.submit_resolve(game).await,
            Action::Challenge { index } => self.submitter.submit_challenge(game, index).await,
        }
    }

    async fn log_status(&self, status: GameStatus) {
        let game = self.game.address();
        if status != GameStatus::InProgress {
            tracing::info!(target: "zk-player", game = ?game, %status, "Game resolved");
            return;
        }
        match self.game.claim_count().await {
            Ok(claims) => {
                tracing::info!(target: "zk-player", game = ?game, claims, %status, "Game info")
            }
            Err(e) => {
                tracing::error!(target: "zk-player", game = ?game, "Failed to get claim count: {:?}", e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        bad_root, ErrorCounter, FixedClock, MockGame, MockL1, MockRollup, MockSubmitter,
        MockSyncValidator, SyncMode,
    };

    struct Fixture {
        game: Arc<MockGame>,
        rollup: MockRollup,
        sync: Arc<MockSyncValidator>,
        submitter: Arc<MockSubmitter>,
        l1: Arc<MockL1>,
        config: PlayerConfig,
    }

    fn fixture() -> Fixture {
        let game = Arc::new(MockGame::honest(100, 109, 3, 1_000));
        let rollup = MockRollup::default();
        let sync = Arc::new(MockSyncValidator::new(SyncMode::Synced));
        let submitter = Arc::new(MockSubmitter::landing_on(Arc::clone(&game)));
        let l1 = Arc::new(MockL1 {
            number: 7,
            ..Default::default()
        });
        let config = PlayerConfig {
            rollup: Arc::new(rollup.clone()),
            l1_source: Arc::clone(&l1) as Arc<dyn L1Source>,
            sync_validator: Arc::clone(&sync) as Arc<dyn SyncValidator>,
            submitter: Arc::clone(&submitter) as Arc<dyn ChallengeSubmitter>,
            clock: Arc::new(FixedClock::at(1_060)),
            cache_size: 64,
            default_stride: 3,
            cancel: CancellationToken::new(),
        };
        Fixture {
            game,
            rollup,
            sync,
            submitter,
            l1,
            config,
        }
    }

    async fn player(f: &Fixture) -> GamePlayer {
        GamePlayer::try_new(Arc::clone(&f.game) as Arc<dyn ZkDisputeGame>, &f.config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn resolved_game_is_a_no_op() {
        let f = fixture();
        f.game.update(|state| state.status = GameStatus::DefenderWins);

        let mut player = player(&f).await;
        assert_eq!(player.progress_game().await, GameStatus::DefenderWins);
        assert_eq!(f.l1.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(f.rollup.single_calls(), 0);

        // Later reads are never made.
        f.game.update(|state| state.status_error = true);
        assert_eq!(player.progress_game().await, GameStatus::DefenderWins);
    }

    #[tokio::test]
    async fn honest_game_stays_in_progress() {
        let f = fixture();
        let mut player = player(&f).await;
        assert_eq!(player.progress_game().await, GameStatus::InProgress);
        assert!(f.submitter.submitted().is_empty());
    }

    #[tokio::test]
    async fn faulty_game_is_challenged_once() {
        let f = fixture();
        f.game.tamper_claim(1);

        let mut player = player(&f).await;
        assert_eq!(player.progress_game().await, GameStatus::InProgress);
        assert_eq!(player.progress_game().await, GameStatus::InProgress);
        assert_eq!(f.submitter.submitted(), vec![(f.game.address(), 1)]);
    }

    #[tokio::test]
    async fn lagging_node_skips_the_tick() {
        let f = fixture();
        f.game.tamper_claim(1);
        f.sync.set(SyncMode::Behind);

        let errors = ErrorCounter::default();
        let _guard = errors.install();
        let mut player = player(&f).await;
        assert_eq!(player.progress_game().await, GameStatus::InProgress);
        assert_eq!(f.rollup.single_calls(), 0);
        assert!(f.submitter.submitted().is_empty());
        assert_eq!(errors.count(), 0);

        f.sync.set(SyncMode::Synced);
        player.progress_game().await;
        assert_eq!(f.submitter.submitted().len(), 1);
    }

    #[tokio::test]
    async fn failing_sync_check_is_logged() {
        let f = fixture();
        f.sync.set(SyncMode::Broken);

        let errors = ErrorCounter::default();
        let _guard = errors.install();
        let mut player = player(&f).await;
        assert_eq!(player.progress_game().await, GameStatus::InProgress);
        assert_eq!(errors.count(), 1);
        assert_eq!(f.rollup.single_calls(), 0);
    }

    #[tokio::test]
    async fn agent_errors_do_not_stop_the_player() {
        let f = fixture();
        f.game.update(|state| state.claims_hash = bad_root());

        let errors = ErrorCounter::default();
        let _guard = errors.install();
        let mut player = player(&f).await;
        assert_eq!(player.progress_game().await, GameStatus::InProgress);
        assert_eq!(errors.count(), 1);
    }

    #[tokio::test]
    async fn status_read_failure_keeps_the_last_status() {
        let f = fixture();
        let mut player = player(&f).await;

        f.game.update(|state| {
            state.status_error = true;
        });
        assert_eq!(player.progress_game().await, GameStatus::InProgress);
        assert_eq!(player.status(), GameStatus::InProgress);
    }

    #[tokio::test]
    async fn player_turns_terminal_once_resolved() {
        let f = fixture();
        let mut player = player(&f).await;
        assert_eq!(player.progress_game().await, GameStatus::InProgress);

        f.game.update(|state| state.status = GameStatus::ChallengerWins);
        assert_eq!(player.progress_game().await, GameStatus::ChallengerWins);

        f.sync.set(SyncMode::Broken);
        let errors = ErrorCounter::default();
        let _guard = errors.install();
        assert_eq!(player.progress_game().await, GameStatus::ChallengerWins);
        assert_eq!(errors.count(), 0);
    }

    #[tokio::test]
    async fn missing_block_distance_falls_back_to_the_default() {
        let f = fixture();
        f.game.tamper_claim(2);
        f.game.update(|state| state.block_distance = 0);

        let mut player = player(&f).await;
        player.progress_game().await;
        assert_eq!(f.submitter.submitted(), vec![(f.game.address(), 2)]);
    }

    #[tokio::test]
    async fn unusable_cache_size_fails_construction() {
        let mut f = fixture();
        f.config.cache_size = 0;

        let err = GamePlayer::try_new(Arc::clone(&f.game) as Arc<dyn ZkDisputeGame>, &f.config)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<ChallengerError>(),
            Some(ChallengerError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn expired_game_is_resolved() {
        let f = fixture();
        f.game.update(|state| {
            state.resolve_claim_ready = true;
            state.resolve_ready = true;
        });
        let clock = Arc::new(FixedClock::at(1_000 + 7_200));
        let config = PlayerConfig {
            clock: Arc::clone(&clock) as Arc<dyn Clock>,
            ..f.config.clone()
        };

        let mut player = GamePlayer::try_new(Arc::clone(&f.game) as Arc<dyn ZkDisputeGame>, &config)
            .await
            .unwrap();
        assert_eq!(player.progress_game().await, GameStatus::DefenderWins);
        assert_eq!(f.submitter.resolved_claims(), vec![f.game.address()]);
        assert_eq!(f.submitter.resolved(), vec![f.game.address()]);
        assert!(f.submitter.submitted().is_empty());
    }
}
