use crate::{
    bindings::ZkDisputeGameFactory, DriverConfig, GamePlayer, SignerMiddlewareWS,
    ZkFaultDisputeGameContract,
};
use anyhow::{anyhow, Result};
use ethers::types::{Address, Log, U256};
use op_challenger_solvers::zk::GameStatus;
use std::{sync::Arc, time::SystemTime};

/// Handles a game created by the [ZkDisputeGameFactory]. Builds a [GamePlayer] for the game and
/// hands it to the polling loop. Games that are no longer in progress are ignored.
pub async fn game_created(config: Arc<DriverConfig>, game_addr: Address) -> Result<()> {
    let contract = ZkFaultDisputeGameContract::try_new(
        game_addr,
        config.dispute_game_factory,
        Arc::clone(&config.l1_provider),
        Arc::clone(&config.player_config.l1_source),
    )
    .await?;
    let player = GamePlayer::try_new(Arc::new(contract), &config.player_config).await?;

    if player.status() == GameStatus::InProgress {
        tracing::info!(target: "dispute-factory-driver", game = ?game_addr, "Tracking new game");
        config
            .player_sender
            .send(player)
            .await
            .map_err(|_| anyhow!("game polling loop has stopped"))?;
    } else {
        tracing::debug!(target: "dispute-factory-driver", game = ?game_addr, status = %player.status(), "Ignoring game that is not in progress");
    }
    Ok(())
}

/// Handles the `DisputeGameCreated` event emitted by the [ZkDisputeGameFactory].
pub async fn dispute_game_created(config: Arc<DriverConfig>, log: Log) -> Result<()> {
    // The address of the created dispute game proxy.
    let game_addr = Address::from_slice(
        &log.topics.get(1).ok_or(anyhow!(
            "Critical failure: `disputeProxy` field not present in `DisputeGameCreated` event."
        ))?[12..],
    );
    game_created(config, game_addr).await
}

/// Walks the factory's games from newest to oldest and handles every game of the configured type
/// created within the game window. Each game is handled on its own task.
pub async fn scan_recent_games(
    config: Arc<DriverConfig>,
    factory: &ZkDisputeGameFactory<SignerMiddlewareWS>,
) -> Result<()> {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)?
        .as_secs();
    let earliest = now.saturating_sub(config.settings.game_window.as_secs());

    let count = factory.game_count().call().await?;
    tracing::info!(target: "dispute-factory-driver", %count, earliest, "Scanning for recent games...");

    let mut index = count;
    while index > U256::zero() {
        index -= U256::one();
        let (game_type, timestamp, proxy) = factory.game_at_index(index).call().await?;
        if timestamp < earliest {
            break;
        }
        if game_type != config.settings.game_type {
            continue;
        }

        let config = Arc::clone(&config);
        tokio::spawn(async move {
            if let Err(e) = game_created(config, proxy).await {
                // Soft failure, log the error and continue.
                tracing::error!(target: "dispute-factory-driver", game = ?proxy, "Error handling game: {:?}", e);
            }
        });
    }
    Ok(())
}
