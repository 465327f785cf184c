//! The `driver` module contains implementations of the [Driver] trait.

use crate::{bindings::ZkDisputeGameFactory, handlers, Driver, DriverConfig, GlobalState};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::{
    providers::{Middleware, StreamExt},
    types::H256,
};
use std::sync::Arc;

/// Defines a new [Driver] implementation.
#[macro_export]
macro_rules! define_driver {
    ($name:ident, $inner:expr) => {
        #[doc = concat!("Variant of the [Driver] trait: [", stringify!($name), "]")]
        pub struct $name {
            /// The configuration for all of the drivers.
            pub config: Arc<DriverConfig>,
        }

        #[async_trait]
        impl Driver for $name {
            async fn start_loop(self) -> Result<()> {
                #[allow(clippy::redundant_closure_call)]
                $inner(self).await
            }
        }

        impl $name {
            #[doc = concat!("Creates a new instance of the [", stringify!($name), "] driver.")]
            pub fn new(config: Arc<DriverConfig>) -> Self {
                Self { config }
            }
        }
    };
}

define_driver!(
    TxDispatchDriver,
    (|self: TxDispatchDriver| {
        async move {
            tracing::info!(target: "tx-dispatch-driver", "Starting transaction dispatch driver...");
            let mut locked_receive_ch = self.config.tx_receiver.lock().await;
            tracing::info!(target: "tx-dispatch-driver", "Locked receive channel mutex successfully. Beginning tx dispatch loop.");

            loop {
                let request = tokio::select! {
                    _ = self.config.cancel.cancelled() => break,
                    request = locked_receive_ch.recv() => match request {
                        Some(request) => request,
                        None => break,
                    },
                };

                tracing::info!(target: "tx-dispatch-driver", "Transaction request received in dispatch driver. Sending transaction...");
                let result = match self.config.l1_provider.send_transaction(request.tx, None).await {
                    Ok(pending) => {
                        tracing::info!(target: "tx-dispatch-driver", "Transaction sent successfully. Tx hash: {:?}", pending.tx_hash());
                        pending
                            .await
                            .map_err(|e| anyhow!(e))
                            .and_then(|receipt| receipt.ok_or(anyhow!("transaction dropped from the mempool")))
                    }
                    // Soft failure, report the error to the requester and continue.
                    Err(e) => Err(anyhow!("error sending transaction: {}", e)),
                };

                if let Err(e) = &result {
                    tracing::error!(target: "tx-dispatch-driver", "Transaction failed: {:?}", e);
                }
                // The requester may have given up waiting.
                let _ = request.ack.send(result);
            }

            tracing::info!(target: "tx-dispatch-driver", "Transaction dispatch driver stopped.");
            Ok(())
        }
    })
);

define_driver!(
    DisputeFactoryDriver,
    (|self: DisputeFactoryDriver| {
        async move {
            let factory = ZkDisputeGameFactory::new(
                self.config.dispute_game_factory,
                Arc::clone(&self.config.l1_provider),
            );

            tracing::info!(target: "dispute-factory-driver", "Subscribing to DisputeGameCreated events...");
            let filter = factory
                .dispute_game_created_filter()
                .filter
                .topic2(H256::from_low_u64_be(self.config.settings.game_type as u64));
            let mut stream = self.config.l1_provider.subscribe_logs(&filter).await?;

            // Subscribe first, so no game created during the scan is missed.
            handlers::scan_recent_games(Arc::clone(&self.config), &factory).await?;

            tracing::info!(target: "dispute-factory-driver", "Subscribed to DisputeGameCreated events, beginning event loop.");
            loop {
                let dispute_game_created = tokio::select! {
                    _ = self.config.cancel.cancelled() => break,
                    log = stream.next() => match log {
                        Some(log) => log,
                        None => break,
                    },
                };
                tracing::debug!(target: "dispute-factory-driver", "DisputeGameCreated event received");

                // Building the player reads the game, which must not hold up the event stream.
                let config = Arc::clone(&self.config);
                tokio::spawn(async move {
                    if let Err(e) = handlers::dispute_game_created(config, dispute_game_created).await {
                        // Soft failure, log the error and continue.
                        tracing::error!(target: "dispute-factory-driver", "Error handling DisputeGameCreated event: {:?}", e);
                    }
                });
            }

            Ok(())
        }
    })
);

define_driver!(
    GamePollingDriver,
    (|self: GamePollingDriver| {
        async move {
            tracing::info!(target: "game-polling-driver", "Starting game polling driver...");
            let mut locked_player_ch = self.config.player_receiver.lock().await;
            let mut state = GlobalState::new(self.config.settings.poll_interval, self.config.cancel.clone());

            loop {
                tokio::select! {
                    _ = self.config.cancel.cancelled() => break,
                    Some(player) = locked_player_ch.recv() => {
                        let game = player.address();
                        if state.track(player) {
                            tracing::debug!(target: "game-polling-driver", game = ?game, games = state.len(), "Playing game");
                        } else {
                            tracing::debug!(target: "game-polling-driver", game = ?game, "Game is already tracked");
                        }
                    }
                    Some((game, status)) = state.join_next() => {
                        tracing::info!(target: "game-polling-driver", game = ?game, %status, games = state.len(), "No longer tracking game");
                    }
                }
            }

            tracing::info!(target: "game-polling-driver", "Game polling driver stopped.");
            Ok(())
        }
    })
);
