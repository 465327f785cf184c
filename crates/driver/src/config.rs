//! The `config` module contains the [DriverConfig].

use crate::{
    ChainProvider, ChannelSubmitter, GamePlayer, PlayerConfig, RetryingSource, RollupNodeClient,
    SignerMiddlewareWS, SystemClock, TxRequest,
};
use ethers::{
    providers::{Http, Provider},
    types::Address,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Tunables of the game loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    /// The game type of the ZK fault dispute games to play.
    pub game_type: u32,
    /// The interval between two ticks of every game.
    pub poll_interval: Duration,
    /// How far back to look for in progress games at startup.
    pub game_window: Duration,
    /// The capacity of each game's output cache.
    pub output_cache_size: usize,
    /// The stride used when a game does not report its own.
    pub default_block_distance: u64,
}

/// The [DriverConfig] struct contains the configuration for the [Driver](crate::Driver) implementations.
pub struct DriverConfig {
    /// The provider used to index events and send transactions on L1.
    pub l1_provider: Arc<SignerMiddlewareWS>,
    /// The provider for the trusted op-node endpoint used to compare claimed outputs against.
    /// This RPC should be 100% trusted- the bot will use this endpoint as the source of truth
    /// for the L2 chain.
    pub node_provider: Arc<Provider<Http>>,
    /// The address of the dispute game factory contract.
    pub dispute_game_factory: Address,
    /// Tunables of the game loop.
    pub settings: GameSettings,
    /// The collaborators every [GamePlayer] is built with.
    pub player_config: PlayerConfig,
    /// The sending handle of the MPSC channel used to send transactions.
    pub tx_sender: mpsc::Sender<TxRequest>,
    /// The receiving handle of the MPSC channel used to send transactions.
    pub tx_receiver: Mutex<mpsc::Receiver<TxRequest>>,
    /// The sending handle of the MPSC channel used to hand new players to the polling loop.
    pub player_sender: mpsc::Sender<GamePlayer>,
    /// The receiving handle of the MPSC channel used to hand new players to the polling loop.
    pub player_receiver: Mutex<mpsc::Receiver<GamePlayer>>,
    /// Stops every driver loop.
    pub cancel: CancellationToken,
}

impl DriverConfig {
    /// Creates a new [DriverConfig] with the given configuration.
    pub fn new(
        l1_provider: Arc<SignerMiddlewareWS>,
        node_provider: Arc<Provider<Http>>,
        dispute_game_factory: Address,
        settings: GameSettings,
        cancel: CancellationToken,
    ) -> Self {
        // Create new MPSC channels for sending transactions and players from the drivers.
        let (tx_sender, tx_receiver) = mpsc::channel(128);
        let (player_sender, player_receiver) = mpsc::channel(128);

        let rollup = RollupNodeClient::new(Arc::clone(&node_provider));
        let player_config = PlayerConfig {
            rollup: Arc::new(RetryingSource::new(rollup.clone(), cancel.clone())),
            l1_source: Arc::new(RetryingSource::new(
                ChainProvider::new(Arc::clone(&l1_provider)),
                cancel.clone(),
            )),
            sync_validator: Arc::new(rollup),
            submitter: Arc::new(ChannelSubmitter::new(
                Arc::clone(&l1_provider),
                tx_sender.clone(),
            )),
            clock: Arc::new(SystemClock),
            cache_size: settings.output_cache_size,
            default_stride: settings.default_block_distance,
            cancel: cancel.clone(),
        };

        Self {
            l1_provider,
            node_provider,
            dispute_game_factory,
            settings,
            player_config,
            tx_sender,
            tx_receiver: Mutex::new(tx_receiver),
            player_sender,
            player_receiver: Mutex::new(player_receiver),
            cancel,
        }
    }
}
