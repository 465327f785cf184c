use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser};
use ethers::{
    prelude::SignerMiddleware,
    providers::{Http, Middleware, Provider, Ws},
    signers::{LocalWallet, Signer},
    types::Address,
};
use op_challenger_driver::{
    ChallengerError, DisputeFactoryDriver, Driver, DriverConfig, GamePollingDriver, GameSettings,
    TxDispatchDriver, DEFAULT_OUTPUT_CACHE_SIZE,
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::Level;

/// Arguments for the `op-challenger` binary.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Verbosity level (0-4)
    #[arg(long, short, help = "Verbosity level (0-4)", action = ArgAction::Count, env = "VERBOSITY")]
    v: u8,

    /// The Websocket RPC endpoint used to index and send transactions.
    #[arg(
        long,
        short,
        help = "The Websocket RPC endpoint used to index and send transactions.",
        env = "OP_CHALLENGER_L1_WS"
    )]
    l1_ws_endpoint: String,

    /// The HTTP RPC endpoint of the trusted op-node.
    #[arg(
        long,
        short,
        help = "The HTTP RPC endpoint of the trusted op-node.",
        env = "OP_CHALLENGER_TRUSTED_OP_NODE_RPC"
    )]
    trusted_op_node_endpoint: String,

    /// The private key used for signing transactions.
    #[arg(
        long,
        short,
        help = "The private key used for signing transactions.",
        env = "OP_CHALLENGER_KEY"
    )]
    signer_key: String,

    /// The address of the dispute game factory contract.
    #[arg(
        long,
        short,
        help = "The address of the dispute game factory contract.",
        env = "OP_CHALLENGER_DGF"
    )]
    dispute_game_factory: Address,

    /// The game type of the ZK fault dispute games to play.
    #[arg(
        long,
        help = "The game type of the ZK fault dispute games to play.",
        env = "OP_CHALLENGER_GAME_TYPE"
    )]
    game_type: u32,

    /// The interval between two ticks of every game, in seconds.
    #[arg(
        long,
        help = "The interval between two ticks of every game, in seconds.",
        default_value_t = 12,
        env = "OP_CHALLENGER_POLL_INTERVAL"
    )]
    poll_interval: u64,

    /// How far back to look for in progress games at startup, in seconds.
    #[arg(
        long,
        help = "How far back to look for in progress games at startup, in seconds.",
        default_value_t = 28 * 24 * 60 * 60,
        env = "OP_CHALLENGER_GAME_WINDOW"
    )]
    game_window: u64,

    /// The number of output roots cached per game.
    #[arg(
        long,
        help = "The number of output roots cached per game.",
        default_value_t = DEFAULT_OUTPUT_CACHE_SIZE,
        env = "OP_CHALLENGER_OUTPUT_CACHE_SIZE"
    )]
    output_cache_size: usize,

    /// The number of L2 blocks between two claims, for games that do not report it.
    #[arg(
        long,
        help = "The number of L2 blocks between two claims, for games that do not report it.",
        default_value_t = 3,
        env = "OP_CHALLENGER_BLOCK_DISTANCE"
    )]
    block_distance: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse the command arguments
    let Args {
        v,
        l1_ws_endpoint,
        trusted_op_node_endpoint,
        signer_key,
        dispute_game_factory,
        game_type,
        poll_interval,
        game_window,
        output_cache_size,
        block_distance,
    } = Args::parse();

    // Initialize the tracing subscriber
    init_tracing_subscriber(v)?;

    if poll_interval == 0 {
        return Err(
            ChallengerError::InvalidConfig("poll interval must be non-zero".to_string()).into(),
        );
    }
    if output_cache_size == 0 || block_distance == 0 {
        return Err(ChallengerError::InvalidConfig(
            "output cache size and block distance must be non-zero".to_string(),
        )
        .into());
    }

    // Connect to the L1 websocket endpoint and attach the signer.
    tracing::debug!(target: "op-challenger-cli", "Connecting to websocket endpoint...");
    let provider = Provider::<Ws>::connect(&l1_ws_endpoint).await?;
    let chain_id = provider.get_chainid().await?;
    let wallet = signer_key
        .parse::<LocalWallet>()?
        .with_chain_id(chain_id.as_u64());
    tracing::info!(target: "op-challenger-cli", "Websocket connected @ {}, signing as {:?}", &l1_ws_endpoint, wallet.address());
    let l1_provider = Arc::new(SignerMiddleware::new(provider, wallet));
    let node_provider = Arc::new(Provider::<Http>::try_from(trusted_op_node_endpoint.as_str())?);

    // Stop every driver on ctrl-c.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!(target: "op-challenger-cli", "Received shutdown signal, stopping drivers...");
                cancel.cancel();
            }
        });
    }

    // Create the driver config.
    let driver_config = Arc::new(DriverConfig::new(
        l1_provider,
        node_provider,
        dispute_game_factory,
        GameSettings {
            game_type,
            poll_interval: Duration::from_secs(poll_interval),
            game_window: Duration::from_secs(game_window),
            output_cache_size,
            default_block_distance: block_distance,
        },
        cancel,
    ));
    tracing::info!(target: "op-challenger-cli", "Driver config created successfully.");

    // Start the driver loops.
    tokio::try_join!(
        TxDispatchDriver::new(Arc::clone(&driver_config)).start_loop(),
        DisputeFactoryDriver::new(Arc::clone(&driver_config)).start_loop(),
        GamePollingDriver::new(driver_config).start_loop()
    )?;

    Ok(())
}

/// Initializes the tracing subscriber
///
/// # Arguments
/// * `verbosity_level` - The verbosity level (0-4)
///
/// # Returns
/// * `Result<()>` - Ok if successful, Err otherwise.
fn init_tracing_subscriber(verbosity_level: u8) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(match verbosity_level {
            0 => Level::ERROR,
            1 => Level::WARN,
            2 => Level::INFO,
            3 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).map_err(|e| anyhow!(e))
}
