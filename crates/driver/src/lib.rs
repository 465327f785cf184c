#![doc = include_str!("../README.md")]

use anyhow::Result;
use async_trait::async_trait;

/// Contains the smart contract bindings used by the driver.
mod bindings;

/// Common types used by the driver.
mod types;
pub use types::*;

/// Contains the [ChallengerError] kinds callers branch on.
mod error;
pub use error::ChallengerError;

/// The interfaces of every collaborator of the game loop.
pub mod traits;
pub use traits::{Clock, SystemClock};

/// Contains the [RetryingSource] decorator.
mod retry;
pub use retry::{RetryConfig, RetryingSource};

/// Contains the [OutputRootCache].
mod cache;
pub use cache::{OutputRootCache, DEFAULT_OUTPUT_CACHE_SIZE};

/// Contains the [ChallengeAgent].
mod agent;
pub use agent::ChallengeAgent;

/// Contains the [GamePlayer].
mod player;
pub use player::{GamePlayer, PlayerConfig};

/// Contains the ethers-backed dispute game.
mod contracts;
pub use contracts::ZkFaultDisputeGameContract;

/// Contains the client of the trusted rollup node.
mod rollup;
pub use rollup::RollupNodeClient;

/// Contains the ethers-backed L1 and L2 sources.
mod providers;
pub use providers::{ChainProvider, MESSAGE_PASSER_ADDRESS};

/// Contains the [ChannelSubmitter].
mod submitter;
pub use submitter::ChannelSubmitter;

/// Contains the [DriverConfig] struct.
mod config;
pub use config::{DriverConfig, GameSettings};

/// Contains the [Driver] implementations.
mod drivers;
pub use drivers::*;

/// Contains the handlers for factory events.
mod handlers;

/// Contains the [GlobalState] struct.
mod state;
pub use state::GlobalState;

#[cfg(test)]
mod test_utils;

/// The [Driver] trait defines the interface for all driver loops that are ran by the `op-challenger` binary.
#[async_trait]
pub trait Driver {
    /// Starts the [Driver] loop.
    async fn start_loop(self) -> Result<()>;
}
