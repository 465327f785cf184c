//! The state module holds the [GlobalState] struct, which owns every tracked game.

use crate::GamePlayer;
use ethers::types::Address;
use op_challenger_solvers::zk::GameStatus;
use std::{collections::HashSet, time::Duration};
use tokio::{task::JoinSet, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// The [GlobalState] struct runs one polling task per game that is still being played. Every game
/// ticks on its own interval, so a game whose reads never complete does not hold up the others.
pub struct GlobalState {
    /// The addresses of every game with a running task.
    tracked: HashSet<Address>,
    /// The per-game tasks. Each yields its game's address and final status.
    players: JoinSet<(Address, GameStatus)>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl GlobalState {
    /// Creates an empty [GlobalState] whose games tick every `poll_interval` until `cancel`
    /// fires.
    pub fn new(poll_interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            tracked: HashSet::new(),
            players: JoinSet::new(),
            poll_interval,
            cancel,
        }
    }

    /// Starts tracking `player`. Returns `false` if its game is already tracked or is not in
    /// progress.
    pub fn track(&mut self, mut player: GamePlayer) -> bool {
        let address = player.address();
        if player.status() != GameStatus::InProgress || !self.tracked.insert(address) {
            return false;
        }

        let cancel = self.cancel.clone();
        let poll_interval = self.poll_interval;
        self.players.spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let status = tokio::select! {
                    _ = cancel.cancelled() => break,
                    status = player.progress_game() => status,
                };
                if status != GameStatus::InProgress {
                    break;
                }
            }
            (address, player.status())
        });
        true
    }

    /// Returns whether the game at `address` is tracked.
    pub fn is_tracked(&self, address: Address) -> bool {
        self.tracked.contains(&address)
    }

    /// The number of tracked games.
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    /// Returns whether no game is tracked.
    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Waits for the next game to stop being played and stops tracking it. Returns [None] once
    /// no game is left.
    pub async fn join_next(&mut self) -> Option<(Address, GameStatus)> {
        while let Some(res) = self.players.join_next().await {
            match res {
                Ok((address, status)) => {
                    self.tracked.remove(&address);
                    return Some((address, status));
                }
                Err(e) => {
                    tracing::error!(target: "game-polling-driver", "Game task failed: {:?}", e)
                }
            }
        }
        None
    }
}
