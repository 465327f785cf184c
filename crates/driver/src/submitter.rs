//! The submitter module contains the [ChannelSubmitter], which hands game transactions to the
//! [TxDispatchDriver](crate::TxDispatchDriver).

use crate::{bindings::ZkFaultDisputeGame, traits::ChallengeSubmitter, types::TxRequest};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use ethers::{
    providers::Middleware,
    types::{transaction::eip2718::TypedTransaction, Address, U256},
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// The [ChannelSubmitter] builds `challengeBySignal`, `resolveClaim` and `resolve` transactions
/// and waits until the dispatch loop reports them mined. A transaction only counts as submitted
/// once its receipt is in, so the next tick observes its effect.
#[derive(Debug)]
pub struct ChannelSubmitter<M> {
    provider: Arc<M>,
    tx_sender: mpsc::Sender<TxRequest>,
}

impl<M: Middleware + 'static> ChannelSubmitter<M> {
    /// Creates a new [ChannelSubmitter].
    pub fn new(provider: Arc<M>, tx_sender: mpsc::Sender<TxRequest>) -> Self {
        Self {
            provider,
            tx_sender,
        }
    }

    fn game(&self, game: Address) -> ZkFaultDisputeGame<M> {
        ZkFaultDisputeGame::new(game, Arc::clone(&self.provider))
    }

    /// Hands `tx` to the dispatch loop and waits for a successful receipt.
    async fn send_and_wait(&self, tx: TypedTransaction, what: &str) -> Result<()> {
        let (ack, receipt) = oneshot::channel();
        self.tx_sender
            .send(TxRequest { tx, ack })
            .await
            .map_err(|_| anyhow!("transaction dispatch loop has stopped"))?;
        let receipt = receipt
            .await
            .map_err(|_| anyhow!("transaction dispatch loop dropped the {} transaction", what))??;

        if receipt.status != Some(1u64.into()) {
            bail!(
                "{} transaction {:?} reverted",
                what,
                receipt.transaction_hash
            );
        }
        tracing::info!(
            target: "zk-submitter",
            tx_hash = ?receipt.transaction_hash,
            "{} transaction landed",
            what
        );
        Ok(())
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChallengeSubmitter for ChannelSubmitter<M> {
    async fn submit_challenge(&self, game: Address, index: u64) -> Result<()> {
        let contract = self.game(game);
        let bond = contract
            .challenger_bond()
            .call()
            .await
            .context("failed to retrieve required challenger bond")?;
        let tx = contract.challenge_by_signal(U256::from(index)).value(bond).tx;

        tracing::info!(target: "zk-submitter", game = ?game, index, %bond, "Submitting challenge");
        self.send_and_wait(tx, "challenge").await
    }

    async fn submit_resolve_claim(&self, game: Address) -> Result<()> {
        let tx = self.game(game).resolve_claim().tx;

        tracing::info!(target: "zk-submitter", game = ?game, "Submitting resolveClaim");
        self.send_and_wait(tx, "resolveClaim").await
    }

    async fn submit_resolve(&self, game: Address) -> Result<()> {
        let tx = self.game(game).resolve().tx;

        tracing::info!(target: "zk-submitter", game = ?game, "Submitting resolve");
        self.send_and_wait(tx, "resolve").await
    }
}
