use ethers::{
    prelude::{k256::ecdsa::SigningKey, SignerMiddleware},
    providers::{Provider, Ws},
    signers::Wallet,
    types::{transaction::eip2718::TypedTransaction, TransactionReceipt, H256},
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// The [SignerMiddlewareWS] type is the L1 provider used to index events and send transactions.
pub type SignerMiddlewareWS = SignerMiddleware<Provider<Ws>, Wallet<SigningKey>>;

/// A [TxRequest] asks the [TxDispatchDriver](crate::TxDispatchDriver) to send a transaction and
/// report back once it is mined.
#[derive(Debug)]
pub struct TxRequest {
    /// The unsigned transaction.
    pub tx: TypedTransaction,
    /// Receives the receipt of the mined transaction, or the reason it was not mined.
    pub ack: oneshot::Sender<anyhow::Result<TransactionReceipt>>,
}

/// A reference to an L1 block, as reported by the rollup node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1BlockRef {
    pub hash: H256,
    pub number: u64,
    pub parent_hash: H256,
    pub timestamp: u64,
}

/// The subset of the rollup node's `optimism_syncStatus` response the challenger relies on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// The L1 block the derivation pipeline is currently processing.
    pub current_l1: L1BlockRef,
    /// The latest L1 block known to the rollup node.
    pub head_l1: L1BlockRef,
}
