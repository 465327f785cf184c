//! The providers module contains the [ChainProvider], the ethers-backed [L1Source] and
//! [L2Source].

use crate::traits::{L1Source, L2Source};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ethers::{
    providers::Middleware,
    types::{
        Address, Block, BlockId, BlockNumber, Bytes, Transaction, TransactionReceipt, H160, H256,
        U64,
    },
};
use op_challenger_solvers::zk::OutputV0;
use std::sync::Arc;

/// The address of the `L2ToL1MessagePasser` predeploy, whose storage root is part of every output.
pub const MESSAGE_PASSER_ADDRESS: Address = H160([
    0x42, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x16,
]);

/// The key prefix of contract code in the node database.
const CODE_PREFIX: u8 = b'c';

/// The [ChainProvider] reads blocks, receipts and state from an execution node.
#[derive(Debug)]
pub struct ChainProvider<M> {
    provider: Arc<M>,
}

impl<M> Clone for ChainProvider<M> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<M: Middleware + 'static> ChainProvider<M> {
    /// Creates a new [ChainProvider].
    pub fn new(provider: Arc<M>) -> Self {
        Self { provider }
    }

    async fn header(&self, block_hash: H256) -> Result<Block<H256>> {
        self.provider
            .get_block(block_hash)
            .await
            .with_context(|| format!("failed to fetch block {:?}", block_hash))?
            .ok_or(anyhow!("block {:?} not found", block_hash))
    }

    async fn block_with_txs(&self, block_hash: H256) -> Result<Block<Transaction>> {
        self.provider
            .get_block_with_txs(block_hash)
            .await
            .with_context(|| format!("failed to fetch block {:?}", block_hash))?
            .ok_or(anyhow!("block {:?} not found", block_hash))
    }

    async fn db_get(&self, key: Bytes) -> Result<Bytes> {
        self.provider
            .provider()
            .request("debug_dbGet", [key.clone()])
            .await
            .with_context(|| format!("failed to fetch database key {}", key))
    }
}

#[async_trait]
impl<M: Middleware + 'static> L1Source for ChainProvider<M> {
    async fn info_by_hash(&self, block_hash: H256) -> Result<Block<H256>> {
        self.header(block_hash).await
    }

    async fn info_by_number(&self, number: u64) -> Result<Block<H256>> {
        self.provider
            .get_block(BlockId::Number(BlockNumber::Number(U64::from(number))))
            .await
            .with_context(|| format!("failed to fetch block #{}", number))?
            .ok_or(anyhow!("block #{} not found", number))
    }

    async fn info_and_txs_by_hash(&self, block_hash: H256) -> Result<Block<Transaction>> {
        self.block_with_txs(block_hash).await
    }

    async fn fetch_receipts(
        &self,
        block_hash: H256,
    ) -> Result<(Block<H256>, Vec<TransactionReceipt>)> {
        let header = self.header(block_hash).await?;
        let receipts: Vec<TransactionReceipt> = self
            .provider
            .provider()
            .request("eth_getBlockReceipts", [block_hash])
            .await
            .with_context(|| format!("failed to fetch receipts of block {:?}", block_hash))?;

        if let Some(receipt) = receipts
            .iter()
            .find(|receipt| receipt.block_hash != Some(block_hash))
        {
            return Err(anyhow!(
                "receipt {:?} does not belong to block {:?}",
                receipt.transaction_hash,
                block_hash
            ));
        }
        Ok((header, receipts))
    }
}

#[async_trait]
impl<M: Middleware + 'static> L2Source for ChainProvider<M> {
    async fn info_and_txs_by_hash(&self, block_hash: H256) -> Result<Block<Transaction>> {
        self.block_with_txs(block_hash).await
    }

    async fn node_by_hash(&self, hash: H256) -> Result<Bytes> {
        self.db_get(Bytes::from(hash.as_bytes().to_vec())).await
    }

    async fn code_by_hash(&self, hash: H256) -> Result<Bytes> {
        let mut key = Vec::with_capacity(33);
        key.push(CODE_PREFIX);
        key.extend_from_slice(hash.as_bytes());
        self.db_get(Bytes::from(key)).await
    }

    async fn output_by_root(&self, block_hash: H256) -> Result<OutputV0> {
        let header = self.header(block_hash).await?;
        let proof = self
            .provider
            .get_proof(
                MESSAGE_PASSER_ADDRESS,
                Vec::new(),
                Some(BlockId::Hash(block_hash)),
            )
            .await
            .with_context(|| format!("failed to fetch message passer proof at {:?}", block_hash))?;

        Ok(OutputV0 {
            state_root: header.state_root,
            message_passer_storage_root: proof.storage_hash,
            block_hash,
        })
    }
}
