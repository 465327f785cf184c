//! The types module contains the data model shared by the ZK dispute game solver and driver.

use ethers::{
    types::{Block, H256},
    utils::keccak256,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The [GameStatus] enum mirrors the `GameStatus` of an onchain dispute game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GameStatus {
    InProgress = 0,
    ChallengerWins = 1,
    DefenderWins = 2,
}

impl TryFrom<u8> for GameStatus {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GameStatus::InProgress),
            1 => Ok(GameStatus::ChallengerWins),
            2 => Ok(GameStatus::DefenderWins),
            _ => Err(anyhow::anyhow!("Invalid game status: {}", value)),
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::InProgress => write!(f, "In Progress"),
            GameStatus::ChallengerWins => write!(f, "Challenger Won"),
            GameStatus::DefenderWins => write!(f, "Defender Won"),
        }
    }
}

/// The L1 block a dispute game asserts its claims against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct L1Head {
    /// The hash of the L1 block.
    pub hash: H256,
    /// The number of the L1 block.
    pub number: u64,
}

impl<TX> TryFrom<&Block<TX>> for L1Head {
    type Error = anyhow::Error;

    fn try_from(block: &Block<TX>) -> Result<Self, Self::Error> {
        let hash = block
            .hash
            .ok_or(anyhow::anyhow!("L1 block is missing its hash"))?;
        let number = block
            .number
            .ok_or(anyhow::anyhow!("L1 block {:?} is missing its number", hash))?;
        Ok(Self {
            hash,
            number: number.as_u64(),
        })
    }
}

/// A reference to an L2 block, as returned by the rollup node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L2BlockRef {
    pub hash: H256,
    pub number: u64,
    pub parent_hash: H256,
    pub timestamp: u64,
}

/// The [OutputRootEntry] is the rollup node's answer to `optimism_outputAtBlock`. The
/// `output_root` commits to the full L2 state at `block_ref.number` and never changes once
/// the block is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRootEntry {
    pub version: H256,
    pub output_root: H256,
    pub block_ref: L2BlockRef,
    pub withdrawal_storage_root: H256,
    pub state_root: H256,
}

impl OutputRootEntry {
    /// Returns the L2 block number this entry commits to.
    pub fn block_number(&self) -> u64 {
        self.block_ref.number
    }
}

/// A version 0 L2 output, the preimage of an output root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OutputV0 {
    /// The state root of the L2 block.
    pub state_root: H256,
    /// The storage root of the `L2ToL1MessagePasser` predeploy.
    pub message_passer_storage_root: H256,
    /// The hash of the L2 block.
    pub block_hash: H256,
}

impl OutputV0 {
    /// Computes the output root: `keccak256(version ++ state_root ++ storage_root ++ block_hash)`.
    pub fn root(&self) -> H256 {
        let mut preimage = [0u8; 128];
        preimage[32..64].copy_from_slice(self.state_root.as_bytes());
        preimage[64..96].copy_from_slice(self.message_passer_storage_root.as_bytes());
        preimage[96..128].copy_from_slice(self.block_hash.as_bytes());
        H256::from(keccak256(preimage))
    }
}
