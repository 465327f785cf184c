//! The commitment module reproduces the onchain claims hash and locates the first faulty claim.

use anyhow::{anyhow, Result};
use ethers::{types::H256, utils::keccak256};

/// Computes the claims hash the ZK fault dispute game commits to: `keccak256(root_0 ++ ... ++ root_n)`.
///
/// The roots must be in ascending block order; any other order yields a different commitment.
pub fn claims_hash<'a>(roots: impl IntoIterator<Item = &'a H256>) -> H256 {
    let preimage = roots
        .into_iter()
        .flat_map(|root| root.as_bytes().iter().copied())
        .collect::<Vec<u8>>();
    H256::from(keccak256(preimage))
}

/// Finds the index of the first claim that differs from our locally computed output roots.
///
/// ### Takes
/// - `local`: The output roots computed from the trusted rollup node, in claim order.
/// - `claimed`: The output roots the game was created with, in claim order.
///
/// ### Returns
/// - `Ok(usize)`: The index of the first divergent claim.
/// - `Err(anyhow::Error)`: The sequences differ in length, or are identical.
pub fn locate_divergence(local: &[H256], claimed: &[H256]) -> Result<usize> {
    if local.len() != claimed.len() {
        return Err(anyhow!(
            "Claim count mismatch: computed {} output roots, game was created with {} claims",
            local.len(),
            claimed.len()
        ));
    }

    let index = local
        .iter()
        .zip(claimed)
        .position(|(ours, theirs)| ours != theirs)
        .ok_or(anyhow!("No divergent claim found"))?;
    tracing::trace!(target: "zk-solver", index, local = ?local[index], claimed = ?claimed[index], "Located divergent claim");
    Ok(index)
}
