//! The range module holds the [ClaimRange] and [ChallengeWindow] of a ZK fault dispute game.

use anyhow::{anyhow, Result};
use std::time::Duration;

/// The number of L2 blocks between two consecutive claims when a game does not report its own.
pub const DEFAULT_BLOCK_DISTANCE: u64 = 3;

/// The inclusive L2 block range covered by a game's claims, along with the stride between claim
/// positions. Claim `i` commits to the output root at `start_block + i * stride`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimRange {
    pub start_block: u64,
    pub end_block: u64,
    pub stride: u64,
}

impl ClaimRange {
    /// Creates a new [ClaimRange].
    ///
    /// ### Returns
    /// - `Err(anyhow::Error)`: The stride is zero or the range is inverted.
    pub fn new(start_block: u64, end_block: u64, stride: u64) -> Result<Self> {
        if stride == 0 {
            return Err(anyhow!("Claim stride must be non-zero"));
        }
        if start_block > end_block {
            return Err(anyhow!(
                "Invalid claim range: start block {} is after end block {}",
                start_block,
                end_block
            ));
        }
        Ok(Self {
            start_block,
            end_block,
            stride,
        })
    }

    /// Returns an iterator over every claimed block number, in ascending order.
    pub fn positions(&self) -> impl Iterator<Item = u64> {
        (self.start_block..=self.end_block).step_by(self.stride as usize)
    }

    /// Returns the number of claim positions within the range.
    pub fn position_count(&self) -> usize {
        ((self.end_block - self.start_block) / self.stride + 1) as usize
    }

    /// Returns the claim index that commits to `block_number`.
    pub fn target_index(&self, block_number: u64) -> u64 {
        block_number.saturating_sub(self.start_block) / self.stride
    }

    /// Returns the claim index of the game's end block, where the root claim lives.
    pub fn end_index(&self) -> u64 {
        self.target_index(self.end_block)
    }
}

/// The window after a game's creation during which a faulty claim can still be challenged, and
/// the point from which the game can be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeWindow {
    /// The UNIX timestamp of the game's creation.
    pub created_at: u64,
    /// How long after creation a fault may be signalled.
    pub max_detect_fault_duration: Duration,
    /// How long after creation the game's clock runs out.
    pub max_clock_duration: Duration,
}

impl ChallengeWindow {
    /// Returns the UNIX timestamp after which no challenge is accepted.
    pub fn deadline(&self) -> u64 {
        self.created_at
            .saturating_add(self.max_detect_fault_duration.as_secs())
    }

    /// Returns whether the window has closed at `now`.
    pub fn has_passed(&self, now: u64) -> bool {
        now > self.deadline()
    }

    /// Returns the UNIX timestamp from which the game may be resolved.
    pub fn resolvable_at(&self) -> u64 {
        self.created_at
            .saturating_add(self.max_clock_duration.as_secs())
    }

    /// Returns whether the game's clock has run out at `now`.
    pub fn is_resolvable(&self, now: u64) -> bool {
        now >= self.resolvable_at()
    }
}
