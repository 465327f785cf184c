//! Data structures, types, and the decision logic for the ZK fault dispute game, where a proposer
//! commits to a strided sequence of L2 output roots and a challenger signals the first claim it
//! disagrees with.

mod types;
pub use types::{GameStatus, L1Head, L2BlockRef, OutputRootEntry, OutputV0};

mod range;
pub use range::{ChallengeWindow, ClaimRange, DEFAULT_BLOCK_DISTANCE};

mod commitment;
pub use commitment::{claims_hash, locate_divergence};

mod decision;
pub use decision::{Action, ChallengeDecision, Verdict};
