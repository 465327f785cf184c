//! The decision module turns the observations of a single agent tick into a [Verdict].

/// The [ChallengeDecision] holds everything the agent learned about a game during one tick.
/// It is recomputed from scratch every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChallengeDecision {
    /// Whether our recomputed commitment differs from the onchain one.
    pub claims_hash_mismatch: bool,
    /// The index of the first claim we believe to be faulty.
    pub target_index: u64,
    /// Whether `target_index` has already been challenged onchain.
    pub already_challenged: bool,
    /// Whether the challenge window of the game has closed.
    pub deadline_passed: bool,
}

/// The outcome of a [ChallengeDecision].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Our view of the game agrees with every claim.
    NoFault,
    /// The faulty claim at the given index has already been challenged.
    AlreadyChallenged(u64),
    /// The claim at the given index is faulty, but it can no longer be challenged.
    WindowMissed(u64),
    /// The claim at the given index is faulty and should be challenged now.
    Challenge(u64),
}

impl ChallengeDecision {
    /// A decision for a game whose claims all match our view.
    pub fn no_fault(deadline_passed: bool) -> Self {
        Self {
            deadline_passed,
            ..Default::default()
        }
    }

    /// Evaluates the decision. The double-challenge guard takes precedence over the deadline
    /// guard, so an already challenged claim never produces [Verdict::WindowMissed].
    pub fn verdict(&self) -> Verdict {
        if !self.claims_hash_mismatch {
            Verdict::NoFault
        } else if self.already_challenged {
            Verdict::AlreadyChallenged(self.target_index)
        } else if self.deadline_passed {
            Verdict::WindowMissed(self.target_index)
        } else {
            Verdict::Challenge(self.target_index)
        }
    }
}

/// An [Action] is a transaction the agent asks its player to send after a tick. A tick yields
/// its actions in the order they must be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Call `resolveClaim`, settling the outstanding challenges of the game.
    ResolveClaim,
    /// Call `resolve`, ending the game.
    Resolve,
    /// Signal a challenge against the claim at `index`.
    Challenge { index: u64 },
}
