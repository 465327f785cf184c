//! Game solvers for the `op-challenger`.
//!
//! Solvers are pure: they hold the local view of a dispute game and decide how to respond to it,
//! leaving all chain and node I/O to the driver.

pub mod zk;
