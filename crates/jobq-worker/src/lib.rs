//! Worker process internals for jobq.
//!
//! A worker is a cancellable polling loop: each tick claims at most one
//! job via the store's atomic claim and runs it to completion, outcome
//! write-back included, before the next tick. Workers in separate
//! processes coordinate only through the claim.

pub mod cycle;
pub mod shutdown;
pub mod worker;

pub use cycle::ExecutionCycle;
pub use shutdown::install_shutdown_handler;
pub use worker::Worker;
