//! Executors for jobq.
//!
//! Implementations of the `jobq_core::Executor` trait. The queue treats
//! execution as fire-and-forget beyond capturing exit status and output.

pub mod shell;

pub use shell::ShellExecutor;
