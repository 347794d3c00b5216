//! diskpulse - concurrent block device exerciser
//!
//! diskpulse drives a fixed pool of worker threads against one block device
//! or file. Each worker repeatedly asks a shared scheduler for the next
//! read or write, performs it, optionally verifies the data byte for byte,
//! and reports completion into shared statistics.
//!
//! # Architecture
//!
//! - **Scheduler**: picks operation, transfer length and LBA under the ACTION lock
//! - **LBA lock registry**: serializes overlapping in-flight ranges across threads
//! - **Write bitmap**: tracks written blocks for write-once and compare runs
//! - **Worker**: seek/transfer/verify/complete state machine with retry policy
//! - **Stats**: heartbeat, cycle and global tiers with throughput reports
//! - **Device**: narrow open/seek/read/write/sync/close capability

pub mod config;
pub mod context;
pub mod coordinator;
pub mod device;
pub mod environment;
pub mod error;
pub mod output;
pub mod scheduler;
pub mod stats;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::TestConfig;
pub use context::RunContext;
pub use environment::TestEnvironment;
pub use error::ExerciserError;
pub use scheduler::{Action, Operation};

/// Result type used throughout diskpulse
pub type Result<T> = anyhow::Result<T>;
