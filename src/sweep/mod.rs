//! The sweep loop and its building blocks.

pub mod boundary;
pub mod deleter;
pub mod fetcher;
pub mod orchestrator;
pub mod protect;
pub mod rate_limit;
pub mod stats;

pub use orchestrator::{Orchestrator, RunContext, RunState, SweepSettings};
pub use protect::ProtectSet;
pub use rate_limit::{Pause, RetryPolicy, TokioPause};
pub use stats::SweepStats;
