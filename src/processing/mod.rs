//! Tool Pipeline
//!
//! Stream endpoints and the runner that executes one subcommand.

pub mod endpoint;
pub mod runner;

pub use endpoint::{Endpoint, STD_STREAM};
pub use runner::ToolRunner;
