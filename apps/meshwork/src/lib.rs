//! Meshwork command line: run a worker over stdio, pack blocks, or walk
//! through a local orchestrator/worker round.

pub use cmd::{Cli, Command};

pub mod cmd;
