//! Meshwork orchestrator.
//!
//! The [`Orchestrator`] is the sending side of the task protocol. It owns
//! the authoritative widget collection, propagates load/remove/clear to
//! the worker cache, invokes capabilities by widget id and merges the
//! returned deltas into its mirror.

pub use {error::DriverError, orchestrator::Orchestrator, widget::Widget};

mod error;
mod orchestrator;
mod widget;
