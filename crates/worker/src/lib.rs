//! Meshwork compute workers.
//!
//! A worker is a [`Dispatcher`] on its own thread, serving tasks from an
//! inbox one at a time. The primary worker caches widget meshes and
//! computes traces and supports; it unions support footprints through a
//! [`MinionPool`] of stateless minion workers.

pub use {
    cache::{CacheError, WidgetCache},
    dispatcher::{Dispatcher, Endpoint},
    host::{Link, WorkerHandle, launch, spawn},
    kernel::{Kernel, Planar},
    minion::{MinionError, MinionPool},
    primary::Primary,
    responder::{DROPPED_REPLY, Deferred, Responder},
};

use anyhow::Result;
use mcore::MeshworkConfig;
use std::{sync::Arc, thread::JoinHandle};

pub mod bridge;
pub mod cache;
pub mod dispatcher;
pub mod host;
pub mod kernel;
pub mod minion;
pub mod primary;
mod responder;

/// Thread name of the primary worker.
pub const PRIMARY: &str = "meshwork-primary";

/// Setup for a primary worker: starts the configured minions, binds the
/// primary capabilities and builds its state.
fn primary_setup(
    config: &MeshworkConfig,
    kernel: Arc<dyn Kernel>,
) -> impl FnOnce(&mut Dispatcher<Primary>) -> Result<Primary> + Send + 'static {
    let minions = config.worker.minions;
    let union = config.union.clone();
    move |dispatcher| {
        let pool = match minions {
            0 => None,
            count => Some(MinionPool::spawn(count, union.chunk)?),
        };
        primary::bind(dispatcher);
        Ok(Primary::new(kernel, pool, union))
    }
}

/// Start a primary worker with the [`Planar`] kernel.
///
/// Must be called within a tokio runtime.
pub fn spawn_primary(config: &MeshworkConfig) -> Result<WorkerHandle> {
    spawn_primary_with(config, Arc::new(Planar))
}

/// Start a primary worker with a custom kernel.
pub fn spawn_primary_with(config: &MeshworkConfig, kernel: Arc<dyn Kernel>) -> Result<WorkerHandle> {
    spawn(PRIMARY, primary_setup(config, kernel))
}

/// Start a primary worker and return its raw channels, for bridging.
pub fn launch_primary(config: &MeshworkConfig) -> Result<(Link, JoinHandle<()>)> {
    launch(PRIMARY, primary_setup(config, Arc::new(Planar)))
}
