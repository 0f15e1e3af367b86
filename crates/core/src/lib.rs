//! Core types shared by the meshwork orchestrator and its compute workers.
//!
//! A [`Task`] names a [`Capability`] and carries an opaque JSON payload.
//! Workers answer with [`Message`]s: capability announcements and
//! replies, each reply carrying one [`Response`]. The [`Client`] is the
//! sending side of that exchange.

pub use {
    capability::Capability,
    client::{Call, CallError, Client},
    config::MeshworkConfig,
    geometry::{Mesh, MeshError, PolygonSet},
    protocol::{Message, Response, Task, TaskId, WidgetId},
};

pub mod capability;
pub mod client;
pub mod codec;
pub mod config;
pub mod frame;
pub mod geometry;
pub mod payload;
pub mod protocol;
