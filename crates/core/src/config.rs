//! Meshwork configuration loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshworkConfig {
    /// Compute worker settings (`[worker]`).
    pub worker: WorkerConfig,
    /// Polygon union settings (`[union]`).
    pub union: UnionConfig,
    /// Packing defaults (`[pack]`).
    pub pack: PackConfig,
}

/// Compute worker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of minion workers; 0 disables the pool.
    pub minions: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { minions: 4 }
    }
}

/// Polygon union settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnionConfig {
    /// Polygons per minion subtask.
    pub chunk: usize,
    /// Default minimum area kept by support unions.
    pub min_area: f64,
    /// What to do when a minion subtask fails.
    pub on_failure: FailurePolicy,
}

impl Default for UnionConfig {
    fn default() -> Self {
        Self {
            chunk: 16,
            min_area: 0.01,
            on_failure: FailurePolicy::Fallback,
        }
    }
}

/// Policy applied when a minion subtask fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Redo the whole union on the primary worker.
    #[default]
    Fallback,
    /// Fail the capability.
    Fail,
}

/// Packing defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    /// Gap added to each block's width and height.
    pub spacing: f64,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self { spacing: 1.0 }
    }
}

impl MeshworkConfig {
    /// Parse a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        if config.union.chunk == 0 {
            anyhow::bail!("union.chunk must be at least 1");
        }
        Ok(config)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Render as pretty TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }
}
