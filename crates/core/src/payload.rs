//! Typed payloads carried in task and reply `data`.

use crate::{codec::b64, protocol::WidgetId};
use bytes::Bytes;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Derived feature holding outline traces.
pub const TRACES: &str = "traces";

/// Derived feature holding support footprints.
pub const SUPPORTS: &str = "supports";

/// `widget_load`: the one time a mesh crosses to the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadWidget {
    pub id: WidgetId,
    /// Vertex buffer from [`crate::codec::encode_vertices`].
    #[serde(with = "b64")]
    pub vertices: Bytes,
}

/// `widget_remove`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WidgetRef {
    pub id: WidgetId,
}

/// A capability call over a set of cached widgets. Carries ids only,
/// never geometry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(bound(
    serialize = "S: Serialize",
    deserialize = "S: Deserialize<'de> + Default"
))]
pub struct Selection<S = Value> {
    pub ids: BTreeSet<WidgetId>,
    #[serde(default)]
    pub settings: S,
}

/// Settings for `trace_compute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceSettings {
    /// Outlines smaller than this are excluded.
    pub min_area: f64,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self { min_area: 0.0 }
    }
}

/// Settings for `support_compute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportSettings {
    /// Faces pointing down within this many degrees of vertical need support.
    pub angle: f64,
    /// Height of the print bed; faces resting on it need no support.
    pub bed: f64,
    /// Support regions smaller than this are dropped. `None` uses the
    /// worker's configured default.
    pub min_area: Option<f64>,
}

impl Default for SupportSettings {
    fn default() -> Self {
        Self {
            angle: 50.0,
            bed: 0.0,
            min_area: None,
        }
    }
}

/// Derived state for one widget. `Value::Null` marks a cleared feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub id: WidgetId,
    pub state: BTreeMap<CompactString, Value>,
}

impl Delta {
    /// A delta setting one feature.
    pub fn set(id: WidgetId, feature: &str, value: Value) -> Self {
        Self {
            id,
            state: BTreeMap::from([(feature.into(), value)]),
        }
    }

    /// A delta clearing one feature.
    pub fn cleared(id: WidgetId, feature: &str) -> Self {
        Self::set(id, feature, Value::Null)
    }
}

/// `Done` payload of every widget capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaBatch {
    pub deltas: Vec<Delta>,
}

/// `polygon_union` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionRequest {
    /// Polygon set from [`crate::codec::encode_polygons`].
    #[serde(with = "b64")]
    pub polygons: Bytes,
    #[serde(default)]
    pub min_area: f64,
}

/// `polygon_union` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionReply {
    #[serde(with = "b64")]
    pub polygons: Bytes,
}
