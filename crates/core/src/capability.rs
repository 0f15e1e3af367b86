//! The closed set of capabilities a worker can serve.

use compact_str::CompactString;
use std::{fmt, str::FromStr};

/// A named capability. The string form is the wire contract between
/// orchestrator call sites and worker registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    /// Cache a widget's mesh on the worker.
    WidgetLoad,
    /// Drop one widget from the worker cache.
    WidgetRemove,
    /// Drop every widget from the worker cache.
    WidgetsClear,
    /// Compute outline traces for a set of widgets.
    TraceCompute,
    /// Invalidate cached traces.
    TraceClear,
    /// Compute support footprints for a set of widgets.
    SupportCompute,
    /// Invalidate cached supports.
    SupportClear,
    /// Union a polygon set (minion capability).
    PolygonUnion,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Capability; 8] = [
        Capability::WidgetLoad,
        Capability::WidgetRemove,
        Capability::WidgetsClear,
        Capability::TraceCompute,
        Capability::TraceClear,
        Capability::SupportCompute,
        Capability::SupportClear,
        Capability::PolygonUnion,
    ];

    /// Wire name, `<domain>_<verb>`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WidgetLoad => "widget_load",
            Self::WidgetRemove => "widget_remove",
            Self::WidgetsClear => "widgets_clear",
            Self::TraceCompute => "trace_compute",
            Self::TraceClear => "trace_clear",
            Self::SupportCompute => "support_compute",
            Self::SupportClear => "support_clear",
            Self::PolygonUnion => "polygon_union",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|cap| cap.as_str() == s)
            .ok_or_else(|| UnknownCapability(s.into()))
    }
}

impl From<Capability> for CompactString {
    fn from(cap: Capability) -> Self {
        CompactString::from(cap.as_str())
    }
}

/// A name that is not part of the capability set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown capability: {0}")]
pub struct UnknownCapability(pub CompactString);
