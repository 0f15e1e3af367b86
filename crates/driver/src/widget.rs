use compact_str::CompactString;
use mcore::{Mesh, WidgetId};
use serde_json::Value;
use std::collections::BTreeMap;

/// A loaded widget as the orchestrator sees it.
#[derive(Debug, Clone)]
pub struct Widget {
    id: WidgetId,
    mesh: Mesh,
    derived: BTreeMap<CompactString, Value>,
}

impl Widget {
    pub(crate) fn new(id: WidgetId, mesh: Mesh) -> Self {
        Self {
            id,
            mesh,
            derived: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> WidgetId {
        self.id
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// A derived feature merged from the worker.
    pub fn derived(&self, feature: &str) -> Option<&Value> {
        self.derived.get(feature)
    }

    /// Names of the derived features present.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.derived.keys().map(CompactString::as_str)
    }

    /// Apply one delta's state. `Null` deletes the feature.
    pub(crate) fn merge(&mut self, state: BTreeMap<CompactString, Value>) {
        for (feature, value) in state {
            if value.is_null() {
                self.derived.remove(&feature);
            } else {
                self.derived.insert(feature, value);
            }
        }
    }
}
