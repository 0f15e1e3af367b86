//! Worker-side widget cache.
//!
//! Holds each loaded widget's mesh and the derived results computed from
//! it. The orchestrator decides which widgets exist; the cache only
//! follows the load/remove/clear tasks it is sent.

use compact_str::CompactString;
use mcore::{Mesh, WidgetId};
use serde_json::Value;
use std::collections::BTreeMap;

/// Cache lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("widget {0} is not loaded on this worker")]
    Missing(WidgetId),
}

/// One cached widget.
#[derive(Debug, Clone)]
pub struct Entry {
    mesh: Mesh,
    derived: BTreeMap<CompactString, Value>,
}

impl Entry {
    /// The widget's mesh.
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// A derived feature, if computed.
    pub fn derived(&self, feature: &str) -> Option<&Value> {
        self.derived.get(feature)
    }

    /// Names of the derived features present.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.derived.keys().map(CompactString::as_str)
    }
}

/// Widgets held by one worker, keyed by id. Entries exist only between a
/// load and the matching remove or clear.
#[derive(Debug, Default)]
pub struct WidgetCache {
    entries: BTreeMap<WidgetId, Entry>,
}

impl WidgetCache {
    /// Insert a widget, replacing any previous entry and its derived state.
    /// Returns whether an entry was replaced.
    pub fn load(&mut self, id: WidgetId, mesh: Mesh) -> bool {
        let entry = Entry {
            mesh,
            derived: BTreeMap::new(),
        };
        self.entries.insert(id, entry).is_some()
    }

    /// Drop a widget. Returns whether it was present.
    pub fn remove(&mut self, id: WidgetId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Drop every widget. Returns how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Whether `id` is cached.
    pub fn contains(&self, id: WidgetId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of cached widgets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no widget is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry for `id`, or [`CacheError::Missing`].
    pub fn require(&self, id: WidgetId) -> Result<&Entry, CacheError> {
        self.entries.get(&id).ok_or(CacheError::Missing(id))
    }

    /// Check that every id is cached. Fails on the first missing one.
    pub fn require_all<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a WidgetId>,
    ) -> Result<(), CacheError> {
        ids.into_iter().try_for_each(|&id| self.require(id).map(|_| ()))
    }

    /// Store a derived feature.
    pub fn set_derived(
        &mut self,
        id: WidgetId,
        feature: &str,
        value: Value,
    ) -> Result<(), CacheError> {
        let entry = self.entries.get_mut(&id).ok_or(CacheError::Missing(id))?;
        entry.derived.insert(feature.into(), value);
        Ok(())
    }

    /// Delete a derived feature, returning the old value.
    pub fn clear_derived(&mut self, id: WidgetId, feature: &str) -> Result<Option<Value>, CacheError> {
        let entry = self.entries.get_mut(&id).ok_or(CacheError::Missing(id))?;
        Ok(entry.derived.remove(feature))
    }

    /// A derived feature of a cached widget.
    pub fn derived(&self, id: WidgetId, feature: &str) -> Option<&Value> {
        self.entries.get(&id)?.derived(feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mesh() -> Mesh {
        Mesh::cuboid([0.0, 0.0, 0.0], [1.0, 1.0, 1.0])
    }

    #[test]
    fn reload_resets_derived_state() {
        let mut cache = WidgetCache::default();
        assert!(!cache.load(1, mesh()));
        cache.set_derived(1, "traces", json!("abc")).unwrap();
        assert!(cache.load(1, mesh()));
        assert_eq!(cache.derived(1, "traces"), None);
    }

    #[test]
    fn missing_ids_fail_closed() {
        let mut cache = WidgetCache::default();
        cache.load(1, mesh());
        assert_eq!(cache.require_all(&[1, 2]), Err(CacheError::Missing(2)));
        assert_eq!(
            cache.set_derived(3, "traces", json!(1)),
            Err(CacheError::Missing(3))
        );
        assert!(cache.remove(1));
        assert!(cache.require(1).is_err());
    }

    #[test]
    fn clear_derived_keeps_other_features() {
        let mut cache = WidgetCache::default();
        cache.load(4, mesh());
        cache.set_derived(4, "traces", json!(1)).unwrap();
        cache.set_derived(4, "supports", json!(2)).unwrap();
        assert_eq!(cache.clear_derived(4, "traces").unwrap(), Some(json!(1)));
        let features: Vec<_> = cache.require(4).unwrap().features().collect();
        assert_eq!(features, vec!["supports"]);
        assert_eq!(cache.clear(), 1);
        assert!(cache.is_empty());
    }
}
