//! Interactive-side driver for a primary worker.

use crate::{error::DriverError, widget::Widget};
use mcore::{
    CallError, Capability, Client, Mesh, PolygonSet, WidgetId, codec,
    payload::{
        DeltaBatch, LoadWidget, SUPPORTS, Selection, SupportSettings, TRACES, TraceSettings,
        WidgetRef,
    },
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};

type Alert = Arc<dyn Fn(&DriverError) + Send + Sync>;

/// Owns the authoritative widget collection and keeps one worker's cache
/// in step with it.
///
/// Capability calls carry widget ids and settings only; meshes cross to
/// the worker once, on [`Orchestrator::load`]. Results come back as
/// deltas and are merged into the local mirror. A failed call fires the
/// alert hook once and leaves the mirror as it was.
pub struct Orchestrator {
    client: Client,
    widgets: Mutex<BTreeMap<WidgetId, Widget>>,
    alert: Alert,
}

impl Orchestrator {
    /// Drive the worker behind `client`. Failures are logged until a
    /// hook is installed with [`Orchestrator::with_alert`].
    pub fn new(client: Client) -> Self {
        Self {
            client,
            widgets: Mutex::new(BTreeMap::new()),
            alert: Arc::new(|e| tracing::error!("{e}")),
        }
    }

    /// Replace the user-visible failure hook.
    pub fn with_alert(mut self, alert: impl Fn(&DriverError) + Send + Sync + 'static) -> Self {
        self.alert = Arc::new(alert);
        self
    }

    /// The worker client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send a mesh to the worker and track the widget once the worker
    /// has cached it. Reloading an id resets its derived state.
    pub async fn load(&self, id: WidgetId, mesh: Mesh) -> Result<(), DriverError> {
        let payload = LoadWidget {
            id,
            vertices: codec::encode_vertices(mesh.vertices()),
        };
        let data = encode(Capability::WidgetLoad, &payload).map_err(|e| self.alert(e))?;
        self.request(Capability::WidgetLoad, data, |_| {}).await?;
        self.widgets.lock().insert(id, Widget::new(id, mesh));
        tracing::debug!("widget {id} loaded");
        Ok(())
    }

    /// Stop tracking a widget and drop it from the worker cache. Returns
    /// whether the mirror held it.
    pub async fn remove(&self, id: WidgetId) -> Result<bool, DriverError> {
        let removed = self.widgets.lock().remove(&id).is_some();
        let data = encode(Capability::WidgetRemove, &WidgetRef { id }).map_err(|e| self.alert(e))?;
        self.request(Capability::WidgetRemove, data, |_| {}).await?;
        Ok(removed)
    }

    /// Drop every widget, locally and on the worker.
    pub async fn clear(&self) -> Result<(), DriverError> {
        self.widgets.lock().clear();
        self.request(Capability::WidgetsClear, Value::Null, |_| {})
            .await
            .map(|_| ())
    }

    /// Run a widget capability over `ids` and merge the returned deltas.
    ///
    /// Returns the ids that were merged. Ids the worker left out of its
    /// reply, and deltas for widgets no longer tracked, leave the mirror
    /// untouched. On failure nothing is merged and nothing is retried.
    pub async fn invoke<S: Serialize>(
        &self,
        capability: Capability,
        settings: &S,
        ids: impl IntoIterator<Item = WidgetId>,
        on_progress: impl FnMut(Value),
    ) -> Result<Vec<WidgetId>, DriverError> {
        let selection = Selection {
            ids: ids.into_iter().collect(),
            settings,
        };
        let data = encode(capability, &selection).map_err(|e| self.alert(e))?;
        let reply = self.request(capability, data, on_progress).await?;
        // Decode the whole batch before touching the mirror.
        let batch: DeltaBatch = serde_json::from_value(reply)
            .map_err(|source| self.alert(DriverError::Payload { capability, source }))?;
        Ok(self.merge(batch))
    }

    /// Compute outline traces.
    pub async fn compute_traces(
        &self,
        settings: &TraceSettings,
        ids: impl IntoIterator<Item = WidgetId>,
        on_progress: impl FnMut(Value),
    ) -> Result<Vec<WidgetId>, DriverError> {
        self.invoke(Capability::TraceCompute, settings, ids, on_progress)
            .await
    }

    /// Drop cached traces.
    pub async fn clear_traces(
        &self,
        ids: impl IntoIterator<Item = WidgetId>,
    ) -> Result<Vec<WidgetId>, DriverError> {
        self.invoke(Capability::TraceClear, &(), ids, |_| {}).await
    }

    /// Compute support footprints.
    pub async fn compute_supports(
        &self,
        settings: &SupportSettings,
        ids: impl IntoIterator<Item = WidgetId>,
        on_progress: impl FnMut(Value),
    ) -> Result<Vec<WidgetId>, DriverError> {
        self.invoke(Capability::SupportCompute, settings, ids, on_progress)
            .await
    }

    /// Drop cached supports.
    pub async fn clear_supports(
        &self,
        ids: impl IntoIterator<Item = WidgetId>,
    ) -> Result<Vec<WidgetId>, DriverError> {
        self.invoke(Capability::SupportClear, &(), ids, |_| {}).await
    }

    /// A snapshot of one tracked widget.
    pub fn widget(&self, id: WidgetId) -> Option<Widget> {
        self.widgets.lock().get(&id).cloned()
    }

    /// Ids of every tracked widget.
    pub fn ids(&self) -> Vec<WidgetId> {
        self.widgets.lock().keys().copied().collect()
    }

    /// Decode a polygon feature such as [`TRACES`] or [`SUPPORTS`].
    /// `Ok(None)` when the widget has no such feature.
    pub fn polygons(&self, id: WidgetId, feature: &str) -> Result<Option<PolygonSet>, DriverError> {
        let widgets = self.widgets.lock();
        let widget = widgets.get(&id).ok_or(DriverError::Unknown(id))?;
        Ok(widget
            .derived(feature)
            .map(codec::polygons_from_value)
            .transpose()?)
    }

    /// Traces of one widget.
    pub fn traces(&self, id: WidgetId) -> Result<Option<PolygonSet>, DriverError> {
        self.polygons(id, TRACES)
    }

    /// Supports of one widget.
    pub fn supports(&self, id: WidgetId) -> Result<Option<PolygonSet>, DriverError> {
        self.polygons(id, SUPPORTS)
    }

    fn merge(&self, batch: DeltaBatch) -> Vec<WidgetId> {
        let mut widgets = self.widgets.lock();
        batch
            .deltas
            .into_iter()
            .filter_map(|delta| {
                let Some(widget) = widgets.get_mut(&delta.id) else {
                    tracing::debug!("delta for untracked widget {} skipped", delta.id);
                    return None;
                };
                widget.merge(delta.state);
                Some(delta.id)
            })
            .collect()
    }

    async fn request(
        &self,
        capability: Capability,
        data: Value,
        on_progress: impl FnMut(Value),
    ) -> Result<Value, DriverError> {
        let outcome = match self.client.call(capability, data) {
            Ok(call) => call.settle(on_progress).await,
            Err(e) => Err(e),
        };
        outcome.map_err(|e| {
            self.alert(match e {
                CallError::Remote(message) => DriverError::Remote {
                    capability,
                    message,
                },
                CallError::Disconnected => DriverError::Disconnected,
            })
        })
    }

    fn alert(&self, err: DriverError) -> DriverError {
        (self.alert)(&err);
        err
    }
}

fn encode(capability: Capability, payload: &impl Serialize) -> Result<Value, DriverError> {
    serde_json::to_value(payload).map_err(|source| DriverError::Payload { capability, source })
}
