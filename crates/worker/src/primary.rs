//! The primary worker: widget cache plus trace and support capabilities.
//!
//! Every capability that names widgets checks all of them against the
//! cache before doing any work and fails if one is missing. Geometry is
//! never computed for a widget the worker does not hold.

use crate::{
    cache::{CacheError, WidgetCache},
    dispatcher::{Dispatcher, Endpoint},
    kernel::Kernel,
    minion::{MinionError, MinionPool},
    responder::{Deferred, Responder},
};
use anyhow::{Context, Result};
use geo::{Area, MultiPolygon, Polygon};
use mcore::{
    Capability, Mesh, PolygonSet, codec,
    config::{FailurePolicy, UnionConfig},
    geometry,
    payload::{
        Delta, DeltaBatch, LoadWidget, SUPPORTS, Selection, SupportSettings, TRACES,
        TraceSettings, WidgetRef,
    },
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;

/// State owned by the primary worker thread.
pub struct Primary {
    pub cache: WidgetCache,
    kernel: Arc<dyn Kernel>,
    minions: Option<MinionPool>,
    union: UnionConfig,
}

impl Primary {
    pub fn new(kernel: Arc<dyn Kernel>, minions: Option<MinionPool>, union: UnionConfig) -> Self {
        Self {
            cache: WidgetCache::default(),
            kernel,
            minions,
            union,
        }
    }
}

/// Bind every primary capability.
pub fn bind(dispatcher: &mut Dispatcher<Primary>) {
    dispatcher
        .bind(Capability::WidgetLoad, Endpoint::sync(widget_load))
        .bind(Capability::WidgetRemove, Endpoint::sync(widget_remove))
        .bind(Capability::WidgetsClear, Endpoint::sync(widgets_clear))
        .bind(Capability::TraceCompute, Endpoint::sync(trace_compute))
        .bind(
            Capability::TraceClear,
            Endpoint::sync(|state, data, _| clear_feature(state, data, TRACES)),
        )
        .bind(
            Capability::SupportCompute,
            Endpoint::deferred(support_compute),
        )
        .bind(
            Capability::SupportClear,
            Endpoint::sync(|state, data, _| clear_feature(state, data, SUPPORTS)),
        );
}

fn parse<T: DeserializeOwned>(data: Value, capability: Capability) -> Result<T> {
    serde_json::from_value(data).with_context(|| format!("malformed {capability} payload"))
}

fn widget_load(state: &mut Primary, data: Value, _: &Responder) -> Result<Value> {
    let LoadWidget { id, vertices } = parse(data, Capability::WidgetLoad)?;
    let mesh = Mesh::new(codec::decode_vertices(&vertices)?)
        .with_context(|| format!("widget {id} has an unusable mesh"))?;
    let triangles = mesh.triangle_count();
    if state.cache.load(id, mesh) {
        tracing::debug!("widget {id} reloaded, derived state reset");
    }
    Ok(json!({ "id": id, "triangles": triangles }))
}

fn widget_remove(state: &mut Primary, data: Value, _: &Responder) -> Result<Value> {
    let WidgetRef { id } = parse(data, Capability::WidgetRemove)?;
    let removed = state.cache.remove(id);
    Ok(json!({ "id": id, "removed": removed }))
}

fn widgets_clear(state: &mut Primary, _: Value, _: &Responder) -> Result<Value> {
    let cleared = state.cache.clear();
    Ok(json!({ "cleared": cleared }))
}

/// Outline every selected widget.
///
/// Widgets with no usable outline, or one smaller than `min_area`, are
/// left out of the batch without failing the task.
fn trace_compute(state: &mut Primary, data: Value, responder: &Responder) -> Result<Value> {
    let Selection::<TraceSettings> { ids, settings } = parse(data, Capability::TraceCompute)?;
    state.cache.require_all(&ids)?;

    let total = ids.len();
    let mut batch = DeltaBatch::default();
    for (done, &id) in ids.iter().enumerate() {
        let outline = state
            .kernel
            .outline(state.cache.require(id)?.mesh(), &settings)
            .filter(|outline| outline.unsigned_area() >= settings.min_area);
        responder.progress(json!({ "id": id, "done": done + 1, "total": total }));

        let Some(outline) = outline else {
            tracing::debug!("widget {id}: no usable outline, excluded");
            continue;
        };
        let value = codec::polygons_to_value(&MultiPolygon::new(vec![outline]));
        state.cache.set_derived(id, TRACES, value.clone())?;
        batch.deltas.push(Delta::set(id, TRACES, value));
    }
    Ok(serde_json::to_value(batch)?)
}

fn clear_feature(state: &mut Primary, data: Value, feature: &str) -> Result<Value> {
    let Selection::<Value> { ids, .. } = serde_json::from_value(data)
        .with_context(|| format!("malformed clear payload for {feature}"))?;
    state.cache.require_all(&ids)?;

    let deltas = ids
        .into_iter()
        .map(|id| {
            state.cache.clear_derived(id, feature)?;
            Ok(Delta::cleared(id, feature))
        })
        .collect::<Result<Vec<_>, CacheError>>()?;
    Ok(serde_json::to_value(DeltaBatch { deltas })?)
}

/// Support footprints per widget, unioned through the minion pool.
///
/// Footprints are extracted on the worker thread, unioned in a spawned
/// future, and stored back on the worker thread. Widgets removed while
/// the union ran are left out of the batch.
fn support_compute(state: &mut Primary, data: Value, deferred: Deferred<Primary>) -> Result<()> {
    let Selection::<SupportSettings> { ids, settings } =
        parse(data, Capability::SupportCompute)?;
    state.cache.require_all(&ids)?;

    let min_area = settings.min_area.unwrap_or(state.union.min_area);
    let jobs = ids
        .iter()
        .map(|&id| {
            let mesh = state.cache.require(id)?.mesh();
            Ok((id, state.kernel.overhangs(mesh, &settings)))
        })
        .collect::<Result<Vec<_>, CacheError>>()?;
    let minions = state.minions.clone();
    let policy = state.union.on_failure;

    tokio::spawn(async move {
        let total = jobs.len();
        let mut merged = Vec::with_capacity(total);
        for (done, (id, footprints)) in jobs.into_iter().enumerate() {
            match union(minions.as_ref(), &footprints, min_area, policy).await {
                Ok(set) => merged.push((id, set)),
                Err(e) => {
                    deferred.error(format!("support union for widget {id} failed: {e}"));
                    return;
                }
            }
            deferred.progress(json!({ "id": id, "done": done + 1, "total": total }));
        }

        deferred.resume(move |state: &mut Primary| {
            let mut batch = DeltaBatch::default();
            for (id, set) in merged {
                if !state.cache.contains(id) {
                    tracing::debug!("widget {id} removed during support union, excluded");
                    continue;
                }
                let value = codec::polygons_to_value(&set);
                state.cache.set_derived(id, SUPPORTS, value.clone())?;
                batch.deltas.push(Delta::set(id, SUPPORTS, value));
            }
            Ok(serde_json::to_value(batch)?)
        });
    });
    Ok(())
}

async fn union(
    minions: Option<&MinionPool>,
    polygons: &[Polygon<f64>],
    min_area: f64,
    policy: FailurePolicy,
) -> Result<PolygonSet, MinionError> {
    let Some(pool) = minions else {
        return Ok(geometry::union(polygons.iter().cloned(), min_area));
    };
    match pool.union(polygons, min_area).await {
        Ok(set) => Ok(set),
        Err(e) if policy == FailurePolicy::Fallback => {
            tracing::warn!("minion union failed, retrying locally: {e}");
            Ok(geometry::union(polygons.iter().cloned(), min_area))
        }
        Err(e) => Err(e),
    }
}
