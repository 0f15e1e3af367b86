//! Minion workers for parallel polygon union.
//!
//! Minions are stateless: each serves only `polygon_union`, taking a
//! polygon set and returning its union. The pool splits a large union
//! into chunks, fans them out across its members and merges the partial
//! results locally.

use crate::{
    dispatcher::{Dispatcher, Endpoint},
    host,
};
use anyhow::{Context, Result};
use futures_util::{StreamExt, stream::FuturesUnordered};
use geo::{MultiPolygon, Polygon};
use mcore::{
    CallError, Capability, Client, PolygonSet,
    codec::{self, CodecError},
    geometry,
    payload::{UnionReply, UnionRequest},
};
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};

/// Why a pooled union failed.
#[derive(Debug, thiserror::Error)]
pub enum MinionError {
    /// A minion answered one chunk with an error.
    #[error("union subtask {index} failed: {message}")]
    Subtask { index: usize, message: String },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("malformed union payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("minion disconnected")]
    Disconnected,
}

/// Bind the minion endpoint.
pub fn bind(dispatcher: &mut Dispatcher<()>) {
    dispatcher.bind(
        Capability::PolygonUnion,
        Endpoint::sync(|_, data, _| polygon_union(data)),
    );
}

fn polygon_union(data: Value) -> Result<Value> {
    let request: UnionRequest =
        serde_json::from_value(data).context("malformed polygon_union payload")?;
    let set = codec::decode_polygons(&request.polygons)?;
    let merged = geometry::union(set, request.min_area);
    Ok(serde_json::to_value(UnionReply {
        polygons: codec::encode_polygons(&merged),
    })?)
}

/// A fixed set of minion workers.
#[derive(Clone)]
pub struct MinionPool {
    members: Arc<[Client]>,
    chunk: usize,
}

impl MinionPool {
    /// Start `count` minion threads. Must be called within a tokio runtime.
    pub fn spawn(count: usize, chunk: usize) -> Result<Self> {
        let members = (0..count)
            .map(|index| {
                let handle = host::spawn(&format!("meshwork-minion-{index}"), |dispatcher| {
                    bind(dispatcher);
                    Ok(())
                })?;
                Ok(handle.into_client())
            })
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!("started {count} minions");
        Ok(Self::from_clients(members, chunk))
    }

    /// A pool over already-running minions.
    pub fn from_clients(members: Vec<Client>, chunk: usize) -> Self {
        Self {
            members: members.into(),
            chunk: chunk.max(1),
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Union `polygons`, dropping result polygons under `min_area`.
    ///
    /// Chunk `i` goes to member `i % len`. Partial results are keyed by
    /// chunk index, then merged in one final local pass. Small inputs
    /// and empty pools are unioned locally.
    pub async fn union(
        &self,
        polygons: &[Polygon<f64>],
        min_area: f64,
    ) -> Result<PolygonSet, MinionError> {
        if self.members.is_empty() || polygons.len() <= self.chunk {
            return Ok(geometry::union(polygons.iter().cloned(), min_area));
        }

        let mut pending = FuturesUnordered::new();
        for (index, chunk) in polygons.chunks(self.chunk).enumerate() {
            let member = &self.members[index % self.members.len()];
            let request = UnionRequest {
                polygons: codec::encode_polygons(&MultiPolygon::new(chunk.to_vec())),
                min_area,
            };
            let call = member
                .call(Capability::PolygonUnion, serde_json::to_value(&request)?)
                .map_err(|_| MinionError::Disconnected)?;
            pending.push(async move { (index, call.settle(|_| {}).await) });
        }

        let mut partials = BTreeMap::new();
        while let Some((index, outcome)) = pending.next().await {
            let value = outcome.map_err(|e| match e {
                CallError::Remote(message) => MinionError::Subtask { index, message },
                CallError::Disconnected => MinionError::Disconnected,
            })?;
            let reply: UnionReply = serde_json::from_value(value)?;
            partials.insert(index, codec::decode_polygons(&reply.polygons)?);
        }
        tracing::trace!("merging {} partial unions", partials.len());

        Ok(geometry::union(partials.into_values().flatten(), min_area))
    }
}
