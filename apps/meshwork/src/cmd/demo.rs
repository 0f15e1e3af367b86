//! `meshwork demo`: drive a local worker through a full round.

use anyhow::Result;
use driver::Orchestrator;
use mcore::{
    Mesh, MeshworkConfig, geometry,
    payload::{SupportSettings, TraceSettings},
};

/// A table: a slab on four legs. The slab's underside overhangs.
pub fn table(id: u64) -> Result<Mesh> {
    let x = id as f32 * 6.0;
    let parts = [
        Mesh::cuboid([x, 0.0, 2.0], [4.0, 4.0, 0.5]),
        Mesh::cuboid([x, 0.0, 0.0], [0.5, 0.5, 2.0]),
        Mesh::cuboid([x + 3.5, 0.0, 0.0], [0.5, 0.5, 2.0]),
        Mesh::cuboid([x, 3.5, 0.0], [0.5, 0.5, 2.0]),
        Mesh::cuboid([x + 3.5, 3.5, 0.0], [0.5, 0.5, 2.0]),
    ];
    let vertices = parts.iter().flat_map(|m| m.vertices()).copied().collect();
    Ok(Mesh::new(vertices)?)
}

pub async fn run(config: &MeshworkConfig, widgets: u64) -> Result<()> {
    let handle = worker::spawn_primary(config)?;
    let orchestrator = Orchestrator::new(handle.client().clone());

    for id in 1..=widgets {
        orchestrator.load(id, table(id)?).await?;
    }
    let ids = orchestrator.ids();

    let traced = orchestrator
        .compute_traces(&TraceSettings::default(), ids.clone(), |p| {
            tracing::debug!("traces: {p}")
        })
        .await?;
    let supported = orchestrator
        .compute_supports(&SupportSettings::default(), ids.clone(), |p| {
            tracing::debug!("supports: {p}")
        })
        .await?;

    for &id in &ids {
        let outline = orchestrator.traces(id)?.map(|s| geometry::area(&s));
        let supports = orchestrator.supports(id)?.map(|s| geometry::area(&s));
        println!(
            "widget {id}: outline {:.2}, supports {:.2}",
            outline.unwrap_or(0.0),
            supports.unwrap_or(0.0)
        );
    }
    println!(
        "{} widgets, {} traced, {} supported",
        ids.len(),
        traced.len(),
        supported.len()
    );

    drop(orchestrator);
    tokio::task::spawn_blocking(move || handle.join()).await??;
    Ok(())
}
