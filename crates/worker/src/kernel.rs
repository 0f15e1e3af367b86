//! Geometry kernel behind the trace and support capabilities.
//!
//! The dispatch layer only needs outlines and overhang footprints; the
//! real slicing and toolpath code plugs in through [`Kernel`].

use geo::{Area, ConvexHull, Coord, LineString, MultiPoint, Point, Polygon};
use mcore::{
    Mesh,
    payload::{SupportSettings, TraceSettings},
};

/// Lowest projected triangle area treated as a real footprint.
const DEGENERATE_AREA: f64 = 1e-12;

/// Height above the bed below which a face is treated as resting on it.
const BED_EPSILON: f32 = 1e-4;

/// Mesh computations used by the primary worker's endpoints.
pub trait Kernel: Send + Sync {
    /// Outline of a widget seen from above. `None` when the mesh has no
    /// usable outline.
    fn outline(&self, mesh: &Mesh, settings: &TraceSettings) -> Option<Polygon<f64>>;

    /// Footprints of the faces that need support.
    fn overhangs(&self, mesh: &Mesh, settings: &SupportSettings) -> Vec<Polygon<f64>>;
}

/// Projection-based kernel.
///
/// The outline is the convex hull of the mesh projected onto XY. A face
/// overhangs when its normal points down within `angle` degrees of
/// vertical and it sits above the bed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Planar;

impl Kernel for Planar {
    fn outline(&self, mesh: &Mesh, _settings: &TraceSettings) -> Option<Polygon<f64>> {
        let points: MultiPoint<f64> = mesh
            .points()
            .map(|[x, y, _]| Point::new(f64::from(x), f64::from(y)))
            .collect();
        let hull = points.convex_hull();
        // A closed ring over three distinct points has four coordinates.
        if hull.exterior().0.len() < 4 || hull.unsigned_area() <= DEGENERATE_AREA {
            return None;
        }
        Some(hull)
    }

    fn overhangs(&self, mesh: &Mesh, settings: &SupportSettings) -> Vec<Polygon<f64>> {
        let threshold = -settings.angle.to_radians().cos();
        let floor = settings.bed as f32 + BED_EPSILON;

        mesh.triangles()
            .filter(|[a, b, c]| a[2].min(b[2]).min(c[2]) > floor)
            .filter(|tri| normal_z(tri).is_some_and(|z| z <= threshold))
            .filter_map(|[a, b, c]| {
                let ring: Vec<Coord<f64>> = [a, b, c]
                    .iter()
                    .map(|p| Coord {
                        x: f64::from(p[0]),
                        y: f64::from(p[1]),
                    })
                    .collect();
                let footprint = Polygon::new(LineString::new(ring), Vec::new());
                (footprint.unsigned_area() > DEGENERATE_AREA).then_some(footprint)
            })
            .collect()
    }
}

/// Z component of the unit normal, `None` for a degenerate triangle.
fn normal_z([a, b, c]: &[[f32; 3]; 3]) -> Option<f64> {
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]].map(f64::from);
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]].map(f64::from);
    let n = [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    (len > 0.0).then(|| n[2] / len)
}
