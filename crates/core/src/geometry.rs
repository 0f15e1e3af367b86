//! Meshes and polygon sets.
//!
//! Polygon booleans come from `geo`; this module only adds the
//! batch union used by workers and minions.

use geo::{Area, BooleanOps, MultiPolygon, Polygon};

/// A set of polygons with holes.
pub type PolygonSet = MultiPolygon<f64>;

/// A mesh that cannot be used.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    /// The vertex buffer does not hold whole triangles.
    #[error("vertex buffer of {len} floats is not a whole number of triangles")]
    Ragged { len: usize },
    /// A coordinate is NaN or infinite.
    #[error("vertex buffer holds a non-finite coordinate at {index}")]
    NonFinite { index: usize },
}

/// A triangle soup: flat `x, y, z` floats, nine per triangle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    vertices: Vec<f32>,
}

impl Mesh {
    /// Wrap a flat vertex buffer.
    pub fn new(vertices: Vec<f32>) -> Result<Self, MeshError> {
        if vertices.len() % 9 != 0 {
            return Err(MeshError::Ragged {
                len: vertices.len(),
            });
        }
        if let Some(index) = vertices.iter().position(|v| !v.is_finite()) {
            return Err(MeshError::NonFinite { index });
        }
        Ok(Self { vertices })
    }

    /// Axis-aligned box with outward-facing triangles.
    pub fn cuboid(origin: [f32; 3], size: [f32; 3]) -> Self {
        let [x0, y0, z0] = origin;
        let [x1, y1, z1] = [x0 + size[0], y0 + size[1], z0 + size[2]];
        let faces: [[[f32; 3]; 4]; 6] = [
            // bottom, top
            [[x0, y0, z0], [x0, y1, z0], [x1, y1, z0], [x1, y0, z0]],
            [[x0, y0, z1], [x1, y0, z1], [x1, y1, z1], [x0, y1, z1]],
            // -y, +y
            [[x0, y0, z0], [x1, y0, z0], [x1, y0, z1], [x0, y0, z1]],
            [[x0, y1, z0], [x0, y1, z1], [x1, y1, z1], [x1, y1, z0]],
            // -x, +x
            [[x0, y0, z0], [x0, y0, z1], [x0, y1, z1], [x0, y1, z0]],
            [[x1, y0, z0], [x1, y1, z0], [x1, y1, z1], [x1, y0, z1]],
        ];
        let mut vertices = Vec::with_capacity(6 * 2 * 9);
        for [a, b, c, d] in faces {
            for p in [a, b, c, a, c, d] {
                vertices.extend_from_slice(&p);
            }
        }
        Self { vertices }
    }

    /// The flat vertex buffer.
    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 9
    }

    /// Whether the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Iterate triangles as three `[x, y, z]` points.
    pub fn triangles(&self) -> impl Iterator<Item = [[f32; 3]; 3]> + '_ {
        self.vertices.chunks_exact(9).map(|t| {
            [
                [t[0], t[1], t[2]],
                [t[3], t[4], t[5]],
                [t[6], t[7], t[8]],
            ]
        })
    }

    /// Iterate every vertex.
    pub fn points(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.vertices.chunks_exact(3).map(|p| [p[0], p[1], p[2]])
    }
}

/// Union polygons into a minimal non-overlapping set, dropping result
/// polygons whose area is below `min_area`.
///
/// Merges pairwise in rounds so each boolean operation works on inputs
/// of similar size.
pub fn union(polygons: impl IntoIterator<Item = Polygon<f64>>, min_area: f64) -> PolygonSet {
    let mut layer: Vec<PolygonSet> = polygons
        .into_iter()
        .map(|p| MultiPolygon::new(vec![p]))
        .collect();

    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len().div_ceil(2));
        let mut iter = layer.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next.push(a.union(&b)),
                None => next.push(a),
            }
        }
        layer = next;
    }

    let merged = layer.pop().unwrap_or_else(|| MultiPolygon::new(Vec::new()));
    MultiPolygon::new(
        merged
            .into_iter()
            .filter(|p| p.unsigned_area() >= min_area)
            .collect(),
    )
}

/// Total unsigned area of a polygon set.
pub fn area(set: &PolygonSet) -> f64 {
    set.unsigned_area()
}
