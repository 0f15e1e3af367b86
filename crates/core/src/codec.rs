//! Compact binary buffers for geometry payloads.
//!
//! Polygon sets: `[u32 polygons]` then per polygon `[u32 rings]`
//! (exterior first) and per ring `[u32 points][f64 x, f64 y]*`.
//! Vertex buffers: `[u32 floats][f32]*`. All integers and floats are
//! little-endian. Buffers travel inside JSON payloads as base64 strings.

use crate::geometry::PolygonSet;
use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::Value;

/// Errors decoding a geometry buffer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// The buffer ended before the declared content.
    #[error("buffer truncated at byte {offset}: {needed} more bytes needed")]
    Truncated { offset: usize, needed: usize },
    /// Bytes remain after the declared content.
    #[error("{0} trailing bytes after payload")]
    Trailing(usize),
    /// A polygon declared zero rings.
    #[error("polygon {0} has no exterior ring")]
    EmptyPolygon(u32),
    /// The JSON value is not a base64 string.
    #[error("expected a base64 string")]
    NotEncoded,
    /// The base64 text is malformed.
    #[error("invalid base64: {0}")]
    Base64(String),
}

/// Encode a polygon set.
pub fn encode_polygons(set: &PolygonSet) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u32_le(set.0.len() as u32);
    for polygon in set {
        buf.put_u32_le(1 + polygon.interiors().len() as u32);
        put_ring(&mut buf, polygon.exterior());
        for ring in polygon.interiors() {
            put_ring(&mut buf, ring);
        }
    }
    buf.freeze()
}

fn put_ring(buf: &mut BytesMut, ring: &LineString<f64>) {
    buf.put_u32_le(ring.0.len() as u32);
    for c in &ring.0 {
        buf.put_f64_le(c.x);
        buf.put_f64_le(c.y);
    }
}

/// Decode a polygon set produced by [`encode_polygons`].
pub fn decode_polygons(data: &[u8]) -> Result<PolygonSet, CodecError> {
    let mut reader = Reader::new(data);
    let count = reader.u32()?;
    let mut polygons = Vec::new();
    for index in 0..count {
        let rings = reader.u32()?;
        if rings == 0 {
            return Err(CodecError::EmptyPolygon(index));
        }
        let exterior = reader.ring()?;
        let mut interiors = Vec::new();
        for _ in 1..rings {
            interiors.push(reader.ring()?);
        }
        polygons.push(Polygon::new(exterior, interiors));
    }
    reader.finish()?;
    Ok(MultiPolygon::new(polygons))
}

/// Encode a flat `f32` vertex buffer.
pub fn encode_vertices(vertices: &[f32]) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + vertices.len() * 4);
    buf.put_u32_le(vertices.len() as u32);
    for v in vertices {
        buf.put_f32_le(*v);
    }
    buf.freeze()
}

/// Decode a vertex buffer produced by [`encode_vertices`].
pub fn decode_vertices(data: &[u8]) -> Result<Vec<f32>, CodecError> {
    let mut reader = Reader::new(data);
    let count = reader.u32()? as usize;
    reader.need(count.saturating_mul(4))?;
    let mut vertices = Vec::with_capacity(count);
    for _ in 0..count {
        vertices.push(reader.buf.get_f32_le());
    }
    reader.finish()?;
    Ok(vertices)
}

/// Wrap a polygon set as a JSON value (a base64 string).
pub fn polygons_to_value(set: &PolygonSet) -> Value {
    Value::String(STANDARD.encode(encode_polygons(set)))
}

/// Read a polygon set stored by [`polygons_to_value`].
pub fn polygons_from_value(value: &Value) -> Result<PolygonSet, CodecError> {
    let text = value.as_str().ok_or(CodecError::NotEncoded)?;
    let raw = STANDARD
        .decode(text)
        .map_err(|e| CodecError::Base64(e.to_string()))?;
    decode_polygons(&raw)
}

struct Reader<'a> {
    buf: &'a [u8],
    total: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            total: buf.len(),
        }
    }

    fn need(&self, n: usize) -> Result<(), CodecError> {
        let remaining = self.buf.remaining();
        if remaining < n {
            return Err(CodecError::Truncated {
                offset: self.total - remaining,
                needed: n - remaining,
            });
        }
        Ok(())
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    fn ring(&mut self) -> Result<LineString<f64>, CodecError> {
        let points = self.u32()? as usize;
        self.need(points.saturating_mul(16))?;
        let mut coords = Vec::with_capacity(points);
        for _ in 0..points {
            let x = self.buf.get_f64_le();
            let y = self.buf.get_f64_le();
            coords.push(Coord { x, y });
        }
        Ok(LineString::new(coords))
    }

    fn finish(self) -> Result<(), CodecError> {
        match self.buf.remaining() {
            0 => Ok(()),
            n => Err(CodecError::Trailing(n)),
        }
    }
}

/// Serde adapter storing [`Bytes`] as a base64 string.
pub mod b64 {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    /// Serialize bytes as base64 text.
    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    /// Deserialize base64 text into bytes.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text)
            .map(Bytes::from)
            .map_err(D::Error::custom)
    }
}
