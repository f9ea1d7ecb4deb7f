//! Height field to renderable mesh conversion.
//!
//! Builds the vertex grid at an LOD-dependent stride, carves the valley
//! channel that keeps the playable corridor clear of hills, and
//! optionally explodes shared vertices for flat shading.

use serde::{Deserialize, Serialize};

use crate::heightfield::HeightField;
use crate::shade::{Color, ColorGradient, HeightCurve};

/// Shading and shaping inputs for mesh construction, supplied once at
/// setup by the embedding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshParams {
    /// Scales curve output into world-space elevation.
    pub height_multiplier: f32,
    /// Monotonic remap applied to normalized heights before scaling.
    pub height_curve: HeightCurve,
    /// Duplicate vertices per triangle so downstream normals are
    /// per-face instead of interpolated.
    pub flat_shaded: bool,
    /// Base elevation added to every vertex.
    pub y_offset: f32,
    /// Width of the carved channel, in sample columns. Zero disables
    /// the carve.
    pub valley_width: f32,
    /// Depth of the channel floor at its centre line.
    pub valley_height: f32,
    /// Per-vertex colouring, evaluated at the final vertex elevation.
    pub gradient: ColorGradient,
}

impl Default for MeshParams {
    fn default() -> Self {
        Self {
            height_multiplier: 30.0,
            height_curve: HeightCurve::identity(),
            flat_shaded: false,
            y_offset: 0.0,
            valley_width: 0.0,
            valley_height: 0.0,
            gradient: ColorGradient::grayscale(),
        }
    }
}

/// Parallel-array mesh value object. One instance per (chunk, LOD);
/// immutable after construction and consumed by the render collaborator.
///
/// Invariants: `positions`, `uvs`, and `colors` always have equal
/// length, and `triangles.len()` is always a multiple of 3.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub triangles: Vec<u32>,
    pub uvs: Vec<[f32; 2]>,
    pub colors: Vec<Color>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }
}

/// Sampling stride for an LOD index: level 0 keeps every sample, level
/// `k` keeps every `2k`-th.
#[inline]
pub fn stride_for_lod(lod: u32) -> usize {
    if lod == 0 { 1 } else { (lod * 2) as usize }
}

/// Vertices per mesh line at the given LOD.
#[inline]
pub fn verts_per_line(width: usize, lod: u32) -> usize {
    (width - 1) / stride_for_lod(lod) + 1
}

/// Build a mesh from a height field at the given LOD.
///
/// The grid is centred on the origin: `x' = top_left_x + x`,
/// `z' = top_left_z - z` with `top_left_x = -(width-1)/2` and
/// `top_left_z = (height-1)/2`. Columns inside the valley band get a
/// lowered offset `y_offset + |x - width/2| - valley_height`, deepest
/// at the centre line and rising toward the band edges.
pub fn build(field: &HeightField, params: &MeshParams, lod: u32) -> MeshData {
    assert!(
        field.width >= 2 && field.height >= 2,
        "mesh build requires at least a 2x2 height field"
    );

    let width = field.width;
    let height = field.height;
    let stride = stride_for_lod(lod);
    let vpl = verts_per_line(width, lod);
    let rows = (height - 1) / stride + 1;

    let top_left_x = (width as f32 - 1.0) / -2.0;
    let top_left_z = (height as f32 - 1.0) / 2.0;

    let centre_x = width as f32 / 2.0;
    let half_band = params.valley_width / 2.0;

    let mut positions = Vec::with_capacity(vpl * rows);
    let mut uvs = Vec::with_capacity(vpl * rows);
    let mut colors = Vec::with_capacity(vpl * rows);
    let mut triangles = Vec::with_capacity((vpl - 1) * (rows - 1) * 6);

    let mut vertex_index: u32 = 0;
    for z in (0..height).step_by(stride) {
        for x in (0..width).step_by(stride) {
            let xf = x as f32;
            let from_centre = (xf - centre_x).abs();
            let local_y_offset = if params.valley_width > 0.0 && from_centre <= half_band {
                params.y_offset + from_centre - params.valley_height
            } else {
                params.y_offset
            };

            let sampled = field.get(z, x);
            let y = params.height_curve.evaluate(sampled) * params.height_multiplier
                + local_y_offset;

            positions.push([top_left_x + xf, y, top_left_z - z as f32]);
            uvs.push([xf / width as f32, z as f32 / height as f32]);
            colors.push(params.gradient.evaluate(y));

            // Two triangles per quad, skipping the last row and column.
            if x + stride < width && z + stride < height {
                let v = vertex_index;
                let vpl = vpl as u32;
                triangles.extend_from_slice(&[v, v + vpl + 1, v + vpl]);
                triangles.extend_from_slice(&[v + vpl + 1, v, v + 1]);
            }

            vertex_index += 1;
        }
    }

    let mut mesh = MeshData { positions, triangles, uvs, colors };
    if params.flat_shaded {
        flat_shade(&mut mesh);
    }
    mesh
}

/// Explode shared vertices so every triangle owns its three corners.
/// Afterwards the index buffer is the identity permutation, which is
/// what forces downstream normal generation to stay per-face.
fn flat_shade(mesh: &mut MeshData) {
    let n = mesh.triangles.len();
    let mut positions = Vec::with_capacity(n);
    let mut uvs = Vec::with_capacity(n);
    let mut colors = Vec::with_capacity(n);

    for &idx in &mesh.triangles {
        let idx = idx as usize;
        positions.push(mesh.positions[idx]);
        uvs.push(mesh.uvs[idx]);
        colors.push(mesh.colors[idx]);
    }

    mesh.positions = positions;
    mesh.uvs = uvs;
    mesh.colors = colors;
    mesh.triangles = (0..n as u32).collect();
}
