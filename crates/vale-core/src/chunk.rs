//! Chunk addressing and per-chunk streaming state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::heightfield::HeightField;
use crate::mesh::MeshData;
use crate::scheduler::CancelToken;

/// Integer grid coordinate identifying one terrain chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The chunk containing a ground-plane world position.
    pub fn from_world(x: f32, z: f32, chunk_size: f32) -> Self {
        Self {
            x: (x / chunk_size).round() as i32,
            z: (z / chunk_size).round() as i32,
        }
    }

    /// Ground-plane centre of this chunk in world units.
    pub fn world_centre(&self, chunk_size: f32) -> [f32; 2] {
        [self.x as f32 * chunk_size, self.z as f32 * chunk_size]
    }
}

/// Axis-aligned ground-plane bounds of one chunk.
#[derive(Debug, Clone, Copy)]
pub struct ChunkBounds {
    pub centre: [f32; 2],
    pub half_extent: f32,
}

impl ChunkBounds {
    pub fn new(coord: ChunkCoord, chunk_size: f32) -> Self {
        Self {
            centre: coord.world_centre(chunk_size),
            half_extent: chunk_size / 2.0,
        }
    }

    /// Squared distance from a ground-plane point to the nearest point
    /// of these bounds; 0 when the point is inside.
    pub fn sq_distance_to(&self, point: [f32; 2]) -> f32 {
        let dx = ((point[0] - self.centre[0]).abs() - self.half_extent).max(0.0);
        let dz = ((point[1] - self.centre[1]).abs() - self.half_extent).max(0.0);
        dx * dx + dz * dz
    }
}

/// Per-coordinate streaming state: the delivered height field, the
/// per-LOD mesh cache, and in-flight request bookkeeping. Owned and
/// mutated exclusively by the streamer; created lazily the first time a
/// coordinate enters the visible window and never destroyed.
pub struct TerrainChunk {
    pub coord: ChunkCoord,
    pub bounds: ChunkBounds,
    /// None until the generated field is drained and delivered.
    height_field: Option<Arc<HeightField>>,
    /// Cached meshes indexed by LOD; a slot stays None until generated
    /// and, once filled, is kept for the life of the process.
    lod_meshes: Vec<Option<MeshData>>,
    /// LOD currently handed to the render collaborator; None until the
    /// first mesh assignment.
    pub displayed_lod: Option<usize>,
    /// Outstanding mesh request per LOD. At most one in-flight request
    /// exists per (chunk, LOD) pair.
    mesh_requests: Vec<Option<CancelToken>>,
    /// Outstanding height field request, if any.
    field_request: Option<CancelToken>,
    pub visible: bool,
}

impl TerrainChunk {
    pub fn new(coord: ChunkCoord, chunk_size: f32, lod_count: usize) -> Self {
        Self {
            coord,
            bounds: ChunkBounds::new(coord, chunk_size),
            height_field: None,
            lod_meshes: vec![None; lod_count],
            displayed_lod: None,
            mesh_requests: vec![None; lod_count],
            field_request: None,
            visible: false,
        }
    }

    pub fn height_field(&self) -> Option<&Arc<HeightField>> {
        self.height_field.as_ref()
    }

    pub fn set_height_field(&mut self, field: Arc<HeightField>) {
        self.height_field = Some(field);
        self.field_request = None;
    }

    pub fn field_requested(&self) -> bool {
        self.field_request.is_some()
    }

    pub fn set_field_request(&mut self, token: CancelToken) {
        self.field_request = Some(token);
    }

    pub fn mesh(&self, lod: usize) -> Option<&MeshData> {
        self.lod_meshes.get(lod).and_then(|m| m.as_ref())
    }

    /// Store a completed mesh. Overwriting an existing slot with an
    /// equivalent result is harmless; requests race only against
    /// themselves.
    pub fn cache_mesh(&mut self, lod: usize, mesh: MeshData) {
        if let Some(slot) = self.lod_meshes.get_mut(lod) {
            *slot = Some(mesh);
        }
        if let Some(req) = self.mesh_requests.get_mut(lod) {
            *req = None;
        }
    }

    pub fn mesh_in_flight(&self, lod: usize) -> bool {
        self.mesh_requests.get(lod).map_or(false, |r| r.is_some())
    }

    pub fn set_mesh_request(&mut self, lod: usize, token: CancelToken) {
        if let Some(slot) = self.mesh_requests.get_mut(lod) {
            *slot = Some(token);
        }
    }

    /// Cancel every outstanding request for this chunk and clear the
    /// in-flight bookkeeping so re-entry into the window re-requests.
    pub fn cancel_outstanding(&mut self) {
        if let Some(token) = self.field_request.take() {
            token.cancel();
        }
        for slot in &mut self.mesh_requests {
            if let Some(token) = slot.take() {
                token.cancel();
            }
        }
    }

    pub fn has_outstanding(&self) -> bool {
        self.field_request.is_some() || self.mesh_requests.iter().any(|r| r.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_position_rounds_to_nearest_chunk() {
        let size = 96.0;
        assert_eq!(ChunkCoord::from_world(0.0, 0.0, size), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_world(50.0, 0.0, size), ChunkCoord::new(1, 0));
        assert_eq!(ChunkCoord::from_world(-50.0, 190.0, size), ChunkCoord::new(-1, 2));
    }

    #[test]
    fn bounds_distance_is_zero_inside() {
        let b = ChunkBounds::new(ChunkCoord::new(0, 0), 96.0);
        assert_eq!(b.sq_distance_to([0.0, 0.0]), 0.0);
        assert_eq!(b.sq_distance_to([48.0, -48.0]), 0.0);
    }

    #[test]
    fn bounds_distance_measures_to_nearest_edge() {
        let b = ChunkBounds::new(ChunkCoord::new(0, 0), 96.0);
        // 10 units beyond the +X edge.
        assert_eq!(b.sq_distance_to([58.0, 0.0]), 100.0);
        // Diagonal: 3 past X, 4 past Z.
        assert_eq!(b.sq_distance_to([51.0, 52.0]), 25.0);
    }

    #[test]
    fn cancel_outstanding_clears_bookkeeping() {
        let mut chunk = TerrainChunk::new(ChunkCoord::new(0, 0), 96.0, 2);
        let field_token = CancelToken::new();
        let mesh_token = CancelToken::new();
        chunk.set_field_request(field_token.clone());
        chunk.set_mesh_request(1, mesh_token.clone());
        assert!(chunk.has_outstanding());

        chunk.cancel_outstanding();
        assert!(!chunk.has_outstanding());
        assert!(field_token.is_cancelled());
        assert!(mesh_token.is_cancelled());
        assert!(!chunk.field_requested());
        assert!(!chunk.mesh_in_flight(1));
    }
}
