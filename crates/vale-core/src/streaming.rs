//! Endless chunk streaming around a moving viewer.
//!
//! The streamer owns the sparse coordinate-to-chunk map, decides which
//! chunks are inside the visible window and at what detail, and drives
//! the background scheduler. Per tick it drains completed work first,
//! re-evaluates the affected chunks, and recomputes the window only
//! once the viewer has moved far enough since the last recompute.
//!
//! All chunk state is touched on the caller's thread; workers only ever
//! hand back finished values through the scheduler's channels.

use std::collections::HashMap;
use std::sync::Arc;

use crate::chunk::{ChunkCoord, TerrainChunk};
use crate::config::{GenerationParams, StreamerConfig};
use crate::error::ConfigError;
use crate::mesh::{MeshData, MeshParams};
use crate::scheduler::{FieldResult, GenScheduler, MeshResult, SchedulerStats};

/// World-space placement for a chunk mesh handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: [f32; 3],
    pub scale: f32,
}

/// The render collaborator's seam. The streamer pushes finished meshes
/// and visibility toggles through this; it never reads anything back.
pub trait RenderSink {
    /// A mesh became the displayed detail level for `coord`.
    fn upsert_mesh(&mut self, coord: ChunkCoord, placement: Placement, mesh: &MeshData);

    /// `coord` entered or left the visible window.
    fn set_visible(&mut self, coord: ChunkCoord, visible: bool);
}

/// Streaming counters for harness reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamerStats {
    pub chunks: usize,
    pub visible: usize,
    pub fields_applied: u64,
    pub meshes_applied: u64,
    pub scheduler: SchedulerStats,
}

/// Owns the chunk grid, the visible set, and one scheduler by
/// composition. Construction validates the externally supplied
/// configuration; generation parameters themselves are only softened,
/// never rejected.
pub struct TerrainStreamer {
    config: StreamerConfig,
    gen_params: GenerationParams,
    mesh_params: Arc<MeshParams>,
    chunk_size: f32,
    sq_move_threshold: f32,
    scheduler: GenScheduler,
    chunks: HashMap<ChunkCoord, TerrainChunk>,
    visible: Vec<ChunkCoord>,
    last_recompute_pos: Option<[f32; 2]>,
    fields_applied: u64,
    meshes_applied: u64,
}

impl TerrainStreamer {
    pub fn new(
        config: StreamerConfig,
        gen_params: GenerationParams,
        mesh_params: MeshParams,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let chunk_size = config.chunk_size();
        let sq_move_threshold = config.viewer_move_threshold * config.viewer_move_threshold;
        let scheduler = GenScheduler::new(config.worker_threads);
        log::info!(
            "terrain streamer ready: chunk size {chunk_size}, {} detail levels",
            config.lod_chain.len()
        );
        Ok(Self {
            config,
            gen_params,
            mesh_params: Arc::new(mesh_params),
            chunk_size,
            sq_move_threshold,
            scheduler,
            chunks: HashMap::new(),
            visible: Vec::new(),
            last_recompute_pos: None,
            fields_applied: 0,
            meshes_applied: 0,
        })
    }

    /// Per-tick entry point. Drains and applies completed background
    /// work, then recomputes the visible window when the viewer's
    /// squared ground-plane displacement since the last recompute
    /// exceeds the configured threshold.
    pub fn update(&mut self, viewer: [f32; 3], sink: &mut dyn RenderSink) {
        let ground = [viewer[0], viewer[2]];

        let (fields, meshes) = self.scheduler.drain();
        let mut touched: Vec<ChunkCoord> = Vec::with_capacity(fields.len() + meshes.len());
        for result in fields {
            touched.push(result.coord);
            self.apply_field(result);
        }
        for result in meshes {
            touched.push(result.coord);
            self.apply_mesh(result);
        }
        // Re-evaluate arrivals immediately: a fresh height field issues
        // its first mesh request and a fresh mesh is displayed if it is
        // still the target, without waiting for viewer movement.
        for coord in touched {
            self.refresh_chunk(coord, ground, sink);
        }

        let moved_enough = match self.last_recompute_pos {
            None => true,
            Some(last) => {
                let dx = ground[0] - last[0];
                let dz = ground[1] - last[1];
                dx * dx + dz * dz > self.sq_move_threshold
            }
        };
        if moved_enough {
            self.recompute_window(ground, sink);
            self.last_recompute_pos = Some(ground);
        }
    }

    pub fn stats(&self) -> StreamerStats {
        StreamerStats {
            chunks: self.chunks.len(),
            visible: self.visible.len(),
            fields_applied: self.fields_applied,
            meshes_applied: self.meshes_applied,
            scheduler: self.scheduler.stats(),
        }
    }

    /// Coordinates of every chunk currently marked visible.
    pub fn visible_chunks(&self) -> &[ChunkCoord] {
        &self.visible
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn contains_chunk(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    fn apply_field(&mut self, result: FieldResult) {
        if let Some(chunk) = self.chunks.get_mut(&result.coord) {
            chunk.set_height_field(Arc::new(result.field));
            self.fields_applied += 1;
        }
    }

    fn apply_mesh(&mut self, result: MeshResult) {
        // Results for chunks that scrolled out of view are still
        // cached; they are reused if the chunk comes back.
        if let Some(chunk) = self.chunks.get_mut(&result.coord) {
            chunk.cache_mesh(result.lod, result.mesh);
            self.meshes_applied += 1;
        }
    }

    /// Rebuild the visible window around the viewer: hide everything
    /// from the previous pass, then create or update every coordinate
    /// within the per-axis chunk extents, and finally cancel in-flight
    /// work for chunks that fell out of the window.
    fn recompute_window(&mut self, ground: [f32; 2], sink: &mut dyn RenderSink) {
        for coord in std::mem::take(&mut self.visible) {
            if let Some(chunk) = self.chunks.get_mut(&coord) {
                chunk.visible = false;
            }
            sink.set_visible(coord, false);
        }

        let centre = ChunkCoord::from_world(ground[0], ground[1], self.chunk_size);
        let farthest = *self.config.lod_chain.last().unwrap();
        let extent_z = (farthest.view_distance_z / self.chunk_size).floor() as i32;
        let extent_x = (farthest.view_distance_x / self.chunk_size).floor() as i32;

        for dz in -extent_z..=extent_z {
            for dx in -extent_x..=extent_x {
                let coord = ChunkCoord::new(centre.x + dx, centre.z + dz);
                if !self.chunks.contains_key(&coord) {
                    self.create_chunk(coord);
                } else {
                    self.ensure_field_requested(coord);
                    self.refresh_chunk(coord, ground, sink);
                }
            }
        }

        // Requests for chunks outside the window are cancelled; their
        // already-completed results still drain and stay cached.
        let mut cancelled = 0usize;
        for chunk in self.chunks.values_mut() {
            let outside = (chunk.coord.x - centre.x).abs() > extent_x
                || (chunk.coord.z - centre.z).abs() > extent_z;
            if outside && chunk.has_outstanding() {
                chunk.cancel_outstanding();
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            log::debug!("cancelled outstanding work for {cancelled} out-of-window chunks");
        }
    }

    fn create_chunk(&mut self, coord: ChunkCoord) {
        let mut chunk = TerrainChunk::new(coord, self.chunk_size, self.config.lod_chain.len());
        let token = self.scheduler.request_height_field(
            coord,
            self.config.grid_dim,
            self.config.grid_dim,
            self.params_for(coord),
        );
        chunk.set_field_request(token);
        self.chunks.insert(coord, chunk);
    }

    /// Re-issue the height field request for a chunk whose original
    /// request was cancelled while it was out of the window.
    fn ensure_field_requested(&mut self, coord: ChunkCoord) {
        let Some(chunk) = self.chunks.get(&coord) else {
            return;
        };
        if chunk.height_field().is_some() || chunk.field_requested() {
            return;
        }
        let token = self.scheduler.request_height_field(
            coord,
            self.config.grid_dim,
            self.config.grid_dim,
            self.params_for(coord),
        );
        if let Some(chunk) = self.chunks.get_mut(&coord) {
            chunk.set_field_request(token);
        }
    }

    /// Generation parameters shifted to this chunk's world offset so
    /// the noise field is continuous across chunk borders.
    fn params_for(&self, coord: ChunkCoord) -> GenerationParams {
        let [wx, wz] = coord.world_centre(self.chunk_size);
        self.gen_params.offset_by(wx, wz)
    }

    /// The visibility/LOD state machine for one chunk. Meaningful only
    /// once its height field has arrived.
    fn refresh_chunk(&mut self, coord: ChunkCoord, ground: [f32; 2], sink: &mut dyn RenderSink) {
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return;
        };
        let Some(field) = chunk.height_field().cloned() else {
            return;
        };

        let distance = chunk.bounds.sq_distance_to(ground).sqrt();
        let chain = &self.config.lod_chain;
        let now_visible = distance <= chain.last().unwrap().view_distance_z;

        if now_visible {
            // First level close enough for this distance, else the
            // coarsest.
            let lod = chain
                .iter()
                .position(|l| l.view_distance_z >= distance)
                .unwrap_or(chain.len() - 1);

            if chunk.displayed_lod != Some(lod) {
                if chunk.mesh(lod).is_some() {
                    chunk.displayed_lod = Some(lod);
                    let placement = placement_for(coord, self.chunk_size, self.config.world_scale);
                    // Borrow the cached mesh afresh to hand it out.
                    let mesh = chunk.mesh(lod).unwrap();
                    sink.upsert_mesh(coord, placement, mesh);
                } else if !chunk.mesh_in_flight(lod) {
                    let token = self.scheduler.request_mesh(
                        coord,
                        lod,
                        field,
                        Arc::clone(&self.mesh_params),
                    );
                    chunk.set_mesh_request(lod, token);
                }
            }

            if !chunk.visible {
                chunk.visible = true;
                self.visible.push(coord);
                sink.set_visible(coord, true);
            }
        } else if chunk.visible {
            chunk.visible = false;
            self.visible.retain(|c| *c != coord);
            sink.set_visible(coord, false);
        }
    }
}

fn placement_for(coord: ChunkCoord, chunk_size: f32, world_scale: f32) -> Placement {
    let [wx, wz] = coord.world_centre(chunk_size);
    Placement {
        position: [wx * world_scale, 0.0, wz * world_scale],
        scale: world_scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LodLevel, NormalizeMode};
    use std::time::{Duration, Instant};

    /// Sink that records everything the streamer pushes out.
    #[derive(Default)]
    struct RecordingSink {
        upserts: Vec<(ChunkCoord, Placement, usize)>,
        visibility: Vec<(ChunkCoord, bool)>,
    }

    impl RenderSink for RecordingSink {
        fn upsert_mesh(&mut self, coord: ChunkCoord, placement: Placement, mesh: &MeshData) {
            self.upserts.push((coord, placement, mesh.vertex_count()));
        }

        fn set_visible(&mut self, coord: ChunkCoord, visible: bool) {
            self.visibility.push((coord, visible));
        }
    }

    fn corridor_config() -> StreamerConfig {
        StreamerConfig {
            grid_dim: 97,
            lod_chain: vec![LodLevel { lod: 0, view_distance_z: 200.0, view_distance_x: 50.0 }],
            viewer_move_threshold: 25.0,
            world_scale: 1.0,
            worker_threads: 2,
        }
    }

    fn small_config() -> StreamerConfig {
        StreamerConfig {
            grid_dim: 9,
            lod_chain: vec![
                LodLevel { lod: 0, view_distance_z: 12.0, view_distance_x: 12.0 },
                LodLevel { lod: 1, view_distance_z: 24.0, view_distance_x: 24.0 },
            ],
            viewer_move_threshold: 1.0,
            world_scale: 1.0,
            worker_threads: 2,
        }
    }

    fn gen_params() -> GenerationParams {
        GenerationParams {
            scale: 10.0,
            octaves: 2,
            normalize: NormalizeMode::Global,
            ..GenerationParams::default()
        }
    }

    fn streamer(config: StreamerConfig) -> TerrainStreamer {
        TerrainStreamer::new(config, gen_params(), MeshParams::default()).unwrap()
    }

    /// Tick the streamer at a fixed viewer position until `pred` passes
    /// or the deadline expires.
    fn tick_until<F>(
        s: &mut TerrainStreamer,
        sink: &mut RecordingSink,
        viewer: [f32; 3],
        mut pred: F,
    ) where
        F: FnMut(&TerrainStreamer, &RecordingSink) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            s.update(viewer, sink);
            if pred(s, sink) || Instant::now() > deadline {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn first_recompute_creates_the_corridor_window() {
        // chunk size 96, view distances 200 (Z) and 50 (X): the window
        // is 5 rows by 1 column around the origin.
        let mut s = streamer(corridor_config());
        let mut sink = RecordingSink::default();
        s.update([0.0, 0.0, 0.0], &mut sink);

        assert_eq!(s.chunk_count(), 5);
        for z in -2..=2 {
            assert!(s.contains_chunk(ChunkCoord::new(0, z)), "missing chunk (0, {z})");
        }
        assert!(!s.contains_chunk(ChunkCoord::new(1, 0)));
        assert!(!s.contains_chunk(ChunkCoord::new(0, 3)));
        assert_eq!(s.stats().scheduler.field_requests, 5);
    }

    #[test]
    fn small_move_does_not_recompute() {
        let mut s = streamer(corridor_config());
        let mut sink = RecordingSink::default();
        s.update([0.0, 0.0, 0.0], &mut sink);
        let requests = s.stats().scheduler.field_requests;

        // 10 < 25 threshold: no new window, no new requests.
        s.update([0.0, 0.0, 10.0], &mut sink);
        assert_eq!(s.stats().scheduler.field_requests, requests);

        // 96 > 25: recompute shifts the window one chunk forward.
        s.update([0.0, 0.0, 96.0], &mut sink);
        assert_eq!(s.chunk_count(), 6);
    }

    #[test]
    fn each_chunk_lod_pair_is_requested_at_most_once() {
        let mut s = streamer(small_config());
        let mut sink = RecordingSink::default();

        // Run the full pipeline to quiescence at a fixed position:
        // every requested field applied, every requested mesh applied.
        tick_until(&mut s, &mut sink, [0.0, 0.0, 0.0], |s, _| {
            let st = s.stats();
            st.fields_applied == st.scheduler.field_requests
                && st.meshes_applied == st.scheduler.mesh_requests
                && st.meshes_applied > 0
        });

        let settled = s.stats();
        // Keep ticking without moving: no further requests of any kind
        // may be issued for pairs that are cached or in flight.
        for _ in 0..25 {
            s.update([0.0, 0.0, 0.0], &mut sink);
        }
        let after = s.stats();
        assert_eq!(after.scheduler.field_requests, settled.scheduler.field_requests);
        assert_eq!(after.scheduler.mesh_requests, settled.scheduler.mesh_requests);
    }

    #[test]
    fn arrived_fields_trigger_meshes_and_sink_upserts() {
        let mut s = streamer(small_config());
        let mut sink = RecordingSink::default();

        tick_until(&mut s, &mut sink, [0.0, 0.0, 0.0], |_, sink| !sink.upserts.is_empty());
        assert!(!sink.upserts.is_empty(), "no mesh ever reached the sink");

        // The chunk under the viewer is displayed at the finest level.
        let origin = sink
            .upserts
            .iter()
            .find(|(coord, _, _)| *coord == ChunkCoord::new(0, 0))
            .expect("origin chunk never displayed");
        // grid_dim 9 at lod 0: full 9x9 vertex grid.
        assert_eq!(origin.2, 81);
        assert_eq!(origin.1.position, [0.0, 0.0, 0.0]);

        // Every upserted chunk was also toggled visible.
        for (coord, _, _) in &sink.upserts {
            assert!(
                sink.visibility.iter().any(|(c, v)| c == coord && *v),
                "chunk {coord:?} displayed but never shown"
            );
        }
    }

    #[test]
    fn out_of_view_results_stay_cached_for_reuse() {
        let mut s = streamer(small_config());
        let mut sink = RecordingSink::default();

        tick_until(&mut s, &mut sink, [0.0, 0.0, 0.0], |s, _| {
            s.stats().meshes_applied > 0 && s.visible_chunks().contains(&ChunkCoord::new(0, 0))
        });
        let meshes_before = s.stats().scheduler.mesh_requests;

        // Walk far enough +Z that the origin chunk leaves the window.
        let far = [0.0, 0.0, 400.0];
        s.update(far, &mut sink);
        assert!(!s.visible_chunks().contains(&ChunkCoord::new(0, 0)));
        assert!(
            sink.visibility.iter().any(|&(c, v)| c == ChunkCoord::new(0, 0) && !v),
            "origin chunk never hidden"
        );

        // Come back: the chunk is re-shown from its cached mesh. Its
        // displayed level never changed, so no new upsert and no new
        // mesh request are needed.
        sink.visibility.clear();
        tick_until(&mut s, &mut sink, [0.0, 0.0, 0.0], |_, sink| {
            sink.visibility
                .iter()
                .any(|&(c, v)| c == ChunkCoord::new(0, 0) && v)
        });
        assert!(
            sink.visibility
                .iter()
                .any(|&(c, v)| c == ChunkCoord::new(0, 0) && v),
            "returning chunk was not re-shown"
        );
        // Requests may have been issued for chunks discovered near the
        // far position, but never a second one for an already cached
        // (chunk, LOD) pair.
        assert!(s.stats().scheduler.mesh_requests >= meshes_before);
        let st = s.stats();
        assert!(
            st.scheduler.mesh_requests <= (st.chunks * s.config.lod_chain.len()) as u64,
            "more mesh requests than (chunk, LOD) pairs"
        );
    }

    #[test]
    fn invalid_lod_chain_is_rejected_at_construction() {
        let config = StreamerConfig { lod_chain: Vec::new(), ..small_config() };
        let err = TerrainStreamer::new(config, gen_params(), MeshParams::default());
        assert!(matches!(err, Err(ConfigError::EmptyLodChain)));
    }
}
