//! Externally supplied configuration: noise generation parameters,
//! the LOD chain, and the streamer's tuning knobs.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Floor applied to non-positive noise scales. Division by the scale
/// happens per sample, so zero must never reach the sampling loop.
pub const MIN_SCALE: f32 = 1e-4;

/// How a generated height field is remapped after octave accumulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizeMode {
    /// Remap by the grid's own min/max. Maximises per-chunk contrast but
    /// gives no consistency across chunk borders.
    Local,
    /// Remap by the theoretical octave amplitude sum. Identical heights
    /// for identical world positions regardless of which chunk sampled
    /// them, at the cost of a compressed value range.
    Global,
}

/// Full parameter vector for fractal noise synthesis.
/// Immutable once created; supplied by the embedding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    pub seed: u64,
    /// World-units-per-noise-unit zoom. Values <= 0 are clamped to
    /// [`MIN_SCALE`].
    pub scale: f32,
    /// Octave count. Negative values are clamped to 0 (a flat field).
    pub octaves: i32,
    /// Per-octave amplitude decay, conventionally in [0, 1].
    pub persistence: f32,
    /// Per-octave frequency growth. Values < 1 are clamped to 1.
    pub lacunarity: f32,
    /// World-space sampling offset; the streamer shifts this per chunk.
    pub offset: [f32; 2],
    pub normalize: NormalizeMode,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            seed: 42,
            scale: 30.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            offset: [0.0, 0.0],
            normalize: NormalizeMode::Global,
        }
    }
}

impl GenerationParams {
    /// Return a copy with out-of-range values softened into the valid
    /// domain. Never rejects; generation always proceeds.
    pub fn sanitized(&self) -> Self {
        let mut p = self.clone();
        if p.scale <= 0.0 {
            p.scale = MIN_SCALE;
        }
        p.octaves = p.octaves.max(0);
        p.lacunarity = p.lacunarity.max(1.0);
        p
    }

    /// The same parameters shifted so that sampling is centred on the
    /// given world-space position.
    pub fn offset_by(&self, dx: f32, dz: f32) -> Self {
        let mut p = self.clone();
        p.offset = [p.offset[0] + dx, p.offset[1] + dz];
        p
    }
}

/// One level of the detail chain: ascending index means a coarser mesh
/// shown farther from the viewer. View distances are per-axis because
/// the playable corridor is narrow in X and long in Z.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LodLevel {
    pub lod: u32,
    pub view_distance_z: f32,
    pub view_distance_x: f32,
}

/// Check the LOD chain invariant: non-empty, indices contiguous from 0.
pub fn validate_lod_chain(chain: &[LodLevel]) -> Result<(), ConfigError> {
    if chain.is_empty() {
        return Err(ConfigError::EmptyLodChain);
    }
    for (position, level) in chain.iter().enumerate() {
        if level.lod != position as u32 {
            return Err(ConfigError::NonContiguousLod {
                position,
                found: level.lod,
            });
        }
    }
    Ok(())
}

/// Streamer tuning supplied once at setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamerConfig {
    /// Vertices per chunk side; the world-space chunk size is
    /// `grid_dim - 1`.
    pub grid_dim: usize,
    /// Ascending near-to-far detail levels.
    pub lod_chain: Vec<LodLevel>,
    /// Viewer displacement (world units) before the visible window is
    /// recomputed. Compared squared, so no square root per tick.
    pub viewer_move_threshold: f32,
    /// Uniform world scale applied to chunk placement.
    pub world_scale: f32,
    /// Background generation worker count.
    pub worker_threads: usize,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            grid_dim: 97,
            lod_chain: vec![
                LodLevel { lod: 0, view_distance_z: 200.0, view_distance_x: 200.0 },
                LodLevel { lod: 1, view_distance_z: 400.0, view_distance_x: 400.0 },
                LodLevel { lod: 2, view_distance_z: 600.0, view_distance_x: 600.0 },
            ],
            viewer_move_threshold: 25.0,
            world_scale: 1.0,
            worker_threads: default_worker_threads(),
        }
    }
}

impl StreamerConfig {
    pub fn chunk_size(&self) -> f32 {
        (self.grid_dim - 1) as f32
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_dim < 2 {
            return Err(ConfigError::GridTooSmall(self.grid_dim));
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::NoWorkerThreads);
        }
        validate_lod_chain(&self.lod_chain)
    }
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .min(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_clamps_scale_octaves_lacunarity() {
        let p = GenerationParams {
            scale: -3.0,
            octaves: -2,
            lacunarity: 0.25,
            ..GenerationParams::default()
        }
        .sanitized();
        assert_eq!(p.scale, MIN_SCALE);
        assert_eq!(p.octaves, 0);
        assert_eq!(p.lacunarity, 1.0);
    }

    #[test]
    fn sanitized_leaves_valid_params_alone() {
        let p = GenerationParams::default();
        let s = p.sanitized();
        assert_eq!(s.scale, p.scale);
        assert_eq!(s.octaves, p.octaves);
        assert_eq!(s.lacunarity, p.lacunarity);
    }

    #[test]
    fn empty_lod_chain_rejected() {
        assert!(matches!(
            validate_lod_chain(&[]),
            Err(ConfigError::EmptyLodChain)
        ));
    }

    #[test]
    fn non_contiguous_lod_chain_rejected() {
        let chain = [
            LodLevel { lod: 0, view_distance_z: 100.0, view_distance_x: 100.0 },
            LodLevel { lod: 2, view_distance_z: 200.0, view_distance_x: 200.0 },
        ];
        match validate_lod_chain(&chain) {
            Err(ConfigError::NonContiguousLod { position, found }) => {
                assert_eq!(position, 1);
                assert_eq!(found, 2);
            }
            other => panic!("expected NonContiguousLod, got {other:?}"),
        }
    }

    #[test]
    fn params_roundtrip_through_json() {
        let p = GenerationParams {
            seed: 7,
            normalize: NormalizeMode::Local,
            ..GenerationParams::default()
        };
        let json = serde_json::to_string(&p).unwrap();
        let back: GenerationParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back.seed, 7);
        assert_eq!(back.normalize, NormalizeMode::Local);
        assert_eq!(back.scale, p.scale);
    }

    #[test]
    fn default_streamer_config_is_valid() {
        assert!(StreamerConfig::default().validate().is_ok());
    }
}
