//! Endless streamed terrain around a moving viewer.
//!
//! The pipeline: a seeded fractal noise generator produces per-chunk
//! height fields; a mesh builder turns fields into LOD-decimated,
//! optionally flat-shaded meshes with a carved valley corridor; a
//! bounded background pool runs both off the frame path; and the
//! streamer decides per tick what to generate, when, and at what
//! detail, handing finished meshes to the embedding renderer through
//! the [`RenderSink`](streaming::RenderSink) seam.
//!
//! The library never initialises logging and never talks to a GPU or
//! filesystem; it produces values and the caller owns the edges.

pub mod chunk;
pub mod config;
pub mod error;
pub mod heightfield;
pub mod mesh;
pub mod noise;
pub mod scheduler;
pub mod shade;
pub mod streaming;

pub use chunk::{ChunkBounds, ChunkCoord, TerrainChunk};
pub use config::{GenerationParams, LodLevel, NormalizeMode, StreamerConfig};
pub use error::ConfigError;
pub use heightfield::HeightField;
pub use mesh::{MeshData, MeshParams};
pub use scheduler::{CancelToken, GenScheduler, SchedulerStats};
pub use shade::{Color, ColorGradient, HeightCurve};
pub use streaming::{Placement, RenderSink, StreamerStats, TerrainStreamer};
