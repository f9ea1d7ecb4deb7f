use thiserror::Error;

/// Errors raised when externally supplied configuration is malformed.
///
/// Out-of-range generation parameters (scale, octaves, lacunarity) are
/// never errors; they are silently clamped by
/// [`GenerationParams::sanitized`](crate::config::GenerationParams::sanitized).
/// Only structural mistakes a caller must fix end up here.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("LOD chain is empty; at least one level is required")]
    EmptyLodChain,

    #[error("LOD chain indices must be contiguous from 0: found {found} at position {position}")]
    NonContiguousLod { position: usize, found: u32 },

    #[error("generation pool requires at least one worker thread")]
    NoWorkerThreads,

    #[error("sampling grid must be at least 2x2, got {0}")]
    GridTooSmall(usize),
}
