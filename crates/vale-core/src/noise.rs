//! Fractal noise field synthesis.
//!
//! Sums `octaves` Perlin layers with amplitude `persistence^i` and
//! frequency `lacunarity^i`, each layer sampled through its own seeded
//! offset so that distinct octaves never line up. The same seed and
//! parameters produce a bit-identical field on every call, across
//! process runs.

use noise::{NoiseFn, Perlin};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{GenerationParams, NormalizeMode};
use crate::heightfield::HeightField;

/// Per-octave offsets are drawn from this range, large enough that
/// octave sampling windows never overlap for practical field sizes.
const OFFSET_RANGE: f64 = 100_000.0;

/// Generate a `width` x `height` height field from the given parameters.
///
/// Sampling is centred on the grid: cell `(x, z)` samples noise-space at
/// `(coord - centre + octave_offset) / scale * frequency`. The
/// configured world offset is folded into each octave offset, with the
/// z component subtracted so that grid rows, which run toward -Z in
/// mesh space, line up across adjacent chunks.
///
/// With zero octaves the raw accumulation is identically 0 and both
/// normalization modes yield a flat zero field.
pub fn generate(width: usize, height: usize, params: &GenerationParams) -> HeightField {
    let p = params.sanitized();
    let octaves = p.octaves as usize;

    let perlin = Perlin::new((p.seed & 0xFFFF_FFFF) as u32);
    let mut rng = StdRng::seed_from_u64(p.seed);

    let mut octave_offsets = Vec::with_capacity(octaves);
    let mut max_possible = 0.0f32;
    let mut amplitude = 1.0f32;
    for _ in 0..octaves {
        let ox = rng.gen_range(-OFFSET_RANGE..OFFSET_RANGE) + p.offset[0] as f64;
        let oz = rng.gen_range(-OFFSET_RANGE..OFFSET_RANGE) - p.offset[1] as f64;
        octave_offsets.push((ox, oz));
        max_possible += amplitude;
        amplitude *= p.persistence;
    }

    let mut field = HeightField::new(width, height, 0.0);
    let half_w = width as f64 / 2.0;
    let half_h = height as f64 / 2.0;
    let scale = p.scale as f64;

    let mut min_v = f32::INFINITY;
    let mut max_v = f32::NEG_INFINITY;

    for z in 0..height {
        for x in 0..width {
            let mut amplitude = 1.0f64;
            let mut frequency = 1.0f64;
            let mut value = 0.0f64;

            for &(ox, oz) in &octave_offsets {
                let sx = (x as f64 - half_w + ox) / scale * frequency;
                let sz = (z as f64 - half_h + oz) / scale * frequency;
                // Perlin output is approximately [-1, 1] already.
                value += perlin.get([sx, sz]) * amplitude;
                amplitude *= p.persistence as f64;
                frequency *= p.lacunarity as f64;
            }

            let v = value as f32;
            min_v = min_v.min(v);
            max_v = max_v.max(v);
            field.set(z, x, v);
        }
    }

    match p.normalize {
        NormalizeMode::Local => {
            // Grid-local contrast stretch to exactly [0, 1].
            let range = max_v - min_v;
            if range > 0.0 {
                for v in &mut field.data {
                    *v = (*v - min_v) / range;
                }
            } else {
                for v in &mut field.data {
                    *v = 0.0;
                }
            }
        }
        NormalizeMode::Global => {
            // Remap against the theoretical amplitude sum. Only the
            // lower bound is clamped; values can exceed 1 when the
            // sampled octaves constructively align.
            if max_possible > 0.0 {
                for v in &mut field.data {
                    *v = ((*v + 1.0) / max_possible).max(0.0);
                }
            } else {
                for v in &mut field.data {
                    *v = 0.0;
                }
            }
        }
    }

    field
}
