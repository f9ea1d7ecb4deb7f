//! Vertex shading inputs: the height remap curve and the colour gradient.
//!
//! Both stand in for engine-owned asset types. A curve is a monotonic
//! sampled remap `f: [0,1] -> R`; a gradient is an ordered list of
//! `(position, colour)` stops. Both interpolate linearly between keys and
//! clamp outside the keyed range.

use serde::{Deserialize, Serialize};

/// Linear RGBA, each channel in [0, 1].
pub type Color = [f32; 4];

/// Monotonic sampled remap applied to normalized heights before the
/// height multiplier. Keys are `(t, value)` pairs sorted by `t`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightCurve {
    keys: Vec<(f32, f32)>,
}

impl HeightCurve {
    /// Build a curve from `(t, value)` keys. Keys are sorted by `t` on
    /// construction; an empty key list behaves as the identity.
    pub fn new(mut keys: Vec<(f32, f32)>) -> Self {
        keys.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { keys }
    }

    /// The identity remap: every height passes through unchanged.
    pub fn identity() -> Self {
        Self::new(vec![(0.0, 0.0), (1.0, 1.0)])
    }

    /// Evaluate at `t`, clamping to the keyed range.
    pub fn evaluate(&self, t: f32) -> f32 {
        let Some(first) = self.keys.first() else {
            return t;
        };
        let last = self.keys.last().unwrap();
        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }
        // Find the bracketing key pair.
        let hi = self.keys.iter().position(|k| k.0 >= t).unwrap();
        let (t0, v0) = self.keys[hi - 1];
        let (t1, v1) = self.keys[hi];
        let span = t1 - t0;
        if span <= f32::EPSILON {
            return v1;
        }
        let f = (t - t0) / span;
        v0 + (v1 - v0) * f
    }
}

impl Default for HeightCurve {
    fn default() -> Self {
        Self::identity()
    }
}

/// Ordered `(position, colour)` stops with linear interpolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorGradient {
    stops: Vec<(f32, Color)>,
}

impl ColorGradient {
    /// Build a gradient from `(position, colour)` stops, sorted by
    /// position on construction.
    pub fn new(mut stops: Vec<(f32, Color)>) -> Self {
        stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { stops }
    }

    /// Plain black-to-white ramp over [0, 1].
    pub fn grayscale() -> Self {
        Self::new(vec![
            (0.0, [0.0, 0.0, 0.0, 1.0]),
            (1.0, [1.0, 1.0, 1.0, 1.0]),
        ])
    }

    /// Evaluate at `t`, clamping to the stop range. An empty gradient
    /// evaluates to opaque white.
    pub fn evaluate(&self, t: f32) -> Color {
        let Some(first) = self.stops.first() else {
            return [1.0, 1.0, 1.0, 1.0];
        };
        let last = self.stops.last().unwrap();
        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }
        let hi = self.stops.iter().position(|s| s.0 >= t).unwrap();
        let (t0, c0) = self.stops[hi - 1];
        let (t1, c1) = self.stops[hi];
        let span = t1 - t0;
        if span <= f32::EPSILON {
            return c1;
        }
        let f = (t - t0) / span;
        [
            c0[0] + (c1[0] - c0[0]) * f,
            c0[1] + (c1[1] - c0[1]) * f,
            c0[2] + (c1[2] - c0[2]) * f,
            c0[3] + (c1[3] - c0[3]) * f,
        ]
    }
}

impl Default for ColorGradient {
    fn default() -> Self {
        Self::grayscale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn curve_interpolates_between_keys() {
        let curve = HeightCurve::new(vec![(0.0, 0.0), (1.0, 10.0)]);
        assert_relative_eq!(curve.evaluate(0.25), 2.5);
        assert_relative_eq!(curve.evaluate(0.5), 5.0);
    }

    #[test]
    fn curve_clamps_outside_keyed_range() {
        let curve = HeightCurve::new(vec![(0.2, 1.0), (0.8, 3.0)]);
        assert_eq!(curve.evaluate(0.0), 1.0);
        assert_eq!(curve.evaluate(1.0), 3.0);
    }

    #[test]
    fn curve_sorts_unordered_keys() {
        let curve = HeightCurve::new(vec![(1.0, 10.0), (0.0, 0.0)]);
        assert_relative_eq!(curve.evaluate(0.5), 5.0);
    }

    #[test]
    fn identity_curve_passes_heights_through() {
        let curve = HeightCurve::identity();
        assert_relative_eq!(curve.evaluate(0.37), 0.37);
    }

    #[test]
    fn gradient_endpoints_and_midpoint() {
        let g = ColorGradient::grayscale();
        assert_eq!(g.evaluate(-1.0), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(g.evaluate(2.0), [1.0, 1.0, 1.0, 1.0]);
        let mid = g.evaluate(0.5);
        assert_relative_eq!(mid[0], 0.5);
        assert_relative_eq!(mid[1], 0.5);
        assert_relative_eq!(mid[2], 0.5);
        assert_relative_eq!(mid[3], 1.0);
    }
}
