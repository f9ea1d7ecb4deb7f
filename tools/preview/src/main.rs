//! Diagnostic previewer: writes three PNG debug images to data/debug/.
//! Not part of the main pipeline; no tests, no clippy target.

use std::fs;
use std::path::Path;

use vale_core::mesh::{self, MeshParams};
use vale_core::noise::generate;
use vale_core::shade::{ColorGradient, HeightCurve};
use vale_core::{GenerationParams, NormalizeMode};

const N: usize = 241;

fn main() {
    let params = GenerationParams {
        seed: 42,
        scale: 60.0,
        octaves: 5,
        persistence: 0.5,
        lacunarity: 2.0,
        offset: [0.0, 0.0],
        normalize: NormalizeMode::Global,
    };

    println!("Generating {N}x{N} height field…");
    let field = generate(N, N, &params);

    let out_dir = Path::new("data/debug");
    fs::create_dir_all(out_dir).expect("cannot create data/debug/");

    // ── 1. heightfield.png (grayscale, grid min/max stretched) ───────────────
    {
        let min_v = field.min_value();
        let range = (field.max_value() - min_v).max(1e-6);
        let mut img = image::RgbImage::new(N as u32, N as u32);
        for r in 0..N {
            for c in 0..N {
                let t = (field.get(r, c) - min_v) / range;
                let g = (t.clamp(0.0, 1.0) * 255.0) as u8;
                img.put_pixel(c as u32, r as u32, image::Rgb([g, g, g]));
            }
        }
        let path = out_dir.join("heightfield.png");
        img.save(&path).expect("failed to save heightfield.png");
        println!("Wrote {}", path.display());
    }

    let mesh_params = MeshParams {
        height_multiplier: 40.0,
        height_curve: HeightCurve::new(vec![(0.0, 0.0), (0.4, 0.1), (1.0, 1.0)]),
        flat_shaded: false,
        y_offset: 0.0,
        valley_width: 60.0,
        valley_height: 18.0,
        gradient: ColorGradient::new(vec![
            (-18.0, [0.16, 0.24, 0.38, 1.0]),
            (0.0, [0.18, 0.33, 0.20, 1.0]),
            (14.0, [0.45, 0.40, 0.28, 1.0]),
            (34.0, [0.93, 0.95, 0.97, 1.0]),
        ]),
    };

    println!("Building full-detail mesh with valley carve…");
    let built = mesh::build(&field, &mesh_params, 0);

    // ── 2. colored.png (per-vertex gradient colours) ─────────────────────────
    {
        let mut img = image::RgbImage::new(N as u32, N as u32);
        for (i, c) in built.colors.iter().enumerate() {
            let x = (i % N) as u32;
            let z = (i / N) as u32;
            let px = image::Rgb([
                (c[0].clamp(0.0, 1.0) * 255.0) as u8,
                (c[1].clamp(0.0, 1.0) * 255.0) as u8,
                (c[2].clamp(0.0, 1.0) * 255.0) as u8,
            ]);
            img.put_pixel(x, z, px);
        }
        let path = out_dir.join("colored.png");
        img.save(&path).expect("failed to save colored.png");
        println!("Wrote {}", path.display());
    }

    // ── 3. valley_profile.png (vertex elevation, carve visible as a dark band)
    {
        let min_y = built
            .positions
            .iter()
            .map(|p| p[1])
            .fold(f32::INFINITY, f32::min);
        let max_y = built
            .positions
            .iter()
            .map(|p| p[1])
            .fold(f32::NEG_INFINITY, f32::max);
        let range = (max_y - min_y).max(1e-6);

        let mut img = image::RgbImage::new(N as u32, N as u32);
        for (i, p) in built.positions.iter().enumerate() {
            let x = (i % N) as u32;
            let z = (i / N) as u32;
            let t = (p[1] - min_y) / range;
            let g = (t * 255.0) as u8;
            img.put_pixel(x, z, image::Rgb([g, g, g]));
        }
        let path = out_dir.join("valley_profile.png");
        img.save(&path).expect("failed to save valley_profile.png");
        println!("Wrote {}", path.display());
    }

    println!("Done.");
}
