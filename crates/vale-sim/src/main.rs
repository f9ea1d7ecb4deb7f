//! Offline streaming harness: walks a scripted viewer down the valley
//! corridor through a real streamer + generation pool and reports what
//! the pipeline did. Useful for eyeballing request traffic and cache
//! behaviour without a renderer attached.

use std::collections::HashSet;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;

use vale_core::{
    ChunkCoord, ColorGradient, GenerationParams, HeightCurve, LodLevel, MeshData, MeshParams,
    NormalizeMode, Placement, RenderSink, StreamerConfig, TerrainStreamer,
};

#[derive(Parser, Debug)]
#[command(name = "vale-sim", about = "Terrain streaming pipeline harness")]
struct Args {
    /// Noise seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of simulation ticks to run.
    #[arg(long, default_value_t = 600)]
    ticks: u32,

    /// Viewer speed along +Z, world units per tick.
    #[arg(long, default_value_t = 2.0)]
    speed: f32,

    /// Vertices per chunk side (chunk size is one less).
    #[arg(long, default_value_t = 97)]
    grid: usize,

    /// Duplicate vertices for faceted shading.
    #[arg(long)]
    flat_shaded: bool,

    /// Print per-interval progress lines.
    #[arg(long, default_value_t = 100)]
    report_every: u32,

    /// Emit the final summary as JSON instead of text.
    #[arg(long)]
    json: bool,
}

/// Sink that counts renderer traffic instead of drawing.
#[derive(Default)]
struct CountingSink {
    upserts: u64,
    show_events: u64,
    hide_events: u64,
    displayed: HashSet<ChunkCoord>,
}

impl RenderSink for CountingSink {
    fn upsert_mesh(&mut self, coord: ChunkCoord, _placement: Placement, _mesh: &MeshData) {
        self.upserts += 1;
        self.displayed.insert(coord);
    }

    fn set_visible(&mut self, coord: ChunkCoord, visible: bool) {
        if visible {
            self.show_events += 1;
        } else {
            self.hide_events += 1;
            self.displayed.remove(&coord);
        }
    }
}

#[derive(Serialize)]
struct Summary {
    ticks: u32,
    final_viewer_z: f32,
    chunks_created: usize,
    chunks_visible: usize,
    field_requests: u64,
    mesh_requests: u64,
    fields_applied: u64,
    meshes_applied: u64,
    mesh_upserts: u64,
    show_events: u64,
    hide_events: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let gen_params = GenerationParams {
        seed: args.seed,
        scale: 60.0,
        octaves: 5,
        persistence: 0.5,
        lacunarity: 2.0,
        offset: [0.0, 0.0],
        normalize: NormalizeMode::Global,
    };
    let mesh_params = MeshParams {
        height_multiplier: 40.0,
        height_curve: HeightCurve::new(vec![(0.0, 0.0), (0.4, 0.1), (1.0, 1.0)]),
        flat_shaded: args.flat_shaded,
        y_offset: 0.0,
        valley_width: 24.0,
        valley_height: 14.0,
        gradient: ColorGradient::new(vec![
            (0.0, [0.18, 0.33, 0.20, 1.0]),
            (12.0, [0.45, 0.40, 0.28, 1.0]),
            (30.0, [0.93, 0.95, 0.97, 1.0]),
        ]),
    };
    let config = StreamerConfig {
        grid_dim: args.grid,
        lod_chain: vec![
            LodLevel { lod: 0, view_distance_z: 250.0, view_distance_x: 120.0 },
            LodLevel { lod: 1, view_distance_z: 450.0, view_distance_x: 160.0 },
            LodLevel { lod: 2, view_distance_z: 700.0, view_distance_x: 200.0 },
        ],
        viewer_move_threshold: 25.0,
        world_scale: 1.0,
        ..StreamerConfig::default()
    };

    let mut streamer = TerrainStreamer::new(config, gen_params, mesh_params)?;
    let mut sink = CountingSink::default();

    let mut viewer_z = 0.0f32;
    for tick in 0..args.ticks {
        streamer.update([0.0, 0.0, viewer_z], &mut sink);
        viewer_z += args.speed;

        if args.report_every > 0 && tick % args.report_every == 0 {
            let st = streamer.stats();
            eprintln!(
                "tick {tick:>5} | z {viewer_z:>8.1} | chunks {:>4} ({} visible) | \
                 fields {}/{} | meshes {}/{} | displayed {}",
                st.chunks,
                st.visible,
                st.fields_applied,
                st.scheduler.field_requests,
                st.meshes_applied,
                st.scheduler.mesh_requests,
                sink.displayed.len(),
            );
        }

        // Pace the loop so background work has frame-like time slices.
        std::thread::sleep(std::time::Duration::from_millis(2));
    }

    let st = streamer.stats();
    let summary = Summary {
        ticks: args.ticks,
        final_viewer_z: viewer_z,
        chunks_created: st.chunks,
        chunks_visible: st.visible,
        field_requests: st.scheduler.field_requests,
        mesh_requests: st.scheduler.mesh_requests,
        fields_applied: st.fields_applied,
        meshes_applied: st.meshes_applied,
        mesh_upserts: sink.upserts,
        show_events: sink.show_events,
        hide_events: sink.hide_events,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("ran {} ticks to z = {:.1}", summary.ticks, summary.final_viewer_z);
        println!(
            "chunks: {} created, {} visible at exit",
            summary.chunks_created, summary.chunks_visible
        );
        println!(
            "height fields: {} requested, {} applied",
            summary.field_requests, summary.fields_applied
        );
        println!(
            "meshes: {} requested, {} applied, {} handed to the sink",
            summary.mesh_requests, summary.meshes_applied, summary.mesh_upserts
        );
        println!(
            "visibility: {} shows, {} hides",
            summary.show_events, summary.hide_events
        );
    }

    Ok(())
}
