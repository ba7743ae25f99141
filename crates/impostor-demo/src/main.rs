//! Headless impostor scheduling demo.
//!
//! Registers a grid of trees, orbits a camera around them for a fixed
//! number of frames and logs what the scheduler did each second.
//! Configuration is loaded from `impostors.ron` and can be overridden via
//! CLI flags, e.g. `cargo run -p impostor-demo -- --objects 5000 --frames 600`.

use std::f32::consts::TAU;
use std::path::PathBuf;

use clap::Parser;
use glam::{Mat4, Vec3, Vec4};
use impostor_config::{CliArgs, Config};
use impostor_engine::{
    CameraState, EngineError, FrameStats, ImpostorLod, ImpostorLodGroup, ImpostorSystem,
    ManualClock,
};
use impostor_render::{
    DirectionalLight, MaterialHandle, MeshHandle, RecordingPipeline, RendererDesc, RendererId,
    RendererKind,
};
use tracing::{error, info};

/// Distance between neighboring trees.
const GRID_SPACING: f32 = 12.0;

/// Camera height above the grid.
const CAMERA_HEIGHT: f32 = 25.0;

/// Simulated frame rate.
const FRAME_RATE: f32 = 60.0;

/// Seconds for one full orbit.
const ORBIT_PERIOD: f32 = 20.0;

const TRUNK: RendererId = RendererId(1);
const CROWN: RendererId = RendererId(2);
const BILLBOARD: RendererId = RendererId(3);

fn main() {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(|| {
        dirs::config_dir()
            .map(|dir| dir.join("impostor-demo"))
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    impostor_log::init_logging(&config.log);
    info!(dir = %config_dir.display(), "Config loaded");

    if let Err(e) = run(config) {
        error!("Demo failed: {e}");
        std::process::exit(1);
    }
}

fn run(config: Config) -> Result<(), EngineError> {
    let demo = config.demo.clone();
    let mut system = ImpostorSystem::new(
        config,
        RecordingPipeline::new(),
        ManualClock::new(1.0 / FRAME_RATE),
    )?;

    let side = (demo.objects as f32).sqrt().ceil().max(1.0) as u32;
    let half_extent = (side as f32 - 1.0) * GRID_SPACING * 0.5;
    let mut owners = Vec::with_capacity(demo.objects as usize);
    for i in 0..demo.objects {
        let x = (i % side) as f32 * GRID_SPACING - half_extent;
        let z = (i / side) as f32 * GRID_SPACING - half_extent;
        let registration = system.register(&tree(i, Vec3::new(x, 0.0, z)))?;
        owners.push(registration.owner);
    }
    info!(objects = owners.len(), side, "Registered tree grid");

    let sun = DirectionalLight {
        direction: Vec3::new(-0.4, -1.0, -0.3).normalize(),
        color: Vec4::new(1.0, 0.95, 0.85, 1.0),
    };
    let fov_y = demo.fov_degrees.to_radians();
    let orbit_radius = demo.orbit_radius.max(half_extent + GRID_SPACING);

    let mut totals = FrameStats::default();
    for frame in 0..demo.frames {
        let angle = TAU * frame as f32 / (FRAME_RATE * ORBIT_PERIOD);
        let position = Vec3::new(
            angle.cos() * orbit_radius,
            CAMERA_HEIGHT,
            angle.sin() * orbit_radius,
        );
        let camera = camera_state(position, fov_y, demo.screen_height);

        // Thin the grid halfway through to exercise slot release and eviction.
        if frame == demo.frames / 2 {
            let mut removed = 0;
            for &owner in owners.iter().step_by(2) {
                system.unregister(owner)?;
                removed += 1;
            }
            info!(removed, "Unregistered every other tree");
        }

        let stats = system.tick(&camera, Some(&sun))?;
        accumulate(&mut totals, &stats);

        if frame % FRAME_RATE as u32 == 0 {
            info!(
                frame,
                visible = stats.visible_objects,
                queued = stats.queued,
                updates = stats.texture_updates,
                chunks = stats.live_chunks,
                slots = stats.occupied_slots,
                draws = stats.draw_calls,
                "Frame stats"
            );
        }
        system.pipeline_mut().clear();
    }

    info!(
        frames = system.frame_count(),
        texture_updates = totals.texture_updates,
        released_slots = totals.released_slots,
        evicted_chunks = totals.evicted_chunks,
        meshes_rebuilt = totals.meshes_rebuilt,
        memory_kib = system.memory_usage() / 1024,
        "Demo finished"
    );
    Ok(())
}

/// A tree: trunk and crown up close, a single billboard far away.
fn tree(index: u32, base: Vec3) -> ImpostorLodGroup {
    let scale = 1.0 + (index % 5) as f32 * 0.15;
    let renderer = |id: RendererId, name: &str, min: Vec3, max: Vec3| RendererDesc {
        id,
        name: format!("tree {index} {name}"),
        kind: RendererKind::Mesh(MeshHandle(u64::from(id.0))),
        materials: vec![MaterialHandle(u64::from(id.0))],
        local_to_world: Mat4::from_translation(base) * Mat4::from_scale(Vec3::splat(scale)),
        lightmap: None,
        static_batched: false,
        bounds_min: base + min * scale,
        bounds_max: base + max * scale,
    };
    let lod = |height: f32, renderers: &[RendererId]| ImpostorLod {
        screen_relative_height: height,
        renderers: renderers.to_vec(),
    };

    ImpostorLodGroup {
        name: format!("tree {index}"),
        lods: vec![
            lod(0.25, &[TRUNK, CROWN]),
            lod(0.08, &[CROWN]),
            lod(0.01, &[BILLBOARD]),
        ],
        detail_lods: vec![lod(0.6, &[TRUNK, CROWN]), lod(0.3, &[CROWN])],
        renderers: vec![
            renderer(TRUNK, "trunk", Vec3::new(-0.4, 0.0, -0.4), Vec3::new(0.4, 4.0, 0.4)),
            renderer(CROWN, "crown", Vec3::new(-2.5, 3.0, -2.5), Vec3::new(2.5, 9.0, 2.5)),
            renderer(BILLBOARD, "billboard", Vec3::new(-2.5, 0.0, -2.5), Vec3::new(2.5, 9.0, 2.5)),
        ],
        settings: None,
    }
}

fn camera_state(position: Vec3, fov_y: f32, screen_height: u32) -> CameraState {
    let near = 0.3;
    let far = 5000.0;
    let view = Mat4::look_at_rh(position, Vec3::ZERO, Vec3::Y);
    let projection = Mat4::perspective_rh(fov_y, 16.0 / 9.0, near, far);
    CameraState {
        position,
        view_projection: projection * view,
        fov_y,
        near,
        far,
        screen_height,
    }
}

fn accumulate(totals: &mut FrameStats, frame: &FrameStats) {
    totals.texture_updates += frame.texture_updates;
    totals.released_slots += frame.released_slots;
    totals.evicted_chunks += frame.evicted_chunks;
    totals.meshes_rebuilt += frame.meshes_rebuilt;
}
