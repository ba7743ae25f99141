//! Submission of chunk meshes to the main camera.

use glam::Vec4;
use impostor_atlas::ChunkPool;
use impostor_config::DebugConfig;
use impostor_render::{ChunkDraw, ImpostorDrawParams, RenderPipeline};

/// Tile resolution at the red end of the cascades gradient.
const CASCADE_MAX_RESOLUTION: f32 = 512.0;

const CASCADE_STOPS: [Vec4; 4] = [
    Vec4::new(0.0, 1.0, 0.0, 1.0),
    Vec4::new(1.0, 1.0, 0.0, 1.0),
    Vec4::new(1.0, 0.5, 0.0, 1.0),
    Vec4::new(1.0, 0.0, 0.0, 1.0),
];

/// Debug tint for a tier: green for small tiles through red at 512px, at
/// half intensity.
pub fn cascade_color(tile_resolution: u32) -> Vec4 {
    let t = (tile_resolution as f32 / CASCADE_MAX_RESOLUTION).clamp(0.0, 1.0);
    let segments = (CASCADE_STOPS.len() - 1) as f32;
    let scaled = t * segments;
    let i = (scaled.floor() as usize).min(CASCADE_STOPS.len() - 2);
    let color = CASCADE_STOPS[i].lerp(CASCADE_STOPS[i + 1], scaled - i as f32);
    color * 0.5
}

/// Draw every non-empty chunk. `base` carries the frame-wide parameters;
/// the debug color and render queue are filled in per chunk. Returns the
/// number of draws.
pub(crate) fn draw_chunks<P: RenderPipeline>(
    pool: &ChunkPool,
    pipeline: &mut P,
    base: ImpostorDrawParams,
    debug: &DebugConfig,
) -> usize {
    let mut draws = 0;
    for chunk in pool.chunks().iter().filter(|c| !c.is_empty()) {
        let debug_color = match (debug.enabled, debug.cascades_mode) {
            (false, _) => Vec4::ZERO,
            (true, true) => cascade_color(chunk.tile_resolution()),
            (true, false) => Vec4::from_array(debug.debug_color),
        };
        pipeline.draw_mesh(&ChunkDraw {
            chunk_id: chunk.id().get(),
            mesh: chunk.mesh(),
            material: chunk.material(),
            texture: chunk.texture(),
            params: ImpostorDrawParams {
                debug_color,
                render_queue: chunk.render_queue(),
                ..base
            },
        });
        draws += 1;
    }
    draws
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use impostor_atlas::{OwnerId, SlotRequest, render_queue};
    use impostor_render::RecordingPipeline;

    use super::*;

    fn base() -> ImpostorDrawParams {
        ImpostorDrawParams {
            camera_position: Vec3::new(1.0, 2.0, 3.0),
            time: 4.0,
            delta_time: 0.5,
            cutout: 0.2,
            mip_map_bias: -0.5,
            min_angle_to_stop_look_at: 30.0,
            debug_color: Vec4::ZERO,
            render_queue: 0,
        }
    }

    fn request(raw: u32) -> SlotRequest {
        SlotRequest {
            owner: OwnerId::new(raw).unwrap(),
            position: Vec3::ZERO,
            direction: Vec3::Z,
            quad_size: 1.0,
            z_offset: 0.5,
            fade_duration: 0.2,
        }
    }

    #[test]
    fn test_cascade_gradient_endpoints() {
        assert_eq!(cascade_color(512), Vec4::new(0.5, 0.0, 0.0, 0.5));
        assert_eq!(cascade_color(2048), Vec4::new(0.5, 0.0, 0.0, 0.5));
        assert_eq!(cascade_color(0), Vec4::new(0.0, 0.5, 0.0, 0.5));
    }

    #[test]
    fn test_cascade_gradient_warms_with_resolution() {
        let small = cascade_color(32);
        let large = cascade_color(256);
        assert!(large.x >= small.x);
        assert!(large.y <= small.y);
    }

    #[test]
    fn test_draws_only_non_empty_chunks() {
        let mut pool = ChunkPool::new(1024, false).unwrap();
        pool.acquire(64, &request(1), 0.0, 0.0).unwrap();
        pool.acquire(128, &request(2), 0.0, 0.0).unwrap();
        pool.rebuild_meshes();

        let mut pipeline = RecordingPipeline::new();
        let draws = draw_chunks(&pool, &mut pipeline, base(), &DebugConfig::default());
        assert_eq!(draws, 2);

        let recorded = pipeline.draws();
        assert_eq!(recorded[0].quad_count, 1);
        assert_eq!(recorded[0].params.render_queue, render_queue(64));
        assert_eq!(recorded[1].params.render_queue, render_queue(128));
        assert_eq!(recorded[0].params.camera_position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(recorded[1].params.mip_map_bias, -0.5);
        assert_eq!(recorded[0].params.debug_color, Vec4::ZERO);
    }

    #[test]
    fn test_debug_colors() {
        let mut pool = ChunkPool::new(1024, false).unwrap();
        pool.acquire(512, &request(1), 0.0, 0.0).unwrap();
        pool.rebuild_meshes();

        let mut debug = DebugConfig {
            enabled: true,
            cascades_mode: false,
            debug_color: [1.0, 0.0, 1.0, 0.5],
        };
        let mut pipeline = RecordingPipeline::new();
        draw_chunks(&pool, &mut pipeline, base(), &debug);
        assert_eq!(pipeline.draws()[0].params.debug_color, Vec4::new(1.0, 0.0, 1.0, 0.5));

        debug.cascades_mode = true;
        pipeline.clear();
        draw_chunks(&pool, &mut pipeline, base(), &debug);
        assert_eq!(pipeline.draws()[0].params.debug_color, Vec4::new(0.5, 0.0, 0.0, 0.5));
    }
}
