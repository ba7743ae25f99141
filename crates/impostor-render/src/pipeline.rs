//! The render-pipeline collaborator contract.
//!
//! The impostor system records work and hands it over through
//! [`RenderPipeline`]. Turning commands into GPU calls (keyword toggling,
//! fog, camera parameters) is the pipeline's job.

use glam::{Vec3, Vec4};
use impostor_mesh::ChunkMesh;

use crate::command::{CommandBuffer, RenderCommand};
use crate::handle::{MaterialHandle, TextureHandle};

/// The scene's main directional light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels in.
    pub direction: Vec3,
    /// Color premultiplied by intensity.
    pub color: Vec4,
}

/// Per-draw shader inputs for a chunk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImpostorDrawParams {
    /// Main camera position; quads turn to face it in the shader.
    pub camera_position: Vec3,
    /// Current unscaled time, compared against packed fade deadlines.
    pub time: f32,
    /// Unscaled frame delta.
    pub delta_time: f32,
    /// Alpha cutout threshold.
    pub cutout: f32,
    /// Mip level bias when sampling the atlas texture.
    pub mip_map_bias: f32,
    /// Below this view angle, in degrees, quads stop turning toward the camera.
    pub min_angle_to_stop_look_at: f32,
    /// Tint for debug views, transparent when debugging is off.
    pub debug_color: Vec4,
    /// Draw order of the chunk material.
    pub render_queue: i32,
}

/// One chunk draw submitted to the pipeline.
#[derive(Clone, Copy, Debug)]
pub struct ChunkDraw<'a> {
    /// Id of the chunk being drawn.
    pub chunk_id: u32,
    /// The chunk's quad mesh.
    pub mesh: &'a ChunkMesh,
    /// The chunk's impostor material.
    pub material: MaterialHandle,
    /// The chunk's atlas texture.
    pub texture: TextureHandle,
    /// Shader inputs.
    pub params: ImpostorDrawParams,
}

/// Consumer of impostor rendering work.
pub trait RenderPipeline {
    /// Queue a chunk mesh for drawing in the main camera this frame.
    fn draw_mesh(&mut self, draw: &ChunkDraw<'_>);

    /// Queue a command buffer of snapshot renders to run before the main
    /// camera renders.
    fn schedule_command_buffer(&mut self, buffer: CommandBuffer);

    /// Record a fog toggle. Pipelines with their own fog handling override
    /// this.
    fn set_fog_enabled(&self, enabled: bool, buffer: &mut CommandBuffer) {
        buffer.push(RenderCommand::SetFogEnabled(enabled));
    }
}

/// A draw captured by [`RecordingPipeline`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecordedDraw {
    /// Chunk id.
    pub chunk_id: u32,
    /// Material.
    pub material: MaterialHandle,
    /// Quads in the mesh at draw time.
    pub quad_count: usize,
    /// Shader inputs.
    pub params: ImpostorDrawParams,
}

/// Headless pipeline that records everything it is given.
#[derive(Debug, Default)]
pub struct RecordingPipeline {
    draws: Vec<RecordedDraw>,
    command_buffers: Vec<CommandBuffer>,
}

impl RecordingPipeline {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws recorded since the last [`Self::clear`].
    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    /// Command buffers recorded since the last [`Self::clear`].
    pub fn command_buffers(&self) -> &[CommandBuffer] {
        &self.command_buffers
    }

    /// Forget everything recorded so far.
    pub fn clear(&mut self) {
        self.draws.clear();
        self.command_buffers.clear();
    }
}

impl RenderPipeline for RecordingPipeline {
    fn draw_mesh(&mut self, draw: &ChunkDraw<'_>) {
        self.draws.push(RecordedDraw {
            chunk_id: draw.chunk_id,
            material: draw.material,
            quad_count: draw.mesh.quad_count(),
            params: draw.params,
        });
    }

    fn schedule_command_buffer(&mut self, buffer: CommandBuffer) {
        self.command_buffers.push(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_pipeline_captures_draws() {
        let mesh = ChunkMesh::new(4);
        let mut pipeline = RecordingPipeline::new();
        let params = ImpostorDrawParams {
            camera_position: Vec3::ZERO,
            time: 1.0,
            delta_time: 0.016,
            cutout: 0.2,
            mip_map_bias: 0.0,
            min_angle_to_stop_look_at: 30.0,
            debug_color: Vec4::ZERO,
            render_queue: 2461,
        };
        pipeline.draw_mesh(&ChunkDraw {
            chunk_id: 3,
            mesh: &mesh,
            material: MaterialHandle(1),
            texture: TextureHandle(1),
            params,
        });
        pipeline.schedule_command_buffer(CommandBuffer::new("snapshots"));

        assert_eq!(pipeline.draws().len(), 1);
        assert_eq!(pipeline.draws()[0].chunk_id, 3);
        assert_eq!(pipeline.draws()[0].quad_count, 0);
        assert_eq!(pipeline.command_buffers().len(), 1);

        pipeline.clear();
        assert!(pipeline.draws().is_empty());
    }

    #[test]
    fn test_default_fog_toggle_records_command() {
        let pipeline = RecordingPipeline::new();
        let mut cb = CommandBuffer::new("snapshots");
        pipeline.set_fog_enabled(false, &mut cb);
        assert_eq!(cb.commands(), &[RenderCommand::SetFogEnabled(false)]);
    }
}
