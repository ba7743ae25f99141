//! Recorded render commands for snapshot rendering.
//!
//! The dispatcher records every atlas update of a frame into one
//! [`CommandBuffer`], which is handed to the pipeline collaborator in a single
//! submission.

use std::sync::Arc;

use glam::{Mat4, Vec4};

use crate::handle::{MaterialHandle, MeshHandle, TextureHandle};
use crate::property_block::PropertyBlock;

/// Names of global shader vectors the impostor system writes.
pub mod global {
    /// World-space camera position used while rendering a snapshot.
    pub const WORLD_SPACE_CAMERA_POS: &str = "world_space_camera_pos";
    /// `(-1, near, far, 1/far)` projection parameters.
    pub const PROJECTION_PARAMS: &str = "projection_params";
    /// Direction towards the main directional light.
    pub const WORLD_SPACE_LIGHT_POS: &str = "world_space_light_pos";
    /// Main directional light color premultiplied by intensity.
    pub const LIGHT_COLOR: &str = "light_color";
}

/// A pixel rectangle inside a render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    /// Left edge in pixels.
    pub x: u32,
    /// Bottom edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelRect {
    /// A rectangle covering a full `size × size` target.
    pub fn full(size: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: size,
            height: size,
        }
    }
}

/// One recorded render command.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderCommand {
    /// Bind an atlas texture as the color target.
    SetRenderTarget {
        /// Target texture.
        texture: TextureHandle,
    },
    /// Restrict rendering to a sub-rectangle of the current target.
    SetViewport(PixelRect),
    /// Clear the current viewport.
    ClearRenderTarget {
        /// Clear color.
        color: Vec4,
        /// Also clear depth.
        clear_depth: bool,
    },
    /// Override the view and projection matrices.
    SetViewProjection {
        /// World-to-view matrix.
        view: Mat4,
        /// View-to-clip matrix.
        projection: Mat4,
    },
    /// Set a global shader vector, see [`global`].
    SetGlobalVector {
        /// Property name.
        name: &'static str,
        /// Value.
        value: Vec4,
    },
    /// Toggle fog for subsequent draws.
    SetFogEnabled(bool),
    /// Enable a shader keyword.
    EnableKeyword(String),
    /// Disable a shader keyword.
    DisableKeyword(String),
    /// Flip triangle winding for mirrored transforms.
    SetInvertCulling(bool),
    /// Draw one submesh of a scene mesh.
    DrawMesh {
        /// Mesh to draw.
        mesh: MeshHandle,
        /// Local-to-world transform.
        transform: Mat4,
        /// Material for this submesh.
        material: MaterialHandle,
        /// Submesh index.
        submesh: u32,
        /// Shader pass.
        pass: u32,
        /// Property overrides shared by every draw of the same renderer.
        properties: Arc<PropertyBlock>,
    },
    /// Regenerate the mip chain of an atlas texture.
    GenerateMips {
        /// Texture to process.
        texture: TextureHandle,
    },
}

/// An ordered list of [`RenderCommand`]s.
#[derive(Clone, Debug, Default)]
pub struct CommandBuffer {
    name: String,
    commands: Vec<RenderCommand>,
}

impl CommandBuffer {
    /// Create an empty, named buffer.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
        }
    }

    /// Debug name of the buffer.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a command.
    pub fn push(&mut self, command: RenderCommand) {
        self.commands.push(command);
    }

    /// All recorded commands in order.
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    /// Drop all commands, keeping the allocation.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of render-target binds, the cost chunk batching minimizes.
    pub fn render_target_switches(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, RenderCommand::SetRenderTarget { .. }))
            .count()
    }

    /// Number of mesh draws.
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, RenderCommand::DrawMesh { .. }))
            .count()
    }
}
