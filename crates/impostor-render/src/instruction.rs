//! Cached draw instructions for one scene renderer.
//!
//! Instructions split into two kinds. Keyword, culling and draw instructions
//! are replayed into the command buffer for every snapshot. Vector and
//! texture instructions are folded once into the renderer's shared
//! [`PropertyBlock`], which every replayed draw references.

use std::mem;
use std::sync::Arc;

use glam::{Mat4, Vec4};

use crate::command::{CommandBuffer, RenderCommand};
use crate::handle::{MaterialHandle, MeshHandle, TextureHandle};
use crate::property_block::{PropertyBlock, PropertyValue};

/// A single cached instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderInstruction {
    /// Enable a shader keyword.
    EnableKeyword(String),
    /// Disable a shader keyword.
    DisableKeyword(String),
    /// Toggle inverted culling.
    SetInvertCulling(bool),
    /// Bake a vector into the property block.
    SetVector {
        /// Property name.
        name: String,
        /// Value.
        value: Vec4,
    },
    /// Bake a texture into the property block.
    SetTexture {
        /// Property name.
        name: String,
        /// Texture.
        texture: TextureHandle,
    },
    /// Draw one submesh.
    DrawMesh {
        /// Mesh.
        mesh: MeshHandle,
        /// Local-to-world transform captured at registration.
        transform: Mat4,
        /// Material for the submesh.
        material: MaterialHandle,
        /// Submesh index.
        submesh: u32,
        /// Shader pass.
        pass: u32,
    },
}

impl RenderInstruction {
    fn apply_command_buffer(&self, cb: &mut CommandBuffer, properties: &Arc<PropertyBlock>) {
        match self {
            Self::EnableKeyword(k) => cb.push(RenderCommand::EnableKeyword(k.clone())),
            Self::DisableKeyword(k) => cb.push(RenderCommand::DisableKeyword(k.clone())),
            Self::SetInvertCulling(v) => cb.push(RenderCommand::SetInvertCulling(*v)),
            Self::SetVector { .. } | Self::SetTexture { .. } => {}
            Self::DrawMesh {
                mesh,
                transform,
                material,
                submesh,
                pass,
            } => cb.push(RenderCommand::DrawMesh {
                mesh: *mesh,
                transform: *transform,
                material: *material,
                submesh: *submesh,
                pass: *pass,
                properties: Arc::clone(properties),
            }),
        }
    }

    fn apply_property_block(&self, block: &mut PropertyBlock) {
        match self {
            Self::SetVector { name, value } => block.set_vector(name, *value),
            Self::SetTexture { name, texture } => block.set_texture(name, *texture),
            _ => {}
        }
    }
}

/// Instruction list plus the property block derived from it.
#[derive(Clone, Debug, Default)]
pub struct RenderInstructionsBuffer {
    instructions: Vec<RenderInstruction>,
    properties: Arc<PropertyBlock>,
}

impl RenderInstructionsBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction. Call [`Self::regenerate_property_block`] after
    /// the last push.
    pub fn push(&mut self, instruction: RenderInstruction) {
        self.instructions.push(instruction);
    }

    /// Rebuild the shared property block from the vector and texture
    /// instructions.
    pub fn regenerate_property_block(&mut self) {
        let mut block = PropertyBlock::new();
        for instruction in &self.instructions {
            instruction.apply_property_block(&mut block);
        }
        self.properties = Arc::new(block);
    }

    /// Replay the command-side instructions into `cb`.
    pub fn apply(&self, cb: &mut CommandBuffer) {
        for instruction in &self.instructions {
            instruction.apply_command_buffer(cb, &self.properties);
        }
    }

    /// The cached instructions.
    pub fn instructions(&self) -> &[RenderInstruction] {
        &self.instructions
    }

    /// The baked property block.
    pub fn properties(&self) -> &PropertyBlock {
        &self.properties
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if there are no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Approximate heap bytes held by the instructions and property block.
    pub fn used_bytes(&self) -> usize {
        self.instructions.capacity() * mem::size_of::<RenderInstruction>()
            + self.properties.len() * mem::size_of::<(String, PropertyValue)>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_buffer() -> RenderInstructionsBuffer {
        let mut buff = RenderInstructionsBuffer::new();
        buff.push(RenderInstruction::EnableKeyword("LIGHTMAP_ON".into()));
        buff.push(RenderInstruction::SetVector {
            name: "lightmap_st".into(),
            value: Vec4::new(1.0, 1.0, 0.0, 0.0),
        });
        buff.push(RenderInstruction::DrawMesh {
            mesh: MeshHandle(1),
            transform: Mat4::IDENTITY,
            material: MaterialHandle(2),
            submesh: 0,
            pass: 0,
        });
        buff.regenerate_property_block();
        buff
    }

    /// Property instructions never reach the command stream.
    #[test]
    fn test_apply_skips_property_instructions() {
        let buff = sample_buffer();
        let mut cb = CommandBuffer::new("test");
        buff.apply(&mut cb);
        assert_eq!(cb.len(), 2);
        assert_eq!(
            cb.commands()[0],
            RenderCommand::EnableKeyword("LIGHTMAP_ON".into())
        );
        assert_eq!(cb.draw_count(), 1);
    }

    #[test]
    fn test_draw_shares_baked_properties() {
        let buff = sample_buffer();
        assert_eq!(
            buff.properties().vector("lightmap_st"),
            Some(Vec4::new(1.0, 1.0, 0.0, 0.0))
        );

        let mut cb = CommandBuffer::new("test");
        buff.apply(&mut cb);
        buff.apply(&mut cb);
        let blocks: Vec<_> = cb
            .commands()
            .iter()
            .filter_map(|c| match c {
                RenderCommand::DrawMesh { properties, .. } => Some(Arc::clone(properties)),
                _ => None,
            })
            .collect();
        assert_eq!(blocks.len(), 2);
        assert!(Arc::ptr_eq(&blocks[0], &blocks[1]));
    }
}
