//! Scene renderer descriptions and the per-object instruction cache.

use std::mem;

use glam::{Mat4, Vec3, Vec4};
use rustc_hash::FxHashMap;

use crate::command::CommandBuffer;
use crate::handle::{MaterialHandle, MeshHandle, TextureHandle};
use crate::instruction::{RenderInstruction, RenderInstructionsBuffer};

/// Upper bound on submeshes drawn per renderer.
const MAX_SUBMESHES: usize = 100;

const KEYWORD_LIGHTMAP: &str = "LIGHTMAP_ON";
const KEYWORD_LIGHTPROBE: &str = "LIGHTPROBE_SH";
const KEYWORD_DIRECTIONAL_LIGHTMAP: &str = "DIRLIGHTMAP_COMBINED";

const PROP_LIGHT_COLOR: &str = "light_color";
const PROP_LIGHTMAP: &str = "lightmap";
const PROP_LIGHTMAP_ST: &str = "lightmap_st";
const PROP_LIGHTMAP_DIR: &str = "lightmap_dir";

/// Identifies a renderer within one registered object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RendererId(pub u32);

/// What kind of geometry a renderer draws.
#[derive(Clone, Debug, PartialEq)]
pub enum RendererKind {
    /// A static mesh.
    Mesh(MeshHandle),
    /// A skinned mesh, snapshotted in its bind pose.
    SkinnedMesh(MeshHandle),
    /// Anything the snapshot path cannot draw, named for diagnostics.
    Unsupported(String),
}

/// Baked lightmap inputs for a renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightmapBinding {
    /// Lightmap color texture.
    pub color: TextureHandle,
    /// Optional directional lightmap.
    pub direction: Option<TextureHandle>,
    /// Scale and offset into the lightmap.
    pub scale_offset: Vec4,
}

/// A scene renderer as seen at registration.
#[derive(Clone, Debug, PartialEq)]
pub struct RendererDesc {
    /// Identifier, unique within the object.
    pub id: RendererId,
    /// Name used in diagnostics.
    pub name: String,
    /// Geometry source.
    pub kind: RendererKind,
    /// One material per submesh.
    pub materials: Vec<MaterialHandle>,
    /// Local-to-world transform.
    pub local_to_world: Mat4,
    /// Lightmap inputs if the renderer is lightmapped.
    pub lightmap: Option<LightmapBinding>,
    /// The mesh was merged into a static batch and no longer exists on its own.
    pub static_batched: bool,
    /// World-space bounds minimum.
    pub bounds_min: Vec3,
    /// World-space bounds maximum.
    pub bounds_max: Vec3,
}

/// Build the cached instructions for one renderer.
///
/// Returns `None` and logs an error for renderers that cannot be snapshotted.
/// The owning object still gets an impostor without this renderer's geometry.
pub fn build_instructions(desc: &RendererDesc) -> Option<RenderInstructionsBuffer> {
    let mesh = match &desc.kind {
        RendererKind::Mesh(mesh) | RendererKind::SkinnedMesh(mesh) => *mesh,
        RendererKind::Unsupported(type_name) => {
            log::error!(
                "Unsupported renderer type '{}' on '{}', excluded from impostor snapshots",
                type_name,
                desc.name
            );
            return None;
        }
    };
    if desc.static_batched {
        log::error!(
            "Renderer '{}' is part of a static batch and cannot be snapshotted",
            desc.name
        );
        return None;
    }

    let mut buff = RenderInstructionsBuffer::new();
    let invert_culling = desc.local_to_world.determinant() < 0.0;
    if invert_culling {
        buff.push(RenderInstruction::SetInvertCulling(true));
    }

    match &desc.lightmap {
        Some(lightmap) => {
            buff.push(RenderInstruction::EnableKeyword(KEYWORD_LIGHTMAP.into()));
            buff.push(RenderInstruction::DisableKeyword(KEYWORD_LIGHTPROBE.into()));
            buff.push(RenderInstruction::SetVector {
                name: PROP_LIGHT_COLOR.into(),
                value: Vec4::ZERO,
            });
            buff.push(RenderInstruction::SetTexture {
                name: PROP_LIGHTMAP.into(),
                texture: lightmap.color,
            });
            buff.push(RenderInstruction::SetVector {
                name: PROP_LIGHTMAP_ST.into(),
                value: lightmap.scale_offset,
            });
            if let Some(direction) = lightmap.direction {
                buff.push(RenderInstruction::EnableKeyword(
                    KEYWORD_DIRECTIONAL_LIGHTMAP.into(),
                ));
                buff.push(RenderInstruction::SetTexture {
                    name: PROP_LIGHTMAP_DIR.into(),
                    texture: direction,
                });
            }
        }
        None => {
            buff.push(RenderInstruction::DisableKeyword(KEYWORD_LIGHTMAP.into()));
            buff.push(RenderInstruction::DisableKeyword(
                KEYWORD_DIRECTIONAL_LIGHTMAP.into(),
            ));
            buff.push(RenderInstruction::EnableKeyword(KEYWORD_LIGHTPROBE.into()));
        }
    }

    for (submesh, material) in desc.materials.iter().take(MAX_SUBMESHES).enumerate() {
        buff.push(RenderInstruction::DrawMesh {
            mesh,
            transform: desc.local_to_world,
            material: *material,
            submesh: submesh as u32,
            pass: 0,
        });
    }

    if invert_culling {
        buff.push(RenderInstruction::SetInvertCulling(false));
    }

    buff.regenerate_property_block();
    Some(buff)
}

/// Instruction buffers for every snapshot-capable renderer of one object.
///
/// Built once at registration and replayed for each snapshot.
#[derive(Clone, Debug, Default)]
pub struct RendererCache {
    buffers: FxHashMap<RendererId, RenderInstructionsBuffer>,
    skipped: Vec<RendererId>,
}

impl RendererCache {
    /// Build buffers for all `renderers`, skipping unsupported ones.
    pub fn build(renderers: &[RendererDesc]) -> Self {
        let mut cache = Self::default();
        for desc in renderers {
            match build_instructions(desc) {
                Some(buff) => {
                    cache.buffers.insert(desc.id, buff);
                }
                None => cache.skipped.push(desc.id),
            }
        }
        cache
    }

    /// The cached buffer for a renderer.
    pub fn get(&self, id: RendererId) -> Option<&RenderInstructionsBuffer> {
        self.buffers.get(&id)
    }

    /// Renderers excluded at build time.
    pub fn skipped(&self) -> &[RendererId] {
        &self.skipped
    }

    /// Replay the buffers of `renderers` in order. Returns how many were
    /// replayed. Excluded renderers are passed over silently since they were
    /// already reported when the cache was built.
    pub fn apply(&self, renderers: &[RendererId], cb: &mut CommandBuffer) -> usize {
        let mut applied = 0;
        for buff in renderers.iter().filter_map(|id| self.buffers.get(id)) {
            buff.apply(cb);
            applied += 1;
        }
        applied
    }

    /// Number of cached renderers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Approximate heap bytes held by the cached buffers.
    pub fn used_bytes(&self) -> usize {
        let buffers: usize = self
            .buffers
            .values()
            .map(RenderInstructionsBuffer::used_bytes)
            .sum();
        buffers
            + self.buffers.capacity() * mem::size_of::<(RendererId, RenderInstructionsBuffer)>()
            + self.skipped.capacity() * mem::size_of::<RendererId>()
    }
}
