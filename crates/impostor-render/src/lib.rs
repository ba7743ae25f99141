//! Render-side contracts for the impostor system: GPU resource handles, the
//! recorded command stream for snapshot rendering, per-renderer draw
//! instruction caches, snapshot camera framing, and the pipeline collaborator
//! that turns all of it into GPU work.

pub mod command;
pub mod handle;
pub mod instruction;
pub mod pipeline;
pub mod property_block;
pub mod renderer;
pub mod snapshot;

pub use command::{CommandBuffer, PixelRect, RenderCommand, global};
pub use handle::{MaterialHandle, MeshHandle, TextureHandle};
pub use instruction::{RenderInstruction, RenderInstructionsBuffer};
pub use pipeline::{
    ChunkDraw, DirectionalLight, ImpostorDrawParams, RecordedDraw, RecordingPipeline,
    RenderPipeline,
};
pub use property_block::{PropertyBlock, PropertyValue};
pub use renderer::{
    LightmapBinding, RendererCache, RendererDesc, RendererId, RendererKind, build_instructions,
};
pub use snapshot::{SnapshotCamera, select_lod_level};
