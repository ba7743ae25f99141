//! Opaque handles for GPU resources owned by the pipeline collaborator.
//!
//! The impostor system never touches GPU objects directly. It mints and pools
//! handles, and the pipeline maps each handle to a real resource the first
//! time it appears in a command.

/// An atlas render texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

/// A material, either a chunk's impostor material or a scene material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialHandle(pub u64);

/// A scene mesh drawn into snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u64);
