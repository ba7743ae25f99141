//! Engine error types.

use impostor_atlas::{AtlasError, OwnerId};
use impostor_config::ConfigError;
use impostor_render::RendererId;

/// Reasons an object cannot be registered or changed.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RegistrationError {
    /// The group has no impostor LOD levels.
    #[error("impostor LOD group has no LOD levels")]
    NoLods,

    /// LOD heights are not strictly decreasing within (0, 1].
    #[error("LOD {index} has screen height {height}; heights must strictly decrease within (0, 1]")]
    InvalidLodHeights {
        /// Offending level.
        index: usize,
        /// Its height.
        height: f32,
    },

    /// The owner id is already tracked.
    #[error("object {0} is already registered")]
    AlreadyRegistered(OwnerId),

    /// The owner id is not tracked.
    #[error("object {0} is not registered")]
    UnknownObject(OwnerId),

    /// A LOD level names a renderer with no description.
    #[error("LOD {lod} references renderer {renderer:?}, which has no description")]
    UnknownRenderer {
        /// LOD level.
        lod: usize,
        /// Missing renderer.
        renderer: RendererId,
    },

    /// Settings are out of range.
    #[error("invalid impostor settings: {0}")]
    InvalidSettings(String),

    /// Static objects cannot move.
    #[error("object {0} is static and cannot move")]
    StaticObject(OwnerId),
}

/// Errors surfaced by [`crate::ImpostorSystem`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Atlas allocation failed.
    #[error(transparent)]
    Atlas(#[from] AtlasError),

    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Registration or an object update was rejected.
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}
