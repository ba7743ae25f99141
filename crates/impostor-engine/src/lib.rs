//! Impostor allocation and update scheduling.
//!
//! [`ImpostorSystem`] owns the object table, the atlas chunk pool and the
//! per-object render caches. Hosts register LOD groups, call
//! [`ImpostorSystem::tick`] once per frame with the main camera, and receive
//! snapshot command buffers and chunk draws through their
//! [`RenderPipeline`](impostor_render::RenderPipeline).

mod clock;
mod dispatcher;
mod draw;
mod error;
mod registry;
mod system;

pub use clock::{Clock, ManualClock, UnscaledClock};
pub use draw::cascade_color;
pub use error::{EngineError, RegistrationError};
pub use registry::{ImpostorLod, ImpostorLodGroup, Registration};
pub use system::{CameraState, FrameStats, ImpostorSystem};
