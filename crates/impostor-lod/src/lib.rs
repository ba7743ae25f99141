//! Per-object impostor state and the per-frame decision pipeline:
//! frustum visibility, screen-size driven mode decisions, and bounded
//! selection of which stale snapshots get refreshed this frame.

mod decision;
mod frustum;
mod object;
mod selector;
mod table;

pub use decision::{
    FrameView, angle_between_degrees, compute_decisions, compute_visibility, decide,
    ideal_resolution, screen_size,
};
pub use frustum::{Aabb, Frustum};
pub use object::{
    ImpostorSettings, LastUpdate, LodThresholds, ObjectData, RequiredAction, TrackedObject,
};
pub use selector::{ByScreenSizeAndStaleness, UpdateBudget, UpdatePrioritizer, select_updates};
pub use table::ObjectTable;
