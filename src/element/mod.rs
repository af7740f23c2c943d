//! Element layer
//!
//! Geometry math, element handles with their browser-side probe, and the
//! actionability engine deciding when interaction is safe.

pub mod actionability;
pub mod geometry;
pub mod handle;

pub use actionability::{ActionabilityCheck, ActionabilityEngine, ActionabilityResult};
pub use geometry::{BoundingBox, VisibilitySnapshot};
pub use handle::{center_of, ElementHandle, ElementProbe, RuntimeProbe};
