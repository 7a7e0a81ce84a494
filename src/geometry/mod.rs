//! Geometry kinds, coordinate dimensions, per-geometry headers and envelopes.

mod dimension;
mod envelope;
mod header;
mod r#type;

pub use dimension::{coord_dimension, Dimension};
pub use envelope::{Axis, Envelope, EnvelopeBuilder, Extent};
pub use header::GeometryHeader;
pub use r#type::{is_assignable, GeometryType};
