//! Streaming readers and writers for the Well-Known Binary and Well-Known Text geometry
//! encodings. Readers drive a [`GeometryConsumer`](crate::consumer::GeometryConsumer); writers
//! implement it.

pub mod wkb;
pub mod wkt;

/// Deepest collection nesting the readers accept. Deeper input is rejected before it can exhaust
/// the stack.
pub const MAX_NESTING_DEPTH: usize = 128;
