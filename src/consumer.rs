//! The push-style geometry stream protocol.
//!
//! Every producer (WKB reader, WKT reader, the point constructor) drives a
//! [`GeometryConsumer`], and every sink (WKB writer, WKT writer, blob writer, envelope
//! accumulator) implements it, so any producer can feed any sink.
//!
//! A well-formed stream looks like:
//!
//! ```text
//! begin
//!   begin_geometry(MULTIPOINT)
//!     begin_geometry(POINT)  coordinates(..)  end_geometry(POINT)
//!     begin_geometry(POINT)  coordinates(..)  end_geometry(POINT)
//!   end_geometry(MULTIPOINT)
//! end
//! ```
//!
//! `begin` and `end` occur exactly once. `begin_geometry`/`end_geometry` pairs nest like a stack,
//! and `coordinates` only occurs between a matching pair. Polygon rings are reported as nested
//! [`GeometryType::LinearRing`](crate::geometry::GeometryType::LinearRing) geometries.
//!
//! Any callback may fail, which aborts the stream. Events that were already delivered are not
//! retracted, so a consumer that saw an aborted stream must be discarded.

use crate::error::Result;
use crate::geometry::GeometryHeader;

/// Receiver of a geometry event stream.
pub trait GeometryConsumer {
    /// Start of the stream.
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    /// Start of a (possibly nested) geometry.
    fn begin_geometry(&mut self, header: &GeometryHeader) -> Result<()>;

    /// A run of `count` coordinate tuples belonging to the innermost open geometry.
    ///
    /// `coords` holds `count * header.coord_size` ordinates. `labels` holds the text fields of
    /// extension kinds, `labels.len() / count` per tuple, and is empty for plain geometries.
    /// `offset` is the index of the first tuple of this run within the geometry.
    fn coordinates(
        &mut self,
        header: &GeometryHeader,
        count: usize,
        coords: &[f64],
        labels: &[String],
        offset: usize,
    ) -> Result<()>;

    /// End of the innermost open geometry.
    fn end_geometry(&mut self, header: &GeometryHeader) -> Result<()>;

    /// End of the stream.
    fn end(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<C: GeometryConsumer + ?Sized> GeometryConsumer for &mut C {
    fn begin(&mut self) -> Result<()> {
        (**self).begin()
    }

    fn begin_geometry(&mut self, header: &GeometryHeader) -> Result<()> {
        (**self).begin_geometry(header)
    }

    fn coordinates(
        &mut self,
        header: &GeometryHeader,
        count: usize,
        coords: &[f64],
        labels: &[String],
        offset: usize,
    ) -> Result<()> {
        (**self).coordinates(header, count, coords, labels, offset)
    }

    fn end_geometry(&mut self, header: &GeometryHeader) -> Result<()> {
        (**self).end_geometry(header)
    }

    fn end(&mut self) -> Result<()> {
        (**self).end()
    }
}

/// Drive `consumer` with a single point.
///
/// `coords` holds 2, 3 (XYZ) or 4 (XYZM) ordinates.
pub fn write_point(consumer: &mut dyn GeometryConsumer, coords: &[f64]) -> Result<()> {
    use crate::geometry::{Dimension, GeometryType};

    let header = GeometryHeader::new(GeometryType::Point, Dimension::from_size(coords.len())?);
    consumer.begin()?;
    consumer.begin_geometry(&header)?;
    consumer.coordinates(&header, 1, coords, &[], 0)?;
    consumer.end_geometry(&header)?;
    consumer.end()
}
