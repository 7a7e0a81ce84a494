use crate::consumer::GeometryConsumer;
use crate::error::Result;
use crate::geometry::GeometryHeader;

/// Min/max pair along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min: f64,
    pub max: f64,
}

impl Extent {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// One of the four coordinate axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
    M,
}

impl Axis {
    fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
            Axis::M => 3,
        }
    }
}

/// Axis-aligned bounding box. Each axis is present or absent independently.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Envelope {
    pub x: Option<Extent>,
    pub y: Option<Extent>,
    pub z: Option<Extent>,
    pub m: Option<Extent>,
}

impl Envelope {
    pub fn axis(&self, axis: Axis) -> Option<Extent> {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
            Axis::M => self.m,
        }
    }

    pub fn set_axis(&mut self, axis: Axis, extent: Option<Extent>) {
        match axis {
            Axis::X => self.x = extent,
            Axis::Y => self.y = extent,
            Axis::Z => self.z = extent,
            Axis::M => self.m = extent,
        }
    }

    /// True when no axis is present.
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none() && self.m.is_none()
    }

    /// Copy every axis that is absent here from `other`. Present axes are kept.
    pub fn fill_missing(&mut self, other: &Envelope) {
        for axis in [Axis::X, Axis::Y, Axis::Z, Axis::M] {
            if self.axis(axis).is_none() {
                self.set_axis(axis, other.axis(axis));
            }
        }
    }

    /// Drop the axes for which `keep` returns false.
    pub fn retain(mut self, keep: impl Fn(Axis) -> bool) -> Self {
        for axis in [Axis::X, Axis::Y, Axis::Z, Axis::M] {
            if !keep(axis) {
                self.set_axis(axis, None);
            }
        }
        self
    }
}

/// A [`GeometryConsumer`] that accumulates the envelope of every coordinate it sees, without
/// materializing the geometry.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeBuilder {
    min: [f64; 4],
    max: [f64; 4],
}

impl EnvelopeBuilder {
    pub fn new() -> Self {
        Self {
            min: [f64::INFINITY; 4],
            max: [f64::NEG_INFINITY; 4],
        }
    }

    fn update(&mut self, axis: usize, value: f64) {
        if value.is_nan() {
            return;
        }
        if value < self.min[axis] {
            self.min[axis] = value;
        }
        if value > self.max[axis] {
            self.max[axis] = value;
        }
    }

    /// The envelope seen so far. Axes without any coordinate are absent.
    pub fn envelope(&self) -> Envelope {
        let extent = |axis: Axis| {
            let i = axis.index();
            (self.min[i] <= self.max[i]).then(|| Extent::new(self.min[i], self.max[i]))
        };
        Envelope {
            x: extent(Axis::X),
            y: extent(Axis::Y),
            z: extent(Axis::Z),
            m: extent(Axis::M),
        }
    }
}

impl Default for EnvelopeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GeometryConsumer for EnvelopeBuilder {
    fn begin_geometry(&mut self, _header: &GeometryHeader) -> Result<()> {
        Ok(())
    }

    fn coordinates(
        &mut self,
        header: &GeometryHeader,
        count: usize,
        coords: &[f64],
        _labels: &[String],
        _offset: usize,
    ) -> Result<()> {
        let dim = header.dimension;
        for tuple in coords.chunks_exact(header.coord_size).take(count) {
            self.update(0, tuple[0]);
            self.update(1, tuple[1]);
            if dim.has_z() {
                self.update(2, tuple[2]);
            }
            if let Some(m) = dim.m_index() {
                self.update(3, tuple[m]);
            }
        }
        Ok(())
    }

    fn end_geometry(&mut self, _header: &GeometryHeader) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::{Dimension, GeometryType};

    #[test]
    fn line_string_envelope() {
        let header = GeometryHeader::new(GeometryType::LineString, Dimension::XY);
        let mut builder = EnvelopeBuilder::new();
        builder.begin_geometry(&header).unwrap();
        builder
            .coordinates(&header, 4, &[0., 0., 4., 0., 4., 3., 0., 3.], &[], 0)
            .unwrap();
        builder.end_geometry(&header).unwrap();

        let envelope = builder.envelope();
        assert_eq!(envelope.x, Some(Extent::new(0., 4.)));
        assert_eq!(envelope.y, Some(Extent::new(0., 3.)));
        assert_eq!(envelope.z, None);
        assert_eq!(envelope.m, None);
    }

    #[test]
    fn xym_goes_to_m_axis() {
        let header = GeometryHeader::new(GeometryType::Point, Dimension::XYM);
        let mut builder = EnvelopeBuilder::new();
        builder
            .coordinates(&header, 1, &[1., 2., 7.], &[], 0)
            .unwrap();

        let envelope = builder.envelope();
        assert_eq!(envelope.z, None);
        assert_eq!(envelope.m, Some(Extent::new(7., 7.)));
    }

    #[test]
    fn nothing_seen_is_empty() {
        assert!(EnvelopeBuilder::new().envelope().is_empty());
    }

    #[test]
    fn fill_missing_keeps_present_axes() {
        let mut cached = Envelope {
            x: Some(Extent::new(0., 1.)),
            y: Some(Extent::new(0., 1.)),
            ..Default::default()
        };
        let scanned = Envelope {
            x: Some(Extent::new(-5., 5.)),
            y: Some(Extent::new(-5., 5.)),
            z: Some(Extent::new(2., 3.)),
            m: None,
        };
        cached.fill_missing(&scanned);
        assert_eq!(cached.x, Some(Extent::new(0., 1.)));
        assert_eq!(cached.z, Some(Extent::new(2., 3.)));
        assert_eq!(cached.m, None);
    }
}
