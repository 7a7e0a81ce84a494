use std::io::Cursor;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use crate::consumer::GeometryConsumer;
use crate::error::{Result, SpatialDbError};
use crate::geometry::{GeometryHeader, GeometryType};
use crate::io::wkb::{Endianness, TypeCode, WkbFlavor, SPATIALITE_ENTITY};
use crate::io::MAX_NESTING_DEPTH;

/// Minimum encoded size of a ring (its point count).
const RING_MIN_BYTES: usize = 4;

/// Minimum encoded size of a nested tagged geometry (marker + type code).
const ENTITY_MIN_BYTES: usize = 5;

/// Decode one ISO WKB geometry from `buf` and drive `consumer` with it.
pub fn read_geometry(buf: &[u8], consumer: &mut dyn GeometryConsumer) -> Result<()> {
    WkbReader::new(buf, WkbFlavor::Iso).read(consumer)
}

/// Streaming WKB decoder.
///
/// The reader never materializes a geometry: coordinates are pushed to the consumer as soon as a
/// ring, line or point has been read.
#[derive(Debug)]
pub struct WkbReader<'a> {
    reader: Cursor<&'a [u8]>,
    flavor: WkbFlavor,
    /// Byte order of SpatiaLite bodies, which is stored in the enclosing blob header.
    byte_order: Endianness,
}

impl<'a> WkbReader<'a> {
    pub fn new(buf: &'a [u8], flavor: WkbFlavor) -> Self {
        Self {
            reader: Cursor::new(buf),
            flavor,
            byte_order: Endianness::LittleEndian,
        }
    }

    /// Set the byte order of a SpatiaLite body.
    pub fn with_byte_order(mut self, byte_order: Endianness) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.reader.position() as usize
    }

    /// Decode one geometry, wrapped in `begin`/`end`.
    pub fn read(&mut self, consumer: &mut dyn GeometryConsumer) -> Result<()> {
        consumer.begin()?;
        let (header, byte_order) = self.read_tag(false)?;
        self.read_body(consumer, &header, byte_order, 0)?;
        consumer.end()
    }

    /// Decode only the kind and dimension of the outermost geometry.
    pub fn read_header(&mut self) -> Result<GeometryHeader> {
        let (header, _) = self.read_tag(false)?;
        Ok(header)
    }

    fn remaining(&self) -> usize {
        self.reader
            .get_ref()
            .len()
            .saturating_sub(self.position())
    }

    fn ensure_remaining(&self, needed: usize) -> Result<()> {
        if needed > self.remaining() {
            Err(SpatialDbError::Decode(format!(
                "truncated WKB: need {needed} bytes at offset {}, {} available",
                self.position(),
                self.remaining()
            )))
        } else {
            Ok(())
        }
    }

    fn read_u32(&mut self, byte_order: Endianness) -> Result<u32> {
        Ok(match byte_order {
            Endianness::BigEndian => self.reader.read_u32::<BigEndian>()?,
            Endianness::LittleEndian => self.reader.read_u32::<LittleEndian>()?,
        })
    }

    fn read_f64(&mut self, byte_order: Endianness) -> Result<f64> {
        Ok(match byte_order {
            Endianness::BigEndian => self.reader.read_f64::<BigEndian>()?,
            Endianness::LittleEndian => self.reader.read_f64::<LittleEndian>()?,
        })
    }

    /// Read an element count, rejecting counts the remaining bytes could never hold.
    fn read_count(&mut self, byte_order: Endianness, min_element_bytes: usize) -> Result<usize> {
        let count = self.read_u32(byte_order)? as usize;
        self.ensure_remaining(count.saturating_mul(min_element_bytes))?;
        Ok(count)
    }

    fn read_ordinates(
        &mut self,
        byte_order: Endianness,
        count: usize,
        out: &mut Vec<f64>,
    ) -> Result<()> {
        self.ensure_remaining(count.saturating_mul(8))?;
        out.try_reserve(count)?;
        for _ in 0..count {
            out.push(self.read_f64(byte_order)?);
        }
        Ok(())
    }

    fn read_text(&mut self, byte_order: Endianness) -> Result<String> {
        let len = self.read_u32(byte_order)? as usize;
        self.ensure_remaining(len)?;
        let start = self.position();
        let bytes = &self.reader.get_ref()[start..start + len];
        let text = std::str::from_utf8(bytes)
            .map_err(|err| SpatialDbError::Decode(format!("invalid UTF-8 in label: {err}")))?
            .to_string();
        self.reader.set_position((start + len) as u64);
        Ok(text)
    }

    /// Read one coordinate tuple followed by `label_count` text fields.
    fn read_tuple(
        &mut self,
        byte_order: Endianness,
        coord_size: usize,
        label_count: usize,
        coords: &mut Vec<f64>,
        labels: &mut Vec<String>,
    ) -> Result<()> {
        self.read_ordinates(byte_order, coord_size, coords)?;
        for _ in 0..label_count {
            labels.push(self.read_text(byte_order)?);
        }
        Ok(())
    }

    /// Read the byte order (or entity marker) and type code of a tagged geometry.
    fn read_tag(&mut self, nested: bool) -> Result<(GeometryHeader, Endianness)> {
        let byte_order = match self.flavor {
            WkbFlavor::Iso => Endianness::try_from(self.reader.read_u8()?)?,
            WkbFlavor::Spatialite => {
                if nested {
                    let marker = self.reader.read_u8()?;
                    if marker != SPATIALITE_ENTITY {
                        return Err(SpatialDbError::Decode(format!(
                            "Unexpected entity marker {marker:#04x}"
                        )));
                    }
                }
                self.byte_order
            }
        };

        let code = TypeCode::decode(self.read_u32(byte_order)?)?;
        if code.has_srid {
            // EWKB embedded SRID; the blob header is authoritative.
            self.read_u32(byte_order)?;
        }
        Ok((GeometryHeader::new(code.geom_type, code.dimension), byte_order))
    }

    fn read_body(
        &mut self,
        consumer: &mut dyn GeometryConsumer,
        header: &GeometryHeader,
        byte_order: Endianness,
        depth: usize,
    ) -> Result<()> {
        consumer.begin_geometry(header)?;

        let mut coords = Vec::new();
        let mut labels = Vec::new();
        match header.geom_type {
            GeometryType::Point => {
                self.read_ordinates(byte_order, header.coord_size, &mut coords)?;
                // All-NaN ordinates encode POINT EMPTY.
                if !coords.iter().all(|c| c.is_nan()) {
                    consumer.coordinates(header, 1, &coords, &labels, 0)?;
                }
            }
            GeometryType::Annotation
            | GeometryType::ParametricPoint
            | GeometryType::ParametricAnnotation => {
                self.read_tuple(
                    byte_order,
                    header.coord_size,
                    header.geom_type.label_count(),
                    &mut coords,
                    &mut labels,
                )?;
                consumer.coordinates(header, 1, &coords, &labels, 0)?;
            }
            GeometryType::LineString | GeometryType::ParametricLineString => {
                let label_count = header.geom_type.label_count();
                self.read_vertices(consumer, header, label_count, byte_order)?;
            }
            GeometryType::Polygon | GeometryType::ParametricPolygon => {
                let num_rings = self.read_count(byte_order, RING_MIN_BYTES)?;
                let ring = header.with_type(GeometryType::LinearRing);
                // Rings of parametric polygons carry the polygon's vertex labels.
                let label_count = header.geom_type.label_count();
                for _ in 0..num_rings {
                    consumer.begin_geometry(&ring)?;
                    self.read_vertices(consumer, &ring, label_count, byte_order)?;
                    consumer.end_geometry(&ring)?;
                }
            }
            GeometryType::MultiPoint
            | GeometryType::MultiLineString
            | GeometryType::MultiPolygon
            | GeometryType::GeometryCollection => {
                if depth >= MAX_NESTING_DEPTH {
                    return Err(SpatialDbError::Decode(format!(
                        "{} nested deeper than {MAX_NESTING_DEPTH} levels at offset {}",
                        header.geom_type,
                        self.position()
                    )));
                }
                let num_geometries = self.read_count(byte_order, ENTITY_MIN_BYTES)?;
                for _ in 0..num_geometries {
                    let (child, child_order) = self.read_tag(true)?;
                    if let Some(element) = header.geom_type.element_type() {
                        if child.geom_type != element {
                            return Err(SpatialDbError::Decode(format!(
                                "{} member of {}",
                                child.geom_type, header.geom_type
                            )));
                        }
                    }
                    if child.dimension != header.dimension {
                        return Err(SpatialDbError::Decode(format!(
                            "{} member of {} {}",
                            child.dimension, header.dimension, header.geom_type
                        )));
                    }
                    self.read_body(consumer, &child, child_order, depth + 1)?;
                }
            }
            GeometryType::Geometry | GeometryType::LinearRing => {
                return Err(SpatialDbError::Decode(format!(
                    "{} cannot be encoded as WKB",
                    header.geom_type
                )))
            }
        }

        consumer.end_geometry(header)
    }

    /// Read a counted run of vertices (line string or ring) and push it in one batch.
    fn read_vertices(
        &mut self,
        consumer: &mut dyn GeometryConsumer,
        header: &GeometryHeader,
        label_count: usize,
        byte_order: Endianness,
    ) -> Result<()> {
        let coord_size = header.coord_size;
        let tuple_bytes = coord_size * 8 + label_count * 4;
        let num_points = self.read_count(byte_order, tuple_bytes)?;

        let mut coords = Vec::new();
        let mut labels = Vec::new();
        if label_count == 0 {
            self.read_ordinates(byte_order, num_points * coord_size, &mut coords)?;
        } else {
            coords.try_reserve(num_points * coord_size)?;
            labels.try_reserve(num_points * label_count)?;
            for _ in 0..num_points {
                self.read_tuple(
                    byte_order,
                    coord_size,
                    label_count,
                    &mut coords,
                    &mut labels,
                )?;
            }
        }

        if num_points > 0 {
            consumer.coordinates(header, num_points, &coords, &labels, 0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::Dimension;
    use crate::io::wkb::WkbWriter;
    use crate::test::recorder::{Event, GeometryRecorder};

    fn big_endian_point() -> Vec<u8> {
        let mut buf = vec![0];
        buf.extend_from_slice(&1u32.to_be_bytes());
        buf.extend_from_slice(&1f64.to_be_bytes());
        buf.extend_from_slice(&2f64.to_be_bytes());
        buf
    }

    #[test]
    fn reads_big_endian() {
        let mut recorder = GeometryRecorder::default();
        read_geometry(&big_endian_point(), &mut recorder).unwrap();

        let header = GeometryHeader::new(GeometryType::Point, Dimension::XY);
        assert_eq!(
            recorder.events,
            vec![
                Event::Begin,
                Event::BeginGeometry(header),
                Event::Coordinates(vec![1., 2.], vec![]),
                Event::EndGeometry(header),
                Event::End,
            ]
        );
    }

    #[test]
    fn truncated_input() {
        let mut recorder = GeometryRecorder::default();
        let err = read_geometry(&[1, 1, 0], &mut recorder).unwrap_err();
        assert!(matches!(err, SpatialDbError::Decode(_)));

        let wkb = big_endian_point();
        let err = read_geometry(&wkb[..wkb.len() - 1], &mut recorder).unwrap_err();
        assert!(matches!(err, SpatialDbError::Decode(_)));
    }

    #[test]
    fn absurd_counts_are_rejected() {
        let mut wkb = vec![1];
        wkb.extend_from_slice(&2u32.to_le_bytes());
        wkb.extend_from_slice(&u32::MAX.to_le_bytes());
        let mut recorder = GeometryRecorder::default();
        assert!(matches!(
            read_geometry(&wkb, &mut recorder),
            Err(SpatialDbError::Decode(_))
        ));
    }

    #[test]
    fn ewkb_srid_is_skipped() {
        let mut wkb = vec![1];
        wkb.extend_from_slice(&(0x2000_0001u32 | 0x8000_0000).to_le_bytes());
        wkb.extend_from_slice(&4326u32.to_le_bytes());
        for v in [1f64, 2., 3.] {
            wkb.extend_from_slice(&v.to_le_bytes());
        }

        let mut reader = WkbReader::new(&wkb, WkbFlavor::Iso);
        let mut recorder = GeometryRecorder::default();
        reader.read(&mut recorder).unwrap();
        assert_eq!(reader.position(), wkb.len());
        assert_eq!(
            recorder.events[1],
            Event::BeginGeometry(GeometryHeader::new(GeometryType::Point, Dimension::XYZ))
        );
        assert_eq!(recorder.events[2], Event::Coordinates(vec![1., 2., 3.], vec![]));
    }

    #[test]
    fn wrong_member_kind() {
        let mut wkb = vec![1];
        wkb.extend_from_slice(&4u32.to_le_bytes());
        wkb.extend_from_slice(&1u32.to_le_bytes());
        wkb.push(1);
        wkb.extend_from_slice(&2u32.to_le_bytes());
        wkb.extend_from_slice(&0u32.to_le_bytes());
        let mut recorder = GeometryRecorder::default();
        assert!(read_geometry(&wkb, &mut recorder).is_err());
    }

    /// `levels` collections, each holding the next, around an empty innermost one.
    fn nested_collections(levels: usize) -> Vec<u8> {
        let mut wkb = Vec::new();
        for i in 0..levels {
            wkb.push(1);
            wkb.extend_from_slice(&7u32.to_le_bytes());
            let count: u32 = if i + 1 < levels { 1 } else { 0 };
            wkb.extend_from_slice(&count.to_le_bytes());
        }
        wkb
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let mut recorder = GeometryRecorder::default();
        read_geometry(&nested_collections(MAX_NESTING_DEPTH), &mut recorder).unwrap();

        let mut recorder = GeometryRecorder::default();
        let err = read_geometry(&nested_collections(MAX_NESTING_DEPTH + 2), &mut recorder)
            .unwrap_err();
        assert!(matches!(err, SpatialDbError::Decode(_)));

        // Far deeper than any stack could recurse.
        let mut recorder = GeometryRecorder::default();
        let err = read_geometry(&nested_collections(200_000), &mut recorder).unwrap_err();
        assert!(matches!(err, SpatialDbError::Decode(_)));
    }

    #[test]
    fn header_only() {
        let wkb = big_endian_point();
        let mut reader = WkbReader::new(&wkb, WkbFlavor::Iso);
        let header = reader.read_header().unwrap();
        assert_eq!(header.geom_type, GeometryType::Point);
        assert_eq!(reader.position(), 5);
    }

    #[test]
    fn parametric_polygon_rings_carry_labels() {
        let polygon = GeometryHeader::new(GeometryType::ParametricPolygon, Dimension::XY);
        let ring = polygon.with_type(GeometryType::LinearRing);
        let labels: Vec<String> = ["1", "a", "2", "b", "3", "c", "1", "a"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let coords = [0., 0., 1., 0., 1., 1., 0., 0.];

        let mut writer = WkbWriter::new(WkbFlavor::Iso);
        writer.begin_geometry(&polygon).unwrap();
        writer.begin_geometry(&ring).unwrap();
        writer.coordinates(&ring, 4, &coords, &labels, 0).unwrap();
        writer.end_geometry(&ring).unwrap();
        writer.end_geometry(&polygon).unwrap();
        let wkb = writer.finish().unwrap();

        let mut recorder = GeometryRecorder::default();
        read_geometry(&wkb, &mut recorder).unwrap();
        assert_eq!(
            recorder.events[3],
            Event::Coordinates(coords.to_vec(), labels)
        );
    }

    #[test]
    fn spatialite_bad_marker() {
        let mut body = Vec::new();
        body.extend_from_slice(&4u32.to_le_bytes());
        body.extend_from_slice(&1u32.to_le_bytes());
        body.push(0x42);
        body.extend_from_slice(&1u32.to_le_bytes());
        body.extend_from_slice(&[0; 16]);
        let mut recorder = GeometryRecorder::default();
        let err = WkbReader::new(&body, WkbFlavor::Spatialite)
            .read(&mut recorder)
            .unwrap_err();
        assert!(matches!(err, SpatialDbError::Decode(_)));
    }
}
