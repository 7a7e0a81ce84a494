use byteorder::{ByteOrder, LittleEndian};

use crate::consumer::GeometryConsumer;
use crate::error::{Result, SpatialDbError};
use crate::geometry::{GeometryHeader, GeometryType};
use crate::io::wkb::{Endianness, TypeCode, WkbFlavor, SPATIALITE_ENTITY};

/// One open geometry. Counts are not known up front, so a placeholder is written and patched
/// when the geometry ends.
#[derive(Debug)]
struct Frame {
    header: GeometryHeader,
    count_offset: Option<usize>,
    count: usize,
}

/// A [`GeometryConsumer`] that encodes the stream as little-endian WKB.
///
/// Buffer growth is fallible: an allocation failure surfaces as
/// [`SpatialDbError::Allocation`] from the callback that needed the space.
#[derive(Debug)]
pub struct WkbWriter {
    flavor: WkbFlavor,
    buf: Vec<u8>,
    stack: Vec<Frame>,
}

impl WkbWriter {
    pub fn new(flavor: WkbFlavor) -> Self {
        Self {
            flavor,
            buf: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// The bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take the encoded geometry. Fails if the stream left a geometry open.
    pub fn finish(self) -> Result<Vec<u8>> {
        if let Some(frame) = self.stack.last() {
            return Err(SpatialDbError::Decode(format!(
                "unterminated {} in geometry stream",
                frame.header.geom_type
            )));
        }
        Ok(self.buf)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.try_reserve(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    fn write_u32(&mut self, value: u32) -> Result<()> {
        let mut bytes = [0; 4];
        LittleEndian::write_u32(&mut bytes, value);
        self.write_bytes(&bytes)
    }

    fn write_f64(&mut self, value: f64) -> Result<()> {
        let mut bytes = [0; 8];
        LittleEndian::write_f64(&mut bytes, value);
        self.write_bytes(&bytes)
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        let len = u32::try_from(text.len())
            .map_err(|_| SpatialDbError::Domain("label too long".to_string()))?;
        self.write_u32(len)?;
        self.write_bytes(text.as_bytes())
    }

    /// Reserve room for a count and remember where it goes.
    fn write_count_placeholder(&mut self) -> Result<usize> {
        let offset = self.buf.len();
        self.write_u32(0)?;
        Ok(offset)
    }
}

impl GeometryConsumer for WkbWriter {
    fn begin_geometry(&mut self, header: &GeometryHeader) -> Result<()> {
        let nested = match self.stack.last_mut() {
            Some(parent) => {
                parent.count += 1;
                true
            }
            None => false,
        };

        if header.geom_type != GeometryType::LinearRing {
            match self.flavor {
                WkbFlavor::Iso => self.write_u8(Endianness::LittleEndian.into())?,
                WkbFlavor::Spatialite if nested => self.write_u8(SPATIALITE_ENTITY)?,
                WkbFlavor::Spatialite => {}
            }
            self.write_u32(TypeCode::encode(header.geom_type, header.dimension)?)?;
        }

        let count_offset = if header.geom_type.is_single_vertex() {
            None
        } else {
            Some(self.write_count_placeholder()?)
        };
        self.stack.push(Frame {
            header: *header,
            count_offset,
            count: 0,
        });
        Ok(())
    }

    fn coordinates(
        &mut self,
        header: &GeometryHeader,
        count: usize,
        coords: &[f64],
        labels: &[String],
        _offset: usize,
    ) -> Result<()> {
        let (single_vertex, seen) = match self.stack.last() {
            Some(frame) if !frame.header.geom_type.is_collection() => {
                (frame.header.geom_type.is_single_vertex(), frame.count)
            }
            _ => {
                return Err(SpatialDbError::Decode(
                    "coordinates outside of a point, line or ring".to_string(),
                ))
            }
        };
        if single_vertex && seen + count > 1 {
            return Err(SpatialDbError::Decode(format!(
                "{} with more than one vertex",
                header.geom_type
            )));
        }

        let coord_size = header.coord_size;
        let arity = if count == 0 { 0 } else { labels.len() / count };
        for i in 0..count {
            for value in &coords[i * coord_size..(i + 1) * coord_size] {
                self.write_f64(*value)?;
            }
            for label in &labels[i * arity..(i + 1) * arity] {
                self.write_text(label)?;
            }
        }

        if let Some(frame) = self.stack.last_mut() {
            frame.count += count;
        }
        Ok(())
    }

    fn end_geometry(&mut self, header: &GeometryHeader) -> Result<()> {
        let frame = self.stack.pop().ok_or_else(|| {
            SpatialDbError::Decode(format!("unmatched end of {}", header.geom_type))
        })?;
        if frame.header.geom_type != header.geom_type {
            return Err(SpatialDbError::Decode(format!(
                "{} closed while {} is open",
                header.geom_type, frame.header.geom_type
            )));
        }

        match frame.count_offset {
            Some(offset) => {
                let count = u32::try_from(frame.count)
                    .map_err(|_| SpatialDbError::Domain("too many elements".to_string()))?;
                LittleEndian::write_u32(&mut self.buf[offset..offset + 4], count);
            }
            None if frame.count == 0 => {
                if header.geom_type != GeometryType::Point {
                    return Err(SpatialDbError::Decode(format!(
                        "empty {} cannot be encoded",
                        header.geom_type
                    )));
                }
                for _ in 0..header.coord_size {
                    self.write_f64(f64::NAN)?;
                }
            }
            None => {}
        }
        Ok(())
    }
}
