//! Geometry blobs: the byte layout stored in geometry columns.
//!
//! A blob is a dialect-specific header (SRID, cached envelope, flags) followed by a WKB body.
//! The header can be read and rewritten without touching the body, and a missing envelope is
//! computed lazily by streaming the body through an [`EnvelopeBuilder`].

mod gpkg;
mod spatialite;
mod writer;

pub use writer::GeometryBlobWriter;

use std::io::Cursor;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::consumer::GeometryConsumer;
use crate::error::Result;
use crate::geometry::{Axis, Envelope, EnvelopeBuilder, GeometryHeader};
use crate::io::wkb::{Endianness, WkbFlavor, WkbReader};

/// Header fields of a stored geometry blob.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryBlobHeader {
    pub srid: i32,
    /// Cached envelope. Axes that were not stored are absent.
    pub envelope: Envelope,
    pub empty: bool,
    /// Byte order of the header fields.
    pub byte_order: Endianness,
    /// Length of the encoded header in bytes. Ignored when encoding.
    pub header_len: usize,
}

impl GeometryBlobHeader {
    pub fn new(srid: i32) -> Self {
        Self {
            srid,
            envelope: Envelope::default(),
            empty: false,
            byte_order: Endianness::LittleEndian,
            header_len: 0,
        }
    }

    /// Whether `axis` has to be computed from the body: absent from the header but present in
    /// a non-empty geometry of dimension `geometry.dimension`.
    pub fn needs_scan(&self, axis: Axis, geometry: &GeometryHeader) -> bool {
        let has_axis = match axis {
            Axis::X | Axis::Y => true,
            Axis::Z => geometry.dimension.has_z(),
            Axis::M => geometry.dimension.has_m(),
        };
        !self.empty && has_axis && self.envelope.axis(axis).is_none()
    }
}

/// On-disk blob layout of a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobFormat {
    /// GeoPackage binary: `GP`, version, flags, SRID, envelope, ISO WKB.
    GeoPackage,
    /// SpatiaLite binary: start byte, byte order, SRID, MBR, `0x7C`, class body, `0xFE`.
    Spatialite,
}

impl BlobFormat {
    pub(crate) fn wkb_flavor(&self) -> WkbFlavor {
        match self {
            BlobFormat::GeoPackage => WkbFlavor::Iso,
            BlobFormat::Spatialite => WkbFlavor::Spatialite,
        }
    }

    /// Decode the header of `blob`.
    pub fn read_header(&self, blob: &[u8]) -> Result<GeometryBlobHeader> {
        match self {
            BlobFormat::GeoPackage => gpkg::read_header(blob),
            BlobFormat::Spatialite => spatialite::read_header(blob),
        }
    }

    /// Encode `header`. Envelope axes are written as far as the format can hold them.
    pub fn encode_header(&self, header: &GeometryBlobHeader) -> Result<Vec<u8>> {
        match self {
            BlobFormat::GeoPackage => gpkg::encode_header(header),
            BlobFormat::Spatialite => spatialite::encode_header(header),
        }
    }

    /// The WKB body of `blob`, given its decoded header.
    pub fn body<'a>(&self, blob: &'a [u8], header: &GeometryBlobHeader) -> &'a [u8] {
        match self {
            BlobFormat::GeoPackage => &blob[header.header_len..],
            BlobFormat::Spatialite => spatialite::body(blob, header),
        }
    }

    fn body_reader<'a>(&self, blob: &'a [u8], header: &GeometryBlobHeader) -> WkbReader<'a> {
        WkbReader::new(self.body(blob, header), self.wkb_flavor()).with_byte_order(header.byte_order)
    }

    /// Decode the full geometry stored in `blob` into `consumer`.
    pub fn read_geometry(&self, blob: &[u8], consumer: &mut dyn GeometryConsumer) -> Result<()> {
        let header = self.read_header(blob)?;
        self.body_reader(blob, &header).read(consumer)
    }

    /// Decode the blob header and the kind/dimension of the outermost geometry, without reading
    /// any coordinates.
    pub fn read_geometry_header(&self, blob: &[u8]) -> Result<(GeometryBlobHeader, GeometryHeader)> {
        let header = self.read_header(blob)?;
        let geometry = self.body_reader(blob, &header).read_header()?;
        Ok((header, geometry))
    }

    /// Scan the body and add every envelope axis that `header` is missing.
    pub fn fill_envelope(&self, blob: &[u8], header: &mut GeometryBlobHeader) -> Result<()> {
        let mut builder = EnvelopeBuilder::new();
        self.body_reader(blob, header).read(&mut builder)?;
        header.envelope.fill_missing(&builder.envelope());
        Ok(())
    }

    /// Replace the header of `blob` with `header`, leaving the body bytes untouched.
    pub fn write_blob_header(&self, blob: &mut Vec<u8>, header: &GeometryBlobHeader) -> Result<()> {
        let current = self.read_header(blob)?;
        let encoded = self.encode_header(header)?;
        if encoded.len() == current.header_len {
            blob[..encoded.len()].copy_from_slice(&encoded);
        } else {
            blob.try_reserve(encoded.len().saturating_sub(current.header_len))?;
            blob.splice(..current.header_len, encoded);
        }
        Ok(())
    }
}

fn read_i32(reader: &mut Cursor<&[u8]>, byte_order: Endianness) -> Result<i32> {
    Ok(match byte_order {
        Endianness::BigEndian => reader.read_i32::<BigEndian>()?,
        Endianness::LittleEndian => reader.read_i32::<LittleEndian>()?,
    })
}

fn read_f64(reader: &mut Cursor<&[u8]>, byte_order: Endianness) -> Result<f64> {
    Ok(match byte_order {
        Endianness::BigEndian => reader.read_f64::<BigEndian>()?,
        Endianness::LittleEndian => reader.read_f64::<LittleEndian>()?,
    })
}

fn write_i32(buf: &mut Vec<u8>, byte_order: Endianness, value: i32) -> Result<()> {
    match byte_order {
        Endianness::BigEndian => buf.write_i32::<BigEndian>(value)?,
        Endianness::LittleEndian => buf.write_i32::<LittleEndian>(value)?,
    }
    Ok(())
}

fn write_f64(buf: &mut Vec<u8>, byte_order: Endianness, value: f64) -> Result<()> {
    match byte_order {
        Endianness::BigEndian => buf.write_f64::<BigEndian>(value)?,
        Endianness::LittleEndian => buf.write_f64::<LittleEndian>(value)?,
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::SpatialDbError;
    use crate::geometry::{Extent, GeometryType};
    use crate::io::wkt::{read_wkt, Locale};
    use crate::test::linestring::LINE_STRING_WKT;
    use crate::test::recorder::GeometryRecorder;

    fn blob_from_wkt(format: BlobFormat, wkt: &str, srid: i32) -> Vec<u8> {
        let mut writer = GeometryBlobWriter::new(format, srid);
        read_wkt(wkt, &Locale::C, &mut writer).unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn srid_rewrite_keeps_body() {
        for format in [BlobFormat::GeoPackage, BlobFormat::Spatialite] {
            let mut blob = blob_from_wkt(format, LINE_STRING_WKT, 0);
            let mut header = format.read_header(&blob).unwrap();
            let body = format.body(&blob, &header).to_vec();

            header.srid = 4326;
            format.write_blob_header(&mut blob, &header).unwrap();

            let rewritten = format.read_header(&blob).unwrap();
            assert_eq!(rewritten.srid, 4326);
            assert_eq!(format.body(&blob, &rewritten), body.as_slice());

            // Idempotent.
            let before = blob.clone();
            format.write_blob_header(&mut blob, &rewritten).unwrap();
            assert_eq!(blob, before);
        }
    }

    #[test]
    fn header_growth_preserves_body() {
        let format = BlobFormat::GeoPackage;
        let mut blob = blob_from_wkt(format, "POINT Z (1 2 3)", 0);
        let mut header = format.read_header(&blob).unwrap();
        assert_eq!(header.header_len, 8);
        let body = format.body(&blob, &header).to_vec();

        format.fill_envelope(&blob, &mut header).unwrap();
        format.write_blob_header(&mut blob, &header).unwrap();

        let header = format.read_header(&blob).unwrap();
        assert_eq!(header.header_len, 8 + 3 * 16);
        assert_eq!(header.envelope.z, Some(Extent::new(3., 3.)));
        assert_eq!(format.body(&blob, &header), body.as_slice());
    }

    #[test]
    fn line_string_envelope() {
        for format in [BlobFormat::GeoPackage, BlobFormat::Spatialite] {
            let blob = blob_from_wkt(format, LINE_STRING_WKT, 0);
            let mut header = format.read_header(&blob).unwrap();
            format.fill_envelope(&blob, &mut header).unwrap();
            assert_eq!(header.envelope.x, Some(Extent::new(0., 4.)));
            assert_eq!(header.envelope.y, Some(Extent::new(0., 3.)));
            assert_eq!(header.envelope.z, None);
            assert_eq!(header.envelope.m, None);
        }
    }

    #[test]
    fn needs_scan() {
        let format = BlobFormat::Spatialite;
        let blob = blob_from_wkt(format, "POINT ZM (1 2 3 4)", 0);
        let (header, geometry) = format.read_geometry_header(&blob).unwrap();
        assert!(!header.needs_scan(Axis::X, &geometry));
        assert!(header.needs_scan(Axis::Z, &geometry));
        assert!(header.needs_scan(Axis::M, &geometry));
        assert_eq!(geometry.geom_type, GeometryType::Point);
    }

    #[test]
    fn truncated_blob() {
        for format in [BlobFormat::GeoPackage, BlobFormat::Spatialite] {
            let mut recorder = GeometryRecorder::default();
            let err = format.read_geometry(&[0x47, 0x50, 0x00], &mut recorder).unwrap_err();
            assert!(matches!(err, SpatialDbError::Decode(_)));
            assert!(recorder.events.is_empty());
        }
    }

    #[test]
    fn truncated_body() {
        let format = BlobFormat::GeoPackage;
        let blob = blob_from_wkt(format, LINE_STRING_WKT, 0);
        let mut recorder = GeometryRecorder::default();
        let err = format
            .read_geometry(&blob[..blob.len() - 4], &mut recorder)
            .unwrap_err();
        assert!(matches!(err, SpatialDbError::Decode(_)));
    }
}
