use crate::blob::{spatialite, BlobFormat, GeometryBlobHeader};
use crate::consumer::GeometryConsumer;
use crate::error::{Result, SpatialDbError};
use crate::geometry::{Axis, EnvelopeBuilder, GeometryHeader, GeometryType};
use crate::io::wkb::WkbWriter;

/// A [`GeometryConsumer`] that builds a complete geometry blob: the WKB body is encoded while
/// the envelope is accumulated, and the header is prepended in [`GeometryBlobWriter::finish`].
///
/// Dropping the writer without calling `finish` releases the partial body.
#[derive(Debug)]
pub struct GeometryBlobWriter {
    format: BlobFormat,
    srid: i32,
    body: WkbWriter,
    envelope: EnvelopeBuilder,
    /// Header of the outermost geometry.
    geometry: Option<GeometryHeader>,
    vertices: usize,
}

impl GeometryBlobWriter {
    pub fn new(format: BlobFormat, srid: i32) -> Self {
        Self {
            format,
            srid,
            body: WkbWriter::new(format.wkb_flavor()),
            envelope: EnvelopeBuilder::new(),
            geometry: None,
            vertices: 0,
        }
    }

    /// Kind of the outermost geometry seen so far.
    pub fn geometry_type(&self) -> Option<GeometryType> {
        self.geometry.map(|g| g.geom_type)
    }

    /// Assemble the blob.
    pub fn finish(self) -> Result<Vec<u8>> {
        let geometry = self.geometry.ok_or_else(|| {
            SpatialDbError::Decode("geometry stream without a geometry".to_string())
        })?;
        let body = self.body.finish()?;

        let mut header = GeometryBlobHeader::new(self.srid);
        header.empty = self.vertices == 0;
        if !header.empty {
            header.envelope = match self.format {
                // Single vertices are their own envelope, so GeoPackage leaves it out.
                BlobFormat::GeoPackage if geometry.geom_type.is_single_vertex() => {
                    Default::default()
                }
                _ => self.envelope.envelope().retain(|axis| match axis {
                    Axis::X | Axis::Y => true,
                    Axis::Z => geometry.dimension.has_z(),
                    Axis::M => geometry.dimension.has_m(),
                }),
            };
        }

        let mut blob = self.format.encode_header(&header)?;
        let trailer = usize::from(self.format == BlobFormat::Spatialite);
        blob.try_reserve(body.len() + trailer)?;
        blob.extend_from_slice(&body);
        if self.format == BlobFormat::Spatialite {
            blob.push(spatialite::END);
        }
        Ok(blob)
    }
}

impl GeometryConsumer for GeometryBlobWriter {
    fn begin(&mut self) -> Result<()> {
        self.body.begin()
    }

    fn begin_geometry(&mut self, header: &GeometryHeader) -> Result<()> {
        if self.geometry.is_none() {
            self.geometry = Some(*header);
        }
        self.body.begin_geometry(header)?;
        self.envelope.begin_geometry(header)
    }

    fn coordinates(
        &mut self,
        header: &GeometryHeader,
        count: usize,
        coords: &[f64],
        labels: &[String],
        offset: usize,
    ) -> Result<()> {
        self.vertices += count;
        self.body
            .coordinates(header, count, coords, labels, offset)?;
        self.envelope
            .coordinates(header, count, coords, labels, offset)
    }

    fn end_geometry(&mut self, header: &GeometryHeader) -> Result<()> {
        self.body.end_geometry(header)?;
        self.envelope.end_geometry(header)
    }

    fn end(&mut self) -> Result<()> {
        self.body.end()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::consumer::write_point;
    use crate::geometry::Extent;
    use crate::io::wkt::{read_wkt, Locale};
    use crate::test::annotation::ANNOTATION_WKT;
    use crate::test::linestring::{COLLECTION_WKT, MULTI_POLYGON_ZM_WKT};
    use crate::test::recorder::GeometryRecorder;

    fn build(format: BlobFormat, wkt: &str) -> Vec<u8> {
        let mut writer = GeometryBlobWriter::new(format, 4326);
        read_wkt(wkt, &Locale::C, &mut writer).unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn point_has_no_envelope() {
        let mut writer = GeometryBlobWriter::new(BlobFormat::GeoPackage, 4326);
        write_point(&mut writer, &[1., 2.]).unwrap();
        assert_eq!(writer.geometry_type(), Some(GeometryType::Point));
        let blob = writer.finish().unwrap();

        let header = BlobFormat::GeoPackage.read_header(&blob).unwrap();
        assert_eq!(header.srid, 4326);
        assert!(header.envelope.is_empty());
        assert!(!header.empty);
        assert_eq!(blob.len(), 8 + 21);
    }

    #[test]
    fn full_envelope_matches_dimension() {
        let blob = build(BlobFormat::GeoPackage, MULTI_POLYGON_ZM_WKT);
        let header = BlobFormat::GeoPackage.read_header(&blob).unwrap();
        assert_eq!(header.envelope.x, Some(Extent::new(0., 6.)));
        assert_eq!(header.envelope.z, Some(Extent::new(1., 2.)));
        assert_eq!(header.envelope.m, Some(Extent::new(5., 10.)));
    }

    #[test]
    fn empty_flag() {
        for format in [BlobFormat::GeoPackage, BlobFormat::Spatialite] {
            let blob = build(format, "POLYGON EMPTY");
            let header = format.read_header(&blob).unwrap();
            assert!(header.empty);
            assert!(header.envelope.is_empty());
        }
        let header = BlobFormat::GeoPackage
            .read_header(&build(BlobFormat::GeoPackage, COLLECTION_WKT))
            .unwrap();
        assert!(!header.empty);
    }

    #[test]
    fn blob_round_trip() {
        for format in [BlobFormat::GeoPackage, BlobFormat::Spatialite] {
            let blob = build(format, ANNOTATION_WKT);

            let mut direct = GeometryRecorder::default();
            read_wkt(ANNOTATION_WKT, &Locale::C, &mut direct).unwrap();
            let mut decoded = GeometryRecorder::default();
            format.read_geometry(&blob, &mut decoded).unwrap();
            assert_eq!(direct.events, decoded.events);
        }
    }

    #[test]
    fn unfinished_stream_is_not_a_blob() {
        let writer = GeometryBlobWriter::new(BlobFormat::GeoPackage, 0);
        assert!(writer.finish().is_err());
    }
}
