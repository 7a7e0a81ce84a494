//! Every encodable geometry kind in every dimension, as canonical WKT.

use crate::geometry::{Dimension, GeometryType};

pub(crate) const DIMENSIONS: [Dimension; 4] =
    [Dimension::XY, Dimension::XYZ, Dimension::XYM, Dimension::XYZM];

/// One coordinate tuple; Z and M are derived from `x` and `y`.
fn tuple(dim: Dimension, x: f64, y: f64) -> String {
    let mut ordinates = vec![x, y];
    if dim.has_z() {
        ordinates.push(x + y);
    }
    if dim.has_m() {
        ordinates.push(x * 0.5);
    }
    ordinates
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn labeled(dim: Dimension, x: f64, y: f64, labels: &[&str]) -> String {
    let mut out = tuple(dim, x, y);
    for label in labels {
        out.push_str(&format!(" \"{label}\""));
    }
    out
}

fn tag(geom_type: GeometryType, dim: Dimension) -> String {
    match dim.wkt_suffix() {
        "" => geom_type.name().to_string(),
        suffix => format!("{} {suffix}", geom_type.name()),
    }
}

/// A closed ring around the unit square at `origin`, with optional vertex labels.
fn ring(dim: Dimension, origin: f64, size: f64, labels: &[&str]) -> String {
    let corners = [
        (origin, origin),
        (origin + size, origin),
        (origin + size, origin + size),
        (origin, origin),
    ];
    let vertices: Vec<String> = corners
        .iter()
        .map(|&(x, y)| labeled(dim, x, y, labels))
        .collect();
    format!("({})", vertices.join(", "))
}

/// The body of one geometry of `geom_type`, without its keyword.
fn body(geom_type: GeometryType, dim: Dimension) -> String {
    use GeometryType::*;
    let t = |x, y| tuple(dim, x, y);
    match geom_type {
        Point => format!("({})", t(1., 2.)),
        LineString => format!("({}, {}, {})", t(0., 0.), t(4., 0.), t(4., 3.5)),
        // Shell and hole.
        Polygon => format!("({}, {})", ring(dim, 0., 10., &[]), ring(dim, 2., 2., &[])),
        MultiPoint => format!("(({}), ({}))", t(0., 1.), t(1., 2.)),
        MultiLineString => format!(
            "(({}, {}), EMPTY, ({}, {}))",
            t(0., 0.),
            t(1., 1.),
            t(2., 2.),
            t(3., 3.)
        ),
        MultiPolygon => format!("({}, {})", body(Polygon, dim), body(Polygon, dim)),
        GeometryCollection => format!(
            "({} {}, {} {}, {} EMPTY, {} ({} {}, {} {}))",
            tag(Point, dim),
            body(Point, dim),
            tag(ParametricLineString, dim),
            body(ParametricLineString, dim),
            tag(Polygon, dim),
            tag(GeometryCollection, dim),
            tag(Annotation, dim),
            body(Annotation, dim),
            tag(MultiPoint, dim),
            body(MultiPoint, dim),
        ),
        Annotation => format!("({})", labeled(dim, 116.5, 39.5, &["北京"])),
        ParametricPoint => format!("({})", labeled(dim, 1., 2., &["16", "name"])),
        ParametricLineString => format!(
            "({}, {})",
            labeled(dim, 0., 0., &["1", "start"]),
            labeled(dim, 5., 5., &["2", "end"])
        ),
        // Rings carry the polygon's labels.
        ParametricPolygon => format!(
            "({}, {})",
            ring(dim, 0., 10., &["1", "shell"]),
            ring(dim, 2., 2., &["2", "hole"])
        ),
        ParametricAnnotation => format!("({})", labeled(dim, 3., 4., &["7", "gate", "North gate"])),
        Geometry | LinearRing => unreachable!("{geom_type} has no WKT body of its own"),
    }
}

/// Canonical WKT for every kind that has an encoding, in every dimension.
pub(crate) fn all_geometries() -> Vec<(GeometryType, Dimension, String)> {
    use GeometryType::*;
    let kinds = [
        Point,
        LineString,
        Polygon,
        MultiPoint,
        MultiLineString,
        MultiPolygon,
        GeometryCollection,
        Annotation,
        ParametricPoint,
        ParametricLineString,
        ParametricPolygon,
        ParametricAnnotation,
    ];
    let mut out = Vec::new();
    for dim in DIMENSIONS {
        for geom_type in kinds {
            let wkt = format!("{} {}", tag(geom_type, dim), body(geom_type, dim));
            out.push((geom_type, dim, wkt));
        }
        for geom_type in [Point, LineString, Polygon, MultiPolygon, GeometryCollection] {
            out.push((geom_type, dim, format!("{} EMPTY", tag(geom_type, dim))));
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blob::BlobFormat;
    use crate::blob::GeometryBlobWriter;
    use crate::geometry::GeometryHeader;
    use crate::io::wkb::{read_geometry, WkbFlavor, WkbReader, WkbWriter};
    use crate::io::wkt::{read_wkt, Locale, WktWriter};

    #[test]
    fn every_kind_and_dimension_is_covered() {
        let geometries = all_geometries();
        assert_eq!(geometries.len(), 4 * 17);
        for (geom_type, dim, wkt) in &geometries {
            let mut writer = WktWriter::new(Locale::C);
            read_wkt(wkt, &Locale::C, &mut writer).unwrap();
            assert_eq!(&writer.finish().unwrap(), wkt, "{geom_type} {dim}");
        }
    }

    #[test]
    fn wkb_round_trip() {
        for flavor in [WkbFlavor::Iso, WkbFlavor::Spatialite] {
            for (geom_type, dim, wkt) in all_geometries() {
                let mut wkb = WkbWriter::new(flavor);
                read_wkt(&wkt, &Locale::C, &mut wkb).unwrap();
                let wkb = wkb.finish().unwrap();

                let mut reader = WkbReader::new(&wkb, flavor);
                let mut text = WktWriter::new(Locale::C);
                reader.read(&mut text).unwrap();
                assert_eq!(reader.position(), wkb.len(), "{flavor:?} {wkt}");
                assert_eq!(text.finish().unwrap(), wkt, "{flavor:?}");

                let header = WkbReader::new(&wkb, flavor).read_header().unwrap();
                assert_eq!(header, GeometryHeader::new(geom_type, dim));
            }
        }
    }

    #[test]
    fn iso_wkb_is_self_describing() {
        for (_, _, wkt) in all_geometries() {
            let mut wkb = WkbWriter::new(WkbFlavor::Iso);
            read_wkt(&wkt, &Locale::C, &mut wkb).unwrap();
            let wkb = wkb.finish().unwrap();

            let mut text = WktWriter::new(Locale::C);
            read_geometry(&wkb, &mut text).unwrap();
            assert_eq!(text.finish().unwrap(), wkt);
        }
    }

    #[test]
    fn blob_round_trip() {
        for format in [BlobFormat::GeoPackage, BlobFormat::Spatialite] {
            for (geom_type, dim, wkt) in all_geometries() {
                let mut writer = GeometryBlobWriter::new(format, 4326);
                read_wkt(&wkt, &Locale::C, &mut writer).unwrap();
                let blob = writer.finish().unwrap();

                let mut text = WktWriter::new(Locale::C);
                format.read_geometry(&blob, &mut text).unwrap();
                assert_eq!(text.finish().unwrap(), wkt, "{format:?}");

                let (header, geometry) = format.read_geometry_header(&blob).unwrap();
                assert_eq!(header.srid, 4326, "{format:?} {wkt}");
                assert_eq!(header.empty, wkt.ends_with("EMPTY"), "{format:?} {wkt}");
                assert_eq!(geometry, GeometryHeader::new(geom_type, dim));
            }
        }
    }
}
