use std::fmt::Display;
use std::str::FromStr;

use phf::phf_map;

use crate::error::{Result, SpatialDbError};

/// The kind of a geometry.
///
/// Besides the OGC simple feature kinds this includes the annotation and parametric extension
/// kinds, which carry text fields next to their coordinates. [`GeometryType::LinearRing`] only
/// appears as the ring element of (parametric) polygons and has no textual name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryType {
    Geometry,
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
    /// A point with a text label: `ANNOTATION(x y "text")`.
    Annotation,
    /// A point with a type code and a name.
    ParametricPoint,
    /// A line string whose vertices each carry a type code and a name.
    ParametricLineString,
    /// A polygon whose ring vertices each carry a type code and a name.
    ParametricPolygon,
    /// A point with a type code, a name and a text label.
    ParametricAnnotation,
    LinearRing,
}

static TYPE_NAMES: phf::Map<&'static str, GeometryType> = phf_map! {
    "GEOMETRY" => GeometryType::Geometry,
    "POINT" => GeometryType::Point,
    "LINESTRING" => GeometryType::LineString,
    "POLYGON" => GeometryType::Polygon,
    "MULTIPOINT" => GeometryType::MultiPoint,
    "MULTILINESTRING" => GeometryType::MultiLineString,
    "MULTIPOLYGON" => GeometryType::MultiPolygon,
    "GEOMETRYCOLLECTION" => GeometryType::GeometryCollection,
    "ANNOTATION" => GeometryType::Annotation,
    "PARAMETRICPOINT" => GeometryType::ParametricPoint,
    "PARAMETRICLINESTRING" => GeometryType::ParametricLineString,
    "PARAMETRICPOLYGON" => GeometryType::ParametricPolygon,
    "PARAMETRICANNOTATION" => GeometryType::ParametricAnnotation,
};

impl GeometryType {
    /// Look up a geometry type by its (case-insensitive) name.
    pub fn from_name(name: &str) -> Result<Self> {
        TYPE_NAMES
            .get(name.trim().to_ascii_uppercase().as_str())
            .copied()
            .ok_or_else(|| {
                SpatialDbError::IncorrectGeometryType(format!("Invalid geometry type {name}"))
            })
    }

    /// The upper-case name of this type, as used in WKT and in metadata tables.
    pub fn name(&self) -> &'static str {
        use GeometryType::*;
        match self {
            Geometry => "GEOMETRY",
            Point => "POINT",
            LineString => "LINESTRING",
            Polygon => "POLYGON",
            MultiPoint => "MULTIPOINT",
            MultiLineString => "MULTILINESTRING",
            MultiPolygon => "MULTIPOLYGON",
            GeometryCollection => "GEOMETRYCOLLECTION",
            Annotation => "ANNOTATION",
            ParametricPoint => "PARAMETRICPOINT",
            ParametricLineString => "PARAMETRICLINESTRING",
            ParametricPolygon => "PARAMETRICPOLYGON",
            ParametricAnnotation => "PARAMETRICANNOTATION",
            LinearRing => "LINEARRING",
        }
    }

    /// Whether this is one of the annotation/parametric extension kinds.
    pub fn is_extension(&self) -> bool {
        use GeometryType::*;
        matches!(
            self,
            Annotation
                | ParametricPoint
                | ParametricLineString
                | ParametricPolygon
                | ParametricAnnotation
        )
    }

    /// Number of text fields attached to every vertex of this kind.
    pub fn label_count(&self) -> usize {
        use GeometryType::*;
        match self {
            Annotation => 1,
            ParametricPoint | ParametricLineString | ParametricPolygon => 2,
            ParametricAnnotation => 3,
            _ => 0,
        }
    }

    /// The member kind of a homogeneous MULTI* collection.
    pub fn element_type(&self) -> Option<GeometryType> {
        use GeometryType::*;
        match self {
            MultiPoint => Some(Point),
            MultiLineString => Some(LineString),
            MultiPolygon => Some(Polygon),
            _ => None,
        }
    }

    /// Whether geometries of this kind contain other tagged geometries.
    pub fn is_collection(&self) -> bool {
        use GeometryType::*;
        matches!(
            self,
            MultiPoint | MultiLineString | MultiPolygon | GeometryCollection
        )
    }

    /// Whether geometries of this kind are a single vertex.
    pub fn is_single_vertex(&self) -> bool {
        use GeometryType::*;
        matches!(
            self,
            Point | Annotation | ParametricPoint | ParametricAnnotation
        )
    }
}

/// Whether a value of kind `actual` may be stored where `expected` is declared.
///
/// `actual` must be `expected` itself, or `expected` is the universal GEOMETRY supertype, or
/// `expected` is a MULTI* collection and `actual` is its element kind. Extension kinds are
/// leaves: only themselves and GEOMETRY accept them.
pub fn is_assignable(expected: GeometryType, actual: GeometryType) -> bool {
    if actual == GeometryType::LinearRing {
        return expected == GeometryType::LinearRing;
    }
    expected == actual
        || expected == GeometryType::Geometry
        || expected.element_type() == Some(actual)
}

impl FromStr for GeometryType {
    type Err = SpatialDbError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl Display for GeometryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names_round_trip() {
        for (name, typ) in TYPE_NAMES.entries() {
            assert_eq!(typ.name(), *name);
            assert_eq!(GeometryType::from_name(name).unwrap(), *typ);
        }
    }

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(
            GeometryType::from_name("multiPolygon").unwrap(),
            GeometryType::MultiPolygon
        );
        assert_eq!(
            "ParametricPoint".parse::<GeometryType>().unwrap(),
            GeometryType::ParametricPoint
        );
    }

    #[test]
    fn unknown_name() {
        let err = GeometryType::from_name("CIRCLE").unwrap_err();
        assert!(matches!(err, SpatialDbError::IncorrectGeometryType(_)));
        assert!(GeometryType::from_name("LINEARRING").is_err());
    }

    #[test]
    fn assignability() {
        use GeometryType::*;
        assert!(is_assignable(Geometry, Point));
        assert!(!is_assignable(Point, LineString));
        assert!(!is_assignable(Annotation, Point));
        assert!(is_assignable(MultiPoint, Point));
        assert!(is_assignable(MultiPolygon, Polygon));
        assert!(!is_assignable(Point, MultiPoint));
        assert!(!is_assignable(GeometryCollection, MultiPoint));
        assert!(is_assignable(Geometry, ParametricPolygon));
        assert!(is_assignable(ParametricPoint, ParametricPoint));
        assert!(!is_assignable(ParametricPoint, Point));
        assert!(!is_assignable(Point, ParametricPoint));
    }

    #[test]
    fn label_counts() {
        assert_eq!(GeometryType::Point.label_count(), 0);
        assert_eq!(GeometryType::Annotation.label_count(), 1);
        assert_eq!(GeometryType::ParametricLineString.label_count(), 2);
        assert_eq!(GeometryType::ParametricAnnotation.label_count(), 3);
    }
}
