//! ISO-flavored WKB, plus the SpatiaLite body dialect used inside SpatiaLite blobs.
//!
//! Besides the seven OGC kinds, the annotation and parametric extension kinds are encoded with
//! codes 100-104. Their bodies interleave each coordinate tuple with its text fields, every text
//! field being a `u32` byte length followed by UTF-8 bytes.

mod reader;
mod writer;

pub use reader::{read_geometry, WkbReader};
pub use writer::WkbWriter;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{Result, SpatialDbError};
use crate::geometry::{Dimension, GeometryType};

/// Base (2D) WKB type codes.
#[derive(Clone, Copy, Debug, PartialEq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum WKBType {
    Point = 1,
    LineString = 2,
    Polygon = 3,
    MultiPoint = 4,
    MultiLineString = 5,
    MultiPolygon = 6,
    GeometryCollection = 7,
    Annotation = 100,
    ParametricPoint = 101,
    ParametricLineString = 102,
    ParametricPolygon = 103,
    ParametricAnnotation = 104,
}

impl From<WKBType> for GeometryType {
    fn from(value: WKBType) -> Self {
        match value {
            WKBType::Point => GeometryType::Point,
            WKBType::LineString => GeometryType::LineString,
            WKBType::Polygon => GeometryType::Polygon,
            WKBType::MultiPoint => GeometryType::MultiPoint,
            WKBType::MultiLineString => GeometryType::MultiLineString,
            WKBType::MultiPolygon => GeometryType::MultiPolygon,
            WKBType::GeometryCollection => GeometryType::GeometryCollection,
            WKBType::Annotation => GeometryType::Annotation,
            WKBType::ParametricPoint => GeometryType::ParametricPoint,
            WKBType::ParametricLineString => GeometryType::ParametricLineString,
            WKBType::ParametricPolygon => GeometryType::ParametricPolygon,
            WKBType::ParametricAnnotation => GeometryType::ParametricAnnotation,
        }
    }
}

impl TryFrom<GeometryType> for WKBType {
    type Error = SpatialDbError;

    fn try_from(value: GeometryType) -> Result<Self> {
        match value {
            GeometryType::Point => Ok(WKBType::Point),
            GeometryType::LineString => Ok(WKBType::LineString),
            GeometryType::Polygon => Ok(WKBType::Polygon),
            GeometryType::MultiPoint => Ok(WKBType::MultiPoint),
            GeometryType::MultiLineString => Ok(WKBType::MultiLineString),
            GeometryType::MultiPolygon => Ok(WKBType::MultiPolygon),
            GeometryType::GeometryCollection => Ok(WKBType::GeometryCollection),
            GeometryType::Annotation => Ok(WKBType::Annotation),
            GeometryType::ParametricPoint => Ok(WKBType::ParametricPoint),
            GeometryType::ParametricLineString => Ok(WKBType::ParametricLineString),
            GeometryType::ParametricPolygon => Ok(WKBType::ParametricPolygon),
            GeometryType::ParametricAnnotation => Ok(WKBType::ParametricAnnotation),
            GeometryType::Geometry | GeometryType::LinearRing => Err(SpatialDbError::Domain(
                format!("{} has no WKB type code", value.name()),
            )),
        }
    }
}

const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;

/// A decoded WKB type code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeCode {
    pub geom_type: GeometryType,
    pub dimension: Dimension,
    /// EWKB: a 4 byte SRID follows the type code.
    pub has_srid: bool,
}

impl TypeCode {
    /// Decode an ISO (thousands) or EWKB (high bit flags) type code.
    pub fn decode(code: u32) -> Result<Self> {
        let mut has_z = code & EWKB_Z != 0;
        let mut has_m = code & EWKB_M != 0;
        let has_srid = code & EWKB_SRID != 0;

        let iso = code & 0x0FFF_FFFF;
        match iso / 1000 {
            0 => {}
            1 => has_z = true,
            2 => has_m = true,
            3 => {
                has_z = true;
                has_m = true;
            }
            _ => {
                return Err(SpatialDbError::Decode(format!(
                    "Unsupported WKB geometry type {code}"
                )))
            }
        }

        let base = WKBType::try_from(iso % 1000).map_err(|_| {
            SpatialDbError::Decode(format!("Unsupported WKB geometry type {code}"))
        })?;

        Ok(Self {
            geom_type: base.into(),
            dimension: Dimension::from_flags(has_z, has_m),
            has_srid,
        })
    }

    /// Encode a kind and dimension as an ISO type code.
    pub fn encode(geom_type: GeometryType, dimension: Dimension) -> Result<u32> {
        let base: u32 = WKBType::try_from(geom_type)?.into();
        let offset = match dimension {
            Dimension::XY => 0,
            Dimension::XYZ => 1000,
            Dimension::XYM => 2000,
            Dimension::XYZM => 3000,
        };
        Ok(base + offset)
    }
}

/// Byte order of a WKB geometry or blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    BigEndian,
    LittleEndian,
}

impl TryFrom<u8> for Endianness {
    type Error = SpatialDbError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Endianness::BigEndian),
            1 => Ok(Endianness::LittleEndian),
            _ => Err(SpatialDbError::Decode(format!(
                "Unexpected byte order {value}"
            ))),
        }
    }
}

impl From<Endianness> for u8 {
    fn from(value: Endianness) -> Self {
        use Endianness::*;
        match value {
            BigEndian => 0,
            LittleEndian => 1,
        }
    }
}

/// Which WKB body dialect to read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WkbFlavor {
    /// Every geometry starts with its own byte order byte.
    Iso,
    /// SpatiaLite: the outermost geometry has no byte order byte (the blob header carries it),
    /// nested entities start with a `0x69` marker instead.
    Spatialite,
}

/// Marker preceding nested entities in SpatiaLite bodies.
pub(crate) const SPATIALITE_ENTITY: u8 = 0x69;
