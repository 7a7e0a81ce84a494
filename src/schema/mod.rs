//! Spatial database dialects.
//!
//! A [`SpatialSchema`] bundles the metadata conventions and the blob format of one on-disk
//! dialect. Dialects are process-lifetime statics; the active one is chosen once per connection
//! by [`detect_schema`] (or forced by name) and shared by every registered SQL function.

mod geopackage;
pub(crate) mod metadata;
mod spatialite;

pub use geopackage::GeoPackageSchema;
pub use spatialite::{SpatialiteSchema, SpatialiteVersion};

use std::fmt::Debug;
use std::ops::BitOr;
use std::panic::{RefUnwindSafe, UnwindSafe};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::blob::{BlobFormat, GeometryBlobHeader, GeometryBlobWriter};
use crate::consumer::GeometryConsumer;
use crate::error::{ErrorSink, Result, SpatialDbError};
use crate::geometry::{GeometryHeader, GeometryType};

/// Which optional metadata properties [`SpatialSchema::check_meta`] verifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckFlags(u8);

impl CheckFlags {
    /// Only tables, columns and column types.
    pub const NONE: CheckFlags = CheckFlags(0);
    /// Primary key membership of every column.
    pub const PRIMARY_KEY: CheckFlags = CheckFlags(0x01);
    /// NOT NULL constraints of every column.
    pub const NULLABLE: CheckFlags = CheckFlags(0x02);
    pub const ALL: CheckFlags = CheckFlags(0x03);

    pub fn contains(&self, other: CheckFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CheckFlags {
    type Output = CheckFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        CheckFlags(self.0 | rhs.0)
    }
}

/// Optional operations a dialect may not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFeature {
    AddGeometryColumn,
    TilesTable,
    SpatialIndex,
}

impl SchemaFeature {
    fn description(&self) -> &'static str {
        match self {
            SchemaFeature::AddGeometryColumn => "Geometry columns",
            SchemaFeature::TilesTable => "Tiles tables",
            SchemaFeature::SpatialIndex => "Spatial indexes",
        }
    }
}

/// The error reported for a feature `schema` does not implement.
pub fn unsupported(schema_name: &str, feature: SchemaFeature) -> SpatialDbError {
    SpatialDbError::Schema(format!(
        "{} are not supported in {schema_name} mode",
        feature.description()
    ))
}

/// Validate the declared type and the z/m flags of a new geometry column.
pub(crate) fn geometry_column_type(type_name: &str, z: i32, m: i32) -> Result<GeometryType> {
    let geom_type = GeometryType::from_name(type_name)?;
    for (axis, flag) in [("z", z), ("m", m)] {
        if !(0..=2).contains(&flag) {
            return Err(SpatialDbError::Domain(format!(
                "{axis} must be 0, 1 or 2, got {flag}"
            )));
        }
    }
    Ok(geom_type)
}

/// One on-disk spatial database dialect.
///
/// Blob handling defaults to the dialect's [`BlobFormat`]; metadata handling is dialect
/// specific. Optional operations return a Schema error unless [`SpatialSchema::supports`]
/// reports them.
pub trait SpatialSchema: Debug + Send + Sync + RefUnwindSafe + UnwindSafe {
    /// Name reported by `SpatialDBType()`.
    fn name(&self) -> &'static str;

    fn blob_format(&self) -> BlobFormat;

    /// Validate the metadata tables of `db_name`, appending a message per problem to `errors`.
    fn check_meta(
        &self,
        conn: &Connection,
        db_name: &str,
        flags: CheckFlags,
        errors: &mut ErrorSink,
    ) -> Result<()>;

    /// Create missing metadata tables and seed them. Existing tables are left alone.
    fn init_meta(&self, conn: &Connection, db_name: &str) -> Result<()>;

    fn supports(&self, _feature: SchemaFeature) -> bool {
        false
    }

    /// Add a geometry column of declared type `geometry_type` to an existing table and register
    /// it. `z` and `m` are 0 (prohibited), 1 (mandatory) or 2 (optional).
    #[allow(clippy::too_many_arguments)]
    fn add_geometry_column(
        &self,
        _conn: &Connection,
        _db_name: &str,
        _table: &str,
        _column: &str,
        _geometry_type: &str,
        _srid: i32,
        _z: i32,
        _m: i32,
    ) -> Result<()> {
        Err(unsupported(self.name(), SchemaFeature::AddGeometryColumn))
    }

    fn create_tiles_table(&self, _conn: &Connection, _db_name: &str, _table: &str) -> Result<()> {
        Err(unsupported(self.name(), SchemaFeature::TilesTable))
    }

    fn create_spatial_index(
        &self,
        _conn: &Connection,
        _db_name: &str,
        _table: &str,
        _geometry_column: &str,
        _id_column: &str,
    ) -> Result<()> {
        Err(unsupported(self.name(), SchemaFeature::SpatialIndex))
    }

    /// A blob writer with the undefined SRID 0.
    fn writer(&self) -> GeometryBlobWriter {
        self.writer_with_srid(0)
    }

    fn writer_with_srid(&self, srid: i32) -> GeometryBlobWriter {
        GeometryBlobWriter::new(self.blob_format(), srid)
    }

    fn read_blob_header(&self, blob: &[u8]) -> Result<GeometryBlobHeader> {
        self.blob_format().read_header(blob)
    }

    fn write_blob_header(&self, blob: &mut Vec<u8>, header: &GeometryBlobHeader) -> Result<()> {
        self.blob_format().write_blob_header(blob, header)
    }

    fn fill_envelope(&self, blob: &[u8], header: &mut GeometryBlobHeader) -> Result<()> {
        self.blob_format().fill_envelope(blob, header)
    }

    fn read_geometry(&self, blob: &[u8], consumer: &mut dyn GeometryConsumer) -> Result<()> {
        self.blob_format().read_geometry(blob, consumer)
    }

    fn read_geometry_header(&self, blob: &[u8]) -> Result<(GeometryBlobHeader, GeometryHeader)> {
        self.blob_format().read_geometry_header(blob)
    }
}

pub static GEOPACKAGE: GeoPackageSchema = GeoPackageSchema;
pub static SPATIALITE4: SpatialiteSchema = SpatialiteSchema::new(SpatialiteVersion::V4);
pub static SPATIALITE3: SpatialiteSchema = SpatialiteSchema::new(SpatialiteVersion::V3);
pub static SPATIALITE2: SpatialiteSchema = SpatialiteSchema::new(SpatialiteVersion::V2);

/// Every dialect, in detection priority order. The first one is the default.
pub fn schemas() -> [&'static dyn SpatialSchema; 4] {
    [&GEOPACKAGE, &SPATIALITE4, &SPATIALITE3, &SPATIALITE2]
}

/// Look up a dialect by (case-insensitive) name.
pub fn schema_by_name(name: &str) -> Result<&'static dyn SpatialSchema> {
    schemas()
        .into_iter()
        .find(|schema| schema.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| SpatialDbError::Schema(format!("Unknown spatial database type {name}")))
}

/// Select the first dialect whose metadata in `main` validates with primary key and
/// nullability checks, or the default dialect if none does.
pub fn detect_schema(conn: &Connection) -> &'static dyn SpatialSchema {
    let mut errors = ErrorSink::new();
    let candidates = schemas();
    for schema in candidates {
        errors.reset();
        let checked = schema.check_meta(
            conn,
            "main",
            CheckFlags::PRIMARY_KEY | CheckFlags::NULLABLE,
            &mut errors,
        );
        match checked {
            Ok(()) if errors.is_empty() => {
                info!(schema = schema.name(), "detected spatial database type");
                return schema;
            }
            Ok(()) => debug!(
                schema = schema.name(),
                problems = errors.count(),
                "metadata does not match"
            ),
            Err(err) => debug!(schema = schema.name(), %err, "metadata check failed"),
        }
    }

    let fallback = candidates[0];
    info!(
        schema = fallback.name(),
        "no spatial metadata found, using default spatial database type"
    );
    fallback
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_database_falls_back_to_geopackage() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(detect_schema(&conn).name(), "GeoPackage");
    }

    #[test]
    fn detects_initialized_dialect() {
        for schema in schemas() {
            let conn = Connection::open_in_memory().unwrap();
            schema.init_meta(&conn, "main").unwrap();
            assert_eq!(detect_schema(&conn).name(), schema.name());

            let mut errors = ErrorSink::new();
            schema
                .check_meta(&conn, "main", CheckFlags::ALL, &mut errors)
                .unwrap();
            assert!(errors.is_empty(), "{:?}", errors.messages());
        }
    }

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        for schema in [&GEOPACKAGE as &dyn SpatialSchema, &SPATIALITE4] {
            schema.init_meta(&conn, "main").unwrap();
            schema.init_meta(&conn, "main").unwrap();
        }
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(schema_by_name("spatialite3").unwrap().name(), "Spatialite3");
        assert!(matches!(
            schema_by_name("PostGIS"),
            Err(SpatialDbError::Schema(_))
        ));
    }

    #[test]
    fn unsupported_features_name_the_dialect() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(!SPATIALITE4.supports(SchemaFeature::TilesTable));
        let err = SPATIALITE4
            .create_tiles_table(&conn, "main", "tiles")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Schema error: Tiles tables are not supported in Spatialite4 mode"
        );
    }

    #[test]
    fn geometry_column_flags() {
        assert_eq!(
            geometry_column_type("point", 0, 2).unwrap(),
            GeometryType::Point
        );
        assert!(matches!(
            geometry_column_type("POINT", 3, 0),
            Err(SpatialDbError::Domain(_))
        ));
        assert!(matches!(
            geometry_column_type("CIRCLE", 0, 0),
            Err(SpatialDbError::IncorrectGeometryType(_))
        ));
    }

    #[test]
    fn check_flags() {
        let flags = CheckFlags::PRIMARY_KEY | CheckFlags::NULLABLE;
        assert_eq!(flags, CheckFlags::ALL);
        assert!(flags.contains(CheckFlags::NULLABLE));
        assert!(!CheckFlags::NONE.contains(CheckFlags::PRIMARY_KEY));
    }
}
