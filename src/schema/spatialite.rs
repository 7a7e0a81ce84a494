//! The SpatiaLite dialects. Versions 2, 3 and 4 share the blob format and differ in the columns
//! of `spatial_ref_sys` and `geometry_columns`.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::blob::BlobFormat;
use crate::error::{ErrorSink, Result, SpatialDbError};
use crate::geometry::{Dimension, GeometryType};
use crate::io::wkb::WKBType;
use crate::schema::metadata::{
    check_tables, create_tables, quote_identifier, table_exists, ColumnSpec, TableSpec,
};
use crate::schema::{geometry_column_type, CheckFlags, SchemaFeature, SpatialSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialiteVersion {
    V2,
    V3,
    V4,
}

static SPATIAL_REF_SYS_V2: TableSpec = TableSpec {
    name: "spatial_ref_sys",
    columns: &[
        ColumnSpec::new("srid", "INTEGER").not_null().primary_key(),
        ColumnSpec::new("auth_name", "TEXT").not_null(),
        ColumnSpec::new("auth_srid", "INTEGER").not_null(),
        ColumnSpec::new("ref_sys_name", "TEXT"),
        ColumnSpec::new("proj4text", "TEXT").not_null(),
    ],
    constraints: &[],
    required: true,
};

static SPATIAL_REF_SYS_V3: TableSpec = TableSpec {
    name: "spatial_ref_sys",
    columns: &[
        ColumnSpec::new("srid", "INTEGER").not_null().primary_key(),
        ColumnSpec::new("auth_name", "TEXT").not_null(),
        ColumnSpec::new("auth_srid", "INTEGER").not_null(),
        ColumnSpec::new("ref_sys_name", "TEXT"),
        ColumnSpec::new("proj4text", "TEXT").not_null(),
        ColumnSpec::new("srs_wkt", "TEXT"),
    ],
    constraints: &[],
    required: true,
};

static SPATIAL_REF_SYS_V4: TableSpec = TableSpec {
    name: "spatial_ref_sys",
    columns: &[
        ColumnSpec::new("srid", "INTEGER").not_null().primary_key(),
        ColumnSpec::new("auth_name", "TEXT").not_null(),
        ColumnSpec::new("auth_srid", "INTEGER").not_null(),
        ColumnSpec::new("ref_sys_name", "TEXT")
            .not_null()
            .extra("DEFAULT 'Unknown'"),
        ColumnSpec::new("proj4text", "TEXT").not_null(),
        ColumnSpec::new("srtext", "TEXT")
            .not_null()
            .extra("DEFAULT 'Undefined'"),
    ],
    constraints: &[],
    required: true,
};

static GEOMETRY_COLUMNS_V2: TableSpec = TableSpec {
    name: "geometry_columns",
    columns: &[
        ColumnSpec::new("f_table_name", "TEXT").not_null().primary_key(),
        ColumnSpec::new("f_geometry_column", "TEXT").not_null().primary_key(),
        ColumnSpec::new("type", "TEXT").not_null(),
        ColumnSpec::new("coord_dimension", "INTEGER").not_null(),
        ColumnSpec::new("srid", "INTEGER"),
        ColumnSpec::new("spatial_index_enabled", "INTEGER").not_null(),
    ],
    constraints: &[],
    required: true,
};

static GEOMETRY_COLUMNS_V3: TableSpec = TableSpec {
    name: "geometry_columns",
    columns: &[
        ColumnSpec::new("f_table_name", "TEXT").not_null().primary_key(),
        ColumnSpec::new("f_geometry_column", "TEXT").not_null().primary_key(),
        ColumnSpec::new("type", "TEXT").not_null(),
        ColumnSpec::new("coord_dimension", "TEXT").not_null(),
        ColumnSpec::new("srid", "INTEGER"),
        ColumnSpec::new("spatial_index_enabled", "INTEGER").not_null(),
    ],
    constraints: &[],
    required: true,
};

static GEOMETRY_COLUMNS_V4: TableSpec = TableSpec {
    name: "geometry_columns",
    columns: &[
        ColumnSpec::new("f_table_name", "TEXT").not_null().primary_key(),
        ColumnSpec::new("f_geometry_column", "TEXT").not_null().primary_key(),
        ColumnSpec::new("geometry_type", "INTEGER").not_null(),
        ColumnSpec::new("coord_dimension", "INTEGER").not_null(),
        ColumnSpec::new("srid", "INTEGER").not_null(),
        ColumnSpec::new("spatial_index_enabled", "INTEGER").not_null(),
    ],
    constraints: &[
        "CONSTRAINT fk_gc_srs FOREIGN KEY (srid) REFERENCES spatial_ref_sys (srid)",
    ],
    required: true,
};

/// `(srid, auth_name, auth_srid, ref_sys_name, proj4text, wkt)`
const SRS_SEEDS: [(i32, &str, i32, &str, &str, &str); 3] = [
    (-1, "NONE", -1, "Undefined - Cartesian", "", "Undefined"),
    (0, "NONE", 0, "Undefined - Geographic Long/Lat", "", "Undefined"),
    (
        4326,
        "epsg",
        4326,
        "WGS 84",
        "+proj=longlat +datum=WGS84 +no_defs",
        "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563]],\
         PRIMEM[\"Greenwich\",0],UNIT[\"degree\",0.0174532925199433],AUTHORITY[\"EPSG\",\"4326\"]]",
    ),
];

/// SpatiaLite v4 `geometry_type` code: the WKB base code (0 for GEOMETRY) plus 1000 for Z and
/// 2000 for M.
fn geometry_type_code(geom_type: GeometryType, dimension: Dimension) -> Result<u32> {
    let base = match geom_type {
        GeometryType::Geometry => 0,
        _ => u32::from(WKBType::try_from(geom_type)?),
    };
    Ok(base + 1000 * dimension.has_z() as u32 + 2000 * dimension.has_m() as u32)
}

/// One SpatiaLite metadata version.
#[derive(Debug, Clone, Copy)]
pub struct SpatialiteSchema {
    version: SpatialiteVersion,
}

impl SpatialiteSchema {
    pub const fn new(version: SpatialiteVersion) -> Self {
        Self { version }
    }

    pub fn version(&self) -> SpatialiteVersion {
        self.version
    }

    fn tables(&self) -> [TableSpec; 2] {
        match self.version {
            SpatialiteVersion::V2 => [SPATIAL_REF_SYS_V2, GEOMETRY_COLUMNS_V2],
            SpatialiteVersion::V3 => [SPATIAL_REF_SYS_V3, GEOMETRY_COLUMNS_V3],
            SpatialiteVersion::V4 => [SPATIAL_REF_SYS_V4, GEOMETRY_COLUMNS_V4],
        }
    }

    fn seed_reference_systems(&self, conn: &Connection, db_name: &str) -> Result<()> {
        let db = quote_identifier(db_name);
        let sql = match self.version {
            SpatialiteVersion::V2 => format!(
                "INSERT OR IGNORE INTO {db}.spatial_ref_sys \
                 (srid, auth_name, auth_srid, ref_sys_name, proj4text) VALUES (?1, ?2, ?3, ?4, ?5)"
            ),
            SpatialiteVersion::V3 => format!(
                "INSERT OR IGNORE INTO {db}.spatial_ref_sys \
                 (srid, auth_name, auth_srid, ref_sys_name, proj4text, srs_wkt) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            SpatialiteVersion::V4 => format!(
                "INSERT OR IGNORE INTO {db}.spatial_ref_sys \
                 (srid, auth_name, auth_srid, ref_sys_name, proj4text, srtext) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
        };
        let mut stmt = conn.prepare(&sql)?;
        for (srid, auth_name, auth_srid, name, proj4, wkt) in SRS_SEEDS {
            match self.version {
                SpatialiteVersion::V2 => {
                    stmt.execute(params![srid, auth_name, auth_srid, name, proj4])?
                }
                _ => stmt.execute(params![srid, auth_name, auth_srid, name, proj4, wkt])?,
            };
        }
        Ok(())
    }
}

impl SpatialSchema for SpatialiteSchema {
    fn name(&self) -> &'static str {
        match self.version {
            SpatialiteVersion::V2 => "Spatialite2",
            SpatialiteVersion::V3 => "Spatialite3",
            SpatialiteVersion::V4 => "Spatialite4",
        }
    }

    fn blob_format(&self) -> BlobFormat {
        BlobFormat::Spatialite
    }

    fn check_meta(
        &self,
        conn: &Connection,
        db_name: &str,
        flags: CheckFlags,
        errors: &mut ErrorSink,
    ) -> Result<()> {
        check_tables(conn, db_name, &self.tables(), flags, errors)
    }

    fn init_meta(&self, conn: &Connection, db_name: &str) -> Result<()> {
        create_tables(conn, db_name, &self.tables())?;
        self.seed_reference_systems(conn, db_name)?;
        debug!(db_name, schema = self.name(), "initialized SpatiaLite metadata");
        Ok(())
    }

    fn supports(&self, feature: SchemaFeature) -> bool {
        feature == SchemaFeature::AddGeometryColumn
    }

    fn add_geometry_column(
        &self,
        conn: &Connection,
        db_name: &str,
        table: &str,
        column: &str,
        geometry_type: &str,
        srid: i32,
        z: i32,
        m: i32,
    ) -> Result<()> {
        let geom_type = geometry_column_type(geometry_type, z, m)?;
        let dimension = Dimension::from_flags(z != 0, m != 0);
        let db = quote_identifier(db_name);

        let srs_exists = conn
            .query_row(
                &format!("SELECT 1 FROM {db}.spatial_ref_sys WHERE srid = ?1"),
                params![srid],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !srs_exists {
            return Err(SpatialDbError::Schema(format!(
                "Spatial reference system {srid} does not exist"
            )));
        }
        if !table_exists(conn, db_name, table)? {
            return Err(SpatialDbError::Schema(format!(
                "Table {db_name}.{table} does not exist"
            )));
        }

        conn.execute_batch(&format!(
            "ALTER TABLE {db}.{} ADD COLUMN {} {}",
            quote_identifier(table),
            quote_identifier(column),
            geom_type.name()
        ))?;

        let table = table.to_lowercase();
        let column = column.to_lowercase();
        match self.version {
            SpatialiteVersion::V2 => conn.execute(
                &format!(
                    "INSERT INTO {db}.geometry_columns (f_table_name, f_geometry_column, type, \
                     coord_dimension, srid, spatial_index_enabled) VALUES (?1, ?2, ?3, ?4, ?5, 0)"
                ),
                params![table, column, geom_type.name(), dimension.size() as i64, srid],
            )?,
            SpatialiteVersion::V3 => conn.execute(
                &format!(
                    "INSERT INTO {db}.geometry_columns (f_table_name, f_geometry_column, type, \
                     coord_dimension, srid, spatial_index_enabled) VALUES (?1, ?2, ?3, ?4, ?5, 0)"
                ),
                params![table, column, geom_type.name(), dimension.to_string(), srid],
            )?,
            SpatialiteVersion::V4 => conn.execute(
                &format!(
                    "INSERT INTO {db}.geometry_columns (f_table_name, f_geometry_column, \
                     geometry_type, coord_dimension, srid, spatial_index_enabled) \
                     VALUES (?1, ?2, ?3, ?4, ?5, 0)"
                ),
                params![
                    table,
                    column,
                    geometry_type_code(geom_type, dimension)?,
                    dimension.size() as i64,
                    srid
                ],
            )?,
        };
        Ok(())
    }
}
