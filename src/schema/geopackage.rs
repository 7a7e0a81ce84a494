//! The GeoPackage dialect: `gpkg_*` metadata tables, GeoPackage binary blobs, tiles tables and
//! RTree spatial indexes.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::blob::BlobFormat;
use crate::error::{ErrorSink, Result, SpatialDbError};
use crate::geometry::GeometryType;
use crate::schema::metadata::{
    check_tables, create_tables, quote_identifier, quote_literal, table_exists, ColumnSpec,
    TableSpec,
};
use crate::schema::{geometry_column_type, CheckFlags, SchemaFeature, SpatialSchema};

/// `GPKG` as a big-endian integer.
const APPLICATION_ID: i32 = 0x4750_4B47;
const USER_VERSION: i32 = 10200;

const LAST_CHANGE_DEFAULT: &str = "DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))";

static TABLES: [TableSpec; 6] = [
    TableSpec {
        name: "gpkg_spatial_ref_sys",
        columns: &[
            ColumnSpec::new("srs_name", "TEXT").not_null(),
            ColumnSpec::new("srs_id", "INTEGER").not_null().primary_key(),
            ColumnSpec::new("organization", "TEXT").not_null(),
            ColumnSpec::new("organization_coordsys_id", "INTEGER").not_null(),
            ColumnSpec::new("definition", "TEXT").not_null(),
            ColumnSpec::new("description", "TEXT"),
        ],
        constraints: &[],
        required: true,
    },
    TableSpec {
        name: "gpkg_contents",
        columns: &[
            ColumnSpec::new("table_name", "TEXT").not_null().primary_key(),
            ColumnSpec::new("data_type", "TEXT").not_null(),
            ColumnSpec::new("identifier", "TEXT").extra("UNIQUE"),
            ColumnSpec::new("description", "TEXT").extra("DEFAULT ''"),
            ColumnSpec::new("last_change", "DATETIME")
                .not_null()
                .extra(LAST_CHANGE_DEFAULT),
            ColumnSpec::new("min_x", "DOUBLE"),
            ColumnSpec::new("min_y", "DOUBLE"),
            ColumnSpec::new("max_x", "DOUBLE"),
            ColumnSpec::new("max_y", "DOUBLE"),
            ColumnSpec::new("srs_id", "INTEGER"),
        ],
        constraints: &[
            "CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)",
        ],
        required: true,
    },
    TableSpec {
        name: "gpkg_geometry_columns",
        columns: &[
            ColumnSpec::new("table_name", "TEXT").not_null().primary_key(),
            ColumnSpec::new("column_name", "TEXT").not_null().primary_key(),
            ColumnSpec::new("geometry_type_name", "TEXT").not_null(),
            ColumnSpec::new("srs_id", "INTEGER").not_null(),
            ColumnSpec::new("z", "TINYINT").not_null(),
            ColumnSpec::new("m", "TINYINT").not_null(),
        ],
        constraints: &[
            "CONSTRAINT uk_gc_table_name UNIQUE (table_name)",
            "CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name)",
            "CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)",
        ],
        required: true,
    },
    TableSpec {
        name: "gpkg_tile_matrix_set",
        columns: &[
            ColumnSpec::new("table_name", "TEXT").not_null().primary_key(),
            ColumnSpec::new("srs_id", "INTEGER").not_null(),
            ColumnSpec::new("min_x", "DOUBLE").not_null(),
            ColumnSpec::new("min_y", "DOUBLE").not_null(),
            ColumnSpec::new("max_x", "DOUBLE").not_null(),
            ColumnSpec::new("max_y", "DOUBLE").not_null(),
        ],
        constraints: &[
            "CONSTRAINT fk_gtms_table_name FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name)",
            "CONSTRAINT fk_gtms_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)",
        ],
        required: false,
    },
    TableSpec {
        name: "gpkg_tile_matrix",
        columns: &[
            ColumnSpec::new("table_name", "TEXT").not_null().primary_key(),
            ColumnSpec::new("zoom_level", "INTEGER").not_null().primary_key(),
            ColumnSpec::new("matrix_width", "INTEGER").not_null(),
            ColumnSpec::new("matrix_height", "INTEGER").not_null(),
            ColumnSpec::new("tile_width", "INTEGER").not_null(),
            ColumnSpec::new("tile_height", "INTEGER").not_null(),
            ColumnSpec::new("pixel_x_size", "DOUBLE").not_null(),
            ColumnSpec::new("pixel_y_size", "DOUBLE").not_null(),
        ],
        constraints: &[
            "CONSTRAINT fk_tmm_table_name FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name)",
        ],
        required: false,
    },
    TableSpec {
        name: "gpkg_extensions",
        columns: &[
            ColumnSpec::new("table_name", "TEXT"),
            ColumnSpec::new("column_name", "TEXT"),
            ColumnSpec::new("extension_name", "TEXT").not_null(),
            ColumnSpec::new("definition", "TEXT").not_null(),
            ColumnSpec::new("scope", "TEXT").not_null(),
        ],
        constraints: &["CONSTRAINT ge_tce UNIQUE (table_name, column_name, extension_name)"],
        required: false,
    },
];

const WGS84_DEFINITION: &str = "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,\
298.257223563,AUTHORITY[\"EPSG\",\"7030\"]],AUTHORITY[\"EPSG\",\"6326\"]],PRIMEM[\"Greenwich\",0,\
AUTHORITY[\"EPSG\",\"8901\"]],UNIT[\"degree\",0.0174532925199433,AUTHORITY[\"EPSG\",\"9122\"]],\
AUTHORITY[\"EPSG\",\"4326\"]]";

/// `(srs_name, srs_id, organization, organization_coordsys_id, definition, description)`
const SRS_SEEDS: [(&str, i32, &str, i32, &str, &str); 3] = [
    (
        "Undefined cartesian SRS",
        -1,
        "NONE",
        -1,
        "undefined",
        "undefined cartesian coordinate reference system",
    ),
    (
        "Undefined geographic SRS",
        0,
        "NONE",
        0,
        "undefined",
        "undefined geographic coordinate reference system",
    ),
    (
        "WGS 84 geodetic",
        4326,
        "EPSG",
        4326,
        WGS84_DEFINITION,
        "longitude/latitude coordinates in decimal degrees on the WGS 84 spheroid",
    ),
];

/// The GeoPackage dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoPackageSchema;

impl GeoPackageSchema {
    fn insert_extension(
        &self,
        conn: &Connection,
        db_name: &str,
        table: &str,
        column: &str,
        extension: &str,
        definition: &str,
    ) -> Result<()> {
        let sql = format!(
            "INSERT OR IGNORE INTO {}.gpkg_extensions \
             (table_name, column_name, extension_name, definition, scope) \
             VALUES (?1, ?2, ?3, ?4, 'write-only')",
            quote_identifier(db_name)
        );
        conn.execute(&sql, params![table, column, extension, definition])?;
        Ok(())
    }

    /// Triggers that abort inserts and updates storing a geometry whose type is not assignable
    /// to the declared column type.
    fn create_geometry_type_triggers(
        &self,
        conn: &Connection,
        db_name: &str,
        table: &str,
        column: &str,
        geom_type: GeometryType,
    ) -> Result<()> {
        let db = quote_identifier(db_name);
        let t = quote_identifier(table);
        let c = quote_identifier(column);
        let update_event = format!("BEFORE UPDATE OF {c}");
        for (prefix, event, operation) in [
            ("fgti", "BEFORE INSERT", "insert"),
            ("fgtu", update_event.as_str(), "update"),
        ] {
            let name = quote_identifier(&format!("{prefix}_{table}_{column}"));
            let message = quote_literal(&format!(
                "{operation} on {table} violates constraint: column {column} requires {}, \
                 ST_GeometryType(NEW.{column}) is not assignable from \
                 gpkg_geometry_columns.geometry_type_name value",
                geom_type.name()
            ));
            let sql = format!(
                "CREATE TRIGGER {db}.{name} {event} ON {t} FOR EACH ROW BEGIN \
                 SELECT RAISE(ABORT, {message}) \
                 WHERE EXISTS (SELECT 1 FROM gpkg_geometry_columns \
                 WHERE Lower(table_name) = Lower({table_literal}) \
                 AND Lower(column_name) = Lower({column_literal}) \
                 AND GPKG_IsAssignable(geometry_type_name, ST_GeometryType(NEW.{c})) = 0); \
                 END",
                table_literal = quote_literal(table),
                column_literal = quote_literal(column),
            );
            conn.execute_batch(&sql)?;
        }
        self.insert_extension(
            conn,
            db_name,
            table,
            column,
            "gpkg_geometry_type_trigger",
            "GeoPackage 1.0 Specification Annex N",
        )
    }

    /// Whether `table.column` is registered in `gpkg_geometry_columns`.
    fn is_geometry_column(
        &self,
        conn: &Connection,
        db_name: &str,
        table: &str,
        column: &str,
    ) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM {}.gpkg_geometry_columns \
             WHERE table_name = ?1 COLLATE NOCASE AND column_name = ?2 COLLATE NOCASE",
            quote_identifier(db_name)
        );
        Ok(conn
            .query_row(&sql, params![table, column], |_| Ok(()))
            .optional()?
            .is_some())
    }
}

impl SpatialSchema for GeoPackageSchema {
    fn name(&self) -> &'static str {
        "GeoPackage"
    }

    fn blob_format(&self) -> BlobFormat {
        BlobFormat::GeoPackage
    }

    fn check_meta(
        &self,
        conn: &Connection,
        db_name: &str,
        flags: CheckFlags,
        errors: &mut ErrorSink,
    ) -> Result<()> {
        check_tables(conn, db_name, &TABLES, flags, errors)
    }

    fn init_meta(&self, conn: &Connection, db_name: &str) -> Result<()> {
        let db = quote_identifier(db_name);
        create_tables(conn, db_name, &TABLES)?;

        let sql = format!(
            "INSERT OR IGNORE INTO {db}.gpkg_spatial_ref_sys \
             (srs_name, srs_id, organization, organization_coordsys_id, definition, description) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        );
        let mut stmt = conn.prepare(&sql)?;
        for (name, id, organization, coordsys_id, definition, description) in SRS_SEEDS {
            stmt.execute(params![name, id, organization, coordsys_id, definition, description])?;
        }

        conn.execute_batch(&format!(
            "PRAGMA {db}.application_id = {APPLICATION_ID}; PRAGMA {db}.user_version = {USER_VERSION};"
        ))?;
        debug!(db_name, "initialized GeoPackage metadata");
        Ok(())
    }

    fn supports(&self, _feature: SchemaFeature) -> bool {
        true
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
        let db = quote_identifier(db_name);

        let srs_exists = conn
            .query_row(
                &format!("SELECT 1 FROM {db}.gpkg_spatial_ref_sys WHERE srs_id = ?1"),
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
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {db}.gpkg_contents (table_name, data_type, identifier, srs_id) \
                 VALUES (?1, 'features', ?1, ?2)"
            ),
            params![table, srid],
        )?;
        conn.execute(
            &format!(
                "INSERT INTO {db}.gpkg_geometry_columns \
                 (table_name, column_name, geometry_type_name, srs_id, z, m) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![table, column, geom_type.name(), srid, z, m],
        )?;
        self.create_geometry_type_triggers(conn, db_name, table, column, geom_type)
    }

    fn create_tiles_table(&self, conn: &Connection, db_name: &str, table: &str) -> Result<()> {
        let db = quote_identifier(db_name);
        conn.execute_batch(&format!(
            "CREATE TABLE {db}.{} (\
             id INTEGER PRIMARY KEY AUTOINCREMENT, \
             zoom_level INTEGER NOT NULL, \
             tile_column INTEGER NOT NULL, \
             tile_row INTEGER NOT NULL, \
             tile_data BLOB NOT NULL, \
             UNIQUE (zoom_level, tile_column, tile_row))",
            quote_identifier(table)
        ))?;
        conn.execute(
            &format!(
                "INSERT INTO {db}.gpkg_contents (table_name, data_type, identifier) \
                 VALUES (?1, 'tiles', ?1)"
            ),
            params![table],
        )?;
        Ok(())
    }

    fn create_spatial_index(
        &self,
        conn: &Connection,
        db_name: &str,
        table: &str,
        geometry_column: &str,
        id_column: &str,
    ) -> Result<()> {
        if !self.is_geometry_column(conn, db_name, table, geometry_column)? {
            return Err(SpatialDbError::Schema(format!(
                "{table}.{geometry_column} is not a registered geometry column"
            )));
        }

        let db = quote_identifier(db_name);
        let rtree_name = format!("rtree_{table}_{geometry_column}");
        let rtree = quote_identifier(&rtree_name);
        let t = quote_identifier(table);
        let c = quote_identifier(geometry_column);
        let i = quote_identifier(id_column);
        let bounds = |row: &str| {
            format!(
                "ST_MinX({row}.{c}), ST_MaxX({row}.{c}), ST_MinY({row}.{c}), ST_MaxY({row}.{c})"
            )
        };
        let trigger = |suffix: &str| quote_identifier(&format!("{rtree_name}_{suffix}"));

        let sql = format!(
            "CREATE VIRTUAL TABLE {db}.{rtree} USING rtree(id, minx, maxx, miny, maxy);
             INSERT OR REPLACE INTO {db}.{rtree} \
               SELECT {i}, {all} FROM {db}.{t} src \
               WHERE {c} NOT NULL AND NOT ST_IsEmpty({c});
             CREATE TRIGGER {db}.{insert} AFTER INSERT ON {t} \
               WHEN (NEW.{c} NOT NULL AND NOT ST_IsEmpty(NEW.{c})) BEGIN \
               INSERT OR REPLACE INTO {rtree} VALUES (NEW.{i}, {new}); END;
             CREATE TRIGGER {db}.{update1} AFTER UPDATE OF {c} ON {t} \
               WHEN OLD.{i} = NEW.{i} AND (NEW.{c} NOT NULL AND NOT ST_IsEmpty(NEW.{c})) BEGIN \
               INSERT OR REPLACE INTO {rtree} VALUES (NEW.{i}, {new}); END;
             CREATE TRIGGER {db}.{update2} AFTER UPDATE OF {c} ON {t} \
               WHEN OLD.{i} = NEW.{i} AND (NEW.{c} IS NULL OR ST_IsEmpty(NEW.{c})) BEGIN \
               DELETE FROM {rtree} WHERE id = OLD.{i}; END;
             CREATE TRIGGER {db}.{update3} AFTER UPDATE ON {t} \
               WHEN OLD.{i} != NEW.{i} AND (NEW.{c} NOT NULL AND NOT ST_IsEmpty(NEW.{c})) BEGIN \
               DELETE FROM {rtree} WHERE id = OLD.{i}; \
               INSERT OR REPLACE INTO {rtree} VALUES (NEW.{i}, {new}); END;
             CREATE TRIGGER {db}.{update4} AFTER UPDATE ON {t} \
               WHEN OLD.{i} != NEW.{i} AND (NEW.{c} IS NULL OR ST_IsEmpty(NEW.{c})) BEGIN \
               DELETE FROM {rtree} WHERE id IN (OLD.{i}, NEW.{i}); END;
             CREATE TRIGGER {db}.{delete} AFTER DELETE ON {t} \
               WHEN OLD.{c} NOT NULL BEGIN \
               DELETE FROM {rtree} WHERE id = OLD.{i}; END;",
            all = bounds("src"),
            new = bounds("NEW"),
            insert = trigger("insert"),
            update1 = trigger("update1"),
            update2 = trigger("update2"),
            update3 = trigger("update3"),
            update4 = trigger("update4"),
            delete = trigger("delete"),
        );
        conn.execute_batch(&sql)?;

        self.insert_extension(
            conn,
            db_name,
            table,
            geometry_column,
            "gpkg_rtree_index",
            "GeoPackage 1.0 Specification Annex L",
        )
    }
}
