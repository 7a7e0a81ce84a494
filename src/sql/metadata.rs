//! Functions inspecting and changing spatial metadata.
//!
//! Mutating functions run inside a savepoint: if any step fails, everything the call did is
//! rolled back and the error is returned as the function's result.

use rusqlite::functions::Context;
use rusqlite::types::{Null, ValueRef};
use rusqlite::Connection;
use tracing::warn;

use crate::error::{ErrorSink, Result};
use crate::schema::{unsupported, CheckFlags, SchemaFeature};
use crate::sql::{args, FunctionContext, Functions};

pub(crate) fn register(functions: &mut Functions<'_>) -> Result<()> {
    functions.add("GPKG", "CheckSpatialMetaData", 0..=2, false, check_spatial_metadata)?;
    functions.add("GPKG", "InitSpatialMetaData", 0..=1, false, init_spatial_metadata)?;
    functions.add("GPKG", "AddGeometryColumn", 4..=7, false, add_geometry_column)?;
    functions.add("GPKG", "CreateTilesTable", 1..=2, false, create_tiles_table)?;
    functions.add("GPKG", "CreateSpatialIndex", 3..=4, false, create_spatial_index)?;
    Ok(())
}

/// Run `f` inside savepoint `name`, rolling back to it if `f` fails.
fn in_savepoint<T>(
    conn: &Connection,
    name: &str,
    f: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    conn.execute_batch(&format!("SAVEPOINT {name}"))?;
    match f(conn) {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name}"))?;
            Ok(value)
        }
        Err(err) => {
            warn!(savepoint = name, %err, "rolling back spatial metadata change");
            let sql = format!("ROLLBACK TO {name}; RELEASE {name}");
            if let Err(rollback) = conn.execute_batch(&sql) {
                warn!(savepoint = name, %rollback, "rollback of spatial metadata change failed");
            }
            Err(err)
        }
    }
}

/// Run `f` with the connection that invoked the function.
fn with_connection<T>(ctx: &Context<'_>, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
    // SAFETY: the connection is only used for the duration of this call, on the calling thread.
    let conn = unsafe { ctx.get_connection()? };
    f(&conn)
}

/// The database name argument at `idx` if the call has `with_db` arguments, the default
/// database otherwise.
fn database<'a>(
    fc: &'a FunctionContext,
    ctx: &'a Context<'_>,
    with_db: usize,
) -> Result<&'a str> {
    if ctx.len() == with_db {
        args::name(ctx, 0)
    } else {
        Ok(&fc.default_database)
    }
}

/// `CheckSpatialMetaData([db][, strict])`. A single argument is the database name when it is
/// text and the strict flag otherwise. Any nonzero flag enables every optional check.
fn check_spatial_metadata(fc: &FunctionContext, ctx: &Context<'_>) -> Result<Null> {
    let (db_name, strict) = match ctx.len() {
        0 => (fc.default_database.as_str(), 0),
        1 => match ctx.get_raw(0) {
            ValueRef::Text(_) => (args::name(ctx, 0)?, 0),
            _ => (fc.default_database.as_str(), args::int(ctx, 0)?),
        },
        _ => (args::name(ctx, 0)?, args::int(ctx, 1)?),
    };
    let flags = if strict != 0 {
        CheckFlags::ALL
    } else {
        CheckFlags::NONE
    };

    let mut errors = ErrorSink::new();
    with_connection(ctx, |conn| {
        fc.schema.check_meta(conn, db_name, flags, &mut errors)
    })?;
    errors.into_result()?;
    Ok(Null)
}

/// `InitSpatialMetaData([db])`
fn init_spatial_metadata(fc: &FunctionContext, ctx: &Context<'_>) -> Result<Null> {
    let db_name = database(fc, ctx, 1)?;
    with_connection(ctx, |conn| {
        in_savepoint(conn, "spatialdb_init_metadata", |conn| {
            fc.schema.init_meta(conn, db_name)
        })
    })?;
    Ok(Null)
}

/// `AddGeometryColumn([db,] table, column, type, srid[, z, m])`. Without explicit flags both z
/// and m are optional (2).
fn add_geometry_column(fc: &FunctionContext, ctx: &Context<'_>) -> Result<Null> {
    let n = ctx.len();
    let first = if n == 5 || n == 7 { 1 } else { 0 };
    let db_name = if first == 1 {
        args::name(ctx, 0)?
    } else {
        fc.default_database.as_str()
    };
    let table = args::name(ctx, first)?;
    let column = args::name(ctx, first + 1)?;
    let geometry_type = args::name(ctx, first + 2)?;
    let srid = args::int(ctx, first + 3)?;
    let (z, m) = if n >= 6 {
        (args::int(ctx, first + 4)?, args::int(ctx, first + 5)?)
    } else {
        (2, 2)
    };

    if !fc.schema.supports(SchemaFeature::AddGeometryColumn) {
        return Err(unsupported(fc.schema.name(), SchemaFeature::AddGeometryColumn));
    }
    with_connection(ctx, |conn| {
        in_savepoint(conn, "spatialdb_add_geometry_column", |conn| {
            fc.schema.init_meta(conn, db_name)?;
            fc.schema
                .add_geometry_column(conn, db_name, table, column, geometry_type, srid, z, m)
        })
    })?;
    Ok(Null)
}

/// `CreateTilesTable([db,] table)`
fn create_tiles_table(fc: &FunctionContext, ctx: &Context<'_>) -> Result<Null> {
    let db_name = database(fc, ctx, 2)?;
    let table = args::name(ctx, ctx.len() - 1)?;

    if !fc.schema.supports(SchemaFeature::TilesTable) {
        return Err(unsupported(fc.schema.name(), SchemaFeature::TilesTable));
    }
    with_connection(ctx, |conn| {
        in_savepoint(conn, "spatialdb_create_tiles_table", |conn| {
            fc.schema.init_meta(conn, db_name)?;
            fc.schema.create_tiles_table(conn, db_name, table)
        })
    })?;
    Ok(Null)
}

/// `CreateSpatialIndex([db,] table, geometry_column, id_column)`
fn create_spatial_index(fc: &FunctionContext, ctx: &Context<'_>) -> Result<Null> {
    let db_name = database(fc, ctx, 4)?;
    let first = ctx.len() - 3;
    let table = args::name(ctx, first)?;
    let geometry_column = args::name(ctx, first + 1)?;
    let id_column = args::name(ctx, first + 2)?;

    if !fc.schema.supports(SchemaFeature::SpatialIndex) {
        return Err(unsupported(fc.schema.name(), SchemaFeature::SpatialIndex));
    }
    with_connection(ctx, |conn| {
        in_savepoint(conn, "spatialdb_create_spatial_index", |conn| {
            fc.schema.init_meta(conn, db_name)?;
            fc.schema
                .create_spatial_index(conn, db_name, table, geometry_column, id_column)
        })
    })?;
    Ok(Null)
}
