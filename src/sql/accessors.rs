//! Functions reading properties of an existing geometry blob.
//!
//! Every accessor returns NULL for a NULL geometry. Most of them only decode the blob header and
//! the first WKB header of the body; envelope bounds scan the body only when the header lacks
//! the requested axis.

use rusqlite::functions::Context;
use rusqlite::types::Value;

use crate::error::Result;
use crate::geometry::{is_assignable, Axis, GeometryType};
use crate::io::wkb::{WkbFlavor, WkbWriter};
use crate::io::wkt::WktWriter;
use crate::sql::{args, FunctionContext, Functions};

pub(crate) fn register(functions: &mut Functions<'_>) -> Result<()> {
    functions.add("ST", "MinX", 1..=1, true, |fc, ctx| bound(fc, ctx, Axis::X, false))?;
    functions.add("ST", "MaxX", 1..=1, true, |fc, ctx| bound(fc, ctx, Axis::X, true))?;
    functions.add("ST", "MinY", 1..=1, true, |fc, ctx| bound(fc, ctx, Axis::Y, false))?;
    functions.add("ST", "MaxY", 1..=1, true, |fc, ctx| bound(fc, ctx, Axis::Y, true))?;
    functions.add("ST", "MinZ", 1..=1, true, |fc, ctx| bound(fc, ctx, Axis::Z, false))?;
    functions.add("ST", "MaxZ", 1..=1, true, |fc, ctx| bound(fc, ctx, Axis::Z, true))?;
    functions.add("ST", "MinM", 1..=1, true, |fc, ctx| bound(fc, ctx, Axis::M, false))?;
    functions.add("ST", "MaxM", 1..=1, true, |fc, ctx| bound(fc, ctx, Axis::M, true))?;
    functions.add("ST", "SRID", 1..=2, true, srid)?;
    functions.add("ST", "IsEmpty", 1..=1, true, is_empty)?;
    functions.add("ST", "Is3d", 1..=1, true, is_3d)?;
    functions.add("ST", "IsMeasured", 1..=1, true, is_measured)?;
    functions.add("ST", "CoordDim", 1..=1, true, coord_dim)?;
    functions.add("ST", "GeometryType", 1..=1, true, geometry_type)?;
    functions.add("ST", "AsBinary", 1..=1, true, as_binary)?;
    functions.add("ST", "AsText", 1..=1, true, as_text)?;
    functions.add("GPKG", "IsAssignable", 2..=2, true, is_assignable_fn)?;
    functions.add("GPKG", "SpatialDBType", 0..=0, false, |fc, _| {
        Ok(fc.schema.name())
    })?;
    Ok(())
}

fn bound(fc: &FunctionContext, ctx: &Context<'_>, axis: Axis, max: bool) -> Result<Option<f64>> {
    let Some(blob) = args::blob(ctx, 0)? else {
        return Ok(None);
    };
    let (mut header, geometry) = fc.schema.read_geometry_header(blob)?;
    if header.needs_scan(axis, &geometry) {
        fc.schema.fill_envelope(blob, &mut header)?;
    }
    Ok(header
        .envelope
        .axis(axis)
        .map(|extent| if max { extent.max } else { extent.min }))
}

/// `SRID(g)` reads the SRID, `SRID(g, srid)` returns `g` with its header rewritten.
fn srid(fc: &FunctionContext, ctx: &Context<'_>) -> Result<Value> {
    let Some(blob) = args::blob(ctx, 0)? else {
        return Ok(Value::Null);
    };
    let mut header = fc.schema.read_blob_header(blob)?;
    if ctx.len() == 1 {
        return Ok(Value::Integer(header.srid.into()));
    }

    header.srid = args::int(ctx, 1)?;
    let mut blob = blob.to_vec();
    fc.schema.write_blob_header(&mut blob, &header)?;
    Ok(Value::Blob(blob))
}

fn is_empty(fc: &FunctionContext, ctx: &Context<'_>) -> Result<Option<bool>> {
    let Some(blob) = args::blob(ctx, 0)? else {
        return Ok(None);
    };
    Ok(Some(fc.schema.read_blob_header(blob)?.empty))
}

fn is_3d(fc: &FunctionContext, ctx: &Context<'_>) -> Result<Option<bool>> {
    let Some(blob) = args::blob(ctx, 0)? else {
        return Ok(None);
    };
    let (_, geometry) = fc.schema.read_geometry_header(blob)?;
    Ok(Some(geometry.dimension.has_z()))
}

fn is_measured(fc: &FunctionContext, ctx: &Context<'_>) -> Result<Option<bool>> {
    let Some(blob) = args::blob(ctx, 0)? else {
        return Ok(None);
    };
    let (_, geometry) = fc.schema.read_geometry_header(blob)?;
    Ok(Some(geometry.dimension.has_m()))
}

fn coord_dim(fc: &FunctionContext, ctx: &Context<'_>) -> Result<Option<i64>> {
    let Some(blob) = args::blob(ctx, 0)? else {
        return Ok(None);
    };
    let (_, geometry) = fc.schema.read_geometry_header(blob)?;
    Ok(Some(geometry.coord_size as i64))
}

fn geometry_type(fc: &FunctionContext, ctx: &Context<'_>) -> Result<Option<&'static str>> {
    let Some(blob) = args::blob(ctx, 0)? else {
        return Ok(None);
    };
    let (_, geometry) = fc.schema.read_geometry_header(blob)?;
    Ok(Some(geometry.geom_type.name()))
}

fn as_binary(fc: &FunctionContext, ctx: &Context<'_>) -> Result<Option<Vec<u8>>> {
    let Some(blob) = args::blob(ctx, 0)? else {
        return Ok(None);
    };
    let mut writer = WkbWriter::new(WkbFlavor::Iso);
    fc.schema.read_geometry(blob, &mut writer)?;
    Ok(Some(writer.finish()?))
}

fn as_text(fc: &FunctionContext, ctx: &Context<'_>) -> Result<Option<String>> {
    let Some(blob) = args::blob(ctx, 0)? else {
        return Ok(None);
    };
    let mut writer = WktWriter::new(fc.locale);
    fc.schema.read_geometry(blob, &mut writer)?;
    Ok(Some(writer.finish()?))
}

fn is_assignable_fn(_fc: &FunctionContext, ctx: &Context<'_>) -> Result<Option<bool>> {
    let (Some(expected), Some(actual)) = (args::text(ctx, 0)?, args::text(ctx, 1)?) else {
        return Ok(None);
    };
    let expected = GeometryType::from_name(expected)?;
    let actual = GeometryType::from_name(actual)?;
    Ok(Some(is_assignable(expected, actual)))
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use rusqlite::Connection;

    use crate::test::linestring::*;
    use crate::test::spatial_db;

    fn query<T: rusqlite::types::FromSql>(conn: &Connection, sql: &str) -> T {
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn envelope_bounds() {
        let conn = spatial_db();
        let sql = format!(
            "SELECT ST_MinX(g), ST_MaxX(g), ST_MinY(g), ST_MaxY(g), ST_MinZ(g), ST_MaxM(g) \
             FROM (SELECT ST_GeomFromText('{LINE_STRING_WKT}') AS g)"
        );
        let bounds: (f64, f64, f64, f64, Option<f64>, Option<f64>) = conn
            .query_row(&sql, [], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })
            .unwrap();
        assert_eq!(bounds, (0., 4., 0., 3., None, None));
    }

    #[test]
    fn point_bounds_are_scanned() {
        let conn = spatial_db();
        let min_z: f64 = query(&conn, "SELECT ST_MinZ(ST_Point(1.5, 2.5, 3.25))");
        assert_relative_eq!(min_z, 3.25);
        let max_m: f64 = query(&conn, "SELECT ST_MaxM(ST_GeomFromText('POINT ZM (1 2 3 4)'))");
        assert_relative_eq!(max_m, 4.);
    }

    #[test]
    fn empty_geometry() {
        let conn = spatial_db();
        let (empty, min_x): (bool, Option<f64>) = conn
            .query_row(
                "SELECT ST_IsEmpty(g), ST_MinX(g) FROM (SELECT ST_GeomFromText('LINESTRING EMPTY') AS g)",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert!(empty);
        assert_eq!(min_x, None);

        let empty: bool = query(&conn, &format!("SELECT ST_IsEmpty(ST_GeomFromText('{POLYGON_WKT}'))"));
        assert!(!empty);
    }

    #[test]
    fn srid_rewrite() {
        let conn = spatial_db();
        let (srid, text, original_len, rewritten_len): (i64, String, i64, i64) = conn
            .query_row(
                "SELECT ST_SRID(r), ST_AsText(r), length(g), length(r) FROM \
                 (SELECT g, ST_SRID(g, 4326) AS r FROM (SELECT ST_GeomFromText('POINT (1 2)') AS g))",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();
        assert_eq!(srid, 4326);
        assert_eq!(text, "POINT (1 2)");
        assert_eq!(original_len, rewritten_len);

        let srid: i64 = query(&conn, "SELECT ST_SRID(ST_GeomFromText('POINT (1 2)'))");
        assert_eq!(srid, 0);
    }

    #[test]
    fn dimension_accessors() {
        let conn = spatial_db();
        let sql = format!(
            "SELECT ST_Is3d(g), ST_IsMeasured(g), ST_CoordDim(g), ST_GeometryType(g) \
             FROM (SELECT ST_GeomFromText('{MULTI_POLYGON_ZM_WKT}') AS g)"
        );
        let row: (bool, bool, i64, String) = conn
            .query_row(&sql, [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .unwrap();
        assert_eq!(row, (true, true, 4, "MULTIPOLYGON".to_string()));
    }

    #[test]
    fn null_in_null_out() {
        let conn = spatial_db();
        for function in ["ST_MinX", "ST_SRID", "ST_IsEmpty", "ST_GeometryType", "ST_AsText"] {
            let value: Option<String> = query(&conn, &format!("SELECT {function}(NULL)"));
            assert_eq!(value, None);
        }
    }

    #[test]
    fn malformed_blob() {
        let conn = spatial_db();
        let result = conn.query_row("SELECT ST_AsText(x'475000')", [], |row| {
            row.get::<_, String>(0)
        });
        assert!(result.is_err());
        let result = conn.query_row("SELECT ST_AsText('POINT (1 2)')", [], |row| {
            row.get::<_, String>(0)
        });
        assert!(result.is_err());
    }

    #[test]
    fn assignability() {
        let conn = spatial_db();
        let row: (bool, bool, bool, Option<bool>) = conn
            .query_row(
                "SELECT GPKG_IsAssignable('GEOMETRY', 'POINT'), IsAssignable('POINT', 'LINESTRING'), \
                 IsAssignable('ANNOTATION', 'POINT'), IsAssignable(NULL, 'POINT')",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();
        assert_eq!(row, (true, false, false, None));
        assert!(conn
            .query_row("SELECT IsAssignable('CIRCLE', 'POINT')", [], |_| Ok(()))
            .is_err());
    }
}
