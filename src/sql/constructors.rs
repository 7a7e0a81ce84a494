//! Functions building geometry blobs from WKB, WKT or coordinates.
//!
//! The last blob built by a call site is cached in the auxiliary data of argument 0, together
//! with the remaining arguments. SQLite drops that data as soon as argument 0 changes between
//! rows; the cached blob is reused only when the remaining arguments are equal as well.

use rusqlite::functions::Context;
use rusqlite::types::{Value, ValueRef};

use crate::consumer::{write_point, GeometryConsumer};
use crate::error::{Result, SpatialDbError};
use crate::geometry::{is_assignable, GeometryType};
use crate::io::wkb::read_geometry;
use crate::io::wkt::read_wkt;
use crate::sql::{args, FunctionContext, Functions};

pub(crate) fn register(functions: &mut Functions<'_>, aliases: bool) -> Result<()> {
    functions.add("ST", "GeomFromWKB", 1..=2, true, geom_from_wkb)?;
    functions.add("ST", "GeomFromText", 1..=2, true, geom_from_text)?;
    functions.add("ST", "Point", 1..=5, true, point)?;
    if aliases {
        functions.add("ST", "WKBToSQL", 1..=2, true, geom_from_wkb)?;
        functions.add("ST", "WKTToSQL", 1..=2, true, geom_from_text)?;
        functions.add("ST", "MakePoint", 1..=5, true, point)?;
    }
    Ok(())
}

/// A blob built by an earlier call, and the arguments after the first one that it was built
/// with.
#[derive(Debug)]
struct CachedGeometry {
    args: Vec<Value>,
    blob: Vec<u8>,
}

/// Where the geometry comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Wkb,
    Wkt,
    Coordinates,
}

impl Source {
    /// Split the arguments into geometry arguments and an optional trailing SRID.
    ///
    /// WKB and WKT take an integer SRID as second argument. Coordinates take one when the last
    /// argument is an integer and the others form a 2D or 4D point.
    fn split_srid(&self, ctx: &Context<'_>) -> Result<(usize, Option<i32>)> {
        let n = ctx.len();
        // A trailing INTEGER after the geometry or the x, y pair is an SRID.
        let first_optional = match self {
            Source::Wkb | Source::Wkt => 1,
            Source::Coordinates => 2,
        };
        let has_srid = n > first_optional && args::is_integer(ctx, n - 1);
        if has_srid {
            Ok((n - 1, Some(args::int(ctx, n - 1)?)))
        } else {
            Ok((n, None))
        }
    }

    fn produce(
        &self,
        fc: &FunctionContext,
        ctx: &Context<'_>,
        n_args: usize,
        consumer: &mut dyn GeometryConsumer,
    ) -> Result<()> {
        match self {
            Source::Wkb => match args::blob(ctx, 0)? {
                Some(wkb) => read_geometry(wkb, consumer),
                None => Ok(()),
            },
            Source::Wkt => match args::text(ctx, 0)? {
                Some(wkt) => read_wkt(wkt, &fc.locale, consumer),
                None => Ok(()),
            },
            Source::Coordinates => {
                if !(2..=4).contains(&n_args) {
                    return Err(SpatialDbError::Domain(format!(
                        "Invalid number of coordinates: {n_args}"
                    )));
                }
                let coords = (0..n_args)
                    .map(|idx| args::double(ctx, idx))
                    .collect::<Result<Vec<_>>>()?;
                write_point(consumer, &coords)
            }
        }
    }
}

/// Build a blob from `source`, requiring a geometry assignable to `required`.
fn construct(
    fc: &FunctionContext,
    ctx: &Context<'_>,
    source: Source,
    required: GeometryType,
) -> Result<Option<Vec<u8>>> {
    if source != Source::Coordinates && matches!(ctx.get_raw(0), ValueRef::Null) {
        return Ok(None);
    }

    let rest: Vec<Value> = (1..ctx.len()).map(|idx| ctx.get_raw(idx).into()).collect();
    if let Some(cached) = ctx.get_aux::<CachedGeometry>(0)? {
        if cached.args == rest {
            return Ok(Some(cached.blob.clone()));
        }
    }

    let (n_args, srid) = source.split_srid(ctx)?;
    let mut writer = match srid {
        Some(srid) => fc.schema.writer_with_srid(srid),
        None => fc.schema.writer(),
    };
    source.produce(fc, ctx, n_args, &mut writer)?;

    let actual = writer.geometry_type().ok_or_else(|| {
        SpatialDbError::Decode("geometry stream did not contain a geometry".to_string())
    })?;
    if !is_assignable(required, actual) {
        return Err(SpatialDbError::IncorrectGeometryType(format!(
            "Expected '{required}' actual '{actual}'"
        )));
    }

    let blob = writer.finish()?;
    ctx.set_aux(
        0,
        CachedGeometry {
            args: rest,
            blob: blob.clone(),
        },
    )?;
    Ok(Some(blob))
}

fn geom_from_wkb(fc: &FunctionContext, ctx: &Context<'_>) -> Result<Option<Vec<u8>>> {
    construct(fc, ctx, Source::Wkb, GeometryType::Geometry)
}

fn geom_from_text(fc: &FunctionContext, ctx: &Context<'_>) -> Result<Option<Vec<u8>>> {
    construct(fc, ctx, Source::Wkt, GeometryType::Geometry)
}

/// `Point(wkt[, srid])`, `Point(wkb[, srid])` or `Point(x, y[, z[, m]][, srid])`.
fn point(fc: &FunctionContext, ctx: &Context<'_>) -> Result<Option<Vec<u8>>> {
    let source = match ctx.get_raw(0) {
        ValueRef::Text(_) => Source::Wkt,
        ValueRef::Blob(_) => Source::Wkb,
        _ => Source::Coordinates,
    };
    construct(fc, ctx, source, GeometryType::Point)
}
