//! Typed access to SQL function arguments.

use rusqlite::functions::Context;
use rusqlite::types::ValueRef;

use crate::error::{Result, SpatialDbError};

fn type_error(idx: usize, expected: &str) -> SpatialDbError {
    SpatialDbError::Domain(format!("argument {} must be {expected}", idx + 1))
}

/// A geometry blob argument. NULL is `None`.
pub(crate) fn blob<'a>(ctx: &'a Context<'_>, idx: usize) -> Result<Option<&'a [u8]>> {
    match ctx.get_raw(idx) {
        ValueRef::Null => Ok(None),
        ValueRef::Blob(blob) => Ok(Some(blob)),
        _ => Err(SpatialDbError::Decode(format!(
            "argument {} is not a geometry blob",
            idx + 1
        ))),
    }
}

/// A text argument. NULL is `None`.
pub(crate) fn text<'a>(ctx: &'a Context<'_>, idx: usize) -> Result<Option<&'a str>> {
    match ctx.get_raw(idx) {
        ValueRef::Null => Ok(None),
        ValueRef::Text(text) => std::str::from_utf8(text)
            .map(Some)
            .map_err(|_| type_error(idx, "valid UTF-8 text")),
        _ => Err(type_error(idx, "text")),
    }
}

/// A mandatory text argument, such as a table name.
pub(crate) fn name<'a>(ctx: &'a Context<'_>, idx: usize) -> Result<&'a str> {
    text(ctx, idx)?.ok_or_else(|| type_error(idx, "text"))
}

/// A 32 bit integer argument. Reals without fractional part are accepted.
pub(crate) fn int(ctx: &Context<'_>, idx: usize) -> Result<i32> {
    let value = match ctx.get_raw(idx) {
        ValueRef::Integer(value) => value,
        ValueRef::Real(value) if value.fract() == 0. => value as i64,
        _ => return Err(type_error(idx, "an integer")),
    };
    i32::try_from(value).map_err(|_| type_error(idx, "a 32 bit integer"))
}

/// A numeric argument.
pub(crate) fn double(ctx: &Context<'_>, idx: usize) -> Result<f64> {
    match ctx.get_raw(idx) {
        ValueRef::Integer(value) => Ok(value as f64),
        ValueRef::Real(value) => Ok(value),
        _ => Err(type_error(idx, "a number")),
    }
}

pub(crate) fn is_integer(ctx: &Context<'_>, idx: usize) -> bool {
    matches!(ctx.get_raw(idx), ValueRef::Integer(_))
}
