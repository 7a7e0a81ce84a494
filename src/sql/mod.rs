//! SQL functions over geometry blobs.
//!
//! Every function is registered under its plain name and a prefixed name (`MinX` and `ST_MinX`,
//! `IsAssignable` and `GPKG_IsAssignable`), once per supported arity. All registrations of a
//! connection share one [`FunctionContext`] holding the active dialect and the WKT locale.

mod accessors;
mod args;
mod constructors;
mod metadata;

use std::ops::RangeInclusive;
use std::panic::UnwindSafe;
use std::sync::Arc;

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ToSql;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::config::ExtensionOptions;
use crate::error::Result;
use crate::io::wkt::Locale;
use crate::schema::{detect_schema, schema_by_name, SpatialSchema};

/// State shared by every SQL function registered on one connection.
#[derive(Debug)]
pub struct FunctionContext {
    pub schema: &'static dyn SpatialSchema,
    pub locale: Locale,
    /// Database used by metadata functions called without a database argument.
    pub default_database: String,
}

/// Register the spatial SQL functions on `conn` with default options.
///
/// The dialect is detected from the metadata in the `main` database. Returns the dialect that
/// the functions operate in.
pub fn register(conn: &Connection) -> Result<&'static dyn SpatialSchema> {
    register_with_options(conn, &ExtensionOptions::default())
}

/// Register the spatial SQL functions on `conn`.
pub fn register_with_options(
    conn: &Connection,
    options: &ExtensionOptions,
) -> Result<&'static dyn SpatialSchema> {
    let schema = match &options.schema {
        Some(name) => schema_by_name(name)?,
        None => detect_schema(conn),
    };
    let context = Arc::new(FunctionContext {
        schema,
        locale: options.locale()?,
        default_database: options.default_database.clone(),
    });

    let mut functions = Functions {
        conn,
        context,
        registered: 0,
    };
    accessors::register(&mut functions)?;
    constructors::register(&mut functions, options.register_aliases)?;
    metadata::register(&mut functions)?;

    info!(
        schema = schema.name(),
        functions = functions.registered,
        "registered spatial SQL functions"
    );
    Ok(schema)
}

/// Registers SQL functions that share one [`FunctionContext`].
pub(crate) struct Functions<'c> {
    conn: &'c Connection,
    context: Arc<FunctionContext>,
    registered: usize,
}

impl Functions<'_> {
    /// Register `function` as `name` and `{prefix}_{name}`, once for every arity in `arities`.
    pub fn add<T, F>(
        &mut self,
        prefix: &str,
        name: &str,
        arities: RangeInclusive<i32>,
        deterministic: bool,
        function: F,
    ) -> Result<()>
    where
        T: ToSql,
        F: Fn(&FunctionContext, &Context<'_>) -> Result<T> + Copy + Send + UnwindSafe + 'static,
    {
        let flags = if deterministic {
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC
        } else {
            FunctionFlags::SQLITE_UTF8
        };

        for sql_name in [name.to_string(), format!("{prefix}_{name}")] {
            for n_arg in arities.clone() {
                let context = Arc::clone(&self.context);
                self.conn
                    .create_scalar_function(sql_name.as_str(), n_arg, flags, move |ctx| {
                        function(&context, ctx).map_err(rusqlite::Error::from)
                    })?;
                self.registered += 1;
            }
        }
        debug!(function = name, prefix, ?arities, "registered SQL function");
        Ok(())
    }
}
