//! Spatial SQL functions for SQLite.
//!
//! Geometries are stored as blobs in the layout of one of several spatial database dialects
//! (GeoPackage, or SpatiaLite 2/3/4). This crate decodes and encodes those blobs, streams
//! geometries to and from Well-Known Binary and Well-Known Text, and registers SQL functions that
//! expose all of it, together with functions that create and validate the dialect's metadata
//! tables.
//!
//! ```
//! use rusqlite::Connection;
//!
//! let conn = Connection::open_in_memory().unwrap();
//! spatialdb::register(&conn).unwrap();
//! let wkt: String = conn
//!     .query_row("SELECT ST_AsText(ST_GeomFromText('POINT (1 2)', 4326))", [], |row| row.get(0))
//!     .unwrap();
//! assert_eq!(wkt, "POINT (1 2)");
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![cfg_attr(not(test), deny(unused_crate_dependencies))]

pub use error::{Result, SpatialDbError};
pub use sql::{register, register_with_options};

pub mod blob;
pub mod config;
pub mod consumer;
pub mod error;
pub mod geometry;
pub mod io;
pub mod schema;
pub mod sql;
#[cfg(test)]
pub(crate) mod test;
