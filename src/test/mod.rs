//! Shared fixtures.

use rusqlite::Connection;

pub(crate) mod geometries;

/// An in-memory database with the spatial functions registered.
pub(crate) fn spatial_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    crate::sql::register(&conn).unwrap();
    conn
}
