//! Declarative descriptions of metadata tables, used both to create them and to validate an
//! existing database against them.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{ErrorSink, Result};
use crate::schema::CheckFlags;

/// One column of a metadata table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnSpec {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub not_null: bool,
    pub primary_key: bool,
    /// Extra column constraint, e.g. `UNIQUE` or `DEFAULT ''`.
    pub extra: &'static str,
}

impl ColumnSpec {
    pub const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            not_null: false,
            primary_key: false,
            extra: "",
        }
    }

    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn extra(mut self, extra: &'static str) -> Self {
        self.extra = extra;
        self
    }
}

/// A metadata table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
    /// Table constraints appended after the columns.
    pub constraints: &'static [&'static str],
    /// Optional tables are only validated when present.
    pub required: bool,
}

impl TableSpec {
    fn primary_key_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name)
            .collect()
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this table in database `db_name`.
    pub fn create_sql(&self, db_name: &str) -> String {
        let primary_key = self.primary_key_columns();
        let inline_key = primary_key.len() == 1;

        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut column = format!("{} {}", quote_identifier(c.name), c.sql_type);
                if c.not_null {
                    column.push_str(" NOT NULL");
                }
                if c.primary_key && inline_key {
                    column.push_str(" PRIMARY KEY");
                }
                if !c.extra.is_empty() {
                    column.push(' ');
                    column.push_str(c.extra);
                }
                column
            })
            .collect();
        if primary_key.len() > 1 {
            parts.push(format!(
                "PRIMARY KEY ({})",
                primary_key
                    .iter()
                    .map(|c| quote_identifier(c))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        parts.extend(self.constraints.iter().map(|c| c.to_string()));

        format!(
            "CREATE TABLE IF NOT EXISTS {}.{} ({})",
            quote_identifier(db_name),
            quote_identifier(self.name),
            parts.join(", ")
        )
    }
}

/// Quote an SQL identifier.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote an SQL string literal.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Whether a table or view called `table` exists in database `db_name`.
pub(crate) fn table_exists(conn: &Connection, db_name: &str, table: &str) -> Result<bool> {
    let sql = format!(
        "SELECT 1 FROM {}.sqlite_master WHERE type IN ('table', 'view') AND name = ?1 COLLATE NOCASE",
        quote_identifier(db_name)
    );
    Ok(conn
        .query_row(&sql, params![table], |_| Ok(()))
        .optional()?
        .is_some())
}

#[derive(Debug)]
struct ColumnInfo {
    name: String,
    sql_type: String,
    not_null: bool,
    primary_key: bool,
}

fn table_info(conn: &Connection, db_name: &str, table: &str) -> Result<Vec<ColumnInfo>> {
    let sql = format!(
        "PRAGMA {}.table_info({})",
        quote_identifier(db_name),
        quote_identifier(table)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(ColumnInfo {
            name: row.get(1)?,
            sql_type: row.get(2)?,
            not_null: row.get::<_, i64>(3)? != 0,
            primary_key: row.get::<_, i64>(5)? != 0,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Validate table `spec` in database `db_name`, appending one message per problem.
///
/// Missing tables and columns and mismatched types are always reported; nullability and primary
/// key membership only when requested by `flags`.
pub(crate) fn check_table(
    conn: &Connection,
    db_name: &str,
    spec: &TableSpec,
    flags: CheckFlags,
    errors: &mut ErrorSink,
) -> Result<()> {
    let columns = table_info(conn, db_name, spec.name)?;
    if columns.is_empty() {
        if spec.required {
            errors.append(format!("Table {db_name}.{} does not exist", spec.name));
        }
        return Ok(());
    }

    for expected in spec.columns {
        let Some(actual) = columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(expected.name))
        else {
            errors.append(format!(
                "Column {db_name}.{}.{} does not exist",
                spec.name, expected.name
            ));
            continue;
        };

        if !actual.sql_type.eq_ignore_ascii_case(expected.sql_type) {
            errors.append(format!(
                "Column {db_name}.{}.{} has type {}, expected {}",
                spec.name, expected.name, actual.sql_type, expected.sql_type
            ));
        }
        if flags.contains(CheckFlags::NULLABLE) && actual.not_null != expected.not_null {
            errors.append(format!(
                "Column {db_name}.{}.{} should {}be NOT NULL",
                spec.name,
                expected.name,
                if expected.not_null { "" } else { "not " }
            ));
        }
        if flags.contains(CheckFlags::PRIMARY_KEY) && actual.primary_key != expected.primary_key {
            errors.append(format!(
                "Column {db_name}.{}.{} should {}be part of the primary key",
                spec.name,
                expected.name,
                if expected.primary_key { "" } else { "not " }
            ));
        }
    }
    Ok(())
}

/// Validate every table in `specs`.
pub(crate) fn check_tables(
    conn: &Connection,
    db_name: &str,
    specs: &[TableSpec],
    flags: CheckFlags,
    errors: &mut ErrorSink,
) -> Result<()> {
    for spec in specs {
        check_table(conn, db_name, spec, flags, errors)?;
    }
    Ok(())
}

/// Create every table in `specs` that does not exist yet.
pub(crate) fn create_tables(conn: &Connection, db_name: &str, specs: &[TableSpec]) -> Result<()> {
    for spec in specs {
        conn.execute_batch(&spec.create_sql(db_name))?;
    }
    Ok(())
}
