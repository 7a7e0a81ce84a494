//! Options controlling how the SQL functions are registered.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::io::wkt::Locale;

/// Registration options, usually deserialized from JSON.
///
/// ```
/// use spatialdb::config::ExtensionOptions;
///
/// let options = ExtensionOptions::from_json(r#"{"schema": "Spatialite4"}"#).unwrap();
/// assert_eq!(options.schema.as_deref(), Some("Spatialite4"));
/// assert!(options.register_aliases);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtensionOptions {
    /// Dialect to use instead of detecting one from the `main` database, e.g. `GeoPackage` or
    /// `Spatialite3`. Matched case-insensitively.
    pub schema: Option<String>,

    /// Decimal separator of numbers in WKT.
    pub decimal_separator: char,

    /// Also register `WKBToSQL`, `WKTToSQL` and `MakePoint` (and their `ST_` forms).
    pub register_aliases: bool,

    /// Database used by metadata functions called without a database name.
    pub default_database: String,
}

impl Default for ExtensionOptions {
    fn default() -> Self {
        Self {
            schema: None,
            decimal_separator: '.',
            register_aliases: true,
            default_database: "main".to_string(),
        }
    }
}

impl ExtensionOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The WKT locale described by these options.
    pub fn locale(&self) -> Result<Locale> {
        Locale::with_decimal_separator(self.decimal_separator)
    }
}
