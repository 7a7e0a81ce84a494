//! Well-Known Text, including the `ANNOTATION` and `PARAMETRIC*` extension literals.
//!
//! Extension kinds write their text fields after the ordinates of each vertex as double-quoted
//! strings, with `""` escaping a quote:
//!
//! ```text
//! ANNOTATION (116.4 39.9 "北京")
//! PARAMETRICPOINT Z (1 2 3 "16" "name")
//! ```

mod locale;
mod reader;
mod writer;

pub use locale::Locale;
pub use reader::read_wkt;
pub use writer::WktWriter;
