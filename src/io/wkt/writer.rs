use crate::consumer::GeometryConsumer;
use crate::error::{Result, SpatialDbError};
use crate::geometry::{GeometryHeader, GeometryType};
use crate::io::wkt::Locale;

#[derive(Debug)]
struct Frame {
    header: GeometryHeader,
    /// Written with its type keyword (outermost geometry and collection members).
    tagged: bool,
    /// The opening parenthesis has been written.
    opened: bool,
    /// Members or vertices written so far.
    items: usize,
}

/// A [`GeometryConsumer`] that renders the stream as WKT.
///
/// ```
/// use spatialdb::consumer::write_point;
/// use spatialdb::io::wkt::{Locale, WktWriter};
///
/// let mut writer = WktWriter::new(Locale::C);
/// write_point(&mut writer, &[1., 2.]).unwrap();
/// assert_eq!(writer.finish().unwrap(), "POINT (1 2)");
/// ```
#[derive(Debug)]
pub struct WktWriter {
    locale: Locale,
    out: String,
    stack: Vec<Frame>,
}

impl WktWriter {
    pub fn new(locale: Locale) -> Self {
        Self {
            locale,
            out: String::new(),
            stack: Vec::new(),
        }
    }

    /// The text written so far.
    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Take the rendered text. Fails if the stream left a geometry open.
    pub fn finish(self) -> Result<String> {
        if let Some(frame) = self.stack.last() {
            return Err(SpatialDbError::Decode(format!(
                "unterminated {} in geometry stream",
                frame.header.geom_type
            )));
        }
        Ok(self.out)
    }

    fn push_str(&mut self, s: &str) -> Result<()> {
        self.out.try_reserve(s.len())?;
        self.out.push_str(s);
        Ok(())
    }

    /// Write the opening parenthesis of the innermost geometry if that has not happened yet, and
    /// the separator before its next item.
    fn next_item(&mut self) -> Result<()> {
        let Some(frame) = self.stack.last_mut() else {
            return Ok(());
        };
        let prefix = match (frame.opened, frame.tagged) {
            (false, true) => " (",
            (false, false) => "(",
            (true, _) if frame.items > 0 => ", ",
            (true, _) => "",
        };
        frame.opened = true;
        frame.items += 1;
        self.push_str(prefix)
    }

    fn write_label(&mut self, label: &str) -> Result<()> {
        self.push_str(" \"")?;
        self.push_str(&label.replace('"', "\"\""))?;
        self.push_str("\"")
    }
}

impl GeometryConsumer for WktWriter {
    fn begin_geometry(&mut self, header: &GeometryHeader) -> Result<()> {
        let tagged = match self.stack.last() {
            None => true,
            Some(parent) => parent.header.geom_type == GeometryType::GeometryCollection,
        };
        self.next_item()?;
        if tagged {
            self.push_str(header.geom_type.name())?;
            let suffix = header.dimension.wkt_suffix();
            if !suffix.is_empty() {
                self.push_str(" ")?;
                self.push_str(suffix)?;
            }
        }
        self.stack.push(Frame {
            header: *header,
            tagged,
            opened: false,
            items: 0,
        });
        Ok(())
    }

    fn coordinates(
        &mut self,
        header: &GeometryHeader,
        count: usize,
        coords: &[f64],
        labels: &[String],
        _offset: usize,
    ) -> Result<()> {
        if self.stack.is_empty() {
            return Err(SpatialDbError::Decode(
                "coordinates outside of a geometry".to_string(),
            ));
        }

        let coord_size = header.coord_size;
        let arity = if count == 0 { 0 } else { labels.len() / count };
        let mut number = String::new();
        for i in 0..count {
            self.next_item()?;
            for (j, value) in coords[i * coord_size..(i + 1) * coord_size]
                .iter()
                .enumerate()
            {
                if j > 0 {
                    self.push_str(" ")?;
                }
                number.clear();
                self.locale.write_f64(*value, &mut number);
                self.push_str(&number)?;
            }
            for label in &labels[i * arity..(i + 1) * arity] {
                self.write_label(label)?;
            }
        }
        Ok(())
    }

    fn end_geometry(&mut self, header: &GeometryHeader) -> Result<()> {
        let frame = self.stack.pop().ok_or_else(|| {
            SpatialDbError::Decode(format!("unmatched end of {}", header.geom_type))
        })?;
        match (frame.opened, frame.tagged) {
            (true, _) => self.push_str(")"),
            (false, true) => self.push_str(" EMPTY"),
            (false, false) => self.push_str("EMPTY"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::wkt::read_wkt;
    use crate::test::annotation::*;
    use crate::test::linestring::*;
    use crate::test::point::*;

    fn round_trip(wkt: &str) -> String {
        let mut writer = WktWriter::new(Locale::C);
        read_wkt(wkt, &Locale::C, &mut writer).unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn canonical_text_is_stable() {
        for wkt in [
            POINT_WKT,
            POINT_Z_WKT,
            MULTI_POINT_WKT,
            LINE_STRING_WKT,
            POLYGON_WKT,
            MULTI_POLYGON_ZM_WKT,
            COLLECTION_WKT,
            ANNOTATION_WKT,
            PARAMETRIC_POINT_Z_WKT,
            PARAMETRIC_LINE_STRING_WKT,
            PARAMETRIC_POLYGON_WKT,
            PARAMETRIC_ANNOTATION_WKT,
        ] {
            assert_eq!(round_trip(wkt), wkt);
        }
    }

    #[test]
    fn normalizes_input() {
        assert_eq!(round_trip("point(1.50 2)"), "POINT (1.5 2)");
        assert_eq!(round_trip("MULTIPOINT (0 1, 1 2)"), "MULTIPOINT ((0 1), (1 2))");
        assert_eq!(round_trip("point empty"), "POINT EMPTY");
        assert_eq!(
            round_trip("MULTILINESTRING (EMPTY, (0 0, 1 1))"),
            "MULTILINESTRING (EMPTY, (0 0, 1 1))"
        );
    }

    #[test]
    fn custom_decimal_separator() {
        let locale = Locale::with_decimal_separator(';').unwrap();
        let mut writer = WktWriter::new(locale);
        read_wkt("POINT (1;5 2)", &locale, &mut writer).unwrap();
        assert_eq!(writer.finish().unwrap(), "POINT (1;5 2)");
    }
}
