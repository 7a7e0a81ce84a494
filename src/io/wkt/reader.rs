use crate::consumer::GeometryConsumer;
use crate::error::{Result, SpatialDbError};
use crate::geometry::{Dimension, GeometryHeader, GeometryType};
use crate::io::wkt::Locale;
use crate::io::MAX_NESTING_DEPTH;

/// Parse `text` as WKT and drive `consumer` with the geometry it describes.
///
/// Keywords are case-insensitive. When no `Z`/`M`/`ZM` marker is present the dimension is
/// taken from the number of ordinates in the first coordinate tuple. Errors carry the byte offset
/// into `text` where parsing stopped.
pub fn read_wkt(text: &str, locale: &Locale, consumer: &mut dyn GeometryConsumer) -> Result<()> {
    let tokens = tokenize(text, locale)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: text.len(),
        depth: 0,
    };

    consumer.begin()?;
    parser.tagged(consumer, None)?;
    if let Some(token) = parser.tokens.get(parser.pos) {
        return Err(parse_error(token.offset, "unexpected trailing text"));
    }
    consumer.end()
}

fn parse_error(offset: usize, message: impl Into<String>) -> SpatialDbError {
    SpatialDbError::Parse {
        offset,
        message: message.into(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// An upper-cased keyword.
    Word(String),
    Number(f64),
    Text(String),
    LeftParen,
    RightParen,
    Comma,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    offset: usize,
}

fn tokenize(text: &str, locale: &Locale) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '(' => {
                chars.next();
                Token::LeftParen
            }
            ')' => {
                chars.next();
                Token::RightParen
            }
            ',' => {
                chars.next();
                Token::Comma
            }
            '"' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some((_, '"')) => {
                            if matches!(chars.peek(), Some((_, '"'))) {
                                chars.next();
                                value.push('"');
                            } else {
                                break;
                            }
                        }
                        Some((_, c)) => value.push(c),
                        None => return Err(parse_error(offset, "unterminated string")),
                    }
                }
                Token::Text(value)
            }
            c if c.is_ascii_alphabetic() => {
                let mut end = offset;
                while let Some(&(i, c)) = chars.peek() {
                    if !c.is_ascii_alphabetic() {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                Token::Word(text[offset..end].to_ascii_uppercase())
            }
            c if locale.is_number_char(c) => {
                let mut end = offset;
                while let Some(&(i, c)) = chars.peek() {
                    if !locale.is_number_char(c) {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                let literal = &text[offset..end];
                let value = locale
                    .parse_f64(literal)
                    .ok_or_else(|| parse_error(offset, format!("invalid number '{literal}'")))?;
                Token::Number(value)
            }
            c => return Err(parse_error(offset, format!("unexpected character '{c}'"))),
        };
        tokens.try_reserve(1)?;
        tokens.push(Spanned { token, offset });
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Offset reported for errors at end of input.
    end: usize,
    /// Collections currently open around the cursor.
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |t| t.offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|t| t.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<()> {
        let offset = self.offset();
        match self.next() {
            Some(token) if token == expected => Ok(()),
            _ => Err(parse_error(offset, format!("expected {what}"))),
        }
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w == word)
    }

    fn is_empty_keyword(&mut self) -> bool {
        if self.is_word("EMPTY") {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Dimension implied by the first run of numbers ahead of the cursor.
    ///
    /// Falls back to XY so that a malformed tuple is reported where it goes wrong.
    fn infer_dimension(&self) -> Dimension {
        let mut tokens = self.tokens[self.pos..].iter();
        if !tokens.any(|t| matches!(t.token, Token::Number(_))) {
            return Dimension::XY;
        }
        let size = 1 + tokens
            .take_while(|t| matches!(t.token, Token::Number(_)))
            .count();
        Dimension::from_size(size).unwrap_or(Dimension::XY)
    }

    /// A geometry introduced by its type keyword.
    fn tagged(
        &mut self,
        consumer: &mut dyn GeometryConsumer,
        parent: Option<Dimension>,
    ) -> Result<()> {
        let offset = self.offset();
        let geom_type = match self.next() {
            Some(Token::Word(word)) => match GeometryType::from_name(&word) {
                Ok(GeometryType::Geometry) | Err(_) => {
                    return Err(parse_error(offset, format!("unknown geometry type '{word}'")))
                }
                Ok(geom_type) => geom_type,
            },
            _ => return Err(parse_error(offset, "expected geometry type")),
        };

        let marker_offset = self.offset();
        let marker = match self.peek() {
            Some(Token::Word(w)) if w == "Z" => Some(Dimension::XYZ),
            Some(Token::Word(w)) if w == "M" => Some(Dimension::XYM),
            Some(Token::Word(w)) if w == "ZM" => Some(Dimension::XYZM),
            _ => None,
        };
        if marker.is_some() {
            self.pos += 1;
        }

        let dimension = match (marker, parent) {
            (Some(marker), Some(parent)) if marker != parent => {
                return Err(parse_error(
                    marker_offset,
                    format!("{marker} member of a {parent} collection"),
                ))
            }
            (Some(marker), _) => marker,
            (None, Some(parent)) => parent,
            (None, None) => self.infer_dimension(),
        };

        self.untagged(consumer, &GeometryHeader::new(geom_type, dimension))
    }

    /// `EMPTY` or a parenthesized body, without the type keyword.
    fn untagged(&mut self, consumer: &mut dyn GeometryConsumer, header: &GeometryHeader) -> Result<()> {
        consumer.begin_geometry(header)?;
        if self.is_empty_keyword() {
            if header.geom_type.is_extension() {
                return Err(parse_error(
                    self.offset(),
                    format!("{} cannot be empty", header.geom_type),
                ));
            }
            return consumer.end_geometry(header);
        }

        self.expect(Token::LeftParen, "'('")?;
        self.body(consumer, header)?;
        self.expect(Token::RightParen, "')'")?;
        consumer.end_geometry(header)
    }

    /// The content between the outer parentheses.
    fn body(&mut self, consumer: &mut dyn GeometryConsumer, header: &GeometryHeader) -> Result<()> {
        let label_count = header.geom_type.label_count();
        match header.geom_type {
            GeometryType::Point
            | GeometryType::Annotation
            | GeometryType::ParametricPoint
            | GeometryType::ParametricAnnotation => {
                let mut coords = Vec::new();
                let mut labels = Vec::new();
                self.tuple(header.coord_size, label_count, &mut coords, &mut labels)?;
                consumer.coordinates(header, 1, &coords, &labels, 0)
            }
            GeometryType::LineString | GeometryType::ParametricLineString => {
                self.vertices(consumer, header, label_count)
            }
            GeometryType::Polygon | GeometryType::ParametricPolygon => {
                self.rings(consumer, header, label_count)
            }
            GeometryType::MultiPoint => self.separated(|parser| {
                let point = header.with_type(GeometryType::Point);
                if matches!(parser.peek(), Some(Token::Number(_))) {
                    // Unparenthesized member: MULTIPOINT (1 2, 3 4)
                    consumer.begin_geometry(&point)?;
                    parser.body(consumer, &point)?;
                    consumer.end_geometry(&point)
                } else {
                    parser.untagged(consumer, &point)
                }
            }),
            GeometryType::MultiLineString => self.separated(|parser| {
                parser.untagged(consumer, &header.with_type(GeometryType::LineString))
            }),
            GeometryType::MultiPolygon => self.separated(|parser| {
                parser.untagged(consumer, &header.with_type(GeometryType::Polygon))
            }),
            GeometryType::GeometryCollection => {
                if self.depth >= MAX_NESTING_DEPTH {
                    return Err(parse_error(
                        self.offset(),
                        format!("collection nested deeper than {MAX_NESTING_DEPTH} levels"),
                    ));
                }
                self.depth += 1;
                self.separated(|parser| parser.tagged(consumer, Some(header.dimension)))?;
                self.depth -= 1;
                Ok(())
            }
            GeometryType::Geometry | GeometryType::LinearRing => Err(parse_error(
                self.offset(),
                format!("{} has no WKT body", header.geom_type),
            )),
        }
    }

    /// One or more comma separated items.
    fn separated(&mut self, mut item: impl FnMut(&mut Self) -> Result<()>) -> Result<()> {
        item(self)?;
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            item(self)?;
        }
        Ok(())
    }

    /// Parenthesized rings of a polygon. Rings inherit the polygon's vertex labels.
    fn rings(
        &mut self,
        consumer: &mut dyn GeometryConsumer,
        header: &GeometryHeader,
        label_count: usize,
    ) -> Result<()> {
        let ring = header.with_type(GeometryType::LinearRing);
        self.separated(|parser| {
            consumer.begin_geometry(&ring)?;
            parser.expect(Token::LeftParen, "'('")?;
            parser.vertices(consumer, &ring, label_count)?;
            parser.expect(Token::RightParen, "')'")?;
            consumer.end_geometry(&ring)
        })
    }

    /// Comma separated vertices, pushed to the consumer as one batch.
    fn vertices(
        &mut self,
        consumer: &mut dyn GeometryConsumer,
        header: &GeometryHeader,
        label_count: usize,
    ) -> Result<()> {
        let mut coords = Vec::new();
        let mut labels = Vec::new();
        let mut count = 0;
        self.separated(|parser| {
            count += 1;
            parser.tuple(header.coord_size, label_count, &mut coords, &mut labels)
        })?;
        consumer.coordinates(header, count, &coords, &labels, 0)
    }

    /// `coord_size` numbers followed by `label_count` quoted strings.
    fn tuple(
        &mut self,
        coord_size: usize,
        label_count: usize,
        coords: &mut Vec<f64>,
        labels: &mut Vec<String>,
    ) -> Result<()> {
        coords.try_reserve(coord_size)?;
        for _ in 0..coord_size {
            let offset = self.offset();
            match self.next() {
                Some(Token::Number(value)) => coords.push(value),
                _ => return Err(parse_error(offset, "expected number")),
            }
        }
        if matches!(self.peek(), Some(Token::Number(_))) {
            return Err(parse_error(
                self.offset(),
                format!("more than {coord_size} ordinates"),
            ));
        }
        for _ in 0..label_count {
            let offset = self.offset();
            match self.next() {
                Some(Token::Text(text)) => labels.push(text),
                _ => return Err(parse_error(offset, "expected quoted string")),
            }
        }
        Ok(())
    }
}
