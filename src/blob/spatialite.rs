use std::io::Cursor;

use crate::blob::{read_f64, read_i32, write_f64, write_i32, GeometryBlobHeader};
use crate::error::{Result, SpatialDbError};
use crate::geometry::{Envelope, Extent};
use crate::io::wkb::Endianness;

const START: u8 = 0x00;
const MBR_END: u8 = 0x7C;
pub(super) const END: u8 = 0xFE;

/// Start byte, byte order, SRID, four MBR doubles and the MBR end marker.
pub(super) const HEADER_LEN: usize = 39;

/// Header, class type and end marker.
const MIN_LEN: usize = HEADER_LEN + 4 + 1;

pub(super) fn read_header(blob: &[u8]) -> Result<GeometryBlobHeader> {
    if blob.len() < MIN_LEN {
        return Err(SpatialDbError::Decode(format!(
            "SpatiaLite blob too short: {} bytes",
            blob.len()
        )));
    }
    if blob[0] != START || blob[HEADER_LEN - 1] != MBR_END || blob[blob.len() - 1] != END {
        return Err(SpatialDbError::Decode(
            "Invalid SpatiaLite blob markers".to_string(),
        ));
    }

    let byte_order = Endianness::try_from(blob[1])?;
    let mut reader = Cursor::new(blob);
    reader.set_position(2);
    let srid = read_i32(&mut reader, byte_order)?;
    let min_x = read_f64(&mut reader, byte_order)?;
    let min_y = read_f64(&mut reader, byte_order)?;
    let max_x = read_f64(&mut reader, byte_order)?;
    let max_y = read_f64(&mut reader, byte_order)?;

    // An empty geometry stores a NaN MBR.
    let empty = [min_x, min_y, max_x, max_y].iter().all(|v| v.is_nan());
    let envelope = if empty {
        Envelope::default()
    } else {
        Envelope {
            x: Some(Extent::new(min_x, max_x)),
            y: Some(Extent::new(min_y, max_y)),
            ..Default::default()
        }
    };

    Ok(GeometryBlobHeader {
        srid,
        envelope,
        empty,
        byte_order,
        header_len: HEADER_LEN,
    })
}

/// Only the XY extent fits in a SpatiaLite header; Z and M are always computed from the body.
pub(super) fn encode_header(header: &GeometryBlobHeader) -> Result<Vec<u8>> {
    let (x, y) = match (header.envelope.x, header.envelope.y) {
        (Some(x), Some(y)) if !header.empty => (x, y),
        _ => (Extent::new(f64::NAN, f64::NAN), Extent::new(f64::NAN, f64::NAN)),
    };

    let mut buf = Vec::new();
    buf.try_reserve(HEADER_LEN)?;
    buf.push(START);
    buf.push(header.byte_order.into());
    write_i32(&mut buf, header.byte_order, header.srid)?;
    for value in [x.min, y.min, x.max, y.max] {
        write_f64(&mut buf, header.byte_order, value)?;
    }
    buf.push(MBR_END);
    Ok(buf)
}

pub(super) fn body<'a>(blob: &'a [u8], header: &GeometryBlobHeader) -> &'a [u8] {
    &blob[header.header_len..blob.len() - 1]
}

#[cfg(test)]
mod test {
    use super::*;

    fn blob_with(header: &GeometryBlobHeader) -> Vec<u8> {
        let mut blob = encode_header(header).unwrap();
        // POINT class type and an XY vertex.
        let order = header.byte_order;
        let mut body = Vec::new();
        write_i32(&mut body, order, 1).unwrap();
        write_f64(&mut body, order, 1.).unwrap();
        write_f64(&mut body, order, 2.).unwrap();
        blob.extend_from_slice(&body);
        blob.push(END);
        blob
    }

    #[test]
    fn header_layout() {
        let mut header = GeometryBlobHeader::new(4326);
        header.envelope.x = Some(Extent::new(1., 1.));
        header.envelope.y = Some(Extent::new(2., 2.));

        let blob = blob_with(&header);
        assert_eq!(blob[0], START);
        assert_eq!(blob[1], 1);
        assert_eq!(blob[38], MBR_END);

        let decoded = read_header(&blob).unwrap();
        assert_eq!(decoded.srid, 4326);
        assert_eq!(decoded.envelope, header.envelope);
        assert_eq!(body(&blob, &decoded).len(), 4 + 16);
    }

    #[test]
    fn big_endian() {
        let mut header = GeometryBlobHeader::new(3857);
        header.byte_order = Endianness::BigEndian;
        let blob = blob_with(&header);
        let decoded = read_header(&blob).unwrap();
        assert_eq!(decoded.srid, 3857);
        assert_eq!(decoded.byte_order, Endianness::BigEndian);
        assert!(decoded.empty);
    }

    #[test]
    fn missing_end_marker() {
        let mut blob = blob_with(&GeometryBlobHeader::new(0));
        let last = blob.len() - 1;
        blob[last] = 0;
        assert!(matches!(
            read_header(&blob),
            Err(SpatialDbError::Decode(_))
        ));
    }
}
