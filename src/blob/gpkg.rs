use std::io::Cursor;

use crate::blob::{read_f64, read_i32, write_f64, write_i32, GeometryBlobHeader};
use crate::error::{Result, SpatialDbError};
use crate::geometry::{Axis, Envelope, Extent};
use crate::io::wkb::Endianness;

const MAGIC: &[u8; 2] = b"GP";
const VERSION: u8 = 0;

/// Magic, version, flags and SRID.
const FIXED_LEN: usize = 8;

const FLAG_LITTLE_ENDIAN: u8 = 0x01;
const FLAG_EMPTY: u8 = 0x10;

/// Axes stored for each envelope indicator (flags bits 1-3).
fn envelope_axes(indicator: u8) -> Result<&'static [Axis]> {
    match indicator {
        0 => Ok(&[]),
        1 => Ok(&[Axis::X, Axis::Y]),
        2 => Ok(&[Axis::X, Axis::Y, Axis::Z]),
        3 => Ok(&[Axis::X, Axis::Y, Axis::M]),
        4 => Ok(&[Axis::X, Axis::Y, Axis::Z, Axis::M]),
        _ => Err(SpatialDbError::Decode(format!(
            "Invalid GeoPackage envelope indicator {indicator}"
        ))),
    }
}

fn envelope_indicator(envelope: &Envelope) -> u8 {
    if envelope.x.is_none() || envelope.y.is_none() {
        return 0;
    }
    match (envelope.z.is_some(), envelope.m.is_some()) {
        (false, false) => 1,
        (true, false) => 2,
        (false, true) => 3,
        (true, true) => 4,
    }
}

pub(super) fn read_header(blob: &[u8]) -> Result<GeometryBlobHeader> {
    if blob.len() < FIXED_LEN {
        return Err(SpatialDbError::Decode(format!(
            "GeoPackage blob too short: {} bytes",
            blob.len()
        )));
    }
    if &blob[0..2] != MAGIC {
        return Err(SpatialDbError::Decode(
            "Invalid GeoPackage blob magic".to_string(),
        ));
    }
    if blob[2] != VERSION {
        return Err(SpatialDbError::Decode(format!(
            "Unsupported GeoPackage blob version {}",
            blob[2]
        )));
    }

    let flags = blob[3];
    let byte_order = if flags & FLAG_LITTLE_ENDIAN != 0 {
        Endianness::LittleEndian
    } else {
        Endianness::BigEndian
    };
    let axes = envelope_axes((flags >> 1) & 0x07)?;
    let header_len = FIXED_LEN + 16 * axes.len();
    if blob.len() < header_len {
        return Err(SpatialDbError::Decode(format!(
            "GeoPackage blob too short for its envelope: {} bytes",
            blob.len()
        )));
    }

    let mut reader = Cursor::new(blob);
    reader.set_position(4);
    let srid = read_i32(&mut reader, byte_order)?;
    let mut envelope = Envelope::default();
    for axis in axes {
        let min = read_f64(&mut reader, byte_order)?;
        let max = read_f64(&mut reader, byte_order)?;
        envelope.set_axis(*axis, Some(Extent::new(min, max)));
    }

    Ok(GeometryBlobHeader {
        srid,
        envelope,
        empty: flags & FLAG_EMPTY != 0,
        byte_order,
        header_len,
    })
}

pub(super) fn encode_header(header: &GeometryBlobHeader) -> Result<Vec<u8>> {
    let indicator = envelope_indicator(&header.envelope);
    let axes = envelope_axes(indicator)?;

    let mut flags = indicator << 1;
    if header.byte_order == Endianness::LittleEndian {
        flags |= FLAG_LITTLE_ENDIAN;
    }
    if header.empty {
        flags |= FLAG_EMPTY;
    }

    let mut buf = Vec::new();
    buf.try_reserve(FIXED_LEN + 16 * axes.len())?;
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    buf.push(flags);
    write_i32(&mut buf, header.byte_order, header.srid)?;
    for axis in axes {
        if let Some(extent) = header.envelope.axis(*axis) {
            write_f64(&mut buf, header.byte_order, extent.min)?;
            write_f64(&mut buf, header.byte_order, extent.max)?;
        }
    }
    Ok(buf)
}
