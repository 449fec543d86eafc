//! Compressed integer codec.
//!
//! Two encodings share this module:
//!
//! * **Standard** (ECMA-335 II.23.2): unsigned values below `0x2000_0000` take one, two or
//!   four big-endian bytes, with the width marked by the top bits of the first byte
//!   (`0xxxxxxx`, `10xxxxxx`, `110xxxxx`). Signed values are rotated into the smallest
//!   bracket that holds them (`[-2^6, 2^6)`, `[-2^13, 2^13)`, `[-2^28, 2^28)`) with the sign
//!   stored in bit 0. Negative values are biased by the bracket size before rotation, so the
//!   decoder has to know which width the carrier used to undo it. This is *not* zig-zag.
//! * **Extended**: the runtime's own blobs reuse the three standard brackets and add a
//!   fourth form, `0xF0` followed by a little-endian `u32`, plus the one-byte sentinels
//!   `0xFE` (`u32::MAX - 1`) and `0xFF` (`u32::MAX`). Its signed form folds the sign into bit
//!   0 as `v << 1` or `(!v << 1) | 1`.
//!
//! # Examples
//!
//! ```rust
//! use dotvtable::file::compressed::{decode_signed, encode_signed};
//!
//! let mut buf = Vec::new();
//! encode_signed(-8192, &mut buf)?;
//! assert_eq!(buf, [0x80, 0x01]);
//!
//! let mut offset = 0;
//! assert_eq!(decode_signed(&buf, &mut offset)?, -8192);
//! # Ok::<(), dotvtable::Error>(())
//! ```

use crate::Result;

/// Largest value the standard unsigned form can carry.
pub const MAX_COMPRESSED_UINT: u32 = 0x1FFF_FFFF;

/// Smallest value the standard signed form can carry.
pub const MIN_COMPRESSED_INT: i32 = -0x1000_0000;

/// Largest value the standard signed form can carry.
pub const MAX_COMPRESSED_INT: i32 = 0x0FFF_FFFF;

const EXTENDED_U32: u8 = 0xF0;
const EXTENDED_MAX_MINUS_ONE: u8 = 0xFE;
const EXTENDED_MAX: u8 = 0xFF;

/// Bias subtracted from an odd signed carrier, indexed by the carrier's encoded width.
///
/// A carrier beyond 29 bits would use `0x2000_0000`; only the extended form can hold one and
/// that form does not bias its values, so such a carrier is rejected.
fn signed_bias(width: usize) -> Option<i32> {
    match width {
        1 => Some(0x40),
        2 => Some(0x2000),
        4 => Some(0x1000_0000),
        _ => None,
    }
}

/// Number of bytes the standard form uses for `value`, or `None` if it is too large.
#[must_use]
pub fn unsigned_len(value: u32) -> Option<usize> {
    match value {
        0..=0x7F => Some(1),
        0x80..=0x3FFF => Some(2),
        0x4000..=MAX_COMPRESSED_UINT => Some(4),
        _ => None,
    }
}

/// Number of bytes the standard signed form uses for `value`, or `None` if it is out of range.
#[must_use]
pub fn signed_len(value: i32) -> Option<usize> {
    match value {
        -0x40..=0x3F => Some(1),
        -0x2000..=0x1FFF => Some(2),
        MIN_COMPRESSED_INT..=MAX_COMPRESSED_INT => Some(4),
        _ => None,
    }
}

/// Width implied by the first byte of a standard encoding.
fn width_from_lead(lead: u8) -> Option<usize> {
    if lead & 0x80 == 0 {
        Some(1)
    } else if lead & 0xC0 == 0x80 {
        Some(2)
    } else if lead & 0xE0 == 0xC0 {
        Some(4)
    } else {
        None
    }
}

fn byte_at(data: &[u8], offset: usize) -> Result<u8> {
    data.get(offset).copied().ok_or_else(|| out_of_bounds_error!())
}

/// Decode a standard compressed unsigned integer and report how many bytes it used.
fn decode_unsigned_width(data: &[u8], offset: &mut usize) -> Result<(u32, usize)> {
    let lead = byte_at(data, *offset)?;
    let width = width_from_lead(lead)
        .ok_or_else(|| malformed_error!("Invalid compressed integer lead byte 0x{:02X}", lead))?;

    let value = match width {
        1 => u32::from(lead),
        2 => (u32::from(lead & 0x3F) << 8) | u32::from(byte_at(data, *offset + 1)?),
        _ => {
            (u32::from(lead & 0x1F) << 24)
                | (u32::from(byte_at(data, *offset + 1)?) << 16)
                | (u32::from(byte_at(data, *offset + 2)?) << 8)
                | u32::from(byte_at(data, *offset + 3)?)
        }
    };

    *offset += width;
    Ok((value, width))
}

/// Write `value` using exactly `width` bytes of the standard form.
fn encode_unsigned_width(value: u32, width: usize, out: &mut Vec<u8>) {
    match width {
        1 => out.push(value as u8),
        2 => out.extend_from_slice(&[0x80 | (value >> 8) as u8, value as u8]),
        _ => out.extend_from_slice(&[
            0xC0 | (value >> 24) as u8,
            (value >> 16) as u8,
            (value >> 8) as u8,
            value as u8,
        ]),
    }
}

/// Decode a standard compressed unsigned integer at `*offset`.
///
/// # Errors
/// Returns [`crate::Error::BadImage`] for a lead byte outside the three brackets and
/// [`crate::Error::OutOfBounds`] for a truncated value.
pub fn decode_unsigned(data: &[u8], offset: &mut usize) -> Result<u32> {
    decode_unsigned_width(data, offset).map(|(value, _)| value)
}

/// Append the standard encoding of `value` to `out`, returning the number of bytes written.
///
/// # Errors
/// Returns [`crate::Error::BadImage`] if `value` exceeds [`MAX_COMPRESSED_UINT`].
pub fn encode_unsigned(value: u32, out: &mut Vec<u8>) -> Result<usize> {
    let width = unsigned_len(value)
        .ok_or_else(|| malformed_error!("Value 0x{:08X} is too large to compress", value))?;
    encode_unsigned_width(value, width, out);
    Ok(width)
}

/// Decode a standard compressed signed integer at `*offset`.
///
/// Only the canonical width is accepted: a value written wider than [`signed_len`] asks for
/// is rejected, since the bias applied depends on the width.
///
/// # Errors
/// Same as [`decode_unsigned`], plus [`crate::Error::BadImage`] for a non-canonical width.
pub fn decode_signed(data: &[u8], offset: &mut usize) -> Result<i32> {
    let start = *offset;
    let (carrier, width) = decode_unsigned_width(data, offset)?;
    let magnitude = (carrier >> 1) as i32;
    let value = if carrier & 1 == 0 {
        magnitude
    } else {
        let bias = signed_bias(width)
            .ok_or_else(|| malformed_error!("No signed bracket for a {} byte carrier", width))?;
        magnitude - bias
    };

    if signed_len(value) != Some(width) {
        *offset = start;
        return Err(malformed_error!(
            "Signed value {} is encoded in {} bytes, not its canonical width",
            value,
            width
        ));
    }
    Ok(value)
}

/// Append the standard signed encoding of `value` to `out`, returning the bytes written.
///
/// # Errors
/// Returns [`crate::Error::BadImage`] if `value` lies outside
/// [`MIN_COMPRESSED_INT`]`..=`[`MAX_COMPRESSED_INT`].
pub fn encode_signed(value: i32, out: &mut Vec<u8>) -> Result<usize> {
    let width = signed_len(value)
        .ok_or_else(|| malformed_error!("Value {} is too large to compress", value))?;

    let carrier = if value >= 0 {
        (value as u32) << 1
    } else {
        let bias = signed_bias(width).unwrap_or(0);
        (((value + bias) as u32) << 1) | 1
    };

    encode_unsigned_width(carrier, width, out);
    Ok(width)
}

/// Decode an extended unsigned integer at `*offset`.
///
/// # Errors
/// Returns [`crate::Error::BadImage`] for a lead byte that is neither a standard bracket nor
/// one of the extended markers, and [`crate::Error::OutOfBounds`] for truncated input.
pub fn decode_extended_unsigned(data: &[u8], offset: &mut usize) -> Result<u32> {
    match byte_at(data, *offset)? {
        EXTENDED_MAX => {
            *offset += 1;
            Ok(u32::MAX)
        }
        EXTENDED_MAX_MINUS_ONE => {
            *offset += 1;
            Ok(u32::MAX - 1)
        }
        EXTENDED_U32 => {
            *offset += 1;
            crate::file::io::read_le_at::<u32>(data, offset)
        }
        _ => decode_unsigned(data, offset),
    }
}

/// Append the extended encoding of `value` to `out`, returning the bytes written.
pub fn encode_extended_unsigned(value: u32, out: &mut Vec<u8>) -> usize {
    match value {
        u32::MAX => {
            out.push(EXTENDED_MAX);
            1
        }
        v if v == u32::MAX - 1 => {
            out.push(EXTENDED_MAX_MINUS_ONE);
            1
        }
        v => match unsigned_len(v) {
            Some(width) => {
                encode_unsigned_width(v, width, out);
                width
            }
            None => {
                out.push(EXTENDED_U32);
                out.extend_from_slice(&v.to_le_bytes());
                5
            }
        },
    }
}

/// Decode an extended signed integer at `*offset`.
///
/// # Errors
/// Same as [`decode_extended_unsigned`].
pub fn decode_extended_signed(data: &[u8], offset: &mut usize) -> Result<i32> {
    let carrier = decode_extended_unsigned(data, offset)?;
    if carrier == u32::MAX {
        return Ok(i32::MIN);
    }

    let magnitude = (carrier >> 1) as i32;
    if carrier & 1 == 0 {
        Ok(magnitude)
    } else {
        Ok(-magnitude - 1)
    }
}

/// Append the extended signed encoding of `value` to `out`, returning the bytes written.
pub fn encode_extended_signed(value: i32, out: &mut Vec<u8>) -> usize {
    let carrier = if value >= 0 {
        (value as u32) << 1
    } else {
        ((!value as u32) << 1) | 1
    };
    encode_extended_unsigned(carrier, out)
}
