//! # Overview
//!
//! Byte-level transport primitives shared by the ACL codec: rsync's
//! variable-length integer (`read_varint()`/`write_varint()` from upstream
//! `io.c`) and single-byte reads and writes.
//!
//! # Examples
//!
//! ```
//! use protocol::{decode_varint, encode_varint_to_vec};
//!
//! let mut encoded = Vec::new();
//! encode_varint_to_vec(255, &mut encoded);
//! let (value, remainder) = decode_varint(&encoded).expect("varint decoding succeeds");
//! assert_eq!(value, 255);
//! assert!(remainder.is_empty());
//! ```

use std::io::{self, Read, Write};

/// Number of continuation bytes indexed by the top six bits of the tag byte.
///
/// Mirrors `int_byte_extra` from upstream `io.c`.
const INT_BYTE_EXTRA: [u8; 64] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // (0x00-0x3F) / 4
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // (0x40-0x7F) / 4
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // (0x80-0xBF) / 4
    2, 2, 2, 2, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 5, 6, // (0xC0-0xFF) / 4
];

const MAX_EXTRA_BYTES: usize = 4;

fn invalid_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn truncated() -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "truncated variable-length integer",
    )
}

/// Encodes `value` and returns the byte count together with the scratch array.
///
/// | First byte pattern | Extra bytes | Range |
/// |--------------------|-------------|-------|
/// | `0xxx_xxxx` | 0 | 0..127 |
/// | `10xx_xxxx` | 1 | 0..16383 |
/// | `110x_xxxx` | 2 | 0..2097151 |
/// | `1110_xxxx` | 3 | 0..268435455 |
/// | `1111_0xxx` | 4 | any i32 |
fn encode_bytes(value: i32) -> (usize, [u8; 5]) {
    let mut bytes = [0u8; 5];
    bytes[1..5].copy_from_slice(&value.to_le_bytes());

    let mut count = 4usize;
    while count > 1 && bytes[count] == 0 {
        count -= 1;
    }

    let bit = 1u8 << (7 - (count - 1) as u32);
    let current = bytes[count];

    if current >= bit {
        count += 1;
        bytes[0] = !(bit - 1);
    } else if count > 1 {
        bytes[0] = current | !((bit << 1) - 1);
    } else {
        bytes[0] = bytes[1];
    }

    (count, bytes)
}

fn decode_bytes(bytes: &[u8]) -> io::Result<(i32, usize)> {
    let Some(&first) = bytes.first() else {
        return Err(truncated());
    };

    let extra = INT_BYTE_EXTRA[(first / 4) as usize] as usize;
    if extra > MAX_EXTRA_BYTES {
        return Err(invalid_data("overflow in read_varint"));
    }
    if bytes.len() < 1 + extra {
        return Err(truncated());
    }

    let mut buf = [0u8; 5];
    if extra > 0 {
        buf[..extra].copy_from_slice(&bytes[1..=extra]);
        let bit = 1u8 << (8 - extra as u32);
        buf[extra] = first & (bit - 1);
    } else {
        buf[0] = first;
    }

    Ok((i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]), 1 + extra))
}

/// Writes `value` to `writer` using rsync's variable-length integer format.
///
/// # Errors
///
/// Propagates any error returned by `writer`.
pub fn write_varint<W: Write + ?Sized>(writer: &mut W, value: i32) -> io::Result<()> {
    let (len, bytes) = encode_bytes(value);
    writer.write_all(&bytes[..len])
}

/// Reads a variable-length integer from `reader`.
///
/// # Errors
///
/// Returns [`io::ErrorKind::UnexpectedEof`] when the stream ends mid-value and
/// [`io::ErrorKind::InvalidData`] when the tag byte announces more than four
/// continuation bytes.
pub fn read_varint<R: Read + ?Sized>(reader: &mut R) -> io::Result<i32> {
    let mut first = [0u8; 1];
    reader.read_exact(&mut first)?;

    let extra = INT_BYTE_EXTRA[(first[0] / 4) as usize] as usize;
    if extra > MAX_EXTRA_BYTES {
        return Err(invalid_data("overflow in read_varint"));
    }

    let mut buf = [0u8; 5];
    if extra > 0 {
        reader.read_exact(&mut buf[..extra])?;
        let bit = 1u8 << (8 - extra as u32);
        buf[extra] = first[0] & (bit - 1);
    } else {
        buf[0] = first[0];
    }

    Ok(i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

/// Appends the encoding of `value` to `out`.
pub fn encode_varint_to_vec(value: i32, out: &mut Vec<u8>) {
    let (len, bytes) = encode_bytes(value);
    out.extend_from_slice(&bytes[..len]);
}

/// Decodes a variable-length integer from the start of `bytes` and returns the
/// value together with the unread remainder.
///
/// # Errors
///
/// Fails with the same error kinds as [`read_varint`].
pub fn decode_varint(bytes: &[u8]) -> io::Result<(i32, &[u8])> {
    let (value, consumed) = decode_bytes(bytes)?;
    Ok((value, &bytes[consumed..]))
}

/// Writes a single raw byte.
///
/// # Errors
///
/// Propagates any error returned by `writer`.
pub fn write_byte<W: Write + ?Sized>(writer: &mut W, value: u8) -> io::Result<()> {
    writer.write_all(&[value])
}

/// Reads a single raw byte.
///
/// # Errors
///
/// Returns [`io::ErrorKind::UnexpectedEof`] when the stream is exhausted.
pub fn read_byte<R: Read + ?Sized>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}
