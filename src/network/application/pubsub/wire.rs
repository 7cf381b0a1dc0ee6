//! Wire primitives.
//!
//! Big-endian integers, length-prefixed strings and the MQTT variable
//! remaining length. Every decoder takes the input slice and the current offset
//! and returns the value with the number of bytes it consumed; none of them
//! can index past the end of the slice.

use super::Error;

/// Largest value the variable remaining length can carry (`0xFF 0xFF 0xFF 0x7F`).
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Decode one byte at `offset`.
pub fn read_u8(buf: &[u8], offset: usize) -> Result<(u8, usize), Error> {
    let byte = buf.get(offset).ok_or(Error::TruncatedInput)?;
    Ok((*byte, 1))
}

/// Decode a big-endian `u16` at `offset`.
pub fn read_u16(buf: &[u8], offset: usize) -> Result<(u16, usize), Error> {
    let end = offset.checked_add(2).ok_or(Error::TruncatedInput)?;
    let bytes = buf.get(offset..end).ok_or(Error::TruncatedInput)?;
    Ok((u16::from_be_bytes([bytes[0], bytes[1]]), 2))
}

/// Decode a length-prefixed string at `offset` as raw bytes.
///
/// The returned view borrows from `buf`; no terminator is expected.
pub fn read_lstring(buf: &[u8], offset: usize) -> Result<(&[u8], usize), Error> {
    let (len, _) = read_u16(buf, offset)?;
    let start = offset + 2;
    let end = start + len as usize;
    let bytes = buf.get(start..end).ok_or(Error::TruncatedInput)?;
    Ok((bytes, 2 + len as usize))
}

/// Decode a length-prefixed UTF-8 string at `offset`.
pub fn read_utf8(buf: &[u8], offset: usize) -> Result<(&str, usize), Error> {
    let (bytes, used) = read_lstring(buf, offset)?;
    let text = core::str::from_utf8(bytes).map_err(|_| Error::MalformedPacket)?;
    Ok((text, used))
}

/// Decode the MQTT variable remaining length at `offset`.
///
/// Fails with `MalformedLength` when the fourth byte still has its
/// continuation bit set.
pub fn read_remaining_length(buf: &[u8], offset: usize) -> Result<(usize, usize), Error> {
    let mut value = 0usize;
    let mut multiplier = 1usize;
    for i in 0..4 {
        let (byte, _) = read_u8(buf, offset + i)?;
        value += (byte & 0x7F) as usize * multiplier;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        multiplier *= 128;
    }
    Err(Error::MalformedLength)
}

/// Number of bytes the remaining length `value` occupies on the wire.
pub const fn remaining_length_len(value: usize) -> usize {
    if value < 128 {
        1
    } else if value < 16_384 {
        2
    } else if value < 2_097_152 {
        3
    } else {
        4
    }
}

/// Bounds-checked cursor used by the encoders.
///
/// Encoders check the total length up front so a failing packet never touches
/// the buffer; the cursor checks every write again so a miscalculated length
/// turns into `BufferTooSmall` instead of a panic.
#[derive(Debug)]
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    /// Start writing at the beginning of `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Append raw bytes.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let end = self.pos + bytes.len();
        let dst = self.buf.get_mut(self.pos..end).ok_or(Error::BufferTooSmall)?;
        dst.copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    /// Append one byte.
    pub fn put_u8(&mut self, value: u8) -> Result<(), Error> {
        self.put_bytes(&[value])
    }

    /// Append a big-endian `u16`.
    pub fn put_u16(&mut self, value: u16) -> Result<(), Error> {
        self.put_bytes(&value.to_be_bytes())
    }

    /// Append a length-prefixed string.
    pub fn put_lstring(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let len = u16::try_from(bytes.len()).map_err(|_| Error::MalformedPacket)?;
        self.put_u16(len)?;
        self.put_bytes(bytes)
    }

    /// Append an MQTT variable remaining length.
    pub fn put_remaining_length(&mut self, mut value: usize) -> Result<(), Error> {
        if value > MAX_REMAINING_LENGTH {
            return Err(Error::MalformedLength);
        }
        loop {
            let mut byte = (value % 128) as u8;
            value /= 128;
            if value > 0 {
                byte |= 0x80;
            }
            self.put_u8(byte)?;
            if value == 0 {
                return Ok(());
            }
        }
    }

    /// Finish and return the number of bytes written.
    pub fn finish(self) -> usize {
        self.pos
    }
}
