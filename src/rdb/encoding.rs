//! RDB length and string encodings.
//!
//! The top two bits of the first byte select the form: `00` is a 6-bit inline
//! length, `01` a 14-bit length over two bytes, `10` an explicit-width length
//! (32-bit or 64-bit big-endian), and `11` a special integer-encoded string
//! whose decimal text stands in for the bytes.

use super::reader::RdbError;

/// Byte cursor over the snapshot buffer.
pub(super) struct Input<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn u8(&mut self) -> Result<u8, RdbError> {
        let byte = *self.buf.get(self.pos).ok_or(RdbError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], RdbError> {
        let end = self.pos.checked_add(n).ok_or(RdbError::UnexpectedEof)?;
        let slice = self.buf.get(self.pos..end).ok_or(RdbError::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos.min(self.buf.len())
    }
}

enum Encoded {
    Length(usize),
    Int8,
    Int16,
    Int32,
}

fn read_encoded(input: &mut Input<'_>) -> Result<Encoded, RdbError> {
    let first = input.u8()?;

    match first >> 6 {
        0b00 => Ok(Encoded::Length((first & 0x3F) as usize)),
        0b01 => {
            let second = input.u8()?;
            Ok(Encoded::Length(
                (((first & 0x3F) as usize) << 8) | second as usize,
            ))
        }
        0b10 => match first {
            0x80 => {
                let bytes: [u8; 4] = input.take(4)?.try_into().map_err(|_| RdbError::UnexpectedEof)?;
                Ok(Encoded::Length(u32::from_be_bytes(bytes) as usize))
            }
            0x81 => {
                let bytes: [u8; 8] = input.take(8)?.try_into().map_err(|_| RdbError::UnexpectedEof)?;
                let length = u64::from_be_bytes(bytes);
                usize::try_from(length)
                    .map(Encoded::Length)
                    .map_err(|_| RdbError::InvalidLength)
            }
            other => Err(RdbError::UnsupportedEncoding(other)),
        },
        _ => match first & 0x3F {
            0 => Ok(Encoded::Int8),
            1 => Ok(Encoded::Int16),
            2 => Ok(Encoded::Int32),
            _ => Err(RdbError::UnsupportedEncoding(first)),
        },
    }
}

/// A plain length, e.g. a database number or hash-table size. Special integer
/// forms are not lengths.
pub(super) fn read_length(input: &mut Input<'_>) -> Result<usize, RdbError> {
    match read_encoded(input)? {
        Encoded::Length(n) => Ok(n),
        _ => Err(RdbError::InvalidLength),
    }
}

/// A string payload: either raw bytes of the given length, or the decimal text
/// of an integer-encoded value.
pub(super) fn read_string(input: &mut Input<'_>) -> Result<String, RdbError> {
    match read_encoded(input)? {
        Encoded::Length(n) => {
            let bytes = input.take(n)?;
            String::from_utf8(bytes.to_vec()).map_err(|_| RdbError::InvalidUtf8)
        }
        Encoded::Int8 => {
            let value = input.u8()? as i8;
            Ok(value.to_string())
        }
        Encoded::Int16 => {
            let bytes: [u8; 2] = input.take(2)?.try_into().map_err(|_| RdbError::UnexpectedEof)?;
            Ok(i16::from_le_bytes(bytes).to_string())
        }
        Encoded::Int32 => {
            let bytes: [u8; 4] = input.take(4)?.try_into().map_err(|_| RdbError::UnexpectedEof)?;
            Ok(i32::from_le_bytes(bytes).to_string())
        }
    }
}
