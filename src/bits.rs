use std::io::Cursor;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};

use crate::error::{DecodeError, EncodeError};

/// Round `n` up to the next multiple of 8.
pub fn align8(n: usize) -> usize {
    n.div_ceil(8) * 8
}

/// Append zero bytes to `bytes` until its length from `start` is a multiple of 8.
pub fn pad8(bytes: &mut Vec<u8>, start: usize) {
    let len = bytes.len() - start;
    bytes.resize(start + align8(len), 0);
}

/// Narrow `value` to a wire field with the given maximum.
pub fn narrow<T: TryFrom<u64>>(field: &'static str, value: u64, max: u64) -> Result<T, EncodeError> {
    if value > max {
        return Err(EncodeError::FieldOverflow { field, value, max });
    }
    T::try_from(value).map_err(|_| EncodeError::FieldOverflow { field, value, max })
}

/// Convert a byte count into a 16-bit length field.
pub fn length16(field: &'static str, len: usize) -> Result<u16, EncodeError> {
    narrow(field, len as u64, u16::MAX as u64)
}

/// Big-endian appends onto a growing message buffer.
pub(crate) trait WriteBe {
    fn put_u8(&mut self, v: u8);
    fn put_u16(&mut self, v: u16);
    fn put_u32(&mut self, v: u32);
    fn put_u64(&mut self, v: u64);
    fn put_zeros(&mut self, n: usize);
    /// Overwrite the 16-bit field at `at` once the final length is known.
    fn patch_u16(&mut self, at: usize, v: u16);
}

impl WriteBe for Vec<u8> {
    fn put_u8(&mut self, v: u8) {
        self.push(v);
    }

    fn put_u16(&mut self, v: u16) {
        let mut b = [0; 2];
        BigEndian::write_u16(&mut b, v);
        self.extend_from_slice(&b);
    }

    fn put_u32(&mut self, v: u32) {
        let mut b = [0; 4];
        BigEndian::write_u32(&mut b, v);
        self.extend_from_slice(&b);
    }

    fn put_u64(&mut self, v: u64) {
        let mut b = [0; 8];
        BigEndian::write_u64(&mut b, v);
        self.extend_from_slice(&b);
    }

    fn put_zeros(&mut self, n: usize) {
        self.resize(self.len() + n, 0);
    }

    fn patch_u16(&mut self, at: usize, v: u16) {
        BigEndian::write_u16(&mut self[at..at + 2], v);
    }
}

/// Big-endian cursor over a borrowed buffer which reports short reads as
/// [`DecodeError::Truncated`] with the absolute offset of the failed read.
#[derive(Debug)]
pub(crate) struct Reader<'a> {
    bytes: Cursor<&'a [u8]>,
    base: usize,
}

impl<'a> Reader<'a> {
    /// Read `buf`, whose first byte sits at `base` within the enclosing message.
    pub(crate) fn new(buf: &'a [u8], base: usize) -> Reader<'a> {
        Reader {
            bytes: Cursor::new(buf),
            base,
        }
    }

    /// Absolute offset of the next byte.
    pub(crate) fn offset(&self) -> usize {
        self.base + self.bytes.position() as usize
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.get_ref().len() - self.bytes.position() as usize
    }

    fn truncated(&self, expected: usize) -> DecodeError {
        DecodeError::Truncated {
            offset: self.offset(),
            expected,
            found: self.remaining(),
        }
    }

    pub(crate) fn u8(&mut self) -> Result<u8, DecodeError> {
        let short = self.truncated(1);
        self.bytes.read_u8().map_err(|_| short)
    }

    pub(crate) fn u16(&mut self) -> Result<u16, DecodeError> {
        let short = self.truncated(2);
        self.bytes.read_u16::<BigEndian>().map_err(|_| short)
    }

    pub(crate) fn u32(&mut self) -> Result<u32, DecodeError> {
        let short = self.truncated(4);
        self.bytes.read_u32::<BigEndian>().map_err(|_| short)
    }

    pub(crate) fn u64(&mut self) -> Result<u64, DecodeError> {
        let short = self.truncated(8);
        self.bytes.read_u64::<BigEndian>().map_err(|_| short)
    }

    /// Skip `n` padding bytes.
    pub(crate) fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.take(n).map(|_| ())
    }

    /// Borrow the next `n` bytes and advance past them.
    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(self.truncated(n));
        }
        let start = self.bytes.position() as usize;
        let buf: &'a [u8] = self.bytes.get_ref();
        self.bytes.set_position((start + n) as u64);
        Ok(&buf[start..start + n])
    }
}
