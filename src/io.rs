//! Byte-level reading and writing.
//!
//! Decoding goes through [`Reader`], a cursor over an immutable input buffer that knows its
//! absolute offset into the file, so that errors can point at the offending byte.
//!
//! Encoding goes through the [`Write`] trait, which is implemented for `Vec<u8>` and, through the
//! [`IoWrap`] adapter, for any `std::io::Write` sink.

use crate::prelude::*;

/// A sequential reader over a borrowed byte buffer.
///
/// Reads advance the cursor and fail with [`ErrorKind::OutOfBounds`] if fewer bytes than requested
/// remain, in which case the cursor is left untouched.
#[derive(Copy, Clone, Debug)]
pub struct Reader<'a> {
    raw: &'a [u8],
    pos: usize,
    /// Absolute offset of `raw[0]` within the original input.
    base: usize,
}
impl<'a> Reader<'a> {
    #[inline]
    pub fn new(raw: &'a [u8]) -> Reader<'a> {
        Reader {
            raw,
            pos: 0,
            base: 0,
        }
    }

    /// Absolute offset of the cursor within the original input.
    #[inline]
    pub fn position(&self) -> usize {
        self.base + self.pos
    }

    /// Amount of bytes consumed since this reader was created.
    #[inline]
    pub fn consumed(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.raw.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Get the remaining unread bytes.
    #[inline]
    pub fn unread(&self) -> &'a [u8] {
        &self.raw[self.pos..]
    }

    /// Get the bytes consumed between `self` and a later copy of the same reader.
    #[inline]
    pub(crate) fn span_to(&self, later: &Reader<'a>) -> &'a [u8] {
        &self.raw[self.pos..later.pos]
    }

    #[inline]
    fn oob(&self, msg: &'static str) -> Error {
        Error::at(err!(OutOfBounds, msg), self.position())
    }

    #[inline]
    pub fn peek_u8(&self) -> Result<u8> {
        self.raw
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.oob("expected another byte"))
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = self.peek_u8()?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads a big-endian `u16`.
    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        let mut bytes = [0; 2];
        bytes.copy_from_slice(self.read_slice(2)?);
        Ok(u16::from_be_bytes(bytes))
    }

    /// Reads a big-endian `u32`.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(self.read_slice(4)?);
        Ok(u32::from_be_bytes(bytes))
    }

    /// Reads exactly `len` bytes.
    #[inline]
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.oob("not enough bytes left"));
        }
        let slice = &self.raw[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Split off the next `len` bytes into a separate reader, which keeps reporting absolute
    /// positions.
    #[inline]
    pub fn sub_reader(&mut self, len: usize) -> Result<Reader<'a>> {
        let base = self.position();
        let raw = self.read_slice(len)?;
        Ok(Reader { raw, pos: 0, base })
    }

    /// Consume every remaining byte.
    #[inline]
    pub(crate) fn exhaust(&mut self) {
        self.pos = self.raw.len();
    }
}

/// The result of writing to a [`Write`] sink.
pub type WriteResult<W> = StdResult<(), <W as Write>::Error>;

/// A sink of encoded bytes.
pub trait Write {
    type Error;

    /// Append the whole buffer to the sink.
    fn write_all(&mut self, buf: &[u8]) -> WriteResult<Self>;

    /// Build the error returned when the model to be written cannot be encoded.
    fn invalid_input(msg: &'static str) -> Self::Error;

    #[inline]
    fn write_u8(&mut self, byte: u8) -> WriteResult<Self> {
        self.write_all(&[byte])
    }
}

impl Write for Vec<u8> {
    type Error = &'static str;
    #[inline]
    fn write_all(&mut self, buf: &[u8]) -> WriteResult<Self> {
        self.extend_from_slice(buf);
        Ok(())
    }
    #[inline]
    fn invalid_input(msg: &'static str) -> &'static str {
        msg
    }
}

/// Adapts a `std::io::Write` writer into a [`Write`] sink.
pub struct IoWrap<T>(pub T);
impl<T: io::Write> Write for IoWrap<T> {
    type Error = io::Error;
    #[inline]
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        io::Write::write_all(&mut self.0, buf)
    }
    #[inline]
    fn invalid_input(msg: &'static str) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidInput, msg)
    }
}

/// Counts written bytes without storing them.
pub(crate) struct WriteCounter(pub u64);
impl Write for WriteCounter {
    type Error = &'static str;
    #[inline]
    fn write_all(&mut self, buf: &[u8]) -> WriteResult<Self> {
        self.0 += buf.len() as u64;
        Ok(())
    }
    #[inline]
    fn invalid_input(msg: &'static str) -> &'static str {
        msg
    }
}
