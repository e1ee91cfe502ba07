//! Primitive encoding/decoding for the LYB binary format.
//!
//! Implements fixed-width little-endian numbers and length-prefixed strings.

use std::io::Write;

use crate::error::{DecodeError, EncodeError};

/// Largest value representable in `width` bytes.
#[inline]
pub fn max_for_width(width: u8) -> u64 {
    if width >= 8 {
        u64::MAX
    } else {
        (1u64 << (u32::from(width) * 8)) - 1
    }
}

fn check_width(width: u8) -> Result<(), EncodeError> {
    match width {
        1 | 2 | 4 | 8 => Ok(()),
        _ => Err(EncodeError::InvalidWidth { width }),
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// Reader for decoding binary data.
///
/// Wraps a byte slice and provides methods for reading primitives
/// with bounds checking and error handling.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the current position in the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of remaining bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        if self.pos >= self.data.len() {
            return Err(DecodeError::UnexpectedEof { context });
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Reads exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining_len() {
            return Err(DecodeError::UnexpectedEof { context });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads a little-endian unsigned number stored on `width` bytes.
    #[inline]
    pub fn read_number(&mut self, width: u8, context: &'static str) -> Result<u64, DecodeError> {
        let bytes = self.read_bytes(usize::from(width.min(8)), context)?;
        let mut buf = [0u8; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    /// Reads a byte string prefixed by its length stored on `len_width` bytes.
    pub fn read_bytes_prefixed(
        &mut self,
        len_width: u8,
        field: &'static str,
    ) -> Result<&'a [u8], DecodeError> {
        let len = self.read_number(len_width, field)?;
        if len > self.remaining_len() as u64 {
            return Err(DecodeError::LengthExceedsLimit {
                field,
                len,
                max: self.remaining_len() as u64,
            });
        }
        self.read_bytes(len as usize, field)
    }

    /// Reads a length-prefixed UTF-8 string borrowed from the input.
    pub fn read_str(&mut self, len_width: u8, field: &'static str) -> Result<&'a str, DecodeError> {
        let bytes = self.read_bytes_prefixed(len_width, field)?;
        std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { field })
    }

    /// Reads a length-prefixed string where the empty string means absent.
    pub fn read_optional_string(
        &mut self,
        len_width: u8,
        field: &'static str,
    ) -> Result<Option<String>, DecodeError> {
        let s = self.read_str(len_width, field)?;
        Ok((!s.is_empty()).then(|| s.to_string()))
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Writer for encoding binary data.
///
/// The whole document is assembled in memory and handed to the output sink
/// with [`Writer::flush_into`] only once encoding succeeded.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates a new writer with capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a reference to the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn reserve(&mut self, additional: usize) -> Result<(), EncodeError> {
        self.buf
            .try_reserve(additional)
            .map_err(|_| EncodeError::OutOfMemory {
                context: "growing the output buffer",
            })
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) -> Result<(), EncodeError> {
        self.reserve(1)?;
        self.buf.push(byte);
        Ok(())
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.reserve(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Writes a little-endian number on `width` bytes (1, 2, 4 or 8).
    #[inline]
    pub fn write_number(&mut self, value: u64, width: u8) -> Result<(), EncodeError> {
        check_width(width)?;
        if value > max_for_width(width) {
            return Err(EncodeError::NumberExceedsWidth { value, width });
        }
        self.write_bytes(&value.to_le_bytes()[..usize::from(width)])
    }

    /// Writes a byte string prefixed by its length on `len_width` bytes.
    ///
    /// `None` writes a zero length. The length is checked before anything is
    /// written so a failing record never leaves a partial prefix behind.
    pub fn write_string(
        &mut self,
        value: Option<&[u8]>,
        len_width: u8,
        field: &'static str,
    ) -> Result<(), EncodeError> {
        check_width(len_width)?;
        let bytes = value.unwrap_or_default();
        let max = max_for_width(len_width);
        if bytes.len() as u64 > max {
            return Err(EncodeError::LengthExceedsWidth {
                field,
                len: bytes.len(),
                max,
            });
        }
        self.reserve(usize::from(len_width) + bytes.len())?;
        self.write_number(bytes.len() as u64, len_width)?;
        self.write_bytes(bytes)
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, s: &str, len_width: u8, field: &'static str) -> Result<(), EncodeError> {
        self.write_string(Some(s.as_bytes()), len_width, field)
    }

    /// Writes an optional length-prefixed UTF-8 string.
    pub fn write_optional_str(
        &mut self,
        s: Option<&str>,
        len_width: u8,
        field: &'static str,
    ) -> Result<(), EncodeError> {
        self.write_string(s.map(str::as_bytes), len_width, field)
    }

    /// Writes all bytes to the sink and flushes it.
    pub fn flush_into<W: Write + ?Sized>(&self, sink: &mut W) -> Result<(), EncodeError> {
        sink.write_all(&self.buf)?;
        sink.flush()?;
        Ok(())
    }
}
