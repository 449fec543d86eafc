//! Bounds-checked forward cursor over a byte span.
//!
//! [`Parser`] is the blob reader used by the signature decoder, the method body decoder and
//! the heap validators. It borrows the underlying buffer, never copies it, and tracks a
//! single read position. Every read either succeeds and advances, or fails with
//! [`crate::Error::OutOfBounds`] / [`crate::Error::BadImage`] and leaves the cursor where the
//! failed read started.
//!
//! # Examples
//!
//! ```rust
//! use dotvtable::file::parser::Parser;
//!
//! let data = [0x20, 0x01, 0x0E, 0x08];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_le::<u8>()?, 0x20);
//! assert_eq!(parser.read_compressed_uint()?, 1);
//! assert_eq!(parser.peek_byte()?, 0x0E);
//! parser.advance_by(2)?;
//! assert!(!parser.has_more_data());
//! # Ok::<(), dotvtable::Error>(())
//! ```

use crate::{
    file::{
        compressed,
        io::{read_le_at, CilIO},
    },
    metadata::token::Token,
    Result,
};

/// A cursor over a borrowed byte slice.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`Parser`] positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Length of the underlying buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the underlying buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` while the cursor has not reached the end of the buffer.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Number of bytes left after the cursor.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Move the cursor to `pos`. Seeking to the end of the buffer is allowed.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is past the end of the buffer.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the cursor forward by one byte.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at the end of the buffer.
    pub fn advance(&mut self) -> Result<()> {
        self.advance_by(1)
    }

    /// Move the cursor forward by `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `step` bytes remain.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        if step > self.remaining() {
            return Err(out_of_bounds_error!());
        }

        self.position += step;
        Ok(())
    }

    /// Current cursor position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Round the cursor up to the next multiple of `alignment`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the aligned position lies past the buffer.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = (alignment - (self.position % alignment)) % alignment;
        self.advance_by(padding)
    }

    /// The byte under the cursor, without consuming it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at the end of the buffer.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.position)
            .copied()
            .ok_or_else(|| out_of_bounds_error!())
    }

    /// Read a little-endian `T` and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the value is truncated.
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read a standard compressed unsigned integer.
    ///
    /// # Errors
    /// See [`compressed::decode_unsigned`].
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        compressed::decode_unsigned(self.data, &mut self.position)
    }

    /// Read a standard compressed signed integer.
    ///
    /// # Errors
    /// See [`compressed::decode_signed`].
    pub fn read_compressed_int(&mut self) -> Result<i32> {
        compressed::decode_signed(self.data, &mut self.position)
    }

    /// Read an extended (runtime blob) compressed unsigned integer.
    ///
    /// # Errors
    /// See [`compressed::decode_extended_unsigned`].
    pub fn read_extended_uint(&mut self) -> Result<u32> {
        compressed::decode_extended_unsigned(self.data, &mut self.position)
    }

    /// Read an extended (runtime blob) compressed signed integer.
    ///
    /// # Errors
    /// See [`compressed::decode_extended_signed`].
    pub fn read_extended_int(&mut self) -> Result<i32> {
        compressed::decode_extended_signed(self.data, &mut self.position)
    }

    /// Read a compressed `TypeDefOrRefOrSpecEncoded` value and expand it into a [`Token`].
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] for the unused tag value 3.
    pub fn read_compressed_token(&mut self) -> Result<Token> {
        let start = self.position;
        let value = self.read_compressed_uint()?;
        let table = match value & 0x3 {
            0x0 => 0x02,
            0x1 => 0x01,
            0x2 => 0x1B,
            _ => {
                self.position = start;
                return Err(malformed_error!(
                    "Invalid TypeDefOrRef tag in compressed token 0x{:X}",
                    value
                ));
            }
        };

        Ok(Token::new((table << 24) | (value >> 2)))
    }

    /// Borrow the next `len` bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(out_of_bounds_error!());
        }

        let slice = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    /// Read a NUL-terminated UTF-8 string, consuming the terminator.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if no terminator follows the cursor and
    /// [`crate::Error::BadImage`] for invalid UTF-8.
    pub fn read_string_utf8(&mut self) -> Result<&'a str> {
        let rest = &self.data[self.position..];
        let Some(end) = rest.iter().position(|&b| b == 0) else {
            return Err(out_of_bounds_error!());
        };

        let value = std::str::from_utf8(&rest[..end])
            .map_err(|_| malformed_error!("Invalid UTF-8 at offset {}", self.position))?;
        self.position += end + 1;
        Ok(value)
    }

    /// The whole underlying buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}
