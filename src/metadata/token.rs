//! Metadata tokens.
//!
//! A token packs a table id into its high byte and a 1-based row index into the low 24 bits.
//! `0x0600_0001` is the first MethodDef row, `0x7000_0010` is offset `0x10` into the user
//! string heap (which is addressed by byte offset, not row).

use std::fmt;

/// A metadata token: `table << 24 | row`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Token(pub u32);

impl Token {
    /// Wrap a raw token value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Token(value)
    }

    /// Build a token from a table id and a row index.
    #[must_use]
    pub const fn from_parts(table: u8, row: u32) -> Self {
        Token(((table as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// The raw value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// The table id held in the high byte.
    #[must_use]
    pub const fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The 1-based row (or heap offset for user strings).
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns `true` if the row part is zero.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.row() == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(0x{:08X})", self.0)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts() {
        let token = Token::new(0x0600_0012);
        assert_eq!(token.table(), 0x06);
        assert_eq!(token.row(), 0x12);
        assert!(!token.is_null());
        assert_eq!(Token::from_parts(0x06, 0x12), token);
        assert!(Token::from_parts(0x02, 0).is_null());
    }

    #[test]
    fn formatting() {
        let token = Token::new(0x0200_0001);
        assert_eq!(format!("{token}"), "0x02000001");
        assert_eq!(format!("{token:?}"), "Token(0x02000001)");
    }
}
