use widestring::U16String;

use crate::{
    metadata::streams::blob::{record_at, RecordIterator},
    Result,
};

/// The `#US` heap: string literals referenced by `ldstr`.
///
/// Records share the blob heap's layout. The payload is UTF-16LE followed by one flag byte
/// that marks strings needing more than ASCII handling.
///
/// # Examples
///
/// ```rust
/// use dotvtable::metadata::streams::UserStrings;
///
/// let heap = [0x00, 0x05, b'H', 0x00, b'i', 0x00, 0x00];
/// let us = UserStrings::from(&heap)?;
/// assert_eq!(us.get(1)?.to_string_lossy(), "Hi");
/// # Ok::<(), dotvtable::Error>(())
/// ```
#[derive(Clone, Copy)]
pub struct UserStrings<'a> {
    data: &'a [u8],
}

impl<'a> UserStrings<'a> {
    /// Wrap the heap bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] if the heap is non-empty and does not start with
    /// the empty record.
    pub fn from(data: &'a [u8]) -> Result<UserStrings<'a>> {
        if !data.is_empty() && data[0] != 0 {
            return Err(malformed_error!(
                "UserStrings heap does not start with an empty record"
            ));
        }

        Ok(UserStrings { data })
    }

    /// Decode the string literal at byte offset `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the record lies past the heap.
    pub fn get(&self, index: usize) -> Result<U16String> {
        let (bytes, _) = record_at(self.data, index)?;
        let units = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect::<Vec<_>>();

        Ok(U16String::from_vec(units))
    }

    /// Iterate over `(offset, raw record)` for every record, in heap order.
    #[must_use]
    pub fn iter(&self) -> RecordIterator<'a> {
        RecordIterator::new(self.data, "UserStrings")
    }

    /// Check that the heap is tiled by back-to-back records and count them.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] if a record runs past the end of the heap.
    pub fn record_count(&self) -> Result<usize> {
        self.iter().try_fold(0, |count, record| record.map(|_| count + 1))
    }

    /// Size of the heap in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the heap is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
