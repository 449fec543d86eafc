use crate::Result;

/// The `#Strings` heap: NUL-terminated UTF-8 identifiers addressed by byte offset.
///
/// Offset 0 always holds the empty string. Type, method, field and namespace names in the
/// tables are indices into this heap.
///
/// # Examples
///
/// ```rust
/// use dotvtable::metadata::streams::Strings;
///
/// let heap = b"\0System\0Object\0";
/// let strings = Strings::from(heap)?;
/// assert_eq!(strings.get(1)?, "System");
/// assert_eq!(strings.get(8)?, "Object");
/// assert_eq!(strings.record_count()?, 3);
/// # Ok::<(), dotvtable::Error>(())
/// ```
#[derive(Clone, Copy)]
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Wrap the heap bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] if the heap is non-empty and does not start with
    /// the empty string.
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if !data.is_empty() && data[0] != 0 {
            return Err(malformed_error!("Strings heap does not start with a NUL byte"));
        }

        Ok(Strings { data })
    }

    /// The string starting at `index`.
    ///
    /// Indices may point into the middle of a record (compilers share suffixes), so any
    /// offset followed by a terminator is valid.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for an index past the heap or an unterminated
    /// string, and [`crate::Error::BadImage`] for invalid UTF-8.
    pub fn get(&self, index: usize) -> Result<&'a str> {
        if index >= self.data.len() {
            if index == 0 {
                return Ok("");
            }
            return Err(out_of_bounds_error!());
        }

        let rest = &self.data[index..];
        let Some(end) = rest.iter().position(|&b| b == 0) else {
            return Err(out_of_bounds_error!());
        };

        std::str::from_utf8(&rest[..end])
            .map_err(|_| malformed_error!("Invalid UTF-8 in string heap at offset {}", index))
    }

    /// Iterate over `(offset, string)` for every record, in heap order.
    #[must_use]
    pub fn iter(&self) -> StringsIterator<'a> {
        StringsIterator {
            strings: *self,
            position: 0,
        }
    }

    /// Check that the heap is tiled by terminated records and count them.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] if bytes follow the last terminator or a record
    /// is not valid UTF-8.
    pub fn record_count(&self) -> Result<usize> {
        let mut count = 0;
        for record in self.iter() {
            record?;
            count += 1;
        }
        Ok(count)
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

/// Iterator over the records of a [`Strings`] heap.
pub struct StringsIterator<'a> {
    strings: Strings<'a>,
    position: usize,
}

impl<'a> Iterator for StringsIterator<'a> {
    type Item = Result<(usize, &'a str)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.strings.data.len() {
            return None;
        }

        let start = self.position;
        let rest = &self.strings.data[start..];
        let Some(end) = rest.iter().position(|&b| b == 0) else {
            self.position = self.strings.data.len();
            return Some(Err(malformed_error!(
                "Strings heap has {} trailing bytes without a terminator",
                rest.len()
            )));
        };

        self.position = start + end + 1;
        Some(self.strings.get(start).map(|value| (start, value)))
    }
}
