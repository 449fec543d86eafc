use crate::{file::compressed, Result};

/// The `#Blob` heap: length-prefixed binary records addressed by byte offset.
///
/// Each record is a compressed unsigned length followed by that many bytes. Signatures,
/// constants and marshalling descriptors all live here.
///
/// # Examples
///
/// ```rust
/// use dotvtable::metadata::streams::Blob;
///
/// let heap = [0x00, 0x03, 0x20, 0x00, 0x01];
/// let blob = Blob::from(&heap)?;
/// assert_eq!(blob.get(1)?, &[0x20, 0x00, 0x01]);
/// assert_eq!(blob.record_count()?, 2);
/// # Ok::<(), dotvtable::Error>(())
/// ```
#[derive(Clone, Copy)]
pub struct Blob<'a> {
    data: &'a [u8],
}

impl<'a> Blob<'a> {
    /// Wrap the heap bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] if the heap is non-empty and does not start with
    /// the empty record.
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        if !data.is_empty() && data[0] != 0 {
            return Err(malformed_error!("Blob heap does not start with an empty record"));
        }

        Ok(Blob { data })
    }

    /// The record starting at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the index or the record's extent lies past
    /// the heap.
    pub fn get(&self, index: usize) -> Result<&'a [u8]> {
        if index == 0 && self.data.is_empty() {
            return Ok(&[]);
        }

        record_at(self.data, index).map(|(bytes, _)| bytes)
    }

    /// Iterate over `(offset, bytes)` for every record, in heap order.
    #[must_use]
    pub fn iter(&self) -> RecordIterator<'a> {
        RecordIterator::new(self.data, "Blob")
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

/// Read the length-prefixed record at `index`, returning its payload and the offset after it.
pub(crate) fn record_at(data: &[u8], index: usize) -> Result<(&[u8], usize)> {
    if index >= data.len() {
        return Err(out_of_bounds_error!());
    }

    let mut offset = index;
    let len = compressed::decode_unsigned(data, &mut offset)? as usize;
    let end = offset
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| out_of_bounds_error!())?;

    Ok((&data[offset..end], end))
}

/// Iterator over a heap of length-prefixed records (`#Blob` and `#US`).
pub struct RecordIterator<'a> {
    data: &'a [u8],
    position: usize,
    heap: &'static str,
}

impl<'a> RecordIterator<'a> {
    pub(crate) fn new(data: &'a [u8], heap: &'static str) -> Self {
        RecordIterator {
            data,
            position: 0,
            heap,
        }
    }
}

impl<'a> Iterator for RecordIterator<'a> {
    type Item = Result<(usize, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.data.len() {
            return None;
        }

        let start = self.position;
        match record_at(self.data, start) {
            Ok((bytes, next)) => {
                self.position = next;
                Some(Ok((start, bytes)))
            }
            Err(_) => {
                self.position = self.data.len();
                Some(Err(malformed_error!(
                    "{} heap record at offset {} does not fit the heap ({} bytes)",
                    self.heap,
                    start,
                    self.data.len()
                )))
            }
        }
    }
}
