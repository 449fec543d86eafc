use crate::Result;

/// The `#GUID` heap: 16-byte entries addressed by 1-based index.
///
/// Index 0 means "no GUID" and is never stored.
#[derive(Clone, Copy)]
pub struct Guid<'a> {
    data: &'a [u8],
}

impl<'a> Guid<'a> {
    /// Wrap the heap bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] if the heap size is not a multiple of 16.
    pub fn from(data: &'a [u8]) -> Result<Guid<'a>> {
        if data.len() % 16 != 0 {
            return Err(malformed_error!(
                "GUID heap size {} is not a multiple of 16",
                data.len()
            ));
        }

        Ok(Guid { data })
    }

    /// The GUID at 1-based `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for index 0 or an index past the heap.
    pub fn get(&self, index: usize) -> Result<uguid::Guid> {
        if index == 0 || index > self.count() {
            return Err(out_of_bounds_error!());
        }

        let start = (index - 1) * 16;
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&self.data[start..start + 16]);
        Ok(uguid::Guid::from_bytes(bytes))
    }

    /// Number of entries in the heap.
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.len() / 16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        let mut data = vec![0u8; 32];
        data[16..32].copy_from_slice(&[
            0x78, 0x56, 0x34, 0x12, 0x34, 0x12, 0x78, 0x56, 0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC,
            0xDE, 0xF0,
        ]);
        let heap = Guid::from(&data).unwrap();

        assert_eq!(heap.count(), 2);
        assert_eq!(
            heap.get(2).unwrap(),
            uguid::guid!("12345678-1234-5678-1234-56789abcdef0")
        );
        assert!(heap.get(0).is_err());
        assert!(heap.get(3).is_err());
    }

    #[test]
    fn partial_entry() {
        assert!(Guid::from(&[0u8; 20]).is_err());
    }
}
