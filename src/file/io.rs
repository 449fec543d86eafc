//! Bounds-checked little-endian reads from byte slices.
//!
//! Every multi-byte scalar in the metadata format is little-endian (compressed integers are
//! the one exception and live in [`crate::file::compressed`]). The helpers here are the only
//! place where raw slices are converted into integers; all of them fail with
//! [`crate::Error::OutOfBounds`] instead of panicking on short input.
//!
//! # Examples
//!
//! ```rust
//! use dotvtable::file::io::{read_le_at, read_le_at_dyn};
//!
//! let data = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00];
//! let mut offset = 0;
//! assert_eq!(read_le_at::<u16>(&data, &mut offset)?, 1);
//! assert_eq!(read_le_at_dyn(&data, &mut offset, true)?, 2);
//! assert_eq!(offset, 6);
//! # Ok::<(), dotvtable::Error>(())
//! ```

use crate::Result;

/// Scalars that can be decoded from a fixed number of little-endian bytes.
pub trait CilIO: Sized {
    /// Fixed-size byte array holding one encoded value.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Decode from little-endian bytes.
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_cil_io {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_cil_io!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Read a `T` from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0;
    read_le_at(data, &mut offset)
}

/// Read a `T` at `*offset` and advance the offset past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let end = offset
        .checked_add(type_len)
        .ok_or_else(|| out_of_bounds_error!())?;
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;
    Ok(T::from_le_bytes(read))
}

/// Read a 2 or 4 byte index, widened to `u32`.
///
/// Heap and table indices switch between 2 and 4 bytes depending on heap sizes and row
/// counts; `is_large` selects the wide form.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the index does not fit in `data`.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    if is_large {
        read_le_at::<u32>(data, offset)
    } else {
        Ok(u32::from(read_le_at::<u16>(data, offset)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_scalars() {
        assert_eq!(read_le::<u8>(&TEST_BUFFER).unwrap(), 0x01);
        assert_eq!(read_le::<u16>(&TEST_BUFFER).unwrap(), 0x0201);
        assert_eq!(read_le::<u32>(&TEST_BUFFER).unwrap(), 0x0403_0201);
        assert_eq!(read_le::<u64>(&TEST_BUFFER).unwrap(), 0x0807_0605_0403_0201);
        assert_eq!(read_le::<i16>(&[0xFF, 0xFF]).unwrap(), -1);
    }

    #[test]
    fn read_advances_offset() {
        let mut offset = 2;
        assert_eq!(read_le_at::<u16>(&TEST_BUFFER, &mut offset).unwrap(), 0x0403);
        assert_eq!(offset, 4);
        assert_eq!(read_le_at_dyn(&TEST_BUFFER, &mut offset, false).unwrap(), 0x0605);
        assert_eq!(offset, 6);
    }

    #[test]
    fn dyn_width() {
        let mut offset = 0;
        assert_eq!(
            read_le_at_dyn(&TEST_BUFFER, &mut offset, true).unwrap(),
            0x0403_0201
        );
        assert_eq!(offset, 4);
    }

    #[test]
    fn short_buffer() {
        let mut offset = 6;
        assert!(matches!(
            read_le_at::<u32>(&TEST_BUFFER, &mut offset),
            Err(Error::OutOfBounds { .. })
        ));
        assert_eq!(offset, 6);

        let mut offset = usize::MAX;
        assert!(read_le_at::<u8>(&TEST_BUFFER, &mut offset).is_err());
    }
}
