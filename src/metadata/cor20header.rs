//! The CLI header (`IMAGE_COR20_HEADER`, ECMA-335 II.25.3.3).
//!
//! Located through the PE's CLR runtime header data directory; its only job here is to point
//! at the metadata root. The strong name, resource and fixup directories it also describes
//! are not consulted.

use crate::{file::parser::Parser, Result};

/// Size of the header in bytes, also the required value of `cb`.
pub const COR20_HEADER_SIZE: usize = 72;

/// The fields of the CLI header this crate reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cor20Header {
    /// Size of the header in bytes
    pub cb: u32,
    /// Major runtime version required to run the image
    pub major_runtime_version: u16,
    /// Minor runtime version required to run the image
    pub minor_runtime_version: u16,
    /// RVA of the metadata root
    pub meta_data_rva: u32,
    /// Size of the metadata blob
    pub meta_data_size: u32,
    /// `COMIMAGE_FLAGS_*`
    pub flags: u32,
    /// Token of the entry point method or file
    pub entry_point_token: u32,
}

impl Cor20Header {
    /// Read the header from the start of `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than 72 bytes are available and
    /// [`crate::Error::BadImage`] for a wrong size field or an empty metadata directory.
    pub fn read(data: &[u8]) -> Result<Cor20Header> {
        if data.len() < COR20_HEADER_SIZE {
            return Err(out_of_bounds_error!());
        }

        let mut parser = Parser::new(data);

        let cb = parser.read_le::<u32>()?;
        if cb as usize != COR20_HEADER_SIZE {
            return Err(malformed_error!(
                "Invalid CLR header size: expected 72, got {}",
                cb
            ));
        }

        let major_runtime_version = parser.read_le::<u16>()?;
        let minor_runtime_version = parser.read_le::<u16>()?;
        let meta_data_rva = parser.read_le::<u32>()?;
        let meta_data_size = parser.read_le::<u32>()?;
        if meta_data_rva == 0 || meta_data_size == 0 {
            return Err(malformed_error!("CLR header has an empty metadata directory"));
        }

        Ok(Cor20Header {
            cb,
            major_runtime_version,
            minor_runtime_version,
            meta_data_rva,
            meta_data_size,
            flags: parser.read_le::<u32>()?,
            entry_point_token: parser.read_le::<u32>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cb: u32, rva: u32, size: u32) -> Vec<u8> {
        let mut data = vec![0u8; COR20_HEADER_SIZE];
        data[0..4].copy_from_slice(&cb.to_le_bytes());
        data[4..6].copy_from_slice(&2u16.to_le_bytes());
        data[6..8].copy_from_slice(&5u16.to_le_bytes());
        data[8..12].copy_from_slice(&rva.to_le_bytes());
        data[12..16].copy_from_slice(&size.to_le_bytes());
        data[16..20].copy_from_slice(&1u32.to_le_bytes());
        data[20..24].copy_from_slice(&0x0600_0001u32.to_le_bytes());
        data
    }

    #[test]
    fn crafted() {
        let parsed = Cor20Header::read(&header(72, 0x2050, 0x400)).unwrap();
        assert_eq!(parsed.major_runtime_version, 2);
        assert_eq!(parsed.minor_runtime_version, 5);
        assert_eq!(parsed.meta_data_rva, 0x2050);
        assert_eq!(parsed.meta_data_size, 0x400);
        assert_eq!(parsed.flags, 1);
        assert_eq!(parsed.entry_point_token, 0x0600_0001);
    }

    #[test]
    fn rejects() {
        assert!(Cor20Header::read(&header(64, 0x2050, 0x400)).is_err());
        assert!(Cor20Header::read(&header(72, 0, 0x400)).is_err());
        assert!(Cor20Header::read(&header(72, 0x2050, 0)).is_err());
        assert!(Cor20Header::read(&[0u8; 16]).is_err());
    }
}
