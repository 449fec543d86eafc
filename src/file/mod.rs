//! Container handling and low-level byte access.
//!
//! An image reaches [`crate::metadata::image::Image::load`] either as a full PE/COFF file or
//! as a bare metadata blob (the bytes a runtime sees when an assembly is handed to it from an
//! embedded resource or a debugger payload). [`File`] hides that difference: it owns the
//! buffer, locates the metadata root, and maps relative virtual addresses back to file
//! offsets for method bodies.
//!
//! PE parsing is delegated to [`goblin`]; only the section table and the CLR runtime header
//! directory are kept, so nothing borrowed from the buffer outlives the load.
//!
//! # Submodules
//! - [`compressed`] - compressed integer codec (standard and extended forms)
//! - [`io`] - bounds-checked little-endian scalar reads
//! - [`parser`] - the [`parser::Parser`] cursor used by every blob decoder

pub mod compressed;
pub mod io;
pub mod parser;

use goblin::pe::PE;
use tracing::debug;

use crate::{
    metadata::{cor20header::Cor20Header, root::CIL_HEADER_MAGIC},
    Result,
};

/// The part of a PE section header needed to translate addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    /// RVA of the first byte of the section once mapped
    pub virtual_address: u32,
    /// Mapped size of the section
    pub virtual_size: u32,
    /// File offset of the section's raw data
    pub pointer_to_raw_data: u32,
    /// Size of the section's raw data in the file
    pub size_of_raw_data: u32,
}

impl Section {
    fn contains(&self, rva: u32) -> bool {
        let extent = self.virtual_size.max(self.size_of_raw_data);
        match self.virtual_address.checked_add(extent) {
            Some(end) => rva >= self.virtual_address && rva < end,
            None => false,
        }
    }
}

/// How the image was packaged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    /// A PE/COFF file with a CLR runtime header.
    Pe {
        /// Section headers, in file order
        sections: Vec<Section>,
        /// The decoded CLI header
        cor20: Cor20Header,
    },
    /// Metadata root at offset 0, no PE wrapper.
    Bare,
}

/// An owned input buffer together with the location of its metadata.
pub struct File {
    data: Vec<u8>,
    container: Container,
    metadata_offset: usize,
    metadata_size: usize,
}

impl File {
    /// Inspect `data` and locate its metadata root.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] for an empty buffer, a PE without a CLR runtime
    /// header, or a metadata directory that does not fit in the buffer, and
    /// [`crate::Error::Goblin`] if the PE headers themselves are malformed.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        if data.is_empty() {
            return Err(malformed_error!("Provided input was empty"));
        }

        if data.len() >= 4 && io::read_le::<u32>(&data)? == CIL_HEADER_MAGIC {
            debug!(size = data.len(), "bare metadata image");
            let metadata_size = data.len();
            return Ok(File {
                data,
                container: Container::Bare,
                metadata_offset: 0,
                metadata_size,
            });
        }

        let (sections, clr_rva) = {
            let pe = PE::parse(&data)?;
            let Some(optional_header) = pe.header.optional_header else {
                return Err(malformed_error!("File does not have an OptionalHeader"));
            };
            let Some((clr_rva, clr_size)) = optional_header
                .data_directories
                .get_clr_runtime_header()
                .as_ref()
                .map(|dir| (dir.virtual_address, dir.size))
            else {
                return Err(malformed_error!(
                    "File does not have a CLR runtime header directory"
                ));
            };
            if clr_rva == 0 || clr_size == 0 {
                return Err(malformed_error!("CLR runtime header directory is empty"));
            }

            let sections = pe
                .sections
                .iter()
                .map(|section| Section {
                    virtual_address: section.virtual_address,
                    virtual_size: section.virtual_size,
                    pointer_to_raw_data: section.pointer_to_raw_data,
                    size_of_raw_data: section.size_of_raw_data,
                })
                .collect::<Vec<_>>();
            (sections, clr_rva)
        };

        let clr_offset = rva_to_offset_in(&sections, data.len(), clr_rva)?;
        let cor20 = Cor20Header::read(&data[clr_offset..])?;

        let metadata_offset = rva_to_offset_in(&sections, data.len(), cor20.meta_data_rva)?;
        let metadata_size = cor20.meta_data_size as usize;
        if metadata_offset
            .checked_add(metadata_size)
            .map_or(true, |end| end > data.len())
        {
            return Err(malformed_error!(
                "Metadata directory 0x{:X}+0x{:X} exceeds the file size 0x{:X}",
                metadata_offset,
                metadata_size,
                data.len()
            ));
        }

        debug!(
            size = data.len(),
            sections = sections.len(),
            metadata_offset,
            metadata_size,
            "PE image"
        );

        Ok(File {
            data,
            container: Container::Pe { sections, cor20 },
            metadata_offset,
            metadata_size,
        })
    }

    /// The whole input buffer.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size of the input buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the buffer is empty. Never the case for a loaded file.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// How the image was packaged.
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The metadata blob, starting at the `BSJB` root.
    #[must_use]
    pub fn metadata(&self) -> &[u8] {
        &self.data[self.metadata_offset..self.metadata_offset + self.metadata_size]
    }

    /// Borrow `len` bytes at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the buffer.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| out_of_bounds_error!())
    }

    /// Translate a relative virtual address into a file offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedConstruct`] for bare metadata images, which carry
    /// no section table, and [`crate::Error::BadImage`] if no section maps `rva`.
    pub fn rva_to_offset(&self, rva: u32) -> Result<usize> {
        match &self.container {
            Container::Pe { sections, .. } => rva_to_offset_in(sections, self.data.len(), rva),
            Container::Bare => Err(crate::Error::UnsupportedConstruct(format!(
                "RVA 0x{rva:08X} cannot be mapped in a bare metadata image"
            ))),
        }
    }
}

fn rva_to_offset_in(sections: &[Section], file_len: usize, rva: u32) -> Result<usize> {
    let Some(section) = sections.iter().find(|section| section.contains(rva)) else {
        return Err(malformed_error!("RVA 0x{:08X} is not mapped by any section", rva));
    };

    let offset = (rva - section.virtual_address) as usize + section.pointer_to_raw_data as usize;
    if offset >= file_len {
        return Err(malformed_error!(
            "RVA 0x{:08X} maps to offset 0x{:X} beyond the file end",
            rva,
            offset
        ));
    }

    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test::MetadataBuilder, Error};

    #[test]
    fn empty_input() {
        assert!(matches!(
            File::from_mem(Vec::new()),
            Err(Error::BadImage { .. })
        ));
    }

    #[test]
    fn bare_metadata() {
        let metadata = MetadataBuilder::new().build_metadata();
        let file = File::from_mem(metadata.clone()).unwrap();
        assert_eq!(file.container(), &Container::Bare);
        assert_eq!(file.metadata(), &metadata[..]);
        assert!(matches!(
            file.rva_to_offset(0x2000),
            Err(Error::UnsupportedConstruct(_))
        ));
    }

    #[test]
    fn pe_wrapped_metadata() {
        let metadata = MetadataBuilder::new().build_metadata();
        let image = MetadataBuilder::new().build_pe();
        let file = File::from_mem(image).unwrap();
        assert!(matches!(file.container(), Container::Pe { .. }));
        assert_eq!(file.metadata(), &metadata[..]);
    }

    #[test]
    fn not_a_pe() {
        assert!(File::from_mem(vec![0x4D, 0x5A, 0x00, 0x00]).is_err());
    }

    #[test]
    fn section_mapping() {
        let sections = [Section {
            virtual_address: 0x2000,
            virtual_size: 0x100,
            pointer_to_raw_data: 0x200,
            size_of_raw_data: 0x200,
        }];
        assert_eq!(rva_to_offset_in(&sections, 0x1000, 0x2000).unwrap(), 0x200);
        assert_eq!(rva_to_offset_in(&sections, 0x1000, 0x21FF).unwrap(), 0x3FF);
        assert!(rva_to_offset_in(&sections, 0x1000, 0x2200).is_err());
        assert!(rva_to_offset_in(&sections, 0x1000, 0x1FFF).is_err());
        assert!(rva_to_offset_in(&sections, 0x300, 0x2150).is_err());
    }
}
