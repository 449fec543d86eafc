use strum::{Display, EnumIter};

use crate::{file::io::read_le, Result};

/// Longest stream name the format allows, including the terminator.
pub const MAX_STREAM_NAME: usize = 32;

/// The streams a metadata root may describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum StreamKind {
    /// `#Strings`, NUL-terminated UTF-8 identifiers
    Strings,
    /// `#US`, length-prefixed UTF-16 literals
    UserStrings,
    /// `#Blob`, length-prefixed binary records
    Blob,
    /// `#GUID`, 16-byte entries
    Guid,
    /// `#~` (optimized) or `#-` (uncompressed) tables stream
    Tables,
}

impl StreamKind {
    /// Map a stream header name to its kind.
    #[must_use]
    pub fn from_name(name: &str) -> Option<StreamKind> {
        match name {
            "#Strings" => Some(StreamKind::Strings),
            "#US" => Some(StreamKind::UserStrings),
            "#Blob" => Some(StreamKind::Blob),
            "#GUID" => Some(StreamKind::Guid),
            "#~" | "#-" => Some(StreamKind::Tables),
            _ => None,
        }
    }
}

/// One entry of the metadata root's stream directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Offset of the stream relative to the metadata root
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
    /// Stream name as written in the header
    pub name: String,
    /// Recognized kind, `None` for names outside the known set
    pub kind: Option<StreamKind>,
}

impl StreamHeader {
    /// Parse a stream header from the start of `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for a truncated header and
    /// [`crate::Error::BadImage`] for a name that is unterminated or not ASCII.
    pub fn from(data: &[u8]) -> Result<StreamHeader> {
        if data.len() < 9 {
            return Err(out_of_bounds_error!());
        }

        let name_bytes = &data[8..data.len().min(8 + MAX_STREAM_NAME)];
        let Some(end) = name_bytes.iter().position(|&b| b == 0) else {
            return Err(malformed_error!("Unterminated stream header name"));
        };
        if !name_bytes[..end].is_ascii() {
            return Err(malformed_error!("Stream header name is not ASCII"));
        }

        let name = String::from_utf8_lossy(&name_bytes[..end]).into_owned();
        Ok(StreamHeader {
            offset: read_le::<u32>(data)?,
            size: read_le::<u32>(&data[4..])?,
            kind: StreamKind::from_name(&name),
            name,
        })
    }

    /// Bytes this header occupies: two `u32`s plus the name padded to a 4-byte boundary.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        8 + ((self.name.len() + 1 + 3) & !3)
    }
}
