//! The metadata root (ECMA-335 II.24.2.1).
//!
//! The root opens with the `BSJB` signature, a version string padded to a 4-byte boundary,
//! and the stream directory. [`Root::read`] enforces that every stream lies inside the
//! metadata blob and that each known stream appears at most once.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::{
    file::io::{read_le, read_le_at},
    metadata::streams::{StreamHeader, StreamKind},
    LoadConfig, Result,
};

/// `BSJB`, little-endian.
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// Upper bound on the stream directory size.
const MAX_STREAMS: u16 = 16;

/// The decoded metadata root.
#[derive(Debug, Clone)]
pub struct Root {
    /// Major version, 1 for every image in the wild
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Runtime version string, e.g. `v4.0.30319`
    pub version: String,
    /// Reserved flags word
    pub flags: u16,
    /// The stream directory, in header order
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Parse the root at the start of `data`, the metadata blob.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] for a wrong signature, a stream extending past the
    /// blob, a duplicated stream, or (when `config.reject_unknown_streams` is set) an
    /// unknown stream name.
    pub fn read(data: &[u8], config: &LoadConfig) -> Result<Root> {
        if data.len() < 20 {
            return Err(malformed_error!("Metadata root is truncated"));
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - 0x{:08X}",
                signature
            ));
        }

        let mut offset = 12;
        let version_length = read_le_at::<u32>(data, &mut offset)? as usize;
        let Some(version_bytes) = version_length
            .checked_add(16)
            .and_then(|end| data.get(16..end))
        else {
            return Err(malformed_error!(
                "Version string length {} exceeds the metadata root",
                version_length
            ));
        };
        let version_end = version_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(version_bytes.len());
        let version = String::from_utf8_lossy(&version_bytes[..version_end]).into_owned();

        let mut offset = 16 + version_length;
        let flags = read_le_at::<u16>(data, &mut offset)?;
        let stream_count = read_le_at::<u16>(data, &mut offset)?;
        if stream_count == 0 || stream_count > MAX_STREAMS {
            return Err(malformed_error!("Invalid stream count {}", stream_count));
        }

        let mut seen = HashSet::new();
        let mut stream_headers = Vec::with_capacity(stream_count as usize);
        for _ in 0..stream_count {
            let Some(rest) = data.get(offset..) else {
                return Err(malformed_error!("Stream directory is truncated"));
            };
            let header = StreamHeader::from(rest)?;
            offset += header.encoded_size();

            if u64::from(header.offset) + u64::from(header.size) > data.len() as u64 {
                return Err(malformed_error!(
                    "Stream {} (0x{:X}+0x{:X}) exceeds the metadata size 0x{:X}",
                    header.name,
                    header.offset,
                    header.size,
                    data.len()
                ));
            }

            match header.kind {
                Some(kind) => {
                    if !seen.insert(kind) {
                        return Err(malformed_error!("Duplicate stream {}", header.name));
                    }
                }
                None if config.reject_unknown_streams => {
                    return Err(malformed_error!(
                        "Invalid stream header name - {}",
                        header.name
                    ));
                }
                None => warn!(name = %header.name, "ignoring unknown metadata stream"),
            }

            stream_headers.push(header);
        }

        if !seen.contains(&StreamKind::Tables) {
            return Err(malformed_error!("Metadata root has no tables stream"));
        }

        debug!(%version, streams = stream_headers.len(), "metadata root");

        Ok(Root {
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            version,
            flags,
            stream_headers,
        })
    }

    /// The header of the stream of the given kind, if present.
    #[must_use]
    pub fn stream(&self, kind: StreamKind) -> Option<&StreamHeader> {
        self.stream_headers
            .iter()
            .find(|header| header.kind == Some(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn root_bytes(streams: &[(&str, u32, u32)]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&CIL_HEADER_MAGIC.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&12u32.to_le_bytes());
        data.extend_from_slice(b"v4.0.30319\0\0");
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&(streams.len() as u16).to_le_bytes());
        for (name, offset, size) in streams {
            data.extend_from_slice(&offset.to_le_bytes());
            data.extend_from_slice(&size.to_le_bytes());
            data.extend_from_slice(name.as_bytes());
            let padded = (name.len() + 1 + 3) & !3;
            data.resize(data.len() + padded - name.len(), 0);
        }
        data.resize(0x100, 0);
        data
    }

    #[test]
    fn crafted() {
        let data = root_bytes(&[("#~", 0x60, 0x20), ("#Strings", 0x80, 0x10)]);
        let root = Root::read(&data, &LoadConfig::default()).unwrap();

        assert_eq!(root.major_version, 1);
        assert_eq!(root.version, "v4.0.30319");
        assert_eq!(root.stream_headers.len(), 2);
        assert_eq!(root.stream(StreamKind::Strings).unwrap().offset, 0x80);
        assert!(root.stream(StreamKind::Blob).is_none());
    }

    #[test]
    fn bad_signature() {
        let mut data = root_bytes(&[("#~", 0x60, 0x20)]);
        data[0] = 0;
        assert!(matches!(
            Root::read(&data, &LoadConfig::default()),
            Err(Error::BadImage { .. })
        ));
    }

    #[test]
    fn stream_out_of_range() {
        let data = root_bytes(&[("#~", 0xF0, 0x20)]);
        assert!(Root::read(&data, &LoadConfig::default()).is_err());
    }

    #[test]
    fn duplicate_stream() {
        let data = root_bytes(&[("#~", 0x60, 0x10), ("#-", 0x70, 0x10)]);
        assert!(Root::read(&data, &LoadConfig::default()).is_err());
    }

    #[test]
    fn unknown_stream() {
        let data = root_bytes(&[("#~", 0x60, 0x10), ("#Pdb", 0x70, 0x10)]);
        assert!(Root::read(&data, &LoadConfig::strict()).is_err());

        let root = Root::read(&data, &LoadConfig::lenient()).unwrap();
        assert_eq!(root.stream_headers.len(), 2);
    }

    #[test]
    fn missing_tables() {
        let data = root_bytes(&[("#Strings", 0x60, 0x10)]);
        assert!(Root::read(&data, &LoadConfig::default()).is_err());
    }
}
