//! Metadata streams.
//!
//! The metadata root lists up to five streams, each a named byte range of the metadata blob:
//!
//! - **`#Strings`** - null-terminated UTF-8 identifiers, see [`Strings`]
//! - **`#US`** - length-prefixed UTF-16 literals, see [`UserStrings`]
//! - **`#Blob`** - length-prefixed binary records such as signatures, see [`Blob`]
//! - **`#GUID`** - 16-byte GUIDs addressed by 1-based index, see [`Guid`]
//! - **`#~`** / **`#-`** - the metadata tables, see [`TablesHeader`]
//!
//! All heap views borrow the image's bytes; nothing is copied at load.
//!
//! # References
//!
//! - ECMA-335 6th Edition, Partition II, Section 24.2.2 - Stream Headers

mod blob;
mod guid;
mod streamheader;
mod strings;
mod tablesheader;
mod userstrings;

pub use blob::{Blob, RecordIterator};
pub(crate) use blob::record_at;
pub use guid::Guid;
pub use streamheader::{StreamHeader, StreamKind};
pub use strings::{Strings, StringsIterator};
pub use tablesheader::TablesHeader;
pub use userstrings::UserStrings;
