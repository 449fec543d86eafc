use thiserror::Error;

use crate::metadata::{tables::TableId, token::Token};

/// Creates an [`Error::BadImage`] carrying the source location of the check that failed.
macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::BadImage {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::BadImage {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// Creates an [`Error::OutOfBounds`] carrying the source location of the read that failed.
macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// Creates an [`Error::LayoutInconsistency`] for the named type.
macro_rules! layout_error {
    ($ty:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {
        crate::Error::LayoutInconsistency {
            type_name: $ty.to_string(),
            message: format!($fmt $(, $arg)*),
        }
    };
}

/// The error type returned by every fallible operation in this crate.
///
/// None of these conditions is recoverable locally. Malformed metadata and inconsistent
/// layouts are deterministic, so there is no retry path anywhere: each variant carries
/// enough context (token, table, type or method name) to produce a diagnostic and the
/// caller is expected to give up on the image or type that produced it.
///
/// # Error Categories
///
/// ## Image structure
/// - [`Error::BadImage`] - the byte buffer violates a structural invariant of the format
/// - [`Error::OutOfBounds`] - a read would have gone past the end of a buffer or stream
/// - [`Error::Goblin`] - the PE container could not be parsed
///
/// ## Resolution
/// - [`Error::UnsupportedConstruct`] - a recognized format feature this crate does not implement
/// - [`Error::ResolutionFailure`] - a type, method or field reference matched no candidate
///
/// ## Virtual tables
/// - [`Error::LayoutInconsistency`] - an invariant of the dispatch table algorithm did not hold
/// - [`Error::RecursionLimit`] - nesting exceeded the configured depth
///
/// # Examples
///
/// ```rust
/// use dotvtable::{Error, metadata::image::Image};
///
/// match Image::load(vec![0u8; 16]) {
///     Err(Error::BadImage { message, .. }) => eprintln!("rejected: {message}"),
///     Err(e) => eprintln!("other failure: {e}"),
///     Ok(_) => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The buffer is not a well-formed metadata image.
    ///
    /// Raised during load for bad signatures, truncated or untiled heaps, invalid table
    /// presence bits and out-of-range references. An image that produced this error is
    /// never handed to callers.
    #[error("Bad image - {file}:{line}: {message}")]
    BadImage {
        /// Description of the violated invariant
        message: String,
        /// Source file in which the check failed
        file: &'static str,
        /// Source line in which the check failed
        line: u32,
    },

    /// A read would have run past the end of the data it was given.
    #[error("Out of bounds read - {file}:{line}")]
    OutOfBounds {
        /// Source file in which the read was attempted
        file: &'static str,
        /// Source line in which the read was attempted
        line: u32,
    },

    /// The PE container could not be parsed.
    #[error("{0}")]
    Goblin(#[from] goblin::error::Error),

    /// A recognized but unimplemented format feature was encountered.
    ///
    /// Raised on first use rather than at load time, e.g. for function pointer signatures
    /// or references scoped to another module of a multi-module assembly.
    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),

    /// A reference could not be matched against any candidate definition.
    #[error("Failed to resolve {name} ({token}) in {context}")]
    ResolutionFailure {
        /// Token of the reference being resolved
        token: Token,
        /// Name (and namespace where known) of the referenced entity
        name: String,
        /// Where the lookup was performed
        context: String,
    },

    /// A row index pointed outside its table.
    #[error("Row {rid} is out of range for table {table:?} ({rows} rows)")]
    RowOutOfRange {
        /// Table that was indexed
        table: TableId,
        /// The requested 1-based row
        rid: u32,
        /// Row count of the table
        rows: u32,
    },

    /// An invariant of the virtual table construction did not hold.
    #[error("Layout inconsistency in {type_name}: {message}")]
    LayoutInconsistency {
        /// Full name of the type being laid out
        type_name: String,
        /// What went wrong
        message: String,
    },

    /// Nesting exceeded the configured maximum depth.
    #[error("Reached the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// A lock guarding a shared cache was poisoned.
    #[error("Failed to lock target")]
    LockError,
}

impl Error {
    /// Returns `true` for errors that reject the image itself rather than a later query.
    #[must_use]
    pub fn is_bad_image(&self) -> bool {
        matches!(
            self,
            Error::BadImage { .. } | Error::OutOfBounds { .. } | Error::Goblin(_)
        )
    }
}
