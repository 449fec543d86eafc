//! Exception handling clauses of fat method bodies (ECMA-335 II.25.4.6).

use bitflags::bitflags;

use crate::metadata::token::Token;

bitflags! {
    /// Clause kind flags as stored in the section.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed catch clause
        const EXCEPTION = 0x0000;
        /// A filter followed by a handler
        const FILTER = 0x0001;
        /// A finally clause
        const FINALLY = 0x0002;
        /// A fault clause, a finally that only runs on exception
        const FAULT = 0x0004;
    }
}

/// What a clause does once its protected range throws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionClauseKind {
    /// Catch exceptions assignable to the type named by the token
    Catch(Token),
    /// Run the filter at this IL offset to decide
    Filter(u32),
    /// Always run the handler when leaving the try range
    Finally,
    /// Run the handler only when leaving by exception
    Fault,
}

impl ExceptionClauseKind {
    /// Decode the kind from the clause flags and its trailing class-token-or-filter dword.
    ///
    /// Unknown flag combinations fall back to the lowest set bit, matching how runtimes
    /// dispatch on these values.
    #[must_use]
    pub fn from_raw(flags: ExceptionHandlerFlags, extra: u32) -> Self {
        if flags.contains(ExceptionHandlerFlags::FILTER) {
            ExceptionClauseKind::Filter(extra)
        } else if flags.contains(ExceptionHandlerFlags::FINALLY) {
            ExceptionClauseKind::Finally
        } else if flags.contains(ExceptionHandlerFlags::FAULT) {
            ExceptionClauseKind::Fault
        } else {
            ExceptionClauseKind::Catch(Token::new(extra))
        }
    }
}

/// One try/handler pair.
///
/// ```text
/// try {            // try_offset .. try_offset + try_length
/// } catch (T) {    // handler_offset .. handler_offset + handler_length
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionClause {
    /// Raw clause flags
    pub flags: ExceptionHandlerFlags,
    /// Decoded clause kind
    pub kind: ExceptionClauseKind,
    /// IL offset of the protected range
    pub try_offset: u32,
    /// Length of the protected range
    pub try_length: u32,
    /// IL offset of the handler
    pub handler_offset: u32,
    /// Length of the handler
    pub handler_length: u32,
}

impl ExceptionClause {
    /// Returns `true` if `offset` lies in the protected range.
    #[must_use]
    pub fn protects(&self, offset: u32) -> bool {
        offset >= self.try_offset && offset - self.try_offset < self.try_length
    }
}
