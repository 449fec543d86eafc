//! Method bodies and method attribute flags.
//!
//! [`MethodBody`] decodes a method header, its IL and its exception clauses from the bytes
//! an RVA points at. The flag types split the `MethodAttributes` word into the groups the
//! virtual table builder cares about: access, vtable layout and modifiers.
//!
//! # Examples
//!
//! ```rust
//! use dotvtable::metadata::method::MethodBody;
//!
//! // tiny header, code size 1: ret
//! let body = MethodBody::from(&[0x06, 0x2A])?;
//! assert_eq!(body.code, &[0x2A]);
//! assert_eq!(body.max_stack, 8);
//! # Ok::<(), dotvtable::Error>(())
//! ```

mod body;
mod exceptions;
mod types;

pub use body::{MethodBody, TINY_MAX_STACK};
pub use exceptions::{ExceptionClause, ExceptionClauseKind, ExceptionHandlerFlags};
pub use types::*;
