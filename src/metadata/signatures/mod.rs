//! Signature blob decoding (ECMA-335 II.23.2).
//!
//! Signatures encode types, method shapes, locals and generic instantiations in a compact
//! prefix form. [`SignatureParser`] decodes them straight into
//! [`crate::metadata::typesystem::TypeId`] handles: every type read is interned in the shared [`crate::metadata::typesystem::TypePool`],
//! and class or value type tokens are resolved through a [`TypeTokenResolver`] on the way.
//!
//! # Binary Format
//!
//! - Signature kinds start with a calling convention or kind byte
//! - Counts are compressed unsigned integers, array lower bounds compressed signed integers
//! - Type references are compressed `TypeDefOrRefOrSpecEncoded` tokens
//! - Custom modifiers and `BYREF` / `PINNED` prefix the type they apply to
//!
//! # Examples
//!
//! ```rust
//! use dotvtable::metadata::{
//!     signatures::parse_local_var_signature,
//!     token::Token,
//!     typesystem::{PrimitiveKind, TypeId, TypePool},
//! };
//!
//! let pool = TypePool::new();
//! let no_types = |token: Token| -> dotvtable::Result<TypeId> { unreachable!("{token}") };
//!
//! // 2 locals: int32, string
//! let locals = parse_local_var_signature(&[0x07, 0x02, 0x08, 0x0E], &pool, &no_types, 50)?;
//! assert_eq!(locals.locals[1], pool.primitive(PrimitiveKind::String));
//! # Ok::<(), dotvtable::Error>(())
//! ```

mod parser;
mod types;

pub use parser::*;
pub use types::*;

use crate::{
    metadata::typesystem::{TypeId, TypePool},
    Result,
};

/// Parse a method signature blob.
///
/// # Errors
/// Returns an error if the signature data is malformed or a type cannot be resolved.
pub fn parse_method_signature(
    data: &[u8],
    pool: &TypePool,
    resolver: &dyn TypeTokenResolver,
    max_depth: usize,
) -> Result<MethodSignature> {
    SignatureParser::new(data, pool, resolver, max_depth).parse_method_signature()
}

/// Parse a field signature blob.
///
/// # Errors
/// Returns an error if the signature data is malformed or a type cannot be resolved.
pub fn parse_field_signature(
    data: &[u8],
    pool: &TypePool,
    resolver: &dyn TypeTokenResolver,
    max_depth: usize,
) -> Result<FieldSignature> {
    SignatureParser::new(data, pool, resolver, max_depth).parse_field_signature()
}

/// Parse a property signature blob.
///
/// # Errors
/// Returns an error if the signature data is malformed or a type cannot be resolved.
pub fn parse_property_signature(
    data: &[u8],
    pool: &TypePool,
    resolver: &dyn TypeTokenResolver,
    max_depth: usize,
) -> Result<PropertySignature> {
    SignatureParser::new(data, pool, resolver, max_depth).parse_property_signature()
}

/// Parse a local variable signature blob.
///
/// # Errors
/// Returns an error if the signature data is malformed or a type cannot be resolved.
pub fn parse_local_var_signature(
    data: &[u8],
    pool: &TypePool,
    resolver: &dyn TypeTokenResolver,
    max_depth: usize,
) -> Result<LocalVariableSignature> {
    SignatureParser::new(data, pool, resolver, max_depth).parse_local_var_signature()
}

/// Parse a TypeSpec blob.
///
/// # Errors
/// Returns an error if the signature data is malformed or a type cannot be resolved.
pub fn parse_type_spec_signature(
    data: &[u8],
    pool: &TypePool,
    resolver: &dyn TypeTokenResolver,
    max_depth: usize,
) -> Result<TypeId> {
    SignatureParser::new(data, pool, resolver, max_depth).parse_type_spec_signature()
}

/// Parse a MethodSpec instantiation blob.
///
/// # Errors
/// Returns an error if the signature data is malformed or a type cannot be resolved.
pub fn parse_method_spec_signature(
    data: &[u8],
    pool: &TypePool,
    resolver: &dyn TypeTokenResolver,
    max_depth: usize,
) -> Result<MethodSpecSignature> {
    SignatureParser::new(data, pool, resolver, max_depth).parse_method_spec_signature()
}
