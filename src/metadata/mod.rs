//! ECMA-335 metadata.
//!
//! Reading starts at [`image::Image`], which validates the CLI header, the metadata root
//! and its streams, and hands out typed rows of the metadata [`tables`]. Above it,
//! [`typesystem::TypeSystem`] connects the images into one type model: tokens resolve to
//! interned types and definitions load on demand, with [`signatures`] decoding the blobs
//! in between.
//!
//! # Key Components
//!
//! - [`image`] - one loaded image with its heaps and tables
//! - [`tables`] - row layouts and coded indices
//! - [`streams`] - the `#Strings`, `#US`, `#Blob`, `#GUID` and `#~` streams
//! - [`method`] - method body headers and exception clauses
//! - [`signatures`] - type, method, field, local and instantiation signatures
//! - [`typesystem`] - interned types, definitions and reference resolution

/// The CLI header of a PE image
pub mod cor20header;
/// A loaded metadata image
pub mod image;
/// Method bodies
pub mod method;
/// The metadata root and its stream directory
pub mod root;
/// Signature blob decoding
pub mod signatures;
/// Metadata streams and heaps
pub mod streams;
/// Metadata tables
pub mod tables;
/// Metadata tokens
pub mod token;
/// Interned types, definitions and resolution
pub mod typesystem;
