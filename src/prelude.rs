//! # dotvtable Prelude
//!
//! The types needed to load images, resolve types and query virtual tables, for glob
//! import.
//!
//! ```rust
//! use dotvtable::prelude::*;
//!
//! let pool = TypePool::new();
//! let strings = pool.sz_array(pool.primitive(PrimitiveKind::String));
//! assert_eq!(pool.sz_array(pool.primitive(PrimitiveKind::String)), strings);
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

pub use crate::{Error, LoadConfig, Result};

// ================================================================================================
// Loading
// ================================================================================================

pub use crate::{
    file::File,
    metadata::{image::Image, method::MethodBody, token::Token},
};

// ================================================================================================
// Type System
// ================================================================================================

pub use crate::metadata::{
    signatures::MethodSignature,
    typesystem::{
        MethodDefinition, MethodId, MethodRef, ModuleId, NullHost, PrecomputedLayout,
        PrimitiveKind, RuntimeHost, TypeDefId, TypeDefinition, TypeId, TypeKind, TypePool,
        TypeSystem,
    },
};

// ================================================================================================
// Virtual Tables
// ================================================================================================

pub use crate::vtable::{InterfaceOffset, MethodImplSlot, TreeHandle, TypeDeclTree, VTableBuilder};
