//! The cross-image type model.
//!
//! Types are interned once in a [`TypePool`] and then handled as [`TypeId`]s: two ids are
//! equal exactly when the types are structurally equal, so generic instantiations, arrays
//! and pointers compare by id. Definitions are loaded lazily into a [`TypeSystem`] from the
//! registered images or from the [`RuntimeHost`], which owns the types that come from
//! outside (typically the core library).
//!
//! # Key Components
//!
//! - [`TypePool`] - interning of [`TypeKind`]s and generic substitution
//! - [`TypeSystem`] - images, lazily loaded [`TypeDefinition`]s and token resolution
//! - [`RuntimeHost`] - host-owned types, precomputed layouts and load notifications
//!
//! # Examples
//!
//! ```rust
//! use dotvtable::metadata::typesystem::{PrimitiveKind, TypePool};
//!
//! let pool = TypePool::new();
//! let int32 = pool.primitive(PrimitiveKind::I4);
//! assert_eq!(pool.sz_array(int32), pool.sz_array(int32));
//! assert_ne!(pool.sz_array(int32), pool.ptr(int32));
//! ```

mod definition;
mod host;
mod loader;
mod pool;
pub(crate) mod registry;
pub(crate) mod resolver;
mod types;

pub use definition::{
    FieldDefinition, FieldRef, MemberReference, MethodDefinition, MethodImplEntry, MethodRef,
    PrecomputedLayout, TypeAttributes, TypeDefinition, TYPE_VISIBILITY_MASK,
};
pub use host::{NullHost, RuntimeHost};
pub use pool::TypePool;
pub use registry::TypeSystem;
pub use types::{
    ArrayShape, FieldId, MethodId, ModuleId, PrimitiveKind, TypeDefId, TypeId, TypeKind,
    ELEMENT_TYPE,
};
