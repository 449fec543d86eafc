use crate::metadata::typesystem::{
    PrecomputedLayout, PrimitiveKind, TypeDefId, TypeDefinition, TypeId, TypePool,
};

/// The runtime hosting the type system.
///
/// A host owns the types that do not come from a registered image (typically the core
/// library compiled ahead of time) and observes type loading. Ids of host types use module
/// ids from [`crate::metadata::typesystem::ModuleId::FIRST_HOST`] up.
///
/// All queries are synchronous and may be called from several threads.
pub trait RuntimeHost: Send + Sync {
    /// Resolve a type referenced by `assembly` name, namespace and name.
    fn resolve_type(&self, assembly: &str, namespace: &str, name: &str) -> Option<TypeDefId>;

    /// Supply the definition of a host-owned type. Signatures are interned into `pool`.
    fn type_definition(&self, id: TypeDefId, pool: &TypePool) -> Option<TypeDefinition>;

    /// Called once when a definition enters the type system.
    fn type_loaded(&self, _definition: &TypeDefinition) {}

    /// A virtual table the host already laid out for `ty`.
    fn precomputed_layout(&self, _ty: TypeId, _pool: &TypePool) -> Option<PrecomputedLayout> {
        None
    }

    /// The host's definition of a built-in type, used for `object` and `string` bases.
    fn core_type(&self, _kind: PrimitiveKind) -> Option<TypeDefId> {
        None
    }

    /// Resolve a type nested in a host-owned type.
    fn resolve_nested_type(&self, _enclosing: TypeDefId, _name: &str) -> Option<TypeDefId> {
        None
    }
}

/// A host that owns nothing. Every type must come from a registered image.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl RuntimeHost for NullHost {
    fn resolve_type(&self, _assembly: &str, _namespace: &str, _name: &str) -> Option<TypeDefId> {
        None
    }

    fn type_definition(&self, _id: TypeDefId, _pool: &TypePool) -> Option<TypeDefinition> {
        None
    }
}
