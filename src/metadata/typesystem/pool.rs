use dashmap::DashMap;
use strum::IntoEnumIterator;

use crate::metadata::typesystem::{ArrayShape, PrimitiveKind, TypeDefId, TypeId, TypeKind};

/// Hash-consing arena for [`TypeKind`] values.
///
/// Every type is stored once; interning a structurally equal value returns the existing
/// handle, so comparing two types is comparing two integers. Entries are never removed and
/// handles stay valid for the lifetime of the pool.
///
/// The pool is shared by `Arc` between the type system and the virtual table builder and is
/// safe to intern into from several threads.
///
/// # Examples
///
/// ```rust
/// use dotvtable::metadata::typesystem::{PrimitiveKind, TypePool};
///
/// let pool = TypePool::new();
/// let int32 = pool.primitive(PrimitiveKind::I4);
/// assert_eq!(pool.sz_array(int32), pool.sz_array(int32));
/// assert_ne!(pool.by_ref(int32), int32);
/// ```
pub struct TypePool {
    types: boxcar::Vec<TypeKind>,
    index: DashMap<TypeKind, TypeId>,
}

impl TypePool {
    /// Create a pool with every primitive pre-interned.
    #[must_use]
    pub fn new() -> Self {
        let pool = TypePool {
            types: boxcar::Vec::new(),
            index: DashMap::new(),
        };
        for kind in PrimitiveKind::iter() {
            pool.intern(TypeKind::Primitive(kind));
        }
        pool
    }

    /// Intern `kind`, returning the handle of the structurally equal entry.
    pub fn intern(&self, kind: TypeKind) -> TypeId {
        if let Some(id) = self.index.get(&kind) {
            return *id;
        }
        *self
            .index
            .entry(kind.clone())
            .or_insert_with(|| TypeId(self.types.push(kind) as u32))
    }

    /// The node behind `id`.
    #[must_use]
    pub fn kind(&self, id: TypeId) -> Option<&TypeKind> {
        self.types.get(id.0 as usize)
    }

    /// Number of interned types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.count()
    }

    /// Always `false`: primitives are interned on creation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.count() == 0
    }

    /// Handle of a primitive.
    #[must_use]
    pub fn primitive(&self, kind: PrimitiveKind) -> TypeId {
        TypeId(kind as u32)
    }

    /// `T*`
    pub fn ptr(&self, inner: TypeId) -> TypeId {
        self.intern(TypeKind::Ptr(inner))
    }

    /// `T&`
    pub fn by_ref(&self, inner: TypeId) -> TypeId {
        self.intern(TypeKind::ByRef(inner))
    }

    /// `T[]`
    pub fn sz_array(&self, element: TypeId) -> TypeId {
        self.intern(TypeKind::SzArray(element))
    }

    /// `T[,...]`
    pub fn array(&self, element: TypeId, shape: ArrayShape) -> TypeId {
        self.intern(TypeKind::Array { element, shape })
    }

    /// `!n`
    pub fn var(&self, index: u32) -> TypeId {
        self.intern(TypeKind::Var(index))
    }

    /// `!!n`
    pub fn mvar(&self, index: u32) -> TypeId {
        self.intern(TypeKind::MVar(index))
    }

    /// A type definition.
    pub fn def(&self, definition: TypeDefId) -> TypeId {
        self.intern(TypeKind::Def(definition))
    }

    /// `definition<args...>`
    pub fn generic_inst(&self, definition: TypeDefId, args: Vec<TypeId>) -> TypeId {
        self.intern(TypeKind::GenericInst { definition, args })
    }

    /// The definition behind a `Def` or `GenericInst`.
    #[must_use]
    pub fn definition_of(&self, id: TypeId) -> Option<TypeDefId> {
        match self.kind(id)? {
            TypeKind::Def(definition) | TypeKind::GenericInst { definition, .. } => {
                Some(*definition)
            }
            _ => None,
        }
    }

    /// Type arguments of a `GenericInst`, empty for anything else.
    #[must_use]
    pub fn generic_args(&self, id: TypeId) -> &[TypeId] {
        match self.kind(id) {
            Some(TypeKind::GenericInst { args, .. }) => args,
            _ => &[],
        }
    }

    /// Returns `true` if a `Var` or `MVar` occurs anywhere in `id`.
    #[must_use]
    pub fn has_generic_params(&self, id: TypeId) -> bool {
        match self.kind(id) {
            Some(TypeKind::Var(_) | TypeKind::MVar(_)) => true,
            Some(
                TypeKind::Ptr(inner)
                | TypeKind::ByRef(inner)
                | TypeKind::SzArray(inner)
                | TypeKind::Pinned(inner)
                | TypeKind::Array { element: inner, .. },
            ) => self.has_generic_params(*inner),
            Some(TypeKind::Modified {
                modifier, inner, ..
            }) => self.has_generic_params(*modifier) || self.has_generic_params(*inner),
            Some(TypeKind::GenericInst { args, .. }) => {
                args.iter().any(|arg| self.has_generic_params(*arg))
            }
            _ => false,
        }
    }

    /// Replace `!n` by `type_args[n]` and `!!n` by `method_args[n]` throughout `id`.
    ///
    /// Parameters without a corresponding argument are left in place, so substituting
    /// with an empty list is the identity.
    pub fn substitute(&self, id: TypeId, type_args: &[TypeId], method_args: &[TypeId]) -> TypeId {
        if type_args.is_empty() && method_args.is_empty() {
            return id;
        }

        let Some(kind) = self.kind(id) else {
            return id;
        };
        let sub = |inner: TypeId| self.substitute(inner, type_args, method_args);

        match kind {
            TypeKind::Primitive(_) | TypeKind::Def(_) => id,
            TypeKind::Var(index) => type_args.get(*index as usize).copied().unwrap_or(id),
            TypeKind::MVar(index) => method_args.get(*index as usize).copied().unwrap_or(id),
            TypeKind::Ptr(inner) => {
                let inner = sub(*inner);
                self.ptr(inner)
            }
            TypeKind::ByRef(inner) => {
                let inner = sub(*inner);
                self.by_ref(inner)
            }
            TypeKind::SzArray(inner) => {
                let inner = sub(*inner);
                self.sz_array(inner)
            }
            TypeKind::Pinned(inner) => {
                let inner = sub(*inner);
                self.intern(TypeKind::Pinned(inner))
            }
            TypeKind::Array { element, shape } => {
                let shape = shape.clone();
                let element = sub(*element);
                self.array(element, shape)
            }
            TypeKind::Modified {
                required,
                modifier,
                inner,
            } => {
                let required = *required;
                let modifier = sub(*modifier);
                let inner = sub(*inner);
                self.intern(TypeKind::Modified {
                    required,
                    modifier,
                    inner,
                })
            }
            TypeKind::GenericInst { definition, args } => {
                let definition = *definition;
                let args = args.iter().map(|arg| sub(*arg)).collect();
                self.generic_inst(definition, args)
            }
        }
    }
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metadata::typesystem::ModuleId;

    #[test]
    fn primitives_first() {
        let pool = TypePool::new();
        for kind in PrimitiveKind::iter() {
            let id = pool.primitive(kind);
            assert_eq!(pool.kind(id), Some(&TypeKind::Primitive(kind)));
            assert_eq!(pool.intern(TypeKind::Primitive(kind)), id);
        }
        assert_eq!(pool.len(), 18);
    }

    #[test]
    fn structural_identity() {
        let pool = TypePool::new();
        let int32 = pool.primitive(PrimitiveKind::I4);
        let list = TypeDefId::new(ModuleId(0), 4);

        let a = pool.generic_inst(list, vec![pool.sz_array(int32)]);
        let b = pool.generic_inst(list, vec![pool.sz_array(int32)]);
        assert_eq!(a, b);
        assert_ne!(a, pool.generic_inst(list, vec![int32]));
        assert_eq!(pool.definition_of(a), Some(list));
        assert_eq!(pool.generic_args(a), &[pool.sz_array(int32)]);
        assert_eq!(pool.by_ref(int32), pool.by_ref(int32));
    }

    #[test]
    fn substitution() {
        let pool = TypePool::new();
        let int32 = pool.primitive(PrimitiveKind::I4);
        let string = pool.primitive(PrimitiveKind::String);
        let list = TypeDefId::new(ModuleId(0), 4);

        // List<!0[]>, !!0&
        let open = pool.generic_inst(list, vec![pool.sz_array(pool.var(0))]);
        let by_ref = pool.by_ref(pool.mvar(0));
        assert!(pool.has_generic_params(open));

        let closed = pool.substitute(open, &[int32], &[]);
        assert_eq!(closed, pool.generic_inst(list, vec![pool.sz_array(int32)]));
        assert!(!pool.has_generic_params(closed));
        assert_eq!(pool.substitute(by_ref, &[int32], &[string]), pool.by_ref(string));

        // unmatched parameters stay
        assert_eq!(pool.substitute(pool.var(1), &[int32], &[]), pool.var(1));
        assert_eq!(pool.substitute(open, &[], &[]), open);
    }

    #[test]
    fn concurrent_interning() {
        let pool = Arc::new(TypePool::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    (0..64)
                        .map(|n| pool.sz_array(pool.var(n)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(pool.len(), 18 + 128);
    }
}
