use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tracing::debug;

use crate::{
    metadata::typesystem::{MethodId, PrimitiveKind, TypeId, TypeKind, TypeSystem},
    vtable::{MethodImplSlot, TreeHandle, TypeDeclTree},
    Error, Result,
};

/// Types whose trees are being built on the current call stack.
#[derive(Debug, Default)]
pub(crate) struct BuildState {
    pub(crate) building: Vec<TypeId>,
}

/// Builds and caches the virtual tables of a [`TypeSystem`]'s types.
///
/// Trees are built on first query, parents and interfaces first, and then shared: every
/// child refers to its parent's tree by handle. Queries for built types read the cache
/// without locking; building serializes on one lock.
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use dotvtable::{vtable::VTableBuilder, metadata::typesystem::TypeId};
///
/// let builder = VTableBuilder::new(Arc::new(system));
/// let hello = builder.system().resolve_type_token(module, hello_token)?;
/// for entry in &builder.tree_of(hello)?.method_impls {
///     println!("{:3} {}", entry.slot, entry.name);
/// }
/// ```
pub struct VTableBuilder {
    pub(crate) system: Arc<TypeSystem>,
    trees: boxcar::Vec<TypeDeclTree>,
    cache: DashMap<TypeId, TreeHandle>,
    state: Mutex<BuildState>,
}

impl VTableBuilder {
    /// Create a builder laying out the types of `system`.
    #[must_use]
    pub fn new(system: Arc<TypeSystem>) -> Self {
        VTableBuilder {
            system,
            trees: boxcar::Vec::new(),
            cache: DashMap::new(),
            state: Mutex::new(BuildState::default()),
        }
    }

    /// The type system trees are built from.
    #[must_use]
    pub fn system(&self) -> &Arc<TypeSystem> {
        &self.system
    }

    /// Number of trees built so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.count()
    }

    /// Returns `true` if nothing has been built yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.count() == 0
    }

    /// The tree behind `handle`.
    #[must_use]
    pub fn tree(&self, handle: TreeHandle) -> Option<&TypeDeclTree> {
        self.trees.get(handle.0 as usize)
    }

    /// Build the virtual table of `ty`, or return the cached one.
    ///
    /// `System.Object` and `System.String` are laid out through the host's definitions;
    /// a generic definition is laid out as its open instantiation.
    ///
    /// # Errors
    /// Returns [`Error::LayoutInconsistency`] if the hierarchy is circular or a slot cannot
    /// be resolved, [`Error::UnsupportedConstruct`] for types without a virtual table and
    /// [`Error::RecursionLimit`] for hierarchies deeper than the configured limit.
    pub fn build_by_type(&self, ty: TypeId) -> Result<TreeHandle> {
        if let Some(handle) = self.cache.get(&ty) {
            return Ok(*handle);
        }

        let mut state = lock!(self.state);
        self.build_locked(&mut state, ty, 0)
    }

    /// Build (or fetch) the tree of `ty` and return it.
    ///
    /// # Errors
    /// See [`VTableBuilder::build_by_type`].
    pub fn tree_of(&self, ty: TypeId) -> Result<&TypeDeclTree> {
        let handle = self.build_by_type(ty)?;
        self.tree_ref(handle)
    }

    /// The method invoked through `slot` on an instance of `ty`.
    ///
    /// # Errors
    /// Returns [`Error::LayoutInconsistency`] if `ty` has fewer slots, and any build error.
    pub fn slot(&self, ty: TypeId, slot: u16) -> Result<MethodImplSlot> {
        let tree = self.tree_of(ty)?;
        tree.slot(slot).cloned().ok_or_else(|| {
            layout_error!(
                self.system.type_name(ty),
                "slot {} is out of range ({} slots)",
                slot,
                tree.slot_count()
            )
        })
    }

    /// Number of slots of `ty`.
    ///
    /// # Errors
    /// See [`VTableBuilder::build_by_type`].
    pub fn slot_count(&self, ty: TypeId) -> Result<usize> {
        Ok(self.tree_of(ty)?.slot_count())
    }

    /// First slot of `interface`'s block in `ty`, if `ty` implements it.
    ///
    /// # Errors
    /// See [`VTableBuilder::build_by_type`].
    pub fn interface_offset(&self, ty: TypeId, interface: TypeId) -> Result<Option<u16>> {
        let interface = self.canonical(interface)?;
        Ok(self.tree_of(ty)?.interface_offset(interface))
    }

    /// The implementation a virtual call of `method`, as declared by `declaring`, reaches
    /// on an instance of `ty`.
    ///
    /// `declaring` is an interface `ty` implements or one of its classes.
    ///
    /// # Errors
    /// Returns [`Error::ResolutionFailure`] if `method` has no slot in `ty`.
    pub fn resolve_virtual(
        &self,
        ty: TypeId,
        declaring: TypeId,
        method: MethodId,
    ) -> Result<MethodImplSlot> {
        let declaring = self.canonical(declaring)?;
        let tree = self.tree_of(ty)?;

        let mut slot = None;
        if let Some(block) = tree
            .interfaces
            .iter()
            .find(|block| block.interface == declaring)
        {
            slot = self
                .tree_ref(block.tree)?
                .slot_of(method)
                .map(|index| block.offset + index);
        } else {
            let mut current = Some(tree);
            while let Some(node) = current {
                if node.ty == declaring {
                    slot = node.slot_of(method);
                    break;
                }
                current = node.parent.map(|parent| self.tree_ref(parent)).transpose()?;
            }
        }

        let not_found = || Error::ResolutionFailure {
            token: method.token,
            name: self
                .system
                .method(method)
                .map(|definition| definition.name.to_string())
                .unwrap_or_default(),
            context: format!(
                "virtual table of {} through {}",
                self.system.type_name(ty),
                self.system.type_name(declaring)
            ),
        };

        slot.and_then(|slot| tree.slot(slot).cloned())
            .ok_or_else(not_found)
    }

    /// Lay out `concrete` as an instantiation of the generic definition laid out in
    /// `definition`.
    ///
    /// The result has the definition's shape; only type references differ.
    ///
    /// # Errors
    /// Returns [`Error::LayoutInconsistency`] if `concrete` does not instantiate the
    /// definition of `definition`.
    pub fn inflate(&self, definition: TreeHandle, concrete: TypeId) -> Result<TreeHandle> {
        let source = self.tree_ref(definition)?;
        if self.system.pool().definition_of(concrete) != Some(source.definition) {
            return Err(layout_error!(
                self.system.type_name(concrete),
                "is not an instantiation of {}",
                self.system.type_name(source.ty)
            ));
        }

        let mut state = lock!(self.state);
        if let Some(handle) = self.cache.get(&concrete) {
            return Ok(*handle);
        }
        let tree = self.inflate_locked(&mut state, definition, concrete, 0)?;
        self.finish(concrete, tree)
    }

    pub(crate) fn tree_ref(&self, handle: TreeHandle) -> Result<&TypeDeclTree> {
        self.tree(handle).ok_or_else(|| {
            layout_error!(format!("tree {}", handle.0), "handle is not in the arena")
        })
    }

    /// Build `ty` while holding the build lock.
    pub(crate) fn build_locked(
        &self,
        state: &mut BuildState,
        ty: TypeId,
        depth: usize,
    ) -> Result<TreeHandle> {
        check_depth!(depth, self.system.config().max_build_depth);

        let ty = self.canonical(ty)?;
        if let Some(handle) = self.cache.get(&ty) {
            return Ok(*handle);
        }
        if state.building.contains(&ty) {
            return Err(layout_error!(
                self.system.type_name(ty),
                "circular inheritance"
            ));
        }

        state.building.push(ty);
        let tree = self.layout(state, ty, depth);
        state.building.pop();

        self.finish(ty, tree?)
    }

    fn layout(&self, state: &mut BuildState, ty: TypeId, depth: usize) -> Result<TypeDeclTree> {
        let Some(definition) = self.system.pool().definition_of(ty) else {
            return Err(Error::UnsupportedConstruct(format!(
                "{} has no virtual table",
                self.system.type_name(ty)
            )));
        };

        let open = self.system.self_type(definition)?;
        if open != ty {
            let source = self.build_locked(state, open, depth + 1)?;
            return self.inflate_locked(state, source, ty, depth);
        }

        match self
            .system
            .host()
            .precomputed_layout(ty, self.system.pool())
        {
            Some(layout) => self.precomputed(state, ty, definition, &layout, depth),
            None => self.incremental(state, ty, definition, depth),
        }
    }

    fn finish(&self, ty: TypeId, tree: TypeDeclTree) -> Result<TreeHandle> {
        let slots = tree.slot_count();
        let interfaces = tree.interfaces.len();
        let precomputed = tree.precomputed;

        let index = self.trees.push(tree);
        let handle = u32::try_from(index)
            .map(TreeHandle)
            .map_err(|_| Error::UnsupportedConstruct("too many virtual tables".to_string()))?;
        self.cache.insert(ty, handle);

        debug!(
            ty = %self.system.type_name(ty),
            handle = handle.0,
            slots,
            interfaces,
            precomputed,
            "virtual table built"
        );
        Ok(handle)
    }

    /// The type a virtual table is keyed by.
    ///
    /// `object` and `string` map to the host's definitions and generic definitions to
    /// their open instantiation.
    pub(crate) fn canonical(&self, ty: TypeId) -> Result<TypeId> {
        match self.system.pool().kind(ty) {
            Some(TypeKind::Primitive(kind @ (PrimitiveKind::Object | PrimitiveKind::String))) => {
                match self.system.core_type(*kind) {
                    Some(definition) => self.system.self_type(definition),
                    None => Err(Error::UnsupportedConstruct(format!(
                        "the host does not define System.{}",
                        kind.name()
                    ))),
                }
            }
            Some(TypeKind::Def(definition)) => self.system.self_type(*definition),
            Some(TypeKind::GenericInst { .. }) => Ok(ty),
            _ => Err(Error::UnsupportedConstruct(format!(
                "{} has no virtual table",
                self.system.type_name(ty)
            ))),
        }
    }
}
