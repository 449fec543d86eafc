//! The per-type dispatch layout.

use std::{collections::HashMap, sync::Arc};

use crate::metadata::typesystem::{MethodId, MethodRef, TypeDefId, TypeId};

/// Index of a [`TypeDeclTree`] in the builder's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeHandle(pub u32);

/// A virtual method together with the (possibly instantiated) type declaring it.
pub type GenericClassMethod = MethodRef;

/// The method dispatched through one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodImplSlot {
    /// Slot number, equal to this entry's index in [`TypeDeclTree::method_impls`]
    pub slot: u16,
    /// Type declaring the implementation
    pub declaring: TypeId,
    /// The implementing method
    pub method: MethodId,
    /// Name of the implementing method
    pub name: Arc<str>,
}

impl MethodImplSlot {
    /// The implementation as a method reference.
    #[must_use]
    pub fn method_ref(&self) -> MethodRef {
        MethodRef {
            declaring: self.declaring,
            method: self.method,
        }
    }
}

/// Placement of an interface's block of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceOffset {
    /// The interface type
    pub interface: TypeId,
    /// The interface's own tree
    pub tree: TreeHandle,
    /// First slot of the block
    pub offset: u16,
}

/// The virtual dispatch layout of one type.
///
/// Trees are immutable once built. `parent` and the trees of `interfaces` are shared with
/// every other type that references them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDeclTree {
    /// The type laid out
    pub ty: TypeId,
    /// Its definition
    pub definition: TypeDefId,
    /// Tree of the base type
    pub parent: Option<TreeHandle>,
    /// Every interface block, inherited ones first
    pub interfaces: Vec<InterfaceOffset>,
    /// Virtual methods declared by the type itself
    pub virtual_methods: Vec<GenericClassMethod>,
    /// Implementation of each slot
    pub method_impls: Vec<MethodImplSlot>,
    /// Slot of each of `virtual_methods`
    pub method_slots: HashMap<MethodId, u16>,
    /// Taken verbatim from the host
    pub precomputed: bool,
}

impl TypeDeclTree {
    /// Total number of slots.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.method_impls.len()
    }

    /// The implementation in `slot`.
    #[must_use]
    pub fn slot(&self, slot: u16) -> Option<&MethodImplSlot> {
        self.method_impls.get(usize::from(slot))
    }

    /// Slot of a virtual method declared by this type.
    #[must_use]
    pub fn slot_of(&self, method: MethodId) -> Option<u16> {
        self.method_slots.get(&method).copied()
    }

    /// First slot of `interface`'s block.
    #[must_use]
    pub fn interface_offset(&self, interface: TypeId) -> Option<u16> {
        self.interfaces
            .iter()
            .find(|entry| entry.interface == interface)
            .map(|entry| entry.offset)
    }
}
