//! Slot assignment for types without an instantiation to inflate from.
//!
//! A type's table starts as a copy of its parent's, so every inherited slot keeps its
//! number. New interfaces then get a block of slots each, and the type's own virtual
//! methods either take over an inherited slot or open a new one:
//!
//! | method                 | slot                                                   |
//! |------------------------|--------------------------------------------------------|
//! | `newslot`, private     | new; the interface slot named by its `MethodImpl` row  |
//! | `newslot`              | a matching slot of an interface it adds, else new      |
//! | no `newslot`           | the slot of the nearest ancestor method it matches     |
//!
//! `MethodImpl` rows are applied last. Interface slots still holding an abstract
//! interface method afterwards are matched against inherited methods a final time.

use std::{collections::HashMap, sync::Arc};

use tracing::trace;

use crate::{
    metadata::{
        signatures::MethodSignature,
        typesystem::{
            MethodDefinition, MethodId, MethodRef, PrecomputedLayout, TypeDefId, TypeId,
        },
    },
    vtable::{
        builder::BuildState, GenericClassMethod, InterfaceOffset, MethodImplSlot, TreeHandle,
        TypeDeclTree, VTableBuilder,
    },
    Error, Result,
};

impl VTableBuilder {
    /// Wrap a layout the host fixed ahead of time.
    pub(crate) fn precomputed(
        &self,
        state: &mut BuildState,
        ty: TypeId,
        definition_id: TypeDefId,
        layout: &PrecomputedLayout,
        depth: usize,
    ) -> Result<TypeDeclTree> {
        let system = &self.system;
        let definition = system.definition(definition_id)?;
        let type_name = system.type_name(ty);

        let parent = definition
            .parent
            .map(|parent| self.build_locked(state, parent, depth + 1))
            .transpose()?;
        if let Some(parent) = parent {
            let inherited = self.tree_ref(parent)?.slot_count();
            if inherited > layout.slots.len() {
                return Err(layout_error!(
                    type_name,
                    "{} slots cannot hold the {} inherited ones",
                    layout.slots.len(),
                    inherited
                ));
            }
        }

        let mut method_impls = Vec::with_capacity(layout.slots.len());
        for (index, method) in layout.slots.iter().enumerate() {
            let (declaring, implementation) =
                self.declaring_in_chain(ty, &definition.methods, parent, *method)?;
            let slot = slot_number(index, &type_name)?;
            method_impls.push(MethodImplSlot {
                slot,
                declaring,
                method: *method,
                name: implementation.name.clone(),
            });
        }

        let mut interfaces = Vec::with_capacity(layout.interface_offsets.len());
        for (interface, offset) in &layout.interface_offsets {
            let interface = self.canonical(*interface)?;
            let tree = self.build_locked(state, interface, depth + 1)?;
            let end = usize::from(*offset) + self.tree_ref(tree)?.slot_count();
            if end > method_impls.len() {
                return Err(layout_error!(
                    type_name,
                    "block of {} at {} runs past the last slot",
                    system.type_name(interface),
                    offset
                ));
            }
            interfaces.push(InterfaceOffset {
                interface,
                tree,
                offset: *offset,
            });
        }

        let mut virtual_methods = Vec::new();
        let mut method_slots = HashMap::new();
        for method in definition.virtual_methods() {
            let Some(index) = layout.slots.iter().position(|slot| *slot == method.id) else {
                return Err(layout_error!(
                    type_name,
                    "virtual method {} has no precomputed slot",
                    method.name
                ));
            };
            method_slots.insert(method.id, slot_number(index, &type_name)?);
            virtual_methods.push(GenericClassMethod {
                declaring: ty,
                method: method.id,
            });
        }

        trace!(ty = %type_name, slots = method_impls.len(), "precomputed layout adopted");

        Ok(TypeDeclTree {
            ty,
            definition: definition_id,
            parent,
            interfaces,
            virtual_methods,
            method_impls,
            method_slots,
            precomputed: true,
        })
    }

    /// The nearest type of the chain starting at `ty` that declares `method`.
    fn declaring_in_chain(
        &self,
        ty: TypeId,
        own_methods: &[Arc<MethodDefinition>],
        parent: Option<TreeHandle>,
        method: MethodId,
    ) -> Result<(TypeId, Arc<MethodDefinition>)> {
        if let Some(own) = own_methods.iter().find(|own| own.id == method) {
            return Ok((ty, own.clone()));
        }

        let mut current = parent;
        while let Some(handle) = current {
            let node = self.tree_ref(handle)?;
            let definition = self.system.definition(node.definition)?;
            if let Some(found) = definition.method(method) {
                return Ok((node.ty, found.clone()));
            }
            current = node.parent;
        }

        Err(layout_error!(
            self.system.type_name(ty),
            "precomputed slot method {} is not declared in the type or its ancestors",
            method.token
        ))
    }

    /// Lay out a type from its own definition and its parent's table.
    pub(crate) fn incremental(
        &self,
        state: &mut BuildState,
        ty: TypeId,
        definition_id: TypeDefId,
        depth: usize,
    ) -> Result<TypeDeclTree> {
        let definition = self.system.definition(definition_id)?;
        let mut layout = IncrementalLayout {
            builder: self,
            ty,
            type_name: self.system.type_name(ty),
            parent: None,
            parent_count: 0,
            own_blocks: 0,
            interfaces: Vec::new(),
            method_impls: Vec::new(),
            method_slots: HashMap::new(),
        };

        if definition.is_interface() {
            for method in definition.virtual_methods() {
                layout.allocate(method)?;
            }
            return Ok(layout.finish(definition_id, &definition.methods));
        }

        if let Some(parent) = definition.parent {
            let parent = self.build_locked(state, parent, depth + 1)?;
            let tree = self.tree_ref(parent)?;
            layout.parent = Some(parent);
            layout.method_impls = tree.method_impls.clone();
            layout.interfaces = tree.interfaces.clone();
        }
        layout.parent_count = layout.method_impls.len();
        layout.own_blocks = layout.interfaces.len();

        for interface in &definition.interfaces {
            let interface = self.canonical(*interface)?;
            if layout.interfaces.iter().any(|block| block.interface == interface) {
                continue;
            }
            let tree = self.build_locked(state, interface, depth + 1)?;
            layout.place_interface(interface, tree)?;
        }

        let mut explicit = Vec::new();
        for method in definition.virtual_methods() {
            let own = MethodRef {
                declaring: ty,
                method: method.id,
            };
            let signature = self.system.method_signature_in(&own)?;

            if method.is_new_slot() && method.is_private() {
                layout.allocate(method)?;
                explicit.push(method);
            } else if method.is_new_slot() {
                layout.place_new_slot(method, &signature)?;
            } else if let Some((ancestor, slot)) = layout.find_ancestor(&method.name, &signature)? {
                layout.place_override(method, &signature, ancestor, slot)?;
            } else {
                layout.place_new_slot(method, &signature)?;
            }
        }

        let overrides = self.system.method_impls(definition_id)?;
        for entry in overrides.iter() {
            layout.apply_method_impl(entry.body, entry.declaration)?;
        }
        for method in explicit {
            if !overrides.iter().any(|entry| entry.body.method == method.id) {
                return Err(layout_error!(
                    layout.type_name,
                    "explicit implementation {} has no MethodImpl record",
                    method.name
                ));
            }
        }

        layout.satisfy_from_ancestors()?;
        Ok(layout.finish(definition_id, &definition.methods))
    }
}

/// A table under construction.
struct IncrementalLayout<'a> {
    builder: &'a VTableBuilder,
    ty: TypeId,
    type_name: String,
    parent: Option<TreeHandle>,
    parent_count: usize,
    /// Index of the first interface block this type adds
    own_blocks: usize,
    interfaces: Vec<InterfaceOffset>,
    method_impls: Vec<MethodImplSlot>,
    method_slots: HashMap<MethodId, u16>,
}

impl IncrementalLayout<'_> {
    fn allocate(&mut self, method: &MethodDefinition) -> Result<u16> {
        let slot = slot_number(self.method_impls.len(), &self.type_name)?;
        self.method_impls.push(MethodImplSlot {
            slot,
            declaring: self.ty,
            method: method.id,
            name: method.name.clone(),
        });
        self.method_slots.insert(method.id, slot);
        trace!(ty = %self.type_name, method = %method.name, slot, "new slot");
        Ok(slot)
    }

    fn redirect(&mut self, slot: u16, implementation: MethodRef) -> Result<()> {
        let name = self.builder.system.method(implementation.method)?.name.clone();
        let Some(entry) = self.method_impls.get_mut(usize::from(slot)) else {
            return Err(layout_error!(self.type_name, "slot {} does not exist", slot));
        };
        trace!(ty = %self.type_name, slot, from = %entry.name, to = %name, "slot redirected");
        entry.declaring = implementation.declaring;
        entry.method = implementation.method;
        entry.name = name;
        Ok(())
    }

    fn own(&self, method: &MethodDefinition) -> MethodRef {
        MethodRef {
            declaring: self.ty,
            method: method.id,
        }
    }

    fn place_interface(&mut self, interface: TypeId, tree: TreeHandle) -> Result<()> {
        let builder = self.builder;
        let offset = slot_number(self.method_impls.len(), &self.type_name)?;
        let block = builder.tree_ref(tree)?;
        for entry in &block.method_impls {
            let slot = slot_number(self.method_impls.len(), &self.type_name)?;
            self.method_impls.push(MethodImplSlot {
                slot,
                ..entry.clone()
            });
        }
        self.interfaces.push(InterfaceOffset {
            interface,
            tree,
            offset,
        });
        trace!(
            ty = %self.type_name,
            interface = %builder.system.type_name(interface),
            offset,
            slots = block.slot_count(),
            "interface placed"
        );
        Ok(())
    }

    /// `true` if `candidate`, read through its declaring type, is named `name` and has
    /// `signature`.
    fn matches(
        &self,
        candidate: &MethodRef,
        name: &str,
        signature: &MethodSignature,
    ) -> Result<bool> {
        let system = &self.builder.system;
        if &*system.method(candidate.method)?.name != name {
            return Ok(false);
        }
        Ok(system.method_signature_in(candidate)?.matches(signature))
    }

    /// The last method of each interface block matching `name` and `signature`, as
    /// `(block index, slot)`.
    fn interface_matches(
        &self,
        name: &str,
        signature: &MethodSignature,
    ) -> Result<Vec<(usize, u16)>> {
        let mut found = Vec::new();
        for (index, block) in self.interfaces.iter().enumerate() {
            let tree = self.builder.tree_ref(block.tree)?;
            for candidate in tree.virtual_methods.iter().rev() {
                if !self.matches(candidate, name, signature)? {
                    continue;
                }
                if let Some(slot) = tree.slot_of(candidate.method) {
                    found.push((index, block.offset + slot));
                }
                break;
            }
        }
        Ok(found)
    }

    /// The nearest ancestor virtual method matching `name` and `signature`, with its slot.
    fn find_ancestor(
        &self,
        name: &str,
        signature: &MethodSignature,
    ) -> Result<Option<(MethodRef, u16)>> {
        let mut current = self.parent;
        while let Some(handle) = current {
            let node = self.builder.tree_ref(handle)?;
            for candidate in node.virtual_methods.iter().rev() {
                if !self.matches(candidate, name, signature)? {
                    continue;
                }
                let Some(slot) = node.slot_of(candidate.method) else {
                    return Err(layout_error!(
                        self.builder.system.type_name(node.ty),
                        "virtual method {} has no slot",
                        name
                    ));
                };
                return Ok(Some((*candidate, slot)));
            }
            current = node.parent;
        }
        Ok(None)
    }

    fn place_new_slot(
        &mut self,
        method: &MethodDefinition,
        signature: &MethodSignature,
    ) -> Result<()> {
        let matches = self.interface_matches(&method.name, signature)?;
        let own = self.own(method);
        for (_, slot) in &matches {
            self.redirect(*slot, own)?;
        }

        match matches.iter().find(|(block, _)| *block >= self.own_blocks) {
            Some((_, slot)) => {
                self.method_slots.insert(method.id, *slot);
            }
            None => {
                self.allocate(method)?;
            }
        }
        Ok(())
    }

    fn place_override(
        &mut self,
        method: &MethodDefinition,
        signature: &MethodSignature,
        ancestor: MethodRef,
        slot: u16,
    ) -> Result<()> {
        let own = self.own(method);
        let previous = self
            .method_impls
            .get(usize::from(slot))
            .map(|entry| entry.method)
            .ok_or_else(|| {
                layout_error!(self.type_name, "inherited slot {} does not exist", slot)
            })?;
        let replaced = |entry: &MethodImplSlot| {
            entry.method == ancestor.method || entry.method == previous
        };

        let shared: Vec<u16> = self.method_impls[..self.parent_count]
            .iter()
            .filter(|entry| replaced(entry))
            .map(|entry| entry.slot)
            .collect();
        for shared in shared {
            self.redirect(shared, own)?;
        }
        self.method_slots.insert(method.id, slot);

        let builder = self.builder;
        let mut interface_slots = Vec::new();
        for block in &self.interfaces {
            let tree = builder.tree_ref(block.tree)?;
            for candidate in &tree.virtual_methods {
                let Some(index) = tree.slot_of(candidate.method) else {
                    continue;
                };
                let index = block.offset + index;
                let Some(entry) = self.method_impls.get(usize::from(index)) else {
                    continue;
                };
                let unimplemented = entry.method == candidate.method
                    && entry.declaring == block.interface
                    && self.matches(candidate, &method.name, signature)?;
                if replaced(entry) || unimplemented {
                    interface_slots.push(index);
                }
            }
        }
        for index in interface_slots {
            self.redirect(index, own)?;
        }

        trace!(ty = %self.type_name, method = %method.name, slot, "override");
        Ok(())
    }

    fn apply_method_impl(&mut self, body: MethodRef, declaration: MethodRef) -> Result<()> {
        let builder = self.builder;
        let declaring = builder.canonical(declaration.declaring)?;
        let body = MethodRef {
            declaring: builder.canonical(body.declaring)?,
            method: body.method,
        };

        let mut slot = None;
        if let Some(block) = self
            .interfaces
            .iter()
            .find(|block| block.interface == declaring)
        {
            slot = builder
                .tree_ref(block.tree)?
                .slot_of(declaration.method)
                .map(|index| block.offset + index);
        } else {
            let mut current = self.parent;
            while let Some(handle) = current {
                let node = builder.tree_ref(handle)?;
                if let Some(index) = node.slot_of(declaration.method) {
                    slot = Some(index);
                    break;
                }
                current = node.parent;
            }
        }

        let Some(slot) = slot else {
            let name = builder.system.method(declaration.method)?.name.clone();
            return Err(layout_error!(
                self.type_name,
                "MethodImpl overrides {}.{} which has no slot",
                builder.system.type_name(declaring),
                name
            ));
        };

        self.redirect(slot, body)?;
        if body.declaring == self.ty {
            self.method_slots.entry(body.method).or_insert(slot);
        }
        Ok(())
    }

    /// Point interface slots still holding an abstract interface method at an inherited
    /// implementation.
    fn satisfy_from_ancestors(&mut self) -> Result<()> {
        let builder = self.builder;
        let system = builder.system.clone();
        for block in self.interfaces[self.own_blocks..].to_vec() {
            let tree = builder.tree_ref(block.tree)?;
            for candidate in &tree.virtual_methods {
                let Some(index) = tree.slot_of(candidate.method) else {
                    continue;
                };
                let index = block.offset + index;
                let pending = self
                    .method_impls
                    .get(usize::from(index))
                    .is_some_and(|entry| entry.method == candidate.method);
                if !pending {
                    continue;
                }

                let interface_method = system.method(candidate.method)?;
                let signature = system.method_signature_in(candidate)?;
                if let Some((_, slot)) = self.find_ancestor(&interface_method.name, &signature)? {
                    let implementation = self.method_impls[usize::from(slot)].method_ref();
                    self.redirect(index, implementation)?;
                } else if interface_method.is_abstract() {
                    return Err(layout_error!(
                        self.type_name,
                        "{}.{} is not implemented",
                        system.type_name(block.interface),
                        interface_method.name
                    ));
                }
            }
        }
        Ok(())
    }

    fn finish(self, definition: TypeDefId, methods: &[Arc<MethodDefinition>]) -> TypeDeclTree {
        let virtual_methods = methods
            .iter()
            .filter(|method| method.is_virtual())
            .map(|method| GenericClassMethod {
                declaring: self.ty,
                method: method.id,
            })
            .collect();

        TypeDeclTree {
            ty: self.ty,
            definition,
            parent: self.parent,
            interfaces: self.interfaces,
            virtual_methods,
            method_impls: self.method_impls,
            method_slots: self.method_slots,
            precomputed: false,
        }
    }
}

pub(crate) fn slot_number(index: usize, type_name: &str) -> Result<u16> {
    u16::try_from(index).map_err(|_| Error::LayoutInconsistency {
        type_name: type_name.to_string(),
        message: format!("more than {} slots", u16::MAX),
    })
}
