//! Virtual tables of generic instantiations.
//!
//! An instantiation is laid out by copying its definition's table and substituting the type
//! arguments into every stored type. Slot numbers and interface offsets are copied
//! unchanged, so all instantiations of a definition share its shape.

use tracing::trace;

use crate::{
    metadata::typesystem::TypeId,
    vtable::{
        builder::BuildState, GenericClassMethod, InterfaceOffset, MethodImplSlot, TreeHandle,
        TypeDeclTree, VTableBuilder,
    },
    Result,
};

impl VTableBuilder {
    pub(crate) fn inflate_locked(
        &self,
        state: &mut BuildState,
        source: TreeHandle,
        concrete: TypeId,
        depth: usize,
    ) -> Result<TypeDeclTree> {
        let pool = self.system.pool();
        let source = self.tree_ref(source)?;
        let args = pool.generic_args(concrete).to_vec();
        let substitute = |ty: TypeId| pool.substitute(ty, &args, &[]);

        let parent = match source.parent {
            Some(parent) => {
                let parent = substitute(self.tree_ref(parent)?.ty);
                Some(self.build_locked(state, parent, depth + 1)?)
            }
            None => None,
        };

        let mut interfaces = Vec::with_capacity(source.interfaces.len());
        for block in &source.interfaces {
            let interface = substitute(block.interface);
            interfaces.push(InterfaceOffset {
                interface,
                tree: self.build_locked(state, interface, depth + 1)?,
                offset: block.offset,
            });
        }

        let virtual_methods = source
            .virtual_methods
            .iter()
            .map(|method| GenericClassMethod {
                declaring: substitute(method.declaring),
                method: method.method,
            })
            .collect();

        let method_impls = source
            .method_impls
            .iter()
            .map(|entry| MethodImplSlot {
                declaring: substitute(entry.declaring),
                ..entry.clone()
            })
            .collect();

        trace!(
            definition = %self.system.type_name(source.ty),
            concrete = %self.system.type_name(concrete),
            "virtual table inflated"
        );

        Ok(TypeDeclTree {
            ty: concrete,
            definition: source.definition,
            parent,
            interfaces,
            virtual_methods,
            method_impls,
            method_slots: source.method_slots.clone(),
            precomputed: source.precomputed,
        })
    }
}
