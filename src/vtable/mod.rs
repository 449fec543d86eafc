//! Virtual dispatch tables.
//!
//! [`VTableBuilder`] lays out the virtual methods of the types in a
//! [`crate::metadata::typesystem::TypeSystem`] as numbered slots. Each type gets a
//! [`TypeDeclTree`] that starts with a copy of its parent's slots, so a slot number, once
//! assigned, means the same virtual method in every descendant; an override only changes
//! which implementation the slot holds.
//!
//! Interfaces occupy contiguous blocks of slots. The offset of a block is fixed where the
//! interface is first implemented and inherited unchanged.
//!
//! Three strategies produce a tree:
//!
//! - types the host laid out ahead of time wrap the host's [`PrecomputedLayout`]
//! - other type definitions are laid out from their metadata
//! - generic instantiations copy their definition's tree with the arguments substituted
//!
//! [`PrecomputedLayout`]: crate::metadata::typesystem::PrecomputedLayout
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dotvtable::{metadata::{image::Image, typesystem::TypeSystem}, vtable::VTableBuilder};
//!
//! let system = TypeSystem::new(host, LoadConfig::default());
//! let module = system.add_image(Image::load(std::fs::read("Hello.dll")?)?)?;
//! let hello = system.resolve_type_token(module, Token::new(0x0200_0003))?;
//!
//! let builder = VTableBuilder::new(Arc::new(system));
//! let greet = builder.slot(hello, 4)?;
//! println!("slot 4 dispatches to {}", greet.name);
//! ```

mod builder;
mod inflate;
mod layout;
mod tree;

pub use builder::VTableBuilder;
pub use tree::{GenericClassMethod, InterfaceOffset, MethodImplSlot, TreeHandle, TypeDeclTree};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        metadata::{
            image::Image,
            token::Token,
            typesystem::{MethodId, ModuleId, PrimitiveKind, TypeDefId, TypeId, TypeSystem},
        },
        test::{method_flags, type_flags, MetadataBuilder, StubHost},
        vtable::VTableBuilder,
        Error, LoadConfig,
    };

    const STRING_NO_ARGS: &[u8] = &[0x20, 0x00, 0x0E];
    const VOID_NO_ARGS: &[u8] = &[0x20, 0x00, 0x01];

    /// An image with a `System.Object` reference as TypeRef 1.
    fn fixture() -> (MetadataBuilder, Token) {
        let mut builder = MetadataBuilder::new();
        builder.module("app.dll");
        builder.assembly("App");
        let mscorlib = builder.assembly_ref("mscorlib");
        let object = builder.type_ref(mscorlib, "System", "Object");
        builder.type_def(0, "", "<Module>", Token::default());
        (builder, object)
    }

    fn load(builder: &MetadataBuilder, host: StubHost) -> (VTableBuilder, ModuleId) {
        let system = TypeSystem::new(Arc::new(host), LoadConfig::default());
        let module = system
            .add_image(Image::load(builder.build_metadata()).unwrap())
            .unwrap();
        (VTableBuilder::new(Arc::new(system)), module)
    }

    fn ty(vtables: &VTableBuilder, module: ModuleId, token: Token) -> TypeId {
        vtables.system().resolve_type_token(module, token).unwrap()
    }

    fn method(module: ModuleId, token: Token) -> MethodId {
        MethodId::new(module, token.row())
    }

    #[test]
    fn implicit_interface_implementation() {
        let (mut builder, object) = fixture();
        let igreet = builder.type_def(type_flags::INTERFACE, "Demo", "IGreet", Token::default());
        let abstract_greet = builder.method(method_flags::ABSTRACT, "Greet", STRING_NO_ARGS, 0);
        let hello = builder.type_def(type_flags::CLASS, "Demo", "Hello", object);
        let greet = builder.method(method_flags::IMPLEMENTATION, "Greet", STRING_NO_ARGS, 0);
        builder.interface_impl(hello, igreet);

        let (vtables, module) = load(&builder, StubHost::new());
        let hello_ty = ty(&vtables, module, hello);
        let igreet_ty = ty(&vtables, module, igreet);

        assert_eq!(vtables.slot_count(hello_ty).unwrap(), StubHost::OBJECT_SLOTS + 1);
        let slot = vtables.slot(hello_ty, 4).unwrap();
        assert_eq!(slot.method, method(module, greet));
        assert_eq!(slot.declaring, hello_ty);
        assert_eq!(&*slot.name, "Greet");
        assert_eq!(vtables.interface_offset(hello_ty, igreet_ty).unwrap(), Some(4));

        let tree = vtables.tree_of(hello_ty).unwrap();
        assert_eq!(tree.slot_of(method(module, greet)), Some(4));
        assert_eq!(&*tree.method_impls[0].name, "ToString");
        assert!(tree
            .method_impls
            .iter()
            .enumerate()
            .all(|(index, entry)| usize::from(entry.slot) == index));

        let object_tree = vtables.tree(tree.parent.unwrap()).unwrap();
        assert!(object_tree.precomputed);
        assert_eq!(object_tree.slot_count(), StubHost::OBJECT_SLOTS);

        let dispatched = vtables
            .resolve_virtual(hello_ty, igreet_ty, method(module, abstract_greet))
            .unwrap();
        assert_eq!(dispatched.method, method(module, greet));

        let interface_tree = vtables.tree_of(igreet_ty).unwrap();
        assert_eq!(interface_tree.slot_count(), 1);
        assert_eq!(interface_tree.parent, None);
    }

    #[test]
    fn override_keeps_slot_through_descendants() {
        let (mut builder, object) = fixture();
        let base = builder.type_def(type_flags::CLASS, "Demo", "Base", object);
        let base_m = builder.method(method_flags::NEW_VIRTUAL, "M", VOID_NO_ARGS, 0);
        let mid = builder.type_def(type_flags::CLASS, "Demo", "Mid", base);
        let mid_m = builder.method(method_flags::OVERRIDE, "M", VOID_NO_ARGS, 0);
        let leaf = builder.type_def(type_flags::CLASS, "Demo", "Leaf", mid);

        let (vtables, module) = load(&builder, StubHost::new());
        let base_ty = ty(&vtables, module, base);
        let mid_ty = ty(&vtables, module, mid);
        let leaf_ty = ty(&vtables, module, leaf);

        let base_slot = vtables.tree_of(base_ty).unwrap().slot_of(method(module, base_m)).unwrap();
        assert_eq!(base_slot, 4);
        let mid_tree = vtables.tree_of(mid_ty).unwrap();
        assert_eq!(mid_tree.slot_of(method(module, mid_m)), Some(base_slot));

        let leaf_tree = vtables.tree_of(leaf_ty).unwrap();
        assert_eq!(leaf_tree.slot_count(), 5);
        let slot = leaf_tree.slot(base_slot).unwrap();
        assert_eq!(slot.method, method(module, mid_m));
        assert_eq!(slot.declaring, mid_ty);
        assert_eq!(vtables.slot(base_ty, base_slot).unwrap().method, method(module, base_m));

        let dispatched = vtables
            .resolve_virtual(leaf_ty, base_ty, method(module, base_m))
            .unwrap();
        assert_eq!(dispatched.method, method(module, mid_m));
    }

    #[test]
    fn override_of_object_method() {
        let (mut builder, object) = fixture();
        let named = builder.type_def(type_flags::CLASS, "Demo", "Named", object);
        let to_string = builder.method(method_flags::OVERRIDE, "ToString", STRING_NO_ARGS, 0);

        let (vtables, module) = load(&builder, StubHost::new());
        let named_ty = ty(&vtables, module, named);
        assert_eq!(vtables.slot_count(named_ty).unwrap(), StubHost::OBJECT_SLOTS);
        assert_eq!(vtables.slot(named_ty, 0).unwrap().method, method(module, to_string));
        assert_eq!(&*vtables.slot(named_ty, 1).unwrap().name, "Equals");
    }

    #[test]
    fn interface_offset_is_inherited() {
        let (mut builder, object) = fixture();
        let irun = builder.type_def(type_flags::INTERFACE, "Demo", "IRun", Token::default());
        builder.method(method_flags::ABSTRACT, "Run", VOID_NO_ARGS, 0);
        let base = builder.type_def(type_flags::CLASS, "Demo", "Base", object);
        let base_run = builder.method(method_flags::NEW_VIRTUAL, "Run", VOID_NO_ARGS, 0);
        builder.interface_impl(base, irun);
        let mid = builder.type_def(type_flags::CLASS, "Demo", "Mid", base);
        let mid_run = builder.method(method_flags::OVERRIDE, "Run", VOID_NO_ARGS, 0);

        let (vtables, module) = load(&builder, StubHost::new());
        let irun_ty = ty(&vtables, module, irun);
        let base_ty = ty(&vtables, module, base);
        let mid_ty = ty(&vtables, module, mid);

        let offset = vtables.interface_offset(base_ty, irun_ty).unwrap();
        assert_eq!(offset, Some(4));
        assert_eq!(vtables.interface_offset(mid_ty, irun_ty).unwrap(), offset);

        let base_tree = vtables.tree_of(base_ty).unwrap();
        let mid_tree = vtables.tree_of(mid_ty).unwrap();
        assert_eq!(base_tree.interfaces, mid_tree.interfaces);
        assert_eq!(base_tree.slot_count(), mid_tree.slot_count());
        assert_eq!(base_tree.slot(4).unwrap().method, method(module, base_run));
        assert_eq!(mid_tree.slot(4).unwrap().method, method(module, mid_run));
    }

    #[test]
    fn interface_satisfied_by_base_class() {
        let (mut builder, object) = fixture();
        let igreet = builder.type_def(type_flags::INTERFACE, "Demo", "IGreet", Token::default());
        builder.method(method_flags::ABSTRACT, "Greet", STRING_NO_ARGS, 0);
        let base = builder.type_def(type_flags::CLASS, "Demo", "Base", object);
        let greet = builder.method(method_flags::NEW_VIRTUAL, "Greet", STRING_NO_ARGS, 0);
        let derived = builder.type_def(type_flags::CLASS, "Demo", "Derived", base);
        builder.interface_impl(derived, igreet);

        let (vtables, module) = load(&builder, StubHost::new());
        let derived_ty = ty(&vtables, module, derived);
        let igreet_ty = ty(&vtables, module, igreet);

        assert_eq!(vtables.interface_offset(derived_ty, igreet_ty).unwrap(), Some(5));
        assert_eq!(vtables.slot(derived_ty, 5).unwrap().method, method(module, greet));
        assert_eq!(vtables.slot(derived_ty, 4).unwrap().method, method(module, greet));
    }

    #[test]
    fn explicit_interface_implementation() {
        let (mut builder, object) = fixture();
        let igreet = builder.type_def(type_flags::INTERFACE, "Demo", "IGreet", Token::default());
        let abstract_greet = builder.method(method_flags::ABSTRACT, "Greet", STRING_NO_ARGS, 0);
        let polite = builder.type_def(type_flags::CLASS, "Demo", "Polite", object);
        let explicit =
            builder.method(method_flags::EXPLICIT, "Demo.IGreet.Greet", STRING_NO_ARGS, 0);
        builder.interface_impl(polite, igreet);
        builder.method_impl(polite, explicit, abstract_greet);

        let (vtables, module) = load(&builder, StubHost::new());
        let polite_ty = ty(&vtables, module, polite);
        let igreet_ty = ty(&vtables, module, igreet);

        let tree = vtables.tree_of(polite_ty).unwrap();
        assert_eq!(tree.interface_offset(igreet_ty), Some(4));
        assert_eq!(vtables.tree_of(igreet_ty).unwrap().slot_count(), 1);
        assert_eq!(tree.slot_count(), StubHost::OBJECT_SLOTS + 2);
        assert_eq!(tree.slot(4).unwrap().method, method(module, explicit));
        assert_eq!(tree.slot(5).unwrap().method, method(module, explicit));
        assert_eq!(tree.slot_of(method(module, explicit)), Some(5));

        let dispatched = vtables
            .resolve_virtual(polite_ty, igreet_ty, method(module, abstract_greet))
            .unwrap();
        assert_eq!(&*dispatched.name, "Demo.IGreet.Greet");
    }

    #[test]
    fn explicit_implementation_through_member_ref() {
        let (mut builder, object) = fixture();
        let igreet = builder.type_def(type_flags::INTERFACE, "Demo", "IGreet", Token::default());
        builder.method(method_flags::ABSTRACT, "Greet", STRING_NO_ARGS, 0);
        let polite = builder.type_def(type_flags::CLASS, "Demo", "Polite", object);
        let explicit =
            builder.method(method_flags::EXPLICIT, "Demo.IGreet.Greet", STRING_NO_ARGS, 0);
        builder.interface_impl(polite, igreet);
        let declaration = builder.member_ref(igreet, "Greet", STRING_NO_ARGS);
        builder.method_impl(polite, explicit, declaration);

        let (vtables, module) = load(&builder, StubHost::new());
        let polite_ty = ty(&vtables, module, polite);
        assert_eq!(vtables.slot(polite_ty, 4).unwrap().method, method(module, explicit));
    }

    #[test]
    fn explicit_implementation_without_record() {
        let (mut builder, object) = fixture();
        let igreet = builder.type_def(type_flags::INTERFACE, "Demo", "IGreet", Token::default());
        builder.method(method_flags::ABSTRACT, "Greet", STRING_NO_ARGS, 0);
        let rude = builder.type_def(type_flags::CLASS, "Demo", "Rude", object);
        builder.method(method_flags::EXPLICIT, "Demo.IGreet.Greet", STRING_NO_ARGS, 0);
        builder.interface_impl(rude, igreet);

        let (vtables, module) = load(&builder, StubHost::new());
        let rude_ty = ty(&vtables, module, rude);
        assert!(matches!(
            vtables.build_by_type(rude_ty),
            Err(Error::LayoutInconsistency { ref type_name, .. }) if type_name == "Demo.Rude"
        ));
        assert!(vtables.build_by_type(rude_ty).is_err());
    }

    #[test]
    fn unimplemented_interface_method() {
        let (mut builder, object) = fixture();
        let igreet = builder.type_def(type_flags::INTERFACE, "Demo", "IGreet", Token::default());
        builder.method(method_flags::ABSTRACT, "Greet", STRING_NO_ARGS, 0);
        let silent = builder.type_def(type_flags::CLASS, "Demo", "Silent", object);
        builder.interface_impl(silent, igreet);

        let (vtables, module) = load(&builder, StubHost::new());
        let silent_ty = ty(&vtables, module, silent);
        assert!(matches!(
            vtables.build_by_type(silent_ty),
            Err(Error::LayoutInconsistency { .. })
        ));
    }

    #[test]
    fn circular_inheritance() {
        let (mut builder, _) = fixture();
        // TypeDef 2 extends TypeDef 3, which extends TypeDef 2
        let first = builder.type_def(type_flags::CLASS, "Demo", "First", Token::new(0x0200_0003));
        builder.type_def(type_flags::CLASS, "Demo", "Second", first);

        let (vtables, module) = load(&builder, StubHost::new());
        let first_ty = ty(&vtables, module, first);
        assert!(matches!(
            vtables.build_by_type(first_ty),
            Err(Error::LayoutInconsistency { ref message, .. }) if message.contains("circular")
        ));
    }

    #[test]
    fn generic_inflation_is_isomorphic() {
        let (mut builder, object) = fixture();
        let ibox = builder.type_def(type_flags::INTERFACE, "Demo", "IBox`1", Token::default());
        builder.method(method_flags::ABSTRACT, "Get", &[0x20, 0x00, 0x13, 0x00], 0);
        builder.generic_param(0, ibox, "T");
        let boxed = builder.type_def(type_flags::CLASS, "Demo", "Box`1", object);
        let get = builder.method(method_flags::IMPLEMENTATION, "Get", &[0x20, 0x00, 0x13, 0x00], 0);
        let set_sig = [0x20, 0x01, 0x01, 0x13, 0x00];
        let set = builder.method(method_flags::NEW_VIRTUAL, "Set", &set_sig, 0);
        builder.generic_param(0, boxed, "T");
        // IBox`1<!0>
        let ibox_of_t = builder.type_spec(&[0x15, 0x12, 0x08, 0x01, 0x13, 0x00]);
        builder.interface_impl(boxed, ibox_of_t);

        let (vtables, module) = load(&builder, StubHost::new());
        let system = vtables.system().clone();
        let pool = system.pool();
        let box_def = TypeDefId::new(module, boxed.row());
        let ibox_def = TypeDefId::new(module, ibox.row());
        let open = system.self_type(box_def).unwrap();
        let int32 = pool.primitive(PrimitiveKind::I4);
        let string = pool.primitive(PrimitiveKind::String);

        let open_handle = vtables.build_by_type(pool.def(box_def)).unwrap();
        assert_eq!(vtables.build_by_type(open).unwrap(), open_handle);
        let open_tree = vtables.tree(open_handle).unwrap();
        assert_eq!(open_tree.slot_count(), StubHost::OBJECT_SLOTS + 2);
        assert_eq!(open_tree.slot_of(method(module, get)), Some(4));
        assert_eq!(open_tree.slot_of(method(module, set)), Some(5));

        for arg in [int32, string] {
            let concrete = pool.generic_inst(box_def, vec![arg]);
            let tree = vtables.tree_of(concrete).unwrap();

            assert_eq!(tree.ty, concrete);
            assert_eq!(tree.slot_count(), open_tree.slot_count());
            assert_eq!(tree.method_slots, open_tree.method_slots);
            assert_eq!(tree.parent, open_tree.parent);
            for (inflated, original) in tree.method_impls.iter().zip(&open_tree.method_impls) {
                assert_eq!(inflated.slot, original.slot);
                assert_eq!(inflated.method, original.method);
            }
            assert_eq!(tree.slot(5).unwrap().declaring, concrete);
            assert_eq!(tree.slot(0).unwrap().declaring, open_tree.slot(0).unwrap().declaring);

            let interface = pool.generic_inst(ibox_def, vec![arg]);
            assert_eq!(tree.interfaces[0].interface, interface);
            assert_eq!(tree.interfaces[0].offset, open_tree.interfaces[0].offset);
            assert_eq!(vtables.tree(tree.interfaces[0].tree).unwrap().ty, interface);
            assert!(tree
                .virtual_methods
                .iter()
                .all(|method| method.declaring == concrete));

            assert_eq!(
                vtables.inflate(open_handle, concrete).unwrap(),
                vtables.build_by_type(concrete).unwrap()
            );
        }

        let other = pool.generic_inst(ibox_def, vec![int32]);
        assert!(matches!(
            vtables.inflate(open_handle, other),
            Err(Error::LayoutInconsistency { .. })
        ));
    }

    #[test]
    fn object_laid_out_from_host_definition() {
        let (mut builder, object) = fixture();
        let plain = builder.type_def(type_flags::CLASS, "Demo", "Plain", object);

        let (vtables, module) = load(&builder, StubHost::without_layout());
        let plain_ty = ty(&vtables, module, plain);
        let tree = vtables.tree_of(plain_ty).unwrap();
        assert_eq!(tree.slot_count(), StubHost::OBJECT_SLOTS);
        let object_tree = vtables.tree(tree.parent.unwrap()).unwrap();
        assert!(!object_tree.precomputed);
        let names: Vec<_> = object_tree
            .method_impls
            .iter()
            .map(|slot| slot.name.to_string())
            .collect();
        assert_eq!(names, ["ToString", "Equals", "GetHashCode", "Finalize"]);

        let object_ty = vtables.system().pool().primitive(PrimitiveKind::Object);
        assert_eq!(vtables.build_by_type(object_ty).unwrap(), tree.parent.unwrap());
    }

    #[test]
    fn queries_and_errors() {
        let (mut builder, object) = fixture();
        let plain = builder.type_def(type_flags::CLASS, "Demo", "Plain", object);

        let (vtables, module) = load(&builder, StubHost::new());
        let plain_ty = ty(&vtables, module, plain);
        let pool = vtables.system().pool().clone();

        assert!(matches!(
            vtables.slot(plain_ty, 40),
            Err(Error::LayoutInconsistency { .. })
        ));
        assert!(matches!(
            vtables.build_by_type(pool.sz_array(plain_ty)),
            Err(Error::UnsupportedConstruct(_))
        ));
        assert!(matches!(
            vtables.build_by_type(pool.primitive(PrimitiveKind::I4)),
            Err(Error::UnsupportedConstruct(_))
        ));

        let handle = vtables.build_by_type(plain_ty).unwrap();
        let built = vtables.len();
        assert_eq!(vtables.build_by_type(plain_ty).unwrap(), handle);
        assert_eq!(vtables.len(), built);
    }

    #[test]
    fn concurrent_builds_share_trees() {
        let (mut builder, object) = fixture();
        let base = builder.type_def(type_flags::CLASS, "Demo", "Base", object);
        builder.method(method_flags::NEW_VIRTUAL, "M", VOID_NO_ARGS, 0);
        let leaf = builder.type_def(type_flags::CLASS, "Demo", "Leaf", base);

        let (vtables, module) = load(&builder, StubHost::new());
        let leaf_ty = ty(&vtables, module, leaf);

        let handles: Vec<_> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| vtables.build_by_type(leaf_ty).unwrap()))
                .collect();
            workers.into_iter().map(|worker| worker.join().unwrap()).collect()
        });
        assert!(handles.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(vtables.len(), 3);
    }
}
