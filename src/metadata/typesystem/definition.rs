use std::sync::Arc;

use bitflags::bitflags;

use crate::metadata::{
    method::{MethodAccessFlags, MethodModifiers, MethodVtableFlags},
    signatures::MethodSignature,
    typesystem::{FieldId, MethodId, TypeDefId, TypeId},
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// `TypeAttributes` (II.23.1.15)
    pub struct TypeAttributes: u32 {
        /// Visible outside the assembly
        const PUBLIC = 0x0000_0001;
        /// Nested, visible outside the assembly
        const NESTED_PUBLIC = 0x0000_0002;
        /// Nested, visible only to the enclosing type
        const NESTED_PRIVATE = 0x0000_0003;
        /// Fields laid out sequentially
        const SEQUENTIAL_LAYOUT = 0x0000_0008;
        /// Fields laid out at explicit offsets
        const EXPLICIT_LAYOUT = 0x0000_0010;
        /// The type is an interface
        const INTERFACE = 0x0000_0020;
        /// The type cannot be instantiated
        const ABSTRACT = 0x0000_0080;
        /// The type cannot be derived from
        const SEALED = 0x0000_0100;
        /// The name is special
        const SPECIAL_NAME = 0x0000_0400;
        /// Imported from a type library
        const IMPORT = 0x0000_1000;
        /// Serializable
        const SERIALIZABLE = 0x0000_2000;
        /// Static initialisation may run before the first static field access
        const BEFORE_FIELD_INIT = 0x0010_0000;
        /// The runtime interprets the name
        const RTSPECIAL_NAME = 0x0000_0800;
    }
}

/// Mask of the visibility bits of `TypeAttributes`.
pub const TYPE_VISIBILITY_MASK: u32 = 0x0000_0007;

/// A field of a type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Field id
    pub id: FieldId,
    /// Field name
    pub name: Arc<str>,
    /// `FieldAttributes`
    pub flags: u16,
    /// Field type, in terms of the owner's generic parameters
    pub field_type: TypeId,
}

/// A method of a type definition, with its decoded signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDefinition {
    /// Method id
    pub id: MethodId,
    /// Declaring type definition
    pub owner: TypeDefId,
    /// Method name
    pub name: Arc<str>,
    /// `MethodAttributes`
    pub flags: u16,
    /// `MethodImplAttributes`
    pub impl_flags: u16,
    /// RVA of the body, 0 if it has none
    pub rva: u32,
    /// Signature in terms of the owner's generic parameters
    pub signature: MethodSignature,
}

impl MethodDefinition {
    /// Member access bits.
    #[must_use]
    pub fn access(&self) -> MethodAccessFlags {
        MethodAccessFlags::from_method_flags(self.flags)
    }

    /// Modifier bits.
    #[must_use]
    pub fn modifiers(&self) -> MethodModifiers {
        MethodModifiers::from_method_flags(self.flags)
    }

    /// Returns `true` for virtual methods.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.modifiers().contains(MethodModifiers::VIRTUAL)
    }

    /// Returns `true` for abstract methods.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.modifiers().contains(MethodModifiers::ABSTRACT)
    }

    /// Returns `true` for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers().contains(MethodModifiers::STATIC)
    }

    /// Returns `true` if the method always claims a new vtable slot.
    #[must_use]
    pub fn is_new_slot(&self) -> bool {
        MethodVtableFlags::from_method_flags(self.flags).contains(MethodVtableFlags::NEW_SLOT)
    }

    /// Returns `true` for private methods.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.access() == MethodAccessFlags::PRIVATE
    }
}

/// A method as seen through a particular declaring type.
///
/// For members of generic types `declaring` carries the instantiation the method's
/// signature is to be read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// The (possibly instantiated) declaring type
    pub declaring: TypeId,
    /// The method definition
    pub method: MethodId,
}

/// A field as seen through a particular declaring type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// The (possibly instantiated) declaring type
    pub declaring: TypeId,
    /// The field definition
    pub field: FieldId,
}

/// A resolved `MemberRef` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberReference {
    /// A method reference
    Method(MethodRef),
    /// A field reference
    Field(FieldRef),
}

/// One `MethodImpl` record: `body` implements `declaration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodImplEntry {
    /// The implementing method
    pub body: MethodRef,
    /// The overridden method
    pub declaration: MethodRef,
}

/// A virtual table laid out ahead of time by the host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrecomputedLayout {
    /// Implementing method of each slot
    pub slots: Vec<MethodId>,
    /// First slot of each implemented interface
    pub interface_offsets: Vec<(TypeId, u16)>,
}

/// The loaded form of a type definition, from an image or supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    /// Definition id
    pub id: TypeDefId,
    /// Namespace, empty for nested and global types
    pub namespace: Arc<str>,
    /// Simple name, including any generic arity suffix
    pub name: Arc<str>,
    /// `TypeAttributes`
    pub flags: TypeAttributes,
    /// Base type, `None` for `System.Object` and interfaces
    pub parent: Option<TypeId>,
    /// Directly implemented interfaces, in declaration order
    pub interfaces: Vec<TypeId>,
    /// Generic parameter names, in position order
    pub generic_params: Vec<Arc<str>>,
    /// Enclosing type of a nested type
    pub enclosing: Option<TypeDefId>,
    /// Methods, in declaration order
    pub methods: Vec<Arc<MethodDefinition>>,
    /// Fields, in declaration order
    pub fields: Vec<FieldDefinition>,
    /// Explicit overrides. Filled by hosts; image types resolve theirs on demand through
    /// [`crate::metadata::typesystem::TypeSystem::method_impls`].
    pub method_impls: Vec<MethodImplEntry>,
}

impl TypeDefinition {
    /// Returns `true` for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(TypeAttributes::INTERFACE)
    }

    /// Number of generic parameters.
    #[must_use]
    pub fn generic_param_count(&self) -> usize {
        self.generic_params.len()
    }

    /// `Namespace.Name`, or just `Name` without a namespace.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.to_string()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Virtual methods in declaration order.
    pub fn virtual_methods(&self) -> impl Iterator<Item = &Arc<MethodDefinition>> {
        self.methods.iter().filter(|method| method.is_virtual())
    }

    /// The method with id `id`.
    #[must_use]
    pub fn method(&self, id: MethodId) -> Option<&Arc<MethodDefinition>> {
        self.methods.iter().find(|method| method.id == id)
    }
}
