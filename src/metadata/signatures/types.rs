use crate::metadata::typesystem::{TypeId, TypePool};

/// Calling convention kinds of the low nibble of a method signature's first byte.
#[allow(non_snake_case, missing_docs)]
pub mod CALLING_CONVENTION {
    pub const DEFAULT: u8 = 0x0;
    pub const C: u8 = 0x1;
    pub const STDCALL: u8 = 0x2;
    pub const THISCALL: u8 = 0x3;
    pub const FASTCALL: u8 = 0x4;
    pub const VARARG: u8 = 0x5;
    pub const FIELD: u8 = 0x6;
    pub const LOCAL_SIG: u8 = 0x7;
    pub const PROPERTY: u8 = 0x8;
    pub const GENERIC_INST: u8 = 0xA;

    pub const GENERIC: u8 = 0x10;
    pub const HAS_THIS: u8 = 0x20;
    pub const EXPLICIT_THIS: u8 = 0x40;
    pub const KIND_MASK: u8 = 0x0F;
}

/// `MethodDefSig`, `MethodRefSig` or `StandAloneMethodSig` (II.23.2.1 - II.23.2.3).
///
/// Parameter types carry their custom modifiers and by-ref-ness in the type itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    /// Instance method
    pub has_this: bool,
    /// `this` is passed as the first explicit parameter
    pub explicit_this: bool,
    /// Calling convention kind, see [`CALLING_CONVENTION`]
    pub calling_convention: u8,
    /// Number of generic method parameters
    pub generic_param_count: u32,
    /// Return type
    pub return_type: TypeId,
    /// Fixed parameters
    pub params: Vec<TypeId>,
    /// Parameters after the sentinel of a vararg call site
    pub varargs: Vec<TypeId>,
}

impl MethodSignature {
    /// Returns `true` for the vararg calling convention.
    #[must_use]
    pub fn is_vararg(&self) -> bool {
        self.calling_convention == CALLING_CONVENTION::VARARG
    }

    /// Returns `true` if two signatures denote the same method shape.
    ///
    /// Call-site varargs are ignored.
    #[must_use]
    pub fn matches(&self, other: &MethodSignature) -> bool {
        self.has_this == other.has_this
            && self.generic_param_count == other.generic_param_count
            && self.return_type == other.return_type
            && self.params == other.params
    }

    /// This signature with type and method generic parameters replaced.
    #[must_use]
    pub fn substitute(
        &self,
        pool: &TypePool,
        type_args: &[TypeId],
        method_args: &[TypeId],
    ) -> MethodSignature {
        let sub = |id: &TypeId| pool.substitute(*id, type_args, method_args);
        MethodSignature {
            has_this: self.has_this,
            explicit_this: self.explicit_this,
            calling_convention: self.calling_convention,
            generic_param_count: self.generic_param_count,
            return_type: sub(&self.return_type),
            params: self.params.iter().map(sub).collect(),
            varargs: self.varargs.iter().map(sub).collect(),
        }
    }
}

/// `FieldSig` (II.23.2.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSignature {
    /// Field type, including custom modifiers
    pub field_type: TypeId,
}

/// `PropertySig` (II.23.2.5)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySignature {
    /// Instance property
    pub has_this: bool,
    /// Property type
    pub property_type: TypeId,
    /// Indexer parameters
    pub params: Vec<TypeId>,
}

/// `LocalVarSig` (II.23.2.6). Pinned and by-ref locals are wrapped in the type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalVariableSignature {
    /// Local types in slot order
    pub locals: Vec<TypeId>,
}

/// `MethodSpec` instantiation (II.23.2.15)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpecSignature {
    /// Generic method arguments
    pub args: Vec<TypeId>,
}
