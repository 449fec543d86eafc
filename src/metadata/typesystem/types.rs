//! Handles and the structural type model.

use std::fmt;

use strum::{EnumCount, EnumIter};

use crate::metadata::token::Token;

/// Identifies one loaded image or one module owned by the host.
///
/// Images registered with [`crate::metadata::typesystem::TypeSystem::add_image`] are numbered
/// from zero. Hosts number their modules from [`ModuleId::FIRST_HOST`] up.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ModuleId(pub u32);

impl ModuleId {
    /// First id reserved for host modules.
    pub const FIRST_HOST: ModuleId = ModuleId(0x8000_0000);

    /// Returns `true` for ids in the host range.
    #[must_use]
    pub fn is_host(self) -> bool {
        self.0 >= Self::FIRST_HOST.0
    }
}

/// A type definition: a TypeDef row of a module.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct TypeDefId {
    /// Owning module
    pub module: ModuleId,
    /// TypeDef token within the module
    pub token: Token,
}

impl TypeDefId {
    /// Id of TypeDef row `rid` in `module`.
    #[must_use]
    pub fn new(module: ModuleId, rid: u32) -> Self {
        TypeDefId {
            module,
            token: Token::from_parts(0x02, rid),
        }
    }
}

/// A method definition: a MethodDef row of a module.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct MethodId {
    /// Owning module
    pub module: ModuleId,
    /// MethodDef token within the module
    pub token: Token,
}

impl MethodId {
    /// Id of MethodDef row `rid` in `module`.
    #[must_use]
    pub fn new(module: ModuleId, rid: u32) -> Self {
        MethodId {
            module,
            token: Token::from_parts(0x06, rid),
        }
    }
}

/// A field definition: a Field row of a module.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct FieldId {
    /// Owning module
    pub module: ModuleId,
    /// Field token within the module
    pub token: Token,
}

/// Handle of an interned type in a [`crate::metadata::typesystem::TypePool`].
///
/// Two handles from the same pool are equal exactly when the types are structurally equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

/// The built-in types with their own element type byte.
///
/// Discriminants double as pool indices: primitives are interned first, in declaration
/// order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, EnumCount)]
#[allow(missing_docs)]
pub enum PrimitiveKind {
    Void,
    Boolean,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    String,
    TypedByRef,
    I,
    U,
    Object,
}

impl PrimitiveKind {
    /// Map an element type byte to its primitive.
    #[must_use]
    pub fn from_element_type(value: u8) -> Option<Self> {
        Some(match value {
            ELEMENT_TYPE::VOID => PrimitiveKind::Void,
            ELEMENT_TYPE::BOOLEAN => PrimitiveKind::Boolean,
            ELEMENT_TYPE::CHAR => PrimitiveKind::Char,
            ELEMENT_TYPE::I1 => PrimitiveKind::I1,
            ELEMENT_TYPE::U1 => PrimitiveKind::U1,
            ELEMENT_TYPE::I2 => PrimitiveKind::I2,
            ELEMENT_TYPE::U2 => PrimitiveKind::U2,
            ELEMENT_TYPE::I4 => PrimitiveKind::I4,
            ELEMENT_TYPE::U4 => PrimitiveKind::U4,
            ELEMENT_TYPE::I8 => PrimitiveKind::I8,
            ELEMENT_TYPE::U8 => PrimitiveKind::U8,
            ELEMENT_TYPE::R4 => PrimitiveKind::R4,
            ELEMENT_TYPE::R8 => PrimitiveKind::R8,
            ELEMENT_TYPE::STRING => PrimitiveKind::String,
            ELEMENT_TYPE::TYPEDBYREF => PrimitiveKind::TypedByRef,
            ELEMENT_TYPE::I => PrimitiveKind::I,
            ELEMENT_TYPE::U => PrimitiveKind::U,
            ELEMENT_TYPE::OBJECT => PrimitiveKind::Object,
            _ => return None,
        })
    }

    /// The `System` type name of this primitive.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "Void",
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::I1 => "SByte",
            PrimitiveKind::U1 => "Byte",
            PrimitiveKind::I2 => "Int16",
            PrimitiveKind::U2 => "UInt16",
            PrimitiveKind::I4 => "Int32",
            PrimitiveKind::U4 => "UInt32",
            PrimitiveKind::I8 => "Int64",
            PrimitiveKind::U8 => "UInt64",
            PrimitiveKind::R4 => "Single",
            PrimitiveKind::R8 => "Double",
            PrimitiveKind::String => "String",
            PrimitiveKind::TypedByRef => "TypedReference",
            PrimitiveKind::I => "IntPtr",
            PrimitiveKind::U => "UIntPtr",
            PrimitiveKind::Object => "Object",
        }
    }
}

/// Dimensions of a general (`ELEMENT_TYPE_ARRAY`) array.
///
/// `sizes` and `lower_bounds` may be shorter than `rank`; missing entries are unspecified.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct ArrayShape {
    /// Number of dimensions
    pub rank: u32,
    /// Declared sizes of the leading dimensions
    pub sizes: Vec<u32>,
    /// Declared lower bounds of the leading dimensions
    pub lower_bounds: Vec<i32>,
}

/// One node of the structural type model. Children are pool handles.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeKind {
    /// A built-in type
    Primitive(PrimitiveKind),
    /// A non-generic type definition, or the generic definition itself
    Def(TypeDefId),
    /// A generic type instantiated with `args`
    GenericInst {
        /// The generic definition
        definition: TypeDefId,
        /// Type arguments, positional
        args: Vec<TypeId>,
    },
    /// Generic parameter of the enclosing type (`!n`)
    Var(u32),
    /// Generic parameter of the enclosing method (`!!n`)
    MVar(u32),
    /// Unmanaged pointer
    Ptr(TypeId),
    /// Managed reference
    ByRef(TypeId),
    /// Single-dimensional zero-based array
    SzArray(TypeId),
    /// General array
    Array {
        /// Element type
        element: TypeId,
        /// Rank, sizes and bounds
        shape: ArrayShape,
    },
    /// A type carrying a custom modifier
    Modified {
        /// `modreq` when `true`, `modopt` otherwise
        required: bool,
        /// The modifier type
        modifier: TypeId,
        /// The modified type
        inner: TypeId,
    },
    /// A pinned local
    Pinned(TypeId),
}

#[allow(non_snake_case, missing_docs)]
/// Element type bytes of signatures (ECMA-335 II.23.1.16).
pub mod ELEMENT_TYPE {
    pub const END: u8 = 0x00;
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0a;
    pub const U8: u8 = 0x0b;
    pub const R4: u8 = 0x0c;
    pub const R8: u8 = 0x0d;
    pub const STRING: u8 = 0x0e;
    // Followed by type
    pub const PTR: u8 = 0x0f;
    // Followed by type
    pub const BYREF: u8 = 0x10;
    // Followed by TypeDefOrRefOrSpecEncoded
    pub const VALUETYPE: u8 = 0x11;
    // Followed by TypeDefOrRefOrSpecEncoded
    pub const CLASS: u8 = 0x12;
    pub const VAR: u8 = 0x13;
    // type rank num_sizes size* num_lo_bounds lo_bound*
    pub const ARRAY: u8 = 0x14;
    // (CLASS | VALUETYPE) token arg_count type*
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    pub const FNPTR: u8 = 0x1b;
    pub const OBJECT: u8 = 0x1c;
    pub const SZARRAY: u8 = 0x1d;
    pub const MVAR: u8 = 0x1e;
    pub const CMOD_REQD: u8 = 0x1f;
    pub const CMOD_OPT: u8 = 0x20;
    pub const INTERNAL: u8 = 0x21;
    pub const MODIFIER: u8 = 0x40;
    pub const SENTINEL: u8 = 0x41;
    pub const PINNED: u8 = 0x45;
}
