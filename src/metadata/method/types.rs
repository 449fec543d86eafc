//! Method attribute and body header flags.

use bitflags::bitflags;

/// Mask of the member access bits in `MethodAttributes`
pub const METHOD_ACCESS_MASK: u16 = 0x0007;
/// Mask of the vtable layout bit in `MethodAttributes`
pub const METHOD_VTABLE_LAYOUT_MASK: u16 = 0x0100;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Member access, the low three bits of `MethodAttributes`
    pub struct MethodAccessFlags: u16 {
        /// Member not referenceable
        const COMPILER_CONTROLLED = 0x0000;
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessible by anyone in the assembly
        const ASSEM = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessible by sub-types anywhere, plus anyone in the assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessible by anyone
        const PUBLIC = 0x0006;
    }
}

impl MethodAccessFlags {
    /// Extract the access bits of `flags`.
    #[must_use]
    pub fn from_method_flags(flags: u16) -> Self {
        Self::from_bits_truncate(flags & METHOD_ACCESS_MASK)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Vtable layout, reuse an inherited slot or claim a new one
    pub struct MethodVtableFlags: u16 {
        /// Override a matching inherited slot
        const REUSE_SLOT = 0x0000;
        /// Always allocate a new slot
        const NEW_SLOT = 0x0100;
    }
}

impl MethodVtableFlags {
    /// Extract the layout bit of `flags`.
    #[must_use]
    pub fn from_method_flags(flags: u16) -> Self {
        Self::from_bits_truncate(flags & METHOD_VTABLE_LAYOUT_MASK)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// The remaining `MethodAttributes` bits
    pub struct MethodModifiers: u16 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method can only be overridden if also accessible
        const STRICT = 0x0200;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// The runtime interprets the name
        const RTSPECIAL_NAME = 0x1000;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
        /// Method has security associated with it
        const HAS_SECURITY = 0x4000;
        /// Method calls another method containing security code
        const REQUIRE_SEC_OBJECT = 0x8000;
    }
}

impl MethodModifiers {
    /// Extract the modifier bits of `flags`.
    #[must_use]
    pub fn from_method_flags(flags: u16) -> Self {
        Self::from_bits_truncate(flags & !METHOD_ACCESS_MASK & !METHOD_VTABLE_LAYOUT_MASK)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Flags of the first method header word
    pub struct MethodBodyFlags: u16 {
        /// Tiny method header format
        const TINY_FORMAT = 0x2;
        /// Fat method header format
        const FAT_FORMAT = 0x3;
        /// Extra data sections follow the code
        const MORE_SECTS = 0x8;
        /// Zero-initialise all locals
        const INIT_LOCALS = 0x10;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Flags of a method data section header
    pub struct SectionFlags: u8 {
        /// Section holds exception handling clauses
        const EHTABLE = 0x1;
        /// Reserved, shall be 0
        const OPT_ILTABLE = 0x2;
        /// Section uses 3-byte sizes and 24-byte clauses
        const FAT_FORMAT = 0x40;
        /// Another section follows this one
        const MORE_SECTS = 0x80;
    }
}
