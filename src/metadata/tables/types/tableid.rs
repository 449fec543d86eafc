use strum::{EnumCount, EnumIter};

use crate::metadata::token::Token;

/// Identifiers of the ECMA-335 metadata tables, valued as their bit in the tables header.
///
/// Bits `0x2D..=0x3F` of the presence mask have no table assigned in an ECMA-335 image
/// (the portable PDB tables live in a separate metadata blob), so a set bit there rejects
/// the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, EnumCount)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum TableId {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    FieldPtr = 0x03,
    Field = 0x04,
    MethodPtr = 0x05,
    MethodDef = 0x06,
    ParamPtr = 0x07,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0A,
    Constant = 0x0B,
    CustomAttribute = 0x0C,
    FieldMarshal = 0x0D,
    DeclSecurity = 0x0E,
    ClassLayout = 0x0F,
    FieldLayout = 0x10,
    StandAloneSig = 0x11,
    EventMap = 0x12,
    EventPtr = 0x13,
    Event = 0x14,
    PropertyMap = 0x15,
    PropertyPtr = 0x16,
    Property = 0x17,
    MethodSemantics = 0x18,
    MethodImpl = 0x19,
    ModuleRef = 0x1A,
    TypeSpec = 0x1B,
    ImplMap = 0x1C,
    FieldRVA = 0x1D,
    EncLog = 0x1E,
    EncMap = 0x1F,
    Assembly = 0x20,
    AssemblyProcessor = 0x21,
    AssemblyOS = 0x22,
    AssemblyRef = 0x23,
    AssemblyRefProcessor = 0x24,
    AssemblyRefOS = 0x25,
    File = 0x26,
    ExportedType = 0x27,
    ManifestResource = 0x28,
    NestedClass = 0x29,
    GenericParam = 0x2A,
    MethodSpec = 0x2B,
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// Mask of every presence bit that names a table.
    pub const VALID_MASK: u64 = (1u64 << TableId::COUNT) - 1;

    /// Map a table number to its id.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<TableId> {
        use strum::IntoEnumIterator;
        TableId::iter().find(|id| *id as u8 == value)
    }

    /// Token for `row` in this table.
    #[must_use]
    pub fn token(self, row: u32) -> Token {
        Token::from_parts(self as u8, row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering() {
        assert_eq!(TableId::COUNT, 0x2D);
        assert_eq!(TableId::VALID_MASK, 0x1FFF_FFFF_FFFF);
        assert_eq!(TableId::from_u8(0x1B), Some(TableId::TypeSpec));
        assert_eq!(TableId::from_u8(0x2D), None);
        assert_eq!(TableId::MethodDef.token(3).value(), 0x0600_0003);
    }
}
