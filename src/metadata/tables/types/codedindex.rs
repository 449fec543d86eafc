use strum::{EnumCount, EnumIter};

use crate::{
    metadata::{tables::TableId, token::Token},
    Result,
};

/// The coded index kinds of ECMA-335 II.24.2.6.
///
/// A coded index multiplexes several candidate tables into one cell: the low
/// [`CodedIndexType::tag_bits`] bits select the table, the rest is the row.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, EnumIter, EnumCount)]
#[repr(usize)]
#[allow(missing_docs)]
pub enum CodedIndexType {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    Implementation,
    CustomAttributeType,
    ResolutionScope,
    TypeOrMethodDef,
}

impl CodedIndexType {
    /// Candidate tables indexed by tag. `None` marks tags reserved by the format.
    #[must_use]
    pub fn tags(&self) -> &'static [Option<TableId>] {
        use TableId::*;
        match self {
            CodedIndexType::TypeDefOrRef => &[Some(TypeDef), Some(TypeRef), Some(TypeSpec)],
            CodedIndexType::HasConstant => &[Some(Field), Some(Param), Some(Property)],
            CodedIndexType::HasCustomAttribute => &[
                Some(MethodDef),
                Some(Field),
                Some(TypeRef),
                Some(TypeDef),
                Some(Param),
                Some(InterfaceImpl),
                Some(MemberRef),
                Some(Module),
                Some(DeclSecurity),
                Some(Property),
                Some(Event),
                Some(StandAloneSig),
                Some(ModuleRef),
                Some(TypeSpec),
                Some(Assembly),
                Some(AssemblyRef),
                Some(File),
                Some(ExportedType),
                Some(ManifestResource),
                Some(GenericParam),
                Some(GenericParamConstraint),
                Some(MethodSpec),
            ],
            CodedIndexType::HasFieldMarshal => &[Some(Field), Some(Param)],
            CodedIndexType::HasDeclSecurity => &[Some(TypeDef), Some(MethodDef), Some(Assembly)],
            CodedIndexType::MemberRefParent => &[
                Some(TypeDef),
                Some(TypeRef),
                Some(ModuleRef),
                Some(MethodDef),
                Some(TypeSpec),
            ],
            CodedIndexType::HasSemantics => &[Some(Event), Some(Property)],
            CodedIndexType::MethodDefOrRef => &[Some(MethodDef), Some(MemberRef)],
            CodedIndexType::MemberForwarded => &[Some(Field), Some(MethodDef)],
            CodedIndexType::Implementation => &[Some(File), Some(AssemblyRef), Some(ExportedType)],
            CodedIndexType::CustomAttributeType => {
                &[None, None, Some(MethodDef), Some(MemberRef), None]
            }
            CodedIndexType::ResolutionScope => {
                &[Some(Module), Some(ModuleRef), Some(AssemblyRef), Some(TypeRef)]
            }
            CodedIndexType::TypeOrMethodDef => &[Some(TypeDef), Some(MethodDef)],
        }
    }

    /// Number of tag bits: `ceil(log2(tag count))`.
    #[must_use]
    pub fn tag_bits(&self) -> u8 {
        let count = self.tags().len() as u32;
        (u32::BITS - (count - 1).leading_zeros()) as u8
    }

    /// Tables whose row counts influence the width of this index.
    pub fn tables(&self) -> impl Iterator<Item = TableId> {
        self.tags().iter().filter_map(|table| *table)
    }

    /// Split a raw cell value into its table and row.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] for a tag outside the candidate list or a reserved
    /// tag.
    pub fn decode(&self, value: u32) -> Result<CodedIndex> {
        let tag_bits = self.tag_bits();
        let tag = (value & ((1 << tag_bits) - 1)) as usize;
        let row = value >> tag_bits;

        match self.tags().get(tag) {
            Some(Some(table)) => Ok(CodedIndex::new(*table, row)),
            _ => Err(malformed_error!(
                "Invalid tag {} for coded index {:?} (raw 0x{:X})",
                tag,
                self,
                value
            )),
        }
    }

    /// Pack a table and row into a raw cell value.
    ///
    /// Returns `None` if `table` is not a candidate of this index.
    #[must_use]
    pub fn encode(&self, table: TableId, row: u32) -> Option<u32> {
        let tag = self.tags().iter().position(|t| *t == Some(table))?;
        Some((row << self.tag_bits()) | tag as u32)
    }
}

/// A decoded coded index cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CodedIndex {
    /// Table selected by the tag
    pub tag: TableId,
    /// 1-based row, 0 for a null reference
    pub row: u32,
    /// The equivalent metadata token
    pub token: Token,
}

impl CodedIndex {
    /// Build a coded index for `row` of `tag`.
    #[must_use]
    pub fn new(tag: TableId, row: u32) -> CodedIndex {
        CodedIndex {
            tag,
            row,
            token: tag.token(row),
        }
    }

    /// Returns `true` for a null reference.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.row == 0
    }
}
