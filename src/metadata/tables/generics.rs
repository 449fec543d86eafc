//! Rows describing generic parameters and instantiations.

use crate::metadata::tables::types::{
    CodedIndex, CodedIndexType,
    ColumnKind::{Blob, Coded, Fixed, Index, Str},
    TableId,
};

table_row! {
    /// `GenericParam` (0x2A), sorted by `owner`.
    GenericParamRaw = GenericParam {
        /// Position in the owner's parameter list
        number: u16 = Fixed(2),
        /// `GenericParamAttributes`
        flags: u16 = Fixed(2),
        /// Owning type or method
        owner: CodedIndex = Coded(CodedIndexType::TypeOrMethodDef),
        /// `#Strings` index of the parameter name
        name: u32 = Str,
    }
}

table_row! {
    /// `MethodSpec` (0x2B): a generic method instantiation.
    MethodSpecRaw = MethodSpec {
        /// The generic method
        method: CodedIndex = Coded(CodedIndexType::MethodDefOrRef),
        /// `#Blob` index of the instantiation signature
        instantiation: u32 = Blob,
    }
}

table_row! {
    /// `GenericParamConstraint` (0x2C).
    GenericParamConstraintRaw = GenericParamConstraint {
        /// Constrained `GenericParam` row
        owner: u32 = Index(TableId::GenericParam),
        /// Constraint type
        constraint: CodedIndex = Coded(CodedIndexType::TypeDefOrRef),
    }
}
