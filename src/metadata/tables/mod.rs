//! Typed access to the ECMA-335 metadata tables.
//!
//! Every table `0x00..=0x2C` has a row type generated by `table_row!` from its column list.
//! The column lists double as the source of each table's [`TableSchema`], so the layout used
//! to size a table when the tables stream is parsed is the same one used to decode its rows.
//!
//! # Examples
//!
//! ```rust,ignore
//! use dotvtable::metadata::tables::{MethodDefRaw, TypeDefRaw};
//!
//! let types = image.table::<TypeDefRaw>().unwrap();
//! for row in types.iter() {
//!     let row = row?;
//!     println!("{}", image.strings().get(row.type_name as usize)?);
//! }
//! ```

#[macro_use]
pub mod types;

mod assembly;
mod generics;
mod members;
mod typedefs;

pub use assembly::*;
pub use generics::*;
pub use members::*;
pub use typedefs::*;
pub use types::*;

impl TableId {
    /// Column layout of this table.
    #[must_use]
    pub fn columns(self) -> &'static [ColumnKind] {
        match self {
            TableId::Module => ModuleRaw::COLUMNS,
            TableId::TypeRef => TypeRefRaw::COLUMNS,
            TableId::TypeDef => TypeDefRaw::COLUMNS,
            TableId::FieldPtr => FieldPtrRaw::COLUMNS,
            TableId::Field => FieldRaw::COLUMNS,
            TableId::MethodPtr => MethodPtrRaw::COLUMNS,
            TableId::MethodDef => MethodDefRaw::COLUMNS,
            TableId::ParamPtr => ParamPtrRaw::COLUMNS,
            TableId::Param => ParamRaw::COLUMNS,
            TableId::InterfaceImpl => InterfaceImplRaw::COLUMNS,
            TableId::MemberRef => MemberRefRaw::COLUMNS,
            TableId::Constant => ConstantRaw::COLUMNS,
            TableId::CustomAttribute => CustomAttributeRaw::COLUMNS,
            TableId::FieldMarshal => FieldMarshalRaw::COLUMNS,
            TableId::DeclSecurity => DeclSecurityRaw::COLUMNS,
            TableId::ClassLayout => ClassLayoutRaw::COLUMNS,
            TableId::FieldLayout => FieldLayoutRaw::COLUMNS,
            TableId::StandAloneSig => StandAloneSigRaw::COLUMNS,
            TableId::EventMap => EventMapRaw::COLUMNS,
            TableId::EventPtr => EventPtrRaw::COLUMNS,
            TableId::Event => EventRaw::COLUMNS,
            TableId::PropertyMap => PropertyMapRaw::COLUMNS,
            TableId::PropertyPtr => PropertyPtrRaw::COLUMNS,
            TableId::Property => PropertyRaw::COLUMNS,
            TableId::MethodSemantics => MethodSemanticsRaw::COLUMNS,
            TableId::MethodImpl => MethodImplRaw::COLUMNS,
            TableId::ModuleRef => ModuleRefRaw::COLUMNS,
            TableId::TypeSpec => TypeSpecRaw::COLUMNS,
            TableId::ImplMap => ImplMapRaw::COLUMNS,
            TableId::FieldRVA => FieldRvaRaw::COLUMNS,
            TableId::EncLog => EncLogRaw::COLUMNS,
            TableId::EncMap => EncMapRaw::COLUMNS,
            TableId::Assembly => AssemblyRaw::COLUMNS,
            TableId::AssemblyProcessor => AssemblyProcessorRaw::COLUMNS,
            TableId::AssemblyOS => AssemblyOsRaw::COLUMNS,
            TableId::AssemblyRef => AssemblyRefRaw::COLUMNS,
            TableId::AssemblyRefProcessor => AssemblyRefProcessorRaw::COLUMNS,
            TableId::AssemblyRefOS => AssemblyRefOsRaw::COLUMNS,
            TableId::File => FileRaw::COLUMNS,
            TableId::ExportedType => ExportedTypeRaw::COLUMNS,
            TableId::ManifestResource => ManifestResourceRaw::COLUMNS,
            TableId::NestedClass => NestedClassRaw::COLUMNS,
            TableId::GenericParam => GenericParamRaw::COLUMNS,
            TableId::MethodSpec => MethodSpecRaw::COLUMNS,
            TableId::GenericParamConstraint => GenericParamConstraintRaw::COLUMNS,
        }
    }
}
