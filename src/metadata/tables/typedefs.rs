//! Rows describing modules, types and their members.

use crate::metadata::tables::types::{
    CodedIndex, CodedIndexType,
    ColumnKind::{Blob, Coded, Fixed, Guid, Index, Str},
    TableId,
};

table_row! {
    /// `Module` (0x00): the single row naming this module.
    ModuleRaw = Module {
        /// Reserved, zero
        generation: u16 = Fixed(2),
        /// `#Strings` index of the module name
        name: u32 = Str,
        /// `#GUID` index of the module version id
        mvid: u32 = Guid,
        /// Reserved
        enc_id: u32 = Guid,
        /// Reserved
        enc_base_id: u32 = Guid,
    }
}

table_row! {
    /// `TypeRef` (0x01): a reference to a type defined elsewhere.
    TypeRefRaw = TypeRef {
        /// Module, ModuleRef, AssemblyRef or enclosing TypeRef
        resolution_scope: CodedIndex = Coded(CodedIndexType::ResolutionScope),
        /// `#Strings` index of the type name
        type_name: u32 = Str,
        /// `#Strings` index of the namespace
        type_namespace: u32 = Str,
    }
}

table_row! {
    /// `TypeDef` (0x02): a type defined in this module.
    ///
    /// Fields and methods are owned as runs: this row's `field_list` up to (excluding) the
    /// next row's `field_list`, likewise for `method_list`.
    TypeDefRaw = TypeDef {
        /// `TypeAttributes`
        flags: u32 = Fixed(4),
        /// `#Strings` index of the type name
        type_name: u32 = Str,
        /// `#Strings` index of the namespace
        type_namespace: u32 = Str,
        /// Base type, null for `System.Object` and interfaces
        extends: CodedIndex = Coded(CodedIndexType::TypeDefOrRef),
        /// First owned `Field` (or `FieldPtr`) row
        field_list: u32 = Index(TableId::Field),
        /// First owned `MethodDef` (or `MethodPtr`) row
        method_list: u32 = Index(TableId::MethodDef),
    }
}

table_row! {
    /// `FieldPtr` (0x03): field indirection of uncompressed tables streams.
    FieldPtrRaw = FieldPtr {
        /// `Field` row this entry stands for
        field: u32 = Index(TableId::Field),
    }
}

table_row! {
    /// `Field` (0x04).
    FieldRaw = Field {
        /// `FieldAttributes`
        flags: u16 = Fixed(2),
        /// `#Strings` index of the field name
        name: u32 = Str,
        /// `#Blob` index of the field signature
        signature: u32 = Blob,
    }
}

table_row! {
    /// `MethodPtr` (0x05): method indirection of uncompressed tables streams.
    MethodPtrRaw = MethodPtr {
        /// `MethodDef` row this entry stands for
        method: u32 = Index(TableId::MethodDef),
    }
}

table_row! {
    /// `MethodDef` (0x06).
    MethodDefRaw = MethodDef {
        /// RVA of the method body, zero for abstract and runtime methods
        rva: u32 = Fixed(4),
        /// `MethodImplAttributes`
        impl_flags: u16 = Fixed(2),
        /// `MethodAttributes`
        flags: u16 = Fixed(2),
        /// `#Strings` index of the method name
        name: u32 = Str,
        /// `#Blob` index of the method signature
        signature: u32 = Blob,
        /// First owned `Param` row
        param_list: u32 = Index(TableId::Param),
    }
}

table_row! {
    /// `ParamPtr` (0x07): parameter indirection of uncompressed tables streams.
    ParamPtrRaw = ParamPtr {
        /// `Param` row this entry stands for
        param: u32 = Index(TableId::Param),
    }
}

table_row! {
    /// `Param` (0x08).
    ParamRaw = Param {
        /// `ParamAttributes`
        flags: u16 = Fixed(2),
        /// 0 for the return value, 1.. for parameters
        sequence: u16 = Fixed(2),
        /// `#Strings` index of the parameter name
        name: u32 = Str,
    }
}

table_row! {
    /// `InterfaceImpl` (0x09): one interface a type declares, sorted by `class`.
    InterfaceImplRaw = InterfaceImpl {
        /// Implementing `TypeDef` row
        class: u32 = Index(TableId::TypeDef),
        /// Implemented interface
        interface: CodedIndex = Coded(CodedIndexType::TypeDefOrRef),
    }
}

table_row! {
    /// `ClassLayout` (0x0F).
    ClassLayoutRaw = ClassLayout {
        /// Field alignment
        packing_size: u16 = Fixed(2),
        /// Explicit instance size
        class_size: u32 = Fixed(4),
        /// Owning `TypeDef` row
        parent: u32 = Index(TableId::TypeDef),
    }
}

table_row! {
    /// `FieldLayout` (0x10).
    FieldLayoutRaw = FieldLayout {
        /// Explicit field offset
        field_offset: u32 = Fixed(4),
        /// `Field` row
        field: u32 = Index(TableId::Field),
    }
}

table_row! {
    /// `StandAloneSig` (0x11): local variable and call-site signatures.
    StandAloneSigRaw = StandAloneSig {
        /// `#Blob` index of the signature
        signature: u32 = Blob,
    }
}

table_row! {
    /// `TypeSpec` (0x1B): a constructed type, e.g. a generic instantiation.
    TypeSpecRaw = TypeSpec {
        /// `#Blob` index of the type signature
        signature: u32 = Blob,
    }
}

table_row! {
    /// `FieldRVA` (0x1D).
    FieldRvaRaw = FieldRVA {
        /// RVA of the field's initial data
        rva: u32 = Fixed(4),
        /// `Field` row
        field: u32 = Index(TableId::Field),
    }
}

table_row! {
    /// `NestedClass` (0x29): links a nested type to its enclosing type.
    NestedClassRaw = NestedClass {
        /// Nested `TypeDef` row
        nested_class: u32 = Index(TableId::TypeDef),
        /// Enclosing `TypeDef` row
        enclosing_class: u32 = Index(TableId::TypeDef),
    }
}
