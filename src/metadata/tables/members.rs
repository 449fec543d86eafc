//! Rows describing member references, overrides, properties, events and attributes.

use crate::metadata::tables::types::{
    CodedIndex, CodedIndexType,
    ColumnKind::{Blob, Coded, Fixed, Index, Str},
    TableId,
};

table_row! {
    /// `MemberRef` (0x0A): a method or field referenced through its parent type.
    MemberRefRaw = MemberRef {
        /// TypeDef, TypeRef, ModuleRef, MethodDef or TypeSpec
        class: CodedIndex = Coded(CodedIndexType::MemberRefParent),
        /// `#Strings` index of the member name
        name: u32 = Str,
        /// `#Blob` index of the member signature
        signature: u32 = Blob,
    }
}

table_row! {
    /// `Constant` (0x0B).
    ConstantRaw = Constant {
        /// Element type of the value
        base: u8 = Fixed(1),
        /// Padding byte
        padding: u8 = Fixed(1),
        /// Owning field, parameter or property
        parent: CodedIndex = Coded(CodedIndexType::HasConstant),
        /// `#Blob` index of the value
        value: u32 = Blob,
    }
}

table_row! {
    /// `CustomAttribute` (0x0C).
    CustomAttributeRaw = CustomAttribute {
        /// Attributed entity
        parent: CodedIndex = Coded(CodedIndexType::HasCustomAttribute),
        /// Attribute constructor
        constructor: CodedIndex = Coded(CodedIndexType::CustomAttributeType),
        /// `#Blob` index of the encoded arguments
        value: u32 = Blob,
    }
}

table_row! {
    /// `FieldMarshal` (0x0D).
    FieldMarshalRaw = FieldMarshal {
        /// Marshalled field or parameter
        parent: CodedIndex = Coded(CodedIndexType::HasFieldMarshal),
        /// `#Blob` index of the native type descriptor
        native_type: u32 = Blob,
    }
}

table_row! {
    /// `DeclSecurity` (0x0E).
    DeclSecurityRaw = DeclSecurity {
        /// Security action
        action: u16 = Fixed(2),
        /// Protected type, method or assembly
        parent: CodedIndex = Coded(CodedIndexType::HasDeclSecurity),
        /// `#Blob` index of the permission set
        permission_set: u32 = Blob,
    }
}

table_row! {
    /// `EventMap` (0x12).
    EventMapRaw = EventMap {
        /// Owning `TypeDef` row
        parent: u32 = Index(TableId::TypeDef),
        /// First owned `Event` row
        event_list: u32 = Index(TableId::Event),
    }
}

table_row! {
    /// `EventPtr` (0x13).
    EventPtrRaw = EventPtr {
        /// `Event` row this entry stands for
        event: u32 = Index(TableId::Event),
    }
}

table_row! {
    /// `Event` (0x14).
    EventRaw = Event {
        /// `EventAttributes`
        flags: u16 = Fixed(2),
        /// `#Strings` index of the event name
        name: u32 = Str,
        /// Delegate type of the event
        event_type: CodedIndex = Coded(CodedIndexType::TypeDefOrRef),
    }
}

table_row! {
    /// `PropertyMap` (0x15).
    PropertyMapRaw = PropertyMap {
        /// Owning `TypeDef` row
        parent: u32 = Index(TableId::TypeDef),
        /// First owned `Property` row
        property_list: u32 = Index(TableId::Property),
    }
}

table_row! {
    /// `PropertyPtr` (0x16).
    PropertyPtrRaw = PropertyPtr {
        /// `Property` row this entry stands for
        property: u32 = Index(TableId::Property),
    }
}

table_row! {
    /// `Property` (0x17).
    PropertyRaw = Property {
        /// `PropertyAttributes`
        flags: u16 = Fixed(2),
        /// `#Strings` index of the property name
        name: u32 = Str,
        /// `#Blob` index of the property signature
        signature: u32 = Blob,
    }
}

table_row! {
    /// `MethodSemantics` (0x18).
    MethodSemanticsRaw = MethodSemantics {
        /// Getter, setter, adder, remover, ...
        semantics: u16 = Fixed(2),
        /// Accessor `MethodDef` row
        method: u32 = Index(TableId::MethodDef),
        /// Owning event or property
        association: CodedIndex = Coded(CodedIndexType::HasSemantics),
    }
}

table_row! {
    /// `MethodImpl` (0x19): an explicit override, sorted by `class`.
    ///
    /// `method_body` implements `method_declaration` for instances of `class`.
    MethodImplRaw = MethodImpl {
        /// `TypeDef` row the override applies to
        class: u32 = Index(TableId::TypeDef),
        /// The implementing method
        method_body: CodedIndex = Coded(CodedIndexType::MethodDefOrRef),
        /// The overridden (usually interface) method
        method_declaration: CodedIndex = Coded(CodedIndexType::MethodDefOrRef),
    }
}

table_row! {
    /// `ImplMap` (0x1C): P/Invoke mapping.
    ImplMapRaw = ImplMap {
        /// `PInvokeAttributes`
        mapping_flags: u16 = Fixed(2),
        /// Forwarded field or method
        member_forwarded: CodedIndex = Coded(CodedIndexType::MemberForwarded),
        /// `#Strings` index of the native entry point
        import_name: u32 = Str,
        /// Native module
        import_scope: u32 = Index(TableId::ModuleRef),
    }
}
