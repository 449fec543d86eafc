//! Rows describing the assembly manifest and its external references.

use crate::metadata::tables::types::{
    CodedIndex, CodedIndexType,
    ColumnKind::{Blob, Coded, Fixed, Index, Str},
    TableId,
};

table_row! {
    /// `ModuleRef` (0x1A).
    ModuleRefRaw = ModuleRef {
        /// `#Strings` index of the module name
        name: u32 = Str,
    }
}

table_row! {
    /// `EncLog` (0x1E): edit-and-continue log.
    EncLogRaw = EncLog {
        /// Token of the edited row
        logged_token: u32 = Fixed(4),
        /// Edit operation
        func_code: u32 = Fixed(4),
    }
}

table_row! {
    /// `EncMap` (0x1F): edit-and-continue token map.
    EncMapRaw = EncMap {
        /// Mapped token
        mapped_token: u32 = Fixed(4),
    }
}

table_row! {
    /// `Assembly` (0x20): this image's assembly manifest.
    AssemblyRaw = Assembly {
        /// Hash algorithm of the file hashes
        hash_alg_id: u32 = Fixed(4),
        /// Major version
        major_version: u16 = Fixed(2),
        /// Minor version
        minor_version: u16 = Fixed(2),
        /// Build number
        build_number: u16 = Fixed(2),
        /// Revision number
        revision_number: u16 = Fixed(2),
        /// `AssemblyFlags`
        flags: u32 = Fixed(4),
        /// `#Blob` index of the public key
        public_key: u32 = Blob,
        /// `#Strings` index of the assembly name
        name: u32 = Str,
        /// `#Strings` index of the culture
        culture: u32 = Str,
    }
}

table_row! {
    /// `AssemblyProcessor` (0x21), unused by runtimes.
    AssemblyProcessorRaw = AssemblyProcessor {
        /// Processor id
        processor: u32 = Fixed(4),
    }
}

table_row! {
    /// `AssemblyOS` (0x22), unused by runtimes.
    AssemblyOsRaw = AssemblyOS {
        /// Platform id
        os_platform_id: u32 = Fixed(4),
        /// OS major version
        os_major_version: u32 = Fixed(4),
        /// OS minor version
        os_minor_version: u32 = Fixed(4),
    }
}

table_row! {
    /// `AssemblyRef` (0x23): a referenced assembly.
    AssemblyRefRaw = AssemblyRef {
        /// Major version
        major_version: u16 = Fixed(2),
        /// Minor version
        minor_version: u16 = Fixed(2),
        /// Build number
        build_number: u16 = Fixed(2),
        /// Revision number
        revision_number: u16 = Fixed(2),
        /// `AssemblyFlags`
        flags: u32 = Fixed(4),
        /// `#Blob` index of the public key or its token
        public_key_or_token: u32 = Blob,
        /// `#Strings` index of the assembly name
        name: u32 = Str,
        /// `#Strings` index of the culture
        culture: u32 = Str,
        /// `#Blob` index of the hash value
        hash_value: u32 = Blob,
    }
}

table_row! {
    /// `AssemblyRefProcessor` (0x24), unused by runtimes.
    AssemblyRefProcessorRaw = AssemblyRefProcessor {
        /// Processor id
        processor: u32 = Fixed(4),
        /// Owning `AssemblyRef` row
        assembly_ref: u32 = Index(TableId::AssemblyRef),
    }
}

table_row! {
    /// `AssemblyRefOS` (0x25), unused by runtimes.
    AssemblyRefOsRaw = AssemblyRefOS {
        /// Platform id
        os_platform_id: u32 = Fixed(4),
        /// OS major version
        os_major_version: u32 = Fixed(4),
        /// OS minor version
        os_minor_version: u32 = Fixed(4),
        /// Owning `AssemblyRef` row
        assembly_ref: u32 = Index(TableId::AssemblyRef),
    }
}

table_row! {
    /// `File` (0x26): another file of a multi-file assembly.
    FileRaw = File {
        /// `FileAttributes`
        flags: u32 = Fixed(4),
        /// `#Strings` index of the file name
        name: u32 = Str,
        /// `#Blob` index of the hash value
        hash_value: u32 = Blob,
    }
}

table_row! {
    /// `ExportedType` (0x27): a type forwarded or exported from another file.
    ExportedTypeRaw = ExportedType {
        /// `TypeAttributes`
        flags: u32 = Fixed(4),
        /// Hint: `TypeDef` row in the target module
        type_def_id: u32 = Fixed(4),
        /// `#Strings` index of the type name
        type_name: u32 = Str,
        /// `#Strings` index of the namespace
        type_namespace: u32 = Str,
        /// File, AssemblyRef or enclosing ExportedType
        implementation: CodedIndex = Coded(CodedIndexType::Implementation),
    }
}

table_row! {
    /// `ManifestResource` (0x28).
    ManifestResourceRaw = ManifestResource {
        /// Offset of the resource in its container
        data_offset: u32 = Fixed(4),
        /// `ManifestResourceAttributes`
        flags: u32 = Fixed(4),
        /// `#Strings` index of the resource name
        name: u32 = Str,
        /// Null for resources embedded in this image
        implementation: CodedIndex = Coded(CodedIndexType::Implementation),
    }
}
