//! A loaded metadata image.
//!
//! [`Image`] owns the input buffer and, through a self-referencing borrow, the parsed metadata
//! root, the tables stream header and the four heaps. Everything is validated inside
//! [`Image::load`]; a value of this type is never partially initialised, and nothing in it
//! changes after load.
//!
//! # Examples
//!
//! ```rust,ignore
//! use dotvtable::{metadata::{image::Image, tables::TypeDefRaw, token::Token}, LoadConfig};
//!
//! let image = Image::load(std::fs::read("Hello.dll")?)?;
//! let hello = image.row::<TypeDefRaw>(Token::new(0x0200_0002))?;
//! println!("{}", image.strings().get(hello.type_name as usize)?);
//! ```

use std::sync::Arc;

use ouroboros::self_referencing;
use tracing::debug;
use widestring::U16String;

use crate::{
    config::LoadConfig,
    file::File,
    metadata::{
        method::MethodBody,
        root::Root,
        streams::{Blob, Guid, StreamKind, Strings, TablesHeader, UserStrings},
        tables::{
            AssemblyRaw, CodedIndex, FieldPtrRaw, GenericParamRaw, MethodDefRaw, MethodPtrRaw,
            MetadataTable, NestedClassRaw, ParamPtrRaw, RowReadable, TableId, TypeDefRaw,
        },
        token::Token,
    },
    Error, Result,
};

/// Token table byte of user string references (`ldstr`).
pub const USER_STRING_TABLE: u8 = 0x70;

/// The borrowed half of an [`Image`].
pub struct ImageData<'a> {
    /// Metadata root and stream directory
    pub root: Root,
    /// The tables stream
    pub tables: TablesHeader<'a>,
    /// `#Strings`, empty if absent
    pub strings: Strings<'a>,
    /// `#US`, empty if absent
    pub user_strings: UserStrings<'a>,
    /// `#Blob`, empty if absent
    pub blobs: Blob<'a>,
    /// `#GUID`, empty if absent
    pub guids: Guid<'a>,
}

impl<'a> ImageData<'a> {
    fn from_file(file: &'a File, config: &LoadConfig) -> Result<ImageData<'a>> {
        let metadata = file.metadata();
        let root = Root::read(metadata, config)?;

        let stream = |kind: StreamKind| -> &'a [u8] {
            root.stream(kind).map_or(&[] as &[u8], |header| {
                let start = header.offset as usize;
                &metadata[start..start + header.size as usize]
            })
        };

        let strings = Strings::from(stream(StreamKind::Strings))?;
        let user_strings = UserStrings::from(stream(StreamKind::UserStrings))?;
        let blobs = Blob::from(stream(StreamKind::Blob))?;
        let guids = Guid::from(stream(StreamKind::Guid))?;
        let tables = TablesHeader::from(stream(StreamKind::Tables))?;

        if config.validate_heaps {
            let strings_count = strings.record_count()?;
            let user_strings_count = user_strings.record_count()?;
            let blob_count = blobs.record_count()?;
            debug!(
                strings = strings_count,
                user_strings = user_strings_count,
                blobs = blob_count,
                guids = guids.count(),
                "heaps validated"
            );
        }

        Ok(ImageData {
            root,
            tables,
            strings,
            user_strings,
            blobs,
            guids,
        })
    }
}

#[self_referencing]
/// One loaded assembly image: its bytes and the metadata views over them.
///
/// `Image` is `Send + Sync`; every accessor is a read of immutable data.
pub struct Image {
    file: Arc<File>,
    config: LoadConfig,
    #[borrows(file)]
    #[covariant]
    data: ImageData<'this>,
}

impl Image {
    /// Load an image with [`LoadConfig::default`].
    ///
    /// # Errors
    /// See [`Image::load_with`].
    pub fn load(bytes: Vec<u8>) -> Result<Image> {
        Self::load_with(bytes, LoadConfig::default())
    }

    /// Load a PE file or a bare metadata blob.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] (or [`crate::Error::OutOfBounds`] /
    /// [`crate::Error::Goblin`]) for any structural problem: container headers, stream
    /// directory, heap tiling when enabled, or table layout.
    pub fn load_with(bytes: Vec<u8>, config: LoadConfig) -> Result<Image> {
        let file = Arc::new(File::from_mem(bytes)?);
        let image = Image::try_new(file, config, |file| ImageData::from_file(file, &config))?;

        debug!(
            version = %image.root().version,
            tables = image.tables().table_count(),
            typedefs = image.tables().rows(TableId::TypeDef),
            methods = image.tables().rows(TableId::MethodDef),
            "image loaded"
        );
        Ok(image)
    }

    /// The underlying file.
    #[must_use]
    pub fn file(&self) -> &Arc<File> {
        self.borrow_file()
    }

    /// The configuration the image was loaded with.
    #[must_use]
    pub fn config(&self) -> &LoadConfig {
        self.borrow_config()
    }

    /// The metadata root.
    #[must_use]
    pub fn root(&self) -> &Root {
        &self.borrow_data().root
    }

    /// The tables stream header.
    #[must_use]
    pub fn tables(&self) -> &TablesHeader<'_> {
        &self.borrow_data().tables
    }

    /// The `#Strings` heap.
    #[must_use]
    pub fn strings(&self) -> &Strings<'_> {
        &self.borrow_data().strings
    }

    /// The `#US` heap.
    #[must_use]
    pub fn user_strings(&self) -> &UserStrings<'_> {
        &self.borrow_data().user_strings
    }

    /// The `#Blob` heap.
    #[must_use]
    pub fn blobs(&self) -> &Blob<'_> {
        &self.borrow_data().blobs
    }

    /// The `#GUID` heap.
    #[must_use]
    pub fn guids(&self) -> &Guid<'_> {
        &self.borrow_data().guids
    }

    /// Typed view over the table of `T`, if present.
    #[must_use]
    pub fn table<T: RowReadable>(&self) -> Option<MetadataTable<'_, T>> {
        self.tables().table::<T>()
    }

    /// Decode the row a token points at.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] if the token belongs to another table and
    /// [`crate::Error::RowOutOfRange`] if the row (or the whole table) does not exist.
    pub fn row<T: RowReadable>(&self, token: Token) -> Result<T> {
        match self.table::<T>() {
            Some(table) => table.get_by_token(token),
            None => Err(Error::RowOutOfRange {
                table: T::TABLE,
                rid: token.row(),
                rows: 0,
            }),
        }
    }

    /// The user string an `ldstr` token refers to.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] for a token of another table and
    /// [`crate::Error::OutOfBounds`] for an offset past the heap.
    pub fn user_string(&self, token: Token) -> Result<U16String> {
        if token.table() != USER_STRING_TABLE {
            return Err(malformed_error!("Token {} is not a user string token", token));
        }
        self.user_strings().get(token.row() as usize)
    }

    /// Decode the body of the MethodDef `token`. Abstract and runtime-provided methods have
    /// no body and yield `None`.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedConstruct`] for bare metadata images, which carry
    /// no code, and [`crate::Error::BadImage`] / [`crate::Error::OutOfBounds`] for an RVA
    /// or body that does not fit the file.
    pub fn method_body(&self, token: Token) -> Result<Option<MethodBody<'_>>> {
        let method = self.row::<MethodDefRaw>(token)?;
        if method.rva == 0 {
            return Ok(None);
        }

        let offset = self.file().rva_to_offset(method.rva)?;
        let data = &self.file().data()[offset..];
        MethodBody::from(data).map(Some)
    }

    /// The assembly name from the `Assembly` table, if this image has a manifest.
    ///
    /// # Errors
    /// Returns an error if the row or its name cannot be read.
    pub fn assembly_name(&self) -> Result<Option<&str>> {
        let Some(table) = self.table::<AssemblyRaw>() else {
            return Ok(None);
        };
        if table.row_count() == 0 {
            return Ok(None);
        }
        let row = table.get(1)?;
        self.strings().get(row.name as usize).map(Some)
    }

    /// MethodDef rows owned by TypeDef `type_rid`, resolved through `MethodPtr` if present.
    ///
    /// # Errors
    /// Returns [`crate::Error::RowOutOfRange`] for an invalid type row and
    /// [`crate::Error::BadImage`] for a method list that runs backwards.
    pub fn type_methods(&self, type_rid: u32) -> Result<Vec<u32>> {
        let (start, next) = self.type_list(type_rid, 5)?;
        self.resolve_list::<MethodPtrRaw>(TableId::MethodDef, start, next)
    }

    /// Field rows owned by TypeDef `type_rid`, resolved through `FieldPtr` if present.
    ///
    /// # Errors
    /// See [`Image::type_methods`].
    pub fn type_fields(&self, type_rid: u32) -> Result<Vec<u32>> {
        let (start, next) = self.type_list(type_rid, 4)?;
        self.resolve_list::<FieldPtrRaw>(TableId::Field, start, next)
    }

    /// Param rows owned by MethodDef `method_rid`, resolved through `ParamPtr` if present.
    ///
    /// # Errors
    /// See [`Image::type_methods`].
    pub fn method_params(&self, method_rid: u32) -> Result<Vec<u32>> {
        let methods = self.required_table::<MethodDefRaw>(method_rid)?;
        let start = methods.get(method_rid)?.param_list;
        let next = if method_rid < methods.row_count() {
            Some(methods.get(method_rid + 1)?.param_list)
        } else {
            None
        };
        self.resolve_list::<ParamPtrRaw>(TableId::Param, start, next)
    }

    /// The TypeDef row owning MethodDef `method_rid`.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] if no type's method list contains the method.
    pub fn method_owner(&self, method_rid: u32) -> Result<u32> {
        let types = self.required_table::<TypeDefRaw>(0)?;

        if !self.tables().has_table(TableId::MethodPtr) {
            // Method lists are ascending: the owner is the last type starting at or before
            // the method, provided its list is not empty.
            let mut owner = None;
            for rid in 1..=types.row_count() {
                let start = types.cell(rid, 5)?;
                if start > method_rid {
                    break;
                }
                owner = Some(rid);
            }
            if let Some(rid) = owner {
                if self.type_methods(rid)?.contains(&method_rid) {
                    return Ok(rid);
                }
            }
        } else {
            for rid in 1..=types.row_count() {
                if self.type_methods(rid)?.contains(&method_rid) {
                    return Ok(rid);
                }
            }
        }

        Err(malformed_error!(
            "MethodDef row {} is not owned by any type",
            method_rid
        ))
    }

    /// Find a top-level TypeDef by namespace and name.
    ///
    /// # Errors
    /// Propagates row and heap read failures.
    pub fn find_type(&self, namespace: &str, name: &str) -> Result<Option<u32>> {
        let Some(types) = self.table::<TypeDefRaw>() else {
            return Ok(None);
        };

        for row in types.iter() {
            let row = row?;
            if self.strings().get(row.type_name as usize)? == name
                && self.strings().get(row.type_namespace as usize)? == namespace
                && self.enclosing_type(row.rid)?.is_none()
            {
                return Ok(Some(row.rid));
            }
        }
        Ok(None)
    }

    /// Find a type nested directly in TypeDef `enclosing_rid` by name.
    ///
    /// # Errors
    /// Propagates row and heap read failures.
    pub fn find_nested_type(&self, enclosing_rid: u32, name: &str) -> Result<Option<u32>> {
        let Some(nested) = self.table::<NestedClassRaw>() else {
            return Ok(None);
        };

        for row in nested.iter() {
            let row = row?;
            if row.enclosing_class != enclosing_rid {
                continue;
            }
            let inner = self.row::<TypeDefRaw>(TableId::TypeDef.token(row.nested_class))?;
            if self.strings().get(inner.type_name as usize)? == name {
                return Ok(Some(row.nested_class));
            }
        }
        Ok(None)
    }

    /// The TypeDef enclosing `type_rid`, if it is nested.
    ///
    /// # Errors
    /// Propagates row read failures.
    pub fn enclosing_type(&self, type_rid: u32) -> Result<Option<u32>> {
        let Some(nested) = self.table::<NestedClassRaw>() else {
            return Ok(None);
        };
        Ok(nested
            .find(|row| row.nested_class == type_rid)?
            .map(|row| row.enclosing_class))
    }

    /// Number of generic parameters declared by `owner`, a `TypeOrMethodDef` coded index.
    ///
    /// # Errors
    /// Propagates row read failures.
    pub fn generic_param_count(&self, owner: CodedIndex) -> Result<u32> {
        let Some(params) = self.table::<GenericParamRaw>() else {
            return Ok(0);
        };

        let mut count = 0;
        for row in params.iter() {
            let row = row?;
            if row.owner.tag == owner.tag && row.owner.row == owner.row {
                count += 1;
            }
        }
        Ok(count)
    }

    fn required_table<T: RowReadable>(&self, rid: u32) -> Result<MetadataTable<'_, T>> {
        self.table::<T>().ok_or(Error::RowOutOfRange {
            table: T::TABLE,
            rid,
            rows: 0,
        })
    }

    /// Start of the list in `column` of TypeDef `type_rid` and the start of the next row's.
    fn type_list(&self, type_rid: u32, column: usize) -> Result<(u32, Option<u32>)> {
        let types = self.required_table::<TypeDefRaw>(type_rid)?;
        let start = types.cell(type_rid, column)?;
        let next = if type_rid < types.row_count() {
            Some(types.cell(type_rid + 1, column)?)
        } else {
            None
        };
        Ok((start, next))
    }

    /// Expand the run `start..next` of a member list into rows of `target`, going through
    /// the pointer table `P` when the image carries one.
    fn resolve_list<P: RowReadable>(
        &self,
        target: TableId,
        start: u32,
        next: Option<u32>,
    ) -> Result<Vec<u32>> {
        let pointers = self.table::<P>();
        let domain = match &pointers {
            Some(pointers) => pointers.row_count(),
            None => self.tables().rows(target),
        };

        let start = start.max(1);
        let end = next.unwrap_or(domain + 1).min(domain + 1);
        if start > end {
            return Err(malformed_error!(
                "{:?} list {}..{} runs backwards",
                target,
                start,
                end
            ));
        }

        match pointers {
            Some(pointers) => (start..end).map(|index| pointers.cell(index, 0)).collect(),
            None => Ok((start..end).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            method::ExceptionClauseKind,
            tables::{CodedIndexType, FieldRaw, ModuleRaw, TypeRefRaw},
        },
        test::MetadataBuilder,
    };

    fn sample() -> MetadataBuilder {
        let mut builder = MetadataBuilder::new();
        builder.module("sample.dll");
        builder.assembly("Sample");
        let mscorlib = builder.assembly_ref("mscorlib");
        let object = builder.type_ref(mscorlib, "System", "Object");

        builder.type_def(0, "", "<Module>", Token::default());
        let greeter = builder.type_def(0x0010_0001, "Demo", "Greeter", object);
        builder.field(0x0001, "count", &[0x06, 0x08]);
        builder.method(0x0086, "Greet", &[0x20, 0x00, 0x01], 0);
        builder.method(0x0086, "Wave", &[0x20, 0x00, 0x01], 0);
        let inner = builder.type_def(0x0010_0002, "", "Inner", object);
        builder.nested_class(inner, greeter);
        builder
    }

    #[test]
    fn bare_image() {
        let image = Image::load(sample().build_metadata()).unwrap();

        assert_eq!(image.root().version, "v4.0.30319");
        assert_eq!(image.assembly_name().unwrap(), Some("Sample"));

        let module = image.row::<ModuleRaw>(Token::new(0x0000_0001)).unwrap();
        assert_eq!(image.strings().get(module.name as usize).unwrap(), "sample.dll");
        assert!(image.guids().get(module.mvid as usize).is_ok());

        let object = image.row::<TypeRefRaw>(Token::new(0x0100_0001)).unwrap();
        assert_eq!(object.resolution_scope.tag, TableId::AssemblyRef);
        assert_eq!(image.strings().get(object.type_name as usize).unwrap(), "Object");

        let greeter = image.row::<TypeDefRaw>(Token::new(0x0200_0002)).unwrap();
        assert_eq!(
            greeter.extends,
            CodedIndexType::TypeDefOrRef.decode((1 << 2) | 1).unwrap()
        );
        assert_eq!(image.type_methods(2).unwrap(), vec![1, 2]);
        assert_eq!(image.type_fields(2).unwrap(), vec![1]);
        assert!(image.type_methods(1).unwrap().is_empty());
        assert!(image.type_methods(3).unwrap().is_empty());
        assert_eq!(image.method_owner(2).unwrap(), 2);

        assert_eq!(image.find_type("Demo", "Greeter").unwrap(), Some(2));
        assert_eq!(image.find_type("", "Inner").unwrap(), None);
        assert_eq!(image.find_nested_type(2, "Inner").unwrap(), Some(3));
        assert_eq!(image.enclosing_type(3).unwrap(), Some(2));

        assert!(matches!(
            image.row::<TypeDefRaw>(Token::new(0x0200_0009)),
            Err(Error::RowOutOfRange { rid: 9, rows: 3, .. })
        ));
        assert!(matches!(
            image.row::<FieldRaw>(Token::new(0x0200_0001)),
            Err(Error::BadImage { .. })
        ));
        assert!(matches!(
            image.method_body(Token::new(0x0600_0001)),
            Ok(None)
        ));
    }

    #[test]
    fn pe_image_with_bodies() {
        let mut builder = sample();
        // ldstr, ret
        let tiny = builder.method_body(&[(6 << 2) | 0x2, 0x72, 0x01, 0x00, 0x00, 0x70, 0x2A]);
        let mut fat = vec![0x1B, 0x30, 0x02, 0x00, 0x08, 0, 0, 0, 0, 0, 0, 0];
        fat.extend_from_slice(&[0x00, 0x00, 0xDD, 0x02, 0x00, 0x00, 0x00, 0x2A]);
        // small section: one finally clause protecting 0..3, handled at 3..4
        fat.extend_from_slice(&[0x01, 16, 0, 0, 2, 0, 0, 0, 3, 3, 0, 1, 0, 0, 0, 0]);
        let fat = builder.method_body(&fat);
        let literal = builder.user_string("hello");
        builder.method(0x0086, "Body", &[0x20, 0x00, 0x01], tiny);
        builder.method(0x0086, "Guarded", &[0x20, 0x00, 0x01], fat);

        let image = Image::load(builder.build_pe()).unwrap();
        assert!(matches!(
            image.file().container(),
            crate::file::Container::Pe { .. }
        ));

        let body = image.method_body(Token::new(0x0600_0003)).unwrap().unwrap();
        assert!(!body.is_fat);
        assert_eq!(body.code.len(), 6);
        assert_eq!(body.code[5], 0x2A);

        let guarded = image.method_body(Token::new(0x0600_0004)).unwrap().unwrap();
        assert!(guarded.is_fat);
        assert!(guarded.init_locals);
        assert_eq!(guarded.max_stack, 2);
        assert_eq!(guarded.exception_clauses.len(), 1);
        assert_eq!(guarded.exception_clauses[0].kind, ExceptionClauseKind::Finally);
        assert_eq!(guarded.exception_clauses[0].handler_offset, 3);

        let text = image
            .user_string(Token::from_parts(USER_STRING_TABLE, literal))
            .unwrap();
        assert_eq!(text.to_string_lossy(), "hello");
        assert!(image.user_string(Token::new(0x0600_0001)).is_err());
    }

    #[test]
    fn bare_image_has_no_code() {
        let mut builder = sample();
        builder.method(0x0086, "Body", &[0x20, 0x00, 0x01], 0x2050);
        let image = Image::load(builder.build_metadata()).unwrap();
        assert!(matches!(
            image.method_body(Token::new(0x0600_0003)),
            Err(Error::UnsupportedConstruct(_))
        ));
    }

    #[test]
    fn heap_tiling() {
        let mut builder = sample();
        builder.raw_heap_bytes(StreamKind::Blob, &[0x05, 0x01]);
        let bytes = builder.build_metadata();

        assert!(matches!(
            Image::load(bytes.clone()),
            Err(Error::BadImage { .. })
        ));
        assert!(Image::load_with(bytes, LoadConfig::lenient()).is_ok());
    }

    #[test]
    fn unterminated_strings_heap() {
        let mut builder = sample();
        builder.raw_heap_bytes(StreamKind::Strings, b"dangling");
        assert!(matches!(
            Image::load(builder.build_metadata()),
            Err(Error::BadImage { .. })
        ));
    }

    #[test]
    fn record_counts() {
        let mut builder = MetadataBuilder::new();
        builder.module("m");
        builder.blob(&[1]);
        builder.blob(&[2, 3]);
        builder.user_string("a");
        let image = Image::load(builder.build_metadata()).unwrap();

        assert_eq!(image.blobs().record_count().unwrap(), 3);
        assert_eq!(image.user_strings().record_count().unwrap(), 2);
        // "", "m"
        assert_eq!(image.strings().record_count().unwrap(), 2);
    }

    #[test]
    fn pointer_tables() {
        let mut builder = MetadataBuilder::new();
        builder.module("ptr.dll");
        builder.type_def(0, "", "<Module>", Token::default());
        builder.type_def(0x0010_0001, "N", "A", Token::default());
        builder.method(0x0006, "First", &[0x00, 0x00, 0x01], 0);
        builder.method(0x0006, "Second", &[0x00, 0x00, 0x01], 0);
        builder.type_def(0x0010_0001, "N", "B", Token::default());
        builder.method(0x0006, "Third", &[0x00, 0x00, 0x01], 0);
        // A owns pointer rows 1..3, B owns 3..4; pointers shuffle the order
        builder.row(TableId::MethodPtr, &[2]);
        builder.row(TableId::MethodPtr, &[3]);
        builder.row(TableId::MethodPtr, &[1]);
        let image = Image::load(builder.build_metadata()).unwrap();

        assert_eq!(image.type_methods(2).unwrap(), vec![2, 3]);
        assert_eq!(image.type_methods(3).unwrap(), vec![1]);
        assert_eq!(image.method_owner(1).unwrap(), 3);
        assert_eq!(image.method_owner(3).unwrap(), 2);
    }

    #[test]
    fn generic_param_count() {
        let mut builder = MetadataBuilder::new();
        builder.module("g.dll");
        builder.type_def(0, "", "<Module>", Token::default());
        let pair = builder.type_def(0x0010_0001, "G", "Pair`2", Token::default());
        builder.generic_param(0, pair, "T");
        builder.generic_param(1, pair, "U");
        let image = Image::load(builder.build_metadata()).unwrap();

        let owner = CodedIndex::new(TableId::TypeDef, pair.row());
        assert_eq!(image.generic_param_count(owner).unwrap(), 2);
        let other = CodedIndex::new(TableId::TypeDef, 1);
        assert_eq!(image.generic_param_count(other).unwrap(), 0);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Image::load(vec![0u8; 16]).is_err());
        assert!(Image::load(Vec::new()).is_err());
    }
}
