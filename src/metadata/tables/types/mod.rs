//! Generic table machinery: column kinds, per-image schemas and typed row access.
//!
//! A table's row size is not a constant of the format. Every heap index is 2 or 4 bytes
//! depending on the `HeapSizes` flags, and every table or coded index is 2 or 4 bytes
//! depending on the row counts of the tables it can point at. [`TableSchema`] resolves a
//! table's [`ColumnKind`] list against one image's [`TableInfo`] into fixed column offsets,
//! once, at load. Rows are then located in O(1) as `base + row_size * (rid - 1)` and each
//! cell is read at its precomputed offset.
//!
//! Row types implement [`RowReadable`]; [`MetadataTable`] is a typed, borrowed view over one
//! table's bytes.

mod codedindex;
mod tableid;
mod tableinfo;

pub use codedindex::{CodedIndex, CodedIndexType};
pub use tableid::TableId;
pub use tableinfo::{
    TableInfo, TableRowInfo, HEAP_LARGE_BLOB, HEAP_LARGE_GUID, HEAP_LARGE_STRINGS,
};

use std::marker::PhantomData;

use crate::{file::io::read_le_at, metadata::token::Token, Error, Result};

/// What a column holds, which decides its width in a given image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// A constant-width scalar of 1, 2 or 4 bytes
    Fixed(u8),
    /// Index into `#Strings`
    Str,
    /// Index into `#GUID`
    Guid,
    /// Index into `#Blob`
    Blob,
    /// Row index into a single table
    Index(TableId),
    /// Tagged row index into one of several tables
    Coded(CodedIndexType),
}

/// Column offsets and row size of one table in one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    columns: &'static [ColumnKind],
    widths: Vec<u8>,
    offsets: Vec<usize>,
    row_size: usize,
}

impl TableSchema {
    /// Resolve `columns` against the widths implied by `info`.
    #[must_use]
    pub fn new(columns: &'static [ColumnKind], info: &TableInfo) -> Self {
        let widths = columns
            .iter()
            .map(|kind| info.column_bytes(*kind))
            .collect::<Vec<_>>();

        let mut offsets = Vec::with_capacity(columns.len());
        let mut row_size = 0usize;
        for width in &widths {
            offsets.push(row_size);
            row_size += usize::from(*width);
        }

        TableSchema {
            columns,
            widths,
            offsets,
            row_size,
        }
    }

    /// Size of one row in bytes.
    #[must_use]
    pub fn row_size(&self) -> usize {
        self.row_size
    }

    /// Byte offset of `column` within a row.
    #[must_use]
    pub fn column_offset(&self, column: usize) -> Option<usize> {
        self.offsets.get(column).copied()
    }

    /// Width of `column` in bytes.
    #[must_use]
    pub fn column_width(&self, column: usize) -> Option<u8> {
        self.widths.get(column).copied()
    }

    /// The column kinds this schema was built from.
    #[must_use]
    pub fn columns(&self) -> &'static [ColumnKind] {
        self.columns
    }
}

/// Reads the cells of one row at their schema offsets, in column order.
pub struct RowCursor<'a> {
    row: &'a [u8],
    schema: &'a TableSchema,
    info: &'a TableInfo,
    column: usize,
}

impl<'a> RowCursor<'a> {
    /// Create a cursor over `row`, which must be exactly one row of `schema`.
    #[must_use]
    pub fn new(row: &'a [u8], schema: &'a TableSchema, info: &'a TableInfo) -> Self {
        RowCursor {
            row,
            schema,
            info,
            column: 0,
        }
    }

    /// Read the next column's raw value, widened to `u32`.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] if the row has no more columns, or if a table
    /// index points past the end of its target table.
    pub fn next_raw(&mut self) -> Result<(ColumnKind, u32)> {
        let column = self.column;
        let (Some(kind), Some(offset), Some(width)) = (
            self.schema.columns.get(column).copied(),
            self.schema.column_offset(column),
            self.schema.column_width(column),
        ) else {
            return Err(malformed_error!("Row read past its last column {}", column));
        };
        self.column += 1;

        let mut position = offset;
        let value = match width {
            1 => u32::from(read_le_at::<u8>(self.row, &mut position)?),
            2 => u32::from(read_le_at::<u16>(self.row, &mut position)?),
            _ => read_le_at::<u32>(self.row, &mut position)?,
        };

        if let ColumnKind::Index(table) = kind {
            // List columns may point one past the last row to mark an empty run.
            let rows = self.info.rows(table);
            if value > rows.saturating_add(1) {
                return Err(malformed_error!(
                    "Index {} into {:?} exceeds its {} rows",
                    value,
                    table,
                    rows
                ));
            }
        }

        Ok((kind, value))
    }

    /// Read the next column as `T`.
    ///
    /// # Errors
    /// See [`RowCursor::next_raw`] and the [`FromCell`] implementation of `T`.
    pub fn read<T: FromCell>(&mut self) -> Result<T> {
        let (kind, value) = self.next_raw()?;
        T::from_cell(kind, value, self.info)
    }
}

/// Conversion of a raw cell into a typed field.
pub trait FromCell: Sized {
    /// Convert `value`, read from a column of kind `kind`.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] if the value does not fit the target type.
    fn from_cell(kind: ColumnKind, value: u32, info: &TableInfo) -> Result<Self>;
}

impl FromCell for u32 {
    fn from_cell(_: ColumnKind, value: u32, _: &TableInfo) -> Result<Self> {
        Ok(value)
    }
}

impl FromCell for u16 {
    fn from_cell(kind: ColumnKind, value: u32, _: &TableInfo) -> Result<Self> {
        u16::try_from(value)
            .map_err(|_| malformed_error!("Value 0x{:X} of {:?} column exceeds u16", value, kind))
    }
}

impl FromCell for u8 {
    fn from_cell(kind: ColumnKind, value: u32, _: &TableInfo) -> Result<Self> {
        u8::try_from(value)
            .map_err(|_| malformed_error!("Value 0x{:X} of {:?} column exceeds u8", value, kind))
    }
}

impl FromCell for CodedIndex {
    fn from_cell(kind: ColumnKind, value: u32, info: &TableInfo) -> Result<Self> {
        let ColumnKind::Coded(coded) = kind else {
            return Err(malformed_error!("{:?} column is not a coded index", kind));
        };

        let index = coded.decode(value)?;
        if index.row > info.rows(index.tag) {
            return Err(malformed_error!(
                "Coded index {:?} row {} exceeds the {} rows of {:?}",
                coded,
                index.row,
                info.rows(index.tag),
                index.tag
            ));
        }
        Ok(index)
    }
}

/// A row type that can be decoded from one row of its table.
pub trait RowReadable: Sized {
    /// Table this row type belongs to.
    const TABLE: TableId;
    /// Column layout, in storage order.
    const COLUMNS: &'static [ColumnKind];

    /// Decode the row `rid`, whose bytes start at `offset` within the tables stream.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] for out-of-range indices or invalid coded tags.
    fn read_row(cursor: &mut RowCursor<'_>, rid: u32, offset: usize) -> Result<Self>;
}

/// Generates a row struct and its [`RowReadable`] implementation from a column list.
///
/// Each row gets `rid`, `token` and `offset` fields followed by one field per column.
macro_rules! table_row {
    (
        $(#[$meta:meta])*
        $name:ident = $table:ident {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty = $kind:expr ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            /// 1-based row index
            pub rid: u32,
            /// Token of this row
            pub token: crate::metadata::token::Token,
            /// Byte offset of the row within the tables stream
            pub offset: usize,
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl crate::metadata::tables::types::RowReadable for $name {
            const TABLE: crate::metadata::tables::types::TableId =
                crate::metadata::tables::types::TableId::$table;
            const COLUMNS: &'static [crate::metadata::tables::types::ColumnKind] = &[$($kind),*];

            fn read_row(
                cursor: &mut crate::metadata::tables::types::RowCursor<'_>,
                rid: u32,
                offset: usize,
            ) -> crate::Result<Self> {
                Ok($name {
                    rid,
                    token: crate::metadata::tables::types::TableId::$table.token(rid),
                    offset,
                    $( $field: cursor.read::<$ty>()?, )*
                })
            }
        }
    };
}

/// A typed view over one table of an image.
pub struct MetadataTable<'a, T> {
    data: &'a [u8],
    base: usize,
    rows: u32,
    schema: &'a TableSchema,
    info: &'a TableInfo,
    _row: PhantomData<T>,
}

impl<'a, T: RowReadable> MetadataTable<'a, T> {
    /// Create a view. `data` is the whole tables stream, `base` the table's first byte.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] if the rows do not fit in `data`.
    pub fn new(
        data: &'a [u8],
        base: usize,
        rows: u32,
        schema: &'a TableSchema,
        info: &'a TableInfo,
    ) -> Result<Self> {
        let end = (rows as usize)
            .checked_mul(schema.row_size())
            .and_then(|size| size.checked_add(base));
        if end.map_or(true, |end| end > data.len()) {
            return Err(malformed_error!(
                "Table {:?} with {} rows exceeds the tables stream",
                T::TABLE,
                rows
            ));
        }

        Ok(MetadataTable {
            data,
            base,
            rows,
            schema,
            info,
            _row: PhantomData,
        })
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.rows
    }

    /// Size of one row in bytes.
    #[must_use]
    pub fn row_size(&self) -> usize {
        self.schema.row_size()
    }

    /// The schema this view reads with.
    #[must_use]
    pub fn schema(&self) -> &'a TableSchema {
        self.schema
    }

    /// Offset of row `rid` within the tables stream.
    #[must_use]
    pub fn row_offset(&self, rid: u32) -> usize {
        self.base + self.schema.row_size() * (rid as usize).saturating_sub(1)
    }

    /// Decode row `rid` (1-based).
    ///
    /// # Errors
    /// Returns [`Error::RowOutOfRange`] for `rid == 0` or `rid > row_count()` and
    /// [`crate::Error::BadImage`] for invalid cell values.
    pub fn get(&self, rid: u32) -> Result<T> {
        if rid == 0 || rid > self.rows {
            return Err(Error::RowOutOfRange {
                table: T::TABLE,
                rid,
                rows: self.rows,
            });
        }

        let offset = self.row_offset(rid);
        let row = &self.data[offset..offset + self.schema.row_size()];
        let mut cursor = RowCursor::new(row, self.schema, self.info);
        T::read_row(&mut cursor, rid, offset)
    }

    /// Decode the row a token points at, checking that it belongs to this table.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] for a token of another table, otherwise see
    /// [`MetadataTable::get`].
    pub fn get_by_token(&self, token: Token) -> Result<T> {
        if token.table() != T::TABLE as u8 {
            return Err(malformed_error!(
                "Token {} does not belong to table {:?}",
                token,
                T::TABLE
            ));
        }
        self.get(token.row())
    }

    /// Raw value of `column` in row `rid`, read at its schema offset.
    ///
    /// # Errors
    /// Returns [`Error::RowOutOfRange`] for an invalid row and [`crate::Error::BadImage`]
    /// for an invalid column.
    pub fn cell(&self, rid: u32, column: usize) -> Result<u32> {
        if rid == 0 || rid > self.rows {
            return Err(Error::RowOutOfRange {
                table: T::TABLE,
                rid,
                rows: self.rows,
            });
        }

        let (Some(offset), Some(width)) = (
            self.schema.column_offset(column),
            self.schema.column_width(column),
        ) else {
            return Err(malformed_error!("{:?} has no column {}", T::TABLE, column));
        };

        let mut position = self.row_offset(rid) + offset;
        match width {
            1 => Ok(u32::from(read_le_at::<u8>(self.data, &mut position)?)),
            2 => Ok(u32::from(read_le_at::<u16>(self.data, &mut position)?)),
            _ => read_le_at::<u32>(self.data, &mut position),
        }
    }

    /// Iterate over all rows in order.
    pub fn iter(&self) -> impl Iterator<Item = Result<T>> + '_ {
        (1..=self.rows).map(move |rid| self.get(rid))
    }

    /// Find the first row satisfying `predicate`.
    ///
    /// # Errors
    /// Propagates the first decoding error encountered.
    pub fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Result<Option<T>> {
        for row in self.iter() {
            let row = row?;
            if predicate(&row) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }
}
