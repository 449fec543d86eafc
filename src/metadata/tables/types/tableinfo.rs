use strum::{EnumCount, IntoEnumIterator};

use crate::metadata::tables::types::{CodedIndexType, ColumnKind, TableId};

/// `HeapSizes` bit selecting 4-byte `#Strings` indices.
pub const HEAP_LARGE_STRINGS: u8 = 0x01;
/// `HeapSizes` bit selecting 4-byte `#GUID` indices.
pub const HEAP_LARGE_GUID: u8 = 0x02;
/// `HeapSizes` bit selecting 4-byte `#Blob` indices.
pub const HEAP_LARGE_BLOB: u8 = 0x04;

/// Row count of one table and the index width it implies.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct TableRowInfo {
    /// Number of rows
    pub rows: u32,
    /// Bits needed to hold the largest row index
    pub bits: u8,
    /// `true` if simple indices into this table take 4 bytes
    pub is_large: bool,
}

impl TableRowInfo {
    /// Derive the index width for a table with `rows` rows.
    #[must_use]
    pub fn new(rows: u32) -> Self {
        let bits = if rows == 0 {
            1
        } else {
            (u32::BITS - rows.leading_zeros()) as u8
        };

        Self {
            rows,
            bits,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// Row counts and index widths for one image's tables stream.
///
/// Everything a column layout depends on (the three heap flags and every table's row count)
/// is captured here once, before any row is read.
#[derive(Clone, Debug)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    coded_bytes: Vec<u8>,
    heap_sizes: u8,
}

impl TableInfo {
    /// Build from per-table row counts (indexed by [`TableId`]) and the `HeapSizes` byte.
    #[must_use]
    pub fn new(row_counts: &[u32], heap_sizes: u8) -> Self {
        let rows = TableId::iter()
            .map(|id| TableRowInfo::new(row_counts.get(id as usize).copied().unwrap_or(0)))
            .collect::<Vec<_>>();

        let mut info = TableInfo {
            rows,
            coded_bytes: vec![2; CodedIndexType::COUNT],
            heap_sizes,
        };

        for coded in CodedIndexType::iter() {
            let max_bits = coded
                .tables()
                .map(|table| info.rows[table as usize].bits)
                .max()
                .unwrap_or(1);
            info.coded_bytes[coded as usize] = if max_bits + coded.tag_bits() > 16 {
                4
            } else {
                2
            };
        }

        info
    }

    /// Row count of `table`.
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.rows[table as usize].rows
    }

    /// Row information of `table`.
    #[must_use]
    pub fn get(&self, table: TableId) -> &TableRowInfo {
        &self.rows[table as usize]
    }

    /// The raw `HeapSizes` byte.
    #[must_use]
    pub fn heap_sizes(&self) -> u8 {
        self.heap_sizes
    }

    /// Width of `#Strings` indices.
    #[must_use]
    pub fn str_bytes(&self) -> u8 {
        self.heap_bytes(HEAP_LARGE_STRINGS)
    }

    /// Width of `#GUID` indices.
    #[must_use]
    pub fn guid_bytes(&self) -> u8 {
        self.heap_bytes(HEAP_LARGE_GUID)
    }

    /// Width of `#Blob` indices.
    #[must_use]
    pub fn blob_bytes(&self) -> u8 {
        self.heap_bytes(HEAP_LARGE_BLOB)
    }

    fn heap_bytes(&self, flag: u8) -> u8 {
        if self.heap_sizes & flag != 0 {
            4
        } else {
            2
        }
    }

    /// Width of simple indices into `table`.
    #[must_use]
    pub fn table_index_bytes(&self, table: TableId) -> u8 {
        if self.rows[table as usize].is_large {
            4
        } else {
            2
        }
    }

    /// Width of `coded` indices.
    #[must_use]
    pub fn coded_index_bytes(&self, coded: CodedIndexType) -> u8 {
        self.coded_bytes[coded as usize]
    }

    /// Width of a column of the given kind.
    #[must_use]
    pub fn column_bytes(&self, kind: ColumnKind) -> u8 {
        match kind {
            ColumnKind::Fixed(width) => width,
            ColumnKind::Str => self.str_bytes(),
            ColumnKind::Guid => self.guid_bytes(),
            ColumnKind::Blob => self.blob_bytes(),
            ColumnKind::Index(table) => self.table_index_bytes(table),
            ColumnKind::Coded(coded) => self.coded_index_bytes(coded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(entries: &[(TableId, u32)]) -> Vec<u32> {
        let mut rows = vec![0; TableId::COUNT];
        for (table, count) in entries {
            rows[*table as usize] = *count;
        }
        rows
    }

    #[test]
    fn row_info() {
        assert_eq!(TableRowInfo::new(0).bits, 1);
        assert_eq!(TableRowInfo::new(1).bits, 1);
        assert_eq!(TableRowInfo::new(0x3FFF).bits, 14);
        assert!(!TableRowInfo::new(0xFFFF).is_large);
        assert!(TableRowInfo::new(0x10000).is_large);
    }

    #[test]
    fn heap_widths() {
        let info = TableInfo::new(&[], HEAP_LARGE_STRINGS | HEAP_LARGE_BLOB);
        assert_eq!(info.str_bytes(), 4);
        assert_eq!(info.guid_bytes(), 2);
        assert_eq!(info.blob_bytes(), 4);
    }

    #[test]
    fn coded_width_follows_largest_candidate() {
        // TypeDefOrRef has 2 tag bits, so 2^14 rows is the first count needing 4 bytes
        let small = TableInfo::new(&counts(&[(TableId::TypeRef, 0x3FFF)]), 0);
        assert_eq!(small.coded_index_bytes(CodedIndexType::TypeDefOrRef), 2);

        let large = TableInfo::new(&counts(&[(TableId::TypeRef, 0x4000)]), 0);
        assert_eq!(large.coded_index_bytes(CodedIndexType::TypeDefOrRef), 4);
        assert_eq!(large.coded_index_bytes(CodedIndexType::HasFieldMarshal), 2);
        assert_eq!(large.table_index_bytes(TableId::TypeRef), 2);
    }

    #[test]
    fn simple_index_crosses_65536() {
        let below = TableInfo::new(&counts(&[(TableId::Field, 0xFFFF)]), 0);
        let above = TableInfo::new(&counts(&[(TableId::Field, 0x1_0000)]), 0);
        assert_eq!(below.column_bytes(ColumnKind::Index(TableId::Field)), 2);
        assert_eq!(above.column_bytes(ColumnKind::Index(TableId::Field)), 4);
        assert_eq!(
            above.column_bytes(ColumnKind::Coded(CodedIndexType::HasConstant)),
            4
        );
    }
}
