use strum::{EnumCount, IntoEnumIterator};
use tracing::{debug, trace};

use crate::{
    file::io::read_le_at,
    metadata::tables::{MetadataTable, RowReadable, TableId, TableInfo, TableSchema},
    Result,
};

/// `HeapSizes` bit announcing an extra dword after the row counts.
const HEAP_EXTRA_DATA: u8 = 0x40;

/// Where one present table lives and how its rows are laid out.
#[derive(Debug, Clone)]
struct TableLocation {
    offset: usize,
    rows: u32,
    schema: TableSchema,
}

/// The tables stream header (`#~` or `#-`, ECMA-335 II.24.2.6).
///
/// Parsing computes every present table's [`TableSchema`] and base offset up front. Row
/// access afterwards is a multiplication and a bounds check.
///
/// # Examples
///
/// ```rust,ignore
/// use dotvtable::metadata::tables::TypeDefRaw;
///
/// let header = TablesHeader::from(tables_stream)?;
/// let typedefs = header.table::<TypeDefRaw>().unwrap();
/// let first = typedefs.get(1)?;
/// ```
pub struct TablesHeader<'a> {
    /// Major schema version, 2 for every current image
    pub major_version: u8,
    /// Minor schema version
    pub minor_version: u8,
    /// Presence bitmask
    pub valid: u64,
    /// Sorted bitmask
    pub sorted: u64,
    /// Row counts and index widths
    pub info: TableInfo,
    data: &'a [u8],
    tables: Vec<Option<TableLocation>>,
}

impl<'a> TablesHeader<'a> {
    /// Parse the header at the start of `data`, the tables stream.
    ///
    /// # Errors
    /// Returns [`crate::Error::BadImage`] if presence bits name tables outside
    /// `0x00..=0x2C`, or if the row data of the present tables does not fit the stream.
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        if data.len() < 24 {
            return Err(malformed_error!("Tables stream header is truncated"));
        }

        let mut offset = 4;
        let major_version = read_le_at::<u8>(data, &mut offset)?;
        let minor_version = read_le_at::<u8>(data, &mut offset)?;
        let heap_sizes = read_le_at::<u8>(data, &mut offset)?;
        offset += 1;
        let valid = read_le_at::<u64>(data, &mut offset)?;
        let sorted = read_le_at::<u64>(data, &mut offset)?;

        if valid & !TableId::VALID_MASK != 0 {
            return Err(malformed_error!(
                "Tables presence mask 0x{:016X} names unknown tables",
                valid
            ));
        }

        let mut row_counts = vec![0u32; TableId::COUNT];
        for table in TableId::iter() {
            if valid & (1u64 << table as u8) != 0 {
                row_counts[table as usize] = read_le_at::<u32>(data, &mut offset)?;
            }
        }

        if heap_sizes & HEAP_EXTRA_DATA != 0 {
            offset += 4;
        }

        let info = TableInfo::new(&row_counts, heap_sizes);

        let mut tables = vec![None; TableId::COUNT];
        for table in TableId::iter() {
            let rows = row_counts[table as usize];
            if valid & (1u64 << table as u8) == 0 {
                continue;
            }

            let schema = TableSchema::new(table.columns(), &info);
            let size = (rows as usize)
                .checked_mul(schema.row_size())
                .ok_or_else(|| malformed_error!("Table {:?} size overflows", table))?;
            if offset.checked_add(size).map_or(true, |end| end > data.len()) {
                return Err(malformed_error!(
                    "Table {:?} ({} rows of {} bytes at 0x{:X}) exceeds the tables stream (0x{:X})",
                    table,
                    rows,
                    schema.row_size(),
                    offset,
                    data.len()
                ));
            }

            trace!(?table, rows, row_size = schema.row_size(), offset, "table layout");
            tables[table as usize] = Some(TableLocation {
                offset,
                rows,
                schema,
            });
            offset += size;
        }

        debug!(
            tables = valid.count_ones(),
            heap_sizes,
            "tables stream header"
        );

        Ok(TablesHeader {
            major_version,
            minor_version,
            valid,
            sorted,
            info,
            data,
            tables,
        })
    }

    /// Number of tables present.
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }

    /// Returns `true` if the presence mask includes `table`.
    #[must_use]
    pub fn has_table(&self, table: TableId) -> bool {
        self.tables[table as usize].is_some()
    }

    /// Row count of `table`, zero if absent.
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.info.rows(table)
    }

    /// Returns `true` if the sorted mask includes `table`.
    #[must_use]
    pub fn is_sorted(&self, table: TableId) -> bool {
        self.sorted & (1u64 << table as u8) != 0
    }

    /// Typed view over the table of `T`, if present.
    #[must_use]
    pub fn table<T: RowReadable>(&self) -> Option<MetadataTable<'_, T>> {
        let location = self.tables[T::TABLE as usize].as_ref()?;
        MetadataTable::new(
            self.data,
            location.offset,
            location.rows,
            &location.schema,
            &self.info,
        )
        .ok()
    }

    /// Schema of `table`, if present.
    #[must_use]
    pub fn schema(&self, table: TableId) -> Option<&TableSchema> {
        self.tables[table as usize]
            .as_ref()
            .map(|location| &location.schema)
    }
}
