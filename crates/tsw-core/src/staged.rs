//! Staged tables.
//!
//! Incoming arrays are converted column by column into typed store buffers.
//! A staged table is built, turned into exactly one [`PushBatch`] that
//! borrows its buffers, and then cleared.

use std::collections::BTreeMap;

use tsw_common::{Error, Result};
use tsw_convert::convert::{column_to_masked, Convert, IntoPrimitive};
use tsw_convert::dtype::{Datetime64NsDtype, Dtype};
use tsw_convert::{
    by_column_type, by_dtype, Array, ColumnVisitor, DtypeVisitor, MaskedArray, Primitive,
    PrimitiveColumn, TimeRange, Timespec,
};

use crate::batch::{
    BatchColumn, ColumnData, DedupColumns, DeduplicationOptions, PushBatch, PushMode,
};
use crate::store::{ColumnInfo, Table};
use crate::writer::WriterData;

/// Converts a masked array into the buffer of the selected primitive.
struct StageColumn<'a>(&'a MaskedArray);

impl DtypeVisitor for StageColumn<'_> {
    type Output = PrimitiveColumn;

    fn visit<D, P>(self) -> Result<PrimitiveColumn>
    where
        D: IntoPrimitive<P>,
        P: Primitive,
    {
        Ok(P::into_column(D::into_primitive(self.0)?))
    }
}

/// `len` null values of the column's primitive.
struct NullColumn(usize);

impl ColumnVisitor for NullColumn {
    type Output = PrimitiveColumn;

    fn visit<P: Primitive>(self) -> PrimitiveColumn {
        P::into_column(vec![P::null_value(); self.0])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagedColumn {
    pub info: ColumnInfo,
    pub values: PrimitiveColumn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagedTable {
    name: String,
    index: Vec<Timespec>,
    columns: Vec<StagedColumn>,
}

impl StagedTable {
    /// An empty buffer for every declared column.
    pub fn new(table: &Table) -> Self {
        let columns = table
            .columns()
            .iter()
            .map(|info| StagedColumn {
                info: info.clone(),
                values: by_column_type(info.column_type, NullColumn(0)),
            })
            .collect();
        StagedTable {
            name: table.name().to_string(),
            index: Vec::new(),
            columns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> &[Timespec] {
        &self.index
    }

    pub fn columns(&self) -> &[StagedColumn] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.index.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty() && self.columns.iter().all(|c| c.values.is_empty())
    }

    /// Stage the timestamps. Only datetime64[ns] arrays without NaT are accepted.
    pub fn set_index(&mut self, index: &Array) -> Result<()> {
        let nanos = Datetime64NsDtype::expect_units(index)?;
        let mut staged = Vec::with_capacity(nanos.len());
        for (row, ns) in nanos.iter().enumerate() {
            let ts = Convert::<Timespec>::convert(ns);
            if ts.is_null() {
                return Err(Error::InvalidArgument(format!(
                    "index of table '{}' contains NaT at row {row}",
                    self.name
                )));
            }
            staged.push(ts);
        }
        self.index = staged;
        Ok(())
    }

    fn column_mut(&mut self, column: usize) -> Result<&mut StagedColumn> {
        let count = self.columns.len();
        self.columns.get_mut(column).ok_or(Error::ColumnOutOfBounds {
            index: column,
            count,
        })
    }

    /// Convert `data` into buffer `column`. Its length must match the index.
    pub fn set_column(&mut self, column: usize, data: &MaskedArray) -> Result<()> {
        let rows = self.index.len();
        let table = self.name.clone();
        let target = self.column_mut(column)?;
        if data.len() != rows {
            return Err(Error::LengthMismatch {
                what: format!("column '{}' of table '{table}'", target.info.name),
                expected: rows,
                actual: data.len(),
            });
        }
        tracing::trace!(
            table = %table,
            column = %target.info.name,
            dtype = %data.dtype(),
            probe = ?data.probe(),
            "staging column"
        );
        target.values = by_dtype(data.dtype(), target.info.column_type, StageColumn(data))?;
        Ok(())
    }

    /// Fill buffer `column` with nulls, one per indexed row.
    pub fn set_null_column(&mut self, column: usize) -> Result<()> {
        let rows = self.index.len();
        let target = self.column_mut(column)?;
        target.values = by_column_type(target.info.column_type, NullColumn(rows));
        Ok(())
    }

    /// Read buffer `column` back as a masked array.
    pub fn column_as_masked(&self, column: usize) -> Result<MaskedArray> {
        let staged = self.columns.get(column).ok_or(Error::ColumnOutOfBounds {
            index: column,
            count: self.columns.len(),
        })?;
        column_to_masked(&staged.values)
    }

    /// `[min, max + 1ns)` over the index, or `None` when nothing is indexed.
    pub fn time_range(&self) -> Option<TimeRange> {
        let begin = self.index.iter().min()?;
        let last = self.index.iter().max()?;
        Some(TimeRange::new(*begin, last.next_tick()))
    }

    /// Describe the staged buffers as a batch without copying them.
    ///
    /// Truncate ranges are only attached in truncate mode, where at least
    /// one is required.
    pub fn prepare_batch<'a>(
        &'a self,
        mode: PushMode,
        deduplication: &DeduplicationOptions,
        truncate_ranges: &[TimeRange],
    ) -> Result<PushBatch<'a>> {
        if self.columns.is_empty() {
            return Err(Error::EmptyBatch {
                table: self.name.clone(),
            });
        }

        let rows = self.index.len();
        let mut columns = Vec::with_capacity(self.columns.len());
        for staged in &self.columns {
            if staged.values.len() != rows {
                return Err(Error::LengthMismatch {
                    what: format!("column '{}' of table '{}'", staged.info.name, self.name),
                    expected: rows,
                    actual: staged.values.len(),
                });
            }
            columns.push(BatchColumn {
                name: staged.info.name.as_str(),
                data_type: staged.info.column_type.wire_type(),
                data: ColumnData::from(&staged.values),
            });
        }

        let (deduplication_mode, where_duplicate) = match &deduplication.columns {
            DedupColumns::Disabled => (None, None),
            DedupColumns::All => (Some(deduplication.mode), None),
            DedupColumns::Columns(names) => {
                let borrowed = names
                    .iter()
                    .map(|name| self.column_name(name))
                    .collect::<Result<Vec<&'a str>>>()?;
                (Some(deduplication.mode), Some(borrowed))
            }
        };

        let truncate_ranges = match mode {
            PushMode::Truncate if truncate_ranges.is_empty() => {
                return Err(Error::InvalidArgument(format!(
                    "truncate push of table '{}' needs a range",
                    self.name
                )));
            }
            PushMode::Truncate => truncate_ranges.to_vec(),
            _ => Vec::new(),
        };

        Ok(PushBatch {
            name: self.name.as_str(),
            timestamps: &self.index,
            columns,
            truncate_ranges,
            deduplication_mode,
            where_duplicate,
        })
    }

    fn column_name(&self, name: &str) -> Result<&str> {
        self.columns
            .iter()
            .find(|c| c.info.name == name)
            .map(|c| c.info.name.as_str())
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "deduplication column '{name}' does not exist in table '{}'",
                    self.name
                ))
            })
    }

    /// Drop all buffers and column metadata.
    pub fn clear(&mut self) {
        self.index.clear();
        self.columns.clear();
    }
}

/// Staged tables of one push, ordered by table name.
#[derive(Debug, Default)]
pub struct StagedTables {
    tables: BTreeMap<String, StagedTable>,
}

impl StagedTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, table: &Table) -> &mut StagedTable {
        self.tables
            .entry(table.name().to_string())
            .or_insert_with(|| StagedTable::new(table))
    }

    pub fn get(&self, name: &str) -> Option<&StagedTable> {
        self.tables.get(name)
    }

    pub fn first(&self) -> Option<&StagedTable> {
        self.tables.values().next()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StagedTable> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Stage every table of `data`. Columns without data become null columns.
    pub fn index(&mut self, data: &WriterData) -> Result<()> {
        for entry in data.iter() {
            let staged = self.get_or_create(entry.table());
            staged.set_index(entry.index())?;
            for (column, values) in entry.columns().iter().enumerate() {
                match values {
                    Some(values) => staged.set_column(column, values)?,
                    None => staged.set_null_column(column)?,
                }
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        for table in self.tables.values_mut() {
            table.clear();
        }
        self.tables.clear();
    }
}
