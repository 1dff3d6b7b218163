//! Row and schema types shared by the store, the iterators and the join
//! container.

use std::fmt;

use crate::cell::DataCell;

/// Identifier of a row. Unique within a table by convention, not enforced.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey(String);

impl RowKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RowKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A keyed row with one cell per column.
#[derive(Clone, Debug, PartialEq)]
pub struct DataRow {
    pub key: RowKey,
    pub cells: Vec<DataCell>,
}

impl DataRow {
    pub fn new(key: impl Into<RowKey>, cells: Vec<DataCell>) -> Self {
        Self {
            key: key.into(),
            cells,
        }
    }

    /// A row whose every cell is missing.
    pub fn missing(key: impl Into<RowKey>, num_cells: usize) -> Self {
        Self::new(key, vec![DataCell::Missing; num_cells])
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn cell(&self, idx: usize) -> Option<&DataCell> {
        self.cells.get(idx)
    }
}

/// A single column description.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnSpec {
    pub name: String,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Ordered column layout of a table. The column count is fixed for the
/// lifetime of the table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TableSpec {
    columns: Vec<ColumnSpec>,
}

impl TableSpec {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    /// Build a spec from column names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names.into_iter().map(ColumnSpec::new).collect())
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}
