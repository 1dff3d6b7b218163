//! Join specification: per-side settings and output table layouts.

use std::fmt;

use rowstore_result::{Error, Result};
use rowstore_storage::{BufferedTable, ColumnSpec, DataCell, DataRow, TableSpec};
use rustc_hash::FxHashSet;

/// One of the two join inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputTable {
    Left,
    Right,
}

impl InputTable {
    pub const BOTH: [InputTable; 2] = [InputTable::Left, InputTable::Right];

    #[inline]
    pub fn is_left(self) -> bool {
        matches!(self, InputTable::Left)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            InputTable::Left => 0,
            InputTable::Right => 1,
        }
    }

    /// Result type holding this side's unmatched rows.
    pub fn unmatched_result_type(self) -> ResultType {
        match self {
            InputTable::Left => ResultType::LeftOuter,
            InputTable::Right => ResultType::RightOuter,
        }
    }
}

impl fmt::Display for InputTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputTable::Left => write!(f, "LEFT"),
            InputTable::Right => write!(f, "RIGHT"),
        }
    }
}

/// Partition of a join result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultType {
    /// Rows combining a left and a right row.
    Matches,
    /// Unmatched left rows.
    LeftOuter,
    /// Unmatched right rows.
    RightOuter,
    /// Union of the three partitions above.
    All,
}

impl ResultType {
    /// Whether unmatched rows of `side` belong to this result.
    pub fn includes_unmatched(self, side: InputTable) -> bool {
        self == ResultType::All || self == side.unmatched_result_type()
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultType::Matches => write!(f, "MATCHES"),
            ResultType::LeftOuter => write!(f, "LEFT_OUTER"),
            ResultType::RightOuter => write!(f, "RIGHT_OUTER"),
            ResultType::All => write!(f, "ALL"),
        }
    }
}

/// Settings of one join input.
#[derive(Clone, Debug)]
pub struct JoinTableSettings {
    spec: TableSpec,
    retain_unmatched: bool,
    table: Option<BufferedTable>,
    included_columns: Vec<usize>,
}

impl JoinTableSettings {
    /// All columns included, unmatched rows dropped.
    pub fn new(spec: TableSpec) -> Self {
        let included_columns = (0..spec.num_columns()).collect();
        Self {
            spec,
            retain_unmatched: false,
            table: None,
            included_columns,
        }
    }

    /// Settings for an existing table, which deferred collection can scan.
    pub fn for_table(table: BufferedTable) -> Self {
        let mut settings = Self::new(table.spec().clone());
        settings.table = Some(table);
        settings
    }

    pub fn with_retain_unmatched(mut self, retain_unmatched: bool) -> Self {
        self.retain_unmatched = retain_unmatched;
        self
    }

    /// Restrict the output to `columns`, in that order.
    pub fn with_included_columns(mut self, columns: Vec<usize>) -> Result<Self> {
        if let Some(bad) = columns.iter().find(|&&c| c >= self.spec.num_columns()) {
            return Err(Error::InvalidArgumentError(format!(
                "column index {bad} out of range for {} columns",
                self.spec.num_columns()
            )));
        }
        self.included_columns = columns;
        Ok(self)
    }

    /// Include the columns with these names, in that order.
    pub fn with_included_column_names<'a>(
        self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let columns = names
            .into_iter()
            .map(|name| {
                self.spec
                    .find_column(name)
                    .ok_or_else(|| Error::NotFound(format!("column '{name}'")))
            })
            .collect::<Result<Vec<_>>>()?;
        self.with_included_columns(columns)
    }

    pub fn spec(&self) -> &TableSpec {
        &self.spec
    }

    pub fn is_retain_unmatched(&self) -> bool {
        self.retain_unmatched
    }

    pub fn table(&self) -> Option<&BufferedTable> {
        self.table.as_ref()
    }

    pub fn included_columns(&self) -> &[usize] {
        &self.included_columns
    }

    fn included_names(&self) -> impl Iterator<Item = &str> {
        self.included_columns
            .iter()
            .map(|&c| self.spec.columns()[c].name.as_str())
    }

    /// The included cells of `row`; cells beyond the row's width are missing.
    pub fn project(&self, row: &DataRow) -> Vec<DataCell> {
        self.included_columns
            .iter()
            .map(|&c| row.cell(c).cloned().unwrap_or(DataCell::Missing))
            .collect()
    }
}

/// What to join and which partitions to keep.
#[derive(Clone, Debug)]
pub struct JoinSpecification {
    left: JoinTableSettings,
    right: JoinTableSettings,
    retain_matched: bool,
}

impl JoinSpecification {
    /// Keeps matches; unmatched retention comes from the side settings.
    pub fn new(left: JoinTableSettings, right: JoinTableSettings) -> Self {
        Self {
            left,
            right,
            retain_matched: true,
        }
    }

    pub fn with_retain_matched(mut self, retain_matched: bool) -> Self {
        self.retain_matched = retain_matched;
        self
    }

    pub fn settings(&self, side: InputTable) -> &JoinTableSettings {
        match side {
            InputTable::Left => &self.left,
            InputTable::Right => &self.right,
        }
    }

    pub fn is_retain_matched(&self) -> bool {
        self.retain_matched
    }

    pub fn is_retain_unmatched(&self, side: InputTable) -> bool {
        self.settings(side).is_retain_unmatched()
    }

    /// Included left columns followed by included right columns. A name that
    /// is already taken gets the first free `_1`, `_2`, ... suffix.
    pub fn spec_for_match_table(&self) -> TableSpec {
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut columns = Vec::new();
        for name in self.left.included_names().chain(self.right.included_names()) {
            let mut unique = name.to_string();
            let mut suffix = 1;
            while seen.contains(&unique) {
                unique = format!("{name}_{suffix}");
                suffix += 1;
            }
            seen.insert(unique.clone());
            columns.push(ColumnSpec::new(unique));
        }
        TableSpec::new(columns)
    }

    /// Included columns of `side`.
    pub fn spec_for_unmatched(&self, side: InputTable) -> TableSpec {
        TableSpec::from_names(self.settings(side).included_names())
    }

    /// Cells of the match row combining `left` and `right`.
    pub fn match_cells(&self, left: &DataRow, right: &DataRow) -> Vec<DataCell> {
        let mut cells = self.left.project(left);
        cells.extend(self.right.project(right));
        cells
    }

    /// Cells of an unmatched `side` row laid out like a match row, with the
    /// other side's columns missing.
    pub fn padded_unmatched_cells(&self, side: InputTable, row: &DataRow) -> Vec<DataCell> {
        let left_width = self.left.included_columns.len();
        let right_width = self.right.included_columns.len();
        match side {
            InputTable::Left => {
                let mut cells = self.left.project(row);
                cells.resize(left_width + right_width, DataCell::Missing);
                cells
            }
            InputTable::Right => {
                let mut cells = vec![DataCell::Missing; left_width];
                cells.extend(self.right.project(row));
                cells
            }
        }
    }
}
