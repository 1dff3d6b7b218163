//! Output strategies materializing accepted join rows.

use rowstore_result::Result;
use rowstore_storage::{BufferedTable, DataCell, DataRow, ExecutionContext, RowContainer, RowKey};

use crate::spec::{InputTable, JoinSpecification, ResultType};

/// Where matched and unmatched rows end up.
pub trait JoinOutput {
    type Tables;

    fn add_match(&mut self, key: RowKey, cells: Vec<DataCell>) -> Result<()>;

    /// `row` is the original input row; the strategy decides its layout.
    fn add_unmatched(&mut self, side: InputTable, key: RowKey, row: &DataRow) -> Result<()>;

    /// Move buffered rows out of memory.
    fn low_memory(&mut self) -> Result<()>;

    fn finish(self) -> Result<Self::Tables>;
}

/// Matches, left unmatched and right unmatched rows in separate tables.
pub struct SplitOutput {
    spec: JoinSpecification,
    matches: RowContainer,
    left_unmatched: RowContainer,
    right_unmatched: RowContainer,
}

impl SplitOutput {
    pub fn new(spec: &JoinSpecification, ctx: &dyn ExecutionContext) -> Self {
        Self {
            spec: spec.clone(),
            matches: ctx.create_container(spec.spec_for_match_table()),
            left_unmatched: ctx.create_container(spec.spec_for_unmatched(InputTable::Left)),
            right_unmatched: ctx.create_container(spec.spec_for_unmatched(InputTable::Right)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SplitTables {
    pub matches: BufferedTable,
    pub left_unmatched: BufferedTable,
    pub right_unmatched: BufferedTable,
}

impl SplitTables {
    /// The table of one partition; `None` for [`ResultType::All`].
    pub fn table(&self, result_type: ResultType) -> Option<&BufferedTable> {
        match result_type {
            ResultType::Matches => Some(&self.matches),
            ResultType::LeftOuter => Some(&self.left_unmatched),
            ResultType::RightOuter => Some(&self.right_unmatched),
            ResultType::All => None,
        }
    }
}

impl JoinOutput for SplitOutput {
    type Tables = SplitTables;

    fn add_match(&mut self, key: RowKey, cells: Vec<DataCell>) -> Result<()> {
        self.matches.add_row(DataRow::new(key, cells))
    }

    fn add_unmatched(&mut self, side: InputTable, key: RowKey, row: &DataRow) -> Result<()> {
        let cells = self.spec.settings(side).project(row);
        let container = match side {
            InputTable::Left => &mut self.left_unmatched,
            InputTable::Right => &mut self.right_unmatched,
        };
        container.add_row(DataRow::new(key, cells))
    }

    fn low_memory(&mut self) -> Result<()> {
        self.matches.spill()?;
        self.left_unmatched.spill()?;
        self.right_unmatched.spill()
    }

    fn finish(self) -> Result<SplitTables> {
        Ok(SplitTables {
            matches: self.matches.close()?,
            left_unmatched: self.left_unmatched.close()?,
            right_unmatched: self.right_unmatched.close()?,
        })
    }
}

/// All rows in one table with the match layout; unmatched rows are padded
/// with missing cells.
pub struct CombinedOutput {
    spec: JoinSpecification,
    rows: RowContainer,
}

impl CombinedOutput {
    pub fn new(spec: &JoinSpecification, ctx: &dyn ExecutionContext) -> Self {
        Self {
            spec: spec.clone(),
            rows: ctx.create_container(spec.spec_for_match_table()),
        }
    }
}

impl JoinOutput for CombinedOutput {
    type Tables = BufferedTable;

    fn add_match(&mut self, key: RowKey, cells: Vec<DataCell>) -> Result<()> {
        self.rows.add_row(DataRow::new(key, cells))
    }

    fn add_unmatched(&mut self, side: InputTable, key: RowKey, row: &DataRow) -> Result<()> {
        let cells = self.spec.padded_unmatched_cells(side, row);
        self.rows.add_row(DataRow::new(key, cells))
    }

    fn low_memory(&mut self) -> Result<()> {
        self.rows.spill()
    }

    fn finish(self) -> Result<BufferedTable> {
        self.rows.close()
    }
}
