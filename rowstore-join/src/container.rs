//! The join result container.
//!
//! A join algorithm drives the container from a single thread: it offers
//! matches and rows it could not match, and finally collects deferred
//! unmatched rows. The container marks matched offsets, drops duplicate
//! matches on request, and hands everything it accepts to a [`JoinOutput`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rowstore_result::{Error, Result};
use rowstore_storage::{DataRow, ExecutionContext, RowKey};

use crate::hilite::{HiliteMapping, RowKeyMapping};
use crate::offsets::RowOffsetCombinationSet;
use crate::output::{CombinedOutput, JoinOutput, SplitOutput};
use crate::spec::{InputTable, JoinSpecification, ResultType};
use crate::unmatched::UnmatchedRowCollector;

/// How output row keys are derived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowKeyStrategy {
    /// `left<sep>right`; the absent side of an unmatched row is `?`.
    Concatenate { separator: String },
    /// `Row0`, `Row1`, ... across all outputs.
    Sequential,
}

impl Default for RowKeyStrategy {
    fn default() -> Self {
        RowKeyStrategy::Concatenate {
            separator: "_".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct JoinContainerOptions {
    pub enable_hiliting: bool,
    pub row_keys: RowKeyStrategy,
}

impl JoinContainerOptions {
    pub fn with_hiliting(mut self, enable_hiliting: bool) -> Self {
        self.enable_hiliting = enable_hiliting;
        self
    }

    pub fn with_row_keys(mut self, row_keys: RowKeyStrategy) -> Self {
        self.row_keys = row_keys;
        self
    }
}

/// Sets the low-memory flag of a [`JoinContainer`] from any thread.
#[derive(Clone, Debug)]
pub struct LowMemoryHandle {
    flag: Arc<AtomicBool>,
}

impl LowMemoryHandle {
    pub fn signal(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

/// Key generation, hilite bookkeeping and the output strategy. Kept apart
/// from the collectors so a collector can feed it while being borrowed.
struct ResultSink<O> {
    spec: Arc<JoinSpecification>,
    output: O,
    row_keys: RowKeyStrategy,
    next_row: u64,
    hilite: Option<HiliteMapping>,
}

impl<O: JoinOutput> ResultSink<O> {
    fn output_key(&mut self, left: Option<&RowKey>, right: Option<&RowKey>) -> RowKey {
        match &self.row_keys {
            RowKeyStrategy::Concatenate { separator } => {
                let left = left.map_or("?", RowKey::as_str);
                let right = right.map_or("?", RowKey::as_str);
                RowKey::new(format!("{left}{separator}{right}"))
            }
            RowKeyStrategy::Sequential => {
                let key = RowKey::new(format!("Row{}", self.next_row));
                self.next_row += 1;
                key
            }
        }
    }

    fn add_match(&mut self, left: &DataRow, right: &DataRow) -> Result<()> {
        let key = self.output_key(Some(&left.key), Some(&right.key));
        let cells = self.spec.match_cells(left, right);
        self.output.add_match(key.clone(), cells)?;
        if let Some(hilite) = self.hilite.as_mut() {
            hilite.add(ResultType::Matches, key.clone(), InputTable::Left, left.key.clone());
            hilite.add(ResultType::Matches, key, InputTable::Right, right.key.clone());
        }
        Ok(())
    }

    fn add_unmatched(&mut self, side: InputTable, row: &DataRow) -> Result<()> {
        let key = match side {
            InputTable::Left => self.output_key(Some(&row.key), None),
            InputTable::Right => self.output_key(None, Some(&row.key)),
        };
        self.output.add_unmatched(side, key.clone(), row)?;
        if let Some(hilite) = self.hilite.as_mut() {
            hilite.add(side.unmatched_result_type(), key, side, row.key.clone());
        }
        Ok(())
    }
}

/// Result of [`JoinContainer::finish`].
#[derive(Debug)]
pub struct JoinResults<T> {
    pub tables: T,
    pub hilite: Option<HiliteMapping>,
}

pub struct JoinContainer<O: JoinOutput> {
    spec: Arc<JoinSpecification>,
    ctx: Arc<dyn ExecutionContext>,
    collectors: [UnmatchedRowCollector; 2],
    seen_matches: Option<RowOffsetCombinationSet>,
    low_memory: Arc<AtomicBool>,
    sink: ResultSink<O>,
}

impl JoinContainer<SplitOutput> {
    /// Container writing matches and unmatched rows to separate tables.
    pub fn split(
        spec: JoinSpecification,
        ctx: Arc<dyn ExecutionContext>,
        options: JoinContainerOptions,
    ) -> Result<Self> {
        let output = SplitOutput::new(&spec, ctx.as_ref());
        Self::new(spec, ctx, output, options)
    }
}

impl JoinContainer<CombinedOutput> {
    /// Container writing all rows to one table.
    pub fn combined(
        spec: JoinSpecification,
        ctx: Arc<dyn ExecutionContext>,
        options: JoinContainerOptions,
    ) -> Result<Self> {
        let output = CombinedOutput::new(&spec, ctx.as_ref());
        Self::new(spec, ctx, output, options)
    }
}

impl<O: JoinOutput> JoinContainer<O> {
    pub fn new(
        spec: JoinSpecification,
        ctx: Arc<dyn ExecutionContext>,
        output: O,
        options: JoinContainerOptions,
    ) -> Result<Self> {
        ctx.check_canceled()?;
        let spec = Arc::new(spec);
        Ok(Self {
            collectors: [
                UnmatchedRowCollector::pass_through(),
                UnmatchedRowCollector::pass_through(),
            ],
            seen_matches: None,
            low_memory: Arc::new(AtomicBool::new(false)),
            sink: ResultSink {
                spec: Arc::clone(&spec),
                output,
                row_keys: options.row_keys,
                next_row: 0,
                hilite: options.enable_hiliting.then(HiliteMapping::new),
            },
            spec,
            ctx,
        })
    }

    pub fn spec(&self) -> &JoinSpecification {
        &self.spec
    }

    /// Collect unmatched rows of `side` by scanning its table at the end
    /// instead of taking them as offered. Only applies if the side retains
    /// unmatched rows; offsets matched so far are kept.
    pub fn defer_unmatched_rows(&mut self, side: InputTable) -> Result<()> {
        let idx = side.index();
        if !self.spec.is_retain_unmatched(side) || self.collectors[idx].is_deferred() {
            return Ok(());
        }
        let table = self.spec.settings(side).table().cloned().ok_or_else(|| {
            Error::InvalidArgumentError(format!(
                "cannot defer unmatched {side} rows without a backing table"
            ))
        })?;
        let current = std::mem::take(&mut self.collectors[idx]);
        self.collectors[idx] = current.into_deferred(table);
        tracing::debug!(%side, "deferring unmatched rows");
        Ok(())
    }

    /// Reject matches whose offset pair was offered before. Idempotent; only
    /// affects offers made after the first call.
    pub fn deduplicate_matches(&mut self) {
        if self.seen_matches.is_none() {
            self.seen_matches = Some(RowOffsetCombinationSet::new());
        }
    }

    pub fn is_deduplicating(&self) -> bool {
        self.seen_matches.is_some()
    }

    pub fn offer_match(
        &mut self,
        left: &DataRow,
        left_offset: u64,
        right: &DataRow,
        right_offset: u64,
    ) -> Result<()> {
        self.handle_low_memory()?;
        // Checked first so a rejected offer changes nothing.
        let duplicate = match self.seen_matches.as_mut() {
            Some(seen) => !seen.put(left_offset, right_offset)?,
            None => false,
        };
        self.collectors[InputTable::Left.index()].matched(left_offset);
        self.collectors[InputTable::Right.index()].matched(right_offset);

        if duplicate || !self.spec.is_retain_matched() {
            return Ok(());
        }
        self.sink.add_match(left, right)
    }

    pub fn offer_left_outer(&mut self, row: &DataRow, offset: u64) -> Result<()> {
        self.offer_unmatched(InputTable::Left, row, offset)
    }

    pub fn offer_right_outer(&mut self, row: &DataRow, offset: u64) -> Result<()> {
        self.offer_unmatched(InputTable::Right, row, offset)
    }

    fn offer_unmatched(&mut self, side: InputTable, row: &DataRow, offset: u64) -> Result<()> {
        self.handle_low_memory()?;
        // The collector refuses rows matched in an earlier pass and rows it defers.
        let accepted = self.collectors[side.index()].unmatched(row, offset);
        if accepted && self.spec.is_retain_unmatched(side) {
            self.sink.add_unmatched(side, row)?;
        }
        Ok(())
    }

    /// Flush deferred unmatched rows of `side` into the output. A second call
    /// for the same side adds nothing.
    pub fn collect_unmatched_rows(&mut self, side: InputTable) -> Result<()> {
        self.handle_low_memory()?;
        let sink = &mut self.sink;
        self.collectors[side.index()].collect_unmatched(self.ctx.as_ref(), &mut |row, _offset| {
            sink.add_unmatched(side, &row)
        })
    }

    /// Collect the sides whose unmatched rows belong to `result_type` and are
    /// retained.
    pub fn collect_unmatched_rows_for(&mut self, result_type: ResultType) -> Result<()> {
        for side in InputTable::BOTH {
            if result_type.includes_unmatched(side) && self.spec.is_retain_unmatched(side) {
                self.collect_unmatched_rows(side)?;
            }
        }
        Ok(())
    }

    /// Record that `output` of `result_type` derives from `input` of `side`.
    /// No-op unless hiliting is enabled.
    pub fn add_hilite_mapping(
        &mut self,
        result_type: ResultType,
        output: RowKey,
        side: InputTable,
        input: RowKey,
    ) {
        if let Some(hilite) = self.sink.hilite.as_mut() {
            hilite.add(result_type, output, side, input);
        }
    }

    /// `None` when hiliting is disabled.
    pub fn hilite_mapping(
        &self,
        side: InputTable,
        result_type: ResultType,
    ) -> Option<RowKeyMapping> {
        self.sink.hilite.as_ref().map(|h| h.get(side, result_type))
    }

    /// Request shedding memory. Only sets a flag; the thread driving the
    /// container acts on it at its next offer or collection.
    pub fn low_memory(&self) {
        self.low_memory.store(true, Ordering::Release);
    }

    pub fn low_memory_handle(&self) -> LowMemoryHandle {
        LowMemoryHandle {
            flag: Arc::clone(&self.low_memory),
        }
    }

    fn handle_low_memory(&mut self) -> Result<()> {
        if !self.low_memory.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!("join container: low memory, spilling buffered output");
        for collector in &mut self.collectors {
            collector.low_memory();
        }
        self.sink.output.low_memory()
    }

    /// Collect every remaining deferred side and close the output.
    pub fn finish(mut self) -> Result<JoinResults<O::Tables>> {
        self.collect_unmatched_rows_for(ResultType::All)?;
        self.handle_low_memory()?;
        let ResultSink { output, hilite, .. } = self.sink;
        Ok(JoinResults {
            tables: output.finish()?,
            hilite,
        })
    }
}
