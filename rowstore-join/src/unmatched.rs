//! Per-side policies for rows that found no join partner.

use roaring::RoaringTreemap;
use rowstore_result::Result;
use rowstore_storage::{
    BufferedTable, CancelChecker, CloseableRowIterator, DataRow, ExecutionContext,
};

/// Receives each unmatched row with its offset during collection.
pub type RowHandler<'a> = dyn FnMut(DataRow, u64) -> Result<()> + 'a;

/// Decides when unmatched rows of one side reach the output.
#[derive(Debug)]
pub enum UnmatchedRowCollector {
    PassThrough(PassThroughCollector),
    Deferred(DeferredCollector),
}

impl Default for UnmatchedRowCollector {
    fn default() -> Self {
        UnmatchedRowCollector::PassThrough(PassThroughCollector::default())
    }
}

impl UnmatchedRowCollector {
    pub fn pass_through() -> Self {
        Self::default()
    }

    pub fn deferred(table: BufferedTable) -> Self {
        UnmatchedRowCollector::Deferred(DeferredCollector::new(table, RoaringTreemap::new()))
    }

    /// Switch to deferred collection, keeping offsets matched so far.
    /// Returns `self` unchanged if already deferred.
    pub fn into_deferred(self, table: BufferedTable) -> Self {
        match self {
            UnmatchedRowCollector::PassThrough(p) => {
                UnmatchedRowCollector::Deferred(DeferredCollector::new(table, p.matched))
            }
            deferred @ UnmatchedRowCollector::Deferred(_) => deferred,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, UnmatchedRowCollector::Deferred(_))
    }

    /// The row at `offset` took part in a match.
    pub fn matched(&mut self, offset: u64) {
        match self {
            UnmatchedRowCollector::PassThrough(p) => {
                p.matched.insert(offset);
            }
            UnmatchedRowCollector::Deferred(d) => {
                d.matched.insert(offset);
            }
        }
    }

    /// Offer a row the join found no partner for. Returns whether the caller
    /// should output it now.
    pub fn unmatched(&mut self, _row: &DataRow, offset: u64) -> bool {
        match self {
            UnmatchedRowCollector::PassThrough(p) => !p.matched.contains(offset),
            UnmatchedRowCollector::Deferred(_) => false,
        }
    }

    /// Hand every deferred unmatched row to `handler`. Runs at most once.
    pub fn collect_unmatched(
        &mut self,
        ctx: &dyn ExecutionContext,
        handler: &mut RowHandler<'_>,
    ) -> Result<()> {
        match self {
            UnmatchedRowCollector::PassThrough(_) => Ok(()),
            UnmatchedRowCollector::Deferred(d) => d.collect(ctx, handler),
        }
    }

    /// Memory pressure hint. Matched offsets are compressed bitmaps and
    /// stay resident; nothing accepted is dropped.
    pub fn low_memory(&mut self) {
        let matched = match self {
            UnmatchedRowCollector::PassThrough(p) => &p.matched,
            UnmatchedRowCollector::Deferred(d) => &d.matched,
        };
        tracing::debug!(
            matched = matched.len(),
            bytes = matched.serialized_size(),
            "unmatched row collector: low memory"
        );
    }
}

/// Outputs unmatched rows right away unless they matched in an earlier pass.
#[derive(Debug, Default)]
pub struct PassThroughCollector {
    matched: RoaringTreemap,
}

/// Outputs unmatched rows only on collection, by scanning the side's table
/// for offsets never matched.
#[derive(Debug)]
pub struct DeferredCollector {
    table: BufferedTable,
    matched: RoaringTreemap,
    collected: bool,
}

impl DeferredCollector {
    fn new(table: BufferedTable, matched: RoaringTreemap) -> Self {
        Self {
            table,
            matched,
            collected: false,
        }
    }

    fn collect(&mut self, ctx: &dyn ExecutionContext, handler: &mut RowHandler<'_>) -> Result<()> {
        if self.collected {
            tracing::debug!("unmatched rows already collected");
            return Ok(());
        }
        self.collected = true;

        let mut checker = CancelChecker::periodic(ctx);
        let mut emitted = 0u64;
        let mut rows = self.table.iter()?;
        for (offset, row) in (0u64..).zip(rows.by_ref()) {
            checker.check()?;
            if !self.matched.contains(offset) {
                handler(row, offset)?;
                emitted += 1;
            }
        }
        rows.close();
        tracing::debug!(
            scanned = self.table.row_count(),
            emitted,
            "collected deferred unmatched rows"
        );
        Ok(())
    }
}
