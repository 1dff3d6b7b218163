//! Closeable row iteration over any table source.

use std::sync::Arc;

use crate::store::StoreRowIterator;
use crate::types::DataRow;

/// Row iterator that can release its resources before being exhausted.
///
/// `close` is idempotent. Implementations decide what a closed iterator
/// yields; in-memory ones simply end.
pub trait CloseableRowIterator: Iterator<Item = DataRow> + Send {
    fn close(&mut self);
}

impl CloseableRowIterator for StoreRowIterator {
    fn close(&mut self) {
        StoreRowIterator::close(self);
    }
}

impl<I: CloseableRowIterator + ?Sized> CloseableRowIterator for Box<I> {
    fn close(&mut self) {
        (**self).close();
    }
}

/// Adapts a plain iterator; closing drops the remaining rows.
pub struct WrappedRowIterator<I> {
    inner: Option<I>,
}

impl<I: Iterator<Item = DataRow>> Iterator for WrappedRowIterator<I> {
    type Item = DataRow;

    fn next(&mut self) -> Option<DataRow> {
        self.inner.as_mut()?.next()
    }
}

impl<I: Iterator<Item = DataRow> + Send> CloseableRowIterator for WrappedRowIterator<I> {
    fn close(&mut self) {
        self.inner = None;
    }
}

pub fn wrap<I: Iterator<Item = DataRow> + Send>(iter: I) -> WrappedRowIterator<I> {
    WrappedRowIterator { inner: Some(iter) }
}

pub fn empty() -> WrappedRowIterator<std::iter::Empty<DataRow>> {
    wrap(std::iter::empty())
}

/// Iterator over rows shared by an in-memory table.
#[derive(Debug)]
pub struct InMemoryRowIterator {
    rows: Arc<Vec<DataRow>>,
    pos: usize,
    closed: bool,
}

impl InMemoryRowIterator {
    pub fn new(rows: Arc<Vec<DataRow>>) -> Self {
        Self {
            rows,
            pos: 0,
            closed: false,
        }
    }
}

impl Iterator for InMemoryRowIterator {
    type Item = DataRow;

    fn next(&mut self) -> Option<DataRow> {
        if self.closed {
            return None;
        }
        let row = self.rows.get(self.pos)?.clone();
        self.pos += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = if self.closed {
            0
        } else {
            self.rows.len() - self.pos
        };
        (left, Some(left))
    }
}

impl CloseableRowIterator for InMemoryRowIterator {
    fn close(&mut self) {
        self.closed = true;
    }
}
