use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rowstore_result::{Error, Result};

use super::TableStore;
use crate::cell::DataCell;
use crate::codecs::{read_block, read_control_byte};
use crate::compression::open_reader;
use crate::constants::{BYTE_ROW_SEPARATOR, NO_KEY_ROW_KEY, READ_FAILED_KEY_PREFIX};
use crate::types::{DataRow, RowKey};

/// Mutable cursor state, guarded by one lock so that a close from another
/// thread never observes a half-read row.
struct IterState {
    /// `None` once closed.
    stream: Option<Box<dyn Read + Send>>,
    pointer: u64,
    warned_closed_access: bool,
    has_logged_read_failure: bool,
    block: Vec<u8>,
}

impl IterState {
    /// Returns whether this call closed the stream.
    fn close(&mut self) -> bool {
        self.stream.take().is_some()
    }

    fn report_read_failure(&mut self, file: &Path, err: &Error) {
        let row = self.pointer + 1;
        let file = file.display();
        if self.has_logged_read_failure {
            tracing::debug!(row, %file, error = %err, "errors while reading row");
        } else {
            tracing::error!(
                row,
                %file,
                error = %err,
                "errors while reading row; suppressing further warnings"
            );
        }
        if !err.is_io_failure() {
            if self.has_logged_read_failure {
                tracing::debug!(error = %err, "cell decoder failed with a non-I/O error");
            } else {
                tracing::warn!(
                    error = %err,
                    "cell decoder failed with a non-I/O error; only I/O or corruption is allowed"
                );
            }
        }
        self.has_logged_read_failure = true;
    }

    fn closed_row(&mut self, num_columns: usize) -> DataRow {
        if !self.warned_closed_access {
            tracing::warn!("invalid access on table, iterator has been closed");
            self.warned_closed_access = true;
        }
        let key = format!("INVALID_ROW (table is closed) - (Row {})", self.pointer);
        self.pointer += 1;
        DataRow::missing(key, num_columns)
    }

    fn read_key(&mut self, store: &TableStore) -> Result<RowKey> {
        if !store.persists_row_keys() {
            return Ok(RowKey::from(NO_KEY_ROW_KEY));
        }
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::Internal("stream closed mid-row".into()))?;
        read_block(stream.as_mut(), &mut self.block)?;
        let key = std::str::from_utf8(&self.block).map_err(Error::corrupt)?;
        Ok(RowKey::new(key))
    }

    fn read_cell(&mut self, store: &TableStore) -> Result<DataCell> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::Internal("stream closed mid-row".into()))?;
        read_block(stream.as_mut(), &mut self.block)?;
        store.decoder().decode_cell(&self.block)
    }

    fn read_separator(&mut self) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::Internal("stream closed mid-row".into()))?;
        match read_control_byte(stream.as_mut())? {
            BYTE_ROW_SEPARATOR => Ok(()),
            other => Err(Error::Corrupt(format!(
                "expected end of row byte, got 0x{other:02x}"
            ))),
        }
    }

    fn read_row(&mut self, store: &TableStore) -> DataRow {
        let key = self.read_key(store).unwrap_or_else(|err| {
            self.report_read_failure(store.path(), &err);
            RowKey::new(format!("{READ_FAILED_KEY_PREFIX}{}", self.pointer))
        });
        let num_columns = store.spec().num_columns();
        let mut cells = Vec::with_capacity(num_columns);
        for _ in 0..num_columns {
            let cell = self.read_cell(store).unwrap_or_else(|err| {
                self.report_read_failure(store.path(), &err);
                DataCell::Missing
            });
            cells.push(cell);
        }
        if let Err(err) = self.read_separator() {
            self.report_read_failure(store.path(), &err);
        }
        self.pointer += 1;
        DataRow { key, cells }
    }
}

fn lock(state: &Mutex<IterState>) -> MutexGuard<'_, IterState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Forward-only cursor over a [`TableStore`].
///
/// The iterator closes itself when the last row has been read; an explicit
/// [`StoreRowIterator::close`] is idempotent. After close, remaining rows come
/// back all-missing with an `INVALID_ROW` key instead of failing. Individual
/// row or cell read failures are recovered with synthetic data and logged.
pub struct StoreRowIterator {
    store: TableStore,
    state: Arc<Mutex<IterState>>,
}

impl StoreRowIterator {
    pub(crate) fn new(store: TableStore) -> Result<Self> {
        let stream = if store.row_count() == 0 {
            None
        } else {
            Some(open_reader(store.path(), store.compression())?)
        };
        Ok(Self {
            store,
            state: Arc::new(Mutex::new(IterState {
                stream,
                pointer: 0,
                warned_closed_access: false,
                has_logged_read_failure: false,
                block: Vec::new(),
            })),
        })
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    /// Whether rows remain, closed or not. Reaching the end closes the stream.
    pub fn has_next(&self) -> bool {
        let mut state = lock(&self.state);
        let has_next = state.pointer < self.store.row_count();
        if !has_next {
            state.close();
        }
        has_next
    }

    /// The next row, or [`Error::EndOfTable`] past the last one.
    pub fn next_row(&mut self) -> Result<DataRow> {
        let mut state = lock(&self.state);
        let row_count = self.store.row_count();
        if state.pointer >= row_count {
            state.close();
            return Err(Error::EndOfTable);
        }
        if state.stream.is_none() {
            return Ok(state.closed_row(self.store.spec().num_columns()));
        }
        let row = state.read_row(&self.store);
        if state.pointer >= row_count {
            state.close();
        }
        Ok(row)
    }

    /// Close the stream. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        lock(&self.state).close()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).stream.is_none()
    }

    /// Zero-based index of the next row.
    pub fn position(&self) -> u64 {
        lock(&self.state).pointer
    }

    /// A handle that can close this iterator from another thread.
    pub fn close_handle(&self) -> IteratorCloseHandle {
        IteratorCloseHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Iterator for StoreRowIterator {
    type Item = DataRow;

    fn next(&mut self) -> Option<DataRow> {
        self.next_row().ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.store.row_count().saturating_sub(self.position());
        let left = usize::try_from(left).unwrap_or(usize::MAX);
        (left, Some(left))
    }
}

impl Drop for StoreRowIterator {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        if state.close() {
            tracing::debug!(
                path = %self.store.path().display(),
                position = state.pointer,
                rows = self.store.row_count(),
                "row iterator dropped while still open; closed it"
            );
        }
    }
}

/// Closes a [`StoreRowIterator`] from any thread.
#[derive(Clone)]
pub struct IteratorCloseHandle {
    state: Arc<Mutex<IterState>>,
}

impl IteratorCloseHandle {
    /// Returns `false` if the iterator was already closed.
    pub fn close(&self) -> bool {
        lock(&self.state).close()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).stream.is_none()
    }
}

impl std::fmt::Debug for IteratorCloseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IteratorCloseHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}
