use std::{fmt, io};
use thiserror::Error;

/// Unified error type for all rowstore operations.
///
/// This enum covers every failure mode of the stack, from a truncated table
/// file to a user cancellation requested while unmatched join rows are being
/// collected.
///
/// # Error Handling Strategy
///
/// Errors propagate upward with `?`. The row iterator is the one place that
/// deliberately swallows errors: a failure on an individual row or cell is
/// logged and replaced by synthetic missing data (see
/// [`Error::is_io_failure`]). Cancellation is never swallowed.
///
/// # Thread Safety
///
/// `Error` implements `Send` and `Sync`, so errors can cross the boundary
/// between a join thread and a memory-pressure monitor.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations.
    ///
    /// Wraps standard library I/O errors raised while:
    /// - Creating or opening a table store file or its metadata sidecar
    /// - Reading or writing blob side-files
    /// - Hitting an unexpected end of stream in the middle of a row
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Bytes read from a store do not form a valid encoding.
    ///
    /// Raised for unknown control or type bytes, invalid UTF-8 in row keys,
    /// blocks whose payload length disagrees with the decoded content, or a
    /// missing row separator. Treated like an I/O failure by row iterators.
    #[error("corrupt table data: {0}")]
    Corrupt(String),

    /// The store was written with a format version this crate cannot read.
    #[error("unsupported table format version {0}")]
    UnsupportedVersion(u32),

    /// Invalid user input or API parameter.
    ///
    /// Examples:
    /// - A row whose cell count differs from the table's column count
    /// - Row offsets that do not fit the packed 32-bit representation
    /// - A file-store cell without keys, or with several keys in a legacy store
    /// - Deferring unmatched rows for a side without a backing table
    #[error("Invalid argument: {0}")]
    InvalidArgumentError(String),

    /// Storage entity not found (file store key, blob side-file, type id).
    #[error("not found: {0}")]
    NotFound(String),

    /// An iterator was advanced past the declared row count.
    #[error("iterator at end of table")]
    EndOfTable,

    /// The execution context requested a cooperative abort.
    ///
    /// Aborts the current scan or collection and propagates unchanged to the
    /// caller; no retry is attempted.
    #[error("execution canceled")]
    Canceled,

    /// Internal error indicating a bug or unexpected state.
    ///
    /// Also used by cell codecs to report a failure that is not an I/O
    /// problem; row readers flag those as coding-contract violations.
    #[error("An internal operation failed: {0}")]
    Internal(String),
}

impl Error {
    /// Create a corruption error from any displayable value.
    #[inline]
    pub fn corrupt<E: fmt::Display>(err: E) -> Self {
        Error::Corrupt(err.to_string())
    }

    /// Create an internal error from any displayable value.
    #[inline]
    pub fn internal<E: fmt::Display>(err: E) -> Self {
        Error::Internal(err.to_string())
    }

    /// Whether this is a structural failure of the underlying bytes.
    ///
    /// Cell decoders are expected to fail only with [`Error::Io`] or
    /// [`Error::Corrupt`]. Anything else surfacing from a decoder is a
    /// contract violation of that decoder.
    ///
    /// # Examples
    ///
    /// ```
    /// use rowstore_result::Error;
    ///
    /// assert!(Error::corrupt("bad control byte").is_io_failure());
    /// assert!(!Error::internal("decoder bug").is_io_failure());
    /// ```
    #[inline]
    pub fn is_io_failure(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Corrupt(_))
    }

    /// Whether this error is a user cancellation.
    #[inline]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled)
    }
}
