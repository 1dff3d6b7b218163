//! Out-of-core row storage.
//!
//! Typed rows are serialized to a versioned, optionally gzip compressed binary
//! stream with blob side-files and file-store references, and read back
//! through a closeable iterator that recovers from per-row failures.
#![forbid(unsafe_code)]

pub mod blob;
pub mod cell;
pub mod codecs;
pub mod compression;
pub mod constants;
pub mod container;
pub mod exec;
pub mod filestore;
pub mod iterator;
pub mod registry;
pub mod store;
pub mod types;

pub use rowstore_result::{Error, Result};

pub use blob::{BlobAddress, BlobCell, BlobStore};
pub use cell::{CellKind, DataCell, OpaqueCell};
pub use compression::Compression;
pub use container::{BufferedTable, ContainerOptions, RowContainer};
pub use exec::{CancelChecker, CancelToken, DefaultExecutionContext, ExecutionContext};
pub use filestore::{
    DirectoryFileStoreRepository, FileStoreCell, FileStoreHandle, FileStoreHandlerRepository,
    FileStoreKey,
};
pub use iterator::{CloseableRowIterator, InMemoryRowIterator};
pub use registry::{CellCodec, CellTypeRegistry, ResolvedTypeTable};
pub use store::{
    IteratorCloseHandle, ReaderOptions, StoreOptions, StoreRowIterator, TableStore,
    TableStoreWriter,
};
pub use types::{ColumnSpec, DataRow, RowKey, TableSpec};
