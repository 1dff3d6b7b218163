//! rowstore: out-of-core row tables and join result containers.
//!
//! This crate is the entrypoint of the workspace. It re-exports the table
//! store and the join container from the underlying `rowstore-*` crates.
//!
//! # Quick Start
//!
//! Buffer two inputs, offer the matches a join algorithm found and collect
//! the rest:
//!
//! ```rust
//! use std::sync::Arc;
//! use rowstore::join::{
//!     InputTable, JoinContainer, JoinContainerOptions, JoinSpecification, JoinTableSettings,
//! };
//! use rowstore::{BufferedTable, DataCell, DataRow, DefaultExecutionContext, TableSpec};
//!
//! let rows = |prefix: &str| {
//!     (0..3)
//!         .map(|i| DataRow::new(format!("{prefix}{i}"), vec![DataCell::from(i)]))
//!         .collect::<Vec<_>>()
//! };
//! let left = BufferedTable::from_rows(TableSpec::from_names(["id"]), rows("l")).unwrap();
//! let right = BufferedTable::from_rows(TableSpec::from_names(["id"]), rows("r")).unwrap();
//!
//! let spec = JoinSpecification::new(
//!     JoinTableSettings::for_table(left).with_retain_unmatched(true),
//!     JoinTableSettings::for_table(right),
//! );
//! let ctx = Arc::new(DefaultExecutionContext::default());
//! let mut join = JoinContainer::split(spec, ctx, JoinContainerOptions::default()).unwrap();
//! join.defer_unmatched_rows(InputTable::Left).unwrap();
//! join.offer_match(
//!     &DataRow::new("l1", vec![DataCell::from(1)]), 1,
//!     &DataRow::new("r1", vec![DataCell::from(1)]), 1,
//! ).unwrap();
//!
//! let out = join.finish().unwrap();
//! assert_eq!(out.tables.matches.row_count(), 1);
//! assert_eq!(out.tables.left_unmatched.row_count(), 2);
//! ```
//!
//! # Architecture
//!
//! - **Errors** (`rowstore-result`): the shared [`Error`] type.
//! - **Storage** (`rowstore-storage`): cells, the binary table store with
//!   blob and file-store support, row iterators, buffered containers and the
//!   execution context.
//! - **Join** (`rowstore-join`): the container consuming match and unmatched
//!   offers from a join algorithm.
#![forbid(unsafe_code)]

pub use rowstore_result::{Error, Result};

pub use rowstore_storage::{
    BufferedTable, CloseableRowIterator, ContainerOptions, DataCell, DataRow,
    DefaultExecutionContext, ExecutionContext, RowContainer, RowKey, StoreOptions, TableSpec,
    TableStore, TableStoreWriter,
};

pub mod storage {
    //! The full table store API.

    pub use rowstore_storage::*;
}

pub mod join {
    //! The join result container API.

    pub use rowstore_join::*;
}
