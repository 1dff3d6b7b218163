//! Join result container.
//!
//! A join algorithm offers matched row pairs and rows without a partner to a
//! [`JoinContainer`], which de-duplicates matches, tracks matched offsets per
//! side, optionally records hilite mappings and materializes the result
//! through a [`JoinOutput`] strategy backed by [`rowstore_storage`] tables.
#![forbid(unsafe_code)]

pub mod container;
pub mod hilite;
pub mod offsets;
pub mod output;
pub mod spec;
pub mod unmatched;

pub use container::{
    JoinContainer, JoinContainerOptions, JoinResults, LowMemoryHandle, RowKeyStrategy,
};
pub use hilite::{HiliteMapping, RowKeyMapping};
pub use offsets::{RowOffsetCombinationSet, combined_offsets};
pub use output::{CombinedOutput, JoinOutput, SplitOutput, SplitTables};
pub use spec::{InputTable, JoinSpecification, JoinTableSettings, ResultType};
pub use unmatched::{RowHandler, UnmatchedRowCollector};
