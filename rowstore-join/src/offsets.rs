//! Packed `(left, right)` row offset pairs for match de-duplication.

use rowstore_result::{Error, Result};
use rustc_hash::FxHashSet;

/// Pack two row offsets into one key: left in the high 32 bits.
pub fn combined_offsets(left: u64, right: u64) -> Result<u64> {
    let (Ok(left), Ok(right)) = (u32::try_from(left), u32::try_from(right)) else {
        return Err(Error::InvalidArgumentError(format!(
            "row offsets ({left}, {right}) do not fit in 32 bits"
        )));
    };
    Ok((u64::from(left) << 32) | u64::from(right))
}

/// Set of offset combinations seen so far.
#[derive(Debug, Default)]
pub struct RowOffsetCombinationSet {
    set: FxHashSet<u64>,
}

impl RowOffsetCombinationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a combination. Returns `false` if it was already present.
    pub fn put(&mut self, left: u64, right: u64) -> Result<bool> {
        Ok(self.set.insert(combined_offsets(left, right)?))
    }

    pub fn contains(&self, left: u64, right: u64) -> bool {
        combined_offsets(left, right).is_ok_and(|key| self.set.contains(&key))
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}
