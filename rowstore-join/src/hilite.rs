//! Output row key -> input row keys, per input side and result partition.

use rowstore_storage::RowKey;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::spec::{InputTable, ResultType};

pub type RowKeyMapping = FxHashMap<RowKey, FxHashSet<RowKey>>;

/// Records which input rows every output row was built from.
#[derive(Clone, Debug, Default)]
pub struct HiliteMapping {
    /// `[side][Matches | LeftOuter | RightOuter]`
    maps: [[RowKeyMapping; 3]; 2],
}

fn partition(result_type: ResultType) -> Option<usize> {
    match result_type {
        ResultType::Matches => Some(0),
        ResultType::LeftOuter => Some(1),
        ResultType::RightOuter => Some(2),
        ResultType::All => None,
    }
}

impl HiliteMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `output` of `result_type` with the `side` input row `input`.
    /// `ResultType::All` is not a partition and is ignored.
    pub fn add(
        &mut self,
        result_type: ResultType,
        output: RowKey,
        side: InputTable,
        input: RowKey,
    ) {
        if let Some(p) = partition(result_type) {
            self.maps[side.index()][p].entry(output).or_default().insert(input);
        }
    }

    /// The mapping for one partition, or the union of all three for
    /// [`ResultType::All`].
    pub fn get(&self, side: InputTable, result_type: ResultType) -> RowKeyMapping {
        let maps = &self.maps[side.index()];
        match partition(result_type) {
            Some(p) => maps[p].clone(),
            None => {
                let mut combined = RowKeyMapping::default();
                for map in maps {
                    for (output, inputs) in map {
                        combined
                            .entry(output.clone())
                            .or_default()
                            .extend(inputs.iter().cloned());
                    }
                }
                combined
            }
        }
    }
}
