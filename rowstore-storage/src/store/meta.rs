//! Metadata sidecar persisted next to the primary stream.

use std::fs;
use std::path::Path;

use bitcode::{Decode, Encode};
use rowstore_result::{Error, Result};

use crate::cell::CellKind;
use crate::compression::Compression;
use crate::constants::{CURRENT_VERSION, META_MAGIC, MIN_READ_VERSION};
use crate::types::TableSpec;

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub(crate) struct StoreMeta {
    pub magic: [u8; 4],
    pub version: u32,
    pub compression: u8,
    pub buffer_id: u32,
    pub row_count: u64,
    pub persist_row_keys: bool,
    pub column_names: Vec<String>,
    /// `(type name, kind code)` in type byte order.
    pub type_table: Vec<(String, u8)>,
}

impl StoreMeta {
    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, bitcode::encode(self))?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let meta: StoreMeta = bitcode::decode(&bytes)
            .map_err(|e| Error::Corrupt(format!("unreadable store metadata: {e}")))?;
        if meta.magic != META_MAGIC {
            return Err(Error::Corrupt(format!(
                "bad metadata magic {:?} in {}",
                meta.magic,
                path.display()
            )));
        }
        if !(MIN_READ_VERSION..=CURRENT_VERSION).contains(&meta.version) {
            return Err(Error::UnsupportedVersion(meta.version));
        }
        Ok(meta)
    }

    pub fn compression(&self) -> Result<Compression> {
        Compression::try_from(self.compression).map_err(|_| {
            Error::Corrupt(format!("unknown compression code {}", self.compression))
        })
    }

    pub fn spec(&self) -> TableSpec {
        TableSpec::from_names(self.column_names.iter().cloned())
    }

    pub fn type_entries(&self) -> Result<Vec<(String, CellKind)>> {
        self.type_table
            .iter()
            .map(|(name, code)| {
                CellKind::try_from(*code)
                    .map(|kind| (name.clone(), kind))
                    .map_err(|_| Error::Corrupt(format!("unknown cell kind code {code}")))
            })
            .collect()
    }
}
