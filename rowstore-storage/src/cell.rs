//! The closed set of cell variants a table can hold.

use std::sync::Arc;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::blob::BlobCell;
use crate::constants::{
    TYPE_NAME_BLOB, TYPE_NAME_BOOLEAN, TYPE_NAME_DOUBLE, TYPE_NAME_FILESTORE, TYPE_NAME_INT,
    TYPE_NAME_LONG, TYPE_NAME_STRING,
};
use crate::filestore::FileStoreCell;

/// Stable on-disk cell kind codes, persisted in a store's type table. Do not
/// reorder. Only append new variants at the end with explicit numeric values.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, IntoPrimitive, TryFromPrimitive)]
pub enum CellKind {
    Double = 1,
    Int = 2,
    Long = 3,
    Boolean = 4,
    String = 5,
    Opaque = 6,
    Blob = 7,
    FileStore = 8,
}

impl CellKind {
    /// Blob cells persist only an address in the primary stream.
    #[inline]
    pub fn is_blob(self) -> bool {
        matches!(self, CellKind::Blob)
    }

    /// File-store cells persist their keys right after the type byte.
    #[inline]
    pub fn is_file_store(self) -> bool {
        matches!(self, CellKind::FileStore)
    }
}

/// A value of a caller-defined type, carried as raw bytes.
///
/// Opaque cells go through the native serialization path unless a codec was
/// registered for their type name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OpaqueCell {
    type_name: Arc<str>,
    bytes: Arc<[u8]>,
}

impl OpaqueCell {
    pub fn new(type_name: impl Into<Arc<str>>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            type_name: type_name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// One cell of a row.
#[derive(Clone, Debug, PartialEq)]
pub enum DataCell {
    Missing,
    Double(f64),
    Int(i32),
    Long(i64),
    Boolean(bool),
    String(String),
    Opaque(OpaqueCell),
    Blob(BlobCell),
    FileStore(FileStoreCell),
}

impl DataCell {
    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self, DataCell::Missing)
    }

    /// Kind of a present value; `None` for missing cells.
    pub fn kind(&self) -> Option<CellKind> {
        let kind = match self {
            DataCell::Missing => return None,
            DataCell::Double(_) => CellKind::Double,
            DataCell::Int(_) => CellKind::Int,
            DataCell::Long(_) => CellKind::Long,
            DataCell::Boolean(_) => CellKind::Boolean,
            DataCell::String(_) => CellKind::String,
            DataCell::Opaque(_) => CellKind::Opaque,
            DataCell::Blob(_) => CellKind::Blob,
            DataCell::FileStore(_) => CellKind::FileStore,
        };
        Some(kind)
    }

    /// Name under which the cell's type appears in a store's type table.
    pub fn type_name(&self) -> Option<&str> {
        let name = match self {
            DataCell::Missing => return None,
            DataCell::Double(_) => TYPE_NAME_DOUBLE,
            DataCell::Int(_) => TYPE_NAME_INT,
            DataCell::Long(_) => TYPE_NAME_LONG,
            DataCell::Boolean(_) => TYPE_NAME_BOOLEAN,
            DataCell::String(_) => TYPE_NAME_STRING,
            DataCell::Opaque(cell) => cell.type_name(),
            DataCell::Blob(_) => TYPE_NAME_BLOB,
            DataCell::FileStore(_) => TYPE_NAME_FILESTORE,
        };
        Some(name)
    }
}

impl From<f64> for DataCell {
    fn from(v: f64) -> Self {
        DataCell::Double(v)
    }
}

impl From<i32> for DataCell {
    fn from(v: i32) -> Self {
        DataCell::Int(v)
    }
}

impl From<i64> for DataCell {
    fn from(v: i64) -> Self {
        DataCell::Long(v)
    }
}

impl From<bool> for DataCell {
    fn from(v: bool) -> Self {
        DataCell::Boolean(v)
    }
}

impl From<&str> for DataCell {
    fn from(v: &str) -> Self {
        DataCell::String(v.to_string())
    }
}

impl From<String> for DataCell {
    fn from(v: String) -> Self {
        DataCell::String(v)
    }
}

/* ---- Compile-time pinning of on-disk codes -------------------------------
   Changing any discriminant silently would corrupt persisted type tables.
*/
#[allow(clippy::no_effect)]
const _: () = {
    // true -> 1, false -> 0; index out of bounds if false.
    ["code changed"][!(CellKind::Double as u8 == 1) as usize];
    ["code changed"][!(CellKind::Int as u8 == 2) as usize];
    ["code changed"][!(CellKind::Long as u8 == 3) as usize];
    ["code changed"][!(CellKind::Boolean as u8 == 4) as usize];
    ["code changed"][!(CellKind::String as u8 == 5) as usize];
    ["code changed"][!(CellKind::Opaque as u8 == 6) as usize];
    ["code changed"][!(CellKind::Blob as u8 == 7) as usize];
    ["code changed"][!(CellKind::FileStore as u8 == 8) as usize];
};
