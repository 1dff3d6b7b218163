//! Cell type registry: type name -> (kind, encode, decode).
//!
//! Dispatch is explicit. Every store persists a small type table (type byte ->
//! name and kind); on open, the reader resolves that table against a registry
//! once and afterwards dispatches per cell by index.

use std::sync::Arc;

use rowstore_result::{Error, Result};
use rustc_hash::FxHashMap;

use crate::cell::{CellKind, DataCell};
use crate::codecs::{ByteReader, write_f64_le, write_i32_le, write_i64_le, write_str};
use crate::constants::{
    FIRST_TYPE_BYTE, MAX_TYPES_PER_STORE, TYPE_NAME_BLOB, TYPE_NAME_BOOLEAN, TYPE_NAME_DOUBLE,
    TYPE_NAME_FILESTORE, TYPE_NAME_INT, TYPE_NAME_LONG, TYPE_NAME_STRING,
};

/// Appends the codec representation of a cell.
pub type EncodeFn = fn(&DataCell, &mut Vec<u8>) -> Result<()>;

/// Decodes a cell of the named type. Must fail only with I/O or corruption
/// errors; anything else is reported as a contract violation by readers.
pub type DecodeFn = fn(&Arc<str>, &mut ByteReader<'_>) -> Result<DataCell>;

/// Serializer pair for one cell type.
#[derive(Clone, Copy, Debug)]
pub struct CellCodec {
    pub kind: CellKind,
    pub encode: EncodeFn,
    pub decode: DecodeFn,
}

/// Registry entry. Blob and file-store types have no codec: their layout is
/// fixed by the stream format.
#[derive(Clone, Copy, Debug)]
pub struct CellTypeInfo {
    pub kind: CellKind,
    pub codec: Option<CellCodec>,
}

fn mismatch(expected: &str, cell: &DataCell) -> Error {
    Error::Internal(format!(
        "{expected} codec cannot encode {:?} cell",
        cell.kind()
    ))
}

fn encode_double(cell: &DataCell, out: &mut Vec<u8>) -> Result<()> {
    match cell {
        DataCell::Double(v) => {
            write_f64_le(out, *v);
            Ok(())
        }
        other => Err(mismatch(TYPE_NAME_DOUBLE, other)),
    }
}

fn decode_double(_: &Arc<str>, r: &mut ByteReader<'_>) -> Result<DataCell> {
    Ok(DataCell::Double(r.read_f64()?))
}

fn encode_int(cell: &DataCell, out: &mut Vec<u8>) -> Result<()> {
    match cell {
        DataCell::Int(v) => {
            write_i32_le(out, *v);
            Ok(())
        }
        other => Err(mismatch(TYPE_NAME_INT, other)),
    }
}

fn decode_int(_: &Arc<str>, r: &mut ByteReader<'_>) -> Result<DataCell> {
    Ok(DataCell::Int(r.read_i32()?))
}

fn encode_long(cell: &DataCell, out: &mut Vec<u8>) -> Result<()> {
    match cell {
        DataCell::Long(v) => {
            write_i64_le(out, *v);
            Ok(())
        }
        other => Err(mismatch(TYPE_NAME_LONG, other)),
    }
}

fn decode_long(_: &Arc<str>, r: &mut ByteReader<'_>) -> Result<DataCell> {
    Ok(DataCell::Long(r.read_i64()?))
}

fn encode_boolean(cell: &DataCell, out: &mut Vec<u8>) -> Result<()> {
    match cell {
        DataCell::Boolean(v) => {
            out.push(u8::from(*v));
            Ok(())
        }
        other => Err(mismatch(TYPE_NAME_BOOLEAN, other)),
    }
}

fn decode_boolean(_: &Arc<str>, r: &mut ByteReader<'_>) -> Result<DataCell> {
    match r.read_u8()? {
        0 => Ok(DataCell::Boolean(false)),
        1 => Ok(DataCell::Boolean(true)),
        other => Err(Error::Corrupt(format!("invalid boolean byte {other}"))),
    }
}

fn encode_string(cell: &DataCell, out: &mut Vec<u8>) -> Result<()> {
    match cell {
        DataCell::String(v) => write_str(out, v),
        other => Err(mismatch(TYPE_NAME_STRING, other)),
    }
}

fn decode_string(_: &Arc<str>, r: &mut ByteReader<'_>) -> Result<DataCell> {
    Ok(DataCell::String(r.read_string()?))
}

/// Maps type names to their kind and codec.
#[derive(Clone, Debug)]
pub struct CellTypeRegistry {
    types: FxHashMap<Arc<str>, CellTypeInfo>,
}

impl Default for CellTypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl CellTypeRegistry {
    /// Registry holding the built-in cell types.
    pub fn with_builtins() -> Self {
        let mut types = FxHashMap::default();
        let mut put = |name: &str, kind: CellKind, codec: Option<(EncodeFn, DecodeFn)>| {
            let codec = codec.map(|(encode, decode)| CellCodec {
                kind,
                encode,
                decode,
            });
            types.insert(Arc::<str>::from(name), CellTypeInfo { kind, codec });
        };
        put(
            TYPE_NAME_DOUBLE,
            CellKind::Double,
            Some((encode_double, decode_double)),
        );
        put(TYPE_NAME_INT, CellKind::Int, Some((encode_int, decode_int)));
        put(TYPE_NAME_LONG, CellKind::Long, Some((encode_long, decode_long)));
        put(
            TYPE_NAME_BOOLEAN,
            CellKind::Boolean,
            Some((encode_boolean, decode_boolean)),
        );
        put(
            TYPE_NAME_STRING,
            CellKind::String,
            Some((encode_string, decode_string)),
        );
        put(TYPE_NAME_BLOB, CellKind::Blob, None);
        put(TYPE_NAME_FILESTORE, CellKind::FileStore, None);
        Self { types }
    }

    /// Register a codec for an opaque type name.
    ///
    /// Built-in names cannot be replaced. Opaque types without a registered
    /// codec are still storable through the native serialization path.
    pub fn register(&mut self, name: &str, codec: CellCodec) -> Result<()> {
        if codec.kind != CellKind::Opaque {
            return Err(Error::InvalidArgumentError(format!(
                "only opaque types can be registered, got {:?}",
                codec.kind
            )));
        }
        if let Some(existing) = self.types.get(name)
            && existing.kind != CellKind::Opaque
        {
            return Err(Error::InvalidArgumentError(format!(
                "'{name}' is a built-in cell type"
            )));
        }
        self.types.insert(
            Arc::from(name),
            CellTypeInfo {
                kind: CellKind::Opaque,
                codec: Some(codec),
            },
        );
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&CellTypeInfo> {
        self.types.get(name)
    }

    /// Resolve a persisted `(name, kind)` entry of a store's type table.
    pub fn resolve(&self, name: &str, kind: CellKind) -> Result<ResolvedType> {
        match self.types.get(name) {
            Some(info) if info.kind == kind => Ok(ResolvedType {
                name: Arc::from(name),
                kind,
                codec: info.codec,
            }),
            Some(info) => Err(Error::Corrupt(format!(
                "type '{name}' persisted as {kind:?} but registered as {:?}",
                info.kind
            ))),
            None if kind == CellKind::Opaque => Ok(ResolvedType {
                name: Arc::from(name),
                kind,
                codec: None,
            }),
            None => Err(Error::NotFound(format!("cell type '{name}'"))),
        }
    }
}

/// One entry of a store's type table after resolution.
#[derive(Clone, Debug)]
pub struct ResolvedType {
    pub name: Arc<str>,
    pub kind: CellKind,
    /// `None` for blob and file-store types and for opaque types written
    /// through native serialization.
    pub codec: Option<CellCodec>,
}

/// Type byte -> resolved type, fixed for the lifetime of an open store.
#[derive(Clone, Debug, Default)]
pub struct ResolvedTypeTable {
    types: Vec<ResolvedType>,
}

impl ResolvedTypeTable {
    pub fn resolve(registry: &CellTypeRegistry, entries: &[(String, CellKind)]) -> Result<Self> {
        if entries.len() > MAX_TYPES_PER_STORE {
            return Err(Error::Corrupt(format!(
                "type table holds {} entries, limit is {MAX_TYPES_PER_STORE}",
                entries.len()
            )));
        }
        let types = entries
            .iter()
            .map(|(name, kind)| registry.resolve(name, *kind))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { types })
    }

    pub fn get(&self, type_byte: u8) -> Result<&ResolvedType> {
        type_byte
            .checked_sub(FIRST_TYPE_BYTE)
            .and_then(|idx| self.types.get(idx as usize))
            .ok_or_else(|| Error::Corrupt(format!("unknown type byte 0x{type_byte:02x}")))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Writer-side type table: assigns type bytes in order of first use.
#[derive(Debug)]
pub(crate) struct TypeTableBuilder {
    registry: Arc<CellTypeRegistry>,
    by_name: FxHashMap<Arc<str>, u8>,
    table: Vec<ResolvedType>,
}

impl TypeTableBuilder {
    pub(crate) fn new(registry: Arc<CellTypeRegistry>) -> Self {
        Self {
            registry,
            by_name: FxHashMap::default(),
            table: Vec::new(),
        }
    }

    /// Type byte and resolved type for a present cell.
    pub(crate) fn type_for(&mut self, cell: &DataCell) -> Result<(u8, &ResolvedType)> {
        let (Some(name), Some(kind)) = (cell.type_name(), cell.kind()) else {
            return Err(Error::Internal("missing cells carry no type".into()));
        };
        if let Some(&byte) = self.by_name.get(name) {
            return Ok((byte, &self.table[(byte - FIRST_TYPE_BYTE) as usize]));
        }
        if self.table.len() >= MAX_TYPES_PER_STORE {
            return Err(Error::InvalidArgumentError(format!(
                "more than {MAX_TYPES_PER_STORE} cell types in one table"
            )));
        }
        let resolved = self.registry.resolve(name, kind)?;
        let byte = FIRST_TYPE_BYTE + self.table.len() as u8;
        self.by_name.insert(Arc::clone(&resolved.name), byte);
        self.table.push(resolved);
        Ok((byte, &self.table[(byte - FIRST_TYPE_BYTE) as usize]))
    }

    /// Persistable `(name, kind)` entries in type byte order.
    pub(crate) fn entries(&self) -> Vec<(String, CellKind)> {
        self.table
            .iter()
            .map(|t| (t.name.to_string(), t.kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::OpaqueCell;

    fn encode_point(cell: &DataCell, out: &mut Vec<u8>) -> Result<()> {
        match cell {
            DataCell::Opaque(o) => {
                out.extend_from_slice(o.bytes());
                Ok(())
            }
            other => Err(Error::Internal(format!("not a point: {other:?}"))),
        }
    }

    fn decode_point(name: &Arc<str>, r: &mut ByteReader<'_>) -> Result<DataCell> {
        let bytes = r.take(r.remaining())?;
        Ok(DataCell::Opaque(OpaqueCell::new(Arc::clone(name), bytes.to_vec())))
    }

    #[test]
    fn test_builtins_resolve() {
        let registry = CellTypeRegistry::default();
        let t = registry.resolve("double", CellKind::Double).unwrap();
        assert!(t.codec.is_some());
        let blob = registry.resolve("blob", CellKind::Blob).unwrap();
        assert!(blob.codec.is_none());
        assert!(matches!(
            registry.resolve("double", CellKind::Int),
            Err(Error::Corrupt(_))
        ));
        assert!(matches!(
            registry.resolve("nope", CellKind::Int),
            Err(Error::NotFound(_))
        ));
        // Unknown opaque names fall back to native serialization.
        assert!(registry.resolve("custom", CellKind::Opaque).unwrap().codec.is_none());
    }

    #[test]
    fn test_register_opaque_codec() {
        let mut registry = CellTypeRegistry::default();
        let codec = CellCodec {
            kind: CellKind::Opaque,
            encode: encode_point,
            decode: decode_point,
        };
        registry.register("point", codec).unwrap();
        assert!(registry.lookup("point").unwrap().codec.is_some());
        assert!(registry.register("double", codec).is_err());
    }

    #[test]
    fn test_type_bytes_assigned_in_first_use_order() {
        let mut builder = TypeTableBuilder::new(Arc::new(CellTypeRegistry::default()));
        let (b1, _) = builder.type_for(&DataCell::from("x")).unwrap();
        let (b2, _) = builder.type_for(&DataCell::from(1.0)).unwrap();
        let (b3, _) = builder.type_for(&DataCell::from("y")).unwrap();
        assert_eq!(b1, FIRST_TYPE_BYTE);
        assert_eq!(b2, FIRST_TYPE_BYTE + 1);
        assert_eq!(b3, b1);

        let entries = builder.entries();
        let table = ResolvedTypeTable::resolve(&CellTypeRegistry::default(), &entries).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(FIRST_TYPE_BYTE + 1).unwrap().kind, CellKind::Double);
        assert!(matches!(table.get(0x10), Err(Error::Corrupt(_))));
        assert!(matches!(table.get(FIRST_TYPE_BYTE + 2), Err(Error::Corrupt(_))));
    }
}
