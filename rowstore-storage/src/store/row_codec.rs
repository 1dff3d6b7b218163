//! Row and cell encoding for the primary stream.
//!
//! ```text
//! row   := [key block] cell-block * N  ROW_SEPARATOR
//! cell  := MISSING
//!        | SERIALIZED type [keys] bytes
//!        | type [keys] (blob address | codec bytes)
//! ```

use std::io::Write;
use std::sync::Arc;

use rowstore_result::{Error, Result};

use crate::blob::{BlobAddress, BlobCell, BlobStore, BlobWriter};
use crate::cell::{CellKind, DataCell, OpaqueCell};
use crate::codecs::{ByteReader, write_block, write_bytes, write_u32_le};
use crate::constants::{
    BYTE_ROW_SEPARATOR, BYTE_TYPE_MISSING, BYTE_TYPE_SERIALIZATION,
    supports_multiple_file_stores,
};
use crate::filestore::{FileStoreCell, FileStoreHandlerRepository, FileStoreKey};
use crate::registry::{ResolvedTypeTable, TypeTableBuilder};
use crate::types::DataRow;

/// Smallest encoded [`FileStoreKey`]: id, depth, iteration, empty name.
const MIN_ENCODED_KEY_LEN: usize = 8 + 4 + 4 + 4;

pub(crate) struct RowEncoder {
    types: TypeTableBuilder,
    blobs: BlobWriter,
    version: u32,
    persist_row_keys: bool,
    scratch: Vec<u8>,
}

impl RowEncoder {
    pub(crate) fn new(
        types: TypeTableBuilder,
        blobs: BlobWriter,
        version: u32,
        persist_row_keys: bool,
    ) -> Self {
        Self {
            types,
            blobs,
            version,
            persist_row_keys,
            scratch: Vec::with_capacity(256),
        }
    }

    pub(crate) fn types(&self) -> &TypeTableBuilder {
        &self.types
    }

    pub(crate) fn blobs_written(&self) -> usize {
        self.blobs.blobs_written()
    }

    pub(crate) fn encode_row<W: Write>(&mut self, w: &mut W, row: &DataRow) -> Result<()> {
        if self.persist_row_keys {
            write_block(w, row.key.as_str().as_bytes())?;
        }
        let mut scratch = std::mem::take(&mut self.scratch);
        for (column, cell) in row.cells.iter().enumerate() {
            scratch.clear();
            let column = u32::try_from(column)
                .map_err(|_| Error::InvalidArgumentError("too many columns".into()))?;
            let encoded = self
                .encode_cell(column, cell, &mut scratch)
                .and_then(|()| write_block(w, &scratch));
            if let Err(e) = encoded {
                self.scratch = scratch;
                return Err(e);
            }
        }
        self.scratch = scratch;
        w.write_all(&[BYTE_ROW_SEPARATOR])?;
        Ok(())
    }

    fn encode_cell(&mut self, column: u32, cell: &DataCell, out: &mut Vec<u8>) -> Result<()> {
        if cell.is_missing() {
            out.push(BYTE_TYPE_MISSING);
            return Ok(());
        }
        let (type_byte, resolved) = self.types.type_for(cell)?;
        let codec = resolved.codec;
        match cell {
            DataCell::Blob(blob) => {
                out.push(type_byte);
                let address = self.blobs.write_blob(column, blob)?;
                address.encode(out);
            }
            DataCell::FileStore(fs) => {
                out.push(type_byte);
                encode_file_store_keys(self.version, fs.keys(), out)?;
                write_bytes(out, fs.payload())?;
            }
            _ => match (codec, cell) {
                (Some(codec), _) => {
                    out.push(type_byte);
                    (codec.encode)(cell, out)?;
                }
                (None, DataCell::Opaque(opaque)) => {
                    out.push(BYTE_TYPE_SERIALIZATION);
                    out.push(type_byte);
                    write_bytes(out, opaque.bytes())?;
                }
                (None, other) => {
                    return Err(Error::Internal(format!(
                        "no codec for {:?} cell",
                        other.kind()
                    )));
                }
            },
        }
        Ok(())
    }
}

fn encode_file_store_keys(version: u32, keys: &[FileStoreKey], out: &mut Vec<u8>) -> Result<()> {
    if supports_multiple_file_stores(version) {
        let count = u32::try_from(keys.len())
            .map_err(|_| Error::InvalidArgumentError("too many file store keys".into()))?;
        write_u32_le(out, count);
        for key in keys {
            key.encode(out)?;
        }
        return Ok(());
    }
    match keys {
        [key] => key.encode(out),
        _ => Err(Error::InvalidArgumentError(format!(
            "format version {version} stores exactly one file store per cell, got {}",
            keys.len()
        ))),
    }
}

/// Per-store cell decoder; the type table is resolved once at open.
#[derive(Debug)]
pub(crate) struct CellDecoder {
    types: ResolvedTypeTable,
    blobs: Arc<BlobStore>,
    version: u32,
    file_stores: Option<Arc<dyn FileStoreHandlerRepository>>,
}

impl CellDecoder {
    pub(crate) fn new(
        types: ResolvedTypeTable,
        blobs: Arc<BlobStore>,
        version: u32,
        file_stores: Option<Arc<dyn FileStoreHandlerRepository>>,
    ) -> Self {
        Self {
            types,
            blobs,
            version,
            file_stores,
        }
    }

    pub(crate) fn blob_store(&self) -> &Arc<BlobStore> {
        &self.blobs
    }

    /// Decode one cell block payload. The whole payload must be consumed.
    pub(crate) fn decode_cell(&self, payload: &[u8]) -> Result<DataCell> {
        let mut r = ByteReader::new(payload);
        let control = r.read_u8()?;
        if control == BYTE_TYPE_MISSING {
            r.finish()?;
            return Ok(DataCell::Missing);
        }
        let serialized = control == BYTE_TYPE_SERIALIZATION;
        let type_byte = if serialized { r.read_u8()? } else { control };
        let resolved = self.types.get(type_byte)?;

        let cell = match resolved.kind {
            CellKind::Blob if !serialized => {
                let address = BlobAddress::decode(&mut r)?;
                if address.buffer_id != self.blobs.buffer_id() {
                    return Err(Error::Corrupt(format!(
                        "{address} does not belong to buffer {}",
                        self.blobs.buffer_id()
                    )));
                }
                DataCell::Blob(BlobCell::lazy(address, Arc::clone(&self.blobs)))
            }
            CellKind::FileStore if !serialized => {
                let keys = self.decode_file_store_keys(&mut r)?;
                let payload = r.read_bytes()?;
                let mut cell = FileStoreCell::new(keys, payload.to_vec())?;
                if let Some(repository) = &self.file_stores {
                    cell.post_construct(repository.as_ref())?;
                }
                DataCell::FileStore(cell)
            }
            CellKind::Opaque if serialized => {
                let bytes = r.read_bytes()?;
                DataCell::Opaque(OpaqueCell::new(Arc::clone(&resolved.name), bytes.to_vec()))
            }
            kind if serialized => {
                return Err(Error::Corrupt(format!(
                    "{kind:?} cells are never written serialized"
                )));
            }
            _ => {
                let codec = resolved.codec.ok_or_else(|| {
                    Error::Corrupt(format!("type '{}' has no codec", resolved.name))
                })?;
                (codec.decode)(&resolved.name, &mut r)?
            }
        };
        r.finish()?;
        Ok(cell)
    }

    fn decode_file_store_keys(&self, r: &mut ByteReader<'_>) -> Result<Vec<FileStoreKey>> {
        if !supports_multiple_file_stores(self.version) {
            return Ok(vec![FileStoreKey::decode(r)?]);
        }
        let count = r.read_u32()? as usize;
        if count == 0 || count > r.remaining() / MIN_ENCODED_KEY_LEN {
            return Err(Error::Corrupt(format!("invalid file store key count {count}")));
        }
        (0..count).map(|_| FileStoreKey::decode(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CURRENT_VERSION, FIRST_TYPE_BYTE, LAST_SINGLE_FILESTORE_VERSION};

    #[test]
    fn test_legacy_version_rejects_multi_key_cells() {
        let keys = vec![FileStoreKey::new(1, "a"), FileStoreKey::new(1, "b")];
        let mut out = Vec::new();
        let err = encode_file_store_keys(LAST_SINGLE_FILESTORE_VERSION, &keys, &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgumentError(_)));

        out.clear();
        encode_file_store_keys(CURRENT_VERSION, &keys, &mut out).unwrap();
        let mut r = ByteReader::new(&out);
        assert_eq!(r.read_u32().unwrap(), 2);
    }

    #[test]
    fn test_missing_and_bad_type_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = CellDecoder::new(
            ResolvedTypeTable::default(),
            Arc::new(BlobStore::new(dir.path().to_path_buf(), 0)),
            CURRENT_VERSION,
            None,
        );
        assert_eq!(
            decoder.decode_cell(&[BYTE_TYPE_MISSING]).unwrap(),
            DataCell::Missing
        );
        assert!(matches!(
            decoder.decode_cell(&[BYTE_TYPE_MISSING, 0]),
            Err(Error::Corrupt(_))
        ));
        assert!(matches!(
            decoder.decode_cell(&[FIRST_TYPE_BYTE]),
            Err(Error::Corrupt(_))
        ));
        assert!(decoder.decode_cell(&[]).is_err());
    }
}
