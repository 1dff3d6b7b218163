//! Blob cells and their de-duplicated side-file storage.
//!
//! A blob is written once per store into `<dir>/c<column>/b<index>.bin[.gz]`
//! and referenced from the primary stream by its [`BlobAddress`]. Readers
//! hand out lazy [`BlobCell`] wrappers that load the bytes on first access.

use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use rowstore_result::{Error, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use xxhash_rust::xxh3::xxh3_64;

use crate::codecs::{ByteReader, write_u32_le};
use crate::compression::{Compression, StreamWriter, open_reader};

/// Location of a blob: owning buffer, column, position within the column and
/// whether its side-file is gzip compressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlobAddress {
    pub buffer_id: u32,
    pub column: u32,
    pub index_in_column: u32,
    pub compressed: bool,
}

impl BlobAddress {
    pub fn encode(&self, out: &mut Vec<u8>) {
        write_u32_le(out, self.buffer_id);
        write_u32_le(out, self.column);
        write_u32_le(out, self.index_in_column);
        out.push(u8::from(self.compressed));
    }

    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self> {
        let buffer_id = r.read_u32()?;
        let column = r.read_u32()?;
        let index_in_column = r.read_u32()?;
        let compressed = match r.read_u8()? {
            0 => false,
            1 => true,
            other => {
                return Err(Error::Corrupt(format!(
                    "invalid blob compression flag {other}"
                )));
            }
        };
        Ok(Self {
            buffer_id,
            column,
            index_in_column,
            compressed,
        })
    }
}

impl fmt::Display for BlobAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "blob(buffer={}, column={}, index={}{})",
            self.buffer_id,
            self.column,
            self.index_in_column,
            if self.compressed { ", gzip" } else { "" }
        )
    }
}

#[derive(Debug)]
struct BlobInner {
    address: OnceLock<BlobAddress>,
    data: OnceLock<Arc<[u8]>>,
    source: Option<Arc<BlobStore>>,
}

/// Large immutable value stored once and referenced by address.
///
/// Clones share the same handle, so writing one clone twice into the same
/// store yields a single side-file.
#[derive(Clone, Debug)]
pub struct BlobCell {
    inner: Arc<BlobInner>,
}

impl BlobCell {
    /// A new in-memory blob that has not been written anywhere yet.
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(data.into());
        Self {
            inner: Arc::new(BlobInner {
                address: OnceLock::new(),
                data: cell,
                source: None,
            }),
        }
    }

    /// A wrapper whose bytes are fetched from `store` on first access.
    pub(crate) fn lazy(address: BlobAddress, store: Arc<BlobStore>) -> Self {
        let assigned = OnceLock::new();
        let _ = assigned.set(address);
        Self {
            inner: Arc::new(BlobInner {
                address: assigned,
                data: OnceLock::new(),
                source: Some(store),
            }),
        }
    }

    pub fn address(&self) -> Option<BlobAddress> {
        self.inner.address.get().copied()
    }

    /// Whether the bytes are resident in memory.
    pub fn is_loaded(&self) -> bool {
        self.inner.data.get().is_some()
    }

    /// The blob content, read from the owning store if necessary.
    pub fn data(&self) -> Result<Arc<[u8]>> {
        if let Some(data) = self.inner.data.get() {
            return Ok(Arc::clone(data));
        }
        let (Some(address), Some(store)) = (self.address(), self.inner.source.as_ref()) else {
            return Err(Error::Internal("blob has neither data nor source".into()));
        };
        let loaded = store.read_blob_bytes(address)?;
        // A concurrent loader may have won; either copy is identical.
        let _ = self.inner.data.set(loaded);
        self.inner
            .data
            .get()
            .cloned()
            .ok_or_else(|| Error::Internal("blob data vanished after load".into()))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.data()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.data()?.is_empty())
    }

    /// Record where this blob was first stored. Later assignments are ignored.
    pub(crate) fn assign_address(&self, address: BlobAddress) {
        let _ = self.inner.address.set(address);
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for BlobCell {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self.data(), other.data()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

fn blob_path(dir: &Path, column: u32, index_in_column: u32, compressed: bool) -> PathBuf {
    let file = if compressed {
        format!("b{index_in_column}.bin.gz")
    } else {
        format!("b{index_in_column}.bin")
    };
    dir.join(format!("c{column}")).join(file)
}

/// Read access to the blob side-files of one store.
#[derive(Debug)]
pub struct BlobStore {
    dir: PathBuf,
    buffer_id: u32,
}

impl BlobStore {
    pub fn new(dir: PathBuf, buffer_id: u32) -> Self {
        Self { dir, buffer_id }
    }

    pub fn buffer_id(&self) -> u32 {
        self.buffer_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the raw bytes at `address`.
    pub fn read_blob_bytes(&self, address: BlobAddress) -> Result<Arc<[u8]>> {
        if address.buffer_id != self.buffer_id {
            return Err(Error::Internal(format!(
                "buffer ids don't match: {} vs. {}",
                self.buffer_id, address.buffer_id
            )));
        }
        let path = blob_path(
            &self.dir,
            address.column,
            address.index_in_column,
            address.compressed,
        );
        if !path.exists() {
            return Err(Error::NotFound(format!("{address} at {}", path.display())));
        }
        let compression = if address.compressed {
            Compression::Gzip
        } else {
            Compression::None
        };
        let mut bytes = Vec::new();
        open_reader(&path, compression)?.read_to_end(&mut bytes)?;
        Ok(bytes.into())
    }

    /// Read the blob at `address` into a fully loaded cell.
    pub fn read_blob_data_cell(&self, address: BlobAddress) -> Result<BlobCell> {
        let data = self.read_blob_bytes(address)?;
        let cell = BlobCell::new(data);
        cell.assign_address(address);
        Ok(cell)
    }
}

/// Write side of a store's blob directory; de-duplicates by handle identity
/// and by content.
///
/// Only hashes and lengths are kept in memory. A hash hit is confirmed
/// against the side-file already on disk.
pub(crate) struct BlobWriter {
    store: BlobStore,
    compress: bool,
    hash: fn(&[u8]) -> u64,
    next_index: FxHashMap<u32, u32>,
    by_hash: FxHashMap<u64, Vec<(usize, BlobAddress)>>,
    own: FxHashSet<BlobAddress>,
}

impl BlobWriter {
    pub(crate) fn new(dir: PathBuf, buffer_id: u32, compress: bool) -> Self {
        Self {
            store: BlobStore::new(dir, buffer_id),
            compress,
            hash: xxh3_64,
            next_index: FxHashMap::default(),
            by_hash: FxHashMap::default(),
            own: FxHashSet::default(),
        }
    }

    /// Number of side-files written so far.
    pub(crate) fn blobs_written(&self) -> usize {
        self.own.len()
    }

    pub(crate) fn write_blob(&mut self, column: u32, cell: &BlobCell) -> Result<BlobAddress> {
        if let Some(address) = cell.address()
            && self.own.contains(&address)
        {
            return Ok(address);
        }

        let data = cell.data()?;
        let hash = (self.hash)(&data);
        if let Some(address) = self.find_written(hash, &data)? {
            cell.assign_address(address);
            return Ok(address);
        }

        let index_in_column = {
            let next = self.next_index.entry(column).or_insert(0);
            let idx = *next;
            *next = next
                .checked_add(1)
                .ok_or_else(|| Error::Internal("blob index overflow".into()))?;
            idx
        };
        let address = BlobAddress {
            buffer_id: self.store.buffer_id(),
            column,
            index_in_column,
            compressed: self.compress,
        };
        let path = blob_path(self.store.dir(), column, index_in_column, self.compress);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let compression = if self.compress {
            Compression::Gzip
        } else {
            Compression::None
        };
        let mut w = StreamWriter::create(&path, compression)?;
        w.write_all(&data)?;
        w.finish()?;
        tracing::trace!(%address, len = data.len(), "wrote blob side-file");

        cell.assign_address(address);
        self.own.insert(address);
        self.by_hash.entry(hash).or_default().push((data.len(), address));
        Ok(address)
    }

    /// A side-file of this store holding exactly `data`.
    fn find_written(&self, hash: u64, data: &[u8]) -> Result<Option<BlobAddress>> {
        let Some(bucket) = self.by_hash.get(&hash) else {
            return Ok(None);
        };
        for &(len, address) in bucket {
            if len == data.len() && *self.store.read_blob_bytes(address)? == *data {
                return Ok(Some(address));
            }
        }
        Ok(None)
    }
}
