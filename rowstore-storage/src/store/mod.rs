//! Out-of-core table store: one primary stream of rows, a metadata sidecar
//! and a directory of blob side-files.
//!
//! A store is written once by a [`TableStoreWriter`] and is read-only
//! afterwards. [`TableStore`] is a cheap cloneable handle; every
//! [`StoreRowIterator`] holds one, so a temporary store's files are deleted
//! only after the last table handle and the last iterator are gone.

mod meta;
mod reader;
mod row_codec;
mod writer;

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use rowstore_result::Result;

pub use reader::{IteratorCloseHandle, StoreRowIterator};
pub use writer::TableStoreWriter;

use crate::blob::{BlobAddress, BlobCell, BlobStore};
use crate::compression::Compression;
use crate::constants::{BLOB_DIR_SUFFIX, CURRENT_VERSION, META_FILE_SUFFIX};
use crate::filestore::FileStoreHandlerRepository;
use crate::registry::{CellTypeRegistry, ResolvedTypeTable};
use crate::types::TableSpec;

use meta::StoreMeta;
use row_codec::CellDecoder;

static NEXT_BUFFER_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique id for a new store's blobs.
pub fn next_buffer_id() -> u32 {
    NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed)
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Path of the metadata sidecar of the store at `path`.
pub fn meta_path(path: &Path) -> PathBuf {
    sibling_path(path, META_FILE_SUFFIX)
}

/// Path of the blob directory of the store at `path`.
pub fn blob_dir(path: &Path) -> PathBuf {
    sibling_path(path, BLOB_DIR_SUFFIX)
}

/// Options applied when writing a store.
#[derive(Clone, Debug)]
pub struct StoreOptions {
    pub compression: Compression,
    /// Format version to write; 6..=11.
    pub version: u32,
    pub persist_row_keys: bool,
    pub compress_blobs: bool,
    /// Defaults to a fresh process-unique id.
    pub buffer_id: Option<u32>,
    /// Remove the store's files once the last handle is dropped.
    pub delete_on_drop: bool,
    pub registry: Arc<CellTypeRegistry>,
    /// Used to resolve file-store cells when the finished store is read.
    pub file_stores: Option<Arc<dyn FileStoreHandlerRepository>>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            compression: Compression::None,
            version: CURRENT_VERSION,
            persist_row_keys: true,
            compress_blobs: false,
            buffer_id: None,
            delete_on_drop: false,
            registry: Arc::new(CellTypeRegistry::default()),
            file_stores: None,
        }
    }
}

impl StoreOptions {
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_persist_row_keys(mut self, persist_row_keys: bool) -> Self {
        self.persist_row_keys = persist_row_keys;
        self
    }

    pub fn with_compress_blobs(mut self, compress_blobs: bool) -> Self {
        self.compress_blobs = compress_blobs;
        self
    }

    pub fn with_buffer_id(mut self, buffer_id: u32) -> Self {
        self.buffer_id = Some(buffer_id);
        self
    }

    pub fn with_delete_on_drop(mut self, delete_on_drop: bool) -> Self {
        self.delete_on_drop = delete_on_drop;
        self
    }

    pub fn with_registry(mut self, registry: Arc<CellTypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_file_stores(mut self, repository: Arc<dyn FileStoreHandlerRepository>) -> Self {
        self.file_stores = Some(repository);
        self
    }

    fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            registry: Arc::clone(&self.registry),
            file_stores: self.file_stores.clone(),
        }
    }
}

/// Options applied when opening an existing store.
#[derive(Clone, Debug, Default)]
pub struct ReaderOptions {
    pub registry: Arc<CellTypeRegistry>,
    pub file_stores: Option<Arc<dyn FileStoreHandlerRepository>>,
}

impl ReaderOptions {
    pub fn with_registry(mut self, registry: Arc<CellTypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_file_stores(mut self, repository: Arc<dyn FileStoreHandlerRepository>) -> Self {
        self.file_stores = Some(repository);
        self
    }
}

#[derive(Debug)]
struct StoreInner {
    path: PathBuf,
    spec: TableSpec,
    version: u32,
    compression: Compression,
    row_count: u64,
    persist_row_keys: bool,
    decoder: CellDecoder,
    delete_on_drop: bool,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if !self.delete_on_drop {
            return;
        }
        let blobs = blob_dir(&self.path);
        let results = [
            fs::remove_file(&self.path),
            fs::remove_file(meta_path(&self.path)),
            if blobs.exists() {
                fs::remove_dir_all(&blobs)
            } else {
                Ok(())
            },
        ];
        for err in results.into_iter().filter_map(|r| r.err()) {
            tracing::debug!(
                path = %self.path.display(),
                error = %err,
                "failed to delete table store file"
            );
        }
        tracing::trace!(path = %self.path.display(), "deleted table store");
    }
}

/// Read-only handle to a finished store.
#[derive(Clone, Debug)]
pub struct TableStore {
    inner: Arc<StoreInner>,
}

impl TableStore {
    /// Open a store written earlier. Opened stores are never deleted on drop.
    pub fn open(path: impl AsRef<Path>, options: ReaderOptions) -> Result<Self> {
        Self::open_inner(path.as_ref().to_path_buf(), options, false)
    }

    fn open_inner(path: PathBuf, options: ReaderOptions, delete_on_drop: bool) -> Result<Self> {
        let meta = StoreMeta::read(&meta_path(&path))?;
        let compression = meta.compression()?;
        let types = ResolvedTypeTable::resolve(&options.registry, &meta.type_entries()?)?;
        let blobs = Arc::new(BlobStore::new(blob_dir(&path), meta.buffer_id));
        let decoder = CellDecoder::new(types, blobs, meta.version, options.file_stores);
        tracing::debug!(
            path = %path.display(),
            version = meta.version,
            rows = meta.row_count,
            ?compression,
            "opened table store"
        );
        Ok(Self {
            inner: Arc::new(StoreInner {
                spec: meta.spec(),
                version: meta.version,
                compression,
                row_count: meta.row_count,
                persist_row_keys: meta.persist_row_keys,
                decoder,
                delete_on_drop,
                path,
            }),
        })
    }

    /// A new iterator with its own input stream.
    pub fn iter(&self) -> Result<StoreRowIterator> {
        StoreRowIterator::new(self.clone())
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn spec(&self) -> &TableSpec {
        &self.inner.spec
    }

    pub fn row_count(&self) -> u64 {
        self.inner.row_count
    }

    pub fn version(&self) -> u32 {
        self.inner.version
    }

    pub fn compression(&self) -> Compression {
        self.inner.compression
    }

    pub fn buffer_id(&self) -> u32 {
        self.inner.decoder.blob_store().buffer_id()
    }

    pub fn persists_row_keys(&self) -> bool {
        self.inner.persist_row_keys
    }

    pub fn deletes_on_drop(&self) -> bool {
        self.inner.delete_on_drop
    }

    /// Eagerly read the blob at `address` from this store.
    pub fn read_blob_data_cell(&self, address: BlobAddress) -> Result<BlobCell> {
        self.inner.decoder.blob_store().read_blob_data_cell(address)
    }

    pub(crate) fn decoder(&self) -> &CellDecoder {
        &self.inner.decoder
    }
}
