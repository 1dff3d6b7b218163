//! References to externally managed large-object stores.
//!
//! A [`FileStoreCell`] only carries [`FileStoreKey`]s. Handles to the actual
//! files are resolved through a [`FileStoreHandlerRepository`] when
//! [`FileStoreCell::post_construct`] runs after deserialization; the repository
//! outlives every cell that refers to it.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rowstore_result::{Error, Result};

use crate::codecs::{ByteReader, write_i32_le, write_str, write_u32_le, write_u64_le};

/// Stable identifier of one file inside a file store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileStoreKey {
    pub store_id: u64,
    pub nested_loop_path: Vec<i32>,
    pub iteration_index: i32,
    pub name: String,
}

impl FileStoreKey {
    pub fn new(store_id: u64, name: impl Into<String>) -> Self {
        Self {
            store_id,
            nested_loop_path: Vec::new(),
            iteration_index: -1,
            name: name.into(),
        }
    }

    pub fn with_loop(mut self, nested_loop_path: Vec<i32>, iteration_index: i32) -> Self {
        self.nested_loop_path = nested_loop_path;
        self.iteration_index = iteration_index;
        self
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        write_u64_le(out, self.store_id);
        let depth = u32::try_from(self.nested_loop_path.len())
            .map_err(|_| Error::InvalidArgumentError("loop path too deep".into()))?;
        write_u32_le(out, depth);
        for level in &self.nested_loop_path {
            write_i32_le(out, *level);
        }
        write_i32_le(out, self.iteration_index);
        write_str(out, &self.name)
    }

    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self> {
        let store_id = r.read_u64()?;
        let depth = r.read_u32()? as usize;
        if depth > r.remaining() / 4 {
            return Err(Error::Corrupt(format!("loop path depth {depth} exceeds block")));
        }
        let nested_loop_path = (0..depth)
            .map(|_| r.read_i32())
            .collect::<Result<Vec<_>>>()?;
        let iteration_index = r.read_i32()?;
        let name = r.read_string()?;
        Ok(Self {
            store_id,
            nested_loop_path,
            iteration_index,
            name,
        })
    }
}

impl fmt::Display for FileStoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.store_id)?;
        for level in &self.nested_loop_path {
            write!(f, "/{level}")?;
        }
        if self.iteration_index >= 0 {
            write!(f, "#{}", self.iteration_index)?;
        }
        write!(f, ":{}", self.name)
    }
}

/// Resolved access to a file behind a [`FileStoreKey`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileStoreHandle {
    key: FileStoreKey,
    path: PathBuf,
}

impl FileStoreHandle {
    pub fn new(key: FileStoreKey, path: PathBuf) -> Self {
        Self { key, path }
    }

    pub fn key(&self) -> &FileStoreKey {
        &self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }
}

/// Resolves file-store keys to handles. Implemented by the owner of the file
/// stores; the table store only consumes it.
pub trait FileStoreHandlerRepository: Send + Sync + fmt::Debug {
    fn resolve(&self, key: &FileStoreKey) -> Result<FileStoreHandle>;
}

/// Repository laying files out as `<root>/<store id>/<loop path>/<name>`.
#[derive(Clone, Debug)]
pub struct DirectoryFileStoreRepository {
    root: PathBuf,
}

impl DirectoryFileStoreRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &FileStoreKey) -> PathBuf {
        let mut path = self.root.join(format!("{:016x}", key.store_id));
        for level in &key.nested_loop_path {
            path.push(level.to_string());
        }
        if key.iteration_index >= 0 {
            path.push(format!("iter{}", key.iteration_index));
        }
        path.push(&key.name);
        path
    }

    /// Create (or overwrite) the file behind `key` and return its handle.
    pub fn create_file(&self, key: FileStoreKey, contents: &[u8]) -> Result<FileStoreHandle> {
        let path = self.path_for(&key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(FileStoreHandle::new(key, path))
    }
}

impl FileStoreHandlerRepository for DirectoryFileStoreRepository {
    fn resolve(&self, key: &FileStoreKey) -> Result<FileStoreHandle> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Err(Error::NotFound(format!("file store {key}")));
        }
        Ok(FileStoreHandle::new(key.clone(), path))
    }
}

/// Cell whose content lives in one or more external file stores.
#[derive(Clone, Debug)]
pub struct FileStoreCell {
    keys: Vec<FileStoreKey>,
    payload: Arc<[u8]>,
    handles: Option<Vec<FileStoreHandle>>,
}

impl FileStoreCell {
    /// A cell referencing `keys` (at least one) with a small inline payload.
    pub fn new(keys: Vec<FileStoreKey>, payload: impl Into<Arc<[u8]>>) -> Result<Self> {
        if keys.is_empty() {
            return Err(Error::InvalidArgumentError(
                "file store cell needs at least one file store".into(),
            ));
        }
        Ok(Self {
            keys,
            payload: payload.into(),
            handles: None,
        })
    }

    /// Key of the first file store.
    pub fn file_store_key(&self) -> &FileStoreKey {
        &self.keys[0]
    }

    pub fn keys(&self) -> &[FileStoreKey] {
        &self.keys
    }

    pub fn num_file_stores(&self) -> usize {
        self.keys.len()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn is_resolved(&self) -> bool {
        self.handles.is_some()
    }

    /// Handles populated by [`FileStoreCell::post_construct`].
    pub fn handles(&self) -> Option<&[FileStoreHandle]> {
        self.handles.as_deref()
    }

    /// Resolve every key against `repository`. All keys resolve or none do.
    pub fn post_construct(&mut self, repository: &dyn FileStoreHandlerRepository) -> Result<()> {
        let handles = self
            .keys
            .iter()
            .map(|key| repository.resolve(key))
            .collect::<Result<Vec<_>>>()?;
        self.handles = Some(handles);
        Ok(())
    }
}

impl PartialEq for FileStoreCell {
    fn eq(&self, other: &Self) -> bool {
        self.keys == other.keys && self.payload == other.payload
    }
}
