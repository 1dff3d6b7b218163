use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rowstore_result::{Error, Result};

use super::meta::StoreMeta;
use super::row_codec::RowEncoder;
use super::{StoreOptions, TableStore, blob_dir, meta_path, next_buffer_id};
use crate::blob::BlobWriter;
use crate::compression::StreamWriter;
use crate::constants::{CURRENT_VERSION, META_MAGIC, MIN_READ_VERSION};
use crate::registry::TypeTableBuilder;
use crate::types::{DataRow, TableSpec};

/// Single-pass writer of a table store.
///
/// Rows are appended in order; [`TableStoreWriter::finish`] flushes the
/// stream, persists the metadata and hands back the read-only store. A writer
/// dropped before `finish` removes what it wrote if the store was temporary.
pub struct TableStoreWriter {
    path: PathBuf,
    spec: TableSpec,
    options: StoreOptions,
    buffer_id: u32,
    out: Option<StreamWriter>,
    encoder: RowEncoder,
    row_count: u64,
}

impl TableStoreWriter {
    pub fn create(path: impl AsRef<Path>, spec: TableSpec, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !(MIN_READ_VERSION..=CURRENT_VERSION).contains(&options.version) {
            return Err(Error::UnsupportedVersion(options.version));
        }
        let buffer_id = options.buffer_id.unwrap_or_else(next_buffer_id);
        let out = StreamWriter::create(&path, options.compression)?;
        let encoder = RowEncoder::new(
            TypeTableBuilder::new(Arc::clone(&options.registry)),
            BlobWriter::new(blob_dir(&path), buffer_id, options.compress_blobs),
            options.version,
            options.persist_row_keys,
        );
        tracing::trace!(
            path = %path.display(),
            buffer_id,
            version = options.version,
            compression = ?options.compression,
            "creating table store"
        );
        Ok(Self {
            path,
            spec,
            options,
            buffer_id,
            out: Some(out),
            encoder,
            row_count: 0,
        })
    }

    pub fn spec(&self) -> &TableSpec {
        &self.spec
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn buffer_id(&self) -> u32 {
        self.buffer_id
    }

    pub fn add_row(&mut self, row: &DataRow) -> Result<()> {
        if row.num_cells() != self.spec.num_columns() {
            return Err(Error::InvalidArgumentError(format!(
                "row '{}' has {} cells, table has {} columns",
                row.key,
                row.num_cells(),
                self.spec.num_columns()
            )));
        }
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| Error::Internal("table store writer is finished or failed".into()))?;
        if let Err(e) = self.encoder.encode_row(out, row) {
            // A partially written row leaves the stream unreadable.
            tracing::debug!(path = %self.path.display(), error = %e, "table store write failed");
            self.discard();
            return Err(e);
        }
        self.row_count += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<TableStore> {
        let out = self
            .out
            .take()
            .ok_or_else(|| Error::Internal("table store writer is finished or failed".into()))?;
        out.finish()?;

        let meta = StoreMeta {
            magic: META_MAGIC,
            version: self.options.version,
            compression: self.options.compression.into(),
            buffer_id: self.buffer_id,
            row_count: self.row_count,
            persist_row_keys: self.options.persist_row_keys,
            column_names: self.spec.column_names().map(str::to_string).collect(),
            type_table: self
                .encoder
                .types()
                .entries()
                .into_iter()
                .map(|(name, kind)| (name, kind.into()))
                .collect(),
        };
        meta.write(&meta_path(&self.path))?;
        tracing::debug!(
            path = %self.path.display(),
            rows = self.row_count,
            blobs = self.encoder.blobs_written(),
            "finished table store"
        );

        let path = std::mem::take(&mut self.path);
        TableStore::open_inner(
            path,
            self.options.reader_options(),
            self.options.delete_on_drop,
        )
    }
}

impl TableStoreWriter {
    /// Drop the stream and remove every file written so far.
    fn discard(&mut self) {
        self.out = None;
        let _ = fs::remove_file(&self.path);
        let _ = fs::remove_file(meta_path(&self.path));
        let blobs = blob_dir(&self.path);
        if blobs.exists() {
            let _ = fs::remove_dir_all(&blobs);
        }
    }
}

impl Drop for TableStoreWriter {
    fn drop(&mut self) {
        // The stream is gone once `finish` ran; the store owns the files then.
        if self.out.is_none() || !self.options.delete_on_drop {
            return;
        }
        self.discard();
        tracing::debug!(path = %self.path.display(), "discarded unfinished table store");
    }
}
