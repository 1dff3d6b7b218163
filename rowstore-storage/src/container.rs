//! Row container that buffers in memory and spills to a table store.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rowstore_result::{Error, Result};

use crate::compression::Compression;
use crate::iterator::{CloseableRowIterator, InMemoryRowIterator};
use crate::store::{StoreOptions, TableStore, TableStoreWriter};
use crate::types::{DataRow, TableSpec};

/// Rows kept in memory before a container spills to disk.
pub const DEFAULT_MAX_ROWS_IN_MEMORY: usize = 5_000;

/// Overrides [`ContainerOptions::max_rows_in_memory`].
pub const ENV_MAX_ROWS_IN_MEMORY: &str = "ROWSTORE_MAX_ROWS_IN_MEMORY";

/// Overrides the compression of spilled stores (`none` or `gzip`).
pub const ENV_COMPRESSION: &str = "ROWSTORE_COMPRESSION";

#[derive(Clone, Debug)]
pub struct ContainerOptions {
    pub max_rows_in_memory: usize,
    /// Options for spilled stores. `delete_on_drop` is always forced on.
    pub store: StoreOptions,
    /// Directory for spilled stores; the system temp dir if unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            max_rows_in_memory: DEFAULT_MAX_ROWS_IN_MEMORY,
            store: StoreOptions::default(),
            temp_dir: None,
        }
    }
}

impl ContainerOptions {
    /// Defaults overridden by `ROWSTORE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_env_vars(|name| std::env::var(name).ok())
    }

    /// Like [`ContainerOptions::from_env`] with a custom variable lookup.
    pub fn from_env_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut options = Self::default();
        if let Some(value) = lookup(ENV_MAX_ROWS_IN_MEMORY) {
            options.max_rows_in_memory = value.trim().parse().map_err(|_| {
                Error::InvalidArgumentError(format!(
                    "{ENV_MAX_ROWS_IN_MEMORY} must be a non-negative integer, got '{value}'"
                ))
            })?;
        }
        if let Some(value) = lookup(ENV_COMPRESSION) {
            options.store.compression = Compression::parse(&value)?;
        }
        Ok(options)
    }

    pub fn with_max_rows_in_memory(mut self, max_rows_in_memory: usize) -> Self {
        self.max_rows_in_memory = max_rows_in_memory;
        self
    }

    pub fn with_store_options(mut self, store: StoreOptions) -> Self {
        self.store = store;
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }
}

/// Accumulates rows of a fixed spec; see [`RowContainer::close`].
pub struct RowContainer {
    spec: TableSpec,
    options: ContainerOptions,
    rows: Vec<DataRow>,
    writer: Option<TableStoreWriter>,
    row_count: u64,
}

impl RowContainer {
    pub fn new(spec: TableSpec, options: ContainerOptions) -> Self {
        Self {
            spec,
            options,
            rows: Vec::new(),
            writer: None,
            row_count: 0,
        }
    }

    pub fn spec(&self) -> &TableSpec {
        &self.spec
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn is_spilled(&self) -> bool {
        self.writer.is_some()
    }

    pub fn add_row(&mut self, row: DataRow) -> Result<()> {
        if row.num_cells() != self.spec.num_columns() {
            return Err(Error::InvalidArgumentError(format!(
                "row '{}' has {} cells, container has {} columns",
                row.key,
                row.num_cells(),
                self.spec.num_columns()
            )));
        }
        match self.writer.as_mut() {
            Some(writer) => writer.add_row(&row)?,
            None => {
                self.rows.push(row);
                if self.rows.len() > self.options.max_rows_in_memory
                    && let Err(e) = self.spill()
                {
                    // The row that pushed past the threshold is not accepted.
                    self.rows.pop();
                    return Err(e);
                }
            }
        }
        self.row_count += 1;
        Ok(())
    }

    /// Move buffered rows to a temporary store; later rows stream to disk.
    /// No-op when already spilled. On failure every buffered row stays in
    /// memory and the temporary files are removed.
    pub fn spill(&mut self) -> Result<()> {
        if self.writer.is_some() {
            return Ok(());
        }
        let mut builder = tempfile::Builder::new();
        builder.prefix("rowstore-").suffix(".bin");
        let file = match &self.options.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        let path = file.into_temp_path().keep().map_err(|e| Error::Io(e.error))?;
        let writer = match self.write_buffered(&path) {
            Ok(writer) => writer,
            Err(e) => {
                let _ = fs::remove_file(&path);
                tracing::debug!(
                    path = %path.display(),
                    rows = self.rows.len(),
                    error = %e,
                    "spill failed, keeping rows in memory"
                );
                return Err(e);
            }
        };
        tracing::debug!(
            path = %path.display(),
            rows = self.rows.len(),
            "spilled row container to disk"
        );
        self.rows = Vec::new();
        self.writer = Some(writer);
        Ok(())
    }

    fn write_buffered(&self, path: &Path) -> Result<TableStoreWriter> {
        let options = self.options.store.clone().with_delete_on_drop(true);
        let mut writer = TableStoreWriter::create(path, self.spec.clone(), options)?;
        for row in &self.rows {
            writer.add_row(row)?;
        }
        Ok(writer)
    }

    pub fn close(self) -> Result<BufferedTable> {
        let data = match self.writer {
            Some(writer) => TableData::Stored(writer.finish()?),
            None => TableData::InMemory(Arc::new(self.rows)),
        };
        Ok(BufferedTable {
            spec: self.spec,
            data,
        })
    }
}

#[derive(Clone, Debug)]
enum TableData {
    InMemory(Arc<Vec<DataRow>>),
    Stored(TableStore),
}

/// A closed, immutable table: in memory or backed by a store.
#[derive(Clone, Debug)]
pub struct BufferedTable {
    spec: TableSpec,
    data: TableData,
}

impl BufferedTable {
    /// An in-memory table. Every row must match `spec`.
    pub fn from_rows(spec: TableSpec, rows: Vec<DataRow>) -> Result<Self> {
        if let Some(bad) = rows.iter().find(|r| r.num_cells() != spec.num_columns()) {
            return Err(Error::InvalidArgumentError(format!(
                "row '{}' has {} cells, table has {} columns",
                bad.key,
                bad.num_cells(),
                spec.num_columns()
            )));
        }
        Ok(Self {
            spec,
            data: TableData::InMemory(Arc::new(rows)),
        })
    }

    pub fn from_store(store: TableStore) -> Self {
        Self {
            spec: store.spec().clone(),
            data: TableData::Stored(store),
        }
    }

    pub fn spec(&self) -> &TableSpec {
        &self.spec
    }

    pub fn row_count(&self) -> u64 {
        match &self.data {
            TableData::InMemory(rows) => rows.len() as u64,
            TableData::Stored(store) => store.row_count(),
        }
    }

    pub fn store(&self) -> Option<&TableStore> {
        match &self.data {
            TableData::InMemory(_) => None,
            TableData::Stored(store) => Some(store),
        }
    }

    pub fn is_stored(&self) -> bool {
        self.store().is_some()
    }

    pub fn iter(&self) -> Result<Box<dyn CloseableRowIterator>> {
        let iter: Box<dyn CloseableRowIterator> = match &self.data {
            TableData::InMemory(rows) => Box::new(InMemoryRowIterator::new(Arc::clone(rows))),
            TableData::Stored(store) => Box::new(store.iter()?),
        };
        Ok(iter)
    }

    /// All rows, read eagerly.
    pub fn rows(&self) -> Result<Vec<DataRow>> {
        Ok(self.iter()?.collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::DataCell;
    use crate::filestore::{FileStoreCell, FileStoreKey};

    fn spec() -> TableSpec {
        TableSpec::from_names(["x"])
    }

    fn row(i: i32) -> DataRow {
        DataRow::new(format!("r{i}"), vec![DataCell::from(i)])
    }

    #[test]
    fn test_stays_in_memory_below_threshold() {
        let options = ContainerOptions::default().with_max_rows_in_memory(4);
        let mut c = RowContainer::new(spec(), options);
        for i in 0..4 {
            c.add_row(row(i)).unwrap();
        }
        assert!(!c.is_spilled());
        let table = c.close().unwrap();
        assert!(!table.is_stored());
        assert_eq!(table.rows().unwrap().len(), 4);
    }

    #[test]
    fn test_spills_and_deletes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let options = ContainerOptions::default()
            .with_max_rows_in_memory(2)
            .with_temp_dir(dir.path());
        let mut c = RowContainer::new(spec(), options);
        for i in 0..10 {
            c.add_row(row(i)).unwrap();
        }
        assert!(c.is_spilled());
        let table = c.close().unwrap();
        let path = table.store().unwrap().path().to_path_buf();
        assert!(path.exists());
        let keys: Vec<_> = table
            .rows()
            .unwrap()
            .into_iter()
            .map(|r| r.key.into_string())
            .collect();
        assert_eq!(keys.len(), 10);
        assert_eq!(keys[0], "r0");
        assert_eq!(keys[9], "r9");
        drop(table);
        assert!(!path.exists());
    }

    /// Version 10 stores hold one file store key per cell, so this row
    /// cannot be written.
    fn unwritable_row() -> DataRow {
        let keys = vec![FileStoreKey::new(1, "a"), FileStoreKey::new(2, "b")];
        let cell = FileStoreCell::new(keys, b"payload".to_vec()).unwrap();
        DataRow::new("fs", vec![DataCell::FileStore(cell)])
    }

    fn version_10_options(dir: &Path) -> ContainerOptions {
        ContainerOptions::default()
            .with_store_options(StoreOptions::default().with_version(10))
            .with_temp_dir(dir)
    }

    fn keys(table: &BufferedTable) -> Vec<String> {
        table
            .rows()
            .unwrap()
            .into_iter()
            .map(|r| r.key.into_string())
            .collect()
    }

    #[test]
    fn test_failed_spill_keeps_rows_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = RowContainer::new(spec(), version_10_options(dir.path()));
        c.add_row(row(0)).unwrap();
        c.add_row(unwritable_row()).unwrap();

        let err = c.spill().unwrap_err();
        assert!(matches!(err, Error::InvalidArgumentError(_)));
        assert!(!c.is_spilled());
        assert_eq!(c.row_count(), 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let table = c.close().unwrap();
        assert!(!table.is_stored());
        assert_eq!(keys(&table), ["r0", "fs"]);
    }

    #[test]
    fn test_failed_threshold_spill_rejects_only_the_new_row() {
        let dir = tempfile::tempdir().unwrap();
        let options = version_10_options(dir.path()).with_max_rows_in_memory(1);
        let mut c = RowContainer::new(spec(), options);
        c.add_row(row(0)).unwrap();
        assert!(c.add_row(unwritable_row()).is_err());
        assert_eq!(c.row_count(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        c.add_row(row(1)).unwrap();
        assert!(c.is_spilled());
        let table = c.close().unwrap();
        assert_eq!(keys(&table), ["r0", "r1"]);
    }

    #[test]
    fn test_rejects_wrong_width() {
        let mut c = RowContainer::new(spec(), ContainerOptions::default());
        let err = c.add_row(DataRow::missing("bad", 2)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgumentError(_)));
    }

    #[test]
    fn test_options_from_env_vars() {
        let options = ContainerOptions::from_env_vars(|name| match name {
            ENV_MAX_ROWS_IN_MEMORY => Some("17".into()),
            ENV_COMPRESSION => Some("gzip".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(options.max_rows_in_memory, 17);
        assert_eq!(options.store.compression, Compression::Gzip);

        let err = ContainerOptions::from_env_vars(|name| {
            (name == ENV_MAX_ROWS_IN_MEMORY).then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgumentError(_)));
    }
}
