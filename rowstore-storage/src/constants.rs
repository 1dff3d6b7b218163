//! On-disk control bytes, format versions and well-known names.

/// Cell block holding a missing value.
pub const BYTE_TYPE_MISSING: u8 = 0x80;

/// Cell block written through the native serialization path; the type byte
/// follows as the next byte.
pub const BYTE_TYPE_SERIALIZATION: u8 = 0x81;

/// Terminates every row in the primary stream.
pub const BYTE_ROW_SEPARATOR: u8 = 0x82;

/// First byte handed out to a cell type in a store's type table.
pub const FIRST_TYPE_BYTE: u8 = 0x83;

/// Upper bound on the number of distinct cell types per store.
pub const MAX_TYPES_PER_STORE: usize = (u8::MAX - FIRST_TYPE_BYTE) as usize + 1;

/// Oldest encoding family the reader understands.
pub const MIN_READ_VERSION: u32 = 6;

/// Last version in which file-store cells carry exactly one key.
pub const LAST_SINGLE_FILESTORE_VERSION: u32 = 10;

/// Version written by default.
pub const CURRENT_VERSION: u32 = 11;

/// Magic prefix of the metadata sidecar.
pub const META_MAGIC: [u8; 4] = *b"RST0";

/// Suffix appended to the primary file name for the metadata sidecar.
pub const META_FILE_SUFFIX: &str = "meta";

/// Suffix appended to the primary file name for the blob directory.
pub const BLOB_DIR_SUFFIX: &str = "blobs";

/// Row key returned for every row of a store written without row keys.
pub const NO_KEY_ROW_KEY: &str = "no-key";

/// Prefix of keys synthesized when a row key cannot be read.
pub const READ_FAILED_KEY_PREFIX: &str = "Read_failed_auto_generated_key_";

/// Built-in type names registered by [`crate::registry::CellTypeRegistry`].
pub const TYPE_NAME_DOUBLE: &str = "double";
pub const TYPE_NAME_INT: &str = "int";
pub const TYPE_NAME_LONG: &str = "long";
pub const TYPE_NAME_BOOLEAN: &str = "boolean";
pub const TYPE_NAME_STRING: &str = "string";
pub const TYPE_NAME_BLOB: &str = "blob";
pub const TYPE_NAME_FILESTORE: &str = "filestore";

/// Whether file-store cells in a store of `version` carry a key count.
#[inline]
pub fn supports_multiple_file_stores(version: u32) -> bool {
    version > LAST_SINGLE_FILESTORE_VERSION
}
