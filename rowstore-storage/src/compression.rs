//! Optional gzip framing for the primary stream and blob side-files.
//!
//! Both directions buffer on either side of the gzip codec: unbuffered gzip
//! reads and writes issue tiny system calls and are prohibitively slow.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use rowstore_result::{Error, Result};

/// Buffer capacity used around files and around the gzip codec.
pub const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// Compression applied to a whole stream. Stable on-disk codes.
#[repr(u8)]
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Hash, IntoPrimitive, TryFromPrimitive,
)]
pub enum Compression {
    #[default]
    None = 0,
    Gzip = 1,
}

impl Compression {
    /// Parse `none` / `gzip` (case-insensitive).
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "gzip" => Ok(Compression::Gzip),
            other => Err(Error::InvalidArgumentError(format!(
                "unknown compression format '{other}'"
            ))),
        }
    }
}

/// Open `path` for reading through the requested compression.
pub fn open_reader(path: &Path, compression: Compression) -> Result<Box<dyn Read + Send>> {
    let file = BufReader::with_capacity(STREAM_BUFFER_SIZE, File::open(path)?);
    let reader: Box<dyn Read + Send> = match compression {
        Compression::Gzip => Box::new(BufReader::with_capacity(
            STREAM_BUFFER_SIZE,
            GzDecoder::new(file),
        )),
        Compression::None => Box::new(file),
    };
    Ok(reader)
}

/// Write side of a possibly compressed stream.
///
/// [`StreamWriter::finish`] must be called to flush buffers and write the
/// gzip trailer; dropping the writer loses buffered data silently.
pub enum StreamWriter {
    Plain(BufWriter<File>),
    Gzip(BufWriter<GzEncoder<BufWriter<File>>>),
}

impl StreamWriter {
    pub fn create(path: &Path, compression: Compression) -> Result<Self> {
        let file = BufWriter::with_capacity(STREAM_BUFFER_SIZE, File::create(path)?);
        let writer = match compression {
            Compression::None => StreamWriter::Plain(file),
            Compression::Gzip => StreamWriter::Gzip(BufWriter::with_capacity(
                STREAM_BUFFER_SIZE,
                GzEncoder::new(file, flate2::Compression::default()),
            )),
        };
        Ok(writer)
    }

    pub fn finish(self) -> Result<()> {
        let file = match self {
            StreamWriter::Plain(w) => w.into_inner().map_err(|e| e.into_error())?,
            StreamWriter::Gzip(w) => {
                let encoder = w.into_inner().map_err(|e| e.into_error())?;
                let inner = encoder.finish()?;
                inner.into_inner().map_err(|e| e.into_error())?
            }
        };
        file.sync_all()?;
        Ok(())
    }
}

impl Write for StreamWriter {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            StreamWriter::Plain(w) => w.write(buf),
            StreamWriter::Gzip(w) => w.write(buf),
        }
    }

    #[inline]
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            StreamWriter::Plain(w) => w.write_all(buf),
            StreamWriter::Gzip(w) => w.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            StreamWriter::Plain(w) => w.flush(),
            StreamWriter::Gzip(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_stream_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.bin");
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

        let mut w = StreamWriter::create(&path, Compression::Gzip).unwrap();
        w.write_all(&payload).unwrap();
        w.finish().unwrap();

        let on_disk = std::fs::metadata(&path).unwrap().len();
        assert!(on_disk < payload.len() as u64, "gzip should shrink repetitive data");

        let mut back = Vec::new();
        open_reader(&path, Compression::Gzip)
            .unwrap()
            .read_to_end(&mut back)
            .unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_parse_compression() {
        assert_eq!(Compression::parse("GZIP").unwrap(), Compression::Gzip);
        assert_eq!(Compression::parse(" none ").unwrap(), Compression::None);
        assert!(Compression::parse("zstd").is_err());
    }
}
