//! Little-endian primitive codecs and block framing.
//!
//! Blocks are a `u32` LE payload length followed by the payload. Readers
//! always consume a whole block before decoding it, so a payload that fails to
//! decode leaves the stream positioned at the next block.

use std::io::{Read, Write};

use rowstore_result::{Error, Result};

/// Upper bound accepted for a single block payload.
pub const MAX_BLOCK_LEN: u32 = 1 << 30;

/// Capacity a block buffer keeps after a failed read.
const BLOCK_BUF_RETAINED: usize = 64 * 1024;

#[inline]
pub fn write_u32_le(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn write_i32_le(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn write_u64_le(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn write_i64_le(out: &mut Vec<u8>, v: i64) {
    out.extend_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn write_f64_le(out: &mut Vec<u8>, v: f64) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Length-prefixed byte string.
pub fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| Error::InvalidArgumentError("byte payload too large".into()))?;
    write_u32_le(out, len);
    out.extend_from_slice(bytes);
    Ok(())
}

#[inline]
pub fn write_str(out: &mut Vec<u8>, s: &str) -> Result<()> {
    write_bytes(out, s.as_bytes())
}

/// Cursor over an in-memory payload; every read is bounds checked.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::Corrupt(format!(
                "payload truncated: wanted {n} bytes, {} left",
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut a = [0u8; N];
        a.copy_from_slice(self.take(N)?);
        Ok(a)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    #[inline]
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    #[inline]
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    #[inline]
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(Error::corrupt)
    }

    /// Fail unless the whole payload was consumed.
    pub fn finish(&self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(Error::Corrupt(format!(
                "{} trailing bytes in block",
                self.remaining()
            )));
        }
        Ok(())
    }
}

/// Write one length-prefixed block.
pub fn write_block<W: Write>(w: &mut W, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_BLOCK_LEN)
        .ok_or_else(|| Error::InvalidArgumentError("block payload too large".into()))?;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(payload)?;
    Ok(())
}

/// Read one length-prefixed block into `buf` (cleared first).
///
/// The buffer only grows with the bytes actually present, so a corrupted
/// length cannot force a large allocation.
pub fn read_block<R: Read + ?Sized>(r: &mut R, buf: &mut Vec<u8>) -> Result<()> {
    let mut len = [0u8; 4];
    r.read_exact(&mut len)?;
    let len = u32::from_le_bytes(len);
    if len > MAX_BLOCK_LEN {
        return Err(Error::Corrupt(format!("block length {len} exceeds limit")));
    }
    buf.clear();
    let read = Read::take(&mut *r, u64::from(len)).read_to_end(buf);
    match read {
        Ok(n) if n == len as usize => Ok(()),
        Ok(n) => {
            buf.clear();
            buf.shrink_to(BLOCK_BUF_RETAINED);
            Err(Error::Corrupt(format!(
                "block truncated: length {len}, {n} bytes present"
            )))
        }
        Err(e) => {
            buf.clear();
            buf.shrink_to(BLOCK_BUF_RETAINED);
            Err(e.into())
        }
    }
}

pub fn read_control_byte<R: Read + ?Sized>(r: &mut R) -> Result<u8> {
    let mut b = [0u8; 1];
    r.read_exact(&mut b)?;
    Ok(b[0])
}
