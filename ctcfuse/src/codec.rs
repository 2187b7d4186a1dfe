//! Little-endian framing helpers shared by the alphabet, LM, trie and
//! dictionary blobs.

use crate::error::LoadError;
use std::io::{self, Read, Write};

/// Reader that maps short reads to [`LoadError::Truncated`] for one blob kind.
pub(crate) struct BlobReader<R> {
    inner: R,
    what: &'static str,
    consumed: u64,
}

macro_rules! read_le {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self) -> Result<$ty, LoadError> {
            let mut buf = [0u8; std::mem::size_of::<$ty>()];
            self.fill(&mut buf)?;
            Ok(<$ty>::from_le_bytes(buf))
        }
    };
}

impl<R: Read> BlobReader<R> {
    pub fn new(inner: R, what: &'static str) -> Self {
        Self {
            inner,
            what,
            consumed: 0,
        }
    }

    /// Bytes read so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<(), LoadError> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => LoadError::Truncated { what: self.what },
            _ => LoadError::Corrupt {
                what: self.what,
                reason: e.to_string(),
            },
        })?;
        self.consumed += buf.len() as u64;
        Ok(())
    }

    read_le!(u8, u8);
    read_le!(u16, u16);
    read_le!(u32, u32);
    read_le!(u64, u64);
    read_le!(f32, f32);
    read_le!(f64, f64);

    pub fn bytes(&mut self, len: usize) -> Result<Vec<u8>, LoadError> {
        let mut buf = vec![0u8; len];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Read and compare a magic header.
    pub fn expect_magic(&mut self, magic: &[u8]) -> Result<(), LoadError> {
        let found = self.bytes(magic.len())?;
        if found != magic {
            return Err(LoadError::BadMagic { what: self.what });
        }
        Ok(())
    }

    /// Read a `u32` version and require an exact match.
    pub fn expect_version(&mut self, expected: u32) -> Result<(), LoadError> {
        let found = self.u32()?;
        if found != expected {
            return Err(LoadError::VersionMismatch {
                what: self.what,
                found,
                expected,
            });
        }
        Ok(())
    }

    /// Read a `u32` length prefix followed by that many bytes.
    pub fn length_prefixed(&mut self) -> Result<Vec<u8>, LoadError> {
        let len = self.u32()? as usize;
        self.bytes(len)
    }

    pub fn corrupt(&self, reason: impl Into<String>) -> LoadError {
        LoadError::Corrupt {
            what: self.what,
            reason: reason.into(),
        }
    }
}

pub(crate) fn write_u8(w: &mut impl Write, v: u8) -> io::Result<()> {
    w.write_all(&[v])
}

pub(crate) fn write_u32(w: &mut impl Write, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub(crate) fn write_u64(w: &mut impl Write, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub(crate) fn write_f32(w: &mut impl Write, v: f32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

/// Append-only little-endian encoding for blobs built in memory.
pub(crate) trait PutLe {
    fn put_u8(&mut self, v: u8);
    fn put_u16(&mut self, v: u16);
    fn put_u32(&mut self, v: u32);
    fn put_f64(&mut self, v: f64);
    /// `u32` length followed by the bytes.
    fn put_length_prefixed(&mut self, bytes: &[u8]);
}

impl PutLe for Vec<u8> {
    fn put_u8(&mut self, v: u8) {
        self.push(v);
    }

    fn put_u16(&mut self, v: u16) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn put_u32(&mut self, v: u32) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn put_f64(&mut self, v: f64) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn put_length_prefixed(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len() as u32);
        self.extend_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_written_values() {
        let mut buf = Vec::new();
        buf.put_u16(513);
        buf.put_f64(-2.5);
        buf.put_length_prefixed(b"abc");

        let mut reader = BlobReader::new(buf.as_slice(), "test");
        assert_eq!(reader.u16().unwrap(), 513);
        assert_eq!(reader.f64().unwrap(), -2.5);
        assert_eq!(reader.length_prefixed().unwrap(), b"abc");
        assert_eq!(reader.consumed(), 2 + 8 + 4 + 3);
    }

    #[test]
    fn stream_and_buffer_writers_agree() {
        let mut streamed = Vec::new();
        write_u32(&mut streamed, 0xDEAD_BEEF).unwrap();
        write_u8(&mut streamed, 7).unwrap();

        let mut buffered = Vec::new();
        buffered.put_u32(0xDEAD_BEEF);
        buffered.put_u8(7);

        assert_eq!(streamed, buffered);
    }

    #[test]
    fn short_read_is_truncation() {
        let mut reader = BlobReader::new([1u8, 2].as_slice(), "test");
        assert!(matches!(
            reader.u32(),
            Err(LoadError::Truncated { what: "test" })
        ));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut reader = BlobReader::new(b"NOPE".as_slice(), "test");
        assert!(matches!(
            reader.expect_magic(b"TRIE"),
            Err(LoadError::BadMagic { .. })
        ));
    }
}
