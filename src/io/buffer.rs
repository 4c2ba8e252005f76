//! Buffered reading for TIFF directory parsing
//!
//! Directory entries are small and scattered, so reads go through an
//! internal buffer that is discarded on every seek.

use std::io::{Read, Result, Seek, SeekFrom};
use crate::io::SeekableReader;

/// A buffered reader that wraps any [`SeekableReader`]
pub struct BufferedReader<R: SeekableReader> {
    inner: R,
    buffer: Vec<u8>,
    pos: usize,
    cap: usize,
}

impl<R: SeekableReader> BufferedReader<R> {
    /// Creates a new buffered reader with default buffer size (8KB)
    pub fn new(inner: R) -> Self {
        Self::with_capacity(8192, inner)
    }

    /// Creates a new buffered reader with specified buffer size
    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        Self {
            inner,
            buffer: vec![0; capacity.max(1)],
            pos: 0,
            cap: 0,
        }
    }

    /// Returns the number of bytes currently buffered
    pub fn buffer_len(&self) -> usize {
        self.cap - self.pos
    }

    /// Reads exactly `len` bytes starting at absolute `offset`
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.seek(SeekFrom::Start(offset))?;
        let mut chunk = vec![0u8; len];
        self.read_exact(&mut chunk)?;
        Ok(chunk)
    }
}

impl<R: SeekableReader> Read for BufferedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.pos >= self.cap {
            if buf.len() >= self.buffer.len() {
                return self.inner.read(buf);
            }
            self.cap = self.inner.read(&mut self.buffer)?;
            self.pos = 0;
            if self.cap == 0 {
                return Ok(0);
            }
        }

        let to_read = (self.cap - self.pos).min(buf.len());
        buf[..to_read].copy_from_slice(&self.buffer[self.pos..self.pos + to_read]);
        self.pos += to_read;
        Ok(to_read)
    }
}

impl<R: SeekableReader> Seek for BufferedReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let pos = match pos {
            SeekFrom::Current(delta) => {
                let unread = (self.cap - self.pos) as i64;
                SeekFrom::Current(delta - unread)
            }
            other => other,
        };
        self.pos = 0;
        self.cap = 0;
        self.inner.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_small_reads_are_buffered() {
        let mut reader = BufferedReader::with_capacity(4, Cursor::new(vec![1u8, 2, 3, 4, 5, 6]));

        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf[0], 1);
        assert_eq!(reader.buffer_len(), 3);

        let mut rest = [0u8; 5];
        reader.read_exact(&mut rest).unwrap();
        assert_eq!(rest, [2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_read_at_discards_buffer() {
        let mut reader = BufferedReader::new(Cursor::new(vec![0x10u8, 0x20, 0x30, 0x40, 0x50]));

        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf).unwrap();

        assert_eq!(reader.read_at(3, 2).unwrap(), vec![0x40, 0x50]);
        assert_eq!(reader.read_at(0, 2).unwrap(), vec![0x10, 0x20]);
        assert!(reader.read_at(4, 2).is_err());
    }

    #[test]
    fn test_seek_current_accounts_for_buffer() {
        let mut reader = BufferedReader::new(Cursor::new(vec![0u8, 1, 2, 3, 4, 5, 6, 7]));

        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).unwrap();
        reader.seek(SeekFrom::Current(1)).unwrap();
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [3, 4]);
    }
}
