//! TIFF reader modules

pub mod tags;
pub mod chunks;

use std::collections::HashSet;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use memmap2::Mmap;
use crate::error::{Error, Result};
use crate::io::{BufferedReader, ByteOrder, SeekableReader};
use crate::formats::tiff::{Tiff, IFD, TIFF_MAGIC, BIGTIFF_MAGIC};

use self::tags::TagReader;

pub use self::chunks::ChunkLayout;

/// Upper bound on directories followed before the chain is considered corrupt
const MAX_IFDS: usize = 1000;

/// Parses the directory structure of a TIFF or BigTIFF stream
pub struct TiffReader<R: SeekableReader = File> {
    reader: BufferedReader<R>,
    byte_order: ByteOrder,
    is_big_tiff: bool,
}

impl TiffReader<File> {
    /// Opens a TIFF file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        Self::new(File::open(path)?)
    }
}

impl<R: SeekableReader> TiffReader<R> {
    /// Reads and validates the file header
    pub fn new(inner: R) -> Result<Self> {
        let mut reader = BufferedReader::new(inner);
        let byte_order = ByteOrder::detect(&mut reader)
            .map_err(|_| Error::InvalidFormat("Not a TIFF file".to_string()))?;

        let magic = byte_order.read_u16(&mut reader)?;
        let is_big_tiff = match magic {
            TIFF_MAGIC => false,
            BIGTIFF_MAGIC => true,
            _ => return Err(Error::InvalidMagic(magic)),
        };

        if is_big_tiff {
            let offset_size = byte_order.read_u16(&mut reader)?;
            if offset_size != 8 {
                return Err(Error::InvalidFormat(
                    format!("Invalid BigTIFF offset size: {}", offset_size)
                ));
            }
            let _reserved = byte_order.read_u16(&mut reader)?;
        }

        Ok(Self {
            reader,
            byte_order,
            is_big_tiff,
        })
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn is_big_tiff(&self) -> bool {
        self.is_big_tiff
    }

    /// Reads every directory of the file
    pub fn read(&mut self) -> Result<Tiff> {
        let mut tiff = Tiff::new(self.is_big_tiff, self.byte_order);
        let header_len = if self.is_big_tiff { 8 } else { 4 };
        self.reader.seek(SeekFrom::Start(header_len))?;
        let mut next_offset = self.read_offset()?;
        let mut visited = HashSet::new();

        while next_offset != 0 {
            if tiff.ifd_count() >= MAX_IFDS || !visited.insert(next_offset) {
                return Err(Error::InvalidFormat("Directory chain loops or is too long".to_string()));
            }

            let (ifd, following) = self.read_ifd(tiff.ifd_count(), next_offset)?;
            tiff.add_ifd(ifd);
            next_offset = following;
        }

        if tiff.ifd_count() == 0 {
            return Err(Error::InvalidFormat("TIFF file has no image directory".to_string()));
        }
        Ok(tiff)
    }

    fn read_offset(&mut self) -> Result<u64> {
        if self.is_big_tiff {
            Ok(self.byte_order.read_u64(&mut self.reader)?)
        } else {
            Ok(self.byte_order.read_u32(&mut self.reader)? as u64)
        }
    }

    /// Reads the directory at `offset`; returns it with the offset of the next one
    fn read_ifd(&mut self, number: usize, offset: u64) -> Result<(IFD, u64)> {
        self.reader.seek(SeekFrom::Start(offset))?;

        let entry_count = if self.is_big_tiff {
            self.byte_order.read_u64(&mut self.reader)?
        } else {
            self.byte_order.read_u16(&mut self.reader)? as u64
        };
        if entry_count > u16::MAX as u64 {
            return Err(Error::InvalidFormat(format!("Directory with {} entries", entry_count)));
        }

        let mut tags = TagReader::new(&mut self.reader, self.byte_order, self.is_big_tiff);
        let raw = (0..entry_count)
            .map(|_| tags.read_raw())
            .collect::<Result<Vec<_>>>()?;

        // The next-directory pointer follows the last record.
        let next = if self.is_big_tiff {
            self.byte_order.read_u64(&mut self.reader)?
        } else {
            self.byte_order.read_u32(&mut self.reader)? as u64
        };

        let mut tags = TagReader::new(&mut self.reader, self.byte_order, self.is_big_tiff);
        let mut ifd = IFD::new(number, offset);
        for record in &raw {
            if let Some(entry) = tags.resolve(record)? {
                ifd.add_entry(entry);
            }
        }

        Ok((ifd, next))
    }
}

/// Memory-maps a file for chunk decoding
pub fn map_file(file: &File) -> Result<Mmap> {
    // Safety: the map is read-only and the store never writes through it;
    // files being modified by other processes while open are not supported.
    let mmap = unsafe { Mmap::map(file)? };

    #[cfg(unix)]
    unsafe {
        libc::madvise(
            mmap.as_ptr() as *mut libc::c_void,
            mmap.len(),
            libc::MADV_WILLNEED,
        );
    }

    Ok(mmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    /// Classic little-endian TIFF with one directory holding ImageWidth = 1024
    /// and a two-value BitsPerSample stored inline.
    fn minimal_tiff() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"II");
        data.extend_from_slice(&42u16.to_le_bytes());
        data.extend_from_slice(&8u32.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());

        data.extend_from_slice(&256u16.to_le_bytes());
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&1024u32.to_le_bytes());

        data.extend_from_slice(&258u16.to_le_bytes());
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&8u16.to_le_bytes());
        data.extend_from_slice(&16u16.to_le_bytes());

        data.extend_from_slice(&0u32.to_le_bytes());
        data
    }

    #[test]
    fn test_open_tiff() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&minimal_tiff()).unwrap();
        file.flush().unwrap();

        let mut reader = TiffReader::open(file.path()).unwrap();
        assert!(!reader.is_big_tiff());
        let tiff = reader.read().unwrap();
        assert_eq!(tiff.ifd_count(), 1);

        let ifd = tiff.main_ifd().unwrap();
        assert_eq!(ifd.get_u64(256), Some(1024));
        assert_eq!(ifd.get_u64s(258), Some(vec![8, 16]));
    }

    #[test]
    fn test_open_missing_file() {
        let err = TiffReader::open("/nonexistent/raster.tif").err().unwrap();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut data = minimal_tiff();
        data[2] = 41;
        assert!(matches!(TiffReader::new(Cursor::new(data)).err(), Some(Error::InvalidMagic(41))));

        let err = TiffReader::new(Cursor::new(b"PK\x03\x04".to_vec())).err().unwrap();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_directory_loop_detected() {
        let mut data = minimal_tiff();
        let len = data.len();
        data[len - 4..].copy_from_slice(&8u32.to_le_bytes());
        let mut reader = TiffReader::new(Cursor::new(data)).unwrap();
        assert!(matches!(reader.read(), Err(Error::InvalidFormat(_))));
    }
}
