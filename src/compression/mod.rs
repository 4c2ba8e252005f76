//! Decoders for compressed TIFF chunks

pub mod deflate;
pub mod lzw;
pub mod packbits;

use crate::error::{Error, Result};

/// Chunk compression schemes understood by the GeoTIFF reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression
    None,
    /// Deflate/ZIP compression (tag values 8 and 32946)
    Deflate,
    /// LZW compression
    Lzw,
    /// PackBits compression
    PackBits,
}

impl Compression {
    /// Creates compression from TIFF compression tag value
    pub fn from_tag(value: u64) -> Result<Self> {
        match value {
            1 => Ok(Compression::None),
            5 => Ok(Compression::Lzw),
            8 | 32946 => Ok(Compression::Deflate),
            32773 => Ok(Compression::PackBits),
            7 => Err(Error::Unsupported("JPEG compressed rasters".to_string())),
            _ => Err(Error::Unsupported(format!("Compression type {}", value))),
        }
    }

    /// TIFF tag value written for this scheme
    pub fn tag(&self) -> u16 {
        match self {
            Compression::None => 1,
            Compression::Lzw => 5,
            Compression::Deflate => 8,
            Compression::PackBits => 32773,
        }
    }

    /// Returns the name of this compression type
    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::Deflate => "Deflate/ZIP",
            Compression::Lzw => "LZW",
            Compression::PackBits => "PackBits",
        }
    }

    /// Decompresses one chunk. `expected_len` is the decoded size of a full
    /// chunk and is used to size the output buffer.
    pub fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Deflate => deflate::decompress(data, expected_len),
            Compression::Lzw => lzw::decompress(data, expected_len),
            Compression::PackBits => packbits::decompress(data, expected_len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_from_tag() {
        assert_eq!(Compression::from_tag(1).unwrap(), Compression::None);
        assert_eq!(Compression::from_tag(8).unwrap(), Compression::Deflate);
        assert_eq!(Compression::from_tag(32946).unwrap(), Compression::Deflate);
        assert_eq!(Compression::from_tag(5).unwrap(), Compression::Lzw);
        assert!(matches!(Compression::from_tag(7), Err(Error::Unsupported(_))));
        assert!(Compression::from_tag(50000).is_err());
    }

    #[test]
    fn test_tag_round_trip() {
        for c in [Compression::None, Compression::Lzw, Compression::Deflate, Compression::PackBits] {
            assert_eq!(Compression::from_tag(c.tag() as u64).unwrap(), c);
        }
    }

    #[test]
    fn test_no_compression() {
        let data = vec![1u8, 2, 3, 4];
        let result = Compression::None.decompress(&data, 4).unwrap();
        assert_eq!(result, data);
    }
}
