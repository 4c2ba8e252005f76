//! Byte order (endianness) handling
//!
//! TIFF files may be written in either byte order; everything that decodes
//! multi-byte values from a file goes through [`ByteOrder`].

use std::io::{self, Read, Result};
use crate::types::DataType;

/// Represents the byte order (endianness) of binary data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian byte order (least significant byte first)
    LittleEndian,
    /// Big-endian byte order (most significant byte first)
    BigEndian,
}

macro_rules! read_fn {
    ($name:ident, $ty:ty, $n:expr) => {
        pub fn $name<R: Read + ?Sized>(self, reader: &mut R) -> Result<$ty> {
            let mut buf = [0u8; $n];
            reader.read_exact(&mut buf)?;
            Ok(match self {
                ByteOrder::LittleEndian => <$ty>::from_le_bytes(buf),
                ByteOrder::BigEndian => <$ty>::from_be_bytes(buf),
            })
        }
    };
}

macro_rules! decode_fn {
    ($name:ident, $ty:ty, $n:expr) => {
        /// Decodes a value from the first bytes of `bytes`; panics if the slice is too short
        pub fn $name(self, bytes: &[u8]) -> $ty {
            let mut buf = [0u8; $n];
            buf.copy_from_slice(&bytes[..$n]);
            match self {
                ByteOrder::LittleEndian => <$ty>::from_le_bytes(buf),
                ByteOrder::BigEndian => <$ty>::from_be_bytes(buf),
            }
        }
    };
}

impl ByteOrder {
    /// Detects byte order from TIFF magic bytes
    ///
    /// TIFF files start with either "II" (0x4949) for little-endian
    /// or "MM" (0x4D4D) for big-endian.
    pub fn from_tiff_magic(magic: [u8; 2]) -> Option<Self> {
        match &magic {
            b"II" => Some(ByteOrder::LittleEndian),
            b"MM" => Some(ByteOrder::BigEndian),
            _ => None,
        }
    }

    /// Reads the first two bytes of a stream and identifies the byte order
    pub fn detect<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 2];
        reader.read_exact(&mut magic)?;

        Self::from_tiff_magic(magic).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid byte order magic bytes: {:02X}{:02X}", magic[0], magic[1]),
            )
        })
    }

    read_fn!(read_u16, u16, 2);
    read_fn!(read_u32, u32, 4);
    read_fn!(read_u64, u64, 8);

    decode_fn!(u16_at, u16, 2);
    decode_fn!(i16_at, i16, 2);
    decode_fn!(u32_at, u32, 4);
    decode_fn!(i32_at, i32, 4);
    decode_fn!(u64_at, u64, 8);
    decode_fn!(i64_at, i64, 8);
    decode_fn!(f32_at, f32, 4);
    decode_fn!(f64_at, f64, 8);

    /// Decodes one sample of `data_type` as f64.
    ///
    /// Complex samples yield their real part.
    pub fn decode_sample(self, data_type: DataType, bytes: &[u8]) -> f64 {
        match data_type {
            DataType::U8 => bytes[0] as f64,
            DataType::I8 => bytes[0] as i8 as f64,
            DataType::U16 => self.u16_at(bytes) as f64,
            DataType::I16 | DataType::CI16 => self.i16_at(bytes) as f64,
            DataType::U32 => self.u32_at(bytes) as f64,
            DataType::I32 | DataType::CI32 => self.i32_at(bytes) as f64,
            DataType::F32 | DataType::CF32 => self.f32_at(bytes) as f64,
            DataType::F64 | DataType::CF64 => self.f64_at(bytes),
        }
    }

    /// Encodes `value` as one sample of `data_type` into `out`.
    ///
    /// Integer types saturate. Complex samples get a zero imaginary part.
    pub fn encode_sample(self, data_type: DataType, value: f64, out: &mut [u8]) {
        macro_rules! put {
            ($v:expr) => {{
                let v = $v;
                let bytes = match self {
                    ByteOrder::LittleEndian => v.to_le_bytes(),
                    ByteOrder::BigEndian => v.to_be_bytes(),
                };
                out[..bytes.len()].copy_from_slice(&bytes);
            }};
        }

        match data_type {
            DataType::U8 => out[0] = value as u8,
            DataType::I8 => out[0] = value as i8 as u8,
            DataType::U16 => put!(value as u16),
            DataType::I16 => put!(value as i16),
            DataType::U32 => put!(value as u32),
            DataType::I32 => put!(value as i32),
            DataType::F32 => put!(value as f32),
            DataType::F64 => put!(value),
            DataType::CI16 | DataType::CI32 | DataType::CF32 | DataType::CF64 => {
                out[..data_type.size()].fill(0);
                let half = data_type.size() / 2;
                let real = match data_type {
                    DataType::CI16 => DataType::I16,
                    DataType::CI32 => DataType::I32,
                    DataType::CF32 => DataType::F32,
                    _ => DataType::F64,
                };
                self.encode_sample(real, value, &mut out[..half]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_from_tiff_magic() {
        assert_eq!(ByteOrder::from_tiff_magic(*b"II"), Some(ByteOrder::LittleEndian));
        assert_eq!(ByteOrder::from_tiff_magic(*b"MM"), Some(ByteOrder::BigEndian));
        assert_eq!(ByteOrder::from_tiff_magic(*b"XX"), None);
    }

    #[test]
    fn test_detect_rejects_garbage() {
        let mut cursor = Cursor::new(vec![0x12, 0x34]);
        let err = ByteOrder::detect(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_stream_reads_both_orders() {
        let bytes = vec![0x12, 0x34, 0x00, 0x00, 0x00, 0x01];

        let mut le = Cursor::new(bytes.clone());
        assert_eq!(ByteOrder::LittleEndian.read_u16(&mut le).unwrap(), 0x3412);
        assert_eq!(ByteOrder::LittleEndian.read_u32(&mut le).unwrap(), 0x0100_0000);

        let mut be = Cursor::new(bytes);
        assert_eq!(ByteOrder::BigEndian.read_u16(&mut be).unwrap(), 0x1234);
        assert_eq!(ByteOrder::BigEndian.read_u32(&mut be).unwrap(), 1);
    }

    #[test]
    fn test_decode_samples() {
        let be = ByteOrder::BigEndian;
        assert_eq!(be.decode_sample(DataType::I16, &[0xFF, 0xFE]), -2.0);
        assert_eq!(be.decode_sample(DataType::U16, &[0x01, 0x00]), 256.0);
        assert_eq!(ByteOrder::LittleEndian.decode_sample(DataType::F32, &1.5f32.to_le_bytes()), 1.5);
        assert_eq!(ByteOrder::LittleEndian.decode_sample(DataType::I8, &[0xFF]), -1.0);
    }

    #[test]
    fn test_encode_samples() {
        let mut out = [0u8; 8];
        ByteOrder::LittleEndian.encode_sample(DataType::U16, 513.0, &mut out);
        assert_eq!(&out[..2], &[0x01, 0x02]);

        ByteOrder::BigEndian.encode_sample(DataType::F64, -0.25, &mut out);
        assert_eq!(ByteOrder::BigEndian.f64_at(&out), -0.25);

        ByteOrder::LittleEndian.encode_sample(DataType::U8, 999.0, &mut out);
        assert_eq!(out[0], 255);

        let mut complex = [0xAAu8; 8];
        ByteOrder::LittleEndian.encode_sample(DataType::CI32, 7.0, &mut complex);
        assert_eq!(ByteOrder::LittleEndian.decode_sample(DataType::CI32, &complex), 7.0);
        assert_eq!(&complex[4..], &[0, 0, 0, 0]);
    }
}
