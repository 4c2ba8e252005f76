//! Directory entry decoding
//!
//! Entries are read in two passes: the fixed-size records of a directory
//! first, then each value, either from the record's inline field or from the
//! offset it points to.

use std::io::Read;

use crate::error::{Error, Result};
use crate::formats::tiff::ifd::{IFDEntry, TagValue};
use crate::formats::tiff::tags::{field_type_size, field_types};
use crate::io::{BufferedReader, ByteOrder, SeekableReader};

/// Values larger than this are treated as a corrupt directory
const MAX_TAG_BYTES: usize = 256 * 1024 * 1024;

/// A directory record before its value has been resolved
#[derive(Debug, Clone, Copy)]
pub struct RawEntry {
    pub tag: u16,
    pub field_type: u16,
    pub count: u64,
    /// Inline value field, 4 bytes used for classic TIFF and 8 for BigTIFF
    pub field: [u8; 8],
}

/// Handles reading tag values from TIFF files
pub struct TagReader<'a, R: SeekableReader> {
    reader: &'a mut BufferedReader<R>,
    byte_order: ByteOrder,
    is_big_tiff: bool,
}

impl<'a, R: SeekableReader> TagReader<'a, R> {
    pub fn new(reader: &'a mut BufferedReader<R>, byte_order: ByteOrder, is_big_tiff: bool) -> Self {
        Self {
            reader,
            byte_order,
            is_big_tiff,
        }
    }

    /// Reads one fixed-size record at the current position
    pub fn read_raw(&mut self) -> Result<RawEntry> {
        let order = self.byte_order;
        let tag = order.read_u16(&mut *self.reader)?;
        let field_type = order.read_u16(&mut *self.reader)?;
        let mut field = [0u8; 8];

        let count = if self.is_big_tiff {
            let count = order.read_u64(&mut *self.reader)?;
            self.reader.read_exact(&mut field)?;
            count
        } else {
            let count = order.read_u32(&mut *self.reader)? as u64;
            self.reader.read_exact(&mut field[..4])?;
            count
        };

        Ok(RawEntry { tag, field_type, count, field })
    }

    /// Resolves the value of a record. Records with an unknown field type
    /// are skipped (`None`).
    pub fn resolve(&mut self, raw: &RawEntry) -> Result<Option<IFDEntry>> {
        let Some(size) = field_type_size(raw.field_type) else {
            tracing::debug!(tag = raw.tag, field_type = raw.field_type, "skipping tag of unknown type");
            return Ok(None);
        };

        let total = usize::try_from(raw.count)
            .ok()
            .and_then(|count| count.checked_mul(size))
            .filter(|&total| total <= MAX_TAG_BYTES)
            .ok_or_else(|| {
                Error::InvalidFormat(format!("Tag {} declares {} values", raw.tag, raw.count))
            })?;

        let inline_len = if self.is_big_tiff { 8 } else { 4 };
        let value = if total <= inline_len {
            decode_values(self.byte_order, raw.field_type, &raw.field[..total])
        } else {
            let offset = if self.is_big_tiff {
                self.byte_order.u64_at(&raw.field)
            } else {
                self.byte_order.u32_at(&raw.field) as u64
            };
            let bytes = self.reader.read_at(offset, total)?;
            decode_values(self.byte_order, raw.field_type, &bytes)
        };

        Ok(value.map(|value| IFDEntry::new(raw.tag, raw.field_type, raw.count, value)))
    }
}

/// Decodes the packed values of a known field type
pub fn decode_values(order: ByteOrder, field_type: u16, bytes: &[u8]) -> Option<TagValue> {
    use field_types::*;

    let value = match field_type {
        BYTE => TagValue::Unsigned(bytes.iter().map(|&b| b as u64).collect()),
        SBYTE => TagValue::Signed(bytes.iter().map(|&b| b as i8 as i64).collect()),
        UNDEFINED => TagValue::Undefined(bytes.to_vec()),
        ASCII => {
            let text = String::from_utf8_lossy(bytes);
            TagValue::Ascii(text.trim_end_matches('\0').to_string())
        }
        SHORT => TagValue::Unsigned(bytes.chunks_exact(2).map(|c| order.u16_at(c) as u64).collect()),
        SSHORT => TagValue::Signed(bytes.chunks_exact(2).map(|c| order.i16_at(c) as i64).collect()),
        LONG => TagValue::Unsigned(bytes.chunks_exact(4).map(|c| order.u32_at(c) as u64).collect()),
        SLONG => TagValue::Signed(bytes.chunks_exact(4).map(|c| order.i32_at(c) as i64).collect()),
        LONG8 | IFD8 => TagValue::Unsigned(bytes.chunks_exact(8).map(|c| order.u64_at(c)).collect()),
        SLONG8 => TagValue::Signed(bytes.chunks_exact(8).map(|c| order.i64_at(c)).collect()),
        FLOAT => TagValue::Float(bytes.chunks_exact(4).map(|c| order.f32_at(c) as f64).collect()),
        DOUBLE => TagValue::Float(bytes.chunks_exact(8).map(|c| order.f64_at(c)).collect()),
        RATIONAL => TagValue::Float(
            bytes
                .chunks_exact(8)
                .map(|c| order.u32_at(c) as f64 / order.u32_at(&c[4..]) as f64)
                .collect(),
        ),
        SRATIONAL => TagValue::Float(
            bytes
                .chunks_exact(8)
                .map(|c| order.i32_at(c) as f64 / order.i32_at(&c[4..]) as f64)
                .collect(),
        ),
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(data: Vec<u8>) -> BufferedReader<Cursor<Vec<u8>>> {
        BufferedReader::new(Cursor::new(data))
    }

    #[test]
    fn test_inline_shorts_keep_file_order() {
        let mut record = Vec::new();
        record.extend_from_slice(&258u16.to_be_bytes());
        record.extend_from_slice(&field_types::SHORT.to_be_bytes());
        record.extend_from_slice(&2u32.to_be_bytes());
        record.extend_from_slice(&[0x00, 0x08, 0x00, 0x10]);

        let mut r = reader(record);
        let mut tags = TagReader::new(&mut r, ByteOrder::BigEndian, false);
        let raw = tags.read_raw().unwrap();
        let entry = tags.resolve(&raw).unwrap().unwrap();

        assert_eq!(entry.tag, 258);
        assert_eq!(entry.value, TagValue::Unsigned(vec![8, 16]));
    }

    #[test]
    fn test_offset_doubles() {
        let mut data = Vec::new();
        data.extend_from_slice(&33550u16.to_le_bytes());
        data.extend_from_slice(&field_types::DOUBLE.to_le_bytes());
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&12u32.to_le_bytes());
        for v in [0.5f64, -0.5, 0.0] {
            data.extend_from_slice(&v.to_le_bytes());
        }

        let mut r = reader(data);
        let mut tags = TagReader::new(&mut r, ByteOrder::LittleEndian, false);
        let raw = tags.read_raw().unwrap();
        let entry = tags.resolve(&raw).unwrap().unwrap();
        assert_eq!(entry.value, TagValue::Float(vec![0.5, -0.5, 0.0]));
    }

    #[test]
    fn test_bigtiff_inline_longs() {
        let mut data = Vec::new();
        data.extend_from_slice(&324u16.to_le_bytes());
        data.extend_from_slice(&field_types::LONG.to_le_bytes());
        data.extend_from_slice(&2u64.to_le_bytes());
        data.extend_from_slice(&100u32.to_le_bytes());
        data.extend_from_slice(&200u32.to_le_bytes());

        let mut r = reader(data);
        let mut tags = TagReader::new(&mut r, ByteOrder::LittleEndian, true);
        let raw = tags.read_raw().unwrap();
        assert_eq!(raw.count, 2);
        let entry = tags.resolve(&raw).unwrap().unwrap();
        assert_eq!(entry.value, TagValue::Unsigned(vec![100, 200]));
    }

    #[test]
    fn test_unknown_type_is_skipped() {
        let raw = RawEntry { tag: 1, field_type: 99, count: 1, field: [0; 8] };
        let mut r = reader(Vec::new());
        let mut tags = TagReader::new(&mut r, ByteOrder::LittleEndian, false);
        assert!(tags.resolve(&raw).unwrap().is_none());
    }

    #[test]
    fn test_value_past_end_of_file() {
        let mut field = [0u8; 8];
        field[..4].copy_from_slice(&64u32.to_le_bytes());
        let raw = RawEntry { tag: 273, field_type: field_types::LONG, count: 4, field };
        let mut r = reader(vec![0u8; 32]);
        let mut tags = TagReader::new(&mut r, ByteOrder::LittleEndian, false);
        assert!(matches!(tags.resolve(&raw), Err(Error::Io(_))));
    }

    #[test]
    fn test_decode_ascii_and_rational() {
        let text = decode_values(ByteOrder::LittleEndian, field_types::ASCII, b"WGS 84|\0").unwrap();
        assert_eq!(text.as_ascii(), Some("WGS 84|"));

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&4u32.to_le_bytes());
        let ratio = decode_values(ByteOrder::LittleEndian, field_types::RATIONAL, &bytes).unwrap();
        assert_eq!(ratio, TagValue::Float(vec![0.75]));
    }
}
