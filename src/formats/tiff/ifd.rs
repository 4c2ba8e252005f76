//! Image File Directory (IFD) structures

use std::collections::HashMap;
use crate::types::{DataType, Dimensions};
use super::tags;

/// Decoded values of one directory entry
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// BYTE, SHORT, LONG, LONG8 and IFD8 values
    Unsigned(Vec<u64>),
    /// SBYTE, SSHORT, SLONG and SLONG8 values
    Signed(Vec<i64>),
    /// FLOAT, DOUBLE and (S)RATIONAL values
    Float(Vec<f64>),
    /// NUL-terminated text, terminator removed
    Ascii(String),
    /// UNDEFINED bytes
    Undefined(Vec<u8>),
}

impl TagValue {
    /// Number of decoded values
    pub fn len(&self) -> usize {
        match self {
            TagValue::Unsigned(v) => v.len(),
            TagValue::Signed(v) => v.len(),
            TagValue::Float(v) => v.len(),
            TagValue::Ascii(s) => s.len(),
            TagValue::Undefined(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values as unsigned integers; negative values are rejected
    pub fn as_u64s(&self) -> Option<Vec<u64>> {
        match self {
            TagValue::Unsigned(v) => Some(v.clone()),
            TagValue::Signed(v) => v.iter().map(|&x| u64::try_from(x).ok()).collect(),
            TagValue::Undefined(v) => Some(v.iter().map(|&b| b as u64).collect()),
            _ => None,
        }
    }

    /// Values widened to f64
    pub fn as_f64s(&self) -> Option<Vec<f64>> {
        match self {
            TagValue::Unsigned(v) => Some(v.iter().map(|&x| x as f64).collect()),
            TagValue::Signed(v) => Some(v.iter().map(|&x| x as f64).collect()),
            TagValue::Float(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// First value as an unsigned integer
    pub fn first_u64(&self) -> Option<u64> {
        match self {
            TagValue::Unsigned(v) => v.first().copied(),
            TagValue::Signed(v) => v.first().and_then(|&x| u64::try_from(x).ok()),
            TagValue::Undefined(v) => v.first().map(|&b| b as u64),
            _ => None,
        }
    }

    pub fn as_ascii(&self) -> Option<&str> {
        match self {
            TagValue::Ascii(s) => Some(s),
            _ => None,
        }
    }
}

/// Represents an Image File Directory entry
#[derive(Debug, Clone)]
pub struct IFDEntry {
    /// TIFF tag identifier
    pub tag: u16,
    /// Field type
    pub field_type: u16,
    /// Number of values
    pub count: u64,
    /// Resolved values, whether stored inline or at an offset
    pub value: TagValue,
}

impl IFDEntry {
    pub fn new(tag: u16, field_type: u16, count: u64, value: TagValue) -> Self {
        Self { tag, field_type, count, value }
    }
}

/// Represents an Image File Directory
#[derive(Debug, Clone)]
pub struct IFD {
    /// IFD number (0-based)
    pub number: usize,
    /// Offset to this IFD in file
    pub offset: u64,
    /// Entries in this IFD
    pub entries: Vec<IFDEntry>,
    /// Tag map for quick lookup
    tag_map: HashMap<u16, usize>,
}

impl IFD {
    /// Creates a new IFD
    pub fn new(number: usize, offset: u64) -> Self {
        Self {
            number,
            offset,
            entries: Vec::new(),
            tag_map: HashMap::new(),
        }
    }

    /// Adds an entry to this IFD
    pub fn add_entry(&mut self, entry: IFDEntry) {
        let index = self.entries.len();
        self.tag_map.insert(entry.tag, index);
        self.entries.push(entry);
    }

    /// Gets an entry by tag
    pub fn get_entry(&self, tag: u16) -> Option<&IFDEntry> {
        self.tag_map.get(&tag).and_then(|&idx| self.entries.get(idx))
    }

    /// First value of a tag as u64
    pub fn get_u64(&self, tag: u16) -> Option<u64> {
        self.get_entry(tag).and_then(|e| e.value.first_u64())
    }

    /// All values of a tag as u64
    pub fn get_u64s(&self, tag: u16) -> Option<Vec<u64>> {
        self.get_entry(tag).and_then(|e| e.value.as_u64s())
    }

    /// All values of a tag as f64
    pub fn get_f64s(&self, tag: u16) -> Option<Vec<f64>> {
        self.get_entry(tag).and_then(|e| e.value.as_f64s())
    }

    /// Text value of an ASCII tag
    pub fn get_ascii(&self, tag: u16) -> Option<&str> {
        self.get_entry(tag).and_then(|e| e.value.as_ascii())
    }

    /// Returns image dimensions if available
    pub fn dimensions(&self) -> Option<Dimensions> {
        let width = self.get_u64(tags::IMAGE_WIDTH)?;
        let height = self.get_u64(tags::IMAGE_LENGTH)?;
        Some(Dimensions::new(width, height))
    }

    /// Compression tag value, 1 (none) when absent
    pub fn compression(&self) -> u64 {
        self.get_u64(tags::COMPRESSION).unwrap_or(1)
    }

    /// Returns samples per pixel
    pub fn samples_per_pixel(&self) -> u64 {
        self.get_u64(tags::SAMPLES_PER_PIXEL).unwrap_or(1)
    }

    /// Bits per sample of the first sample, 1 when absent
    pub fn bits_per_sample(&self) -> u64 {
        self.get_u64(tags::BITS_PER_SAMPLE).unwrap_or(1)
    }

    /// Returns sample format (1=unsigned, 2=signed, 3=float)
    pub fn sample_format(&self) -> u64 {
        self.get_u64(tags::SAMPLE_FORMAT).unwrap_or(1)
    }

    /// Pixel data type, `None` for sample layouts without a [`DataType`]
    pub fn data_type(&self) -> Option<DataType> {
        DataType::from_tiff(self.sample_format(), self.bits_per_sample())
    }

    /// 1 = chunky (interleaved samples), 2 = planar (one plane per sample)
    pub fn planar_configuration(&self) -> u64 {
        self.get_u64(tags::PLANAR_CONFIGURATION).unwrap_or(1)
    }

    pub fn predictor(&self) -> u64 {
        self.get_u64(tags::PREDICTOR).unwrap_or(1)
    }

    pub fn photometric(&self) -> Option<u64> {
        self.get_u64(tags::PHOTOMETRIC_INTERPRETATION)
    }

    /// Whether NewSubfileType marks this directory as a reduced-resolution image
    pub fn is_reduced_resolution(&self) -> bool {
        self.get_u64(tags::NEW_SUBFILE_TYPE).unwrap_or(0) & 1 == 1
    }

    /// Returns whether this IFD represents a tiled image
    pub fn is_tiled(&self) -> bool {
        self.get_entry(tags::TILE_WIDTH).is_some()
    }

    /// Returns tile dimensions if tiled
    pub fn tile_dimensions(&self) -> Option<Dimensions> {
        let width = self.get_u64(tags::TILE_WIDTH)?;
        let height = self.get_u64(tags::TILE_LENGTH)?;
        Some(Dimensions::new(width, height))
    }

    /// Returns number of entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Checks if this IFD has GeoTIFF tags
    pub fn is_geotiff(&self) -> bool {
        self.entries.iter().any(|e| {
            matches!(
                e.tag,
                tags::MODEL_PIXEL_SCALE
                    | tags::MODEL_TIEPOINT
                    | tags::MODEL_TRANSFORMATION
                    | tags::GEO_KEY_DIRECTORY
            )
        })
    }
}
