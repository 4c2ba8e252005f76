//! Core data types for rastercache

use std::fmt;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

/// Represents sample data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Unsigned 8-bit integer
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// Unsigned 32-bit integer
    U32,
    /// Signed 8-bit integer
    I8,
    /// Signed 16-bit integer
    I16,
    /// Signed 32-bit integer
    I32,
    /// 32-bit floating point
    F32,
    /// 64-bit floating point
    F64,
    /// Complex of two signed 16-bit integers
    CI16,
    /// Complex of two signed 32-bit integers
    CI32,
    /// Complex of two 32-bit floats
    CF32,
    /// Complex of two 64-bit floats
    CF64,
}

impl DataType {
    /// Returns the size in bytes for this data type
    pub fn size(&self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 | DataType::CI16 => 4,
            DataType::F64 | DataType::CI32 | DataType::CF32 => 8,
            DataType::CF64 => 16,
        }
    }

    /// Returns the name of this data type
    pub fn name(&self) -> &'static str {
        match self {
            DataType::U8 => "U8",
            DataType::U16 => "U16",
            DataType::U32 => "U32",
            DataType::I8 => "I8",
            DataType::I16 => "I16",
            DataType::I32 => "I32",
            DataType::F32 => "F32",
            DataType::F64 => "F64",
            DataType::CI16 => "CI16",
            DataType::CI32 => "CI32",
            DataType::CF32 => "CF32",
            DataType::CF64 => "CF64",
        }
    }

    /// Whether samples hold a real and an imaginary part
    pub fn is_complex(&self) -> bool {
        matches!(self, DataType::CI16 | DataType::CI32 | DataType::CF32 | DataType::CF64)
    }

    /// Whether every value of this type is exactly representable as f32
    pub fn fits_f32(&self) -> bool {
        matches!(
            self,
            DataType::U8 | DataType::I8 | DataType::U16 | DataType::I16 | DataType::F32
        )
    }

    /// TIFF SampleFormat and BitsPerSample values for this type
    pub fn tiff_sample_format(&self) -> (u16, u16) {
        let bits = (self.size() * 8) as u16;
        match self {
            DataType::U8 | DataType::U16 | DataType::U32 => (1, bits),
            DataType::I8 | DataType::I16 | DataType::I32 => (2, bits),
            DataType::F32 | DataType::F64 => (3, bits),
            DataType::CI16 | DataType::CI32 => (5, bits),
            DataType::CF32 | DataType::CF64 => (6, bits),
        }
    }

    /// Maps TIFF SampleFormat and BitsPerSample to a data type
    pub fn from_tiff(sample_format: u64, bits: u64) -> Option<Self> {
        match (sample_format, bits) {
            (1, 8) => Some(DataType::U8),
            (1, 16) => Some(DataType::U16),
            (1, 32) => Some(DataType::U32),
            (2, 8) => Some(DataType::I8),
            (2, 16) => Some(DataType::I16),
            (2, 32) => Some(DataType::I32),
            (3, 32) => Some(DataType::F32),
            (3, 64) => Some(DataType::F64),
            (5, 32) => Some(DataType::CI16),
            (5, 64) => Some(DataType::CI32),
            (6, 64) => Some(DataType::CF32),
            (6, 128) => Some(DataType::CF64),
            _ => None,
        }
    }

    /// Converts a value to the nearest value representable by this type.
    /// Integer types saturate; complex types keep the real part as given.
    pub fn cast(&self, value: f64) -> f64 {
        match self {
            DataType::U8 => value as u8 as f64,
            DataType::I8 => value as i8 as f64,
            DataType::U16 => value as u16 as f64,
            DataType::I16 => value as i16 as f64,
            DataType::U32 => value as u32 as f64,
            DataType::I32 => value as i32 as f64,
            DataType::F32 => value as f32 as f64,
            DataType::F64 | DataType::CI16 | DataType::CI32 | DataType::CF32 | DataType::CF64 => value,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A primitive type that can be written to a raster band
pub trait Sample: Copy + Send + Sync + 'static {
    /// The raster data type this sample type writes
    const DATA_TYPE: DataType;

    /// Widens the sample to f64 (lossless for every implementor)
    fn to_f64(self) -> f64;
}

macro_rules! impl_sample {
    ($($ty:ty => $dt:ident),* $(,)?) => {
        $(
            impl Sample for $ty {
                const DATA_TYPE: DataType = DataType::$dt;

                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_sample!(
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    f32 => F32,
    f64 => F64,
);

/// Floating-point type decoded samples are stored as
pub trait DecodedSample: Copy + Send + Sync {
    fn from_f64(value: f64) -> Self;
}

impl DecodedSample for f32 {
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl DecodedSample for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }
}

/// Represents image dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    /// Width in pixels
    pub width: u64,
    /// Height in pixels
    pub height: u64,
}

impl Dimensions {
    /// Creates new dimensions
    pub fn new(width: u64, height: u64) -> Self {
        Self { width, height }
    }

    /// Returns the total number of pixels
    pub fn pixel_count(&self) -> u64 {
        self.width * self.height
    }
}

/// Axis-aligned pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub x_off: u64,
    pub y_off: u64,
    pub width: u64,
    pub height: u64,
}

impl Window {
    pub fn new(x_off: u64, y_off: u64, width: u64, height: u64) -> Self {
        Self { x_off, y_off, width, height }
    }

    /// Window covering a whole raster
    pub fn full(width: u64, height: u64) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn x_end(&self) -> u64 {
        self.x_off.saturating_add(self.width)
    }

    pub fn y_end(&self) -> u64 {
        self.y_off.saturating_add(self.height)
    }

    /// Number of pixels, saturating at `usize::MAX`
    pub fn pixel_count(&self) -> usize {
        usize::try_from(self.width.saturating_mul(self.height)).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the two windows share at least one pixel
    pub fn intersects(&self, other: &Window) -> bool {
        self.x_off < other.x_end()
            && other.x_off < self.x_end()
            && self.y_off < other.y_end()
            && other.y_off < self.y_end()
    }

    /// Fails unless the window is non-empty and lies inside a `width` x `height` raster
    pub fn check_within(&self, width: u64, height: u64) -> Result<()> {
        if self.is_empty() {
            return Err(Error::OutOfBounds(format!("Empty window {:?}", self)));
        }
        if self.x_end() > width || self.y_end() > height {
            return Err(Error::OutOfBounds(format!(
                "Window ({}, {}) + ({}, {}) outside raster ({}, {})",
                self.x_off, self.y_off, self.width, self.height, width, height
            )));
        }
        Ok(())
    }
}

/// Affine pixel-to-georeferenced transform in GDAL order:
/// `[origin_x, pixel_width, row_rotation, origin_y, column_rotation, pixel_height]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    pub const IDENTITY: GeoTransform = GeoTransform([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    pub fn coefficients(&self) -> [f64; 6] {
        self.0
    }

    /// True when both rotation terms are zero
    pub fn is_north_up(&self) -> bool {
        self.0[2] == 0.0 && self.0[4] == 0.0
    }

    fn require_north_up(&self) -> Result<()> {
        if self.is_north_up() {
            Ok(())
        } else {
            Err(Error::NotNorthUp(self.0[2], self.0[4]))
        }
    }

    /// Converts pixel coordinates to georeferenced coordinates
    pub fn pixel_to_geo(&self, x: f64, y: f64) -> (f64, f64) {
        let t = &self.0;
        (t[0] + t[1] * x + t[2] * y, t[3] + t[4] * x + t[5] * y)
    }

    /// Converts georeferenced coordinates to pixel coordinates
    pub fn geo_to_pixel(&self, geo_x: f64, geo_y: f64) -> Option<(f64, f64)> {
        let t = &self.0;
        let det = t[1] * t[5] - t[2] * t[4];
        if det.abs() < 1e-15 {
            return None;
        }

        let dx = geo_x - t[0];
        let dy = geo_y - t[3];
        Some(((t[5] * dx - t[2] * dy) / det, (t[1] * dy - t[4] * dx) / det))
    }

    /// Pixel size (x, y) in georeferenced units; y is usually negative
    pub fn pixel_size(&self) -> Result<(f64, f64)> {
        self.require_north_up()?;
        Ok((self.0[1], self.0[5]))
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` of a `width` x `height` raster
    pub fn bounds(&self, width: u64, height: u64) -> Result<(f64, f64, f64, f64)> {
        self.require_north_up()?;
        let (x0, y0) = (self.0[0], self.0[3]);
        let x1 = x0 + self.0[1] * width as f64;
        let y1 = y0 + self.0[5] * height as f64;
        Ok((x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)))
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Colour interpretation of a band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorInterp {
    Undefined,
    Gray,
    Palette,
    Red,
    Green,
    Blue,
    Alpha,
}

impl ColorInterp {
    pub fn name(&self) -> &'static str {
        match self {
            ColorInterp::Undefined => "Undefined",
            ColorInterp::Gray => "Gray",
            ColorInterp::Palette => "Palette",
            ColorInterp::Red => "Red",
            ColorInterp::Green => "Green",
            ColorInterp::Blue => "Blue",
            ColorInterp::Alpha => "Alpha",
        }
    }
}

/// How colour table entries are to be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaletteInterp {
    Gray,
    Rgb,
    Cmyk,
    Hls,
}

/// One colour table entry; meaning of the components depends on [`PaletteInterp`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorEntry {
    pub c1: u16,
    pub c2: u16,
    pub c3: u16,
    pub c4: u16,
}

impl ColorEntry {
    pub fn rgb(r: u16, g: u16, b: u16) -> Self {
        Self { c1: r, c2: g, c3: b, c4: 255 }
    }
}

/// Palette of a palette-indexed band; entry index is the palette code
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTable {
    interp: PaletteInterp,
    entries: Vec<ColorEntry>,
}

impl ColorTable {
    pub fn new(interp: PaletteInterp, entries: Vec<ColorEntry>) -> Self {
        Self { interp, entries }
    }

    /// Builds an RGB table from `(r, g, b)` triples
    pub fn from_rgb(colors: &[(u16, u16, u16)]) -> Self {
        let entries = colors.iter().map(|&(r, g, b)| ColorEntry::rgb(r, g, b)).collect();
        Self::new(PaletteInterp::Rgb, entries)
    }

    pub fn interpretation(&self) -> PaletteInterp {
        self.interp
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ColorEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[ColorEntry] {
        &self.entries
    }
}
