//! Raster stores
//!
//! A [`RasterStore`] is the backend the block cache and the normalizer read
//! from: it owns the pixel data of one raster and answers windowed reads and
//! writes. Two stores ship with the crate: [`MemoryStore`] and
//! [`GeoTiffStore`].

pub mod memory;
pub mod geotiff;

use serde::Serialize;
use crate::compression::Compression;
use crate::error::{Error, Result};
use crate::types::{ColorInterp, ColorTable, DataType, GeoTransform, Window};

pub use memory::MemoryStore;
pub use geotiff::GeoTiffStore;

/// Summary statistics of one band, no-data samples excluded
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandStatistics {
    pub minimum: f64,
    pub maximum: f64,
    pub mean: f64,
    pub std_dev: f64,
}

/// Streaming min/max/mean/standard deviation (Welford)
#[derive(Debug, Clone)]
pub struct StatisticsAccumulator {
    no_data: Option<f64>,
    count: u64,
    minimum: f64,
    maximum: f64,
    mean: f64,
    m2: f64,
}

impl StatisticsAccumulator {
    pub fn new(no_data: Option<f64>) -> Self {
        Self {
            no_data,
            count: 0,
            minimum: f64::INFINITY,
            maximum: f64::NEG_INFINITY,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Accumulator for a band; the no-data sentinel is compared after it
    /// is rounded to the band's data type, as stored samples are.
    pub fn for_band(info: &BandInfo) -> Self {
        Self::new(info.no_data.map(|v| info.data_type.cast(v)))
    }

    /// Adds a sample; NaN and no-data samples are ignored
    pub fn add(&mut self, value: f64) {
        if value.is_nan() || self.no_data == Some(value) {
            return;
        }
        self.count += 1;
        self.minimum = self.minimum.min(value);
        self.maximum = self.maximum.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Population statistics; fails when every sample was ignored
    pub fn finish(&self) -> Result<BandStatistics> {
        if self.count == 0 {
            return Err(Error::Store("No valid samples to compute statistics from".to_string()));
        }
        Ok(BandStatistics {
            minimum: self.minimum,
            maximum: self.maximum,
            mean: self.mean,
            std_dev: (self.m2 / self.count as f64).sqrt(),
        })
    }
}

/// Per-band metadata kept by a store
#[derive(Debug, Clone, PartialEq)]
pub struct BandInfo {
    pub data_type: DataType,
    pub color_interp: ColorInterp,
    pub color_table: Option<ColorTable>,
    pub no_data: Option<f64>,
    pub statistics: Option<BandStatistics>,
}

impl BandInfo {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            color_interp: ColorInterp::Undefined,
            color_table: None,
            no_data: None,
            statistics: None,
        }
    }

    pub fn with_color_interp(mut self, interp: ColorInterp) -> Self {
        self.color_interp = interp;
        self
    }

    pub fn with_no_data(mut self, no_data: Option<f64>) -> Self {
        self.no_data = no_data;
        self
    }

    /// Stored minimum, if statistics are known
    pub fn minimum(&self) -> Option<f64> {
        self.statistics.map(|s| s.minimum)
    }

    /// Stored maximum, if statistics are known
    pub fn maximum(&self) -> Option<f64> {
        self.statistics.map(|s| s.maximum)
    }
}

/// Parameters for creating a new single-band raster
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOptions {
    pub width: u64,
    pub height: u64,
    pub data_type: DataType,
    pub geotransform: GeoTransform,
    pub projection: String,
    pub no_data_value: Option<f64>,
}

impl CreateOptions {
    pub fn new(width: u64, height: u64, data_type: DataType) -> Self {
        Self {
            width,
            height,
            data_type,
            geotransform: GeoTransform::IDENTITY,
            projection: String::new(),
            no_data_value: None,
        }
    }

    pub fn with_geotransform(mut self, geotransform: GeoTransform) -> Self {
        self.geotransform = geotransform;
        self
    }

    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = projection.into();
        self
    }

    pub fn with_no_data(mut self, no_data: Option<f64>) -> Self {
        self.no_data_value = no_data;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::OutOfBounds(format!(
                "Cannot create a {} x {} raster",
                self.width, self.height
            )));
        }
        if self.data_type.is_complex() {
            return Err(Error::Unsupported(format!("Creating {} rasters", self.data_type)));
        }
        Ok(())
    }
}

/// Backend holding the pixels of one raster
pub trait RasterStore {
    fn width(&self) -> u64;

    fn height(&self) -> u64;

    fn band_count(&self) -> usize;

    fn geotransform(&self) -> GeoTransform;

    fn projection(&self) -> &str;

    /// Metadata of band `index` (0-based)
    fn band(&self, index: usize) -> Result<&BandInfo>;

    /// Reads `window` of `band` into `out` (`out_w * out_h` samples,
    /// row-major), resampling with nearest neighbour when the buffer size
    /// differs from the window size.
    fn read_window(
        &mut self,
        band: usize,
        window: &Window,
        out: &mut [f32],
        out_w: u64,
        out_h: u64,
    ) -> Result<()>;

    /// Writes `data` (`in_w * in_h` samples, row-major) into `window` of
    /// `band`, resampling with nearest neighbour when sizes differ.
    fn write_window(
        &mut self,
        band: usize,
        window: &Window,
        data: &[f64],
        in_w: u64,
        in_h: u64,
    ) -> Result<()>;

    /// Computes and stores statistics of `band`
    fn compute_statistics(&mut self, band: usize) -> Result<BandStatistics>;

    /// Builds reduced-resolution levels for the given decimation factors
    fn build_overviews(&mut self, factors: &[u32]) -> Result<()>;

    fn overview_count(&self) -> usize;

    /// Compression of the stored pixel data, if meaningful
    fn compression(&self) -> Option<Compression> {
        None
    }

    /// Persists pending changes
    fn flush(&mut self) -> Result<()>;
}

/// Source pixel positions sampled by nearest-neighbour resampling of
/// `src_len` pixels starting at `src_off` onto `out_len` pixels
pub fn source_indices(src_off: u64, src_len: u64, out_len: u64) -> Vec<u64> {
    (0..out_len)
        .map(|o| {
            let scaled = ((2 * o + 1) as u128 * src_len as u128) / (2 * out_len as u128);
            src_off + (scaled as u64).min(src_len.saturating_sub(1))
        })
        .collect()
}

/// Nearest-neighbour resampling of a row-major `src_w` x `src_h` grid
pub fn resample_nearest(src: &[f64], src_w: u64, src_h: u64, dst_w: u64, dst_h: u64) -> Vec<f64> {
    if src_w == dst_w && src_h == dst_h {
        return src.to_vec();
    }
    let xs = source_indices(0, src_w, dst_w);
    let ys = source_indices(0, src_h, dst_h);
    ys.iter()
        .flat_map(|&y| xs.iter().map(move |&x| (x, y)))
        .map(|(x, y)| src[(y * src_w + x) as usize])
        .collect()
}

/// Validates a read or write request against a store: band index, window
/// placement, buffer dimensions and buffer length.
pub fn check_request<S: RasterStore + ?Sized>(
    store: &S,
    band: usize,
    window: &Window,
    buffer_len: usize,
    buf_w: u64,
    buf_h: u64,
) -> Result<()> {
    if band >= store.band_count() {
        return Err(Error::OutOfBounds(format!(
            "Band {} of {}-band raster",
            band,
            store.band_count()
        )));
    }
    window.check_within(store.width(), store.height())?;
    if buf_w == 0 || buf_h == 0 {
        return Err(Error::OutOfBounds(format!("Buffer size {} x {}", buf_w, buf_h)));
    }
    let expected = buf_w
        .checked_mul(buf_h)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| Error::OutOfBounds(format!("Buffer size {} x {}", buf_w, buf_h)))?;
    if buffer_len != expected {
        return Err(Error::BufferSize {
            expected,
            actual: buffer_len,
        });
    }
    Ok(())
}
