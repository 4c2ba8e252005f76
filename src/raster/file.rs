//! Raster file facade
//!
//! A [`RasterFile`] owns one store for its whole open lifetime. Closing takes
//! the store out, so every later call fails with [`Error::Closed`] instead of
//! touching a released handle.

use std::fmt;
use std::path::Path;
use serde::Serialize;
use tracing::{debug, info, warn};
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::store::{BandStatistics, CreateOptions, GeoTiffStore, RasterStore};
use crate::types::{DataType, GeoTransform, Sample, Window};
use super::block::Block;
use super::cache::{BlockCache, CacheStats};
use super::normalize::{self, PixelLayout};
use super::{BandSummary, RasterGeometry};

/// Smallest overview edge, in pixels, worth building
const MIN_OVERVIEW_SIZE: u64 = 128;

/// Finalisation steps run by [`RasterFile::close`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseOptions {
    pub build_overviews: bool,
    pub compute_statistics: bool,
}

impl CloseOptions {
    /// Runs both finalisation steps
    pub fn finalize() -> Self {
        Self {
            build_overviews: true,
            compute_statistics: true,
        }
    }
}

/// Outcome of one finalisation step
#[derive(Debug)]
pub enum Finalization<T> {
    Skipped,
    Completed(T),
    Failed(Error),
}

impl<T> Finalization<T> {
    fn run(requested: bool, step: impl FnOnce() -> Result<T>) -> Self {
        if !requested {
            return Finalization::Skipped;
        }
        match step() {
            Ok(value) => Finalization::Completed(value),
            Err(err) => Finalization::Failed(err),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Finalization::Completed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Finalization::Failed(_))
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Finalization::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// What [`RasterFile::close`] did before releasing the store
#[derive(Debug)]
pub struct CloseReport {
    /// Overview factors built
    pub overviews: Finalization<Vec<u32>>,
    pub statistics: Finalization<BandStatistics>,
}

/// Printable summary of an open raster
#[derive(Debug, Clone, Serialize)]
pub struct RasterInfo {
    pub width: u64,
    pub height: u64,
    pub band_count: usize,
    pub data_type: DataType,
    pub projection: String,
    pub geotransform: [f64; 6],
    pub no_data_value: Option<f64>,
    /// `None` when bulk reads are not supported for the band layout
    pub layout: Option<PixelLayout>,
    pub compression: Option<String>,
    pub overview_count: usize,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub bands: Vec<BandSummary>,
}

impl fmt::Display for RasterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Size: {} x {}, {} band(s) of {}", self.width, self.height, self.band_count, self.data_type)?;
        if !self.projection.is_empty() {
            writeln!(f, "Projection: {}", self.projection)?;
        }
        let t = &self.geotransform;
        writeln!(f, "Origin: ({}, {})", t[0], t[3])?;
        writeln!(f, "Pixel size: ({}, {})", t[1], t[5])?;
        if t[2] != 0.0 || t[4] != 0.0 {
            writeln!(f, "Rotation: ({}, {})", t[2], t[4])?;
        }
        if let Some(no_data) = self.no_data_value {
            writeln!(f, "NoData: {}", no_data)?;
        }
        if let Some(compression) = &self.compression {
            writeln!(f, "Compression: {}", compression)?;
        }
        match self.layout {
            Some(layout) => writeln!(f, "Layout: {} ({} components)", layout.name(), layout.components())?,
            None => writeln!(f, "Layout: unsupported")?,
        }
        if self.overview_count > 0 {
            writeln!(f, "Overviews: {}", self.overview_count)?;
        }
        if let (Some(min), Some(max)) = (self.minimum, self.maximum) {
            writeln!(f, "Min/Max: {} / {}", min, max)?;
        }
        for band in &self.bands {
            write!(f, "Band {}: {} {}", band.index + 1, band.data_type, band.color_interp.name())?;
            if let Some(entries) = band.palette_entries {
                write!(f, " ({} palette entries)", entries)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Overview factors `2^1..=2^n` with `n = floor(log2(min(W, H) / 128))`
pub fn overview_levels(width: u64, height: u64) -> Vec<u32> {
    let ratio = width.min(height) / MIN_OVERVIEW_SIZE;
    if ratio < 2 {
        return Vec::new();
    }
    let n = ratio.ilog2().min(31);
    (1..=n).map(|level| 1u32 << level).collect()
}

/// An open raster: geometry snapshot, store handle and block cache
pub struct RasterFile<S: RasterStore = GeoTiffStore> {
    store: Option<S>,
    geometry: RasterGeometry,
    cache: BlockCache,
    statistics: Option<BandStatistics>,
}

impl RasterFile<GeoTiffStore> {
    /// Opens a GeoTIFF read-only with the default cache configuration
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, CacheConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: CacheConfig) -> Result<Self> {
        Self::from_store(GeoTiffStore::open(path)?, config)
    }

    /// Creates a single-band GeoTIFF
    pub fn create<P: AsRef<Path>>(path: P, options: &CreateOptions) -> Result<Self> {
        Self::create_with_config(path, options, CacheConfig::default())
    }

    pub fn create_with_config<P: AsRef<Path>>(
        path: P,
        options: &CreateOptions,
        config: CacheConfig,
    ) -> Result<Self> {
        Self::from_store(GeoTiffStore::create(path, options)?, config)
    }

    /// Creates a GeoTIFF with the size, data type, georeferencing and
    /// no-data value of another open raster
    pub fn create_like<P: AsRef<Path>, T: RasterStore>(path: P, other: &RasterFile<T>) -> Result<Self> {
        let geometry = other.geometry()?;
        let options = CreateOptions::new(geometry.width, geometry.height, geometry.data_type)
            .with_geotransform(geometry.geotransform)
            .with_projection(geometry.projection.clone())
            .with_no_data(geometry.no_data_value);
        Self::create_with_config(path, &options, other.cache_config())
    }
}

impl<S: RasterStore> RasterFile<S> {
    /// Wraps an already opened store
    pub fn from_store(store: S, config: CacheConfig) -> Result<Self> {
        if config.band >= store.band_count() {
            return Err(Error::Config(format!(
                "Cache band {} of {}-band raster",
                config.band,
                store.band_count()
            )));
        }
        let geometry = RasterGeometry::from_store(&store)?;
        let cache = BlockCache::new(geometry.width, geometry.height, &config);
        debug!(
            width = geometry.width,
            height = geometry.height,
            bands = geometry.band_count,
            data_type = %geometry.data_type,
            block_size = config.block_size,
            capacity = config.capacity,
            "raster opened"
        );

        Ok(Self {
            store: Some(store),
            geometry,
            cache,
            statistics: None,
        })
    }

    pub fn is_open(&self) -> bool {
        self.store.is_some()
    }

    fn store(&self) -> Result<&S> {
        self.store.as_ref().ok_or(Error::Closed)
    }

    fn cache_config(&self) -> CacheConfig {
        let grid = self.cache.grid();
        CacheConfig::new(grid.block_size(), self.cache.capacity()).with_band(self.cache.band())
    }

    pub fn geometry(&self) -> Result<&RasterGeometry> {
        self.store()?;
        Ok(&self.geometry)
    }

    pub fn width(&self) -> Result<u64> {
        Ok(self.geometry()?.width)
    }

    pub fn height(&self) -> Result<u64> {
        Ok(self.geometry()?.height)
    }

    /// `(width, height)` in pixels
    pub fn raster_size(&self) -> Result<(u64, u64)> {
        let geometry = self.geometry()?;
        Ok((geometry.width, geometry.height))
    }

    pub fn band_count(&self) -> Result<usize> {
        Ok(self.geometry()?.band_count)
    }

    pub fn data_type(&self) -> Result<DataType> {
        Ok(self.geometry()?.data_type)
    }

    pub fn projection(&self) -> Result<&str> {
        Ok(&self.geometry()?.projection)
    }

    pub fn geotransform(&self) -> Result<GeoTransform> {
        Ok(self.geometry()?.geotransform)
    }

    pub fn no_data_value(&self) -> Result<Option<f64>> {
        Ok(self.geometry()?.no_data_value)
    }

    /// Stored or computed minimum of band 0
    pub fn minimum(&self) -> Result<Option<f64>> {
        Ok(self.store()?.band(0)?.minimum())
    }

    /// Stored or computed maximum of band 0
    pub fn maximum(&self) -> Result<Option<f64>> {
        Ok(self.store()?.band(0)?.maximum())
    }

    /// Statistics from the last [`RasterFile::compute_statistics`] call
    pub fn statistics(&self) -> Result<Option<BandStatistics>> {
        self.store()?;
        Ok(self.statistics)
    }

    /// Pixel width and height in georeferenced units
    pub fn pixel_size_geo(&self) -> Result<(f64, f64)> {
        self.geotransform()?.pixel_size()
    }

    /// Minimum georeferenced x and y of the raster extent
    pub fn geographic_min(&self) -> Result<(f64, f64)> {
        let geometry = self.geometry()?;
        let (min_x, min_y, _, _) = geometry.geotransform.bounds(geometry.width, geometry.height)?;
        Ok((min_x, min_y))
    }

    /// Georeferenced position of the pixel corner (`x`, `y`)
    pub fn pixel_to_geo(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        Ok(self.geotransform()?.pixel_to_geo(x, y))
    }

    pub fn overview_count(&self) -> Result<usize> {
        Ok(self.store()?.overview_count())
    }

    /// Layout a bulk read produces
    pub fn pixel_layout(&self) -> Result<PixelLayout> {
        let geometry = self.geometry()?;
        PixelLayout::detect(geometry.band_count, geometry.has_palette())
    }

    /// Components per pixel of a bulk read (1 or 3)
    pub fn components_per_pixel(&self) -> Result<usize> {
        Ok(self.pixel_layout()?.components())
    }

    /// Length of the buffer a bulk read into `out_w` x `out_h` pixels needs
    pub fn component_count(&self, out_w: u64, out_h: u64) -> Result<usize> {
        normalize::component_count(self.pixel_layout()?, out_w, out_h)
    }

    pub fn info(&self) -> Result<RasterInfo> {
        let store = self.store()?;
        let geometry = &self.geometry;
        let bands = (0..geometry.band_count)
            .map(|index| {
                store.band(index).map(|band| BandSummary {
                    index,
                    data_type: band.data_type,
                    color_interp: band.color_interp,
                    palette_entries: band.color_table.as_ref().map(|t| t.len()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RasterInfo {
            width: geometry.width,
            height: geometry.height,
            band_count: geometry.band_count,
            data_type: geometry.data_type,
            projection: geometry.projection.clone(),
            geotransform: geometry.geotransform.coefficients(),
            no_data_value: geometry.no_data_value,
            layout: self.pixel_layout().ok(),
            compression: store.compression().map(|c| c.name().to_string()),
            overview_count: store.overview_count(),
            minimum: store.band(0)?.minimum(),
            maximum: store.band(0)?.maximum(),
            bands,
        })
    }

    /// Sample of the cached band at (`x`, `y`)
    pub fn get_pixel(&mut self, x: u64, y: u64) -> Result<f32> {
        let store = self.store.as_mut().ok_or(Error::Closed)?;
        self.cache.get_pixel(store, x, y)
    }

    /// Cached block covering (`x`, `y`)
    pub fn get_block(&mut self, x: u64, y: u64) -> Result<&Block> {
        let store = self.store.as_mut().ok_or(Error::Closed)?;
        self.cache.get_block(store, x, y)
    }

    pub fn cache_stats(&self) -> Result<CacheStats> {
        self.store()?;
        Ok(self.cache.stats())
    }

    pub fn log_cache_stats(&self) -> Result<()> {
        self.store()?;
        self.cache.log_stats();
        Ok(())
    }

    /// Reads `window` into `out` as interleaved f32 components, resampled to
    /// `out_w` x `out_h` pixels. Bypasses the block cache.
    pub fn read(&mut self, window: &Window, out_w: u64, out_h: u64, out: &mut [f32]) -> Result<PixelLayout> {
        let store = self.store.as_mut().ok_or(Error::Closed)?;
        normalize::read_normalized(store, &self.geometry, window, out_w, out_h, out)
    }

    /// Like [`RasterFile::read`] but allocates the output buffer
    pub fn read_vec(&mut self, window: &Window, out_w: u64, out_h: u64) -> Result<(PixelLayout, Vec<f32>)> {
        let mut out = vec![0f32; self.component_count(out_w, out_h)?];
        let layout = self.read(window, out_w, out_h, &mut out)?;
        Ok((layout, out))
    }

    /// Writes `data` (`in_w * in_h` samples) into `window` of band 0.
    ///
    /// `T` must be the raster's data type. Cached blocks overlapping the
    /// window are dropped.
    pub fn write<T: Sample>(&mut self, window: &Window, data: &[T], in_w: u64, in_h: u64) -> Result<()> {
        let store = self.store.as_mut().ok_or(Error::Closed)?;
        if T::DATA_TYPE != self.geometry.data_type {
            return Err(Error::DataTypeMismatch {
                expected: self.geometry.data_type,
                actual: T::DATA_TYPE,
            });
        }
        let expected = in_w
            .checked_mul(in_h)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| Error::OutOfBounds(format!("Input size {} x {}", in_w, in_h)))?;
        if data.len() != expected {
            return Err(Error::BufferSize {
                expected,
                actual: data.len(),
            });
        }

        let samples: Vec<f64> = data.iter().map(|v| v.to_f64()).collect();
        store.write_window(0, window, &samples, in_w, in_h)?;
        if self.cache.band() == 0 {
            self.cache.invalidate(window);
        }
        Ok(())
    }

    /// Computes min, max, mean and standard deviation of band 0, skipping
    /// no-data samples
    pub fn compute_statistics(&mut self) -> Result<BandStatistics> {
        let store = self.store.as_mut().ok_or(Error::Closed)?;
        let stats = store.compute_statistics(0)?;
        info!(
            minimum = stats.minimum,
            maximum = stats.maximum,
            mean = stats.mean,
            std_dev = stats.std_dev,
            "computed band statistics"
        );
        self.statistics = Some(stats);
        Ok(stats)
    }

    /// Builds the overview levels suited to the raster size; returns the
    /// factors built (none for rasters under 256 pixels on a side)
    pub fn build_overviews(&mut self) -> Result<Vec<u32>> {
        let store = self.store.as_mut().ok_or(Error::Closed)?;
        let levels = overview_levels(self.geometry.width, self.geometry.height);
        if !levels.is_empty() {
            store.build_overviews(&levels)?;
            info!(levels = ?levels, "built overviews");
        }
        Ok(levels)
    }

    /// Runs the requested finalisation steps, then flushes and releases the
    /// store. Step failures are reported, not returned; the file is closed
    /// either way.
    pub fn close(&mut self, options: CloseOptions) -> Result<CloseReport> {
        self.store()?;

        let overviews = Finalization::run(options.build_overviews, || self.build_overviews());
        if let Some(err) = overviews.error() {
            warn!(error = %err, "overview generation failed");
        }
        let statistics = Finalization::run(options.compute_statistics, || self.compute_statistics());
        if let Some(err) = statistics.error() {
            warn!(error = %err, "statistics computation failed");
        }

        self.cache.clear();
        let mut store = self.store.take().ok_or(Error::Closed)?;
        store.flush()?;
        debug!("raster closed");

        Ok(CloseReport { overviews, statistics })
    }
}

impl<S: RasterStore> Drop for RasterFile<S> {
    fn drop(&mut self) {
        if let Some(store) = self.store.as_mut() {
            if let Err(err) = store.flush() {
                warn!(error = %err, "flush on drop failed");
            }
        }
    }
}
