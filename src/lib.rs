//! rastercache - block-cached access to large georeferenced rasters
//!
//! Rasters are read through a [`RasterFile`], which owns a [`RasterStore`]
//! and serves single pixels from a bounded FIFO cache of square blocks.
//! Bulk windows bypass the cache and are normalized into an interleaved
//! f32 layout (gray, palette expanded to RGB, or RGB).
//!
//! # Examples
//!
//! ## Single pixels through the cache
//!
//! ```no_run
//! use rastercache::{CacheConfig, RasterFile};
//!
//! let mut file = RasterFile::open_with_config("dem.tif", CacheConfig::new(256, 32))?;
//! let value = file.get_pixel(1200, 800)?;
//! println!("elevation: {}", value);
//!
//! let stats = file.cache_stats()?;
//! println!("hits {} misses {}", stats.hits, stats.misses);
//! # Ok::<(), rastercache::Error>(())
//! ```
//!
//! ## Normalized windows
//!
//! ```no_run
//! use rastercache::{RasterFile, Window};
//!
//! let mut file = RasterFile::open("scene.tif")?;
//! let (layout, rgb) = file.read_vec(&Window::new(0, 0, 1024, 1024), 256, 256)?;
//! assert_eq!(rgb.len(), 256 * 256 * layout.components());
//! # Ok::<(), rastercache::Error>(())
//! ```
//!
//! ## Writing and finalizing
//!
//! ```no_run
//! use rastercache::{CloseOptions, CreateOptions, DataType, RasterFile, Window};
//!
//! let options = CreateOptions::new(4096, 4096, DataType::I16).with_no_data(Some(-9999.0));
//! let mut file = RasterFile::create("out.tif", &options)?;
//! file.write(&Window::new(0, 0, 2, 1), &[120i16, 121], 2, 1)?;
//!
//! let report = file.close(CloseOptions { compute_statistics: true, build_overviews: false })?;
//! assert!(report.statistics.is_completed());
//! # Ok::<(), rastercache::Error>(())
//! ```

pub mod io;
pub mod error;
pub mod types;
pub mod config;
pub mod logging;
pub mod formats;
pub mod compression;
pub mod store;
pub mod raster;
pub mod api;

pub use config::CacheConfig;
pub use error::{Error, ErrorKind, Result};
pub use types::{
    ColorEntry, ColorInterp, ColorTable, DataType, Dimensions, GeoTransform, PaletteInterp,
    Sample, Window,
};
pub use store::{
    BandInfo, BandStatistics, CreateOptions, GeoTiffStore, MemoryStore, RasterStore,
};
pub use raster::{
    Block, BlockCache, BlockGrid, BlockId, CacheStats, CloseOptions, CloseReport, Finalization,
    PixelLayout, RasterFile, RasterGeometry, RasterInfo,
};
pub use formats::tiff::{GeoInfo, Tiff, TiffReader, TiffWriter, IFD};
pub use io::{BufferedReader, ByteOrder, SeekableReader};
