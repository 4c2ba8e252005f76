//! Block-cached raster access
//!
//! [`RasterFile`] is the entry point: it owns a [`RasterStore`], serves
//! single pixels through a FIFO [`BlockCache`] and bulk windows through the
//! [`normalize`] module.

pub mod block;
pub mod cache;
pub mod normalize;
pub mod file;

pub use block::{Block, BlockGrid, BlockId};
pub use cache::{BlockCache, CacheStats};
pub use file::{CloseOptions, CloseReport, Finalization, RasterFile, RasterInfo};
pub use normalize::PixelLayout;

use serde::Serialize;
use crate::error::Result;
use crate::store::RasterStore;
use crate::types::{ColorInterp, ColorTable, DataType, GeoTransform};

/// Colour description of one band
#[derive(Debug, Clone, PartialEq)]
pub struct BandDescriptor {
    pub color_interp: ColorInterp,
    pub color_table: Option<ColorTable>,
}

impl BandDescriptor {
    /// Whether samples of this band are palette indices
    pub fn is_palette(&self) -> bool {
        self.color_interp == ColorInterp::Palette
    }
}

/// Snapshot of a raster's geometry, taken when it is opened or created
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGeometry {
    pub width: u64,
    pub height: u64,
    pub band_count: usize,
    /// Data type of the first band
    pub data_type: DataType,
    pub geotransform: GeoTransform,
    pub projection: String,
    /// No-data value of the first band
    pub no_data_value: Option<f64>,
    pub bands: Vec<BandDescriptor>,
}

impl RasterGeometry {
    /// Reads the geometry of an open store
    pub fn from_store<S: RasterStore + ?Sized>(store: &S) -> Result<Self> {
        let bands = (0..store.band_count())
            .map(|i| {
                store.band(i).map(|info| BandDescriptor {
                    color_interp: info.color_interp,
                    color_table: info.color_table.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let first = store.band(0)?;

        Ok(Self {
            width: store.width(),
            height: store.height(),
            band_count: bands.len(),
            data_type: first.data_type,
            geotransform: store.geotransform(),
            projection: store.projection().to_string(),
            no_data_value: first.no_data,
            bands,
        })
    }

    /// Whether band 0 holds palette indices
    pub fn has_palette(&self) -> bool {
        self.bands.first().is_some_and(BandDescriptor::is_palette)
    }
}

/// Serializable band summary used by [`RasterInfo`]
#[derive(Debug, Clone, Serialize)]
pub struct BandSummary {
    pub index: usize,
    pub data_type: DataType,
    pub color_interp: ColorInterp,
    pub palette_entries: Option<usize>,
}
