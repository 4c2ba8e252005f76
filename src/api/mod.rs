//! HTTP pixel-query surface over one shared raster

pub mod handlers;
pub mod models;
pub mod routes;

use std::sync::{Arc, Mutex};
use crate::raster::RasterFile;
use crate::store::GeoTiffStore;

/// Raster shared between request handlers
pub type SharedRaster<S = GeoTiffStore> = Arc<Mutex<RasterFile<S>>>;

pub use routes::create_router;
