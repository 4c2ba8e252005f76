use serde::{Deserialize, Serialize};

use crate::raster::{CacheStats, PixelLayout, RasterInfo};

#[derive(Debug, Deserialize)]
pub struct PixelRequest {
    pub x: u64,
    pub y: u64,
}

#[derive(Debug, Serialize)]
pub struct PixelResponse {
    pub x: u64,
    pub y: u64,
    pub value: f32,
    /// Whether the value equals the band's no-data value
    pub no_data: bool,
    pub execution_time_ms: f64,
}

#[derive(Debug, Deserialize)]
pub struct WindowRequest {
    pub x_off: u64,
    pub y_off: u64,
    pub width: u64,
    pub height: u64,
    /// Output width; defaults to the window width
    pub out_width: Option<u64>,
    /// Output height; defaults to the window height
    pub out_height: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct WindowResponse {
    pub width: u64,
    pub height: u64,
    pub layout: PixelLayout,
    pub components: usize,
    pub values: Vec<f32>,
    pub execution_time_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    #[serde(flatten)]
    pub info: RasterInfo,
}

#[derive(Debug, Serialize)]
pub struct CacheResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
