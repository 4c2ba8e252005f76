//! Cache configuration

use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::Result;

/// Default block edge length in pixels
pub const DEFAULT_BLOCK_SIZE: u64 = 512;

/// Default number of resident blocks
pub const DEFAULT_CAPACITY: usize = 64;

/// Configuration of the block cache of a raster file
///
/// Missing fields take their defaults, so `{}` is a valid configuration:
///
/// ```
/// use rastercache::CacheConfig;
///
/// let config = CacheConfig::from_json(r#"{ "capacity": 16 }"#)?;
/// assert_eq!(config.block_size, 512);
/// assert_eq!(config.capacity, 16);
/// # Ok::<(), rastercache::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Edge length of a square block in pixels
    pub block_size: u64,
    /// Maximum number of blocks kept in memory
    pub capacity: usize,
    /// Zero-based band served by single-pixel reads
    pub band: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            capacity: DEFAULT_CAPACITY,
            band: 0,
        }
    }
}

impl CacheConfig {
    /// Creates a configuration; zero sizes are raised to one
    pub fn new(block_size: u64, capacity: usize) -> Self {
        Self {
            block_size,
            capacity,
            band: 0,
        }
        .normalized()
    }

    /// Selects the band served by the cache
    pub fn with_band(mut self, band: usize) -> Self {
        self.band = band;
        self
    }

    /// Parses a JSON configuration
    pub fn from_json(text: &str) -> Result<Self> {
        let config: CacheConfig = serde_json::from_str(text)?;
        Ok(config.normalized())
    }

    /// Loads a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    fn normalized(mut self) -> Self {
        self.block_size = self.block_size.max(1);
        self.capacity = self.capacity.max(1);
        self
    }
}
