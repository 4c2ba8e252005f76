//! FIFO block cache
//!
//! Holds at most `capacity` decoded blocks of one band. Eviction is strictly
//! by insertion order: reading a resident block never moves it in the queue.

use std::collections::{HashMap, VecDeque};
use serde::Serialize;
use tracing::{debug, info};
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::store::RasterStore;
use crate::types::Window;
use super::block::{Block, BlockGrid, BlockId};
use super::normalize::check_precision;

/// Hit and miss counters of a [`BlockCache`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Misses since the last hit
    pub consecutive_misses: u64,
    /// Longest run of misses observed
    pub max_consecutive_misses: u64,
    /// Blocks currently held
    pub resident: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of lookups served from memory
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded FIFO cache of decoded blocks
#[derive(Debug)]
pub struct BlockCache {
    grid: BlockGrid,
    band: usize,
    capacity: usize,
    blocks: HashMap<BlockId, Block>,
    order: VecDeque<BlockId>,
    hits: u64,
    misses: u64,
    consecutive_misses: u64,
    max_consecutive_misses: u64,
}

impl BlockCache {
    /// Creates an empty cache for a `width` x `height` raster
    pub fn new(width: u64, height: u64, config: &CacheConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            grid: BlockGrid::new(width, height, config.block_size),
            band: config.band,
            capacity,
            blocks: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            hits: 0,
            misses: 0,
            consecutive_misses: 0,
            max_consecutive_misses: 0,
        }
    }

    pub fn grid(&self) -> &BlockGrid {
        &self.grid
    }

    /// Band the cached blocks are read from
    pub fn band(&self) -> usize {
        self.band
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.blocks.contains_key(&id)
    }

    /// Resident block identities, oldest first
    pub fn resident_ids(&self) -> Vec<BlockId> {
        self.order.iter().copied().collect()
    }

    /// Returns the block covering (`x`, `y`), reading it from `store` on a miss
    pub fn get_block<S: RasterStore + ?Sized>(&mut self, store: &mut S, x: u64, y: u64) -> Result<&Block> {
        let id = self.grid.block_id(x, y)?;

        if self.blocks.contains_key(&id) {
            self.hits += 1;
            self.consecutive_misses = 0;
            return Ok(&self.blocks[&id]);
        }

        let band = store.band(self.band)?;
        check_precision(band.data_type)?;
        let fill = band.no_data.unwrap_or(0.0) as f32;

        self.misses += 1;
        self.consecutive_misses += 1;
        self.max_consecutive_misses = self.max_consecutive_misses.max(self.consecutive_misses);

        let window = self.grid.block_window(id)?;
        let mut valid = vec![0f32; window.pixel_count()];
        store.read_window(self.band, &window, &mut valid, window.width, window.height)?;
        let block = Block::from_window(id, self.grid.block_size(), window, &valid, fill);
        debug!(block = id, x_off = window.x_off, y_off = window.y_off, "block cache miss");

        Ok(self.insert(block))
    }

    /// Sample at (`x`, `y`) of the cached band
    pub fn get_pixel<S: RasterStore + ?Sized>(&mut self, store: &mut S, x: u64, y: u64) -> Result<f32> {
        let offset = self.grid.offset_in_block(x, y);
        let block = self.get_block(store, x, y)?;
        block
            .get(offset)
            .ok_or_else(|| Error::OutOfBounds(format!("Offset {} in block {}", offset, block.id())))
    }

    fn insert(&mut self, block: Block) -> &Block {
        while self.blocks.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.blocks.remove(&oldest);
                    debug!(block = oldest, "evicted block");
                }
                None => break,
            }
        }
        let id = block.id();
        self.order.push_back(id);
        self.blocks.entry(id).or_insert(block)
    }

    /// Drops resident blocks that overlap `window`; returns how many were dropped
    pub fn invalidate(&mut self, window: &Window) -> usize {
        let stale: Vec<BlockId> = self
            .grid
            .blocks_overlapping(window)
            .into_iter()
            .filter(|id| self.blocks.contains_key(id))
            .collect();
        for id in &stale {
            self.blocks.remove(id);
        }
        self.order.retain(|id| !stale.contains(id));
        if !stale.is_empty() {
            debug!(blocks = stale.len(), "invalidated blocks after write");
        }
        stale.len()
    }

    /// Drops every block; counters are kept
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            consecutive_misses: self.consecutive_misses,
            max_consecutive_misses: self.max_consecutive_misses,
            resident: self.blocks.len(),
            capacity: self.capacity,
        }
    }

    /// Logs the counters at info level
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            hits = stats.hits,
            misses = stats.misses,
            max_consecutive_misses = stats.max_consecutive_misses,
            resident = stats.resident,
            capacity = stats.capacity,
            hit_rate = format_args!("{:.3}", stats.hit_rate()),
            "block cache statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::DataType;

    fn store() -> MemoryStore {
        MemoryStore::new(10, 7, 1, DataType::I16).with_fn(|_, x, y| (y * 100 + x) as f64)
    }

    fn cache(capacity: usize) -> BlockCache {
        BlockCache::new(10, 7, &CacheConfig::new(4, capacity))
    }

    #[test]
    fn test_get_pixel_values() {
        let mut store = store();
        let mut cache = cache(4);
        assert_eq!(cache.get_pixel(&mut store, 0, 0).unwrap(), 0.0);
        assert_eq!(cache.get_pixel(&mut store, 5, 6).unwrap(), 605.0);
        assert_eq!(cache.get_pixel(&mut store, 9, 6).unwrap(), 609.0);
    }

    #[test]
    fn test_hits_and_misses() {
        let mut store = store();
        let mut cache = cache(4);

        cache.get_pixel(&mut store, 1, 1).unwrap();
        cache.get_pixel(&mut store, 5, 1).unwrap();
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.consecutive_misses), (0, 2, 2));

        cache.get_pixel(&mut store, 6, 2).unwrap();
        let stats = cache.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.consecutive_misses, 0);
        assert_eq!(stats.max_consecutive_misses, 2);
        assert_eq!(store.read_count(), 2);
    }

    #[test]
    fn test_fifo_not_lru() {
        let mut store = store();
        let mut cache = cache(2);

        // Blocks A = 0, B = 1, C = 2 on the first block row.
        cache.get_block(&mut store, 0, 0).unwrap();
        cache.get_block(&mut store, 4, 0).unwrap();
        for _ in 0..5 {
            cache.get_block(&mut store, 1, 1).unwrap();
        }
        cache.get_block(&mut store, 8, 0).unwrap();

        // An LRU cache would have kept A and evicted B.
        assert!(!cache.contains(0));
        assert!(cache.contains(1));
        assert!(cache.contains(2));
        assert_eq!(cache.resident_ids(), vec![1, 2]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_edge_block_padding() {
        let mut store = store().with_no_data(Some(-1.0));
        let mut cache = cache(4);

        let block = cache.get_block(&mut store, 9, 6).unwrap();
        assert_eq!(block.window(), &Window::new(8, 4, 2, 3));
        let samples = block.samples();
        assert_eq!(samples[0], 408.0);
        assert_eq!(samples[1], 409.0);
        assert_eq!(samples[2], -1.0);
        assert_eq!(samples[2 * 4 + 1], 609.0);
        assert!(samples[3 * 4..].iter().all(|&v| v == -1.0));
    }

    #[test]
    fn test_edge_padding_defaults_to_zero() {
        let mut store = store();
        let mut cache = cache(4);
        let block = cache.get_block(&mut store, 9, 0).unwrap();
        assert_eq!(block.samples()[3], 0.0);
    }

    #[test]
    fn test_out_of_bounds_pixel() {
        let mut store = store();
        let mut cache = cache(4);
        let err = cache.get_pixel(&mut store, 10, 0).unwrap_err();
        assert!(matches!(err, Error::OutOfBounds(_)));
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_precision_checked_before_fetch() {
        let mut store = MemoryStore::new(8, 8, 1, DataType::F64);
        let mut cache = BlockCache::new(8, 8, &CacheConfig::new(4, 2));
        let err = cache.get_pixel(&mut store, 0, 0).unwrap_err();
        assert!(matches!(err, Error::Precision(DataType::F64)));
        assert_eq!(store.read_count(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate() {
        let mut store = store();
        let mut cache = cache(6);
        for (x, y) in [(0, 0), (4, 0), (8, 0), (0, 4)] {
            cache.get_block(&mut store, x, y).unwrap();
        }

        assert_eq!(cache.invalidate(&Window::new(3, 1, 2, 1)), 2);
        assert_eq!(cache.resident_ids(), vec![2, 3]);
        assert_eq!(cache.invalidate(&Window::new(5, 5, 1, 1)), 0);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 4);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
