//! Block addressing
//!
//! A raster of `W x H` pixels is partitioned into square blocks of edge `B`,
//! numbered row-major: `id = floor(y / B) * ceil(W / B) + floor(x / B)`.
//! Blocks on the right and bottom edges may extend past the raster.

use crate::error::{Error, Result};
use crate::types::Window;

/// Identity of a block within its grid
pub type BlockId = u64;

/// Partition of a raster into square blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGrid {
    width: u64,
    height: u64,
    block_size: u64,
}

impl BlockGrid {
    /// Creates a grid; a zero block size is raised to one
    pub fn new(width: u64, height: u64, block_size: u64) -> Self {
        Self {
            width,
            height,
            block_size: block_size.max(1),
        }
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Samples held by one block
    pub fn block_len(&self) -> usize {
        (self.block_size * self.block_size) as usize
    }

    pub fn blocks_across(&self) -> u64 {
        self.width.div_ceil(self.block_size)
    }

    pub fn blocks_down(&self) -> u64 {
        self.height.div_ceil(self.block_size)
    }

    pub fn block_count(&self) -> u64 {
        self.blocks_across() * self.blocks_down()
    }

    /// Identity of the block containing pixel (`x`, `y`)
    pub fn block_id(&self, x: u64, y: u64) -> Result<BlockId> {
        if x >= self.width || y >= self.height {
            return Err(Error::OutOfBounds(format!(
                "Pixel ({}, {}) outside {} x {} raster",
                x, y, self.width, self.height
            )));
        }
        Ok((y / self.block_size) * self.blocks_across() + x / self.block_size)
    }

    /// Row-major position of pixel (`x`, `y`) inside its block
    pub fn offset_in_block(&self, x: u64, y: u64) -> usize {
        ((y % self.block_size) * self.block_size + x % self.block_size) as usize
    }

    /// Part of block `id` that lies inside the raster
    pub fn block_window(&self, id: BlockId) -> Result<Window> {
        if id >= self.block_count() {
            return Err(Error::OutOfBounds(format!(
                "Block {} of {}",
                id,
                self.block_count()
            )));
        }
        let x_off = (id % self.blocks_across()) * self.block_size;
        let y_off = (id / self.blocks_across()) * self.block_size;
        Ok(Window::new(
            x_off,
            y_off,
            self.block_size.min(self.width - x_off),
            self.block_size.min(self.height - y_off),
        ))
    }

    /// Blocks that share at least one pixel with `window`
    pub fn blocks_overlapping(&self, window: &Window) -> Vec<BlockId> {
        if window.is_empty() || window.x_off >= self.width || window.y_off >= self.height {
            return Vec::new();
        }
        let x_last = (window.x_end().min(self.width) - 1) / self.block_size;
        let y_last = (window.y_end().min(self.height) - 1) / self.block_size;
        let across = self.blocks_across();

        (window.y_off / self.block_size..=y_last)
            .flat_map(|row| {
                (window.x_off / self.block_size..=x_last).map(move |col| row * across + col)
            })
            .collect()
    }
}

/// Decoded block of one band: `B x B` samples, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    id: BlockId,
    window: Window,
    samples: Vec<f32>,
}

impl Block {
    /// Builds a block from the samples of its in-raster `window`
    /// (`window.pixel_count()` values, row-major). Positions outside the
    /// raster hold `fill`.
    pub fn from_window(
        id: BlockId,
        block_size: u64,
        window: Window,
        valid: &[f32],
        fill: f32,
    ) -> Self {
        let edge = block_size as usize;
        let w = window.width as usize;
        let mut samples = vec![fill; edge * edge];
        for (row, chunk) in valid.chunks_exact(w).enumerate() {
            samples[row * edge..row * edge + w].copy_from_slice(chunk);
        }
        Self { id, window, samples }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    /// In-raster window the block was decoded from
    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn get(&self, offset: usize) -> Option<f32> {
        self.samples.get(offset).copied()
    }
}
