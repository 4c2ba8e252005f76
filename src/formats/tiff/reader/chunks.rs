//! Tile and strip decoding
//!
//! A [`ChunkLayout`] describes how the pixel data of one directory is cut
//! into chunks (tiles, or strips treated as full-width tiles). Chunks are
//! decoded straight from a memory map, independent chunks in parallel.

use std::collections::{BTreeSet, HashMap};
use rayon::prelude::*;
use crate::compression::Compression;
use crate::error::{Error, Result};
use crate::formats::tiff::{tags, IFD};
use crate::io::ByteOrder;
use crate::types::{DataType, DecodedSample};

/// Chunk geometry and encoding of one image directory
#[derive(Debug, Clone)]
pub struct ChunkLayout {
    pub width: u64,
    pub height: u64,
    pub chunk_width: u64,
    pub chunk_height: u64,
    pub samples_per_pixel: usize,
    /// One plane per sample (PlanarConfiguration = 2)
    pub planar: bool,
    pub data_type: DataType,
    pub compression: Compression,
    pub predictor: u64,
    pub byte_order: ByteOrder,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
}

impl ChunkLayout {
    /// Builds the layout of an image directory
    pub fn from_ifd(ifd: &IFD, byte_order: ByteOrder) -> Result<Self> {
        let dims = ifd
            .dimensions()
            .ok_or(Error::MissingTag(tags::IMAGE_WIDTH))?;
        if dims.width == 0 || dims.height == 0 {
            return Err(Error::InvalidFormat("Image has no pixels".to_string()));
        }

        let data_type = ifd.data_type().ok_or_else(|| {
            Error::Unsupported(format!(
                "Sample format {} with {} bits per sample",
                ifd.sample_format(),
                ifd.bits_per_sample()
            ))
        })?;

        let (chunk_width, chunk_height, offsets_tag, counts_tag) = match ifd.tile_dimensions() {
            Some(tile) => (tile.width, tile.height, tags::TILE_OFFSETS, tags::TILE_BYTE_COUNTS),
            None => {
                let rows = ifd
                    .get_u64(tags::ROWS_PER_STRIP)
                    .unwrap_or(dims.height)
                    .clamp(1, dims.height);
                (dims.width, rows, tags::STRIP_OFFSETS, tags::STRIP_BYTE_COUNTS)
            }
        };
        if chunk_width == 0 || chunk_height == 0 {
            return Err(Error::InvalidFormat("Zero-sized tiles".to_string()));
        }

        let offsets = ifd.get_u64s(offsets_tag).ok_or(Error::MissingTag(offsets_tag))?;
        let byte_counts = ifd.get_u64s(counts_tag).ok_or(Error::MissingTag(counts_tag))?;

        let predictor = ifd.predictor();
        if predictor != 1 && predictor != 2 {
            return Err(Error::Unsupported(format!("Predictor {}", predictor)));
        }

        let layout = Self {
            width: dims.width,
            height: dims.height,
            chunk_width,
            chunk_height,
            samples_per_pixel: ifd.samples_per_pixel().max(1) as usize,
            planar: ifd.planar_configuration() == 2,
            data_type,
            compression: Compression::from_tag(ifd.compression())?,
            predictor,
            byte_order,
            offsets,
            byte_counts,
        };

        let expected = layout.chunk_count();
        if layout.offsets.len() < expected || layout.byte_counts.len() < expected {
            return Err(Error::InvalidFormat(format!(
                "Expected {} chunks, found {} offsets and {} byte counts",
                expected,
                layout.offsets.len(),
                layout.byte_counts.len()
            )));
        }

        Ok(layout)
    }

    pub fn chunks_across(&self) -> u64 {
        self.width.div_ceil(self.chunk_width)
    }

    pub fn chunks_down(&self) -> u64 {
        self.height.div_ceil(self.chunk_height)
    }

    fn chunks_per_plane(&self) -> usize {
        (self.chunks_across() * self.chunks_down()) as usize
    }

    /// Total number of chunks, all planes included
    pub fn chunk_count(&self) -> usize {
        if self.planar {
            self.chunks_per_plane() * self.samples_per_pixel
        } else {
            self.chunks_per_plane()
        }
    }

    /// Samples stored per pixel inside one chunk
    fn pixel_stride(&self) -> usize {
        if self.planar { 1 } else { self.samples_per_pixel }
    }

    /// Decoded size in bytes of a full chunk
    pub fn chunk_bytes(&self) -> usize {
        (self.chunk_width * self.chunk_height) as usize * self.pixel_stride() * self.data_type.size()
    }

    /// Index of the chunk holding pixel (`x`, `y`) of `band`
    pub fn chunk_index(&self, x: u64, y: u64, band: usize) -> usize {
        let index = ((y / self.chunk_height) * self.chunks_across() + x / self.chunk_width) as usize;
        if self.planar {
            index + band * self.chunks_per_plane()
        } else {
            index
        }
    }

    /// Byte offset of pixel (`x`, `y`) of `band` inside its decoded chunk
    fn sample_offset(&self, x: u64, y: u64, band: usize) -> usize {
        let local = ((y % self.chunk_height) * self.chunk_width + x % self.chunk_width) as usize;
        let sample = if self.planar {
            local
        } else {
            local * self.samples_per_pixel + band
        };
        sample * self.data_type.size()
    }

    /// Decodes one chunk from the raw file bytes. Sparse chunks (no data
    /// written) decode to `None`.
    pub fn decode_chunk(&self, file: &[u8], index: usize) -> Result<Option<Vec<u8>>> {
        let offset = self.offsets[index];
        let count = self.byte_counts[index];
        if offset == 0 || count == 0 {
            return Ok(None);
        }

        let start = usize::try_from(offset)
            .map_err(|_| Error::InvalidFormat(format!("Chunk {} offset {}", index, offset)))?;
        let end = start
            .checked_add(count as usize)
            .filter(|&end| end <= file.len())
            .ok_or_else(|| {
                Error::InvalidFormat(format!(
                    "Chunk {} data range {}+{} exceeds file size {}",
                    index,
                    offset,
                    count,
                    file.len()
                ))
            })?;

        let expected = self.chunk_bytes();
        let mut decoded = self.compression.decompress(&file[start..end], expected)?;
        // Last strips and truncated tiles decode short.
        decoded.resize(expected, 0);

        if self.predictor == 2 {
            undo_horizontal_predictor(
                &mut decoded,
                self.chunk_width as usize,
                self.pixel_stride(),
                self.data_type.size(),
                self.byte_order,
            );
        }

        Ok(Some(decoded))
    }

    /// Reads band samples at the given source columns and rows into `out`
    /// (row-major, `xs.len() * ys.len()` samples). Chunks are decoded in
    /// parallel; pixels of sparse chunks receive `fill`.
    pub fn read_samples<T: DecodedSample>(
        &self,
        file: &[u8],
        band: usize,
        xs: &[u64],
        ys: &[u64],
        fill: T,
        out: &mut [T],
    ) -> Result<()> {
        if band >= self.samples_per_pixel {
            return Err(Error::OutOfBounds(format!(
                "Band {} of {}-sample image",
                band, self.samples_per_pixel
            )));
        }

        let chunk_cols: BTreeSet<u64> = xs.iter().map(|x| x / self.chunk_width).collect();
        let chunk_rows: BTreeSet<u64> = ys.iter().map(|y| y / self.chunk_height).collect();
        let needed: Vec<usize> = chunk_rows
            .iter()
            .flat_map(|&row| {
                chunk_cols
                    .iter()
                    .map(move |&col| (col * self.chunk_width, row * self.chunk_height))
            })
            .map(|(x, y)| self.chunk_index(x, y, band))
            .collect();

        let chunks: HashMap<usize, Option<Vec<u8>>> = needed
            .par_iter()
            .map(|&index| self.decode_chunk(file, index).map(|chunk| (index, chunk)))
            .collect::<Result<_>>()?;

        let size = self.data_type.size();
        for (row, &y) in ys.iter().enumerate() {
            for (col, &x) in xs.iter().enumerate() {
                let value = match chunks.get(&self.chunk_index(x, y, band)) {
                    Some(Some(chunk)) => {
                        let at = self.sample_offset(x, y, band);
                        T::from_f64(self.byte_order.decode_sample(self.data_type, &chunk[at..at + size]))
                    }
                    _ => fill,
                };
                out[row * xs.len() + col] = value;
            }
        }

        Ok(())
    }
}

/// Reverses horizontal differencing (Predictor = 2) in place.
///
/// Each row holds `width * stride` samples of `sample_size` bytes; every
/// sample is stored as the difference to the sample `stride` positions
/// earlier in the same row.
pub fn undo_horizontal_predictor(
    data: &mut [u8],
    width: usize,
    stride: usize,
    sample_size: usize,
    order: ByteOrder,
) {
    let row_samples = width * stride;
    let row_bytes = row_samples * sample_size;
    if row_bytes == 0 {
        return;
    }

    for row in data.chunks_exact_mut(row_bytes) {
        match sample_size {
            1 => {
                for i in stride..row_samples {
                    row[i] = row[i].wrapping_add(row[i - stride]);
                }
            }
            2 => accumulate(row, stride, 2, order, |a, b| {
                let (a, b) = (order.u16_at(a), order.u16_at(b));
                a.wrapping_add(b) as u64
            }),
            4 => accumulate(row, stride, 4, order, |a, b| {
                let (a, b) = (order.u32_at(a), order.u32_at(b));
                a.wrapping_add(b) as u64
            }),
            8 => accumulate(row, stride, 8, order, |a, b| {
                order.u64_at(a).wrapping_add(order.u64_at(b))
            }),
            _ => {}
        }
    }
}

fn accumulate(
    row: &mut [u8],
    stride: usize,
    size: usize,
    order: ByteOrder,
    add: impl Fn(&[u8], &[u8]) -> u64,
) {
    let samples = row.len() / size;
    for i in stride..samples {
        let (before, current) = row.split_at_mut(i * size);
        let prev = &before[(i - stride) * size..(i - stride + 1) * size];
        let sum = add(&current[..size], prev);
        let bytes = match order {
            ByteOrder::LittleEndian => sum.to_le_bytes(),
            ByteOrder::BigEndian => sum.to_be_bytes(),
        };
        let bytes = match order {
            ByteOrder::LittleEndian => &bytes[..size],
            ByteOrder::BigEndian => &bytes[8 - size..],
        };
        current[..size].copy_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::tiff::ifd::{IFDEntry, TagValue};
    use crate::formats::tiff::tags::field_types;

    fn entry(tag: u16, values: Vec<u64>) -> IFDEntry {
        IFDEntry::new(tag, field_types::LONG, values.len() as u64, TagValue::Unsigned(values))
    }

    fn stripped_ifd(width: u64, height: u64, rows: u64, offsets: Vec<u64>, counts: Vec<u64>) -> IFD {
        let mut ifd = IFD::new(0, 8);
        ifd.add_entry(entry(tags::IMAGE_WIDTH, vec![width]));
        ifd.add_entry(entry(tags::IMAGE_LENGTH, vec![height]));
        ifd.add_entry(entry(tags::BITS_PER_SAMPLE, vec![8]));
        ifd.add_entry(entry(tags::ROWS_PER_STRIP, vec![rows]));
        ifd.add_entry(entry(tags::STRIP_OFFSETS, offsets));
        ifd.add_entry(entry(tags::STRIP_BYTE_COUNTS, counts));
        ifd
    }

    #[test]
    fn test_predictor_u8() {
        let mut data = vec![1, 1, 1, 10, 246, 1];
        undo_horizontal_predictor(&mut data, 3, 1, 1, ByteOrder::LittleEndian);
        assert_eq!(data, vec![1, 2, 3, 10, 0, 1]);
    }

    #[test]
    fn test_predictor_u16_chunky() {
        // Two pixels of two samples each, big-endian.
        let mut data = vec![0x01, 0x00, 0x00, 0x05, 0x00, 0x02, 0xFF, 0xFF];
        undo_horizontal_predictor(&mut data, 2, 2, 2, ByteOrder::BigEndian);
        let order = ByteOrder::BigEndian;
        assert_eq!(order.u16_at(&data[0..]), 256);
        assert_eq!(order.u16_at(&data[2..]), 5);
        assert_eq!(order.u16_at(&data[4..]), 258);
        assert_eq!(order.u16_at(&data[6..]), 4);
    }

    #[test]
    fn test_strip_layout_and_short_last_strip() {
        // 3x3 image, 2 rows per strip: strip 0 has 6 bytes, strip 1 has 3.
        let mut file = vec![0u8; 8];
        file.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        file.extend_from_slice(&[7, 8, 9]);
        let ifd = stripped_ifd(3, 3, 2, vec![8, 14], vec![6, 3]);

        let layout = ChunkLayout::from_ifd(&ifd, ByteOrder::LittleEndian).unwrap();
        assert_eq!(layout.chunks_across(), 1);
        assert_eq!(layout.chunks_down(), 2);
        assert_eq!(layout.chunk_bytes(), 6);

        let mut out = vec![0f32; 9];
        layout
            .read_samples(&file, 0, &[0, 1, 2], &[0, 1, 2], -1.0, &mut out)
            .unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_sparse_chunk_gets_fill() {
        let file = vec![0u8; 16];
        let ifd = stripped_ifd(2, 2, 1, vec![8, 0], vec![2, 0]);
        let layout = ChunkLayout::from_ifd(&ifd, ByteOrder::LittleEndian).unwrap();

        let mut out = vec![0f32; 4];
        layout.read_samples(&file, 0, &[0, 1], &[0, 1], -9.0, &mut out).unwrap();
        assert_eq!(out, vec![0.0, 0.0, -9.0, -9.0]);
    }

    #[test]
    fn test_missing_offsets() {
        let mut ifd = stripped_ifd(4, 4, 1, vec![8], vec![4]);
        ifd.add_entry(entry(tags::COMPRESSION, vec![1]));
        assert!(matches!(
            ChunkLayout::from_ifd(&ifd, ByteOrder::LittleEndian),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_chunk_past_end_of_file() {
        let ifd = stripped_ifd(2, 1, 1, vec![8], vec![64]);
        let layout = ChunkLayout::from_ifd(&ifd, ByteOrder::LittleEndian).unwrap();
        assert!(layout.decode_chunk(&[0u8; 16], 0).is_err());
    }

    #[test]
    fn test_planar_chunk_index() {
        let mut ifd = stripped_ifd(2, 2, 2, vec![8, 12, 16], vec![4, 4, 4]);
        ifd.add_entry(entry(tags::SAMPLES_PER_PIXEL, vec![3]));
        ifd.add_entry(entry(tags::PLANAR_CONFIGURATION, vec![2]));
        let layout = ChunkLayout::from_ifd(&ifd, ByteOrder::LittleEndian).unwrap();

        assert_eq!(layout.chunk_count(), 3);
        assert_eq!(layout.chunk_index(1, 1, 2), 2);
        assert_eq!(layout.chunk_bytes(), 4);
    }
}
