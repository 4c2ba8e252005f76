//! Uncompressed tiled BigTIFF writer
//!
//! File layout: 16-byte header, preallocated pixel data (all tiles, row-major,
//! fixed size), then the directory. Pixels are written in place; the
//! directory is rewritten behind the pixel data on every flush.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use crate::error::{Error, Result};
use crate::io::ByteOrder;
use crate::types::{DataType, DecodedSample, GeoTransform, Window};
use super::gdal::{self, GdalMetadata};
use super::geotiff::key_directory_for;
use super::tags::{self, field_types};
use super::BIGTIFF_MAGIC;

/// Edge of the square tiles written by [`TiffWriter`]
pub const TILE_SIZE: u64 = 256;

const HEADER_LEN: u64 = 16;
const ORDER: ByteOrder = ByteOrder::LittleEndian;

/// Georeferencing and metadata written into the directory
#[derive(Debug, Clone, Default)]
pub struct DirectoryMetadata {
    pub geotransform: GeoTransform,
    pub projection: String,
    pub no_data: Option<f64>,
    pub gdal: GdalMetadata,
}

/// Single-band writer for uncompressed tiled BigTIFF files
pub struct TiffWriter {
    file: File,
    width: u64,
    height: u64,
    data_type: DataType,
    pub metadata: DirectoryMetadata,
}

impl TiffWriter {
    /// Creates (or truncates) `path` and writes an initial directory
    pub fn create<P: AsRef<Path>>(
        path: P,
        width: u64,
        height: u64,
        data_type: DataType,
        metadata: DirectoryMetadata,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::OutOfBounds(format!("Raster size {} x {}", width, height)));
        }
        if data_type.is_complex() {
            return Err(Error::Unsupported(format!("Writing {} rasters", data_type)));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut writer = Self {
            file,
            width,
            height,
            data_type,
            metadata,
        };
        writer.file.set_len(writer.directory_offset())?;
        writer.flush()?;
        Ok(writer)
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    fn tiles_across(&self) -> u64 {
        self.width.div_ceil(TILE_SIZE)
    }

    fn tile_count(&self) -> u64 {
        self.tiles_across() * self.height.div_ceil(TILE_SIZE)
    }

    fn tile_bytes(&self) -> u64 {
        TILE_SIZE * TILE_SIZE * self.data_type.size() as u64
    }

    fn tile_index(&self, x: u64, y: u64) -> u64 {
        (y / TILE_SIZE) * self.tiles_across() + x / TILE_SIZE
    }

    fn tile_offset(&self, index: u64) -> u64 {
        HEADER_LEN + index * self.tile_bytes()
    }

    fn directory_offset(&self) -> u64 {
        self.tile_offset(self.tile_count())
    }

    /// File offset of pixel (`x`, `y`)
    fn pixel_offset(&self, x: u64, y: u64) -> u64 {
        let local = (y % TILE_SIZE) * TILE_SIZE + x % TILE_SIZE;
        self.tile_offset(self.tile_index(x, y)) + local * self.data_type.size() as u64
    }

    /// Writes `samples` (row-major, `window.pixel_count()` values) into `window`
    pub fn write_window(&mut self, window: &Window, samples: &[f64]) -> Result<()> {
        window.check_within(self.width, self.height)?;
        if samples.len() != window.pixel_count() {
            return Err(Error::BufferSize {
                expected: window.pixel_count(),
                actual: samples.len(),
            });
        }

        let size = self.data_type.size();
        let mut segment = Vec::new();
        for y in window.y_off..window.y_end() {
            let row = &samples[((y - window.y_off) * window.width) as usize..][..window.width as usize];
            let mut x = window.x_off;
            // One contiguous write per tile the row crosses.
            while x < window.x_end() {
                let run_end = ((x / TILE_SIZE + 1) * TILE_SIZE).min(window.x_end());
                segment.clear();
                segment.resize((run_end - x) as usize * size, 0);
                for (i, out) in segment.chunks_exact_mut(size).enumerate() {
                    let value = row[(x - window.x_off) as usize + i];
                    ORDER.encode_sample(self.data_type, value, out);
                }
                self.file.seek(SeekFrom::Start(self.pixel_offset(x, y)))?;
                self.file.write_all(&segment)?;
                x = run_end;
            }
        }
        Ok(())
    }

    /// Reads samples at the given source columns and rows into `out`
    pub fn read_samples<T: DecodedSample>(&mut self, xs: &[u64], ys: &[u64], out: &mut [T]) -> Result<()> {
        let size = self.data_type.size();
        let mut tiles: HashMap<u64, Vec<u8>> = HashMap::new();

        for (row, &y) in ys.iter().enumerate() {
            for (col, &x) in xs.iter().enumerate() {
                let index = self.tile_index(x, y);
                if !tiles.contains_key(&index) {
                    let mut tile = vec![0u8; self.tile_bytes() as usize];
                    self.file.seek(SeekFrom::Start(self.tile_offset(index)))?;
                    self.file.read_exact(&mut tile)?;
                    tiles.insert(index, tile);
                }
                let at = ((y % TILE_SIZE) * TILE_SIZE + x % TILE_SIZE) as usize * size;
                let value = ORDER.decode_sample(self.data_type, &tiles[&index][at..at + size]);
                out[row * xs.len() + col] = T::from_f64(value);
            }
        }
        Ok(())
    }

    /// Rewrites the directory behind the pixel data and syncs the file
    pub fn flush(&mut self) -> Result<()> {
        let dir_offset = self.directory_offset();
        let directory = self.build_directory().encode(dir_offset);

        self.file.seek(SeekFrom::Start(dir_offset))?;
        self.file.write_all(&directory)?;
        self.file.set_len(dir_offset + directory.len() as u64)?;

        let mut header = Vec::with_capacity(HEADER_LEN as usize);
        header.extend_from_slice(b"II");
        header.extend_from_slice(&BIGTIFF_MAGIC.to_le_bytes());
        header.extend_from_slice(&8u16.to_le_bytes());
        header.extend_from_slice(&0u16.to_le_bytes());
        header.extend_from_slice(&dir_offset.to_le_bytes());
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header)?;

        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    fn build_directory(&self) -> DirectoryBuilder {
        let (sample_format, bits) = self.data_type.tiff_sample_format();
        let tile_bytes = self.tile_bytes();
        let offsets: Vec<u64> = (0..self.tile_count()).map(|i| self.tile_offset(i)).collect();
        let counts = vec![tile_bytes; offsets.len()];

        let mut dir = DirectoryBuilder::default();
        dir.long8s(tags::IMAGE_WIDTH, &[self.width]);
        dir.long8s(tags::IMAGE_LENGTH, &[self.height]);
        dir.shorts(tags::BITS_PER_SAMPLE, &[bits]);
        dir.shorts(tags::COMPRESSION, &[1]);
        dir.shorts(tags::PHOTOMETRIC_INTERPRETATION, &[tags::photometric::MIN_IS_BLACK as u16]);
        dir.shorts(tags::SAMPLES_PER_PIXEL, &[1]);
        dir.shorts(tags::PLANAR_CONFIGURATION, &[1]);
        dir.shorts(tags::TILE_WIDTH, &[TILE_SIZE as u16]);
        dir.shorts(tags::TILE_LENGTH, &[TILE_SIZE as u16]);
        dir.long8s(tags::TILE_OFFSETS, &offsets);
        dir.long8s(tags::TILE_BYTE_COUNTS, &counts);
        dir.shorts(tags::SAMPLE_FORMAT, &[sample_format]);

        let gt = self.metadata.geotransform.0;
        if self.metadata.geotransform.is_north_up() {
            dir.doubles(tags::MODEL_PIXEL_SCALE, &[gt[1], -gt[5], 0.0]);
            dir.doubles(tags::MODEL_TIEPOINT, &[0.0, 0.0, 0.0, gt[0], gt[3], 0.0]);
        } else {
            dir.doubles(
                tags::MODEL_TRANSFORMATION,
                &[
                    gt[1], gt[2], 0.0, gt[0], //
                    gt[4], gt[5], 0.0, gt[3], //
                    0.0, 0.0, 0.0, 0.0, //
                    0.0, 0.0, 0.0, 1.0,
                ],
            );
        }

        let (keys, ascii) = key_directory_for(&self.metadata.projection);
        dir.shorts(tags::GEO_KEY_DIRECTORY, &keys);
        if !ascii.is_empty() {
            dir.ascii(tags::GEO_ASCII_PARAMS, &ascii);
        }
        if !self.metadata.gdal.is_empty() {
            dir.ascii(tags::GDAL_METADATA, &self.metadata.gdal.to_xml());
        }
        if let Some(no_data) = self.metadata.no_data {
            dir.ascii(tags::GDAL_NODATA, &gdal::format_nodata(no_data));
        }

        dir
    }
}

/// Collects directory entries and lays them out as a BigTIFF IFD
#[derive(Default)]
struct DirectoryBuilder {
    entries: Vec<(u16, u16, u64, Vec<u8>)>,
}

impl DirectoryBuilder {
    fn push(&mut self, tag: u16, field_type: u16, count: u64, bytes: Vec<u8>) {
        self.entries.push((tag, field_type, count, bytes));
    }

    fn shorts(&mut self, tag: u16, values: &[u16]) {
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(tag, field_types::SHORT, values.len() as u64, bytes);
    }

    fn long8s(&mut self, tag: u16, values: &[u64]) {
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(tag, field_types::LONG8, values.len() as u64, bytes);
    }

    fn doubles(&mut self, tag: u16, values: &[f64]) {
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(tag, field_types::DOUBLE, values.len() as u64, bytes);
    }

    fn ascii(&mut self, tag: u16, text: &str) {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        let count = bytes.len() as u64;
        self.push(tag, field_types::ASCII, count, bytes);
    }

    /// Encodes the directory for placement at `offset`; values that do not
    /// fit the 8-byte inline field follow the entry table.
    fn encode(mut self, offset: u64) -> Vec<u8> {
        self.entries.sort_by_key(|entry| entry.0);

        let table_len = 8 + self.entries.len() as u64 * 20 + 8;
        let mut table = Vec::with_capacity(table_len as usize);
        let mut extra: Vec<u8> = Vec::new();

        table.extend_from_slice(&(self.entries.len() as u64).to_le_bytes());
        for (tag, field_type, count, bytes) in &self.entries {
            table.extend_from_slice(&tag.to_le_bytes());
            table.extend_from_slice(&field_type.to_le_bytes());
            table.extend_from_slice(&count.to_le_bytes());
            if bytes.len() <= 8 {
                let mut field = [0u8; 8];
                field[..bytes.len()].copy_from_slice(bytes);
                table.extend_from_slice(&field);
            } else {
                let value_offset = offset + table_len + extra.len() as u64;
                table.extend_from_slice(&value_offset.to_le_bytes());
                extra.extend_from_slice(bytes);
                if extra.len() % 2 == 1 {
                    extra.push(0);
                }
            }
        }
        table.extend_from_slice(&0u64.to_le_bytes());

        table.extend_from_slice(&extra);
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::tiff::reader::{ChunkLayout, TiffReader};
    use crate::formats::tiff::GeoInfo;
    use tempfile::TempDir;

    fn metadata() -> DirectoryMetadata {
        DirectoryMetadata {
            geotransform: GeoTransform([100.0, 2.0, 0.0, 500.0, 0.0, -2.0]),
            projection: "EPSG:32631".to_string(),
            no_data: Some(-1.0),
            gdal: GdalMetadata::default(),
        }
    }

    #[test]
    fn test_written_file_parses_as_tiff() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.tif");
        let mut writer = TiffWriter::create(&path, 300, 10, DataType::I16, metadata()).unwrap();

        let window = Window::new(250, 2, 10, 1);
        let values: Vec<f64> = (0..10).map(|v| v as f64 - 5.0).collect();
        writer.write_window(&window, &values).unwrap();
        writer.flush().unwrap();

        let tiff = TiffReader::open(&path).unwrap().read().unwrap();
        assert!(tiff.is_big_tiff);
        let ifd = tiff.main_ifd().unwrap();
        assert_eq!(ifd.dimensions().unwrap().width, 300);
        assert_eq!(ifd.data_type(), Some(DataType::I16));
        assert_eq!(ifd.get_ascii(tags::GDAL_NODATA), Some("-1"));

        let geo = GeoInfo::from_ifd(ifd).unwrap();
        assert_eq!(geo.geo_transform().unwrap(), metadata().geotransform);
        assert_eq!(geo.projection(), "EPSG:32631");

        let layout = ChunkLayout::from_ifd(ifd, tiff.byte_order).unwrap();
        assert_eq!(layout.chunk_count(), 2);
        let bytes = std::fs::read(&path).unwrap();
        let mut out = vec![0f32; 10];
        let xs: Vec<u64> = (250..260).collect();
        layout.read_samples(&bytes, 0, &xs, &[2], 0.0, &mut out).unwrap();
        assert_eq!(out, values.iter().map(|&v| v as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_read_back_through_writer() {
        let dir = TempDir::new().unwrap();
        let mut writer =
            TiffWriter::create(dir.path().join("rw.tif"), 20, 20, DataType::U8, metadata()).unwrap();
        writer.write_window(&Window::new(0, 0, 2, 2), &[1.0, 2.0, 3.0, 300.0]).unwrap();

        let mut out = vec![0f32; 4];
        writer.read_samples(&[0, 1], &[0, 1], &mut out).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 255.0]);
    }

    #[test]
    fn test_rotated_transform_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rot.tif");
        let mut meta = metadata();
        meta.geotransform = GeoTransform([10.0, 1.0, 0.25, 20.0, 0.5, -1.0]);
        meta.projection = String::new();
        TiffWriter::create(&path, 4, 4, DataType::F32, meta.clone()).unwrap();

        let tiff = TiffReader::open(&path).unwrap().read().unwrap();
        let geo = GeoInfo::from_ifd(tiff.main_ifd().unwrap()).unwrap();
        assert_eq!(geo.geo_transform().unwrap(), meta.geotransform);
        assert_eq!(geo.projection(), "");
    }

    #[test]
    fn test_rejects_bad_input() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.tif");
        assert!(matches!(
            TiffWriter::create(&path, 4, 4, DataType::CF32, metadata()),
            Err(Error::Unsupported(_))
        ));

        let mut writer = TiffWriter::create(&path, 4, 4, DataType::U8, metadata()).unwrap();
        assert!(matches!(
            writer.write_window(&Window::new(3, 3, 2, 1), &[0.0, 0.0]),
            Err(Error::OutOfBounds(_))
        ));
        assert!(matches!(
            writer.write_window(&Window::new(0, 0, 2, 1), &[0.0]),
            Err(Error::BufferSize { expected: 2, actual: 1 })
        ));
    }
}
