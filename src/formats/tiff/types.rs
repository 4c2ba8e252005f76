//! TIFF data structures

use std::fmt;
use crate::io::ByteOrder;
use super::ifd::IFD;
use super::tags;

/// Represents a parsed TIFF or BigTIFF file
#[derive(Debug)]
pub struct Tiff {
    /// Whether this is BigTIFF format
    pub is_big_tiff: bool,
    /// Byte order of the file
    pub byte_order: ByteOrder,
    /// Image File Directories
    pub ifds: Vec<IFD>,
}

impl Tiff {
    pub fn new(is_big_tiff: bool, byte_order: ByteOrder) -> Self {
        Self {
            is_big_tiff,
            byte_order,
            ifds: Vec::new(),
        }
    }

    /// Adds an IFD to this TIFF
    pub fn add_ifd(&mut self, ifd: IFD) {
        self.ifds.push(ifd);
    }

    /// Returns the main (first) IFD
    pub fn main_ifd(&self) -> Option<&IFD> {
        self.ifds.first()
    }

    /// Returns the number of IFDs
    pub fn ifd_count(&self) -> usize {
        self.ifds.len()
    }

    /// Number of reduced-resolution images after the main one, masks excluded
    pub fn overview_count(&self) -> usize {
        self.ifds
            .iter()
            .skip(1)
            .filter(|ifd| ifd.is_reduced_resolution())
            .filter(|ifd| ifd.photometric() != Some(tags::photometric::MASK))
            .count()
    }
}

impl fmt::Display for Tiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Format: {}", if self.is_big_tiff { "BigTIFF" } else { "TIFF" })?;
        writeln!(f, "Byte order: {:?}", self.byte_order)?;
        writeln!(f, "Directories: {} ({} overviews)", self.ifds.len(), self.overview_count())?;

        if let Some(ifd) = self.main_ifd() {
            if let Some(dims) = ifd.dimensions() {
                writeln!(f, "Dimensions: {} x {}", dims.width, dims.height)?;
            }
            writeln!(f, "Samples per pixel: {}", ifd.samples_per_pixel())?;
            writeln!(f, "Bits per sample: {}", ifd.bits_per_sample())?;
            writeln!(f, "Compression: {}", ifd.compression())?;
            match ifd.tile_dimensions() {
                Some(tile) => writeln!(f, "Tiled: {} x {}", tile.width, tile.height)?,
                None => writeln!(f, "Tiled: No")?,
            }
            writeln!(f, "GeoTIFF: {}", if ifd.is_geotiff() { "Yes" } else { "No" })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::tiff::ifd::{IFDEntry, TagValue};
    use crate::formats::tiff::tags::field_types;

    fn entry(tag: u16, value: u64) -> IFDEntry {
        IFDEntry::new(tag, field_types::LONG, 1, TagValue::Unsigned(vec![value]))
    }

    #[test]
    fn test_overview_count_skips_masks() {
        let mut tiff = Tiff::new(false, ByteOrder::LittleEndian);
        tiff.add_ifd(IFD::new(0, 8));

        let mut overview = IFD::new(1, 100);
        overview.add_entry(entry(tags::NEW_SUBFILE_TYPE, 1));
        tiff.add_ifd(overview);

        let mut mask = IFD::new(2, 200);
        mask.add_entry(entry(tags::NEW_SUBFILE_TYPE, 5));
        mask.add_entry(entry(tags::PHOTOMETRIC_INTERPRETATION, tags::photometric::MASK));
        tiff.add_ifd(mask);

        assert_eq!(tiff.ifd_count(), 3);
        assert_eq!(tiff.overview_count(), 1);
    }

    #[test]
    fn test_display() {
        let mut tiff = Tiff::new(true, ByteOrder::BigEndian);
        let mut ifd = IFD::new(0, 16);
        ifd.add_entry(entry(tags::IMAGE_WIDTH, 1024));
        ifd.add_entry(entry(tags::IMAGE_LENGTH, 768));
        ifd.add_entry(entry(tags::SAMPLES_PER_PIXEL, 3));
        tiff.add_ifd(ifd);

        let output = format!("{}", tiff);
        assert!(output.contains("BigTIFF"));
        assert!(output.contains("1024 x 768"));
        assert!(output.contains("Samples per pixel: 3"));
        assert!(output.contains("Tiled: No"));
    }
}
