//! Pixel format normalization
//!
//! Bulk reads come back from a store one band at a time (planar). This module
//! decides how many components each output pixel gets, rejects sample types
//! that f32 cannot hold exactly, expands palette indices into RGB and
//! interleaves the bands.

use serde::Serialize;
use tracing::warn;
use crate::error::{Error, Result};
use crate::store::RasterStore;
use crate::types::{ColorInterp, ColorTable, DataType, PaletteInterp, Window};
use super::RasterGeometry;

/// Component layout of a normalized pixel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PixelLayout {
    /// One component per pixel, passed through
    Gray,
    /// Palette indices expanded to RGB
    Palette,
    /// First three bands interleaved; a fourth band is dropped
    Rgb,
}

impl PixelLayout {
    /// Chooses the layout from the band count and whether band 0 is a
    /// palette band. Single-band non-palette rasters win over palettes,
    /// palettes over RGB.
    pub fn detect(band_count: usize, has_palette: bool) -> Result<Self> {
        match (band_count, has_palette) {
            (1, false) => Ok(PixelLayout::Gray),
            (_, true) => Ok(PixelLayout::Palette),
            (3 | 4, false) => Ok(PixelLayout::Rgb),
            _ => Err(Error::Unsupported(format!(
                "{}-band raster without palette",
                band_count
            ))),
        }
    }

    /// Components written per output pixel
    pub fn components(&self) -> usize {
        match self {
            PixelLayout::Gray => 1,
            PixelLayout::Palette | PixelLayout::Rgb => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PixelLayout::Gray => "gray",
            PixelLayout::Palette => "palette",
            PixelLayout::Rgb => "rgb",
        }
    }
}

/// Fails with [`Error::Precision`] for sample types f32 cannot represent
/// exactly: 32-bit integers, f64 and every complex type.
pub fn check_precision(data_type: DataType) -> Result<()> {
    if data_type.fits_f32() {
        Ok(())
    } else {
        Err(Error::Precision(data_type))
    }
}

/// Rearranges band-planar samples into pixel-interleaved order:
/// `out[i * bands + b] = planar[i + b * pixel_count]`.
pub fn interleave(planar: &[f32], pixel_count: usize, bands: usize, out: &mut [f32]) -> Result<()> {
    let expected = pixel_count * bands;
    if planar.len() != expected {
        return Err(Error::BufferSize {
            expected,
            actual: planar.len(),
        });
    }
    if out.len() != expected {
        return Err(Error::BufferSize {
            expected,
            actual: out.len(),
        });
    }

    for (b, plane) in planar.chunks_exact(pixel_count.max(1)).enumerate() {
        for (i, &value) in plane.iter().enumerate() {
            out[i * bands + b] = value;
        }
    }
    Ok(())
}

/// Maps palette indices to RGB triples from an RGB colour table
pub fn expand_palette(indices: &[f32], table: &ColorTable, out: &mut [f32]) -> Result<()> {
    if table.interpretation() != PaletteInterp::Rgb {
        return Err(Error::Unsupported(format!(
            "{:?} colour table, only RGB tables can be expanded",
            table.interpretation()
        )));
    }
    if out.len() != indices.len() * 3 {
        return Err(Error::BufferSize {
            expected: indices.len() * 3,
            actual: out.len(),
        });
    }

    for (&index, rgb) in indices.iter().zip(out.chunks_exact_mut(3)) {
        let entry = (index.is_finite() && index >= 0.0)
            .then(|| table.get(index as usize))
            .flatten()
            .ok_or(Error::PaletteIndex {
                index: index as f64,
                len: table.len(),
            })?;
        rgb[0] = entry.c1 as f32;
        rgb[1] = entry.c2 as f32;
        rgb[2] = entry.c3 as f32;
    }
    Ok(())
}

/// Number of f32 values a normalized read of `out_w` x `out_h` pixels fills
pub fn component_count(layout: PixelLayout, out_w: u64, out_h: u64) -> Result<usize> {
    out_w
        .checked_mul(out_h)
        .and_then(|pixels| pixels.checked_mul(layout.components() as u64))
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            Error::OutOfBounds(format!(
                "Output of {} x {} {} pixels does not fit in memory",
                out_w,
                out_h,
                layout.name()
            ))
        })
}

/// Checks the layout against the colour interpretation of the bands
fn check_interpretation(geometry: &RasterGeometry, layout: PixelLayout) -> Result<()> {
    match layout {
        PixelLayout::Gray => match geometry.bands[0].color_interp {
            ColorInterp::Gray | ColorInterp::Undefined => Ok(()),
            other => Err(Error::Unsupported(format!(
                "Single band with {} interpretation",
                other.name()
            ))),
        },
        PixelLayout::Palette => match &geometry.bands[0].color_table {
            Some(table) if table.interpretation() == PaletteInterp::Rgb => Ok(()),
            Some(table) => Err(Error::Unsupported(format!(
                "{:?} colour table, only RGB tables can be expanded",
                table.interpretation()
            ))),
            None => Err(Error::Unsupported("Palette band without colour table".to_string())),
        },
        PixelLayout::Rgb => {
            let expected = [ColorInterp::Red, ColorInterp::Green, ColorInterp::Blue];
            let actual: Vec<ColorInterp> = geometry.bands[..3].iter().map(|b| b.color_interp).collect();
            if actual != expected {
                warn!(
                    interpretations = ?actual,
                    "bands are not Red/Green/Blue, reading them as RGB anyway"
                );
            }
            Ok(())
        }
    }
}

/// Reads `window` resampled to `out_w` x `out_h` pixels into `out` as
/// interleaved f32 components and returns the layout used.
///
/// Every check (window, buffer length, precision, layout, colour
/// interpretation) runs before the store is touched.
pub fn read_normalized<S: RasterStore + ?Sized>(
    store: &mut S,
    geometry: &RasterGeometry,
    window: &Window,
    out_w: u64,
    out_h: u64,
    out: &mut [f32],
) -> Result<PixelLayout> {
    window.check_within(geometry.width, geometry.height)?;
    if out_w == 0 || out_h == 0 {
        return Err(Error::OutOfBounds(format!("Buffer size {} x {}", out_w, out_h)));
    }

    let layout = PixelLayout::detect(geometry.band_count, geometry.has_palette())?;
    let expected = component_count(layout, out_w, out_h)?;
    if out.len() != expected {
        return Err(Error::BufferSize {
            expected,
            actual: out.len(),
        });
    }
    check_precision(geometry.data_type)?;
    check_interpretation(geometry, layout)?;

    let pixels = expected / layout.components();
    match layout {
        PixelLayout::Gray => store.read_window(0, window, out, out_w, out_h)?,
        PixelLayout::Palette => {
            let mut indices = vec![0f32; pixels];
            store.read_window(0, window, &mut indices, out_w, out_h)?;
            if let Some(table) = &geometry.bands[0].color_table {
                expand_palette(&indices, table, out)?;
            }
        }
        PixelLayout::Rgb => {
            let mut planar = vec![0f32; pixels * 3];
            for (band, plane) in planar.chunks_exact_mut(pixels).enumerate() {
                store.read_window(band, window, plane, out_w, out_h)?;
            }
            interleave(&planar, pixels, 3, out)?;
        }
    }
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_interleave_two_bands() {
        let mut out = [0f32; 4];
        interleave(&[10.0, 20.0, 1.0, 2.0], 2, 2, &mut out).unwrap();
        assert_eq!(out, [10.0, 1.0, 20.0, 2.0]);
    }

    #[test]
    fn test_interleave_matches_definition() {
        let pixels = 5;
        let bands = 3;
        let planar: Vec<f32> = (0..pixels * bands).map(|v| v as f32).collect();
        let mut out = vec![0f32; pixels * bands];
        interleave(&planar, pixels, bands, &mut out).unwrap();
        for i in 0..pixels {
            for b in 0..bands {
                assert_eq!(out[i * bands + b], planar[i + b * pixels]);
            }
        }
    }

    #[test]
    fn test_interleave_rejects_short_buffer() {
        let mut out = [0f32; 3];
        let err = interleave(&[1.0, 2.0, 3.0, 4.0], 2, 2, &mut out).unwrap_err();
        assert!(matches!(err, Error::BufferSize { expected: 4, actual: 3 }));
    }

    #[test]
    fn test_layout_priority() {
        assert_eq!(PixelLayout::detect(1, false).unwrap(), PixelLayout::Gray);
        assert_eq!(PixelLayout::detect(1, true).unwrap(), PixelLayout::Palette);
        assert_eq!(PixelLayout::detect(3, true).unwrap(), PixelLayout::Palette);
        assert_eq!(PixelLayout::detect(3, false).unwrap(), PixelLayout::Rgb);
        assert_eq!(PixelLayout::detect(4, false).unwrap(), PixelLayout::Rgb);
        assert!(matches!(PixelLayout::detect(2, false), Err(Error::Unsupported(_))));
        assert!(matches!(PixelLayout::detect(5, false), Err(Error::Unsupported(_))));
        assert_eq!(PixelLayout::Rgb.components(), 3);
    }

    #[test]
    fn test_precision_policy() {
        for ok in [DataType::U8, DataType::I8, DataType::U16, DataType::I16, DataType::F32] {
            assert!(check_precision(ok).is_ok());
        }
        for rejected in [
            DataType::U32,
            DataType::I32,
            DataType::F64,
            DataType::CI16,
            DataType::CI32,
            DataType::CF32,
            DataType::CF64,
        ] {
            assert!(matches!(check_precision(rejected), Err(Error::Precision(_))));
        }
    }

    #[test]
    fn test_expand_palette() {
        let table = ColorTable::from_rgb(&[(255, 0, 0), (0, 255, 0)]);
        let mut out = [0f32; 9];
        expand_palette(&[0.0, 1.0, 1.0], &table, &mut out).unwrap();
        assert_eq!(out, [255.0, 0.0, 0.0, 0.0, 255.0, 0.0, 0.0, 255.0, 0.0]);
    }

    #[test]
    fn test_expand_palette_rejects_bad_indices() {
        let table = ColorTable::from_rgb(&[(255, 0, 0), (0, 255, 0)]);
        let mut out = [0f32; 3];
        for index in [2.0, -1.0, f32::NAN] {
            let err = expand_palette(&[index], &table, &mut out).unwrap_err();
            assert!(matches!(err, Error::PaletteIndex { len: 2, .. }));
        }
    }

    #[test]
    fn test_expand_palette_requires_rgb_table() {
        let table = ColorTable::new(PaletteInterp::Gray, Vec::new());
        let mut out = [0f32; 3];
        assert!(matches!(expand_palette(&[0.0], &table, &mut out), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_read_normalized_palette() {
        let mut store = MemoryStore::new(3, 1, 1, DataType::U8)
            .with_color_table(ColorTable::from_rgb(&[(255, 0, 0), (0, 255, 0)]))
            .with_fn(|_, x, _| if x == 0 { 0.0 } else { 1.0 });
        let geometry = RasterGeometry::from_store(&store).unwrap();

        let mut out = vec![0f32; 9];
        let layout = read_normalized(&mut store, &geometry, &Window::full(3, 1), 3, 1, &mut out).unwrap();
        assert_eq!(layout, PixelLayout::Palette);
        assert_eq!(out, vec![255.0, 0.0, 0.0, 0.0, 255.0, 0.0, 0.0, 255.0, 0.0]);
    }

    #[test]
    fn test_read_normalized_rgba_drops_alpha() {
        let mut store = MemoryStore::new(2, 1, 4, DataType::U8)
            .with_color_interps(&[
                ColorInterp::Red,
                ColorInterp::Green,
                ColorInterp::Blue,
                ColorInterp::Alpha,
            ])
            .with_fn(|b, x, _| (b * 10 + x as usize) as f64);
        let geometry = RasterGeometry::from_store(&store).unwrap();

        let mut out = vec![0f32; 6];
        let layout = read_normalized(&mut store, &geometry, &Window::full(2, 1), 2, 1, &mut out).unwrap();
        assert_eq!(layout, PixelLayout::Rgb);
        assert_eq!(out, vec![0.0, 10.0, 20.0, 1.0, 11.0, 21.0]);
        assert_eq!(store.read_count(), 3);
    }

    #[test]
    fn test_read_normalized_rejects_f64_before_reading() {
        let mut store = MemoryStore::new(4, 4, 1, DataType::F64);
        let geometry = RasterGeometry::from_store(&store).unwrap();

        let mut out = vec![0f32; 16];
        let err = read_normalized(&mut store, &geometry, &Window::full(4, 4), 4, 4, &mut out).unwrap_err();
        assert!(matches!(err, Error::Precision(DataType::F64)));
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedFormat);
        assert_eq!(store.read_count(), 0);
    }

    #[test]
    fn test_read_normalized_gray_interpretation() {
        let mut store = MemoryStore::new(2, 2, 1, DataType::U8).with_color_interps(&[ColorInterp::Alpha]);
        let geometry = RasterGeometry::from_store(&store).unwrap();
        let mut out = vec![0f32; 4];
        let err = read_normalized(&mut store, &geometry, &Window::full(2, 2), 2, 2, &mut out).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert_eq!(store.read_count(), 0);
    }

    #[test]
    fn test_read_normalized_buffer_size() {
        let mut store = MemoryStore::new(2, 2, 3, DataType::U8);
        let geometry = RasterGeometry::from_store(&store).unwrap();
        let mut out = vec![0f32; 4];
        let err = read_normalized(&mut store, &geometry, &Window::full(2, 2), 2, 2, &mut out).unwrap_err();
        assert!(matches!(err, Error::BufferSize { expected: 12, actual: 4 }));
    }

    #[test]
    fn test_read_normalized_rejects_overflowing_output_size() {
        let mut store = MemoryStore::new(2, 2, 3, DataType::U8);
        let geometry = RasterGeometry::from_store(&store).unwrap();
        let mut out = vec![0f32; 12];
        let err = read_normalized(&mut store, &geometry, &Window::full(2, 2), 1 << 32, 1 << 32, &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::OutOfBounds(_)));
        assert_eq!(store.read_count(), 0);

        assert!(component_count(PixelLayout::Rgb, u64::MAX / 2, 1).is_err());
        assert_eq!(component_count(PixelLayout::Rgb, 2, 3).unwrap(), 18);
    }
}
