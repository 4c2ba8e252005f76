//! In-memory raster store

use std::collections::BTreeMap;
use crate::error::{Error, Result};
use crate::types::{ColorInterp, ColorTable, DataType, GeoTransform, Window};
use super::{
    check_request, resample_nearest, source_indices, BandInfo, BandStatistics, CreateOptions,
    RasterStore, StatisticsAccumulator,
};

/// One reduced-resolution level
#[derive(Debug, Clone)]
struct Overview {
    width: u64,
    height: u64,
    bands: Vec<Vec<f64>>,
}

/// Keeps every band in memory as f64 samples.
///
/// Written values are cast through the band data type, so a U8 band stores
/// what a U8 file would. Reads are counted, which lets callers observe
/// cache behaviour.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    width: u64,
    height: u64,
    geotransform: GeoTransform,
    projection: String,
    bands: Vec<BandInfo>,
    data: Vec<Vec<f64>>,
    overviews: BTreeMap<u32, Overview>,
    reads: usize,
    flushes: usize,
}

impl MemoryStore {
    /// Creates a raster of `band_count` bands filled with zeros
    pub fn new(width: u64, height: u64, band_count: usize, data_type: DataType) -> Self {
        let pixels = (width * height) as usize;
        Self {
            width,
            height,
            geotransform: GeoTransform::IDENTITY,
            projection: String::new(),
            bands: vec![BandInfo::new(data_type); band_count],
            data: vec![vec![0.0; pixels]; band_count],
            overviews: BTreeMap::new(),
            reads: 0,
            flushes: 0,
        }
    }

    /// Creates a single-band gray raster the way a file store would
    pub fn create(options: &CreateOptions) -> Result<Self> {
        options.validate()?;
        let fill = options.no_data_value.unwrap_or(0.0);
        let mut store = Self::new(options.width, options.height, 1, options.data_type)
            .with_geotransform(options.geotransform)
            .with_projection(options.projection.clone())
            .with_color_interps(&[ColorInterp::Gray])
            .with_no_data(options.no_data_value);
        store.data[0].fill(options.data_type.cast(fill));
        Ok(store)
    }

    pub fn with_geotransform(mut self, geotransform: GeoTransform) -> Self {
        self.geotransform = geotransform;
        self
    }

    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = projection.into();
        self
    }

    /// Sets the no-data value of every band
    pub fn with_no_data(mut self, no_data: Option<f64>) -> Self {
        for band in &mut self.bands {
            band.no_data = no_data;
        }
        self
    }

    /// Assigns colour interpretations to the leading bands
    pub fn with_color_interps(mut self, interps: &[ColorInterp]) -> Self {
        for (band, &interp) in self.bands.iter_mut().zip(interps) {
            band.color_interp = interp;
        }
        self
    }

    /// Makes band 0 a palette band using `table`
    pub fn with_color_table(mut self, table: ColorTable) -> Self {
        if let Some(band) = self.bands.first_mut() {
            band.color_interp = ColorInterp::Palette;
            band.color_table = Some(table);
        }
        self
    }

    /// Fills every band from `f(band, x, y)`, cast through the data type
    pub fn with_fn(mut self, f: impl Fn(usize, u64, u64) -> f64) -> Self {
        for (b, samples) in self.data.iter_mut().enumerate() {
            let data_type = self.bands[b].data_type;
            for y in 0..self.height {
                for x in 0..self.width {
                    samples[(y * self.width + x) as usize] = data_type.cast(f(b, x, y));
                }
            }
        }
        self
    }

    /// Sample at (`x`, `y`) of `band`
    pub fn sample(&self, band: usize, x: u64, y: u64) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(band).map(|d| d[(y * self.width + x) as usize])
    }

    /// Number of `read_window` calls served
    pub fn read_count(&self) -> usize {
        self.reads
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Size of the overview built for `factor`
    pub fn overview_size(&self, factor: u32) -> Option<(u64, u64)> {
        self.overviews.get(&factor).map(|o| (o.width, o.height))
    }

    /// Sample at (`x`, `y`) of `band` in the overview built for `factor`
    pub fn overview_sample(&self, factor: u32, band: usize, x: u64, y: u64) -> Option<f64> {
        let overview = self.overviews.get(&factor)?;
        if x >= overview.width || y >= overview.height {
            return None;
        }
        overview.bands.get(band).map(|d| d[(y * overview.width + x) as usize])
    }
}

impl RasterStore for MemoryStore {
    fn width(&self) -> u64 {
        self.width
    }

    fn height(&self) -> u64 {
        self.height
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn geotransform(&self) -> GeoTransform {
        self.geotransform
    }

    fn projection(&self) -> &str {
        &self.projection
    }

    fn band(&self, index: usize) -> Result<&BandInfo> {
        self.bands
            .get(index)
            .ok_or_else(|| Error::OutOfBounds(format!("Band {} of {}", index, self.bands.len())))
    }

    fn read_window(
        &mut self,
        band: usize,
        window: &Window,
        out: &mut [f32],
        out_w: u64,
        out_h: u64,
    ) -> Result<()> {
        check_request(self, band, window, out.len(), out_w, out_h)?;
        self.reads += 1;

        let xs = source_indices(window.x_off, window.width, out_w);
        let ys = source_indices(window.y_off, window.height, out_h);
        let samples = &self.data[band];
        for (row, &y) in ys.iter().enumerate() {
            for (col, &x) in xs.iter().enumerate() {
                out[row * xs.len() + col] = samples[(y * self.width + x) as usize] as f32;
            }
        }
        Ok(())
    }

    fn write_window(
        &mut self,
        band: usize,
        window: &Window,
        data: &[f64],
        in_w: u64,
        in_h: u64,
    ) -> Result<()> {
        check_request(self, band, window, data.len(), in_w, in_h)?;

        let data_type = self.bands[band].data_type;
        let resampled = resample_nearest(data, in_w, in_h, window.width, window.height);
        let samples = &mut self.data[band];
        for row in 0..window.height {
            let start = ((window.y_off + row) * self.width + window.x_off) as usize;
            let src = &resampled[(row * window.width) as usize..][..window.width as usize];
            for (dst, &value) in samples[start..start + window.width as usize].iter_mut().zip(src) {
                *dst = data_type.cast(value);
            }
        }
        Ok(())
    }

    fn compute_statistics(&mut self, band: usize) -> Result<BandStatistics> {
        let mut acc = StatisticsAccumulator::for_band(self.band(band)?);
        for &value in &self.data[band] {
            acc.add(value);
        }
        let stats = acc.finish()?;
        self.bands[band].statistics = Some(stats);
        Ok(stats)
    }

    fn build_overviews(&mut self, factors: &[u32]) -> Result<()> {
        for &factor in factors {
            if factor < 2 {
                return Err(Error::OutOfBounds(format!("Overview factor {}", factor)));
            }
            let width = self.width.div_ceil(factor as u64);
            let height = self.height.div_ceil(factor as u64);
            let bands = self
                .data
                .iter()
                .map(|samples| resample_nearest(samples, self.width, self.height, width, height))
                .collect();
            self.overviews.insert(factor, Overview { width, height, bands });
        }
        Ok(())
    }

    fn overview_count(&self) -> usize {
        self.overviews.len()
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient() -> MemoryStore {
        MemoryStore::new(4, 3, 2, DataType::F32).with_fn(|b, x, y| (b * 100) as f64 + (y * 10 + x) as f64)
    }

    #[test]
    fn test_read_window_exact() {
        let mut store = gradient();
        let mut out = vec![0f32; 4];
        store.read_window(1, &Window::new(1, 1, 2, 2), &mut out, 2, 2).unwrap();
        assert_eq!(out, vec![111.0, 112.0, 121.0, 122.0]);
        assert_eq!(store.read_count(), 1);
    }

    #[test]
    fn test_read_window_downsampled() {
        let mut store = gradient();
        let mut out = vec![0f32; 2];
        store.read_window(0, &Window::full(4, 3), &mut out, 2, 1).unwrap();
        assert_eq!(out, vec![11.0, 13.0]);
    }

    #[test]
    fn test_read_rejects_bad_requests() {
        let mut store = gradient();
        let mut out = vec![0f32; 4];
        assert!(matches!(
            store.read_window(2, &Window::new(0, 0, 2, 2), &mut out, 2, 2),
            Err(Error::OutOfBounds(_))
        ));
        assert!(matches!(
            store.read_window(0, &Window::new(3, 0, 2, 2), &mut out, 2, 2),
            Err(Error::OutOfBounds(_))
        ));
        assert!(matches!(
            store.read_window(0, &Window::new(0, 0, 2, 2), &mut out, 3, 1),
            Err(Error::BufferSize { expected: 3, actual: 4 })
        ));
        assert_eq!(store.read_count(), 0);
    }

    #[test]
    fn test_write_casts_through_data_type() {
        let mut store = MemoryStore::new(3, 3, 1, DataType::U8);
        store
            .write_window(0, &Window::new(1, 1, 2, 1), &[300.0, -4.0], 2, 1)
            .unwrap();
        assert_eq!(store.sample(0, 1, 1), Some(255.0));
        assert_eq!(store.sample(0, 2, 1), Some(0.0));
        assert_eq!(store.sample(0, 0, 0), Some(0.0));
    }

    #[test]
    fn test_write_upsamples_input() {
        let mut store = MemoryStore::new(4, 2, 1, DataType::I16);
        store.write_window(0, &Window::full(4, 2), &[1.0, 2.0], 2, 1).unwrap();
        let row: Vec<f64> = (0..4).map(|x| store.sample(0, x, 1).unwrap()).collect();
        assert_eq!(row, vec![1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_statistics_and_overviews() {
        let mut store = MemoryStore::new(300, 260, 1, DataType::U16)
            .with_fn(|_, x, _| x as f64)
            .with_no_data(Some(0.0));
        let stats = store.compute_statistics(0).unwrap();
        assert_eq!(stats.minimum, 1.0);
        assert_eq!(stats.maximum, 299.0);
        assert_eq!(store.band(0).unwrap().maximum(), Some(299.0));

        store.build_overviews(&[2, 4]).unwrap();
        assert_eq!(store.overview_count(), 2);
        assert_eq!(store.overview_size(2), Some((150, 130)));
        assert_eq!(store.overview_size(4), Some((75, 65)));
        assert_eq!(store.overview_sample(2, 0, 10, 0), Some(21.0));
        assert_eq!(store.overview_sample(4, 0, 74, 64), Some(298.0));
        assert_eq!(store.overview_sample(2, 0, 150, 0), None);
        assert_eq!(store.overview_sample(8, 0, 0, 0), None);
        assert!(store.build_overviews(&[1]).is_err());
    }

    #[test]
    fn test_statistics_skip_no_data_not_representable_in_f32() {
        let options = CreateOptions::new(2, 2, DataType::F32).with_no_data(Some(0.1));
        let mut store = MemoryStore::create(&options).unwrap();
        store.write_window(0, &Window::new(0, 0, 1, 1), &[5.0], 1, 1).unwrap();

        let stats = store.compute_statistics(0).unwrap();
        assert_eq!(stats.minimum, 5.0);
        assert_eq!(stats.maximum, 5.0);
        assert_eq!(stats.mean, 5.0);
    }

    #[test]
    fn test_read_rejects_overflowing_buffer_size() {
        let mut store = gradient();
        let mut out = vec![0f32; 4];
        assert!(matches!(
            store.read_window(0, &Window::new(0, 0, 2, 2), &mut out, 1 << 32, 1 << 32),
            Err(Error::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_create_fills_with_no_data() {
        let options = CreateOptions::new(2, 2, DataType::I16).with_no_data(Some(-9999.0));
        let store = MemoryStore::create(&options).unwrap();
        assert_eq!(store.sample(0, 1, 1), Some(-9999.0));
        assert_eq!(store.band(0).unwrap().color_interp, ColorInterp::Gray);
    }
}
