//! GeoTIFF-backed raster store

use std::fs::File;
use std::path::{Path, PathBuf};
use memmap2::Mmap;
use tracing::debug;
use crate::compression::Compression;
use crate::error::{Error, Result};
use crate::formats::tiff::gdal::{self, GdalMetadata};
use crate::formats::tiff::reader::{map_file, ChunkLayout};
use crate::formats::tiff::writer::DirectoryMetadata;
use crate::formats::tiff::{tags, GeoInfo, TiffReader, TiffWriter, IFD};
use crate::types::{
    ColorEntry, ColorInterp, ColorTable, DecodedSample, GeoTransform, PaletteInterp, Window,
};
use super::{
    check_request, resample_nearest, source_indices, BandInfo, BandStatistics, CreateOptions,
    RasterStore, StatisticsAccumulator,
};

/// Rows per request when streaming a whole band
const STRIP_ROWS: u64 = 256;

enum Backend {
    /// Existing file, read-only, decoded from a memory map
    Mapped { mmap: Mmap, layout: ChunkLayout },
    /// File created by this store
    Created(TiffWriter),
}

/// Raster store over a GeoTIFF file.
///
/// [`GeoTiffStore::open`] reads existing files (tiled or stripped, any
/// supported compression); [`GeoTiffStore::create`] writes new single-band
/// uncompressed tiled BigTIFF files.
pub struct GeoTiffStore {
    path: PathBuf,
    width: u64,
    height: u64,
    geotransform: GeoTransform,
    projection: String,
    bands: Vec<BandInfo>,
    overview_count: usize,
    backend: Backend,
}

impl GeoTiffStore {
    /// Opens an existing GeoTIFF read-only
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let tiff = TiffReader::open(path)?.read()?;
        let ifd = tiff
            .main_ifd()
            .ok_or_else(|| Error::InvalidFormat("TIFF file has no image directory".to_string()))?;

        let layout = ChunkLayout::from_ifd(ifd, tiff.byte_order)?;
        let geo = GeoInfo::from_ifd(ifd);
        let geotransform = geo
            .as_ref()
            .and_then(GeoInfo::geo_transform)
            .unwrap_or_default();
        let projection = geo.as_ref().map(GeoInfo::projection).unwrap_or_default();
        let bands = band_infos(ifd, &layout);

        let mmap = map_file(&File::open(path)?)?;
        debug!(
            path = %path.display(),
            width = layout.width,
            height = layout.height,
            bands = bands.len(),
            data_type = %layout.data_type,
            compression = layout.compression.name(),
            "opened GeoTIFF"
        );

        Ok(Self {
            path: path.to_path_buf(),
            width: layout.width,
            height: layout.height,
            geotransform,
            projection,
            bands,
            overview_count: tiff.overview_count(),
            backend: Backend::Mapped { mmap, layout },
        })
    }

    /// Creates a new single-band GeoTIFF, replacing any existing file
    pub fn create<P: AsRef<Path>>(path: P, options: &CreateOptions) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref();
        let metadata = DirectoryMetadata {
            geotransform: options.geotransform,
            projection: options.projection.clone(),
            no_data: options.no_data_value,
            gdal: GdalMetadata::default(),
        };
        let mut writer =
            TiffWriter::create(path, options.width, options.height, options.data_type, metadata)?;
        if let Some(no_data) = options.no_data_value.filter(|&v| v != 0.0) {
            fill_rows(&mut writer, options.width, options.height, no_data)?;
        }
        debug!(path = %path.display(), width = options.width, height = options.height, "created GeoTIFF");

        Ok(Self {
            path: path.to_path_buf(),
            width: options.width,
            height: options.height,
            geotransform: options.geotransform,
            projection: options.projection.clone(),
            bands: vec![BandInfo::new(options.data_type)
                .with_color_interp(ColorInterp::Gray)
                .with_no_data(options.no_data_value)],
            overview_count: 0,
            backend: Backend::Created(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether writes are accepted
    pub fn is_writable(&self) -> bool {
        matches!(self.backend, Backend::Created(_))
    }

    /// Decodes the samples of `band` at the given columns and rows. Pixels
    /// of sparse chunks read as the no-data value rounded to the band type.
    fn read_samples<T: DecodedSample>(
        &mut self,
        band: usize,
        xs: &[u64],
        ys: &[u64],
        out: &mut [T],
    ) -> Result<()> {
        let info = &self.bands[band];
        let fill = T::from_f64(info.data_type.cast(info.no_data.unwrap_or(0.0)));
        match &mut self.backend {
            Backend::Mapped { mmap, layout } => layout.read_samples(&mmap[..], band, xs, ys, fill, out),
            Backend::Created(writer) => writer.read_samples(xs, ys, out),
        }
    }
}

/// New tiles hold zeros; rasters with a non-zero no-data value start out
/// filled with it instead.
fn fill_rows(writer: &mut TiffWriter, width: u64, height: u64, value: f64) -> Result<()> {
    let mut y = 0;
    while y < height {
        let h = STRIP_ROWS.min(height - y);
        let window = Window::new(0, y, width, h);
        writer.write_window(&window, &vec![value; window.pixel_count()])?;
        y += h;
    }
    Ok(())
}

/// Band metadata from the photometric, extra-samples, palette and GDAL tags
fn band_infos(ifd: &IFD, layout: &ChunkLayout) -> Vec<BandInfo> {
    let count = layout.samples_per_pixel;
    let no_data = ifd.get_ascii(tags::GDAL_NODATA).and_then(gdal::parse_nodata);
    let metadata = ifd
        .get_ascii(tags::GDAL_METADATA)
        .map(GdalMetadata::parse)
        .unwrap_or_default();

    let photometric = ifd.photometric();
    let color_count = match photometric {
        Some(tags::photometric::RGB) => 3,
        Some(_) => 1,
        None => 0,
    };
    let extra = ifd.get_u64s(tags::EXTRA_SAMPLES).unwrap_or_default();

    (0..count)
        .map(|band| {
            let interp = match (photometric, band) {
                (Some(tags::photometric::RGB), 0) => ColorInterp::Red,
                (Some(tags::photometric::RGB), 1) => ColorInterp::Green,
                (Some(tags::photometric::RGB), 2) => ColorInterp::Blue,
                (Some(tags::photometric::PALETTE), 0) => ColorInterp::Palette,
                (Some(tags::photometric::MIN_IS_BLACK | tags::photometric::MIN_IS_WHITE), 0) => {
                    ColorInterp::Gray
                }
                (None, 0) if count == 1 => ColorInterp::Gray,
                _ if band >= color_count => match extra.get(band - color_count) {
                    Some(&tags::EXTRA_SAMPLE_ASSOCIATED_ALPHA)
                    | Some(&tags::EXTRA_SAMPLE_UNASSOCIATED_ALPHA) => ColorInterp::Alpha,
                    _ => ColorInterp::Undefined,
                },
                _ => ColorInterp::Undefined,
            };

            let mut info = BandInfo::new(layout.data_type)
                .with_color_interp(interp)
                .with_no_data(no_data);
            if interp == ColorInterp::Palette {
                info.color_table = color_table(ifd);
            }
            info.statistics = stored_statistics(&metadata, band);
            info
        })
        .collect()
}

/// Palette from the ColorMap tag; TIFF stores 16-bit components
fn color_table(ifd: &IFD) -> Option<ColorTable> {
    let map = ifd.get_u64s(tags::COLOR_MAP)?;
    if map.is_empty() || map.len() % 3 != 0 {
        return None;
    }
    let n = map.len() / 3;
    let entries = (0..n)
        .map(|i| {
            ColorEntry::rgb(
                (map[i] / 257) as u16,
                (map[n + i] / 257) as u16,
                (map[2 * n + i] / 257) as u16,
            )
        })
        .collect();
    Some(ColorTable::new(PaletteInterp::Rgb, entries))
}

fn stored_statistics(metadata: &GdalMetadata, band: usize) -> Option<BandStatistics> {
    Some(BandStatistics {
        minimum: metadata.get_f64("STATISTICS_MINIMUM", band)?,
        maximum: metadata.get_f64("STATISTICS_MAXIMUM", band)?,
        mean: metadata.get_f64("STATISTICS_MEAN", band).unwrap_or(f64::NAN),
        std_dev: metadata.get_f64("STATISTICS_STDDEV", band).unwrap_or(f64::NAN),
    })
}

impl RasterStore for GeoTiffStore {
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
        let xs = source_indices(window.x_off, window.width, out_w);
        let ys = source_indices(window.y_off, window.height, out_h);
        self.read_samples(band, &xs, &ys, out)
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
        match &mut self.backend {
            Backend::Mapped { .. } => Err(Error::Store(format!(
                "{} was opened read-only",
                self.path.display()
            ))),
            Backend::Created(writer) => {
                let samples = resample_nearest(data, in_w, in_h, window.width, window.height);
                writer.write_window(window, &samples)
            }
        }
    }

    fn compute_statistics(&mut self, band: usize) -> Result<BandStatistics> {
        let mut acc = StatisticsAccumulator::for_band(self.band(band)?);
        let xs: Vec<u64> = (0..self.width).collect();
        let mut rows = Vec::new();
        let mut y = 0;
        while y < self.height {
            let h = STRIP_ROWS.min(self.height - y);
            let ys: Vec<u64> = (y..y + h).collect();
            rows.resize(xs.len() * ys.len(), 0f64);
            self.read_samples(band, &xs, &ys, &mut rows)?;
            rows.iter().for_each(|&v| acc.add(v));
            y += h;
        }

        let stats = acc.finish()?;
        self.bands[band].statistics = Some(stats);

        if let Backend::Created(writer) = &mut self.backend {
            let gdal = &mut writer.metadata.gdal;
            gdal.set("STATISTICS_MINIMUM", Some(band), stats.minimum.to_string());
            gdal.set("STATISTICS_MAXIMUM", Some(band), stats.maximum.to_string());
            gdal.set("STATISTICS_MEAN", Some(band), stats.mean.to_string());
            gdal.set("STATISTICS_STDDEV", Some(band), stats.std_dev.to_string());
        }
        Ok(stats)
    }

    fn build_overviews(&mut self, _factors: &[u32]) -> Result<()> {
        Err(Error::Unsupported("Overview generation for GeoTIFF stores".to_string()))
    }

    fn overview_count(&self) -> usize {
        self.overview_count
    }

    fn compression(&self) -> Option<Compression> {
        match &self.backend {
            Backend::Mapped { layout, .. } => Some(layout.compression),
            Backend::Created(_) => Some(Compression::None),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match &mut self.backend {
            Backend::Mapped { .. } => Ok(()),
            Backend::Created(writer) => writer.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn options() -> CreateOptions {
        CreateOptions::new(300, 280, DataType::I16)
            .with_geotransform(GeoTransform([400_000.0, 1.0, 0.0, 5_000_000.0, 0.0, -1.0]))
            .with_projection("EPSG:32632")
            .with_no_data(Some(-9999.0))
    }

    #[test]
    fn test_create_write_flush_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dem.tif");

        let mut store = GeoTiffStore::create(&path, &options()).unwrap();
        assert!(store.is_writable());
        let window = Window::new(250, 270, 20, 10);
        let data: Vec<f64> = (0..200).map(|i| i as f64).collect();
        store.write_window(0, &window, &data, 20, 10).unwrap();
        store.write_window(0, &Window::new(0, 0, 1, 1), &[-9999.0], 1, 1).unwrap();
        let stats = store.compute_statistics(0).unwrap();
        assert_eq!(stats.minimum, 0.0);
        assert_eq!(stats.maximum, 199.0);
        store.flush().unwrap();
        drop(store);

        let mut reopened = GeoTiffStore::open(&path).unwrap();
        assert!(!reopened.is_writable());
        assert_eq!((reopened.width(), reopened.height()), (300, 280));
        assert_eq!(reopened.projection(), "EPSG:32632");
        assert_eq!(reopened.geotransform(), options().geotransform);
        assert_eq!(reopened.compression(), Some(Compression::None));

        let band = reopened.band(0).unwrap();
        assert_eq!(band.data_type, DataType::I16);
        assert_eq!(band.no_data, Some(-9999.0));
        assert_eq!(band.color_interp, ColorInterp::Gray);
        assert_eq!(band.minimum(), Some(0.0));
        assert_eq!(band.maximum(), Some(199.0));

        let mut out = vec![0f32; 200];
        reopened.read_window(0, &window, &mut out, 20, 10).unwrap();
        assert_eq!(out, data.iter().map(|&v| v as f32).collect::<Vec<_>>());

        let mut corner = vec![0f32; 1];
        reopened.read_window(0, &Window::new(0, 0, 1, 1), &mut corner, 1, 1).unwrap();
        assert_eq!(corner[0], -9999.0);
        reopened.read_window(0, &Window::new(5, 5, 1, 1), &mut corner, 1, 1).unwrap();
        assert_eq!(corner[0], -9999.0);
    }

    #[test]
    fn test_statistics_keep_full_i32_precision() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("counts.tif");
        let mut store = GeoTiffStore::create(&path, &CreateOptions::new(2, 1, DataType::I32)).unwrap();
        store
            .write_window(0, &Window::full(2, 1), &[16_777_217.0, 16_777_217.0], 2, 1)
            .unwrap();

        let stats = store.compute_statistics(0).unwrap();
        assert_eq!(stats.minimum, 16_777_217.0);
        assert_eq!(stats.maximum, 16_777_217.0);
        assert_eq!(stats.mean, 16_777_217.0);
    }

    #[test]
    fn test_statistics_skip_no_data_not_representable_in_f32() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f32.tif");
        let options = CreateOptions::new(2, 2, DataType::F32).with_no_data(Some(0.1));
        let mut store = GeoTiffStore::create(&path, &options).unwrap();
        store.write_window(0, &Window::new(0, 0, 1, 1), &[5.0], 1, 1).unwrap();

        let stats = store.compute_statistics(0).unwrap();
        assert_eq!(stats.minimum, 5.0);
        assert_eq!(stats.maximum, 5.0);
        assert_eq!(stats.mean, 5.0);
    }

    #[test]
    fn test_opened_store_is_read_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ro.tif");
        GeoTiffStore::create(&path, &CreateOptions::new(8, 8, DataType::U8)).unwrap();

        let mut store = GeoTiffStore::open(&path).unwrap();
        let err = store.write_window(0, &Window::new(0, 0, 1, 1), &[1.0], 1, 1).unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(matches!(store.build_overviews(&[2]), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_open_missing_file() {
        let err = GeoTiffStore::open("/no/such/file.tif").err().unwrap();
        assert!(matches!(err, Error::NotFound(_)));
    }

    /// Little-endian stripped 2x2 palette image with a 4-entry color map
    fn palette_tiff() -> NamedTempFile {
        let entries: Vec<(u16, u16, u16, Vec<u8>)> = vec![
            (256, 3, 1, 2u16.to_le_bytes().to_vec()),
            (257, 3, 1, 2u16.to_le_bytes().to_vec()),
            (258, 3, 1, 8u16.to_le_bytes().to_vec()),
            (262, 3, 1, 3u16.to_le_bytes().to_vec()),
            (273, 4, 1, 8u32.to_le_bytes().to_vec()),
            (277, 3, 1, 1u16.to_le_bytes().to_vec()),
            (278, 3, 1, 2u16.to_le_bytes().to_vec()),
            (279, 4, 1, 4u32.to_le_bytes().to_vec()),
        ];

        let mut data = Vec::new();
        data.extend_from_slice(b"II");
        data.extend_from_slice(&42u16.to_le_bytes());
        data.extend_from_slice(&12u32.to_le_bytes());
        data.extend_from_slice(&[0, 1, 2, 3]);

        // Directory at 12: 9 entries, color map data after it.
        let colormap_offset = 12 + 2 + 9 * 12 + 4;
        data.extend_from_slice(&9u16.to_le_bytes());
        for (tag, field_type, count, value) in &entries {
            data.extend_from_slice(&tag.to_le_bytes());
            data.extend_from_slice(&field_type.to_le_bytes());
            data.extend_from_slice(&count.to_le_bytes());
            data.extend_from_slice(&0u16.to_le_bytes());
            let mut field = [0u8; 4];
            field[..value.len()].copy_from_slice(value);
            data.extend_from_slice(&field);
        }
        data.extend_from_slice(&320u16.to_le_bytes());
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&(3 * 256u32).to_le_bytes());
        data.extend_from_slice(&(colormap_offset as u32).to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());

        let mut map = vec![0u16; 3 * 256];
        for i in 0..4 {
            map[i] = (i as u16 * 10) * 257;
            map[256 + i] = (i as u16 * 20) * 257;
            map[512 + i] = (i as u16 * 30) * 257;
        }
        for v in map {
            data.extend_from_slice(&v.to_le_bytes());
        }

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_open_palette_stripped_tiff() {
        let file = palette_tiff();
        let mut store = GeoTiffStore::open(file.path()).unwrap();

        assert_eq!(store.geotransform(), GeoTransform::IDENTITY);
        assert_eq!(store.projection(), "");
        let band = store.band(0).unwrap();
        assert_eq!(band.color_interp, ColorInterp::Palette);
        let table = band.color_table.as_ref().unwrap();
        assert_eq!(table.len(), 256);
        assert_eq!(*table.get(3).unwrap(), ColorEntry::rgb(30, 60, 90));

        let mut out = vec![0f32; 4];
        store.read_window(0, &Window::full(2, 2), &mut out, 2, 2).unwrap();
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0]);
    }
}
