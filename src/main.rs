use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rastercache::{logging, CacheConfig, RasterFile, Result, Window};

#[derive(Parser)]
#[command(name = "rastercache", version, about = "Block-cached GeoTIFF raster access")]
struct Cli {
    #[command(flatten)]
    cache: CacheArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CacheArgs {
    /// JSON cache configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Block edge length in pixels
    #[arg(long, global = true)]
    block_size: Option<u64>,

    /// Number of blocks kept in memory
    #[arg(long, global = true)]
    capacity: Option<usize>,

    /// Band served by single-pixel reads (0-based)
    #[arg(long, global = true)]
    band: Option<usize>,
}

impl CacheArgs {
    fn resolve(&self) -> Result<CacheConfig> {
        let base = match &self.config {
            Some(path) => CacheConfig::from_json_file(path)?,
            None => CacheConfig::default(),
        };
        let config = CacheConfig::new(
            self.block_size.unwrap_or(base.block_size),
            self.capacity.unwrap_or(base.capacity),
        );
        Ok(config.with_band(self.band.unwrap_or(base.band)))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print size, georeferencing and band layout
    Info {
        path: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print one sample through the block cache
    Pixel { path: PathBuf, x: u64, y: u64 },
    /// Read a window into the normalized interleaved layout
    Read {
        path: PathBuf,
        x_off: u64,
        y_off: u64,
        width: u64,
        height: u64,
        /// Output width (defaults to the window width)
        #[arg(long)]
        out_width: Option<u64>,
        /// Output height (defaults to the window height)
        #[arg(long)]
        out_height: Option<u64>,
    },
    /// Compute statistics of band 1
    Stats { path: PathBuf },
    /// Walk the raster through the cache and report hits and misses
    Scan {
        path: PathBuf,
        #[arg(long, value_enum, default_value = "row")]
        order: ScanOrder,
        /// Distance between visited pixels
        #[arg(long, default_value_t = 1)]
        step: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ScanOrder {
    Row,
    Diagonal,
}

fn main() -> Result<()> {
    logging::init("rastercache=info");
    let cli = Cli::parse();
    let config = cli.cache.resolve()?;

    match cli.command {
        Commands::Info { path, json } => {
            let file = RasterFile::open_with_config(path, config)?;
            let info = file.info()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print!("{}", info);
            }
        }
        Commands::Pixel { path, x, y } => {
            let mut file = RasterFile::open_with_config(path, config)?;
            let value = file.get_pixel(x, y)?;
            let (geo_x, geo_y) = file.pixel_to_geo(x as f64 + 0.5, y as f64 + 0.5)?;
            println!("({}, {}) = {}", x, y, value);
            println!("center: ({}, {})", geo_x, geo_y);
        }
        Commands::Read {
            path,
            x_off,
            y_off,
            width,
            height,
            out_width,
            out_height,
        } => {
            let mut file = RasterFile::open_with_config(path, config)?;
            let window = Window::new(x_off, y_off, width, height);
            let out_w = out_width.unwrap_or(width);
            let out_h = out_height.unwrap_or(height);

            let start = Instant::now();
            let (layout, values) = file.read_vec(&window, out_w, out_h)?;
            let elapsed = start.elapsed();

            let (min, max) = values
                .iter()
                .filter(|v| v.is_finite())
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            println!(
                "{} x {} pixels, layout {} ({} components), {} values in {:.2?}",
                out_w,
                out_h,
                layout.name(),
                layout.components(),
                values.len(),
                elapsed
            );
            if min <= max {
                println!("range: {} .. {}", min, max);
            }
        }
        Commands::Stats { path } => {
            let mut file = RasterFile::open_with_config(path, config)?;
            let stats = file.compute_statistics()?;
            println!("min:    {}", stats.minimum);
            println!("max:    {}", stats.maximum);
            println!("mean:   {}", stats.mean);
            println!("stddev: {}", stats.std_dev);
        }
        Commands::Scan { path, order, step } => {
            let mut file = RasterFile::open_with_config(path, config)?;
            let (width, height) = file.raster_size()?;
            let step = step.max(1);

            let start = Instant::now();
            let mut visited = 0u64;
            match order {
                ScanOrder::Row => {
                    for y in (0..height).step_by(step as usize) {
                        for x in (0..width).step_by(step as usize) {
                            file.get_pixel(x, y)?;
                            visited += 1;
                        }
                    }
                }
                ScanOrder::Diagonal => {
                    let mut i = 0;
                    while i < width.min(height) {
                        file.get_pixel(i, i)?;
                        visited += 1;
                        i += step;
                    }
                }
            }

            let stats = file.cache_stats()?;
            println!("visited {} pixels in {:.2?}", visited, start.elapsed());
            println!(
                "hits {}, misses {}, max consecutive misses {}, hit rate {:.3}",
                stats.hits,
                stats.misses,
                stats.max_consecutive_misses,
                stats.hit_rate()
            );
            file.log_cache_stats()?;
        }
    }

    Ok(())
}
