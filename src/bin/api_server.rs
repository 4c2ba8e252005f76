use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use rastercache::api::create_router;
use rastercache::{logging, CacheConfig, RasterFile};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "api-server", version, about = "HTTP pixel queries over one GeoTIFF")]
struct Args {
    /// GeoTIFF to serve
    path: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:3000")]
    listen: SocketAddr,

    /// JSON cache configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Block edge length in pixels
    #[arg(long)]
    block_size: Option<u64>,

    /// Number of blocks kept in memory
    #[arg(long)]
    capacity: Option<usize>,
}

#[tokio::main]
async fn main() {
    logging::init("rastercache=info,tower_http=info");
    let args = Args::parse();

    if let Err(err) = run(args).await {
        error!(error = %err, "server stopped");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let base = match &args.config {
        Some(path) => CacheConfig::from_json_file(path)?,
        None => CacheConfig::default(),
    };
    let config = CacheConfig::new(
        args.block_size.unwrap_or(base.block_size),
        args.capacity.unwrap_or(base.capacity),
    )
    .with_band(base.band);

    let file = RasterFile::open_with_config(&args.path, config)?;
    let (width, height) = file.raster_size()?;
    info!(path = %args.path.display(), width, height, "serving raster");

    let app = create_router(Arc::new(Mutex::new(file)));
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!(address = %args.listen, "listening");
    info!("endpoints: GET /api/info, /api/pixel?x=&y=, /api/window?x_off=&y_off=&width=&height=, /api/cache");

    axum::serve(listener, app).await?;
    Ok(())
}
