use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::store::RasterStore;
use super::handlers::*;
use super::SharedRaster;

pub fn create_router<S: RasterStore + Send + 'static>(raster: SharedRaster<S>) -> Router {
    Router::new()
        .route("/api/info", get(get_info::<S>))
        .route("/api/pixel", get(get_pixel::<S>))
        .route("/api/window", get(get_window::<S>))
        .route("/api/cache", get(get_cache_stats::<S>))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(raster)
}
