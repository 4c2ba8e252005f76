use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use std::time::Instant;
use tracing::error;

use crate::error::{Error, ErrorKind};
use crate::raster::RasterFile;
use crate::store::RasterStore;
use crate::types::Window;
use super::models::*;
use super::SharedRaster;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Largest output a single window request may ask for, in pixels
pub const MAX_WINDOW_PIXELS: u64 = 4096 * 4096;

/// HTTP status for each error kind
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Precondition => StatusCode::BAD_REQUEST,
        ErrorKind::UnsupportedFormat => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Resource => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::State => StatusCode::CONFLICT,
    }
}

fn api_error(err: Error) -> ApiError {
    let status = status_for(err.kind());
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "request failed");
    }
    (status, Json(ErrorResponse { error: err.to_string() }))
}

/// Runs `f` on the shared raster in the blocking pool. The lock is held for
/// the whole call, so cache fetch and insert stay atomic.
async fn with_raster<S, T, F>(raster: SharedRaster<S>, f: F) -> Result<T, ApiError>
where
    S: RasterStore + Send + 'static,
    T: Send + 'static,
    F: FnOnce(&mut RasterFile<S>) -> crate::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut file = raster
            .lock()
            .map_err(|_| Error::Store("raster lock poisoned".to_string()))?;
        f(&mut *file)
    })
    .await
    .map_err(|e| api_error(Error::Store(format!("worker failed: {}", e))))?
    .map_err(api_error)
}

pub async fn get_info<S: RasterStore + Send + 'static>(
    State(raster): State<SharedRaster<S>>,
) -> Result<Json<InfoResponse>, ApiError> {
    let info = with_raster(raster, |file| file.info()).await?;
    Ok(Json(InfoResponse { info }))
}

pub async fn get_pixel<S: RasterStore + Send + 'static>(
    State(raster): State<SharedRaster<S>>,
    Query(req): Query<PixelRequest>,
) -> Result<Json<PixelResponse>, ApiError> {
    let start = Instant::now();
    let PixelRequest { x, y } = req;
    let (value, no_data) = with_raster(raster, move |file| {
        let value = file.get_pixel(x, y)?;
        let no_data = file.no_data_value()?.is_some_and(|nd| nd as f32 == value);
        Ok((value, no_data))
    })
    .await?;

    Ok(Json(PixelResponse {
        x,
        y,
        value,
        no_data,
        execution_time_ms: start.elapsed().as_secs_f64() * 1000.0,
    }))
}

pub async fn get_window<S: RasterStore + Send + 'static>(
    State(raster): State<SharedRaster<S>>,
    Query(req): Query<WindowRequest>,
) -> Result<Json<WindowResponse>, ApiError> {
    let start = Instant::now();
    let window = Window::new(req.x_off, req.y_off, req.width, req.height);
    let out_w = req.out_width.unwrap_or(req.width);
    let out_h = req.out_height.unwrap_or(req.height);
    if out_w.checked_mul(out_h).map_or(true, |pixels| pixels > MAX_WINDOW_PIXELS) {
        return Err(api_error(Error::OutOfBounds(format!(
            "Output of {} x {} pixels exceeds the limit of {} pixels",
            out_w, out_h, MAX_WINDOW_PIXELS
        ))));
    }

    let (layout, values) = with_raster(raster, move |file| file.read_vec(&window, out_w, out_h)).await?;

    Ok(Json(WindowResponse {
        width: out_w,
        height: out_h,
        layout,
        components: layout.components(),
        values,
        execution_time_ms: start.elapsed().as_secs_f64() * 1000.0,
    }))
}

pub async fn get_cache_stats<S: RasterStore + Send + 'static>(
    State(raster): State<SharedRaster<S>>,
) -> Result<Json<CacheResponse>, ApiError> {
    let stats = with_raster(raster, |file| file.cache_stats()).await?;
    Ok(Json(CacheResponse {
        hit_rate: stats.hit_rate(),
        stats,
    }))
}
