//! ==============================================================================
//! server.rs - dashboard web server
//! ==============================================================================
//!
//! routes:
//!     GET  /                         map page (+ open modal)
//!     GET  /api/state                map view snapshot as json
//!     POST /markers/:id/activate     open a sensor's surface [?start=&end=]
//!     POST /detail/close             close the open surface
//!     POST /detail/refresh           re-issue the open surface's fetch
//!     POST /map/reload               re-mount: reload the sensor catalog
//!     POST /map/pan?dx=&dy=          pan gesture (pixels)
//!     POST /map/zoom?delta=          zoom gesture (levels)
//!     GET  /icons/*                  marker icons from [map].icons_dir
//!
//! every POST answers with 303 back to the map page.
//! gesture amounts must be finite; anything else is a 400.
//!
//! ==============================================================================

use crate::api::SensorApi;
use crate::dashboard::Dashboard;
use crate::domain::FetchWindow;
use crate::map_view::MapView;
use crate::render;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Json, Redirect},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

pub struct ServerState<A> {
    dashboard: Dashboard<A>,
    icon_base: Arc<str>,
}

impl<A> Clone for ServerState<A> {
    fn clone(&self) -> Self {
        Self { dashboard: self.dashboard.clone(), icon_base: self.icon_base.clone() }
    }
}

pub fn router<A: SensorApi + 'static>(
    dashboard: Dashboard<A>,
    icon_base: &str,
    icons_dir: &FsPath,
) -> Router {
    let state = ServerState { dashboard, icon_base: Arc::from(icon_base) };
    Router::new()
        .route("/", get(page_handler::<A>))
        .route("/api/state", get(state_handler::<A>))
        .route("/markers/:id/activate", post(activate_handler::<A>))
        .route("/detail/close", post(close_handler::<A>))
        .route("/detail/refresh", post(refresh_handler::<A>))
        .route("/map/reload", post(reload_handler::<A>))
        .route("/map/pan", post(pan_handler::<A>))
        .route("/map/zoom", post(zoom_handler::<A>))
        .nest_service("/icons", ServeDir::new(icons_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn page_handler<A: SensorApi + 'static>(State(state): State<ServerState<A>>) -> Html<String> {
    let view = state.dashboard.snapshot().await;
    Html(render::page(&view, &state.icon_base))
}

async fn state_handler<A: SensorApi + 'static>(State(state): State<ServerState<A>>) -> Json<MapView> {
    Json(state.dashboard.snapshot().await)
}

#[derive(Deserialize, Default)]
struct WindowParams {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl WindowParams {
    /// both bounds or neither; a half-open window is rejected
    fn window(&self) -> Result<Option<FetchWindow>, String> {
        match (self.start, self.end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => FetchWindow::new(start, end)
                .map(Some)
                .ok_or_else(|| "start must be before end".to_string()),
            _ => Err("both start and end are required".to_string()),
        }
    }
}

async fn activate_handler<A: SensorApi + 'static>(
    State(state): State<ServerState<A>>,
    Path(id): Path<i64>,
    Query(params): Query<WindowParams>,
) -> Result<Redirect, (StatusCode, String)> {
    let window = params.window().map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let _ = state.dashboard.activate(id, window).await;
    Ok(Redirect::to("/"))
}

async fn close_handler<A: SensorApi + 'static>(State(state): State<ServerState<A>>) -> Redirect {
    state.dashboard.close().await;
    Redirect::to("/")
}

async fn refresh_handler<A: SensorApi + 'static>(State(state): State<ServerState<A>>) -> Redirect {
    let _ = state.dashboard.refresh().await;
    Redirect::to("/")
}

async fn reload_handler<A: SensorApi + 'static>(State(state): State<ServerState<A>>) -> Redirect {
    let _ = state.dashboard.mount().await;
    Redirect::to("/")
}

#[derive(Deserialize)]
struct PanParams {
    #[serde(default)]
    dx: f64,
    #[serde(default)]
    dy: f64,
}

/// NaN and infinities parse as f64 but would poison the viewport
fn finite(name: &str, value: f64) -> Result<f64, (StatusCode, String)> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err((StatusCode::BAD_REQUEST, format!("{name} must be a finite number")))
    }
}

async fn pan_handler<A: SensorApi + 'static>(
    State(state): State<ServerState<A>>,
    Query(params): Query<PanParams>,
) -> Result<Redirect, (StatusCode, String)> {
    let dx = finite("dx", params.dx)?;
    let dy = finite("dy", params.dy)?;
    state.dashboard.pan_by(dx, dy).await;
    Ok(Redirect::to("/"))
}

#[derive(Deserialize)]
struct ZoomParams {
    delta: f64,
}

async fn zoom_handler<A: SensorApi + 'static>(
    State(state): State<ServerState<A>>,
    Query(params): Query<ZoomParams>,
) -> Result<Redirect, (StatusCode, String)> {
    let delta = finite("delta", params.delta)?;
    state.dashboard.zoom_by(delta).await;
    Ok(Redirect::to("/"))
}
