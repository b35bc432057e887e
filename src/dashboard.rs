//! ==============================================================================
//! dashboard.rs - async driver around the map view state machine
//! ==============================================================================
//!
//! purpose:
//!     turns user actions into state transitions and network fetches.
//!     fetches run as spawned tasks; when one resolves, its result is handed
//!     back to MapView together with the ticket it was issued under, and
//!     MapView drops it if the view has moved on in the meantime.
//!
//! shared state:
//!     Arc<RwLock<MapView>> is shared between:
//!     - the web handlers (read for rendering, write for actions)
//!     - the fetch tasks (write when a response lands)
//!
//!     the runtime is single-threaded; the lock only orders the
//!     interleaving at await points.
//!
//! relationships:
//!     - uses: api.rs (SensorApi), map_view.rs (MapView)
//!     - used by: server.rs, main.rs
//!
//! ==============================================================================

use crate::api::SensorApi;
use crate::domain::FetchWindow;
use crate::map_view::{Activation, MapView, ReadingsRequest};

use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

pub struct Dashboard<A> {
    api: Arc<A>,
    view: Arc<RwLock<MapView>>,
    default_window: FetchWindow,
    show_sensor_data: bool,
}

impl<A> Clone for Dashboard<A> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            view: self.view.clone(),
            default_window: self.default_window,
            show_sensor_data: self.show_sensor_data,
        }
    }
}

impl<A: SensorApi + 'static> Dashboard<A> {
    pub fn new(api: A, view: MapView, default_window: FetchWindow) -> Self {
        Self {
            api: Arc::new(api),
            view: Arc::new(RwLock::new(view)),
            default_window,
            show_sensor_data: false,
        }
    }

    /// log per-fetch record counts at info level
    pub fn with_sensor_data_logging(mut self, enabled: bool) -> Self {
        self.show_sensor_data = enabled;
        self
    }

    /// copy of the current view state
    pub async fn snapshot(&self) -> MapView {
        self.view.read().await.clone()
    }

    /// mount the view and load the sensor catalog
    ///
    /// calling it again re-mounts: the catalog is reloaded and any load
    /// still in flight from the earlier mount is ignored.
    pub async fn mount(&self) -> JoinHandle<()> {
        let ticket = self.view.write().await.mount();
        let api = self.api.clone();
        let view = self.view.clone();
        let show = self.show_sensor_data;

        tokio::spawn(async move {
            let result = api.list_sensors().await;
            match &result {
                Ok(sensors) if show => tracing::info!(count = sensors.len(), "sensor catalog loaded"),
                Ok(_) => {}
                Err(e) => tracing::warn!("sensor catalog failed: {}", e),
            }
            if !view.write().await.finish_catalog(ticket, result) {
                tracing::debug!("discarding catalog response for an unmounted view");
            }
        })
    }

    /// tear the view down; pending results are discarded when they land
    pub async fn teardown(&self) {
        self.view.write().await.teardown();
    }

    /// marker activation
    ///
    /// returns the readings fetch task when the opened surface needs data.
    /// `window` overrides the configured fetch window.
    pub async fn activate(&self, hardware_id: i64, window: Option<FetchWindow>) -> Option<JoinHandle<()>> {
        let window = window.unwrap_or(self.default_window);
        let activation = self.view.write().await.activate(hardware_id, window);
        match activation {
            Activation::Unknown => {
                tracing::warn!(hardware_id, "activation for a sensor not in the catalog");
                None
            }
            Activation::Opened { surface, fetch } => {
                tracing::info!(hardware_id, surface = surface.as_str(), "detail surface opened");
                fetch.map(|request| self.spawn_readings(request))
            }
        }
    }

    /// close the open surface
    pub async fn close(&self) {
        self.view.write().await.close();
    }

    /// retry the open surface's fetch
    pub async fn refresh(&self) -> Option<JoinHandle<()>> {
        let request = self.view.write().await.refresh()?;
        Some(self.spawn_readings(request))
    }

    pub async fn pan_by(&self, dx: f64, dy: f64) {
        self.view.write().await.pan_by(dx, dy);
    }

    pub async fn zoom_by(&self, delta: f64) {
        self.view.write().await.zoom_by(delta);
    }

    fn spawn_readings(&self, request: ReadingsRequest) -> JoinHandle<()> {
        let api = self.api.clone();
        let view = self.view.clone();
        let show = self.show_sensor_data;

        tokio::spawn(async move {
            let result = api.readings(request.sensor_id, request.window).await;
            match &result {
                Ok(readings) if show => {
                    tracing::info!(sensor_id = request.sensor_id, count = readings.len(), "readings loaded")
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(sensor_id = request.sensor_id, "readings failed: {}", e),
            }
            if !view.write().await.apply_readings(request, result) {
                tracing::debug!(sensor_id = request.sensor_id, "discarding stale readings response");
            }
        })
    }
}
