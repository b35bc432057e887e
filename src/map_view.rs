//! ==============================================================================
//! map_view.rs - map view state machine
//! ==============================================================================
//!
//! purpose:
//!     one explicit state object for everything the map page shows:
//!     - catalog:   Idle -> Loaded(sensors) | Error(message)
//!     - selection: None | Camera | Soil | Temperature (at most one open)
//!     - detail:    loading flag, readings, inline error of the open surface
//!     - viewport:  center, zoom, pan and the re-home generation counter
//!
//!     every network result comes back with the ticket it was issued under.
//!     a result whose ticket no longer matches (view torn down, catalog
//!     re-mounted, surface closed or switched to another sensor) is dropped.
//!
//! relationships:
//!     - driven by: dashboard.rs (issues fetches, applies results)
//!     - read by: render.rs, server.rs (/api/state)
//!
//! ==============================================================================

use crate::config::{MapConfig, MAX_ZOOM};
use crate::domain::{FetchWindow, Reading, Sensor, SensorType};
use crate::error::FetchError;

use serde::Serialize;
use std::f64::consts::PI;
use std::sync::Arc;

/// map canvas size in pixels
pub const CANVAS_WIDTH: f64 = 1280.0;
pub const CANVAS_HEIGHT: f64 = 800.0;
const TILE_SIZE: f64 = 256.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum CatalogState {
    Idle,
    Loaded(Arc<Vec<Sensor>>),
    Error(String),
}

/// which detail surface a sensor opens
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceKind {
    Camera,
    Soil,
    Temperature,
}

impl SurfaceKind {
    /// unknown sensor types are shown on the temperature surface
    pub fn for_type(sensor_type: &SensorType) -> Self {
        match sensor_type {
            SensorType::Camera => SurfaceKind::Camera,
            SensorType::Soil => SurfaceKind::Soil,
            SensorType::Temperature | SensorType::Other(_) => SurfaceKind::Temperature,
        }
    }

    pub fn fetches_readings(self) -> bool {
        !matches!(self, SurfaceKind::Camera)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SurfaceKind::Camera => "camera",
            SurfaceKind::Soil => "soil",
            SurfaceKind::Temperature => "temperature",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default, Serialize)]
#[serde(tag = "surface", content = "sensor", rename_all = "snake_case")]
pub enum Selection {
    #[default]
    None,
    Camera(Sensor),
    Soil(Sensor),
    Temperature(Sensor),
}

impl Selection {
    fn open(kind: SurfaceKind, sensor: Sensor) -> Self {
        match kind {
            SurfaceKind::Camera => Selection::Camera(sensor),
            SurfaceKind::Soil => Selection::Soil(sensor),
            SurfaceKind::Temperature => Selection::Temperature(sensor),
        }
    }

    pub fn sensor(&self) -> Option<&Sensor> {
        match self {
            Selection::None => None,
            Selection::Camera(s) | Selection::Soil(s) | Selection::Temperature(s) => Some(s),
        }
    }
}

/// data behind the open detail surface
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetailState {
    pub window: FetchWindow,
    pub loading: bool,
    pub readings: Option<Arc<Vec<Reading>>>,
    pub error: Option<String>,
    #[serde(skip)]
    request_seq: u64,
}

/// identity a catalog load was issued under
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CatalogTicket {
    epoch: u64,
}

/// identity a readings fetch was issued under
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadingsRequest {
    pub sensor_id: i64,
    pub window: FetchWindow,
    seq: u64,
}

/// outcome of activating a marker
#[derive(Clone, Debug, PartialEq)]
pub enum Activation {
    /// no sensor with that id in the current catalog
    Unknown,
    Opened { surface: SurfaceKind, fetch: Option<ReadingsRequest> },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// camera over the map
///
/// `rehome` replaces a full map teardown: center moves, zoom returns to the
/// home level, gesture state is cleared and `generation` advances.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Viewport {
    pub center: GeoPoint,
    pub zoom: f64,
    pub home_zoom: f64,
    /// pixel offset accumulated from pan gestures
    pub pan: (f64, f64),
    pub generation: u64,
}

impl Viewport {
    pub fn new(center: GeoPoint, zoom: f64) -> Self {
        Self { center, zoom, home_zoom: zoom, pan: (0.0, 0.0), generation: 0 }
    }

    pub fn rehome(&mut self, center: GeoPoint) {
        self.center = center;
        self.zoom = self.home_zoom;
        self.pan = (0.0, 0.0);
        self.generation += 1;
    }

    /// non-finite offsets are ignored
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        if dx.is_finite() && dy.is_finite() {
            self.pan.0 += dx;
            self.pan.1 += dy;
        }
    }

    /// clamped to 0..=MAX_ZOOM; non-finite deltas are ignored
    pub fn zoom_by(&mut self, delta: f64) {
        if delta.is_finite() {
            self.zoom = (self.zoom + delta).clamp(0.0, MAX_ZOOM);
        }
    }

    /// web mercator world pixel coordinates at the current zoom
    fn world_px(&self, p: GeoPoint) -> (f64, f64) {
        let size = TILE_SIZE * 2f64.powf(self.zoom);
        let lat = p.lat.clamp(-85.051_128_78, 85.051_128_78).to_radians();
        let x = (p.lon + 180.0) / 360.0 * size;
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * size;
        (x, y)
    }

    /// canvas pixel position of a geographic point
    pub fn project(&self, p: GeoPoint) -> (f64, f64) {
        let (cx, cy) = self.world_px(self.center);
        let (x, y) = self.world_px(p);
        (
            x - cx + CANVAS_WIDTH / 2.0 + self.pan.0,
            y - cy + CANVAS_HEIGHT / 2.0 + self.pan.1,
        )
    }
}

/// a positioned sensor pin
#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub hardware_id: i64,
    pub name: String,
    pub sensor_type: SensorType,
    pub surface: SurfaceKind,
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct MapView {
    catalog: CatalogState,
    selection: Selection,
    detail: Option<DetailState>,
    viewport: Viewport,
    #[serde(skip)]
    mounted: bool,
    #[serde(skip)]
    mount_epoch: u64,
    #[serde(skip)]
    request_seq: u64,
}

impl MapView {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            catalog: CatalogState::Idle,
            selection: Selection::None,
            detail: None,
            viewport,
            mounted: false,
            mount_epoch: 0,
            request_seq: 0,
        }
    }

    pub fn from_config(map: &MapConfig) -> Self {
        let home = GeoPoint { lat: map.center_latitude, lon: map.center_longitude };
        Self::new(Viewport::new(home, map.zoom))
    }

    pub fn catalog(&self) -> &CatalogState {
        &self.catalog
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn detail(&self) -> Option<&DetailState> {
        self.detail.as_ref()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn sensors(&self) -> &[Sensor] {
        match &self.catalog {
            CatalogState::Loaded(sensors) => sensors.as_slice(),
            _ => &[],
        }
    }

    /// message for the catalog error badge
    pub fn catalog_error(&self) -> Option<&str> {
        match &self.catalog {
            CatalogState::Error(message) => Some(message),
            _ => None,
        }
    }

    // ==========================================================================
    // catalog lifecycle
    // ==========================================================================

    /// (re)mount the view; any earlier catalog load is invalidated
    pub fn mount(&mut self) -> CatalogTicket {
        self.mount_epoch += 1;
        self.mounted = true;
        self.catalog = CatalogState::Idle;
        CatalogTicket { epoch: self.mount_epoch }
    }

    /// tear the view down; in-flight results will be discarded
    pub fn teardown(&mut self) {
        self.mounted = false;
        self.mount_epoch += 1;
        self.close();
    }

    /// apply a catalog result; returns false when it was stale
    pub fn finish_catalog(
        &mut self,
        ticket: CatalogTicket,
        result: Result<Vec<Sensor>, FetchError>,
    ) -> bool {
        if !self.mounted || ticket.epoch != self.mount_epoch {
            return false;
        }
        self.catalog = match result {
            Ok(sensors) => {
                // a reload can drop the sensor whose surface is open
                let open_id = self.selection.sensor().map(|s| s.hardware_id);
                if let Some(id) = open_id {
                    if !sensors.iter().any(|s| s.hardware_id == id) {
                        self.close();
                    }
                }
                CatalogState::Loaded(Arc::new(sensors))
            }
            Err(e) => CatalogState::Error(e.to_string()),
        };
        true
    }

    // ==========================================================================
    // selection
    // ==========================================================================

    /// marker activation: re-home on the sensor and open its surface
    ///
    /// whatever was open before is closed first.
    pub fn activate(&mut self, hardware_id: i64, window: FetchWindow) -> Activation {
        let Some(sensor) = self.sensors().iter().find(|s| s.hardware_id == hardware_id).cloned() else {
            return Activation::Unknown;
        };

        self.close();
        self.viewport.rehome(GeoPoint { lat: sensor.gps_latitude, lon: sensor.gps_longitude });

        let surface = SurfaceKind::for_type(&sensor.sensor_type);
        self.selection = Selection::open(surface, sensor);

        let fetch = surface.fetches_readings().then(|| {
            self.request_seq += 1;
            self.detail = Some(DetailState {
                window,
                loading: true,
                readings: None,
                error: None,
                request_seq: self.request_seq,
            });
            ReadingsRequest { sensor_id: hardware_id, window, seq: self.request_seq }
        });

        Activation::Opened { surface, fetch }
    }

    /// close whatever surface is open and forget its sensor and data
    pub fn close(&mut self) {
        self.selection = Selection::None;
        self.detail = None;
    }

    /// re-issue the open surface's fetch; prior readings stay visible
    pub fn refresh(&mut self) -> Option<ReadingsRequest> {
        let sensor_id = self.selection.sensor()?.hardware_id;
        let detail = self.detail.as_mut()?;
        self.request_seq += 1;
        detail.loading = true;
        detail.error = None;
        detail.request_seq = self.request_seq;
        Some(ReadingsRequest { sensor_id, window: detail.window, seq: self.request_seq })
    }

    /// apply a readings result; returns false when it was stale
    pub fn apply_readings(
        &mut self,
        request: ReadingsRequest,
        result: Result<Vec<Reading>, FetchError>,
    ) -> bool {
        let current_id = self.selection.sensor().map(|s| s.hardware_id);
        let Some(detail) = self.detail.as_mut() else {
            return false;
        };
        if current_id != Some(request.sensor_id) || detail.request_seq != request.seq {
            return false;
        }

        detail.loading = false;
        match result {
            Ok(readings) => {
                detail.readings = Some(Arc::new(readings));
                detail.error = None;
            }
            Err(e) => detail.error = Some(e.to_string()),
        }
        true
    }

    // ==========================================================================
    // map gestures
    // ==========================================================================

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.viewport.pan_by(dx, dy);
    }

    pub fn zoom_by(&mut self, delta: f64) {
        self.viewport.zoom_by(delta);
    }

    /// every catalog sensor projected onto the canvas
    pub fn markers(&self) -> Vec<Marker> {
        self.sensors()
            .iter()
            .map(|s| {
                let (x, y) = self
                    .viewport
                    .project(GeoPoint { lat: s.gps_latitude, lon: s.gps_longitude });
                Marker {
                    hardware_id: s.hardware_id,
                    name: s.name.clone(),
                    sensor_type: s.sensor_type.clone(),
                    surface: SurfaceKind::for_type(&s.sensor_type),
                    x,
                    y,
                }
            })
            .collect()
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sensor(id: i64, kind: &str, lat: f64, lon: f64) -> Sensor {
        Sensor {
            hardware_id: id,
            name: format!("sensor-{id}"),
            sensor_type: SensorType::from(kind.to_string()),
            gps_latitude: lat,
            gps_longitude: lon,
            metadata: None,
        }
    }

    fn loaded_view() -> MapView {
        let mut view = MapView::from_config(&MapConfig::default());
        let ticket = view.mount();
        assert!(view.finish_catalog(
            ticket,
            Ok(vec![
                sensor(1, "soil", 44.84, -122.77),
                sensor(2, "camera", 44.85, -122.78),
                sensor(3, "temperature", 44.83, -122.76),
                sensor(4, "anemometer", 44.82, -122.75),
            ]),
        ));
        view
    }

    fn reading(sensor_id: i64) -> Reading {
        Reading {
            id: "r1".into(),
            sensor_id,
            timestamp: Utc.with_ymd_and_hms(2025, 9, 17, 1, 0, 0).unwrap(),
            sequence: Some(1),
            temperature_c: Some(17.5),
            humidity_pct: None,
            capacitance_val: Some(2500.0),
            battery_v: None,
            rssi_dbm: None,
        }
    }

    #[test]
    fn test_catalog_error_keeps_map_empty() {
        let mut view = MapView::from_config(&MapConfig::default());
        let ticket = view.mount();
        assert_eq!(view.catalog(), &CatalogState::Idle);
        view.finish_catalog(ticket, Err(FetchError::HttpStatus { resource: "sensors", status: 500 }));
        assert_eq!(view.catalog_error(), Some("Failed to fetch sensors: 500"));
        assert!(view.markers().is_empty());
    }

    #[test]
    fn test_catalog_result_after_teardown_is_dropped() {
        let mut view = MapView::from_config(&MapConfig::default());
        let ticket = view.mount();
        view.teardown();
        assert!(!view.finish_catalog(ticket, Ok(vec![sensor(1, "soil", 0.0, 0.0)])));
        assert_eq!(view.catalog(), &CatalogState::Idle);
    }

    #[test]
    fn test_remount_invalidates_older_catalog_load() {
        let mut view = MapView::from_config(&MapConfig::default());
        let first = view.mount();
        let second = view.mount();
        assert!(!view.finish_catalog(first, Ok(vec![sensor(1, "soil", 0.0, 0.0)])));
        assert!(view.finish_catalog(second, Ok(vec![])));
        assert_eq!(view.catalog(), &CatalogState::Loaded(Arc::new(vec![])));
    }

    #[test]
    fn test_dispatch_by_type() {
        let window = FetchWindow::legacy();
        let mut view = loaded_view();

        match view.activate(1, window) {
            Activation::Opened { surface: SurfaceKind::Soil, fetch: Some(req) } => {
                assert_eq!(req.sensor_id, 1);
                assert_eq!(req.window, window);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(view.detail().unwrap().loading);

        assert_eq!(
            view.activate(2, window),
            Activation::Opened { surface: SurfaceKind::Camera, fetch: None }
        );
        assert!(matches!(view.selection(), Selection::Camera(_)));
        assert!(view.detail().is_none());

        assert!(matches!(
            view.activate(3, window),
            Activation::Opened { surface: SurfaceKind::Temperature, fetch: Some(_) }
        ));
        assert!(matches!(
            view.activate(4, window),
            Activation::Opened { surface: SurfaceKind::Temperature, fetch: Some(_) }
        ));
        assert_eq!(view.activate(99, window), Activation::Unknown);
        // an unknown id leaves the current selection alone
        assert_eq!(view.selection().sensor().unwrap().hardware_id, 4);
    }

    #[test]
    fn test_activation_rehomes_viewport() {
        let mut view = loaded_view();
        view.pan_by(40.0, -12.0);
        view.zoom_by(-3.0);
        let before = view.viewport().generation;

        view.activate(2, FetchWindow::legacy());
        let vp = view.viewport();
        assert_eq!(vp.generation, before + 1);
        assert_eq!(vp.center, GeoPoint { lat: 44.85, lon: -122.78 });
        assert_eq!(vp.zoom, vp.home_zoom);
        assert_eq!(vp.pan, (0.0, 0.0));

        let marker = view.markers().into_iter().find(|m| m.hardware_id == 2).unwrap();
        assert!((marker.x - CANVAS_WIDTH / 2.0).abs() < 1e-6);
        assert!((marker.y - CANVAS_HEIGHT / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_close_clears_selection_and_data() {
        let mut view = loaded_view();
        let Activation::Opened { fetch: Some(req), .. } = view.activate(1, FetchWindow::legacy()) else {
            panic!("soil must fetch");
        };
        assert!(view.apply_readings(req, Ok(vec![reading(1)])));
        view.close();
        assert_eq!(view.selection(), &Selection::None);
        assert!(view.detail().is_none());
        // late duplicate of the same response cannot resurrect the surface
        assert!(!view.apply_readings(req, Ok(vec![reading(1)])));
    }

    #[test]
    fn test_stale_readings_for_other_sensor_dropped() {
        let window = FetchWindow::legacy();
        let mut view = loaded_view();
        let Activation::Opened { fetch: Some(for_soil), .. } = view.activate(1, window) else {
            panic!();
        };
        view.close();
        let Activation::Opened { fetch: Some(for_temp), .. } = view.activate(3, window) else {
            panic!();
        };

        assert!(!view.apply_readings(for_soil, Ok(vec![reading(1)])));
        let detail = view.detail().unwrap();
        assert!(detail.loading);
        assert!(detail.readings.is_none());

        assert!(view.apply_readings(for_temp, Ok(vec![reading(3)])));
        assert_eq!(view.detail().unwrap().readings.as_ref().unwrap()[0].sensor_id, 3);
    }

    #[test]
    fn test_reopening_same_sensor_ignores_earlier_request() {
        let window = FetchWindow::legacy();
        let mut view = loaded_view();
        let Activation::Opened { fetch: Some(first), .. } = view.activate(1, window) else { panic!() };
        view.close();
        let Activation::Opened { fetch: Some(second), .. } = view.activate(1, window) else { panic!() };

        assert!(!view.apply_readings(first, Err(FetchError::Timeout { resource: "readings" })));
        assert!(view.detail().unwrap().error.is_none());
        assert!(view.apply_readings(second, Ok(vec![])));
    }

    #[test]
    fn test_refresh_keeps_prior_readings_while_loading() {
        let mut view = loaded_view();
        let Activation::Opened { fetch: Some(req), .. } = view.activate(1, FetchWindow::legacy()) else {
            panic!()
        };
        view.apply_readings(req, Ok(vec![reading(1)]));

        let again = view.refresh().unwrap();
        let detail = view.detail().unwrap();
        assert!(detail.loading);
        assert!(detail.readings.is_some());

        view.apply_readings(again, Err(FetchError::HttpStatus { resource: "readings", status: 502 }));
        let detail = view.detail().unwrap();
        assert!(!detail.loading);
        assert_eq!(detail.error.as_deref(), Some("Failed to fetch readings: 502"));
    }

    #[test]
    fn test_camera_has_nothing_to_refresh() {
        let mut view = loaded_view();
        view.activate(2, FetchWindow::legacy());
        assert!(view.refresh().is_none());
        view.close();
        assert!(view.refresh().is_none());
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut view = loaded_view();
        view.zoom_by(50.0);
        assert_eq!(view.viewport().zoom, MAX_ZOOM);
        view.zoom_by(-100.0);
        assert_eq!(view.viewport().zoom, 0.0);
    }

    #[test]
    fn test_non_finite_gestures_leave_viewport_alone() {
        let mut view = loaded_view();
        let before = view.viewport().clone();
        view.zoom_by(f64::NAN);
        view.pan_by(f64::INFINITY, 3.0);
        view.pan_by(2.0, f64::NAN);
        assert_eq!(view.viewport(), &before);
        assert!(view.markers().iter().all(|m| m.x.is_finite() && m.y.is_finite()));
    }

    #[test]
    fn test_reload_closes_surface_of_removed_sensor() {
        let mut view = loaded_view();
        view.activate(3, FetchWindow::legacy());

        // still listed: the surface survives the reload
        let ticket = view.mount();
        assert!(view.finish_catalog(ticket, Ok(vec![sensor(3, "temperature", 44.83, -122.76)])));
        assert_eq!(view.selection().sensor().map(|s| s.hardware_id), Some(3));
        assert!(view.detail().is_some());

        // gone: the surface closes with it
        let ticket = view.mount();
        assert!(view.finish_catalog(ticket, Ok(vec![sensor(1, "soil", 44.84, -122.77)])));
        assert_eq!(view.selection(), &Selection::None);
        assert!(view.detail().is_none());
    }

    #[test]
    fn test_failed_reload_keeps_open_surface() {
        let mut view = loaded_view();
        view.activate(2, FetchWindow::legacy());
        let ticket = view.mount();
        view.finish_catalog(ticket, Err(FetchError::Timeout { resource: "sensors" }));
        assert_eq!(view.selection().sensor().map(|s| s.hardware_id), Some(2));
    }
}
