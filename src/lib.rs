//! farm sensor map dashboard
//!
//! sensor catalog and readings are fetched from the farm backend, soil
//! capacitance is normalized into a [0, 1] moisture signal, and everything
//! is served as a map page with per-sensor detail modals.

pub mod api;
pub mod chart;
pub mod config;
pub mod dashboard;
pub mod domain;
pub mod error;
pub mod map_view;
pub mod render;
pub mod series;
pub mod server;
pub mod soil;

pub use api::{HttpSensorApi, SensorApi};
pub use dashboard::Dashboard;
pub use domain::{FetchWindow, NormalizedPoint, Reading, Sensor, SensorType};
pub use error::FetchError;
pub use map_view::{MapView, Selection};
