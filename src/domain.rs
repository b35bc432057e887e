//! ==============================================================================
//! domain.rs - sensors, readings and the fetch window
//! ==============================================================================
//!
//! purpose:
//!     wire types exchanged with the farm backend plus the small derived
//!     types the dashboard computes from them.
//!
//! relationships:
//!     - produced by: api.rs (json decode)
//!     - consumed by: map_view.rs, soil.rs, series.rs, render.rs
//!
//! ==============================================================================

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// a sensor known to the backend
///
/// read-only to the dashboard; the whole list is replaced on every catalog load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    /// unique hardware identifier
    pub hardware_id: i64,
    pub name: String,
    pub sensor_type: SensorType,
    pub gps_latitude: f64,
    pub gps_longitude: f64,
    /// opaque payload, passed through untouched
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// kind of hardware behind a marker
///
/// unrecognised names are kept verbatim so they can still be displayed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SensorType {
    Camera,
    Soil,
    Temperature,
    Other(String),
}

impl SensorType {
    pub fn as_str(&self) -> &str {
        match self {
            SensorType::Camera => "camera",
            SensorType::Soil => "soil",
            SensorType::Temperature => "temperature",
            SensorType::Other(name) => name,
        }
    }
}

impl From<String> for SensorType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "camera" => SensorType::Camera,
            "soil" => SensorType::Soil,
            "temperature" => SensorType::Temperature,
            _ => SensorType::Other(value),
        }
    }
}

impl From<SensorType> for String {
    fn from(value: SensorType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// one time-series sample
///
/// any metric may be missing; hardware omits what it cannot measure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub sensor_id: i64,
    /// the backend names this field `ts`
    #[serde(alias = "ts")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sequence: Option<i64>,
    #[serde(default)]
    pub temperature_c: Option<f64>,
    #[serde(default)]
    pub humidity_pct: Option<f64>,
    #[serde(default)]
    pub capacitance_val: Option<f64>,
    #[serde(default)]
    pub battery_v: Option<f64>,
    #[serde(default)]
    pub rssi_dbm: Option<f64>,
}

/// numeric fields of a [`Reading`] that can be charted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    Temperature,
    Humidity,
    Capacitance,
    Battery,
    Rssi,
}

impl Reading {
    /// the value of `metric`, if present and finite
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        let value = match metric {
            Metric::Temperature => self.temperature_c,
            Metric::Humidity => self.humidity_pct,
            Metric::Capacitance => self.capacitance_val,
            Metric::Battery => self.battery_v,
            Metric::Rssi => self.rssi_dbm,
        };
        value.filter(|v| v.is_finite())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Float(n) => n.to_string(),
    })
}

/// a charted sample: instant plus value
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NormalizedPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// inclusive [start, end] bounds of a readings query
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    /// build a window, rejecting empty or inverted bounds
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// the window the dashboard historically queried
    pub fn legacy() -> Self {
        Self {
            start: Utc.with_ymd_and_hms(2025, 9, 17, 0, 53, 13).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 9, 17, 2, 38, 43).unwrap(),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

/// format an instant the way the backend expects it (`2025-09-17T00:53:13Z`)
pub fn iso8601(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_type_parsing() {
        assert_eq!(SensorType::from("soil".to_string()), SensorType::Soil);
        assert_eq!(SensorType::from("Camera".to_string()), SensorType::Camera);
        assert_eq!(
            SensorType::from("weather-station".to_string()),
            SensorType::Other("weather-station".to_string())
        );
        assert_eq!(String::from(SensorType::Temperature), "temperature");
    }

    #[test]
    fn test_sensor_from_backend_json() {
        let json = r#"[{"hardware_id": 1, "name": "North bed", "sensor_type": "soil",
                        "gps_latitude": 44.84, "gps_longitude": -122.77}]"#;
        let sensors: Vec<Sensor> = serde_json::from_str(json).unwrap();
        assert_eq!(sensors[0].sensor_type, SensorType::Soil);
        assert!(sensors[0].metadata.is_none());
    }

    #[test]
    fn test_reading_accepts_ts_and_numeric_id() {
        let json = r#"{"id": 17, "sensor_id": 3, "ts": "2025-09-17T01:00:00Z",
                       "capacitance_val": null, "rssi_dbm": -71}"#;
        let reading: Reading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.id, "17");
        assert_eq!(reading.timestamp, Utc.with_ymd_and_hms(2025, 9, 17, 1, 0, 0).unwrap());
        assert_eq!(reading.capacitance_val, None);
        assert_eq!(reading.metric(Metric::Rssi), Some(-71.0));
        assert_eq!(reading.metric(Metric::Battery), None);
    }

    #[test]
    fn test_window() {
        let w = FetchWindow::legacy();
        assert_eq!(iso8601(w.start), "2025-09-17T00:53:13Z");
        assert_eq!(iso8601(w.end), "2025-09-17T02:38:43Z");
        assert!(FetchWindow::new(w.end, w.start).is_none());
        assert!(FetchWindow::new(w.start, w.start).is_none());
    }
}
