//! time-series extraction and summary statistics over readings

use crate::domain::{Metric, NormalizedPoint, Reading};

use serde::Serialize;

/// `(timestamp, value)` points for one metric, sorted by timestamp
///
/// readings without a finite value for `metric` are dropped. the sort is
/// stable so equal timestamps keep their input order.
pub fn extract(readings: &[Reading], metric: Metric) -> Vec<NormalizedPoint> {
    let mut points: Vec<NormalizedPoint> = readings
        .iter()
        .filter_map(|r| {
            r.metric(metric).map(|value| NormalizedPoint { timestamp: r.timestamp, value })
        })
        .collect();
    points.sort_by_key(|p| p.timestamp);
    points
}

/// extrema, mean and most recent point of a sorted series
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub latest: NormalizedPoint,
}

impl SeriesSummary {
    /// `None` for an empty series
    ///
    /// `points` must already be sorted ascending by timestamp; `latest` is
    /// its last element.
    pub fn of(points: &[NormalizedPoint]) -> Option<Self> {
        let latest = *points.last()?;
        let (min, max, sum) = points.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), p| (min.min(p.value), max.max(p.value), sum + p.value),
        );
        Some(Self { min, max, avg: sum / points.len() as f64, latest })
    }
}

/// most recent finite value of `metric`, regardless of input order
pub fn latest_value(readings: &[Reading], metric: Metric) -> Option<f64> {
    readings
        .iter()
        .filter_map(|r| r.metric(metric).map(|v| (r.timestamp, v)))
        .fold(None, |best: Option<(chrono::DateTime<chrono::Utc>, f64)>, cur| match best {
            Some(b) if b.0 > cur.0 => Some(b),
            _ => Some(cur),
        })
        .map(|(_, v)| v)
}
