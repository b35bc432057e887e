//! ==============================================================================
//! soil.rs - capacitance to moisture normalization
//! ==============================================================================
//!
//! purpose:
//!     soil probes report raw capacitance, roughly 1000 (dry) to 4000 (wet).
//!     the dashboard charts that as a unitless moisture signal in [0, 1].
//!
//!     normalize():
//!         1. drop readings without a finite capacitance_val
//!         2. v -> clamp((v - 1000) / (4000 - 1000), 0, 1)
//!         3. stable sort by timestamp ascending
//!
//!     summarize():
//!         min / max / avg / latest over the normalized series,
//!         None when there is nothing to summarize.
//!
//! relationships:
//!     - used by: render.rs (soil detail modal)
//!     - uses: series.rs (extraction, summary)
//!
//! ==============================================================================

use crate::domain::{Metric, NormalizedPoint, Reading};
use crate::series::{self, SeriesSummary};

/// raw reading treated as fully dry
pub const CAPACITANCE_DRY: f64 = 1000.0;
/// raw reading treated as fully wet
pub const CAPACITANCE_WET: f64 = 4000.0;

/// map one raw capacitance value into [0, 1]; out-of-range input is clamped
pub fn moisture(raw: f64) -> f64 {
    ((raw - CAPACITANCE_DRY) / (CAPACITANCE_WET - CAPACITANCE_DRY)).clamp(0.0, 1.0)
}

/// normalized moisture series, sorted by timestamp
pub fn normalize(readings: &[Reading]) -> Vec<NormalizedPoint> {
    let mut points = series::extract(readings, Metric::Capacitance);
    for p in &mut points {
        p.value = moisture(p.value);
    }
    points
}

/// summary badges for the soil modal
pub fn summarize(points: &[NormalizedPoint]) -> Option<SeriesSummary> {
    SeriesSummary::of(points)
}
