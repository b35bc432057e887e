//! ==============================================================================
//! render.rs - html for the map page and the detail modals
//! ==============================================================================
//!
//! purpose:
//!     turns a MapView snapshot into a self-contained html page:
//!     - map canvas with one pin per sensor (icon by type, popup with details)
//!     - catalog error badge in the corner when the sensor list failed
//!     - the open detail modal, if any (camera / soil / temperature)
//!
//!     every action is a plain form POST so the page works without scripts.
//!     while a fetch is loading the page refreshes itself once a second.
//!
//! relationships:
//!     - used by: server.rs
//!     - uses: map_view.rs, soil.rs, series.rs, chart.rs
//!
//! ==============================================================================

use crate::chart::{html_escape, ScatterChart};
use crate::domain::{FetchWindow, Metric, Reading, Sensor, SensorType};
use crate::map_view::{DetailState, MapView, Marker, Selection, CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::series::{self, SeriesSummary};
use crate::soil;

use chrono::{DateTime, Utc};
use std::fmt::Write;

const PIN_WIDTH: f64 = 64.0;
const PIN_HEIGHT: f64 = 80.0;

/// icon path for a sensor type; unknown types share the temperature icon
pub fn icon_for(sensor_type: &SensorType, icon_base: &str) -> String {
    let file = match sensor_type {
        SensorType::Camera => "camera_icon.png",
        SensorType::Soil => "soil_icon.png",
        SensorType::Temperature | SensorType::Other(_) => "temp_icon.png",
    };
    format!("{}/icons/{}", icon_base.trim_end_matches('/'), file)
}

/// `Wed, Sep 17, 2025, 00:53:13 UTC`
pub fn utc_label(t: DateTime<Utc>) -> String {
    t.format("%a, %b %d, %Y, %H:%M:%S UTC").to_string()
}

pub fn window_label(window: &FetchWindow) -> String {
    format!("Window: {} – {}", utc_label(window.start), utc_label(window.end))
}

/// full map page
pub fn page(view: &MapView, icon_base: &str) -> String {
    let loading = view.detail().map(|d| d.loading).unwrap_or(false);
    let refresh = if loading { r#"<meta http-equiv="refresh" content="1">"# } else { "" };

    let mut body = String::new();
    body.push_str(&map_canvas(view, icon_base));
    if let Some(message) = view.catalog_error() {
        let _ = write!(body, r#"<div class="badge error-badge">{}</div>"#, html_escape(message));
    }
    body.push_str(&modal(view));

    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Farm Monitor</title>
{refresh}
<style>{STYLE}</style>
</head>
<body>
{body}
</body>
</html>"#
    )
}

fn map_canvas(view: &MapView, icon_base: &str) -> String {
    let vp = view.viewport();
    let mut html = String::new();
    let _ = write!(
        html,
        r#"<div class="map" data-generation="{generation}" data-center="{lat:.6},{lon:.6}" data-zoom="{zoom}" style="width:{w}px;height:{h}px">"#,
        generation = vp.generation,
        lat = vp.center.lat,
        lon = vp.center.lon,
        zoom = vp.zoom,
        w = CANVAS_WIDTH,
        h = CANVAS_HEIGHT,
    );
    for marker in view.markers() {
        html.push_str(&pin(&marker, icon_base));
    }
    html.push_str(MAP_CONTROLS);
    html.push_str("</div>");
    html
}

fn pin(marker: &Marker, icon_base: &str) -> String {
    // anchor is the bottom centre of the pin
    let left = marker.x - PIN_WIDTH / 2.0;
    let top = marker.y - PIN_HEIGHT;
    format!(
        r#"<form class="marker" data-surface="{surface}" method="post" action="/markers/{id}/activate" style="left:{left:.1}px;top:{top:.1}px">
<button type="submit" title="{name}"><img src="{icon}" alt="{kind}"></button>
<div class="popup"><strong>{name}</strong><div>Type: {kind}</div><div>ID: {id}</div></div>
</form>"#,
        id = marker.hardware_id,
        surface = marker.surface.as_str(),
        name = html_escape(&marker.name),
        kind = html_escape(marker.sensor_type.as_str()),
        icon = html_escape(&icon_for(&marker.sensor_type, icon_base)),
    )
}

/// the open detail modal, or nothing
pub fn modal(view: &MapView) -> String {
    match view.selection() {
        Selection::None => String::new(),
        Selection::Camera(sensor) => camera_modal(sensor),
        Selection::Soil(sensor) => match view.detail() {
            Some(detail) => soil_modal(sensor, detail),
            None => String::new(),
        },
        Selection::Temperature(sensor) => match view.detail() {
            Some(detail) => temperature_modal(sensor, detail),
            None => String::new(),
        },
    }
}

fn frame(title: &str, toolbar: &str, content: &str, detail: Option<&DetailState>) -> String {
    let progress = match detail {
        Some(d) if d.loading => r#"<div class="progress"><div class="bar"></div></div>"#,
        _ => "",
    };
    let error = match detail.and_then(|d| d.error.as_deref()) {
        Some(message) => format!(r#"<p class="inline-error">{}</p>"#, html_escape(message)),
        None => String::new(),
    };
    format!(
        r#"<div class="modal"><div class="modal-box">
<header><h2>{title}</h2>
<form method="post" action="/detail/refresh"><button type="submit" aria-label="Refresh">⟳</button></form>
<form method="post" action="/detail/close"><button type="submit" aria-label="Close">✕</button></form>
</header>
{progress}
<div class="toolbar">{toolbar}</div>
<div class="content">{content}</div>
{error}
</div></div>"#,
        title = html_escape(title),
    )
}

fn chip(class: &str, text: &str) -> String {
    format!(r#"<span class="chip {}">{}</span>"#, class, html_escape(text))
}

fn camera_modal(sensor: &Sensor) -> String {
    frame(
        &format!("{} · Camera", sensor.name),
        "",
        r#"<p class="placeholder">Work In Progress: camera feed</p>"#,
        None,
    )
}

/// soil surface: normalized moisture over the fetch window
pub fn soil_modal(sensor: &Sensor, detail: &DetailState) -> String {
    let readings: &[Reading] = detail.readings.as_deref().map(Vec::as_slice).unwrap_or(&[]);
    let points = soil::normalize(readings);

    let mut toolbar = chip("", &window_label(&detail.window));
    if let Some(metrics) = soil::summarize(&points) {
        toolbar.push_str(&summary_badges(&metrics, 3, ""));
    }

    let chart = ScatterChart {
        label: "Soil (normalized 0–1)",
        x_label: "Time (UTC)",
        y_label: "Normalized (0–1)",
        window: detail.window,
        y_range: (0.0, 1.0),
        marker_radius: 4.0,
    };

    frame(
        &format!("{} · Soil moisture (normalized)", sensor.name),
        &toolbar,
        &chart.render(&points),
        Some(detail),
    )
}

/// temperature surface: temperature_c over the fetch window
pub fn temperature_modal(sensor: &Sensor, detail: &DetailState) -> String {
    let readings: &[Reading] = detail.readings.as_deref().map(Vec::as_slice).unwrap_or(&[]);
    let points = series::extract(readings, Metric::Temperature);

    let mut toolbar = chip("", &window_label(&detail.window));
    if let Some(metrics) = SeriesSummary::of(&points) {
        toolbar.push_str(&summary_badges(&metrics, 1, " °C"));
    }
    let extras = [
        (Metric::Humidity, "Humidity", " %"),
        (Metric::Battery, "Battery", " V"),
        (Metric::Rssi, "RSSI", " dBm"),
    ];
    for (metric, label, unit) in extras {
        if let Some(v) = series::latest_value(readings, metric) {
            toolbar.push_str(&chip("info", &format!("{label}: {v:.1}{unit}")));
        }
    }

    let chart = ScatterChart {
        label: "Temperature (°C)",
        x_label: "Time (UTC)",
        y_label: "°C",
        window: detail.window,
        y_range: temperature_range(&points),
        marker_radius: 4.0,
    };

    let title = match &sensor.sensor_type {
        SensorType::Other(kind) => format!("{} · {} (temperature view)", sensor.name, kind),
        _ => format!("{} · Temperature", sensor.name),
    };
    frame(&title, &toolbar, &chart.render(&points), Some(detail))
}

/// value axis for temperature: data extent padded to whole degrees
fn temperature_range(points: &[crate::domain::NormalizedPoint]) -> (f64, f64) {
    match SeriesSummary::of(points) {
        Some(s) => ((s.min - 1.0).floor(), (s.max + 1.0).ceil()),
        None => (0.0, 40.0),
    }
}

fn summary_badges(metrics: &SeriesSummary, precision: usize, unit: &str) -> String {
    let mut html = String::from(r#"<span class="badges">"#);
    html.push_str(&chip("latest", &format!("Latest: {:.*}{}", precision, metrics.latest.value, unit)));
    html.push_str(&chip("avg", &format!("Avg: {:.*}{}", precision, metrics.avg, unit)));
    html.push_str(&chip("max", &format!("Max: {:.*}{}", precision, metrics.max, unit)));
    html.push_str(&chip("min", &format!("Min: {:.*}{}", precision, metrics.min, unit)));
    html.push_str("</span>");
    html
}

const MAP_CONTROLS: &str = r#"<div class="controls">
<form method="post" action="/map/zoom?delta=1"><button type="submit">+</button></form>
<form method="post" action="/map/zoom?delta=-1"><button type="submit">−</button></form>
<form method="post" action="/map/pan?dx=-100"><button type="submit" title="Pan left">←</button></form>
<form method="post" action="/map/pan?dy=-100"><button type="submit" title="Pan up">↑</button></form>
<form method="post" action="/map/pan?dy=100"><button type="submit" title="Pan down">↓</button></form>
<form method="post" action="/map/pan?dx=100"><button type="submit" title="Pan right">→</button></form>
<form method="post" action="/map/reload"><button type="submit">Reload</button></form>
</div>"#;

const STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; background: #263238; }
.map { position: relative; overflow: hidden; background: #4e6b3a; }
.marker { position: absolute; width: 64px; height: 80px; margin: 0; }
.marker button { width: 64px; height: 80px; border: 0; background: none; cursor: pointer; }
.marker img { width: 28px; height: 28px; }
.marker .popup { display: none; position: absolute; top: -64px; left: 0; min-width: 180px; background: #fff; padding: 6px; border-radius: 4px; }
.marker:hover .popup { display: block; }
.controls { position: absolute; right: 12px; top: 12px; display: flex; gap: 4px; }
.badge.error-badge { position: absolute; bottom: 12px; left: 12px; padding: 8px 12px; background: rgba(0,0,0,0.6); color: #fff; border-radius: 8px; font-size: 12px; }
.modal { position: fixed; inset: 0; background: rgba(0,0,0,0.5); }
.modal-box { position: absolute; top: 10vh; left: 5vw; width: 90vw; height: 80vh; background: #fff; border-radius: 8px; display: flex; flex-direction: column; }
.modal-box header { display: flex; align-items: center; gap: 8px; padding: 12px 16px; border-bottom: 1px solid #ddd; }
.modal-box header h2 { flex: 1; font-size: 18px; margin: 0; }
.progress { height: 4px; background: #bbdefb; overflow: hidden; }
.progress .bar { width: 40%; height: 100%; background: #1976d2; }
.toolbar { display: flex; flex-wrap: wrap; gap: 8px; padding: 8px 16px; }
.badges { margin-left: auto; display: flex; gap: 8px; }
.chip { padding: 2px 10px; border-radius: 12px; background: #eee; font-size: 12px; }
.chip.avg { background: #bbdefb; } .chip.max { background: #c8e6c9; } .chip.min { background: #ffe0b2; }
.content { flex: 1; padding: 0 16px 16px; }
.chart { width: 100%; height: 100%; }
.inline-error { color: #c62828; padding: 0 16px 16px; margin: 0; font-size: 14px; }
.placeholder { text-align: center; font-size: 28px; margin-top: 20vh; }
"#;
