//! svg scatter chart with fixed axes
//!
//! the time axis always spans the fetch window and the value axis is given by
//! the caller, so the frame does not move as data arrives.

use crate::domain::{FetchWindow, NormalizedPoint};

use chrono::{DateTime, Duration, Utc};
use std::fmt::Write;

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 420.0;
const MARGIN_LEFT: f64 = 64.0;
const MARGIN_RIGHT: f64 = 24.0;
const MARGIN_TOP: f64 = 16.0;
const MARGIN_BOTTOM: f64 = 48.0;
const X_TICKS: i32 = 6;
const Y_TICKS: i32 = 5;

pub struct ScatterChart<'a> {
    pub label: &'a str,
    pub x_label: &'a str,
    pub y_label: &'a str,
    pub window: FetchWindow,
    pub y_range: (f64, f64),
    pub marker_radius: f64,
}

impl ScatterChart<'_> {
    fn plot_width() -> f64 {
        WIDTH - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn plot_height() -> f64 {
        HEIGHT - MARGIN_TOP - MARGIN_BOTTOM
    }

    /// pixel x of an instant, `None` outside the window
    pub fn x_of(&self, t: DateTime<Utc>) -> Option<f64> {
        if !self.window.contains(t) {
            return None;
        }
        let span = (self.window.end - self.window.start).num_milliseconds() as f64;
        let offset = (t - self.window.start).num_milliseconds() as f64;
        Some(MARGIN_LEFT + offset / span * Self::plot_width())
    }

    /// pixel y of a value, `None` outside the value range
    pub fn y_of(&self, v: f64) -> Option<f64> {
        let (lo, hi) = self.y_range;
        if !(lo..=hi).contains(&v) || hi <= lo {
            return None;
        }
        Some(MARGIN_TOP + (1.0 - (v - lo) / (hi - lo)) * Self::plot_height())
    }

    /// render the chart; points off either axis are not drawn
    pub fn render(&self, points: &[NormalizedPoint]) -> String {
        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg class="chart" viewBox="0 0 {w} {h}" role="img" aria-label="{label}" xmlns="http://www.w3.org/2000/svg">"#,
            w = WIDTH,
            h = HEIGHT,
            label = html_escape(self.label),
        );

        self.render_grid(&mut svg);

        svg.push_str(r##"<g class="series" fill="#1976d2">"##);
        for p in points {
            if let (Some(x), Some(y)) = (self.x_of(p.timestamp), self.y_of(p.value)) {
                let _ = write!(
                    svg,
                    r#"<circle cx="{x:.1}" cy="{y:.1}" r="{r}"><title>{t} · {v:.3}</title></circle>"#,
                    r = self.marker_radius,
                    t = p.timestamp.format("%H:%M:%S UTC"),
                    v = p.value,
                );
            }
        }
        svg.push_str("</g>");

        let _ = write!(
            svg,
            r#"<text class="axis-label" x="{x}" y="{y}" text-anchor="middle">{label}</text>"#,
            x = MARGIN_LEFT + Self::plot_width() / 2.0,
            y = HEIGHT - 8.0,
            label = html_escape(self.x_label),
        );
        let _ = write!(
            svg,
            r#"<text class="axis-label" x="14" y="{y}" text-anchor="middle" transform="rotate(-90 14 {y})">{label}</text>"#,
            y = MARGIN_TOP + Self::plot_height() / 2.0,
            label = html_escape(self.y_label),
        );
        svg.push_str("</svg>");
        svg
    }

    fn render_grid(&self, svg: &mut String) {
        let bottom = MARGIN_TOP + Self::plot_height();
        let right = MARGIN_LEFT + Self::plot_width();
        svg.push_str(r##"<g class="grid" stroke="#ddd" font-size="11" fill="#555">"##);

        let span = self.window.end - self.window.start;
        for i in 0..=X_TICKS {
            let t = self.window.start + Duration::milliseconds(span.num_milliseconds() * i as i64 / X_TICKS as i64);
            let Some(x) = self.x_of(t) else { continue };
            let _ = write!(
                svg,
                r#"<line x1="{x:.1}" y1="{top}" x2="{x:.1}" y2="{bottom}"/><text x="{x:.1}" y="{ty}" text-anchor="middle" stroke="none">{label}</text>"#,
                top = MARGIN_TOP,
                ty = bottom + 16.0,
                label = t.format("%H:%M:%S"),
            );
        }

        let (lo, hi) = self.y_range;
        for i in 0..=Y_TICKS {
            let v = lo + (hi - lo) * i as f64 / Y_TICKS as f64;
            let Some(y) = self.y_of(v) else { continue };
            let _ = write!(
                svg,
                r#"<line x1="{left}" y1="{y:.1}" x2="{right}" y2="{y:.1}"/><text x="{tx}" y="{ty:.1}" text-anchor="end" stroke="none">{v:.2}</text>"#,
                left = MARGIN_LEFT,
                tx = MARGIN_LEFT - 6.0,
                ty = y + 4.0,
            );
        }
        svg.push_str("</g>");
    }
}

/// escape html special characters to prevent xss
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn chart() -> ScatterChart<'static> {
        ScatterChart {
            label: "Soil",
            x_label: "Time (UTC)",
            y_label: "Normalized (0–1)",
            window: FetchWindow::new(
                Utc.with_ymd_and_hms(2025, 9, 17, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 9, 17, 1, 0, 0).unwrap(),
            )
            .unwrap(),
            y_range: (0.0, 1.0),
            marker_radius: 4.0,
        }
    }

    #[test]
    fn test_axes_are_fixed_to_window_and_range() {
        let c = chart();
        assert_eq!(c.x_of(c.window.start), Some(MARGIN_LEFT));
        assert_eq!(c.x_of(c.window.end), Some(WIDTH - MARGIN_RIGHT));
        assert_eq!(c.y_of(1.0), Some(MARGIN_TOP));
        assert_eq!(c.y_of(0.0), Some(HEIGHT - MARGIN_BOTTOM));
        assert!(c.x_of(c.window.end + Duration::seconds(1)).is_none());
        assert!(c.y_of(1.5).is_none());
    }

    #[test]
    fn test_render_skips_points_outside_window() {
        let c = chart();
        let inside = NormalizedPoint { timestamp: Utc.with_ymd_and_hms(2025, 9, 17, 0, 30, 0).unwrap(), value: 0.5 };
        let outside = NormalizedPoint { timestamp: Utc.with_ymd_and_hms(2025, 9, 18, 0, 0, 0).unwrap(), value: 0.5 };
        let svg = c.render(&[inside, outside]);
        assert_eq!(svg.matches("<circle").count(), 1);
        assert!(svg.contains("00:30:00 UTC · 0.500"));
        assert!(svg.contains("Time (UTC)"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(html_escape(r#"<b a="1">&"#), "&lt;b a=&quot;1&quot;&gt;&amp;");
    }
}
