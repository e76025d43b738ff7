//! Text rendering of a time series: one bar per day, scaled to the largest value.

use std::fmt::Write;

use epidash_services::TimeSeriesPoint;

const BAR: &str = "#";

pub fn render_chart(points: &[TimeSeriesPoint], width: usize) -> String {
    if points.is_empty() {
        return "(no data)\n".to_string();
    }

    let max = points.iter().map(|p| p.value).fold(0.0_f64, f64::max);
    let width = width.max(1);

    let mut out = String::new();
    for point in points {
        let len = if max > 0.0 && point.value > 0.0 {
            // Any positive value gets at least one mark
            ((point.value / max) * width as f64).round().max(1.0) as usize
        } else {
            0
        };
        let bar = BAR.repeat(len);
        let _ = writeln!(
            out,
            "{}  {:<width$}  {}",
            point.date,
            bar,
            format_value(point.value),
            width = width
        );
    }
    out
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}
