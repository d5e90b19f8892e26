//! Dataset summaries for assistive clients
//!
//! Pure functions over a series set: no I/O, deterministic output. Produces
//! a structured summary plus a plain-text rendering of it.

use lod_engine::stats;
use serde::{Deserialize, Serialize};
use shared_types::{DataPoint, Series};

/// At most this many anomalies are reported per dataset.
pub const ANOMALY_CAP: usize = 10;

const TREND_THRESHOLD: f64 = 0.01;
const TREND_EPSILON: f64 = 1e-9;
const ANOMALY_SIGMA: f64 = 3.0;

/// Direction of a series over its span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

/// Per-series statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub series_id: String,
    pub name: String,
    /// Finite points only.
    pub count: usize,
    pub min_y: f64,
    pub max_y: f64,
    pub mean_y: f64,
    pub std_dev_y: f64,
    pub trend: TrendDirection,
    /// Relative magnitude of the first-to-last move, clamped to [0, 1].
    pub trend_strength: f64,
}

/// A point statistically distant from its series centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub series_id: String,
    pub point: DataPoint,
    /// Distance from the series mean in standard deviations.
    pub deviation: f64,
}

/// Structured dataset summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub series: Vec<SeriesSummary>,
    pub time_range: Option<(f64, f64)>,
    pub global_min_y: Option<f64>,
    pub global_max_y: Option<f64>,
    /// Sorted by severity, capped at [`ANOMALY_CAP`].
    pub anomalies: Vec<Anomaly>,
}

/// Summarize a series set.
pub fn summarize(series: &[Series]) -> DatasetSummary {
    let mut summaries = Vec::new();
    let mut anomalies: Vec<Anomaly> = Vec::new();
    let mut time_lo = f64::INFINITY;
    let mut time_hi = f64::NEG_INFINITY;
    let mut global_min = f64::INFINITY;
    let mut global_max = f64::NEG_INFINITY;

    for s in series {
        let finite: Vec<&DataPoint> = s.data.iter().filter(|p| p.is_finite()).collect();
        if finite.is_empty() {
            continue;
        }
        let ys: Vec<f64> = finite.iter().map(|p| p.y).collect();
        let Some(mean) = stats::mean(&ys) else {
            continue;
        };
        let std_dev = stats::population_std_dev(&ys, mean);
        let min = ys.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        for point in &finite {
            time_lo = time_lo.min(point.x);
            time_hi = time_hi.max(point.x);
        }
        global_min = global_min.min(min);
        global_max = global_max.max(max);

        let first = finite[0].y;
        let last = finite[finite.len() - 1].y;
        let slope = (last - first) / mean.abs().max(TREND_EPSILON);
        let trend = if slope > TREND_THRESHOLD {
            TrendDirection::Up
        } else if slope < -TREND_THRESHOLD {
            TrendDirection::Down
        } else {
            TrendDirection::Stable
        };
        let trend_strength = if max > min {
            ((last - first).abs() / (max - min)).clamp(0.0, 1.0)
        } else {
            0.0
        };

        if std_dev > 0.0 {
            for point in &finite {
                let deviation = (point.y - mean).abs() / std_dev;
                if deviation > ANOMALY_SIGMA {
                    anomalies.push(Anomaly {
                        series_id: s.id.clone(),
                        point: (*point).clone(),
                        deviation,
                    });
                }
            }
        }

        summaries.push(SeriesSummary {
            series_id: s.id.clone(),
            name: s.name.clone(),
            count: finite.len(),
            min_y: min,
            max_y: max,
            mean_y: mean,
            std_dev_y: std_dev,
            trend,
            trend_strength,
        });
    }

    // Severity first; ties keep a stable series/x order.
    anomalies.sort_by(|a, b| {
        b.deviation
            .total_cmp(&a.deviation)
            .then_with(|| a.series_id.cmp(&b.series_id))
            .then_with(|| a.point.x.total_cmp(&b.point.x))
    });
    anomalies.truncate(ANOMALY_CAP);

    DatasetSummary {
        series: summaries,
        time_range: (time_lo <= time_hi).then_some((time_lo, time_hi)),
        global_min_y: global_min.is_finite().then_some(global_min),
        global_max_y: global_max.is_finite().then_some(global_max),
        anomalies,
    }
}

/// Render a deterministic plain-text account of a summary.
pub fn render_text(summary: &DatasetSummary) -> String {
    let mut out = String::new();

    match summary.time_range {
        Some((lo, hi)) => out.push_str(&format!(
            "Dataset with {} series over x range [{lo:.2}, {hi:.2}].\n",
            summary.series.len()
        )),
        None => out.push_str("Empty dataset.\n"),
    }
    if let (Some(min), Some(max)) = (summary.global_min_y, summary.global_max_y) {
        out.push_str(&format!("Overall y range [{min:.2}, {max:.2}].\n"));
    }

    for s in &summary.series {
        let trend = match s.trend {
            TrendDirection::Up => "rising",
            TrendDirection::Down => "falling",
            TrendDirection::Stable => "stable",
        };
        out.push_str(&format!(
            "{}: {} points, y in [{:.2}, {:.2}], mean {:.2}, {} (strength {:.2}).\n",
            s.name, s.count, s.min_y, s.max_y, s.mean_y, trend, s.trend_strength
        ));
    }

    if summary.anomalies.is_empty() {
        out.push_str("No anomalies detected.\n");
    } else {
        out.push_str(&format!("{} anomalies:\n", summary.anomalies.len()));
        for anomaly in &summary.anomalies {
            out.push_str(&format!(
                "  series {} at x {:.2}: y {:.2} ({:.1} sigma)\n",
                anomaly.series_id, anomaly.point.x, anomaly.point.y, anomaly.deviation
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(id: &str, ys: &[f64]) -> Series {
        Series::with_data(
            id,
            id.to_uppercase(),
            ys.iter()
                .enumerate()
                .map(|(i, &y)| DataPoint::new(i as f64, y))
                .collect(),
        )
    }

    #[test]
    fn test_basic_statistics() {
        let summary = summarize(&[series("a", &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0])]);
        let s = &summary.series[0];
        assert_eq!(s.count, 8);
        assert_eq!(s.min_y, 2.0);
        assert_eq!(s.max_y, 9.0);
        assert_eq!(s.mean_y, 5.0);
        assert_eq!(s.std_dev_y, 2.0);
        assert_eq!(summary.time_range, Some((0.0, 7.0)));
    }

    #[test]
    fn test_trend_directions() {
        let up = summarize(&[series("u", &[1.0, 2.0, 3.0, 10.0])]);
        assert_eq!(up.series[0].trend, TrendDirection::Up);
        assert_eq!(up.series[0].trend_strength, 1.0);

        let down = summarize(&[series("d", &[10.0, 3.0, 2.0, 1.0])]);
        assert_eq!(down.series[0].trend, TrendDirection::Down);

        let flat = summarize(&[series("f", &[5.0, 4.0, 6.0, 5.0])]);
        assert_eq!(flat.series[0].trend, TrendDirection::Stable);
    }

    #[test]
    fn test_anomalies_sorted_and_capped() {
        let mut ys = vec![0.0; 200];
        ys[10] = 50.0;
        ys[20] = 80.0;
        let summary = summarize(&[series("a", &ys)]);
        assert_eq!(summary.anomalies.len(), 2);
        // Strongest first.
        assert_eq!(summary.anomalies[0].point.y, 80.0);

        // A dataset with many spikes is capped.
        let mut noisy = vec![0.0; 4_000];
        for i in 0..20 {
            noisy[i * 100] = 1_000.0 + i as f64;
        }
        let summary = summarize(&[series("n", &noisy)]);
        assert_eq!(summary.anomalies.len(), ANOMALY_CAP);
    }

    #[test]
    fn test_nan_points_are_excluded() {
        let mut s = series("a", &[1.0, 2.0, 3.0]);
        s.data.push(DataPoint::new(3.0, f64::NAN));
        let summary = summarize(&[s]);
        assert_eq!(summary.series[0].count, 3);
        assert_eq!(summary.global_max_y, Some(3.0));
    }

    #[test]
    fn test_text_rendering_is_deterministic() {
        let data = [series("a", &[1.0, 2.0, 3.0]), series("b", &[9.0, 9.0, 9.0])];
        let first = render_text(&summarize(&data));
        let second = render_text(&summarize(&data));
        assert_eq!(first, second);
        assert!(first.contains("Dataset with 2 series"));
        assert!(first.contains("A: 3 points"));
    }

    #[test]
    fn test_empty_dataset() {
        let summary = summarize(&[]);
        assert!(summary.series.is_empty());
        assert!(summary.time_range.is_none());
        assert_eq!(render_text(&summary), "Empty dataset.\nNo anomalies detected.\n");
    }
}
