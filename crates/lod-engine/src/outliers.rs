//! Global outlier detection over a downsampling input
//!
//! Outliers are detected once over the whole input, then capped at a
//! percentage of the input size taking the most extreme first. Every
//! surviving outlier is preserved in its bucket's outlier list.

use crate::stats;
use shared_types::{DataPoint, LodConfig, OutlierMethod};

/// Indices (into the caller's finite point slice) of the outliers that
/// survive the percentile cap, ascending.
pub(crate) fn detect_outliers(points: &[&DataPoint], config: &LodConfig) -> Vec<usize> {
    let n = points.len();
    let cap = (n as f64 * config.max_outlier_percent / 100.0).floor() as usize;
    if cap == 0 {
        return Vec::new();
    }

    let ys: Vec<f64> = points.iter().map(|p| p.y).collect();
    let mut marks = match config.outlier_method {
        OutlierMethod::ZScore => zscore_marks(&ys, config.outlier_threshold),
        OutlierMethod::Iqr => iqr_marks(&ys),
        OutlierMethod::Mad => mad_marks(&ys, config.outlier_threshold),
    };

    // Most extreme first; ties go to the earlier x.
    marks.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then_with(|| points[a.0].x.total_cmp(&points[b.0].x))
            .then_with(|| a.0.cmp(&b.0))
    });
    marks.truncate(cap);

    let mut indices: Vec<usize> = marks.into_iter().map(|(index, _)| index).collect();
    indices.sort_unstable();
    indices
}

/// `|y - mean| / stddev > threshold`; needs at least 3 samples.
fn zscore_marks(ys: &[f64], threshold: f64) -> Vec<(usize, f64)> {
    if ys.len() < 3 {
        return Vec::new();
    }
    let Some(mean) = stats::mean(ys) else {
        return Vec::new();
    };
    let std_dev = stats::population_std_dev(ys, mean);
    if std_dev == 0.0 {
        return Vec::new();
    }
    ys.iter()
        .enumerate()
        .filter_map(|(index, &y)| {
            let score = (y - mean).abs() / std_dev;
            (score > threshold).then_some((index, score))
        })
        .collect()
}

/// Outside `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`; needs at least 4 samples.
/// The score is the distance past the violated fence.
fn iqr_marks(ys: &[f64]) -> Vec<(usize, f64)> {
    if ys.len() < 4 {
        return Vec::new();
    }
    let mut sorted = ys.to_vec();
    sorted.sort_by(f64::total_cmp);
    let (Some(q1), Some(q3)) = (
        stats::quantile_of_sorted(&sorted, 0.25),
        stats::quantile_of_sorted(&sorted, 0.75),
    ) else {
        return Vec::new();
    };
    let iqr = q3 - q1;
    let low = q1 - 1.5 * iqr;
    let high = q3 + 1.5 * iqr;
    ys.iter()
        .enumerate()
        .filter_map(|(index, &y)| {
            if y < low {
                Some((index, low - y))
            } else if y > high {
                Some((index, y - high))
            } else {
                None
            }
        })
        .collect()
}

/// `|y - median| / MAD > threshold`; needs at least 3 samples.
fn mad_marks(ys: &[f64], threshold: f64) -> Vec<(usize, f64)> {
    if ys.len() < 3 {
        return Vec::new();
    }
    let mut sorted = ys.to_vec();
    sorted.sort_by(f64::total_cmp);
    let Some(median) = stats::median_of_sorted(&sorted) else {
        return Vec::new();
    };
    let mad = stats::median_abs_deviation(ys, median);
    if mad == 0.0 {
        return Vec::new();
    }
    ys.iter()
        .enumerate()
        .filter_map(|(index, &y)| {
            let score = (y - median).abs() / mad;
            (score > threshold).then_some((index, score))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(ys: &[f64]) -> Vec<DataPoint> {
        ys.iter()
            .enumerate()
            .map(|(i, &y)| DataPoint::new(i as f64, y))
            .collect()
    }

    fn detect(ys: &[f64], config: &LodConfig) -> Vec<usize> {
        let owned = points(ys);
        let refs: Vec<&DataPoint> = owned.iter().collect();
        detect_outliers(&refs, config)
    }

    #[test]
    fn test_zscore_flags_spike() {
        let mut ys = vec![10.0; 30];
        ys[17] = 500.0;
        let config = LodConfig::default();
        assert_eq!(detect(&ys, &config), vec![17]);
    }

    #[test]
    fn test_zscore_constant_series_has_no_outliers() {
        let ys = vec![5.0; 20];
        assert!(detect(&ys, &LodConfig::default()).is_empty());
    }

    #[test]
    fn test_zscore_needs_three_samples() {
        assert!(detect(&[1.0, 100.0], &LodConfig::default()).is_empty());
    }

    #[test]
    fn test_iqr_flags_both_tails() {
        let mut ys: Vec<f64> = (0..40).map(|i| 50.0 + (i % 5) as f64).collect();
        ys[3] = -400.0;
        ys[31] = 400.0;
        let config = LodConfig {
            outlier_method: OutlierMethod::Iqr,
            ..LodConfig::default()
        };
        assert_eq!(detect(&ys, &config), vec![3, 31]);
    }

    #[test]
    fn test_mad_zero_spread_has_no_outliers() {
        // Majority at one value makes the MAD zero.
        let mut ys = vec![3.0; 19];
        ys.push(90.0);
        let config = LodConfig {
            outlier_method: OutlierMethod::Mad,
            ..LodConfig::default()
        };
        assert!(detect(&ys, &config).is_empty());
    }

    #[test]
    fn test_cap_keeps_most_extreme() {
        // A loose threshold flags everything; the 10 percent cap keeps
        // only the two strongest spikes.
        let mut ys = vec![0.0; 20];
        ys[4] = 200.0;
        ys[9] = 900.0;
        ys[14] = 400.0;
        let config = LodConfig {
            max_outlier_percent: 10.0,
            outlier_threshold: 0.3,
            ..LodConfig::default()
        };
        assert_eq!(detect(&ys, &config), vec![9, 14]);
    }
}
