//! Deterministic temporal-bucket downsampling
//!
//! Reduces a series to a bounded number of buckets while preserving the
//! min/max envelope and statistically detected outliers. Same inputs always
//! produce bit-identical output: no randomness, no clock reads.

mod bucketing;
mod outliers;
pub mod stats;

use shared_types::{DataPoint, LodBucket, LodConfig, LodLevel, LodResult};

/// Downsample `points` to at most `target` buckets.
///
/// The time range comes from `time_window` when given, otherwise from the
/// input extrema. Non-finite coordinates are excluded from every aggregate
/// and from the output. A zero target or empty input yields an empty result
/// at full level.
pub fn downsample(
    points: &[DataPoint],
    target: usize,
    config: &LodConfig,
    time_window: Option<(f64, f64)>,
) -> LodResult {
    let finite: Vec<&DataPoint> = points.iter().filter(|p| p.is_finite()).collect();
    if target == 0 || finite.is_empty() {
        return LodResult::empty();
    }
    if finite.len() <= target {
        return fast_path(&finite);
    }

    let (t_lo, t_hi) = match time_window {
        Some((a, b)) if a <= b => (a, b),
        Some((a, b)) => (b, a),
        None => {
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for point in &finite {
                lo = lo.min(point.x);
                hi = hi.max(point.x);
            }
            (lo, hi)
        }
    };

    let (width, bucket_count) = if t_hi > t_lo {
        let raw_width = (t_hi - t_lo) / target as f64;
        let width = if config.temporal_bucketing {
            bucketing::snap_width(raw_width)
        } else {
            raw_width
        };
        let count = (((t_hi - t_lo) / width).ceil() as usize).max(1);
        (width, count)
    } else {
        // Collapsed range: everything lands in one unit-width bucket.
        (1.0, 1)
    };

    let outlier_indices = if config.outlier_preserve {
        outliers::detect_outliers(&finite, config)
    } else {
        Vec::new()
    };
    let mut is_outlier = vec![false; finite.len()];
    for &index in &outlier_indices {
        is_outlier[index] = true;
    }

    // Boundary points belong to the later bucket; the final boundary is
    // inclusive on the right.
    let mut membership: Vec<Vec<usize>> = vec![Vec::new(); bucket_count];
    for (index, point) in finite.iter().enumerate() {
        if point.x < t_lo || point.x > t_hi {
            continue;
        }
        let bucket = (((point.x - t_lo) / width).floor() as usize).min(bucket_count - 1);
        membership[bucket].push(index);
    }

    let mut buckets = Vec::new();
    let mut preserved_outliers = 0;
    for (bucket_index, members) in membership.iter().enumerate() {
        if members.is_empty() {
            continue;
        }
        let t_start = t_lo + bucket_index as f64 * width;
        let t_end = t_start + width;

        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        let mut sum_y = 0.0;
        for &index in members {
            let y = finite[index].y;
            min_y = min_y.min(y);
            max_y = max_y.max(y);
            sum_y += y;
        }
        let avg_y = sum_y / members.len() as f64;

        let member_points: Vec<&DataPoint> = members.iter().map(|&i| finite[i]).collect();
        let outlier_flags: Vec<bool> = members.iter().map(|&i| is_outlier[i]).collect();
        let bucket_outliers: Vec<DataPoint> = members
            .iter()
            .filter(|&&i| is_outlier[i])
            .map(|&i| finite[i].clone())
            .collect();
        preserved_outliers += bucket_outliers.len();

        let representative = bucketing::representative(
            bucket_index,
            t_start,
            t_end,
            &member_points,
            &outlier_flags,
            min_y,
            max_y,
            avg_y,
            config.envelope,
        );

        buckets.push(LodBucket {
            t_start,
            t_end,
            min_y,
            max_y,
            avg_y,
            count: members.len(),
            representative,
            outliers: bucket_outliers,
        });
    }

    let sampled_points = buckets.len();
    let compression_ratio = finite.len() as f64 / sampled_points.max(1) as f64;
    LodResult {
        buckets,
        total_points: finite.len(),
        sampled_points,
        compression_ratio,
        level: LodLevel::from_compression_ratio(compression_ratio),
        outlier_count: preserved_outliers,
    }
}

/// Refine a zoomed sub-window `[z_lo, z_hi]` of the data.
///
/// Filters to the window first, then downsamples with a doubled target
/// (capped at the visible count) so zooming in reveals more detail.
pub fn refine(
    points: &[DataPoint],
    target: usize,
    config: &LodConfig,
    window: (f64, f64),
) -> LodResult {
    let (z_lo, z_hi) = if window.0 <= window.1 {
        window
    } else {
        (window.1, window.0)
    };
    let visible: Vec<DataPoint> = points
        .iter()
        .filter(|p| p.x >= z_lo && p.x <= z_hi)
        .cloned()
        .collect();
    let refined_target = if config.zoom_refine {
        target.saturating_mul(2).min(visible.len())
    } else {
        target
    };
    downsample(&visible, refined_target, config, Some((z_lo, z_hi)))
}

/// One bucket per point when the input already fits the target.
fn fast_path(finite: &[&DataPoint]) -> LodResult {
    let mut order: Vec<usize> = (0..finite.len()).collect();
    order.sort_by(|&a, &b| finite[a].x.total_cmp(&finite[b].x));

    let buckets: Vec<LodBucket> = order
        .iter()
        .enumerate()
        .map(|(position, &index)| {
            let point = finite[index];
            let t_end = match order.get(position + 1).map(|&next| finite[next].x) {
                Some(next_x) if next_x > point.x => next_x,
                _ => point.x + 1.0,
            };
            LodBucket {
                t_start: point.x,
                t_end,
                min_y: point.y,
                max_y: point.y,
                avg_y: point.y,
                count: 1,
                representative: point.clone(),
                outliers: Vec::new(),
            }
        })
        .collect();

    let count = buckets.len();
    LodResult {
        buckets,
        total_points: count,
        sampled_points: count,
        compression_ratio: 1.0,
        level: LodLevel::Full,
        outlier_count: 0,
    }
}
