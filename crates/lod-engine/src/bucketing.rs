//! Temporal bucket widths and representative selection

use shared_types::DataPoint;

/// Millisecond-normalised ladder of nice bucket widths, 1ms up to one week.
pub(crate) const NICE_WIDTHS_MS: [f64; 18] = [
    1.0,
    5.0,
    10.0,
    50.0,
    100.0,
    500.0,
    1_000.0,
    5_000.0,
    10_000.0,
    30_000.0,
    60_000.0,
    300_000.0,
    600_000.0,
    3_600_000.0,
    18_000_000.0,
    36_000_000.0,
    86_400_000.0,
    604_800_000.0,
];

/// Snap a raw bucket width to the nearest ladder value.
pub(crate) fn snap_width(raw: f64) -> f64 {
    let mut best = NICE_WIDTHS_MS[0];
    let mut best_distance = (raw - best).abs();
    for &width in &NICE_WIDTHS_MS[1..] {
        let distance = (raw - width).abs();
        if distance < best_distance {
            best = width;
            best_distance = distance;
        }
    }
    best
}

/// Pick a bucket's representative point.
///
/// Priority: the most extreme preserved outlier, then the envelope extreme
/// the average leans toward, then a synthetic average point. Degenerate
/// buckets (flat envelope) fall back to the first point by x.
#[allow(clippy::too_many_arguments)]
pub(crate) fn representative(
    bucket_index: usize,
    t_start: f64,
    t_end: f64,
    members: &[&DataPoint],
    outlier_flags: &[bool],
    min_y: f64,
    max_y: f64,
    avg_y: f64,
    envelope: bool,
) -> DataPoint {
    debug_assert_eq!(members.len(), outlier_flags.len());

    // 1. Most extreme outlier wins; ties go to the earlier x.
    let mut best_outlier: Option<(&DataPoint, f64)> = None;
    for (member, &flagged) in members.iter().zip(outlier_flags) {
        if !flagged {
            continue;
        }
        let extremeness = (member.y - avg_y).abs();
        let better = match best_outlier {
            None => true,
            Some((current, current_extremeness)) => {
                extremeness > current_extremeness
                    || (extremeness == current_extremeness && member.x < current.x)
            }
        };
        if better {
            best_outlier = Some((member, extremeness));
        }
    }
    if let Some((outlier, _)) = best_outlier {
        return outlier.clone();
    }

    // 3. Flat envelope: first point by x.
    if max_y <= min_y {
        return earliest(members).clone();
    }

    if envelope {
        // 2. Follow the side of the envelope the average leans toward.
        let position = (avg_y - min_y) / (max_y - min_y);
        if position > 0.7 {
            return earliest_with_y(members, max_y).clone();
        }
        if position < 0.3 {
            return earliest_with_y(members, min_y).clone();
        }
    }

    DataPoint {
        x: (t_start + t_end) / 2.0,
        y: avg_y,
        id: Some(format!("bucket-{bucket_index}-avg")),
        meta: None,
    }
}

fn earliest<'a>(members: &[&'a DataPoint]) -> &'a DataPoint {
    let mut best = members[0];
    for member in &members[1..] {
        if member.x < best.x {
            best = member;
        }
    }
    best
}

fn earliest_with_y<'a>(members: &[&'a DataPoint], y: f64) -> &'a DataPoint {
    let mut best: Option<&DataPoint> = None;
    for member in members {
        if member.y == y && best.map_or(true, |current| member.x < current.x) {
            best = Some(member);
        }
    }
    // The extreme always belongs to some member.
    best.unwrap_or(members[0])
}
