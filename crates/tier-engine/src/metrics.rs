//! Frame-metric ring buffer and violation tracking

use shared_types::{FrameMetric, Tier};
use std::collections::VecDeque;

/// Fixed-capacity rolling window of frame metrics.
///
/// Tracks consecutive trailing dropped frames for the degradation policy.
#[derive(Debug)]
pub struct FrameRing {
    capacity: usize,
    entries: VecDeque<FrameMetric>,
    max_frame_time_ms: f64,
    consecutive_violations: u32,
}

impl FrameRing {
    pub fn new(capacity: usize, max_frame_time_ms: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            max_frame_time_ms,
            consecutive_violations: 0,
        }
    }

    /// Append one frame observation, evicting the oldest at capacity.
    pub fn record(
        &mut self,
        timestamp_ms: f64,
        frame_time_ms: f64,
        point_count: usize,
        tier: Tier,
    ) -> FrameMetric {
        let dropped = frame_time_ms > self.max_frame_time_ms;
        if dropped {
            self.consecutive_violations += 1;
        } else {
            self.consecutive_violations = 0;
        }

        let metric = FrameMetric {
            timestamp_ms,
            frame_time_ms,
            point_count,
            tier,
            dropped,
        };
        self.entries.push_back(metric);
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        metric
    }

    /// Mean frame time over entries within `window_ms` of `now_ms`.
    pub fn average_frame_time(&self, now_ms: f64, window_ms: f64) -> Option<f64> {
        let cutoff = now_ms - window_ms;
        let mut sum = 0.0;
        let mut count = 0usize;
        for metric in &self.entries {
            if metric.timestamp_ms >= cutoff {
                sum += metric.frame_time_ms;
                count += 1;
            }
        }
        (count > 0).then(|| sum / count as f64)
    }

    /// Mean frame time over the whole ring.
    pub fn average_frame_time_all(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let sum: f64 = self.entries.iter().map(|m| m.frame_time_ms).sum();
        Some(sum / self.entries.len() as f64)
    }

    /// Frames per second implied by the windowed average.
    pub fn fps(&self, now_ms: f64, window_ms: f64) -> Option<f64> {
        let avg = self.average_frame_time(now_ms, window_ms)?;
        (avg > 0.0).then(|| 1000.0 / avg)
    }

    pub fn dropped_count(&self) -> usize {
        self.entries.iter().filter(|m| m.dropped).count()
    }

    pub fn consecutive_violations(&self) -> u32 {
        self.consecutive_violations
    }

    /// Reset the violation streak, typically after a degradation step.
    pub fn reset_violations(&mut self) {
        self.consecutive_violations = 0;
    }

    pub fn last(&self) -> Option<&FrameMetric> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameMetric> {
        self.entries.iter()
    }

    pub fn max_frame_time_ms(&self) -> f64 {
        self.max_frame_time_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring() -> FrameRing {
        FrameRing::new(60, 33.33)
    }

    #[test]
    fn test_capacity_eviction() {
        let mut ring = FrameRing::new(4, 33.33);
        for i in 0..10 {
            ring.record(i as f64, 10.0, 100, Tier::Vector);
        }
        assert_eq!(ring.len(), 4);
        // Only the most recent four remain.
        let timestamps: Vec<f64> = ring.iter().map(|m| m.timestamp_ms).collect();
        assert_eq!(timestamps, vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_dropped_flag() {
        let mut ring = ring();
        let fast = ring.record(0.0, 16.0, 100, Tier::Raster);
        let slow = ring.record(1.0, 50.0, 100, Tier::Raster);
        assert!(!fast.dropped);
        assert!(slow.dropped);
        assert_eq!(ring.dropped_count(), 1);
    }

    #[test]
    fn test_violation_streak_resets_on_good_frame() {
        let mut ring = ring();
        ring.record(0.0, 50.0, 100, Tier::Accelerated);
        ring.record(1.0, 50.0, 100, Tier::Accelerated);
        assert_eq!(ring.consecutive_violations(), 2);
        ring.record(2.0, 10.0, 100, Tier::Accelerated);
        assert_eq!(ring.consecutive_violations(), 0);
    }

    #[test]
    fn test_windowed_average() {
        let mut ring = ring();
        ring.record(0.0, 10.0, 100, Tier::Vector);
        ring.record(500.0, 20.0, 100, Tier::Vector);
        ring.record(1_000.0, 30.0, 100, Tier::Vector);

        // Window catches the last two entries only.
        let avg = ring.average_frame_time(1_000.0, 600.0).unwrap();
        assert_eq!(avg, 25.0);
        let fps = ring.fps(1_000.0, 600.0).unwrap();
        assert_eq!(fps, 40.0);
    }

    #[test]
    fn test_empty_ring_has_no_average() {
        let ring = ring();
        assert!(ring.average_frame_time(0.0, 1_000.0).is_none());
        assert!(ring.fps(0.0, 1_000.0).is_none());
    }
}
