//! Core data model shared by the LOD, spatial, and tier subsystems

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single sample in a series.
///
/// `x` is either a real value or a millisecond instant on a monotonic
/// timeline; callers normalise before handing data to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, String>>,
}

impl DataPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            id: None,
            meta: None,
        }
    }

    pub fn with_id(x: f64, y: f64, id: impl Into<String>) -> Self {
        Self {
            x,
            y,
            id: Some(id.into()),
            meta: None,
        }
    }

    /// Both coordinates are finite and safe for aggregates.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Named sequence of points owned by the caller.
///
/// The engine borrows series read-only for the duration of a render or query
/// cycle and never retains references past it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    /// Unique within a dataset.
    pub id: String,
    pub name: String,
    pub color: [f32; 3],
    pub visible: bool,
    /// Points are non-decreasing in `x` when set.
    pub time_ordered: bool,
    pub data: Vec<DataPoint>,
}

impl Series {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: [0.0, 0.5, 1.0],
            visible: true,
            time_ordered: true,
            data: Vec::new(),
        }
    }

    pub fn with_data(
        id: impl Into<String>,
        name: impl Into<String>,
        data: Vec<DataPoint>,
    ) -> Self {
        let mut series = Self::new(id, name);
        series.data = data;
        series
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Pixel margins around the inner plot area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margins {
    pub fn uniform(value: f64) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 20.0,
            right: 60.0,
            bottom: 40.0,
            left: 60.0,
        }
    }
}

/// Viewport geometry. Scales are injected separately (see [`crate::Scale`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width_px: f64,
    pub height_px: f64,
    pub margins: Margins,
    pub pixel_ratio: f64,
}

impl Viewport {
    pub fn new(width_px: f64, height_px: f64) -> Self {
        Self {
            width_px,
            height_px,
            margins: Margins::default(),
            pixel_ratio: 1.0,
        }
    }

    pub fn with_margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn with_pixel_ratio(mut self, pixel_ratio: f64) -> Self {
        self.pixel_ratio = pixel_ratio.max(1.0);
        self
    }

    pub fn inner_width(&self) -> f64 {
        (self.width_px - self.margins.left - self.margins.right).max(0.0)
    }

    pub fn inner_height(&self) -> f64 {
        (self.height_px - self.margins.top - self.margins.bottom).max(0.0)
    }

    pub fn inner_area(&self) -> f64 {
        self.inner_width() * self.inner_height()
    }
}

/// Logical rendering capability class, ordered by capability.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Vector,
    Raster,
    Accelerated,
}

impl Tier {
    /// Fallback order, most capable first.
    pub const DESCENDING: [Tier; 3] = [Tier::Accelerated, Tier::Raster, Tier::Vector];

    /// One tier down, or `None` from `Vector`.
    pub fn step_down(self) -> Option<Tier> {
        match self {
            Tier::Accelerated => Some(Tier::Raster),
            Tier::Raster => Some(Tier::Vector),
            Tier::Vector => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Vector => "vector",
            Tier::Raster => "raster",
            Tier::Accelerated => "accelerated",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level of detail. `Minimal` is the heaviest compression, `Full` is
/// one bucket per point.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LodLevel {
    Minimal = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    Full = 4,
}

impl LodLevel {
    /// Map a compression ratio onto a level.
    pub fn from_compression_ratio(ratio: f64) -> Self {
        if ratio >= 100.0 {
            LodLevel::Minimal
        } else if ratio >= 50.0 {
            LodLevel::Low
        } else if ratio >= 10.0 {
            LodLevel::Medium
        } else if ratio >= 2.0 {
            LodLevel::High
        } else {
            LodLevel::Full
        }
    }
}

/// Temporal aggregation bucket produced by the downsampler.
///
/// Invariants: `t_start < t_end`, `min_y <= avg_y <= max_y`, `count >= 1`,
/// and the representative's `x` lies inside the bucket window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LodBucket {
    pub t_start: f64,
    pub t_end: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub avg_y: f64,
    pub count: usize,
    pub representative: DataPoint,
    pub outliers: Vec<DataPoint>,
}

/// Downsampling output. Buckets are ordered by `t_start` and never overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LodResult {
    pub buckets: Vec<LodBucket>,
    pub total_points: usize,
    pub sampled_points: usize,
    pub compression_ratio: f64,
    pub level: LodLevel,
    pub outlier_count: usize,
}

impl LodResult {
    /// Result for an empty input or a zero target.
    pub fn empty() -> Self {
        Self {
            buckets: Vec::new(),
            total_points: 0,
            sampled_points: 0,
            compression_ratio: 1.0,
            level: LodLevel::Full,
            outlier_count: 0,
        }
    }
}

/// Nearest-point query answer.
///
/// Pixel coordinates are screen space (margins included) so callers can
/// position tooltips directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitResult {
    pub series_id: String,
    pub point_index: usize,
    pub point: DataPoint,
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub distance: f64,
}

/// Stable reference to a point in the caller's dataset. Selection state is
/// keyed on these so it survives tier and LOD changes.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PointRef {
    pub series_id: String,
    pub point_index: usize,
}

/// One frame observation kept in the metric ring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameMetric {
    pub timestamp_ms: f64,
    pub frame_time_ms: f64,
    pub point_count: usize,
    pub tier: Tier,
    pub dropped: bool,
}

/// `(total points, points per inner pixel)` tuple driving tier decisions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensitySignature {
    pub total_points: usize,
    pub points_per_pixel: f64,
}

impl DensitySignature {
    pub fn compute(series: &[Series], viewport: &Viewport) -> Self {
        let total_points: usize = series.iter().map(Series::len).sum();
        let area = viewport.inner_area();
        let points_per_pixel = if area > 0.0 {
            total_points as f64 / area
        } else {
            0.0
        };
        Self {
            total_points,
            points_per_pixel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::Vector < Tier::Raster);
        assert!(Tier::Raster < Tier::Accelerated);
        assert_eq!(Tier::Accelerated.step_down(), Some(Tier::Raster));
        assert_eq!(Tier::Vector.step_down(), None);
    }

    #[test]
    fn test_level_from_ratio() {
        assert_eq!(LodLevel::from_compression_ratio(250.0), LodLevel::Minimal);
        assert_eq!(LodLevel::from_compression_ratio(100.0), LodLevel::Minimal);
        assert_eq!(LodLevel::from_compression_ratio(60.0), LodLevel::Low);
        assert_eq!(LodLevel::from_compression_ratio(12.0), LodLevel::Medium);
        assert_eq!(LodLevel::from_compression_ratio(3.0), LodLevel::High);
        assert_eq!(LodLevel::from_compression_ratio(1.0), LodLevel::Full);
    }

    #[test]
    fn test_viewport_inner_area() {
        let viewport = Viewport::new(800.0, 600.0).with_margins(Margins::uniform(10.0));
        assert_eq!(viewport.inner_width(), 780.0);
        assert_eq!(viewport.inner_height(), 580.0);
    }

    #[test]
    fn test_density_signature() {
        let series = vec![
            Series::with_data("a", "A", vec![DataPoint::new(0.0, 1.0); 100]),
            Series::with_data("b", "B", vec![DataPoint::new(0.0, 1.0); 50]),
        ];
        let viewport = Viewport::new(110.0, 110.0).with_margins(Margins::uniform(5.0));
        let signature = DensitySignature::compute(&series, &viewport);
        assert_eq!(signature.total_points, 150);
        assert!((signature.points_per_pixel - 150.0 / 10_000.0).abs() < 1e-12);
    }
}
