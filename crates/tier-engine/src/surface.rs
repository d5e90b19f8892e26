//! Abstract render surface contract
//!
//! The engine owns one surface per registered tier. Surfaces draw; they do
//! not own hit testing. The default hit methods delegate to the shared
//! spatial index so every tier answers queries identically.

use crate::spatial::SpatialIndex;
use shared_types::{DataPoint, HitResult, LodResult, Result, Series, Tier, Viewport};

/// Initialization status for surfaces that acquire external resources.
///
/// A `Pending` surface is polled on subsequent renders; the queued render
/// request is served once it reports `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Ready,
    Pending,
}

/// Per-surface render statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct SurfaceMetrics {
    pub frames_rendered: u64,
    pub last_frame_time_ms: f64,
    pub last_point_count: usize,
}

/// One frame's worth of input for a surface.
///
/// `lod` is index-aligned with `series`; hidden series carry an empty
/// result. Surfaces must clear prior visuals, respect visibility, and render
/// NaN y-values as gaps, never as connected segments.
pub struct RenderFrame<'a> {
    pub series: &'a [Series],
    pub lod: &'a [LodResult],
    pub viewport: &'a Viewport,
}

impl<'a> RenderFrame<'a> {
    /// Total representative points handed to the surface this frame.
    pub fn sampled_points(&self) -> usize {
        self.lod.iter().map(|r| r.sampled_points).sum()
    }
}

/// Capability contract implemented by the vector, raster, and accelerated
/// back-ends supplied by the runtime.
pub trait Surface {
    /// The tier this surface renders.
    fn tier(&self) -> Tier;

    /// Acquire resources. May complete asynchronously by returning
    /// [`InitState::Pending`].
    fn initialize(&mut self, viewport: &Viewport) -> Result<InitState>;

    /// Poll a pending initialization. Called before each render while the
    /// surface is not yet ready.
    fn poll_ready(&mut self) -> Result<InitState> {
        Ok(InitState::Ready)
    }

    /// Draw one frame.
    fn render(&mut self, frame: &RenderFrame<'_>) -> Result<()>;

    fn resize(&mut self, width_px: f64, height_px: f64) -> Result<()>;

    /// Release resources. Destroying twice is a contract violation the
    /// engine guards against.
    fn destroy(&mut self) -> Result<()>;

    /// Nearest-point query. The spatial index is authoritative; overriding
    /// this without delegating to it breaks cross-tier consistency.
    fn nearest_hit(
        &self,
        index: &SpatialIndex,
        screen_x: f64,
        screen_y: f64,
        radius: f64,
    ) -> Option<HitResult> {
        index.nearest(screen_x, screen_y, radius)
    }

    /// Region query, delegating to the shared index.
    fn region_hit(
        &self,
        index: &SpatialIndex,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    ) -> Vec<DataPoint> {
        index.points_in_rect(x1, y1, x2, y2)
    }

    fn metrics(&self) -> SurfaceMetrics {
        SurfaceMetrics::default()
    }
}
