//! Density-adaptive render-tier engine
//!
//! Selects among vector, raster, and accelerated surfaces from data density
//! and rolling frame-time history, downsamples through the LOD engine, and
//! keeps hit testing and interaction consistent across tiers via a shared
//! spatial index. Concrete draw commands live in the runtime's surfaces;
//! this crate owns the policy.

pub mod accessibility;
pub mod engine;
pub mod interaction;
pub mod metrics;
pub mod spatial;
pub mod surface;
pub mod timing;

pub use engine::TierEngine;
pub use interaction::{
    BrushRect, InteractionCoordinator, NavKey, PointerState, WheelDirection,
};
pub use metrics::FrameRing;
pub use spatial::{SpatialIndex, DEFAULT_HIT_RADIUS};
pub use surface::{InitState, RenderFrame, Surface, SurfaceMetrics};
