//! Tier selection, degradation, and render orchestration

use crate::interaction::InteractionCoordinator;
use crate::metrics::FrameRing;
use crate::spatial::SpatialIndex;
use crate::surface::{InitState, RenderFrame, Surface};
use crate::timing::{self, Timer};
use config_system::{ConfigManager, DeviceCapabilities, SessionStore};
use shared_types::{
    DataPoint, DensitySignature, EngineEvent, EnginePayload, EventBus, EventSubscription,
    HitResult, HybridChartsConfig, HybridChartsError, LodLevel, LodResult, Result, Scale, Series,
    SwitchReason, ThresholdConfig, Tier, Viewport,
};
use std::collections::HashMap;

/// A full tier re-evaluation runs at least this often.
const REEVALUATE_INTERVAL_FRAMES: u64 = 30;
/// Density-signature delta that forces an immediate re-evaluation.
const SIGNATURE_DELTA_POINTS: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    New,
    Pending,
    Ready,
    Failed,
    Destroyed,
}

struct SurfaceSlot {
    surface: Box<dyn Surface>,
    state: SlotState,
}

enum SlotOutcome {
    TryRender,
    Queued,
    Destroyed,
    Failed(Option<HybridChartsError>),
    Missing,
}

/// Pick a tier from the density signature alone.
///
/// Absolute count and density each propose a tier; the more capable
/// proposal wins, so growing point counts advance the tier monotonically.
pub(crate) fn select_tier(signature: &DensitySignature, thresholds: &ThresholdConfig) -> Tier {
    let by_count = if signature.total_points >= thresholds.ras_to_accel {
        Tier::Accelerated
    } else if signature.total_points >= thresholds.vec_to_ras {
        Tier::Raster
    } else {
        Tier::Vector
    };
    let by_density = if signature.points_per_pixel >= thresholds.ppp_accel {
        Tier::Accelerated
    } else if signature.points_per_pixel >= thresholds.ppp_ras {
        Tier::Raster
    } else {
        Tier::Vector
    };
    by_count.max(by_density)
}

/// Density-adaptive render engine.
///
/// Owns one surface per registered tier, selects among them from density and
/// rolling frame history, and rebuilds the spatial index after every render.
pub struct TierEngine {
    manager: ConfigManager,
    current_tier: Tier,
    surfaces: HashMap<Tier, SurfaceSlot>,
    registration_order: Vec<Tier>,
    ring: FrameRing,
    events: EventBus<EngineEvent>,
    spatial: Option<SpatialIndex>,
    last_signature: Option<DensitySignature>,
    frame_counter: u64,
    lod_levels: HashMap<String, LodLevel>,
    pending_warnings: Vec<String>,
    shut_down: bool,
}

impl TierEngine {
    pub fn new(config: HybridChartsConfig, capabilities: DeviceCapabilities) -> Self {
        Self::from_manager(ConfigManager::new(config, capabilities))
    }

    /// Construct with session-persisted threshold overrides applied.
    pub fn with_session(
        config: HybridChartsConfig,
        capabilities: DeviceCapabilities,
        store: &dyn SessionStore,
    ) -> Self {
        Self::from_manager(ConfigManager::new(config, capabilities).with_session_overrides(store))
    }

    fn from_manager(mut manager: ConfigManager) -> Self {
        let pending_warnings = manager.take_warnings();
        let perf = manager.config().perf;
        Self {
            manager,
            current_tier: Tier::Vector,
            surfaces: HashMap::new(),
            registration_order: Vec::new(),
            ring: FrameRing::new(perf.metrics_capacity, perf.max_frame_time_ms),
            events: EventBus::new(),
            spatial: None,
            last_signature: None,
            frame_counter: 0,
            lod_levels: HashMap::new(),
            pending_warnings,
            shut_down: false,
        }
    }

    /// Register a surface for its tier. Registering a tier twice is a
    /// lifecycle fault.
    pub fn register_surface(&mut self, surface: Box<dyn Surface>) -> Result<()> {
        let tier = surface.tier();
        if self.surfaces.contains_key(&tier) {
            let error = HybridChartsError::DuplicateSurface { tier };
            self.emit_now(EnginePayload::Error {
                message: error.to_string(),
            });
            return Err(error);
        }
        self.surfaces.insert(
            tier,
            SurfaceSlot {
                surface,
                state: SlotState::New,
            },
        );
        self.registration_order.push(tier);
        log::debug!("registered {tier} surface");
        Ok(())
    }

    pub fn subscribe(&self) -> EventSubscription<EngineEvent> {
        self.events.subscribe()
    }

    pub fn current_tier(&self) -> Tier {
        self.current_tier
    }

    pub fn config(&self) -> &HybridChartsConfig {
        self.manager.config()
    }

    pub fn device_class(&self) -> config_system::DeviceClass {
        self.manager.device_class()
    }

    pub fn metrics(&self) -> &FrameRing {
        &self.ring
    }

    /// Index from the most recent render, if still valid.
    pub fn spatial_index(&self) -> Option<&SpatialIndex> {
        self.spatial.as_ref()
    }

    /// Render one frame: evaluate the tier, downsample, draw, rebuild the
    /// spatial index, and account the frame.
    pub fn render(
        &mut self,
        series: &[Series],
        viewport: &Viewport,
        x_scale: &dyn Scale,
        y_scale: &dyn Scale,
    ) -> Result<()> {
        if self.shut_down {
            let error = HybridChartsError::SurfaceLifecycle {
                message: "render after shutdown".to_string(),
            };
            self.emit_now(EnginePayload::Error {
                message: error.to_string(),
            });
            return Err(error);
        }
        if self.registration_order.is_empty() {
            let error = HybridChartsError::NoSurfaces;
            self.emit_now(EnginePayload::Error {
                message: error.to_string(),
            });
            return Err(error);
        }
        self.flush_warnings();

        let now_ms = timing::timestamp_millis();
        let signature = DensitySignature::compute(series, viewport);

        self.frame_counter += 1;
        let needs_evaluation = match self.last_signature {
            None => true,
            Some(last) => {
                signature.total_points.abs_diff(last.total_points) >= SIGNATURE_DELTA_POINTS
                    || self.frame_counter % REEVALUATE_INTERVAL_FRAMES == 0
            }
        };
        if needs_evaluation {
            self.evaluate_tier(&signature, now_ms);
            // The delta check measures drift since the last evaluation.
            self.last_signature = Some(signature);
        }

        let lod_config = self.manager.config().lod;
        let target = lod_config
            .target_points
            .unwrap_or(viewport.inner_width().ceil() as usize)
            .max(1);
        let lod: Vec<LodResult> = series
            .iter()
            .map(|s| {
                if s.visible {
                    lod_engine::downsample(&s.data, target, &lod_config, None)
                } else {
                    LodResult::empty()
                }
            })
            .collect();
        for (s, result) in series.iter().zip(&lod) {
            if !s.visible {
                continue;
            }
            if self.lod_levels.insert(s.id.clone(), result.level) != Some(result.level) {
                self.emit(
                    now_ms,
                    EnginePayload::LodChange {
                        series_id: s.id.clone(),
                        level: result.level,
                        compression_ratio: result.compression_ratio,
                    },
                );
            }
        }

        let frame = RenderFrame {
            series,
            lod: &lod,
            viewport,
        };
        let timer = Timer::now();
        let rendered = self.render_current(&frame, viewport, now_ms)?;
        let frame_time_ms = timer.elapsed_millis();

        // The index is rebuilt eagerly at the end of every render.
        let hover_radius = self.manager.config().interaction.hover_radius;
        self.spatial = Some(SpatialIndex::build(
            series,
            viewport,
            x_scale,
            y_scale,
            hover_radius,
        ));

        if rendered {
            self.record_frame_at(now_ms, frame_time_ms, signature.total_points);
        }
        Ok(())
    }

    /// Account an externally timed frame. Hosts that issue their own draw
    /// commands report frame times here; the degradation policy applies
    /// either way.
    pub fn record_frame(&mut self, frame_time_ms: f64, point_count: usize) {
        self.record_frame_at(timing::timestamp_millis(), frame_time_ms, point_count);
    }

    /// Nearest-point query against the authoritative index.
    pub fn nearest_hit(&self, screen_x: f64, screen_y: f64, radius: f64) -> Option<HitResult> {
        self.spatial.as_ref()?.nearest(screen_x, screen_y, radius)
    }

    /// Region query against the authoritative index.
    pub fn region_hit(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> Vec<DataPoint> {
        self.spatial
            .as_ref()
            .map(|index| index.points_in_rect(x1, y1, x2, y2))
            .unwrap_or_default()
    }

    /// Bind a coordinator to the live surface. With no surface registered
    /// this is a no-op that logs a warning.
    pub fn attach_interaction(&self, coordinator: &mut InteractionCoordinator) {
        if self.surfaces.is_empty() {
            log::warn!("interaction attach requested with no registered surface");
            return;
        }
        coordinator.attach();
    }

    /// Apply a runtime threshold override, optionally persisting it for the
    /// session. Takes effect at the next evaluation.
    pub fn apply_threshold_override(
        &mut self,
        thresholds: ThresholdConfig,
        store: Option<&mut dyn SessionStore>,
    ) {
        let warnings = self.manager.apply_override(thresholds, store);
        self.pending_warnings.extend(warnings);
        // Force a fresh evaluation on the next render.
        self.last_signature = None;
    }

    /// Force or release a manual tier override.
    pub fn set_force_tier(&mut self, tier: Option<Tier>) {
        let mut thresholds = self.manager.config().thresholds;
        thresholds.force_tier = tier;
        self.apply_threshold_override(thresholds, None);
    }

    /// Propagate a viewport resize to every live surface.
    pub fn resize(&mut self, width_px: f64, height_px: f64) {
        let mut failures = Vec::new();
        for (tier, slot) in self.surfaces.iter_mut() {
            if slot.state == SlotState::Destroyed {
                continue;
            }
            if let Err(error) = slot.surface.resize(width_px, height_px) {
                failures.push(format!("resize failed on {tier}: {error}"));
            }
        }
        for message in failures {
            self.emit_now(EnginePayload::Error { message });
        }
        // Geometry changed, the index is stale.
        self.spatial = None;
    }

    /// Destroy all surfaces in LIFO registration order.
    pub fn shutdown(&mut self) {
        let mut failures = Vec::new();
        for tier in self.registration_order.clone().into_iter().rev() {
            if let Some(slot) = self.surfaces.get_mut(&tier) {
                if slot.state == SlotState::Destroyed {
                    continue;
                }
                if let Err(error) = slot.surface.destroy() {
                    failures.push(format!("destroy failed on {tier}: {error}"));
                }
                slot.state = SlotState::Destroyed;
            }
        }
        for message in failures {
            self.emit_now(EnginePayload::Error { message });
        }
        self.spatial = None;
        self.shut_down = true;
        log::info!("engine shut down");
    }

    /// JSON snapshot of the engine state for diagnostics.
    pub fn stats(&self) -> serde_json::Value {
        serde_json::json!({
            "current_tier": self.current_tier.as_str(),
            "device_class": self.manager.device_class().as_str(),
            "frame_counter": self.frame_counter,
            "density": self.last_signature.map(|s| serde_json::json!({
                "total_points": s.total_points,
                "points_per_pixel": s.points_per_pixel,
            })),
            "metrics": {
                "frames": self.ring.len(),
                "dropped": self.ring.dropped_count(),
                "avg_frame_time_ms": self.ring.average_frame_time_all(),
                "consecutive_violations": self.ring.consecutive_violations(),
            },
            "subscribers": self.events.subscriber_count(),
        })
    }

    fn evaluate_tier(&mut self, signature: &DensitySignature, now_ms: f64) {
        let thresholds = self.manager.config().thresholds;
        let forced = thresholds.force_tier.filter(|&tier| self.is_available(tier));
        let (desired, manual) = match forced {
            Some(tier) => (tier, true),
            None => (select_tier(signature, &thresholds), false),
        };

        let Some(target) = self.first_available_at_or_below(desired) else {
            self.emit(
                now_ms,
                EnginePayload::Error {
                    message: "no available surface for any tier".to_string(),
                },
            );
            return;
        };

        if target == self.current_tier {
            return;
        }
        let reason = if target != desired {
            SwitchReason::Fallback
        } else if manual {
            SwitchReason::Manual
        } else {
            SwitchReason::Density
        };
        self.switch_tier(target, reason, signature, now_ms);
    }

    fn is_available(&self, tier: Tier) -> bool {
        self.manager.supports(tier)
            && self
                .surfaces
                .get(&tier)
                .map_or(false, |slot| {
                    slot.state != SlotState::Failed && slot.state != SlotState::Destroyed
                })
    }

    fn first_available_at_or_below(&self, desired: Tier) -> Option<Tier> {
        Tier::DESCENDING
            .into_iter()
            .filter(|&tier| tier <= desired)
            .find(|&tier| self.is_available(tier))
    }

    fn next_available_below(&self, tier: Tier) -> Option<Tier> {
        tier.step_down()
            .and_then(|lower| self.first_available_at_or_below(lower))
    }

    fn switch_tier(
        &mut self,
        to: Tier,
        reason: SwitchReason,
        signature: &DensitySignature,
        now_ms: f64,
    ) {
        let from = self.current_tier;
        self.current_tier = to;
        self.ring.reset_violations();
        let avg_frame_time_ms = self.ring.average_frame_time_all().unwrap_or(0.0);
        log::info!("tier switch {from} -> {to} ({reason:?})");
        self.emit(
            now_ms,
            EnginePayload::TierSwitch {
                from,
                to,
                reason,
                total_points: signature.total_points,
                points_per_pixel: signature.points_per_pixel,
                avg_frame_time_ms,
            },
        );
    }

    /// Render on the current tier, queueing behind pending initialization
    /// and falling back down the tier order on failure.
    fn render_current(
        &mut self,
        frame: &RenderFrame<'_>,
        viewport: &Viewport,
        now_ms: f64,
    ) -> Result<bool> {
        loop {
            let tier = self.current_tier;
            let outcome = match self.surfaces.get_mut(&tier) {
                None => SlotOutcome::Missing,
                Some(slot) => match slot.state {
                    SlotState::Destroyed => SlotOutcome::Destroyed,
                    SlotState::Failed => SlotOutcome::Failed(None),
                    SlotState::Ready => SlotOutcome::TryRender,
                    SlotState::New => match slot.surface.initialize(viewport) {
                        Ok(InitState::Ready) => {
                            slot.state = SlotState::Ready;
                            SlotOutcome::TryRender
                        }
                        Ok(InitState::Pending) => {
                            slot.state = SlotState::Pending;
                            SlotOutcome::Queued
                        }
                        Err(error) => {
                            slot.state = SlotState::Failed;
                            SlotOutcome::Failed(Some(error))
                        }
                    },
                    SlotState::Pending => match slot.surface.poll_ready() {
                        Ok(InitState::Ready) => {
                            slot.state = SlotState::Ready;
                            SlotOutcome::TryRender
                        }
                        Ok(InitState::Pending) => SlotOutcome::Queued,
                        Err(error) => {
                            slot.state = SlotState::Failed;
                            SlotOutcome::Failed(Some(error))
                        }
                    },
                },
            };

            match outcome {
                SlotOutcome::TryRender => {
                    let render_result = match self.surfaces.get_mut(&tier) {
                        Some(slot) => slot.surface.render(frame),
                        None => Err(HybridChartsError::MissingSurface { tier }),
                    };
                    match render_result {
                        Ok(()) => return Ok(true),
                        Err(error) => {
                            if let Some(slot) = self.surfaces.get_mut(&tier) {
                                slot.state = SlotState::Failed;
                            }
                            self.emit(
                                now_ms,
                                EnginePayload::Error {
                                    message: error.to_string(),
                                },
                            );
                        }
                    }
                }
                SlotOutcome::Queued => {
                    log::debug!("{tier} surface still initializing, render queued");
                    return Ok(false);
                }
                SlotOutcome::Destroyed => {
                    let error = HybridChartsError::SurfaceLifecycle {
                        message: format!("render on destroyed {tier} surface"),
                    };
                    self.emit(
                        now_ms,
                        EnginePayload::Error {
                            message: error.to_string(),
                        },
                    );
                    return Err(error);
                }
                SlotOutcome::Failed(error) => {
                    if let Some(error) = error {
                        self.emit(
                            now_ms,
                            EnginePayload::Error {
                                message: error.to_string(),
                            },
                        );
                    }
                }
                SlotOutcome::Missing => {
                    let error = HybridChartsError::MissingSurface { tier };
                    self.emit(
                        now_ms,
                        EnginePayload::Error {
                            message: error.to_string(),
                        },
                    );
                }
            }

            // Walk down toward Vector, which is always available as a tier.
            let Some(next) = self.next_available_below(tier) else {
                let error = HybridChartsError::Render {
                    tier,
                    message: "no fallback surface available".to_string(),
                };
                self.emit(
                    now_ms,
                    EnginePayload::Error {
                        message: error.to_string(),
                    },
                );
                return Err(error);
            };
            let signature = self.last_signature.unwrap_or(DensitySignature {
                total_points: 0,
                points_per_pixel: 0.0,
            });
            self.switch_tier(next, SwitchReason::Fallback, &signature, now_ms);
        }
    }

    fn record_frame_at(&mut self, now_ms: f64, frame_time_ms: f64, point_count: usize) {
        let metric = self
            .ring
            .record(now_ms, frame_time_ms, point_count, self.current_tier);
        if !metric.dropped {
            return;
        }

        let perf = self.manager.config().perf;
        let consecutive = self.ring.consecutive_violations();
        self.emit(
            now_ms,
            EnginePayload::PerformanceViolation {
                frame_time_ms,
                budget_ms: perf.max_frame_time_ms,
                consecutive,
            },
        );

        if perf.auto_degrade && consecutive >= perf.degrade_frame_threshold {
            let lower = self
                .current_tier
                .step_down()
                .and_then(|tier| self.first_available_at_or_below(tier));
            if let Some(lower) = lower {
                let signature = self.last_signature.unwrap_or(DensitySignature {
                    total_points: point_count,
                    points_per_pixel: 0.0,
                });
                self.switch_tier(lower, SwitchReason::Performance, &signature, now_ms);
            }
        }
    }

    fn flush_warnings(&mut self) {
        for warning in std::mem::take(&mut self.pending_warnings) {
            self.emit_now(EnginePayload::Error {
                message: format!("configuration warning: {warning}"),
            });
        }
    }

    fn emit(&self, timestamp_ms: f64, payload: EnginePayload) {
        self.events.emit(EngineEvent {
            timestamp_ms,
            payload,
        });
    }

    fn emit_now(&self, payload: EnginePayload) {
        self.emit(timing::timestamp_millis(), payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature(total_points: usize, points_per_pixel: f64) -> DensitySignature {
        DensitySignature {
            total_points,
            points_per_pixel,
        }
    }

    #[test]
    fn test_selection_by_absolute_count() {
        let thresholds = ThresholdConfig::default();
        assert_eq!(select_tier(&signature(4_999, 0.01), &thresholds), Tier::Vector);
        assert_eq!(select_tier(&signature(5_001, 0.01), &thresholds), Tier::Raster);
        assert_eq!(
            select_tier(&signature(50_001, 0.1), &thresholds),
            Tier::Accelerated
        );
    }

    #[test]
    fn test_selection_by_density() {
        let thresholds = ThresholdConfig::default();
        // Few points on a tiny viewport still promote by density.
        assert_eq!(select_tier(&signature(100, 6.0), &thresholds), Tier::Raster);
        assert_eq!(
            select_tier(&signature(100, 75.0), &thresholds),
            Tier::Accelerated
        );
    }

    #[test]
    fn test_selection_is_monotone_in_count() {
        let thresholds = ThresholdConfig::default();
        let mut previous = Tier::Vector;
        for total in (0..120_000).step_by(1_000) {
            let tier = select_tier(&signature(total, 0.0), &thresholds);
            assert!(tier >= previous, "tier regressed at {total} points");
            previous = tier;
        }
    }
}
