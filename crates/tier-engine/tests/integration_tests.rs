//! Integration tests for the tier engine
//!
//! A recording mock surface stands in for the runtime's concrete back-ends
//! and captures the per-frame call shape.

use config_system::DeviceCapabilities;
use shared_types::{
    DataPoint, EnginePayload, HybridChartsConfig, HybridChartsError, LinearScale, Margins,
    Series, SwitchReason, Tier, Viewport,
};
use std::cell::RefCell;
use std::rc::Rc;
use tier_engine::{
    InitState, InteractionCoordinator, RenderFrame, Surface, TierEngine,
};

type CallLog = Rc<RefCell<Vec<String>>>;

struct RecordingSurface {
    tier: Tier,
    log: CallLog,
    remaining_pending: u32,
    fail_init: bool,
    fail_render: bool,
}

impl RecordingSurface {
    fn new(tier: Tier, log: CallLog) -> Self {
        Self {
            tier,
            log,
            remaining_pending: 0,
            fail_init: false,
            fail_render: false,
        }
    }

    fn pending(mut self, polls: u32) -> Self {
        self.remaining_pending = polls;
        self
    }

    fn failing_render(mut self) -> Self {
        self.fail_render = true;
        self
    }

    fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    fn record(&self, call: &str) {
        self.log.borrow_mut().push(format!("{call}:{}", self.tier));
    }
}

impl Surface for RecordingSurface {
    fn tier(&self) -> Tier {
        self.tier
    }

    fn initialize(&mut self, _viewport: &Viewport) -> shared_types::Result<InitState> {
        self.record("init");
        if self.fail_init {
            return Err(HybridChartsError::SurfaceInit {
                message: "mock init failure".to_string(),
            });
        }
        if self.remaining_pending > 0 {
            return Ok(InitState::Pending);
        }
        Ok(InitState::Ready)
    }

    fn poll_ready(&mut self) -> shared_types::Result<InitState> {
        if self.remaining_pending > 0 {
            self.remaining_pending -= 1;
            if self.remaining_pending > 0 {
                return Ok(InitState::Pending);
            }
        }
        Ok(InitState::Ready)
    }

    fn render(&mut self, _frame: &RenderFrame<'_>) -> shared_types::Result<()> {
        self.record("render");
        if self.fail_render {
            return Err(HybridChartsError::Render {
                tier: self.tier,
                message: "mock render failure".to_string(),
            });
        }
        Ok(())
    }

    fn resize(&mut self, _width_px: f64, _height_px: f64) -> shared_types::Result<()> {
        self.record("resize");
        Ok(())
    }

    fn destroy(&mut self) -> shared_types::Result<()> {
        self.record("destroy");
        Ok(())
    }
}

fn flat_series(n: usize) -> Vec<Series> {
    let data = (0..n)
        .map(|i| DataPoint::new(i as f64, (i % 10) as f64))
        .collect();
    vec![Series::with_data("s0", "Series 0", data)]
}

fn wide_viewport() -> Viewport {
    Viewport::new(1_020.0, 1_020.0).with_margins(Margins::uniform(10.0))
}

fn scales_for(n: usize) -> (LinearScale, LinearScale) {
    (
        LinearScale::new((0.0, n as f64), (0.0, 1_000.0)),
        LinearScale::new((0.0, 10.0), (1_000.0, 0.0)),
    )
}

fn engine_with_all_tiers(log: &CallLog) -> TierEngine {
    let mut engine =
        TierEngine::new(HybridChartsConfig::default(), DeviceCapabilities::default());
    for tier in [Tier::Vector, Tier::Raster, Tier::Accelerated] {
        engine
            .register_surface(Box::new(RecordingSurface::new(tier, log.clone())))
            .unwrap();
    }
    engine
}

fn render(engine: &mut TierEngine, n: usize) {
    let series = flat_series(n);
    let viewport = wide_viewport();
    let (x_scale, y_scale) = scales_for(n);
    engine
        .render(&series, &viewport, &x_scale, &y_scale)
        .unwrap();
}

#[test]
fn tier_selection_at_default_thresholds() {
    for (count, expected) in [
        (4_999, Tier::Vector),
        (5_001, Tier::Raster),
        (50_001, Tier::Accelerated),
    ] {
        let log = CallLog::default();
        let mut engine = engine_with_all_tiers(&log);
        render(&mut engine, count);
        assert_eq!(engine.current_tier(), expected, "at {count} points");
    }
}

#[test]
fn tier_switch_event_carries_density_reason() {
    let log = CallLog::default();
    let mut engine = engine_with_all_tiers(&log);
    let events = engine.subscribe();

    render(&mut engine, 60_000);
    assert_eq!(engine.current_tier(), Tier::Accelerated);

    let switches: Vec<_> = events
        .drain()
        .into_iter()
        .filter_map(|e| match e.payload {
            EnginePayload::TierSwitch { from, to, reason, .. } => Some((from, to, reason)),
            _ => None,
        })
        .collect();
    assert_eq!(
        switches,
        vec![(Tier::Vector, Tier::Accelerated, SwitchReason::Density)]
    );
}

#[test]
fn auto_degrade_steps_down_one_tier() {
    let log = CallLog::default();
    let mut config = HybridChartsConfig::default();
    config.perf.degrade_frame_threshold = 3;

    let mut engine = TierEngine::new(config, DeviceCapabilities::default());
    for tier in [Tier::Vector, Tier::Raster, Tier::Accelerated] {
        engine
            .register_surface(Box::new(RecordingSurface::new(tier, log.clone())))
            .unwrap();
    }
    render(&mut engine, 60_000);
    assert_eq!(engine.current_tier(), Tier::Accelerated);

    let events = engine.subscribe();
    for _ in 0..3 {
        engine.record_frame(50.0, 60_000);
    }

    assert_eq!(engine.current_tier(), Tier::Raster);
    let performance_switch = events.drain().into_iter().any(|e| {
        matches!(
            e.payload,
            EnginePayload::TierSwitch {
                from: Tier::Accelerated,
                to: Tier::Raster,
                reason: SwitchReason::Performance,
                ..
            }
        )
    });
    assert!(performance_switch);
}

#[test]
fn degradation_never_steps_up() {
    let log = CallLog::default();
    let mut config = HybridChartsConfig::default();
    config.perf.degrade_frame_threshold = 2;
    let mut engine = TierEngine::new(config, DeviceCapabilities::default());
    engine
        .register_surface(Box::new(RecordingSurface::new(Tier::Vector, log.clone())))
        .unwrap();
    render(&mut engine, 100);
    assert_eq!(engine.current_tier(), Tier::Vector);

    // Violations at the bottom tier have nowhere to go.
    for _ in 0..5 {
        engine.record_frame(100.0, 100);
    }
    assert_eq!(engine.current_tier(), Tier::Vector);
}

#[test]
fn hit_test_through_engine_matches_projection() {
    let log = CallLog::default();
    let mut engine = engine_with_all_tiers(&log);

    // Data (5, 5) projects to inner (150, 100), screen (160, 110).
    let series = vec![Series::with_data(
        "a",
        "A",
        vec![DataPoint::new(5.0, 5.0)],
    )];
    let viewport = Viewport::new(320.0, 220.0).with_margins(Margins::uniform(10.0));
    let x_scale = LinearScale::new((0.0, 10.0), (0.0, 300.0));
    let y_scale = LinearScale::new((0.0, 10.0), (200.0, 0.0));
    engine
        .render(&series, &viewport, &x_scale, &y_scale)
        .unwrap();

    let hit = engine.nearest_hit(160.0, 110.0, 10.0).unwrap();
    assert_eq!(hit.series_id, "a");
    assert_eq!(hit.pixel_x, 160.0);
    assert_eq!(hit.pixel_y, 110.0);
    assert!(engine.nearest_hit(200.0, 200.0, 10.0).is_none());
}

#[test]
fn surfaces_answer_hits_identically_to_the_index() {
    let log = CallLog::default();
    let mut engine = engine_with_all_tiers(&log);
    render(&mut engine, 500);
    let index = engine.spatial_index().unwrap();

    let probes = [(100.0, 500.0), (512.0, 300.0), (10.0, 10.0), (999.0, 999.0)];
    for tier in [Tier::Vector, Tier::Raster, Tier::Accelerated] {
        let surface = RecordingSurface::new(tier, log.clone());
        for &(x, y) in &probes {
            let from_surface = surface.nearest_hit(index, x, y, 12.0);
            let from_index = index.nearest(x, y, 12.0);
            assert_eq!(from_surface, from_index);
        }
        assert_eq!(
            surface.region_hit(index, 0.0, 0.0, 400.0, 400.0),
            index.points_in_rect(0.0, 0.0, 400.0, 400.0)
        );
    }
}

#[test]
fn brush_selection_equals_projected_point_set() {
    let log = CallLog::default();
    let mut engine = engine_with_all_tiers(&log);

    // 100 points spread over the unit square.
    let data: Vec<DataPoint> = (0..100)
        .map(|i| {
            DataPoint::new(
                (i % 10) as f64 / 10.0 + 0.05,
                (i / 10) as f64 / 10.0 + 0.05,
            )
        })
        .collect();
    let series = vec![Series::with_data("grid", "Grid", data.clone())];
    let viewport = Viewport::new(200.0, 200.0).with_margins(Margins::uniform(0.0));
    let x_scale = LinearScale::new((0.0, 1.0), (0.0, 200.0));
    let y_scale = LinearScale::new((0.0, 1.0), (200.0, 0.0));
    engine
        .render(&series, &viewport, &x_scale, &y_scale)
        .unwrap();

    let mut coordinator = InteractionCoordinator::new(engine.config().interaction);
    engine.attach_interaction(&mut coordinator);
    let index = engine.spatial_index().unwrap();

    coordinator.brush_begin(0.0, 0.0);
    coordinator.brush_update(100.0, 100.0);
    coordinator.brush_end(index);

    let expected: Vec<usize> = data
        .iter()
        .enumerate()
        .filter(|(_, p)| {
            let px = p.x * 200.0;
            let py = 200.0 - p.y * 200.0;
            px <= 100.0 && py <= 100.0
        })
        .map(|(i, _)| i)
        .collect();
    let selected: Vec<usize> = coordinator
        .selection()
        .into_iter()
        .map(|r| r.point_index)
        .collect();
    assert_eq!(selected, expected);
    assert_eq!(selected.len(), 25);
}

#[test]
fn selection_survives_tier_transitions() {
    let log = CallLog::default();
    let mut engine = engine_with_all_tiers(&log);
    render(&mut engine, 100);
    assert_eq!(engine.current_tier(), Tier::Vector);

    let mut coordinator = InteractionCoordinator::new(engine.config().interaction);
    engine.attach_interaction(&mut coordinator);
    {
        let index = engine.spatial_index().unwrap();
        coordinator.brush_begin(0.0, 0.0);
        coordinator.brush_update(1_020.0, 1_020.0);
        coordinator.brush_end(index);
    }
    let before = coordinator.selection();
    assert!(!before.is_empty());

    render(&mut engine, 60_000);
    assert_eq!(engine.current_tier(), Tier::Accelerated);
    assert_eq!(coordinator.selection(), before);
}

#[test]
fn metric_ring_keeps_only_the_most_recent_entries() {
    let log = CallLog::default();
    let mut engine = engine_with_all_tiers(&log);
    render(&mut engine, 100);

    for i in 0..90 {
        engine.record_frame(10.0 + i as f64 / 100.0, 100);
    }
    let capacity = engine.config().perf.metrics_capacity;
    assert_eq!(engine.metrics().len(), capacity);
    // Oldest surviving entry comes from the last `capacity` recordings.
    let first = engine.metrics().iter().next().unwrap().frame_time_ms;
    assert!(first >= 10.0 + (90 - capacity as i64) as f64 / 100.0 - 1e-9);
}

#[test]
fn forced_tier_wins_when_available() {
    let log = CallLog::default();
    let mut engine = engine_with_all_tiers(&log);
    let events = engine.subscribe();

    engine.set_force_tier(Some(Tier::Raster));
    render(&mut engine, 100);
    assert_eq!(engine.current_tier(), Tier::Raster);

    let manual = events.drain().into_iter().any(|e| {
        matches!(
            e.payload,
            EnginePayload::TierSwitch {
                reason: SwitchReason::Manual,
                ..
            }
        )
    });
    assert!(manual);
}

#[test]
fn forced_tier_unsupported_by_device_falls_through() {
    let log = CallLog::default();
    let capabilities = DeviceCapabilities {
        supports_accelerated: false,
        ..DeviceCapabilities::default()
    };
    let mut engine = TierEngine::new(HybridChartsConfig::default(), capabilities);
    for tier in [Tier::Vector, Tier::Raster, Tier::Accelerated] {
        engine
            .register_surface(Box::new(RecordingSurface::new(tier, log.clone())))
            .unwrap();
    }

    engine.set_force_tier(Some(Tier::Accelerated));
    render(&mut engine, 100);
    // The force target is unusable, so density rules apply instead.
    assert_eq!(engine.current_tier(), Tier::Vector);
}

#[test]
fn pending_initialization_queues_the_render() {
    let log = CallLog::default();
    let mut engine =
        TierEngine::new(HybridChartsConfig::default(), DeviceCapabilities::default());
    engine
        .register_surface(Box::new(
            RecordingSurface::new(Tier::Vector, log.clone()).pending(1),
        ))
        .unwrap();

    render(&mut engine, 100);
    assert_eq!(log.borrow().join(","), "init:vector");
    assert!(engine.metrics().is_empty(), "queued frames are not accounted");

    // The queued request is served once initialization completes.
    render(&mut engine, 100);
    assert_eq!(log.borrow().join(","), "init:vector,render:vector");
    assert_eq!(engine.metrics().len(), 1);
}

#[test]
fn render_failure_falls_back_to_a_lower_tier() {
    let log = CallLog::default();
    let mut engine =
        TierEngine::new(HybridChartsConfig::default(), DeviceCapabilities::default());
    engine
        .register_surface(Box::new(RecordingSurface::new(Tier::Vector, log.clone())))
        .unwrap();
    engine
        .register_surface(Box::new(RecordingSurface::new(Tier::Raster, log.clone())))
        .unwrap();
    engine
        .register_surface(Box::new(
            RecordingSurface::new(Tier::Accelerated, log.clone()).failing_render(),
        ))
        .unwrap();
    let events = engine.subscribe();

    render(&mut engine, 60_000);
    assert_eq!(engine.current_tier(), Tier::Raster);
    assert!(log.borrow().contains(&"render:raster".to_string()));

    let stream = events.drain();
    assert!(stream
        .iter()
        .any(|e| matches!(e.payload, EnginePayload::Error { .. })));
    assert!(stream.iter().any(|e| matches!(
        e.payload,
        EnginePayload::TierSwitch {
            reason: SwitchReason::Fallback,
            ..
        }
    )));
}

#[test]
fn failed_initialization_falls_back_on_next_render() {
    let log = CallLog::default();
    let mut engine =
        TierEngine::new(HybridChartsConfig::default(), DeviceCapabilities::default());
    engine
        .register_surface(Box::new(RecordingSurface::new(Tier::Vector, log.clone())))
        .unwrap();
    engine
        .register_surface(Box::new(
            RecordingSurface::new(Tier::Accelerated, log.clone()).failing_init(),
        ))
        .unwrap();

    render(&mut engine, 60_000);
    assert_eq!(engine.current_tier(), Tier::Vector);
    assert!(log.borrow().contains(&"render:vector".to_string()));

    // A later re-evaluation keeps the failed surface out of rotation.
    render(&mut engine, 61_001);
    assert_eq!(engine.current_tier(), Tier::Vector);
}

#[test]
fn duplicate_registration_is_rejected() {
    let log = CallLog::default();
    let mut engine =
        TierEngine::new(HybridChartsConfig::default(), DeviceCapabilities::default());
    engine
        .register_surface(Box::new(RecordingSurface::new(Tier::Vector, log.clone())))
        .unwrap();
    let result =
        engine.register_surface(Box::new(RecordingSurface::new(Tier::Vector, log.clone())));
    assert_eq!(
        result,
        Err(HybridChartsError::DuplicateSurface { tier: Tier::Vector })
    );
}

#[test]
fn render_without_surfaces_is_fatal() {
    let mut engine =
        TierEngine::new(HybridChartsConfig::default(), DeviceCapabilities::default());
    let series = flat_series(10);
    let viewport = wide_viewport();
    let (x_scale, y_scale) = scales_for(10);
    let result = engine.render(&series, &viewport, &x_scale, &y_scale);
    assert_eq!(result, Err(HybridChartsError::NoSurfaces));
}

#[test]
fn shutdown_destroys_surfaces_in_lifo_order() {
    let log = CallLog::default();
    let mut engine = engine_with_all_tiers(&log);
    render(&mut engine, 100);
    log.borrow_mut().clear();

    engine.shutdown();
    assert_eq!(
        log.borrow().join(","),
        "destroy:accelerated,destroy:raster,destroy:vector"
    );

    // Rendering after shutdown is refused.
    let series = flat_series(10);
    let viewport = wide_viewport();
    let (x_scale, y_scale) = scales_for(10);
    assert!(engine.render(&series, &viewport, &x_scale, &y_scale).is_err());
}

#[test]
fn configuration_warnings_surface_as_events() {
    let log = CallLog::default();
    let mut config = HybridChartsConfig::default();
    config.thresholds.auto_detect = false;
    config.thresholds.vec_to_ras = 5_000;
    config.thresholds.ras_to_accel = 400;

    let mut engine = TierEngine::new(config, DeviceCapabilities::default());
    engine
        .register_surface(Box::new(RecordingSurface::new(Tier::Vector, log.clone())))
        .unwrap();
    let events = engine.subscribe();

    render(&mut engine, 10);
    let warned = events.drain().into_iter().any(|e| match e.payload {
        EnginePayload::Error { message } => message.contains("configuration warning"),
        _ => false,
    });
    assert!(warned);
    // The clamp itself took effect.
    assert_eq!(engine.config().thresholds.ras_to_accel, 5_000);
}

#[test]
fn stats_snapshot_reflects_state() {
    let log = CallLog::default();
    let mut engine = engine_with_all_tiers(&log);
    render(&mut engine, 60_000);

    let stats = engine.stats();
    assert_eq!(stats["current_tier"], "accelerated");
    assert_eq!(stats["metrics"]["frames"], 1);
}
