//! Hover/click/brush/keyboard state machine shared by all render surfaces
//!
//! Sits above any concrete surface and resolves every query through the
//! spatial index, so interaction behaves identically across tiers. Debounce
//! timers are stored deadlines fired by [`InteractionCoordinator::tick`];
//! the coordinator never blocks and processes input in arrival order.
//! Selection lives here, never in a surface, so it survives tier switches.

use crate::spatial::SpatialIndex;
use shared_types::{
    EventBus, EventSubscription, HitResult, InteractionConfig, InteractionEvent, PointRef,
};
use std::collections::BTreeSet;

/// Maximum cursor travel between the clicks of a double click, in pixels.
const DOUBLE_CLICK_SLOP_PX: f64 = 5.0;
const WHEEL_ZOOM_IN_FACTOR: f64 = 1.1;
const WHEEL_ZOOM_OUT_FACTOR: f64 = 0.9;

/// Pointer-driven FSM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerState {
    Idle,
    Hovering,
    Brushing,
}

/// Keys understood by keyboard navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Left,
    Right,
    Up,
    Down,
    Enter,
    Escape,
}

/// Wheel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy)]
struct PendingHover {
    x: f64,
    y: f64,
    due_ms: f64,
}

#[derive(Debug, Clone, Copy)]
struct PendingZoom {
    factor: f64,
    anchor_x: f64,
    anchor_y: f64,
    due_ms: f64,
}

#[derive(Debug, Clone, Copy)]
struct ClickRecord {
    time_ms: f64,
    x: f64,
    y: f64,
}

/// Active brush rectangle: a pinned anchor and a moving corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushRect {
    pub anchor_x: f64,
    pub anchor_y: f64,
    pub corner_x: f64,
    pub corner_y: f64,
}

impl BrushRect {
    fn normalized(&self) -> (f64, f64, f64, f64) {
        (
            self.anchor_x.min(self.corner_x),
            self.anchor_y.min(self.corner_y),
            self.anchor_x.max(self.corner_x),
            self.anchor_y.max(self.corner_y),
        )
    }
}

/// Shared interaction coordinator.
pub struct InteractionCoordinator {
    config: InteractionConfig,
    state: PointerState,
    attached: bool,
    hover: Option<HitResult>,
    selection: BTreeSet<PointRef>,
    brush: Option<BrushRect>,
    last_click: Option<ClickRecord>,
    pending_hover: Option<PendingHover>,
    pending_zoom: Option<PendingZoom>,
    events: EventBus<InteractionEvent>,
}

impl InteractionCoordinator {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            state: PointerState::Idle,
            attached: false,
            hover: None,
            selection: BTreeSet::new(),
            brush: None,
            last_click: None,
            pending_hover: None,
            pending_zoom: None,
            events: EventBus::new(),
        }
    }

    pub fn subscribe(&self) -> EventSubscription<InteractionEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> PointerState {
        self.state
    }

    pub fn hover(&self) -> Option<&HitResult> {
        self.hover.as_ref()
    }

    /// Current selection, ordered by (series id, point index).
    pub fn selection(&self) -> Vec<PointRef> {
        self.selection.iter().cloned().collect()
    }

    pub fn brush(&self) -> Option<&BrushRect> {
        self.brush.as_ref()
    }

    /// Bind to a (new) live surface: drains timers and clears hover, but
    /// preserves the selection.
    pub fn attach(&mut self) {
        self.pending_hover = None;
        self.pending_zoom = None;
        self.brush = None;
        self.state = PointerState::Idle;
        if self.hover.take().is_some() {
            self.events.emit(InteractionEvent::HoverCleared);
        }
        self.attached = true;
    }

    /// Detach from the surface. Timers never fire afterwards.
    pub fn detach(&mut self) {
        self.pending_hover = None;
        self.pending_zoom = None;
        self.brush = None;
        self.state = PointerState::Idle;
        self.attached = false;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Cursor movement. Hover queries are debounced; during a brush the
    /// moving corner is updated instead.
    pub fn pointer_move(&mut self, x: f64, y: f64, now_ms: f64) {
        if !self.attached {
            return;
        }
        if self.state == PointerState::Brushing {
            self.brush_update(x, y);
            return;
        }
        self.pending_hover = Some(PendingHover {
            x,
            y,
            due_ms: now_ms + self.config.hover_debounce_ms,
        });
    }

    /// Fire any due debounced work. Call once per frame.
    pub fn tick(&mut self, now_ms: f64, index: &SpatialIndex) {
        if !self.attached {
            return;
        }
        if let Some(pending) = self.pending_hover {
            if now_ms >= pending.due_ms {
                self.pending_hover = None;
                let hit = index.nearest(pending.x, pending.y, self.config.hover_radius);
                self.apply_hover(hit);
            }
        }
        if let Some(pending) = self.pending_zoom {
            if now_ms >= pending.due_ms {
                self.pending_zoom = None;
                self.events.emit(InteractionEvent::ZoomIntent {
                    factor: pending.factor,
                    anchor_x: pending.anchor_x,
                    anchor_y: pending.anchor_y,
                });
            }
        }
    }

    /// Cursor left the surface.
    pub fn pointer_leave(&mut self) {
        if !self.attached {
            return;
        }
        self.pending_hover = None;
        self.hover = None;
        if self.state == PointerState::Hovering {
            self.state = PointerState::Idle;
        }
        self.events.emit(InteractionEvent::HoverCleared);
    }

    /// Click: a double click resets zoom, a single click toggles selection
    /// membership of the nearest point.
    pub fn click(&mut self, x: f64, y: f64, now_ms: f64, index: &SpatialIndex) {
        if !self.attached {
            return;
        }

        let is_double = self.last_click.is_some_and(|last| {
            now_ms - last.time_ms <= self.config.double_click_ms
                && ((x - last.x).powi(2) + (y - last.y).powi(2)).sqrt() <= DOUBLE_CLICK_SLOP_PX
        });
        if is_double {
            self.last_click = None;
            self.events.emit(InteractionEvent::ZoomReset);
            return;
        }
        self.last_click = Some(ClickRecord { time_ms: now_ms, x, y });

        if let Some(hit) = index.nearest(x, y, self.config.selection_radius) {
            let key = PointRef {
                series_id: hit.series_id,
                point_index: hit.point_index,
            };
            if !self.selection.remove(&key) {
                self.selection.insert(key);
            }
            self.emit_selection();
        }
    }

    /// Wheel input, debounced into a single zoom intent.
    pub fn wheel(&mut self, direction: WheelDirection, x: f64, y: f64, now_ms: f64) {
        if !self.attached {
            return;
        }
        let factor = match direction {
            WheelDirection::Up => WHEEL_ZOOM_IN_FACTOR,
            WheelDirection::Down => WHEEL_ZOOM_OUT_FACTOR,
        };
        self.pending_zoom = Some(PendingZoom {
            factor,
            anchor_x: x,
            anchor_y: y,
            due_ms: now_ms + self.config.zoom_debounce_ms,
        });
    }

    /// Pin the brush anchor.
    pub fn brush_begin(&mut self, x: f64, y: f64) {
        if !self.attached {
            return;
        }
        self.pending_hover = None;
        self.state = PointerState::Brushing;
        self.brush = Some(BrushRect {
            anchor_x: x,
            anchor_y: y,
            corner_x: x,
            corner_y: y,
        });
    }

    /// Move the brush corner.
    pub fn brush_update(&mut self, x: f64, y: f64) {
        if let Some(brush) = self.brush.as_mut() {
            brush.corner_x = x;
            brush.corner_y = y;
        }
    }

    /// Finish the brush: selection becomes the contained point set.
    pub fn brush_end(&mut self, index: &SpatialIndex) {
        let Some(brush) = self.brush.take() else {
            return;
        };
        self.state = PointerState::Idle;
        let (x1, y1, x2, y2) = brush.normalized();
        self.selection = index.refs_in_rect(x1, y1, x2, y2).into_iter().collect();
        self.emit_selection();
    }

    /// Keyboard navigation over the visible point set.
    pub fn key(&mut self, key: NavKey, index: &SpatialIndex) {
        if !self.attached || !self.config.keyboard_nav {
            return;
        }
        match key {
            NavKey::Escape => {
                if !self.selection.is_empty() {
                    self.selection.clear();
                    self.emit_selection();
                }
            }
            NavKey::Enter => {
                if let Some(hover) = &self.hover {
                    let key = PointRef {
                        series_id: hover.series_id.clone(),
                        point_index: hover.point_index,
                    };
                    if self.selection.insert(key) {
                        self.emit_selection();
                    }
                }
            }
            NavKey::Left | NavKey::Right => {
                let delta = if key == NavKey::Left { -1 } else { 1 };
                let next = match &self.hover {
                    Some(hover) => index.neighbor(
                        &hover.series_id,
                        hover.point_index,
                        delta,
                        self.config.wrap_navigation,
                    ),
                    None => index.first_entry(),
                };
                if let Some(hit) = next {
                    self.apply_hover(Some(hit));
                }
            }
            NavKey::Up | NavKey::Down => {
                let delta = if key == NavKey::Up { -1 } else { 1 };
                let next = match &self.hover {
                    Some(hover) => {
                        index.sibling_series(&hover.series_id, hover.point_index, delta)
                    }
                    None => index.first_entry(),
                };
                if let Some(hit) = next {
                    self.apply_hover(Some(hit));
                }
            }
        }
    }

    fn apply_hover(&mut self, hit: Option<HitResult>) {
        let same_identity = match (&self.hover, &hit) {
            (Some(current), Some(new)) => {
                current.series_id == new.series_id && current.point_index == new.point_index
            }
            (None, None) => true,
            _ => false,
        };
        self.state = match (&hit, self.state) {
            (_, PointerState::Brushing) => PointerState::Brushing,
            (Some(_), _) => PointerState::Hovering,
            (None, _) => PointerState::Idle,
        };
        if !same_identity {
            self.hover = hit.clone();
            self.events.emit(InteractionEvent::HoverChanged { hit });
        }
    }

    fn emit_selection(&self) {
        self.events.emit(InteractionEvent::SelectionChanged {
            selected: self.selection.iter().cloned().collect(),
        });
    }
}
