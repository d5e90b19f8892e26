//! Typed event channel and event payloads
//!
//! Subscribers receive events in emission order through a dedicated channel.
//! Dropping the subscription handle unregisters it; disconnected receivers
//! are pruned on the next emit, so a faulty or departed subscriber can never
//! affect the others.

use crate::{HitResult, LodLevel, PointRef, Tier};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use uuid::Uuid;

/// Why a tier switch happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchReason {
    Density,
    Performance,
    Manual,
    Fallback,
}

/// Engine event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EnginePayload {
    TierSwitch {
        from: Tier,
        to: Tier,
        reason: SwitchReason,
        total_points: usize,
        points_per_pixel: f64,
        avg_frame_time_ms: f64,
    },
    LodChange {
        series_id: String,
        level: LodLevel,
        compression_ratio: f64,
    },
    PerformanceViolation {
        frame_time_ms: f64,
        budget_ms: f64,
        consecutive: u32,
    },
    Error {
        message: String,
    },
}

/// Envelope delivered to engine subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub timestamp_ms: f64,
    pub payload: EnginePayload,
}

/// Events emitted by the interaction coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionEvent {
    HoverChanged { hit: Option<HitResult> },
    HoverCleared,
    SelectionChanged { selected: Vec<PointRef> },
    ZoomIntent { factor: f64, anchor_x: f64, anchor_y: f64 },
    ZoomReset,
}

/// In-order, multi-subscriber event channel.
///
/// Single-threaded by design: the whole core runs on one logical thread, so
/// interior mutability through `RefCell` is sufficient.
pub struct EventBus<T> {
    senders: RefCell<Vec<(Uuid, Sender<T>)>>,
}

impl<T: Clone> EventBus<T> {
    pub fn new() -> Self {
        Self {
            senders: RefCell::new(Vec::new()),
        }
    }

    /// Register a subscriber. The returned handle unregisters on drop.
    pub fn subscribe(&self) -> EventSubscription<T> {
        let (tx, rx) = unbounded();
        let id = Uuid::new_v4();
        self.senders.borrow_mut().push((id, tx));
        EventSubscription { id, receiver: rx }
    }

    /// Deliver an event to every live subscriber, pruning dropped ones.
    pub fn emit(&self, event: T) {
        self.senders
            .borrow_mut()
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders.borrow().len()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscription handle. Dropping it unregisters the subscriber.
pub struct EventSubscription<T> {
    id: Uuid,
    receiver: Receiver<T>,
}

impl<T> EventSubscription<T> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next pending event, if any. Never blocks.
    pub fn try_next(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Drain everything currently queued, in emission order.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }
}
