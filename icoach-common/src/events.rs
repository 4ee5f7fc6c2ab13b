//! Event types for the icoach event system
//!
//! Evaluation progress is broadcast over a [`tokio::sync::broadcast`] channel
//! so that a presentation layer (SSE clients) can follow the evaluation state
//! machine without polling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Phase of a single session evaluation
///
/// `Pending → Extracting → PrimaryAttempt → {Succeeded | FallbackAttempt}`,
/// `FallbackAttempt → {Succeeded | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationPhase {
    Pending,
    Extracting,
    PrimaryAttempt,
    FallbackAttempt,
    Succeeded,
    Failed,
}

impl EvaluationPhase {
    /// True for phases no further transition leaves
    pub fn is_terminal(&self) -> bool {
        matches!(self, EvaluationPhase::Succeeded | EvaluationPhase::Failed)
    }
}

/// icoach event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EvaluationEvent {
    /// An evaluation moved to a new phase
    PhaseChanged {
        evaluation_id: Uuid,
        phase: EvaluationPhase,
        timestamp: DateTime<Utc>,
    },

    /// A provider call failed and will be retried after `delay_ms`
    RetryScheduled {
        label: String,
        attempt: u32,
        delay_ms: u64,
        classification: String,
        timestamp: DateTime<Utc>,
    },

    /// An evaluation produced a result
    EvaluationCompleted {
        evaluation_id: Uuid,
        overall_score: u8,
        model: String,
        timestamp: DateTime<Utc>,
    },

    /// An evaluation failed; `tag` is the stable error tag when one applies
    EvaluationFailed {
        evaluation_id: Uuid,
        tag: Option<String>,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl EvaluationEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            EvaluationEvent::PhaseChanged { .. } => "PhaseChanged",
            EvaluationEvent::RetryScheduled { .. } => "RetryScheduled",
            EvaluationEvent::EvaluationCompleted { .. } => "EvaluationCompleted",
            EvaluationEvent::EvaluationFailed { .. } => "EvaluationFailed",
        }
    }

    pub fn phase_changed(evaluation_id: Uuid, phase: EvaluationPhase) -> Self {
        EvaluationEvent::PhaseChanged {
            evaluation_id,
            phase,
            timestamp: Utc::now(),
        }
    }
}

/// Broadcast bus for [`EvaluationEvent`]s
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EvaluationEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before slow receivers
    /// start losing the oldest ones.
    ///
    /// ```
    /// use icoach_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<EvaluationEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: EvaluationEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
