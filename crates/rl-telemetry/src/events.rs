//! Stream lifecycle events and the best-effort sink they are emitted on.

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use rl_types::{RecordId, RiskLevel};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Discriminant for the kind of stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamEventKind {
    /// A connection attempt is starting. `attempt` counts from 1.
    ConnectAttempt { attempt: u64 },
    /// The subscription is established.
    Connected { attempt: u64 },
    /// The attempt failed before a subscription existed.
    ConnectFailed { attempt: u64, error: String },
    /// An established subscription closed.
    Disconnected { reason: String },
    /// A valid envelope was buffered.
    RecordBuffered {
        id: RecordId,
        level: RiskLevel,
        evicted: Option<RecordId>,
    },
    /// An inbound message was dropped.
    EnvelopeDiscarded { reason: String },
    /// The consumer was torn down.
    Stopped,
}

/// A single timestamped event emitted by the stream consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: StreamEventKind,
}

impl StreamEvent {
    pub fn new(kind: StreamEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Optional channel that receives [`StreamEvent`]s. Every event is also
/// logged, so a sink without a channel still leaves a trace.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<Sender<StreamEvent>>,
}

impl EventSink {
    pub fn new(tx: Sender<StreamEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, kind: StreamEventKind) {
        match &kind {
            StreamEventKind::ConnectAttempt { attempt } => {
                debug!(attempt, "stream connect attempt")
            }
            StreamEventKind::Connected { attempt } => info!(attempt, "stream connected"),
            StreamEventKind::ConnectFailed { attempt, error } => {
                warn!(attempt, %error, "stream connect failed")
            }
            StreamEventKind::Disconnected { reason } => info!(%reason, "stream disconnected"),
            StreamEventKind::RecordBuffered { id, level, .. } => {
                debug!(%id, %level, "telemetry record buffered")
            }
            StreamEventKind::EnvelopeDiscarded { reason } => {
                debug!(%reason, "envelope discarded")
            }
            StreamEventKind::Stopped => info!("stream consumer stopped"),
        }

        // Best-effort send; a dropped receiver is not an error.
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(StreamEvent::new(kind));
        }
    }
}
