//! Lifecycle events and the broadcast bus that carries them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

use super::sequence::{FragmentRecord, FragmentSequence};
use crate::error::{PacingError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FragmentEvent {
    SequenceStarted {
        sequence: FragmentSequence,
    },
    TypingStarted {
        sequence: FragmentSequence,
        fragment_index: usize,
        delay_ms: u64,
    },
    FragmentDisplayed {
        record: FragmentRecord,
    },
    SequenceCompleted {
        sequence: FragmentSequence,
    },
    SequenceCancelled {
        sequence: FragmentSequence,
    },
}

impl FragmentEvent {
    pub fn sequence_id(&self) -> &str {
        match self {
            Self::SequenceStarted { sequence }
            | Self::TypingStarted { sequence, .. }
            | Self::SequenceCompleted { sequence }
            | Self::SequenceCancelled { sequence } => &sequence.id,
            Self::FragmentDisplayed { record } => &record.sequence_id,
        }
    }

    /// Completed or cancelled; nothing follows for this sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::SequenceCompleted { .. } | Self::SequenceCancelled { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SequenceStarted { .. } => "sequence_started",
            Self::TypingStarted { .. } => "typing_started",
            Self::FragmentDisplayed { .. } => "fragment_displayed",
            Self::SequenceCompleted { .. } => "sequence_completed",
            Self::SequenceCancelled { .. } => "sequence_cancelled",
        }
    }
}

/// Broadcast channel for [`FragmentEvent`]s.
///
/// Subscribers only see events sent after they subscribed. A subscriber that
/// falls more than `capacity` events behind observes a lag error and skips
/// ahead. Events sent while nobody listens are counted and dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FragmentEvent>,
    undelivered: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            undelivered: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FragmentEvent> {
        self.tx.subscribe()
    }

    /// Fire-and-forget send.
    pub fn emit(&self, event: FragmentEvent) {
        if self.tx.send(event).is_err() {
            self.undelivered.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Events emitted while there were no subscribers.
    pub fn undelivered_count(&self) -> u64 {
        self.undelivered.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Wait on `receiver` until `sequence_id` completes or is cancelled.
///
/// Returns the terminal event. Fails with `UnknownSequence` if the bus closes first.
pub async fn wait_for_completion(
    receiver: &mut broadcast::Receiver<FragmentEvent>,
    sequence_id: &str,
) -> Result<FragmentEvent> {
    loop {
        match receiver.recv().await {
            Ok(event) if event.is_terminal() && event.sequence_id() == sequence_id => {
                return Ok(event);
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(
                    "Event subscriber lagged by {} events while waiting for {}",
                    skipped, sequence_id
                );
            }
            Err(broadcast::error::RecvError::Closed) => {
                return Err(PacingError::UnknownSequence(sequence_id.to_string()));
            }
        }
    }
}
