//! Fragment sequencer - drives fragment sequences through their display states.
//!
//! Each active sequence owns at most one pending timer. Scheduling a new timer
//! aborts the previous one and bumps the sequence's timer generation; a timer
//! task that wakes with a stale generation does nothing. All events for a
//! sequence are emitted while the active-sequence map is locked, which keeps
//! them in order on the shared bus.

mod events;
mod sequence;
mod state;

pub use events::{wait_for_completion, EventBus, FragmentEvent};
pub use sequence::{FragmentRecord, FragmentSequence, SequenceSummary};
pub use state::{next_state, SequenceState, SequenceTrigger, TransitionError};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SequencerConfig;
use crate::error::{PacingError, Result};
use crate::message::ResponsePayload;
use crate::random::{RandomSource, SharedRandom};
use crate::timing::TimingModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    /// Typing delay elapsed; show the current fragment.
    Typing,
    /// Gap after a shown fragment elapsed; start typing the next one.
    Gap,
}

struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct ActiveSequence {
    sequence: FragmentSequence,
    timer: Option<PendingTimer>,
    generation: u64,
}

impl ActiveSequence {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
        }
        // Any task still in flight now carries a stale generation.
        self.generation += 1;
    }
}

struct SequencerInner {
    sequences: Mutex<HashMap<String, ActiveSequence>>,
    events: EventBus,
    timing: TimingModel,
    rng: SharedRandom,
    inter_fragment_gap: Duration,
}

/// Runs fragment sequences on the tokio runtime.
///
/// Cloning is cheap; clones share the same active set and event bus.
/// `start` spawns timer tasks and therefore must be called from within a
/// tokio runtime.
#[derive(Clone)]
pub struct FragmentSequencer {
    inner: Arc<SequencerInner>,
}

impl FragmentSequencer {
    pub fn new(config: SequencerConfig, timing: TimingModel, rng: SharedRandom) -> Self {
        Self {
            inner: Arc::new(SequencerInner {
                sequences: Mutex::new(HashMap::new()),
                events: EventBus::new(config.event_capacity),
                timing,
                rng,
                inter_fragment_gap: Duration::from_millis(config.inter_fragment_gap_ms),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FragmentEvent> {
        self.inner.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Register a sequence and start typing its first fragment.
    ///
    /// The sequence id is the payload id when present, otherwise a new UUID.
    /// An empty fragment list completes immediately. Blank fragments or an id
    /// that is already active are rejected before anything is registered.
    pub fn start(&self, payload: ResponsePayload, fragments: Vec<String>) -> Result<String> {
        if let Some(index) = fragments.iter().position(|f| f.trim().is_empty()) {
            return Err(PacingError::InvalidInput(format!(
                "fragment {} is empty",
                index
            )));
        }

        let id = payload
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut sequences = self.inner.lock_sequences();
        if sequences.contains_key(&id) {
            return Err(PacingError::InvalidInput(format!(
                "sequence {} is already active",
                id
            )));
        }

        let sequence = FragmentSequence::new(id.clone(), payload, fragments);
        info!(
            "Sequence {} started with {} fragments",
            id,
            sequence.total()
        );
        self.inner.events.emit(FragmentEvent::SequenceStarted {
            sequence: sequence.clone(),
        });

        let mut active = ActiveSequence {
            sequence,
            timer: None,
            generation: 0,
        };

        if active.sequence.is_complete() {
            self.inner.finish(&mut active);
            return Ok(id);
        }

        self.inner.begin_typing(&mut active);
        sequences.insert(id.clone(), active);
        Ok(id)
    }

    /// Cancel a running sequence. Returns false for unknown or finished ids.
    pub fn cancel(&self, sequence_id: &str) -> bool {
        let mut sequences = self.inner.lock_sequences();
        let Some(mut active) = sequences.remove(sequence_id) else {
            debug!("Cancel ignored for unknown sequence {}", sequence_id);
            return false;
        };

        active.cancel_timer();
        self.inner.transition(&mut active, SequenceTrigger::Cancel);
        info!(
            "Sequence {} cancelled at {}",
            sequence_id,
            active.sequence.summary()
        );
        self.inner.events.emit(FragmentEvent::SequenceCancelled {
            sequence: active.sequence,
        });
        true
    }

    /// Show every remaining fragment of a sequence immediately and complete it.
    ///
    /// Returns false for unknown or finished ids.
    pub fn force_complete(&self, sequence_id: &str) -> bool {
        let mut sequences = self.inner.lock_sequences();
        let Some(mut active) = sequences.remove(sequence_id) else {
            debug!("Force completion ignored for unknown sequence {}", sequence_id);
            return false;
        };
        self.inner.flush(&mut active);
        true
    }

    /// Force-complete every active sequence. Returns how many were flushed.
    pub fn force_complete_all(&self) -> usize {
        let mut sequences = self.inner.lock_sequences();
        let mut ids: Vec<String> = sequences.keys().cloned().collect();
        ids.sort();
        for id in &ids {
            if let Some(mut active) = sequences.remove(id) {
                self.inner.flush(&mut active);
            }
        }
        ids.len()
    }

    pub fn active_sequence_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.lock_sequences().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn has_active_sequences(&self) -> bool {
        !self.inner.lock_sequences().is_empty()
    }

    pub fn summary(&self, sequence_id: &str) -> Option<SequenceSummary> {
        self.inner
            .lock_sequences()
            .get(sequence_id)
            .map(|active| active.sequence.summary())
    }

    pub fn summaries(&self) -> Vec<SequenceSummary> {
        let mut summaries: Vec<SequenceSummary> = self
            .inner
            .lock_sequences()
            .values()
            .map(|active| active.sequence.summary())
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }
}

impl SequencerInner {
    fn lock_sequences(&self) -> MutexGuard<'_, HashMap<String, ActiveSequence>> {
        self.sequences
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut dyn RandomSource) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(rng.as_mut())
    }

    fn transition(&self, active: &mut ActiveSequence, trigger: SequenceTrigger) {
        let from = active.sequence.state;
        match next_state(from, trigger) {
            Ok(to) => {
                debug!(
                    "Sequence {}: {} -> {} ({:?})",
                    active.sequence.id, from, to, trigger
                );
                active.sequence.state = to;
            }
            // Callers only fire triggers valid for the current state.
            Err(e) => debug!("Sequence {}: {}", active.sequence.id, e),
        }
    }

    fn begin_typing(self: &Arc<Self>, active: &mut ActiveSequence) {
        let index = active.sequence.current_index;
        let Some(fragment) = active.sequence.current_fragment() else {
            return;
        };
        let delay_ms = self.with_rng(|rng| self.timing.typing_delay(fragment, index, rng));

        self.transition(active, SequenceTrigger::BeginTyping);
        self.events.emit(FragmentEvent::TypingStarted {
            sequence: active.sequence.clone(),
            fragment_index: index,
            delay_ms,
        });
        self.schedule(active, TimerKind::Typing, Duration::from_millis(delay_ms));
    }

    fn schedule(self: &Arc<Self>, active: &mut ActiveSequence, kind: TimerKind, delay: Duration) {
        active.cancel_timer();
        let generation = active.generation;
        let sequence_id = active.sequence.id.clone();
        let inner: Weak<Self> = Arc::downgrade(self);

        debug!(
            "Sequence {}: {:?} timer in {:?} (generation {})",
            sequence_id, kind, delay, generation
        );
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                inner.on_timer(&sequence_id, generation, kind);
            }
        });
        active.timer = Some(PendingTimer { generation, handle });
    }

    fn on_timer(self: &Arc<Self>, sequence_id: &str, generation: u64, kind: TimerKind) {
        let mut sequences = self.lock_sequences();
        let Some(active) = sequences.get_mut(sequence_id) else {
            return;
        };
        if active.timer.as_ref().map(|t| t.generation) != Some(generation) {
            debug!("Sequence {}: stale {:?} timer ignored", sequence_id, kind);
            return;
        }
        active.timer = None;

        match kind {
            TimerKind::Gap => self.begin_typing(active),
            TimerKind::Typing => {
                self.reveal(active, false);
                if active.sequence.is_complete() {
                    if let Some(mut finished) = sequences.remove(sequence_id) {
                        self.finish(&mut finished);
                    }
                } else {
                    self.schedule(active, TimerKind::Gap, self.inter_fragment_gap);
                }
            }
        }
    }

    /// Show the current fragment and advance.
    fn reveal(&self, active: &mut ActiveSequence, forced: bool) {
        let sequence = &active.sequence;
        let index = sequence.current_index;
        let Some(text) = sequence.current_fragment() else {
            return;
        };
        let total = sequence.total();

        let (show_avatar, scroll_delay_ms) = self.with_rng(|rng| {
            (
                self.timing.should_show_avatar(index, total, rng),
                self.timing.scroll_delay(index, rng),
            )
        });

        let payload = &sequence.original_payload;
        let record = FragmentRecord {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            companion_id: payload.companion_id.clone(),
            user_id: payload.user_id.clone(),
            conversation_id: payload.conversation_id.clone(),
            is_bot: true,
            created_at: Utc::now(),
            fragment_index: index,
            total_fragments: total,
            sequence_id: sequence.id.clone(),
            base_message_id: sequence.base_message_id().to_string(),
            forced,
            show_avatar,
            scroll_delay_ms,
        };

        self.transition(active, SequenceTrigger::Reveal);
        active.sequence.displayed_fragments.push(record.clone());
        active.sequence.current_index += 1;
        self.events.emit(FragmentEvent::FragmentDisplayed { record });
    }

    /// Drop the pending timer, show what is left without delay, then complete.
    fn flush(&self, active: &mut ActiveSequence) {
        active.cancel_timer();
        let remaining = active.sequence.remaining();
        while !active.sequence.is_complete() {
            self.reveal(active, true);
        }
        debug!(
            "Sequence {}: force-completed {} fragments",
            active.sequence.id, remaining
        );
        self.finish(active);
    }

    fn finish(&self, active: &mut ActiveSequence) {
        self.transition(active, SequenceTrigger::Finish);
        info!(
            "Sequence {} completed ({} fragments)",
            active.sequence.id,
            active.sequence.total()
        );
        self.events.emit(FragmentEvent::SequenceCompleted {
            sequence: active.sequence.clone(),
        });
    }
}

impl Drop for SequencerInner {
    fn drop(&mut self) {
        let sequences = self
            .sequences
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for active in sequences.values_mut() {
            active.cancel_timer();
        }
    }
}
