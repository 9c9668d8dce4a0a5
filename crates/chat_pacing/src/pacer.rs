//! Response pacer - fragmenter and sequencer wired together.

use async_trait::async_trait;
use tracing::debug;

use crate::config::PacingConfig;
use crate::error::Result;
use crate::fragmenter::Fragmenter;
use crate::message::{MessageKind, QueuedItem, ResponsePayload};
use crate::queue::ItemProcessor;
use crate::random::{shared, EntropyRandom, SeededRandom, SharedRandom};
use crate::sequencer::{wait_for_completion, FragmentEvent, FragmentSequencer};
use crate::timing::TimingModel;

/// Splits responses and plays them through a [`FragmentSequencer`].
///
/// As an [`ItemProcessor`] it delivers each dequeued item and only returns
/// once that item's sequence has finished, so a [`crate::DeliveryQueue`] in
/// front of it never overlaps two responses.
#[derive(Clone)]
pub struct ResponsePacer {
    fragmenter: Fragmenter,
    sequencer: FragmentSequencer,
    rng: SharedRandom,
}

impl ResponsePacer {
    /// Build from config; a configured seed makes every run identical.
    pub fn new(config: &PacingConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => shared(SeededRandom::new(seed)),
            None => shared(EntropyRandom::new()),
        };
        Self::with_random(config, rng)
    }

    pub fn with_random(config: &PacingConfig, rng: SharedRandom) -> Self {
        let sequencer = FragmentSequencer::new(
            config.sequencer.clone(),
            TimingModel::new(config.timing.clone()),
            rng.clone(),
        );
        Self {
            fragmenter: Fragmenter::new(config.fragmenter.clone()),
            sequencer,
            rng,
        }
    }

    pub fn sequencer(&self) -> &FragmentSequencer {
        &self.sequencer
    }

    pub fn fragment(&self, response: &str) -> Vec<String> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.fragmenter.fragment(response, rng.as_mut())
    }

    /// Fragment the payload content and start its sequence.
    pub fn deliver(&self, payload: ResponsePayload) -> Result<String> {
        let fragments = self.fragment(&payload.content);
        self.sequencer.start(payload, fragments)
    }

    /// Deliver and wait for the sequence to complete or be cancelled.
    pub async fn deliver_and_wait(&self, payload: ResponsePayload) -> Result<FragmentEvent> {
        let mut events = self.sequencer.subscribe();
        let sequence_id = self.deliver(payload)?;
        wait_for_completion(&mut events, &sequence_id).await
    }

    fn fragments_for(&self, item: &QueuedItem) -> Vec<String> {
        match item.kind {
            MessageKind::Fragment => self.fragment(&item.payload.content),
            MessageKind::User | MessageKind::System | MessageKind::Notification => {
                let text = item.payload.content.trim();
                if text.is_empty() {
                    Vec::new()
                } else {
                    vec![text.to_string()]
                }
            }
        }
    }
}

#[async_trait]
impl ItemProcessor for ResponsePacer {
    async fn process(&self, item: QueuedItem) -> anyhow::Result<()> {
        let fragments = self.fragments_for(&item);
        let mut payload = item.payload;
        if payload.id.is_none() {
            payload.id = Some(item.id.clone());
        }

        let mut events = self.sequencer.subscribe();
        let sequence_id = self.sequencer.start(payload, fragments)?;
        let terminal = wait_for_completion(&mut events, &sequence_id).await?;
        debug!("Item {} delivered: {}", item.id, terminal.name());
        Ok(())
    }
}
