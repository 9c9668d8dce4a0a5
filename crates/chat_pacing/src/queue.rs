//! Delivery queue - priority-tiered, strictly sequential hand-off of outbound messages.
//!
//! Urgent and high priority items share the top tier, then normal, then low;
//! each tier is FIFO. A single drain task hands items to the processor one at
//! a time and waits the configured spacing between them. A failing or
//! panicking processor is logged and skipped so one bad item cannot wedge the
//! queue. There is no timeout: a processor that never returns stalls the drain.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::config::QueueConfig;
use crate::error::PacingError;
use crate::message::{Priority, QueuedItem};

/// Downstream consumer of dequeued items.
#[async_trait]
pub trait ItemProcessor: Send + Sync + 'static {
    async fn process(&self, item: QueuedItem) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> ItemProcessor for F
where
    F: Fn(QueuedItem) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn process(&self, item: QueuedItem) -> anyhow::Result<()> {
        (self)(item).await
    }
}

#[derive(Default)]
struct Tiers {
    high: VecDeque<QueuedItem>,
    normal: VecDeque<QueuedItem>,
    low: VecDeque<QueuedItem>,
}

impl Tiers {
    fn push(&mut self, item: QueuedItem) {
        match item.priority {
            Priority::Urgent | Priority::High => self.high.push_back(item),
            Priority::Normal => self.normal.push_back(item),
            Priority::Low => self.low.push_back(item),
        }
    }

    fn pop(&mut self) -> Option<QueuedItem> {
        self.high
            .pop_front()
            .or_else(|| self.normal.pop_front())
            .or_else(|| self.low.pop_front())
    }

    fn len(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }

    fn clear(&mut self) {
        self.high.clear();
        self.normal.clear();
        self.low.clear();
    }
}

struct QueueInner {
    tiers: Mutex<Tiers>,
    draining: AtomicBool,
    processor: Arc<dyn ItemProcessor>,
    spacing: Duration,
    idle: Notify,
    processed: AtomicU64,
    failed: AtomicU64,
}

#[derive(Clone)]
pub struct DeliveryQueue {
    inner: Arc<QueueInner>,
}

impl DeliveryQueue {
    pub fn new(config: QueueConfig, processor: impl ItemProcessor) -> Self {
        Self::with_processor(config, Arc::new(processor))
    }

    pub fn with_processor(config: QueueConfig, processor: Arc<dyn ItemProcessor>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                tiers: Mutex::new(Tiers::default()),
                draining: AtomicBool::new(false),
                processor,
                spacing: Duration::from_millis(config.item_spacing_ms),
                idle: Notify::new(),
                processed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        }
    }

    /// Add an item and make sure the drain loop is running.
    ///
    /// Never blocks. Must be called from within a tokio runtime.
    pub fn enqueue(&self, item: QueuedItem) {
        debug!(
            "Enqueued {} ({:?}, {:?})",
            item.id, item.kind, item.priority
        );
        self.inner.lock_tiers().push(item);
        self.inner.start_drain();
    }

    /// Drop every pending item. An item already handed to the processor is unaffected.
    pub fn clear(&self) -> usize {
        let mut tiers = self.inner.lock_tiers();
        let dropped = tiers.len();
        tiers.clear();
        if dropped > 0 {
            debug!("Cleared {} pending items", dropped);
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.inner.lock_tiers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::SeqCst)
    }

    /// Items handed to the processor, including failed ones.
    pub fn processed_count(&self) -> u64 {
        self.inner.processed.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> u64 {
        self.inner.failed.load(Ordering::Relaxed)
    }

    /// Resolve once the queue is empty and the drain loop has stopped.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if !self.is_draining() && self.is_empty() {
                return;
            }
            notified.await;
        }
    }
}

impl QueueInner {
    fn lock_tiers(&self) -> MutexGuard<'_, Tiers> {
        self.tiers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn start_drain(self: &Arc<Self>) {
        if self.draining.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.drain().await });
    }

    async fn drain(self: Arc<Self>) {
        debug!("Drain started");
        loop {
            let next = self.lock_tiers().pop();
            let Some(item) = next else {
                self.draining.store(false, Ordering::SeqCst);
                // An enqueue may have slipped in between the pop and the store.
                if self.lock_tiers().len() > 0 && !self.draining.swap(true, Ordering::SeqCst) {
                    continue;
                }
                debug!("Drain finished");
                self.idle.notify_waiters();
                return;
            };

            let item_id = item.id.clone();
            let processor = Arc::clone(&self.processor);
            let outcome = tokio::spawn(async move { processor.process(item).await }).await;
            self.processed.fetch_add(1, Ordering::Relaxed);

            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(join_error) => Some(format!("processor panicked: {}", join_error)),
            };
            if let Some(message) = failure {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!("{}", PacingError::ProcessingFailure { item_id, message });
            } else {
                debug!("Processed {}", item_id);
            }

            tokio::time::sleep(self.spacing).await;
        }
    }
}
