//! chat_pacing - human-paced delivery of chat responses
//!
//! Splits a finished response into fragments, schedules them with typing
//! delays, and broadcasts lifecycle events for a UI to render as typing
//! indicators and chat bubbles. A priority queue in front of the sequencer
//! keeps outbound messages strictly one at a time.

pub mod config;
pub mod error;
pub mod fragmenter;
pub mod message;
pub mod pacer;
pub mod queue;
pub mod random;
pub mod sequencer;
pub mod timing;

// Re-export commonly used types
pub use config::{FragmenterConfig, PacingConfig, QueueConfig, SequencerConfig, TimingConfig};
pub use error::{PacingError, Result};
pub use fragmenter::Fragmenter;
pub use message::{MessageKind, Priority, QueuedItem, ResponsePayload};
pub use pacer::ResponsePacer;
pub use queue::{DeliveryQueue, ItemProcessor};
pub use random::{shared, EntropyRandom, FixedRandom, RandomSource, SeededRandom, SharedRandom};
pub use sequencer::{
    wait_for_completion, EventBus, FragmentEvent, FragmentRecord, FragmentSequence,
    FragmentSequencer, SequenceState, SequenceSummary,
};
pub use timing::{pacing_style, PacingStyle, TimingModel};
