use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::SequenceState;
use crate::message::ResponsePayload;

/// One displayed chat bubble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentRecord {
    pub id: String,
    pub text: String,
    pub companion_id: String,
    pub user_id: String,
    pub conversation_id: Option<String>,
    pub is_bot: bool,
    pub created_at: DateTime<Utc>,
    pub fragment_index: usize,
    pub total_fragments: usize,
    pub sequence_id: String,
    pub base_message_id: String,
    /// Shown by forced completion instead of after its typing delay.
    pub forced: bool,
    pub show_avatar: bool,
    pub scroll_delay_ms: u64,
}

/// The paced delivery of one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentSequence {
    pub id: String,
    pub fragments: Vec<String>,
    pub original_payload: ResponsePayload,
    pub current_index: usize,
    pub state: SequenceState,
    pub displayed_fragments: Vec<FragmentRecord>,
    pub start_time: DateTime<Utc>,
}

impl FragmentSequence {
    pub(crate) fn new(id: String, payload: ResponsePayload, fragments: Vec<String>) -> Self {
        Self {
            id,
            fragments,
            original_payload: payload,
            current_index: 0,
            state: SequenceState::Idle,
            displayed_fragments: Vec::new(),
            start_time: Utc::now(),
        }
    }

    pub fn total(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_complete(&self) -> bool {
        self.current_index == self.fragments.len()
    }

    pub fn current_fragment(&self) -> Option<&str> {
        self.fragments.get(self.current_index).map(String::as_str)
    }

    pub fn remaining(&self) -> usize {
        self.fragments.len() - self.current_index
    }

    /// Id of the message the fragments belong to.
    pub fn base_message_id(&self) -> &str {
        self.original_payload.id.as_deref().unwrap_or(&self.id)
    }

    pub fn summary(&self) -> SequenceSummary {
        SequenceSummary {
            id: self.id.clone(),
            fragments_shown: self.current_index,
            total: self.fragments.len(),
            state: self.state,
        }
    }
}

/// Debug view of a running sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSummary {
    pub id: String,
    pub fragments_shown: usize,
    pub total: usize,
    pub state: SequenceState,
}

impl fmt::Display for SequenceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.fragments_shown, self.total, self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(fragments: &[&str]) -> FragmentSequence {
        FragmentSequence::new(
            "seq-1".to_string(),
            ResponsePayload::new("ignored", "companion", "user"),
            fragments.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn empty_sequence_is_complete() {
        let seq = sequence(&[]);
        assert!(seq.is_complete());
        assert_eq!(seq.current_fragment(), None);
    }

    #[test]
    fn base_message_id_falls_back_to_sequence_id() {
        let mut seq = sequence(&["a"]);
        assert_eq!(seq.base_message_id(), "seq-1");
        seq.original_payload.id = Some("msg-1".to_string());
        assert_eq!(seq.base_message_id(), "msg-1");
    }

    #[test]
    fn summary_display() {
        let mut seq = sequence(&["a", "b", "c"]);
        seq.current_index = 1;
        seq.state = SequenceState::Displaying;
        assert_eq!(seq.summary().to_string(), "1/3 (displaying)");
        assert_eq!(seq.remaining(), 2);
        assert_eq!(seq.current_fragment(), Some("b"));
    }
}
