//! Sequence states and the transitions between them.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of one fragment sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SequenceState {
    /// Registered, nothing shown yet.
    #[default]
    Idle,
    /// Typing indicator visible for the current fragment.
    DisplayingWithTyping,
    /// A fragment was just shown; waiting out the gap before the next one.
    Displaying,
    Completed,
    /// Cancelled before completion.
    Error,
}

impl SequenceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::DisplayingWithTyping => "displaying_with_typing",
            Self::Displaying => "displaying",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SequenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What drives a sequence from one state to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceTrigger {
    /// Typing indicator shown for the next fragment.
    BeginTyping,
    /// Current fragment shown, either after its delay or forced.
    Reveal,
    /// Every fragment has been shown.
    Finish,
    Cancel,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("Invalid transition from {from} with trigger {trigger:?}")]
    InvalidTransition {
        from: SequenceState,
        trigger: SequenceTrigger,
    },

    #[error("Sequence is in terminal state: {0}")]
    TerminalState(SequenceState),
}

/// Compute the state reached from `state` on `trigger`.
pub fn next_state(
    state: SequenceState,
    trigger: SequenceTrigger,
) -> Result<SequenceState, TransitionError> {
    use SequenceState::*;
    use SequenceTrigger::*;

    if state.is_terminal() {
        return Err(TransitionError::TerminalState(state));
    }

    match (state, trigger) {
        (Idle, BeginTyping) | (Displaying, BeginTyping) => Ok(DisplayingWithTyping),
        (DisplayingWithTyping, Reveal) | (Displaying, Reveal) => Ok(Displaying),
        // An empty sequence finishes straight from idle.
        (Idle, Finish) | (Displaying, Finish) => Ok(Completed),
        (_, Cancel) => Ok(Error),
        (from, trigger) => Err(TransitionError::InvalidTransition { from, trigger }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_flow() {
        let mut state = SequenceState::default();
        for trigger in [
            SequenceTrigger::BeginTyping,
            SequenceTrigger::Reveal,
            SequenceTrigger::BeginTyping,
            SequenceTrigger::Reveal,
            SequenceTrigger::Finish,
        ] {
            state = next_state(state, trigger).expect("valid transition");
        }
        assert_eq!(state, SequenceState::Completed);
    }

    #[test]
    fn test_forced_reveals_chain_from_displaying() {
        let state = next_state(SequenceState::Displaying, SequenceTrigger::Reveal).unwrap();
        assert_eq!(state, SequenceState::Displaying);
    }

    #[test]
    fn test_cancel_from_any_live_state() {
        for state in [
            SequenceState::Idle,
            SequenceState::DisplayingWithTyping,
            SequenceState::Displaying,
        ] {
            assert_eq!(
                next_state(state, SequenceTrigger::Cancel),
                Ok(SequenceState::Error)
            );
        }
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for state in [SequenceState::Completed, SequenceState::Error] {
            assert_eq!(
                next_state(state, SequenceTrigger::Cancel),
                Err(TransitionError::TerminalState(state))
            );
        }
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(next_state(SequenceState::DisplayingWithTyping, SequenceTrigger::Finish).is_err());
        assert!(next_state(SequenceState::Idle, SequenceTrigger::Reveal).is_err());
        assert!(next_state(
            SequenceState::DisplayingWithTyping,
            SequenceTrigger::BeginTyping
        )
        .is_err());
    }
}
