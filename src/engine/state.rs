use serde::{Deserialize, Serialize};

/// Recording session states.
///
/// One recorder instance owns exactly one active episode at a time; the
/// state machine makes invalid call orderings fail fast instead of
/// corrupting the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderState {
    /// No active episode
    Idle,
    /// An episode exists but the sampling loop is not running
    EpisodeActive,
    /// The sampling loop is filling the active episode
    Recording,
}

impl RecorderState {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: RecorderState) -> bool {
        use RecorderState::*;

        matches!(
            (self, target),
            // start_episode
            (Idle, EpisodeActive) |

            // start_recording
            (EpisodeActive, Recording) |

            // stop_recording
            (Recording, EpisodeActive) |

            // end_episode
            (EpisodeActive, Idle)
        )
    }

    /// Get human-readable state name
    pub fn name(&self) -> &str {
        match self {
            Self::Idle => "Idle",
            Self::EpisodeActive => "EpisodeActive",
            Self::Recording => "Recording",
        }
    }
}

impl Default for RecorderState {
    fn default() -> Self {
        Self::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cycle() {
        use RecorderState::*;
        assert!(Idle.can_transition_to(EpisodeActive));
        assert!(EpisodeActive.can_transition_to(Recording));
        assert!(Recording.can_transition_to(EpisodeActive));
        assert!(EpisodeActive.can_transition_to(Idle));
    }

    #[test]
    fn test_invalid_transitions() {
        use RecorderState::*;
        // No concurrent episodes, no finalize while recording
        assert!(!Idle.can_transition_to(Recording));
        assert!(!Recording.can_transition_to(Idle));
        assert!(!EpisodeActive.can_transition_to(EpisodeActive));
    }
}
