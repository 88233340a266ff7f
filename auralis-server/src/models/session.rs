use serde::{Deserialize, Serialize};

/// Lifecycle of one stream session. Every terminal state releases the
/// session's concurrency permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Init,
    Streaming,
    Paused,
    Ended,
    Aborted,
    Errored,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Ended | SessionState::Aborted | SessionState::Errored)
    }
}

/// Per-active-stream state. Owned exclusively by the one driver task running
/// the session; every other actor reaches it only through the session's
/// control inbox (see `stream::controller`).
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub track_id: u32,
    pub preset: String,
    pub intensity: f32,
    pub sample_rate: u32,
    pub channels: u16,
    pub next_chunk_index: u64,
    pub state: SessionState,
}

impl SessionInfo {
    pub fn new(track_id: u32, preset: String, intensity: f32, sample_rate: u32, channels: u16) -> Self {
        Self {
            track_id,
            preset,
            intensity,
            sample_rate,
            channels,
            next_chunk_index: 0,
            state: SessionState::Init,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ended_aborted_errored_are_terminal() {
        assert!(!SessionState::Streaming.is_terminal());
        assert!(!SessionState::Paused.is_terminal());
        assert!(SessionState::Ended.is_terminal());
        assert!(SessionState::Aborted.is_terminal());
        assert!(SessionState::Errored.is_terminal());
    }
}
