use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatMode {
    Off,
    Track,
    Queue,
}

/// Pre-loaded audio for the track the queue predicts will play next, kept
/// ready so the handoff at end-of-track has zero perceptible gap. Only
/// usable if it still matches the queue's current prediction at the moment
/// of handoff — see `player::actor`.
#[derive(Debug, Clone)]
pub struct GaplessPrebuffer {
    pub next_track_id: u32,
    pub next_filepath: String,
    pub audio_data: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

/// A snapshot of player state safe to hand to callbacks or serialize to a
/// client; never holds the lock itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStateSnapshot {
    pub current_track_id: Option<u32>,
    pub position_samples: u64,
    pub is_playing: bool,
    pub volume: f32,
    pub shuffle: bool,
    pub repeat_mode: RepeatMode,
    pub queue: Vec<u32>,
    pub current_index: Option<usize>,
}
