/// Single owner of playback state: current track, position, volume, queue,
/// and the gapless prebuffer. One `PlayerActor` per server process, shared
/// behind an `Arc`; every mutation happens under its one lock so a queue
/// change and the prebuffer it might invalidate are always consistent with
/// each other.
use crate::models::player_state::{GaplessPrebuffer, PlayerStateSnapshot, RepeatMode};
use crate::player::queue::Queue;
use crate::repository::TracksRepo;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

struct State {
    current_track_id: Option<u32>,
    position_samples: u64,
    is_playing: bool,
    volume: f32,
    queue: Queue,
    prebuffer: Option<GaplessPrebuffer>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            current_track_id: None,
            position_samples: 0,
            is_playing: false,
            volume: 1.0,
            queue: Queue::default(),
            prebuffer: None,
        }
    }
}

/// What the caller should do after a track finishes, decided with the lock
/// held so the decision and the state change it implies are atomic.
pub enum EndOfTrackAction {
    /// The prebuffer matched the predicted next track: hand its already
    /// decoded audio straight to the stream, no disk read.
    UseGaplessPrebuffer(GaplessPrebuffer),
    /// No usable prebuffer (none prepared, or it no longer matches what the
    /// queue predicts next because of an intervening mutation): load the
    /// track normally.
    LoadNormally(u32),
    /// Nothing left to play.
    QueueEnded,
}

pub struct PlayerActor {
    state: Mutex<State>,
    /// Guards the end-of-track handoff against being entered twice
    /// concurrently (e.g. a client-driven `next` racing the stream's own
    /// natural end-of-track signal). Only the thread that wins the
    /// compare-exchange performs the advance.
    auto_advancing: AtomicBool,
}

impl Default for PlayerActor {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerActor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            auto_advancing: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> PlayerStateSnapshot {
        let s = self.state.lock();
        PlayerStateSnapshot {
            current_track_id: s.current_track_id,
            position_samples: s.position_samples,
            is_playing: s.is_playing,
            volume: s.volume,
            shuffle: s.queue.shuffle,
            repeat_mode: s.queue.repeat_mode,
            queue: s.queue.tracks.clone(),
            current_index: s.queue.current_index,
        }
    }

    pub fn play(&self, track_id: u32) {
        let mut s = self.state.lock();
        s.current_track_id = Some(track_id);
        s.position_samples = 0;
        s.is_playing = true;
        // A direct (non-queue-advance) play invalidates any in-flight
        // prebuffer; it was prepared for the old predicted-next track.
        s.prebuffer = None;
    }

    pub fn pause(&self) {
        self.state.lock().is_playing = false;
    }

    pub fn resume(&self) {
        self.state.lock().is_playing = true;
    }

    pub fn seek(&self, position_samples: u64) {
        self.state.lock().position_samples = position_samples;
    }

    pub fn report_position(&self, position_samples: u64) {
        self.state.lock().position_samples = position_samples;
    }

    pub fn set_volume(&self, volume: f32) {
        self.state.lock().volume = volume.clamp(0.0, 2.0);
    }

    pub fn enqueue(&self, track_id: u32) {
        let mut s = self.state.lock();
        let effect = s.queue.enqueue(track_id);
        if effect.predicted_next_changed {
            s.prebuffer = None;
        }
    }

    pub fn remove(&self, track_id: u32) -> bool {
        let mut s = self.state.lock();
        let (removed, effect) = s.queue.remove(track_id);
        if effect.predicted_next_changed {
            s.prebuffer = None;
        }
        removed
    }

    pub fn reorder(&self, from: usize, to: usize) {
        let mut s = self.state.lock();
        let effect = s.queue.reorder(from, to);
        if effect.predicted_next_changed {
            s.prebuffer = None;
        }
    }

    pub fn set_shuffle(&self, enabled: bool) {
        let mut s = self.state.lock();
        let effect = s.queue.set_shuffle(enabled);
        if effect.predicted_next_changed {
            s.prebuffer = None;
        }
    }

    pub fn set_repeat(&self, mode: RepeatMode) {
        let mut s = self.state.lock();
        let effect = s.queue.set_repeat(mode);
        if effect.predicted_next_changed {
            s.prebuffer = None;
        }
    }

    /// The track id the queue currently predicts will play next, used by the
    /// stream layer to decide what to prebuffer ahead of end-of-track.
    pub fn predicted_next_track_id(&self) -> Option<u32> {
        self.state.lock().queue.predicted_next_track_id()
    }

    /// Stores a prebuffer prepared for `next_track_id`. Rejected (becomes a
    /// no-op) if the queue's prediction has since moved on -- either to a
    /// different track id, or to the same id pointing at a different file on
    /// disk (a library edit that swaps a track's file between prepare and
    /// handoff) -- which can happen if the decode raced a queue mutation.
    pub fn prepare_prebuffer(&self, prebuffer: GaplessPrebuffer, library: &dyn TracksRepo) {
        let mut s = self.state.lock();
        let predicted = s.queue.predicted_next_track_id();
        let filepath_matches = predicted
            .and_then(|id| library.get(id).ok())
            .map(|t| t.filepath == prebuffer.next_filepath)
            .unwrap_or(false);
        if predicted == Some(prebuffer.next_track_id) && filepath_matches {
            s.prebuffer = Some(prebuffer);
        }
    }

    /// Called when the current track's stream reports end-of-track. Performs
    /// the two-step gapless handoff: first validate the prebuffer (if any)
    /// still matches what the queue predicts -- by track id AND by the
    /// predicted track's current filepath, since an id match alone doesn't
    /// rule out a library edit that repointed the same id at a different
    /// file -- then advance the queue, in that order, since advancing first
    /// would make the just-finished prediction indistinguishable from a
    /// fresh one.
    pub fn handle_end_of_track(&self, library: &dyn TracksRepo) -> EndOfTrackAction {
        if self
            .auto_advancing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Another caller is already advancing; don't double-advance.
            return EndOfTrackAction::QueueEnded;
        }
        let result = {
            let mut s = self.state.lock();
            let predicted = s.queue.predicted_next_track_id();
            let predicted_filepath = predicted.and_then(|id| library.get(id).ok()).map(|t| t.filepath);
            let usable_prebuffer = s.prebuffer.take().filter(|p| {
                Some(p.next_track_id) == predicted && predicted_filepath.as_deref() == Some(p.next_filepath.as_str())
            });

            match s.queue.advance() {
                Some(_) => {
                    let next_id = s.queue.tracks[s.queue.current_index.unwrap()];
                    s.current_track_id = Some(next_id);
                    s.position_samples = 0;
                    match usable_prebuffer {
                        Some(pb) => EndOfTrackAction::UseGaplessPrebuffer(pb),
                        None => EndOfTrackAction::LoadNormally(next_id),
                    }
                }
                None => {
                    s.is_playing = false;
                    EndOfTrackAction::QueueEnded
                }
            }
        };
        self.auto_advancing.store(false, Ordering::Release);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::track::Track;
    use crate::repository::in_memory::InMemoryLibrary;

    fn track(id: u32, filepath: &str) -> Track {
        Track {
            id,
            filepath: filepath.to_string(),
            duration_s: 180.0,
            sample_rate: 44100,
            channels: 2,
            bit_depth: 16,
            title: format!("Track {id}"),
            artists: vec![],
            album: None,
            genres: vec![],
        }
    }

    fn library_with_tracks(paths: &[(u32, &str)]) -> InMemoryLibrary {
        let lib = InMemoryLibrary::new();
        for (id, path) in paths {
            lib.insert_track(track(*id, path));
        }
        lib
    }

    fn actor_with_queue(tracks: Vec<u32>) -> PlayerActor {
        let actor = PlayerActor::new();
        for t in tracks {
            actor.enqueue(t);
        }
        actor.play(1);
        actor
    }

    #[test]
    fn mismatched_prebuffer_falls_back_to_a_normal_load() {
        let actor = actor_with_queue(vec![1, 2, 3]);
        let lib = library_with_tracks(&[(1, "one.flac"), (2, "two.flac"), (3, "three.flac")]);
        actor.prepare_prebuffer(
            GaplessPrebuffer {
                next_track_id: 2,
                next_filepath: "two.flac".into(),
                audio_data: vec![vec![0.0]],
                sample_rate: 44100,
            },
            &lib,
        );
        // A queue mutation changes the prediction after the prebuffer was
        // prepared for the old one.
        actor.reorder(1, 2);
        match actor.handle_end_of_track(&lib) {
            EndOfTrackAction::LoadNormally(id) => assert_eq!(id, 3),
            _ => panic!("expected a normal load after the prebuffer was invalidated"),
        }
    }

    #[test]
    fn matching_prebuffer_is_used_for_the_gapless_handoff() {
        let actor = actor_with_queue(vec![1, 2]);
        let lib = library_with_tracks(&[(1, "one.flac"), (2, "two.flac")]);
        actor.prepare_prebuffer(
            GaplessPrebuffer {
                next_track_id: 2,
                next_filepath: "two.flac".into(),
                audio_data: vec![vec![0.0]],
                sample_rate: 44100,
            },
            &lib,
        );
        match actor.handle_end_of_track(&lib) {
            EndOfTrackAction::UseGaplessPrebuffer(pb) => assert_eq!(pb.next_track_id, 2),
            _ => panic!("expected the gapless prebuffer to be used"),
        }
    }

    #[test]
    fn prebuffer_with_a_stale_filepath_for_the_same_id_is_rejected() {
        // Same predicted id, but the library now points it at a different
        // file -- e.g. a re-scan replaced the track on disk between prepare
        // and handoff.
        let actor = actor_with_queue(vec![1, 2]);
        let lib = library_with_tracks(&[(1, "one.flac"), (2, "two-replaced.flac")]);
        actor.prepare_prebuffer(
            GaplessPrebuffer {
                next_track_id: 2,
                next_filepath: "two.flac".into(),
                audio_data: vec![vec![0.0]],
                sample_rate: 44100,
            },
            &lib,
        );
        match actor.handle_end_of_track(&lib) {
            EndOfTrackAction::LoadNormally(id) => assert_eq!(id, 2),
            _ => panic!("a filepath mismatch on the same id must not use the stale prebuffer"),
        }
    }

    #[test]
    fn end_of_queue_stops_playback() {
        let actor = actor_with_queue(vec![1]);
        let lib = library_with_tracks(&[(1, "one.flac")]);
        match actor.handle_end_of_track(&lib) {
            EndOfTrackAction::QueueEnded => {}
            _ => panic!("expected the queue to end"),
        }
        assert!(!actor.snapshot().is_playing);
    }

    #[test]
    fn direct_play_clears_any_stale_prebuffer() {
        let actor = actor_with_queue(vec![1, 2]);
        let lib = library_with_tracks(&[(1, "one.flac"), (2, "two.flac"), (5, "five.flac")]);
        actor.prepare_prebuffer(
            GaplessPrebuffer {
                next_track_id: 2,
                next_filepath: "two.flac".into(),
                audio_data: vec![vec![0.0]],
                sample_rate: 44100,
            },
            &lib,
        );
        actor.play(5);
        match actor.handle_end_of_track(&lib) {
            EndOfTrackAction::QueueEnded | EndOfTrackAction::LoadNormally(_) => {}
            EndOfTrackAction::UseGaplessPrebuffer(_) => {
                panic!("a direct play must invalidate the old prebuffer")
            }
        }
    }
}
