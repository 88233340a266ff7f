/// Drives a single client's stream from accept to end-of-track or
/// disconnect: acquires the process-wide concurrency permit, produces
/// chunks, frames them as PCM, applies backpressure, honors
/// pause/seek/abort/update_settings posted to its inbox, and carries the
/// session across a track boundary via the player actor's gapless handoff
/// instead of ending the WebSocket stream at every track change. One
/// instance per session; the driver is the sole mutator of session state.
use crate::chunked_processor::ChunkedProcessor;
use crate::constants::{CHUNK_INTERVAL_S, PCM_FRAME_SAMPLES};
use crate::error::Result;
use crate::models::fingerprint::Fingerprint;
use crate::models::player_state::GaplessPrebuffer;
use crate::models::processing_params;
use crate::models::session::SessionState;
use crate::player::{EndOfTrackAction, PlayerActor};
use crate::repository::{FingerprintsRepo, Library, TracksRepo};
use crate::semaphore::StreamSemaphore;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum ControlMessage {
    Pause,
    Resume,
    Seek { position_s: f64 },
    Abort,
    UpdateSettings { preset: String, intensity: f32 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    StreamInit {
        sample_rate: u32,
        channels: u16,
    },
    /// Sent in place of a second `StreamInit` when the driver carries one
    /// WebSocket session across a gapless/auto-advance track boundary,
    /// so the client can reset its decode/playback position without
    /// tearing down and reopening the stream.
    TrackAdvanced {
        track_id: u32,
        sample_rate: u32,
        channels: u16,
    },
    AudioChunk {
        chunk_index: u64,
        sample_count: usize,
        crossfade_samples: u32,
        #[serde(with = "base64_pcm")]
        pcm: Vec<u8>,
    },
    StreamEnd,
    StreamError {
        kind: String,
        chunk_index: u64,
    },
}

/// PCM frames are binary; JSON envelopes carry them base64-encoded so the
/// whole message stays one JSON text frame over the WebSocket.
mod base64_pcm {
    use super::BASE64;
    use base64::Engine;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&BASE64.encode(bytes))
    }
}

pub struct SessionContext {
    pub track_id: u32,
    pub filepath: String,
    pub fingerprint: Fingerprint,
    pub cache: Arc<crate::cache::ChunkCache>,
    /// The process-wide player actor, so the driver can settle the
    /// end-of-track handoff (auto-advance / gapless prebuffer) instead of
    /// just ending the stream when a track finishes.
    pub player: Arc<PlayerActor>,
    pub library: Arc<dyn Library>,
}

pub struct StreamController {
    semaphore: Arc<StreamSemaphore>,
}

/// What the driver does next after `PlayerActor::handle_end_of_track`
/// decides the queue's fate. Resolving the next track's audio (either by
/// disk read or from an already-decoded prebuffer) is async, so this is a
/// free function rather than a method on `SessionContext`.
enum Advance {
    Ended,
    Next { processor: ChunkedProcessor, track_id: u32, filepath: String, fingerprint: Fingerprint },
}

async fn advance_track(ctx: &SessionContext, preset: &str, intensity: f32) -> Result<Advance> {
    match ctx.player.handle_end_of_track(&*ctx.library) {
        EndOfTrackAction::QueueEnded => Ok(Advance::Ended),
        EndOfTrackAction::LoadNormally(next_id) => {
            let track = TracksRepo::get(&*ctx.library, next_id)?;
            let fingerprint = FingerprintsRepo::get(&*ctx.library, next_id)?.unwrap_or_else(Fingerprint::placeholder);
            let processor =
                ChunkedProcessor::construct(next_id, &track.filepath, preset, intensity, &fingerprint, ctx.cache.clone()).await?;
            Ok(Advance::Next { processor, track_id: next_id, filepath: track.filepath, fingerprint })
        }
        EndOfTrackAction::UseGaplessPrebuffer(pb) => {
            let fingerprint =
                FingerprintsRepo::get(&*ctx.library, pb.next_track_id)?.unwrap_or_else(Fingerprint::placeholder);
            let params = processing_params::resolve(preset, intensity, &fingerprint)?;
            let processor =
                ChunkedProcessor::from_decoded(pb.next_track_id, preset, intensity, pb.audio_data, pb.sample_rate, params, ctx.cache.clone());
            Ok(Advance::Next { processor, track_id: pb.next_track_id, filepath: pb.next_filepath, fingerprint })
        }
    }
}

/// Decodes the queue's predicted next track in the background and hands it
/// to the player actor, which re-validates the prediction (by id and
/// filepath) before storing it. Fire-and-forget: if the decode loses the
/// race against a queue mutation, `prepare_prebuffer` just drops it.
fn spawn_prebuffer_decode(ctx: &SessionContext) {
    let Some(next_id) = ctx.player.predicted_next_track_id() else {
        return;
    };
    let Ok(track) = TracksRepo::get(&*ctx.library, next_id) else {
        return;
    };
    let player = ctx.player.clone();
    let library = ctx.library.clone();
    let filepath = track.filepath;
    tokio::spawn(async move {
        if let Ok(audio) = crate::audio::loader::load_audio(&filepath).await {
            player.prepare_prebuffer(
                GaplessPrebuffer {
                    next_track_id: next_id,
                    next_filepath: filepath,
                    audio_data: audio.channel_samples,
                    sample_rate: audio.sample_rate,
                },
                &*library,
            );
        }
    });
}

impl StreamController {
    pub fn new(semaphore: Arc<StreamSemaphore>) -> Self {
        Self { semaphore }
    }

    pub async fn run(
        &self,
        ctx: SessionContext,
        preset: String,
        intensity: f32,
        mut inbox: mpsc::Receiver<ControlMessage>,
        outbound: mpsc::Sender<ServerMessage>,
    ) {
        let _permit = self.semaphore.acquire().await;

        let mut current_track_id = ctx.track_id;
        let mut current_filepath = ctx.filepath.clone();
        let mut current_fingerprint = ctx.fingerprint.clone();
        let mut preset = preset;
        let mut intensity = intensity;

        let mut processor = match ChunkedProcessor::construct(
            current_track_id,
            &current_filepath,
            &preset,
            intensity,
            &current_fingerprint,
            ctx.cache.clone(),
        )
        .await
        {
            Ok(p) => p,
            Err(e) => {
                let _ = outbound
                    .send(ServerMessage::StreamError {
                        kind: e.kind.to_string(),
                        chunk_index: 0,
                    })
                    .await;
                return;
            }
        };

        if outbound
            .send(ServerMessage::StreamInit {
                sample_rate: processor.sample_rate(),
                channels: processor.channels(),
            })
            .await
            .is_err()
        {
            return;
        }

        let mut state = SessionState::Streaming;
        let mut next_index: u64 = 0;
        let mut paused = false;
        let mut prebuffer_attempted = false;

        'driver: loop {
            // Drain any pending control messages without blocking the
            // audio path when nothing is waiting.
            while let Ok(msg) = inbox.try_recv() {
                match msg {
                    ControlMessage::Pause => {
                        paused = true;
                        state = SessionState::Paused;
                    }
                    ControlMessage::Resume => {
                        paused = false;
                        state = SessionState::Streaming;
                    }
                    ControlMessage::Seek { position_s } => {
                        next_index = (position_s / CHUNK_INTERVAL_S).floor().max(0.0) as u64;
                        processor.clear_tail();
                    }
                    ControlMessage::Abort => {
                        state = SessionState::Aborted;
                        break 'driver;
                    }
                    ControlMessage::UpdateSettings { preset: new_preset, intensity: new_intensity } => {
                        match ChunkedProcessor::construct(
                            current_track_id,
                            &current_filepath,
                            &new_preset,
                            new_intensity,
                            &current_fingerprint,
                            ctx.cache.clone(),
                        )
                        .await
                        {
                            Ok(new_processor) => {
                                processor = new_processor;
                                preset = new_preset;
                                intensity = new_intensity;
                            }
                            Err(_) => {
                                // Invalid settings: ignored, current
                                // processor keeps running unchanged.
                            }
                        }
                    }
                }
            }

            if paused {
                // Wait for the next control message (resume/abort/seek)
                // rather than busy-polling.
                match inbox.recv().await {
                    Some(ControlMessage::Resume) => {
                        paused = false;
                        state = SessionState::Streaming;
                    }
                    Some(ControlMessage::Abort) | None => {
                        state = SessionState::Aborted;
                        break 'driver;
                    }
                    Some(ControlMessage::Seek { position_s }) => {
                        next_index = (position_s / CHUNK_INTERVAL_S).floor().max(0.0) as u64;
                        processor.clear_tail();
                    }
                    Some(_) => {}
                }
                continue;
            }

            // Decode the predicted next track ahead of end-of-track, once
            // per track, so the gapless handoff below has a real chance of
            // finding a usable prebuffer instead of always falling back to
            // a normal (blocking) load.
            if !prebuffer_attempted {
                prebuffer_attempted = true;
                spawn_prebuffer_decode(&ctx);
            }

            let chunk = match processor.get(next_index).await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => match advance_track(&ctx, &preset, intensity).await {
                    Ok(Advance::Ended) => {
                        let _ = outbound.send(ServerMessage::StreamEnd).await;
                        state = SessionState::Ended;
                        break 'driver;
                    }
                    Ok(Advance::Next { processor: new_processor, track_id, filepath, fingerprint }) => {
                        processor = new_processor;
                        current_track_id = track_id;
                        current_filepath = filepath;
                        current_fingerprint = fingerprint;
                        next_index = 0;
                        prebuffer_attempted = false;
                        if outbound
                            .send(ServerMessage::TrackAdvanced {
                                track_id: current_track_id,
                                sample_rate: processor.sample_rate(),
                                channels: processor.channels(),
                            })
                            .await
                            .is_err()
                        {
                            return;
                        }
                        continue 'driver;
                    }
                    Err(e) => {
                        let _ = outbound
                            .send(ServerMessage::StreamError {
                                kind: e.kind.to_string(),
                                chunk_index: next_index,
                            })
                            .await;
                        state = SessionState::Errored;
                        break 'driver;
                    }
                },
                Err(e) => {
                    let _ = outbound
                        .send(ServerMessage::StreamError {
                            kind: e.kind.to_string(),
                            chunk_index: next_index,
                        })
                        .await;
                    state = SessionState::Errored;
                    break 'driver;
                }
            };

            for frame in frame_pcm(&chunk.pcm, PCM_FRAME_SAMPLES) {
                if outbound
                    .send(ServerMessage::AudioChunk {
                        chunk_index: chunk.chunk_index,
                        sample_count: frame.len() / 4,
                        crossfade_samples: 0,
                        pcm: frame,
                    })
                    .await
                    .is_err()
                {
                    // Disconnect: stop cleanly, permit releases on drop.
                    return;
                }
            }

            if chunk.is_last {
                match advance_track(&ctx, &preset, intensity).await {
                    Ok(Advance::Ended) => {
                        let _ = outbound.send(ServerMessage::StreamEnd).await;
                        state = SessionState::Ended;
                        break 'driver;
                    }
                    Ok(Advance::Next { processor: new_processor, track_id, filepath, fingerprint }) => {
                        processor = new_processor;
                        current_track_id = track_id;
                        current_filepath = filepath;
                        current_fingerprint = fingerprint;
                        next_index = 0;
                        prebuffer_attempted = false;
                        if outbound
                            .send(ServerMessage::TrackAdvanced {
                                track_id: current_track_id,
                                sample_rate: processor.sample_rate(),
                                channels: processor.channels(),
                            })
                            .await
                            .is_err()
                        {
                            return;
                        }
                        continue 'driver;
                    }
                    Err(e) => {
                        let _ = outbound
                            .send(ServerMessage::StreamError {
                                kind: e.kind.to_string(),
                                chunk_index: next_index,
                            })
                            .await;
                        state = SessionState::Errored;
                        break 'driver;
                    }
                }
            }
            next_index += 1;
        }

        tracing::debug!(track_id = current_track_id, ?state, "stream session ended");
    }
}

/// Splits raw interleaved float32 PCM bytes into frames no larger than
/// `max_samples` interleaved samples, keeping every outbound message well
/// under the transport's frame-size limit.
fn frame_pcm(pcm: &[u8], max_samples: usize) -> Vec<Vec<u8>> {
    let frame_bytes = max_samples * 4;
    if frame_bytes == 0 || pcm.is_empty() {
        return vec![pcm.to_vec()];
    }
    pcm.chunks(frame_bytes.max(4)).map(|c| c.to_vec()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_framing_never_exceeds_the_configured_frame_size() {
        let pcm = vec![0u8; 4 * (PCM_FRAME_SAMPLES * 3 + 7)];
        let frames = frame_pcm(&pcm, PCM_FRAME_SAMPLES);
        for frame in &frames {
            assert!(frame.len() <= PCM_FRAME_SAMPLES * 4);
        }
        let total: usize = frames.iter().map(|f| f.len()).sum();
        assert_eq!(total, pcm.len());
    }
}
