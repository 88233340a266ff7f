// Chunk Processor
// Per-session chunk orchestration with equal-power crossfade continuity
//
// Copyright (C) 2024 Auralis Team
// License: GPLv3

use crate::buffer::AudioBuffer;
use crate::error::{PipelineError, Result};
use crate::pipeline::{Pipeline, ProcessingParams};
use ndarray::{s, Array2};
use std::f32::consts::FRAC_PI_2;

/// A single nominal-duration window of source audio and where it sits in
/// the track.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub chunk_index: u64,
    pub start_sample: usize,
    pub audio: AudioBuffer,
}

/// Post-pipeline chunk, crossfaded against the previous chunk's tail and
/// ready to hand to the stream controller.
#[derive(Debug, Clone)]
pub struct ProcessedChunk {
    pub chunk_index: u64,
    pub audio: AudioBuffer,
    pub actual_length_samples: usize,
}

/// Caps the crossfade region; a chunk shorter than this (the final chunk of
/// a track) crossfades over its own full length instead.
pub const CROSSFADE_SAMPLES_MAX: usize = 1024;

fn crossfade_len(prev_tail_len: usize, processed_len: usize) -> usize {
    let head_len = prev_tail_len.min(processed_len);
    CROSSFADE_SAMPLES_MAX.min(head_len)
}

/// Per-session chunk processor: owns the DSP stage state (compressor and
/// limiter continuity) and the crossfade tail across an ordered sequence of
/// chunk calls. One instance per active stream session.
pub struct ChunkProcessor {
    channels: usize,
    pipeline: Pipeline,
    prev_tail: Option<Array2<f32>>,
}

impl ChunkProcessor {
    pub fn new(channels: usize, sample_rate: u32, params: &ProcessingParams) -> Self {
        Self {
            channels,
            pipeline: Pipeline::new(sample_rate, channels, params),
            prev_tail: None,
        }
    }

    /// Seeking breaks crossfade continuity intentionally: the next chunk's
    /// leading edge is emitted without blending into whatever tail existed
    /// before the seek.
    pub fn clear_tail(&mut self) {
        self.prev_tail = None;
    }

    /// Run the DSP pipeline over `chunk` and apply the equal-power crossfade
    /// against the tail carried from the previous call. `prev_tail` is only
    /// advanced once the new tail is computed successfully — a failed stage
    /// (a non-finite sample bug, say) leaves continuity untouched so a retry
    /// after a transient error doesn't desynchronize future crossfades.
    ///
    /// `fast_start` is forwarded to the pipeline's stage-1 EQ analysis;
    /// callers set it for a session's opening chunk only.
    pub fn process_chunk(
        &mut self,
        chunk: &Chunk,
        params: &ProcessingParams,
        fast_start: bool,
    ) -> Result<ProcessedChunk> {
        let processed = self.pipeline.process(&chunk.audio, params, fast_start)?;
        let (channels, body_len) = processed.shape();
        if channels != self.channels {
            return Err(PipelineError::InvalidInput {
                reason: format!(
                    "chunk processor configured for {} channels, got {}",
                    self.channels, channels
                ),
            });
        }

        let overlap = match &self.prev_tail {
            Some(tail) => crossfade_len(tail.shape()[1], body_len),
            None => 0,
        };

        let mut out = processed.as_array().clone();
        if overlap > 0 {
            let tail = self.prev_tail.as_ref().unwrap();
            for i in 0..overlap {
                let t = FRAC_PI_2 * (i as f32 / overlap.max(1) as f32);
                let fade_in = t.sin().powi(2);
                let fade_out = t.cos().powi(2);
                for ch in 0..channels {
                    out[[ch, i]] = tail[[ch, i]] * fade_out + out[[ch, i]] * fade_in;
                }
            }
        }

        let new_tail_start = body_len.saturating_sub(CROSSFADE_SAMPLES_MAX.min(body_len));
        let new_tail = out.slice(s![.., new_tail_start..]).to_owned();
        self.prev_tail = Some(new_tail);

        Ok(ProcessedChunk {
            chunk_index: chunk.chunk_index,
            audio: AudioBuffer::from_validated(out),
            actual_length_samples: body_len,
        })
    }
}

/// Chunk statistics for monitoring
#[derive(Debug, Clone)]
pub struct ChunkStats {
    pub peak: f64,
    pub rms: f64,
    pub crest_db: f64,
}

impl ChunkStats {
    pub fn compute(chunk: &ndarray::ArrayView2<f64>) -> Self {
        let peak = chunk.iter().map(|&x| x.abs()).fold(0.0_f64, f64::max);
        let rms = (chunk.iter().map(|&x| x * x).sum::<f64>() / chunk.len() as f64).sqrt();
        let crest_db = if rms > 0.0 {
            20.0 * (peak / rms).log10()
        } else {
            0.0
        };
        Self { peak, rms, crest_db }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn silent_chunk(index: u64, start: usize, channels: usize, len: usize) -> Chunk {
        let audio = AudioBuffer::new(Array2::zeros((channels, len))).unwrap();
        Chunk {
            chunk_index: index,
            start_sample: start,
            audio,
        }
    }

    #[test]
    fn first_chunk_has_no_crossfade() {
        let params = ProcessingParams::identity();
        let mut proc = ChunkProcessor::new(2, 44100, &params);
        let chunk = silent_chunk(0, 0, 2, 4096);
        let out = proc.process_chunk(&chunk, &params, false).unwrap();
        assert_eq!(out.actual_length_samples, 4096);
    }

    #[test]
    fn final_short_chunk_is_not_zero_padded() {
        let params = ProcessingParams::identity();
        let mut proc = ChunkProcessor::new(2, 44100, &params);
        let chunk = silent_chunk(3, 0, 2, 777);
        let out = proc.process_chunk(&chunk, &params, false).unwrap();
        assert_eq!(out.actual_length_samples, 777);
    }

    #[test]
    fn equal_power_crossfade_preserves_constant_power() {
        let overlap = 256usize;
        for i in 0..overlap {
            let t = FRAC_PI_2 * (i as f32 / overlap as f32);
            let fade_in = t.sin().powi(2);
            let fade_out = t.cos().powi(2);
            assert!((fade_in + fade_out - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn seek_clears_crossfade_continuity() {
        let params = ProcessingParams::identity();
        let mut proc = ChunkProcessor::new(2, 44100, &params);
        let chunk_a = silent_chunk(0, 0, 2, 4096);
        proc.process_chunk(&chunk_a, &params, false).unwrap();
        assert!(proc.prev_tail.is_some());
        proc.clear_tail();
        assert!(proc.prev_tail.is_none());
    }
}
