/// Pipeline orchestrator — wires the six mastering stages together in the
/// mandated order and keeps the stateful stages (compressor, limiter) alive
/// for the lifetime of a stream session so their continuity invariants hold
/// across chunk boundaries.
use crate::band_shelf;
use crate::buffer::AudioBuffer;
use crate::compressor::{Compressor, CompressorConfig, DetectionMode};
use crate::error::{assert_finite, PipelineError, Result};
use crate::eq::{self, NUM_BANDS};
use crate::limiter::{Limiter, LimiterConfig};
use crate::stereo_width;

const SAFETY_CEILING_DB: f32 = -0.5;

/// Resolved per `(track, preset, intensity)`; everything a chunk needs to
/// run through the pipeline, aside from the session-scoped compressor and
/// limiter state.
#[derive(Debug, Clone)]
pub struct ProcessingParams {
    pub target_curve: [f32; NUM_BANDS],
    pub stereo_width_target: f32,
    pub compressor: CompressorConfig,
    pub detection_mode: DetectionMode,
}

impl ProcessingParams {
    /// A no-op parameter set: flat target curve, unity stereo width, and a
    /// compressor threshold high enough that ordinary test signals never
    /// trigger gain reduction. Used by tests and as the baseline the preset
    /// table's "natural" preset is built from.
    pub fn identity() -> Self {
        Self {
            target_curve: [1.0 / NUM_BANDS as f32; NUM_BANDS],
            stereo_width_target: 1.0,
            compressor: CompressorConfig {
                threshold_db: 0.0,
                ..CompressorConfig::default()
            },
            detection_mode: DetectionMode::Rms,
        }
    }
}

fn soft_clip(buffer: &AudioBuffer, ceiling_db: f32) -> AudioBuffer {
    let ceiling = 10f32.powf(ceiling_db / 20.0);
    let clipped = buffer.as_array().mapv(|x| ceiling * (x / ceiling).tanh());
    AudioBuffer::from_validated(clipped)
}

/// Owns the stateful DSP stages for one stream session. `sample_rate` and
/// `channels` are fixed for the session's lifetime (a format change means a
/// new session). One compressor and one limiter per channel, so each
/// channel's lookahead buffer and gain envelope carries its own continuity
/// instead of the two channels' samples interleaving through shared state.
pub struct Pipeline {
    sample_rate: u32,
    compressors: Vec<Compressor>,
    limiters: Vec<Limiter>,
}

impl Pipeline {
    pub fn new(sample_rate: u32, channels: usize, params: &ProcessingParams) -> Self {
        let compressors = (0..channels)
            .map(|_| Compressor::new(params.compressor.clone()))
            .collect();
        let limiters = (0..channels)
            .map(|_| {
                Limiter::new(LimiterConfig {
                    sample_rate: sample_rate as usize,
                    threshold_db: SAFETY_CEILING_DB - 0.1,
                    ..LimiterConfig::default()
                })
            })
            .collect();

        Self {
            sample_rate,
            compressors,
            limiters,
        }
    }

    /// `fast_start` skips stage 1's FFT measurement in favor of
    /// `eq::fast_start_gains_db`'s flat-spectrum approximation -- meant for
    /// a session's first chunk, where cutting time-to-first-audio matters
    /// more than that one chunk's gain accuracy. Every invariant this
    /// pipeline upholds (finite output, shape preservation) holds on the
    /// fast path exactly as on the normal one; only stage 1's input changes.
    pub fn process(&mut self, buffer: &AudioBuffer, params: &ProcessingParams, fast_start: bool) -> Result<AudioBuffer> {
        buffer.require_finite("pipeline_entry")?;
        let (channels, _) = buffer.shape();
        if channels != self.compressors.len() {
            return Err(PipelineError::InvalidInput {
                reason: format!(
                    "pipeline built for {} channels, got {}",
                    self.compressors.len(),
                    channels
                ),
            });
        }

        let gains_db = if fast_start {
            eq::fast_start_gains_db(&params.target_curve)
        } else {
            eq::analyze(buffer, self.sample_rate, &params.target_curve)
        };
        let shelved = band_shelf::apply(buffer, self.sample_rate, &gains_db);
        assert_finite("band_shelf", shelved.as_array().as_slice().unwrap())?;

        let widened = stereo_width::apply(&shelved, self.sample_rate, params.stereo_width_target);
        assert_finite("stereo_width", widened.as_array().as_slice().unwrap())?;

        let (channels, samples) = widened.shape();
        let mut compressed = ndarray::Array2::<f32>::zeros((channels, samples));
        for ch in 0..channels {
            let channel_audio = widened.channel(ch).to_vec();
            let (out, _info) = self.compressors[ch].process(&channel_audio, params.detection_mode);
            compressed.row_mut(ch).assign(&ndarray::Array1::from(out));
        }
        let compressed = AudioBuffer::from_validated(compressed);
        assert_finite("compressor", compressed.as_array().as_slice().unwrap())?;

        let mut limited = ndarray::Array2::<f32>::zeros((channels, samples));
        for ch in 0..channels {
            let channel_audio = compressed.channel(ch).to_vec();
            let (out, _info) = self.limiters[ch].process(&channel_audio);
            limited.row_mut(ch).assign(&ndarray::Array1::from(out));
        }
        let limited = AudioBuffer::from_validated(limited);
        assert_finite("limiter", limited.as_array().as_slice().unwrap())?;

        let safe = soft_clip(&limited, SAFETY_CEILING_DB);
        assert_finite("safety_limiter", safe.as_array().as_slice().unwrap())?;

        Ok(safe)
    }
}

/// One-shot processing for tests and callers that don't need cross-chunk
/// continuity (e.g. the fingerprint analyzer, which never streams).
pub fn process(buffer: &AudioBuffer, sample_rate: u32, params: &ProcessingParams) -> Result<AudioBuffer> {
    let (channels, _) = buffer.shape();
    let mut pipeline = Pipeline::new(sample_rate, channels, params);
    pipeline.process(buffer, params, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn identity_params_preserve_shape_and_finiteness() {
        let data = Array2::<f32>::from_shape_fn((2, 8192), |(c, i)| {
            ((i as f32 * 0.01) + c as f32 * 0.2).sin() * 0.3
        });
        let buffer = AudioBuffer::new(data).unwrap();
        let params = ProcessingParams::identity();
        let out = process(&buffer, 44100, &params).unwrap();
        assert_eq!(out.shape(), buffer.shape());
        assert!(out.require_finite("pipeline_test").is_ok());
    }

    #[test]
    fn non_finite_input_is_rejected_at_entry() {
        let mut data = Array2::<f32>::zeros((1, 16));
        data[[0, 4]] = f32::NAN;
        assert!(AudioBuffer::new(data).is_err());
    }

    #[test]
    fn session_pipeline_state_persists_across_chunks() {
        let mut params = ProcessingParams::identity();
        params.compressor.threshold_db = -40.0;
        params.compressor.ratio = 4.0;

        let mut pipeline = Pipeline::new(44100, 2, &params);
        let chunk_a = AudioBuffer::new(Array2::<f32>::from_elem((2, 4096), 0.4)).unwrap();
        let chunk_b = AudioBuffer::new(Array2::<f32>::from_elem((2, 4096), 0.4)).unwrap();

        let out_a = pipeline.process(&chunk_a, &params, false).unwrap();
        let out_b = pipeline.process(&chunk_b, &params, false).unwrap();

        assert_eq!(out_a.shape(), chunk_a.shape());
        assert_eq!(out_b.shape(), chunk_b.shape());
    }

    #[test]
    fn fast_start_skips_analysis_but_keeps_every_invariant() {
        let params = ProcessingParams::identity();
        let mut pipeline = Pipeline::new(44100, 2, &params);
        let chunk = AudioBuffer::new(Array2::<f32>::from_elem((2, 4096), 0.4)).unwrap();
        let out = pipeline.process(&chunk, &params, true).unwrap();
        assert_eq!(out.shape(), chunk.shape());
        assert!(out.require_finite("fast_start_test").is_ok());
    }
}
