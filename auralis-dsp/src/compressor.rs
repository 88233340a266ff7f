/// Adaptive Compressor
///
/// High-performance compressor with multiple detection modes.
/// Used for dynamic range control in mastering and mixing.
///
/// Key features:
/// - Peak, RMS, and hybrid detection modes
/// - Soft-knee compression with configurable ratio
/// - Lookahead delay for transient handling
/// - Makeup gain compensation
///
/// One `Compressor` is built per stream session and kept alive across every
/// chunk of that session: the lookahead buffer only zero-pads its first
/// `lookahead_samples` outputs (there is no prior audio before the start of
/// a track), after which it settles into a steady state holding exactly the
/// previous chunk's un-emitted tail. Constructing a fresh `Compressor` per
/// chunk call would re-zero-pad every chunk and break that continuity.

use crate::envelope::{EnvelopeFollower, EnvelopeConfig};
use std::collections::VecDeque;

/// Detection mode for input level measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectionMode {
    Peak,
    Rms,
    Hybrid,  // 70% RMS + 30% Peak
}

/// Configuration for compressor
#[derive(Debug, Clone)]
pub struct CompressorConfig {
    pub sample_rate: usize,
    pub threshold_db: f32,
    pub ratio: f32,
    pub knee_db: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
    pub makeup_gain_db: f32,
    pub enable_lookahead: bool,
    pub lookahead_ms: f32,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            threshold_db: -20.0,
            ratio: 4.0,
            knee_db: 6.0,
            attack_ms: 10.0,
            release_ms: 100.0,
            makeup_gain_db: 0.0,
            enable_lookahead: true,
            lookahead_ms: 5.0,
        }
    }
}

/// Compression statistics
#[derive(Debug, Clone)]
pub struct CompressionInfo {
    pub input_level_db: f32,
    pub gain_reduction_db: f32,
    pub output_gain: f32,
    pub threshold_db: f32,
    pub ratio: f32,
}

/// Adaptive Compressor
pub struct Compressor {
    config: CompressorConfig,

    // Envelope followers for different detection modes
    peak_follower: EnvelopeFollower,
    rms_follower: EnvelopeFollower,
    gain_follower: EnvelopeFollower,

    // Lookahead buffer
    lookahead_buffer: Option<VecDeque<f32>>,
    lookahead_samples: usize,

    // State
    gain_reduction: f32,
    previous_gain: f32,
}

impl Compressor {
    /// Create a new compressor
    pub fn new(config: CompressorConfig) -> Self {
        // Create envelope followers for different purposes
        let peak_config = EnvelopeConfig {
            sample_rate: config.sample_rate,
            attack_ms: 0.1,
            release_ms: 1.0,
        };
        let peak_follower = EnvelopeFollower::new(&peak_config);

        let rms_config = EnvelopeConfig {
            sample_rate: config.sample_rate,
            attack_ms: 10.0,
            release_ms: 100.0,
        };
        let rms_follower = EnvelopeFollower::new(&rms_config);

        let gain_config = EnvelopeConfig {
            sample_rate: config.sample_rate,
            attack_ms: config.attack_ms,
            release_ms: config.release_ms,
        };
        let gain_follower = EnvelopeFollower::new(&gain_config);

        // Setup lookahead buffer if enabled
        let lookahead_samples = if config.enable_lookahead {
            (config.lookahead_ms * config.sample_rate as f32 / 1000.0) as usize
        } else {
            0
        };

        let lookahead_buffer = if config.enable_lookahead {
            Some(VecDeque::with_capacity(lookahead_samples))
        } else {
            None
        };

        Self {
            config,
            peak_follower,
            rms_follower,
            gain_follower,
            lookahead_buffer,
            lookahead_samples,
            gain_reduction: 0.0,
            previous_gain: 1.0,
        }
    }

    /// Calculate gain reduction based on input level
    fn calculate_gain_reduction(&self, level_db: f32) -> f32 {
        let threshold = self.config.threshold_db;
        let ratio = self.config.ratio;
        let knee = self.config.knee_db;

        if level_db <= threshold - knee / 2.0 {
            // Below knee
            0.0
        } else if level_db >= threshold + knee / 2.0 {
            // Above knee (linear compression)
            let over_threshold = level_db - threshold;
            -over_threshold * (1.0 - 1.0 / ratio)
        } else {
            // In knee (soft compression)
            let over_threshold = level_db - threshold + knee / 2.0;
            let knee_ratio = over_threshold / knee;
            let soft_ratio = 1.0 + knee_ratio * (ratio - 1.0) / ratio;
            -over_threshold * (1.0 - 1.0 / soft_ratio)
        }
    }

    /// Detect input level using specified mode
    fn detect_input_level(&mut self, audio: &[f32], mode: DetectionMode) -> f32 {
        match mode {
            DetectionMode::Peak => {
                let peak_level = audio.iter().map(|&x| x.abs()).fold(0.0f32, f32::max);
                self.peak_follower.process(peak_level)
            }
            DetectionMode::Rms => {
                let rms_level = (audio.iter().map(|&x| x * x).sum::<f32>() / audio.len() as f32).sqrt();
                self.rms_follower.process(rms_level)
            }
            DetectionMode::Hybrid => {
                let peak_level = audio.iter().map(|&x| x.abs()).fold(0.0f32, f32::max);
                let rms_level = (audio.iter().map(|&x| x * x).sum::<f32>() / audio.len() as f32).sqrt();
                0.7 * rms_level + 0.3 * peak_level
            }
        }
    }

    /// Apply lookahead delay for better transient handling.
    ///
    /// The buffer is never cleared between calls (only `reset()` does that),
    /// so a sample pushed near the end of one chunk is popped out as the
    /// delayed head of the next chunk's output — this is what makes the
    /// gain shaping continuous across chunk boundaries instead of restarting
    /// from a blank lookahead window every call.
    fn apply_lookahead(&mut self, audio: &[f32]) -> Vec<f32> {
        if !self.config.enable_lookahead || self.lookahead_samples == 0 {
            return audio.to_vec();
        }
        let buffer = match self.lookahead_buffer.as_mut() {
            Some(buffer) => buffer,
            None => return audio.to_vec(),
        };
        let mut delayed_audio = Vec::with_capacity(audio.len());

        for &sample in audio {
            buffer.push_back(sample);

            if buffer.len() > self.lookahead_samples {
                delayed_audio.push(buffer.pop_front().unwrap());
            } else {
                // Only reached while the buffer is still filling for the
                // very first time, at the start of a session.
                delayed_audio.push(0.0);
            }
        }

        delayed_audio
    }

    /// Process audio through compressor
    ///
    /// # Arguments
    /// * `audio` - Input audio samples
    /// * `mode` - Detection mode (Peak, RMS, or Hybrid)
    ///
    /// # Returns
    /// * Tuple of (processed_audio, compression_info)
    pub fn process(&mut self, audio: &[f32], mode: DetectionMode) -> (Vec<f32>, CompressionInfo) {
        if audio.is_empty() {
            return (Vec::new(), CompressionInfo {
                input_level_db: -100.0,
                gain_reduction_db: 0.0,
                output_gain: 1.0,
                threshold_db: self.config.threshold_db,
                ratio: self.config.ratio,
            });
        }

        // Apply lookahead delay
        let delayed_audio = self.apply_lookahead(audio);

        // Detect input level
        let input_level = self.detect_input_level(&delayed_audio, mode);
        let input_level_db = 20.0 * input_level.max(1e-10).log10();

        // Calculate required gain reduction
        let target_gain_reduction = self.calculate_gain_reduction(input_level_db);

        // Apply gain smoothing
        let smoothed_gain_reduction = self.gain_follower.process(target_gain_reduction);
        self.gain_reduction = smoothed_gain_reduction;

        // Convert to linear gain
        let gain_linear = 10.0f32.powf(smoothed_gain_reduction / 20.0);

        // Apply makeup gain
        let makeup_gain = 10.0f32.powf(self.config.makeup_gain_db / 20.0);
        let final_gain = gain_linear * makeup_gain;

        // Apply gain to audio
        let processed_audio: Vec<f32> = delayed_audio.iter()
            .map(|&sample| sample * final_gain)
            .collect();

        self.previous_gain = final_gain;

        let info = CompressionInfo {
            input_level_db,
            gain_reduction_db: smoothed_gain_reduction,
            output_gain: final_gain,
            threshold_db: self.config.threshold_db,
            ratio: self.config.ratio,
        };

        (processed_audio, info)
    }

    /// Reset compressor state
    pub fn reset(&mut self) {
        self.peak_follower.reset();
        self.rms_follower.reset();
        self.gain_follower.reset();
        self.gain_reduction = 0.0;
        self.previous_gain = 1.0;

        if let Some(ref mut buffer) = self.lookahead_buffer {
            buffer.clear();
        }
    }

    /// Get current compressor state
    pub fn get_state(&self) -> (f32, f32) {
        (self.gain_reduction, self.previous_gain)
    }
}

/// Convenience function for one-shot compression
///
/// # Arguments
/// * `audio` - Input audio samples
/// * `config` - Compressor configuration
/// * `mode` - Detection mode
///
/// # Returns
/// * Tuple of (processed_audio, compression_info)
pub fn compress(
    audio: &[f32],
    config: &CompressorConfig,
    mode: DetectionMode,
) -> (Vec<f32>, CompressionInfo) {
    let mut compressor = Compressor::new(config.clone());
    compressor.process(audio, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressor_creation() {
        let config = CompressorConfig::default();
        let compressor = Compressor::new(config);
        let (gr, gain) = compressor.get_state();
        assert_eq!(gr, 0.0);
        assert_eq!(gain, 1.0);
    }

    #[test]
    fn test_compress_silence() {
        let audio = vec![0.0; 1000];
        let config = CompressorConfig::default();
        let (processed, info) = compress(&audio, &config, DetectionMode::Rms);

        assert_eq!(processed.len(), audio.len());
        assert!(info.gain_reduction_db >= -1.0);  // Should be near 0
    }

    #[test]
    fn test_compress_loud_signal() {
        // Loud signal above threshold
        let audio = vec![0.8; 1000];
        let mut config = CompressorConfig::default();
        config.threshold_db = -10.0;
        config.ratio = 4.0;

        let (processed, info) = compress(&audio, &config, DetectionMode::Peak);

        assert!(info.gain_reduction_db < 0.0);  // Should have gain reduction
        assert!(processed.iter().all(|&x| x.abs() <= 1.0));  // No clipping
    }

    #[test]
    fn test_lookahead_continuity_across_chunks() {
        let config = CompressorConfig::default();
        let mut compressor = Compressor::new(config);

        let chunk_a = vec![0.3f32; 512];
        let chunk_b = vec![0.3f32; 512];

        let (out_a, _) = compressor.process(&chunk_a, DetectionMode::Peak);
        let (out_b, _) = compressor.process(&chunk_b, DetectionMode::Peak);

        // The lookahead buffer should have settled to a steady fill level
        // by the second chunk, so no further zero-padded samples appear.
        assert_eq!(out_a.len(), chunk_a.len());
        assert_eq!(out_b.len(), chunk_b.len());
        assert!(out_b.iter().all(|&x| x != 0.0));
    }

    #[test]
    fn test_detection_modes() {
        let audio: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
        let config = CompressorConfig::default();

        let (_, info_peak) = compress(&audio, &config, DetectionMode::Peak);
        let (_, info_rms) = compress(&audio, &config, DetectionMode::Rms);
        let (_, info_hybrid) = compress(&audio, &config, DetectionMode::Hybrid);

        // All should produce valid results
        assert!(info_peak.input_level_db.is_finite());
        assert!(info_rms.input_level_db.is_finite());
        assert!(info_hybrid.input_level_db.is_finite());
    }
}
