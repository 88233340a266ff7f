/// Brick-wall Limiter
///
/// Final peak-limiting pass before the safety clip. Computes the gain
/// envelope from a true sliding-window maximum of the lookahead-delayed
/// signal (a monotonic deque, not a per-sample scan), so the limiter reacts
/// to a future peak before it reaches the output — no Python-style
/// sample-by-sample loop over the whole buffer to find "the" peak.
///
/// One `Limiter` is constructed per stream session and lives for the
/// session's lifetime: its delay line and sliding-window deque are what
/// carry continuity across chunk boundaries (the "previous chunk's tail"
/// the gain envelope seeds from). Reconstructing a `Limiter` per chunk call
/// would silently reset that continuity.
use crate::envelope::{EnvelopeConfig, EnvelopeFollower};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct LimiterConfig {
    pub sample_rate: usize,
    pub threshold_db: f32,
    pub release_ms: f32,
    pub lookahead_ms: f32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            threshold_db: -0.1,
            release_ms: 50.0,
            lookahead_ms: 5.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LimitingInfo {
    pub input_peak_db: f32,
    pub output_peak_db: f32,
    pub gain_reduction_db: f32,
    pub threshold_db: f32,
    pub peak_hold_db: f32,
}

pub struct Limiter {
    config: LimiterConfig,
    threshold_linear: f32,
    gain_smoother: EnvelopeFollower,

    delay_line: VecDeque<f32>,
    lookahead_samples: usize,

    /// Monotonic deque of (absolute sample position, |sample|), decreasing
    /// by value front-to-back, giving O(1) amortized window-maximum queries.
    window_max: VecDeque<(u64, f32)>,
    position: u64,

    current_gain: f32,
    peak_hold: f32,
}

impl Limiter {
    pub fn new(config: LimiterConfig) -> Self {
        let gain_config = EnvelopeConfig {
            sample_rate: config.sample_rate,
            attack_ms: 0.1,
            release_ms: config.release_ms,
        };
        let threshold_linear = 10f32.powf(config.threshold_db / 20.0);
        let lookahead_samples = ((config.lookahead_ms * config.sample_rate as f32 / 1000.0) as usize).max(1);

        Self {
            config,
            threshold_linear,
            gain_smoother: EnvelopeFollower::new(&gain_config),
            delay_line: VecDeque::with_capacity(lookahead_samples),
            lookahead_samples,
            window_max: VecDeque::new(),
            position: 0,
            current_gain: 1.0,
            peak_hold: 0.0,
        }
    }

    fn push_window_max(&mut self, abs_sample: f32) {
        while let Some(&(_, back_val)) = self.window_max.back() {
            if back_val <= abs_sample {
                self.window_max.pop_back();
            } else {
                break;
            }
        }
        self.window_max.push_back((self.position, abs_sample));

        let window_start = self.position.saturating_sub(self.lookahead_samples as u64);
        while let Some(&(idx, _)) = self.window_max.front() {
            if idx < window_start {
                self.window_max.pop_front();
            } else {
                break;
            }
        }
        self.position += 1;
    }

    fn current_window_max(&self) -> f32 {
        self.window_max.front().map(|&(_, v)| v).unwrap_or(0.0)
    }

    /// Process one chunk. `audio` is the *undelayed* input; the limiter
    /// internally maintains the lookahead delay line so the caller does not
    /// need to pre-delay anything.
    pub fn process(&mut self, audio: &[f32]) -> (Vec<f32>, LimitingInfo) {
        if audio.is_empty() {
            return (
                Vec::new(),
                LimitingInfo {
                    input_peak_db: -100.0,
                    output_peak_db: -100.0,
                    gain_reduction_db: 0.0,
                    threshold_db: self.config.threshold_db,
                    peak_hold_db: -100.0,
                },
            );
        }

        let input_peak = audio.iter().map(|&x| x.abs()).fold(0.0f32, f32::max);
        let mut output = Vec::with_capacity(audio.len());

        for &sample in audio {
            self.push_window_max(sample.abs());
            self.delay_line.push_back(sample);

            let window_max = self.current_window_max();
            let target_gain = if window_max > self.threshold_linear {
                self.threshold_linear / window_max
            } else {
                1.0
            };

            // Track required *reduction* rather than gain directly: a near-zero
            // attack time on the reduction means a deeper reduction is adopted
            // almost immediately, while recovery back toward unity gain eases
            // out over `release_ms`, which is the attack/release asymmetry a
            // brick-wall limiter needs (fast in, slow out).
            let target_reduction = (1.0 - target_gain).max(0.0);
            let smoothed_reduction = self.gain_smoother.process(target_reduction);
            let applied_gain = (1.0 - smoothed_reduction).clamp(0.0, 1.0);
            self.current_gain = applied_gain;

            let delayed = if self.delay_line.len() > self.lookahead_samples {
                self.delay_line.pop_front().unwrap()
            } else {
                0.0
            };

            output.push(delayed * applied_gain);
        }

        let output_peak = output.iter().map(|&x| x.abs()).fold(0.0f32, f32::max);
        self.peak_hold = (self.peak_hold * 0.999).max(output_peak);

        let info = LimitingInfo {
            input_peak_db: 20.0 * input_peak.max(1e-10).log10(),
            output_peak_db: 20.0 * output_peak.max(1e-10).log10(),
            gain_reduction_db: 20.0 * self.current_gain.max(1e-10).log10(),
            threshold_db: self.config.threshold_db,
            peak_hold_db: 20.0 * self.peak_hold.max(1e-10).log10(),
        };

        (output, info)
    }

    pub fn reset(&mut self) {
        self.gain_smoother.reset();
        self.delay_line.clear();
        self.window_max.clear();
        self.position = 0;
        self.current_gain = 1.0;
        self.peak_hold = 0.0;
    }

    pub fn get_state(&self) -> (f32, f32) {
        (self.current_gain, self.peak_hold)
    }
}

/// One-shot limiting, for tests and non-streaming callers. A fresh session's
/// worth of continuity state is created and discarded.
pub fn limit(audio: &[f32], config: &LimiterConfig) -> (Vec<f32>, LimitingInfo) {
    let mut limiter = Limiter::new(config.clone());
    limiter.process(audio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_creation_starts_at_unity_gain() {
        let limiter = Limiter::new(LimiterConfig::default());
        let (gain, peak_hold) = limiter.get_state();
        assert_eq!(gain, 1.0);
        assert_eq!(peak_hold, 0.0);
    }

    #[test]
    fn silence_passes_with_no_reduction() {
        let audio = vec![0.0; 1000];
        let (processed, info) = limit(&audio, &LimiterConfig::default());
        assert_eq!(processed.len(), audio.len());
        assert!(info.gain_reduction_db >= -1.0);
    }

    #[test]
    fn clipping_signal_is_held_at_threshold() {
        let audio = vec![1.2f32; 2000];
        let mut config = LimiterConfig::default();
        config.threshold_db = -0.1;
        let (processed, info) = limit(&audio, &config);

        let threshold_linear = 10f32.powf(config.threshold_db / 20.0);
        let max_output = processed.iter().map(|&x| x.abs()).fold(0.0f32, f32::max);
        assert!(max_output <= threshold_linear * 1.01);
        assert!(info.gain_reduction_db < 0.0);
    }

    #[test]
    fn continuity_across_chunks_anticipates_a_transient_before_it_arrives() {
        let mut config = LimiterConfig::default();
        config.threshold_db = -3.0;
        config.lookahead_ms = 5.0;
        let mut limiter = Limiter::new(config);

        let mut chunk_a = vec![0.1f32; 400];
        // A transient right at the end of chunk A should already start
        // pulling gain down before the delayed output reaches it, because
        // the sliding window looks past the chunk boundary conceptually via
        // persistent state across calls.
        chunk_a.extend(vec![1.5f32; 50]);
        let chunk_b = vec![0.1f32; 400];

        let (out_a, _) = limiter.process(&chunk_a);
        let (out_b, _) = limiter.process(&chunk_b);

        assert_eq!(out_a.len(), chunk_a.len());
        assert_eq!(out_b.len(), chunk_b.len());
        let max_out: f32 = out_a
            .iter()
            .chain(out_b.iter())
            .map(|x| x.abs())
            .fold(0.0, f32::max);
        let threshold_linear = 10f32.powf(-3.0 / 20.0);
        assert!(max_out <= threshold_linear * 1.05);
    }

    #[test]
    fn window_max_never_misses_the_true_peak() {
        let mut limiter = Limiter::new(LimiterConfig::default());
        let mut audio = vec![0.05f32; 200];
        audio[100] = 0.99;
        let (_, info) = limiter.process(&audio);
        assert!(info.input_peak_db > -1.0);
    }
}
