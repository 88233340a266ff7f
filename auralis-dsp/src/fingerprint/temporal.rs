/// Rhythmic and transient analysis: tempo, onset density, attack/sustain
/// shape, and transient density.
use crate::onset_detector::OnsetDetector;
use crate::tempo::{detect_tempo, TempoConfig};
use ndarray::Array1;

const ONSET_FFT_SIZE: usize = 2048;
const ONSET_HOP_LENGTH: usize = 512;
const TRANSIENT_THRESHOLD: f64 = 0.6;
const SUSTAIN_THRESHOLD_RATIO: f64 = 0.3;
const ATTACK_LOOKAHEAD_S: f64 = 0.2;

pub struct TemporalStats {
    pub tempo_bpm: f32,
    pub rhythm_strength: f32,
    pub onset_density: f32,
    pub attack_time: f32,
    pub sustain_ratio: f32,
    pub transient_density: f32,
}

/// `1 - coefficient_of_variation` of inter-onset intervals: close to 1.0
/// for a steady beat, close to 0.0 for scattered or absent onsets.
fn inter_onset_regularity(onset_times: &[f64]) -> f32 {
    if onset_times.len() < 3 {
        return 0.0;
    }
    let iois: Vec<f64> = onset_times.windows(2).map(|w| w[1] - w[0]).collect();
    let mean = iois.iter().sum::<f64>() / iois.len() as f64;
    if mean < 1e-6 {
        return 0.0;
    }
    let variance = iois.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / iois.len() as f64;
    let coefficient_of_variation = variance.sqrt() / mean;
    (1.0 - coefficient_of_variation).clamp(0.0, 1.0) as f32
}

/// Mean time (seconds) from each detected onset to the following local peak
/// in the onset strength envelope, bounded by a short lookahead window.
fn mean_attack_time(
    onset_env: &Array1<f64>,
    onset_frames: &[usize],
    hop_length: usize,
    sample_rate: f64,
) -> f32 {
    if onset_frames.is_empty() || onset_env.is_empty() {
        return 0.0;
    }
    let lookahead_frames = ((ATTACK_LOOKAHEAD_S * sample_rate) / hop_length as f64).ceil() as usize;

    let mut total = 0.0;
    let mut count = 0;
    for &onset in onset_frames {
        let search_end = (onset + lookahead_frames.max(1)).min(onset_env.len());
        if search_end <= onset {
            continue;
        }
        let mut peak_idx = onset;
        let mut peak_val = onset_env[onset];
        for i in onset..search_end {
            if onset_env[i] > peak_val {
                peak_val = onset_env[i];
                peak_idx = i;
            }
        }
        total += (peak_idx - onset) as f64 * hop_length as f64 / sample_rate;
        count += 1;
    }

    if count == 0 {
        0.0
    } else {
        (total / count as f64) as f32
    }
}

/// Fraction of frames whose short-window RMS stays above a fixed fraction
/// of the track's peak envelope: high for sustained/pad material, low for
/// plucked or percussive material.
fn sustain_ratio(audio: &[f32], hop_length: usize) -> f32 {
    if audio.is_empty() {
        return 0.0;
    }
    let frame_len = hop_length * 2;
    let mut envelope = Vec::new();
    let mut start = 0;
    while start < audio.len() {
        let end = (start + frame_len).min(audio.len());
        let count = (end - start).max(1);
        let rms = (audio[start..end].iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / count as f64).sqrt();
        envelope.push(rms);
        start += hop_length;
    }

    let peak = envelope.iter().cloned().fold(0.0, f64::max);
    if peak < 1e-10 {
        return 0.0;
    }
    let threshold = peak * SUSTAIN_THRESHOLD_RATIO;
    let above = envelope.iter().filter(|&&e| e > threshold).count();
    (above as f64 / envelope.len() as f64) as f32
}

pub fn analyze(mono: &[f32], sample_rate: u32) -> TemporalStats {
    if mono.is_empty() || sample_rate == 0 || mono.len() < ONSET_FFT_SIZE {
        return TemporalStats {
            tempo_bpm: 120.0,
            rhythm_strength: 0.0,
            onset_density: 0.0,
            attack_time: 0.0,
            sustain_ratio: 0.0,
            transient_density: 0.0,
        };
    }

    let sr = sample_rate as usize;
    let mono64: Vec<f64> = mono.iter().map(|&v| v as f64).collect();
    let duration_s = mono.len() as f64 / sample_rate as f64;

    let tempo_bpm = detect_tempo(&mono64, sr, &TempoConfig::default()) as f32;

    let audio_view = Array1::from(mono64);
    let detector = OnsetDetector::new(sample_rate as f64, ONSET_FFT_SIZE, ONSET_HOP_LENGTH);
    let result = detector.detect(&audio_view.view());
    let onset_times = detector.frames_to_time(&result.onset_frames);

    let onset_density = if duration_s > 0.0 {
        (result.onset_frames.len() as f64 / duration_s) as f32
    } else {
        0.0
    };
    let rhythm_strength = inter_onset_regularity(&onset_times);
    let attack_time = mean_attack_time(
        &result.onset_strength,
        &result.onset_frames,
        ONSET_HOP_LENGTH,
        sample_rate as f64,
    );
    let sustain = sustain_ratio(mono, ONSET_HOP_LENGTH);

    let transient_detector =
        OnsetDetector::new(sample_rate as f64, ONSET_FFT_SIZE, ONSET_HOP_LENGTH).with_threshold(TRANSIENT_THRESHOLD);
    let transient_result = transient_detector.detect(&audio_view.view());
    let transient_density = if duration_s > 0.0 {
        (transient_result.onset_frames.len() as f64 / duration_s) as f32
    } else {
        0.0
    };

    TemporalStats {
        tempo_bpm,
        rhythm_strength,
        onset_density,
        attack_time,
        sustain_ratio: sustain,
        transient_density,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_falls_back_to_default_tempo() {
        let stats = analyze(&[], 44100);
        assert_eq!(stats.tempo_bpm, 120.0);
        assert_eq!(stats.onset_density, 0.0);
    }

    #[test]
    fn silence_has_no_onsets() {
        let mono = vec![0.0f32; 44100 * 2];
        let stats = analyze(&mono, 44100);
        assert_eq!(stats.onset_density, 0.0);
        assert_eq!(stats.sustain_ratio, 0.0);
    }

    #[test]
    fn sustained_tone_has_high_sustain_ratio() {
        let sr = 44100;
        let mono: Vec<f32> = (0..sr * 2)
            .map(|i| (2.0 * std::f64::consts::PI * 440.0 * i as f64 / sr as f64).sin() as f32)
            .collect();
        let ratio = sustain_ratio(&mono, ONSET_HOP_LENGTH);
        assert!(ratio > 0.8);
    }

    #[test]
    fn steady_click_track_has_high_rhythm_strength() {
        let onset_times: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
        assert!(inter_onset_regularity(&onset_times) > 0.9);
    }

    #[test]
    fn irregular_onsets_have_low_rhythm_strength() {
        let onset_times = vec![0.0, 0.1, 0.9, 1.0, 3.5, 3.6, 8.0];
        assert!(inter_onset_regularity(&onset_times) < 0.5);
    }
}
