/// Loudness and dynamics analysis (BS.1770 integrated LUFS, crest factor,
/// RMS/peak levels, loudness range).
///
/// Reference:
/// ITU-R BS.1770-4, "Algorithms to measure audio programme loudness and
/// true-peak audio level."
use crate::biquad_filter::{BiquadCascade, BiquadCoeffs};

const BLOCK_MS: f64 = 400.0;
const BLOCK_HOP_MS: f64 = 100.0; // 75% overlap
const ABSOLUTE_GATE_LUFS: f64 = -70.0;
const RELATIVE_GATE_OFFSET: f64 = -10.0;
const SHORT_TERM_MS: f64 = 3000.0;
const SHORT_TERM_HOP_MS: f64 = 1000.0;

pub struct DynamicsStats {
    pub lufs: f32,
    pub crest_factor: f32,
    pub rms_db: f32,
    pub peak_db: f32,
    pub dynamic_range_db: f32,
}

fn linear_to_db(x: f64) -> f64 {
    if x < 1e-10 {
        -100.0
    } else {
        20.0 * x.log10()
    }
}

/// BS.1770 K-weighting: a high-shelf pre-filter approximating the head
/// diffraction response, cascaded with a high-pass filter approximating the
/// RLB (revised low-frequency B) weighting curve.
fn k_weight(signal: &[f64], sr: f64) -> Vec<f64> {
    let pre_filter = BiquadCoeffs::highshelf(sr, 1500.0, 0.707, 4.0);
    let rlb_filter = BiquadCoeffs::highpass(sr, 38.0, 0.5);
    let mut cascade = BiquadCascade::new(vec![pre_filter, rlb_filter], 1);
    let input = ndarray::Array1::from(signal.to_vec());
    cascade.process(&input.view(), 0).to_vec()
}

fn block_mean_square(weighted: &[f64], start: usize, len: usize) -> Option<f64> {
    if start + len > weighted.len() {
        return None;
    }
    let sum_sq: f64 = weighted[start..start + len].iter().map(|v| v * v).sum();
    Some(sum_sq / len as f64)
}

fn loudness_from_mean_square(mean_square: f64) -> f64 {
    if mean_square < 1e-20 {
        ABSOLUTE_GATE_LUFS - 10.0
    } else {
        -0.691 + 10.0 * mean_square.log10()
    }
}

/// Gated integrated loudness per BS.1770: an absolute gate at -70 LUFS,
/// then a relative gate 10 LU below the mean of the blocks that already
/// passed the absolute gate.
fn integrated_lufs(signal: &[f64], sr: usize) -> f64 {
    let block_len = ((BLOCK_MS / 1000.0) * sr as f64) as usize;
    let hop_len = ((BLOCK_HOP_MS / 1000.0) * sr as f64) as usize;
    if block_len == 0 || signal.len() < block_len {
        return ABSOLUTE_GATE_LUFS;
    }

    let weighted = k_weight(signal, sr as f64);
    let mut block_powers = Vec::new();
    let mut start = 0;
    while let Some(ms) = block_mean_square(&weighted, start, block_len) {
        block_powers.push(ms);
        start += hop_len.max(1);
    }
    if block_powers.is_empty() {
        return ABSOLUTE_GATE_LUFS;
    }

    let absolute_passed: Vec<f64> = block_powers
        .iter()
        .copied()
        .filter(|&p| loudness_from_mean_square(p) > ABSOLUTE_GATE_LUFS)
        .collect();
    if absolute_passed.is_empty() {
        return ABSOLUTE_GATE_LUFS;
    }

    let mean_power: f64 = absolute_passed.iter().sum::<f64>() / absolute_passed.len() as f64;
    let relative_gate = loudness_from_mean_square(mean_power) + RELATIVE_GATE_OFFSET;

    let gated_passed: Vec<f64> = absolute_passed
        .iter()
        .copied()
        .filter(|&p| loudness_from_mean_square(p) > relative_gate)
        .collect();
    if gated_passed.is_empty() {
        return loudness_from_mean_square(mean_power);
    }

    let gated_mean: f64 = gated_passed.iter().sum::<f64>() / gated_passed.len() as f64;
    loudness_from_mean_square(gated_mean)
}

/// Loudness range: the spread between the high and low percentiles of
/// short-term (3 s) loudness, approximating EBU R128's LRA measure.
fn loudness_range(signal: &[f64], sr: usize) -> f64 {
    let block_len = ((SHORT_TERM_MS / 1000.0) * sr as f64) as usize;
    let hop_len = ((SHORT_TERM_HOP_MS / 1000.0) * sr as f64) as usize;
    if block_len == 0 || signal.len() < block_len {
        return 0.0;
    }

    let weighted = k_weight(signal, sr as f64);
    let mut loudness_values = Vec::new();
    let mut start = 0;
    while let Some(ms) = block_mean_square(&weighted, start, block_len) {
        let l = loudness_from_mean_square(ms);
        if l > ABSOLUTE_GATE_LUFS {
            loudness_values.push(l);
        }
        start += hop_len.max(1);
    }
    if loudness_values.len() < 2 {
        return 0.0;
    }

    loudness_values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let low_idx = ((loudness_values.len() as f64 - 1.0) * 0.10).round() as usize;
    let high_idx = ((loudness_values.len() as f64 - 1.0) * 0.95).round() as usize;
    (loudness_values[high_idx] - loudness_values[low_idx]).max(0.0)
}

pub fn analyze(mono: &[f32], sample_rate: u32) -> DynamicsStats {
    if mono.is_empty() || sample_rate == 0 {
        return DynamicsStats {
            lufs: super::LUFS_PLACEHOLDER,
            crest_factor: 0.0,
            rms_db: -100.0,
            peak_db: -100.0,
            dynamic_range_db: 0.0,
        };
    }

    let signal_f64: Vec<f64> = mono.iter().map(|&v| v as f64).collect();

    let peak_linear = mono.iter().fold(0.0f64, |acc, &v| acc.max(v.abs() as f64));
    let rms_linear = (signal_f64.iter().map(|v| v * v).sum::<f64>() / signal_f64.len() as f64).sqrt();
    let peak_db = linear_to_db(peak_linear);
    let rms_db = linear_to_db(rms_linear);

    let lufs = integrated_lufs(&signal_f64, sample_rate as usize);
    let dynamic_range_db = loudness_range(&signal_f64, sample_rate as usize);

    DynamicsStats {
        lufs: lufs as f32,
        crest_factor: (peak_db - rms_db).max(0.0) as f32,
        rms_db: rms_db as f32,
        peak_db: peak_db as f32,
        dynamic_range_db: dynamic_range_db as f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_yields_low_level_floor() {
        let mono = vec![0.0f32; 44100 * 2];
        let stats = analyze(&mono, 44100);
        assert!(stats.rms_db <= -90.0);
        assert!(stats.peak_db <= -90.0);
    }

    #[test]
    fn full_scale_square_wave_has_zero_crest_factor() {
        let mono = vec![1.0f32; 44100 * 2];
        let stats = analyze(&mono, 44100);
        assert!(stats.crest_factor < 1.0);
        assert!(stats.peak_db > -1.0);
    }

    #[test]
    fn sine_wave_has_positive_crest_factor() {
        let sr = 44100;
        let mono: Vec<f32> = (0..sr * 2)
            .map(|i| (2.0 * std::f64::consts::PI * 440.0 * i as f64 / sr as f64).sin() as f32)
            .collect();
        let stats = analyze(&mono, sr as u32);
        assert!(stats.crest_factor > 2.0);
    }

    #[test]
    fn quieter_signal_yields_lower_integrated_loudness() {
        let sr = 44100usize;
        let loud: Vec<f32> = (0..sr * 3)
            .map(|i| 0.8 * (2.0 * std::f64::consts::PI * 440.0 * i as f64 / sr as f64).sin() as f32)
            .collect();
        let quiet: Vec<f32> = loud.iter().map(|&s| s * 0.1).collect();

        let loud_stats = analyze(&loud, sr as u32);
        let quiet_stats = analyze(&quiet, sr as u32);
        assert!(loud_stats.lufs > quiet_stats.lufs);
    }
}
