/// Psychoacoustic EQ analysis — stage 1 of the mastering pipeline.
///
/// Computes per-band energy over a windowed FFT and derives adaptive gains
/// against a target curve (normally the fingerprint's spectral percentages
/// reshaped by the active preset). Gains are clipped to +/-12 dB.
use crate::buffer::AudioBuffer;
use rustfft::{num_complex::Complex32, FftPlanner};
use std::f32::consts::PI;

pub const NUM_BANDS: usize = 7;
pub const BAND_EDGES_HZ: [f32; NUM_BANDS + 1] =
    [20.0, 60.0, 250.0, 500.0, 2000.0, 4000.0, 8000.0, 20000.0];

/// Hanning window coherent-gain compensation: a Hann window attenuates the
/// mean magnitude by ~0.5 (-6.02 dB); multiply recovered magnitudes back up
/// before comparing against a target expressed in un-windowed terms.
const HANN_COHERENT_GAIN_COMPENSATION_DB: f32 = 6.02;

fn hann_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (n - 1) as f32).cos()))
        .collect()
}

fn hz_to_bin(hz: f32, sample_rate: u32, fft_size: usize) -> usize {
    (((hz * fft_size as f32) / sample_rate as f32).floor() as usize).min(fft_size / 2)
}

/// Measure the current chunk's band-energy proportions (sums to ~1.0, or a
/// uniform distribution on silent/empty input).
pub fn measure_band_energy(mono: &[f32], sample_rate: u32) -> [f32; NUM_BANDS] {
    if mono.is_empty() || sample_rate == 0 {
        return [1.0 / NUM_BANDS as f32; NUM_BANDS];
    }

    let fft_size = mono.len().next_power_of_two().clamp(256, 1 << 15);
    let window = hann_window(mono.len().min(fft_size));

    let mut input = vec![Complex32::new(0.0, 0.0); fft_size];
    for (i, &s) in mono.iter().take(fft_size).enumerate() {
        input[i].re = s * window.get(i).copied().unwrap_or(1.0);
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);
    fft.process(&mut input);

    let compensation = 10f32.powf(HANN_COHERENT_GAIN_COMPENSATION_DB / 20.0);
    let psd: Vec<f32> = input[..fft_size / 2 + 1]
        .iter()
        .map(|c| (c.norm() * compensation).powi(2))
        .collect();

    let mut bins = [0usize; NUM_BANDS + 1];
    for (i, &hz) in BAND_EDGES_HZ.iter().enumerate() {
        bins[i] = hz_to_bin(hz.min(sample_rate as f32 / 2.0), sample_rate, fft_size);
    }

    let mut energy = [0.0f32; NUM_BANDS];
    for band in 0..NUM_BANDS {
        let start = bins[band];
        let end = bins[band + 1].max(start).min(psd.len());
        energy[band] = psd[start..end].iter().sum();
    }

    let total: f32 = energy.iter().sum();
    if total > 0.0 {
        for e in &mut energy {
            *e /= total;
        }
    } else {
        energy = [1.0 / NUM_BANDS as f32; NUM_BANDS];
    }
    energy
}

/// Derive per-band gains (dB) by comparing measured energy proportions
/// against `target_curve` (also proportions summing to ~1.0). Silent bands
/// (measured == 0) yield gain 0, never NaN.
pub fn adaptive_band_gains_db(measured: &[f32; NUM_BANDS], target_curve: &[f32; NUM_BANDS]) -> [f32; NUM_BANDS] {
    let mut gains = [0.0f32; NUM_BANDS];
    for i in 0..NUM_BANDS {
        if measured[i] <= 1e-12 || target_curve[i] <= 1e-12 {
            gains[i] = 0.0;
            continue;
        }
        let ratio_db = 10.0 * (target_curve[i] / measured[i]).log10();
        gains[i] = ratio_db.clamp(-12.0, 12.0);
    }
    gains
}

/// Convenience: measure a buffer's per-band gains against a target curve in
/// one call, for the chunked processor's stage-1 entry point.
pub fn analyze(buffer: &AudioBuffer, sample_rate: u32, target_curve: &[f32; NUM_BANDS]) -> [f32; NUM_BANDS] {
    let mono = buffer.to_mono();
    let measured = measure_band_energy(&mono, sample_rate);
    adaptive_band_gains_db(&measured, target_curve)
}

/// Reduced-quality stand-in for `analyze` that skips the FFT measurement
/// entirely: treats the chunk as if it measured a flat spectrum, so the
/// returned gains come straight from `target_curve` against a uniform
/// baseline. Used for a session's first chunk, where shaving the FFT off
/// the time-to-first-audio matters more than this one chunk's gain
/// accuracy -- every later chunk goes through `analyze` as normal.
pub fn fast_start_gains_db(target_curve: &[f32; NUM_BANDS]) -> [f32; NUM_BANDS] {
    let uniform = [1.0 / NUM_BANDS as f32; NUM_BANDS];
    adaptive_band_gains_db(&uniform, target_curve)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_input_yields_uniform_distribution() {
        let mono = vec![0.0f32; 4096];
        let energy = measure_band_energy(&mono, 44100);
        assert!((energy.iter().sum::<f32>() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn silent_bands_yield_zero_gain_not_nan() {
        let measured = [0.0; NUM_BANDS];
        let target = [1.0 / NUM_BANDS as f32; NUM_BANDS];
        let gains = adaptive_band_gains_db(&measured, &target);
        assert!(gains.iter().all(|g| g.is_finite() && *g == 0.0));
    }

    #[test]
    fn fast_start_gains_match_a_uniform_measurement() {
        let target = [0.4, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1];
        let uniform = [1.0 / NUM_BANDS as f32; NUM_BANDS];
        assert_eq!(fast_start_gains_db(&target), adaptive_band_gains_db(&uniform, &target));
    }

    #[test]
    fn gains_are_clipped_to_twelve_db() {
        let measured = [1e-6, 0.9998, 1e-6, 1e-6, 1e-6, 1e-6, 1e-6];
        let target = [1.0 / NUM_BANDS as f32; NUM_BANDS];
        let gains = adaptive_band_gains_db(&measured, &target);
        assert!(gains.iter().all(|g| *g >= -12.0 && *g <= 12.0));
    }

    #[test]
    fn band_table_starts_above_zero_hz() {
        assert!(BAND_EDGES_HZ[0] > 0.0);
    }
}
