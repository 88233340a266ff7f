/// Chroma Features
///
/// Extracts a 12-dimensional chromagram (energy per pitch class) from audio
/// using a bank of constant-Q-spaced bandpass filters folded into octaves,
/// rather than a full constant-Q transform — cheaper, and accurate enough
/// for the chroma-energy dimension this feeds.
///
/// Reference:
/// Brown, Judith C. "Calculation of a constant Q spectral transform." JASA 89, 1991.

use crate::biquad_filter::{BiquadCascade, BiquadCoeffs};
use ndarray::{Array1, Array2};

const N_CHROMA: usize = 12;
const MIN_OCTAVE_HZ: f64 = 55.0; // A1
const N_OCTAVES: usize = 6; // up to ~3.5 kHz, covering the musically relevant range
const HOP_LENGTH: usize = 512;
const FRAME_LENGTH: usize = 2048;

fn pitch_class_hz(pitch_class: usize, octave: usize) -> f64 {
    // 12-TET spacing from MIN_OCTAVE_HZ.
    MIN_OCTAVE_HZ * 2f64.powf(octave as f64 + pitch_class as f64 / N_CHROMA as f64)
}

/// Extract a chromagram using a constant-Q-spaced bandpass filter bank.
///
/// # Returns
/// Chromagram `[12, n_frames]`, energy per pitch class per frame.
pub fn chroma_cqt(y: &[f64], sr: usize) -> Array2<f64> {
    if y.len() < FRAME_LENGTH || sr == 0 {
        return Array2::zeros((N_CHROMA, 0));
    }

    let y32: Vec<f32> = y.iter().map(|&v| v as f32).collect();
    let n_frames = (y.len() - FRAME_LENGTH) / HOP_LENGTH + 1;
    let mut chroma = Array2::<f64>::zeros((N_CHROMA, n_frames));

    // One bandpass filter per (pitch class, octave), run over the whole
    // signal once, then the frame energies are pooled per hop.
    for pc in 0..N_CHROMA {
        let mut class_energy = vec![0.0f64; n_frames];

        for octave in 0..N_OCTAVES {
            let center_hz = pitch_class_hz(pc, octave);
            let nyquist = sr as f64 / 2.0;
            if center_hz >= nyquist * 0.98 {
                continue;
            }
            // Q tuned to roughly a semitone-wide passband (constant-Q).
            let q = 1.0 / (2f64.powf(1.0 / N_CHROMA as f64) - 1.0);
            let coeffs = BiquadCoeffs::bandpass(sr as f64, center_hz, q);
            let mut cascade = BiquadCascade::new(vec![coeffs], 1);

            let input = Array1::from(y32.iter().map(|&s| s as f64).collect::<Vec<f64>>());
            let filtered = cascade.process(&input.view(), 0);

            for (frame_idx, energy_slot) in class_energy.iter_mut().enumerate() {
                let start = frame_idx * HOP_LENGTH;
                let end = (start + FRAME_LENGTH).min(filtered.len());
                if start >= end {
                    continue;
                }
                let frame_energy: f64 =
                    filtered.slice(ndarray::s![start..end]).iter().map(|v| v * v).sum();
                *energy_slot += frame_energy;
            }
        }

        for (frame_idx, &e) in class_energy.iter().enumerate() {
            chroma[[pc, frame_idx]] = e;
        }
    }

    // Normalize each frame's chroma vector so it sums to 1 (relative
    // pitch-class distribution), leaving silent frames as all-zero.
    for frame_idx in 0..n_frames {
        let total: f64 = (0..N_CHROMA).map(|pc| chroma[[pc, frame_idx]]).sum();
        if total > 1e-12 {
            for pc in 0..N_CHROMA {
                chroma[[pc, frame_idx]] /= total;
            }
        }
    }

    chroma
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_chroma_cqt_shape() {
        let audio = vec![0.0; 44100];
        let chroma = chroma_cqt(&audio, 44100);
        assert_eq!(chroma.nrows(), 12);
    }

    #[test]
    fn silence_yields_zero_chroma() {
        let audio = vec![0.0; 44100];
        let chroma = chroma_cqt(&audio, 44100);
        assert!(chroma.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn frames_sum_to_about_one_on_tonal_input() {
        let sr = 44100;
        let freq = 220.0; // A3, aligned with a pitch-class center
        let audio: Vec<f64> = (0..sr)
            .map(|i| (2.0 * PI * freq * i as f64 / sr as f64).sin())
            .collect();
        let chroma = chroma_cqt(&audio, sr);

        let mid_frame = chroma.ncols() / 2;
        let total: f64 = (0..N_CHROMA).map(|pc| chroma[[pc, mid_frame]]).sum();
        assert!((total - 1.0).abs() < 0.05);
    }
}
