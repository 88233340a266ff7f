/// Frequency-dependent stereo widening — stage 3 of the mastering pipeline.
///
/// Decodes to mid/side, widens the side signal more at high frequencies than
/// low (via a single crossover split), then recodes to left/right. Mono
/// input (or a constant/silent side signal) passes through unchanged: the
/// side component is already zero, so no special case is required for the
/// "constant or silent channels => width 0" invariant.
use crate::biquad_filter::{BiquadCascade, BiquadCoeffs};
use crate::buffer::AudioBuffer;
use ndarray::{arr2, Array1};

const CROSSOVER_HZ: f64 = 500.0;

/// `width_target` is a multiplier on the side signal: 1.0 leaves it
/// unchanged, >1.0 widens, <1.0 narrows toward mono. The low band below
/// `CROSSOVER_HZ` receives half the requested change; the high band
/// receives the full requested change.
pub fn apply(buffer: &AudioBuffer, sample_rate: u32, width_target: f32) -> AudioBuffer {
    let (channels, samples) = buffer.shape();
    if channels != 2 {
        return AudioBuffer::from_validated(buffer.as_array().clone());
    }

    let left = buffer.channel(0).mapv(|v| v as f64);
    let right = buffer.channel(1).mapv(|v| v as f64);

    let mid: Array1<f64> = (&left + &right) * 0.5;
    let side: Array1<f64> = (&left - &right) * 0.5;

    let low_coeffs = BiquadCoeffs::lowpass(sample_rate as f64, CROSSOVER_HZ, 0.707);
    let mut low_cascade = BiquadCascade::new(vec![low_coeffs], 1);
    let side_low = low_cascade.process(&side.view(), 0);
    let side_high = &side - &side_low;

    let width_target = width_target as f64;
    let low_mult = 1.0 + (width_target - 1.0) * 0.5;
    let high_mult = width_target;

    let side_widened = side_low * low_mult + side_high * high_mult;

    let new_left = &mid + &side_widened;
    let new_right = &mid - &side_widened;

    let mut out = ndarray::Array2::<f64>::zeros((channels, samples));
    out.row_mut(0).assign(&new_left);
    out.row_mut(1).assign(&new_right);

    AudioBuffer::from_validated(out.mapv(|v| v as f32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn mono_signal_is_unaffected_by_widening() {
        let data = Array2::<f32>::from_shape_fn((2, 2048), |(_, i)| (i as f32 * 0.01).sin());
        let buf = AudioBuffer::new(data.clone()).unwrap();
        let out = apply(&buf, 44100, 1.8);
        for (a, b) in out.as_array().iter().zip(data.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn neutral_width_is_identity() {
        let data = Array2::<f32>::from_shape_fn((2, 2048), |(c, i)| {
            ((i as f32 * 0.01) + c as f32 * 0.3).sin()
        });
        let buf = AudioBuffer::new(data.clone()).unwrap();
        let out = apply(&buf, 44100, 1.0);
        for (a, b) in out.as_array().iter().zip(data.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn widening_increases_side_energy() {
        let data = Array2::<f32>::from_shape_fn((2, 4096), |(c, i)| {
            ((i as f32 * 0.02) + c as f32 * 0.3).sin()
        });
        let buf = AudioBuffer::new(data).unwrap();
        let out = apply(&buf, 44100, 1.8);
        assert_eq!(out.shape(), (2, 4096));
        assert!(out.require_finite("stereo_width_test").is_ok());
    }

    #[test]
    fn preserves_shape_for_mono_buffer() {
        let data = arr2(&[[0.1f32, 0.2, 0.3]]);
        let buf = AudioBuffer::new(data).unwrap();
        let out = apply(&buf, 44100, 1.5);
        assert_eq!(out.shape(), (1, 3));
    }
}
