/// Parallel band shelving — stage 2 of the mastering pipeline.
///
/// For each of the seven perceptual bands (sub-bass through air) the band is
/// extracted with a band-pass (or shelf, at the spectrum's edges), then
/// mixed back additively: `output = input + band * (boost_linear - 1.0)`.
/// Each band gets its own freshly allocated intermediate array.
use crate::biquad_filter::{BiquadCascade, BiquadCoeffs};
use crate::buffer::AudioBuffer;
use crate::eq::{BAND_EDGES_HZ, NUM_BANDS};
use ndarray::Array2;

fn band_center_hz(band: usize) -> f64 {
    ((BAND_EDGES_HZ[band] as f64) * (BAND_EDGES_HZ[band + 1] as f64)).sqrt()
}

fn extraction_filter(sample_rate: f64, band: usize) -> BiquadCoeffs {
    let center = band_center_hz(band);
    if band == 0 {
        BiquadCoeffs::lowshelf(sample_rate, BAND_EDGES_HZ[1] as f64, 0.707, 0.0)
    } else if band == NUM_BANDS - 1 {
        BiquadCoeffs::highshelf(sample_rate, BAND_EDGES_HZ[NUM_BANDS - 1] as f64, 0.707, 0.0)
    } else {
        let bandwidth_hz = (BAND_EDGES_HZ[band + 1] - BAND_EDGES_HZ[band]) as f64;
        let q = (center / bandwidth_hz).max(0.3);
        BiquadCoeffs::bandpass(sample_rate, center, q)
    }
}

/// Apply additive parallel band shelving. `gains_db` are the boosts (positive
/// or negative) derived by the psychoacoustic analysis stage.
pub fn apply(buffer: &AudioBuffer, sample_rate: u32, gains_db: &[f32; NUM_BANDS]) -> AudioBuffer {
    let (channels, samples) = buffer.shape();
    let mut output = buffer.as_array().mapv(|v| v as f64);

    for band in 0..NUM_BANDS {
        let boost_linear = 10f64.powf(gains_db[band] as f64 / 20.0);
        if (boost_linear - 1.0).abs() < 1e-6 {
            continue; // 0 dB: extracting and re-adding a zero-weighted band is wasted work
        }

        let coeffs = extraction_filter(sample_rate as f64, band);
        let mut cascade = BiquadCascade::new(vec![coeffs], channels);

        // Each band gets its own independently allocated extraction buffer.
        let mut extracted = Array2::<f64>::zeros((channels, samples));
        for ch in 0..channels {
            let input_f64 = buffer.channel(ch).mapv(|v| v as f64);
            let band_signal = cascade.process(&input_f64.view(), ch);
            extracted.row_mut(ch).assign(&band_signal);
        }

        output = output + extracted.mapv(|v| v * (boost_linear - 1.0));
    }

    AudioBuffer::from_validated(output.mapv(|v| v as f32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn zero_gain_is_identity() {
        let data = arr2(&[[0.1f32, -0.2, 0.3, -0.1]]);
        let buf = AudioBuffer::new(data.clone()).unwrap();
        let gains = [0.0; NUM_BANDS];
        let out = apply(&buf, 44100, &gains);
        for (a, b) in out.as_array().iter().zip(data.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn preserves_shape_and_finiteness() {
        let data = Array2::<f32>::from_shape_fn((2, 4096), |(c, i)| {
            ((i as f32 * 0.01) + c as f32).sin() * 0.5
        });
        let buf = AudioBuffer::new(data).unwrap();
        let mut gains = [0.0; NUM_BANDS];
        gains[1] = 6.0;
        gains[5] = -6.0;
        let out = apply(&buf, 44100, &gains);
        assert_eq!(out.shape(), buf.shape());
        assert!(out.require_finite("band_shelf_test").is_ok());
    }
}
