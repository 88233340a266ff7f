/// YIN Fundamental Frequency Detection
///
/// Autocorrelation-based pitch detection using the YIN algorithm
///
/// Reference:
/// de Cheveigné, Alain & Kawahara, Hideki.
/// "YIN, a fundamental frequency estimator for speech and music."
/// JASA 111, 2002.

const FRAME_LENGTH: usize = 2048;
const HOP_LENGTH: usize = 512;
const TROUGH_THRESHOLD: f64 = 0.1;

/// Difference function (step 2): `d(tau) = sum_j (x[j] - x[j+tau])^2` for
/// `tau` in `0..max_tau`, computed directly (frame length is small enough
/// that the O(n*tau) direct form beats FFT-based autocorrelation in code
/// complexity without costing much at this scale).
fn difference_function(frame: &[f64], max_tau: usize) -> Vec<f64> {
    let n = frame.len();
    let mut d = vec![0.0f64; max_tau];
    for tau in 1..max_tau {
        let mut sum = 0.0;
        for j in 0..(n - tau) {
            let delta = frame[j] - frame[j + tau];
            sum += delta * delta;
        }
        d[tau] = sum;
    }
    d
}

/// Cumulative mean normalized difference function (step 3): `d'(0) = 1`,
/// `d'(tau) = d(tau) / ((1/tau) * sum_{j=1}^{tau} d(j))`.
fn cumulative_mean_normalized_difference(d: &[f64]) -> Vec<f64> {
    let mut cmnd = vec![0.0f64; d.len()];
    cmnd[0] = 1.0;
    let mut running_sum = 0.0;
    for tau in 1..d.len() {
        running_sum += d[tau];
        cmnd[tau] = d[tau] * tau as f64 / running_sum.max(1e-12);
    }
    cmnd
}

/// Step 4: find the first local minimum below `TROUGH_THRESHOLD`; if none
/// qualifies, fall back to the global minimum (an unvoiced/noisy frame).
fn absolute_threshold(cmnd: &[f64]) -> Option<usize> {
    let mut tau = 2;
    while tau < cmnd.len() {
        if cmnd[tau] < TROUGH_THRESHOLD {
            while tau + 1 < cmnd.len() && cmnd[tau + 1] < cmnd[tau] {
                tau += 1;
            }
            return Some(tau);
        }
        tau += 1;
    }
    None
}

/// Step 5: parabolic interpolation around the chosen trough for sub-sample
/// period resolution.
fn parabolic_interpolation(cmnd: &[f64], tau: usize) -> f64 {
    if tau == 0 || tau + 1 >= cmnd.len() {
        return tau as f64;
    }
    let x0 = cmnd[tau - 1];
    let x1 = cmnd[tau];
    let x2 = cmnd[tau + 1];
    let denom = 2.0 * (2.0 * x1 - x2 - x0);
    if denom.abs() < 1e-12 {
        return tau as f64;
    }
    tau as f64 + (x2 - x0) / (2.0 * denom)
}

/// Detect fundamental frequency using the YIN algorithm.
///
/// # Returns
/// Fundamental frequency estimates, one per hop, 0.0 for unvoiced frames.
pub fn yin(y: &[f64], sr: usize, fmin: f64, fmax: f64) -> Vec<f64> {
    if y.len() < FRAME_LENGTH {
        return Vec::new();
    }

    let n_frames = (y.len() - FRAME_LENGTH) / HOP_LENGTH + 1;
    let mut f0_contour = vec![0.0f64; n_frames];

    let max_tau = (sr as f64 / fmin.max(1.0)).ceil() as usize;
    let min_tau = (sr as f64 / fmax.max(1.0)).floor().max(1.0) as usize;
    let max_tau = max_tau.min(FRAME_LENGTH / 2).max(min_tau + 2);

    for (frame_idx, f0_slot) in f0_contour.iter_mut().enumerate() {
        let start = frame_idx * HOP_LENGTH;
        let frame = &y[start..start + FRAME_LENGTH];

        let d = difference_function(frame, max_tau);
        let cmnd = cumulative_mean_normalized_difference(&d);

        // Restrict the search to the [min_tau, max_tau) range implied by
        // fmin/fmax before applying the absolute threshold.
        let search_range = &cmnd[min_tau..max_tau];
        if let Some(local_tau) = absolute_threshold(search_range) {
            let tau = min_tau + local_tau;
            let refined_tau = parabolic_interpolation(&cmnd, tau);
            if refined_tau > 0.0 {
                *f0_slot = sr as f64 / refined_tau;
            }
        }
    }

    f0_contour
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_yin_frame_count() {
        let audio = vec![0.0; 44100];
        let f0 = yin(&audio, 44100, 50.0, 2000.0);
        assert_eq!(f0.len(), (audio.len() - FRAME_LENGTH) / HOP_LENGTH + 1);
    }

    #[test]
    fn silence_is_unvoiced() {
        let audio = vec![0.0; 44100];
        let f0 = yin(&audio, 44100, 50.0, 2000.0);
        assert!(f0.iter().all(|&f| f == 0.0));
    }

    #[test]
    fn pure_tone_is_detected_near_its_true_frequency() {
        let sr = 44100;
        let freq = 220.0;
        let audio: Vec<f64> = (0..sr)
            .map(|i| (2.0 * PI * freq * i as f64 / sr as f64).sin())
            .collect();

        let f0 = yin(&audio, sr, 80.0, 1000.0);
        let voiced: Vec<f64> = f0.iter().copied().filter(|&f| f > 0.0).collect();
        assert!(!voiced.is_empty());

        let mean: f64 = voiced.iter().sum::<f64>() / voiced.len() as f64;
        assert!((mean - freq).abs() < freq * 0.05);
    }
}
