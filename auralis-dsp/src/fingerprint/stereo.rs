/// Stereo field statistics: width, phase correlation, and mid/side energy
/// ratio, wrapping the channel-pair analyzers. Mono input (fewer than two
/// channels) yields the documented mono fallbacks rather than failing.
use crate::stereo_analysis::{compute_phase_correlation, compute_stereo_width};

pub struct StereoStats {
    pub stereo_width: f32,
    pub stereo_correlation: f32,
    pub mid_side_ratio: f32,
}

fn mid_side_ratio(left: &[f32], right: &[f32]) -> f32 {
    if left.is_empty() || left.len() != right.len() {
        return 0.0;
    }
    let mid_energy: f32 = left
        .iter()
        .zip(right.iter())
        .map(|(&l, &r)| {
            let m = (l + r) * 0.5;
            m * m
        })
        .sum();
    let side_energy: f32 = left
        .iter()
        .zip(right.iter())
        .map(|(&l, &r)| {
            let s = (l - r) * 0.5;
            s * s
        })
        .sum();
    let total = mid_energy + side_energy;
    if total < 1e-10 {
        return 0.0;
    }
    (side_energy / total).clamp(0.0, 1.0)
}

pub fn analyze(channels: &[Vec<f32>]) -> StereoStats {
    if channels.len() < 2 {
        return StereoStats {
            stereo_width: 0.0,
            stereo_correlation: 1.0,
            mid_side_ratio: 0.0,
        };
    }

    let left = &channels[0];
    let right = &channels[1];

    StereoStats {
        stereo_width: compute_stereo_width(left, right),
        // Correlation is reported on [0, 1]: remap the [-1, 1] phase
        // correlation so fully out-of-phase content reads as 0, not -1.
        stereo_correlation: ((compute_phase_correlation(left, right) + 1.0) * 0.5).clamp(0.0, 1.0),
        mid_side_ratio: mid_side_ratio(left, right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_input_yields_documented_fallback() {
        let stats = analyze(&[]);
        assert_eq!(stats.stereo_width, 0.0);
        assert_eq!(stats.stereo_correlation, 1.0);
    }

    #[test]
    fn identical_channels_are_narrow_and_correlated() {
        let left = vec![0.1, 0.2, 0.3, 0.4];
        let right = left.clone();
        let stats = analyze(&[left, right]);
        assert!(stats.stereo_width < 0.1);
        assert!(stats.stereo_correlation > 0.9);
        assert!(stats.mid_side_ratio < 0.1);
    }

    #[test]
    fn inverted_channels_are_wide() {
        let left = vec![0.5, 0.5, 0.5, 0.5];
        let right = vec![-0.5, -0.5, -0.5, -0.5];
        let stats = analyze(&[left, right]);
        assert!(stats.stereo_width > 0.5);
        assert!(stats.mid_side_ratio > 0.5);
    }
}
