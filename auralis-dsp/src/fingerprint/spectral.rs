/// Spectral band energy distribution, wrapping the 7-band FFT analyzer.
use crate::frequency_analysis::compute_frequency_distribution;

pub struct SpectralStats {
    pub sub_bass_pct: f32,
    pub bass_pct: f32,
    pub low_mid_pct: f32,
    pub mid_pct: f32,
    pub upper_mid_pct: f32,
    pub presence_pct: f32,
    pub air_pct: f32,
}

pub fn analyze(mono: &[f32], sample_rate: u32) -> SpectralStats {
    let bands = compute_frequency_distribution(mono, sample_rate);
    SpectralStats {
        sub_bass_pct: bands.sub_bass,
        bass_pct: bands.bass,
        low_mid_pct: bands.low_mid,
        mid_pct: bands.mid,
        upper_mid_pct: bands.upper_mid,
        presence_pct: bands.presence,
        air_pct: bands.air,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_sum_to_about_one() {
        let mono = vec![0.0f32; 44100];
        let stats = analyze(&mono, 44100);
        let sum = stats.sub_bass_pct
            + stats.bass_pct
            + stats.low_mid_pct
            + stats.mid_pct
            + stats.upper_mid_pct
            + stats.presence_pct
            + stats.air_pct;
        assert!((sum - 1.0).abs() < 0.01);
    }
}
