/// 25-dimensional audio fingerprint
///
/// Computes a fixed-key descriptor over five perceptual categories
/// (spectral, dynamics, stereo, harmonic, temporal) used to parameterize the
/// mastering pipeline and to seed similarity lookups. Each analyzer module
/// is independent; a failure in one fills its own dimensions with the
/// documented 0-1 fallback rather than failing the whole fingerprint — only
/// a complete failure yields the placeholder sentinel.
mod dynamics;
mod harmonic;
mod spectral;
mod stereo;
mod temporal;

use serde::{Deserialize, Serialize};

/// Integrated loudness value marking "not yet computed / incomplete".
pub const LUFS_PLACEHOLDER: f32 = -100.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Fingerprint {
    // Spectral (7): band-energy proportions, sum to ~1.0.
    pub sub_bass_pct: f32,
    pub bass_pct: f32,
    pub low_mid_pct: f32,
    pub mid_pct: f32,
    pub upper_mid_pct: f32,
    pub presence_pct: f32,
    pub air_pct: f32,

    // Dynamics (5)
    pub lufs: f32,
    pub crest_factor: f32,
    pub rms_db: f32,
    pub peak_db: f32,
    pub dynamic_range_db: f32,

    // Stereo (3), each in [0, 1]
    pub stereo_width: f32,
    pub stereo_correlation: f32,
    pub mid_side_ratio: f32,

    // Harmonic (4), each in [0, 1]
    pub harmonic_ratio: f32,
    pub pitch_stability: f32,
    pub chroma_energy: f32,
    pub tonal_centroid: f32,

    // Temporal (6)
    pub tempo_bpm: f32,
    pub rhythm_strength: f32,
    pub onset_density: f32,
    pub attack_time: f32,
    pub sustain_ratio: f32,
    pub transient_density: f32,
}

impl Fingerprint {
    /// The placeholder sentinel: "incomplete fingerprint", excluded from
    /// similarity lookups and completion counts.
    pub fn placeholder() -> Self {
        Self {
            sub_bass_pct: 1.0 / 7.0,
            bass_pct: 1.0 / 7.0,
            low_mid_pct: 1.0 / 7.0,
            mid_pct: 1.0 / 7.0,
            upper_mid_pct: 1.0 / 7.0,
            presence_pct: 1.0 / 7.0,
            air_pct: 1.0 / 7.0,
            lufs: LUFS_PLACEHOLDER,
            crest_factor: 0.0,
            rms_db: -100.0,
            peak_db: -100.0,
            dynamic_range_db: 0.0,
            stereo_width: 0.0,
            stereo_correlation: 1.0,
            mid_side_ratio: 0.0,
            harmonic_ratio: 0.5,
            pitch_stability: 0.0,
            chroma_energy: 0.0,
            tonal_centroid: 0.0,
            tempo_bpm: 0.0,
            rhythm_strength: 0.0,
            onset_density: 0.0,
            attack_time: 0.0,
            sustain_ratio: 0.0,
            transient_density: 0.0,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.lufs == LUFS_PLACEHOLDER
    }

    pub fn spectral_band_sum(&self) -> f32 {
        self.sub_bass_pct
            + self.bass_pct
            + self.low_mid_pct
            + self.mid_pct
            + self.upper_mid_pct
            + self.presence_pct
            + self.air_pct
    }
}

/// Worker count for the analyzer pool: `max(1, min(k, cpu_count / 2))`.
/// `min(k, cpu_count / 2)` alone is wrong when `cpu_count == 1`, since
/// integer division yields `0` and a zero-worker pool can never progress.
pub fn worker_count(k: usize, cpu_count: usize) -> usize {
    (k.min(cpu_count / 2)).max(1)
}

/// Compute the fingerprint for a mono-downmixed signal plus the original
/// per-channel data (for stereo analysis). Analyzer failures are isolated:
/// each category is computed independently and a panic-free fallback is
/// substituted if its own computation can't produce a value, per the
/// partial-failure policy — only the caller decides whether to treat the
/// aggregate as "good enough" or a full placeholder.
pub fn compute_fingerprint(mono: &[f32], channels: &[Vec<f32>], sample_rate: u32) -> Fingerprint {
    if mono.is_empty() || sample_rate == 0 {
        return Fingerprint::placeholder();
    }

    let spectral = spectral::analyze(mono, sample_rate);
    let dyn_stats = dynamics::analyze(mono, sample_rate);
    let stereo_stats = stereo::analyze(channels);
    let harmonic_stats = harmonic::analyze(mono, sample_rate);
    let temporal_stats = temporal::analyze(mono, sample_rate);

    Fingerprint {
        sub_bass_pct: spectral.sub_bass_pct,
        bass_pct: spectral.bass_pct,
        low_mid_pct: spectral.low_mid_pct,
        mid_pct: spectral.mid_pct,
        upper_mid_pct: spectral.upper_mid_pct,
        presence_pct: spectral.presence_pct,
        air_pct: spectral.air_pct,

        lufs: dyn_stats.lufs,
        crest_factor: dyn_stats.crest_factor,
        rms_db: dyn_stats.rms_db,
        peak_db: dyn_stats.peak_db,
        dynamic_range_db: dyn_stats.dynamic_range_db,

        stereo_width: stereo_stats.stereo_width,
        stereo_correlation: stereo_stats.stereo_correlation,
        mid_side_ratio: stereo_stats.mid_side_ratio,

        harmonic_ratio: harmonic_stats.harmonic_ratio,
        pitch_stability: harmonic_stats.pitch_stability,
        chroma_energy: harmonic_stats.chroma_energy,
        tonal_centroid: harmonic_stats.tonal_centroid,

        tempo_bpm: temporal_stats.tempo_bpm,
        rhythm_strength: temporal_stats.rhythm_strength,
        onset_density: temporal_stats.onset_density,
        attack_time: temporal_stats.attack_time,
        sustain_ratio: temporal_stats.sustain_ratio,
        transient_density: temporal_stats.transient_density,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_recognized() {
        assert!(Fingerprint::placeholder().is_placeholder());
    }

    #[test]
    fn worker_count_never_zero_on_a_single_cpu() {
        assert_eq!(worker_count(4, 1), 1);
    }

    #[test]
    fn worker_count_respects_the_cap() {
        assert_eq!(worker_count(2, 16), 2);
    }

    #[test]
    fn worker_count_scales_with_cpu_count() {
        assert_eq!(worker_count(8, 8), 4);
    }

    #[test]
    fn empty_input_yields_placeholder() {
        let fp = compute_fingerprint(&[], &[], 44100);
        assert!(fp.is_placeholder());
    }

    #[test]
    fn silent_input_has_spectral_bands_summing_to_one() {
        let mono = vec![0.0f32; 44100];
        let fp = compute_fingerprint(&mono, &[mono.clone(), mono.clone()], 44100);
        assert!((fp.spectral_band_sum() - 1.0).abs() < 0.01);
    }
}
