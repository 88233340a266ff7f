/// Resolves `(preset, intensity, fingerprint)` into the `auralis_dsp`
/// pipeline's `ProcessingParams`. The preset table lives here so there is
/// exactly one place that knows what each named preset means; everything
/// downstream just asks for the resolved params.
use crate::constants::{clamp_intensity, is_valid_preset};
use crate::error::{AppError, Result};
use auralis_dsp::compressor::{CompressorConfig, DetectionMode};
use auralis_dsp::eq::NUM_BANDS;
use auralis_dsp::fingerprint::Fingerprint;
use auralis_dsp::pipeline::ProcessingParams;

/// Per-band boost in dB and a stereo-width delta, applied at full
/// `intensity = 1.0` and scaled linearly for other values (clamped at the
/// interval's ends by the caller, never extrapolated past them unboundedly
/// since intensity itself is already clamped to `[0, 2]`).
struct PresetCurve {
    band_boost_db: [f32; NUM_BANDS],
    stereo_width_delta: f32,
    compression_ratio: f32,
}

fn preset_curve(preset: &str) -> PresetCurve {
    match preset {
        "natural" => PresetCurve {
            band_boost_db: [0.0; NUM_BANDS],
            stereo_width_delta: 0.0,
            compression_ratio: 1.5,
        },
        "warm" => PresetCurve {
            band_boost_db: [1.5, 2.0, 1.0, -0.5, -1.0, -1.5, -1.0],
            stereo_width_delta: -0.05,
            compression_ratio: 2.0,
        },
        "bright" => PresetCurve {
            band_boost_db: [-1.0, -0.5, 0.0, 0.5, 1.5, 2.5, 2.0],
            stereo_width_delta: 0.05,
            compression_ratio: 2.0,
        },
        "punch" => PresetCurve {
            band_boost_db: [2.5, 1.5, -1.0, 0.5, 1.0, 0.0, -0.5],
            stereo_width_delta: 0.0,
            compression_ratio: 4.0,
        },
        "vocal" => PresetCurve {
            band_boost_db: [-2.0, -1.0, 1.0, 2.5, 2.0, 1.0, -0.5],
            stereo_width_delta: -0.1,
            compression_ratio: 3.0,
        },
        "gentle" => PresetCurve {
            band_boost_db: [0.5, 0.5, 0.0, 0.0, 0.5, 0.5, 0.5],
            stereo_width_delta: 0.0,
            compression_ratio: 1.2,
        },
        // "adaptive" and any other recognized-but-unlisted preset: lean
        // entirely on the fingerprint rather than a fixed curve.
        _ => PresetCurve {
            band_boost_db: [0.0; NUM_BANDS],
            stereo_width_delta: 0.0,
            compression_ratio: 2.5,
        },
    }
}

fn fingerprint_bands(fp: &Fingerprint) -> [f32; NUM_BANDS] {
    [
        fp.sub_bass_pct,
        fp.bass_pct,
        fp.low_mid_pct,
        fp.mid_pct,
        fp.upper_mid_pct,
        fp.presence_pct,
        fp.air_pct,
    ]
}

pub fn resolve(preset: &str, intensity: f32, fingerprint: &Fingerprint) -> Result<ProcessingParams> {
    if !is_valid_preset(preset) {
        return Err(AppError::invalid("unknown preset"));
    }
    let intensity = clamp_intensity(intensity);
    let curve = preset_curve(preset);

    let bands = fingerprint_bands(fingerprint);
    let mut target_curve = [0.0f32; NUM_BANDS];
    for i in 0..NUM_BANDS {
        let boost_linear = 10f32.powf((curve.band_boost_db[i] * intensity) / 20.0);
        target_curve[i] = bands[i] * boost_linear;
    }
    let sum: f32 = target_curve.iter().sum();
    if sum > 1e-6 {
        for v in &mut target_curve {
            *v /= sum;
        }
    } else {
        target_curve = [1.0 / NUM_BANDS as f32; NUM_BANDS];
    }

    let stereo_width_target = (1.0 + curve.stereo_width_delta * intensity).clamp(0.0, 2.0);

    // Bidirectional normalization: pull loud material down as well as quiet
    // material up, toward a fixed target LUFS regardless of which side of
    // it the track's measured loudness sits on. `lufs_delta > 0` means the
    // track measures quieter than target (needs boosting); `< 0` means it's
    // louder than target (needs taming).
    const TARGET_LUFS: f32 = -14.0;
    let lufs_delta = if fingerprint.lufs > -99.0 {
        TARGET_LUFS - fingerprint.lufs
    } else {
        0.0
    };
    // Louder-than-target material gets a lower (more aggressive) threshold;
    // quieter material gets a higher (gentler) one and leans on makeup gain
    // instead.
    let threshold_db = (-20.0 + lufs_delta * 0.3).clamp(-40.0, -3.0);
    // Direct output-level correction: the compressor's gain reduction alone
    // never moves a quiet track's level up, so the makeup stage carries that
    // half of the normalization explicitly.
    let makeup_gain_db = (lufs_delta * 0.5).clamp(-12.0, 12.0);

    let compressor = CompressorConfig {
        threshold_db,
        ratio: 1.0 + (curve.compression_ratio - 1.0) * intensity,
        makeup_gain_db,
        ..CompressorConfig::default()
    };

    Ok(ProcessingParams {
        target_curve,
        stereo_width_target,
        compressor,
        detection_mode: DetectionMode::Rms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_fingerprint() -> Fingerprint {
        let mut fp = Fingerprint::placeholder();
        fp.lufs = -14.0;
        fp
    }

    #[test]
    fn unknown_preset_is_rejected() {
        assert!(resolve("made_up", 1.0, &flat_fingerprint()).is_err());
    }

    #[test]
    fn zero_intensity_yields_the_fingerprint_bands_unboosted() {
        let fp = flat_fingerprint();
        let params = resolve("warm", 0.0, &fp).unwrap();
        let sum: f32 = params.target_curve.iter().sum();
        assert!((sum - 1.0).abs() < 1e-3);
    }

    #[test]
    fn intensity_is_clamped_not_rejected() {
        let fp = flat_fingerprint();
        assert!(resolve("natural", 10.0, &fp).is_ok());
        assert!(resolve("natural", -10.0, &fp).is_ok());
    }

    #[test]
    fn loud_track_gets_a_lower_threshold_and_negative_makeup_gain() {
        let mut fp = flat_fingerprint();
        fp.lufs = -5.0;
        let params = resolve("natural", 1.0, &fp).unwrap();
        assert!(params.compressor.threshold_db < -20.0);
        assert!(params.compressor.makeup_gain_db < 0.0);
    }

    #[test]
    fn quiet_track_gets_a_higher_threshold_and_positive_makeup_gain() {
        let mut fp = flat_fingerprint();
        fp.lufs = -30.0;
        let params = resolve("natural", 1.0, &fp).unwrap();
        assert!(params.compressor.threshold_db > -20.0);
        assert!(params.compressor.makeup_gain_db > 0.0);
    }
}
