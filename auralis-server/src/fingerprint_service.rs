/// Orchestrates fingerprint computation: loads audio, builds a
/// representative sample for long tracks, dispatches the CPU-bound analysis
/// to a bounded worker pool, and upserts the result through the repository.
use crate::audio::loader::{load_audio, AudioData};
use crate::error::{AppError, Result};
use crate::repository::FingerprintsRepo;
use auralis_dsp::fingerprint::{compute_fingerprint, Fingerprint};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Tracks longer than this are sampled rather than analyzed in full: N
/// windows spread uniformly across the track, concatenated, so a 90-minute
/// DJ set doesn't force a multi-minute HPSS/YIN pass end to end — and so the
/// sample isn't just the first N seconds, which would bias toward an intro.
const SAMPLING_THRESHOLD_SECONDS: f64 = 600.0;
const SAMPLE_WINDOWS: usize = 8;
const SAMPLE_WINDOW_SECONDS: f64 = 20.0;

/// `max(1, min(K, cpu_count / 2))`: a naive `min(K, cpu_count / 2)` yields
/// zero workers on a single-CPU box.
pub fn worker_count(k: usize) -> usize {
    auralis_dsp::fingerprint::worker_count(k, num_cpus::get())
}

pub struct FingerprintService {
    repo: Arc<dyn FingerprintsRepo>,
    worker_permits: Semaphore,
}

impl FingerprintService {
    pub fn new(repo: Arc<dyn FingerprintsRepo>, worker_pool_size: usize) -> Self {
        Self {
            repo,
            worker_permits: Semaphore::new(worker_pool_size.max(1)),
        }
    }

    pub async fn compute_and_store(&self, track_id: u32, filepath: &str) -> Result<Fingerprint> {
        let fingerprint = self.analyze_without_persisting(filepath).await?;
        self.repo.upsert(track_id, fingerprint)?;
        Ok(fingerprint)
    }

    /// Analyzes a file without registering it in the library -- used by the
    /// ad-hoc `/api/process` endpoint, where the caller hasn't (and may
    /// never) add the file as a library track.
    pub async fn analyze_without_persisting(&self, filepath: &str) -> Result<Fingerprint> {
        let audio = load_audio(filepath).await?;
        let _permit = self
            .worker_permits
            .acquire()
            .await
            .map_err(|_| AppError::internal("worker pool closed"))?;

        tokio::task::spawn_blocking(move || analyze(audio))
            .await
            .map_err(|e| AppError::internal(format!("analysis task panicked: {e}")))
    }
}

fn analyze(audio: AudioData) -> Fingerprint {
    if audio.sample_rate == 0 {
        return Fingerprint::placeholder();
    }

    let duration_s = audio.duration_sec();
    let (mono, channels) = if duration_s > SAMPLING_THRESHOLD_SECONDS {
        sample_uniformly(&audio)
    } else {
        (audio.mono(), audio.channel_samples.clone())
    };

    compute_fingerprint(&mono, &channels, audio.sample_rate)
}

/// Concatenates `SAMPLE_WINDOWS` equal-interval slices of `SAMPLE_WINDOW_SECONDS`
/// each, spread across the full track, into one representative buffer.
fn sample_uniformly(audio: &AudioData) -> (Vec<f32>, Vec<Vec<f32>>) {
    let total_frames = audio.channel_samples.first().map(|c| c.len()).unwrap_or(0);
    let window_frames = (SAMPLE_WINDOW_SECONDS * audio.sample_rate as f64) as usize;
    if total_frames == 0 || window_frames == 0 {
        return (Vec::new(), Vec::new());
    }

    let stride = total_frames / SAMPLE_WINDOWS.max(1);
    let mut sampled_channels: Vec<Vec<f32>> = vec![Vec::new(); audio.channel_samples.len()];

    for w in 0..SAMPLE_WINDOWS {
        let start = (w * stride).min(total_frames.saturating_sub(1));
        let end = (start + window_frames).min(total_frames);
        if start >= end {
            continue;
        }
        for (ch, samples) in audio.channel_samples.iter().enumerate() {
            sampled_channels[ch].extend_from_slice(&samples[start..end]);
        }
    }

    let sampled_audio = AudioData {
        channel_samples: sampled_channels.clone(),
        sample_rate: audio.sample_rate,
        channels: audio.channels,
    };
    (sampled_audio.mono(), sampled_channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_cpu_never_yields_zero_workers() {
        assert!(worker_count(4) >= 1);
    }

    #[test]
    fn empty_track_is_the_placeholder() {
        let audio = AudioData {
            channel_samples: vec![vec![]],
            sample_rate: 0,
            channels: 1,
        };
        assert!(analyze(audio).is_placeholder());
    }

    #[test]
    fn uniform_sampling_spreads_across_the_whole_track_not_just_the_intro() {
        let sr = 44100u32;
        let total_seconds = 900.0;
        let total_frames = (sr as f64 * total_seconds) as usize;
        // A ramp so distinct windows have distinct content; only the tail
        // is nonzero, so if sampling only took the first N seconds the
        // output would be all zero.
        let mut samples = vec![0.0f32; total_frames];
        let tail_start = total_frames - sr as usize * 30;
        for s in samples.iter_mut().skip(tail_start) {
            *s = 1.0;
        }
        let audio = AudioData {
            channel_samples: vec![samples.clone(), samples],
            sample_rate: sr,
            channels: 2,
        };
        let (mono, _) = sample_uniformly(&audio);
        assert!(mono.iter().any(|&s| s != 0.0));
    }
}
