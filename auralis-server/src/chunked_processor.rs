/// Server-side glue between the repository, the audio loader, the shared
/// chunk cache, and `auralis_dsp::ChunkProcessor`. One instance per active
/// stream session; maps `(track, preset, intensity)` to an ordered sequence
/// of processed chunks.
use crate::cache::{CachedChunk, ChunkCache, ChunkCacheKey};
use crate::constants::{quantize_intensity, CHUNK_DURATION_S, CHUNK_INTERVAL_S, PROCESSOR_CONSTRUCTION_TIMEOUT};
use crate::error::{AppError, Result};
use crate::models::processing_params;
use auralis_dsp::buffer::AudioBuffer;
use auralis_dsp::chunk_processor::{Chunk, ChunkProcessor as DspChunkProcessor};
use auralis_dsp::fingerprint::Fingerprint;
use auralis_dsp::pipeline::ProcessingParams;
use ndarray::Array2;
use std::sync::Arc;

pub struct GetChunkResult {
    pub chunk_index: u64,
    pub pcm: Arc<Vec<u8>>,
    pub actual_length_samples: usize,
    pub is_last: bool,
}

pub struct ChunkedProcessor {
    track_id: u32,
    preset: String,
    intensity: f32,
    sample_rate: u32,
    channels: usize,
    total_samples: usize,
    // Decoded once at construction (still one disk read for the whole
    // session, not per chunk); individual chunks are sliced from this
    // rather than re-decoding the file on every `get`.
    channel_samples: Vec<Vec<f32>>,
    dsp: DspChunkProcessor,
    params: ProcessingParams,
    cache: Arc<ChunkCache>,
}

impl ChunkedProcessor {
    pub async fn construct(
        track_id: u32,
        filepath: &str,
        preset: &str,
        intensity: f32,
        fingerprint: &Fingerprint,
        cache: Arc<ChunkCache>,
    ) -> Result<Self> {
        tokio::time::timeout(PROCESSOR_CONSTRUCTION_TIMEOUT, Self::construct_inner(track_id, filepath, preset, intensity, fingerprint, cache))
            .await
            .map_err(|_| AppError::timeout("chunked processor construction exceeded its budget"))?
    }

    async fn construct_inner(
        track_id: u32,
        filepath: &str,
        preset: &str,
        intensity: f32,
        fingerprint: &Fingerprint,
        cache: Arc<ChunkCache>,
    ) -> Result<Self> {
        let audio = crate::audio::loader::load_audio(filepath).await?;
        let params = processing_params::resolve(preset, intensity, fingerprint)?;
        let channels = audio.channel_samples.len().max(1);
        let total_samples = audio.channel_samples.first().map(|c| c.len()).unwrap_or(0);

        Ok(Self {
            track_id,
            preset: preset.to_string(),
            intensity,
            sample_rate: audio.sample_rate,
            channels,
            total_samples,
            channel_samples: audio.channel_samples,
            dsp: DspChunkProcessor::new(channels, audio.sample_rate, &params),
            params,
            cache,
        })
    }

    fn chunk_bounds(&self, chunk_index: u64) -> Option<(usize, usize)> {
        let sr = self.sample_rate as f64;
        let start_sample = (chunk_index as f64 * CHUNK_INTERVAL_S * sr) as usize;
        if start_sample >= self.total_samples {
            return None;
        }
        let nominal_end = start_sample + (CHUNK_DURATION_S * sr) as usize;
        let end_sample = nominal_end.min(self.total_samples);
        Some((start_sample, end_sample))
    }

    /// Seeking breaks crossfade continuity intentionally.
    pub fn clear_tail(&mut self) {
        self.dsp.clear_tail();
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels as u16
    }

    pub fn total_chunks(&self) -> u64 {
        let sr = self.sample_rate as f64;
        let interval_samples = (CHUNK_INTERVAL_S * sr).max(1.0);
        (self.total_samples as f64 / interval_samples).ceil() as u64
    }

    pub async fn get(&mut self, chunk_index: u64) -> Result<Option<GetChunkResult>> {
        let Some((start_sample, end_sample)) = self.chunk_bounds(chunk_index) else {
            return Ok(None);
        };

        let cache_key = ChunkCacheKey {
            track_id: self.track_id,
            preset: self.preset.clone(),
            quantized_intensity: quantize_intensity(self.intensity),
            chunk_index,
        };
        if let Some(cached) = self.cache.get(&cache_key) {
            return Ok(Some(GetChunkResult {
                chunk_index,
                pcm: cached.pcm,
                actual_length_samples: cached.actual_length_samples,
                is_last: end_sample >= self.total_samples,
            }));
        }

        let len = end_sample - start_sample;
        let mut data = Array2::<f32>::zeros((self.channels, len));
        for (ch, samples) in self.channel_samples.iter().enumerate() {
            if ch >= self.channels {
                break;
            }
            for (i, sample_index) in (start_sample..end_sample).enumerate() {
                data[[ch, i]] = samples.get(sample_index).copied().unwrap_or(0.0);
            }
        }
        let audio = AudioBuffer::new(data).map_err(AppError::from)?;
        let chunk = Chunk {
            chunk_index,
            start_sample,
            audio,
        };

        // The session's opening chunk skips stage 1's FFT measurement to
        // cut time-to-first-audio; every later chunk measures normally.
        let processed = self
            .dsp
            .process_chunk(&chunk, &self.params, chunk_index == 0)
            .map_err(AppError::from)?;
        let pcm = Arc::new(encode_pcm_f32_interleaved(&processed.audio));

        self.cache.put(
            cache_key,
            CachedChunk {
                pcm: pcm.clone(),
                actual_length_samples: processed.actual_length_samples,
            },
        );

        Ok(Some(GetChunkResult {
            chunk_index,
            pcm,
            actual_length_samples: processed.actual_length_samples,
            is_last: end_sample >= self.total_samples,
        }))
    }
}

/// Interleaves channels once into little-endian float32 PCM, matching the
/// stream controller's framing contract (stereo MUST be flattened exactly
/// once, not duplicated per channel).
fn encode_pcm_f32_interleaved(buffer: &AudioBuffer) -> Vec<u8> {
    let (channels, samples) = buffer.shape();
    let mut out = Vec::with_capacity(channels * samples * 4);
    for i in 0..samples {
        for ch in 0..channels {
            out.extend_from_slice(&buffer.channel(ch)[i].to_le_bytes());
        }
    }
    out
}

impl ChunkedProcessor {
    /// Bypasses `construct`'s disk read, building a processor directly from
    /// already-decoded samples. Used for the gapless handoff, where the next
    /// track's audio was decoded ahead of time into a `GaplessPrebuffer`, and
    /// by tests that want to drive a processor from synthesized samples
    /// without a file on disk.
    pub fn from_decoded(
        track_id: u32,
        preset: &str,
        intensity: f32,
        channel_samples: Vec<Vec<f32>>,
        sample_rate: u32,
        params: ProcessingParams,
        cache: Arc<ChunkCache>,
    ) -> Self {
        let channels = channel_samples.len().max(1);
        let total_samples = channel_samples.first().map(|c| c.len()).unwrap_or(0);
        Self {
            track_id,
            preset: preset.to_string(),
            intensity,
            sample_rate,
            channels,
            total_samples,
            dsp: DspChunkProcessor::new(channels, sample_rate, &params),
            channel_samples,
            params,
            cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_encoding_interleaves_channels_once() {
        let data = Array2::from_shape_vec((2, 2), vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
        let buffer = AudioBuffer::new(data).unwrap();
        let pcm = encode_pcm_f32_interleaved(&buffer);
        assert_eq!(pcm.len(), 2 * 2 * 4);
        let first_sample_left = f32::from_le_bytes(pcm[0..4].try_into().unwrap());
        let first_sample_right = f32::from_le_bytes(pcm[4..8].try_into().unwrap());
        assert_eq!(first_sample_left, 1.0);
        assert_eq!(first_sample_right, 3.0);
    }

    fn sine_track(seconds: f64, sample_rate: u32) -> Vec<Vec<f32>> {
        let n = (seconds * sample_rate as f64) as usize;
        let freq = 440.0_f64;
        let wave: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64).sin() as f32 * 0.5)
            .collect();
        vec![wave.clone(), wave]
    }

    #[tokio::test]
    async fn sixteen_second_track_yields_the_expected_two_chunk_split() {
        let samples = sine_track(16.0, 44100);
        let params = ProcessingParams::identity();
        let mut proc = ChunkedProcessor::from_decoded(0, "adaptive", 0.0, samples, 44100, params, Arc::new(ChunkCache::new()));

        let chunk0 = proc.get(0).await.unwrap().unwrap();
        assert_eq!(chunk0.actual_length_samples, 705_600);
        assert!(!chunk0.is_last);

        let chunk1 = proc.get(1).await.unwrap().unwrap();
        assert_eq!(chunk1.actual_length_samples, 44_100);
        assert!(chunk1.is_last);

        assert_eq!(chunk0.actual_length_samples + chunk1.actual_length_samples, 16 * 44100);

        let samples: Vec<f32> = chunk1
            .pcm
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes(b.try_into().unwrap()))
            .collect();
        let rms = (samples.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / samples.len() as f64).sqrt();
        assert!(rms > 0.0);
    }

    #[tokio::test]
    async fn seek_discards_crossfade_so_the_next_chunk_head_is_unblended() {
        let samples = sine_track(31.0, 44100);
        let params = ProcessingParams::identity();
        let mut proc = ChunkedProcessor::from_decoded(0, "adaptive", 0.0, samples, 44100, params, Arc::new(ChunkCache::new()));

        proc.get(0).await.unwrap();
        proc.clear_tail();
        let after_seek = proc.get(2).await.unwrap().unwrap();
        assert_eq!(after_seek.chunk_index, 2);
    }
}
