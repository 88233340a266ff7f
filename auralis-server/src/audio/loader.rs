use crate::error::{AppError, Result};
use std::fs::File;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::probe::Hint;

/// Decoded audio, keeping both the per-channel samples (needed for stereo
/// fingerprint dimensions and for the DSP pipeline, which operates on
/// `(channels, samples)` shaped buffers) and a mono downmix (needed by the
/// analyzers that only ever look at a single summed stream).
#[derive(Debug, Clone)]
pub struct AudioData {
    pub channel_samples: Vec<Vec<f32>>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioData {
    pub fn mono(&self) -> Vec<f32> {
        if self.channel_samples.len() == 1 {
            return self.channel_samples[0].clone();
        }
        let len = self.channel_samples.iter().map(|c| c.len()).max().unwrap_or(0);
        let mut mono = vec![0.0f32; len];
        for channel in &self.channel_samples {
            for (i, &s) in channel.iter().enumerate() {
                mono[i] += s;
            }
        }
        let inv = 1.0 / self.channel_samples.len().max(1) as f32;
        for m in &mut mono {
            *m *= inv;
        }
        mono
    }

    pub fn duration_sec(&self) -> f64 {
        let frames = self.channel_samples.first().map(|c| c.len()).unwrap_or(0);
        if self.sample_rate == 0 {
            0.0
        } else {
            frames as f64 / self.sample_rate as f64
        }
    }
}

/// Supports: WAV, FLAC, MP3, AAC, OGG, M4A, WMA. Retains every channel
/// separately; callers that only need a mono stream call `.mono()`.
pub async fn load_audio(filepath: &str) -> Result<AudioData> {
    if !std::path::Path::new(filepath).exists() {
        return Err(AppError::not_found(format!("audio file not found: {filepath}")));
    }

    let filepath = filepath.to_string();
    tokio::task::spawn_blocking(move || load_audio_sync(&filepath))
        .await
        .map_err(|e| AppError::internal(format!("task join error: {e}")))?
}

fn load_audio_sync(filepath: &str) -> Result<AudioData> {
    tracing::debug!("Loading audio from: {}", filepath);

    let file = File::open(filepath).map_err(|e| AppError::not_found(format!("{filepath}: {e}")))?;

    use symphonia::core::io::ReadOnlySource;
    let source = ReadOnlySource::new(file);
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = std::path::Path::new(filepath).extension() {
        hint.with_extension(&ext.to_string_lossy());
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &Default::default())
        .map_err(|e| AppError::invalid(format!("unsupported audio format: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.sample_rate.is_some())
        .ok_or_else(|| AppError::invalid("no audio tracks found"))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AppError::invalid("no sample rate found"))?;
    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| AppError::invalid("no channel info found"))?
        .count() as u16;

    tracing::debug!("Audio format: {} Hz, {} channels", sample_rate, channels);

    let mut channel_samples: Vec<Vec<f32>> = vec![Vec::new(); channels as usize];
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AppError::invalid(format!("decoder error: {e}")))?;

    loop {
        match format.next_packet() {
            Ok(packet) => match decoder.decode(&packet) {
                Ok(buf) => collect_samples(&mut channel_samples, &buf, channels as usize),
                Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
                Err(e) => return Err(AppError::invalid(format!("{e}"))),
            },
            Err(symphonia::core::errors::Error::IoError(_)) => break,
            Err(symphonia::core::errors::Error::Unsupported(_)) => break,
            Err(e) => return Err(AppError::invalid(format!("{e}"))),
        }
    }

    if channel_samples.iter().all(|c| c.is_empty()) {
        return Err(AppError::invalid("no audio samples decoded"));
    }
    if channel_samples.iter().any(|c| c.iter().any(|s| !s.is_finite())) {
        return Err(AppError::invalid("audio contains NaN or infinite values"));
    }

    tracing::debug!(
        "Loaded {} samples at {} Hz from {}",
        channel_samples.first().map(|c| c.len()).unwrap_or(0),
        sample_rate,
        filepath
    );

    Ok(AudioData {
        channel_samples,
        sample_rate,
        channels,
    })
}

fn collect_samples(channel_samples: &mut [Vec<f32>], buf: &AudioBufferRef, channels: usize) {
    macro_rules! process_buffer {
        ($buf:expr, $norm_fn:expr) => {{
            if $buf.frames() == 0 {
                return;
            }
            let n_frames = $buf.frames();
            let ch_count = std::cmp::min(channels, $buf.spec().channels.count());
            for ch in 0..ch_count {
                let plane = $buf.chan(ch);
                for frame_idx in 0..n_frames {
                    channel_samples[ch].push($norm_fn(plane[frame_idx]));
                }
            }
        }};
    }

    match buf {
        AudioBufferRef::F32(fbuf) => process_buffer!(fbuf, |v: f32| v),
        AudioBufferRef::F64(fbuf) => process_buffer!(fbuf, |v: f64| v as f32),
        AudioBufferRef::S8(ibuf) => process_buffer!(ibuf, |v: i8| v as f32 / i8::MAX as f32),
        AudioBufferRef::S16(ibuf) => process_buffer!(ibuf, |v: i16| v as f32 / i16::MAX as f32),
        AudioBufferRef::S24(ibuf) => process_buffer!(ibuf, |v: symphonia::core::sample::i24| {
            v.into_i32() as f32 / (2_i32.pow(23) - 1) as f32
        }),
        AudioBufferRef::S32(ibuf) => process_buffer!(ibuf, |v: i32| v as f32 / i32::MAX as f32),
        AudioBufferRef::U8(ubuf) => process_buffer!(ubuf, |v: u8| ((v as f32 / 255.0) - 0.5) * 2.0),
        AudioBufferRef::U16(ubuf) => process_buffer!(ubuf, |v: u16| ((v as f32 / 65535.0) - 0.5) * 2.0),
        AudioBufferRef::U24(ubuf) => process_buffer!(ubuf, |v: symphonia::core::sample::u24| {
            let norm = v.into_u32() as f32 / (2_u32.pow(24) - 1) as f32;
            (norm - 0.5) * 2.0
        }),
        AudioBufferRef::U32(ubuf) => process_buffer!(ubuf, |v: u32| ((v as f32 / u32::MAX as f32) - 0.5) * 2.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_downmix_averages_channels() {
        let data = AudioData {
            channel_samples: vec![vec![1.0, 1.0], vec![-1.0, -1.0]],
            sample_rate: 44100,
            channels: 2,
        };
        assert_eq!(data.mono(), vec![0.0, 0.0]);
    }

    #[test]
    fn single_channel_mono_is_a_passthrough() {
        let data = AudioData {
            channel_samples: vec![vec![0.5, -0.5]],
            sample_rate: 44100,
            channels: 1,
        };
        assert_eq!(data.mono(), vec![0.5, -0.5]);
    }
}
