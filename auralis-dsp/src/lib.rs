/// Auralis DSP - the mastering pipeline and audio fingerprint analyzers
///
/// - `pipeline` / `chunk_processor`: the six-stage mastering chain and the
///   per-session chunk orchestration (equal-power crossfade, continuity).
/// - `eq`, `band_shelf`, `stereo_width`, `compressor`, `limiter`: the
///   individual DSP stages `pipeline` wires together.
/// - `hpss`, `yin`, `chroma`, `tempo`, `onset_detector`, `median_filter`:
///   analysis primitives behind the harmonic/temporal fingerprint dimensions.
/// - `fingerprint`: the 25-dimension audio fingerprint built from the above.

pub mod buffer;
pub mod error;

// DSP pipeline stages
pub mod band_shelf;
pub mod biquad_filter;
pub mod compressor;
pub mod envelope;
pub mod eq;
pub mod limiter;
pub mod stereo_width;

// Orchestration
pub mod chunk_processor;
pub mod pipeline;

// Analysis primitives
pub mod chroma;
pub mod hpss;
pub mod median_filter;
pub mod onset_detector;
pub mod tempo;
pub mod yin;

// Fingerprinting (25D audio analysis)
pub mod fingerprint;
pub mod frequency_analysis;
pub mod spectral_features;
pub mod stereo_analysis;

pub use buffer::AudioBuffer;
pub use error::{PipelineError, Result};

pub use chunk_processor::{Chunk, ChunkProcessor, ProcessedChunk};
pub use pipeline::{Pipeline, ProcessingParams};

pub use hpss::hpss;
pub use yin::yin;
pub use chroma::chroma_cqt;
pub use tempo::detect_tempo;
pub use envelope::{envelope_follow, EnvelopeFollower, EnvelopeConfig};
pub use compressor::{compress, Compressor, CompressorConfig, DetectionMode, CompressionInfo};
pub use limiter::{limit, Limiter, LimiterConfig, LimitingInfo};

pub use fingerprint::{compute_fingerprint, Fingerprint};
pub use frequency_analysis::compute_frequency_distribution;
pub use spectral_features::{compute_spectral_centroid, compute_spectral_rolloff, compute_spectral_flatness, audio_to_freq_domain};
pub use stereo_analysis::{compute_stereo_width, compute_phase_correlation, is_stereo};
