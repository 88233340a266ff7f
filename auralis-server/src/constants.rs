/// Shared constants for the chunked mastering pipeline. Every module that
/// needs one of these imports it from here; a router or handler defining
/// its own copy of `CHUNK_DURATION_S` (or similar) is a bug.
use std::time::Duration;

/// Nominal chunk length and the stride between chunk start samples. Equal,
/// so chunks tile the source file without gaps beyond the crossfade tail.
pub const CHUNK_DURATION_S: f64 = 15.0;
pub const CHUNK_INTERVAL_S: f64 = 15.0;

/// Cap on the crossfade region carried between chunks.
pub const CROSSFADE_SAMPLES: usize = 1024;

/// Process-wide cap on simultaneously streaming sessions.
pub const MAX_CONCURRENT_STREAMS: usize = 10;

/// Keep outbound WebSocket messages comfortably under common proxy/browser
/// frame limits.
pub const MAX_CHUNK_FRAME_BYTES: usize = 512 * 1024;

/// PCM frame size target before a chunk is split for transport.
pub const PCM_FRAME_SAMPLES: usize = 8192;

/// Chunked-processor construction (touches the filesystem) is bounded so a
/// slow or corrupt file can't hang a session indefinitely.
pub const PROCESSOR_CONSTRUCTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-connection WebSocket message rate limit.
pub const WS_RATE_LIMIT_PER_SEC: u32 = 10;

/// Chunk cache bounds.
pub const CACHE_MAX_ENTRIES: usize = 256;
pub const CACHE_MAX_BYTES: usize = 256 * 1024 * 1024;

/// Library pagination cap.
pub const MAX_PAGE_SIZE: usize = 500;

/// Upload size cap for `/api/files/upload`.
pub const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

/// The closed set of mastering presets. Any string outside this set is
/// `Invalid`, not silently mapped to a default.
pub const PRESETS: &[&str] = &[
    "adaptive",
    "natural",
    "warm",
    "bright",
    "punch",
    "vocal",
    "gentle",
];

pub fn is_valid_preset(preset: &str) -> bool {
    PRESETS.contains(&preset)
}

/// Intensity is clamped, never rejected, to this closed interval.
pub const INTENSITY_MIN: f32 = 0.0;
pub const INTENSITY_MAX: f32 = 2.0;

pub fn clamp_intensity(intensity: f32) -> f32 {
    intensity.clamp(INTENSITY_MIN, INTENSITY_MAX)
}

/// Chunk cache keys quantize intensity to 2 decimal places so near-identical
/// requests share cache entries.
pub fn quantize_intensity(intensity: f32) -> i32 {
    (clamp_intensity(intensity) * 100.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_enum_is_closed() {
        assert!(is_valid_preset("adaptive"));
        assert!(!is_valid_preset("made_up_preset"));
    }

    #[test]
    fn intensity_clamps_both_directions() {
        assert_eq!(clamp_intensity(-1.0), INTENSITY_MIN);
        assert_eq!(clamp_intensity(5.0), INTENSITY_MAX);
        assert_eq!(clamp_intensity(1.5), 1.5);
    }

    #[test]
    fn quantization_rounds_to_two_decimals() {
        assert_eq!(quantize_intensity(1.234), 123);
        assert_eq!(quantize_intensity(1.235), 124);
    }
}
