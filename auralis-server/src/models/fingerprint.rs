/// The 25-dimensional fingerprint lives in `auralis_dsp::fingerprint`; this
/// module just re-exports it under the server's model namespace so callers
/// don't need to know the DSP crate computed it.
pub use auralis_dsp::fingerprint::{compute_fingerprint, Fingerprint, LUFS_PLACEHOLDER};
