/// The audio buffer type every DSP stage takes and returns.
///
/// Shape is `(channels, samples)`, 32-bit float normalized to `[-1, 1]`.
/// Stages receive `&AudioBuffer` and return an owned `AudioBuffer` with the
/// same shape; the input is never mutated in place.
use crate::error::{PipelineError, Result};
use ndarray::Array2;

#[derive(Debug, Clone)]
pub struct AudioBuffer {
    data: Array2<f32>,
}

impl AudioBuffer {
    pub fn new(data: Array2<f32>) -> Result<Self> {
        let buf = Self { data };
        buf.require_finite("entry")?;
        Ok(buf)
    }

    /// Construct without the entry finiteness check, for internal stage
    /// outputs that have already been validated.
    pub(crate) fn from_validated(data: Array2<f32>) -> Self {
        Self { data }
    }

    pub fn channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn samples(&self) -> usize {
        self.data.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.channels(), self.samples())
    }

    pub fn as_array(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn into_array(self) -> Array2<f32> {
        self.data
    }

    pub fn channel(&self, idx: usize) -> ndarray::ArrayView1<f32> {
        self.data.row(idx)
    }

    pub fn require_finite(&self, stage: &'static str) -> Result<()> {
        if self.data.iter().any(|s| !s.is_finite()) {
            return Err(PipelineError::NonFinite { stage });
        }
        Ok(())
    }

    /// Mono downmix (average of channels), used by analyzers that operate
    /// on a single summed stream.
    pub fn to_mono(&self) -> Vec<f32> {
        let (channels, samples) = self.shape();
        if channels == 1 {
            return self.data.row(0).to_vec();
        }
        let mut mono = vec![0.0f32; samples];
        for ch in 0..channels {
            for (i, &s) in self.data.row(ch).iter().enumerate() {
                mono[i] += s;
            }
        }
        let inv = 1.0 / channels as f32;
        for m in &mut mono {
            *m *= inv;
        }
        mono
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn rejects_non_finite_entry() {
        let data = arr2(&[[0.0, f32::NAN]]);
        assert!(AudioBuffer::new(data).is_err());
    }

    #[test]
    fn to_mono_averages_channels() {
        let data = arr2(&[[1.0, 1.0], [-1.0, -1.0]]);
        let buf = AudioBuffer::new(data).unwrap();
        assert_eq!(buf.to_mono(), vec![0.0, 0.0]);
    }

    #[test]
    fn shape_roundtrip() {
        let data = arr2(&[[0.1, 0.2, 0.3], [0.1, 0.2, 0.3]]);
        let buf = AudioBuffer::new(data).unwrap();
        assert_eq!(buf.shape(), (2, 3));
    }
}
