/// Pipeline error types shared by every DSP stage
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("stage {stage} produced a non-finite sample")]
    NonFinite { stage: &'static str },

    #[error("invalid DSP input: {reason}")]
    InvalidInput { reason: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Debug-only finiteness assertion run between pipeline stages.
pub fn assert_finite(stage: &'static str, samples: &[f32]) -> Result<()> {
    if samples.iter().any(|s| !s.is_finite()) {
        return Err(PipelineError::NonFinite { stage });
    }
    Ok(())
}
