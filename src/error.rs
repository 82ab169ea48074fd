use thiserror::Error;

/// Failures local to a single transcode attempt. One file failing never
/// aborts the batch; the caller reports the error and moves on.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("no resolution reported for video stream #{index}")]
    MissingResolution { index: u32 },

    #[error("crop detection reported no crop rectangle")]
    NoCropDetected,

    #[error("{phase} exited with code {code}")]
    ToolFailed { phase: &'static str, code: i32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
