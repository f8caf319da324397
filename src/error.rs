use thiserror::Error;

/// Errors surfaced by the tracking library.
///
/// End of stream and degenerate contours are not errors; they show up as
/// `Ok(None)` from the source and the detector respectively.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("invalid configuration: {message}")]
    Config { message: String },
    #[error("failed to open video source {uri:?}")]
    OpenSource { uri: String },
    #[error("failed to open video writer {path:?}")]
    OpenSink { path: String },
    #[error(transparent)]
    OpenCv(#[from] opencv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TrackError {
    pub fn config(message: impl Into<String>) -> Self {
        TrackError::Config {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackError>;
