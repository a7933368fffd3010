use std::path::PathBuf;

/// Errors surfaced by the recording engine and dataset writer.
///
/// Per-source read failures during a sampling cycle are deliberately NOT
/// represented here: they become `ChannelValue::Error` markers inside the
/// frame so that a single bad source never loses the whole sample.
#[derive(thiserror::Error, Debug)]
pub enum RecorderError {
    /// A source could not be reached at connect time. Recording cannot start.
    #[error("Failed to connect to {source_name}: {reason}")]
    Connection { source_name: String, reason: String },

    /// Invalid call ordering (recording before episode start, double
    /// finalize, append after finalize).
    #[error("Invalid recorder state: {0}")]
    State(String),

    /// A frame's channel key set diverges from the established schema.
    #[error("Channel schema mismatch (missing: {missing:?}, unexpected: {unexpected:?})")]
    Schema {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// Finalize was called on an episode with zero captured frames.
    #[error("Episode {0} has no frames")]
    EmptyEpisode(u64),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("IO error on path: {1}")]
    Io(#[source] std::io::Error, PathBuf),
}

impl RecorderError {
    pub fn io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io(err, path.into())
    }

    /// True for the variants that invalidate one episode's serialization
    /// without corrupting previously written dataset records.
    pub fn is_serialization(&self) -> bool {
        matches!(
            self,
            Self::Json(_) | Self::Arrow(_) | Self::Parquet(_) | Self::Io(..)
        )
    }
}

pub type Result<T> = std::result::Result<T, RecorderError>;
