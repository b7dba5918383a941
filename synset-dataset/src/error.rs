//! Error types of sample generation and remote fetching.

use std::path::PathBuf;
use thiserror::Error;

/// The failure raised while producing one sample.
///
/// Recoverable variants make the dataset draw another index instead of
/// returning the error to the caller.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("no object named '{synset}' in annotation '{}'", .annotation.display())]
    MissingAnnotationMatch { synset: String, annotation: PathBuf },

    #[error("image '{}' is neither stored locally nor fetchable", .path.display())]
    ImageUnavailable { path: PathBuf },

    #[error("degenerate box: {reason}")]
    DegenerateBox { reason: String },

    #[error("unable to crop patch from image '{}': {reason}", .path.display())]
    CropDecodeFailure { path: PathBuf, reason: String },

    #[error("no usable sample found after {attempts} attempts")]
    SampleUnavailable { attempts: usize },

    #[error("index {index} is out of range for dataset of {len} samples")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("failed to read annotation '{}'", .path.display())]
    Annotation {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("patch transform failed")]
    Transform(#[source] anyhow::Error),
}

impl SampleError {
    /// Whether the dataset should resample instead of failing.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MissingAnnotationMatch { .. }
                | Self::ImageUnavailable { .. }
                | Self::DegenerateBox { .. }
                | Self::CropDecodeFailure { .. }
        )
    }

    pub fn kind(&self) -> RejectionKind {
        match self {
            Self::MissingAnnotationMatch { .. } => RejectionKind::MissingAnnotationMatch,
            Self::ImageUnavailable { .. } => RejectionKind::ImageUnavailable,
            Self::DegenerateBox { .. } => RejectionKind::DegenerateBox,
            Self::CropDecodeFailure { .. } => RejectionKind::CropDecodeFailure,
            _ => RejectionKind::Fatal,
        }
    }

    pub(crate) fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateBox {
            reason: reason.into(),
        }
    }
}

/// Coarse classification of sample failures, used for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionKind {
    MissingAnnotationMatch,
    ImageUnavailable,
    DegenerateBox,
    CropDecodeFailure,
    Fatal,
}

/// The failure reported by a remote fetch collaborator.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("resource unavailable: {0}")]
    Unavailable(String),
}
