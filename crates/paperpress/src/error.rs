use std::path::PathBuf;

use paperpress_core::job::ReportKind;
use paperpress_core::CoreError;
use pdf::PdfError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Corrupt document: {0}")]
    CorruptDocument(String),

    #[error("No {kind} source for {name}: {detail}")]
    MissingSource {
        kind: ReportKind,
        name: String,
        detail: String,
    },

    #[error("Integrity mismatch: {0}")]
    IntegrityMismatch(CoreError),

    #[error("Browser did not signal completion within {0}s")]
    RenderTimeout(u64),

    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("Invalid paper name {0:?}")]
    InvalidPaperName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PdfError> for Error {
    fn from(err: PdfError) -> Self {
        match err {
            PdfError::FileNotFound(path) => Error::FileNotFound(path),
            PdfError::Io(e) => Error::Io(e),
            other => Error::CorruptDocument(other.to_string()),
        }
    }
}

impl From<CoreError> for Error {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::IntegrityMismatch { .. }
            | CoreError::ZeroMarker
            | CoreError::InvalidMarker(_) => Error::IntegrityMismatch(err),
            CoreError::PageSequence { .. } | CoreError::PageJson(_) => {
                Error::CorruptDocument(err.to_string())
            }
            CoreError::InvalidPaperName(name) => Error::InvalidPaperName(name),
        }
    }
}
