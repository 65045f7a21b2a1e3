//! Error types for the segmentation library.
//!
//! Two layers live here. [`Error`] covers the failures that abort an
//! operation outright (bad configuration, unreadable profile, encoder
//! failure). [`StageOutcome`] and [`SkipReason`] carry the non-fatal
//! taxonomy every pipeline stage reports instead of raising: a unit that
//! could not be decoded, an OCR classification that came back empty, a run
//! that never found its start code, or a cooperative cancellation.

use std::fmt;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while configuring or running segmentation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid pattern in a region profile
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Malformed JSON profile or configuration
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// OCR capability failed
    #[error("OCR error: {0}")]
    Ocr(String),

    /// Tunable out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unknown or inconsistent region profile
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    /// Tile could not be encoded for upload
    #[error("Encode error: {0}")]
    Encode(String),
}

/// Why a unit of work produced no output without failing the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A page, block or column could not be decoded or cropped.
    RecoverableImage {
        /// Page index in run order
        page: usize,
        /// What failed
        detail: String,
    },
    /// OCR classification threw or returned nothing usable.
    ClassificationUncertain {
        /// Page index in run order
        page: usize,
        /// What failed
        detail: String,
    },
    /// No candidate block survived classification on the page.
    NoBlocks {
        /// Page index in run order
        page: usize,
    },
    /// The whole run ended without leaving the start-search state.
    NoStartFound,
    /// The section already closed on an earlier page.
    SectionClosed {
        /// Page index in run order
        page: usize,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::RecoverableImage { page, detail } => {
                write!(f, "page {}: unreadable image ({})", page, detail)
            },
            SkipReason::ClassificationUncertain { page, detail } => {
                write!(f, "page {}: classification uncertain ({})", page, detail)
            },
            SkipReason::NoBlocks { page } => write!(f, "page {}: no candidate blocks", page),
            SkipReason::NoStartFound => write!(f, "start code never found"),
            SkipReason::SectionClosed { page } => {
                write!(f, "page {}: section already closed", page)
            },
        }
    }
}

/// Typed outcome of one pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    /// The stage produced output (possibly empty by nature).
    Done(T),
    /// The stage produced nothing for a non-fatal reason.
    Skipped(SkipReason),
    /// Cancellation was observed at a stage boundary.
    Cancelled,
}

impl<T> StageOutcome<T> {
    /// True when cancellation was observed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StageOutcome::Cancelled)
    }

    /// Borrow the output if the stage completed.
    pub fn done(&self) -> Option<&T> {
        match self {
            StageOutcome::Done(value) => Some(value),
            _ => None,
        }
    }

    /// Take the output if the stage completed.
    pub fn into_done(self) -> Option<T> {
        match self {
            StageOutcome::Done(value) => Some(value),
            _ => None,
        }
    }

    /// The skip reason, if the stage was skipped.
    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            StageOutcome::Skipped(reason) => Some(reason),
            _ => None,
        }
    }

    /// Map the completed value, preserving skips and cancellation.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> StageOutcome<U> {
        match self {
            StageOutcome::Done(value) => StageOutcome::Done(f(value)),
            StageOutcome::Skipped(reason) => StageOutcome::Skipped(reason),
            StageOutcome::Cancelled => StageOutcome::Cancelled,
        }
    }
}
