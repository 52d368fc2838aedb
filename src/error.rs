//! Error types for the PDF collation library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the PDF collation library
///
/// Every variant is fatal to the current run.
#[derive(Error, Debug)]
pub enum Error {
    /// A source PDF is missing, cannot be parsed, or has no pages
    #[error("Cannot read PDF {}: {reason}", .path.display())]
    UnreadableSource { path: PathBuf, reason: String },

    /// The plan contains no document pages to size the canvas from
    #[error("The index lists no document pages")]
    EmptyDocumentSet,

    /// An index line (or directive) could not be parsed
    #[error("{}:{line}: {message}", .path.display())]
    MalformedPlan {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// The index file itself cannot be read
    #[error("Cannot read index {}", .path.display())]
    UnreadableIndex {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A cached page count in the index disagrees with the file on disk
    #[error(
        "{}:{line}: index records {recorded} page(s) but the file has {actual}",
        .path.display()
    )]
    SourceMismatch {
        path: PathBuf,
        line: usize,
        recorded: usize,
        actual: usize,
    },

    /// Building or writing the output failed; wraps the first failure
    #[error("Failed to assemble {}", .output.display())]
    Assembly {
        output: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Font error
    #[error("Font error: {0}")]
    Font(String),

    /// Invalid glob pattern
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(String),

    /// No files matched pattern
    #[error("No PDF files found matching pattern: {0}")]
    NoFilesMatched(String),

    /// A configuration value given on the command line is out of range
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Shorthand for an unreadable source with a displayable reason
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::UnreadableSource {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
