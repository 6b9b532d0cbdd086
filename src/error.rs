//! Error types for the edgequake-figref library.
//!
//! Every failure is fatal to the render that raised it. Two variants are
//! *authoring* errors the document author must fix by hand:
//!
//! * [`FigrefError::DuplicateLabel`]: the pre-scan found the same caption
//!   label twice. Raised before any output is produced.
//!
//! * [`FigrefError::UnresolvedReference`]: a checked reference names a
//!   label the registry has never seen.
//!
//! The remaining variants cover directive syntax, configuration and I/O.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-figref library.
#[derive(Debug, Error)]
pub enum FigrefError {
    // ── Authoring errors ──────────────────────────────────────────────────
    /// The same caption label is declared on two lines.
    #[error(
        "Duplicate caption label '{label}' (first declared on line {first_line}, again on line {second_line})\n\
Caption labels must be unique within a document."
    )]
    DuplicateLabel {
        label: String,
        first_line: usize,
        second_line: usize,
    },

    /// A checked reference names a label that was never declared.
    #[error("Unresolved figure reference '{label}'\nDeclare it with cap(\"{label}\", ...) or disable reference checks.")]
    UnresolvedReference { label: String },

    // ── Directive errors ──────────────────────────────────────────────────
    /// A `{{ ... }}` directive could not be parsed or evaluated.
    #[error("Invalid directive on line {line}: {detail}")]
    InvalidDirective { line: usize, detail: String },

    /// A `{{` opener has no matching `}}` on the same line.
    #[error("Unterminated directive on line {line}: missing '}}}}'")]
    UnterminatedDirective { line: usize },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Input document was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The document exists but could not be read as UTF-8 text.
    #[error("Failed to read document '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An image could not be read for embedding.
    #[error("Failed to read image '{path}' for embedding: {source}")]
    ImageReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the rendered output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FigrefError {
    /// `true` for errors the document author causes and must fix in the source.
    pub fn is_authoring_error(&self) -> bool {
        matches!(
            self,
            FigrefError::DuplicateLabel { .. }
                | FigrefError::UnresolvedReference { .. }
                | FigrefError::InvalidDirective { .. }
                | FigrefError::UnterminatedDirective { .. }
        )
    }
}
