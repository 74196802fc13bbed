//! Unified, `miette`-based diagnostics for the approval engine.
//!
//! Every failure a match attempt can produce is an [`ApprovalError`]. Mismatch
//! variants carry a [`Comparison`] so tooling can render a rich expected/actual
//! view instead of parsing the message text.
//!
//! # Error Construction
//!
//! - Use `err_msg!` for message-only errors:
//!   `err_msg!(Config, "unknown key '{}'", key)`
//! - Build the mismatch and store variants directly; they carry structured data.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Expected/actual payload attached to a failed comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comparison {
    /// Expected side: the approved, filtered JSON (or a matcher description).
    pub expected: String,
    /// Actual side: the freshly produced, filtered JSON (or the offending value).
    pub actual: String,
    /// Human-readable description of the differences.
    pub message: String,
}

/// Type-safe classification matching the failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// No approved artifact exists yet; a candidate was written.
    ApprovalMissing,
    /// Reading, writing or parsing an artifact failed.
    Io,
    /// Filtered canonical trees differ.
    StructuralMismatch,
    /// A bound field matcher rejected its value.
    CustomMatcherMismatch,
    /// Overwrite requested without an approved artifact to overwrite.
    OverwriteInvariant,
    /// The actual value could not be turned into an inspectable graph.
    Serialize,
    /// Invalid settings or matcher configuration.
    Config,
}

/// The single error type of the engine. None of these are retried internally.
#[derive(Error, Diagnostic, Debug)]
pub enum ApprovalError {
    #[error("{message}")]
    #[diagnostic(code(snapgate::approval::missing))]
    ApprovalMissing {
        message: String,
        created: PathBuf,
        approved: PathBuf,
        #[help]
        help: Option<String>,
    },

    #[error("failed to {operation} {}: {source}", .path.display())]
    #[diagnostic(code(snapgate::store::io))]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed artifact {}: {source}", .path.display())]
    #[diagnostic(code(snapgate::store::malformed))]
    MalformedArtifact {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
        #[help]
        help: Option<String>,
    },

    #[error("{}", .comparison.message)]
    #[diagnostic(code(snapgate::mismatch::structural))]
    StructuralMismatch {
        comparison: Comparison,
        #[help]
        help: Option<String>,
    },

    #[error("{}", .comparison.message)]
    #[diagnostic(code(snapgate::mismatch::custom))]
    CustomMatcherMismatch {
        comparison: Comparison,
        #[help]
        help: Option<String>,
    },

    #[error("approved file {} must exist in order to overwrite it", .path.display())]
    #[diagnostic(code(snapgate::store::overwrite))]
    OverwriteInvariant {
        path: PathBuf,
        #[help]
        help: Option<String>,
    },

    #[error("cannot inspect value: {message}")]
    #[diagnostic(code(snapgate::value::serialize))]
    Serialize {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("configuration error: {message}")]
    #[diagnostic(code(snapgate::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },
}

impl ApprovalError {
    /// Returns the failure category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApprovalMissing { .. } => ErrorCategory::ApprovalMissing,
            Self::Io { .. } | Self::MalformedArtifact { .. } => ErrorCategory::Io,
            Self::StructuralMismatch { .. } => ErrorCategory::StructuralMismatch,
            Self::CustomMatcherMismatch { .. } => ErrorCategory::CustomMatcherMismatch,
            Self::OverwriteInvariant { .. } => ErrorCategory::OverwriteInvariant,
            Self::Serialize { .. } => ErrorCategory::Serialize,
            Self::Config { .. } => ErrorCategory::Config,
        }
    }

    /// The expected/actual payload, for mismatch failures.
    pub fn comparison(&self) -> Option<&Comparison> {
        match self {
            Self::StructuralMismatch { comparison, .. }
            | Self::CustomMatcherMismatch { comparison, .. } => Some(comparison),
            _ => None,
        }
    }

    /// True when the match was decided negatively, as opposed to a fatal failure.
    pub fn is_mismatch(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::StructuralMismatch | ErrorCategory::CustomMatcherMismatch
        )
    }

    /// Attach a suggestion to help fix the error.
    pub fn with_help(mut self, suggestion: impl Into<String>) -> Self {
        match &mut self {
            Self::ApprovalMissing { help, .. }
            | Self::MalformedArtifact { help, .. }
            | Self::StructuralMismatch { help, .. }
            | Self::CustomMatcherMismatch { help, .. }
            | Self::OverwriteInvariant { help, .. }
            | Self::Serialize { help, .. }
            | Self::Config { help, .. } => *help = Some(suggestion.into()),
            Self::Io { .. } => {}
        }
        self
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

impl serde::ser::Error for ApprovalError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        crate::err_msg!(Serialize, msg)
    }
}

/// Constructs a message-only `ApprovalError` variant (`Serialize` or `Config`).
#[macro_export]
macro_rules! err_msg {
    // Message with format arguments
    ($variant:ident, $msg:expr, $($arg:expr),+ $(,)?) => {
        $crate::ApprovalError::$variant {
            message: format!($msg, $($arg),+),
            help: None,
        }
    };
    // Message only
    ($variant:ident, $msg:expr) => {
        $crate::ApprovalError::$variant {
            message: format!("{}", $msg),
            help: None,
        }
    };
}

/// Renders an error with full miette diagnostics.
pub fn render_report(error: ApprovalError) -> String {
    let report = miette::Report::new(error);
    format!("{report:?}")
}

/// Prints an error with full miette diagnostics to stderr.
pub fn print_error(error: ApprovalError) {
    eprintln!("{}", render_report(error));
}
