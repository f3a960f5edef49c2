//! Error types for tfmock
//!
//! Errors here are for failures that are not the user's fault: a caller
//! handing the filler a value that does not match its schema, an address
//! kind that should never come out of target parsing, or a file that could
//! not be loaded. Problems in user-authored mock configuration are reported
//! as [`Diagnostics`](crate::diagnostics::Diagnostics) instead.

use std::fmt;

use crate::diagnostics::SourceRange;

/// Result type alias for tfmock operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tfmock operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Value path where the error occurred (e.g., "network_interface[0].id")
    pub path: Option<String>,
    /// Source location if available
    pub source_location: Option<SourceRange>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Error parsing a schema or mock file
    Parse,
    /// I/O error (file not found, etc.)
    Io,
    /// A value handed to the filler does not have the shape its schema declares
    SchemaMismatch { expected: String, found: String },
    /// Internal error (bug in tfmock or its caller)
    Internal,
}

impl Error {
    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Parse,
            path: None,
            source_location: None,
            help: None,
            cause: Some(message.into()),
        }
    }

    /// Create a file not found / unreadable error
    pub fn io(file_path: impl Into<String>, message: impl Into<String>) -> Self {
        let fp = file_path.into();
        Self {
            kind: ErrorKind::Io,
            path: None,
            source_location: None,
            help: Some(format!("Check that '{}' exists and is readable", fp)),
            cause: Some(message.into()),
        }
    }

    /// Create a schema mismatch error
    ///
    /// Raised when the original value does not structurally match the schema
    /// it was passed with. The caller is responsible for that agreement, so
    /// this is never the fault of the mock configuration.
    pub fn schema_mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        let p = path.into();
        Self {
            kind: ErrorKind::SchemaMismatch {
                expected: expected.into(),
                found: found.into(),
            },
            path: if p.is_empty() { None } else { Some(p) },
            source_location: None,
            help: Some(
                "The value must be produced from the same schema it is filled with. This is a bug in the caller - please report it."
                    .into(),
            ),
            cause: None,
        }
    }

    /// Create an internal error (bug in tfmock)
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal,
            path: None,
            source_location: None,
            help: Some("This is likely a bug in tfmock. Please report it.".into()),
            cause: Some(message.into()),
        }
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add source location to the error
    pub fn with_source_location(mut self, loc: SourceRange) -> Self {
        self.source_location = Some(loc);
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Whether this error signals a bug rather than bad input
    pub fn is_internal(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Internal | ErrorKind::SchemaMismatch { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::Io => write!(f, "I/O error")?,
            ErrorKind::SchemaMismatch { expected, found } => {
                write!(f, "Value does not match schema: expected {}, found {}", expected, found)?
            }
            ErrorKind::Internal => write!(f, "Internal error")?,
        }

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(loc) = &self.source_location {
            write!(f, "\n  File: {}", loc)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
