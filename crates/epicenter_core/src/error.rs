use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Unified error type for Epicenter core operations.
///
/// Construction-time errors (dependency graph, duplicate workspace ids) are
/// fatal and meant to be propagated with `?` out of workspace setup. Provider
/// I/O and validation errors are never fatal on their own — callers decide
/// whether to log them, record them in a diagnostics set, or surface them to
/// an action caller as `{error}`.
#[derive(Debug, Error)]
pub enum EpicenterError {
    /// General error for any kind of I/O issue not otherwise documented here.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row or a deserialized file failed its schema validation.
    #[error("validation failed for '{id}': {summary}")]
    Validation {
        /// Row id that failed validation.
        id: String,
        /// Human-readable summary of the failure.
        summary: String,
        /// Structured list of individual field issues.
        issues: Vec<String>,
    },

    /// `parseFilename` could not extract a row id from a filename.
    #[error("filename '{0}' is not identifiable")]
    FilenameParse(String),

    /// A markdown file failed to be read, written, or deleted.
    #[error("markdown IO error on '{path}': {source}")]
    MarkdownIo {
        /// Path to the file that failed.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Two files claim the same row id; the later one is deleted.
    #[error("duplicate file for row '{id}': '{kept}' kept, '{deleted}' deleted")]
    DuplicateFile {
        /// Row id shared by both files.
        id: String,
        /// Filename that was kept (first-seen).
        kept: String,
        /// Filename that was deleted.
        deleted: String,
    },

    /// A provider factory failed to initialize.
    #[error("provider '{provider_id}' failed to initialize: {message}")]
    Provider {
        /// Id of the provider that failed.
        provider_id: String,
        /// Description of the failure.
        message: String,
    },

    /// Missing, duplicate, or circular workspace dependency. Fatal at construction.
    #[error("{0}")]
    Dependency(String),

    /// Action input does not match its declared input schema.
    #[error("action input validation failed: {0}")]
    ActionValidation(String),

    /// Catch-all for action handler exceptions.
    #[error("operation failed: {0}")]
    Operation(String),

    /// An error that occurred while serializing or deserializing YAML frontmatter.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A row or frontmatter block failed to serialize to/from JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No frontmatter delimiters found in a file.
    #[error("No frontmatter found in '{0}'")]
    NoFrontmatter(PathBuf),

    /// A CRDT update or snapshot failed to decode or apply.
    #[error("CRDT error: {0}")]
    Crdt(String),

    /// Invalid path structure (e.g., missing parent directory or filename).
    #[error("Invalid path '{path}': {message}")]
    InvalidPath {
        /// Path that is invalid.
        path: PathBuf,
        /// Description of what's wrong with the path.
        message: String,
    },
}

/// Result type alias for Epicenter operations.
pub type Result<T> = std::result::Result<T, EpicenterError>;

/// A serializable representation of [`EpicenterError`] for provider/action boundaries.
#[derive(Debug, Clone, Serialize)]
pub struct SerializableError {
    /// Error kind/variant name.
    pub kind: String,
    /// Human-readable error message.
    pub message: String,
    /// Associated path (if applicable).
    pub path: Option<PathBuf>,
}

impl From<&EpicenterError> for SerializableError {
    fn from(err: &EpicenterError) -> Self {
        let kind = match err {
            EpicenterError::Io(_) => "Io",
            EpicenterError::Validation { .. } => "ValidationError",
            EpicenterError::FilenameParse(_) => "FilenameParseError",
            EpicenterError::MarkdownIo { .. } => "MarkdownIOError",
            EpicenterError::DuplicateFile { .. } => "DuplicateFileError",
            EpicenterError::Provider { .. } => "ProviderError",
            EpicenterError::Dependency(_) => "DependencyError",
            EpicenterError::ActionValidation(_) => "ActionValidationError",
            EpicenterError::Operation(_) => "OperationError",
            EpicenterError::Yaml(_) => "Yaml",
            EpicenterError::Json(_) => "Json",
            EpicenterError::NoFrontmatter(_) => "NoFrontmatter",
            EpicenterError::Crdt(_) => "CrdtError",
            EpicenterError::InvalidPath { .. } => "InvalidPath",
        }
        .to_string();

        let path = match err {
            EpicenterError::MarkdownIo { path, .. } => Some(path.clone()),
            EpicenterError::NoFrontmatter(path) => Some(path.clone()),
            EpicenterError::InvalidPath { path, .. } => Some(path.clone()),
            _ => None,
        };

        Self {
            kind,
            message: err.to_string(),
            path,
        }
    }
}

impl From<EpicenterError> for SerializableError {
    fn from(err: EpicenterError) -> Self {
        SerializableError::from(&err)
    }
}

impl EpicenterError {
    /// Convert to a serializable representation for provider/action boundaries.
    pub fn to_serializable(&self) -> SerializableError {
        SerializableError::from(self)
    }
}
