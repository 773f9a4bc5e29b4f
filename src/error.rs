//! Error handling for himena-relion
//!
//! This module defines the error taxonomy shared by the STAR schema layer,
//! the pipeline and job models, the registry and the external job protocol,
//! together with a Result alias.
//!
//! The first group (`StarSyntax`, `SchemaMismatch`, `PipelineInconsistent`,
//! `MissingOutput`) is recoverable: viewers turn it into "not ready" or an
//! inline message. Registry and parameter translation errors are programmer
//! errors and surface at startup or as a nonzero CLI exit.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for himena-relion operations
#[derive(Error, Debug)]
pub enum RelionError {
    /// The text is not well-formed STAR
    #[error("STAR syntax error at line {line}: {message}")]
    StarSyntax { line: usize, message: String },

    /// STAR content violates a declared model
    #[error("Schema mismatch at {path}: {reason}")]
    SchemaMismatch { path: String, reason: String },

    /// The pipeline references a node or process that does not exist
    #[error("Pipeline inconsistent: {0}")]
    PipelineInconsistent(String),

    /// A typed accessor requested a file that is not on disk yet
    #[error("Missing output: {}", .0.display())]
    MissingOutput(PathBuf),

    /// Duplicate registration of a label with a different class
    #[error("Registry conflict for {key}: already bound to {existing}, refusing {incoming}")]
    RegistryConflict {
        key: String,
        existing: String,
        incoming: String,
    },

    /// A parameter type outside the supported set
    #[error("Unsupported parameter type: {0}")]
    UnsupportedType(String),

    /// A boolean CLI value other than "0" or "1"
    #[error("Invalid boolean {0:?}, expected \"0\" or \"1\"")]
    BadBool(String),

    /// A value that cannot be parsed as its declared type
    #[error("Invalid value {value:?} for type {expected}")]
    BadValue { value: String, expected: String },

    /// More generic parameters than job.star has slots for
    #[error("Too many parameters: {count} given, at most {max} allowed")]
    TooManyParameters { count: usize, max: usize },

    /// A required external job parameter was not supplied
    #[error("Missing argument --{0}")]
    MissingArgument(String),

    /// No external job is registered under the import path
    #[error("Unknown external job: {0}")]
    UnknownExternalJob(String),

    /// Errors related to configuration loading
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<RelionError>,
    },
}

impl RelionError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        RelionError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for a schema mismatch at a block-qualified path
    pub fn schema(path: impl Into<String>, reason: impl Into<String>) -> Self {
        RelionError::SchemaMismatch {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// The innermost error, skipping context wrappers
    pub fn root(&self) -> &RelionError {
        match self {
            RelionError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error only means "the job has not produced it yet"
    pub fn is_missing_output(&self) -> bool {
        matches!(self.root(), RelionError::MissingOutput(_))
    }

    /// Whether a viewer may recover from this error by showing a placeholder
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.root(),
            RelionError::StarSyntax { .. }
                | RelionError::SchemaMismatch { .. }
                | RelionError::PipelineInconsistent(_)
                | RelionError::MissingOutput(_)
                | RelionError::Io(_)
        )
    }
}

/// Result type alias for himena-relion operations
pub type Result<T> = std::result::Result<T, RelionError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

/// Converts `MissingOutput` into `Ok(None)`, keeping every other error.
pub trait OptionalOutput<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalOutput<T> for Result<T> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_missing_output() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
