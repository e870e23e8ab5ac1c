//! Error types for library loading.
//!
//! Covers I/O, document parsing, and the shape failures raised while
//! building, resolving or validating the loaded types.

use std::path::PathBuf;

use raml_shapes_core::ShapeError;
use thiserror::Error;

/// Errors that can occur while loading or processing a type library.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Building, resolving, checking or validating a shape failed.
    #[error(transparent)]
    ShapeError(#[from] ShapeError),

    /// The document is not a library (e.g., the root is not a map).
    #[error("invalid document {}: {message}", path.display())]
    InvalidDocument { path: PathBuf, message: String },

    /// No loaded library declares the requested type.
    #[error("type `{0}` is not declared")]
    TypeNotFound(String),

    /// Two library files declare the same type.
    #[error("type `{name}` is declared in both {} and {}", first.display(), second.display())]
    DuplicateType {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// Two library files declare the same annotation type.
    #[error(
        "annotation type `{name}` is declared in both {} and {}",
        first.display(),
        second.display()
    )]
    DuplicateAnnotationType {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// The directory contained no library files.
    #[error("no library files found in {}", .0.display())]
    NoLibraries(PathBuf),
}

/// Convenience alias for results with [`LoaderError`].
pub type Result<T> = std::result::Result<T, LoaderError>;
