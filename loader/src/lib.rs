//! Loading of RAML type libraries from YAML or JSON files.
//!
//! This crate reads library documents (a map with `types` and/or
//! `annotationTypes`) into a [`raml_shapes_core::TypeLibrary`], resolves and
//! validates them according to a [`LoaderConfig`], and answers JSON Schema
//! conversion and value validation requests by type name.
//!
//! Documents are read without source positions and without `!include`
//! support; diagnostics name the file only.
//!
//! # Quick start
//!
//! ```no_run
//! use raml_shapes_loader::{LoaderConfig, ShapeRegistry};
//!
//! let config = LoaderConfig::default();
//! let mut registry = ShapeRegistry::load("types/", &config).unwrap();
//! let schema = registry.to_json_schema("Person", &config.schema).unwrap();
//! println!("{}", serde_json::to_string_pretty(&schema).unwrap());
//! ```

mod config;
mod error;
mod loader;

pub use config::{LoaderConfig, SchemaConfig};
pub use error::{LoaderError, Result};
pub use loader::{LibrarySource, ShapeRegistry, read_document};
