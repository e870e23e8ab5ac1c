//! RAML type model: shapes, inheritance resolution, validation and JSON
//! Schema conversion.
//!
//! This crate models RAML data types ("shapes") and the operations over
//! them:
//!
//! - [`Shape`]: a declared type: shared [`BaseShape`] attributes plus the
//!   kind-specific [`Facets`].
//! - [`build_shape`]: turns a declaration node into a shape, parsing type
//!   expressions (`A | B`, `T[]`, `[A, B]`) and identifying the kind from its
//!   facets when `type` is omitted.
//! - [`inherit`]: merges a parent's facets into a child, narrowing
//!   constraints and rejecting relaxations.
//! - [`Resolver`]: resolves aliases and inheritance chains into fully
//!   merged shapes, turning recursive references into
//!   [`Facets::Recursive`] back-references.
//! - [`Shape::check`] and [`Shape::validate`]: consistency checks on a
//!   resolved shape and runtime value validation against it.
//! - [`JsonSchemaConverter`]: emits a JSON Schema draft-07 document.
//!
//! [`TypeLibrary`] ties these together for a document's `types` and
//! `annotationTypes`.
//!
//! # Example
//!
//! ```
//! use raml_shapes_core::*;
//! use serde_json::json;
//!
//! let library = TypeLibrary::from_node(&json!({
//!     "types": {
//!         "Base": {"properties": {"x": {"type": "integer", "minimum": 0}}},
//!         "Derived": {"type": "Base", "properties": {"x": {"type": "integer", "minimum": 5}}}
//!     }
//! }), &Location::new("api.raml")).unwrap();
//!
//! let derived = library.resolver().unwrap_type("Derived").unwrap();
//! assert!(derived.validate(&json!({"x": 7}), "$").is_ok());
//! assert!(derived.validate(&json!({"x": 3}), "$").is_err());
//!
//! let schema = JsonSchemaConverter::new().convert(&derived).unwrap();
//! let schema = serde_json::to_value(&schema).unwrap();
//! assert_eq!(schema["properties"]["x"]["minimum"], json!(5));
//! ```

mod build;
mod check;
mod convert;
mod error;
mod facets;
mod inherit;
mod jsonschema;
mod library;
mod ordered;
mod resolve;
mod types;
mod validate;

pub use build::{build_property, build_shape};
pub use convert::{JsonSchemaConverter, ShapeVisitor};
pub use error::{Category, Diagnostic, Location, Result, Severity, ShapeError};
pub use facets::{
    ArrayFacets, BooleanFacets, DateTimeFacets, Facets, FileFacets, IntegerFacets, JsonFacets,
    NumberFacets, ObjectFacets, RecursiveFacets, StringFacets, UnionFacets, UnknownFacets,
};
pub use inherit::inherit;
pub use jsonschema::{DRAFT_07, EXTENSION_KEY, Schema, SchemaObject};
pub use library::{TypeLibrary, validate_custom_facets, validate_examples};
pub use ordered::OrderedMap;
pub use resolve::{Definitions, Resolver};
pub use types::*;
