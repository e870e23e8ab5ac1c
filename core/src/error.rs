//! Error and diagnostic types for shape construction, resolution and
//! validation.
//!
//! Every failure is a [`ShapeError`]. Recursive operations wrap a child
//! failure in [`ShapeError::Wrapped`] with their own context (property name,
//! array index, union member, facet) so the outermost error carries the full
//! breadcrumb down to the failing facet or value. [`Diagnostic`] turns that
//! chain into the structured record consumed by reporting layers.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::OrderedMap;
use crate::types::ShapeKind;

/// Declaration source location.
///
/// Line and column are optional because not every node source can report
/// positions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    /// File path or logical document name.
    pub file: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl Location {
    /// Creates a location without position information.
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
        }
    }

    /// Attaches a line/column position.
    pub fn with_position(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        Ok(())
    }
}

/// Failures raised by the shape model.
///
/// Use [`ShapeError::root`] to reach the innermost failure of a wrapped
/// chain and [`ShapeError::breadcrumb`] to read the context trail.
///
/// # Examples
///
/// ```
/// use raml_shapes_core::{Location, ShapeError};
///
/// let location = Location::new("types.raml");
/// let err = ShapeError::invalid("minLength must not exceed maxLength", &location)
///     .wrap("check property", &location)
///     .with_info("property", "name");
///
/// assert!(matches!(err.root(), ShapeError::InvalidShape { .. }));
/// assert_eq!(err.breadcrumb(), vec!["check property (property=name)".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    /// Inheritance between shapes of different kinds.
    #[error("cannot inherit from different type: target is {target}, source is {parent}")]
    KindMismatch {
        target: ShapeKind,
        parent: ShapeKind,
        location: Location,
    },

    /// A child facet widens the constraint inherited from its parent.
    #[error("{facet} constraint violation: inherited {inherited}, declared {declared}")]
    ConstraintViolation {
        facet: String,
        inherited: Value,
        declared: Value,
        location: Location,
    },

    /// A custom facet value has no definition in the inheritance chain.
    #[error("unknown facet `{facet}`")]
    UnknownFacet { facet: String, location: Location },

    /// A required custom facet was not given a value.
    #[error("required custom facet `{facet}` is missing")]
    MissingRequiredFacet { facet: String, location: Location },

    /// The same custom facet is defined more than once along the chain.
    #[error("duplicate custom facet `{facet}`")]
    DuplicateFacetDefinition { facet: String, location: Location },

    /// A child union alternative has no counterpart in the parent union.
    #[error("target union includes an incompatible type: {member}")]
    IncompatibleUnionMember {
        member: ShapeKind,
        allowed: Vec<ShapeKind>,
        location: Location,
    },

    /// A concrete value does not satisfy a resolved shape.
    #[error("{path}: {message}")]
    ValueValidationFailure {
        path: String,
        message: String,
        location: Location,
    },

    /// An `Unknown` shape or unbound reference reached a stage that needs a
    /// resolved shape.
    #[error("unresolved shape `{name}`")]
    UnresolvedShape { name: String, location: Location },

    /// A type inherits from itself, directly or transitively.
    #[error("inheritance cycle through `{name}`")]
    SelfInheritanceCycle { name: String, location: Location },

    /// Structural declaration error or failed self-consistency check.
    #[error("invalid shape: {message}")]
    InvalidShape { message: String, location: Location },

    /// A failure wrapped with the context of the caller.
    #[error("{context}: {source}")]
    Wrapped {
        context: String,
        info: Vec<(String, String)>,
        location: Location,
        #[source]
        source: Box<ShapeError>,
    },
}

/// Convenience alias for results with [`ShapeError`].
pub type Result<T> = std::result::Result<T, ShapeError>;

impl ShapeError {
    /// Builds an [`InvalidShape`](ShapeError::InvalidShape) error.
    pub fn invalid(message: impl Into<String>, location: &Location) -> Self {
        Self::InvalidShape {
            message: message.into(),
            location: location.clone(),
        }
    }

    /// Builds a [`ValueValidationFailure`](ShapeError::ValueValidationFailure).
    pub fn value(path: &str, message: impl Into<String>, location: &Location) -> Self {
        Self::ValueValidationFailure {
            path: path.to_string(),
            message: message.into(),
            location: location.clone(),
        }
    }

    /// Builds an [`UnresolvedShape`](ShapeError::UnresolvedShape) error.
    pub fn unresolved(name: impl Into<String>, location: &Location) -> Self {
        Self::UnresolvedShape {
            name: name.into(),
            location: location.clone(),
        }
    }

    /// Wraps this error with caller context.
    pub fn wrap(self, context: impl Into<String>, location: &Location) -> Self {
        Self::Wrapped {
            context: context.into(),
            info: Vec::new(),
            location: location.clone(),
            source: Box::new(self),
        }
    }

    /// Adds a key/value pair to the outermost wrapping context.
    ///
    /// Only meaningful after [`wrap`](ShapeError::wrap); other variants are
    /// returned unchanged.
    pub fn with_info(mut self, key: &str, value: impl fmt::Display) -> Self {
        if let Self::Wrapped { info, .. } = &mut self {
            info.push((key.to_string(), value.to_string()));
        }
        self
    }

    /// Returns the innermost failure of a wrapped chain.
    pub fn root(&self) -> &ShapeError {
        let mut current = self;
        while let Self::Wrapped { source, .. } = current {
            current = source;
        }
        current
    }

    /// Returns the context trail from the outermost wrapper inwards.
    pub fn breadcrumb(&self) -> Vec<String> {
        let mut trail = Vec::new();
        let mut current = self;
        while let Self::Wrapped {
            context,
            info,
            source,
            ..
        } = current
        {
            if info.is_empty() {
                trail.push(context.clone());
            } else {
                let pairs: Vec<String> = info.iter().map(|(k, v)| format!("{k}={v}")).collect();
                trail.push(format!("{context} ({})", pairs.join(", ")));
            }
            current = source;
        }
        trail
    }

    pub fn location(&self) -> &Location {
        match self {
            Self::KindMismatch { location, .. }
            | Self::ConstraintViolation { location, .. }
            | Self::UnknownFacet { location, .. }
            | Self::MissingRequiredFacet { location, .. }
            | Self::DuplicateFacetDefinition { location, .. }
            | Self::IncompatibleUnionMember { location, .. }
            | Self::ValueValidationFailure { location, .. }
            | Self::UnresolvedShape { location, .. }
            | Self::SelfInheritanceCycle { location, .. }
            | Self::InvalidShape { location, .. }
            | Self::Wrapped { location, .. } => location,
        }
    }

    /// Returns the processing stage the root failure belongs to.
    pub fn category(&self) -> Category {
        match self.root() {
            Self::InvalidShape { .. } => Category::Parsing,
            Self::KindMismatch { .. }
            | Self::ConstraintViolation { .. }
            | Self::IncompatibleUnionMember { .. }
            | Self::UnresolvedShape { .. }
            | Self::SelfInheritanceCycle { .. } => Category::Resolving,
            _ => Category::Validating,
        }
    }

    fn context_pairs(&self) -> OrderedMap<String> {
        let mut context = OrderedMap::new();
        match self {
            Self::KindMismatch { target, parent, .. } => {
                context.insert("source", parent.to_string());
                context.insert("target", target.to_string());
            }
            Self::ConstraintViolation {
                facet,
                inherited,
                declared,
                ..
            } => {
                context.insert("facet", facet.clone());
                context.insert("source", inherited.to_string());
                context.insert("target", declared.to_string());
            }
            Self::UnknownFacet { facet, .. }
            | Self::MissingRequiredFacet { facet, .. }
            | Self::DuplicateFacetDefinition { facet, .. } => {
                context.insert("facet", facet.clone());
            }
            Self::IncompatibleUnionMember { member, allowed, .. } => {
                let allowed: Vec<String> = allowed.iter().map(ToString::to_string).collect();
                context.insert("target_type", member.to_string());
                context.insert("source_types", allowed.join(", "));
            }
            Self::ValueValidationFailure { path, .. } => {
                context.insert("path", path.clone());
            }
            Self::UnresolvedShape { name, .. } | Self::SelfInheritanceCycle { name, .. } => {
                context.insert("shape", name.clone());
            }
            Self::InvalidShape { .. } => {}
            Self::Wrapped { info, .. } => {
                for (k, v) in info {
                    context.insert(k.clone(), v.clone());
                }
            }
        }
        context
    }
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

/// Processing stage a diagnostic originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Parsing,
    Loading,
    Reading,
    Resolving,
    Validating,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Parsing => "parsing",
            Self::Loading => "loading",
            Self::Reading => "reading",
            Self::Resolving => "resolving",
            Self::Validating => "validating",
        })
    }
}

/// Structured, serializable rendition of a [`ShapeError`] chain.
///
/// The core never formats diagnostics; it only builds them. Each wrapping
/// level of the error becomes one diagnostic whose `cause` is the next level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub category: Category,
    pub location: Location,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<Diagnostic>>,
    #[serde(skip_serializing_if = "OrderedMap::is_empty")]
    pub context: OrderedMap<String>,
}

impl From<&ShapeError> for Diagnostic {
    fn from(err: &ShapeError) -> Self {
        let (message, cause) = match err {
            ShapeError::Wrapped {
                context, source, ..
            } => (context.clone(), Some(Box::new(Diagnostic::from(source.as_ref())))),
            other => (other.to_string(), None),
        };
        Self {
            severity: Severity::Error,
            category: err.category(),
            location: err.location().clone(),
            message,
            cause,
            context: err.context_pairs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        assert_eq!(Location::new("a.raml").to_string(), "a.raml");
        assert_eq!(
            Location::new("a.raml").with_position(3, 7).to_string(),
            "a.raml:3:7"
        );
    }

    #[test]
    fn test_root_and_breadcrumb_walk_the_chain() {
        let location = Location::new("lib.raml");
        let err = ShapeError::ConstraintViolation {
            facet: "minimum".to_string(),
            inherited: Value::from(0),
            declared: Value::from(-5),
            location: location.clone(),
        }
        .wrap("merge object property", &location)
        .with_info("property", "x")
        .wrap("unwrap shape", &location);

        assert!(matches!(
            err.root(),
            ShapeError::ConstraintViolation { facet, .. } if facet == "minimum"
        ));
        assert_eq!(
            err.breadcrumb(),
            vec![
                "unwrap shape".to_string(),
                "merge object property (property=x)".to_string()
            ]
        );
        assert_eq!(err.category(), Category::Resolving);
    }

    #[test]
    fn test_diagnostic_carries_cause_and_context() {
        let location = Location::new("lib.raml");
        let err = ShapeError::ConstraintViolation {
            facet: "maxLength".to_string(),
            inherited: Value::from(10),
            declared: Value::from(20),
            location: location.clone(),
        }
        .wrap("inherit", &location)
        .with_info("parent", "Name");

        let diagnostic = Diagnostic::from(&err);
        assert_eq!(diagnostic.message, "inherit");
        assert_eq!(diagnostic.context.get("parent").map(String::as_str), Some("Name"));

        let cause = diagnostic.cause.expect("wrapped cause");
        assert_eq!(cause.context.get("source").map(String::as_str), Some("10"));
        assert_eq!(cause.context.get("target").map(String::as_str), Some("20"));
        assert!(cause.cause.is_none());
    }
}
