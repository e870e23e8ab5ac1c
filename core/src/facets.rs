//! Kind-specific facet sets.
//!
//! Every optional facet is `None` when the declaration left it unset, which is
//! what inheritance uses to decide between adopting the parent's value and
//! narrowing against it.

use serde_json::Value;

use crate::ordered::OrderedMap;
use crate::types::{Node, Property, Shape, ShapeId, ShapeKind};

/// Constraint set of a shape, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Facets {
    Object(ObjectFacets),
    Array(ArrayFacets),
    Union(UnionFacets),
    String(StringFacets),
    Number(NumberFacets),
    Integer(IntegerFacets),
    Boolean(BooleanFacets),
    File(FileFacets),
    DateTime(DateTimeFacets),
    DateTimeOnly,
    DateOnly,
    TimeOnly,
    Any,
    Nil,
    Json(JsonFacets),
    Unknown(UnknownFacets),
    Recursive(RecursiveFacets),
}

impl Facets {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Object(_) => ShapeKind::Object,
            Self::Array(_) => ShapeKind::Array,
            Self::Union(_) => ShapeKind::Union,
            Self::String(_) => ShapeKind::String,
            Self::Number(_) => ShapeKind::Number,
            Self::Integer(_) => ShapeKind::Integer,
            Self::Boolean(_) => ShapeKind::Boolean,
            Self::File(_) => ShapeKind::File,
            Self::DateTime(_) => ShapeKind::DateTime,
            Self::DateTimeOnly => ShapeKind::DateTimeOnly,
            Self::DateOnly => ShapeKind::DateOnly,
            Self::TimeOnly => ShapeKind::TimeOnly,
            Self::Any => ShapeKind::Any,
            Self::Nil => ShapeKind::Nil,
            Self::Json(_) => ShapeKind::Json,
            Self::Unknown(_) => ShapeKind::Unknown,
            Self::Recursive(_) => ShapeKind::Recursive,
        }
    }

    /// Default (unconstrained) facets for a kind.
    ///
    /// Returns `None` for kinds that cannot be created without extra data
    /// (`Json`, `Recursive`).
    pub fn for_kind(kind: ShapeKind) -> Option<Self> {
        let facets = match kind {
            ShapeKind::Object => Self::Object(ObjectFacets::default()),
            ShapeKind::Array => Self::Array(ArrayFacets::default()),
            ShapeKind::Union => Self::Union(UnionFacets::default()),
            ShapeKind::String => Self::String(StringFacets::default()),
            ShapeKind::Number => Self::Number(NumberFacets::default()),
            ShapeKind::Integer => Self::Integer(IntegerFacets::default()),
            ShapeKind::Boolean => Self::Boolean(BooleanFacets::default()),
            ShapeKind::File => Self::File(FileFacets::default()),
            ShapeKind::DateTime => Self::DateTime(DateTimeFacets::default()),
            ShapeKind::DateTimeOnly => Self::DateTimeOnly,
            ShapeKind::DateOnly => Self::DateOnly,
            ShapeKind::TimeOnly => Self::TimeOnly,
            ShapeKind::Any => Self::Any,
            ShapeKind::Nil => Self::Nil,
            ShapeKind::Unknown => Self::Unknown(UnknownFacets::default()),
            ShapeKind::Json | ShapeKind::Recursive => return None,
        };
        Some(facets)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectFacets {
    pub properties: Option<OrderedMap<Property>>,
    pub discriminator: Option<String>,
    pub discriminator_value: Option<Value>,
    pub additional_properties: bool,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
}

impl Default for ObjectFacets {
    fn default() -> Self {
        Self {
            properties: None,
            discriminator: None,
            discriminator_value: None,
            additional_properties: true,
            min_properties: None,
            max_properties: None,
        }
    }
}

impl ObjectFacets {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.as_ref()?.get(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayFacets {
    pub items: Option<Box<Shape>>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnionFacets {
    pub any_of: Vec<Shape>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringFacets {
    pub enum_values: Option<Vec<Value>>,
    /// Minimum length in bytes.
    pub min_length: Option<u64>,
    /// Maximum length in bytes.
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberFacets {
    pub enum_values: Option<Vec<Value>>,
    pub format: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub multiple_of: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegerFacets {
    pub enum_values: Option<Vec<Value>>,
    pub format: Option<String>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BooleanFacets {
    pub enum_values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileFacets {
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub file_types: Option<Vec<String>>,
}

/// `datetime` facets. `format` is `rfc3339` (default) or `rfc2616`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateTimeFacets {
    pub format: Option<String>,
}

/// An embedded JSON Schema fragment, passed through untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonFacets {
    pub schema: Value,
}

/// Facet nodes of a shape whose kind is only known after resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnknownFacets {
    pub facets: OrderedMap<Node>,
}

/// Back-reference to the enclosing declared shape `head`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecursiveFacets {
    pub head: ShapeId,
    pub head_name: String,
}

/// Facet names that identify a kind when `type` is omitted.
pub(crate) const STRING_FACETS: &[&str] = &["pattern", "minLength", "maxLength"];
pub(crate) const NUMBER_FACETS: &[&str] = &["minimum", "maximum", "format", "multipleOf"];
pub(crate) const FILE_FACETS: &[&str] = &["fileTypes"];
pub(crate) const OBJECT_FACETS: &[&str] = &[
    "properties",
    "minProperties",
    "maxProperties",
    "additionalProperties",
    "discriminator",
    "discriminatorValue",
];
pub(crate) const ARRAY_FACETS: &[&str] = &["items", "minItems", "maxItems", "uniqueItems"];

/// Integer formats and their value ranges.
pub(crate) const INTEGER_FORMATS: &[(&str, i128, i128)] = &[
    ("int8", i8::MIN as i128, i8::MAX as i128),
    ("int16", i16::MIN as i128, i16::MAX as i128),
    ("int32", i32::MIN as i128, i32::MAX as i128),
    ("int", i64::MIN as i128, i64::MAX as i128),
    ("int64", i64::MIN as i128, i64::MAX as i128),
    ("long", i64::MIN as i128, i64::MAX as i128),
];

pub(crate) const FLOAT_FORMATS: &[&str] = &["float", "double"];

pub(crate) const DATETIME_FORMATS: &[&str] = &["rfc3339", "rfc2616"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_kind_round_trips_kind() {
        for kind in [
            ShapeKind::Object,
            ShapeKind::Array,
            ShapeKind::Union,
            ShapeKind::File,
            ShapeKind::DateOnly,
            ShapeKind::Unknown,
        ] {
            assert_eq!(Facets::for_kind(kind).map(|f| f.kind()), Some(kind));
        }
        assert!(Facets::for_kind(ShapeKind::Json).is_none());
        assert!(Facets::for_kind(ShapeKind::Recursive).is_none());
    }

    #[test]
    fn test_object_defaults_allow_additional_properties() {
        assert!(ObjectFacets::default().additional_properties);
    }
}
