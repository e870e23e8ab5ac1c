//! Shape type definitions.
//!
//! A [`Shape`] is a declared data type: the attributes every kind shares
//! ([`BaseShape`]) plus the kind-specific constraint set ([`Facets`]). Shapes
//! own their children (array items, property shapes, union alternatives,
//! custom-facet definition shapes). References to other declared types are
//! held by name in [`BaseShape::alias`] and are never owned.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Location;
use crate::facets::{
    ArrayFacets, Facets, IntegerFacets, NumberFacets, ObjectFacets, StringFacets, UnionFacets,
};
use crate::ordered::OrderedMap;

static NEXT_SHAPE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a shape instance.
///
/// Unique per process. Structural copies made with [`Clone`] keep the
/// identity; [`Shape::deep_clone`] assigns fresh identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ShapeId(u64);

impl ShapeId {
    /// Allocates the next identity.
    pub fn next() -> Self {
        Self(NEXT_SHAPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind tag of a shape.
///
/// # Examples
///
/// ```
/// use raml_shapes_core::ShapeKind;
///
/// assert_eq!(ShapeKind::from_type_name("datetime-only"), Some(ShapeKind::DateTimeOnly));
/// assert_eq!(ShapeKind::from_type_name("Person"), None);
/// assert_eq!(ShapeKind::Integer.to_string(), "integer");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeKind {
    Object,
    Array,
    Union,
    String,
    Number,
    Integer,
    Boolean,
    File,
    #[serde(rename = "datetime")]
    DateTime,
    #[serde(rename = "datetime-only")]
    DateTimeOnly,
    DateOnly,
    TimeOnly,
    Any,
    Nil,
    Json,
    /// Placeholder for a shape whose kind is not known yet.
    Unknown,
    /// Back-reference to an enclosing shape.
    Recursive,
}

impl ShapeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::Union => "union",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::File => "file",
            Self::DateTime => "datetime",
            Self::DateTimeOnly => "datetime-only",
            Self::DateOnly => "date-only",
            Self::TimeOnly => "time-only",
            Self::Any => "any",
            Self::Nil => "nil",
            Self::Json => "json",
            Self::Unknown => "unknown",
            Self::Recursive => "recursive",
        }
    }

    /// Maps a built-in type name to its kind.
    ///
    /// Returns `None` for user-defined type names.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name {
            "object" => Self::Object,
            "array" => Self::Array,
            "string" => Self::String,
            "number" => Self::Number,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "file" => Self::File,
            "datetime" => Self::DateTime,
            "datetime-only" => Self::DateTimeOnly,
            "date-only" => Self::DateOnly,
            "time-only" => Self::TimeOnly,
            "any" => Self::Any,
            "nil" => Self::Nil,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw declaration value with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub value: Value,
    pub location: Location,
}

impl Node {
    pub fn new(value: Value, location: Location) -> Self {
        Self { value, location }
    }
}

/// A declared example value.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    /// Example name when declared under `examples`.
    pub name: Option<String>,
    pub value: Value,
    pub location: Location,
}

/// Attributes shared by every shape kind.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseShape {
    pub id: ShapeId,
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    /// Parent shapes, in declaration order.
    pub inherits: Vec<Shape>,
    /// Name of the declared type this shape refers to.
    pub alias: Option<String>,
    pub default: Option<Node>,
    pub example: Option<Example>,
    pub examples: Option<OrderedMap<Example>>,
    pub required: Option<bool>,
    /// Set once inheritance resolution has run.
    pub unwrapped: bool,
    /// Custom facet values declared on this shape.
    pub custom_facets: OrderedMap<Node>,
    /// Custom facets this shape defines for its subtypes.
    pub custom_facet_definitions: OrderedMap<Property>,
    pub domain_extensions: OrderedMap<Node>,
    pub location: Location,
}

impl BaseShape {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Self {
            id: ShapeId::next(),
            name: name.into(),
            display_name: None,
            description: None,
            inherits: Vec::new(),
            alias: None,
            default: None,
            example: None,
            examples: None,
            required: None,
            unwrapped: false,
            custom_facets: OrderedMap::new(),
            custom_facet_definitions: OrderedMap::new(),
            domain_extensions: OrderedMap::new(),
            location,
        }
    }
}

/// A named, owned member shape of an object or a custom facet definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub shape: Shape,
    pub required: bool,
}

impl Property {
    /// Creates a required property.
    pub fn required(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            required: true,
        }
    }

    /// Creates an optional property.
    pub fn optional(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            required: false,
        }
    }
}

/// A declared data type.
///
/// # Examples
///
/// ```
/// use raml_shapes_core::{Facets, Property, Shape, ShapeKind, StringFacets};
///
/// let name = Shape::string("name", StringFacets {
///     min_length: Some(1),
///     ..Default::default()
/// });
/// let person = Shape::object("Person", vec![Property::required("name", name)]);
///
/// assert_eq!(person.kind(), ShapeKind::Object);
/// let Facets::Object(facets) = &person.facets else { unreachable!() };
/// assert!(facets.property("name").is_some());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub base: BaseShape,
    pub facets: Facets,
}

impl Shape {
    /// Creates a shape with a fresh identity and no location.
    pub fn new(name: impl Into<String>, facets: Facets) -> Self {
        Self {
            base: BaseShape::new(name, Location::default()),
            facets,
        }
    }

    /// Creates an unresolved reference to the declared type `target`.
    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        let mut shape = Self::new(name, Facets::Unknown(Default::default()));
        shape.base.alias = Some(target.into());
        shape
    }

    pub fn string(name: impl Into<String>, facets: StringFacets) -> Self {
        Self::new(name, Facets::String(facets))
    }

    pub fn integer(name: impl Into<String>, facets: IntegerFacets) -> Self {
        Self::new(name, Facets::Integer(facets))
    }

    pub fn number(name: impl Into<String>, facets: NumberFacets) -> Self {
        Self::new(name, Facets::Number(facets))
    }

    pub fn array(name: impl Into<String>, facets: ArrayFacets) -> Self {
        Self::new(name, Facets::Array(facets))
    }

    /// Creates an object shape with the given properties and default facets.
    pub fn object(name: impl Into<String>, properties: Vec<Property>) -> Self {
        let properties = properties
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        Self::new(
            name,
            Facets::Object(ObjectFacets {
                properties: Some(properties),
                ..Default::default()
            }),
        )
    }

    pub fn union(name: impl Into<String>, any_of: Vec<Shape>) -> Self {
        Self::new(name, Facets::Union(UnionFacets { any_of }))
    }

    /// Sets the declaration location.
    pub fn with_location(mut self, location: Location) -> Self {
        self.base.location = location;
        self
    }

    /// Appends a parent shape.
    pub fn with_parent(mut self, parent: Shape) -> Self {
        self.base.inherits.push(parent);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.base.description = Some(description.into());
        self
    }

    pub fn id(&self) -> ShapeId {
        self.base.id
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn kind(&self) -> ShapeKind {
        self.facets.kind()
    }

    pub fn location(&self) -> &Location {
        &self.base.location
    }

    pub fn is_unwrapped(&self) -> bool {
        self.base.unwrapped
    }

    /// Deep-copies the shape, assigning fresh identities to it and to every
    /// owned child.
    ///
    /// Parents in [`BaseShape::inherits`], aliases and recursive
    /// back-references keep pointing at the same shapes.
    pub fn deep_clone(&self) -> Shape {
        let mut copy = self.clone();
        copy.reassign_ids();
        copy
    }

    fn reassign_ids(&mut self) {
        self.base.id = ShapeId::next();
        for definition in self.base.custom_facet_definitions.values_mut() {
            definition.shape.reassign_ids();
        }
        match &mut self.facets {
            Facets::Array(array) => {
                if let Some(items) = array.items.as_mut() {
                    items.reassign_ids();
                }
            }
            Facets::Object(object) => {
                if let Some(properties) = object.properties.as_mut() {
                    for property in properties.values_mut() {
                        property.shape.reassign_ids();
                    }
                }
            }
            Facets::Union(union) => {
                for member in &mut union.any_of {
                    member.reassign_ids();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_ids_are_unique() {
        let a = Shape::new("a", Facets::Any);
        let b = Shape::new("b", Facets::Any);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_deep_clone_reassigns_owned_ids() {
        let items = Shape::string("items", StringFacets::default());
        let array = Shape::array(
            "Tags",
            ArrayFacets {
                items: Some(Box::new(items)),
                ..Default::default()
            },
        );

        let mut copy = array.deep_clone();
        assert_ne!(copy.id(), array.id());

        let Facets::Array(original) = &array.facets else {
            panic!("expected array facets");
        };
        let Facets::Array(cloned) = &mut copy.facets else {
            panic!("expected array facets");
        };
        let original_items = original.items.as_ref().unwrap();
        let cloned_items = cloned.items.as_mut().unwrap();
        assert_ne!(cloned_items.id(), original_items.id());

        cloned_items.facets = Facets::String(StringFacets {
            min_length: Some(3),
            ..Default::default()
        });
        assert_eq!(original_items.facets, Facets::String(StringFacets::default()));
    }

    #[test]
    fn test_deep_clone_keeps_parent_references() {
        let parent = Shape::reference("Base", "Base");
        let child = Shape::new("Child", Facets::Any).with_parent(parent.clone());

        let copy = child.deep_clone();
        assert_eq!(copy.base.inherits[0].id(), parent.id());
        assert_eq!(copy.base.inherits[0].base.alias.as_deref(), Some("Base"));
    }

    #[test]
    fn test_object_constructor_keeps_property_order() {
        let shape = Shape::object(
            "Point",
            vec![
                Property::required("y", Shape::new("y", Facets::Any)),
                Property::optional("x", Shape::new("x", Facets::Any)),
            ],
        );
        let Facets::Object(object) = &shape.facets else {
            panic!("expected object facets");
        };
        let names: Vec<&str> = object.properties.as_ref().unwrap().keys().collect();
        assert_eq!(names, vec!["y", "x"]);
        assert!(!object.property("x").unwrap().required);
    }

    #[test]
    fn test_kind_names_match_type_names() {
        for kind in [
            ShapeKind::Object,
            ShapeKind::DateTime,
            ShapeKind::DateTimeOnly,
            ShapeKind::TimeOnly,
            ShapeKind::Nil,
        ] {
            assert_eq!(ShapeKind::from_type_name(kind.as_str()), Some(kind));
        }
        assert_eq!(ShapeKind::from_type_name("union"), None);
    }
}
