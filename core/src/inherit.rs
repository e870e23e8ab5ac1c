//! Facet inheritance between a child shape and one of its parents.
//!
//! [`inherit`] is pure: it returns a merged copy of the child and never
//! touches either input. Unset child facets adopt the parent's value. When
//! both sides set a bounded facet, the child may only narrow it: lower bounds
//! (`minimum`, `minLength`, `minItems`, `minProperties`) must not decrease and
//! upper bounds (`maximum`, `maxLength`, `maxItems`, `maxProperties`) must not
//! increase.
//!
//! # Example
//!
//! ```
//! use raml_shapes_core::*;
//!
//! let parent = Shape::integer("Age", IntegerFacets {
//!     minimum: Some(0),
//!     maximum: Some(150),
//!     ..Default::default()
//! });
//! let child = Shape::integer("AdultAge", IntegerFacets {
//!     minimum: Some(18),
//!     ..Default::default()
//! });
//!
//! let merged = inherit(&child, &parent).unwrap();
//! let Facets::Integer(facets) = &merged.facets else { unreachable!() };
//! assert_eq!((facets.minimum, facets.maximum), (Some(18), Some(150)));
//!
//! let widened = Shape::integer("Any", IntegerFacets { minimum: Some(-1), ..Default::default() });
//! assert!(inherit(&widened, &parent).is_err());
//! ```

use serde_json::Value;
use tracing::debug;

use crate::error::{Location, Result, ShapeError};
use crate::facets::{
    ArrayFacets, BooleanFacets, DateTimeFacets, Facets, FileFacets, IntegerFacets, NumberFacets,
    ObjectFacets, StringFacets, UnionFacets,
};
use crate::types::{Shape, ShapeKind};

/// Tolerance when checking that one `multipleOf` divides another.
const MULTIPLE_OF_EPSILON: f64 = 1e-9;

/// Merges `source` (the parent) into `target` (the child).
///
/// The result keeps the child's base attributes and identity.
///
/// # Errors
///
/// - [`ShapeError::KindMismatch`] when the kinds differ;
/// - [`ShapeError::UnresolvedShape`] when either side is still `Unknown`;
/// - [`ShapeError::ConstraintViolation`] when the child widens a facet;
/// - [`ShapeError::IncompatibleUnionMember`] for union members of kinds the
///   parent union does not allow.
///
/// Unions merge every child member with every parent member of the same
/// kind. Pairs that fail to narrow are dropped; a child member that narrows
/// none of them fails the merge.
pub fn inherit(target: &Shape, source: &Shape) -> Result<Shape> {
    let location = target.location();
    let facets = match (&target.facets, &source.facets) {
        (Facets::Unknown(_), _) => {
            return Err(ShapeError::unresolved(target.name(), location));
        }
        (_, Facets::Unknown(_)) => {
            return Err(ShapeError::unresolved(source.name(), source.location()));
        }
        (Facets::Object(t), Facets::Object(s)) => Facets::Object(inherit_object(t, s, location)?),
        (Facets::Array(t), Facets::Array(s)) => Facets::Array(inherit_array(t, s, location)?),
        (Facets::Union(t), Facets::Union(s)) => Facets::Union(inherit_union(t, s, location)?),
        (Facets::String(t), Facets::String(s)) => Facets::String(inherit_string(t, s, location)?),
        (Facets::Number(t), Facets::Number(s)) => Facets::Number(inherit_number(t, s, location)?),
        (Facets::Integer(t), Facets::Integer(s)) => {
            Facets::Integer(inherit_integer(t, s, location)?)
        }
        (Facets::Boolean(t), Facets::Boolean(s)) => Facets::Boolean(BooleanFacets {
            enum_values: adopt(&t.enum_values, &s.enum_values),
        }),
        (Facets::File(t), Facets::File(s)) => Facets::File(inherit_file(t, s, location)?),
        (Facets::DateTime(t), Facets::DateTime(s)) => Facets::DateTime(DateTimeFacets {
            format: same_value("format", &t.format, &s.format, location)?,
        }),
        (Facets::Json(t), Facets::Json(_)) => Facets::Json(t.clone()),
        (Facets::Recursive(t), Facets::Recursive(_)) => Facets::Recursive(t.clone()),
        (t, s) if t.kind() == s.kind() => t.clone(),
        (t, s) => {
            return Err(ShapeError::KindMismatch {
                target: t.kind(),
                parent: s.kind(),
                location: location.clone(),
            });
        }
    };

    Ok(Shape {
        base: target.base.clone(),
        facets,
    })
}

impl Shape {
    /// Merges `source` into this shape. See [`inherit`].
    pub fn inherit(&self, source: &Shape) -> Result<Shape> {
        inherit(self, source)
    }
}

fn inherit_object(
    target: &ObjectFacets,
    source: &ObjectFacets,
    location: &Location,
) -> Result<ObjectFacets> {
    let properties = match (&target.properties, &source.properties) {
        (None, inherited) => inherited.clone(),
        (Some(declared), None) => Some(declared.clone()),
        (Some(declared), Some(inherited)) => {
            let mut merged = declared.clone();
            for (name, parent) in inherited.iter() {
                match merged.get_mut(name) {
                    Some(child) => {
                        child.shape = inherit(&child.shape, &parent.shape).map_err(|e| {
                            e.wrap("merge object property", location)
                                .with_info("property", name)
                        })?;
                    }
                    None => {
                        merged.insert(name, parent.clone());
                    }
                }
            }
            Some(merged)
        }
    };

    Ok(ObjectFacets {
        properties,
        discriminator: source.discriminator.clone(),
        discriminator_value: source.discriminator_value.clone(),
        additional_properties: source.additional_properties,
        min_properties: narrow_lower(
            "minProperties",
            target.min_properties,
            source.min_properties,
            location,
        )?,
        max_properties: narrow_upper(
            "maxProperties",
            target.max_properties,
            source.max_properties,
            location,
        )?,
    })
}

fn inherit_array(
    target: &ArrayFacets,
    source: &ArrayFacets,
    location: &Location,
) -> Result<ArrayFacets> {
    let items = match (&target.items, &source.items) {
        (None, inherited) => inherited.clone(),
        (Some(declared), None) => Some(declared.clone()),
        (Some(declared), Some(inherited)) => Some(Box::new(
            inherit(declared, inherited).map_err(|e| e.wrap("merge array items", location))?,
        )),
    };

    let unique_items = match (target.unique_items, source.unique_items) {
        (Some(false), Some(true)) => {
            return Err(ShapeError::ConstraintViolation {
                facet: "uniqueItems".to_string(),
                inherited: Value::Bool(true),
                declared: Value::Bool(false),
                location: location.clone(),
            });
        }
        (None, inherited) => inherited,
        (declared, _) => declared,
    };

    Ok(ArrayFacets {
        items,
        min_items: narrow_lower("minItems", target.min_items, source.min_items, location)?,
        max_items: narrow_upper("maxItems", target.max_items, source.max_items, location)?,
        unique_items,
    })
}

/// Merges union alternatives pairwise by kind.
///
/// Every parent alternative is matched against every child alternative of
/// the same kind; each pair contributes one merged alternative.
fn inherit_union(
    target: &UnionFacets,
    source: &UnionFacets,
    location: &Location,
) -> Result<UnionFacets> {
    if target.any_of.is_empty() {
        return Ok(source.clone());
    }

    let mut any_of = Vec::new();
    let mut merged_members = vec![0usize; target.any_of.len()];
    let mut failures: Vec<Option<ShapeError>> = target.any_of.iter().map(|_| None).collect();
    for (index, parent) in source.any_of.iter().enumerate() {
        for (member, child) in target.any_of.iter().enumerate() {
            if child.kind() != parent.kind() {
                continue;
            }
            match inherit(&child.deep_clone(), parent) {
                Ok(merged) => {
                    merged_members[member] += 1;
                    any_of.push(merged);
                }
                Err(e) => {
                    debug!(member, parent = index, error = %e, "Dropping union pair that does not narrow");
                    if failures[member].is_none() {
                        failures[member] = Some(
                            e.wrap("merge union member", location)
                                .with_info("member", member)
                                .with_info("parent", index),
                        );
                    }
                }
            }
        }
    }

    // Every child member must narrow at least one parent member of its kind.
    for (count, failure) in merged_members.iter().zip(failures) {
        if let (0, Some(err)) = (*count, failure) {
            return Err(err);
        }
    }

    let mut allowed: Vec<ShapeKind> = Vec::new();
    for parent in &source.any_of {
        if !allowed.contains(&parent.kind()) {
            allowed.push(parent.kind());
        }
    }
    if let Some(incompatible) = target.any_of.iter().find(|c| !allowed.contains(&c.kind())) {
        return Err(ShapeError::IncompatibleUnionMember {
            member: incompatible.kind(),
            allowed,
            location: location.clone(),
        });
    }

    Ok(UnionFacets { any_of })
}

fn inherit_string(
    target: &StringFacets,
    source: &StringFacets,
    location: &Location,
) -> Result<StringFacets> {
    Ok(StringFacets {
        enum_values: adopt(&target.enum_values, &source.enum_values),
        min_length: narrow_lower("minLength", target.min_length, source.min_length, location)?,
        max_length: narrow_upper("maxLength", target.max_length, source.max_length, location)?,
        pattern: adopt(&target.pattern, &source.pattern),
    })
}

fn inherit_number(
    target: &NumberFacets,
    source: &NumberFacets,
    location: &Location,
) -> Result<NumberFacets> {
    let multiple_of = match (target.multiple_of, source.multiple_of) {
        (Some(declared), Some(inherited)) if !is_multiple(declared, inherited) => {
            return Err(ShapeError::ConstraintViolation {
                facet: "multipleOf".to_string(),
                inherited: Value::from(inherited),
                declared: Value::from(declared),
                location: location.clone(),
            });
        }
        (None, inherited) => inherited,
        (declared, _) => declared,
    };

    Ok(NumberFacets {
        enum_values: adopt(&target.enum_values, &source.enum_values),
        format: same_value("format", &target.format, &source.format, location)?,
        minimum: narrow_lower("minimum", target.minimum, source.minimum, location)?,
        maximum: narrow_upper("maximum", target.maximum, source.maximum, location)?,
        multiple_of,
    })
}

fn inherit_integer(
    target: &IntegerFacets,
    source: &IntegerFacets,
    location: &Location,
) -> Result<IntegerFacets> {
    Ok(IntegerFacets {
        enum_values: adopt(&target.enum_values, &source.enum_values),
        format: same_value("format", &target.format, &source.format, location)?,
        minimum: narrow_lower("minimum", target.minimum, source.minimum, location)?,
        maximum: narrow_upper("maximum", target.maximum, source.maximum, location)?,
    })
}

fn inherit_file(
    target: &FileFacets,
    source: &FileFacets,
    location: &Location,
) -> Result<FileFacets> {
    Ok(FileFacets {
        min_length: narrow_lower("minLength", target.min_length, source.min_length, location)?,
        max_length: narrow_upper("maxLength", target.max_length, source.max_length, location)?,
        file_types: adopt(&target.file_types, &source.file_types),
    })
}

fn adopt<T: Clone>(declared: &Option<T>, inherited: &Option<T>) -> Option<T> {
    declared.clone().or_else(|| inherited.clone())
}

/// Lower bounds may only grow.
fn narrow_lower<T>(
    facet: &str,
    declared: Option<T>,
    inherited: Option<T>,
    location: &Location,
) -> Result<Option<T>>
where
    T: PartialOrd + Copy + Into<Value>,
{
    match (declared, inherited) {
        (Some(d), Some(i)) if d < i => Err(violation(facet, i, d, location)),
        (None, inherited) => Ok(inherited),
        (declared, _) => Ok(declared),
    }
}

/// Upper bounds may only shrink.
fn narrow_upper<T>(
    facet: &str,
    declared: Option<T>,
    inherited: Option<T>,
    location: &Location,
) -> Result<Option<T>>
where
    T: PartialOrd + Copy + Into<Value>,
{
    match (declared, inherited) {
        (Some(d), Some(i)) if d > i => Err(violation(facet, i, d, location)),
        (None, inherited) => Ok(inherited),
        (declared, _) => Ok(declared),
    }
}

/// Both sides may set the facet only to the same value.
fn same_value(
    facet: &str,
    declared: &Option<String>,
    inherited: &Option<String>,
    location: &Location,
) -> Result<Option<String>> {
    match (declared, inherited) {
        (Some(d), Some(i)) if d != i => Err(violation(facet, i.as_str(), d.as_str(), location)),
        _ => Ok(adopt(declared, inherited)),
    }
}

fn violation(
    facet: &str,
    inherited: impl Into<Value>,
    declared: impl Into<Value>,
    location: &Location,
) -> ShapeError {
    ShapeError::ConstraintViolation {
        facet: facet.to_string(),
        inherited: inherited.into(),
        declared: declared.into(),
        location: location.clone(),
    }
}

fn is_multiple(declared: f64, inherited: f64) -> bool {
    if inherited == 0.0 {
        return declared == 0.0;
    }
    let ratio = declared / inherited;
    (ratio - ratio.round()).abs() < MULTIPLE_OF_EPSILON
}
