//! Shape resolution ("unwrap").
//!
//! The [`Resolver`] turns a declared shape into a fully merged one: it
//! follows type references by name, resolves parents first, decodes pending
//! (`Unknown`) facets once the kind is known, resolves owned children, and
//! finally folds every parent into the shape with [`inherit`].
//!
//! Each declared type is resolved once per resolver and memoised by
//! identity, so every reference to it receives the same merged value.
//! Cycles are tracked with the identities of the declared types currently
//! being resolved:
//!
//! - a type reached again below a nesting child (property, array items,
//!   facet definition) becomes a [`Facets::Recursive`] back-reference;
//! - a type reached again through parent edges, aliases and union members
//!   only is a [`SelfInheritanceCycle`](crate::ShapeError::SelfInheritanceCycle),
//!   since such a type would have to contain itself (`Entry: Entry | string`).

use std::collections::HashMap;

use tracing::debug;

use crate::build::decode_facets;
use crate::error::{Result, ShapeError};
use crate::facets::{Facets, RecursiveFacets, UnknownFacets};
use crate::inherit::inherit;
use crate::library::TypeLibrary;
use crate::types::{Shape, ShapeId, ShapeKind};

/// Resolved declared types keyed by the identity of their declaration.
///
/// Recursive back-references are looked up here during validation and
/// schema conversion.
pub type Definitions = HashMap<ShapeId, Shape>;

/// Resolves shapes against the declarations of a [`TypeLibrary`].
///
/// # Examples
///
/// ```
/// use raml_shapes_core::*;
/// use serde_json::json;
///
/// let location = Location::new("lib.raml");
/// let library = TypeLibrary::from_node(&json!({
///     "types": {
///         "Name": {"type": "string", "maxLength": 20},
///         "ShortName": {"type": "Name", "maxLength": 8}
///     }
/// }), &location).unwrap();
///
/// let mut resolver = Resolver::new(&library);
/// let short = resolver.unwrap_type("ShortName").unwrap();
/// let Facets::String(facets) = &short.facets else { unreachable!() };
/// assert_eq!(facets.max_length, Some(8));
/// assert!(short.is_unwrapped());
/// ```
pub struct Resolver<'a> {
    library: &'a TypeLibrary,
    definitions: Definitions,
    /// Declared types under resolution, with the child depth they were
    /// entered at.
    path: Vec<(ShapeId, usize)>,
    /// Number of nesting edges (property, items, facet definition) on the
    /// current resolution path.
    child_depth: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(library: &'a TypeLibrary) -> Self {
        Self {
            library,
            definitions: Definitions::new(),
            path: Vec::new(),
            child_depth: 0,
        }
    }

    /// Resolved declared types so far.
    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    pub fn into_definitions(self) -> Definitions {
        self.definitions
    }

    /// Resolves the declared type `name`.
    pub fn unwrap_type(&mut self, name: &str) -> Result<Shape> {
        let declared = self
            .library
            .find_type(name)
            .ok_or_else(|| ShapeError::unresolved(name, &self.library.location))?;
        self.unwrap_declared(declared)
    }

    /// Resolves the declared annotation type `name`.
    pub fn unwrap_annotation_type(&mut self, name: &str) -> Result<Shape> {
        let declared = self
            .library
            .find_annotation_type(name)
            .ok_or_else(|| ShapeError::unresolved(name, &self.library.location))?;
        self.unwrap_declared(declared)
    }

    /// Resolves an arbitrary shape against the library.
    ///
    /// Already unwrapped shapes are returned unchanged.
    pub fn unwrap(&mut self, shape: &Shape) -> Result<Shape> {
        if shape.base.unwrapped {
            return Ok(shape.clone());
        }
        match &shape.base.alias {
            Some(target) => self.unwrap_reference(shape, target),
            None => self.unwrap_shape(shape),
        }
    }

    fn unwrap_declared(&mut self, declared: &'a Shape) -> Result<Shape> {
        if let Some(resolved) = self.definitions.get(&declared.id()) {
            return Ok(resolved.clone());
        }

        debug!(shape = %declared.name(), id = %declared.id(), "Unwrapping declared type");
        self.path.push((declared.id(), self.child_depth));
        let result = self.unwrap(declared);
        self.path.pop();

        let resolved = result.map_err(|e| {
            e.wrap("unwrap shape", declared.location())
                .with_info("shape", declared.name())
        })?;
        self.definitions.insert(declared.id(), resolved.clone());
        Ok(resolved)
    }

    fn unwrap_reference(&mut self, site: &Shape, target: &str) -> Result<Shape> {
        let declared = self
            .library
            .find_type(target)
            .ok_or_else(|| ShapeError::unresolved(target, site.location()))?;

        let entered_at = self
            .path
            .iter()
            .find(|(id, _)| *id == declared.id())
            .map(|(_, depth)| *depth);
        match entered_at {
            Some(depth) if self.child_depth > depth => {
                debug!(shape = %site.name(), head = target, "Breaking recursive reference");
                Ok(recursive(site, declared.id(), declared.name()))
            }
            Some(_) => Err(ShapeError::SelfInheritanceCycle {
                name: target.to_string(),
                location: site.location().clone(),
            }),
            None => self.unwrap_declared(declared),
        }
    }

    fn unwrap_shape(&mut self, shape: &Shape) -> Result<Shape> {
        let location = shape.location();

        let mut parents = Vec::with_capacity(shape.base.inherits.len());
        for parent in &shape.base.inherits {
            let resolved = self.unwrap(parent).map_err(|e| {
                e.wrap("unwrap parent", location)
                    .with_info("parent", parent.name())
            })?;
            parents.push(resolved);
        }

        if let Some(back_reference) = parents.iter().find_map(|p| match &p.facets {
            Facets::Recursive(r) => Some(r),
            _ => None,
        }) {
            // A reference to an enclosing type with nothing to merge is a
            // recursive reference itself.
            let nothing_to_decode =
                matches!(&shape.facets, Facets::Unknown(pending) if pending.facets.is_empty());
            if parents.len() == 1 && nothing_to_decode {
                return Ok(recursive(shape, back_reference.head, &back_reference.head_name));
            }
            return Err(ShapeError::SelfInheritanceCycle {
                name: back_reference.head_name.clone(),
                location: location.clone(),
            });
        }

        let mut target = match &shape.facets {
            Facets::Unknown(pending) => materialize(shape, pending, &parents)?,
            _ => shape.clone(),
        };

        self.unwrap_children(&mut target)?;

        for parent in &parents {
            target = inherit(&target, parent).map_err(|e| {
                e.wrap("inherit", location)
                    .with_info("parent", parent.name())
            })?;
        }

        target.base.inherits = parents;
        target.base.unwrapped = true;
        Ok(target)
    }

    /// Resolves a child that holds a nested value (property, array items,
    /// facet value).
    fn unwrap_nested(&mut self, child: &Shape) -> Result<Shape> {
        self.child_depth += 1;
        let result = self.unwrap(child);
        self.child_depth -= 1;
        result
    }

    fn unwrap_children(&mut self, target: &mut Shape) -> Result<()> {
        let location = target.base.location.clone();

        for (name, definition) in target.base.custom_facet_definitions.iter_mut() {
            definition.shape = self.unwrap_nested(&definition.shape).map_err(|e| {
                e.wrap("unwrap facet definition", &location)
                    .with_info("facet", name)
            })?;
        }

        match &mut target.facets {
            Facets::Array(array) => {
                if let Some(items) = array.items.as_mut() {
                    let resolved = self
                        .unwrap_nested(items)
                        .map_err(|e| e.wrap("unwrap array items", &location))?;
                    **items = resolved;
                }
            }
            Facets::Object(object) => {
                if let Some(properties) = object.properties.as_mut() {
                    for (name, property) in properties.iter_mut() {
                        property.shape = self.unwrap_nested(&property.shape).map_err(|e| {
                            e.wrap("unwrap property", &location)
                                .with_info("property", name)
                        })?;
                    }
                }
            }
            // Members stand for the union's own value, so they do not count
            // as a nesting level.
            Facets::Union(union) => {
                for (index, member) in union.any_of.iter_mut().enumerate() {
                    *member = self.unwrap(member).map_err(|e| {
                        e.wrap("unwrap union member", &location)
                            .with_info("member", index)
                    })?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Decodes the pending facets of `shape` for the kind of its first parent.
fn materialize(shape: &Shape, pending: &UnknownFacets, parents: &[Shape]) -> Result<Shape> {
    let Some(first) = parents.first() else {
        return Err(ShapeError::unresolved(shape.name(), shape.location()));
    };

    let mut base = shape.base.clone();
    let facets = match first.kind() {
        ShapeKind::Json => {
            for (key, node) in pending.facets.iter() {
                base.custom_facets.insert(key, node.clone());
            }
            first.facets.clone()
        }
        kind => decode_facets(kind, &mut base, &pending.facets)?,
    };
    Ok(Shape { base, facets })
}

/// Back-reference standing in for `site`, pointing at the declared type
/// `head`.
fn recursive(site: &Shape, head: ShapeId, head_name: &str) -> Shape {
    let mut base = site.base.clone();
    base.unwrapped = true;
    base.inherits.clear();
    Shape {
        base,
        facets: Facets::Recursive(RecursiveFacets {
            head,
            head_name: head_name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::Location;

    fn library(types: serde_json::Value) -> TypeLibrary {
        TypeLibrary::from_node(&json!({ "types": types }), &Location::new("lib.raml")).unwrap()
    }

    fn object(shape: &Shape) -> &crate::facets::ObjectFacets {
        match &shape.facets {
            Facets::Object(object) => object,
            other => panic!("expected object, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_alias_resolves_to_declared_type() {
        let library = library(json!({
            "Person": {"properties": {"name": "string"}},
            "Team": {"properties": {"lead": "Person"}}
        }));
        let mut resolver = Resolver::new(&library);
        let team = resolver.unwrap_type("Team").unwrap();
        let lead = &object(&team).property("lead").unwrap().shape;
        assert_eq!(lead.kind(), ShapeKind::Object);
        assert!(object(lead).property("name").is_some());
        assert_eq!(lead.id(), library.find_type("Person").unwrap().id());
    }

    #[test]
    fn test_pending_shape_takes_parent_kind() {
        let library = library(json!({
            "Base": {"properties": {"x": {"type": "integer", "minimum": 0}}},
            "Derived": {"type": "Base", "properties": {"x": {"type": "integer", "minimum": 5}}}
        }));
        let mut resolver = Resolver::new(&library);
        let derived = resolver.unwrap_type("Derived").unwrap();
        let Facets::Integer(x) = &object(&derived).property("x").unwrap().shape.facets else {
            panic!("expected integer");
        };
        assert_eq!(x.minimum, Some(5));
        assert_eq!(derived.base.inherits.len(), 1);
        assert!(derived.base.inherits[0].is_unwrapped());
    }

    #[test]
    fn test_widening_property_reports_breadcrumb() {
        let library = library(json!({
            "Base": {"properties": {"x": {"type": "integer", "minimum": 0}}},
            "Derived": {"type": "Base", "properties": {"x": {"type": "integer", "minimum": -5}}}
        }));
        let mut resolver = Resolver::new(&library);
        let err = resolver.unwrap_type("Derived").unwrap_err();
        assert!(matches!(err.root(), ShapeError::ConstraintViolation { facet, .. } if facet == "minimum"));
        assert!(
            err.breadcrumb()
                .contains(&"merge object property (property=x)".to_string())
        );
    }

    #[test]
    fn test_unwrap_is_idempotent() {
        let library = library(json!({"Name": {"type": "string", "minLength": 1}}));
        let mut resolver = Resolver::new(&library);
        let once = resolver.unwrap_type("Name").unwrap();
        let twice = resolver.unwrap(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_declared_types_are_memoised() {
        let library = library(json!({
            "Point": {"properties": {"x": "number"}},
            "Line": {"properties": {"from": "Point", "to": "Point"}}
        }));
        let mut resolver = Resolver::new(&library);
        let line = resolver.unwrap_type("Line").unwrap();
        let from = &object(&line).property("from").unwrap().shape;
        let to = &object(&line).property("to").unwrap().shape;
        assert_eq!(from, to);
        assert_eq!(resolver.definitions().len(), 2);
    }

    #[test]
    fn test_recursive_property_becomes_back_reference() {
        let library = library(json!({
            "Node": {"properties": {"value": "string", "next?": "Node"}}
        }));
        let mut resolver = Resolver::new(&library);
        let node = resolver.unwrap_type("Node").unwrap();
        let next = &object(&node).property("next").unwrap().shape;
        let Facets::Recursive(recursive) = &next.facets else {
            panic!("expected recursive back-reference");
        };
        assert_eq!(recursive.head, node.id());
        assert_eq!(recursive.head_name, "Node");
        assert!(!object(&node).property("next").unwrap().required);
    }

    #[test]
    fn test_mutual_recursion_through_arrays() {
        let library = library(json!({
            "Folder": {"properties": {"children": "Entry[]"}},
            "Entry": {"type": "Folder | string"}
        }));
        let mut resolver = Resolver::new(&library);
        let folder = resolver.unwrap_type("Folder").unwrap();
        let Facets::Array(children) = &object(&folder).property("children").unwrap().shape.facets
        else {
            panic!("expected array");
        };
        let Facets::Union(entry) = &children.items.as_ref().unwrap().facets else {
            panic!("expected union");
        };
        assert_eq!(entry.any_of[0].kind(), ShapeKind::Recursive);
        assert_eq!(entry.any_of[1].kind(), ShapeKind::String);
    }

    #[test]
    fn test_self_inheritance_cycle() {
        let library = library(json!({
            "A": {"type": "B"},
            "B": {"type": "A"},
            "C": {"type": "C", "minLength": 1}
        }));
        let mut resolver = Resolver::new(&library);
        let err = resolver.unwrap_type("A").unwrap_err();
        assert!(matches!(err.root(), ShapeError::SelfInheritanceCycle { .. }));

        let err = resolver.unwrap_type("C").unwrap_err();
        assert!(matches!(err.root(), ShapeError::SelfInheritanceCycle { name, .. } if name == "C"));
    }

    #[test]
    fn test_union_member_referencing_itself_is_cycle() {
        let library = library(json!({
            "Entry": "Entry | string",
            "Wrapped": {"type": "Alias | integer"},
            "Alias": "Wrapped"
        }));
        let mut resolver = Resolver::new(&library);
        let err = resolver.unwrap_type("Entry").unwrap_err();
        assert!(matches!(err.root(), ShapeError::SelfInheritanceCycle { name, .. } if name == "Entry"));

        let err = resolver.unwrap_type("Wrapped").unwrap_err();
        assert!(matches!(err.root(), ShapeError::SelfInheritanceCycle { name, .. } if name == "Wrapped"));
    }

    #[test]
    fn test_union_member_below_property_is_back_reference() {
        let library = library(json!({
            "Expr": {"properties": {"operand": "Expr | number"}}
        }));
        let mut resolver = Resolver::new(&library);
        let expr = resolver.unwrap_type("Expr").unwrap();
        let Facets::Union(operand) = &object(&expr).property("operand").unwrap().shape.facets else {
            panic!("expected union");
        };
        assert_eq!(operand.any_of[0].kind(), ShapeKind::Recursive);
        assert_eq!(operand.any_of[1].kind(), ShapeKind::Number);
    }

    #[test]
    fn test_refining_enclosing_type_is_rejected() {
        let library = library(json!({
            "Node": {
                "properties": {
                    "next?": {"type": "Node", "minProperties": 1}
                }
            }
        }));
        let mut resolver = Resolver::new(&library);
        let err = resolver.unwrap_type("Node").unwrap_err();
        assert!(matches!(err.root(), ShapeError::SelfInheritanceCycle { name, .. } if name == "Node"));
        assert!(
            err.breadcrumb()
                .contains(&"unwrap property (property=next)".to_string())
        );
    }

    #[test]
    fn test_unresolved_reference() {
        let library = library(json!({"A": {"properties": {"b": "Missing"}}}));
        let mut resolver = Resolver::new(&library);
        let err = resolver.unwrap_type("A").unwrap_err();
        assert!(matches!(err.root(), ShapeError::UnresolvedShape { name, .. } if name == "Missing"));
        assert!(matches!(
            resolver.unwrap_type("Nope"),
            Err(ShapeError::UnresolvedShape { .. })
        ));
    }

    #[test]
    fn test_multiple_inheritance_merges_every_parent() {
        let library = library(json!({
            "Named": {"properties": {"name": "string"}},
            "Aged": {"properties": {"age": "integer"}},
            "Person": {"type": ["Named", "Aged"]}
        }));
        let mut resolver = Resolver::new(&library);
        let person = resolver.unwrap_type("Person").unwrap();
        let names: Vec<&str> = object(&person).properties.as_ref().unwrap().keys().collect();
        assert_eq!(names, vec!["name", "age"]);
    }

    #[test]
    fn test_kind_mismatch_across_parents() {
        let library = library(json!({
            "Named": {"properties": {"name": "string"}},
            "Tags": "string[]",
            "Broken": {"type": ["Named", "Tags"]}
        }));
        let mut resolver = Resolver::new(&library);
        let err = resolver.unwrap_type("Broken").unwrap_err();
        assert!(matches!(err.root(), ShapeError::KindMismatch { .. }));
    }
}
