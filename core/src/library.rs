//! Declared type libraries and the document-scope validation sweep.
//!
//! A [`TypeLibrary`] holds the `types` and `annotationTypes` of one document
//! in declaration order. [`TypeLibrary::validate_shapes`] resolves every
//! declaration and checks it; [`TypeLibrary::unwrap_all`] replaces every
//! declaration with its resolved form.

use std::collections::VecDeque;

use serde_json::Value;
use tracing::{debug, info};

use crate::build::build_shape;
use crate::error::{Location, Result, ShapeError};
use crate::facets::Facets;
use crate::ordered::OrderedMap;
use crate::resolve::{Definitions, Resolver};
use crate::types::{Property, Shape, ShapeId};

/// Ordered set of declared types and annotation types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeLibrary {
    /// Location of the document the library was read from.
    pub location: Location,
    pub types: OrderedMap<Shape>,
    pub annotation_types: OrderedMap<Shape>,
}

impl TypeLibrary {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            types: OrderedMap::new(),
            annotation_types: OrderedMap::new(),
        }
    }

    /// Builds a library from a document node with `types` and/or
    /// `annotationTypes` maps.
    ///
    /// Other top-level keys (`usage`, `uses`, documentation) are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use raml_shapes_core::{Location, TypeLibrary};
    /// use serde_json::json;
    ///
    /// let library = TypeLibrary::from_node(&json!({
    ///     "usage": "shared types",
    ///     "types": {"Id": "integer", "Name": "string"},
    ///     "annotationTypes": {"deprecated": "boolean"}
    /// }), &Location::new("common.raml")).unwrap();
    ///
    /// assert_eq!(library.types.keys().collect::<Vec<_>>(), vec!["Id", "Name"]);
    /// assert!(library.find_annotation_type("deprecated").is_some());
    /// ```
    pub fn from_node(node: &Value, location: &Location) -> Result<Self> {
        let Value::Object(document) = node else {
            return Err(ShapeError::invalid("library document must be a map", location));
        };

        let mut library = Self::new(location.clone());
        if let Some(types) = document.get("types") {
            for shape in build_declarations(types, "types", location)? {
                library.add_type(shape);
            }
        }
        if let Some(annotation_types) = document.get("annotationTypes") {
            for shape in build_declarations(annotation_types, "annotationTypes", location)? {
                library.add_annotation_type(shape);
            }
        }
        debug!(
            file = %location,
            types = library.types.len(),
            annotation_types = library.annotation_types.len(),
            "Built type library"
        );
        Ok(library)
    }

    /// Adds a type keyed by its name, replacing an earlier declaration.
    pub fn add_type(&mut self, shape: Shape) {
        self.types.insert(shape.name().to_string(), shape);
    }

    pub fn add_annotation_type(&mut self, shape: Shape) {
        self.annotation_types.insert(shape.name().to_string(), shape);
    }

    pub fn find_type(&self, name: &str) -> Option<&Shape> {
        self.types.get(name)
    }

    pub fn find_annotation_type(&self, name: &str) -> Option<&Shape> {
        self.annotation_types.get(name)
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self)
    }

    /// Replaces every declaration with its resolved form.
    ///
    /// Calling it again is a no-op.
    pub fn unwrap_all(&mut self) -> Result<Definitions> {
        let (types, annotation_types, definitions) = {
            let mut resolver = Resolver::new(self);
            let mut annotation_types = Vec::with_capacity(self.annotation_types.len());
            for name in self.annotation_types.keys() {
                annotation_types.push(resolver.unwrap_annotation_type(name)?);
            }
            let mut types = Vec::with_capacity(self.types.len());
            for name in self.types.keys() {
                types.push(resolver.unwrap_type(name)?);
            }
            (types, annotation_types, resolver.into_definitions())
        };

        for shape in types {
            self.add_type(shape);
        }
        for shape in annotation_types {
            self.add_annotation_type(shape);
        }
        Ok(definitions)
    }

    /// Resolves and checks every declaration.
    ///
    /// Annotation types are processed first, then types, each in declaration
    /// order. For each declaration: resolve, [`Shape::check`], then validate
    /// custom facets, examples, defaults and domain extensions on the shape
    /// and every owned child. The first failure ends the sweep.
    ///
    /// Returns the resolved declarations.
    pub fn validate_shapes(&self) -> Result<Definitions> {
        let mut resolver = Resolver::new(self);

        for name in self.annotation_types.keys() {
            let shape = resolver.unwrap_annotation_type(name)?;
            self.validate_declaration(&shape, &mut resolver)
                .map_err(|e| {
                    e.wrap("validate annotation type", shape.location())
                        .with_info("shape", name)
                })?;
        }
        for name in self.types.keys() {
            let shape = resolver.unwrap_type(name)?;
            self.validate_declaration(&shape, &mut resolver)
                .map_err(|e| {
                    e.wrap("validate type", shape.location())
                        .with_info("shape", name)
                })?;
        }

        info!(
            file = %self.location,
            types = self.types.len(),
            annotation_types = self.annotation_types.len(),
            "Validated type library"
        );
        Ok(resolver.into_definitions())
    }

    fn validate_declaration(&self, shape: &Shape, resolver: &mut Resolver<'_>) -> Result<()> {
        shape.check().map_err(|e| e.wrap("check shape", shape.location()))?;
        validate_commons(shape, resolver)
    }
}

fn build_declarations(node: &Value, section: &str, location: &Location) -> Result<Vec<Shape>> {
    let Value::Object(entries) = node else {
        return Err(ShapeError::invalid(format!("`{section}` must be a map"), location));
    };
    entries
        .iter()
        .map(|(name, declaration)| {
            build_shape(declaration, name, location).map_err(|e| {
                e.wrap("build shape", location)
                    .with_info("shape", name)
            })
        })
        .collect()
}

/// Facet-definition, example/default and domain-extension checks on a shape
/// and its owned children.
fn validate_commons(shape: &Shape, resolver: &mut Resolver<'_>) -> Result<()> {
    let location = shape.location();

    validate_custom_facets(shape, resolver.definitions())?;
    validate_examples(shape, resolver.definitions())?;
    validate_domain_extensions(shape, resolver)?;

    match &shape.facets {
        Facets::Object(object) => {
            if let Some(properties) = &object.properties {
                for (name, property) in properties.iter() {
                    validate_commons(&property.shape, resolver).map_err(|e| {
                        e.wrap("validate property", location)
                            .with_info("property", name)
                    })?;
                }
            }
        }
        Facets::Array(array) => {
            if let Some(items) = &array.items {
                validate_commons(items, resolver)
                    .map_err(|e| e.wrap("validate array items", location))?;
            }
        }
        Facets::Union(union) => {
            for (index, member) in union.any_of.iter().enumerate() {
                validate_commons(member, resolver).map_err(|e| {
                    e.wrap("validate union member", location)
                        .with_info("member", index)
                })?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Checks the custom facet values of `shape` against the definitions
/// declared by its ancestors.
pub fn validate_custom_facets(shape: &Shape, definitions: &Definitions) -> Result<()> {
    let mut inherited: OrderedMap<&Property> = OrderedMap::new();
    let mut visited: Vec<ShapeId> = Vec::new();
    let mut queue: VecDeque<&Shape> = shape.base.inherits.iter().collect();

    while let Some(ancestor) = queue.pop_front() {
        if visited.contains(&ancestor.id()) {
            continue;
        }
        visited.push(ancestor.id());

        for (name, definition) in ancestor.base.custom_facet_definitions.iter() {
            if shape.base.custom_facet_definitions.contains_key(name)
                || inherited.contains_key(name)
            {
                return Err(ShapeError::DuplicateFacetDefinition {
                    facet: name.to_string(),
                    location: definition.shape.location().clone(),
                });
            }
            inherited.insert(name, definition);
        }
        queue.extend(ancestor.base.inherits.iter());
    }

    for (name, definition) in inherited.iter() {
        match shape.base.custom_facets.get(name) {
            Some(node) => definition
                .shape
                .validate_with(&node.value, "$", definitions)
                .map_err(|e| {
                    e.wrap("validate custom facet", &node.location)
                        .with_info("facet", name)
                })?,
            None if definition.required => {
                return Err(ShapeError::MissingRequiredFacet {
                    facet: name.to_string(),
                    location: shape.location().clone(),
                });
            }
            None => {}
        }
    }

    for (name, node) in shape.base.custom_facets.iter() {
        if !inherited.contains_key(name) {
            return Err(ShapeError::UnknownFacet {
                facet: name.to_string(),
                location: node.location.clone(),
            });
        }
    }
    Ok(())
}

/// Validates the declared `default`, `example` and `examples` of `shape`
/// against the shape itself.
pub fn validate_examples(shape: &Shape, definitions: &Definitions) -> Result<()> {
    if let Some(default) = &shape.base.default {
        shape
            .validate_with(&default.value, "$", definitions)
            .map_err(|e| e.wrap("validate default", &default.location))?;
    }
    if let Some(example) = &shape.base.example {
        shape
            .validate_with(&example.value, "$", definitions)
            .map_err(|e| e.wrap("validate example", &example.location))?;
    }
    if let Some(examples) = &shape.base.examples {
        for (name, example) in examples.iter() {
            shape
                .validate_with(&example.value, "$", definitions)
                .map_err(|e| {
                    e.wrap("validate example", &example.location)
                        .with_info("example", name)
                })?;
        }
    }
    Ok(())
}

fn validate_domain_extensions(shape: &Shape, resolver: &mut Resolver<'_>) -> Result<()> {
    for (name, extension) in shape.base.domain_extensions.iter() {
        let annotation = resolver
            .unwrap_annotation_type(name)
            .map_err(|e| {
                e.wrap("resolve annotation type", &extension.location)
                    .with_info("annotation", name)
            })?;
        annotation
            .validate_with(&extension.value, "$", resolver.definitions())
            .map_err(|e| {
                e.wrap("validate domain extension", &extension.location)
                    .with_info("annotation", name)
            })?;
    }
    Ok(())
}
