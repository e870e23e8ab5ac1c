//! Conversion of resolved shapes to JSON Schema draft-07.
//!
//! [`ShapeVisitor`] dispatches on the shape kind; [`JsonSchemaConverter`] is
//! the visitor that builds [`Schema`] nodes. Recursive back-references become
//! `$ref` pointers into the root `definitions`, so the output stays finite.
//!
//! # Examples
//!
//! ```
//! use raml_shapes_core::{JsonSchemaConverter, Location, TypeLibrary};
//! use serde_json::json;
//!
//! let mut library = TypeLibrary::from_node(&json!({
//!     "types": {
//!         "Node": {
//!             "properties": {"value": "string", "next?": "Node"}
//!         }
//!     }
//! }), &Location::new("list.raml")).unwrap();
//! let definitions = library.unwrap_all().unwrap();
//!
//! let schema = JsonSchemaConverter::new()
//!     .with_definitions(&definitions)
//!     .convert(library.find_type("Node").unwrap())
//!     .unwrap();
//! let schema = serde_json::to_value(&schema).unwrap();
//!
//! assert_eq!(schema["$ref"], json!("#/definitions/Node"));
//! assert_eq!(
//!     schema["definitions"]["Node"]["properties"]["next"],
//!     json!({"$ref": "#/definitions/Node"})
//! );
//! ```

use std::collections::HashMap;

use serde_json::{Number, Value};
use tracing::{debug, trace};

use crate::error::{Result, ShapeError};
use crate::facets::{
    ArrayFacets, BooleanFacets, DateTimeFacets, Facets, FileFacets, IntegerFacets, JsonFacets,
    NumberFacets, ObjectFacets, RecursiveFacets, StringFacets, UnionFacets, UnknownFacets,
};
use crate::jsonschema::{DRAFT_07, Schema, SchemaObject};
use crate::ordered::OrderedMap;
use crate::resolve::Definitions;
use crate::types::{BaseShape, Shape, ShapeId};

/// `x-custom` entry holding the shape's custom facet values.
const DATA_KEY: &str = "data";
/// `x-custom` entry holding the facet definitions a shape declares.
const FACETS_KEY: &str = "facets";

/// Pattern emitted for `datetime-only` values.
const DATETIME_ONLY_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?$";

/// Per-kind operations over shapes.
///
/// [`Shape::accept`] calls the method matching the shape's kind.
pub trait ShapeVisitor {
    type Output;

    fn visit_object(&mut self, shape: &Shape, facets: &ObjectFacets) -> Self::Output;
    fn visit_array(&mut self, shape: &Shape, facets: &ArrayFacets) -> Self::Output;
    fn visit_union(&mut self, shape: &Shape, facets: &UnionFacets) -> Self::Output;
    fn visit_string(&mut self, shape: &Shape, facets: &StringFacets) -> Self::Output;
    fn visit_number(&mut self, shape: &Shape, facets: &NumberFacets) -> Self::Output;
    fn visit_integer(&mut self, shape: &Shape, facets: &IntegerFacets) -> Self::Output;
    fn visit_boolean(&mut self, shape: &Shape, facets: &BooleanFacets) -> Self::Output;
    fn visit_file(&mut self, shape: &Shape, facets: &FileFacets) -> Self::Output;
    fn visit_datetime(&mut self, shape: &Shape, facets: &DateTimeFacets) -> Self::Output;
    fn visit_datetime_only(&mut self, shape: &Shape) -> Self::Output;
    fn visit_date_only(&mut self, shape: &Shape) -> Self::Output;
    fn visit_time_only(&mut self, shape: &Shape) -> Self::Output;
    fn visit_any(&mut self, shape: &Shape) -> Self::Output;
    fn visit_nil(&mut self, shape: &Shape) -> Self::Output;
    fn visit_json(&mut self, shape: &Shape, facets: &JsonFacets) -> Self::Output;
    fn visit_unknown(&mut self, shape: &Shape, facets: &UnknownFacets) -> Self::Output;
    fn visit_recursive(&mut self, shape: &Shape, facets: &RecursiveFacets) -> Self::Output;
}

impl Shape {
    /// Dispatches to the visitor method for this shape's kind.
    pub fn accept<V: ShapeVisitor>(&self, visitor: &mut V) -> V::Output {
        match &self.facets {
            Facets::Object(facets) => visitor.visit_object(self, facets),
            Facets::Array(facets) => visitor.visit_array(self, facets),
            Facets::Union(facets) => visitor.visit_union(self, facets),
            Facets::String(facets) => visitor.visit_string(self, facets),
            Facets::Number(facets) => visitor.visit_number(self, facets),
            Facets::Integer(facets) => visitor.visit_integer(self, facets),
            Facets::Boolean(facets) => visitor.visit_boolean(self, facets),
            Facets::File(facets) => visitor.visit_file(self, facets),
            Facets::DateTime(facets) => visitor.visit_datetime(self, facets),
            Facets::DateTimeOnly => visitor.visit_datetime_only(self),
            Facets::DateOnly => visitor.visit_date_only(self),
            Facets::TimeOnly => visitor.visit_time_only(self),
            Facets::Any => visitor.visit_any(self),
            Facets::Nil => visitor.visit_nil(self),
            Facets::Json(facets) => visitor.visit_json(self, facets),
            Facets::Unknown(facets) => visitor.visit_unknown(self, facets),
            Facets::Recursive(facets) => visitor.visit_recursive(self, facets),
        }
    }
}

/// Builds a JSON Schema document from a resolved shape.
///
/// A shape that is the target of a recursive back-reference is emitted once
/// under `definitions` (keyed by its name, suffixed on collision) and
/// replaced by a `$ref` wherever it occurs, including at the root.
#[derive(Debug, Default)]
pub struct JsonSchemaConverter<'a> {
    id: Option<String>,
    /// Resolved declarations used to look up back-reference targets that
    /// are not enclosing the converted shape.
    lookup: Option<&'a Definitions>,
    definitions: OrderedMap<Schema>,
    keys: HashMap<ShapeId, String>,
    path: Vec<ShapeId>,
}

impl<'a> JsonSchemaConverter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the root `$id`.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_definitions(mut self, definitions: &'a Definitions) -> Self {
        self.lookup = Some(definitions);
        self
    }

    /// Emits `shape` under `definitions` ahead of the root conversion.
    ///
    /// Later occurrences of the same shape identity are converted to `$ref`.
    pub fn add_definition(&mut self, shape: &Shape) -> Result<()> {
        if self.keys.contains_key(&shape.id()) {
            return Ok(());
        }
        self.allocate_key(shape.id(), shape.name());
        self.convert_inline(shape)?;
        Ok(())
    }

    /// Converts `shape` into a root schema document.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::UnresolvedShape`] when an unresolved shape or a
    /// dangling back-reference is reached.
    pub fn convert(mut self, shape: &Shape) -> Result<Schema> {
        let converted = self
            .convert_shape(shape)
            .map_err(|e| e.wrap("convert shape", shape.location()).with_info("shape", shape.name()))?;

        let mut root = match converted {
            Schema::Object(object) => *object,
            Schema::Bool(accepts) => SchemaObject {
                all_of: vec![Schema::Bool(accepts)],
                ..Default::default()
            },
        };
        root.version = Some(DRAFT_07.to_string());
        if self.id.is_some() {
            root.id = self.id;
        }
        for (key, definition) in self.definitions {
            root.definitions.insert(key, definition);
        }

        debug!(
            shape = %shape.name(),
            definitions = root.definitions.len(),
            "Converted shape to JSON Schema"
        );
        Ok(Schema::object(root))
    }

    fn convert_shape(&mut self, shape: &Shape) -> Result<Schema> {
        if let Some(key) = self.keys.get(&shape.id()) {
            return Ok(Schema::reference(pointer(key)));
        }
        self.convert_inline(shape)
    }

    fn convert_inline(&mut self, shape: &Shape) -> Result<Schema> {
        self.path.push(shape.id());
        let converted = self.convert_kind(shape);
        self.path.pop();

        let schema = converted?;
        match self.keys.get(&shape.id()) {
            Some(key) => {
                let key = key.clone();
                self.definitions.insert(key.clone(), schema);
                Ok(Schema::reference(pointer(&key)))
            }
            None => Ok(schema),
        }
    }

    /// Converts the kind-specific node and folds in the base attributes
    /// shared by every kind.
    fn convert_kind(&mut self, shape: &Shape) -> Result<Schema> {
        let mut schema = shape.accept(self)?;
        if matches!(shape.facets, Facets::Recursive(_)) {
            return Ok(schema);
        }

        let facet_definitions = self.convert_facet_definitions(&shape.base)?;
        if let Some(object) = schema.as_object_mut() {
            apply_metadata(&shape.base, object);
            if let Some(definitions) = facet_definitions {
                object.extensions.insert(FACETS_KEY, definitions);
            }
        }
        Ok(schema)
    }

    fn allocate_key(&mut self, id: ShapeId, name: &str) -> String {
        let base = if name.is_empty() { "shape" } else { name };
        let mut key = base.to_string();
        let mut suffix = 2;
        while self.definitions.contains_key(&key) {
            key = format!("{base}_{suffix}");
            suffix += 1;
        }
        trace!(key = %key, id = %id, "Allocated definition key");
        // Placeholder keeps definitions in first-reference order.
        self.definitions.insert(key.clone(), Schema::Bool(true));
        self.keys.insert(id, key.clone());
        key
    }

    /// Converts the facet definitions a shape declares for its subtypes.
    fn convert_facet_definitions(&mut self, base: &BaseShape) -> Result<Option<Value>> {
        if base.custom_facet_definitions.is_empty() {
            return Ok(None);
        }
        let mut definitions = serde_json::Map::new();
        for (name, property) in base.custom_facet_definitions.iter() {
            let schema = self.convert_shape(&property.shape).map_err(|e| {
                e.wrap("convert custom facet definition", &base.location)
                    .with_info("facet", name)
            })?;
            definitions.insert(name.to_string(), to_value(&schema, base)?);
        }
        Ok(Some(Value::Object(definitions)))
    }
}

impl ShapeVisitor for JsonSchemaConverter<'_> {
    type Output = Result<Schema>;

    fn visit_object(&mut self, shape: &Shape, facets: &ObjectFacets) -> Result<Schema> {
        let mut object = SchemaObject {
            additional_properties: Some(facets.additional_properties),
            min_properties: facets.min_properties,
            max_properties: facets.max_properties,
            ..SchemaObject::typed("object")
        };
        if let Some(properties) = &facets.properties {
            for (name, property) in properties.iter() {
                let schema = self.convert_shape(&property.shape).map_err(|e| {
                    e.wrap("convert property", shape.location())
                        .with_info("property", name)
                })?;
                object.properties.insert(name, schema);
                if property.required {
                    object.required.push(name.to_string());
                }
            }
        }
        if let Some(discriminator) = &facets.discriminator {
            object
                .extensions
                .insert("discriminator", Value::String(discriminator.clone()));
        }
        if let Some(value) = &facets.discriminator_value {
            object.extensions.insert("discriminatorValue", value.clone());
        }
        Ok(Schema::object(object))
    }

    fn visit_array(&mut self, shape: &Shape, facets: &ArrayFacets) -> Result<Schema> {
        let items = match &facets.items {
            Some(items) => Some(
                self.convert_shape(items)
                    .map_err(|e| e.wrap("convert array items", shape.location()))?,
            ),
            None => None,
        };
        Ok(Schema::object(SchemaObject {
            items,
            min_items: facets.min_items,
            max_items: facets.max_items,
            unique_items: facets.unique_items,
            ..SchemaObject::typed("array")
        }))
    }

    fn visit_union(&mut self, shape: &Shape, facets: &UnionFacets) -> Result<Schema> {
        let mut any_of = Vec::with_capacity(facets.any_of.len());
        for (index, member) in facets.any_of.iter().enumerate() {
            let schema = self.convert_shape(member).map_err(|e| {
                e.wrap("convert union member", shape.location())
                    .with_info("member", index)
            })?;
            any_of.push(schema);
        }
        Ok(Schema::object(SchemaObject {
            any_of,
            ..Default::default()
        }))
    }

    fn visit_string(&mut self, _shape: &Shape, facets: &StringFacets) -> Result<Schema> {
        Ok(Schema::object(SchemaObject {
            enum_values: facets.enum_values.clone(),
            min_length: facets.min_length,
            max_length: facets.max_length,
            pattern: facets.pattern.clone(),
            ..SchemaObject::typed("string")
        }))
    }

    fn visit_number(&mut self, _shape: &Shape, facets: &NumberFacets) -> Result<Schema> {
        Ok(Schema::object(SchemaObject {
            enum_values: facets.enum_values.clone(),
            format: facets.format.clone(),
            minimum: facets.minimum.and_then(number),
            maximum: facets.maximum.and_then(number),
            multiple_of: facets.multiple_of.and_then(number),
            ..SchemaObject::typed("number")
        }))
    }

    fn visit_integer(&mut self, _shape: &Shape, facets: &IntegerFacets) -> Result<Schema> {
        Ok(Schema::object(SchemaObject {
            enum_values: facets.enum_values.clone(),
            format: facets.format.clone(),
            minimum: facets.minimum.map(Number::from),
            maximum: facets.maximum.map(Number::from),
            ..SchemaObject::typed("integer")
        }))
    }

    fn visit_boolean(&mut self, _shape: &Shape, facets: &BooleanFacets) -> Result<Schema> {
        Ok(Schema::object(SchemaObject {
            enum_values: facets.enum_values.clone(),
            ..SchemaObject::typed("boolean")
        }))
    }

    fn visit_file(&mut self, _shape: &Shape, facets: &FileFacets) -> Result<Schema> {
        let mut object = SchemaObject {
            content_encoding: Some("base64".to_string()),
            min_length: facets.min_length,
            max_length: facets.max_length,
            ..SchemaObject::typed("string")
        };
        match facets.file_types.as_deref() {
            Some([media_type]) => object.content_media_type = Some(media_type.clone()),
            Some(file_types) => {
                let file_types = file_types.iter().cloned().map(Value::String).collect();
                object.extensions.insert("fileTypes", Value::Array(file_types));
            }
            None => {}
        }
        Ok(Schema::object(object))
    }

    fn visit_datetime(&mut self, _shape: &Shape, facets: &DateTimeFacets) -> Result<Schema> {
        let mut object = SchemaObject::typed("string");
        match facets.format.as_deref() {
            Some("rfc2616") => object.comment = Some("rfc2616 date-time".to_string()),
            _ => object.format = Some("date-time".to_string()),
        }
        Ok(Schema::object(object))
    }

    fn visit_datetime_only(&mut self, _shape: &Shape) -> Result<Schema> {
        Ok(Schema::object(SchemaObject {
            pattern: Some(DATETIME_ONLY_PATTERN.to_string()),
            ..SchemaObject::typed("string")
        }))
    }

    fn visit_date_only(&mut self, _shape: &Shape) -> Result<Schema> {
        Ok(Schema::object(SchemaObject {
            format: Some("date".to_string()),
            ..SchemaObject::typed("string")
        }))
    }

    fn visit_time_only(&mut self, _shape: &Shape) -> Result<Schema> {
        Ok(Schema::object(SchemaObject {
            format: Some("time".to_string()),
            ..SchemaObject::typed("string")
        }))
    }

    fn visit_any(&mut self, _shape: &Shape) -> Result<Schema> {
        Ok(Schema::object(SchemaObject::default()))
    }

    fn visit_nil(&mut self, _shape: &Shape) -> Result<Schema> {
        Ok(Schema::object(SchemaObject::typed("null")))
    }

    fn visit_json(&mut self, shape: &Shape, facets: &JsonFacets) -> Result<Schema> {
        serde_json::from_value(facets.schema.clone()).map_err(|e| {
            ShapeError::invalid(format!("embedded JSON schema is not a schema: {e}"), shape.location())
        })
    }

    fn visit_unknown(&mut self, shape: &Shape, _facets: &UnknownFacets) -> Result<Schema> {
        Err(ShapeError::unresolved(
            shape.base.alias.as_deref().unwrap_or(shape.name()),
            shape.location(),
        ))
    }

    fn visit_recursive(&mut self, shape: &Shape, facets: &RecursiveFacets) -> Result<Schema> {
        if let Some(key) = self.keys.get(&facets.head) {
            return Ok(Schema::reference(pointer(key)));
        }
        if self.path.contains(&facets.head) {
            let key = self.allocate_key(facets.head, &facets.head_name);
            return Ok(Schema::reference(pointer(&key)));
        }

        let lookup = self.lookup;
        let head = lookup
            .and_then(|definitions| definitions.get(&facets.head))
            .ok_or_else(|| ShapeError::unresolved(&facets.head_name, shape.location()))?;
        let key = self.allocate_key(head.id(), head.name());
        self.convert_inline(head)?;
        Ok(Schema::reference(pointer(&key)))
    }
}

/// Folds display name, description, default, examples, custom facets and
/// domain extensions into `object`. Keywords the node already sets win.
///
/// Custom facet values live under [`DATA_KEY`] so that user facet names
/// never clash with the converter's own extension entries.
fn apply_metadata(base: &BaseShape, object: &mut SchemaObject) {
    if object.title.is_none() {
        object.title = base.display_name.clone();
    }
    if object.description.is_none() {
        object.description = base.description.clone();
    }
    if object.default.is_none() {
        object.default = base.default.as_ref().map(|node| node.value.clone());
    }
    if object.examples.is_empty() {
        if let Some(example) = &base.example {
            object.examples.push(example.value.clone());
        } else if let Some(examples) = &base.examples {
            object
                .examples
                .extend(examples.values().map(|example| example.value.clone()));
        }
    }
    if !base.custom_facets.is_empty() {
        let data: serde_json::Map<String, Value> = base
            .custom_facets
            .iter()
            .map(|(name, node)| (name.to_string(), node.value.clone()))
            .collect();
        object.extensions.insert(DATA_KEY, Value::Object(data));
    }
    for (name, node) in base.domain_extensions.iter() {
        object.extensions.insert(format!("({name})"), node.value.clone());
    }
}

fn to_value(schema: &Schema, base: &BaseShape) -> Result<Value> {
    serde_json::to_value(schema)
        .map_err(|e| ShapeError::invalid(format!("cannot serialize schema: {e}"), &base.location))
}

fn pointer(key: &str) -> String {
    format!("#/definitions/{}", key.replace('~', "~0").replace('/', "~1"))
}

/// Integral values are emitted without a fractional part.
fn number(value: f64) -> Option<Number> {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Some(Number::from(value as i64))
    } else {
        Number::from_f64(value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::Location;
    use crate::library::TypeLibrary;
    use crate::types::{Node, Property};

    fn to_json(schema: &Schema) -> Value {
        serde_json::to_value(schema).unwrap()
    }

    fn resolved(document: Value) -> (TypeLibrary, Definitions) {
        let mut library = TypeLibrary::from_node(&document, &Location::new("lib.raml")).unwrap();
        let definitions = library.unwrap_all().unwrap();
        (library, definitions)
    }

    #[test]
    fn test_string_facets_map_one_to_one() {
        let shape = Shape::string(
            "Slug",
            StringFacets {
                min_length: Some(1),
                max_length: Some(10),
                pattern: Some("^[a-z]+$".into()),
                ..Default::default()
            },
        );
        let schema = JsonSchemaConverter::new().convert(&shape).unwrap();
        assert_eq!(
            to_json(&schema),
            json!({
                "$schema": DRAFT_07,
                "type": "string",
                "minLength": 1,
                "maxLength": 10,
                "pattern": "^[a-z]+$"
            })
        );
    }

    #[test]
    fn test_object_lists_required_properties() {
        let shape = Shape::object(
            "Person",
            vec![
                Property::required("name", Shape::string("name", StringFacets::default())),
                Property::optional(
                    "age",
                    Shape::integer(
                        "age",
                        IntegerFacets {
                            minimum: Some(0),
                            ..Default::default()
                        },
                    ),
                ),
            ],
        )
        .with_description("A person");
        let schema = to_json(&JsonSchemaConverter::new().with_id("urn:person").convert(&shape).unwrap());

        assert_eq!(schema["$id"], json!("urn:person"));
        assert_eq!(schema["description"], json!("A person"));
        assert_eq!(schema["required"], json!(["name"]));
        assert_eq!(schema["additionalProperties"], json!(true));
        assert_eq!(schema["properties"]["age"], json!({"type": "integer", "minimum": 0}));
    }

    #[test]
    fn test_recursive_type_emits_definition() {
        let (library, definitions) = resolved(json!({
            "types": {
                "Tree": {
                    "properties": {
                        "label": "string",
                        "children": {"type": "array", "items": "Tree"}
                    }
                }
            }
        }));
        let tree = library.find_type("Tree").unwrap();
        let schema = to_json(
            &JsonSchemaConverter::new()
                .with_definitions(&definitions)
                .convert(tree)
                .unwrap(),
        );

        assert_eq!(schema["$ref"], json!("#/definitions/Tree"));
        let definition = &schema["definitions"]["Tree"];
        assert_eq!(definition["type"], json!("object"));
        assert_eq!(
            definition["properties"]["children"]["items"],
            json!({"$ref": "#/definitions/Tree"})
        );
    }

    #[test]
    fn test_dangling_back_reference_uses_lookup() {
        let (library, definitions) = resolved(json!({
            "types": {
                "Node": {"properties": {"next?": "Node"}}
            }
        }));
        let Facets::Object(object) = &library.find_type("Node").unwrap().facets else {
            panic!("expected object facets");
        };
        let next = &object.property("next").unwrap().shape;

        let schema = to_json(
            &JsonSchemaConverter::new()
                .with_definitions(&definitions)
                .convert(next)
                .unwrap(),
        );
        assert_eq!(schema["$ref"], json!("#/definitions/Node"));
        assert_eq!(schema["definitions"]["Node"]["type"], json!("object"));

        let err = JsonSchemaConverter::new().convert(next).unwrap_err();
        assert!(matches!(err.root(), ShapeError::UnresolvedShape { name, .. } if name == "Node"));
    }

    #[test]
    fn test_scalar_kind_mapping() {
        let cases = [
            (Facets::Nil, json!({"type": "null"})),
            (Facets::Any, json!({})),
            (Facets::DateOnly, json!({"type": "string", "format": "date"})),
            (Facets::TimeOnly, json!({"type": "string", "format": "time"})),
            (
                Facets::DateTime(DateTimeFacets::default()),
                json!({"type": "string", "format": "date-time"}),
            ),
            (
                Facets::DateTime(DateTimeFacets {
                    format: Some("rfc2616".into()),
                }),
                json!({"type": "string", "$comment": "rfc2616 date-time"}),
            ),
            (
                Facets::File(FileFacets {
                    file_types: Some(vec!["image/png".into()]),
                    ..Default::default()
                }),
                json!({"type": "string", "contentEncoding": "base64", "contentMediaType": "image/png"}),
            ),
            (
                Facets::Number(NumberFacets {
                    minimum: Some(0.5),
                    multiple_of: Some(2.0),
                    ..Default::default()
                }),
                json!({"type": "number", "minimum": 0.5, "multipleOf": 2}),
            ),
        ];
        for (facets, expected) in cases {
            let mut schema = to_json(&JsonSchemaConverter::new().convert(&Shape::new("s", facets)).unwrap());
            schema.as_object_mut().unwrap().remove("$schema");
            assert_eq!(schema, expected);
        }
    }

    #[test]
    fn test_union_becomes_any_of() {
        let shape = Shape::union(
            "Id",
            vec![
                Shape::string("s", StringFacets::default()),
                Shape::integer("i", IntegerFacets::default()),
            ],
        );
        let schema = to_json(&JsonSchemaConverter::new().convert(&shape).unwrap());
        assert_eq!(schema["anyOf"], json!([{"type": "string"}, {"type": "integer"}]));
    }

    #[test]
    fn test_metadata_and_extensions() {
        let (library, _) = resolved(json!({
            "types": {
                "Port": {
                    "type": "integer",
                    "displayName": "Port number",
                    "example": 8080,
                    "default": 80,
                    "(internal)": true
                }
            }
        }));
        let schema = to_json(&JsonSchemaConverter::new().convert(library.find_type("Port").unwrap()).unwrap());

        assert_eq!(schema["title"], json!("Port number"));
        assert_eq!(schema["default"], json!(80));
        assert_eq!(schema["examples"], json!([8080]));
        assert_eq!(schema["x-custom"], json!({"(internal)": true}));
    }

    #[test]
    fn test_facet_definitions_on_scalar_types() {
        let (library, _) = resolved(json!({
            "types": {
                "Code": {"type": "string", "facets": {"region": "string", "discriminator?": "string"}},
                "EuCode": {"type": "Code", "region": "eu", "discriminator": "kind"}
            }
        }));
        let code = to_json(&JsonSchemaConverter::new().convert(library.find_type("Code").unwrap()).unwrap());
        assert_eq!(code["type"], json!("string"));
        assert_eq!(code["x-custom"]["facets"]["region"], json!({"type": "string"}));

        let eu = to_json(&JsonSchemaConverter::new().convert(library.find_type("EuCode").unwrap()).unwrap());
        assert_eq!(eu["x-custom"]["data"], json!({"region": "eu", "discriminator": "kind"}));
        assert!(eu["x-custom"].get("discriminator").is_none());
    }

    #[test]
    fn test_custom_facet_names_do_not_clash_with_converter_entries() {
        let location = Location::new("lib.raml");
        let mut shape = Shape::object("Pet", Vec::new());
        let Facets::Object(object) = &mut shape.facets else {
            unreachable!();
        };
        object.discriminator = Some("kind".into());
        shape.base.custom_facet_definitions.insert(
            "facets",
            Property::required("facets", Shape::string("facets", StringFacets::default())),
        );
        shape
            .base
            .custom_facets
            .insert("facets", Node::new(json!("mine"), location.clone()));
        shape
            .base
            .custom_facets
            .insert("discriminator", Node::new(json!("also mine"), location));

        let schema = to_json(&JsonSchemaConverter::new().convert(&shape).unwrap());
        let extensions = &schema["x-custom"];
        assert_eq!(extensions["discriminator"], json!("kind"));
        assert_eq!(extensions["facets"], json!({"facets": {"type": "string"}}));
        assert_eq!(
            extensions["data"],
            json!({"facets": "mine", "discriminator": "also mine"})
        );
    }

    #[test]
    fn test_embedded_json_schema_passes_through() {
        let shape = Shape::new(
            "Raw",
            Facets::Json(JsonFacets {
                schema: json!({"type": "object", "required": ["a"]}),
            }),
        )
        .with_description("raw");
        let schema = to_json(&JsonSchemaConverter::new().convert(&shape).unwrap());
        assert_eq!(schema["required"], json!(["a"]));
        assert_eq!(schema["description"], json!("raw"));
    }

    #[test]
    fn test_unknown_shape_fails() {
        let err = JsonSchemaConverter::new()
            .convert(&Shape::reference("x", "Missing"))
            .unwrap_err();
        assert!(matches!(err.root(), ShapeError::UnresolvedShape { name, .. } if name == "Missing"));
    }

    #[test]
    fn test_predefined_definitions_are_referenced() {
        let (library, _) = resolved(json!({
            "types": {
                "Name": {"type": "string", "minLength": 1},
                "Person": {"properties": {"name": "Name"}}
            }
        }));
        let mut converter = JsonSchemaConverter::new();
        converter.add_definition(library.find_type("Name").unwrap()).unwrap();
        let schema = to_json(&converter.convert(library.find_type("Person").unwrap()).unwrap());

        assert_eq!(schema["properties"]["name"], json!({"$ref": "#/definitions/Name"}));
        assert_eq!(schema["definitions"]["Name"]["minLength"], json!(1));
    }
}
