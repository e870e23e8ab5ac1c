//! Shape construction from declaration nodes.
//!
//! Turns a `(node, name, location)` triple into a [`Shape`]. The node is a
//! generic tree (`serde_json::Value`); the builder handles type expressions
//! (`Name`, `a | b`, `t[]`, `[A, B]`, inline JSON Schema), kind identification
//! from facet names when `type` is absent, and the `?` optional suffix on
//! property names.
//!
//! Declarations that refer to user-defined types cannot be decoded yet: they
//! become `Unknown` shapes that inherit the referenced type and keep their
//! facet nodes until the resolver knows the kind.
//!
//! # Examples
//!
//! ```
//! use raml_shapes_core::{Location, ShapeKind, build_shape};
//! use serde_json::json;
//!
//! let location = Location::new("types.raml");
//! let shape = build_shape(&json!({"minimum": 1, "maximum": 5}), "Score", &location).unwrap();
//! assert_eq!(shape.kind(), ShapeKind::Number);
//!
//! let alias = build_shape(&json!("Person"), "owner", &location).unwrap();
//! assert_eq!(alias.kind(), ShapeKind::Unknown);
//! assert_eq!(alias.base.alias.as_deref(), Some("Person"));
//! ```

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{Location, Result, ShapeError};
use crate::facets::{
    ARRAY_FACETS, ArrayFacets, BooleanFacets, DateTimeFacets, FILE_FACETS, Facets, FileFacets,
    IntegerFacets, JsonFacets, NUMBER_FACETS, NumberFacets, OBJECT_FACETS, ObjectFacets,
    STRING_FACETS, StringFacets, UnionFacets, UnknownFacets,
};
use crate::ordered::OrderedMap;
use crate::types::{BaseShape, Example, Node, Property, Shape, ShapeKind};

/// Keys of an `examples` entry that wraps the value with metadata.
const EXAMPLE_WRAPPER_KEYS: &[&str] = &["value", "displayName", "description", "strict"];

/// Builds a shape from a declaration node.
///
/// # Errors
///
/// Returns [`ShapeError::InvalidShape`] for structurally invalid declarations
/// (wrong node kinds, facet values of the wrong type, `example` together with
/// `examples`, malformed inline JSON).
pub fn build_shape(node: &Value, name: &str, location: &Location) -> Result<Shape> {
    let base = BaseShape::new(name, location.clone());
    match node {
        Value::Null => Ok(Shape {
            base,
            facets: Facets::String(StringFacets::default()),
        }),
        Value::String(expression) => type_expression(base, expression),
        Value::Array(parents) => composite(base, parents, OrderedMap::new()),
        Value::Object(map) => build_from_map(base, map),
        other => Err(ShapeError::invalid(
            format!(
                "type declaration must be a map, a type expression or a list of types, got {other}"
            ),
            location,
        )),
    }
}

/// Builds an object property (or custom facet definition) from its key and
/// declaration node.
///
/// A trailing `?` on the key marks the property optional unless the
/// declaration sets `required` explicitly. The suffix is stripped from the
/// name either way.
pub fn build_property(key: &str, node: &Value, location: &Location) -> Result<Property> {
    let (name, marked_optional) = match key.strip_suffix('?') {
        Some(stripped) if !stripped.is_empty() => (stripped, true),
        _ => (key, false),
    };
    let shape = build_shape(node, name, location)?;
    let required = shape.base.required.unwrap_or(!marked_optional);
    Ok(Property {
        name: name.to_string(),
        shape,
        required,
    })
}

fn build_from_map(mut base: BaseShape, map: &Map<String, Value>) -> Result<Shape> {
    let location = base.location.clone();
    let mut type_node = None;
    let mut facets = OrderedMap::new();

    for (key, value) in map {
        match key.as_str() {
            "type" => type_node = Some(value),
            "displayName" => base.display_name = Some(string_value(key, value, &location)?),
            "description" => base.description = Some(string_value(key, value, &location)?),
            "required" => {
                base.required = Some(value.as_bool().ok_or_else(|| {
                    facet_type_error(key, "a boolean", value, &location)
                })?)
            }
            "facets" => base.custom_facet_definitions = build_facet_definitions(value, &location)?,
            "example" => {
                base.example = Some(Example {
                    name: None,
                    value: example_value(value),
                    location: location.clone(),
                })
            }
            "examples" => base.examples = Some(build_examples(value, &location)?),
            "default" => base.default = Some(Node::new(value.clone(), location.clone())),
            "allowedTargets" => {}
            _ => match domain_extension_name(key) {
                Some(name) => {
                    base.domain_extensions
                        .insert(name, Node::new(value.clone(), location.clone()));
                }
                None => {
                    facets.insert(key.clone(), Node::new(value.clone(), location.clone()));
                }
            },
        }
    }

    if base.example.is_some() && base.examples.is_some() {
        return Err(ShapeError::invalid(
            "example and examples cannot be defined together",
            &location,
        ));
    }

    match type_node {
        None => identified(base, facets),
        Some(Value::Null) => concrete(base, ShapeKind::String, &facets),
        Some(Value::String(expression)) if expression.trim().is_empty() => {
            identified(base, facets)
        }
        Some(Value::String(expression)) => from_type_facet(base, expression, facets),
        Some(Value::Array(parents)) => composite(base, parents, facets),
        Some(inline @ Value::Object(_)) => {
            let parent = build_shape(inline, &base.name, &location)
                .map_err(|e| e.wrap("build inline parent type", &location))?;
            Ok(pending(base, vec![parent], facets))
        }
        Some(other) => Err(facet_type_error(
            "type",
            "a type expression or a list of types",
            other,
            &location,
        )),
    }
}

/// Resolves `type: <expression>` declared next to other facets.
fn from_type_facet(
    mut base: BaseShape,
    expression: &str,
    facets: OrderedMap<Node>,
) -> Result<Shape> {
    let expression = expression.trim();
    let location = base.location.clone();

    if expression.starts_with('{') {
        for (key, node) in facets {
            base.custom_facets.insert(key, node);
        }
        let schema = inline_json(expression, &location)?;
        return Ok(Shape {
            base,
            facets: Facets::Json(JsonFacets { schema }),
        });
    }

    if let Some(kind) = ShapeKind::from_type_name(expression) {
        return concrete(base, kind, &facets);
    }

    let parsed = type_expression(BaseShape::new(base.name.clone(), location), expression)?;
    if parsed.base.alias.is_some() {
        return Ok(pending(base, vec![parsed], facets));
    }

    // Union or array expression with extra facets.
    let mut decoded = decode_facets(parsed.kind(), &mut base, &facets)?;
    match (&mut decoded, parsed.facets) {
        (Facets::Array(array), Facets::Array(structure)) => {
            if array.items.is_none() {
                array.items = structure.items;
            }
        }
        (Facets::Union(union), Facets::Union(structure)) => {
            if union.any_of.is_empty() {
                union.any_of = structure.any_of;
            }
        }
        _ => {}
    }
    Ok(Shape {
        base,
        facets: decoded,
    })
}

/// Parses a bare type expression into a shape carrying `base`.
fn type_expression(mut base: BaseShape, expression: &str) -> Result<Shape> {
    let expression = strip_group(expression.trim());
    let location = base.location.clone();

    if expression.is_empty() {
        return Ok(Shape {
            base,
            facets: Facets::String(StringFacets::default()),
        });
    }
    if expression.starts_with('{') {
        let schema = inline_json(expression, &location)?;
        return Ok(Shape {
            base,
            facets: Facets::Json(JsonFacets { schema }),
        });
    }

    let alternatives = split_top_level(expression, '|');
    if alternatives.len() > 1 {
        let mut any_of = Vec::with_capacity(alternatives.len());
        for (index, alternative) in alternatives.into_iter().enumerate() {
            let member = type_expression(BaseShape::new(alternative.trim(), location.clone()), alternative)
                .map_err(|e| {
                    e.wrap("parse union member", &location)
                        .with_info("member", index)
                })?;
            any_of.push(member);
        }
        return Ok(Shape {
            base,
            facets: Facets::Union(UnionFacets { any_of }),
        });
    }

    if let Some(item) = expression.strip_suffix("[]") {
        let items = type_expression(BaseShape::new("items", location.clone()), item)?;
        return Ok(Shape {
            base,
            facets: Facets::Array(ArrayFacets {
                items: Some(Box::new(items)),
                ..Default::default()
            }),
        });
    }

    if let Some(kind) = ShapeKind::from_type_name(expression) {
        let facets = Facets::for_kind(kind).ok_or_else(|| {
            ShapeError::invalid(format!("`{expression}` cannot be used bare"), &location)
        })?;
        return Ok(Shape { base, facets });
    }

    if expression.contains(|c: char| c.is_whitespace() || "()[]|{},".contains(c)) {
        return Err(ShapeError::invalid(
            format!("malformed type expression `{expression}`"),
            &location,
        ));
    }

    trace!(shape = %base.name, target = expression, "Deferring type reference");
    base.alias = Some(expression.to_string());
    Ok(Shape {
        base,
        facets: Facets::Unknown(UnknownFacets::default()),
    })
}

/// Multiple inheritance: `type: [A, B]`.
fn composite(base: BaseShape, parents: &[Value], facets: OrderedMap<Node>) -> Result<Shape> {
    let location = base.location.clone();
    if parents.is_empty() {
        return Err(ShapeError::invalid("type list cannot be empty", &location));
    }

    let mut inherits = Vec::with_capacity(parents.len());
    for (index, parent) in parents.iter().enumerate() {
        let Value::String(expression) = parent else {
            return Err(facet_type_error("type", "a list of type names", parent, &location));
        };
        let shape = type_expression(BaseShape::new(expression.trim(), location.clone()), expression)
            .map_err(|e| {
                e.wrap("parse parent type", &location)
                    .with_info("index", index)
            })?;
        inherits.push(shape);
    }
    Ok(pending(base, inherits, facets))
}

fn pending(mut base: BaseShape, parents: Vec<Shape>, facets: OrderedMap<Node>) -> Shape {
    base.inherits = parents;
    Shape {
        base,
        facets: Facets::Unknown(UnknownFacets { facets }),
    }
}

fn identified(base: BaseShape, facets: OrderedMap<Node>) -> Result<Shape> {
    let kind = identify_kind(&facets);
    concrete(base, kind, &facets)
}

fn concrete(mut base: BaseShape, kind: ShapeKind, facets: &OrderedMap<Node>) -> Result<Shape> {
    let facets = decode_facets(kind, &mut base, facets)?;
    Ok(Shape { base, facets })
}

/// Infers the kind of a declaration without `type` from its facet names.
fn identify_kind(facets: &OrderedMap<Node>) -> ShapeKind {
    for key in facets.keys() {
        if STRING_FACETS.contains(&key) {
            continue;
        }
        if NUMBER_FACETS.contains(&key) {
            return ShapeKind::Number;
        }
        if FILE_FACETS.contains(&key) {
            return ShapeKind::File;
        }
        if OBJECT_FACETS.contains(&key) {
            return ShapeKind::Object;
        }
        if ARRAY_FACETS.contains(&key) {
            return ShapeKind::Array;
        }
    }
    ShapeKind::String
}

/// Decodes facet nodes for `kind`.
///
/// Facets the kind does not recognise are stored on `base` as custom facet
/// values.
pub(crate) fn decode_facets(
    kind: ShapeKind,
    base: &mut BaseShape,
    facets: &OrderedMap<Node>,
) -> Result<Facets> {
    let mut decoded = Facets::for_kind(kind).ok_or_else(|| {
        ShapeError::invalid(
            format!("facets cannot be decoded for kind {kind}"),
            &base.location,
        )
    })?;

    for (key, node) in facets.iter() {
        let consumed = match &mut decoded {
            Facets::Object(object) => decode_object_facet(object, key, node)?,
            Facets::Array(array) => decode_array_facet(array, key, node)?,
            Facets::String(string) => decode_string_facet(string, key, node)?,
            Facets::Number(number) => decode_number_facet(number, key, node)?,
            Facets::Integer(integer) => decode_integer_facet(integer, key, node)?,
            Facets::Boolean(boolean) => decode_boolean_facet(boolean, key, node)?,
            Facets::File(file) => decode_file_facet(file, key, node)?,
            Facets::DateTime(datetime) => decode_datetime_facet(datetime, key, node)?,
            _ => false,
        };
        if !consumed {
            base.custom_facets.insert(key, node.clone());
        }
    }
    Ok(decoded)
}

fn decode_object_facet(facets: &mut ObjectFacets, key: &str, node: &Node) -> Result<bool> {
    match key {
        "properties" => {
            let Value::Object(entries) = &node.value else {
                return Err(node_type_error(key, "a map", node));
            };
            let mut properties = OrderedMap::new();
            for (property_key, value) in entries {
                let property = build_property(property_key, value, &node.location).map_err(|e| {
                    e.wrap("build property", &node.location)
                        .with_info("property", property_key)
                })?;
                properties.insert(property.name.clone(), property);
            }
            facets.properties = Some(properties);
        }
        "discriminator" => facets.discriminator = Some(string_node(key, node)?),
        "discriminatorValue" => facets.discriminator_value = Some(node.value.clone()),
        "additionalProperties" => facets.additional_properties = bool_node(key, node)?,
        "minProperties" => facets.min_properties = Some(unsigned_node(key, node)?),
        "maxProperties" => facets.max_properties = Some(unsigned_node(key, node)?),
        _ => return Ok(false),
    }
    Ok(true)
}

fn decode_array_facet(facets: &mut ArrayFacets, key: &str, node: &Node) -> Result<bool> {
    match key {
        "items" => {
            let items = build_shape(&node.value, "items", &node.location)
                .map_err(|e| e.wrap("build array items", &node.location))?;
            facets.items = Some(Box::new(items));
        }
        "minItems" => facets.min_items = Some(unsigned_node(key, node)?),
        "maxItems" => facets.max_items = Some(unsigned_node(key, node)?),
        "uniqueItems" => facets.unique_items = Some(bool_node(key, node)?),
        _ => return Ok(false),
    }
    Ok(true)
}

fn decode_string_facet(facets: &mut StringFacets, key: &str, node: &Node) -> Result<bool> {
    match key {
        "enum" => facets.enum_values = Some(enum_node(key, node)?),
        "minLength" => facets.min_length = Some(unsigned_node(key, node)?),
        "maxLength" => facets.max_length = Some(unsigned_node(key, node)?),
        "pattern" => facets.pattern = Some(string_node(key, node)?),
        _ => return Ok(false),
    }
    Ok(true)
}

fn decode_number_facet(facets: &mut NumberFacets, key: &str, node: &Node) -> Result<bool> {
    match key {
        "enum" => facets.enum_values = Some(enum_node(key, node)?),
        "format" => facets.format = Some(string_node(key, node)?),
        "minimum" => facets.minimum = Some(float_node(key, node)?),
        "maximum" => facets.maximum = Some(float_node(key, node)?),
        "multipleOf" => facets.multiple_of = Some(float_node(key, node)?),
        _ => return Ok(false),
    }
    Ok(true)
}

fn decode_integer_facet(facets: &mut IntegerFacets, key: &str, node: &Node) -> Result<bool> {
    match key {
        "enum" => facets.enum_values = Some(enum_node(key, node)?),
        "format" => facets.format = Some(string_node(key, node)?),
        "minimum" => facets.minimum = Some(integer_node(key, node)?),
        "maximum" => facets.maximum = Some(integer_node(key, node)?),
        _ => return Ok(false),
    }
    Ok(true)
}

fn decode_boolean_facet(facets: &mut BooleanFacets, key: &str, node: &Node) -> Result<bool> {
    match key {
        "enum" => facets.enum_values = Some(enum_node(key, node)?),
        _ => return Ok(false),
    }
    Ok(true)
}

fn decode_file_facet(facets: &mut FileFacets, key: &str, node: &Node) -> Result<bool> {
    match key {
        "fileTypes" => {
            let Value::Array(values) = &node.value else {
                return Err(node_type_error(key, "a list of media types", node));
            };
            let types = values
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| node_type_error(key, "a list of media types", node))
                })
                .collect::<Result<Vec<_>>>()?;
            facets.file_types = Some(types);
        }
        "minLength" => facets.min_length = Some(unsigned_node(key, node)?),
        "maxLength" => facets.max_length = Some(unsigned_node(key, node)?),
        _ => return Ok(false),
    }
    Ok(true)
}

fn decode_datetime_facet(facets: &mut DateTimeFacets, key: &str, node: &Node) -> Result<bool> {
    match key {
        "format" => facets.format = Some(string_node(key, node)?),
        _ => return Ok(false),
    }
    Ok(true)
}

fn build_facet_definitions(value: &Value, location: &Location) -> Result<OrderedMap<Property>> {
    let Value::Object(entries) = value else {
        return Err(facet_type_error("facets", "a map", value, location));
    };
    let mut definitions = OrderedMap::new();
    for (key, node) in entries {
        let property = build_property(key, node, location).map_err(|e| {
            e.wrap("build custom facet definition", location)
                .with_info("facet", key)
        })?;
        definitions.insert(property.name.clone(), property);
    }
    Ok(definitions)
}

fn build_examples(value: &Value, location: &Location) -> Result<OrderedMap<Example>> {
    let Value::Object(entries) = value else {
        return Err(facet_type_error("examples", "a map", value, location));
    };
    Ok(entries
        .iter()
        .map(|(name, value)| {
            let example = Example {
                name: Some(name.clone()),
                value: example_value(value),
                location: location.clone(),
            };
            (name.clone(), example)
        })
        .collect())
}

/// Unwraps the `value` of an example declared with metadata.
fn example_value(value: &Value) -> Value {
    match value {
        Value::Object(map)
            if map.contains_key("value")
                && map.keys().all(|k| EXAMPLE_WRAPPER_KEYS.contains(&k.as_str())) =>
        {
            map.get("value").cloned().unwrap_or(Value::Null)
        }
        other => other.clone(),
    }
}

fn domain_extension_name(key: &str) -> Option<&str> {
    key.strip_prefix('(')
        .and_then(|k| k.strip_suffix(')'))
        .filter(|k| !k.is_empty())
}

fn inline_json(text: &str, location: &Location) -> Result<Value> {
    serde_json::from_str(text)
        .map_err(|e| ShapeError::invalid(format!("invalid inline JSON schema: {e}"), location))
}

/// Removes parentheses that enclose the whole expression.
fn strip_group(expression: &str) -> &str {
    let mut current = expression;
    while current.starts_with('(') && current.ends_with(')') && closes_at_end(current) {
        current = current[1..current.len() - 1].trim();
    }
    current
}

fn closes_at_end(expression: &str) -> bool {
    let mut depth = 0usize;
    for (index, c) in expression.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return index == expression.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

/// Splits on `separator` outside parentheses.
fn split_top_level(expression: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, c) in expression.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 => {
                parts.push(&expression[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&expression[start..]);
    parts
}

fn string_value(key: &str, value: &Value, location: &Location) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| facet_type_error(key, "a string", value, location))
}

fn string_node(key: &str, node: &Node) -> Result<String> {
    string_value(key, &node.value, &node.location)
}

fn bool_node(key: &str, node: &Node) -> Result<bool> {
    node.value
        .as_bool()
        .ok_or_else(|| node_type_error(key, "a boolean", node))
}

fn unsigned_node(key: &str, node: &Node) -> Result<u64> {
    node.value
        .as_u64()
        .ok_or_else(|| node_type_error(key, "a non-negative integer", node))
}

fn integer_node(key: &str, node: &Node) -> Result<i64> {
    node.value
        .as_i64()
        .or_else(|| {
            node.value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        })
        .ok_or_else(|| node_type_error(key, "an integer", node))
}

fn float_node(key: &str, node: &Node) -> Result<f64> {
    node.value
        .as_f64()
        .ok_or_else(|| node_type_error(key, "a number", node))
}

fn enum_node(key: &str, node: &Node) -> Result<Vec<Value>> {
    match &node.value {
        Value::Array(values) => Ok(values.clone()),
        _ => Err(node_type_error(key, "a list", node)),
    }
}

fn node_type_error(key: &str, expected: &str, node: &Node) -> ShapeError {
    facet_type_error(key, expected, &node.value, &node.location)
}

fn facet_type_error(key: &str, expected: &str, value: &Value, location: &Location) -> ShapeError {
    ShapeError::invalid(format!("`{key}` must be {expected}, got {value}"), location)
}
