//! JSON Schema draft-07 document model.
//!
//! Only the keywords produced by the converter (and those an embedded JSON
//! schema fragment may carry) are modelled. Unset keywords are omitted from
//! the serialized output.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::ordered::OrderedMap;

/// `$schema` URI of generated documents.
pub const DRAFT_07: &str = "http://json-schema.org/draft-07/schema";

/// Key under which RAML-only data (custom facets, domain extensions) is
/// emitted.
pub const EXTENSION_KEY: &str = "x-custom";

/// A schema node: either a keyword object or a bare boolean.
///
/// `true` accepts every value and `false` rejects every value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Schema {
    Bool(bool),
    Object(Box<SchemaObject>),
}

impl Schema {
    /// Wraps a keyword object.
    pub fn object(object: SchemaObject) -> Self {
        Self::Object(Box::new(object))
    }

    /// Creates a `{"$ref": ...}` node.
    pub fn reference(pointer: impl Into<String>) -> Self {
        Self::object(SchemaObject {
            reference: Some(pointer.into()),
            ..Default::default()
        })
    }

    pub fn as_object(&self) -> Option<&SchemaObject> {
        match self {
            Self::Object(object) => Some(object),
            Self::Bool(_) => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut SchemaObject> {
        match self {
            Self::Object(object) => Some(object),
            Self::Bool(_) => None,
        }
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::Bool(true)
    }
}

/// A schema keyword object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchemaObject {
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "$id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "$comment", skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "OrderedMap::is_empty")]
    pub definitions: OrderedMap<Schema>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<Schema>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<Schema>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<Schema>,
    #[serde(rename = "not", skip_serializing_if = "Option::is_none")]
    pub not: Option<Schema>,

    #[serde(rename = "if", skip_serializing_if = "Option::is_none")]
    pub if_schema: Option<Schema>,
    #[serde(rename = "then", skip_serializing_if = "Option::is_none")]
    pub then_schema: Option<Schema>,
    #[serde(rename = "else", skip_serializing_if = "Option::is_none")]
    pub else_schema: Option<Schema>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Schema>,
    #[serde(skip_serializing_if = "OrderedMap::is_empty")]
    pub properties: OrderedMap<Schema>,
    #[serde(skip_serializing_if = "OrderedMap::is_empty")]
    pub pattern_properties: OrderedMap<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_names: Option<Schema>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(rename = "const", skip_serializing_if = "Option::is_none")]
    pub const_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Value>,

    /// RAML-only data, see [`EXTENSION_KEY`].
    #[serde(rename = "x-custom", skip_serializing_if = "OrderedMap::is_empty")]
    pub extensions: OrderedMap<Value>,
}

impl SchemaObject {
    /// Creates an object with only `type` set.
    pub fn typed(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_unset_keywords_are_omitted() {
        let schema = Schema::object(SchemaObject {
            min_length: Some(1),
            ..SchemaObject::typed("string")
        });
        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({"type": "string", "minLength": 1})
        );
    }

    #[test]
    fn test_reserved_keyword_names() {
        let schema = Schema::object(SchemaObject {
            version: Some(DRAFT_07.to_string()),
            reference: Some("#/definitions/Node".into()),
            if_schema: Some(Schema::Bool(false)),
            enum_values: Some(vec![json!("a")]),
            ..Default::default()
        });
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["$schema"], json!(DRAFT_07));
        assert_eq!(value["$ref"], json!("#/definitions/Node"));
        assert_eq!(value["if"], json!(false));
        assert_eq!(value["enum"], json!(["a"]));
    }

    #[test]
    fn test_reads_foreign_fragment() {
        let schema: Schema = serde_json::from_value(json!({
            "type": "object",
            "properties": {"b": {"type": "string"}, "a": true},
            "required": ["b"],
            "additionalProperties": false
        }))
        .unwrap();
        let object = schema.as_object().unwrap();
        assert_eq!(object.properties.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(object.properties.get("a"), Some(&Schema::Bool(true)));
        assert_eq!(object.additional_properties, Some(false));
    }
}
