//! Value validation against resolved shapes.
//!
//! Walks a decoded value and a resolved shape tree side by side. Failures
//! carry the path of the offending value (`$.items[2].name`) and are wrapped
//! with the property, index or union member they were found under.
//!
//! # Examples
//!
//! ```
//! use raml_shapes_core::*;
//! use serde_json::json;
//!
//! let tags = Shape::array("Tags", ArrayFacets {
//!     items: Some(Box::new(Shape::string("items", StringFacets::default()))),
//!     min_items: Some(1),
//!     unique_items: Some(true),
//!     ..Default::default()
//! });
//!
//! assert!(tags.validate(&json!(["a", "b"]), "$").is_ok());
//! assert!(tags.validate(&json!(["a", "a"]), "$").is_err());
//! assert!(tags.validate(&json!([]), "$").is_err());
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::check::{compile_pattern, is_integer};
use crate::error::{Result, ShapeError};
use crate::facets::{
    ArrayFacets, DateTimeFacets, FileFacets, Facets, INTEGER_FORMATS, IntegerFacets, NumberFacets,
    ObjectFacets, RecursiveFacets, StringFacets, UnionFacets,
};
use crate::resolve::Definitions;
use crate::types::{Shape, ShapeId};

const DATETIME_ONLY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATE_ONLY_FORMAT: &str = "%Y-%m-%d";
const TIME_ONLY_FORMAT: &str = "%H:%M:%S%.f";

/// Tolerance for `multipleOf` checks on floating point values.
const MULTIPLE_OF_EPSILON: f64 = 1e-9;

impl Shape {
    /// Validates `value` against this resolved shape.
    ///
    /// `path` is the breadcrumb of the value itself, usually `"$"`.
    /// Recursive back-references are resolved against the enclosing shapes
    /// only; use [`Shape::validate_with`] when the head may lie outside this
    /// tree.
    pub fn validate(&self, value: &Value, path: &str) -> Result<()> {
        ValueValidator::new(None).validate(self, value, path)
    }

    /// Like [`Shape::validate`], also looking up recursive back-references in
    /// `definitions`.
    pub fn validate_with(&self, value: &Value, path: &str, definitions: &Definitions) -> Result<()> {
        ValueValidator::new(Some(definitions)).validate(self, value, path)
    }
}

struct ValueValidator<'a> {
    definitions: Option<&'a Definitions>,
    /// Shapes enclosing the one being validated.
    ancestors: Vec<&'a Shape>,
    /// Recursive heads currently being validated, with the value each was
    /// entered for.
    entered: Vec<(ShapeId, *const Value)>,
}

impl<'a> ValueValidator<'a> {
    fn new(definitions: Option<&'a Definitions>) -> Self {
        Self {
            definitions,
            ancestors: Vec::new(),
            entered: Vec::new(),
        }
    }

    fn validate(&mut self, shape: &'a Shape, value: &Value, path: &str) -> Result<()> {
        self.ancestors.push(shape);
        let result = self.validate_facets(shape, value, path);
        self.ancestors.pop();
        result
    }

    fn validate_facets(&mut self, shape: &'a Shape, value: &Value, path: &str) -> Result<()> {
        match &shape.facets {
            Facets::Object(object) => self.validate_object(shape, object, value, path),
            Facets::Array(array) => self.validate_array(shape, array, value, path),
            Facets::Union(union) => self.validate_union(shape, union, value, path),
            Facets::String(string) => validate_string(shape, string, value, path),
            Facets::Number(number) => validate_number(shape, number, value, path),
            Facets::Integer(integer) => validate_integer(shape, integer, value, path),
            Facets::Boolean(boolean) => {
                if !value.is_boolean() {
                    return Err(fail(shape, path, "value is not a boolean"));
                }
                check_enum(shape, &boolean.enum_values, value, path)
            }
            Facets::File(file) => validate_file(shape, file, value, path),
            Facets::DateTime(datetime) => validate_datetime(shape, datetime, value, path),
            Facets::DateTimeOnly => {
                let text = expect_str(shape, value, path)?;
                NaiveDateTime::parse_from_str(text, DATETIME_ONLY_FORMAT)
                    .map(|_| ())
                    .map_err(|e| fail(shape, path, format!("invalid datetime-only `{text}`: {e}")))
            }
            Facets::DateOnly => {
                let text = expect_str(shape, value, path)?;
                NaiveDate::parse_from_str(text, DATE_ONLY_FORMAT)
                    .map(|_| ())
                    .map_err(|e| fail(shape, path, format!("invalid date-only `{text}`: {e}")))
            }
            Facets::TimeOnly => {
                let text = expect_str(shape, value, path)?;
                NaiveTime::parse_from_str(text, TIME_ONLY_FORMAT)
                    .map(|_| ())
                    .map_err(|e| fail(shape, path, format!("invalid time-only `{text}`: {e}")))
            }
            Facets::Any | Facets::Json(_) => Ok(()),
            Facets::Nil => {
                if value.is_null() {
                    Ok(())
                } else {
                    Err(fail(shape, path, "value is not null"))
                }
            }
            Facets::Unknown(_) => Err(ShapeError::unresolved(shape.name(), shape.location())),
            Facets::Recursive(recursive) => self.validate_recursive(shape, recursive, value, path),
        }
    }

    fn validate_object(
        &mut self,
        shape: &'a Shape,
        object: &'a ObjectFacets,
        value: &Value,
        path: &str,
    ) -> Result<()> {
        let Value::Object(map) = value else {
            return Err(fail(shape, path, "value is not a map"));
        };
        let count = map.len() as u64;
        if let Some(min) = object.min_properties {
            if count < min {
                return Err(fail(shape, path, format!("expected at least {min} properties, got {count}")));
            }
        }
        if let Some(max) = object.max_properties {
            if count > max {
                return Err(fail(shape, path, format!("expected at most {max} properties, got {count}")));
            }
        }

        if let Some(discriminator) = &object.discriminator {
            match (map.get(discriminator), &object.discriminator_value) {
                (None, _) => {
                    return Err(fail(
                        shape,
                        path,
                        format!("discriminator property `{discriminator}` is missing"),
                    ));
                }
                (Some(actual), Some(expected)) if actual != expected => {
                    return Err(fail(
                        shape,
                        path,
                        format!("discriminator `{discriminator}` must be {expected}, got {actual}"),
                    ));
                }
                _ => {}
            }
        }

        if let Some(properties) = &object.properties {
            for (name, property) in properties.iter() {
                match map.get(name) {
                    Some(member) => {
                        let member_path = format!("{path}.{name}");
                        self.validate(&property.shape, member, &member_path)
                            .map_err(|e| {
                                e.wrap("validate property", shape.location())
                                    .with_info("property", name)
                            })?;
                    }
                    None if property.required => {
                        return Err(fail(
                            shape,
                            path,
                            format!("required property `{name}` is missing"),
                        ));
                    }
                    None => {}
                }
            }
        }

        if !object.additional_properties {
            if let Some(unexpected) = map
                .keys()
                .find(|key| object.property(key).is_none())
            {
                return Err(fail(
                    shape,
                    path,
                    format!("additional property `{unexpected}` is not allowed"),
                ));
            }
        }
        Ok(())
    }

    fn validate_array(
        &mut self,
        shape: &'a Shape,
        array: &'a ArrayFacets,
        value: &Value,
        path: &str,
    ) -> Result<()> {
        let Value::Array(items) = value else {
            return Err(fail(shape, path, "value is not an array"));
        };
        let count = items.len() as u64;
        if let Some(min) = array.min_items {
            if count < min {
                return Err(fail(shape, path, format!("minItems: expected at least {min} items, got {count}")));
            }
        }
        if let Some(max) = array.max_items {
            if count > max {
                return Err(fail(shape, path, format!("maxItems: expected at most {max} items, got {count}")));
            }
        }
        if array.unique_items == Some(true) {
            for (index, item) in items.iter().enumerate() {
                if items[..index].contains(item) {
                    return Err(fail(
                        shape,
                        path,
                        format!("uniqueItems: item {index} duplicates an earlier item"),
                    ));
                }
            }
        }

        if let Some(item_shape) = &array.items {
            for (index, item) in items.iter().enumerate() {
                let item_path = format!("{path}[{index}]");
                self.validate(item_shape, item, &item_path).map_err(|e| {
                    e.wrap("validate array item", shape.location())
                        .with_info("index", index)
                })?;
            }
        }
        Ok(())
    }

    fn validate_union(
        &mut self,
        shape: &'a Shape,
        union: &'a UnionFacets,
        value: &Value,
        path: &str,
    ) -> Result<()> {
        let mut failures = Vec::with_capacity(union.any_of.len());
        for (index, member) in union.any_of.iter().enumerate() {
            let member_path = format!("{path}|{index}");
            match self.validate(member, value, &member_path) {
                Ok(()) => return Ok(()),
                Err(e) => failures.push(format!("{}: {}", member.kind(), e.root())),
            }
        }
        Err(fail(
            shape,
            path,
            format!("value matches no union member ({})", failures.join("; ")),
        ))
    }

    fn validate_recursive(
        &mut self,
        shape: &'a Shape,
        recursive: &RecursiveFacets,
        value: &Value,
        path: &str,
    ) -> Result<()> {
        let head = self
            .ancestors
            .iter()
            .rev()
            .copied()
            .find(|s| s.id() == recursive.head)
            .or_else(|| self.definitions.and_then(|d| d.get(&recursive.head)))
            .ok_or_else(|| ShapeError::unresolved(&recursive.head_name, shape.location()))?;

        // Re-entering a head for the same value would never terminate.
        let entry = (recursive.head, value as *const Value);
        if self.entered.contains(&entry) {
            return Err(fail(
                shape,
                path,
                format!("`{}` refers to itself without nesting", recursive.head_name),
            ));
        }
        self.entered.push(entry);
        let result = self.validate(head, value, path);
        self.entered.pop();
        result
    }
}

fn validate_string(shape: &Shape, string: &StringFacets, value: &Value, path: &str) -> Result<()> {
    let text = expect_str(shape, value, path)?;
    check_length(shape, string.min_length, string.max_length, text, path)?;
    if let Some(pattern) = &string.pattern {
        let regex = compile_pattern(pattern, shape.location())?;
        if !regex.is_match(text) {
            return Err(fail(shape, path, format!("value does not match pattern `{pattern}`")));
        }
    }
    check_enum(shape, &string.enum_values, value, path)
}

fn validate_number(shape: &Shape, number: &NumberFacets, value: &Value, path: &str) -> Result<()> {
    let Some(n) = value.as_f64() else {
        return Err(fail(shape, path, "value is not a number"));
    };
    if let Some(minimum) = number.minimum {
        if n < minimum {
            return Err(fail(shape, path, format!("{n} is less than minimum {minimum}")));
        }
    }
    if let Some(maximum) = number.maximum {
        if n > maximum {
            return Err(fail(shape, path, format!("{n} is greater than maximum {maximum}")));
        }
    }
    if let Some(multiple_of) = number.multiple_of {
        let ratio = n / multiple_of;
        if (ratio - ratio.round()).abs() > MULTIPLE_OF_EPSILON {
            return Err(fail(shape, path, format!("{n} is not a multiple of {multiple_of}")));
        }
    }
    if let Some(format) = &number.format {
        if let Some((_, min, max)) = INTEGER_FORMATS.iter().find(|(name, _, _)| name == format) {
            if !is_integer(value) || !in_range(n, *min, *max) {
                return Err(fail(shape, path, format!("{n} is not a valid {format}")));
            }
        }
    }
    check_enum(shape, &number.enum_values, value, path)
}

fn validate_integer(shape: &Shape, integer: &IntegerFacets, value: &Value, path: &str) -> Result<()> {
    if !is_integer(value) {
        return Err(fail(shape, path, "value is not an integer"));
    }
    let n = value
        .as_i64()
        .map(i128::from)
        .or_else(|| value.as_u64().map(i128::from))
        .or_else(|| value.as_f64().map(|f| f as i128))
        .unwrap_or_default();
    if let Some(minimum) = integer.minimum {
        if n < i128::from(minimum) {
            return Err(fail(shape, path, format!("{n} is less than minimum {minimum}")));
        }
    }
    if let Some(maximum) = integer.maximum {
        if n > i128::from(maximum) {
            return Err(fail(shape, path, format!("{n} is greater than maximum {maximum}")));
        }
    }
    if let Some(format) = &integer.format {
        if let Some((_, min, max)) = INTEGER_FORMATS.iter().find(|(name, _, _)| name == format) {
            if n < *min || n > *max {
                return Err(fail(shape, path, format!("{n} is out of range for {format}")));
            }
        }
    }
    check_enum(shape, &integer.enum_values, value, path)
}

fn validate_file(shape: &Shape, file: &FileFacets, value: &Value, path: &str) -> Result<()> {
    let payload = expect_str(shape, value, path)?;
    check_length(shape, file.min_length, file.max_length, payload, path)
}

fn validate_datetime(
    shape: &Shape,
    datetime: &DateTimeFacets,
    value: &Value,
    path: &str,
) -> Result<()> {
    let text = expect_str(shape, value, path)?;
    let parsed = match datetime.format.as_deref() {
        Some("rfc2616") => DateTime::parse_from_rfc2822(text).map(|_| ()),
        _ => DateTime::parse_from_rfc3339(text).map(|_| ()),
    };
    parsed.map_err(|e| fail(shape, path, format!("invalid datetime `{text}`: {e}")))
}

fn check_length(
    shape: &Shape,
    min: Option<u64>,
    max: Option<u64>,
    text: &str,
    path: &str,
) -> Result<()> {
    let length = text.len() as u64;
    if let Some(min) = min {
        if length < min {
            return Err(fail(shape, path, format!("length {length} is less than minLength {min}")));
        }
    }
    if let Some(max) = max {
        if length > max {
            return Err(fail(shape, path, format!("length {length} is greater than maxLength {max}")));
        }
    }
    Ok(())
}

fn check_enum(shape: &Shape, values: &Option<Vec<Value>>, value: &Value, path: &str) -> Result<()> {
    match values {
        Some(values) if !values.iter().any(|v| same_value(v, value)) => {
            Err(fail(shape, path, format!("{value} is not one of the enum values")))
        }
        _ => Ok(()),
    }
}

/// Equality that treats `1` and `1.0` as the same number.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y || x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn in_range(n: f64, min: i128, max: i128) -> bool {
    n >= min as f64 && n <= max as f64
}

fn expect_str<'v>(shape: &Shape, value: &'v Value, path: &str) -> Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| fail(shape, path, "value is not a string"))
}

fn fail(shape: &Shape, path: &str, message: impl Into<String>) -> ShapeError {
    ShapeError::value(path, message, shape.location())
}
