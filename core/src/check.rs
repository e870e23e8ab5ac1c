//! Self-consistency checks on resolved shapes.

use regex::Regex;
use serde_json::Value;

use crate::error::{Location, Result, ShapeError};
use crate::facets::{DATETIME_FORMATS, FLOAT_FORMATS, Facets, INTEGER_FORMATS};
use crate::types::Shape;

impl Shape {
    /// Checks the shape's own facets and those of its owned children.
    ///
    /// Lower bounds must not exceed their upper bounds, patterns must
    /// compile, formats must be known, enum values must have the shape's
    /// type, and an object discriminator must name a declared property.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::InvalidShape`] for inconsistent facets and
    /// [`ShapeError::UnresolvedShape`] if an `Unknown` shape is reached.
    pub fn check(&self) -> Result<()> {
        let location = self.location();
        match &self.facets {
            Facets::String(string) => {
                check_bounds("minLength", string.min_length, "maxLength", string.max_length, location)?;
                if let Some(pattern) = &string.pattern {
                    compile_pattern(pattern, location)?;
                }
                check_enum(&string.enum_values, "string", Value::is_string, location)
            }
            Facets::Number(number) => {
                check_bounds("minimum", number.minimum, "maximum", number.maximum, location)?;
                if let Some(multiple_of) = number.multiple_of {
                    if multiple_of <= 0.0 {
                        return Err(ShapeError::invalid(
                            format!("multipleOf must be positive, got {multiple_of}"),
                            location,
                        ));
                    }
                }
                check_number_format(&number.format, true, location)?;
                check_enum(&number.enum_values, "number", Value::is_number, location)
            }
            Facets::Integer(integer) => {
                check_bounds("minimum", integer.minimum, "maximum", integer.maximum, location)?;
                check_number_format(&integer.format, false, location)?;
                check_enum(&integer.enum_values, "integer", is_integer, location)
            }
            Facets::Boolean(boolean) => {
                check_enum(&boolean.enum_values, "boolean", Value::is_boolean, location)
            }
            Facets::File(file) => {
                check_bounds("minLength", file.min_length, "maxLength", file.max_length, location)
            }
            Facets::DateTime(datetime) => match &datetime.format {
                Some(format) if !DATETIME_FORMATS.contains(&format.as_str()) => Err(
                    ShapeError::invalid(format!("unknown datetime format `{format}`"), location),
                ),
                _ => Ok(()),
            },
            Facets::Array(array) => {
                check_bounds("minItems", array.min_items, "maxItems", array.max_items, location)?;
                if let Some(items) = &array.items {
                    items
                        .check()
                        .map_err(|e| e.wrap("check array items", location))?;
                }
                Ok(())
            }
            Facets::Object(object) => {
                check_bounds(
                    "minProperties",
                    object.min_properties,
                    "maxProperties",
                    object.max_properties,
                    location,
                )?;
                if let Some(discriminator) = &object.discriminator {
                    if object.property(discriminator).is_none() {
                        return Err(ShapeError::invalid(
                            format!("discriminator `{discriminator}` is not a declared property"),
                            location,
                        ));
                    }
                }
                if let Some(properties) = &object.properties {
                    for (name, property) in properties.iter() {
                        property.shape.check().map_err(|e| {
                            e.wrap("check property", location)
                                .with_info("property", name)
                        })?;
                    }
                }
                Ok(())
            }
            Facets::Union(union) => {
                if union.any_of.is_empty() {
                    return Err(ShapeError::invalid("union has no members", location));
                }
                for (index, member) in union.any_of.iter().enumerate() {
                    member.check().map_err(|e| {
                        e.wrap("check union member", location)
                            .with_info("member", index)
                    })?;
                }
                Ok(())
            }
            Facets::Unknown(_) => Err(ShapeError::unresolved(self.name(), location)),
            Facets::DateTimeOnly
            | Facets::DateOnly
            | Facets::TimeOnly
            | Facets::Any
            | Facets::Nil
            | Facets::Json(_)
            | Facets::Recursive(_) => Ok(()),
        }
    }
}

fn check_bounds<T>(
    lower_name: &str,
    lower: Option<T>,
    upper_name: &str,
    upper: Option<T>,
    location: &Location,
) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    match (lower, upper) {
        (Some(lower), Some(upper)) if lower > upper => Err(ShapeError::invalid(
            format!("{lower_name} ({lower}) must not exceed {upper_name} ({upper})"),
            location,
        )),
        _ => Ok(()),
    }
}

pub(crate) fn compile_pattern(pattern: &str, location: &Location) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| ShapeError::invalid(format!("invalid pattern `{pattern}`: {e}"), location))
}

fn check_number_format(format: &Option<String>, allow_float: bool, location: &Location) -> Result<()> {
    let Some(format) = format else {
        return Ok(());
    };
    let known = INTEGER_FORMATS.iter().any(|(name, _, _)| name == format)
        || (allow_float && FLOAT_FORMATS.contains(&format.as_str()));
    if known {
        Ok(())
    } else {
        Err(ShapeError::invalid(format!("unknown format `{format}`"), location))
    }
}

fn check_enum(
    values: &Option<Vec<Value>>,
    kind: &str,
    accepts: fn(&Value) -> bool,
    location: &Location,
) -> Result<()> {
    let Some(values) = values else {
        return Ok(());
    };
    if values.is_empty() {
        return Err(ShapeError::invalid("enum must not be empty", location));
    }
    match values.iter().find(|v| !accepts(v)) {
        Some(value) => Err(ShapeError::invalid(
            format!("enum value {value} is not a valid {kind}"),
            location,
        )),
        None => Ok(()),
    }
}

pub(crate) fn is_integer(value: &Value) -> bool {
    value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0)
}
