//! Strict argument validation against a tool's declared input schema.
//!
//! The resolver runs the same check to turn bad model output into
//! clarifications; the dispatcher runs it again as the authoritative gate
//! before any tool executes. Unknown fields are rejected rather than
//! ignored so a misspelled argument never silently drops.

use serde_json::{Map, Value};

use super::types::{PropertySchema, ToolInputSchema};

/// Validate `arguments` against `schema` and return the normalized object
/// with declared defaults filled in for absent optional fields.
pub fn validate_arguments(schema: &ToolInputSchema, arguments: &Value) -> Result<Value, String> {
    let map = match arguments.as_object() {
        Some(map) => map,
        None => return Err("arguments must be a JSON object".to_string()),
    };

    let mut problems = Vec::new();

    for key in map.keys() {
        if !schema.properties.contains_key(key) {
            problems.push(format!("unknown field '{}'", key));
        }
    }

    for name in &schema.required {
        if !map.contains_key(name) {
            problems.push(format!("missing required field '{}'", name));
        }
    }

    for (key, value) in map {
        if let Some(property) = schema.properties.get(key) {
            if let Err(problem) = check_value(key, property, value) {
                problems.push(problem);
            }
        }
    }

    if !problems.is_empty() {
        return Err(problems.join("; "));
    }

    let mut normalized: Map<String, Value> = map.clone();
    for (name, property) in &schema.properties {
        if !normalized.contains_key(name) {
            if let Some(default) = &property.default {
                normalized.insert(name.clone(), default.clone());
            }
        }
    }

    Ok(Value::Object(normalized))
}

fn check_value(name: &str, property: &PropertySchema, value: &Value) -> Result<(), String> {
    match property.schema_type.as_str() {
        "string" => {
            let text = value
                .as_str()
                .ok_or_else(|| format!("field '{}' must be a string", name))?;
            if let Some(allowed) = &property.enum_values {
                if !allowed.iter().any(|candidate| candidate == text) {
                    return Err(format!(
                        "field '{}' must be one of [{}]",
                        name,
                        allowed.join(", ")
                    ));
                }
            }
            Ok(())
        }
        "boolean" => value
            .as_bool()
            .map(|_| ())
            .ok_or_else(|| format!("field '{}' must be a boolean", name)),
        "integer" => {
            if value.is_i64() || value.is_u64() {
                Ok(())
            } else {
                Err(format!("field '{}' must be an integer", name))
            }
        }
        "number" => {
            if value.is_number() {
                Ok(())
            } else {
                Err(format!("field '{}' must be a number", name))
            }
        }
        "array" => {
            let items = value
                .as_array()
                .ok_or_else(|| format!("field '{}' must be an array", name))?;
            if let Some(element_schema) = &property.items {
                for (index, element) in items.iter().enumerate() {
                    check_value(&format!("{}[{}]", name, index), element_schema, element)?;
                }
            }
            Ok(())
        }
        "object" => value
            .as_object()
            .map(|_| ())
            .ok_or_else(|| format!("field '{}' must be an object", name)),
        _ => Ok(()),
    }
}
