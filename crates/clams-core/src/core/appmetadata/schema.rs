//! Parameter Schema
//!
//! Derives the JSON-Schema (draft-07) of a runtime parameter payload from the
//! declared parameters.

use serde_json::{json, Map, Value};

use super::models::ParameterSpec;

pub const JSON_SCHEMA_DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";

/// Builds the payload schema for the given declarations
pub fn parameter_schema(parameters: &[ParameterSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for spec in parameters {
        let mut item = Map::new();
        item.insert("type".to_string(), json!(spec.param_type.json_type()));
        if let Some(choices) = &spec.choices {
            item.insert("enum".to_string(), json!(choices));
        }

        let mut property = if spec.multivalued {
            let mut array = Map::new();
            array.insert("type".to_string(), json!("array"));
            array.insert("items".to_string(), Value::Object(item));
            array
        } else {
            item
        };

        if let Some(default) = &spec.default {
            property.insert("default".to_string(), default.clone());
        }
        if let Some(description) = &spec.description {
            property.insert("description".to_string(), json!(description));
        }

        properties.insert(spec.name.clone(), Value::Object(property));
        if spec.is_required() {
            required.push(spec.name.clone());
        }
    }

    json!({
        "$schema": JSON_SCHEMA_DRAFT_07,
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}
