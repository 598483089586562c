//! Runtime Parameter Checking
//!
//! Type checks for declared defaults and invocation payloads, plus casting of
//! raw string values (as carried by a query string) into typed values.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::models::{ParameterSpec, ParameterType};
use crate::core::{CoreError, CoreResult, ParameterViolation, ParameterViolations, ViolationKind};

/// Typed parameter values after casting and default fill-in
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefinedParameters {
    /// Value for every declared parameter
    pub values: BTreeMap<String, Value>,
    /// Names that were given but are not declared
    pub ignored: Vec<String>,
}

/// JSON kind of a value, used in mismatch reports
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn scalar_violation(spec: &ParameterSpec, value: &Value) -> Option<ViolationKind> {
    let type_ok = match spec.param_type {
        ParameterType::Boolean => value.is_boolean(),
        ParameterType::Integer => value.is_i64() || value.is_u64(),
        ParameterType::Float => value.is_number(),
        ParameterType::String | ParameterType::Enum => value.is_string(),
    };
    if !type_ok {
        return Some(ViolationKind::TypeMismatch {
            expected: spec.param_type.name().to_string(),
            found: json_kind(value).to_string(),
        });
    }

    if let (Some(choices), Some(text)) = (&spec.choices, value.as_str()) {
        if !choices.iter().any(|c| c == text) {
            return Some(ViolationKind::NotInChoices {
                value: text.to_string(),
                choices: choices.clone(),
            });
        }
    }
    None
}

/// Checks one value against its declaration, recording every problem
pub(crate) fn check_value(spec: &ParameterSpec, value: &Value, violations: &mut ParameterViolations) {
    match value {
        Value::Array(items) if spec.multivalued => {
            for item in items {
                if let Some(kind) = scalar_violation(spec, item) {
                    violations.push(ParameterViolation::new(&spec.name, kind));
                }
            }
        }
        Value::Array(_) => {
            violations.push(ParameterViolation::new(&spec.name, ViolationKind::NotMultivalued));
        }
        scalar => {
            if let Some(kind) = scalar_violation(spec, scalar) {
                violations.push(ParameterViolation::new(&spec.name, kind));
            }
        }
    }
}

/// Checks a declaration on its own and normalizes its default.
///
/// A scalar default of a multivalued parameter becomes a one-element list.
pub(crate) fn check_declaration(mut spec: ParameterSpec) -> CoreResult<ParameterSpec> {
    let field = format!("parameters.{}", spec.name);

    if spec.name.trim().is_empty() {
        return Err(CoreError::config("parameters", "parameter name cannot be empty"));
    }
    if spec.name.chars().any(char::is_whitespace) {
        return Err(CoreError::config(field, "parameter name must not contain whitespace"));
    }

    match (&spec.param_type, &spec.choices) {
        (ParameterType::Enum, None) => {
            return Err(CoreError::config(field, "enum parameter needs choices"));
        }
        (ParameterType::Enum, Some(choices)) => {
            if choices.is_empty() {
                return Err(CoreError::config(field, "enum parameter needs choices"));
            }
            let mut seen = std::collections::HashSet::new();
            if let Some(dup) = choices.iter().find(|c| !seen.insert(c.as_str())) {
                return Err(CoreError::config(field, format!("duplicate choice '{}'", dup)));
            }
        }
        (other, Some(_)) => {
            return Err(CoreError::config(
                field,
                format!("choices are only allowed for enum parameters, not {}", other),
            ));
        }
        (_, None) => {}
    }

    if spec.multivalued {
        if let Some(default) = spec.default.take() {
            spec.default = Some(match default {
                Value::Array(items) => Value::Array(items),
                scalar => Value::Array(vec![scalar]),
            });
        }
    }

    if let Some(default) = &spec.default {
        if default.is_null() {
            return Err(CoreError::config(
                format!("{}.default", field),
                "default cannot be null; omit it to make the parameter required",
            ));
        }
        let mut violations = ParameterViolations::new();
        check_value(&spec, default, &mut violations);
        if !violations.is_empty() {
            return Err(CoreError::config(
                format!("{}.default", field),
                violations.to_string(),
            ));
        }
    }

    Ok(spec)
}

/// Checks an invocation payload, collecting every violation
pub(crate) fn validate_invocation(
    parameters: &[ParameterSpec],
    values: &Map<String, Value>,
) -> CoreResult<()> {
    let mut violations = ParameterViolations::new();

    for name in values.keys() {
        if !parameters.iter().any(|p| &p.name == name) {
            violations.push(ParameterViolation::new(name, ViolationKind::Unknown));
        }
    }

    for spec in parameters {
        match values.get(&spec.name) {
            Some(value) => check_value(spec, value, &mut violations),
            None if spec.is_required() => {
                violations.push(ParameterViolation::new(&spec.name, ViolationKind::MissingRequired));
            }
            None => {}
        }
    }

    violations.into_result()
}

fn cast_raw(spec: &ParameterSpec, raw: &str) -> Result<Value, ViolationKind> {
    let mismatch = || ViolationKind::TypeMismatch {
        expected: spec.param_type.name().to_string(),
        found: format!("'{}'", raw),
    };
    let trimmed = raw.trim();

    match spec.param_type {
        ParameterType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "1" => Ok(Value::Bool(true)),
            "false" | "f" | "no" | "0" => Ok(Value::Bool(false)),
            _ => Err(mismatch()),
        },
        ParameterType::Integer => trimmed.parse::<i64>().map(Value::from).map_err(|_| mismatch()),
        ParameterType::Float => trimmed
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(mismatch),
        ParameterType::String | ParameterType::Enum => Ok(Value::String(raw.to_string())),
    }
}

/// Casts raw string values, fills defaults and ignores undeclared names
pub(crate) fn refine(
    parameters: &[ParameterSpec],
    raw: &BTreeMap<String, Vec<String>>,
) -> CoreResult<RefinedParameters> {
    let mut refined = RefinedParameters::default();
    let mut violations = ParameterViolations::new();

    for name in raw.keys() {
        if !parameters.iter().any(|p| &p.name == name) {
            warn!("Ignoring undeclared parameter '{}'", name);
            refined.ignored.push(name.clone());
        }
    }

    for spec in parameters {
        let given = raw.get(&spec.name).filter(|values| spec.multivalued || !values.is_empty());

        let Some(given) = given else {
            match &spec.default {
                Some(default) => {
                    refined.values.insert(spec.name.clone(), default.clone());
                }
                None => violations.push(ParameterViolation::new(
                    &spec.name,
                    ViolationKind::MissingRequired,
                )),
            }
            continue;
        };

        if !spec.multivalued && given.len() > 1 {
            violations.push(ParameterViolation::new(&spec.name, ViolationKind::NotMultivalued));
            continue;
        }

        let mut cast = Vec::with_capacity(given.len());
        let mut failed = false;
        for raw_value in given {
            match cast_raw(spec, raw_value) {
                Ok(value) => cast.push(value),
                Err(kind) => {
                    violations.push(ParameterViolation::new(&spec.name, kind));
                    failed = true;
                }
            }
        }
        if failed {
            continue;
        }

        let value = if spec.multivalued {
            Value::Array(cast)
        } else {
            cast.into_iter().next().unwrap_or(Value::Null)
        };
        check_value(spec, &value, &mut violations);
        refined.values.insert(spec.name.clone(), value);
    }

    violations.into_result()?;
    debug!(
        "Refined {} parameters ({} ignored)",
        refined.values.len(),
        refined.ignored.len()
    );
    Ok(refined)
}
