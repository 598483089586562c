//! App Metadata Models
//!
//! Input/output declarations, runtime parameter declarations and the wire
//! layout of a serialized manifest.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{AtType, CoreError, CoreResult};

// =============================================================================
// Input / Output Declarations
// =============================================================================

/// A declared input or output annotation type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoSpec {
    /// Annotation or document type
    #[serde(rename = "@type")]
    pub at_type: AtType,

    /// Human-readable note on how the app uses this type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether the app needs this input (outputs are always required)
    #[serde(default = "default_true")]
    pub required: bool,

    /// Expected property values, always present on the wire
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

fn default_true() -> bool {
    true
}

impl IoSpec {
    /// Creates a required spec, validating the type identifier
    pub fn new(at_type: &str) -> CoreResult<Self> {
        Ok(Self {
            at_type: AtType::parse(at_type)?,
            description: None,
            required: true,
            properties: BTreeMap::new(),
        })
    }

    /// Marks the input as optional
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns true if both specs declare the same type with the same properties
    pub fn same_as(&self, other: &IoSpec) -> bool {
        self.at_type.matches(&other.at_type) && self.properties == other.properties
    }

    /// Returns true if the given properties satisfy every expected property
    pub fn accepts_properties(&self, properties: &BTreeMap<String, Value>) -> bool {
        self.properties
            .iter()
            .all(|(key, expected)| properties.get(key) == Some(expected))
    }
}

/// One entry of the input list: a single type or a group of alternatives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputEntry {
    Single(IoSpec),
    OneOf(Vec<IoSpec>),
}

impl InputEntry {
    /// Iterates over every spec in this entry
    pub fn specs(&self) -> impl Iterator<Item = &IoSpec> {
        let specs: &[IoSpec] = match self {
            InputEntry::Single(spec) => std::slice::from_ref(spec),
            InputEntry::OneOf(group) => group,
        };
        specs.iter()
    }
}

// =============================================================================
// Parameter Declarations
// =============================================================================

/// Runtime parameter value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Boolean,
    Integer,
    #[serde(rename = "number", alias = "float")]
    Float,
    String,
    Enum,
}

impl ParameterType {
    /// Wire name of the type
    pub fn name(&self) -> &'static str {
        match self {
            ParameterType::Boolean => "boolean",
            ParameterType::Integer => "integer",
            ParameterType::Float => "number",
            ParameterType::String => "string",
            ParameterType::Enum => "enum",
        }
    }

    /// JSON-Schema type keyword
    pub fn json_type(&self) -> &'static str {
        match self {
            ParameterType::Enum => "string",
            other => other.name(),
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A declared runtime parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "type")]
    pub param_type: ParameterType,

    /// Allowed values, only for `enum`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,

    /// Default value; a parameter without one is required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default)]
    pub multivalued: bool,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            description: None,
            param_type,
            choices: None,
            default: None,
            multivalued: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Allows the parameter to be given more than once
    pub fn multivalued(mut self) -> Self {
        self.multivalued = true;
        self
    }

    /// A parameter without a default must be supplied at invocation time
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

// =============================================================================
// Wire Layout
// =============================================================================

/// Top-level keys owned by the manifest itself
pub const RESERVED_KEYS: &[&str] = &[
    "name",
    "description",
    "identifier",
    "url",
    "appVersion",
    "wrappeeVersion",
    "wrappeeLicense",
    "analyzerLicense",
    "mmifVersion",
    "input",
    "output",
    "parameters",
    "parameterSchema",
];

/// Serialized manifest; field order is the canonical key order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ManifestWire {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub identifier: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default)]
    pub app_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrappee_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrappee_license: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer_license: Option<String>,

    #[serde(default)]
    pub mmif_version: String,

    #[serde(default)]
    pub input: Vec<InputEntry>,

    #[serde(default)]
    pub output: Vec<IoSpec>,

    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,

    /// Derived on output, discarded on input
    #[serde(default)]
    pub parameter_schema: Value,

    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl ManifestWire {
    pub fn parse(json: &str) -> CoreResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CoreError::config("manifest", format!("Invalid manifest JSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_io_spec_wire_shape() {
        let spec = IoSpec::new("TimeFrame")
            .unwrap()
            .with_property("frameType", "bars");
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            value,
            json!({"@type": "TimeFrame", "required": true, "properties": {"frameType": "bars"}})
        );
    }

    #[test]
    fn test_io_spec_always_carries_properties() {
        let spec = IoSpec::new("VideoDocument").unwrap();
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            value,
            json!({"@type": "VideoDocument", "required": true, "properties": {}})
        );
    }

    #[test]
    fn test_io_spec_rejects_unknown_type() {
        assert!(IoSpec::new("Tokn").is_err());
        assert!(IoSpec::new("https://example.org/types/Shot").is_ok());
    }

    #[test]
    fn test_io_spec_same_as() {
        let a = IoSpec::new("TimeFrame").unwrap().with_property("frameType", "bars");
        let b = IoSpec::new("http://mmif.clams.ai/vocabulary/TimeFrame/v5")
            .unwrap()
            .with_property("frameType", "bars");
        let c = IoSpec::new("TimeFrame").unwrap();
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
    }

    #[test]
    fn test_input_entry_untagged() {
        let single: InputEntry =
            serde_json::from_value(json!({"@type": "VideoDocument", "required": true})).unwrap();
        assert!(matches!(single, InputEntry::Single(_)));

        let group: InputEntry = serde_json::from_value(json!([
            {"@type": "VideoDocument"},
            {"@type": "AudioDocument"}
        ]))
        .unwrap();
        assert_eq!(group.specs().count(), 2);
    }

    #[test]
    fn test_parameter_type_names() {
        let float: ParameterType = serde_json::from_str("\"float\"").unwrap();
        assert_eq!(float, ParameterType::Float);
        assert_eq!(serde_json::to_string(&float).unwrap(), "\"number\"");
        assert_eq!(ParameterType::Enum.json_type(), "string");
    }

    #[test]
    fn test_parameter_spec_wire_shape() {
        let spec = ParameterSpec::new("mode", ParameterType::Enum)
            .with_choices(["fast", "accurate"])
            .with_default("fast");
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "mode",
                "type": "enum",
                "choices": ["fast", "accurate"],
                "default": "fast",
                "multivalued": false
            })
        );
        assert!(!spec.is_required());
    }
}
