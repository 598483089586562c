//! App Metadata
//!
//! The capability manifest an app publishes: identity and version fields,
//! declared inputs and outputs, runtime parameters and extension fields.
//!
//! Lists are checked as entries are added; identity fields are plain public
//! fields checked as a whole when the manifest is serialized or published.

mod models;
mod params;
mod schema;

pub use models::*;
pub use params::RefinedParameters;
pub use schema::{parameter_schema, JSON_SCHEMA_DRAFT_07};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::core::mmif::Annotation;
use crate::core::{
    spec_version, AppIdentity, AtType, CoreError, CoreResult, MMIF_SPEC_VERSION,
};

/// App capability manifest
#[derive(Debug, Clone, PartialEq)]
pub struct AppMetadata {
    /// Display name
    pub name: String,
    pub description: Option<String>,
    /// Whitespace-free app identifier, usually a URL
    pub identifier: String,
    /// Homepage or repository URL
    pub url: Option<String>,
    pub app_version: String,
    /// Version of the wrapped analyzer, if any
    pub wrappee_version: Option<String>,
    /// License of the wrapped analyzer
    pub wrappee_license: Option<String>,
    /// License of the app itself
    pub analyzer_license: Option<String>,
    /// MMIF specification version the app targets
    pub mmif_version: String,

    inputs: Vec<InputEntry>,
    outputs: Vec<IoSpec>,
    parameters: Vec<ParameterSpec>,
    extensions: BTreeMap<String, Value>,
}

impl AppMetadata {
    /// Creates an empty manifest targeting the crate's MMIF version
    pub fn new(
        name: impl Into<String>,
        identifier: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            identifier: identifier.into(),
            url: None,
            app_version: app_version.into(),
            wrappee_version: None,
            wrappee_license: None,
            analyzer_license: None,
            mmif_version: MMIF_SPEC_VERSION.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameters: Vec::new(),
            extensions: BTreeMap::new(),
        }
    }

    // =========================================================================
    // Builders
    // =========================================================================

    /// Appends an input declaration
    pub fn add_input(&mut self, spec: IoSpec) -> CoreResult<()> {
        self.check_new_input(&spec)?;
        debug!("Adding input {}", spec.at_type);
        self.inputs.push(InputEntry::Single(spec));
        Ok(())
    }

    /// Appends a group of alternative inputs, exactly one of which is needed.
    ///
    /// A single alternative is added as a plain input.
    pub fn add_input_oneof(&mut self, mut alternatives: Vec<IoSpec>) -> CoreResult<()> {
        if alternatives.is_empty() {
            return Err(CoreError::config(
                "input",
                "one-of group needs at least one alternative",
            ));
        }
        if alternatives.len() == 1 {
            return self.add_input(alternatives.remove(0));
        }

        for (i, spec) in alternatives.iter().enumerate() {
            if !spec.required {
                return Err(CoreError::config(
                    format!("input.{}", spec.at_type),
                    "members of a one-of group must be required",
                ));
            }
            if alternatives[..i].iter().any(|other| other.same_as(spec)) {
                return Err(CoreError::config(
                    format!("input.{}", spec.at_type),
                    "duplicate alternative in one-of group",
                ));
            }
            self.check_new_input(spec)?;
        }

        debug!("Adding one-of input group of {}", alternatives.len());
        self.inputs.push(InputEntry::OneOf(alternatives));
        Ok(())
    }

    fn check_new_input(&self, spec: &IoSpec) -> CoreResult<()> {
        if self
            .inputs
            .iter()
            .flat_map(|entry| entry.specs())
            .any(|existing| existing.same_as(spec))
        {
            return Err(CoreError::config(
                format!("input.{}", spec.at_type),
                "input already declared",
            ));
        }
        Ok(())
    }

    /// Appends an output declaration; outputs are always required
    pub fn add_output(&mut self, mut spec: IoSpec) -> CoreResult<()> {
        spec.required = true;
        if self.outputs.iter().any(|existing| existing.same_as(&spec)) {
            return Err(CoreError::config(
                format!("output.{}", spec.at_type),
                "output already declared",
            ));
        }
        debug!("Adding output {}", spec.at_type);
        self.outputs.push(spec);
        Ok(())
    }

    /// Registers a runtime parameter
    pub fn add_parameter(&mut self, spec: ParameterSpec) -> CoreResult<()> {
        if self.parameters.iter().any(|p| p.name == spec.name) {
            return Err(CoreError::config(
                format!("parameters.{}", spec.name),
                "parameter already declared",
            ));
        }
        let spec = params::check_declaration(spec)?;
        debug!("Adding parameter {} ({})", spec.name, spec.param_type);
        self.parameters.push(spec);
        Ok(())
    }

    /// Attaches an extension field
    pub fn add_more(&mut self, key: &str, value: impl Into<Value>) -> CoreResult<()> {
        let value = value.into();
        if key.trim().is_empty() {
            return Err(CoreError::config("extensions", "extension key cannot be empty"));
        }
        if RESERVED_KEYS.contains(&key) {
            return Err(CoreError::config(key, "key is reserved by the manifest"));
        }
        if self.extensions.contains_key(key) {
            return Err(CoreError::config(key, "extension already set"));
        }
        if value.is_null() || value.as_str().is_some_and(str::is_empty) {
            return Err(CoreError::config(key, "extension value cannot be empty"));
        }
        self.extensions.insert(key.to_string(), value);
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn inputs(&self) -> &[InputEntry] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[IoSpec] {
        &self.outputs
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn extensions(&self) -> &BTreeMap<String, Value> {
        &self.extensions
    }

    /// Identity used to sign views produced by this app
    pub fn identity(&self) -> CoreResult<AppIdentity> {
        AppIdentity::new(&self.identifier, &self.app_version)
    }

    /// Runtime payload schema for the declared parameters
    pub fn parameter_schema(&self) -> Value {
        schema::parameter_schema(&self.parameters)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Checks the identity and version fields of the whole manifest
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::config("name", "app name cannot be empty"));
        }
        self.identity()?;

        if spec_version(&self.mmif_version).is_none() {
            return Err(CoreError::config(
                "mmifVersion",
                format!("'{}' is not a MMIF version", self.mmif_version),
            ));
        }

        if let Some(url) = &self.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(CoreError::config(
                    "url",
                    format!("'{}' is not an http(s) URL", url),
                ));
            }
        }
        Ok(())
    }

    /// Checks an invocation payload, reporting every offending parameter
    pub fn validate_invocation(&self, values: &Map<String, Value>) -> CoreResult<()> {
        params::validate_invocation(&self.parameters, values)
    }

    /// Casts raw string parameters into typed values with defaults filled in
    pub fn refine_parameters(
        &self,
        raw: &BTreeMap<String, Vec<String>>,
    ) -> CoreResult<RefinedParameters> {
        params::refine(&self.parameters, raw)
    }

    /// Returns true if the app can read documents of the given format version
    pub fn is_compatible_with(&self, format_version: &str) -> bool {
        match (spec_version(&self.mmif_version), spec_version(format_version)) {
            (Some((app_major, app_minor, _)), Some((doc_major, doc_minor, _))) => {
                app_major == doc_major && app_minor == doc_minor
            }
            _ => false,
        }
    }

    /// Checks produced annotations against the declared outputs
    pub fn conforms(&self, annotations: &[Annotation]) -> CoreResult<()> {
        for annotation in annotations {
            let invalid = |message: String| CoreError::InvalidAnnotation {
                annotation_id: annotation.id.clone(),
                message,
            };
            let at_type =
                AtType::parse(&annotation.at_type).map_err(|e| invalid(e.to_string()))?;

            let declared: Vec<&IoSpec> = self
                .outputs
                .iter()
                .filter(|out| out.at_type.matches(&at_type))
                .collect();
            if declared.is_empty() {
                return Err(invalid(format!(
                    "type {} is not declared as an output",
                    annotation.at_type
                )));
            }
            if !declared
                .iter()
                .any(|out| out.accepts_properties(&annotation.properties))
            {
                return Err(invalid(format!(
                    "properties do not match any declared {} output",
                    annotation.at_type
                )));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    fn to_wire(&self) -> ManifestWire {
        ManifestWire {
            name: self.name.clone(),
            description: self.description.clone(),
            identifier: self.identifier.clone(),
            url: self.url.clone(),
            app_version: self.app_version.clone(),
            wrappee_version: self.wrappee_version.clone(),
            wrappee_license: self.wrappee_license.clone(),
            analyzer_license: self.analyzer_license.clone(),
            mmif_version: self.mmif_version.clone(),
            input: self.inputs.clone(),
            output: self.outputs.clone(),
            parameters: self.parameters.clone(),
            parameter_schema: self.parameter_schema(),
            extensions: self.extensions.clone(),
        }
    }

    /// Canonical JSON form of the manifest
    pub fn serialize(&self) -> CoreResult<String> {
        self.validate()?;
        Ok(serde_json::to_string(&self.to_wire())?)
    }

    /// Indented JSON form of the manifest
    pub fn serialize_pretty(&self) -> CoreResult<String> {
        self.validate()?;
        Ok(serde_json::to_string_pretty(&self.to_wire())?)
    }

    /// Rebuilds a manifest from its JSON form, re-running every builder check.
    ///
    /// Unknown top-level keys become extensions.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let wire = ManifestWire::parse(json)?;

        let mut metadata = AppMetadata::new(wire.name, wire.identifier, wire.app_version);
        metadata.description = wire.description;
        metadata.url = wire.url;
        metadata.wrappee_version = wire.wrappee_version;
        metadata.wrappee_license = wire.wrappee_license;
        metadata.analyzer_license = wire.analyzer_license;
        metadata.mmif_version = wire.mmif_version;

        for entry in wire.input {
            match entry {
                InputEntry::Single(spec) => metadata.add_input(spec)?,
                InputEntry::OneOf(group) => metadata.add_input_oneof(group)?,
            }
        }
        for spec in wire.output {
            metadata.add_output(spec)?;
        }
        for spec in wire.parameters {
            metadata.add_parameter(spec)?;
        }
        for (key, value) in wire.extensions {
            metadata.add_more(&key, value)?;
        }

        metadata.validate()?;
        Ok(metadata)
    }

    /// Freezes the manifest for publication
    pub fn publish(self) -> CoreResult<PublishedAppMetadata> {
        let json = self.serialize()?;
        let identity = self.identity()?;
        debug!("Published app metadata for {}", identity);
        Ok(PublishedAppMetadata {
            inner: Arc::new(PublishedInner {
                metadata: self,
                identity,
                json,
            }),
        })
    }
}

// =============================================================================
// Published Manifest
// =============================================================================

#[derive(Debug)]
struct PublishedInner {
    metadata: AppMetadata,
    identity: AppIdentity,
    json: String,
}

/// Immutable, cheaply clonable published manifest
#[derive(Debug, Clone)]
pub struct PublishedAppMetadata {
    inner: Arc<PublishedInner>,
}

impl PublishedAppMetadata {
    pub fn metadata(&self) -> &AppMetadata {
        &self.inner.metadata
    }

    pub fn identity(&self) -> &AppIdentity {
        &self.inner.identity
    }

    /// Canonical JSON, exposed verbatim by serving layers
    pub fn as_json(&self) -> &str {
        &self.inner.json
    }
}
