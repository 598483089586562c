//! CLAMS Error Definitions
//!
//! Defines error types used throughout the crate.

use std::fmt;

use thiserror::Error;

use super::{AnnotationId, ViewId};

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Manifest Errors
    // =========================================================================
    #[error("Configuration error in '{field}': {message}")]
    Configuration { field: String, message: String },

    #[error("Invalid parameters: {0}")]
    Parameter(ParameterViolations),

    #[error("App metadata is not compatible with MMIF {document}: app targets {app}")]
    Incompatible { app: String, document: String },

    // =========================================================================
    // Document Errors
    // =========================================================================
    #[error("Duplicate {kind} document at location: {location}")]
    DuplicateLocation { kind: String, location: String },

    #[error("Document already primed with {current}, cannot re-prime with {requested}")]
    AlreadyPrimed { current: String, requested: String },

    #[error("Document has not been primed with a format version")]
    NotPrimed,

    #[error(
        "Dangling reference in view {view_id}: annotation '{annotation_id}' property '{property}' points to '{target}'"
    )]
    DanglingReference {
        view_id: ViewId,
        annotation_id: AnnotationId,
        property: String,
        target: String,
    },

    #[error("Invalid annotation '{annotation_id}': {message}")]
    InvalidAnnotation {
        annotation_id: AnnotationId,
        message: String,
    },

    #[error("Malformed document at '{path}': {message}")]
    MalformedDocument { path: String, message: String },

    #[error("No view has been produced yet")]
    NoViewProduced,

    #[error("View not found: {0}")]
    ViewNotFound(ViewId),

    #[error("No view id left after {0}")]
    ViewIdsExhausted(ViewId),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    // =========================================================================
    // Workflow Errors
    // =========================================================================
    #[error("Invalid document spec at argument {index}: {message}")]
    InvalidDocumentSpec { index: usize, message: String },

    #[error("App failed: {0}")]
    App(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Shorthand for a configuration error on a named field
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a malformed-document error at a field path
    pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::MalformedDocument {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Parameter violations carried by this error, if any
    pub fn violations(&self) -> Option<&ParameterViolations> {
        match self {
            CoreError::Parameter(violations) => Some(violations),
            _ => None,
        }
    }
}

// =============================================================================
// Parameter Violations
// =============================================================================

/// What is wrong with one runtime parameter
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    /// The name is not declared by the manifest
    Unknown,
    /// The value does not have the declared type
    TypeMismatch { expected: String, found: String },
    /// The value is not one of the declared choices
    NotInChoices { value: String, choices: Vec<String> },
    /// A parameter without a default was not given
    MissingRequired,
    /// A list was given for a parameter that takes one value
    NotMultivalued,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Unknown => f.write_str("unknown parameter"),
            ViolationKind::TypeMismatch { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            ViolationKind::NotInChoices { value, choices } => {
                write!(f, "'{}' is not one of [{}]", value, choices.join(", "))
            }
            ViolationKind::MissingRequired => f.write_str("required parameter is missing"),
            ViolationKind::NotMultivalued => f.write_str("parameter takes a single value"),
        }
    }
}

/// A single offending runtime parameter
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterViolation {
    pub name: String,
    pub kind: ViolationKind,
}

impl ParameterViolation {
    pub fn new(name: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl fmt::Display for ParameterViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.kind)
    }
}

/// Every violation found in one invocation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParameterViolations(Vec<ParameterViolation>);

impl ParameterViolations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: ParameterViolation) {
        self.0.push(violation);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterViolation> {
        self.0.iter()
    }

    /// Returns the violations reported for one parameter name
    pub fn for_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ParameterViolation> {
        self.0.iter().filter(move |v| v.name == name)
    }

    /// Converts to `Ok(())` when empty, otherwise a `Parameter` error
    pub fn into_result(self) -> CoreResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Parameter(self))
        }
    }
}

impl fmt::Display for ParameterViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("; "))
    }
}

impl IntoIterator for ParameterViolations {
    type Item = ParameterViolation;
    type IntoIter = std::vec::IntoIter<ParameterViolation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violations_display_names_every_parameter() {
        let mut violations = ParameterViolations::new();
        violations.push(ParameterViolation::new(
            "speed",
            ViolationKind::TypeMismatch {
                expected: "number".to_string(),
                found: "string".to_string(),
            },
        ));
        violations.push(ParameterViolation::new("lang", ViolationKind::MissingRequired));

        let err = violations.into_result().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("speed: expected number, found string"));
        assert!(message.contains("lang: required parameter is missing"));
        assert_eq!(err.violations().map(|v| v.len()), Some(2));
    }

    #[test]
    fn test_empty_violations_are_ok() {
        assert!(ParameterViolations::new().into_result().is_ok());
    }

    #[test]
    fn test_dangling_reference_message() {
        let err = CoreError::DanglingReference {
            view_id: ViewId::new(1),
            annotation_id: "a1".to_string(),
            property: "target".to_string(),
            target: "v_5:tf1".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("v_1"));
        assert!(message.contains("v_5:tf1"));
    }
}
