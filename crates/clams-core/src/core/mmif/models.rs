//! MMIF Data Models
//!
//! Source documents, views and annotations. Field order of every serialized
//! struct is the canonical key order of the document JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{AnnotationId, AppIdentity, AtType, DocumentId, MediaKind, ViewId};

// =============================================================================
// Annotation
// =============================================================================

/// A typed annotation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Type identifier, kept exactly as given
    #[serde(rename = "@type")]
    pub at_type: String,

    /// Identifier, unique within the owning view
    pub id: AnnotationId,

    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl Annotation {
    pub fn new(at_type: impl Into<String>, id: impl Into<AnnotationId>) -> Self {
        Self {
            at_type: at_type.into(),
            id: id.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Returns true if this annotation is of the given type
    pub fn is_type(&self, at_type: &AtType) -> bool {
        AtType::parse(&self.at_type)
            .map(|own| own.matches(at_type))
            .unwrap_or(false)
    }
}

// =============================================================================
// Source Document
// =============================================================================

/// A source media descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: DocumentId,

    #[serde(rename = "@type")]
    pub kind: MediaKind,

    pub location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,

    /// Free-form facts about the medium (duration, language, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

// =============================================================================
// View
// =============================================================================

/// Failure record stamped onto a view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

/// Provenance of a view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewMetadata {
    /// App that produced the view
    pub app: AppIdentity,

    pub timestamp: DateTime<Utc>,

    /// Runtime parameters the view was produced with
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,

    /// Post-hoc provenance fields
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Metadata keys owned by the view itself
pub const RESERVED_VIEW_METADATA_KEYS: &[&str] =
    &["app", "timestamp", "parameters", "warnings", "error"];

impl ViewMetadata {
    pub fn new(app: AppIdentity) -> Self {
        Self {
            app,
            timestamp: Utc::now(),
            parameters: BTreeMap::new(),
            warnings: Vec::new(),
            error: None,
            extra: BTreeMap::new(),
        }
    }
}

/// One app invocation's annotations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct View {
    pub id: ViewId,
    pub metadata: ViewMetadata,
    pub annotations: Vec<Annotation>,
}

impl View {
    pub fn annotation(&self, id: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    /// Annotations of the given type
    pub fn annotations_of_type<'a>(
        &'a self,
        at_type: &'a AtType,
    ) -> impl Iterator<Item = &'a Annotation> {
        self.annotations.iter().filter(move |a| a.is_type(at_type))
    }

    /// Returns true if the view holds at least one annotation of the type
    pub fn contains_type(&self, at_type: &AtType) -> bool {
        self.annotations_of_type(at_type).next().is_some()
    }

    /// Returns true if the producing app failed
    pub fn has_error(&self) -> bool {
        self.metadata.error.is_some()
    }
}

/// Annotations and provenance an app hands over for a new view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewDraft {
    pub annotations: Vec<Annotation>,
    pub parameters: BTreeMap<String, Value>,
    pub warnings: Vec<String>,
}

impl ViewDraft {
    pub fn new(annotations: Vec<Annotation>) -> Self {
        Self {
            annotations,
            ..Self::default()
        }
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Lifecycle of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MmifState {
    /// No source documents and no views
    Empty,
    /// At least one source document
    Seeded,
    /// At least one view
    Annotated,
}
