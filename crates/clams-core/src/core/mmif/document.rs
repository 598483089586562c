//! MMIF Document Accumulator
//!
//! A document grows through `Empty -> Seeded -> Annotated`: source media are
//! added, then views are appended one app invocation at a time. Views are
//! never removed or reordered; only the error marker and the provenance of
//! the latest view may change after a view is appended.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::models::{
    Annotation, ErrorRecord, MmifState, SourceDocument, View, ViewDraft, ViewMetadata,
    RESERVED_VIEW_METADATA_KEYS,
};
use super::references::{self, ReferenceIndex};
use super::wire;
use crate::core::settings::{MmifSettings, DEFAULT_REFERENCE_PROPERTIES};
use crate::core::{AppIdentity, AtType, CoreError, CoreResult, DocumentId, MediaKind, ViewId};

/// The running interchange document
#[derive(Debug, Clone)]
pub struct Mmif {
    format_version: Option<String>,
    metadata: BTreeMap<String, Value>,
    documents: Vec<SourceDocument>,
    views: Vec<View>,
    index: ReferenceIndex,
    next_document: u32,
    next_view: ViewId,
    reference_properties: BTreeSet<String>,
    pretty: bool,
}

impl Default for Mmif {
    fn default() -> Self {
        Self::new()
    }
}

impl Mmif {
    /// Creates an empty, unprimed document
    pub fn new() -> Self {
        Self {
            format_version: None,
            metadata: BTreeMap::new(),
            documents: Vec::new(),
            views: Vec::new(),
            index: ReferenceIndex::default(),
            next_document: 1,
            next_view: ViewId::new(0),
            reference_properties: DEFAULT_REFERENCE_PROPERTIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            pretty: false,
        }
    }

    /// Creates an empty document primed and configured from settings
    pub fn from_settings(settings: &MmifSettings) -> CoreResult<Self> {
        let mut mmif = Self::new()
            .with_reference_properties(settings.reference_properties.iter().cloned());
        mmif.pretty = settings.pretty;
        mmif.prime(&settings.format_version)?;
        Ok(mmif)
    }

    /// Replaces the set of annotation properties checked as references
    pub fn with_reference_properties<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reference_properties = keys.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn from_parts(
        format_version: Option<String>,
        metadata: BTreeMap<String, Value>,
        documents: Vec<SourceDocument>,
        views: Vec<View>,
    ) -> Self {
        let next_view = views
            .iter()
            .filter_map(|v| v.id.next())
            .max()
            .unwrap_or(ViewId::new(0));
        let index = ReferenceIndex::build(&views);
        Self {
            format_version,
            metadata,
            documents,
            views,
            index,
            next_view,
            ..Self::new()
        }
    }

    /// Copy of this document with only the first `keep` views
    pub(crate) fn truncated(&self, keep: usize) -> Self {
        let views = self.views[..keep.min(self.views.len())].to_vec();
        let mut mmif = Self::from_parts(
            self.format_version.clone(),
            self.metadata.clone(),
            self.documents.clone(),
            views,
        );
        mmif.reference_properties = self.reference_properties.clone();
        mmif.pretty = self.pretty;
        mmif
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Sets the format version; repeating the same value is a no-op
    pub fn prime(&mut self, format_version: &str) -> CoreResult<()> {
        let requested = format_version.trim();
        if requested.is_empty() {
            return Err(CoreError::config("metadata.mmif", "format version cannot be empty"));
        }
        match &self.format_version {
            Some(current) if current == requested => Ok(()),
            Some(current) => Err(CoreError::AlreadyPrimed {
                current: current.clone(),
                requested: requested.to_string(),
            }),
            None => {
                info!("Primed document with format version {}", requested);
                self.format_version = Some(requested.to_string());
                Ok(())
            }
        }
    }

    /// Adds a source document and returns its new id
    pub fn add_document(&mut self, kind: MediaKind, location: &str) -> CoreResult<DocumentId> {
        self.add_document_with_mime(kind, location, None)
    }

    /// Adds a source document with a MIME type
    pub fn add_document_with_mime(
        &mut self,
        kind: MediaKind,
        location: &str,
        mime: Option<String>,
    ) -> CoreResult<DocumentId> {
        if location.trim().is_empty() {
            return Err(CoreError::config("documents.location", "location cannot be empty"));
        }
        if self
            .documents
            .iter()
            .any(|d| d.kind == kind && d.location == location)
        {
            return Err(CoreError::DuplicateLocation {
                kind: kind.to_string(),
                location: location.to_string(),
            });
        }

        let id = self.fresh_document_id();
        debug!("Adding {} {} at {}", kind, id, location);
        self.documents.push(SourceDocument {
            id: id.clone(),
            kind,
            location: location.to_string(),
            mime,
            metadata: BTreeMap::new(),
        });
        Ok(id)
    }

    /// Sets a metadata field on one source document
    pub fn add_document_metadata(
        &mut self,
        document_id: &str,
        key: &str,
        value: impl Into<Value>,
    ) -> CoreResult<()> {
        if key.trim().is_empty() {
            return Err(CoreError::config("documents.metadata", "key cannot be empty"));
        }
        let document = self
            .documents
            .iter_mut()
            .find(|d| d.id == document_id)
            .ok_or_else(|| CoreError::DocumentNotFound(document_id.to_string()))?;
        document.metadata.insert(key.to_string(), value.into());
        Ok(())
    }

    fn fresh_document_id(&mut self) -> DocumentId {
        loop {
            let candidate = format!("d{}", self.next_document);
            self.next_document += 1;
            if !self.documents.iter().any(|d| d.id == candidate) {
                return candidate;
            }
        }
    }

    /// Sets a top-level metadata field other than the format version
    pub fn set_metadata(&mut self, key: &str, value: impl Into<Value>) -> CoreResult<()> {
        if key == "mmif" {
            return Err(CoreError::config(key, "use prime() to set the format version"));
        }
        self.metadata.insert(key.to_string(), value.into());
        Ok(())
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Appends a view of annotations and returns its id.
    ///
    /// Nothing is appended when an annotation or reference is invalid.
    pub fn produce(
        &mut self,
        app: &AppIdentity,
        annotations: Vec<Annotation>,
    ) -> CoreResult<ViewId> {
        self.produce_view(app, ViewDraft::new(annotations))
    }

    /// Appends a view with its runtime parameters and warnings
    pub fn produce_view(&mut self, app: &AppIdentity, draft: ViewDraft) -> CoreResult<ViewId> {
        let candidate = self.next_view;

        let checked = references::check_annotations(&draft.annotations).and_then(|_| {
            let document_ids: HashSet<&str> =
                self.documents.iter().map(|d| d.id.as_str()).collect();
            references::check_references(
                &self.index,
                &document_ids,
                candidate,
                &draft.annotations,
                &self.reference_properties,
            )
        });
        if let Err(e) = checked {
            warn!("Rejected view from {}: {}", app, e);
            return Err(e);
        }

        let mut metadata = ViewMetadata::new(app.clone());
        metadata.parameters = draft.parameters;
        metadata.warnings = draft.warnings;

        self.append_view(View {
            id: candidate,
            metadata,
            annotations: draft.annotations,
        })
    }

    /// Appends an empty view recording that an app failed
    pub fn produce_error(
        &mut self,
        app: &AppIdentity,
        message: &str,
        detail: Option<String>,
    ) -> CoreResult<ViewId> {
        let mut metadata = ViewMetadata::new(app.clone());
        metadata.error = Some(ErrorRecord {
            message: message.to_string(),
            stack_trace: detail,
        });
        warn!("Recording failure of {}: {}", app, message);
        let id = self.next_view;
        self.append_view(View {
            id,
            metadata,
            annotations: Vec::new(),
        })
    }

    fn append_view(&mut self, view: View) -> CoreResult<ViewId> {
        let id = view.id;
        let next = id.next().ok_or(CoreError::ViewIdsExhausted(id))?;
        self.index.insert_view(&view);
        info!(
            "Produced view {} by {} with {} annotations",
            id,
            view.metadata.app,
            view.annotations.len()
        );
        self.views.push(view);
        self.next_view = next;
        Ok(id)
    }

    /// Re-attributes the latest view and merges extra provenance fields
    pub fn change_metadata(
        &mut self,
        app: &AppIdentity,
        fields: BTreeMap<String, Value>,
    ) -> CoreResult<()> {
        if let Some(key) = fields
            .keys()
            .find(|k| RESERVED_VIEW_METADATA_KEYS.contains(&k.as_str()))
        {
            return Err(CoreError::config(
                format!("metadata.{}", key),
                "key is reserved by the view",
            ));
        }
        let view = self.views.last_mut().ok_or(CoreError::NoViewProduced)?;
        debug!("Changing metadata of view {}", view.id);
        view.metadata.app = app.clone();
        view.metadata.extra.extend(fields);
        Ok(())
    }

    /// Stamps the error marker onto an existing view
    pub fn mark_error(
        &mut self,
        view_id: ViewId,
        message: &str,
        detail: Option<String>,
    ) -> CoreResult<()> {
        let view = self
            .views
            .iter_mut()
            .find(|v| v.id == view_id)
            .ok_or(CoreError::ViewNotFound(view_id))?;
        view.metadata.error = Some(ErrorRecord {
            message: message.to_string(),
            stack_trace: detail,
        });
        view.metadata.timestamp = Utc::now();
        warn!("Marked view {} as failed: {}", view_id, message);
        Ok(())
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn format_version(&self) -> Option<&str> {
        self.format_version.as_deref()
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    pub fn state(&self) -> MmifState {
        if !self.views.is_empty() {
            MmifState::Annotated
        } else if !self.documents.is_empty() {
            MmifState::Seeded
        } else {
            MmifState::Empty
        }
    }

    pub fn documents(&self) -> &[SourceDocument] {
        &self.documents
    }

    pub fn document(&self, id: &str) -> Option<&SourceDocument> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn documents_by_kind(&self, kind: MediaKind) -> impl Iterator<Item = &SourceDocument> {
        self.documents.iter().filter(move |d| d.kind == kind)
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn view(&self, id: ViewId) -> Option<&View> {
        self.views.iter().find(|v| v.id == id)
    }

    pub fn last_view(&self) -> Option<&View> {
        self.views.last()
    }

    /// Views produced by the app with the given identifier, any version
    pub fn views_by_app<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a View> {
        self.views.iter().filter(move |v| v.metadata.app.name() == name)
    }

    /// Views holding annotations of the given type, oldest first
    pub fn views_containing<'a>(&'a self, at_type: &'a AtType) -> impl Iterator<Item = &'a View> {
        self.views.iter().filter(move |v| v.contains_type(at_type))
    }

    /// Latest view holding annotations of the given type
    pub fn view_containing(&self, at_type: &AtType) -> Option<&View> {
        self.views.iter().rev().find(|v| v.contains_type(at_type))
    }

    /// Resolves a `(view_id, annotation_id)` pair
    pub fn annotation(&self, view_id: ViewId, annotation_id: &str) -> Option<&Annotation> {
        self.view(view_id)?.annotation(annotation_id)
    }

    /// Id the next produced view will get
    pub fn next_view_id(&self) -> ViewId {
        self.next_view
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    fn encode(&self, pretty: bool) -> CoreResult<String> {
        let format_version = self.format_version.as_deref().ok_or(CoreError::NotPrimed)?;
        wire::encode(
            wire::Parts {
                format_version,
                metadata: &self.metadata,
                documents: &self.documents,
                views: &self.views,
            },
            pretty,
        )
    }

    /// Canonical JSON (indented when configured so)
    pub fn serialize(&self) -> CoreResult<String> {
        self.encode(self.pretty)
    }

    /// Indented JSON
    pub fn serialize_pretty(&self) -> CoreResult<String> {
        self.encode(true)
    }

    /// Rebuilds a document from its serialized form
    pub fn from_data(json: &str) -> CoreResult<Self> {
        let decoded = wire::decode(json)?;
        let mmif = Self::from_parts(
            Some(decoded.format_version),
            decoded.metadata,
            decoded.documents,
            decoded.views,
        );
        debug!(
            "Read document with {} documents and {} views",
            mmif.documents.len(),
            mmif.views.len()
        );
        Ok(mmif)
    }
}
