//! MMIF Wire Format
//!
//! Decoding checks every field and reports failures with their JSON path
//! (`views[2].metadata.app`); no partially decoded document is returned.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::models::{Annotation, ErrorRecord, SourceDocument, View, ViewMetadata};
use crate::core::{vocab, AppIdentity, CoreError, CoreResult, MediaKind, ViewId};

// =============================================================================
// Encoding
// =============================================================================

#[derive(Serialize)]
struct MetadataOut<'a> {
    mmif: &'a str,
    #[serde(flatten)]
    extra: &'a BTreeMap<String, Value>,
}

#[derive(Serialize)]
struct DocumentOut<'a> {
    metadata: MetadataOut<'a>,
    documents: &'a [SourceDocument],
    views: &'a [View],
}

/// Borrowed parts of a document to encode
pub(crate) struct Parts<'a> {
    pub format_version: &'a str,
    pub metadata: &'a BTreeMap<String, Value>,
    pub documents: &'a [SourceDocument],
    pub views: &'a [View],
}

pub(crate) fn encode(parts: Parts<'_>, pretty: bool) -> CoreResult<String> {
    let out = DocumentOut {
        metadata: MetadataOut {
            mmif: parts.format_version,
            extra: parts.metadata,
        },
        documents: parts.documents,
        views: parts.views,
    };
    let json = if pretty {
        serde_json::to_string_pretty(&out)?
    } else {
        serde_json::to_string(&out)?
    };
    Ok(json)
}

// =============================================================================
// Decoding
// =============================================================================

#[derive(Deserialize)]
struct RawDocument {
    metadata: Option<RawMetadata>,
    #[serde(default)]
    documents: Vec<RawSource>,
    #[serde(default)]
    views: Vec<RawView>,
}

#[derive(Deserialize)]
struct RawMetadata {
    mmif: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct RawSource {
    id: Option<String>,
    #[serde(rename = "@type")]
    at_type: Option<String>,
    location: Option<String>,
    mime: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct RawView {
    id: Option<String>,
    metadata: Option<RawViewMetadata>,
    #[serde(default)]
    annotations: Vec<RawAnnotation>,
}

#[derive(Deserialize)]
struct RawViewMetadata {
    app: Option<String>,
    timestamp: Option<String>,
    #[serde(default)]
    parameters: BTreeMap<String, Value>,
    #[serde(default)]
    warnings: Vec<String>,
    error: Option<ErrorRecord>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct RawAnnotation {
    #[serde(rename = "@type")]
    at_type: Option<String>,
    id: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
}

/// Checked contents of a serialized document
pub(crate) struct Decoded {
    pub format_version: String,
    pub metadata: BTreeMap<String, Value>,
    pub documents: Vec<SourceDocument>,
    pub views: Vec<View>,
}

fn required(value: Option<String>, path: impl FnOnce() -> String) -> CoreResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => Err(CoreError::malformed(path(), "value cannot be empty")),
        None => Err(CoreError::malformed(path(), "field is missing")),
    }
}

pub(crate) fn decode(json: &str) -> CoreResult<Decoded> {
    let raw: RawDocument =
        serde_json::from_str(json).map_err(|e| CoreError::malformed("$", e.to_string()))?;

    let metadata = raw
        .metadata
        .ok_or_else(|| CoreError::malformed("metadata", "field is missing"))?;
    let format_version = required(metadata.mmif, || "metadata.mmif".to_string())?;

    let mut document_ids = HashSet::new();
    let mut documents = Vec::with_capacity(raw.documents.len());
    for (i, source) in raw.documents.into_iter().enumerate() {
        let id = required(source.id, || format!("documents[{}].id", i))?;
        if !document_ids.insert(id.clone()) {
            return Err(CoreError::malformed(
                format!("documents[{}].id", i),
                format!("duplicate document id '{}'", id),
            ));
        }
        let at_type = required(source.at_type, || format!("documents[{}].@type", i))?;
        let kind = at_type
            .parse::<MediaKind>()
            .map_err(|e| CoreError::malformed(format!("documents[{}].@type", i), e))?;
        let location = required(source.location, || format!("documents[{}].location", i))?;
        documents.push(SourceDocument {
            id,
            kind,
            location,
            mime: source.mime,
            metadata: source.metadata,
        });
    }

    let mut view_ids = HashSet::new();
    let mut views = Vec::with_capacity(raw.views.len());
    for (i, raw_view) in raw.views.into_iter().enumerate() {
        views.push(decode_view(i, raw_view, &mut view_ids)?);
    }

    Ok(Decoded {
        format_version,
        metadata: metadata.extra,
        documents,
        views,
    })
}

fn decode_view(i: usize, raw: RawView, seen: &mut HashSet<ViewId>) -> CoreResult<View> {
    let path = |field: &str| format!("views[{}].{}", i, field);

    let id_text = required(raw.id, || path("id"))?;
    let id: ViewId = id_text
        .parse()
        .map_err(|e: String| CoreError::malformed(path("id"), e))?;
    if id.next().is_none() {
        return Err(CoreError::malformed(
            path("id"),
            format!("view id '{}' leaves no room for later views", id),
        ));
    }
    if !seen.insert(id) {
        return Err(CoreError::malformed(
            path("id"),
            format!("duplicate view id '{}'", id),
        ));
    }

    let metadata = raw
        .metadata
        .ok_or_else(|| CoreError::malformed(path("metadata"), "field is missing"))?;
    let app_text = required(metadata.app, || path("metadata.app"))?;
    let app = AppIdentity::parse(&app_text)
        .map_err(|e| CoreError::malformed(path("metadata.app"), e))?;
    let timestamp_text = required(metadata.timestamp, || path("metadata.timestamp"))?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp_text)
        .map_err(|e| CoreError::malformed(path("metadata.timestamp"), e.to_string()))?
        .with_timezone(&Utc);

    let mut annotation_ids = HashSet::new();
    let mut annotations = Vec::with_capacity(raw.annotations.len());
    for (j, raw_annotation) in raw.annotations.into_iter().enumerate() {
        let annotation_path = |field: &str| format!("views[{}].annotations[{}].{}", i, j, field);

        let at_type = required(raw_annotation.at_type, || annotation_path("@type"))?;
        vocab::check_type_identifier(&at_type)
            .map_err(|e| CoreError::malformed(annotation_path("@type"), e))?;
        let annotation_id = required(raw_annotation.id, || annotation_path("id"))?;
        if !annotation_ids.insert(annotation_id.clone()) {
            return Err(CoreError::malformed(
                annotation_path("id"),
                format!("duplicate annotation id '{}' in view {}", annotation_id, id),
            ));
        }
        annotations.push(Annotation {
            at_type,
            id: annotation_id,
            properties: raw_annotation.properties,
        });
    }

    Ok(View {
        id,
        metadata: ViewMetadata {
            app,
            timestamp,
            parameters: metadata.parameters,
            warnings: metadata.warnings,
            error: metadata.error,
            extra: metadata.extra,
        },
        annotations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_value(value: Value) -> CoreResult<Decoded> {
        decode(&value.to_string())
    }

    fn malformed_path(result: CoreResult<Decoded>) -> String {
        match result {
            Err(CoreError::MalformedDocument { path, .. }) => path,
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected a malformed document"),
        }
    }

    #[test]
    fn test_decode_minimal() {
        let decoded = decode_value(json!({"metadata": {"mmif": "http://mmif.clams.ai/1.0.5"}}))
            .unwrap();
        assert_eq!(decoded.format_version, "http://mmif.clams.ai/1.0.5");
        assert!(decoded.documents.is_empty());
        assert!(decoded.views.is_empty());
    }

    #[test]
    fn test_missing_format_version() {
        let path = malformed_path(decode_value(json!({"metadata": {}})));
        assert_eq!(path, "metadata.mmif");
        let path = malformed_path(decode_value(json!({"documents": []})));
        assert_eq!(path, "metadata");
    }

    #[test]
    fn test_bad_app_identity() {
        let path = malformed_path(decode_value(json!({
            "metadata": {"mmif": "1.0.5"},
            "views": [{
                "id": "v_0",
                "metadata": {"app": "no-version", "timestamp": "2024-01-01T00:00:00Z"},
                "annotations": []
            }]
        })));
        assert_eq!(path, "views[0].metadata.app");
    }

    #[test]
    fn test_duplicate_annotation_id() {
        let path = malformed_path(decode_value(json!({
            "metadata": {"mmif": "1.0.5"},
            "views": [{
                "id": "v_0",
                "metadata": {"app": "app/v1", "timestamp": "2024-01-01T00:00:00Z"},
                "annotations": [
                    {"@type": "Token", "id": "t1", "properties": {}},
                    {"@type": "Token", "id": "t1", "properties": {}}
                ]
            }]
        })));
        assert_eq!(path, "views[0].annotations[1].id");
    }

    #[test]
    fn test_duplicate_view_and_document_ids() {
        let view = json!({
            "id": "v_0",
            "metadata": {"app": "app/v1", "timestamp": "2024-01-01T00:00:00Z"},
            "annotations": []
        });
        let path = malformed_path(decode_value(json!({
            "metadata": {"mmif": "1.0.5"},
            "views": [view.clone(), view]
        })));
        assert_eq!(path, "views[1].id");

        let path = malformed_path(decode_value(json!({
            "metadata": {"mmif": "1.0.5"},
            "documents": [
                {"id": "d1", "@type": "VideoDocument", "location": "file:///a.mp4"},
                {"id": "d1", "@type": "AudioDocument", "location": "file:///a.wav"}
            ]
        })));
        assert_eq!(path, "documents[1].id");
    }

    #[test]
    fn test_view_id_at_maximum_rejected() {
        let path = malformed_path(decode_value(json!({
            "metadata": {"mmif": "1.0.5"},
            "views": [{
                "id": format!("v_{}", u32::MAX),
                "metadata": {"app": "app/v1", "timestamp": "2024-01-01T00:00:00Z"},
                "annotations": []
            }]
        })));
        assert_eq!(path, "views[0].id");
    }

    #[test]
    fn test_not_json() {
        assert_eq!(malformed_path(decode("{ nope")), "$");
    }
}
