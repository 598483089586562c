//! Workflow Sources
//!
//! A workflow source seeds new documents at the start of a workflow. Every
//! document it produces starts from the same common source documents and
//! top-level metadata.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::core::mmif::Mmif;
use crate::core::settings::MmifSettings;
use crate::core::{CoreError, CoreResult, DocumentId, MediaKind};

/// A source document to add to new documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSeed {
    pub kind: MediaKind,
    pub location: String,
    pub mime: Option<String>,
}

impl SourceSeed {
    pub fn new(kind: MediaKind, location: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

/// Produces seeded documents sharing common sources and metadata
#[derive(Debug, Clone)]
pub struct WorkflowSource {
    settings: MmifSettings,
    common_documents: Vec<SourceSeed>,
    common_metadata: BTreeMap<String, Value>,
    working: Mmif,
}

impl WorkflowSource {
    /// Creates a source; fails if the common documents cannot seed a document
    pub fn new(
        settings: MmifSettings,
        common_documents: Vec<SourceSeed>,
        common_metadata: BTreeMap<String, Value>,
    ) -> CoreResult<Self> {
        let working = Self::fresh(&settings, &common_documents, &common_metadata)?;
        Ok(Self {
            settings,
            common_documents,
            common_metadata,
            working,
        })
    }

    fn fresh(
        settings: &MmifSettings,
        documents: &[SourceSeed],
        metadata: &BTreeMap<String, Value>,
    ) -> CoreResult<Mmif> {
        let mut mmif = Mmif::from_settings(settings)?;
        for seed in documents {
            mmif.add_document_with_mime(seed.kind, &seed.location, seed.mime.clone())?;
        }
        for (key, value) in metadata {
            mmif.set_metadata(key, value.clone())?;
        }
        Ok(mmif)
    }

    /// Adds a document to the working document
    pub fn add_document(&mut self, seed: SourceSeed) -> CoreResult<DocumentId> {
        self.working
            .add_document_with_mime(seed.kind, &seed.location, seed.mime)
    }

    /// Adds or replaces a top-level metadata entry of the working document
    pub fn change_metadata(&mut self, key: &str, value: impl Into<Value>) -> CoreResult<()> {
        self.working.set_metadata(key, value)
    }

    /// Discards the working document and starts a fresh one
    pub fn prime(&mut self) -> CoreResult<()> {
        self.working = Self::fresh(
            &self.settings,
            &self.common_documents,
            &self.common_metadata,
        )?;
        Ok(())
    }

    /// Returns the working document and starts a fresh one
    pub fn produce(&mut self) -> CoreResult<Mmif> {
        let fresh = Self::fresh(
            &self.settings,
            &self.common_documents,
            &self.common_metadata,
        )?;
        let produced = std::mem::replace(&mut self.working, fresh);
        debug!(
            "Produced source document with {} documents",
            produced.documents().len()
        );
        Ok(produced)
    }

    /// Adds the given documents and metadata, then produces
    pub fn produce_from(
        &mut self,
        documents: Vec<SourceSeed>,
        metadata: BTreeMap<String, Value>,
    ) -> CoreResult<Mmif> {
        for seed in documents {
            if let Err(e) = self.add_document(seed) {
                self.prime()?;
                return Err(e);
            }
        }
        for (key, value) in metadata {
            if let Err(e) = self.change_metadata(&key, value) {
                self.prime()?;
                return Err(e);
            }
        }
        self.produce()
    }
}

impl Default for WorkflowSource {
    fn default() -> Self {
        let settings = MmifSettings::default();
        let working = Mmif::from_settings(&settings).unwrap_or_default();
        Self {
            settings,
            common_documents: Vec::new(),
            common_metadata: BTreeMap::new(),
            working,
        }
    }
}

// =============================================================================
// Document Specs
// =============================================================================

/// Splits `scheme://rest` into its scheme and remainder
fn split_scheme(location: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = location.split_once("://")?;
    let valid = !scheme.is_empty()
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some((scheme, rest))
}

/// Parses one `kind[/subtype]:location` argument into a seed
fn parse_spec(
    index: usize,
    arg: &str,
    prefix: Option<&str>,
    default_scheme: &str,
) -> CoreResult<SourceSeed> {
    let invalid = |message: String| CoreError::InvalidDocumentSpec { index, message };

    let (mime, location) = arg
        .split_once(':')
        .ok_or_else(|| invalid("expected <type>:<location>".to_string()))?;
    let primary = mime.split('/').next().unwrap_or(mime);
    let kind = match primary {
        "video" | "audio" | "text" | "image" => MediaKind::from_label(primary),
        _ => None,
    }
    .ok_or_else(|| invalid(format!("'{}' is not video, audio, text, image or a MIME type", mime)))?;
    if location.is_empty() {
        return Err(invalid("location cannot be empty".to_string()));
    }

    let (scheme, path) = split_scheme(location).unwrap_or((default_scheme, location));
    let path = if scheme == "file" {
        let absolute = path.starts_with('/');
        match prefix {
            Some(_) if absolute => {
                return Err(invalid(format!(
                    "file location must be relative when a prefix is used; given \"{}\"",
                    path
                )))
            }
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), path),
            None if !absolute => {
                return Err(invalid(format!(
                    "file location must be an absolute path, or a prefix must be used; given \"{}\"",
                    path
                )))
            }
            None => path.to_string(),
        }
    } else {
        path.to_string()
    };

    let mut seed = SourceSeed::new(kind, format!("{}://{}", scheme, path));
    if mime.contains('/') {
        seed.mime = Some(mime.to_string());
    }
    Ok(seed)
}

/// Builds a source document from `kind[/subtype]:location` arguments.
///
/// Kinds are `video`, `audio`, `text`, `image` or a MIME type of those.
/// Locations without a scheme get `scheme`. File paths must be absolute
/// unless an absolute `prefix` is given, in which case they must be relative.
pub fn generate_source(specs: &[&str], prefix: Option<&str>, scheme: &str) -> CoreResult<Mmif> {
    if let Some(prefix) = prefix {
        if !prefix.starts_with('/') {
            return Err(CoreError::config(
                "prefix",
                format!("prefix must be an absolute path; given \"{}\"", prefix),
            ));
        }
    }

    let mut source = WorkflowSource::new(MmifSettings::default(), Vec::new(), BTreeMap::new())?;
    for (index, arg) in specs.iter().enumerate() {
        let arg = arg.trim();
        if arg.is_empty() {
            continue;
        }
        let seed = parse_spec(index, arg, prefix, scheme)?;
        source.add_document(seed)?;
    }
    source.produce()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mmif::MmifState;
    use serde_json::json;

    #[test]
    fn test_produce_reprimes() {
        let mut metadata = BTreeMap::new();
        metadata.insert("collection".to_string(), json!("news"));
        let mut source = WorkflowSource::new(
            MmifSettings::default(),
            vec![SourceSeed::new(MediaKind::Video, "file:///data/intro.mp4")],
            metadata,
        )
        .unwrap();

        source
            .add_document(SourceSeed::new(MediaKind::Audio, "file:///data/a.wav"))
            .unwrap();
        let first = source.produce().unwrap();
        let second = source.produce().unwrap();

        assert_eq!(first.documents().len(), 2);
        assert_eq!(second.documents().len(), 1);
        assert_eq!(second.metadata()["collection"], "news");
        assert_eq!(first.state(), MmifState::Seeded);
    }

    #[test]
    fn test_duplicate_common_documents_rejected() {
        let seed = SourceSeed::new(MediaKind::Video, "file:///data/a.mp4");
        let result = WorkflowSource::new(
            MmifSettings::default(),
            vec![seed.clone(), seed],
            BTreeMap::new(),
        );
        assert!(matches!(result, Err(CoreError::DuplicateLocation { .. })));
    }

    #[test]
    fn test_produce_from_discards_on_failure() {
        let mut source = WorkflowSource::default();
        let seed = SourceSeed::new(MediaKind::Text, "file:///a.txt");
        assert!(source
            .produce_from(vec![seed.clone(), seed.clone()], BTreeMap::new())
            .is_err());

        let mmif = source.produce_from(vec![seed], BTreeMap::new()).unwrap();
        assert_eq!(mmif.documents().len(), 1);
    }

    #[test]
    fn test_change_metadata_rejects_format_version() {
        let mut source = WorkflowSource::default();
        assert!(source.change_metadata("mmif", "0.1.0").is_err());
        source.change_metadata("batch", 7).unwrap();
        assert_eq!(source.produce().unwrap().metadata()["batch"], 7);
    }

    // =========================================================================
    // Document Spec Tests
    // =========================================================================

    #[test]
    fn test_generate_source() {
        let mmif = generate_source(
            &["video/mp4:/data/a.mp4", "text:file:///data/a.txt", "  "],
            None,
            "file",
        )
        .unwrap();
        let docs = mmif.documents();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "d1");
        assert_eq!(docs[0].kind, MediaKind::Video);
        assert_eq!(docs[0].location, "file:///data/a.mp4");
        assert_eq!(docs[0].mime.as_deref(), Some("video/mp4"));
        assert_eq!(docs[1].location, "file:///data/a.txt");
        assert_eq!(docs[1].mime, None);
    }

    #[test]
    fn test_generate_source_with_prefix() {
        let mmif = generate_source(&["audio:clips/a.wav"], Some("/archive/"), "file").unwrap();
        assert_eq!(mmif.documents()[0].location, "file:///archive/clips/a.wav");

        let err = generate_source(&["audio:/abs/a.wav"], Some("/archive"), "file").unwrap_err();
        assert!(matches!(err, CoreError::InvalidDocumentSpec { index: 0, .. }));

        assert!(generate_source(&["audio:a.wav"], Some("archive"), "file").is_err());
    }

    #[test]
    fn test_generate_source_errors_name_index() {
        let err = generate_source(&["video:/a.mp4", "pdf:/b.pdf"], None, "file").unwrap_err();
        assert!(matches!(err, CoreError::InvalidDocumentSpec { index: 1, .. }));

        let err = generate_source(&["video:relative.mp4"], None, "file").unwrap_err();
        assert!(err.to_string().contains("argument 0"));
    }

    #[test]
    fn test_generate_source_other_scheme() {
        let mmif = generate_source(&["image:bucket/frame.png"], None, "s3").unwrap();
        assert_eq!(mmif.documents()[0].location, "s3://bucket/frame.png");

        let mmif = generate_source(&["video:https://cdn.example.org/a.mp4"], None, "file").unwrap();
        assert_eq!(mmif.documents()[0].location, "https://cdn.example.org/a.mp4");
    }
}
