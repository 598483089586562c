//! App Runner
//!
//! The contract between an analyzer and the document accumulator. Serving
//! layers publish [`ClamsApp::metadata`] verbatim and feed inbound documents
//! through [`annotate`].

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::core::appmetadata::{PublishedAppMetadata, RefinedParameters};
use crate::core::mmif::{Mmif, ViewDraft};
use crate::core::{AppIdentity, CoreError, CoreResult};

/// An analysis app
pub trait ClamsApp {
    /// The app's published manifest
    fn metadata(&self) -> &PublishedAppMetadata;

    /// Produces the views to add to `mmif`
    fn annotate(&self, mmif: &Mmif, parameters: &RefinedParameters) -> CoreResult<Vec<ViewDraft>>;
}

/// Result of running an app on a document
#[derive(Debug)]
pub enum AnnotateOutcome {
    /// Serialized document with the app's views appended
    Annotated(String),
    /// The app failed; the serialized document carries an error view
    Failed { document: String, error: CoreError },
}

impl AnnotateOutcome {
    /// Serialized document, whether or not the app succeeded
    pub fn document(&self) -> &str {
        match self {
            AnnotateOutcome::Annotated(document) => document,
            AnnotateOutcome::Failed { document, .. } => document,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AnnotateOutcome::Failed { .. })
    }
}

fn sign(mut draft: ViewDraft, refined: &RefinedParameters) -> ViewDraft {
    if draft.parameters.is_empty() {
        draft.parameters = refined.values.clone();
    }
    for name in &refined.ignored {
        draft
            .warnings
            .push(format!("Ignored undeclared parameter '{}'", name));
    }
    draft
}

fn apply(
    mmif: &Mmif,
    app: &PublishedAppMetadata,
    identity: &AppIdentity,
    drafts: Vec<ViewDraft>,
    refined: &RefinedParameters,
) -> CoreResult<Mmif> {
    let mut working = mmif.clone();
    for draft in drafts {
        app.metadata().conforms(&draft.annotations)?;
        working.produce_view(identity, sign(draft, refined))?;
    }
    Ok(working)
}

/// Runs `app` on a serialized document with raw string parameters.
///
/// Malformed input, an incompatible format version and invalid parameters
/// are returned as errors. A failure of the app itself, or views that do not
/// fit the document, yield [`AnnotateOutcome::Failed`] with an error view
/// appended to the input document.
pub fn annotate<A: ClamsApp + ?Sized>(
    app: &A,
    input: &str,
    raw_parameters: &BTreeMap<String, Vec<String>>,
) -> CoreResult<AnnotateOutcome> {
    let mut mmif = Mmif::from_data(input)?;
    let published = app.metadata();
    let identity = published.identity();

    let format_version = mmif.format_version().unwrap_or_default().to_string();
    if !published.metadata().is_compatible_with(&format_version) {
        return Err(CoreError::Incompatible {
            app: published.metadata().mmif_version.clone(),
            document: format_version,
        });
    }

    let refined = published.metadata().refine_parameters(raw_parameters)?;

    let result = app
        .annotate(&mmif, &refined)
        .and_then(|drafts| apply(&mmif, published, identity, drafts, &refined));

    match result {
        Ok(annotated) => {
            info!(
                "{} added {} views",
                identity,
                annotated.views().len() - mmif.views().len()
            );
            Ok(AnnotateOutcome::Annotated(annotated.serialize()?))
        }
        Err(error) => {
            warn!("{} failed: {}", identity, error);
            mmif.produce_error(identity, &error.to_string(), Some(format!("{:?}", error)))?;
            Ok(AnnotateOutcome::Failed {
                document: mmif.serialize()?,
                error,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::appmetadata::{AppMetadata, IoSpec, ParameterSpec, ParameterType};
    use crate::core::mmif::Annotation;
    use crate::core::MediaKind;
    use serde_json::json;

    struct Tokenizer {
        metadata: PublishedAppMetadata,
        fail: bool,
    }

    impl Tokenizer {
        fn new(fail: bool) -> Self {
            let mut metadata =
                AppMetadata::new("Tokenizer", "http://apps.clams.ai/tokenizer", "v2");
            metadata
                .add_input(IoSpec::new("TextDocument").unwrap())
                .unwrap();
            metadata.add_output(IoSpec::new("Token").unwrap()).unwrap();
            metadata
                .add_parameter(
                    ParameterSpec::new("lowercase", ParameterType::Boolean).with_default(false),
                )
                .unwrap();
            Self {
                metadata: metadata.publish().unwrap(),
                fail,
            }
        }
    }

    impl ClamsApp for Tokenizer {
        fn metadata(&self) -> &PublishedAppMetadata {
            &self.metadata
        }

        fn annotate(
            &self,
            mmif: &Mmif,
            _parameters: &RefinedParameters,
        ) -> CoreResult<Vec<ViewDraft>> {
            if self.fail {
                return Err(CoreError::App("model not loaded".to_string()));
            }
            let drafts = mmif
                .documents_by_kind(MediaKind::Text)
                .map(|doc| {
                    ViewDraft::new(vec![Annotation::new("Token", "t1")
                        .with_property("document", doc.id.clone())
                        .with_property("source", doc.id.clone())])
                })
                .collect();
            Ok(drafts)
        }
    }

    fn input() -> String {
        let mut mmif = Mmif::new();
        mmif.prime("http://mmif.clams.ai/1.0.5").unwrap();
        mmif.add_document(MediaKind::Text, "file:///data/a.txt")
            .unwrap();
        mmif.serialize().unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), vec![v.to_string()]))
            .collect()
    }

    #[test]
    fn test_annotate_appends_signed_view() {
        let app = Tokenizer::new(false);
        let outcome = annotate(&app, &input(), &params(&[("lowercase", "yes"), ("x", "1")])).unwrap();
        assert!(!outcome.is_failed());

        let mmif = Mmif::from_data(outcome.document()).unwrap();
        let view = mmif.last_view().unwrap();
        assert_eq!(view.metadata.app.to_string(), "http://apps.clams.ai/tokenizer/v2");
        assert_eq!(view.metadata.parameters["lowercase"], json!(true));
        assert_eq!(
            view.metadata.warnings,
            vec!["Ignored undeclared parameter 'x'".to_string()]
        );
    }

    #[test]
    fn test_app_failure_yields_error_view() {
        let app = Tokenizer::new(true);
        let outcome = annotate(&app, &input(), &BTreeMap::new()).unwrap();
        match outcome {
            AnnotateOutcome::Failed { document, error } => {
                assert!(matches!(error, CoreError::App(_)));
                let mmif = Mmif::from_data(&document).unwrap();
                assert_eq!(mmif.views().len(), 1);
                assert!(mmif.views()[0].has_error());
            }
            AnnotateOutcome::Annotated(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_invalid_parameters_are_returned() {
        let app = Tokenizer::new(false);
        let err = annotate(&app, &input(), &params(&[("lowercase", "maybe")])).unwrap_err();
        assert!(matches!(err, CoreError::Parameter(_)));
    }

    #[test]
    fn test_incompatible_document_rejected() {
        let app = Tokenizer::new(false);
        let old = input().replace("1.0.5", "0.4.2");
        let err = annotate(&app, &old, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, CoreError::Incompatible { .. }));
    }

    #[test]
    fn test_malformed_input_rejected() {
        let app = Tokenizer::new(false);
        let err = annotate(&app, "{}", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, CoreError::MalformedDocument { .. }));
    }
}
