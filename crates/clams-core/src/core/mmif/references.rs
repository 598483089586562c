//! Cross-Reference Integrity
//!
//! Annotation properties named in the reference set hold references to other
//! annotations, either qualified (`v_2:tf1`) or bare (`tf1`). A bare reference
//! resolves within the same view or to a top-level source document id. A
//! qualified reference must name the same view or an earlier one.

use std::collections::{BTreeSet, HashSet};

use serde_json::Value;

use super::models::{Annotation, View};
use crate::core::{vocab, AnnotationId, CoreError, CoreResult, ViewId};

/// Every `(view_id, annotation_id)` pair of the views already merged
#[derive(Debug, Clone, Default)]
pub(crate) struct ReferenceIndex {
    pairs: HashSet<(ViewId, AnnotationId)>,
}

impl ReferenceIndex {
    pub fn build(views: &[View]) -> Self {
        let mut index = Self::default();
        for view in views {
            index.insert_view(view);
        }
        index
    }

    pub fn insert_view(&mut self, view: &View) {
        for annotation in &view.annotations {
            self.pairs.insert((view.id, annotation.id.clone()));
        }
    }

    pub fn contains(&self, view_id: ViewId, annotation_id: &str) -> bool {
        self.pairs.contains(&(view_id, annotation_id.to_string()))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }
}

/// A parsed reference target
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Reference<'a> {
    Qualified(ViewId, &'a str),
    Local(&'a str),
    /// Has a `:` but no view id prefix
    Unresolvable,
}

pub(crate) fn parse_reference(target: &str) -> Reference<'_> {
    match target.split_once(':') {
        None => Reference::Local(target),
        Some((prefix, id)) => match prefix.parse::<ViewId>() {
            Ok(view_id) if !id.is_empty() => Reference::Qualified(view_id, id),
            _ => Reference::Unresolvable,
        },
    }
}

/// Extracts reference targets of one property value
fn targets<'a>(annotation: &Annotation, key: &str, value: &'a Value) -> CoreResult<Vec<&'a str>> {
    let invalid = || CoreError::InvalidAnnotation {
        annotation_id: annotation.id.clone(),
        message: format!("property '{}' must hold an id or a list of ids", key),
    };
    match value {
        Value::String(target) => Ok(vec![target.as_str()]),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

/// Checks annotation ids and types of a candidate view
pub(crate) fn check_annotations(annotations: &[Annotation]) -> CoreResult<()> {
    let mut seen = HashSet::new();
    for annotation in annotations {
        let invalid = |message: String| CoreError::InvalidAnnotation {
            annotation_id: annotation.id.clone(),
            message,
        };
        if annotation.id.trim().is_empty() {
            return Err(invalid("annotation id cannot be empty".to_string()));
        }
        if annotation.id.contains(':') {
            return Err(invalid("annotation id must not contain ':'".to_string()));
        }
        if !seen.insert(annotation.id.as_str()) {
            return Err(invalid("duplicate annotation id in view".to_string()));
        }
        vocab::check_type_identifier(&annotation.at_type).map_err(invalid)?;
    }
    Ok(())
}

/// Resolves every reference of a candidate view, failing on the first
/// target that does not exist yet.
pub(crate) fn check_references(
    index: &ReferenceIndex,
    document_ids: &HashSet<&str>,
    candidate: ViewId,
    annotations: &[Annotation],
    reference_keys: &BTreeSet<String>,
) -> CoreResult<()> {
    let local: HashSet<&str> = annotations.iter().map(|a| a.id.as_str()).collect();

    for annotation in annotations {
        for key in reference_keys {
            let Some(value) = annotation.properties.get(key) else {
                continue;
            };
            for target in targets(annotation, key, value)? {
                let resolved = match parse_reference(target) {
                    Reference::Qualified(view_id, id) if view_id == candidate => local.contains(id),
                    Reference::Qualified(view_id, id) => index.contains(view_id, id),
                    Reference::Local(id) => local.contains(id) || document_ids.contains(id),
                    Reference::Unresolvable => false,
                };
                if !resolved {
                    return Err(CoreError::DanglingReference {
                        view_id: candidate,
                        annotation_id: annotation.id.clone(),
                        property: key.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mmif::ViewMetadata;
    use crate::core::AppIdentity;

    fn keys() -> BTreeSet<String> {
        ["source", "target", "targets"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn view(ordinal: u32, ids: &[&str]) -> View {
        View {
            id: ViewId::new(ordinal),
            metadata: ViewMetadata::new(AppIdentity::parse("app/v1").unwrap()),
            annotations: ids.iter().map(|id| Annotation::new("Token", *id)).collect(),
        }
    }

    #[test]
    fn test_parse_reference() {
        assert_eq!(
            parse_reference("v_2:tf1"),
            Reference::Qualified(ViewId::new(2), "tf1")
        );
        assert_eq!(parse_reference("tf1"), Reference::Local("tf1"));
        assert_eq!(parse_reference("d1:tf1"), Reference::Unresolvable);
        assert_eq!(parse_reference("v_2:"), Reference::Unresolvable);
    }

    #[test]
    fn test_index_contains() {
        let index = ReferenceIndex::build(&[view(0, &["t1", "t2"]), view(1, &["t1"])]);
        assert_eq!(index.len(), 3);
        assert!(index.contains(ViewId::new(1), "t1"));
        assert!(!index.contains(ViewId::new(1), "t2"));
    }

    #[test]
    fn test_references_resolve() {
        let index = ReferenceIndex::build(&[view(0, &["t1"])]);
        let docs: HashSet<&str> = ["d1"].into_iter().collect();
        let annotations = vec![
            Annotation::new("Alignment", "a1")
                .with_property("source", "v_0:t1")
                .with_property("target", "s1"),
            Annotation::new("Sentence", "s1").with_property("targets", vec!["d1", "v_1:a1"]),
        ];
        check_references(&index, &docs, ViewId::new(1), &annotations, &keys()).unwrap();
    }

    #[test]
    fn test_forward_reference_is_dangling() {
        let index = ReferenceIndex::build(&[view(0, &["t1"])]);
        let annotations =
            vec![Annotation::new("Alignment", "a1").with_property("source", "v_5:x")];
        let err = check_references(
            &index,
            &HashSet::new(),
            ViewId::new(1),
            &annotations,
            &keys(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::DanglingReference { ref target, .. } if target == "v_5:x"
        ));
    }

    #[test]
    fn test_non_string_reference_rejected() {
        let annotations = vec![Annotation::new("Alignment", "a1").with_property("target", 3)];
        let err = check_references(
            &ReferenceIndex::default(),
            &HashSet::new(),
            ViewId::new(0),
            &annotations,
            &keys(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidAnnotation { .. }));
    }

    #[test]
    fn test_check_annotations() {
        assert!(check_annotations(&[Annotation::new("Token", "t1")]).is_ok());
        assert!(check_annotations(&[Annotation::new("Token", "")]).is_err());
        assert!(check_annotations(&[Annotation::new("Token", "v_0:t1")]).is_err());
        assert!(check_annotations(&[Annotation::new("Tokn", "t1")]).is_err());
        assert!(check_annotations(&[
            Annotation::new("Token", "t1"),
            Annotation::new("Token", "t1")
        ])
        .is_err());
    }
}
