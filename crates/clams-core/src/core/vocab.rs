//! Type Vocabulary
//!
//! Well-known MMIF document/annotation types and the well-formedness rules
//! for `@type` identifiers. A bare name must come from the vocabulary; any
//! other identifier must be an absolute `http(s)` URI.

use std::sync::OnceLock;

use regex::Regex;

/// Prefix of the MMIF vocabulary URIs (e.g. `http://mmif.clams.ai/vocabulary/TimeFrame/v5`)
pub const MMIF_VOCABULARY_PREFIX: &str = "http://mmif.clams.ai/vocabulary/";

/// Prefix of the LAPPS vocabulary URIs (e.g. `http://vocab.lappsgrid.org/Token`)
pub const LAPPS_VOCABULARY_PREFIX: &str = "http://vocab.lappsgrid.org/";

/// Source document types
pub mod document_types {
    pub const DOCUMENT: &str = "Document";
    pub const VIDEO_DOCUMENT: &str = "VideoDocument";
    pub const AUDIO_DOCUMENT: &str = "AudioDocument";
    pub const IMAGE_DOCUMENT: &str = "ImageDocument";
    pub const TEXT_DOCUMENT: &str = "TextDocument";
}

/// MMIF annotation types
pub mod annotation_types {
    pub const THING: &str = "Thing";
    pub const ANNOTATION: &str = "Annotation";
    pub const REGION: &str = "Region";
    pub const TIME_POINT: &str = "TimePoint";
    pub const INTERVAL: &str = "Interval";
    pub const SPAN: &str = "Span";
    pub const TIME_FRAME: &str = "TimeFrame";
    pub const CHAPTER: &str = "Chapter";
    pub const POLYGON: &str = "Polygon";
    pub const BOUNDING_BOX: &str = "BoundingBox";
    pub const VIDEO_OBJECT: &str = "VideoObject";
    pub const RELATION: &str = "Relation";
    pub const ALIGNMENT: &str = "Alignment";
}

/// Linguistic types borrowed from the LAPPS vocabulary
pub mod lapps_types {
    pub const TOKEN: &str = "Token";
    pub const SENTENCE: &str = "Sentence";
    pub const PARAGRAPH: &str = "Paragraph";
    pub const NAMED_ENTITY: &str = "NamedEntity";
    pub const NOUN_CHUNK: &str = "NounChunk";
    pub const VERB_CHUNK: &str = "VerbChunk";
    pub const LEMMA: &str = "Lemma";
    pub const MARKABLE: &str = "Markable";
    pub const DEPENDENCY: &str = "Dependency";
    pub const DEPENDENCY_STRUCTURE: &str = "DependencyStructure";
    pub const PHRASE_STRUCTURE: &str = "PhraseStructure";
    pub const CONSTITUENT: &str = "Constituent";
    pub const SEMANTIC_TAG: &str = "SemanticTag";
}

const KNOWN_TYPES: &[&str] = &[
    document_types::DOCUMENT,
    document_types::VIDEO_DOCUMENT,
    document_types::AUDIO_DOCUMENT,
    document_types::IMAGE_DOCUMENT,
    document_types::TEXT_DOCUMENT,
    annotation_types::THING,
    annotation_types::ANNOTATION,
    annotation_types::REGION,
    annotation_types::TIME_POINT,
    annotation_types::INTERVAL,
    annotation_types::SPAN,
    annotation_types::TIME_FRAME,
    annotation_types::CHAPTER,
    annotation_types::POLYGON,
    annotation_types::BOUNDING_BOX,
    annotation_types::VIDEO_OBJECT,
    annotation_types::RELATION,
    annotation_types::ALIGNMENT,
    lapps_types::TOKEN,
    lapps_types::SENTENCE,
    lapps_types::PARAGRAPH,
    lapps_types::NAMED_ENTITY,
    lapps_types::NOUN_CHUNK,
    lapps_types::VERB_CHUNK,
    lapps_types::LEMMA,
    lapps_types::MARKABLE,
    lapps_types::DEPENDENCY,
    lapps_types::DEPENDENCY_STRUCTURE,
    lapps_types::PHRASE_STRUCTURE,
    lapps_types::CONSTITUENT,
    lapps_types::SEMANTIC_TAG,
];

fn type_uri_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https?://[A-Za-z0-9.-]+(:[0-9]+)?(/[A-Za-z0-9._~%!$&'()*+,;=:@/-]*)?$")
            .expect("Invalid regex pattern")
    })
}

/// Returns true if the bare name belongs to the known vocabulary
pub fn is_known_type(name: &str) -> bool {
    KNOWN_TYPES.contains(&name)
}

/// Returns true if the identifier is an absolute http(s) URI
pub fn is_type_uri(identifier: &str) -> bool {
    type_uri_pattern().is_match(identifier)
}

/// Checks an `@type` identifier, returning a reason when it is rejected
pub fn check_type_identifier(identifier: &str) -> Result<(), String> {
    if identifier.trim().is_empty() {
        return Err("type identifier cannot be empty".to_string());
    }
    if identifier.contains("://") {
        if is_type_uri(identifier) {
            Ok(())
        } else {
            Err(format!("'{}' is not a well-formed type URI", identifier))
        }
    } else if is_known_type(identifier) {
        Ok(())
    } else {
        Err(format!(
            "'{}' is not a known vocabulary type; use a full type URI for custom types",
            identifier
        ))
    }
}

/// Resolves an identifier to its vocabulary short name, if it has one.
///
/// `http://mmif.clams.ai/vocabulary/TimeFrame/v5` and `TimeFrame` both
/// resolve to `TimeFrame`.
pub fn short_name(identifier: &str) -> Option<&str> {
    let name = if let Some(rest) = identifier.strip_prefix(MMIF_VOCABULARY_PREFIX) {
        rest.split('/').next().unwrap_or(rest)
    } else if let Some(rest) = identifier.strip_prefix(LAPPS_VOCABULARY_PREFIX) {
        rest.split('/').next().unwrap_or(rest)
    } else {
        identifier
    };

    if is_known_type(name) {
        Some(name)
    } else {
        None
    }
}
