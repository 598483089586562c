//! CLAMS Core Type Definitions
//!
//! Identifier types shared by the manifest model and the MMIF accumulator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::vocab;
use super::{CoreError, CoreResult};

// =============================================================================
// Versions
// =============================================================================

/// MMIF specification version targeted by this crate
pub const MMIF_SPEC_VERSION: &str = "1.0.5";

/// Prefix of MMIF format version URIs
pub const MMIF_URI_PREFIX: &str = "http://mmif.clams.ai/";

/// Default `metadata.mmif` value for new documents
pub fn default_format_version() -> String {
    format!("{}{}", MMIF_URI_PREFIX, MMIF_SPEC_VERSION)
}

/// Extracts `(major, minor, patch)` from a version string or version URI.
///
/// Accepts `1.0.5`, `v1.0.5`, `1.0.5.dev1` and `http://mmif.clams.ai/1.0.5`.
pub fn spec_version(version: &str) -> Option<(u32, u32, u32)> {
    let last = version.trim().trim_end_matches('/').rsplit('/').next()?;
    let last = last.strip_prefix('v').unwrap_or(last);

    let mut parts = last.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch_raw = parts.next()?;
    let digits: String = patch_raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    let patch = digits.parse().ok()?;
    Some((major, minor, patch))
}

// =============================================================================
// ID Types
// =============================================================================

/// Source document identifier (`d1`, `d2`, ...)
pub type DocumentId = String;

/// Annotation identifier, unique within its view
pub type AnnotationId = String;

/// View identifier, assigned in merge order (`v_0`, `v_1`, ...)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ViewId(u32);

impl ViewId {
    /// Creates a view id from its ordinal
    pub const fn new(ordinal: u32) -> Self {
        Self(ordinal)
    }

    /// Returns the ordinal
    pub fn ordinal(&self) -> u32 {
        self.0
    }

    /// Returns the id that follows this one, if there is one
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v_{}", self.0)
    }
}

impl FromStr for ViewId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("v_")
            .or_else(|| s.strip_prefix('v'))
            .ok_or_else(|| format!("view id '{}' must look like v_<number>", s))?;
        digits
            .parse::<u32>()
            .map(Self)
            .map_err(|_| format!("view id '{}' must look like v_<number>", s))
    }
}

impl TryFrom<String> for ViewId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ViewId> for String {
    fn from(id: ViewId) -> Self {
        id.to_string()
    }
}

// =============================================================================
// Annotation Type
// =============================================================================

/// A validated `@type` identifier (vocabulary name or type URI)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AtType(String);

impl AtType {
    /// Parses and validates a type identifier
    pub fn parse(identifier: &str) -> CoreResult<Self> {
        vocab::check_type_identifier(identifier).map_err(|message| CoreError::Configuration {
            field: "@type".to_string(),
            message,
        })?;
        Ok(Self(identifier.to_string()))
    }

    /// Returns the identifier exactly as given
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the vocabulary short name, if any
    pub fn short_name(&self) -> Option<&str> {
        vocab::short_name(&self.0)
    }

    /// Returns true if both identifiers name the same type
    pub fn matches(&self, other: &AtType) -> bool {
        if self.0 == other.0 {
            return true;
        }
        matches!((self.short_name(), other.short_name()), (Some(a), Some(b)) if a == b)
    }
}

impl fmt::Display for AtType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AtType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        vocab::check_type_identifier(&value)?;
        Ok(Self(value))
    }
}

impl From<AtType> for String {
    fn from(at_type: AtType) -> Self {
        at_type.0
    }
}

// =============================================================================
// App Identity
// =============================================================================

/// Identity of the app that produced a view: `<identifier>/<version>`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppIdentity {
    name: String,
    version: String,
}

impl AppIdentity {
    /// Creates an identity, checking both parts
    pub fn new(name: &str, version: &str) -> CoreResult<Self> {
        Self::check_name(name).map_err(|message| CoreError::Configuration {
            field: "identifier".to_string(),
            message,
        })?;
        Self::check_version(version).map_err(|message| CoreError::Configuration {
            field: "appVersion".to_string(),
            message,
        })?;
        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    /// Parses the `<name>/<version>` wire form
    pub fn parse(value: &str) -> Result<Self, String> {
        let (name, version) = value
            .rsplit_once('/')
            .ok_or_else(|| format!("app identity '{}' must look like <name>/<version>", value))?;
        Self::check_name(name)?;
        Self::check_version(version)?;
        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    /// App identifier part
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version part
    pub fn version(&self) -> &str {
        &self.version
    }

    fn check_name(name: &str) -> Result<(), String> {
        if name.is_empty() {
            return Err("app identifier cannot be empty".to_string());
        }
        if name.chars().any(char::is_whitespace) {
            return Err(format!("app identifier '{}' must not contain whitespace", name));
        }
        Ok(())
    }

    fn check_version(version: &str) -> Result<(), String> {
        if version.is_empty() {
            return Err("app version cannot be empty".to_string());
        }
        if version.contains('/') || version.chars().any(char::is_whitespace) {
            return Err(format!(
                "app version '{}' must not contain '/' or whitespace",
                version
            ));
        }
        Ok(())
    }
}

impl fmt::Display for AppIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

impl TryFrom<String> for AppIdentity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AppIdentity> for String {
    fn from(identity: AppIdentity) -> Self {
        identity.to_string()
    }
}

// =============================================================================
// Media Kind
// =============================================================================

/// Kind of source media a document points to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MediaKind {
    Audio,
    Video,
    Text,
    Image,
}

impl MediaKind {
    /// Returns all media kinds
    pub fn all() -> Vec<MediaKind> {
        vec![
            MediaKind::Audio,
            MediaKind::Video,
            MediaKind::Text,
            MediaKind::Image,
        ]
    }

    /// Document `@type` for this kind
    pub fn at_type(&self) -> &'static str {
        match self {
            MediaKind::Audio => vocab::document_types::AUDIO_DOCUMENT,
            MediaKind::Video => vocab::document_types::VIDEO_DOCUMENT,
            MediaKind::Text => vocab::document_types::TEXT_DOCUMENT,
            MediaKind::Image => vocab::document_types::IMAGE_DOCUMENT,
        }
    }

    /// Resolves a kind from a short label (`video`), a MIME type
    /// (`video/mp4`), a document type name or a document type URI.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        let primary = label.split('/').next().unwrap_or(label);
        match primary.to_ascii_lowercase().as_str() {
            "audio" => return Some(MediaKind::Audio),
            "video" => return Some(MediaKind::Video),
            "text" => return Some(MediaKind::Text),
            "image" => return Some(MediaKind::Image),
            _ => {}
        }
        let name = vocab::short_name(label)?;
        MediaKind::all().into_iter().find(|kind| kind.at_type() == name)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.at_type())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("unknown media kind '{}'", s))
    }
}

impl TryFrom<String> for MediaKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MediaKind> for String {
    fn from(kind: MediaKind) -> Self {
        kind.at_type().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_id_display_and_parse() {
        let id = ViewId::new(3);
        assert_eq!(id.to_string(), "v_3");
        assert_eq!("v_3".parse::<ViewId>().unwrap(), id);
        assert_eq!("v3".parse::<ViewId>().unwrap(), id);
        assert!("view3".parse::<ViewId>().is_err());
        assert!("v_x".parse::<ViewId>().is_err());
        assert_eq!(id.next(), Some(ViewId::new(4)));
    }

    #[test]
    fn test_view_id_next_at_maximum() {
        assert_eq!(ViewId::new(u32::MAX).next(), None);
        assert_eq!(ViewId::new(u32::MAX - 1).next(), Some(ViewId::new(u32::MAX)));
    }

    #[test]
    fn test_view_id_serde() {
        let json = serde_json::to_string(&ViewId::new(7)).unwrap();
        assert_eq!(json, "\"v_7\"");
        let back: ViewId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ordinal(), 7);
    }

    #[test]
    fn test_at_type_parse() {
        assert!(AtType::parse("Token").is_ok());
        let err = AtType::parse("NotAType").unwrap_err();
        assert!(err.to_string().contains("@type"));
    }

    #[test]
    fn test_at_type_matches_vocabulary_uri() {
        let short = AtType::parse("TimeFrame").unwrap();
        let long = AtType::parse("http://mmif.clams.ai/vocabulary/TimeFrame/v5").unwrap();
        let other = AtType::parse("TimePoint").unwrap();
        assert!(short.matches(&long));
        assert!(!short.matches(&other));
    }

    #[test]
    fn test_app_identity_parse() {
        let id = AppIdentity::parse("http://apps.clams.ai/whisper-wrapper/v1.2").unwrap();
        assert_eq!(id.name(), "http://apps.clams.ai/whisper-wrapper");
        assert_eq!(id.version(), "v1.2");
        assert_eq!(id.to_string(), "http://apps.clams.ai/whisper-wrapper/v1.2");
    }

    #[test]
    fn test_app_identity_rejects_bad_shapes() {
        assert!(AppIdentity::parse("no-version").is_err());
        assert!(AppIdentity::parse("/v1").is_err());
        assert!(AppIdentity::parse("app/").is_err());
        assert!(AppIdentity::parse("my app/v1").is_err());
        assert!(AppIdentity::new("app", "1/2").is_err());
    }

    #[test]
    fn test_media_kind_labels() {
        assert_eq!(MediaKind::from_label("video"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_label("audio/mpeg"), Some(MediaKind::Audio));
        assert_eq!(MediaKind::from_label("TextDocument"), Some(MediaKind::Text));
        assert_eq!(
            MediaKind::from_label("http://mmif.clams.ai/vocabulary/ImageDocument/v1"),
            Some(MediaKind::Image)
        );
        assert_eq!(MediaKind::from_label("pdf"), None);
    }

    #[test]
    fn test_media_kind_serde() {
        let json = serde_json::to_string(&MediaKind::Video).unwrap();
        assert_eq!(json, "\"VideoDocument\"");
        let back: MediaKind = serde_json::from_str("\"video\"").unwrap();
        assert_eq!(back, MediaKind::Video);
    }

    #[test]
    fn test_spec_version() {
        assert_eq!(spec_version("1.0.5"), Some((1, 0, 5)));
        assert_eq!(spec_version("http://mmif.clams.ai/1.0.5"), Some((1, 0, 5)));
        assert_eq!(spec_version("v0.4.3.dev1"), Some((0, 4, 3)));
        assert_eq!(spec_version("latest"), None);
        assert!(default_format_version().ends_with(MMIF_SPEC_VERSION));
    }
}
