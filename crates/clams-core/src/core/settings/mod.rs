//! SDK Settings
//!
//! JSON configuration for documents produced by this crate and for the
//! logging setup installed by [`crate::init_logging`]:
//! - Every field has a default, so partial files are accepted
//! - Bad values are repaired by [`SdkSettings::normalize`] instead of failing
//!
//! Nothing here reads environment variables; hosts pass settings explicitly.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{default_format_version, spec_version, CoreResult};

/// Settings schema version
pub const SETTINGS_VERSION: u32 = 1;

/// Annotation property keys that hold references to other annotations
pub const DEFAULT_REFERENCE_PROPERTIES: &[&str] =
    &["representatives", "source", "target", "targets"];

/// SDK settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SdkSettings {
    /// Schema version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Document settings
    #[serde(default)]
    pub mmif: MmifSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for SdkSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            mmif: MmifSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl SdkSettings {
    /// Parses settings from JSON, failing on malformed input
    pub fn parse(json: &str) -> CoreResult<Self> {
        let mut settings: SdkSettings = serde_json::from_str(json)?;
        settings.normalize();
        Ok(settings)
    }

    /// Loads settings from a file, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!("Settings file not found at {:?}, using defaults", path);
            return Self::default();
        }

        let result = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read settings file: {}", e))
            .and_then(|content| {
                Self::parse(&content).map_err(|e| format!("Failed to parse settings file: {}", e))
            });

        match result {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Writes normalized settings as pretty JSON
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        let mut normalized = self.clone();
        normalized.normalize();
        let json = serde_json::to_string_pretty(&normalized)?;
        fs::write(path, json)?;
        info!("Settings saved to {:?}", path);
        Ok(())
    }

    /// Repairs out-of-range values in place.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;
        self.mmif.normalize();
        self.logging.normalize();
    }
}

// =============================================================================
// Document Settings
// =============================================================================

/// Settings applied to new documents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MmifSettings {
    /// Format version new documents are primed with
    #[serde(default = "default_format_version")]
    pub format_version: String,

    /// Annotation property keys checked as references
    #[serde(default = "default_reference_properties")]
    pub reference_properties: Vec<String>,

    /// Pretty-print serialized documents
    #[serde(default)]
    pub pretty: bool,
}

fn default_reference_properties() -> Vec<String> {
    DEFAULT_REFERENCE_PROPERTIES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for MmifSettings {
    fn default() -> Self {
        Self {
            format_version: default_format_version(),
            reference_properties: default_reference_properties(),
            pretty: false,
        }
    }
}

impl MmifSettings {
    pub fn normalize(&mut self) {
        self.format_version = self.format_version.trim().to_string();
        if spec_version(&self.format_version).is_none() {
            self.format_version = default_format_version();
        }

        let mut keys: Vec<String> = self
            .reference_properties
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        keys.sort();
        keys.dedup();
        if keys.is_empty() {
            keys = default_reference_properties();
        }
        self.reference_properties = keys;
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

/// Settings for the tracing subscriber
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Emit ANSI colors
    #[serde(default)]
    pub ansi: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            ansi: false,
        }
    }
}

impl LoggingSettings {
    pub fn normalize(&mut self) {
        let filter = self.filter.trim();
        if filter.is_empty() || tracing_subscriber::EnvFilter::try_new(filter).is_err() {
            self.filter = default_filter();
        } else {
            self.filter = filter.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> TempDir {
        TempDir::new().unwrap()
    }

    #[test]
    fn test_default_settings() {
        let settings = SdkSettings::default();
        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.mmif.format_version, "http://mmif.clams.ai/1.0.5");
        assert_eq!(settings.mmif.reference_properties.len(), 4);
        assert_eq!(settings.logging.filter, "info");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = SdkSettings::parse(r#"{ "mmif": { "pretty": true } }"#).unwrap();
        assert!(settings.mmif.pretty);
        assert_eq!(settings.mmif.format_version, default_format_version());
        assert_eq!(settings.logging, LoggingSettings::default());
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        assert!(SdkSettings::parse("{ not json").is_err());
    }

    #[test]
    fn test_normalize_repairs_values() {
        let mut settings = SdkSettings::default();
        settings.mmif.format_version = "  ".to_string();
        settings.mmif.reference_properties = vec![" ".to_string()];
        settings.logging.filter = "clams_core=loud".to_string();
        settings.normalize();

        assert_eq!(settings.mmif.format_version, default_format_version());
        assert_eq!(
            settings.mmif.reference_properties,
            default_reference_properties()
        );
        assert_eq!(settings.logging.filter, "info");
    }

    #[test]
    fn test_normalize_dedups_reference_properties() {
        let mut settings = MmifSettings {
            reference_properties: vec![
                "target".to_string(),
                "source".to_string(),
                "target".to_string(),
            ],
            ..MmifSettings::default()
        };
        settings.normalize();
        assert_eq!(settings.reference_properties, vec!["source", "target"]);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = setup();
        let settings = SdkSettings::load(&dir.path().join("missing.json"));
        assert_eq!(settings, SdkSettings::default());
    }

    #[test]
    fn test_load_corrupt_file_returns_defaults() {
        let dir = setup();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(SdkSettings::load(&path), SdkSettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = setup();
        let path = dir.path().join("settings.json");

        let mut settings = SdkSettings::default();
        settings.mmif.pretty = true;
        settings.logging.filter = "clams_core=debug".to_string();
        settings.save(&path).unwrap();

        let loaded = SdkSettings::load(&path);
        assert!(loaded.mmif.pretty);
        assert_eq!(loaded.logging.filter, "clams_core=debug");
    }
}
