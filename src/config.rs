//! Composer settings loaded from TOML
//!
//! Every key is optional; a missing key keeps its default.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading or parsing a config file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid config value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Settings shared by all generators
#[derive(Debug, Clone, PartialEq)]
pub struct ComposerConfig {
    /// Default of the `QSS3BucketName` parameter
    pub bucket: String,
    /// Default of the `QSS3KeyPrefix` parameter
    pub key_prefix: String,
    /// Prefix of the cross-stack export names, e.g. `ATL` for `ATL-VPCID`
    pub export_prefix: String,
    /// Pretty-print the JSON output
    pub pretty: bool,
    /// Appended to every template description
    pub description_suffix: Option<String>,
}

/// The file format, with the defaults spelled out
pub const DEFAULT_CONFIG: &str = r#"
[assets]
bucket = "aws-quickstart"
key_prefix = "quickstart-atlassian-jira/"

[exports]
prefix = "ATL"

[output]
pretty = true
"#;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    assets: Option<TomlAssets>,
    exports: Option<TomlExports>,
    output: Option<TomlOutput>,
    metadata: Option<TomlMetadata>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlAssets {
    bucket: Option<String>,
    key_prefix: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlExports {
    prefix: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlOutput {
    pretty: Option<bool>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlMetadata {
    description_suffix: Option<String>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            bucket: "aws-quickstart".to_string(),
            key_prefix: "quickstart-atlassian-jira/".to_string(),
            export_prefix: "ATL".to_string(),
            pretty: true,
            description_suffix: None,
        }
    }
}

impl ComposerConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load config from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let parsed: TomlConfig = toml::from_str(content)?;
        let mut config = Self::default();

        if let Some(assets) = parsed.assets {
            if let Some(bucket) = assets.bucket {
                config.bucket = bucket;
            }
            if let Some(prefix) = assets.key_prefix {
                config.key_prefix = prefix;
            }
        }
        if let Some(prefix) = parsed.exports.and_then(|e| e.prefix) {
            config.export_prefix = prefix;
        }
        if let Some(pretty) = parsed.output.and_then(|o| o.pretty) {
            config.pretty = pretty;
        }
        config.description_suffix = parsed.metadata.and_then(|m| m.description_suffix);

        config.check()?;
        Ok(config)
    }

    /// Set the asset bucket
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Set the asset key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the export name prefix
    pub fn with_export_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.export_prefix = prefix.into();
        self
    }

    /// Enable or disable pretty output
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_description_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.description_suffix = Some(suffix.into());
        self
    }

    /// Full export name for a short name, e.g. `VPCID` -> `ATL-VPCID`
    pub fn export_name(&self, name: &str) -> String {
        format!("{}-{}", self.export_prefix, name)
    }

    /// Template description with the configured suffix
    pub fn describe(&self, description: &str) -> String {
        match &self.description_suffix {
            Some(suffix) => format!("{description} {suffix}"),
            None => description.to_string(),
        }
    }

    // Values end up as parameter defaults, which must satisfy their own patterns
    fn check(&self) -> Result<(), ConfigError> {
        let alnum_dash = |c: char| c.is_ascii_alphanumeric() || c == '-';
        if self.bucket.is_empty()
            || !self.bucket.chars().all(alnum_dash)
            || self.bucket.starts_with('-')
            || self.bucket.ends_with('-')
        {
            return Err(ConfigError::InvalidValue {
                key: "assets.bucket",
                reason: format!("'{}' is not a valid bucket name", self.bucket),
            });
        }
        if !self.key_prefix.chars().all(|c| alnum_dash(c) || c == '/') {
            return Err(ConfigError::InvalidValue {
                key: "assets.key_prefix",
                reason: "may contain only letters, digits, '-' and '/'".to_string(),
            });
        }
        if self.export_prefix.is_empty() || !self.export_prefix.chars().all(alnum_dash) {
            return Err(ConfigError::InvalidValue {
                key: "exports.prefix",
                reason: "may contain only letters, digits and '-'".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_text_matches_defaults() {
        let parsed = ComposerConfig::from_str(DEFAULT_CONFIG).expect("Should parse");
        assert_eq!(parsed, ComposerConfig::default());
    }

    #[test]
    fn test_empty_file_keeps_defaults() {
        let parsed = ComposerConfig::from_str("").expect("Should parse");
        assert_eq!(parsed.export_prefix, "ATL");
        assert!(parsed.pretty);
    }

    #[test]
    fn test_partial_override() {
        let toml_str = r#"
[exports]
prefix = "DEV"

[output]
pretty = false

[metadata]
description_suffix = "(staging)"
"#;
        let parsed = ComposerConfig::from_str(toml_str).expect("Should parse");
        assert_eq!(parsed.export_name("VPCID"), "DEV-VPCID");
        assert!(!parsed.pretty);
        assert_eq!(parsed.describe("Jira"), "Jira (staging)");
        assert_eq!(parsed.bucket, "aws-quickstart");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = ComposerConfig::from_str("[assets]\nregion = \"us-east-1\"\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_invalid_bucket_rejected() {
        let result = ComposerConfig::from_str("[assets]\nbucket = \"-bad-\"\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { key: "assets.bucket", .. })));
    }

    #[test]
    fn test_invalid_toml_error() {
        let invalid = "this is not valid toml {{{{";
        assert!(ComposerConfig::from_str(invalid).is_err());
    }

    #[test]
    fn test_builders() {
        let config = ComposerConfig::new()
            .with_bucket("my-assets")
            .with_export_prefix("QA")
            .with_pretty(false);
        assert_eq!(config.bucket, "my-assets");
        assert_eq!(config.export_name("PriNets"), "QA-PriNets");
        assert!(!config.pretty);
    }
}
