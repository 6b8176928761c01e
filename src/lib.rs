//! CloudFormation template composer
//!
//! Builds the Atlassian Jira deployment templates as typed declaration
//! graphs, checks every reference between declarations, and serializes the
//! result as CloudFormation JSON.
//!
//! # Example
//!
//! ```rust
//! use cfn_composer::{render, Generator};
//!
//! let json = render(Generator::Bastion).unwrap();
//! assert!(json.contains("\"AWSTemplateFormatVersion\": \"2010-09-09\""));
//! assert!(json.contains("BastionPubIp"));
//! ```

pub mod config;
pub mod error;
pub mod stacks;
pub mod template;

pub use config::{ComposerConfig, ConfigError};
pub use error::Error;
pub use stacks::Generator;
pub use template::{ComposeError, ExportNamespace, Template};

/// Render a generator's template with default configuration
pub fn render(generator: Generator) -> Result<String, Error> {
    render_with_config(generator, &ComposerConfig::default())
}

/// Render a generator's template with custom configuration
///
/// # Example
///
/// ```rust
/// use cfn_composer::{render_with_config, ComposerConfig, Generator};
///
/// let config = ComposerConfig::new().with_export_prefix("QA").with_pretty(false);
/// let json = render_with_config(Generator::JiraVpc, &config).unwrap();
/// assert!(json.contains("\"QA-VPCID\""));
/// assert!(!json.contains('\n'));
/// ```
pub fn render_with_config(generator: Generator, config: &ComposerConfig) -> Result<String, Error> {
    let template = generator.build(config)?;
    Ok(template.to_json(config.pretty)?)
}

/// Re-check a serialized template with the same rules used to compose one
///
/// Returns the parsed template so callers can inspect its declarations.
///
/// # Example
///
/// ```rust
/// use cfn_composer::validate_json;
///
/// let err = validate_json(r#"{
///     "Resources": {"Subnet": {"Type": "AWS::EC2::Subnet", "Properties": {"VpcId": {"Ref": "VCP"}}}},
///     "Outputs": {}
/// }"#).unwrap_err();
/// assert!(err.to_string().contains("undefined reference 'VCP'"));
/// ```
pub fn validate_json(text: &str) -> Result<Template, Error> {
    Ok(Template::from_json(text)?)
}

/// An `Fn::ImportValue` no template of the deployment exports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedImport {
    pub template: &'static str,
    pub name: String,
}

/// Check cross-template exports of all generators as one deployment
///
/// Every literal export must be unique across templates, and every literal
/// import should name one of them.
pub fn check_exports(config: &ComposerConfig) -> Result<Vec<UnresolvedImport>, Error> {
    let mut namespace = ExportNamespace::new();
    let mut templates = Vec::new();
    for generator in Generator::all() {
        let template = generator.build(config)?;
        namespace
            .publish(generator.name(), &template)
            .map_err(|source| Error::Namespace {
                template: generator.name().to_string(),
                source,
            })?;
        templates.push((generator.name(), template));
    }

    let mut unresolved = Vec::new();
    for (name, template) in &templates {
        for import in namespace.unresolved_imports(template) {
            tracing::warn!(template = %name, import = %import, "import has no matching export");
            unresolved.push(UnresolvedImport {
                template: name,
                name: import.to_string(),
            });
        }
    }
    Ok(unresolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_every_generator() {
        for generator in Generator::all() {
            let json = render(*generator).unwrap_or_else(|e| panic!("{generator}: {}", e.report()));
            let reparsed =
                validate_json(&json).unwrap_or_else(|e| panic!("{generator}: {}", e.report()));
            assert!(!reparsed.is_empty());
        }
    }

    #[test]
    fn test_exports_resolve_across_generators() {
        let unresolved = check_exports(&ComposerConfig::default()).expect("Should check");
        assert_eq!(unresolved, vec![]);
    }

    #[test]
    fn test_validate_rejects_garbage() {
        let result = validate_json("not json");
        assert!(matches!(result, Err(Error::Compose(ComposeError::Json(_)))));
    }

    #[test]
    fn test_compact_output() {
        let config = ComposerConfig::new().with_pretty(false);
        let json = render_with_config(Generator::Bastion, &config).expect("Should render");
        assert_eq!(json.lines().count(), 1);
    }
}
