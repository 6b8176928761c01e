//! Top-level error type for the composer pipeline

use thiserror::Error;

use crate::config::ConfigError;
use crate::template::ComposeError;

#[derive(Error, Debug)]
pub enum Error {
    /// A template could not be composed, validated or parsed
    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// The configuration file could not be loaded
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Two templates of one deployment publish the same export
    #[error("{template}: {source}")]
    Namespace {
        template: String,
        #[source]
        source: ComposeError,
    },
}

impl Error {
    /// Format the error for the terminal, with any "did you mean" hint
    pub fn report(&self) -> String {
        let hint = match self {
            Error::Compose(e) | Error::Namespace { source: e, .. } => e.suggestions(),
            Error::Config(_) => None,
        };
        match hint {
            Some(names) if !names.is_empty() => {
                format!("{self}\n  help: did you mean {}?", quoted_list(names))
            }
            _ => self.to_string(),
        }
    }
}

fn quoted_list(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{n}'")).collect();
    match quoted.as_slice() {
        [single] => single.clone(),
        [rest @ .., last] => format!("{} or {last}", rest.join(", ")),
        [] => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::DeclarationKind;

    #[test]
    fn test_report_without_hint() {
        let err = Error::from(ComposeError::duplicate("VPC", DeclarationKind::Resource));
        assert_eq!(err.report(), err.to_string());
    }

    #[test]
    fn test_report_lists_suggestions() {
        let err = Error::from(ComposeError::undefined(
            "VCP",
            "Subnet",
            vec!["VPC".to_string(), "VPN".to_string()],
        ));
        assert!(err.report().ends_with("help: did you mean 'VPC' or 'VPN'?"));
    }

    #[test]
    fn test_quoted_list() {
        assert_eq!(quoted_list(&["A".to_string()]), "'A'");
        assert_eq!(
            quoted_list(&["A".to_string(), "B".to_string(), "C".to_string()]),
            "'A', 'B' or 'C'"
        );
    }
}
