//! Error types for template composition

use thiserror::Error;

use super::declaration::DeclarationKind;

/// Errors raised while composing or re-parsing a template
#[derive(Debug, Error)]
pub enum ComposeError {
    /// A logical ID is already taken in the same namespace
    #[error("duplicate logical id '{id}': already declared as a {existing}")]
    DuplicateLogicalId { id: String, existing: DeclarationKind },

    /// A reference to a declaration that does not exist
    #[error("undefined reference '{name}' in '{referenced_by}'")]
    UndefinedReference {
        name: String,
        referenced_by: String,
        suggestions: Vec<String>,
    },

    /// A condition name that was not declared before use
    #[error("undefined condition '{name}' in '{referenced_by}'")]
    UndefinedCondition {
        name: String,
        referenced_by: String,
        suggestions: Vec<String>,
    },

    /// A reference that resolves to the wrong kind of declaration
    #[error("'{name}' in '{referenced_by}' is a {found}, expected {expected}")]
    InvalidReference {
        name: String,
        referenced_by: String,
        found: DeclarationKind,
        expected: String,
    },

    /// A property value that fails a structural or declared constraint
    #[error("malformed {property} in '{owner}': {reason}")]
    MalformedPropertyValue {
        owner: String,
        property: String,
        reason: String,
    },

    /// An `Fn::ImportValue` name that cannot be an export
    #[error("invalid import name '{name}' in '{referenced_by}'")]
    InvalidImportName { name: String, referenced_by: String },

    /// Two outputs publishing the same export name
    #[error("export name '{name}' is already published by '{existing}'")]
    DuplicateExport { name: String, existing: String },

    /// Parent wiring that does not match the child stack's interface
    #[error("nested stack '{stack}': {reason}")]
    NestedStackMismatch { stack: String, reason: String },

    /// A condition expression that breaks the condition algebra's rules
    #[error("invalid condition expression in '{name}': {reason}")]
    InvalidExpression { name: String, reason: String },

    /// A serialized template that cannot be read back
    #[error("cannot parse template: {reason}")]
    Parse { reason: String },

    #[error("invalid template JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ComposeError {
    pub fn duplicate(id: impl Into<String>, existing: DeclarationKind) -> Self {
        Self::DuplicateLogicalId {
            id: id.into(),
            existing,
        }
    }

    /// Create an undefined reference error with suggestions
    pub fn undefined(
        name: impl Into<String>,
        referenced_by: impl Into<String>,
        suggestions: Vec<String>,
    ) -> Self {
        Self::UndefinedReference {
            name: name.into(),
            referenced_by: referenced_by.into(),
            suggestions,
        }
    }

    /// Create an undefined condition error with suggestions
    pub fn undefined_condition(
        name: impl Into<String>,
        referenced_by: impl Into<String>,
        suggestions: Vec<String>,
    ) -> Self {
        Self::UndefinedCondition {
            name: name.into(),
            referenced_by: referenced_by.into(),
            suggestions,
        }
    }

    pub fn invalid_reference(
        name: impl Into<String>,
        referenced_by: impl Into<String>,
        found: DeclarationKind,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidReference {
            name: name.into(),
            referenced_by: referenced_by.into(),
            found,
            expected: expected.into(),
        }
    }

    pub fn malformed(
        owner: impl Into<String>,
        property: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedPropertyValue {
            owner: owner.into(),
            property: property.into(),
            reason: reason.into(),
        }
    }

    pub fn nested(stack: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NestedStackMismatch {
            stack: stack.into(),
            reason: reason.into(),
        }
    }

    pub fn expression(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidExpression {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    /// Get suggestions if available
    pub fn suggestions(&self) -> Option<&[String]> {
        match self {
            Self::UndefinedReference { suggestions, .. } => Some(suggestions),
            Self::UndefinedCondition { suggestions, .. } => Some(suggestions),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_display() {
        let err = ComposeError::duplicate("VPC", DeclarationKind::Parameter);
        insta::assert_snapshot!(err.to_string(), @"duplicate logical id 'VPC': already declared as a parameter");
    }

    #[test]
    fn test_undefined_display() {
        let err = ComposeError::undefined("Subnt", "Bastion", vec!["Subnet".to_string()]);
        insta::assert_snapshot!(err.to_string(), @"undefined reference 'Subnt' in 'Bastion'");
        assert_eq!(err.suggestions(), Some(&["Subnet".to_string()][..]));
    }

    #[test]
    fn test_invalid_reference_display() {
        let err = ComposeError::invalid_reference(
            "KeyName",
            "Bastion",
            DeclarationKind::Parameter,
            "a resource",
        );
        insta::assert_snapshot!(err.to_string(), @"'KeyName' in 'Bastion' is a parameter, expected a resource");
    }

    #[test]
    fn test_malformed_has_no_suggestions() {
        let err = ComposeError::malformed("VPCCIDR", "Default", "does not match AllowedPattern");
        assert!(err.suggestions().is_none());
        assert!(err.to_string().contains("AllowedPattern"));
    }
}
