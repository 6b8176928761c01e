//! Concrete template generators
//!
//! Each generator composes one deployable document. `JiraVpc` and
//! `JiraDcWithVpc` nest other generators' output as child stacks, so a child's
//! parameters and outputs are checked against the child template itself.

mod bastion;
mod common;
mod jira_dc;
mod jira_dc_with_vpc;
mod jira_vpc;
mod vpc;

use clap::ValueEnum;

use crate::config::ComposerConfig;
use crate::template::{ComposeError, Template};

/// Available templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Generator {
    /// Multi-AZ VPC with public and private subnets
    Vpc,
    /// SSH bastion host in an existing VPC
    Bastion,
    /// VPC plus bastion, publishing the shared network exports
    JiraVpc,
    /// Jira Data Center cluster in an exported VPC
    JiraDc,
    /// Jira Data Center cluster together with a new VPC
    JiraDcWithVpc,
}

impl Generator {
    /// Command line name, also used to label templates in an export namespace
    pub fn name(&self) -> &'static str {
        match self {
            Generator::Vpc => "vpc",
            Generator::Bastion => "bastion",
            Generator::JiraVpc => "jira-vpc",
            Generator::JiraDc => "jira-dc",
            Generator::JiraDcWithVpc => "jira-dc-with-vpc",
        }
    }

    pub fn all() -> &'static [Generator] {
        &[
            Generator::Vpc,
            Generator::Bastion,
            Generator::JiraVpc,
            Generator::JiraDc,
            Generator::JiraDcWithVpc,
        ]
    }

    pub fn build(&self, config: &ComposerConfig) -> Result<Template, ComposeError> {
        tracing::debug!(generator = self.name(), "building template");
        match self {
            Generator::Vpc => vpc::build(config),
            Generator::Bastion => bastion::build(config),
            Generator::JiraVpc => jira_vpc::build(config),
            Generator::JiraDc => jira_dc::build(config),
            Generator::JiraDcWithVpc => jira_dc_with_vpc::build(config),
        }
    }
}

impl std::fmt::Display for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_match_value_enum() {
        for generator in Generator::all() {
            let parsed = Generator::from_str(generator.name(), false).expect("Should parse");
            assert_eq!(parsed, *generator);
        }
    }

    #[test]
    fn test_every_generator_validates() {
        let config = ComposerConfig::default();
        for generator in Generator::all() {
            let template = generator
                .build(&config)
                .unwrap_or_else(|e| panic!("{generator} failed to build: {e}"));
            template
                .validate()
                .unwrap_or_else(|e| panic!("{generator} failed to validate: {e}"));
        }
    }
}
