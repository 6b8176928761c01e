//! Cross-document export namespace

use indexmap::IndexMap;

use super::document::Template;
use super::error::ComposeError;

/// Export names published by a set of templates
///
/// Exports are global within an account and region, so two templates may
/// not publish the same name.
#[derive(Debug, Clone, Default)]
pub struct ExportNamespace {
    /// Export name to `template/output` that publishes it
    published: IndexMap<String, String>,
}

impl ExportNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every literal export of a template
    pub fn publish(
        &mut self,
        template_name: &str,
        template: &Template,
    ) -> Result<(), ComposeError> {
        for (name, output) in template.export_names() {
            let publisher = format!("{template_name}/{output}");
            if let Some(existing) = self.published.get(name) {
                return Err(ComposeError::DuplicateExport {
                    name: name.to_string(),
                    existing: existing.clone(),
                });
            }
            tracing::debug!(export = %name, publisher = %publisher, "published export");
            self.published.insert(name.to_string(), publisher);
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.published.contains_key(name)
    }

    pub fn publisher(&self, name: &str) -> Option<&str> {
        self.published.get(name).map(String::as_str)
    }

    /// Literal import names of `template` that nothing in the namespace publishes
    pub fn unresolved_imports<'t>(&self, template: &'t Template) -> Vec<&'t str> {
        template
            .import_names()
            .into_iter()
            .filter(|name| !self.contains(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Output, Resource, Value};

    fn publisher() -> Template {
        let mut t = Template::new();
        t.add_output(Output::new("VPCID", "vpc-1").with_export("ATL-VPCID"))
            .unwrap();
        t
    }

    #[test]
    fn test_publish_and_resolve() {
        let mut ns = ExportNamespace::new();
        ns.publish("jira-vpc", &publisher()).unwrap();
        assert_eq!(ns.publisher("ATL-VPCID"), Some("jira-vpc/VPCID"));

        let mut consumer = Template::new();
        consumer
            .add_resource(
                Resource::new("SecurityGroup", "AWS::EC2::SecurityGroup")
                    .property("VpcId", Value::import("ATL-VPCID"))
                    .property("Other", Value::import("ATL-Missing")),
            )
            .unwrap();
        assert_eq!(ns.unresolved_imports(&consumer), vec!["ATL-Missing"]);
    }

    #[test]
    fn test_duplicate_across_templates() {
        let mut ns = ExportNamespace::new();
        ns.publish("first", &publisher()).unwrap();
        let err = ns.publish("second", &publisher()).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"export name 'ATL-VPCID' is already published by 'first/VPCID'");
    }
}
