//! Nested stacks and the interface a parent sees of its child

use indexmap::IndexMap;

use super::declaration::Resource;
use super::document::Template;
use super::error::ComposeError;
use super::value::Value;

pub const STACK_RESOURCE_TYPE: &str = "AWS::CloudFormation::Stack";

/// Parameter and output names of a child template
///
/// Captured from a built child so the parent can check its wiring without
/// merging the two documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChildInterface {
    /// Parameter name to whether a value must be supplied
    parameters: IndexMap<String, bool>,
    outputs: Vec<String>,
}

impl ChildInterface {
    pub fn of(child: &Template) -> Self {
        Self {
            parameters: child
                .parameters()
                .map(|p| (p.logical_id.clone(), p.is_required()))
                .collect(),
            outputs: child.outputs().map(|o| o.logical_id.clone()).collect(),
        }
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o == name)
    }

    /// Child parameters without a default, in declaration order
    pub fn required_parameters(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|(_, required)| **required)
            .map(|(name, _)| name.as_str())
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(String::as_str)
    }

    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(String::as_str)
    }
}

/// A child template deployed as a resource of the parent
#[derive(Debug, Clone, PartialEq)]
pub struct NestedStack {
    pub logical_id: String,
    pub template_url: Value,
    /// Values passed to the child's parameters, drawn from the parent graph
    pub parameters: IndexMap<String, Value>,
    pub depends_on: Vec<String>,
    pub condition: Option<String>,
    pub interface: Option<ChildInterface>,
}

impl NestedStack {
    pub fn new(logical_id: impl Into<String>, template_url: impl Into<Value>) -> Self {
        Self {
            logical_id: logical_id.into(),
            template_url: template_url.into(),
            parameters: IndexMap::new(),
            depends_on: Vec::new(),
            condition: None,
            interface: None,
        }
    }

    /// Pass a value to a child parameter
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Check parameters and outputs against the built child
    pub fn with_interface(mut self, interface: ChildInterface) -> Self {
        self.interface = Some(interface);
        self
    }

    /// Passed parameters must exist in the child and cover its required ones
    pub(crate) fn check_wiring(&self) -> Result<(), ComposeError> {
        let Some(child) = &self.interface else {
            return Ok(());
        };
        if let Some(name) = self.parameters.keys().find(|name| !child.has_parameter(name)) {
            return Err(ComposeError::nested(
                &self.logical_id,
                format!("child template declares no parameter '{name}'"),
            ));
        }
        let missing: Vec<&str> = child
            .required_parameters()
            .filter(|name| !self.parameters.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            return Err(ComposeError::nested(
                &self.logical_id,
                format!("required child parameters not supplied: {}", missing.join(", ")),
            ));
        }
        Ok(())
    }

    pub fn to_resource(&self) -> Resource {
        let mut resource = Resource::new(&self.logical_id, STACK_RESOURCE_TYPE)
            .property("TemplateURL", self.template_url.clone());
        if !self.parameters.is_empty() {
            resource = resource.property("Parameters", Value::Map(self.parameters.clone()));
        }
        resource.depends_on = self.depends_on.clone();
        resource.condition = self.condition.clone();
        resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Parameter;
    use crate::template::Output;
    use serde_json::json;

    fn child() -> Template {
        let mut t = Template::new();
        t.add_parameter(Parameter::string("Subnet")).unwrap();
        t.add_parameter(Parameter::string("AccessCIDR").with_default("0.0.0.0/0"))
            .unwrap();
        t.add_output(Output::new("Echo", Value::reference("Subnet")))
            .unwrap();
        t
    }

    #[test]
    fn test_interface_captures_required_flags() {
        let interface = ChildInterface::of(&child());
        assert_eq!(interface.required_parameters().collect::<Vec<_>>(), vec!["Subnet"]);
        assert!(interface.has_parameter("AccessCIDR"));
        assert!(interface.has_output("Echo"));
        assert!(!interface.has_output("Missing"));
    }

    #[test]
    fn test_unknown_child_parameter_rejected() {
        let stack = NestedStack::new("BastionStack", "https://example.com/bastion.json")
            .parameter("Subnet", "subnet-1")
            .parameter("Colour", "blue")
            .with_interface(ChildInterface::of(&child()));
        let err = stack.check_wiring().unwrap_err();
        assert!(err.to_string().contains("no parameter 'Colour'"));
    }

    #[test]
    fn test_missing_required_parameter_rejected() {
        let stack = NestedStack::new("BastionStack", "https://example.com/bastion.json")
            .with_interface(ChildInterface::of(&child()));
        let err = stack.check_wiring().unwrap_err();
        assert!(err.to_string().contains("Subnet"));
    }

    #[test]
    fn test_resource_form() {
        let stack = NestedStack::new("VPCStack", "https://example.com/vpc.json")
            .parameter("NumberOfAZs", "2")
            .depends_on("Other");
        assert_eq!(
            stack.to_resource().to_json(),
            json!({
                "Type": "AWS::CloudFormation::Stack",
                "DependsOn": "Other",
                "Properties": {
                    "TemplateURL": "https://example.com/vpc.json",
                    "Parameters": {"NumberOfAZs": "2"}
                }
            })
        );
    }
}
