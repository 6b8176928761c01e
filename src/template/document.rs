//! The template document: an ordered, validated declaration graph

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

use super::condition::ConditionExpr;
use super::constraint::check_parameter;
use super::declaration::{DeclarationKind, Mapping, Output, Parameter, Resource};
use super::error::ComposeError;
use super::nested::{ChildInterface, NestedStack};
use super::validate::{is_export_name, ReferenceChecker};
use super::value::{Intrinsic, Value};

pub const FORMAT_VERSION: &str = "2010-09-09";

/// A CloudFormation template under construction
///
/// Parameters, mappings, conditions and resources share one logical-ID
/// namespace; outputs have their own. Conditions are checked when added,
/// resource and output references when the document is validated, so
/// resources may refer to resources declared after them.
#[derive(Debug, Clone, Default)]
pub struct Template {
    description: Option<String>,
    parameters: IndexMap<String, Parameter>,
    mappings: IndexMap<String, Mapping>,
    conditions: IndexMap<String, ConditionExpr>,
    resources: IndexMap<String, Resource>,
    outputs: IndexMap<String, Output>,
    children: IndexMap<String, ChildInterface>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Register a parameter and return a `Ref` to it
    pub fn add_parameter(&mut self, parameter: Parameter) -> Result<Value, ComposeError> {
        self.ensure_unused(&parameter.logical_id)?;
        check_parameter(&parameter)?;
        let id = parameter.logical_id.clone();
        tracing::debug!(id = %id, kind = "parameter", "registered declaration");
        self.parameters.insert(id.clone(), parameter);
        Ok(Value::reference(id))
    }

    pub fn add_mapping(&mut self, mapping: Mapping) -> Result<(), ComposeError> {
        self.ensure_unused(&mapping.logical_id)?;
        tracing::debug!(id = %mapping.logical_id, kind = "mapping", "registered declaration");
        self.mappings.insert(mapping.logical_id.clone(), mapping);
        Ok(())
    }

    /// Register a named condition
    ///
    /// Every condition the expression names must already be declared, and
    /// its operands may only read parameters, pseudo parameters and mappings.
    /// Returns a handle for use in later condition expressions.
    pub fn add_condition(
        &mut self,
        name: impl Into<String>,
        expr: ConditionExpr,
    ) -> Result<ConditionExpr, ComposeError> {
        let name = name.into();
        self.ensure_unused(&name)?;
        expr.check_arity(&name)?;
        {
            let checker = ReferenceChecker::new(self, &name);
            for referenced in expr.condition_names() {
                checker.check_condition(referenced)?;
            }
            for operand in expr.operands() {
                checker.check_condition_operand(operand)?;
            }
        }
        tracing::debug!(id = %name, kind = "condition", "registered declaration");
        self.conditions.insert(name.clone(), expr);
        Ok(ConditionExpr::condition(name))
    }

    /// Register a resource and return a `Ref` to it
    ///
    /// A `Condition` attribute, and the condition of every `Fn::If` in its
    /// properties, must name an already declared condition.
    pub fn add_resource(&mut self, resource: Resource) -> Result<Value, ComposeError> {
        self.ensure_unused(&resource.logical_id)?;
        {
            let checker = ReferenceChecker::new(self, &resource.logical_id);
            if let Some(condition) = &resource.condition {
                checker.check_condition(condition)?;
            }
            for value in resource.properties.values().chain(resource.metadata.as_ref()) {
                checker.check_condition_uses(value)?;
            }
        }
        let id = resource.logical_id.clone();
        tracing::debug!(
            id = %id,
            kind = "resource",
            resource_type = %resource.resource_type,
            "registered declaration"
        );
        self.resources.insert(id.clone(), resource);
        Ok(Value::reference(id))
    }

    /// Register a nested stack resource, checking it against its child interface
    pub fn add_nested_stack(&mut self, stack: NestedStack) -> Result<Value, ComposeError> {
        stack.check_wiring()?;
        let handle = self.add_resource(stack.to_resource())?;
        if let Some(interface) = stack.interface {
            self.children.insert(stack.logical_id, interface);
        }
        Ok(handle)
    }

    /// Register an output
    pub fn add_output(&mut self, output: Output) -> Result<(), ComposeError> {
        check_logical_id(&output.logical_id)?;
        if self.outputs.contains_key(&output.logical_id) {
            return Err(ComposeError::duplicate(&output.logical_id, DeclarationKind::Output));
        }
        {
            let checker = ReferenceChecker::new(self, &output.logical_id);
            if let Some(condition) = &output.condition {
                checker.check_condition(condition)?;
            }
            for value in std::iter::once(&output.value).chain(output.export.as_ref()) {
                checker.check_condition_uses(value)?;
            }
        }
        if let Some(name) = output.export_literal() {
            if !is_export_name(name) {
                return Err(ComposeError::malformed(
                    &output.logical_id,
                    "Export",
                    format!("'{name}' is not a valid export name"),
                ));
            }
            let existing = self.outputs.values().find(|o| o.export_literal() == Some(name));
            if let Some(existing) = existing {
                return Err(ComposeError::DuplicateExport {
                    name: name.to_string(),
                    existing: existing.logical_id.clone(),
                });
            }
        }
        tracing::debug!(id = %output.logical_id, kind = "output", "registered declaration");
        self.outputs.insert(output.logical_id.clone(), output);
        Ok(())
    }

    /// Read an output of a nested stack declared in this template
    pub fn stack_output(stack: impl Into<String>, output: &str) -> Value {
        Value::get_att(stack, format!("Outputs.{output}"))
    }

    /// The kind of the declaration holding `id` in the shared namespace
    pub fn kind_of(&self, id: &str) -> Option<DeclarationKind> {
        if self.parameters.contains_key(id) {
            Some(DeclarationKind::Parameter)
        } else if self.mappings.contains_key(id) {
            Some(DeclarationKind::Mapping)
        } else if self.conditions.contains_key(id) {
            Some(DeclarationKind::Condition)
        } else if self.resources.contains_key(id) {
            Some(DeclarationKind::Resource)
        } else {
            None
        }
    }

    fn ensure_unused(&self, id: &str) -> Result<(), ComposeError> {
        check_logical_id(id)?;
        match self.kind_of(id) {
            Some(existing) => Err(ComposeError::duplicate(id, existing)),
            None => Ok(()),
        }
    }

    pub fn parameter(&self, id: &str) -> Option<&Parameter> {
        self.parameters.get(id)
    }

    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values()
    }

    pub fn mapping(&self, id: &str) -> Option<&Mapping> {
        self.mappings.get(id)
    }

    pub fn mappings(&self) -> impl Iterator<Item = &Mapping> {
        self.mappings.values()
    }

    pub fn condition(&self, name: &str) -> Option<&ConditionExpr> {
        self.conditions.get(name)
    }

    /// Conditions in declaration order, which is also dependency order
    pub fn conditions(&self) -> impl Iterator<Item = (&str, &ConditionExpr)> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn output(&self, id: &str) -> Option<&Output> {
        self.outputs.get(id)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Output> {
        self.outputs.values()
    }

    /// Interface of the child behind a nested stack resource, if captured
    pub fn child_interface(&self, stack: &str) -> Option<&ChildInterface> {
        self.children.get(stack)
    }

    pub(crate) fn parameter_ids(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(String::as_str)
    }

    pub(crate) fn resource_ids(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub(crate) fn mapping_ids(&self) -> impl Iterator<Item = &str> {
        self.mappings.keys().map(String::as_str)
    }

    pub(crate) fn condition_ids(&self) -> impl Iterator<Item = &str> {
        self.conditions.keys().map(String::as_str)
    }

    /// IDs a `Ref` can target
    pub(crate) fn referable_ids(&self) -> impl Iterator<Item = &str> {
        self.parameter_ids().chain(self.resource_ids())
    }

    /// Every declaration as `(kind, logical id)`, section by section
    pub fn logical_ids(&self) -> Vec<(DeclarationKind, &str)> {
        let mut ids = Vec::new();
        ids.extend(self.parameter_ids().map(|k| (DeclarationKind::Parameter, k)));
        ids.extend(self.mapping_ids().map(|k| (DeclarationKind::Mapping, k)));
        ids.extend(self.condition_ids().map(|k| (DeclarationKind::Condition, k)));
        ids.extend(self.resource_ids().map(|k| (DeclarationKind::Resource, k)));
        ids.extend(self.outputs.keys().map(|k| (DeclarationKind::Output, k.as_str())));
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
            && self.mappings.is_empty()
            && self.conditions.is_empty()
            && self.resources.is_empty()
            && self.outputs.is_empty()
    }

    /// Literal export names with the output publishing each
    pub fn export_names(&self) -> Vec<(&str, &str)> {
        self.outputs
            .values()
            .filter_map(|o| o.export_literal().map(|name| (name, o.logical_id.as_str())))
            .collect()
    }

    /// Literal `Fn::ImportValue` names used anywhere, without duplicates
    pub fn import_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        let values = self
            .resources
            .values()
            .flat_map(|r| r.properties.values().chain(r.metadata.as_ref()))
            .chain(self.outputs.values().map(|o| &o.value));
        for value in values {
            for f in value.intrinsics() {
                if let Intrinsic::ImportValue(Value::String(name)) = f {
                    if !names.contains(&name.as_str()) {
                        names.push(name);
                    }
                }
            }
        }
        names
    }

    /// Check every reference in resources and outputs
    pub fn validate(&self) -> Result<(), ComposeError> {
        for resource in self.resources.values() {
            let checker = ReferenceChecker::new(self, &resource.logical_id);
            for value in resource.properties.values().chain(resource.metadata.as_ref()) {
                checker.check_value(value)?;
            }
            for target in &resource.depends_on {
                checker.check_depends_on(target)?;
            }
            if let Some(condition) = &resource.condition {
                checker.check_condition(condition)?;
            }
        }
        for output in self.outputs.values() {
            let checker = ReferenceChecker::new(self, &output.logical_id);
            checker.check_value(&output.value)?;
            if let Some(export) = &output.export {
                checker.check_value(export)?;
            }
        }
        Ok(())
    }

    /// Validate and serialize into the template document
    pub fn to_document(&self) -> Result<Json, ComposeError> {
        self.validate()?;

        let mut doc = Map::new();
        doc.insert(
            "AWSTemplateFormatVersion".into(),
            Json::String(FORMAT_VERSION.to_string()),
        );
        if let Some(description) = &self.description {
            doc.insert("Description".into(), Json::String(description.clone()));
        }
        doc.insert(
            "Parameters".into(),
            section(self.parameters.iter().map(|(k, p)| (k, p.to_json()))),
        );
        if !self.mappings.is_empty() {
            doc.insert(
                "Mappings".into(),
                section(self.mappings.iter().map(|(k, m)| (k, m.to_json()))),
            );
        }
        if !self.conditions.is_empty() {
            doc.insert(
                "Conditions".into(),
                section(self.conditions.iter().map(|(k, c)| (k, c.to_json()))),
            );
        }
        doc.insert(
            "Resources".into(),
            section(self.resources.iter().map(|(k, r)| (k, r.to_json()))),
        );
        doc.insert(
            "Outputs".into(),
            section(self.outputs.iter().map(|(k, o)| (k, o.to_json()))),
        );

        tracing::info!(
            parameters = self.parameters.len(),
            resources = self.resources.len(),
            outputs = self.outputs.len(),
            "template serialized"
        );
        Ok(Json::Object(doc))
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, ComposeError> {
        let doc = self.to_document()?;
        let text = if pretty {
            serde_json::to_string_pretty(&doc)?
        } else {
            serde_json::to_string(&doc)?
        };
        Ok(text)
    }

    /// Re-read a serialized template through the same checks used to build it
    pub fn from_json(text: &str) -> Result<Self, ComposeError> {
        let json: Json = serde_json::from_str(text)?;
        let doc = json
            .as_object()
            .ok_or_else(|| ComposeError::parse("document must be an object"))?;

        let mut template = Template::new();
        for key in doc.keys() {
            match key.as_str() {
                "AWSTemplateFormatVersion" | "Description" | "Parameters" | "Mappings"
                | "Conditions" | "Resources" | "Outputs" => {}
                other => return Err(ComposeError::parse(format!("unsupported section '{other}'"))),
            }
        }
        if let Some(version) = doc.get("AWSTemplateFormatVersion") {
            if version.as_str() != Some(FORMAT_VERSION) {
                return Err(ComposeError::parse(format!("unsupported format version {version}")));
            }
        }
        if let Some(description) = doc.get("Description") {
            let description = description
                .as_str()
                .ok_or_else(|| ComposeError::parse("Description must be a string"))?;
            template.set_description(description);
        }

        for (id, body) in entries(doc, "Parameters")? {
            template.add_parameter(Parameter::from_json(id, body)?)?;
        }
        for (id, body) in entries(doc, "Mappings")? {
            template.add_mapping(Mapping::from_json(id, body)?)?;
        }
        template.add_conditions_in_dependency_order(entries(doc, "Conditions")?)?;
        for (id, body) in entries(doc, "Resources")? {
            template.add_resource(Resource::from_json(id, body)?)?;
        }
        for (id, body) in entries(doc, "Outputs")? {
            template.add_output(Output::from_json(id, body)?)?;
        }

        template.validate()?;
        Ok(template)
    }

    /// Documents written by hand may list a condition before the ones it uses
    fn add_conditions_in_dependency_order(
        &mut self,
        entries: Vec<(&String, &Json)>,
    ) -> Result<(), ComposeError> {
        let mut pending = entries
            .into_iter()
            .map(|(name, body)| Ok((name.clone(), ConditionExpr::from_json(body)?)))
            .collect::<Result<Vec<_>, ComposeError>>()?;

        while !pending.is_empty() {
            let ready = pending.iter().position(|(name, expr)| {
                expr.condition_names()
                    .iter()
                    .all(|dep| *dep != name.as_str() && self.conditions.contains_key(*dep))
            });
            // no candidate left: adding the first one reports the real error
            let (name, expr) = pending.remove(ready.unwrap_or(0));
            self.add_condition(name, expr)?;
        }
        Ok(())
    }
}

fn check_logical_id(id: &str) -> Result<(), ComposeError> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '&') {
        return Err(ComposeError::malformed(
            id,
            "logical id",
            "must be non-empty and alphanumeric",
        ));
    }
    Ok(())
}

fn section<'a>(items: impl Iterator<Item = (&'a String, Json)>) -> Json {
    Json::Object(items.map(|(k, v)| (k.clone(), v)).collect())
}

fn entries<'a>(
    doc: &'a Map<String, Json>,
    key: &str,
) -> Result<Vec<(&'a String, &'a Json)>, ComposeError> {
    match doc.get(key) {
        None => Ok(Vec::new()),
        Some(Json::Object(obj)) => Ok(obj.iter().collect()),
        Some(_) => Err(ComposeError::parse(format!("{key} must be an object"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_empty_template_serializes() {
        let doc = Template::new().to_document().expect("Should serialize");
        assert_eq!(
            doc,
            json!({
                "AWSTemplateFormatVersion": "2010-09-09",
                "Parameters": {},
                "Resources": {},
                "Outputs": {}
            })
        );
    }

    #[test]
    fn test_shared_namespace() {
        let mut t = Template::new();
        t.add_parameter(Parameter::string("VPC")).unwrap();
        let err = t
            .add_resource(Resource::new("VPC", "AWS::EC2::VPC"))
            .unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"duplicate logical id 'VPC': already declared as a parameter");
    }

    #[test]
    fn test_output_may_share_resource_id() {
        let mut t = Template::new();
        let cname = t
            .add_resource(Resource::new("EFSCname", "AWS::Route53::RecordSet"))
            .unwrap();
        t.add_output(Output::new("EFSCname", cname)).unwrap();
        assert!(t.to_document().is_ok());
    }

    #[test]
    fn test_condition_must_be_declared_first() {
        let mut t = Template::new();
        t.add_parameter(Parameter::string("NumberOfAZs")).unwrap();
        let err = t
            .add_condition(
                "3AZCondition",
                ConditionExpr::or([
                    ConditionExpr::equals(Value::reference("NumberOfAZs"), "3"),
                    ConditionExpr::condition("4AZCondition"),
                ]),
            )
            .unwrap_err();
        assert!(matches!(err, ComposeError::UndefinedCondition { .. }));
    }

    #[test]
    fn test_condition_cannot_reference_resource() {
        let mut t = Template::new();
        t.add_resource(Resource::new("VPC", "AWS::EC2::VPC")).unwrap();
        let err = t
            .add_condition("HasVpc", ConditionExpr::is_set(Value::reference("VPC")))
            .unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"'VPC' in 'HasVpc' is a resource, expected a parameter");
    }

    #[test]
    fn test_condition_rejects_get_att() {
        let mut t = Template::new();
        let err = t
            .add_condition(
                "Odd",
                ConditionExpr::equals(Value::get_att("DB", "Endpoint.Address"), ""),
            )
            .unwrap_err();
        assert!(matches!(err, ComposeError::InvalidExpression { .. }));
    }

    #[test]
    fn test_forward_resource_reference() {
        let mut t = Template::new();
        t.add_resource(
            Resource::new("Route", "AWS::EC2::Route")
                .property("RouteTableId", Value::reference("RouteTable")),
        )
        .unwrap();
        assert!(t.validate().is_err());
        t.add_resource(Resource::new("RouteTable", "AWS::EC2::RouteTable"))
            .unwrap();
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_undefined_reference_suggests() {
        let mut t = Template::new();
        t.add_parameter(Parameter::string("KeyName")).unwrap();
        t.add_resource(
            Resource::new("Bastion", "AWS::EC2::Instance")
                .property("KeyName", Value::reference("KeyNme")),
        )
        .unwrap();
        let err = t.to_document().unwrap_err();
        assert_eq!(err.suggestions(), Some(&["KeyName".to_string()][..]));
    }

    #[test]
    fn test_get_att_on_parameter_rejected() {
        let mut t = Template::new();
        t.add_parameter(Parameter::string("VPC")).unwrap();
        t.add_output(Output::new("Cidr", Value::get_att("VPC", "CidrBlock")))
            .unwrap();
        let err = t.validate().unwrap_err();
        assert!(matches!(err, ComposeError::InvalidReference { .. }));
    }

    #[test]
    fn test_resource_condition_checked_at_add() {
        let mut t = Template::new();
        let err = t
            .add_resource(Resource::new("NAT", "AWS::EC2::NatGateway").with_condition("Missing"))
            .unwrap_err();
        assert!(matches!(err, ComposeError::UndefinedCondition { .. }));
    }

    #[test]
    fn test_duplicate_export_rejected() {
        let mut t = Template::new();
        t.add_output(Output::new("A", "x").with_export("ATL-VPCID")).unwrap();
        let err = t
            .add_output(Output::new("B", "y").with_export("ATL-VPCID"))
            .unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"export name 'ATL-VPCID' is already published by 'A'");
    }

    #[test]
    fn test_import_names_are_checked() {
        let mut t = Template::new();
        t.add_output(Output::new("Bad", Value::import("not valid")))
            .unwrap();
        assert!(matches!(
            t.validate().unwrap_err(),
            ComposeError::InvalidImportName { .. }
        ));
    }

    #[test]
    fn test_sub_variables_resolve() {
        let mut t = Template::new();
        t.add_parameter(Parameter::string("QSS3BucketName")).unwrap();
        t.add_output(Output::new(
            "Url",
            Value::sub_with(
                "https://${QSS3BucketName}.${QSS3Region}.amazonaws.com/${AWS::Region}",
                [("QSS3Region", Value::from("s3"))],
            ),
        ))
        .unwrap();
        assert!(t.validate().is_ok());

        t.add_output(Output::new("Broken", Value::sub("${Nowhere}")))
            .unwrap();
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_depends_on_must_be_resource() {
        let mut t = Template::new();
        t.add_parameter(Parameter::string("Name")).unwrap();
        t.add_resource(Resource::new("Bucket", "AWS::S3::Bucket").depends_on("Name"))
            .unwrap();
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_find_in_map_keys() {
        let mut t = Template::new();
        t.add_mapping(Mapping::new("AWSInfoRegionMap").entry("us-east-1", [("Partition", "aws")]))
            .unwrap();
        t.add_output(Output::new(
            "Partition",
            Value::find_in_map("AWSInfoRegionMap", Value::reference("AWS::Region"), "Partition"),
        ))
        .unwrap();
        assert!(t.validate().is_ok());

        t.add_output(Output::new(
            "Wrong",
            Value::find_in_map("AWSInfoRegionMap", "us-east-1", "QuickStartS3URL"),
        ))
        .unwrap();
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_from_json_orders_conditions() {
        let text = r#"{
            "Parameters": {"NumberOfAZs": {"Type": "String", "Default": "2"}},
            "Conditions": {
                "3AZCondition": {"Fn::Or": [
                    {"Fn::Equals": [{"Ref": "NumberOfAZs"}, "3"]},
                    {"Condition": "4AZCondition"}
                ]},
                "4AZCondition": {"Fn::Equals": [{"Ref": "NumberOfAZs"}, "4"]}
            }
        }"#;
        let t = Template::from_json(text).expect("Should parse");
        let names: Vec<&str> = t.conditions().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["4AZCondition", "3AZCondition"]);
    }

    #[test]
    fn test_from_json_rejects_condition_cycle() {
        let text = r#"{
            "Conditions": {
                "A": {"Fn::Not": [{"Condition": "B"}]},
                "B": {"Fn::Not": [{"Condition": "A"}]}
            }
        }"#;
        assert!(Template::from_json(text).is_err());
    }

    #[test]
    fn test_from_json_rejects_unknown_section() {
        assert!(Template::from_json(r#"{"Transform": "AWS::Serverless-2016-10-31"}"#).is_err());
    }

    #[test]
    fn test_output_logical_id_checked() {
        let mut t = Template::new();
        for id in ["", "bad id!"] {
            let err = t.add_output(Output::new(id, "x")).unwrap_err();
            assert!(matches!(err, ComposeError::MalformedPropertyValue { .. }), "{id:?}");
        }
        assert!(t.outputs().next().is_none());
        assert!(Template::from_json(r#"{"Outputs": {"bad id!": {"Value": "x"}}}"#).is_err());
    }

    #[test]
    fn test_if_condition_checked_at_add() {
        let mut t = Template::new();
        let err = t
            .add_resource(
                Resource::new("Bucket", "AWS::S3::Bucket")
                    .property("BucketName", Value::if_else("Later", "a", "b")),
            )
            .unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"undefined condition 'Later' in 'Bucket'");

        let err = t
            .add_output(Output::new("Name", Value::if_else("Later", "a", "b")))
            .unwrap_err();
        assert!(matches!(err, ComposeError::UndefinedCondition { .. }));
    }

    #[test]
    fn test_nested_stack_parameter_must_resolve_in_parent() {
        let mut t = Template::new();
        t.add_nested_stack(
            NestedStack::new("Child", "https://example.com/child.json")
                .parameter("A", Value::reference("Missing")),
        )
        .unwrap();
        let err = t.to_document().unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"undefined reference 'Missing' in 'Child'");
    }

    #[test]
    fn test_stack_output_checked_against_child() {
        let mut child = Template::new();
        child.add_output(Output::new("Address", "10.0.0.1")).unwrap();

        let mut t = Template::new();
        t.add_nested_stack(
            NestedStack::new("Child", "https://example.com/child.json")
                .with_interface(ChildInterface::of(&child)),
        )
        .unwrap();
        t.add_output(Output::new("Real", Template::stack_output("Child", "Address")))
            .unwrap();
        assert!(t.validate().is_ok());

        t.add_output(Output::new("O", Template::stack_output("Child", "Fake")))
            .unwrap();
        let err = t.validate().unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @"nested stack 'Child': child template has no output 'Fake' (read by 'O')"
        );
    }
}
