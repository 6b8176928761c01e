//! Declaration types: parameters, mappings, resources and outputs

use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Number, Value as Json};

use super::error::ComposeError;
use super::value::Value;

/// The section a declaration lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Parameter,
    Mapping,
    Condition,
    Resource,
    Output,
}

impl DeclarationKind {
    /// Top-level section name in the serialized document
    pub fn section(&self) -> &'static str {
        match self {
            DeclarationKind::Parameter => "Parameters",
            DeclarationKind::Mapping => "Mappings",
            DeclarationKind::Condition => "Conditions",
            DeclarationKind::Resource => "Resources",
            DeclarationKind::Output => "Outputs",
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeclarationKind::Parameter => "parameter",
            DeclarationKind::Mapping => "mapping",
            DeclarationKind::Condition => "condition",
            DeclarationKind::Resource => "resource",
            DeclarationKind::Output => "output",
        };
        f.write_str(name)
    }
}

/// A template input with optional constraints
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub logical_id: String,
    /// `String`, `Number`, `List<...>` or an AWS-specific type
    pub param_type: String,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub allowed_values: Vec<Value>,
    pub allowed_pattern: Option<String>,
    pub constraint_description: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub min_value: Option<Number>,
    pub max_value: Option<Number>,
    pub no_echo: bool,
}

impl Parameter {
    pub fn new(logical_id: impl Into<String>, param_type: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            param_type: param_type.into(),
            description: None,
            default: None,
            allowed_values: Vec::new(),
            allowed_pattern: None,
            constraint_description: None,
            min_length: None,
            max_length: None,
            min_value: None,
            max_value: None,
            no_echo: false,
        }
    }

    /// A `String` parameter
    pub fn string(logical_id: impl Into<String>) -> Self {
        Self::new(logical_id, "String")
    }

    /// A `Number` parameter
    pub fn number(logical_id: impl Into<String>) -> Self {
        Self::new(logical_id, "Number")
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_allowed_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_allowed_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.allowed_pattern = Some(pattern.into());
        self
    }

    pub fn with_constraint_description(mut self, description: impl Into<String>) -> Self {
        self.constraint_description = Some(description.into());
        self
    }

    /// Bound the length of a string value
    pub fn with_length(mut self, min: u64, max: u64) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    /// Bound a numeric value
    pub fn with_range(mut self, min: i64, max: i64) -> Self {
        self.min_value = Some(min.into());
        self.max_value = Some(max.into());
        self
    }

    /// Mask the value in console and API output
    pub fn no_echo(mut self) -> Self {
        self.no_echo = true;
        self
    }

    /// Whether a deployment must supply a value
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    pub fn to_json(&self) -> Json {
        let mut obj = Map::new();
        obj.insert("Type".into(), Json::String(self.param_type.clone()));
        if let Some(default) = &self.default {
            obj.insert("Default".into(), default.to_json());
        }
        if !self.allowed_values.is_empty() {
            obj.insert(
                "AllowedValues".into(),
                Json::Array(self.allowed_values.iter().map(Value::to_json).collect()),
            );
        }
        if let Some(pattern) = &self.allowed_pattern {
            obj.insert("AllowedPattern".into(), Json::String(pattern.clone()));
        }
        if let Some(n) = self.min_length {
            obj.insert("MinLength".into(), Json::from(n));
        }
        if let Some(n) = self.max_length {
            obj.insert("MaxLength".into(), Json::from(n));
        }
        if let Some(n) = &self.min_value {
            obj.insert("MinValue".into(), Json::Number(n.clone()));
        }
        if let Some(n) = &self.max_value {
            obj.insert("MaxValue".into(), Json::Number(n.clone()));
        }
        if self.no_echo {
            obj.insert("NoEcho".into(), Json::Bool(true));
        }
        if let Some(desc) = &self.constraint_description {
            obj.insert("ConstraintDescription".into(), Json::String(desc.clone()));
        }
        if let Some(desc) = &self.description {
            obj.insert("Description".into(), Json::String(desc.clone()));
        }
        Json::Object(obj)
    }

    pub fn from_json(logical_id: &str, json: &Json) -> Result<Self, ComposeError> {
        let obj = as_object(logical_id, json)?;
        let param_type = obj
            .get("Type")
            .and_then(Json::as_str)
            .ok_or_else(|| ComposeError::parse(format!("parameter '{logical_id}' has no Type")))?;
        let mut param = Parameter::new(logical_id, param_type);
        for (key, value) in obj {
            match key.as_str() {
                "Type" => {}
                "Default" => param.default = Some(Value::from_json(value)?),
                "AllowedValues" => {
                    param.allowed_values = value
                        .as_array()
                        .ok_or_else(|| ComposeError::parse("AllowedValues must be a list"))?
                        .iter()
                        .map(Value::from_json)
                        .collect::<Result<_, _>>()?
                }
                "AllowedPattern" => param.allowed_pattern = Some(string_field(key, value)?),
                "MinLength" => param.min_length = Some(unsigned_field(key, value)?),
                "MaxLength" => param.max_length = Some(unsigned_field(key, value)?),
                "MinValue" => param.min_value = Some(number_field(key, value)?),
                "MaxValue" => param.max_value = Some(number_field(key, value)?),
                "NoEcho" => {
                    param.no_echo = matches!(value, Json::Bool(true))
                        || value.as_str() == Some("true")
                }
                "ConstraintDescription" => {
                    param.constraint_description = Some(string_field(key, value)?)
                }
                "Description" => param.description = Some(string_field(key, value)?),
                other => {
                    return Err(ComposeError::parse(format!(
                        "unsupported parameter attribute '{other}' in '{logical_id}'"
                    )))
                }
            }
        }
        Ok(param)
    }
}

/// A two-level lookup table for `Fn::FindInMap`
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    pub logical_id: String,
    pub entries: IndexMap<String, IndexMap<String, Value>>,
}

impl Mapping {
    pub fn new(logical_id: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            entries: IndexMap::new(),
        }
    }

    /// Add a top-level key with its second-level values
    pub fn entry<I, K, V>(mut self, top_key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.entries.insert(
            top_key.into(),
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn lookup(&self, top_key: &str, second_key: &str) -> Option<&Value> {
        self.entries.get(top_key).and_then(|m| m.get(second_key))
    }

    pub fn to_json(&self) -> Json {
        Json::Object(
            self.entries
                .iter()
                .map(|(top, values)| {
                    let inner = values.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
                    (top.clone(), Json::Object(inner))
                })
                .collect(),
        )
    }

    pub fn from_json(logical_id: &str, json: &Json) -> Result<Self, ComposeError> {
        let mut mapping = Mapping::new(logical_id);
        for (top, inner) in as_object(logical_id, json)? {
            let values = as_object(logical_id, inner)?
                .iter()
                .map(|(k, v)| Ok((k.clone(), Value::from_json(v)?)))
                .collect::<Result<IndexMap<_, _>, ComposeError>>()?;
            mapping.entries.insert(top.clone(), values);
        }
        Ok(mapping)
    }
}

/// A provisioned resource with a kind-specific property bag
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub logical_id: String,
    /// e.g. `AWS::EC2::VPC`
    pub resource_type: String,
    pub properties: IndexMap<String, Value>,
    pub condition: Option<String>,
    pub depends_on: Vec<String>,
    pub metadata: Option<Value>,
    pub deletion_policy: Option<String>,
}

impl Resource {
    pub fn new(logical_id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            resource_type: resource_type.into(),
            properties: IndexMap::new(),
            condition: None,
            depends_on: Vec::new(),
            metadata: None,
            deletion_policy: None,
        }
    }

    /// Set a property
    pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Only materialize the resource when the named condition holds
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Same as `with_condition`, for call sites with an optional gate
    pub fn with_optional_condition(mut self, condition: Option<impl Into<String>>) -> Self {
        self.condition = condition.map(Into::into);
        self
    }

    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_deletion_policy(mut self, policy: impl Into<String>) -> Self {
        self.deletion_policy = Some(policy.into());
        self
    }

    pub fn to_json(&self) -> Json {
        let mut obj = Map::new();
        obj.insert("Type".into(), Json::String(self.resource_type.clone()));
        if let Some(cond) = &self.condition {
            obj.insert("Condition".into(), Json::String(cond.clone()));
        }
        match self.depends_on.as_slice() {
            [] => {}
            [single] => {
                obj.insert("DependsOn".into(), Json::String(single.clone()));
            }
            many => {
                obj.insert(
                    "DependsOn".into(),
                    Json::Array(many.iter().cloned().map(Json::String).collect()),
                );
            }
        }
        if let Some(metadata) = &self.metadata {
            obj.insert("Metadata".into(), metadata.to_json());
        }
        if let Some(policy) = &self.deletion_policy {
            obj.insert("DeletionPolicy".into(), Json::String(policy.clone()));
        }
        if !self.properties.is_empty() {
            obj.insert(
                "Properties".into(),
                Json::Object(
                    self.properties
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_json()))
                        .collect(),
                ),
            );
        }
        Json::Object(obj)
    }

    pub fn from_json(logical_id: &str, json: &Json) -> Result<Self, ComposeError> {
        let obj = as_object(logical_id, json)?;
        let resource_type = obj
            .get("Type")
            .and_then(Json::as_str)
            .ok_or_else(|| ComposeError::parse(format!("resource '{logical_id}' has no Type")))?;
        let mut resource = Resource::new(logical_id, resource_type);
        for (key, value) in obj {
            match key.as_str() {
                "Type" => {}
                "Condition" => resource.condition = Some(string_field(key, value)?),
                "DependsOn" => {
                    resource.depends_on = match value {
                        Json::String(s) => vec![s.clone()],
                        Json::Array(items) => items
                            .iter()
                            .map(|item| string_field(key, item))
                            .collect::<Result<_, _>>()?,
                        _ => return Err(ComposeError::parse("DependsOn must be a string or list")),
                    }
                }
                "Metadata" => resource.metadata = Some(Value::from_json(value)?),
                "DeletionPolicy" => resource.deletion_policy = Some(string_field(key, value)?),
                "Properties" => {
                    for (name, prop) in as_object(logical_id, value)? {
                        resource
                            .properties
                            .insert(name.clone(), Value::from_json(prop)?);
                    }
                }
                other => {
                    return Err(ComposeError::parse(format!(
                        "unsupported resource attribute '{other}' in '{logical_id}'"
                    )))
                }
            }
        }
        Ok(resource)
    }
}

/// A named result of the template, optionally exported
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub logical_id: String,
    pub value: Value,
    pub description: Option<String>,
    pub condition: Option<String>,
    /// Export name, a literal or a computed value
    pub export: Option<Value>,
}

impl Output {
    pub fn new(logical_id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            logical_id: logical_id.into(),
            value: value.into(),
            description: None,
            condition: None,
            export: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_optional_condition(mut self, condition: Option<impl Into<String>>) -> Self {
        self.condition = condition.map(Into::into);
        self
    }

    /// Publish the value under a cross-document export name
    pub fn with_export(mut self, name: impl Into<Value>) -> Self {
        self.export = Some(name.into());
        self
    }

    /// The export name when it is a plain string
    pub fn export_literal(&self) -> Option<&str> {
        self.export.as_ref().and_then(Value::as_str)
    }

    pub fn to_json(&self) -> Json {
        let mut obj = Map::new();
        if let Some(desc) = &self.description {
            obj.insert("Description".into(), Json::String(desc.clone()));
        }
        if let Some(cond) = &self.condition {
            obj.insert("Condition".into(), Json::String(cond.clone()));
        }
        obj.insert("Value".into(), self.value.to_json());
        if let Some(name) = &self.export {
            let mut export = Map::new();
            export.insert("Name".into(), name.to_json());
            obj.insert("Export".into(), Json::Object(export));
        }
        Json::Object(obj)
    }

    pub fn from_json(logical_id: &str, json: &Json) -> Result<Self, ComposeError> {
        let obj = as_object(logical_id, json)?;
        let value = obj
            .get("Value")
            .ok_or_else(|| ComposeError::parse(format!("output '{logical_id}' has no Value")))?;
        let mut output = Output::new(logical_id, Value::from_json(value)?);
        for (key, value) in obj {
            match key.as_str() {
                "Value" => {}
                "Description" => output.description = Some(string_field(key, value)?),
                "Condition" => output.condition = Some(string_field(key, value)?),
                "Export" => {
                    let name = as_object(logical_id, value)?
                        .get("Name")
                        .ok_or_else(|| ComposeError::parse("Export has no Name"))?;
                    output.export = Some(Value::from_json(name)?);
                }
                other => {
                    return Err(ComposeError::parse(format!(
                        "unsupported output attribute '{other}' in '{logical_id}'"
                    )))
                }
            }
        }
        Ok(output)
    }
}

fn as_object<'a>(owner: &str, json: &'a Json) -> Result<&'a Map<String, Json>, ComposeError> {
    json.as_object()
        .ok_or_else(|| ComposeError::parse(format!("'{owner}' must be an object")))
}

fn string_field(key: &str, json: &Json) -> Result<String, ComposeError> {
    json.as_str()
        .map(str::to_string)
        .ok_or_else(|| ComposeError::parse(format!("{key} must be a string")))
}

fn unsigned_field(key: &str, json: &Json) -> Result<u64, ComposeError> {
    match json {
        Json::Number(n) => n.as_u64(),
        Json::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| ComposeError::parse(format!("{key} must be a non-negative integer")))
}

fn number_field(key: &str, json: &Json) -> Result<Number, ComposeError> {
    match json {
        Json::Number(n) => Some(n.clone()),
        Json::String(s) => s.parse::<i64>().ok().map(Number::from),
        _ => None,
    }
    .ok_or_else(|| ComposeError::parse(format!("{key} must be a number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parameter_field_order() {
        let param = Parameter::string("VPCTenancy")
            .with_description("The allowed tenancy of instances launched into the VPC")
            .with_default("default")
            .with_allowed_values(["default", "dedicated"]);
        assert_eq!(
            serde_json::to_string(&param.to_json()).unwrap(),
            r#"{"Type":"String","Default":"default","AllowedValues":["default","dedicated"],"Description":"The allowed tenancy of instances launched into the VPC"}"#
        );
    }

    #[test]
    fn test_parameter_roundtrip() {
        let param = Parameter::string("DBPassword")
            .with_length(8, 128)
            .with_allowed_pattern("[a-zA-Z0-9]*")
            .no_echo();
        let parsed = Parameter::from_json("DBPassword", &param.to_json()).expect("Should parse");
        assert_eq!(parsed, param);
        assert!(parsed.is_required());
    }

    #[test]
    fn test_parameter_rejects_unknown_attribute() {
        let json = json!({"Type": "String", "Colour": "blue"});
        assert!(Parameter::from_json("P", &json).is_err());
    }

    #[test]
    fn test_resource_depends_on_single_is_string() {
        let res = Resource::new("PublicSubnetRoute", "AWS::EC2::Route")
            .depends_on("VPCGatewayAttachment");
        assert_eq!(res.to_json()["DependsOn"], json!("VPCGatewayAttachment"));
    }

    #[test]
    fn test_resource_depends_on_many_is_list() {
        let res = Resource::new("LaunchConfig", "AWS::AutoScaling::LaunchConfiguration")
            .depends_on("EFSMountAz1")
            .depends_on("DB");
        assert_eq!(res.to_json()["DependsOn"], json!(["EFSMountAz1", "DB"]));
    }

    #[test]
    fn test_resource_without_properties_omits_section() {
        let res = Resource::new("InternetGateway", "AWS::EC2::InternetGateway");
        assert_eq!(res.to_json(), json!({"Type": "AWS::EC2::InternetGateway"}));
    }

    #[test]
    fn test_output_export() {
        let out = Output::new("VPCID", Value::reference("VPC"))
            .with_description("VPC ID")
            .with_export("ATL-VPCID");
        assert_eq!(
            out.to_json(),
            json!({"Description": "VPC ID", "Value": {"Ref": "VPC"}, "Export": {"Name": "ATL-VPCID"}})
        );
        assert_eq!(out.export_literal(), Some("ATL-VPCID"));
    }

    #[test]
    fn test_mapping_lookup() {
        let mapping = Mapping::new("AWSInfoRegionMap")
            .entry("us-east-1", [("Partition", "aws")])
            .entry("us-gov-west-1", [("Partition", "aws-us-gov")]);
        assert_eq!(
            mapping.lookup("us-gov-west-1", "Partition"),
            Some(&Value::from("aws-us-gov"))
        );
        assert_eq!(mapping.lookup("eu-west-1", "Partition"), None);
    }
}
