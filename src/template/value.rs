//! Property values and intrinsic functions

use indexmap::IndexMap;
use serde_json::{json, Map, Number, Value as Json};

use super::error::ComposeError;

/// Pseudo parameters that `Ref` can always resolve
pub const PSEUDO_PARAMETERS: &[&str] = &[
    "AWS::AccountId",
    "AWS::NoValue",
    "AWS::NotificationARNs",
    "AWS::Partition",
    "AWS::Region",
    "AWS::StackId",
    "AWS::StackName",
    "AWS::URLSuffix",
];

/// Check whether a name is a pseudo parameter
pub fn is_pseudo_parameter(name: &str) -> bool {
    PSEUDO_PARAMETERS.contains(&name)
}

/// A typed value inside a declaration's property bag
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(Number),
    Bool(bool),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    /// Function evaluated by the provisioner, never by the composer
    Intrinsic(Box<Intrinsic>),
}

/// Intrinsic functions understood by the provisioner
#[derive(Debug, Clone, PartialEq)]
pub enum Intrinsic {
    /// `Ref`: a parameter, resource or pseudo parameter
    Ref(String),
    /// `Fn::GetAtt`: an attribute of a resource
    GetAtt { resource: String, attribute: String },
    /// `Fn::Join`: `values` is a list or a reference to a list parameter
    Join { delimiter: String, values: Value },
    /// `Fn::Sub`: `${Name}` placeholders with optional explicit variables
    Sub {
        template: String,
        variables: IndexMap<String, Value>,
    },
    /// `Fn::Select`
    Select { index: Value, list: Value },
    /// `Fn::Split`
    Split { delimiter: String, source: Value },
    /// `Fn::FindInMap`
    FindInMap {
        map: String,
        top_key: Value,
        second_key: Value,
    },
    /// `Fn::If`: picks a branch by condition name
    If {
        condition: String,
        then: Value,
        otherwise: Value,
    },
    /// `Fn::ImportValue`: cross-document export lookup
    ImportValue(Value),
    /// `Fn::Base64`
    Base64(Value),
    /// `Fn::GetAZs`
    GetAZs(Value),
}

impl Intrinsic {
    /// The serialized function key, e.g. `Fn::GetAtt`
    pub fn function_name(&self) -> &'static str {
        match self {
            Intrinsic::Ref(_) => "Ref",
            Intrinsic::GetAtt { .. } => "Fn::GetAtt",
            Intrinsic::Join { .. } => "Fn::Join",
            Intrinsic::Sub { .. } => "Fn::Sub",
            Intrinsic::Select { .. } => "Fn::Select",
            Intrinsic::Split { .. } => "Fn::Split",
            Intrinsic::FindInMap { .. } => "Fn::FindInMap",
            Intrinsic::If { .. } => "Fn::If",
            Intrinsic::ImportValue(_) => "Fn::ImportValue",
            Intrinsic::Base64(_) => "Fn::Base64",
            Intrinsic::GetAZs(_) => "Fn::GetAZs",
        }
    }

    /// Values nested directly inside this function's arguments
    fn arguments(&self) -> Vec<&Value> {
        match self {
            Intrinsic::Ref(_) | Intrinsic::GetAtt { .. } => vec![],
            Intrinsic::Join { values, .. } => vec![values],
            Intrinsic::Sub { variables, .. } => variables.values().collect(),
            Intrinsic::Select { index, list } => vec![index, list],
            Intrinsic::Split { source, .. } => vec![source],
            Intrinsic::FindInMap {
                top_key,
                second_key,
                ..
            } => vec![top_key, second_key],
            Intrinsic::If {
                then, otherwise, ..
            } => vec![then, otherwise],
            Intrinsic::ImportValue(v) | Intrinsic::Base64(v) | Intrinsic::GetAZs(v) => vec![v],
        }
    }

    fn to_json(&self) -> Json {
        let body = match self {
            Intrinsic::Ref(id) => json!(id),
            Intrinsic::GetAtt {
                resource,
                attribute,
            } => json!([resource, attribute]),
            Intrinsic::Join { delimiter, values } => json!([delimiter, values.to_json()]),
            Intrinsic::Sub {
                template,
                variables,
            } => {
                if variables.is_empty() {
                    json!(template)
                } else {
                    json!([template, map_to_json(variables)])
                }
            }
            Intrinsic::Select { index, list } => json!([index.to_json(), list.to_json()]),
            Intrinsic::Split { delimiter, source } => json!([delimiter, source.to_json()]),
            Intrinsic::FindInMap {
                map,
                top_key,
                second_key,
            } => json!([map, top_key.to_json(), second_key.to_json()]),
            Intrinsic::If {
                condition,
                then,
                otherwise,
            } => json!([condition, then.to_json(), otherwise.to_json()]),
            Intrinsic::ImportValue(v) | Intrinsic::Base64(v) | Intrinsic::GetAZs(v) => v.to_json(),
        };
        let mut obj = Map::new();
        obj.insert(self.function_name().to_string(), body);
        Json::Object(obj)
    }

    fn from_json(name: &str, body: &Json) -> Result<Option<Self>, ComposeError> {
        let intrinsic = match name {
            "Ref" => Intrinsic::Ref(expect_str(name, body)?.to_string()),
            "Fn::GetAtt" => match body {
                // short form: "Resource.Attribute", split on the first dot
                Json::String(s) => {
                    let (resource, attribute) = s.split_once('.').ok_or_else(|| {
                        ComposeError::parse(format!("Fn::GetAtt '{s}' has no attribute"))
                    })?;
                    Intrinsic::GetAtt {
                        resource: resource.to_string(),
                        attribute: attribute.to_string(),
                    }
                }
                _ => {
                    let args = expect_args(name, body, 2)?;
                    Intrinsic::GetAtt {
                        resource: expect_str(name, &args[0])?.to_string(),
                        attribute: expect_str(name, &args[1])?.to_string(),
                    }
                }
            },
            "Fn::Join" => {
                let args = expect_args(name, body, 2)?;
                Intrinsic::Join {
                    delimiter: expect_str(name, &args[0])?.to_string(),
                    values: Value::from_json(&args[1])?,
                }
            }
            "Fn::Sub" => match body {
                Json::String(s) => Intrinsic::Sub {
                    template: s.clone(),
                    variables: IndexMap::new(),
                },
                _ => {
                    let args = expect_args(name, body, 2)?;
                    let vars = match &args[1] {
                        Json::Object(obj) => obj
                            .iter()
                            .map(|(k, v)| Ok((k.clone(), Value::from_json(v)?)))
                            .collect::<Result<IndexMap<_, _>, ComposeError>>()?,
                        _ => return Err(ComposeError::parse("Fn::Sub variables must be an object")),
                    };
                    Intrinsic::Sub {
                        template: expect_str(name, &args[0])?.to_string(),
                        variables: vars,
                    }
                }
            },
            "Fn::Select" => {
                let args = expect_args(name, body, 2)?;
                Intrinsic::Select {
                    index: Value::from_json(&args[0])?,
                    list: Value::from_json(&args[1])?,
                }
            }
            "Fn::Split" => {
                let args = expect_args(name, body, 2)?;
                Intrinsic::Split {
                    delimiter: expect_str(name, &args[0])?.to_string(),
                    source: Value::from_json(&args[1])?,
                }
            }
            "Fn::FindInMap" => {
                let args = expect_args(name, body, 3)?;
                Intrinsic::FindInMap {
                    map: expect_str(name, &args[0])?.to_string(),
                    top_key: Value::from_json(&args[1])?,
                    second_key: Value::from_json(&args[2])?,
                }
            }
            "Fn::If" => {
                let args = expect_args(name, body, 3)?;
                Intrinsic::If {
                    condition: expect_str(name, &args[0])?.to_string(),
                    then: Value::from_json(&args[1])?,
                    otherwise: Value::from_json(&args[2])?,
                }
            }
            "Fn::ImportValue" => Intrinsic::ImportValue(Value::from_json(body)?),
            "Fn::Base64" => Intrinsic::Base64(Value::from_json(body)?),
            "Fn::GetAZs" => Intrinsic::GetAZs(Value::from_json(body)?),
            _ => return Ok(None),
        };
        Ok(Some(intrinsic))
    }
}

fn expect_str<'a>(function: &str, value: &'a Json) -> Result<&'a str, ComposeError> {
    value
        .as_str()
        .ok_or_else(|| ComposeError::parse(format!("{function} expects a string argument")))
}

fn expect_args<'a>(
    function: &str,
    value: &'a Json,
    count: usize,
) -> Result<&'a [Json], ComposeError> {
    match value.as_array() {
        Some(args) if args.len() == count => Ok(args.as_slice()),
        _ => Err(ComposeError::parse(format!(
            "{function} expects a list of {count} arguments"
        ))),
    }
}

fn map_to_json(map: &IndexMap<String, Value>) -> Json {
    Json::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

impl Value {
    /// `Ref` to a parameter, resource or pseudo parameter
    pub fn reference(id: impl Into<String>) -> Self {
        Self::intrinsic(Intrinsic::Ref(id.into()))
    }

    /// `Fn::GetAtt`
    pub fn get_att(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::intrinsic(Intrinsic::GetAtt {
            resource: resource.into(),
            attribute: attribute.into(),
        })
    }

    /// `Fn::Join` over a list of values
    pub fn join<I, V>(delimiter: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::intrinsic(Intrinsic::Join {
            delimiter: delimiter.into(),
            values: Value::list(values),
        })
    }

    /// `Fn::Join` over a list-typed value such as a `List<...>` parameter
    pub fn join_list(delimiter: impl Into<String>, values: Value) -> Self {
        Self::intrinsic(Intrinsic::Join {
            delimiter: delimiter.into(),
            values,
        })
    }

    /// `Fn::Sub` with only implicit variables
    pub fn sub(template: impl Into<String>) -> Self {
        Self::intrinsic(Intrinsic::Sub {
            template: template.into(),
            variables: IndexMap::new(),
        })
    }

    /// `Fn::Sub` with an explicit variable map
    pub fn sub_with<I, K>(template: impl Into<String>, variables: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::intrinsic(Intrinsic::Sub {
            template: template.into(),
            variables: variables.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        })
    }

    /// `Fn::Select`
    pub fn select(index: u32, list: Value) -> Self {
        Self::intrinsic(Intrinsic::Select {
            index: Value::from(index),
            list,
        })
    }

    /// `Fn::Split`
    pub fn split(delimiter: impl Into<String>, source: Value) -> Self {
        Self::intrinsic(Intrinsic::Split {
            delimiter: delimiter.into(),
            source,
        })
    }

    /// `Fn::FindInMap`
    pub fn find_in_map(
        map: impl Into<String>,
        top_key: impl Into<Value>,
        second_key: impl Into<Value>,
    ) -> Self {
        Self::intrinsic(Intrinsic::FindInMap {
            map: map.into(),
            top_key: top_key.into(),
            second_key: second_key.into(),
        })
    }

    /// `Fn::If`
    pub fn if_else(
        condition: impl Into<String>,
        then: impl Into<Value>,
        otherwise: impl Into<Value>,
    ) -> Self {
        Self::intrinsic(Intrinsic::If {
            condition: condition.into(),
            then: then.into(),
            otherwise: otherwise.into(),
        })
    }

    /// `Fn::ImportValue` of a literal export name
    pub fn import(name: impl Into<Value>) -> Self {
        Self::intrinsic(Intrinsic::ImportValue(name.into()))
    }

    /// `Fn::Base64`
    pub fn base64(value: impl Into<Value>) -> Self {
        Self::intrinsic(Intrinsic::Base64(value.into()))
    }

    /// `Fn::GetAZs` for the current region
    pub fn get_azs() -> Self {
        Self::intrinsic(Intrinsic::GetAZs(Value::from("")))
    }

    /// `Ref: AWS::NoValue`, removes the property when used in a branch
    pub fn no_value() -> Self {
        Self::reference("AWS::NoValue")
    }

    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(values.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Resource tag list in `[{Key, Value}]` form
    pub fn tags<I, K>(tags: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::List(
            tags.into_iter()
                .map(|(k, v)| Value::map([("Key", Value::String(k.into())), ("Value", v)]))
                .collect(),
        )
    }

    fn intrinsic(f: Intrinsic) -> Self {
        Value::Intrinsic(Box::new(f))
    }

    /// The intrinsic function, if this value is one
    pub fn as_intrinsic(&self) -> Option<&Intrinsic> {
        match self {
            Value::Intrinsic(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Textual form of a scalar literal, as the provisioner compares it
    pub fn literal_text(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Whether this value contains no intrinsic function at any depth
    pub fn is_literal(&self) -> bool {
        self.intrinsics().is_empty()
    }

    /// All intrinsic functions at any depth, outermost first
    pub fn intrinsics(&self) -> Vec<&Intrinsic> {
        let mut out = Vec::new();
        self.collect_intrinsics(&mut out);
        out
    }

    fn collect_intrinsics<'a>(&'a self, out: &mut Vec<&'a Intrinsic>) {
        match self {
            Value::List(items) => items.iter().for_each(|v| v.collect_intrinsics(out)),
            Value::Map(entries) => entries.values().for_each(|v| v.collect_intrinsics(out)),
            Value::Intrinsic(f) => {
                out.push(f);
                for arg in f.arguments() {
                    arg.collect_intrinsics(out);
                }
            }
            Value::String(_) | Value::Number(_) | Value::Bool(_) => {}
        }
    }

    /// Serialize to template JSON
    pub fn to_json(&self) -> Json {
        match self {
            Value::String(s) => Json::String(s.clone()),
            Value::Number(n) => Json::Number(n.clone()),
            Value::Bool(b) => Json::Bool(*b),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(entries) => map_to_json(entries),
            Value::Intrinsic(f) => f.to_json(),
        }
    }

    /// Parse template JSON, recognising single-key intrinsic objects
    pub fn from_json(json: &Json) -> Result<Self, ComposeError> {
        match json {
            Json::Null => Err(ComposeError::parse("null is not a valid template value")),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => Ok(Value::Number(n.clone())),
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Array(items) => Ok(Value::List(
                items.iter().map(Value::from_json).collect::<Result<_, _>>()?,
            )),
            Json::Object(obj) => {
                if obj.len() == 1 {
                    if let Some((name, body)) = obj.iter().next() {
                        if let Some(f) = Intrinsic::from_json(name, body)? {
                            return Ok(Value::intrinsic(f));
                        }
                    }
                }
                Ok(Value::Map(
                    obj.iter()
                        .map(|(k, v)| Ok((k.clone(), Value::from_json(v)?)))
                        .collect::<Result<_, ComposeError>>()?,
                ))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ref_serializes_as_placeholder() {
        assert_eq!(Value::reference("VPC").to_json(), json!({"Ref": "VPC"}));
    }

    #[test]
    fn test_sub_without_variables_is_a_plain_string() {
        let v = Value::sub("alias/${AWS::StackName}");
        assert_eq!(v.to_json(), json!({"Fn::Sub": "alias/${AWS::StackName}"}));
    }

    #[test]
    fn test_sub_with_variables() {
        let v = Value::sub_with(
            "${StackName} Jira Node",
            [("StackName", Value::reference("AWS::StackName"))],
        );
        assert_eq!(
            v.to_json(),
            json!({"Fn::Sub": ["${StackName} Jira Node", {"StackName": {"Ref": "AWS::StackName"}}]})
        );
    }

    #[test]
    fn test_nested_select_split_import() {
        let v = Value::select(0, Value::split(",", Value::import("ATL-PriNets")));
        assert_eq!(
            v.to_json(),
            json!({"Fn::Select": [0, {"Fn::Split": [",", {"Fn::ImportValue": "ATL-PriNets"}]}]})
        );
    }

    #[test]
    fn test_tags_form_key_value_list() {
        let v = Value::tags([("Name", Value::from("Bastion"))]);
        assert_eq!(v.to_json(), json!([{"Key": "Name", "Value": "Bastion"}]));
    }

    #[test]
    fn test_intrinsics_walks_all_depths() {
        let v = Value::if_else(
            "UseHostedZone",
            Value::join(".", [Value::reference("AWS::StackName"), Value::reference("HostedZone")]),
            Value::get_att("LoadBalancer", "DNSName"),
        );
        let names: Vec<&str> = v.intrinsics().iter().map(|f| f.function_name()).collect();
        assert_eq!(names, vec!["Fn::If", "Fn::Join", "Ref", "Ref", "Fn::GetAtt"]);
    }

    #[test]
    fn test_from_json_recovers_intrinsics() {
        let json = json!({
            "Fn::If": ["DoSSL", {"Ref": "Cert"}, {"Ref": "AWS::NoValue"}]
        });
        let v = Value::from_json(&json).expect("Should parse");
        assert_eq!(v, Value::if_else("DoSSL", Value::reference("Cert"), Value::no_value()));
        assert_eq!(v.to_json(), json);
    }

    #[test]
    fn test_from_json_plain_object_is_map() {
        let json = json!({"Key": "Name", "Value": "x"});
        let v = Value::from_json(&json).expect("Should parse");
        assert!(matches!(v, Value::Map(_)));
    }

    #[test]
    fn test_from_json_rejects_null() {
        assert!(Value::from_json(&Json::Null).is_err());
    }

    #[test]
    fn test_from_json_rejects_bad_arity() {
        let json = json!({"Fn::GetAtt": ["OnlyOne"]});
        assert!(Value::from_json(&json).is_err());
    }

    #[test]
    fn test_from_json_get_att_short_form() {
        let json = json!({"Fn::GetAtt": "VPCStack.Outputs.VPCID"});
        let v = Value::from_json(&json).expect("Should parse");
        assert_eq!(v, Value::get_att("VPCStack", "Outputs.VPCID"));
        assert_eq!(v.to_json(), json!({"Fn::GetAtt": ["VPCStack", "Outputs.VPCID"]}));
        assert!(Value::from_json(&json!({"Fn::GetAtt": "NoAttribute"})).is_err());
    }

    #[test]
    fn test_literal_text() {
        assert_eq!(Value::from(true).literal_text(), Some("true".to_string()));
        assert_eq!(Value::from(20).literal_text(), Some("20".to_string()));
        assert_eq!(Value::reference("X").literal_text(), None);
    }
}
