//! Condition expressions: a small boolean algebra over parameter values

use serde_json::{json, Map, Value as Json};

use super::error::ComposeError;
use super::value::Value;

/// CloudFormation bounds on `Fn::And` / `Fn::Or` operand counts
const MIN_OPERANDS: usize = 2;
const MAX_OPERANDS: usize = 10;

/// A boolean expression tree gating resources and outputs
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionExpr {
    /// `Fn::Equals`
    Equals(Value, Value),
    /// `Fn::And`
    And(Vec<ConditionExpr>),
    /// `Fn::Or`
    Or(Vec<ConditionExpr>),
    /// `Fn::Not`
    Not(Box<ConditionExpr>),
    /// Reference to another named condition
    Condition(String),
}

impl ConditionExpr {
    pub fn equals(left: impl Into<Value>, right: impl Into<Value>) -> Self {
        Self::Equals(left.into(), right.into())
    }

    pub fn and(operands: impl IntoIterator<Item = ConditionExpr>) -> Self {
        Self::And(operands.into_iter().collect())
    }

    pub fn or(operands: impl IntoIterator<Item = ConditionExpr>) -> Self {
        Self::Or(operands.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: ConditionExpr) -> Self {
        Self::Not(Box::new(operand))
    }

    pub fn condition(name: impl Into<String>) -> Self {
        Self::Condition(name.into())
    }

    /// `Not(Equals(value, ""))`, the usual "parameter was provided" test
    pub fn is_set(value: impl Into<Value>) -> Self {
        Self::not(Self::equals(value, ""))
    }

    /// Names of conditions referenced anywhere in the tree
    pub fn condition_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.visit(&mut |expr| {
            if let ConditionExpr::Condition(name) = expr {
                out.push(name.as_str());
            }
        });
        out
    }

    /// Operand values of every `Equals` node
    pub fn operands(&self) -> Vec<&Value> {
        let mut out = Vec::new();
        self.visit(&mut |expr| {
            if let ConditionExpr::Equals(l, r) = expr {
                out.push(l);
                out.push(r);
            }
        });
        out
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a ConditionExpr)) {
        f(self);
        match self {
            ConditionExpr::And(ops) | ConditionExpr::Or(ops) => {
                for op in ops {
                    op.visit(&mut *f);
                }
            }
            ConditionExpr::Not(inner) => inner.visit(&mut *f),
            ConditionExpr::Equals(..) | ConditionExpr::Condition(_) => {}
        }
    }

    /// Check `And`/`Or` operand counts for the named condition
    pub fn check_arity(&self, name: &str) -> Result<(), ComposeError> {
        let mut result = Ok(());
        self.visit(&mut |expr| {
            if result.is_err() {
                return;
            }
            let (op, count) = match expr {
                ConditionExpr::And(ops) => ("Fn::And", ops.len()),
                ConditionExpr::Or(ops) => ("Fn::Or", ops.len()),
                _ => return,
            };
            if !(MIN_OPERANDS..=MAX_OPERANDS).contains(&count) {
                result = Err(ComposeError::expression(
                    name,
                    format!("{op} takes {MIN_OPERANDS} to {MAX_OPERANDS} operands, got {count}"),
                ));
            }
        });
        result
    }

    pub fn to_json(&self) -> Json {
        let (key, body) = match self {
            ConditionExpr::Equals(l, r) => ("Fn::Equals", json!([l.to_json(), r.to_json()])),
            ConditionExpr::And(ops) => (
                "Fn::And",
                Json::Array(ops.iter().map(ConditionExpr::to_json).collect()),
            ),
            ConditionExpr::Or(ops) => (
                "Fn::Or",
                Json::Array(ops.iter().map(ConditionExpr::to_json).collect()),
            ),
            ConditionExpr::Not(inner) => ("Fn::Not", json!([inner.to_json()])),
            ConditionExpr::Condition(name) => ("Condition", json!(name)),
        };
        let mut obj = Map::new();
        obj.insert(key.to_string(), body);
        Json::Object(obj)
    }

    pub fn from_json(json: &Json) -> Result<Self, ComposeError> {
        let (key, body) = match json.as_object() {
            Some(obj) if obj.len() == 1 => obj
                .iter()
                .next()
                .ok_or_else(|| ComposeError::parse("empty condition expression"))?,
            _ => {
                return Err(ComposeError::parse(
                    "condition expression must be a single-key object",
                ))
            }
        };
        let args = || {
            body.as_array()
                .ok_or_else(|| ComposeError::parse(format!("{key} expects a list")))
        };
        match key.as_str() {
            "Fn::Equals" => match args()?.as_slice() {
                [l, r] => Ok(Self::Equals(Value::from_json(l)?, Value::from_json(r)?)),
                _ => Err(ComposeError::parse("Fn::Equals expects two operands")),
            },
            "Fn::And" => Ok(Self::And(
                args()?.iter().map(Self::from_json).collect::<Result<_, _>>()?,
            )),
            "Fn::Or" => Ok(Self::Or(
                args()?.iter().map(Self::from_json).collect::<Result<_, _>>()?,
            )),
            "Fn::Not" => match args()?.as_slice() {
                [inner] => Ok(Self::not(Self::from_json(inner)?)),
                _ => Err(ComposeError::parse("Fn::Not expects one operand")),
            },
            "Condition" => body
                .as_str()
                .map(Self::condition)
                .ok_or_else(|| ComposeError::parse("Condition expects a name")),
            other => Err(ComposeError::parse(format!(
                "unsupported condition function '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_condition_names_collects_nested_refs() {
        let expr = ConditionExpr::and([
            ConditionExpr::condition("PrivateSubnetsCondition"),
            ConditionExpr::or([
                ConditionExpr::equals(Value::reference("NumberOfAZs"), "3"),
                ConditionExpr::condition("4AZCondition"),
            ]),
        ]);
        assert_eq!(
            expr.condition_names(),
            vec!["PrivateSubnetsCondition", "4AZCondition"]
        );
    }

    #[test]
    fn test_is_set_serialization() {
        let expr = ConditionExpr::is_set(Value::reference("HostedZone"));
        assert_eq!(
            expr.to_json(),
            json!({"Fn::Not": [{"Fn::Equals": [{"Ref": "HostedZone"}, ""]}]})
        );
    }

    #[test]
    fn test_arity_rejects_single_operand() {
        let expr = ConditionExpr::and([ConditionExpr::condition("A")]);
        let err = expr.check_arity("Broken").unwrap_err();
        assert!(err.to_string().contains("Fn::And takes 2 to 10 operands, got 1"));
    }

    #[test]
    fn test_arity_accepts_pairs() {
        let expr =
            ConditionExpr::or([ConditionExpr::condition("A"), ConditionExpr::condition("B")]);
        assert!(expr.check_arity("Ok").is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let expr = ConditionExpr::and([
            ConditionExpr::equals(Value::reference("CreatePrivateSubnets"), "true"),
            ConditionExpr::not(ConditionExpr::condition("GovCloudCondition")),
        ]);
        let parsed = ConditionExpr::from_json(&expr.to_json()).expect("Should parse");
        assert_eq!(parsed, expr);
    }

    #[test]
    fn test_from_json_unknown_function() {
        let result = ConditionExpr::from_json(&json!({"Fn::Xor": []}));
        assert!(result.is_err());
    }
}
