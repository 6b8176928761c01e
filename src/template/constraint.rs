//! Checks of parameter defaults against their declared constraints

use regex::Regex;

use super::declaration::Parameter;
use super::error::ComposeError;
use super::value::Value;

/// Validate a parameter's own declaration and its `Default`
///
/// The provisioner repeats these checks for supplied values at deploy time;
/// here they only catch templates that could never deploy with defaults.
pub fn check_parameter(param: &Parameter) -> Result<(), ComposeError> {
    let id = param.logical_id.as_str();

    if let Some(pattern) = &param.allowed_pattern {
        compile_pattern(id, pattern)?;
    }
    if let (Some(min), Some(max)) = (param.min_length, param.max_length) {
        if min > max {
            return Err(ComposeError::malformed(
                id,
                "MinLength",
                format!("{min} exceeds MaxLength {max}"),
            ));
        }
    }
    for allowed in &param.allowed_values {
        if allowed.literal_text().is_none() {
            return Err(ComposeError::malformed(id, "AllowedValues", "entries must be literals"));
        }
    }

    let Some(default) = &param.default else {
        return Ok(());
    };
    if !default.is_literal() {
        return Err(ComposeError::malformed(id, "Default", "must not contain intrinsic functions"));
    }

    match default.literal_text() {
        Some(text) => check_scalar(param, &text),
        // comma-delimited and List<...> defaults are lists of scalars
        None => match default {
            Value::List(items) if is_list_type(&param.param_type) => {
                for item in items {
                    let text = item.literal_text().ok_or_else(|| {
                        ComposeError::malformed(id, "Default", "list entries must be scalars")
                    })?;
                    check_scalar(param, &text)?;
                }
                Ok(())
            }
            _ => Err(ComposeError::malformed(id, "Default", "must be a scalar")),
        },
    }
}

fn is_list_type(param_type: &str) -> bool {
    param_type.starts_with("List<") || param_type == "CommaDelimitedList"
}

fn check_scalar(param: &Parameter, text: &str) -> Result<(), ComposeError> {
    let id = param.logical_id.as_str();

    if !param.allowed_values.is_empty()
        && !param
            .allowed_values
            .iter()
            .any(|v| v.literal_text().as_deref() == Some(text))
    {
        return Err(ComposeError::malformed(
            id,
            "Default",
            format!("'{text}' is not one of AllowedValues"),
        ));
    }

    if let Some(pattern) = &param.allowed_pattern {
        if !compile_pattern(id, pattern)?.is_match(text) {
            return Err(ComposeError::malformed(
                id,
                "Default",
                format!("'{text}' does not match AllowedPattern"),
            ));
        }
    }

    let len = text.chars().count() as u64;
    if let Some(min) = param.min_length {
        if len < min {
            return Err(ComposeError::malformed(
                id,
                "Default",
                format!("shorter than MinLength {min}"),
            ));
        }
    }
    if let Some(max) = param.max_length {
        if len > max {
            return Err(ComposeError::malformed(
                id,
                "Default",
                format!("longer than MaxLength {max}"),
            ));
        }
    }

    if param.param_type == "Number" || param.min_value.is_some() || param.max_value.is_some() {
        let n: f64 = text
            .parse()
            .map_err(|_| {
                ComposeError::malformed(id, "Default", format!("'{text}' is not a number"))
            })?;
        if let Some(min) = param.min_value.as_ref().and_then(|m| m.as_f64()) {
            if n < min {
                return Err(ComposeError::malformed(
                    id,
                    "Default",
                    format!("{n} is below MinValue {min}"),
                ));
            }
        }
        if let Some(max) = param.max_value.as_ref().and_then(|m| m.as_f64()) {
            if n > max {
                return Err(ComposeError::malformed(
                    id,
                    "Default",
                    format!("{n} is above MaxValue {max}"),
                ));
            }
        }
    }

    Ok(())
}

/// AllowedPattern must match the whole value
fn compile_pattern(id: &str, pattern: &str) -> Result<Regex, ComposeError> {
    Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| ComposeError::malformed(id, "AllowedPattern", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CIDR: &str = r"^(([0-9]|[1-9][0-9]|1[0-9]{2}|2[0-4][0-9]|25[0-5])\.){3}([0-9]|[1-9][0-9]|1[0-9]{2}|2[0-4][0-9]|25[0-5])(\/(1[6-9]|2[0-8]))$";

    #[test]
    fn test_cidr_default_matches() {
        let param = Parameter::string("VPCCIDR")
            .with_default("10.0.0.0/16")
            .with_allowed_pattern(CIDR);
        assert!(check_parameter(&param).is_ok());
    }

    #[test]
    fn test_cidr_default_outside_prefix_range() {
        let param = Parameter::string("VPCCIDR")
            .with_default("10.0.0.0/8")
            .with_allowed_pattern(CIDR);
        let err = check_parameter(&param).unwrap_err();
        assert!(matches!(err, ComposeError::MalformedPropertyValue { .. }));
    }

    #[test]
    fn test_pattern_is_anchored() {
        let param = Parameter::string("AccessCIDR")
            .with_default("0.0.0.0/0 trailing")
            .with_allowed_pattern(r"(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})/(\d{1,2})");
        assert!(check_parameter(&param).is_err());
    }

    #[test]
    fn test_allowed_values_compare_as_text() {
        let param = Parameter::string("MailEnabled")
            .with_default(true)
            .with_allowed_values([true, false]);
        assert!(check_parameter(&param).is_ok());

        let param = Parameter::string("NumberOfAZs")
            .with_default("5")
            .with_allowed_values(["2", "3", "4"]);
        assert!(check_parameter(&param).is_err());
    }

    #[test]
    fn test_length_bounds() {
        let param = Parameter::string("AccessCIDR").with_default("0.0.0.0/0").with_length(9, 18);
        assert!(check_parameter(&param).is_ok());

        let param = Parameter::string("Short").with_default("").with_length(8, 128);
        assert!(check_parameter(&param).is_err());
    }

    #[test]
    fn test_value_range() {
        let param = Parameter::number("DBIops").with_default(1000).with_range(1000, 30000);
        assert!(check_parameter(&param).is_ok());

        let param = Parameter::number("DBIops").with_default(500).with_range(1000, 30000);
        assert!(check_parameter(&param).is_err());
    }

    #[test]
    fn test_number_default_must_parse() {
        let param = Parameter::number("ClusterNodeMax").with_default("many");
        assert!(check_parameter(&param).is_err());
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let param = Parameter::string("Broken").with_allowed_pattern("([unclosed");
        let err = check_parameter(&param).unwrap_err();
        assert!(err.to_string().contains("AllowedPattern"));
    }

    #[test]
    fn test_intrinsic_default_rejected() {
        let param = Parameter::string("Region").with_default(Value::reference("AWS::Region"));
        assert!(check_parameter(&param).is_err());
    }
}
