//! Declarations shared by several generators

use crate::config::ComposerConfig;
use crate::template::{ComposeError, ConditionExpr, Parameter, Template, Value};

/// IPv4 CIDR with a /16 to /28 prefix
pub const CIDR_16_28_PATTERN: &str = r"^(([0-9]|[1-9][0-9]|1[0-9]{2}|2[0-4][0-9]|25[0-5])\.){3}([0-9]|[1-9][0-9]|1[0-9]{2}|2[0-4][0-9]|25[0-5])(\/(1[6-9]|2[0-8]))$";

/// IPv4 CIDR with any prefix length
pub const CIDR_PATTERN: &str = r"^(([0-9]|[1-9][0-9]|1[0-9]{2}|2[0-4][0-9]|25[0-5])\.){3}([0-9]|[1-9][0-9]|1[0-9]{2}|2[0-4][0-9]|25[0-5])(\/([0-9]|[1-2][0-9]|3[0-2]))$";

/// Loose `x.x.x.x/x` form used for access ranges
pub const ACCESS_CIDR_PATTERN: &str = r"(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})/(\d{1,2})";

pub const GOV_CLOUD_CONDITION: &str = "GovCloudCondition";

/// A CIDR block parameter with the default and pattern given
pub fn cidr_parameter(id: &str, default: &str, pattern: &str, description: &str) -> Parameter {
    let param = Parameter::string(id)
        .with_default(default)
        .with_allowed_pattern(pattern)
        .with_description(description);
    if pattern == CIDR_16_28_PATTERN {
        param.with_constraint_description("CIDR block parameter must be in the form x.x.x.x/16-28")
    } else {
        param
    }
}

/// An access range parameter in loose `x.x.x.x/x` form, 9 to 18 characters
pub fn access_cidr_parameter(id: &str, description: &str) -> Parameter {
    Parameter::string(id)
        .with_allowed_pattern(ACCESS_CIDR_PATTERN)
        .with_length(9, 18)
        .with_constraint_description("Must be a valid IP CIDR range of the form x.x.x.x/x.")
        .with_description(description)
}

/// The `QSS3BucketName` and `QSS3KeyPrefix` parameters for nested template URLs
pub fn add_asset_parameters(t: &mut Template, config: &ComposerConfig) -> Result<(), ComposeError> {
    t.add_parameter(
        Parameter::string("QSS3BucketName")
            .with_default(config.bucket.as_str())
            .with_allowed_pattern("^[0-9a-zA-Z]+([0-9a-zA-Z-]*[0-9a-zA-Z])*$")
            .with_constraint_description(
                "Quick Start bucket name can include numbers, lowercase letters, uppercase letters, and hyphens (-). It cannot start or end with a hyphen (-).",
            )
            .with_description("S3 bucket name for the Quick Start assets."),
    )?;
    t.add_parameter(
        Parameter::string("QSS3KeyPrefix")
            .with_default(config.key_prefix.as_str())
            .with_allowed_pattern("^[0-9a-zA-Z-/]*$")
            .with_constraint_description(
                "Quick Start key prefix can include numbers, lowercase letters, uppercase letters, hyphens (-), and forward slash (/).",
            )
            .with_description("S3 key prefix for the Quick Start assets."),
    )?;
    Ok(())
}

/// `GovCloudCondition`: the stack runs in the GovCloud partition
pub fn add_gov_cloud_condition(t: &mut Template) -> Result<ConditionExpr, ComposeError> {
    t.add_condition(
        GOV_CLOUD_CONDITION,
        ConditionExpr::equals(Value::reference("AWS::Region"), "us-gov-west-1"),
    )
}

/// URL of a child template in the asset bucket
///
/// GovCloud buckets are served from a region-specific endpoint.
pub fn asset_url(key: &str) -> Value {
    Value::sub_with(
        format!("https://${{QSS3BucketName}}.${{QSS3Region}}.amazonaws.com/${{QSS3KeyPrefix}}{key}"),
        [(
            "QSS3Region",
            Value::if_else(GOV_CLOUD_CONDITION, "s3-us-gov-west-1", "s3"),
        )],
    )
}

/// `Fn::Sub` export name scoped to the current stack
pub fn stack_export(name: &str) -> Value {
    Value::sub(format!("${{AWS::StackName}}-{name}"))
}

/// `Fn::Split` of a comma-delimited import into a list
pub fn split_import(name: &str) -> Value {
    Value::split(",", Value::import(name))
}

/// Mapping of AWS partition and asset endpoint per region
pub fn region_map() -> crate::template::Mapping {
    const REGIONS: &[&str] = &[
        "ap-northeast-1",
        "ap-northeast-2",
        "ap-south-1",
        "ap-southeast-1",
        "ap-southeast-2",
        "eu-central-1",
        "eu-west-1",
        "sa-east-1",
        "us-east-1",
        "us-west-1",
        "us-west-2",
    ];
    let mut mapping = crate::template::Mapping::new("AWSInfoRegionMap");
    for region in REGIONS {
        mapping = mapping.entry(
            *region,
            [("Partition", "aws"), ("QuickStartS3URL", "https://s3.amazonaws.com")],
        );
    }
    mapping.entry(
        "us-gov-west-1",
        [
            ("Partition", "aws-us-gov"),
            ("QuickStartS3URL", "https://s3-us-gov-west-1.amazonaws.com"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::check_parameter;
    use serde_json::json;

    #[test]
    fn test_asset_url_shape() {
        assert_eq!(
            asset_url("templates/x.yaml").to_json(),
            json!({"Fn::Sub": [
                "https://${QSS3BucketName}.${QSS3Region}.amazonaws.com/${QSS3KeyPrefix}templates/x.yaml",
                {"QSS3Region": {"Fn::If": ["GovCloudCondition", "s3-us-gov-west-1", "s3"]}}
            ]})
        );
    }

    #[test]
    fn test_cidr_defaults_satisfy_patterns() {
        let check = |default: &str, pattern: &str| {
            check_parameter(&cidr_parameter("CIDR", default, pattern, ""))
        };
        assert!(check("10.0.128.0/20", CIDR_16_28_PATTERN).is_ok());
        assert!(check("10.0.0.0/8", CIDR_PATTERN).is_ok());
        assert!(check("10.0.0.0/8", CIDR_16_28_PATTERN).is_err());
    }

    #[test]
    fn test_access_cidr_accepts_open_range() {
        let param = access_cidr_parameter("AccessCIDR", "").with_default("0.0.0.0/0");
        assert!(check_parameter(&param).is_ok());
    }

    #[test]
    fn test_stack_export() {
        assert_eq!(stack_export("VPCID").to_json(), json!({"Fn::Sub": "${AWS::StackName}-VPCID"}));
    }
}
