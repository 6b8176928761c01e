//! Jira Data Center together with its own Atlassian VPC
//!
//! Both halves are nested stacks. The parent repeats every parameter of the
//! Jira child so a single deployment form covers the whole installation, and
//! the Jira stack waits for the VPC stack whose exports it imports.

use super::common::{

    add_asset_parameters, add_gov_cloud_condition, asset_url, cidr_parameter, CIDR_PATTERN,

};
use super::{jira_dc, jira_vpc};
use crate::config::ComposerConfig;
use crate::template::{
    ChildInterface, ComposeError, ConditionExpr, NestedStack, Output, Parameter, Template, Value,
};

const DESCRIPTION: &str = "Atlassian Jira Data Center with VPC";

const JIRA_TEMPLATE: &str = "templates/quickstart-jira-dc.template.yaml";
const VPC_TEMPLATE: &str = "submodules/quickstart-atlassian-services/templates/quickstart-vpc-for-atlassian-services.yaml";

/// Outputs of the Jira child surfaced unchanged: id, description
const JIRA_OUTPUTS: &[(&str, &str)] = &[
    ("SGname", "The name of the SecurityGroup"),
    ("DBEndpointAddress", "The Database Connection String"),
    ("LoadBalancerURL", "The Load Balancer URL"),
    ("ServiceURL", "The URL to access this Atlassian service"),
    ("EFSCname", "The cname of the EFS"),
];

pub fn build(config: &ComposerConfig) -> Result<Template, ComposeError> {
    let mut t = Template::new().with_description(config.describe(DESCRIPTION));

    let jira = jira_dc::build(config)?;
    let vpc = jira_vpc::build(config)?;

    for param in jira.parameters() {
        t.add_parameter(param.clone())?;
    }
    for (id, default, description) in [
        (
            "PrivateSubnet1CIDR",
            "10.0.0.0/19",
            "CIDR Block for private subnet 1 located in Availability Zone 1.",
        ),
        (
            "PrivateSubnet2CIDR",
            "10.0.32.0/19",
            "CIDR Block for private subnet 2 located in Availability Zone 2.",
        ),
        (
            "PublicSubnet1CIDR",
            "10.0.128.0/20",
            "CIDR Block for the public DMZ subnet 1 located in Availability Zone 1",
        ),
        (
            "PublicSubnet2CIDR",
            "10.0.144.0/20",
            "CIDR Block for the public DMZ subnet 2 located in Availability Zone 2",
        ),
        ("VPCCIDR", "10.0.0.0/16", "CIDR Block for the VPC"),
    ] {
        t.add_parameter(cidr_parameter(id, default, CIDR_PATTERN, description))?;
    }
    t.add_parameter(
        Parameter::string("AccessCIDR")
            .with_allowed_pattern(CIDR_PATTERN)
            .with_description(
                "CIDR Block allowed to access the bastion host. This should be set to a trusted IP range.",
            ),
    )?;
    let azs = t.add_parameter(
        Parameter::new("AvailabilityZones", "List<AWS::EC2::AvailabilityZone::Name>")
            .with_description(
                "List of Availability Zones to use for the subnets in the VPC. Note: You must specify 2 AZs here; if more are specified only the first 2 will be used.",
            ),
    )?;
    add_asset_parameters(&mut t, config)?;

    t.add_condition(
        "UseDatabaseEncryption",
        ConditionExpr::equals(Value::reference("DBStorageEncrypted"), "true"),
    )?;
    add_gov_cloud_condition(&mut t)?;

    let mut jira_stack =
        NestedStack::new("JiraDCStack", asset_url(JIRA_TEMPLATE)).depends_on("VPCStack");
    for param in jira.parameters() {
        jira_stack = jira_stack.parameter(&param.logical_id, Value::reference(&param.logical_id));
    }
    t.add_nested_stack(jira_stack.with_interface(ChildInterface::of(&jira)))?;

    let mut vpc_stack = NestedStack::new("VPCStack", asset_url(VPC_TEMPLATE));
    for id in [
        "PrivateSubnet1CIDR",
        "VPCCIDR",
        "PublicSubnet1CIDR",
        "PrivateSubnet2CIDR",
        "AccessCIDR",
    ] {
        vpc_stack = vpc_stack.parameter(id, Value::reference(id));
    }
    vpc_stack = vpc_stack
        .parameter("AvailabilityZones", Value::join_list(",", azs))
        .parameter("PublicSubnet2CIDR", Value::reference("PublicSubnet2CIDR"))
        .parameter("KeyPairName", Value::reference("KeyPairName"));
    t.add_nested_stack(vpc_stack.with_interface(ChildInterface::of(&vpc)))?;

    t.add_output(
        Output::new("DBEncryptionKey", Template::stack_output("JiraDCStack", "DBEncryptionKey"))
            .with_description("The alias of the encryption key created for RDS")
            .with_condition("UseDatabaseEncryption"),
    )?;
    t.add_output(
        Output::new("BastionIP", Template::stack_output("VPCStack", "BastionPubIp"))
            .with_description("Bastion node IP (use as a jumpbox to connect to the nodes)"),
    )?;
    for (id, description) in JIRA_OUTPUTS {
        t.add_output(
            Output::new(*id, Template::stack_output("JiraDCStack", id))
                .with_description(*description),
        )?;
    }

    tracing::info!(generator = "jira-dc-with-vpc", "template built");
    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_every_jira_parameter_is_forwarded() {
        let config = ComposerConfig::default();
        let jira = jira_dc::build(&config).expect("Should build");
        let t = build(&config).expect("Should build");
        let doc = t.to_document().expect("Should serialize");
        let passed = &doc["Resources"]["JiraDCStack"]["Properties"]["Parameters"];
        for param in jira.parameters() {
            let id = param.logical_id.as_str();
            assert_eq!(passed[id], json!({"Ref": id}));
            assert_eq!(t.parameter(id), Some(param));
        }
    }

    #[test]
    fn test_jira_waits_for_vpc() {
        let t = build(&ComposerConfig::default()).expect("Should build");
        let stack = t.resource("JiraDCStack").expect("stack");
        assert_eq!(stack.depends_on, vec!["VPCStack".to_string()]);
        assert_eq!(
            t.output("BastionIP").map(|o| o.value.to_json()),
            Some(json!({"Fn::GetAtt": ["VPCStack", "Outputs.BastionPubIp"]}))
        );
    }

    #[test]
    fn test_no_literal_exports() {
        let t = build(&ComposerConfig::default()).expect("Should build");
        assert!(t.export_names().is_empty());
        assert!(t.import_names().is_empty());
    }
}
