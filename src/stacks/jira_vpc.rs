//! Shared Atlassian VPC: a nested VPC stack plus a bastion host
//!
//! The subnets, VPC and default key pair are exported under the configured
//! prefix so product stacks can import them.

use super::common::{
    access_cidr_parameter, add_asset_parameters, add_gov_cloud_condition, asset_url, cidr_parameter,
    region_map, CIDR_PATTERN,
};
use super::{bastion, vpc};
use crate::config::ComposerConfig;
use crate::template::{
    ChildInterface, ComposeError, NestedStack, Output, Parameter, Template, Value,
};

const DESCRIPTION: &str = "Atlassian Standard Infrastructure (ASI): a VPC with public and private subnets and a bastion host, exported for Atlassian product stacks";

const VPC_TEMPLATE: &str = "submodules/quickstart-aws-vpc/templates/aws-vpc.template";
const BASTION_TEMPLATE: &str = "quickstarts/quickstart-bastion-for-atlassian-services.yaml";

pub fn build(config: &ComposerConfig) -> Result<Template, ComposeError> {
    let mut t = Template::new().with_description(config.describe(DESCRIPTION));

    for (id, default, label) in [
        ("PrivateSubnet1CIDR", "10.0.0.0/19", "private subnet 1"),
        ("VPCCIDR", "10.0.0.0/16", "the VPC"),
        ("PublicSubnet1CIDR", "10.0.128.0/20", "public subnet 1"),
        ("PrivateSubnet2CIDR", "10.0.32.0/19", "private subnet 2"),
        ("PublicSubnet2CIDR", "10.0.144.0/20", "public subnet 2"),
    ] {
        let description = format!("CIDR block for {label}");
        t.add_parameter(cidr_parameter(id, default, CIDR_PATTERN, &description))?;
    }
    add_asset_parameters(&mut t, config)?;
    t.add_parameter(
        Parameter::string("NATInstanceType")
            .with_default("t2.small")
            .with_allowed_values([
                "t2.nano",
                "t2.micro",
                "t2.small",
                "t2.medium",
                "t2.large",
                "m3.medium",
                "m3.large",
                "m4.large",
            ])
            .with_description("Amazon EC2 instance type for the NAT instances"),
    )?;
    t.add_parameter(access_cidr_parameter(
        "AccessCIDR",
        "The CIDR IP range that is permitted to access the bastion host. Use 0.0.0.0/0 to allow access from any address.",
    ))?;
    let azs = t.add_parameter(
        Parameter::new("AvailabilityZones", "List<AWS::EC2::AvailabilityZone::Name>")
            .with_description(
                "List of Availability Zones to use for the subnets in the VPC. Only two are used, in the order given.",
            ),
    )?;
    t.add_parameter(
        Parameter::new("KeyPairName", "AWS::EC2::KeyPair::KeyName")
            .with_description("Public/private key pair used to connect to the bastion host"),
    )?;

    add_gov_cloud_condition(&mut t)?;
    t.add_mapping(region_map())?;

    let vpc_stack = NestedStack::new("VPCStack", asset_url(VPC_TEMPLATE))
        .parameter("NATInstanceType", Value::reference("NATInstanceType"))
        .parameter("PrivateSubnet1ACIDR", Value::reference("PrivateSubnet1CIDR"))
        .parameter("NumberOfAZs", "2")
        .parameter("PublicSubnet1CIDR", Value::reference("PublicSubnet1CIDR"))
        .parameter("VPCCIDR", Value::reference("VPCCIDR"))
        .parameter("AvailabilityZones", Value::join_list(",", azs))
        .parameter("PrivateSubnet2ACIDR", Value::reference("PrivateSubnet2CIDR"))
        .parameter("PublicSubnet2CIDR", Value::reference("PublicSubnet2CIDR"))
        .parameter("KeyPairName", Value::reference("KeyPairName"))
        .with_interface(ChildInterface::of(&vpc::build(config)?));
    t.add_nested_stack(vpc_stack)?;

    let bastion_stack = NestedStack::new("BastionStack", asset_url(BASTION_TEMPLATE))
        .parameter("Subnet", Template::stack_output("VPCStack", "PublicSubnet1ID"))
        .parameter("KeyName", Value::reference("KeyPairName"))
        .parameter("VPC", Template::stack_output("VPCStack", "VPCID"))
        .parameter("AccessCIDR", Value::reference("AccessCIDR"))
        .depends_on("VPCStack")
        .with_interface(ChildInterface::of(&bastion::build(config)?));
    t.add_nested_stack(bastion_stack)?;

    let subnets = |a: &str, b: &str| {
        Value::join(
            ",",
            [Template::stack_output("VPCStack", a), Template::stack_output("VPCStack", b)],
        )
    };
    t.add_output(
        Output::new("PublicSubnets", subnets("PublicSubnet1ID", "PublicSubnet2ID"))
            .with_description("A list of Public subnets")
            .with_export(config.export_name("PubNets")),
    )?;
    t.add_output(
        Output::new("VPCID", Template::stack_output("VPCStack", "VPCID"))
            .with_description("The ID of the VPC")
            .with_export(config.export_name("VPCID")),
    )?;
    t.add_output(
        Output::new("BastionPubIp", Template::stack_output("BastionStack", "BastionPubIp"))
            .with_description("The Public IP to ssh to the Bastion"),
    )?;
    t.add_output(
        Output::new("DefaultKey", Value::reference("KeyPairName"))
            .with_description("The default key pair for Atlassian product instances")
            .with_export(config.export_name("DefaultKey")),
    )?;
    t.add_output(
        Output::new("PrivateSubnets", subnets("PrivateSubnet1AID", "PrivateSubnet2AID"))
            .with_description("A list of Private subnets")
            .with_export(config.export_name("PriNets")),
    )?;

    tracing::info!(generator = "jira-vpc", "template built");
    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_exports_follow_prefix() {
        let t = build(&ComposerConfig::default().with_export_prefix("QA")).expect("Should build");
        let names: Vec<&str> = t.export_names().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["QA-PubNets", "QA-VPCID", "QA-DefaultKey", "QA-PriNets"]);
    }

    #[test]
    fn test_bastion_reads_vpc_outputs() {
        let doc = build(&ComposerConfig::default())
            .and_then(|t| t.to_document())
            .expect("Should serialize");
        let bastion = &doc["Resources"]["BastionStack"];
        assert_eq!(bastion["DependsOn"], json!("VPCStack"));
        assert_eq!(
            bastion["Properties"]["Parameters"]["Subnet"],
            json!({"Fn::GetAtt": ["VPCStack", "Outputs.PublicSubnet1ID"]})
        );
        assert_eq!(
            doc["Resources"]["VPCStack"]["Properties"]["Parameters"]["AvailabilityZones"],
            json!({"Fn::Join": [",", {"Ref": "AvailabilityZones"}]})
        );
    }
}
