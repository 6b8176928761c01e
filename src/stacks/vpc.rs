//! Multi-AZ VPC with public, private and ACL-protected private subnets
//!
//! Between two and four Availability Zones are used, selected by the
//! `NumberOfAZs` parameter. Each zone gets a public subnet, and optionally a
//! private subnet routed through its own NAT gateway plus a second private
//! subnet behind a dedicated network ACL.

use super::common::{add_gov_cloud_condition, cidr_parameter, stack_export, CIDR_16_28_PATTERN};
use crate::config::ComposerConfig;
use crate::template::{ComposeError, ConditionExpr, Output, Parameter, Resource, Template, Value};

const DESCRIPTION: &str = "This template creates a Multi-AZ, multi-subnet VPC infrastructure with managed NAT gateways in the public subnet for each Availability Zone. You can also create additional private subnets with dedicated custom network access control lists (ACLs). **WARNING** This template creates AWS resources. You will be billed for the AWS resources used if you create a stack from this template. QS(0027)";

const TAG_PATTERN: &str = r#"^([a-zA-Z0-9+\-._:/@]+=[a-zA-Z0-9+\-.,_:/@ *\\"'\[\]\{\}]*)?$"#;
const TAG_CONSTRAINT: &str = r#"tags must be in format "Key=Value" keys can only contain [a-zA-Z0-9+\-._:/@], values can contain [a-zA-Z0-9+\-._:/@ *\\"'\[\]\{\}]"#;

const MAX_AZS: usize = 4;

const PUBLIC_CIDRS: [&str; MAX_AZS] = [
    "10.0.128.0/20",
    "10.0.144.0/20",
    "10.0.160.0/20",
    "10.0.176.0/20",
];
const PRIVATE_A_CIDRS: [&str; MAX_AZS] = [
    "10.0.0.0/19",
    "10.0.32.0/19",
    "10.0.64.0/19",
    "10.0.96.0/19",
];
const PRIVATE_B_CIDRS: [&str; MAX_AZS] = [
    "10.0.192.0/21",
    "10.0.200.0/21",
    "10.0.208.0/21",
    "10.0.216.0/21",
];

const PRIVATE_SUBNETS: &str = "PrivateSubnetsCondition";
const ADDITIONAL_PRIVATE_SUBNETS: &str = "AdditionalPrivateSubnetsCondition";

/// Subnet tier within one Availability Zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Public,
    PrivateA,
    PrivateB,
}

impl Tier {
    /// Condition gating the tier in AZ `az` (1-based)
    fn condition(self, az: usize) -> Option<String> {
        let base = match self {
            Tier::Public => None,
            Tier::PrivateA => Some("PrivateSubnets"),
            Tier::PrivateB => Some("AdditionalPrivateSubnets"),
        };
        match (base, az) {
            (None, 1 | 2) => None,
            (None, n) => Some(format!("{n}AZCondition")),
            (Some(base), 1 | 2) => Some(format!("{base}Condition")),
            (Some(base), n) => Some(format!("{base}&{n}AZCondition")),
        }
    }

    fn subnet_id(self, az: usize) -> String {
        match self {
            Tier::Public => format!("PublicSubnet{az}"),
            Tier::PrivateA => format!("PrivateSubnet{az}A"),
            Tier::PrivateB => format!("PrivateSubnet{az}B"),
        }
    }

    fn tag_parameter(self, n: usize) -> String {
        match self {
            Tier::Public => format!("PublicSubnetTag{n}"),
            Tier::PrivateA => format!("PrivateSubnetATag{n}"),
            Tier::PrivateB => format!("PrivateSubnetBTag{n}"),
        }
    }
}

pub fn build(config: &ComposerConfig) -> Result<Template, ComposeError> {
    let mut t = Template::new().with_description(config.describe(DESCRIPTION));

    add_parameters(&mut t)?;
    add_conditions(&mut t)?;
    add_network(&mut t)?;
    for az in 1..=MAX_AZS {
        add_public_subnet(&mut t, az)?;
        add_private_subnet_a(&mut t, az)?;
        add_private_subnet_b(&mut t, az)?;
    }
    add_s3_endpoint(&mut t)?;
    add_outputs(&mut t)?;

    tracing::info!(generator = "vpc", "template built");
    Ok(t)
}

fn add_parameters(t: &mut Template) -> Result<(), ComposeError> {
    t.add_parameter(
        Parameter::new("AvailabilityZones", "List<AWS::EC2::AvailabilityZone::Name>")
            .with_description(
                "List of Availability Zones to use for the subnets in the VPC. Note: The logical order is preserved.",
            ),
    )?;
    t.add_parameter(
        Parameter::string("CreateAdditionalPrivateSubnets")
            .with_default("false")
            .with_allowed_values(["true", "false"])
            .with_description(
                "Set to true to create a network ACL protected subnet in each Availability Zone. If false, the CIDR parameters for those subnets will be ignored. If true, it also requires that the 'Create private subnets' parameter is also true to have any effect.",
            ),
    )?;
    t.add_parameter(
        Parameter::string("CreatePrivateSubnets")
            .with_default("true")
            .with_allowed_values(["true", "false"])
            .with_description(
                "Set to false to create only public subnets. If false, the CIDR parameters for ALL private subnets will be ignored.",
            ),
    )?;
    for deprecated in ["KeyPairName", "NATInstanceType"] {
        t.add_parameter(
            Parameter::string(deprecated)
                .with_default("deprecated")
                .with_description("Deprecated. NAT gateways are now supported in all regions."),
        )?;
    }
    t.add_parameter(
        Parameter::string("NumberOfAZs")
            .with_default("2")
            .with_allowed_values(["2", "3", "4"])
            .with_description(
                "Number of Availability Zones to use in the VPC. This must match your selections in the list of Availability Zones parameter.",
            ),
    )?;

    for az in 1..=MAX_AZS {
        t.add_parameter(cidr_parameter(
            &format!("PrivateSubnet{az}ACIDR"),
            PRIVATE_A_CIDRS[az - 1],
            CIDR_16_28_PATTERN,
            &format!("CIDR block for private subnet {az}A located in Availability Zone {az}"),
        ))?;
        t.add_parameter(cidr_parameter(
            &format!("PrivateSubnet{az}BCIDR"),
            PRIVATE_B_CIDRS[az - 1],
            CIDR_16_28_PATTERN,
            &format!(
                "CIDR block for private subnet {az}B with dedicated network ACL located in Availability Zone {az}"
            ),
        ))?;
        t.add_parameter(cidr_parameter(
            &format!("PublicSubnet{az}CIDR"),
            PUBLIC_CIDRS[az - 1],
            CIDR_16_28_PATTERN,
            &format!("CIDR block for the public DMZ subnet {az} located in Availability Zone {az}"),
        ))?;
    }

    for (tier, label, first_default) in [
        (Tier::PrivateA, "private subnets A", "Network=Private"),
        (Tier::PrivateB, "private subnets B", "Network=Private"),
        (Tier::Public, "public subnets", "Network=Public"),
    ] {
        for n in 1..=3 {
            t.add_parameter(
                Parameter::string(tier.tag_parameter(n))
                    .with_default(if n == 1 { first_default } else { "" })
                    .with_allowed_pattern(TAG_PATTERN)
                    .with_constraint_description(TAG_CONSTRAINT)
                    .with_description(format!(
                        "tag to add to {label}, in format Key=Value (Optional)"
                    )),
            )?;
        }
    }

    t.add_parameter(cidr_parameter(
        "VPCCIDR",
        "10.0.0.0/16",
        CIDR_16_28_PATTERN,
        "CIDR block for the VPC",
    ))?;
    t.add_parameter(
        Parameter::string("VPCTenancy")
            .with_default("default")
            .with_allowed_values(["default", "dedicated"])
            .with_description("The allowed tenancy of instances launched into the VPC"),
    )?;
    Ok(())
}

fn add_conditions(t: &mut Template) -> Result<(), ComposeError> {
    for tier in [Tier::PrivateA, Tier::PrivateB, Tier::Public] {
        for n in 1..=3 {
            let param = tier.tag_parameter(n);
            t.add_condition(
                format!("{param}Condition"),
                ConditionExpr::is_set(Value::reference(param)),
            )?;
        }
    }

    let azs = Value::reference("NumberOfAZs");
    let four = t.add_condition("4AZCondition", ConditionExpr::equals(azs.clone(), "4"))?;
    let three = t.add_condition(
        "3AZCondition",
        ConditionExpr::or([ConditionExpr::equals(azs, "3"), four.clone()]),
    )?;
    let private = t.add_condition(
        PRIVATE_SUBNETS,
        ConditionExpr::equals(Value::reference("CreatePrivateSubnets"), "true"),
    )?;
    let additional = t.add_condition(
        ADDITIONAL_PRIVATE_SUBNETS,
        ConditionExpr::and([
            ConditionExpr::equals(Value::reference("CreatePrivateSubnets"), "true"),
            ConditionExpr::equals(Value::reference("CreateAdditionalPrivateSubnets"), "true"),
        ]),
    )?;
    for (base, gate) in [("PrivateSubnets", &private), ("AdditionalPrivateSubnets", &additional)] {
        t.add_condition(
            format!("{base}&3AZCondition"),
            ConditionExpr::and([gate.clone(), three.clone()]),
        )?;
        t.add_condition(
            format!("{base}&4AZCondition"),
            ConditionExpr::and([gate.clone(), four.clone()]),
        )?;
    }

    t.add_condition(
        "NVirginiaRegionCondition",
        ConditionExpr::equals(Value::reference("AWS::Region"), "us-east-1"),
    )?;
    add_gov_cloud_condition(t)?;
    Ok(())
}

fn add_network(t: &mut Template) -> Result<(), ComposeError> {
    let vpc = Value::reference("VPC");

    t.add_resource(
        Resource::new("DHCPOptions", "AWS::EC2::DHCPOptions")
            .property(
                "DomainName",
                Value::if_else(
                    "NVirginiaRegionCondition",
                    "ec2.internal",
                    Value::sub("${AWS::Region}.compute.internal"),
                ),
            )
            .property("DomainNameServers", Value::list(["AmazonProvidedDNS"])),
    )?;
    t.add_resource(
        Resource::new("VPC", "AWS::EC2::VPC")
            .property("CidrBlock", Value::reference("VPCCIDR"))
            .property("InstanceTenancy", Value::reference("VPCTenancy"))
            .property("EnableDnsSupport", true)
            .property("EnableDnsHostnames", true)
            .property("Tags", Value::tags([("Name", Value::reference("AWS::StackName"))])),
    )?;
    t.add_resource(
        Resource::new("VPCDHCPOptionsAssociation", "AWS::EC2::VPCDHCPOptionsAssociation")
            .property("VpcId", vpc.clone())
            .property("DhcpOptionsId", Value::reference("DHCPOptions")),
    )?;
    t.add_resource(
        Resource::new("InternetGateway", "AWS::EC2::InternetGateway").property(
            "Tags",
            Value::tags([
                ("Name", Value::reference("AWS::StackName")),
                ("Network", Value::from("Public")),
            ]),
        ),
    )?;
    t.add_resource(
        Resource::new("VPCGatewayAttachment", "AWS::EC2::VPCGatewayAttachment")
            .property("VpcId", vpc.clone())
            .property("InternetGatewayId", Value::reference("InternetGateway")),
    )?;
    t.add_resource(
        Resource::new("PublicSubnetRouteTable", "AWS::EC2::RouteTable")
            .property("VpcId", vpc)
            .property(
                "Tags",
                Value::tags([
                    ("Name", Value::from("Public Subnets")),
                    ("Network", Value::from("Public")),
                ]),
            ),
    )?;
    t.add_resource(
        Resource::new("PublicSubnetRoute", "AWS::EC2::Route")
            .depends_on("VPCGatewayAttachment")
            .property("RouteTableId", Value::reference("PublicSubnetRouteTable"))
            .property("DestinationCidrBlock", "0.0.0.0/0")
            .property("GatewayId", Value::reference("InternetGateway")),
    )?;
    Ok(())
}

/// `Name` tag plus the three optional `Key=Value` tags of a tier
fn subnet_tags(tier: Tier, name: String) -> Value {
    let mut tags = vec![Value::map([("Key", Value::from("Name")), ("Value", Value::from(name))])];
    for n in 1..=3 {
        let param = tier.tag_parameter(n);
        let part =
            |index| Value::select(index, Value::split("=", Value::reference(param.as_str())));
        tags.push(Value::if_else(
            format!("{param}Condition"),
            Value::map([("Key", part(0)), ("Value", part(1))]),
            Value::no_value(),
        ));
    }
    Value::List(tags)
}

fn subnet(tier: Tier, az: usize, name: String) -> Resource {
    Resource::new(tier.subnet_id(az), "AWS::EC2::Subnet")
        .property("VpcId", Value::reference("VPC"))
        .property("CidrBlock", Value::reference(format!("{}CIDR", tier.subnet_id(az))))
        .property(
            "AvailabilityZone",
            Value::select(az as u32 - 1, Value::reference("AvailabilityZones")),
        )
        .property("Tags", subnet_tags(tier, name))
        .with_optional_condition(tier.condition(az))
}

fn add_public_subnet(t: &mut Template, az: usize) -> Result<(), ComposeError> {
    let condition = Tier::Public.condition(az);
    t.add_resource(
        subnet(Tier::Public, az, format!("Public subnet {az}"))
            .property("MapPublicIpOnLaunch", true),
    )?;
    t.add_resource(
        Resource::new(
            format!("PublicSubnet{az}RouteTableAssociation"),
            "AWS::EC2::SubnetRouteTableAssociation",
        )
            .property("SubnetId", Value::reference(format!("PublicSubnet{az}")))
            .property("RouteTableId", Value::reference("PublicSubnetRouteTable"))
            .with_optional_condition(condition),
    )?;
    Ok(())
}

fn add_private_subnet_a(t: &mut Template, az: usize) -> Result<(), ComposeError> {
    let condition = Tier::PrivateA.condition(az);
    let id = Tier::PrivateA.subnet_id(az);

    t.add_resource(subnet(Tier::PrivateA, az, format!("Private subnet {az}A")))?;
    add_private_routing(t, &id, az, format!("Private subnet {az}A"), condition.clone())?;
    t.add_resource(
        Resource::new(format!("NAT{az}EIP"), "AWS::EC2::EIP")
            .depends_on("VPCGatewayAttachment")
            .property("Domain", "vpc")
            .with_optional_condition(condition.clone()),
    )?;
    t.add_resource(
        Resource::new(format!("NATGateway{az}"), "AWS::EC2::NatGateway")
            .depends_on("VPCGatewayAttachment")
            .property("AllocationId", Value::get_att(format!("NAT{az}EIP"), "AllocationId"))
            .property("SubnetId", Value::reference(format!("PublicSubnet{az}")))
            .with_optional_condition(condition),
    )?;
    Ok(())
}

fn add_private_subnet_b(t: &mut Template, az: usize) -> Result<(), ComposeError> {
    let condition = Tier::PrivateB.condition(az);
    let id = Tier::PrivateB.subnet_id(az);

    t.add_resource(subnet(Tier::PrivateB, az, format!("Private subnet {az}B")))?;
    add_private_routing(t, &id, az, format!("Private subnet {az}B"), condition.clone())?;

    let acl = format!("{id}NetworkAcl");
    t.add_resource(
        Resource::new(&acl, "AWS::EC2::NetworkAcl")
            .property("VpcId", Value::reference("VPC"))
            .property(
                "Tags",
                Value::tags([
                    ("Name", Value::from(format!("NACL Protected subnet {az}"))),
                    ("Network", Value::from("NACL Protected")),
                ]),
            )
            .with_optional_condition(condition.clone()),
    )?;
    for (suffix, egress) in [("Inbound", false), ("Outbound", true)] {
        t.add_resource(
            Resource::new(format!("{acl}Entry{suffix}"), "AWS::EC2::NetworkAclEntry")
                .property("NetworkAclId", Value::reference(acl.as_str()))
                .property("RuleNumber", 100)
                .property("Protocol", -1)
                .property("RuleAction", "allow")
                .property("Egress", egress)
                .property("CidrBlock", "0.0.0.0/0")
                .with_optional_condition(condition.clone()),
        )?;
    }
    t.add_resource(
        Resource::new(format!("{id}NetworkAclAssociation"), "AWS::EC2::SubnetNetworkAclAssociation")
            .property("SubnetId", Value::reference(id.as_str()))
            .property("NetworkAclId", Value::reference(acl.as_str()))
            .with_optional_condition(condition),
    )?;
    Ok(())
}

/// Route table, default route through the zone's NAT gateway, and association
fn add_private_routing(
    t: &mut Template,
    subnet: &str,
    az: usize,
    name: String,
    condition: Option<String>,
) -> Result<(), ComposeError> {
    let table = format!("{subnet}RouteTable");
    t.add_resource(
        Resource::new(&table, "AWS::EC2::RouteTable")
            .property("VpcId", Value::reference("VPC"))
            .property(
                "Tags",
                Value::tags([("Name", Value::from(name)), ("Network", Value::from("Private"))]),
            )
            .with_optional_condition(condition.clone()),
    )?;
    t.add_resource(
        Resource::new(format!("{subnet}Route"), "AWS::EC2::Route")
            .property("RouteTableId", Value::reference(table.as_str()))
            .property("DestinationCidrBlock", "0.0.0.0/0")
            .property("NatGatewayId", Value::reference(format!("NATGateway{az}")))
            .with_optional_condition(condition.clone()),
    )?;
    t.add_resource(
        Resource::new(
            format!("{subnet}RouteTableAssociation"),
            "AWS::EC2::SubnetRouteTableAssociation",
        )
            .property("SubnetId", Value::reference(subnet))
            .property("RouteTableId", Value::reference(table.as_str()))
            .with_optional_condition(condition),
    )?;
    Ok(())
}

fn add_s3_endpoint(t: &mut Template) -> Result<(), ComposeError> {
    let mut tables = Vec::new();
    for tier in [Tier::PrivateA, Tier::PrivateB] {
        for az in 1..=MAX_AZS {
            let table = Value::reference(format!("{}RouteTable", tier.subnet_id(az)));
            // the endpoint itself is gated on private subnets, so 1A and 2A always exist
            match tier.condition(az) {
                Some(c) if c != PRIVATE_SUBNETS => {
                    tables.push(Value::if_else(c, table, Value::no_value()))
                }
                _ => tables.push(table),
            }
        }
    }
    let allow_all = Value::map([
        ("Action", Value::from("*")),
        ("Effect", Value::from("Allow")),
        ("Resource", Value::from("*")),
        ("Principal", Value::from("*")),
    ]);
    t.add_resource(
        Resource::new("S3VPCEndpoint", "AWS::EC2::VPCEndpoint")
            .with_condition(PRIVATE_SUBNETS)
            .property(
                "PolicyDocument",
                Value::map([
                    ("Version", Value::from("2012-10-17")),
                    ("Statement", Value::list([allow_all])),
                ]),
            )
            .property("RouteTableIds", Value::List(tables))
            .property("ServiceName", Value::sub("com.amazonaws.${AWS::Region}.s3"))
            .property("VpcId", Value::reference("VPC")),
    )?;
    Ok(())
}

fn add_outputs(t: &mut Template) -> Result<(), ComposeError> {
    let exported = |id: String, description: String, value: Value, condition: Option<String>| {
        let export = stack_export(&id);
        Output::new(id, value)
            .with_description(description)
            .with_optional_condition(condition)
            .with_export(export)
    };

    for az in 1..=MAX_AZS {
        let private = Tier::PrivateA.condition(az);
        t.add_output(exported(
            format!("NAT{az}EIP"),
            format!("NAT {az} IP address"),
            Value::reference(format!("NAT{az}EIP")),
            private,
        ))?;
    }
    for tier in [Tier::PrivateA, Tier::PrivateB, Tier::Public] {
        for az in 1..=MAX_AZS {
            let id = tier.subnet_id(az);
            let label = match tier {
                Tier::Public => format!("Public subnet {az}"),
                Tier::PrivateA => format!("Private subnet {az}A"),
                Tier::PrivateB => format!("Private subnet {az}B"),
            };
            t.add_output(exported(
                format!("{id}CIDR"),
                format!("{label} CIDR in Availability Zone {az}"),
                Value::reference(format!("{id}CIDR")),
                tier.condition(az),
            ))?;
            t.add_output(exported(
                format!("{id}ID"),
                format!("{label} ID in Availability Zone {az}"),
                Value::reference(id.as_str()),
                tier.condition(az),
            ))?;
            if tier != Tier::Public {
                t.add_output(exported(
                    format!("{id}RouteTable"),
                    format!("{label} route table"),
                    Value::reference(format!("{id}RouteTable")),
                    tier.condition(az),
                ))?;
            }
        }
    }
    t.add_output(exported(
        "PublicSubnetRouteTable".to_string(),
        "Public subnet route table".to_string(),
        Value::reference("PublicSubnetRouteTable"),
        None,
    ))?;
    t.add_output(exported(
        "S3VPCEndpoint".to_string(),
        "S3 VPC Endpoint".to_string(),
        Value::reference("S3VPCEndpoint"),
        Some(PRIVATE_SUBNETS.to_string()),
    ))?;
    t.add_output(exported(
        "VPCCIDR".to_string(),
        "VPC CIDR".to_string(),
        Value::reference("VPCCIDR"),
        None,
    ))?;
    t.add_output(exported(
        "VPCID".to_string(),
        "VPC ID".to_string(),
        Value::reference("VPC"),
        None,
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_tier_conditions() {
        assert_eq!(Tier::Public.condition(2), None);
        assert_eq!(Tier::Public.condition(3).as_deref(), Some("3AZCondition"));
        assert_eq!(Tier::PrivateA.condition(1).as_deref(), Some("PrivateSubnetsCondition"));
        assert_eq!(
            Tier::PrivateB.condition(4).as_deref(),
            Some("AdditionalPrivateSubnets&4AZCondition")
        );
    }

    #[test]
    fn test_conditions_in_dependency_order() {
        let t = build(&ComposerConfig::default()).expect("Should build");
        let names: Vec<&str> = t.conditions().map(|(name, _)| name).collect();
        for (i, (_, expr)) in t.conditions().enumerate() {
            for dep in expr.condition_names() {
                let pos = names.iter().position(|n| *n == dep).expect("declared");
                assert!(pos < i, "{dep} must precede {}", names[i]);
            }
        }
    }

    #[test]
    fn test_fourth_zone_is_gated() {
        let t = build(&ComposerConfig::default()).expect("Should build");
        let subnet = t.resource("PrivateSubnet4B").expect("subnet");
        assert_eq!(subnet.condition.as_deref(), Some("AdditionalPrivateSubnets&4AZCondition"));
        assert_eq!(
            subnet.properties["AvailabilityZone"].to_json(),
            json!({"Fn::Select": [3, {"Ref": "AvailabilityZones"}]})
        );
        assert_eq!(t.resource("PublicSubnet1").and_then(|r| r.condition.as_deref()), None);
    }

    #[test]
    fn test_outputs_export_per_stack() {
        let t = build(&ComposerConfig::default()).expect("Should build");
        let out = t.output("VPCID").expect("output");
        assert_eq!(
            out.to_json(),
            json!({
                "Description": "VPC ID",
                "Value": {"Ref": "VPC"},
                "Export": {"Name": {"Fn::Sub": "${AWS::StackName}-VPCID"}}
            })
        );
    }

    #[test]
    fn test_serializes() {
        let doc = build(&ComposerConfig::default())
            .and_then(|t| t.to_document())
            .expect("Should serialize");
        assert_eq!(doc["Parameters"]["NumberOfAZs"]["Default"], json!("2"));
        assert!(doc["Conditions"]["PrivateSubnets&3AZCondition"].is_object());
    }
}
