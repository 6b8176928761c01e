//! Linux bastion host in a public subnet of an existing VPC

use super::common::access_cidr_parameter;
use crate::config::ComposerConfig;
use crate::template::{ComposeError, Output, Parameter, Resource, Template, Value};

const DESCRIPTION: &str = "Bastion for Atlassian Product VPC";

pub fn build(config: &ComposerConfig) -> Result<Template, ComposeError> {
    let mut t = Template::new().with_description(config.describe(DESCRIPTION));

    let subnet = t.add_parameter(
        Parameter::new("Subnet", "AWS::EC2::Subnet::Id")
            .with_description("Public subnet the bastion is launched into"),
    )?;
    let key_name = t.add_parameter(
        Parameter::new("KeyName", "AWS::EC2::KeyPair::KeyName")
            .with_description("Key pair granting SSH access to the bastion"),
    )?;
    let ami = t.add_parameter(
        Parameter::new("LatestAmiId", "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>")
            .with_default("/aws/service/ami-amazon-linux-latest/amzn-ami-hvm-x86_64-gp2"),
    )?;
    let vpc = t.add_parameter(Parameter::new("VPC", "AWS::EC2::VPC::Id"))?;
    let access_cidr = t.add_parameter(
        access_cidr_parameter(
            "AccessCIDR",
            "The CIDR IP range that is permitted to SSH to the bastion. Use 0.0.0.0/0 to allow access from any address.",
        )
        .with_default("0.0.0.0/0"),
    )?;

    let group = t.add_resource(
        Resource::new("SecurityGroup", "AWS::EC2::SecurityGroup")
            .property("GroupDescription", "Security group allowing SSH access")
            .property(
                "SecurityGroupIngress",
                Value::list([Value::map([
                    ("IpProtocol", Value::from("tcp")),
                    ("FromPort", Value::from(22)),
                    ("ToPort", Value::from(22)),
                    ("CidrIp", access_cidr),
                ])]),
            )
            .property("VpcId", vpc),
    )?;

    t.add_resource(
        Resource::new("Bastion", "AWS::EC2::Instance")
            .property("ImageId", ami)
            .property("InstanceType", "t2.micro")
            .property("KeyName", key_name)
            .property(
                "NetworkInterfaces",
                Value::list([Value::map([
                    ("AssociatePublicIpAddress", Value::from(true)),
                    ("DeviceIndex", Value::from("0")),
                    ("GroupSet", Value::list([group])),
                    ("SubnetId", subnet),
                ])]),
            )
            .property(
                "Tags",
                Value::tags([("Name", Value::from("Bastion for Atlassian Product VPC"))]),
            ),
    )?;

    t.add_output(
        Output::new("BastionPubIp", Value::get_att("Bastion", "PublicIp"))
            .with_description("The Public IP to ssh to the Bastion"),
    )?;

    tracing::info!(generator = "bastion", "template built");
    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_required_parameters() {
        let t = build(&ComposerConfig::default()).expect("Should build");
        let required: Vec<&str> = t
            .parameters()
            .filter(|p| p.is_required())
            .map(|p| p.logical_id.as_str())
            .collect();
        assert_eq!(required, vec!["Subnet", "KeyName", "VPC"]);
    }

    #[test]
    fn test_instance_wiring() {
        let doc = build(&ComposerConfig::default())
            .and_then(|t| t.to_document())
            .expect("Should serialize");
        assert_eq!(
            doc["Resources"]["Bastion"]["Properties"]["NetworkInterfaces"][0]["GroupSet"],
            json!([{"Ref": "SecurityGroup"}])
        );
        assert_eq!(
            doc["Outputs"]["BastionPubIp"]["Value"],
            json!({"Fn::GetAtt": ["Bastion", "PublicIp"]})
        );
    }
}
