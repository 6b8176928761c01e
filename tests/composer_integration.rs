//! Integration tests for composing, serializing and re-checking templates

use cfn_composer::template::{NestedStack, Output, Parameter, Resource, Template, Value};
use cfn_composer::{
    check_exports, render_with_config, validate_json, ComposeError, ComposerConfig, Error,
    Generator,
};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_every_generator_round_trips() {
    let config = ComposerConfig::default();
    for generator in Generator::all() {
        let first = render_with_config(*generator, &config).expect("Should render");
        let template =
            validate_json(&first).unwrap_or_else(|e| panic!("{generator}: {}", e.report()));
        let second = template.to_json(true).expect("Should serialize");
        assert_eq!(first, second, "{generator} changed on round trip");
    }
}

#[test]
fn test_round_trip_keeps_logical_ids() {
    let built = Generator::JiraDc.build(&ComposerConfig::default()).expect("Should build");
    let text = built.to_json(false).expect("Should serialize");
    let reparsed = validate_json(&text).expect("Should validate");
    assert_eq!(built.logical_ids(), reparsed.logical_ids());
}

#[test]
fn test_jira_dc_imports_match_jira_vpc_exports() {
    let config = ComposerConfig::default().with_export_prefix("STAGING");
    let vpc = Generator::JiraVpc.build(&config).expect("Should build");
    let jira = Generator::JiraDc.build(&config).expect("Should build");

    let mut exports: Vec<&str> = vpc.export_names().into_iter().map(|(name, _)| name).collect();
    let mut imports = jira.import_names();
    exports.sort_unstable();
    imports.sort_unstable();
    assert_eq!(imports, exports);

    assert_eq!(check_exports(&config).expect("Should check"), vec![]);
}

#[test]
fn test_empty_template_document() {
    let json = Template::new().to_json(true).expect("Should serialize");
    let doc: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
    assert_eq!(
        doc,
        json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Parameters": {},
            "Resources": {},
            "Outputs": {}
        })
    );
    assert!(validate_json(&json).expect("Should validate").is_empty());
}

#[test]
fn test_duplicate_parameter_rejected() {
    let mut t = Template::new();
    t.add_parameter(Parameter::string("KeyName")).expect("first");
    let err = t.add_parameter(Parameter::string("KeyName")).unwrap_err();
    assert!(matches!(err, ComposeError::DuplicateLogicalId { ref id, .. } if id == "KeyName"));
}

#[test]
fn test_nested_stack_wiring_checked_against_child() {
    let mut child = Template::new();
    child.add_parameter(Parameter::string("Subnet")).expect("param");
    child
        .add_output(Output::new("Address", "10.0.0.1"))
        .expect("output");

    let mut parent = Template::new();
    let err = parent
        .add_nested_stack(
            NestedStack::new("Child", "https://example.com/child.json")
                .parameter("Subnet", "subnet-1")
                .parameter("Subnets", "subnet-2")
                .with_interface(cfn_composer::template::ChildInterface::of(&child)),
        )
        .unwrap_err();
    assert!(err.to_string().contains("child template declares no parameter 'Subnets'"));

    let err = parent
        .add_nested_stack(
            NestedStack::new("Child", "https://example.com/child.json")
                .with_interface(cfn_composer::template::ChildInterface::of(&child)),
        )
        .unwrap_err();
    assert!(err.to_string().contains("required child parameters not supplied: Subnet"));
}

#[test]
fn test_nested_stack_parameters_resolve_in_parent() {
    let mut parent = Template::new();
    parent.add_parameter(Parameter::string("KeyPairName")).expect("param");
    parent
        .add_nested_stack(
            NestedStack::new("BastionStack", "https://example.com/bastion.json")
                .parameter("KeyName", Value::reference("KeyPairName"))
                .parameter("VPC", Value::reference("VPCStack")),
        )
        .expect("references resolve at serialization");

    let err = parent.to_json(true).unwrap_err();
    assert!(matches!(
        err,
        ComposeError::UndefinedReference { ref name, ref referenced_by, .. }
            if name == "VPCStack" && referenced_by == "BastionStack"
    ));
}

#[test]
fn test_undefined_reference_reports_suggestion() {
    let mut t = Template::new();
    t.add_resource(Resource::new("VPC", "AWS::EC2::VPC").property("CidrBlock", "10.0.0.0/16"))
        .expect("vpc");
    t.add_resource(
        Resource::new("Subnet", "AWS::EC2::Subnet").property("VpcId", Value::reference("VCP")),
    )
    .expect("forward references are allowed until serialization");

    let err = Error::from(t.to_document().unwrap_err());
    assert_eq!(
        err.report(),
        "undefined reference 'VCP' in 'Subnet'\n  help: did you mean 'VPC'?"
    );
}

#[test]
fn test_config_file_drives_output() {
    let config = ComposerConfig::from_str(
        r#"
[exports]
prefix = "PROD"

[output]
pretty = false
"#,
    )
    .expect("Should parse");
    let json = render_with_config(Generator::JiraVpc, &config).expect("Should render");
    assert_eq!(json.lines().count(), 1);
    assert!(json.contains("\"PROD-PriNets\""));
}
