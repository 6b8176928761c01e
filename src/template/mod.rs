//! Template composition
//!
//! A [`Template`] collects parameters, mappings, conditions, resources and
//! outputs, checks every reference between them, and serializes the result
//! as a CloudFormation document.
//!
//! # Example
//!
//! ```
//! use cfn_composer::template::{ConditionExpr, Output, Parameter, Resource, Template, Value};
//!
//! let mut t = Template::new().with_description("Example VPC");
//! let cidr = t.add_parameter(Parameter::string("VPCCIDR").with_default("10.0.0.0/16"))?;
//! let dedicated = t.add_condition(
//!     "Dedicated",
//!     ConditionExpr::equals(Value::reference("AWS::Region"), "us-east-1"),
//! )?;
//! let vpc = t.add_resource(
//!     Resource::new("VPC", "AWS::EC2::VPC")
//!         .property("CidrBlock", cidr)
//!         .property("InstanceTenancy", Value::if_else("Dedicated", "dedicated", "default")),
//! )?;
//! t.add_output(Output::new("VPCID", vpc).with_export("Example-VPCID"))?;
//! # let _ = dedicated;
//!
//! let doc = t.to_document()?;
//! assert_eq!(doc["Resources"]["VPC"]["Properties"]["CidrBlock"]["Ref"], "VPCCIDR");
//! # Ok::<(), cfn_composer::template::ComposeError>(())
//! ```

mod condition;
mod constraint;
mod declaration;
mod document;
mod error;
mod exports;
mod nested;
mod validate;
mod value;

pub use condition::ConditionExpr;
pub use constraint::check_parameter;
pub use declaration::{DeclarationKind, Mapping, Output, Parameter, Resource};
pub use document::{Template, FORMAT_VERSION};
pub use error::ComposeError;
pub use exports::ExportNamespace;
pub use nested::{ChildInterface, NestedStack, STACK_RESOURCE_TYPE};
pub use validate::{is_export_name, sub_variables};
pub use value::{is_pseudo_parameter, Intrinsic, Value, PSEUDO_PARAMETERS};
