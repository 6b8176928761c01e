//! Jira Data Center cluster inside an exported Atlassian VPC
//!
//! Network placement comes from the cross-stack exports published by
//! `jira-vpc`: private and public subnet lists, the VPC ID and the default
//! key pair.

use super::common::{split_import, ACCESS_CIDR_PATTERN};
use crate::config::ComposerConfig;
use crate::template::{
    ComposeError, ConditionExpr, Mapping, Output, Parameter, Resource, Template, Value,
};

const DESCRIPTION: &str = "Atlassian Jira Data Center QS(0035)";

const PASSWORD_PATTERN: &str = "[a-zA-Z0-9]*";

/// String parameters passed through to node configuration: id, default, description
const TUNING_PARAMETERS: &[(&str, &str, &str)] = &[
    ("CatalinaOpts", "", "Pass in any additional jvm options to tune Catalina"),
    (
        "CustomDnsName",
        "",
        "Use custom existing DNS name for your Data Center instance. This will take precedence over HostedZone. Please note: you must own the domain and configure it to point at the load balancer.",
    ),
    (
        "DBMaxIdle",
        "20",
        "The maximum number of database connections that are allowed to remain idle in the pool",
    ),
    (
        "DBMaxWaitMillis",
        "10000",
        "The length of time (in milliseconds) that Jira is allowed to wait for a database connection to become available (while there are no free ones available in the pool), before returning an error",
    ),
    (
        "DBMinEvictableIdleTimeMillis",
        "180000",
        "The minimum amount of time an object may sit idle in the database connection pool before it is eligible for eviction by the idle object eviction",
    ),
    (
        "DBMinIdle",
        "10",
        "The minimum number of idle database connections that are kept open at any time",
    ),
    (
        "DBPoolMaxSize",
        "20",
        "The maximum number of database connections that can be opened at any time",
    ),
    (
        "DBPoolMinSize",
        "20",
        "The minimum number of idle database connections that are kept open at any time",
    ),
    (
        "DBRemoveAbandoned",
        "true",
        "Flag to remove abandoned database connections if they exceed the Removed Abandoned Timeout",
    ),
    (
        "DBRemoveAbandonedTimeout",
        "60",
        "The length of time (in seconds) that a database connection can be idle before it is considered abandoned",
    ),
    (
        "DBTestOnBorrow",
        "false",
        "Tests if the database connection is valid when it is borrowed from the database connection pool by Jira",
    ),
    (
        "DBTestWhileIdle",
        "true",
        "Periodically tests if the database connection is valid when it is idle",
    ),
    (
        "DBTimeBetweenEvictionRunsMillis",
        "60000",
        "The number of milliseconds to sleep between runs of the idle object eviction thread. When non-positive, no idle object eviction thread will be run",
    ),
    (
        "DeploymentAutomationBranch",
        "master",
        "The deployment automation repository branch to pull from.",
    ),
    (
        "DeploymentAutomationKeyName",
        "",
        "Named KeyPair name to use with this repository. The key should be imported into the SSM parameter store. (Optional)",
    ),
    (
        "DeploymentAutomationPlaybook",
        "aws_jira_dc_node.yml",
        "The Ansible playbook to invoke to initialise the Jira node on first start.",
    ),
    (
        "DeploymentAutomationRepository",
        "https://bitbucket.org/atlassian/dc-deployments-automation.git",
        "The deployment automation repository to use for per-node initialisation. Leave this as default unless you have customisations.",
    ),
    (
        "JvmHeapOverride",
        "",
        "Override the default amount of memory to allocate to the JVM for your instance type - set size in meg or gig e.g. 1024m or 1g",
    ),
    (
        "TomcatAcceptCount",
        "10",
        "The maximum queue length for incoming connection requests when all possible request processing threads are in use",
    ),
    (
        "TomcatConnectionTimeout",
        "20000",
        "The number of milliseconds this Connector will wait, after accepting a connection, for the request URI line to be presented",
    ),
    ("TomcatDefaultConnectorPort", "8080", "The port on which to serve the application"),
    (
        "TomcatEnableLookups",
        "false",
        "Set to true if you want calls to request.getRemoteHost() to perform DNS lookups in order to return the actual host name of the remote client",
    ),
    (
        "TomcatMaxThreads",
        "200",
        "The maximum number of request processing threads to be created by this Connector, which therefore determines the maximum number of simultaneous requests that can be handled",
    ),
    ("TomcatMinSpareThreads", "10", "The minimum number of threads always kept running"),
    ("TomcatProtocol", "HTTP/1.1", "Sets the protocol to handle incoming traffic"),
    (
        "TomcatRedirectPort",
        "8443",
        "The port number for Catalina to use when automatically redirecting a non-SSL connector actioning a redirect to a SSL URI",
    ),
];

/// Cluster node instance types with their default JVM heap
const NODE_INSTANCE_TYPES: &[(&str, &str)] = &[
    ("c4.xlarge", "4608m"),
    ("c4.2xlarge", "12288m"),
    ("c4.4xlarge", "12288m"),
    ("c4.8xlarge", "12288m"),
    ("c5.large", "2048m"),
    ("c5.xlarge", "5120m"),
    ("c5.2xlarge", "12288m"),
    ("c5.4xlarge", "12288m"),
    ("c5.9xlarge", "12288m"),
    ("c5.18xlarge", "12288m"),
    ("c5d.large", "2048m"),
    ("c5d.xlarge", "5120m"),
    ("c5d.2xlarge", "12288m"),
    ("c5d.4xlarge", "12288m"),
    ("c5d.9xlarge", "12288m"),
    ("c5d.18xlarge", "12288m"),
    ("d2.xlarge", "12288m"),
    ("d2.2xlarge", "12288m"),
    ("d2.4xlarge", "12288m"),
    ("d2.8xlarge", "12288m"),
    ("h1.2xlarge", "12288m"),
    ("h1.4xlarge", "12288m"),
    ("h1.8xlarge", "12288m"),
    ("h1.16xlarge", "12288m"),
    ("i3.large", "12288m"),
    ("i3.xlarge", "12288m"),
    ("i3.2xlarge", "12288m"),
    ("i3.4xlarge", "12288m"),
    ("i3.8xlarge", "12288m"),
    ("i3.16xlarge", "12288m"),
    ("i3.metal", "12288m"),
    ("m4.large", "5120m"),
    ("m4.xlarge", "12288m"),
    ("m4.2xlarge", "12288m"),
    ("m4.4xlarge", "12288m"),
    ("m4.10xlarge", "12288m"),
    ("m4.16xlarge", "12288m"),
    ("m5.large", "5120m"),
    ("m5.xlarge", "12288m"),
    ("m5.2xlarge", "12288m"),
    ("m5.4xlarge", "12288m"),
    ("m5.12xlarge", "12288m"),
    ("m5.24xlarge", "12288m"),
    ("m5d.large", "5120m"),
    ("m5d.xlarge", "12288m"),
    ("m5d.2xlarge", "12288m"),
    ("m5d.4xlarge", "12288m"),
    ("m5d.12xlarge", "12288m"),
    ("m5d.24xlarge", "12288m"),
    ("r4.large", "12288m"),
    ("r4.xlarge", "12288m"),
    ("r4.2xlarge", "12288m"),
    ("r4.4xlarge", "12288m"),
    ("r4.8xlarge", "12288m"),
    ("r4.16xlarge", "12288m"),
    ("r5.large", "12288m"),
    ("r5.xlarge", "12288m"),
    ("r5.2xlarge", "12288m"),
    ("r5.4xlarge", "12288m"),
    ("r5.12xlarge", "12288m"),
    ("r5.24xlarge", "12288m"),
    ("r5d.large", "12288m"),
    ("r5d.xlarge", "12288m"),
    ("r5d.2xlarge", "12288m"),
    ("r5d.4xlarge", "12288m"),
    ("r5d.12xlarge", "12288m"),
    ("r5d.24xlarge", "12288m"),
    ("t2.medium", "2048m"),
    ("t2.large", "5120m"),
    ("t2.xlarge", "12288m"),
    ("t2.2xlarge", "12288m"),
    ("t3.medium", "2048m"),
    ("t3.large", "5120m"),
    ("t3.xlarge", "12288m"),
    ("t3.2xlarge", "12288m"),
    ("x1.16xlarge", "12288m"),
    ("x1.32xlarge", "12288m"),
    ("x1e.xlarge", "12288m"),
    ("x1e.2xlarge", "12288m"),
    ("x1e.4xlarge", "12288m"),
    ("x1e.8xlarge", "12288m"),
    ("x1e.16xlarge", "12288m"),
    ("x1e.32xlarge", "12288m"),
    ("z1d.large", "12288m"),
    ("z1d.xlarge", "12288m"),
    ("z1d.2xlarge", "12288m"),
    ("z1d.3xlarge", "12288m"),
    ("z1d.6xlarge", "12288m"),
    ("z1d.12xlarge", "12288m"),
];

const REGION_AMIS: &[(&str, &str)] = &[
    ("ap-northeast-1", "ami-00d101850e971728d"),
    ("ap-northeast-2", "ami-08ab3f7e72215fe91"),
    ("ap-south-1", "ami-00e782930f1c3dbc7"),
    ("ap-southeast-1", "ami-0b5a47f8865280111"),
    ("ap-southeast-2", "ami-0fb7513bcdc525c3b"),
    ("ca-central-1", "ami-08a9b721ecc5b0a53"),
    ("eu-central-1", "ami-0ebe657bc328d4e82"),
    ("eu-north-1", "ami-1fb13961"),
    ("eu-west-1", "ami-030dbca661d402413"),
    ("eu-west-2", "ami-0009a33f033d8b7b6"),
    ("eu-west-3", "ami-0ebb3a801d5fb8b9b"),
    ("sa-east-1", "ami-058141e091292ecf0"),
    ("us-east-1", "ami-0c6b1d09930fac512"),
    ("us-east-2", "ami-0ebbf2179e615c338"),
    ("us-west-1", "ami-015954d5e5548d13b"),
    ("us-west-2", "ami-0cb72367e98845d43"),
];

const DB_INSTANCE_CLASSES: &[&str] = &[
    "db.m4.large",
    "db.m4.xlarge",
    "db.m4.2xlarge",
    "db.m4.4xlarge",
    "db.m4.10xlarge",
    "db.m4.16xlarge",
    "db.r4.large",
    "db.r4.xlarge",
    "db.r4.2xlarge",
    "db.r4.4xlarge",
    "db.r4.8xlarge",
    "db.r4.16xlarge",
    "db.t2.medium",
    "db.t2.large",
    "db.t2.xlarge",
    "db.t2.2xlarge",
];

const MAIL_DISABLED_OPTS: &str =
    "-Datlassian.mail.senddisabled=true -Datlassian.mail.fetchdisabled=true -Datlassian.mail.popdisabled=true";

const CLONE_DEPLOYMENT_REPO: &str = r#"#!/bin/bash
key_location=/root/.ssh/deployment_repo_key
key_name="${DeploymentAutomationKeyName}"

yum install -y git
if [[ ! -z "$key_name" ]]; then
    # Ensure awscli is up to date
    yum install -y awscli jq
    key_val=$(aws --region=${AWS::Region} ssm get-parameters --names "$key_name" --with-decryption | jq --raw-output '.Parameters[0] .Value')
    echo -e $key_val > $key_location
    chmod 600 $key_location
    export GIT_SSH_COMMAND="ssh -o IdentitiesOnly=yes -o StrictHostKeyChecking=no -i $key_location"
else
    export GIT_SSH_COMMAND="ssh -o IdentitiesOnly=yes -o StrictHostKeyChecking=no"
fi

git clone "${DeploymentAutomationRepository}" -b "${DeploymentAutomationBranch}" /opt/atlassian/dc-deployments-automation/
"#;

pub fn build(config: &ComposerConfig) -> Result<Template, ComposeError> {
    let mut t = Template::new().with_description(config.describe(DESCRIPTION));

    add_parameters(&mut t)?;
    add_conditions(&mut t)?;
    add_mappings(&mut t)?;
    add_dns(&mut t)?;
    add_storage(&mut t, config)?;
    add_network(&mut t, config)?;
    add_cluster(&mut t, config)?;
    add_outputs(&mut t)?;

    tracing::info!(generator = "jira-dc", "template built");
    Ok(t)
}

fn add_parameters(t: &mut Template) -> Result<(), ComposeError> {
    for (id, default, description) in TUNING_PARAMETERS {
        t.add_parameter(
            Parameter::string(*id)
                .with_default(*default)
                .with_description(*description),
        )?;
    }

    let true_false = ["true", "false"];
    let password = |id: &str, description: &str| {
        Parameter::string(id)
            .with_allowed_pattern(PASSWORD_PATTERN)
            .with_length(8, 128)
            .with_constraint_description("Must be at least 8 alphanumeric characters.")
            .with_description(description)
            .no_echo()
    };

    t.add_parameter(
        Parameter::string("AssociatePublicIpAddress")
            .with_default("true")
            .with_allowed_values(true_false)
            .with_constraint_description("Must be 'true' or 'false'.")
            .with_description("Controls if the EC2 instances are assigned a public IP address"),
    )?;
    t.add_parameter(
        Parameter::string("CidrBlock")
            .with_allowed_pattern(ACCESS_CIDR_PATTERN)
            .with_length(9, 18)
            .with_constraint_description("Must be a valid IP CIDR range of the form x.x.x.x/x.")
            .with_description(
                "CIDR Block allowed to access the Atlassian product. This should be set to a trusted IP range; if you want to give public access use '0.0.0.0/0'.",
            ),
    )?;
    t.add_parameter(
        Parameter::string("ClusterNodeInstanceType")
            .with_default("c5.xlarge")
            .with_allowed_values(NODE_INSTANCE_TYPES.iter().map(|(name, _)| *name))
            .with_constraint_description("Must be an EC2 instance type from the selection list")
            .with_description("Instance type for the cluster application nodes."),
    )?;
    t.add_parameter(
        Parameter::number("ClusterNodeMax")
            .with_default(1)
            .with_description("Maximum number of nodes in the cluster."),
    )?;
    t.add_parameter(
        Parameter::number("ClusterNodeMin")
            .with_default(1)
            .with_description("Set to 1 for new deployment. Can be updated post launch."),
    )?;
    t.add_parameter(
        Parameter::number("ClusterNodeVolumeSize")
            .with_default(50)
            .with_description(
                "Size of cluster node root volume in Gb (note - size based upon Application indexes x 4)",
            ),
    )?;
    t.add_parameter(
        Parameter::string("DBInstanceClass")
            .with_default("db.m4.large")
            .with_allowed_values(DB_INSTANCE_CLASSES.iter().copied())
            .with_constraint_description(
                "Must be a valid RDS instance class, from the selection list",
            )
            .with_description("RDS instance type"),
    )?;
    t.add_parameter(
        Parameter::number("DBIops")
            .with_default(1000)
            .with_range(1000, 30000)
            .with_constraint_description("Must be in the range 1000 - 30000")
            .with_description(
                "Must be in the range of 1000 - 30000 and a multiple of 1000. This value is only used with Provisioned IOPS. Note: The ratio of IOPS per allocated-storage must be between 3.00 and 10.00",
            ),
    )?;
    t.add_parameter(password("DBMasterUserPassword", "Database admin account password."))?;
    t.add_parameter(
        Parameter::string("DBMultiAZ")
            .with_default("true")
            .with_allowed_values(true_false)
            .with_constraint_description("Must be 'true' or 'false'.")
            .with_description("Whether to provision a multi-AZ RDS instance."),
    )?;
    t.add_parameter(password("DBPassword", "Database user account password."))?;
    t.add_parameter(
        Parameter::number("DBStorage")
            .with_default(200)
            .with_description("Database allocated storage size, in gigabytes (GB)"),
    )?;
    t.add_parameter(
        Parameter::string("DBStorageEncrypted")
            .with_default("false")
            .with_allowed_values(true_false)
            .with_description("Whether or not to encrypt the database"),
    )?;
    t.add_parameter(
        Parameter::string("DBStorageType")
            .with_default("General Purpose (SSD)")
            .with_allowed_values(["General Purpose (SSD)", "Provisioned IOPS"])
            .with_constraint_description("Must be 'General Purpose (SSD)' or 'Provisioned IOPS'.")
            .with_description("Database storage type"),
    )?;
    t.add_parameter(
        Parameter::string("HostedZone")
            .with_default("")
            .with_constraint_description("Must be the name of an existing Route53 Hosted Zone.")
            .with_description(
                "The domain name of the Route53 PRIVATE Hosted Zone in which to create cnames",
            ),
    )?;
    t.add_parameter(
        Parameter::string("JiraProduct")
            .with_default("Software")
            .with_allowed_values(["Core", "Software", "ServiceDesk"])
            .with_constraint_description("Must be \"Core\", \"Software\", or \"ServiceDesk\"")
            .with_description("The Jira product to install."),
    )?;
    t.add_parameter(
        Parameter::string("JiraVersion")
            .with_default("7.13.3")
            .with_allowed_pattern(r"(\d+\.\d+\.\d+(-?.*))|(latest)")
            .with_constraint_description(
                "Must be a valid version number or 'latest'; for example, 8.1.0 for Jira Software, or 4.1.0 for ServiceDesk.",
            )
            .with_description("The version of Jira Software or Jira Service Desk to install."),
    )?;
    t.add_parameter(
        Parameter::string("KeyPairName")
            .with_default("")
            .with_constraint_description("Must be the name of an existing EC2 Key Pair.")
            .with_description("The EC2 Key Pair to allow SSH access to the instances"),
    )?;
    t.add_parameter(
        Parameter::string("MailEnabled")
            .with_default("true")
            .with_allowed_values(true_false)
            .with_constraint_description("Must be 'true' or 'false'.")
            .with_description("Enable mail processing and sending"),
    )?;
    t.add_parameter(
        Parameter::string("SSLCertificateARN")
            .with_default("")
            .with_length(0, 90)
            .with_description(
                "Amazon Resource Name (ARN) of your SSL certificate in AWS Certificate Manager.",
            ),
    )?;
    t.add_parameter(
        Parameter::string("TomcatContextPath")
            .with_default("")
            .with_allowed_pattern(r"^(\/[A-z_\-0-9\.]+)?$")
            .with_description(
                "The context path of this web application, which is matched against the beginning of each request URI to select the appropriate web application for processing. If used, must include leading \"/\"",
            ),
    )?;
    t.add_parameter(
        Parameter::string("TomcatScheme")
            .with_default("http")
            .with_allowed_values(["http", "https"])
            .with_description(
                "The name of the protocol you wish to have returned, ie 'https' for an SSL Connector. The value of this setting also configures Tomcat's proxy port (443/80) and secure (true/false) settings appropriately.",
            ),
    )?;
    Ok(())
}

fn add_conditions(t: &mut Template) -> Result<(), ComposeError> {
    let set = |param: &str| ConditionExpr::is_set(Value::reference(param));
    let equals = |param: &str, value: &str| ConditionExpr::equals(Value::reference(param), value);

    t.add_condition("DoSetDBMasterUserPassword", set("DBMasterUserPassword"))?;
    t.add_condition("SSLScheme", equals("TomcatScheme", "https"))?;
    t.add_condition("KeyProvided", set("KeyPairName"))?;
    t.add_condition("UseDatabaseEncryption", equals("DBStorageEncrypted", "true"))?;
    t.add_condition("OverrideHeap", set("JvmHeapOverride"))?;
    t.add_condition("UseContextPath", set("TomcatContextPath"))?;
    t.add_condition("UseCustomDnsName", set("CustomDnsName"))?;
    t.add_condition("UsePublicIp", equals("AssociatePublicIpAddress", "true"))?;
    t.add_condition("DBProvisionedIops", equals("DBStorageType", "Provisioned IOPS"))?;
    t.add_condition("UseHostedZone", set("HostedZone"))?;
    t.add_condition("DisableMail", ConditionExpr::not(equals("MailEnabled", "true")))?;
    t.add_condition("DoSSL", set("SSLCertificateARN"))?;
    Ok(())
}

fn add_mappings(t: &mut Template) -> Result<(), ComposeError> {
    let product = |name: &str, short: &str, full: &str| {
        [
            ("fulldisplayname", format!("\"{full}\"")),
            ("name", name.to_string()),
            ("shortdisplayname", format!("\"{short}\"")),
        ]
    };
    t.add_mapping(
        Mapping::new("JIRAProduct2NameAndVersion")
            .entry("Core", product("jira-core", "Jira Core", "Atlassian Jira Core"))
            .entry("ServiceDesk", product("servicedesk", "Jira SD", "Atlassian Jira Service Desk"))
            .entry("Software", product("jira-software", "Jira SW", "Atlassian Jira Software")),
    )?;

    let mut arch = Mapping::new("AWSInstanceType2Arch");
    for (instance_type, heap) in NODE_INSTANCE_TYPES {
        arch = arch.entry(*instance_type, [("Arch", "HVM64"), ("Jvmheap", *heap)]);
    }
    t.add_mapping(arch)?;

    let mut amis = Mapping::new("AWSRegionArch2AMI");
    for (region, ami) in REGION_AMIS {
        amis = amis.entry(*region, [("HVM64", *ami), ("HVMG2", "NOT_SUPPORTED")]);
    }
    t.add_mapping(amis)?;
    Ok(())
}

/// `${StackName}`-prefixed text, as used in tags
fn stack_named(template: &str) -> Value {
    Value::sub_with(template, [("StackName", Value::reference("AWS::StackName"))])
}

fn cname(id: &str, comment: &str, name: Value, record: Value) -> Resource {
    Resource::new(id, "AWS::Route53::RecordSet")
        .with_condition("UseHostedZone")
        .property("Comment", comment)
        .property("HostedZoneName", Value::reference("HostedZone"))
        .property("Name", name)
        .property("ResourceRecords", Value::list([record]))
        .property("TTL", 900)
        .property("Type", "CNAME")
}

fn add_dns(t: &mut Template) -> Result<(), ComposeError> {
    let stack = || Value::reference("AWS::StackName");
    let zone = || Value::reference("HostedZone");

    t.add_resource(cname(
        "LoadBalancerCname",
        "Route53 cname for the ALB",
        Value::join(".", [stack(), zone()]),
        Value::get_att("LoadBalancer", "DNSName"),
    ))?;
    t.add_resource(cname(
        "EFSCname",
        "Route53 cname for the efs",
        Value::if_else(
            "UseHostedZone",
            Value::join(".", [stack(), Value::from("efs"), zone()]),
            "",
        ),
        Value::join(
            ".",
            [
                Value::reference("ElasticFileSystem"),
                Value::from("efs"),
                Value::reference("AWS::Region"),
                Value::from("amazonaws.com."),
            ],
        ),
    ))?;
    t.add_resource(cname(
        "DBCname",
        "Route53 cname for the RDS",
        Value::join(".", [stack(), Value::from("db"), zone()]),
        Value::get_att("DB", "Endpoint.Address"),
    ))?;
    Ok(())
}

fn add_storage(t: &mut Template, config: &ComposerConfig) -> Result<(), ComposeError> {
    let private_subnets = || split_import(&config.export_name("PriNets"));
    let encrypted = "UseDatabaseEncryption";

    t.add_resource(
        Resource::new("DB", "AWS::RDS::DBInstance")
            .property("AllocatedStorage", Value::reference("DBStorage"))
            .property("DBInstanceClass", Value::reference("DBInstanceClass"))
            .property("DBInstanceIdentifier", Value::reference("AWS::StackName"))
            .property("DBSubnetGroupName", Value::reference("DBSubnetGroup"))
            .property("Engine", "postgres")
            .property("EngineVersion", "9.6")
            .property(
                "Iops",
                Value::if_else("DBProvisionedIops", Value::reference("DBIops"), Value::no_value()),
            )
            .property(
                "KmsKeyId",
                Value::if_else(
                    encrypted,
                    Value::get_att("EncryptionKey", "Arn"),
                    Value::no_value(),
                ),
            )
            .property(
                "MasterUserPassword",
                Value::if_else(
                    "DoSetDBMasterUserPassword",
                    Value::reference("DBMasterUserPassword"),
                    Value::no_value(),
                ),
            )
            .property("MasterUsername", "postgres")
            .property("MultiAZ", Value::reference("DBMultiAZ"))
            .property(
                "StorageEncrypted",
                Value::if_else(
                    encrypted,
                    Value::reference("DBStorageEncrypted"),
                    Value::no_value(),
                ),
            )
            .property("StorageType", Value::if_else("DBProvisionedIops", "io1", "gp2"))
            .property(
                "Tags",
                Value::tags([("Name", stack_named("${StackName} Jira PostgreSQL Database"))]),
            )
            .property("VPCSecurityGroups", Value::list([Value::reference("SecurityGroup")])),
    )?;
    t.add_resource(
        Resource::new("DBSubnetGroup", "AWS::RDS::DBSubnetGroup")
            .property("DBSubnetGroupDescription", "DBSubnetGroup")
            .property("SubnetIds", private_subnets()),
    )?;

    t.add_resource(
        Resource::new("EncryptionKey", "AWS::KMS::Key")
            .with_condition(encrypted)
            .property(
                "KeyPolicy",
                Value::map([
                    ("Version", Value::from("2012-10-17")),
                    ("Id", Value::sub("${AWS::StackName}")),
                    (
                        "Statement",
                        Value::list([Value::map([
                            ("Action", Value::from("kms:*")),
                            ("Effect", Value::from("Allow")),
                            ("Resource", Value::from("*")),
                            (
                                "Principal",
                                Value::map([(
                                    "AWS",
                                    Value::list([Value::sub(
                                        "arn:aws:iam::${AWS::AccountId}:root",
                                    )]),
                                )]),
                            ),
                        ])]),
                    ),
                ]),
            )
            .property("Tags", Value::tags([("Name", stack_named("${StackName} Encryption Key"))])),
    )?;
    t.add_resource(
        Resource::new("EncryptionKeyAlias", "AWS::KMS::Alias")
            .with_condition(encrypted)
            .property("AliasName", Value::sub("alias/${AWS::StackName}"))
            .property("TargetKeyId", Value::reference("EncryptionKey")),
    )?;

    t.add_resource(
        Resource::new("ElasticFileSystem", "AWS::EFS::FileSystem").property(
            "FileSystemTags",
            Value::tags([
                (
                    "Name",
                    Value::join(
                        " ",
                        [
                            Value::reference("AWS::StackName"),
                            Value::from("cluster shared-files"),
                        ],
                    ),
                ),
                ("Application", Value::reference("AWS::StackId")),
            ]),
        ),
    )?;
    for (index, id) in ["EFSMountAz1", "EFSMountAz2"].into_iter().enumerate() {
        t.add_resource(
            Resource::new(id, "AWS::EFS::MountTarget")
                .property("FileSystemId", Value::reference("ElasticFileSystem"))
                .property("SecurityGroups", Value::list([Value::reference("SecurityGroup")]))
                .property("SubnetId", Value::select(index as u32, private_subnets())),
        )?;
    }
    Ok(())
}

fn add_network(t: &mut Template, config: &ComposerConfig) -> Result<(), ComposeError> {
    let ingress = |port: i64| {
        Value::map([
            ("IpProtocol", Value::from("tcp")),
            ("FromPort", Value::from(port)),
            ("ToPort", Value::from(port)),
            ("CidrIp", Value::reference("CidrBlock")),
        ])
    };
    t.add_resource(
        Resource::new("SecurityGroup", "AWS::EC2::SecurityGroup")
            .property("GroupDescription", "Security group allowing SSH and HTTP/HTTPS access")
            .property("SecurityGroupIngress", Value::list([ingress(22), ingress(80), ingress(443)]))
            .property(
                "Tags",
                Value::tags([(
                    "Name",
                    Value::join(" ", [Value::reference("AWS::StackName"), Value::from("sg")]),
                )]),
            )
            .property("VpcId", Value::import(config.export_name("VPCID"))),
    )?;
    t.add_resource(
        Resource::new("SecurityGroupIngress", "AWS::EC2::SecurityGroupIngress")
            .property("GroupId", Value::reference("SecurityGroup"))
            .property("IpProtocol", -1)
            .property("FromPort", -1)
            .property("ToPort", -1)
            .property("SourceSecurityGroupId", Value::reference("SecurityGroup")),
    )?;

    let port = || Value::reference("TomcatDefaultConnectorPort");
    let stickiness = || Value::list(["JSessionIdStickiness"]);
    let health_target = Value::if_else(
        "UseContextPath",
        Value::join(
            "",
            [
                Value::from("HTTP:"),
                port(),
                Value::reference("TomcatContextPath"),
                Value::from("/status"),
            ],
        ),
        Value::join("", [Value::from("HTTP:"), port(), Value::from("/status")]),
    );
    let https_listener = Value::map([
        ("InstancePort", port()),
        ("InstanceProtocol", Value::from("HTTP")),
        ("LoadBalancerPort", Value::from("443")),
        ("PolicyNames", stickiness()),
        ("Protocol", Value::from("HTTPS")),
        ("SSLCertificateId", Value::reference("SSLCertificateARN")),
    ]);
    t.add_resource(
        Resource::new("LoadBalancer", "AWS::ElasticLoadBalancing::LoadBalancer")
            .property(
                "AppCookieStickinessPolicy",
                Value::list([Value::map([
                    ("CookieName", Value::from("JSESSIONID")),
                    ("PolicyName", Value::from("JSessionIdStickiness")),
                ])]),
            )
            .property(
                "ConnectionDrainingPolicy",
                Value::map([("Enabled", Value::from(true)), ("Timeout", Value::from(30))]),
            )
            .property("ConnectionSettings", Value::map([("IdleTimeout", Value::from(3600))]))
            .property("CrossZone", true)
            .property(
                "HealthCheck",
                Value::map([
                    ("HealthyThreshold", Value::from("2")),
                    ("Interval", Value::from("30")),
                    ("Target", health_target),
                    ("Timeout", Value::from("29")),
                    ("UnhealthyThreshold", Value::from("2")),
                ]),
            )
            .property(
                "Listeners",
                Value::list([
                    Value::map([
                        ("InstancePort", port()),
                        ("InstanceProtocol", Value::from("HTTP")),
                        ("LoadBalancerPort", Value::from("80")),
                        ("PolicyNames", stickiness()),
                        ("Protocol", Value::from("HTTP")),
                    ]),
                    Value::if_else("DoSSL", https_listener, Value::no_value()),
                ]),
            )
            .property("Scheme", Value::if_else("UsePublicIp", "internet-facing", "internal"))
            .property("SecurityGroups", Value::list([Value::reference("SecurityGroup")]))
            .property("Subnets", split_import(&config.export_name("PubNets")))
            .property(
                "Tags",
                Value::tags([
                    ("Name", stack_named("${StackName}-LoadBalancer")),
                    ("Cluster", Value::reference("AWS::StackName")),
                ]),
            ),
    )?;
    Ok(())
}

fn add_cluster(t: &mut Template, config: &ComposerConfig) -> Result<(), ComposeError> {
    let role = t.add_resource(
        Resource::new("JiraClusterNodeRole", "AWS::IAM::Role")
            .property("AssumeRolePolicyDocument", assume_role_policy())
            .property(
                "ManagedPolicyArns",
                Value::list(["arn:aws:iam::aws:policy/service-role/AmazonEC2RoleforSSM"]),
            )
            .property("Path", "/")
            .property("Policies", Value::list([node_policy()])),
    )?;
    t.add_resource(
        Resource::new("JiraClusterNodeInstanceProfile", "AWS::IAM::InstanceProfile")
            .property("Path", "/")
            .property("Roles", Value::list([role])),
    )?;

    let instance_type = Value::reference("ClusterNodeInstanceType");
    t.add_resource(
        Resource::new("ClusterNodeLaunchConfig", "AWS::AutoScaling::LaunchConfiguration")
            .depends_on("EFSMountAz1")
            .depends_on("EFSMountAz2")
            .depends_on("DB")
            .with_metadata(Value::map([("AWS::CloudFormation::Init", node_init())]))
            .property("AssociatePublicIpAddress", false)
            .property(
                "BlockDeviceMappings",
                Value::list([
                    Value::map([
                        ("DeviceName", Value::from("/dev/xvda")),
                        (
                            "Ebs",
                            Value::map([("VolumeSize", Value::reference("ClusterNodeVolumeSize"))]),
                        ),
                    ]),
                    Value::map([
                        ("DeviceName", Value::from("/dev/xvdf")),
                        ("NoDevice", Value::from(true)),
                    ]),
                ]),
            )
            .property("IamInstanceProfile", Value::reference("JiraClusterNodeInstanceProfile"))
            .property(
                "ImageId",
                Value::find_in_map(
                    "AWSRegionArch2AMI",
                    Value::reference("AWS::Region"),
                    Value::find_in_map("AWSInstanceType2Arch", instance_type.clone(), "Arch"),
                ),
            )
            .property("InstanceType", instance_type)
            .property(
                "KeyName",
                Value::if_else(
                    "KeyProvided",
                    Value::reference("KeyPairName"),
                    Value::import(config.export_name("DefaultKey")),
                ),
            )
            .property("SecurityGroups", Value::list([Value::reference("SecurityGroup")]))
            .property("UserData", user_data()),
    )?;

    t.add_resource(
        Resource::new("ClusterNodeGroup", "AWS::AutoScaling::AutoScalingGroup")
            .property("DesiredCapacity", Value::reference("ClusterNodeMin"))
            .property("LaunchConfigurationName", Value::reference("ClusterNodeLaunchConfig"))
            .property("LoadBalancerNames", Value::list([Value::reference("LoadBalancer")]))
            .property("MaxSize", Value::reference("ClusterNodeMax"))
            .property("MinSize", Value::reference("ClusterNodeMin"))
            .property(
                "Tags",
                Value::list([
                    Value::map([
                        ("Key", Value::from("Name")),
                        ("Value", stack_named("${StackName} Jira Node")),
                        ("PropagateAtLaunch", Value::from(true)),
                    ]),
                    Value::map([
                        ("Key", Value::from("Cluster")),
                        ("Value", Value::reference("AWS::StackName")),
                        ("PropagateAtLaunch", Value::from(true)),
                    ]),
                ]),
            )
            .property("VPCZoneIdentifier", split_import(&config.export_name("PriNets"))),
    )?;
    Ok(())
}

fn assume_role_policy() -> Value {
    Value::map([
        ("Version", Value::from("2012-10-17")),
        (
            "Statement",
            Value::list([Value::map([
                ("Action", Value::list(["sts:AssumeRole"])),
                ("Effect", Value::from("Allow")),
                ("Principal", Value::map([("Service", Value::list(["ec2.amazonaws.com"]))])),
            ])]),
        ),
    ])
}

fn allow(actions: &[&str], resources: &[&str]) -> Value {
    Value::map([
        ("Action", Value::list(actions.iter().copied())),
        ("Effect", Value::from("Allow")),
        ("Resource", Value::list(resources.iter().copied())),
    ])
}

fn node_policy() -> Value {
    Value::map([
        ("PolicyName", Value::from("JiraClusterNodePolicy")),
        (
            "PolicyDocument",
            Value::map([
                ("Version", Value::from("2012-10-17")),
                (
                    "Statement",
                    Value::list([
                        allow(
                            &[
                                "ec2:DescribeInstances",
                                "route53:ListHostedZones",
                                "route53:ListResourceRecordSet",
                            ],
                            &["*"],
                        ),
                        allow(
                            &["route53:ChangeResourceRecordSets"],
                            &[
                                "arn:aws:route53:::healthcheck/*",
                                "arn:aws:route53:::change/*",
                                "arn:aws:route53:::hostedzone/*",
                                "arn:aws:route53:::delegationset/*",
                            ],
                        ),
                    ]),
                ),
            ]),
        ),
    ])
}

/// One `KEY=${Var}` line of the node environment file
fn env_line(key: &str, var: &str, value: Value) -> Value {
    Value::sub_with(format!("{key}=${{{var}}}"), [(var, value)])
}

/// `/etc/atl`, read by the node provisioning playbooks
fn node_environment() -> Value {
    const STATIC: &[&str] = &[
        "ATL_PRODUCT_FAMILY=jira",
        "ATL_DB_DRIVER=org.postgresql.Driver",
        "ATL_JDBC_DB_NAME=jira",
        "ATL_JDBC_USER=atljira",
        "ATL_APP_DATA_MOUNT_ENABLED=false",
        "ATL_ENABLED_PRODUCTS=Jira",
        "ATL_ENABLED_SHARED_HOMES=",
        "ATL_NGINX_ENABLED=false",
        "ATL_POSTGRES_ENABLED=false",
        "ATL_RELEASE_S3_BUCKET=atlassian-software",
        "ATL_RELEASE_S3_PATH=releases",
        "ATL_SSL_SELF_CERT_ENABLED=false",
        "",
    ];
    let ssl = |then: Value, otherwise: Value| Value::if_else("SSLScheme", then, otherwise);
    let product = |key: &str| {
        Value::find_in_map("JIRAProduct2NameAndVersion", Value::reference("JiraProduct"), key)
    };
    let db_address = || Value::get_att("DB", "Endpoint.Address");
    let db_port = || Value::get_att("DB", "Endpoint.Port");

    let mut lines: Vec<Value> = STATIC.iter().map(|line| Value::from(*line)).collect();
    lines.push(env_line("ATL_PRODUCT_EDITION", "Edition", Value::reference("JiraProduct")));
    lines.push(env_line("ATL_PRODUCT_VERSION", "ProductVersion", Value::reference("JiraVersion")));
    lines.push(env_line("ATL_EFS_ID", "ElasticFileSystem", Value::reference("ElasticFileSystem")));
    lines.push(ssl(Value::from("ATL_SSL_PROXY=true"), Value::no_value()));
    lines.push(env_line("ATL_AWS_STACK_NAME", "StackName", Value::reference("AWS::StackName")));
    lines.push(Value::sub_with(
        "ATL_CATALINA_OPTS=\"${CatalinaOpts} ${MailOpts}\"",
        [
            ("CatalinaOpts", Value::reference("CatalinaOpts")),
            ("MailOpts", Value::if_else("DisableMail", MAIL_DISABLED_OPTS, "")),
        ],
    ));
    lines.push(env_line("ATL_DB_HOST", "DBEndpointAddress", db_address()));
    for (key, param) in [
        ("ATL_DB_MAXIDLE", "DBMaxIdle"),
        ("ATL_DB_MAXWAITMILLIS", "DBMaxWaitMillis"),
        ("ATL_DB_MINEVICTABLEIDLETIMEMILLIS", "DBMinEvictableIdleTimeMillis"),
        ("ATL_DB_MINIDLE", "DBMinIdle"),
    ] {
        lines.push(env_line(key, param, Value::reference(param)));
    }
    lines.push(Value::sub_with(
        "ATL_DB_ROOT_PASSWORD='${DBMasterUserPassword}'",
        [("DBMasterUserPassword", Value::reference("DBMasterUserPassword"))],
    ));
    lines.push(env_line("ATL_DB_POOLMAXSIZE", "DBPoolMaxSize", Value::reference("DBPoolMaxSize")));
    lines.push(env_line("ATL_DB_POOLMINSIZE", "DBPoolMinSize", Value::reference("DBPoolMinSize")));
    lines.push(env_line("ATL_DB_PORT", "DBEndpointPort", db_port()));
    for (key, param) in [
        ("ATL_DB_REMOVEABANDONED", "DBRemoveAbandoned"),
        ("ATL_DB_REMOVEABANDONEDTIMEOUT", "DBRemoveAbandonedTimeout"),
        ("ATL_DB_TESTONBORROW", "DBTestOnBorrow"),
        ("ATL_DB_TESTWHILEIDLE", "DBTestWhileIdle"),
        ("ATL_DB_TIMEBETWEENEVICTIONRUNSMILLIS", "DBTimeBetweenEvictionRunsMillis"),
        ("ATL_HOSTEDZONE", "HostedZone"),
    ] {
        lines.push(env_line(key, param, Value::reference(param)));
    }
    lines.push(Value::sub_with(
        "ATL_JDBC_PASSWORD='${DBPassword}'",
        [("DBPassword", Value::reference("DBPassword"))],
    ));
    lines.push(Value::sub_with(
        "ATL_JDBC_URL=jdbc:postgresql://${DBEndpointAddress}:${DBEndpointPort}/jira",
        [("DBEndpointAddress", db_address()), ("DBEndpointPort", db_port())],
    ));
    lines.push(env_line(
        "ATL_JIRA_FULL_DISPLAY_NAME",
        "JiraFullDisplayName",
        product("fulldisplayname"),
    ));
    lines.push(env_line("ATL_JIRA_NAME", "JiraProductName", product("name")));
    lines.push(env_line(
        "ATL_JIRA_SHORT_DISPLAY_NAME",
        "JiraShortDisplayName",
        product("shortdisplayname"),
    ));
    lines.push(env_line(
        "ATL_JVM_HEAP",
        "AtlJvmHeap",
        Value::if_else(
            "OverrideHeap",
            Value::reference("JvmHeapOverride"),
            Value::find_in_map(
                "AWSInstanceType2Arch",
                Value::reference("ClusterNodeInstanceType"),
                "Jvmheap",
            ),
        ),
    ));
    lines.push(env_line(
        "ATL_PROXY_NAME",
        "AtlProxyName",
        Value::if_else(
            "UseCustomDnsName",
            Value::reference("CustomDnsName"),
            Value::if_else(
                "UseHostedZone",
                Value::reference("LoadBalancerCname"),
                Value::get_att("LoadBalancer", "DNSName"),
            ),
        ),
    ));
    for (key, param) in [
        ("ATL_TOMCAT_ACCEPTCOUNT", "TomcatAcceptCount"),
        ("ATL_TOMCAT_CONNECTIONTIMEOUT", "TomcatConnectionTimeout"),
        ("ATL_TOMCAT_CONTEXTPATH", "TomcatContextPath"),
        ("ATL_TOMCAT_DEFAULTCONNECTORPORT", "TomcatDefaultConnectorPort"),
        ("ATL_TOMCAT_ENABLELOOKUPS", "TomcatEnableLookups"),
        ("ATL_TOMCAT_MAXTHREADS", "TomcatMaxThreads"),
        ("ATL_TOMCAT_MINSPARETHREADS", "TomcatMinSpareThreads"),
        ("ATL_TOMCAT_PROTOCOL", "TomcatProtocol"),
    ] {
        lines.push(env_line(key, param, Value::reference(param)));
    }
    lines.push(env_line(
        "ATL_TOMCAT_PROXYPORT",
        "TomcatProxyPort",
        ssl(Value::from(443), Value::from(80)),
    ));
    lines.push(env_line(
        "ATL_TOMCAT_REDIRECTPORT",
        "TomcatRedirectPort",
        Value::reference("TomcatRedirectPort"),
    ));
    lines.push(env_line(
        "ATL_TOMCAT_SCHEME",
        "TomcatScheme",
        ssl(Value::from("https"), Value::from("http")),
    ));
    lines.push(env_line(
        "ATL_TOMCAT_SECURE",
        "TomcatSecure",
        ssl(Value::from(true), Value::from(false)),
    ));
    for (key, var, param) in [
        ("ATL_DEPLOYMENT_REPOSITORY", "DeployRepository", "DeploymentAutomationRepository"),
        (
            "ATL_DEPLOYMENT_REPOSITORY_BRANCH",
            "DeployRepositoryBranch",
            "DeploymentAutomationBranch",
        ),
        (
            "ATL_DEPLOYMENT_REPOSITORY_PLAYBOOK",
            "DeployRepositoryPlaybook",
            "DeploymentAutomationPlaybook",
        ),
        (
            "ATL_DEPLOYMENT_REPOSITORY_KEYNAME",
            "DeployRepositoryKeyName",
            "DeploymentAutomationKeyName",
        ),
    ] {
        lines.push(env_line(key, var, Value::reference(param)));
    }
    Value::join_list("\n", Value::List(lines))
}

/// cfn-init configuration: environment file, repo clone script, bootstrap commands
fn node_init() -> Value {
    let file = |content: Value, mode: &str| {
        Value::map([
            ("content", content),
            ("owner", Value::from("root")),
            ("group", Value::from("root")),
            ("mode", Value::from(mode)),
        ])
    };
    let command = |cmd: Value, test: Option<&str>, ignore_errors: bool| {
        let mut entries = vec![("command", cmd)];
        if let Some(test) = test {
            entries.push(("test", Value::from(test)));
        }
        entries.push(("ignoreErrors", Value::from(ignore_errors)));
        Value::map(entries)
    };
    Value::map([(
        "config",
        Value::map([
            (
                "files",
                Value::map([
                    (
                        "/opt/atlassian/bin/clone_deployment_repo",
                        file(Value::sub(CLONE_DEPLOYMENT_REPO), "000750"),
                    ),
                    ("/etc/atl", file(node_environment(), "000640")),
                ]),
            ),
            (
                "commands",
                Value::map([
                    (
                        "070_create_atl_dir",
                        command(
                            Value::from("mkdir -p /opt/atlassian"),
                            Some("test ! -d /opt/atlassian/"),
                            false,
                        ),
                    ),
                    (
                        "071_install_packages",
                        command(Value::from("yum install -y git python-virtualenv"), None, true),
                    ),
                    (
                        "072_clone_atl_scripts",
                        command(
                            Value::from("/opt/atlassian/bin/clone_deployment_repo"),
                            Some("test ! -d /opt/atlassian/dc-deployments-automation/"),
                            true,
                        ),
                    ),
                    (
                        "080_run_atl_init_node",
                        command(
                            Value::sub(
                                "cd /opt/atlassian/dc-deployments-automation/ && ./bin/install-ansible && ./bin/ansible-with-atl-env inv/aws_node_local ${DeploymentAutomationPlaybook} /var/log/ansible-bootstrap.log\n",
                            ),
                            None,
                            true,
                        ),
                    ),
                ]),
            ),
        ]),
    )])
}

fn user_data() -> Value {
    let region = || [("Region", Value::reference("AWS::Region"))];
    Value::base64(Value::join(
        "",
        [
            Value::from("#!/bin/bash -xe\n"),
            Value::from("yum update -y aws-cfn-bootstrap\n"),
            stack_named("/opt/aws/bin/cfn-init -v --stack ${StackName}"),
            Value::sub_with(" --resource ClusterNodeLaunchConfig --region ${Region}\n", region()),
            stack_named("/opt/aws/bin/cfn-signal -e $? --stack ${StackName}"),
            Value::sub_with(" --resource ClusterNodeLaunchConfig --region ${Region}", region()),
        ],
    ))
}

fn add_outputs(t: &mut Template) -> Result<(), ComposeError> {
    let scheme = || Value::if_else("SSLScheme", "https", "http");
    let stack_suffixed = |suffix: &str| {
        Value::join("", [Value::reference("AWS::StackName"), Value::from(suffix)])
    };
    let service_url = |host_var: &str, host: Value| {
        Value::sub_with(
            format!("${{HTTP}}://${{{host_var}}}${{ContextPath}}"),
            [
                ("HTTP", scheme()),
                (host_var, host),
                ("ContextPath", Value::reference("TomcatContextPath")),
            ],
        )
    };

    t.add_output(
        Output::new("DBEncryptionKey", Value::reference("EncryptionKeyAlias"))
            .with_description("The alias of the encryption key created for RDS")
            .with_condition("UseDatabaseEncryption"),
    )?;
    t.add_output(
        Output::new(
            "EFSCname",
            Value::if_else(
                "UseHostedZone",
                Value::reference("EFSCname"),
                Value::reference("ElasticFileSystem"),
            ),
        )
        .with_description("The cname of the EFS")
        .with_export(stack_suffixed("-EFSCname")),
    )?;
    t.add_output(
        Output::new("SGname", Value::reference("SecurityGroup"))
            .with_description("The name of the SecurityGroup")
            .with_export(stack_suffixed("-SGname")),
    )?;
    t.add_output(
        Output::new("DBEndpointAddress", Value::get_att("DB", "Endpoint.Address"))
            .with_description("The Database Connection String"),
    )?;
    t.add_output(
        Output::new(
            "LoadBalancerURL",
            Value::sub_with(
                "${HTTP}://${LoadBalancerDNSName}",
                [
                    ("HTTP", scheme()),
                    ("LoadBalancerDNSName", Value::get_att("LoadBalancer", "DNSName")),
                ],
            ),
        )
        .with_description("The Load Balancer URL"),
    )?;
    t.add_output(
        Output::new(
            "ServiceURL",
            Value::if_else(
                "UseCustomDnsName",
                service_url("CustomDNSName", Value::reference("CustomDnsName")),
                Value::if_else(
                    "UseHostedZone",
                    service_url("LBCName", Value::reference("LoadBalancerCname")),
                    service_url("LoadBalancerDNSName", Value::get_att("LoadBalancer", "DNSName")),
                ),
            ),
        )
        .with_description("The URL to access this Atlassian service"),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn built() -> Template {
        build(&ComposerConfig::default()).expect("Should build")
    }

    #[test]
    fn test_passwords_required_and_masked() {
        let t = built();
        for id in ["DBPassword", "DBMasterUserPassword"] {
            let param = t.parameter(id).expect("parameter");
            assert!(param.is_required(), "{id} should have no default");
            assert!(param.no_echo);
        }
    }

    #[test]
    fn test_imports_use_export_prefix() {
        let t = build(&ComposerConfig::default().with_export_prefix("DEV")).expect("Should build");
        assert_eq!(
            t.import_names(),
            vec!["DEV-PriNets", "DEV-VPCID", "DEV-PubNets", "DEV-DefaultKey"]
        );
    }

    #[test]
    fn test_instance_types_match_heap_mapping() {
        let t = built();
        let param = t.parameter("ClusterNodeInstanceType").expect("parameter");
        let mapping = t.mapping("AWSInstanceType2Arch").expect("mapping");
        assert_eq!(param.allowed_values.len(), mapping.entries.len());
        assert_eq!(mapping.lookup("c5.xlarge", "Jvmheap"), Some(&Value::from("5120m")));
    }

    #[test]
    fn test_launch_config_waits_for_storage() {
        let doc = built().to_document().expect("Should serialize");
        let launch = &doc["Resources"]["ClusterNodeLaunchConfig"];
        assert_eq!(launch["DependsOn"], json!(["EFSMountAz1", "EFSMountAz2", "DB"]));
        assert_eq!(
            launch["Properties"]["KeyName"],
            json!({"Fn::If": ["KeyProvided", {"Ref": "KeyPairName"}, {"Fn::ImportValue": "ATL-DefaultKey"}]})
        );
        let files = &launch["Metadata"]["AWS::CloudFormation::Init"]["config"]["files"];
        assert!(files["/etc/atl"].is_object());
    }

    #[test]
    fn test_conditional_encryption_output() {
        let doc = built().to_document().expect("Should serialize");
        assert_eq!(doc["Outputs"]["DBEncryptionKey"]["Condition"], json!("UseDatabaseEncryption"));
        assert_eq!(doc["Resources"]["EncryptionKey"]["Condition"], json!("UseDatabaseEncryption"));
        assert_eq!(doc["Conditions"].as_object().map(|c| c.len()), Some(12));
    }
}
