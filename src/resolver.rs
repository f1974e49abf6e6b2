//! Maps an orphaned resource to the address it most likely has in the IaC
//! configuration. Suggestions are advisory; the planner decides what to do
//! with them.

use lazy_static::lazy_static;
use regex::Regex;

use crate::resource::{PolicyKind, ResourceDescriptor, ResourceType, VpcPart};

/// How much the resolver trusts a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    /// A naming rule for this type matched the resource name
    Exact,
    /// The type is declared once per stack; its single address
    TypeDefault,
    /// Generic `<iac_type>.<name>` address
    Fallback,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Exact => write!(f, "exact"),
            Confidence::TypeDefault => write!(f, "type default"),
            Confidence::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub address: String,
    pub confidence: Confidence,
}

struct NamingRule {
    resource_type: ResourceType,
    pattern: Regex,
    /// Address template; `[N]` is filled from the trailing number of the name
    address: &'static str,
}

fn rule(resource_type: ResourceType, pattern: &str, address: &'static str) -> NamingRule {
    NamingRule {
        resource_type,
        pattern: Regex::new(pattern).expect("valid naming rule"),
        address,
    }
}

lazy_static! {
    /// Checked in order; the first rule of the resource's type that matches wins
    static ref NAMING_RULES: Vec<NamingRule> = vec![
        rule(ResourceType::S3Bucket, r"documents?", "module.storage.aws_s3_bucket.documents"),
        rule(ResourceType::S3Bucket, r"frontend|website", "module.frontend.aws_s3_bucket.website"),
        rule(ResourceType::S3Bucket, r"vectors?|embeddings?", "module.storage.aws_s3_bucket.vectors"),
        rule(ResourceType::S3Bucket, r"logs?", "module.storage.aws_s3_bucket.logs"),
        rule(ResourceType::LambdaFunction, r"query-handler", "module.query_handler.aws_lambda_function.main"),
        rule(ResourceType::LambdaFunction, r"document-processor", "module.document_processor.aws_lambda_function.main"),
        rule(ResourceType::LambdaFunction, r"authorizer", "module.auth.aws_lambda_function.authorizer"),
        rule(ResourceType::LambdaFunction, r"index-creator", "module.bedrock.aws_lambda_function.index_creator"),
        rule(ResourceType::LambdaLayer, r"shared|common|deps", "module.lambda_layers.aws_lambda_layer_version.shared"),
        rule(ResourceType::LogGroup, r"query-handler", "module.query_handler.aws_cloudwatch_log_group.lambda"),
        rule(ResourceType::LogGroup, r"document-processor", "module.document_processor.aws_cloudwatch_log_group.lambda"),
        rule(ResourceType::LogGroup, r"apigateway|api-gateway|api-access", "module.api_gateway.aws_cloudwatch_log_group.access_logs"),
        rule(ResourceType::Vpc(VpcPart::Subnet), r"private", "module.vpc.aws_subnet.private[N]"),
        rule(ResourceType::Vpc(VpcPart::Subnet), r"public", "module.vpc.aws_subnet.public[N]"),
        rule(ResourceType::Vpc(VpcPart::RouteTable), r"private", "module.vpc.aws_route_table.private"),
        rule(ResourceType::Vpc(VpcPart::RouteTable), r"public", "module.vpc.aws_route_table.public"),
        rule(ResourceType::Vpc(VpcPart::Nat), r"nat", "module.vpc.aws_nat_gateway.main[N]"),
        rule(ResourceType::Vpc(VpcPart::SecurityGroup), r"lambda", "module.vpc.aws_security_group.lambda"),
        rule(ResourceType::Vpc(VpcPart::SecurityGroup), r"endpoints?", "module.vpc.aws_security_group.vpc_endpoints"),
        rule(ResourceType::Vpc(VpcPart::Endpoint), r"\.s3$", "module.vpc.aws_vpc_endpoint.s3"),
        rule(ResourceType::Vpc(VpcPart::Endpoint), r"bedrock-runtime", "module.vpc.aws_vpc_endpoint.bedrock_runtime"),
        rule(ResourceType::SnsTopic, r"alerts?|alarms?", "module.monitoring.aws_sns_topic.alerts"),
        rule(ResourceType::CloudWatchAlarm, r"errors?", "module.monitoring.aws_cloudwatch_metric_alarm.lambda_errors"),
        rule(ResourceType::CloudWatchAlarm, r"duration|latency", "module.monitoring.aws_cloudwatch_metric_alarm.lambda_duration"),
        rule(ResourceType::IamRole, r"query-handler", "module.query_handler.aws_iam_role.lambda"),
        rule(ResourceType::IamRole, r"document-processor", "module.document_processor.aws_iam_role.lambda"),
        rule(ResourceType::IamRole, r"bedrock|knowledge-base|kb-role", "module.bedrock.aws_iam_role.knowledge_base"),
        rule(ResourceType::IamPolicy, r"bedrock", "module.bedrock.aws_iam_policy.knowledge_base"),
    ];

    static ref TRAILING_NUMBER: Regex = Regex::new(r"(\d+)$").expect("valid regex");

    /// `module.a.module.b.aws_type.name[0]` with optional index or key;
    /// the type carries a provider prefix, so `module.x` alone is rejected
    static ref ADDRESS: Regex = Regex::new(
        r#"^(module\.[A-Za-z_][A-Za-z0-9_-]*(\[(\d+|"[^"]+")\])?\.)*[a-z][a-z0-9]*_[a-z0-9_]+\.[A-Za-z_][A-Za-z0-9_-]*(\[(\d+|"[^"]+")\])?$"#
    )
    .expect("valid regex");
}

/// Address used for types the stack declares exactly once
fn type_default(resource_type: ResourceType) -> Option<&'static str> {
    let address = match resource_type {
        ResourceType::Vpc(VpcPart::Vpc) => "module.vpc.aws_vpc.main",
        ResourceType::Vpc(VpcPart::Igw) => "module.vpc.aws_internet_gateway.main",
        ResourceType::ApiGateway => "module.api_gateway.aws_api_gateway_rest_api.main",
        ResourceType::CognitoUserPool => "module.auth.aws_cognito_user_pool.main",
        ResourceType::OpenSearchCollection => "module.bedrock.aws_opensearchserverless_collection.vectors",
        ResourceType::OpenSearchPolicy(PolicyKind::Data) => {
            "module.bedrock.aws_opensearchserverless_access_policy.data"
        }
        ResourceType::OpenSearchPolicy(PolicyKind::Network) => {
            "module.bedrock.aws_opensearchserverless_security_policy.network"
        }
        ResourceType::OpenSearchPolicy(PolicyKind::Encryption) => {
            "module.bedrock.aws_opensearchserverless_security_policy.encryption"
        }
        ResourceType::CloudFrontDistribution => "module.frontend.aws_cloudfront_distribution.main",
        ResourceType::XRaySamplingRule => "module.monitoring.aws_xray_sampling_rule.main",
        ResourceType::KmsKey => "module.security.aws_kms_key.main",
        ResourceType::BedrockKnowledgeBase => "module.bedrock.aws_bedrockagent_knowledge_base.main",
        _ => return None,
    };
    Some(address)
}

/// Terraform-safe identifier derived from a resource name
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "resource".to_string()
    } else if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("r_{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Whether `address` is a syntactically valid resource address
pub fn is_valid_address(address: &str) -> bool {
    ADDRESS.is_match(address)
}

/// Zero-based index from the name's trailing number (`private-2` -> 1)
fn index_from_name(name: &str) -> u32 {
    TRAILING_NUMBER
        .captures(name)
        .and_then(|c| c[1].parse::<u32>().ok())
        .map(|n| n.saturating_sub(1))
        .unwrap_or(0)
}

/// Best guess at the declared-state address of `resource`
pub fn resolve(resource: &ResourceDescriptor) -> Suggestion {
    let name = resource.name.to_lowercase();

    if let Some(rule) = NAMING_RULES
        .iter()
        .filter(|r| r.resource_type == resource.resource_type)
        .find(|r| r.pattern.is_match(&name))
    {
        let address = rule
            .address
            .replace("[N]", &format!("[{}]", index_from_name(&name)));
        return Suggestion {
            address,
            confidence: Confidence::Exact,
        };
    }

    if let Some(address) = type_default(resource.resource_type) {
        return Suggestion {
            address: address.to_string(),
            confidence: Confidence::TypeDefault,
        };
    }

    Suggestion {
        address: format!(
            "{}.{}",
            resource.resource_type.iac_type(),
            sanitize(&resource.name)
        ),
        confidence: Confidence::Fallback,
    }
}
